/// Calculate the SHA-256 hash of one or more byte slices concatenated.
///
/// Expands in the calling crate, which therefore needs its own `sha2`
/// dependency.
#[macro_export]
macro_rules! sha256 {
    ( $( $x:expr ),+ ) => {{
        use sha2::{Digest, Sha256};
        let mut h = Sha256::new();
        $( h.update($x); )+
        let out: [u8; 32] = h.finalize().into();
        out
    }};
}
