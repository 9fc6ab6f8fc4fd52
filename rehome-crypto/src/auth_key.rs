//! `AuthKey` — 256-byte shared secret derived from the DH exchange.

use crate::sha256;

/// An authorization key (256 bytes) plus its pre-computed identifier.
#[derive(Clone)]
pub struct AuthKey {
    pub(crate) data: [u8; 256],
    pub(crate) key_id: [u8; 8],
}

impl AuthKey {
    /// Construct from raw 256-byte DH output.
    pub fn from_bytes(data: [u8; 256]) -> Self {
        let sha = sha256!(&data);
        let mut key_id = [0u8; 8];
        key_id.copy_from_slice(&sha[..8]);
        Self { data, key_id }
    }

    /// Return the raw 256-byte representation.
    pub fn to_bytes(&self) -> [u8; 256] { self.data }

    /// The 8-byte key identifier (SHA-256(key)[..8]).
    pub fn key_id(&self) -> [u8; 8] { self.key_id }

    /// Hash binding this key to an exchange nonce. The server sends it at
    /// the end of the exchange; both peers can compute it, nobody else can.
    pub fn confirm_hash(&self, nonce: &[u8; 16]) -> [u8; 16] {
        let sha = sha256!(&self.data, nonce);
        let mut out = [0u8; 16];
        out.copy_from_slice(&sha[8..24]);
        out
    }
}

impl std::fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthKey(id={})", u64::from_le_bytes(self.key_id))
    }
}

impl PartialEq for AuthKey {
    fn eq(&self, other: &Self) -> bool { self.key_id == other.key_id }
}
