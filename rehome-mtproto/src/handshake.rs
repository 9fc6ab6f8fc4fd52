//! Sans-IO authorization key exchange.
//!
//! # Flow
//!
//! ```text
//! let (req, s1) = handshake::step1(dc_id, test_mode);
//! // send req, receive resp
//! let (req, s2) = handshake::step2(s1, resp)?;
//! // send req, receive resp
//! let done = handshake::finish(s2, resp)?;
//! // done.auth_key is ready
//! ```
//!
//! Both round trips ride the plaintext envelope; the derived key is never
//! sent over the wire. The DH modulus is pinned: the server must echo the
//! well-known 2048-bit MODP group (RFC 3526, group 14) or the exchange is
//! rejected before any secret is generated.

use std::fmt;

use num_bigint::BigUint;
use num_traits::One;
use rehome_crypto::AuthKey;
use rehome_tl::{functions, types};

/// Hex digits of the RFC 3526 group-14 modulus.
const GROUP14_PRIME_HEX: &[u8] =
    b"FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74\
      020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437\
      4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
      EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05\
      98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB\
      9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B\
      E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718\
      3995497CEA956AE515D2261898FA051015728E5A8AACAA68FFFFFFFFFFFFFFFF";

/// The pinned DH modulus (RFC 3526 group 14).
///
/// Public so that servers and test harnesses can run the other side of the
/// exchange against the same group.
pub fn dh_prime() -> BigUint {
    // GROUP14_PRIME_HEX contains only hex digits (and line-joining spaces,
    // which parse_bytes rejects), so strip whitespace first.
    let digits: Vec<u8> = GROUP14_PRIME_HEX
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    BigUint::parse_bytes(&digits, 16).expect("embedded prime")
}

// ─── Error ───────────────────────────────────────────────────────────────────

/// Errors that can occur during the key exchange.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    InvalidNonce { got: [u8; 16], expected: [u8; 16] },
    InvalidServerNonce { got: [u8; 16], expected: [u8; 16] },
    /// The server's modulus is not the pinned group-14 prime.
    PrimeMismatch,
    GParameterOutOfRange { low: BigUint, high: BigUint },
    InvalidKeyCheck { got: [u8; 16], expected: [u8; 16] },
    /// The server refused the client's public value.
    Aborted,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidNonce { got, expected } => {
                write!(f, "nonce mismatch: got {got:?}, expected {expected:?}")
            }
            Self::InvalidServerNonce { got, expected } => {
                write!(f, "server_nonce mismatch: got {got:?}, expected {expected:?}")
            }
            Self::PrimeMismatch => write!(f, "dh_prime is not the pinned group-14 modulus"),
            Self::GParameterOutOfRange { low, high } => {
                write!(f, "DH parameter not in range ({low}, {high})")
            }
            Self::InvalidKeyCheck { got, expected } => {
                write!(f, "key check mismatch: got {got:?}, expected {expected:?}")
            }
            Self::Aborted => write!(f, "server aborted the exchange"),
        }
    }
}

// ─── Step state ──────────────────────────────────────────────────────────────

/// State after step 1.
pub struct Step1 {
    nonce: [u8; 16],
}

/// State after step 2.
pub struct Step2 {
    nonce: [u8; 16],
    server_nonce: [u8; 16],
    gab: BigUint,
}

/// The final output of a successful exchange.
#[derive(Clone, Debug, PartialEq)]
pub struct Finished {
    /// The 256-byte authorization key.
    pub auth_key: [u8; 256],
}

// ─── Step 1: ReqDhNonce ──────────────────────────────────────────────────────

/// Generate the opening request: a fresh client nonce bound to the target
/// data center and mode. Returns the request + opaque state.
pub fn step1(dc_id: i32, test_mode: bool) -> (functions::ReqDhNonce, Step1) {
    let mut nonce = [0u8; 16];
    getrandom::getrandom(&mut nonce).expect("getrandom");
    do_step1(dc_id, test_mode, &nonce)
}

fn do_step1(dc_id: i32, test_mode: bool, random: &[u8; 16]) -> (functions::ReqDhNonce, Step1) {
    let nonce = *random;
    (
        functions::ReqDhNonce { nonce, dc_id, test_mode },
        Step1 { nonce },
    )
}

// ─── Step 2: ReqDhExchange ───────────────────────────────────────────────────

/// Process the server's nonce + DH parameters and generate the client's
/// public value.
pub fn step2(
    data: Step1,
    response: types::DhServerNonce,
) -> Result<(functions::ReqDhExchange, Step2), Error> {
    let mut rnd = [0u8; 256];
    getrandom::getrandom(&mut rnd).expect("getrandom");
    do_step2(data, response, &rnd)
}

fn do_step2(
    data: Step1,
    response: types::DhServerNonce,
    random: &[u8; 256],
) -> Result<(functions::ReqDhExchange, Step2), Error> {
    let Step1 { nonce } = data;

    check_nonce(&response.nonce, &nonce)?;

    let prime = dh_prime();
    if BigUint::from_bytes_be(&response.dh_prime) != prime {
        return Err(Error::PrimeMismatch);
    }
    // The generator is a small constant for every known group; anything
    // outside this window is a malformed or hostile server.
    if !(2..=7).contains(&response.g) {
        return Err(Error::GParameterOutOfRange {
            low: BigUint::from(2u32),
            high: BigUint::from(7u32),
        });
    }

    let g = BigUint::from(response.g as u32);
    let g_a = BigUint::from_bytes_be(&response.g_a);

    let one = BigUint::one();
    check_in_range(&g_a, &one, &(&prime - &one))?;
    // Reject values close enough to the group edges that the shared secret
    // loses entropy (the 2^{2048-64} margin).
    let safety = &one << (2048 - 64);
    check_in_range(&g_a, &safety, &(&prime - &safety))?;

    let b = BigUint::from_bytes_be(random);
    let g_b = g.modpow(&b, &prime);
    check_in_range(&g_b, &one, &(&prime - &one))?;
    check_in_range(&g_b, &safety, &(&prime - &safety))?;

    let gab = g_a.modpow(&b, &prime);
    log::debug!("handshake: g={} accepted, public value ready", response.g);

    Ok((
        functions::ReqDhExchange {
            nonce,
            server_nonce: response.server_nonce,
            g_b: g_b.to_bytes_be(),
        },
        Step2 { nonce, server_nonce: response.server_nonce, gab },
    ))
}

// ─── finish ──────────────────────────────────────────────────────────────────

/// Derive the key and verify the server's commitment to it.
pub fn finish(data: Step2, response: rehome_tl::enums::DhAnswer) -> Result<Finished, Error> {
    let Step2 { nonce, server_nonce, gab } = data;

    let done = match response {
        rehome_tl::enums::DhAnswer::Done(x) => x,
        rehome_tl::enums::DhAnswer::Abort(x) => {
            check_nonce(&x.nonce, &nonce)?;
            check_server_nonce(&x.server_nonce, &server_nonce)?;
            return Err(Error::Aborted);
        }
    };

    check_nonce(&done.nonce, &nonce)?;
    check_server_nonce(&done.server_nonce, &server_nonce)?;

    // Left-pad to the fixed key width; the DH result may be shorter.
    let mut key_bytes = [0u8; 256];
    let gab_bytes = gab.to_bytes_be();
    key_bytes[256 - gab_bytes.len()..].copy_from_slice(&gab_bytes);

    let auth_key = AuthKey::from_bytes(key_bytes);
    let expected = auth_key.confirm_hash(&server_nonce);
    if done.key_check != expected {
        return Err(Error::InvalidKeyCheck { got: done.key_check, expected });
    }

    log::debug!("handshake: key confirmed");
    Ok(Finished { auth_key: key_bytes })
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn check_nonce(got: &[u8; 16], expected: &[u8; 16]) -> Result<(), Error> {
    if got == expected {
        Ok(())
    } else {
        Err(Error::InvalidNonce { got: *got, expected: *expected })
    }
}

fn check_server_nonce(got: &[u8; 16], expected: &[u8; 16]) -> Result<(), Error> {
    if got == expected {
        Ok(())
    } else {
        Err(Error::InvalidServerNonce { got: *got, expected: *expected })
    }
}

fn check_in_range(val: &BigUint, lo: &BigUint, hi: &BigUint) -> Result<(), Error> {
    if lo < val && val < hi {
        Ok(())
    } else {
        Err(Error::GParameterOutOfRange { low: lo.clone(), high: hi.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prime_is_2048_bits() {
        assert_eq!(dh_prime().bits(), 2048);
    }

    #[test]
    fn step1_carries_binding() {
        let (req, state) = do_step1(4, true, &[7u8; 16]);
        assert_eq!(req.dc_id, 4);
        assert!(req.test_mode);
        assert_eq!(req.nonce, state.nonce);
    }

    #[test]
    fn step2_rejects_wrong_nonce_echo() {
        let (_, s1) = do_step1(2, false, &[1u8; 16]);
        let resp = types::DhServerNonce {
            nonce: [2u8; 16],
            server_nonce: [3u8; 16],
            g: 3,
            dh_prime: dh_prime().to_bytes_be(),
            g_a: vec![5u8; 256],
        };
        assert!(matches!(
            do_step2(s1, resp, &[9u8; 256]),
            Err(Error::InvalidNonce { .. })
        ));
    }

    #[test]
    fn step2_rejects_foreign_prime() {
        let (_, s1) = do_step1(2, false, &[1u8; 16]);
        let resp = types::DhServerNonce {
            nonce: [1u8; 16],
            server_nonce: [3u8; 16],
            g: 3,
            dh_prime: vec![0xff; 256],
            g_a: vec![5u8; 256],
        };
        assert!(matches!(do_step2(s1, resp, &[9u8; 256]), Err(Error::PrimeMismatch)));
    }

    #[test]
    fn step2_rejects_edge_g_a() {
        let (_, s1) = do_step1(2, false, &[1u8; 16]);
        let resp = types::DhServerNonce {
            nonce: [1u8; 16],
            server_nonce: [3u8; 16],
            g: 3,
            // g_a = 1, inside neither range
            dh_prime: dh_prime().to_bytes_be(),
            g_a: vec![1u8],
        };
        assert!(matches!(
            do_step2(s1, resp, &[9u8; 256]),
            Err(Error::GParameterOutOfRange { .. })
        ));
    }
}
