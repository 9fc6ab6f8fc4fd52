//! Cryptographic primitives for the rehome protocol.
//!
//! Provides:
//! - `AuthKey` — 256-byte key with derived identifier
//! - SHA-256 hash macro
//! - sealed-frame encryption / decryption (AES-256-CTR, SHA-256 message key)
//!
//! A sealed frame is `key_id || msg_key || ciphertext`. The message key is a
//! MAC over the padded plaintext and doubles as the keystream nonce source,
//! so every frame gets a fresh keystream. Key material is split by
//! direction: the two peers derive from disjoint fragments of the shared
//! key, so a frame can never be replayed back at its author.

#![deny(unsafe_code)]

mod auth_key;
mod sha;

pub use auth_key::AuthKey;

use aes::cipher::{KeyIvInit, StreamCipher};

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Errors from [`open`].
#[derive(Clone, Debug, PartialEq)]
pub enum OpenError {
    /// Frame too short or ciphertext not padded to a 16-byte multiple.
    ShortBuffer,
    /// The `key_id` in the frame does not match our key.
    KeyIdMismatch,
    /// The `msg_key` in the frame does not match our computed value.
    MsgKeyMismatch,
}

impl std::fmt::Display for OpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShortBuffer => write!(f, "sealed frame too short or misaligned"),
            Self::KeyIdMismatch => write!(f, "key_id mismatch"),
            Self::MsgKeyMismatch => write!(f, "msg_key mismatch"),
        }
    }
}
impl std::error::Error for OpenError {}

// ─── Direction ───────────────────────────────────────────────────────────────

/// Which peer produced a sealed frame.
///
/// Sealing and opening the same frame must use the same `Side`: the client
/// seals requests with `Client` and the server opens them with `Client`;
/// responses go the other way round with `Server`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

impl Side {
    fn x(&self) -> usize {
        match self {
            Side::Client => 0,
            Side::Server => 64,
        }
    }
}

// ─── Key schedule ────────────────────────────────────────────────────────────

fn derive_keys(auth_key: &AuthKey, msg_key: &[u8; 16], side: Side) -> ([u8; 32], [u8; 16]) {
    let x = side.x();
    let sha_a = sha256!(msg_key, &auth_key.data[x..x + 32]);
    let sha_b = sha256!(&auth_key.data[32 + x..64 + x], msg_key);

    let mut iv = [0u8; 16];
    iv.copy_from_slice(&sha_b[..16]);

    (sha_a, iv)
}

fn msg_key_for(auth_key: &AuthKey, plaintext: &[u8], side: Side) -> [u8; 16] {
    let x = side.x();
    let large = sha256!(&auth_key.data[128 + x..160 + x], plaintext);
    let mut msg_key = [0u8; 16];
    msg_key.copy_from_slice(&large[8..24]);
    msg_key
}

fn padding_len(len: usize) -> usize {
    16 + (16 - (len % 16))
}

// ─── Seal / open ─────────────────────────────────────────────────────────────

/// Seal `plaintext` into a `key_id || msg_key || ciphertext` frame.
pub fn seal(auth_key: &AuthKey, side: Side, plaintext: &[u8]) -> Vec<u8> {
    let mut rnd = [0u8; 32];
    getrandom::getrandom(&mut rnd).expect("getrandom failed");
    do_seal(auth_key, side, plaintext, &rnd)
}

pub(crate) fn do_seal(auth_key: &AuthKey, side: Side, plaintext: &[u8], rnd: &[u8; 32]) -> Vec<u8> {
    let pad = padding_len(plaintext.len());

    let mut data = Vec::with_capacity(plaintext.len() + pad);
    data.extend_from_slice(plaintext);
    data.extend(rnd.iter().take(pad).copied());

    let msg_key = msg_key_for(auth_key, &data, side);
    let (key, iv) = derive_keys(auth_key, &msg_key, side);
    let mut cipher = Aes256Ctr::new(&key.into(), &iv.into());
    cipher.apply_keystream(&mut data);

    let mut out = Vec::with_capacity(24 + data.len());
    out.extend_from_slice(&auth_key.key_id);
    out.extend_from_slice(&msg_key);
    out.extend_from_slice(&data);
    out
}

/// Open a sealed frame, returning the padded plaintext.
///
/// The tail contains 17–32 bytes of random padding; the caller's envelope
/// length field delimits the real body.
pub fn open(auth_key: &AuthKey, side: Side, frame: &[u8]) -> Result<Vec<u8>, OpenError> {
    if frame.len() < 24 || (frame.len() - 24) % 16 != 0 {
        return Err(OpenError::ShortBuffer);
    }
    if auth_key.key_id != frame[..8] {
        return Err(OpenError::KeyIdMismatch);
    }
    let mut msg_key = [0u8; 16];
    msg_key.copy_from_slice(&frame[8..24]);

    let (key, iv) = derive_keys(auth_key, &msg_key, side);
    let mut data = frame[24..].to_vec();
    let mut cipher = Aes256Ctr::new(&key.into(), &iv.into());
    cipher.apply_keystream(&mut data);

    if msg_key != msg_key_for(auth_key, &data, side) {
        return Err(OpenError::MsgKeyMismatch);
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> AuthKey {
        let mut data = [0u8; 256];
        for (i, b) in data.iter_mut().enumerate() { *b = i as u8; }
        AuthKey::from_bytes(data)
    }

    #[test]
    fn roundtrip_same_side() {
        let k = key();
        let frame = seal(&k, Side::Client, b"hello sealed world");
        let opened = open(&k, Side::Client, &frame).unwrap();
        assert_eq!(&opened[..18], b"hello sealed world");
        assert_eq!(opened.len() % 16, 0);
        let pad = opened.len() - 18;
        assert!((17..=32).contains(&pad), "pad was {pad}");
    }

    #[test]
    fn opposite_side_rejects() {
        let k = key();
        let frame = seal(&k, Side::Client, b"direction bound");
        assert_eq!(open(&k, Side::Server, &frame), Err(OpenError::MsgKeyMismatch));
    }

    #[test]
    fn wrong_key_rejected_by_id() {
        let k = key();
        let other = AuthKey::from_bytes([7u8; 256]);
        let frame = seal(&k, Side::Client, b"abc");
        assert_eq!(open(&other, Side::Client, &frame), Err(OpenError::KeyIdMismatch));
    }

    #[test]
    fn tampered_ciphertext_rejected() {
        let k = key();
        let mut frame = seal(&k, Side::Server, b"abc");
        let last = frame.len() - 1;
        frame[last] ^= 0xff;
        assert_eq!(open(&k, Side::Server, &frame), Err(OpenError::MsgKeyMismatch));
    }

    #[test]
    fn short_or_misaligned_frames() {
        let k = key();
        assert_eq!(open(&k, Side::Client, &[0u8; 23]), Err(OpenError::ShortBuffer));
        assert_eq!(open(&k, Side::Client, &[0u8; 25]), Err(OpenError::ShortBuffer));
    }

    #[test]
    fn deterministic_given_padding() {
        let k = key();
        let rnd = [9u8; 32];
        let a = do_seal(&k, Side::Client, b"same", &rnd);
        let b = do_seal(&k, Side::Client, b"same", &rnd);
        assert_eq!(a, b);
        let c = do_seal(&k, Side::Server, b"same", &rnd);
        assert_ne!(a, c);
    }
}
