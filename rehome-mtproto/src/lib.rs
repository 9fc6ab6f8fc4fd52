//! Sans-IO protocol state for the rehome client.
//!
//! This crate handles:
//! * Plaintext message framing (used only while a key exchange is in flight)
//! * The DH key exchange itself ([`handshake`])
//! * Sealed sessions (message IDs, sequence numbers, pack/unpack)
//!
//! It is intentionally transport-agnostic: bring your own TCP.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod handshake;
pub mod message;
pub mod sealed;
pub mod session;

pub use message::{Message, MessageId};
pub use sealed::{Envelope, SealedSession, UnpackError};
pub use session::PlainSession;
