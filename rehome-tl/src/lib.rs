//! Wire types for the rehome protocol.
//!
//! This crate is a **hand-maintained schema**: the protocol is small and
//! fixed, so the constructors are written out directly instead of generated.
//!
//! # Overview
//!
//! | Module        | Contents                                                   |
//! |---------------|------------------------------------------------------------|
//! | [`types`]     | Concrete constructors (bare types) as `struct`s            |
//! | [`functions`] | RPC functions as `struct`s implementing [`RemoteCall`]     |
//! | [`enums`]     | Boxed types as `enum`s implementing [`Deserializable`]     |
//!
//! # Raw usage
//!
//! ```rust
//! use rehome_tl::{functions, Serializable};
//!
//! let req = functions::SendCode {
//!     phone_number: "1234567890".into(),
//!     api_id: 12345,
//!     api_hash: "abc".into(),
//! };
//!
//! let bytes = req.to_bytes();
//! // Send `bytes` over a sealed connection…
//! ```

#![deny(unsafe_code)]

pub mod deserialize;
pub mod enums;
pub mod functions;
pub mod serialize;
pub mod types;

pub use deserialize::{Cursor, Deserializable};
pub use serialize::Serializable;

/// Wraps the answer to any RPC function: `req_msg_id` echoes the request's
/// message ID, followed by the bare result body.
pub const RPC_RESULT_ID: u32 = 0xa17f3e66;

/// Carries an RPC failure: an `i32` code and a string message such as
/// `PHONE_MIGRATE_5`.
pub const RPC_ERROR_ID: u32 = 0xd4280b91;

// ─── Core traits ──────────────────────────────────────────────────────────────

/// Every constructor has a unique 32-bit ID.
pub trait Identifiable {
    /// The constructor ID as declared in the schema.
    const CONSTRUCTOR_ID: u32;
}

/// Marks a function type that can be sent to a server as an RPC call.
///
/// `Return` is the type the server will respond with.
pub trait RemoteCall: Serializable {
    /// The deserialized response type.
    type Return: Deserializable;
}
