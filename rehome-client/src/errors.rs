//! Error types and the per-call outcome variant for rehome-client.

use std::{fmt, io};

// ─── RpcError ─────────────────────────────────────────────────────────────────

/// An error returned by a server in response to an RPC call.
///
/// Numeric values are stripped from the name and placed in [`RpcError::value`].
///
/// # Example
/// `PHONE_MIGRATE_5` → `RpcError { code: 303, name: "PHONE_MIGRATE", value: Some(5) }`
#[derive(Clone, Debug, PartialEq)]
pub struct RpcError {
    /// HTTP-like status code.
    pub code: i32,
    /// Error name in SCREAMING_SNAKE_CASE with digits removed.
    pub name: String,
    /// Numeric suffix extracted from the name, if any.
    pub value: Option<u32>,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RPC {}: {}", self.code, self.name)?;
        if let Some(v) = self.value {
            write!(f, " (value: {v})")?;
        }
        Ok(())
    }
}

impl std::error::Error for RpcError {}

impl RpcError {
    /// Parse a raw error message like `"PHONE_MIGRATE_5"` into an `RpcError`.
    pub fn from_wire(code: i32, message: &str) -> Self {
        // Numeric suffix after the last underscore, if present.
        if let Some(idx) = message.rfind('_') {
            let suffix = &message[idx + 1..];
            if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(v) = suffix.parse::<u32>() {
                    let name = message[..idx].to_string();
                    return Self { code, name, value: Some(v) };
                }
            }
        }
        Self { code, name: message.to_string(), value: None }
    }

    /// Match on the error name, with optional wildcard prefix/suffix `'*'`.
    ///
    /// # Examples
    /// - `err.is("PHONE_NUMBER_INVALID")` — exact match
    /// - `err.is("PHONE_*")` — starts-with match
    /// - `err.is("*_INVALID")` — ends-with match
    pub fn is(&self, pattern: &str) -> bool {
        if let Some(prefix) = pattern.strip_suffix('*') {
            self.name.starts_with(prefix)
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            self.name.ends_with(suffix)
        } else {
            self.name == pattern
        }
    }
}

// ─── MigrationSignal ──────────────────────────────────────────────────────────

/// A server redirect: the request belongs to a different data center.
///
/// Classified out of the RPC error channel (code 303) before errors reach
/// any caller, so migration is handled as data, never surfaced as a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MigrationSignal {
    /// `PHONE_MIGRATE_X` — the phone number is homed on another DC.
    PhoneMigrate(i32),
    /// `NETWORK_MIGRATE_X` — the whole session must move to another DC.
    NetworkMigrate(i32),
}

impl MigrationSignal {
    /// The target data-center id carried by the signal.
    pub fn dc_id(&self) -> i32 {
        match self {
            Self::PhoneMigrate(dc) | Self::NetworkMigrate(dc) => *dc,
        }
    }

    /// Classify an RPC error as a migration signal, if it is one.
    pub fn classify(err: &RpcError) -> Option<Self> {
        if err.code != 303 {
            return None;
        }
        let dc = err.value? as i32;
        match err.name.as_str() {
            "PHONE_MIGRATE" => Some(Self::PhoneMigrate(dc)),
            "NETWORK_MIGRATE" => Some(Self::NetworkMigrate(dc)),
            _ => None,
        }
    }

    /// Reconstruct the RPC error this signal was classified from.
    ///
    /// Used when a migrate error arrives somewhere it must *not* be consumed
    /// (the configuration fetch inside a migration cycle).
    pub fn into_rpc_error(self) -> RpcError {
        let (name, dc) = match self {
            Self::PhoneMigrate(dc) => ("PHONE_MIGRATE", dc),
            Self::NetworkMigrate(dc) => ("NETWORK_MIGRATE", dc),
        };
        RpcError { code: 303, name: name.to_string(), value: Some(dc as u32) }
    }
}

impl fmt::Display for MigrationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PhoneMigrate(dc) => write!(f, "PHONE_MIGRATE to DC{dc}"),
            Self::NetworkMigrate(dc) => write!(f, "NETWORK_MIGRATE to DC{dc}"),
        }
    }
}

// ─── Outcome ──────────────────────────────────────────────────────────────────

/// The result of issuing one request on one connection.
///
/// Migration is a variant here, not an error: the coordinator switches on
/// the three cases, and only `Error` can ever propagate to a caller.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The server answered the call.
    Response(T),
    /// The server redirected the call to another data center.
    MigrationNeeded(MigrationSignal),
    /// The call failed for good.
    Error(InvocationError),
}

// ─── InvocationError ──────────────────────────────────────────────────────────

/// The error type returned from any [`crate::Client`] method that talks to
/// a server. Note the absence of a migrate variant: migration is consumed
/// internally and never reaches callers.
#[derive(Debug)]
pub enum InvocationError {
    /// The server rejected the request.
    Rpc(RpcError),
    /// Network / I/O failure.
    Io(io::Error),
    /// The key exchange failed.
    Handshake(rehome_mtproto::handshake::Error),
    /// Malformed frame or body (framing, sealing, deserialization).
    Protocol(String),
    /// Reconciliation left no usable address for the target data center.
    UnknownDc(i32),
    /// The migration policy refused another hop.
    MigrationLimit {
        /// How many migration cycles this call had already triggered.
        attempts: u32,
    },
    /// The client has been disconnected.
    NotConnected,
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rpc(e) => write!(f, "{e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Handshake(e) => write!(f, "handshake error: {e}"),
            Self::Protocol(s) => write!(f, "protocol error: {s}"),
            Self::UnknownDc(dc) => write!(f, "no usable address for DC{dc}"),
            Self::MigrationLimit { attempts } => {
                write!(f, "migration limit reached after {attempts} hops")
            }
            Self::NotConnected => write!(f, "not connected"),
        }
    }
}

impl std::error::Error for InvocationError {}

impl From<io::Error> for InvocationError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<rehome_mtproto::handshake::Error> for InvocationError {
    fn from(e: rehome_mtproto::handshake::Error) -> Self {
        Self::Handshake(e)
    }
}

impl From<rehome_tl::deserialize::Error> for InvocationError {
    fn from(e: rehome_tl::deserialize::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

impl From<rehome_mtproto::UnpackError> for InvocationError {
    fn from(e: rehome_mtproto::UnpackError) -> Self {
        Self::Protocol(e.to_string())
    }
}

impl InvocationError {
    /// Returns `true` if this is the named RPC error (supports `'*'` wildcards).
    pub fn is(&self, pattern: &str) -> bool {
        match self {
            Self::Rpc(e) => e.is(pattern),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_error_splits_numeric_suffix() {
        let e = RpcError::from_wire(303, "PHONE_MIGRATE_5");
        assert_eq!(e.name, "PHONE_MIGRATE");
        assert_eq!(e.value, Some(5));
    }

    #[test]
    fn rpc_error_keeps_plain_names() {
        let e = RpcError::from_wire(400, "PHONE_NUMBER_INVALID");
        assert_eq!(e.name, "PHONE_NUMBER_INVALID");
        assert_eq!(e.value, None);
    }

    #[test]
    fn classify_phone_and_network_migrate() {
        let phone = RpcError::from_wire(303, "PHONE_MIGRATE_2");
        let network = RpcError::from_wire(303, "NETWORK_MIGRATE_4");
        assert_eq!(MigrationSignal::classify(&phone), Some(MigrationSignal::PhoneMigrate(2)));
        assert_eq!(
            MigrationSignal::classify(&network),
            Some(MigrationSignal::NetworkMigrate(4))
        );
    }

    #[test]
    fn classify_needs_code_303() {
        let e = RpcError::from_wire(400, "PHONE_MIGRATE_2");
        assert_eq!(MigrationSignal::classify(&e), None);
    }

    #[test]
    fn classify_ignores_other_303s() {
        let e = RpcError::from_wire(303, "FILE_MIGRATE_2");
        assert_eq!(MigrationSignal::classify(&e), None);
    }

    #[test]
    fn wildcard_matching() {
        let e = RpcError::from_wire(400, "PHONE_NUMBER_INVALID");
        assert!(e.is("PHONE_*"));
        assert!(e.is("*_INVALID"));
        assert!(!e.is("PHONE_MIGRATE"));
    }
}
