//! Sealed session state, used for all traffic once a key exists.

use std::fmt;

use rehome_crypto::{open, seal, AuthKey, OpenError, Side};
use rehome_tl::{RemoteCall, Serializable};

use crate::message::MessageId;

// ─── Envelope ────────────────────────────────────────────────────────────────

/// The header carried inside every sealed frame.
///
/// ```text
/// session_id: i64
/// msg_id:     i64
/// seq_no:     i32
/// body_len:   i32
/// body:       [u8; body_len]
/// ```
///
/// Public on both ends: clients pack it through [`SealedSession`], servers
/// build their replies with it directly.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    /// Random identifier shared by every message of one session.
    pub session_id: i64,
    /// Message identifier; for responses, servers echo the request's id in
    /// the `rpc_result` body, not here.
    pub msg_id: i64,
    /// MTProto-style sequence number (2·n+1 for content-related messages).
    pub seq_no: i32,
    /// The serialized TL body.
    pub body: Vec<u8>,
}

impl Envelope {
    /// Serialize the envelope. The result is what gets sealed; random
    /// padding is appended by the sealing layer, which is why the length
    /// field is load-bearing.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(24 + self.body.len());
        buf.extend(self.session_id.to_le_bytes());
        buf.extend(self.msg_id.to_le_bytes());
        buf.extend(self.seq_no.to_le_bytes());
        buf.extend((self.body.len() as u32).to_le_bytes());
        buf.extend(&self.body);
        buf
    }

    /// Parse an envelope from an opened (decrypted, still padded) frame.
    pub fn from_bytes(plain: &[u8]) -> Result<Self, EnvelopeError> {
        if plain.len() < 24 {
            return Err(EnvelopeError::TooShort);
        }
        let session_id = i64::from_le_bytes(plain[..8].try_into().unwrap());
        let msg_id = i64::from_le_bytes(plain[8..16].try_into().unwrap());
        let seq_no = i32::from_le_bytes(plain[16..20].try_into().unwrap());
        let body_len = u32::from_le_bytes(plain[20..24].try_into().unwrap()) as usize;
        if 24 + body_len > plain.len() {
            return Err(EnvelopeError::LengthOverrun {
                declared: body_len,
                available: plain.len() - 24,
            });
        }
        Ok(Self {
            session_id,
            msg_id,
            seq_no,
            body: plain[24..24 + body_len].to_vec(),
        })
    }
}

/// Errors from [`Envelope::from_bytes`].
#[derive(Clone, Debug, PartialEq)]
pub enum EnvelopeError {
    /// Fewer bytes than the fixed header.
    TooShort,
    /// The length field points past the end of the plaintext.
    LengthOverrun {
        /// What the header declared.
        declared: usize,
        /// What the plaintext actually held.
        available: usize,
    },
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "envelope shorter than its header"),
            Self::LengthOverrun { declared, available } => {
                write!(f, "length field says {declared}, only {available} bytes available")
            }
        }
    }
}
impl std::error::Error for EnvelopeError {}

// ─── Unpack errors ───────────────────────────────────────────────────────────

/// Errors from [`SealedSession::unpack`].
#[derive(Clone, Debug, PartialEq)]
pub enum UnpackError {
    /// The sealing layer rejected the frame.
    Crypto(OpenError),
    /// The decrypted envelope was malformed.
    Envelope(EnvelopeError),
    /// The frame belongs to a different session (replay or stale socket).
    SessionMismatch,
}

impl fmt::Display for UnpackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crypto(e) => write!(f, "crypto: {e}"),
            Self::Envelope(e) => write!(f, "envelope: {e}"),
            Self::SessionMismatch => write!(f, "session_id mismatch"),
        }
    }
}
impl std::error::Error for UnpackError {}

// ─── SealedSession ───────────────────────────────────────────────────────────

/// Session state for a single sealed connection.
///
/// Wraps the authorization key and tracks per-session counters (session_id,
/// seq_no, last msg_id). [`pack`](Self::pack) seals outgoing requests,
/// [`unpack`](Self::unpack) opens incoming server frames. Replaced wholesale
/// when the client migrates; never reused across connections.
pub struct SealedSession {
    auth_key: AuthKey,
    session_id: i64,
    sequence: i32,
    counter: u32,
    last_msg_id: u64,
}

impl SealedSession {
    /// Create a fresh session bound to an authorization key.
    pub fn new(auth_key: [u8; 256]) -> Self {
        let mut rnd = [0u8; 8];
        getrandom::getrandom(&mut rnd).expect("getrandom");
        Self {
            auth_key: AuthKey::from_bytes(auth_key),
            session_id: i64::from_le_bytes(rnd),
            sequence: 0,
            counter: 0,
            last_msg_id: 0,
        }
    }

    /// The random identifier of this session.
    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    /// The key bytes backing this session (for persistence).
    pub fn auth_key_bytes(&self) -> [u8; 256] {
        self.auth_key.to_bytes()
    }

    fn next_msg_id(&mut self) -> MessageId {
        self.counter = self.counter.wrapping_add(1);
        let mut id = MessageId::generate(self.counter).0;
        // Strictly monotonic even when the clock stalls or steps back.
        if id <= self.last_msg_id {
            id = self.last_msg_id + 4;
        }
        self.last_msg_id = id;
        MessageId(id)
    }

    /// Next content-related seq_no (odd) and advance the counter.
    fn next_seq_no(&mut self) -> i32 {
        let n = self.sequence * 2 + 1;
        self.sequence += 1;
        n
    }

    /// Serialize and seal an RPC function into a wire-ready frame.
    ///
    /// Also returns the allocated [`MessageId`] so the caller can match the
    /// eventual `rpc_result` against it.
    pub fn pack<R: RemoteCall>(&mut self, call: &R) -> (Vec<u8>, MessageId) {
        let msg_id = self.next_msg_id();
        let envelope = Envelope {
            session_id: self.session_id,
            msg_id: msg_id.0 as i64,
            seq_no: self.next_seq_no(),
            body: call.to_bytes(),
        };
        (seal(&self.auth_key, Side::Client, &envelope.to_bytes()), msg_id)
    }

    /// Open a sealed server frame and parse its envelope.
    pub fn unpack(&self, frame: &[u8]) -> Result<Envelope, UnpackError> {
        let plain = open(&self.auth_key, Side::Server, frame).map_err(UnpackError::Crypto)?;
        let envelope = Envelope::from_bytes(&plain).map_err(UnpackError::Envelope)?;
        if envelope.session_id != self.session_id {
            return Err(UnpackError::SessionMismatch);
        }
        Ok(envelope)
    }
}
