//! Plaintext message framing.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A 64-bit message identifier.
///
/// The upper 32 bits are derived from the current Unix time; the lower 32
/// bits carry an intra-second counter shifted left by two (the two least
/// significant bits are zero for client messages).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Generate a new message ID using the system clock.
    ///
    /// Call this through a session so the counter is properly sequenced.
    pub(crate) fn generate(counter: u32) -> Self {
        let unix_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self((unix_secs << 32) | (u64::from(counter) << 2))
    }
}

/// Errors from [`Message::from_plaintext_bytes`].
#[derive(Clone, Debug, PartialEq)]
pub enum ParseError {
    /// Fewer bytes than the fixed plaintext header.
    TooShort,
    /// The frame's `auth_key_id` was not zero — it is a sealed frame.
    NotPlaintext,
    /// The length field disagrees with the actual body size.
    LengthMismatch { declared: usize, actual: usize },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "plaintext frame shorter than its header"),
            Self::NotPlaintext => write!(f, "auth_key_id is non-zero"),
            Self::LengthMismatch { declared, actual } => {
                write!(f, "length field says {declared}, body has {actual} bytes")
            }
        }
    }
}
impl std::error::Error for ParseError {}

/// A plaintext message, used only during the key exchange.
#[derive(Debug)]
pub struct Message {
    /// Unique identifier for this message.
    pub id: MessageId,
    /// The serialized TL body (constructor ID + fields).
    pub body: Vec<u8>,
}

impl Message {
    /// Construct a new plaintext message.
    pub fn plaintext(id: MessageId, body: Vec<u8>) -> Self {
        Self { id, body }
    }

    /// Serialize into the plaintext wire format:
    ///
    /// ```text
    /// auth_key_id:long  (0 for plaintext)
    /// message_id:long
    /// message_data_length:int
    /// message_data:bytes
    /// ```
    pub fn to_plaintext_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + 8 + 4 + self.body.len());
        buf.extend(0i64.to_le_bytes());
        buf.extend(self.id.0.to_le_bytes());
        buf.extend((self.body.len() as u32).to_le_bytes());
        buf.extend(&self.body);
        buf
    }

    /// Parse a plaintext frame received from the transport.
    pub fn from_plaintext_bytes(raw: &[u8]) -> Result<Self, ParseError> {
        if raw.len() < 20 {
            return Err(ParseError::TooShort);
        }
        if raw[..8] != [0u8; 8] {
            return Err(ParseError::NotPlaintext);
        }
        let id = u64::from_le_bytes(raw[8..16].try_into().unwrap());
        let declared = u32::from_le_bytes(raw[16..20].try_into().unwrap()) as usize;
        let actual = raw.len() - 20;
        if declared != actual {
            return Err(ParseError::LengthMismatch { declared, actual });
        }
        Ok(Self { id: MessageId(id), body: raw[20..].to_vec() })
    }
}
