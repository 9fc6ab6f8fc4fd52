//! Plaintext session state, used only while a key exchange is in flight.

use rehome_tl::{RemoteCall, Serializable};

use crate::message::{Message, MessageId};

/// Allocates message IDs for the plaintext phase of a connection.
///
/// A `PlainSession` is cheap to create and is thrown away together with its
/// connection once the key exchange completes.
///
/// # Example
///
/// ```rust
/// use rehome_mtproto::PlainSession;
///
/// let mut session = PlainSession::new();
/// let (req, _state) = rehome_mtproto::handshake::step1(2, false);
/// let wire = session.pack(&req).to_plaintext_bytes();
/// // send `wire`…
/// ```
pub struct PlainSession {
    /// Monotonically increasing counter used to generate unique message IDs.
    msg_counter: u32,
}

impl PlainSession {
    /// Create a fresh session.
    pub fn new() -> Self {
        Self { msg_counter: 0 }
    }

    /// Allocate a new message ID.
    pub fn next_msg_id(&mut self) -> MessageId {
        self.msg_counter = self.msg_counter.wrapping_add(1);
        MessageId::generate(self.msg_counter)
    }

    /// Serialize an RPC function into a [`Message`] ready to send.
    ///
    /// The message body is just the TL-serialized `call`; the surrounding
    /// framing (auth_key_id, length) is applied in
    /// [`Message::to_plaintext_bytes`].
    pub fn pack<R: RemoteCall>(&mut self, call: &R) -> Message {
        let id = self.next_msg_id();
        Message::plaintext(id, call.to_bytes())
    }
}

impl Default for PlainSession {
    fn default() -> Self { Self::new() }
}
