//! A single sealed connection to one data center.

use std::time::Duration;

use rehome_mtproto::SealedSession;
use rehome_tl::{Cursor, Deserializable, RemoteCall};

use crate::errors::{InvocationError, MigrationSignal, Outcome, RpcError};
use crate::transport::FramedStream;

const RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// A live transport session, bound to `(dc_id, auth_key, address, port)`.
///
/// Replaced wholesale on migration — the client swaps the whole value under
/// its session lock, so no caller ever observes a half-replaced session.
pub(crate) struct Connection {
    dc_id: i32,
    stream: FramedStream,
    sess: SealedSession,
}

impl Connection {
    /// Open the transport and bind a fresh sealed session to `auth_key`.
    pub(crate) async fn connect(
        dc_id: i32,
        auth_key: [u8; 256],
        addr: &str,
    ) -> Result<Self, InvocationError> {
        let stream = FramedStream::connect(addr).await?;
        tracing::debug!(dc_id, addr, "session started");
        Ok(Self { dc_id, stream, sess: SealedSession::new(auth_key) })
    }

    pub(crate) fn dc_id(&self) -> i32 {
        self.dc_id
    }

    /// Issue one request and classify the reply.
    ///
    /// The three-way [`Outcome`] is the whole point: a migrate reply becomes
    /// data for the coordinator, not an error.
    pub(crate) async fn invoke<R: RemoteCall>(&mut self, req: &R) -> Outcome<Vec<u8>> {
        match tokio::time::timeout(RPC_TIMEOUT, self.invoke_inner(req)).await {
            Ok(outcome) => outcome,
            Err(_) => Outcome::Error(InvocationError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("RPC to DC{} timed out", self.dc_id),
            ))),
        }
    }

    async fn invoke_inner<R: RemoteCall>(&mut self, req: &R) -> Outcome<Vec<u8>> {
        let (wire, msg_id) = self.sess.pack(req);
        if let Err(e) = self.stream.send(&wire).await {
            return Outcome::Error(e.into());
        }

        loop {
            let frame = match self.stream.recv().await {
                Ok(frame) => frame,
                Err(e) => return Outcome::Error(e.into()),
            };
            let envelope = match self.sess.unpack(&frame) {
                Ok(envelope) => envelope,
                Err(e) => return Outcome::Error(e.into()),
            };
            let body = envelope.body;
            if body.len() < 4 {
                return Outcome::Error(InvocationError::Protocol("body shorter than a constructor id".into()));
            }

            match u32::from_le_bytes(body[..4].try_into().unwrap()) {
                rehome_tl::RPC_RESULT_ID => {
                    if body.len() < 12 {
                        return Outcome::Error(InvocationError::Protocol("rpc_result too short".into()));
                    }
                    let req_msg_id = i64::from_le_bytes(body[4..12].try_into().unwrap());
                    if req_msg_id != msg_id.0 as i64 {
                        tracing::debug!(req_msg_id, "skipping stale rpc_result");
                        continue;
                    }
                    return Outcome::Response(body[12..].to_vec());
                }
                rehome_tl::RPC_ERROR_ID => {
                    let mut cur = Cursor::from_slice(&body[4..]);
                    let parsed = i32::deserialize(&mut cur)
                        .and_then(|code| String::deserialize(&mut cur).map(|msg| (code, msg)));
                    let (code, message) = match parsed {
                        Ok(x) => x,
                        Err(e) => return Outcome::Error(e.into()),
                    };
                    let err = RpcError::from_wire(code, &message);
                    return match MigrationSignal::classify(&err) {
                        Some(signal) => Outcome::MigrationNeeded(signal),
                        None => Outcome::Error(InvocationError::Rpc(err)),
                    };
                }
                cid => {
                    return Outcome::Error(InvocationError::Protocol(format!(
                        "unexpected constructor id {cid:#010x}"
                    )));
                }
            }
        }
    }

    /// Gracefully tear the session down. Safe when the peer is already gone.
    pub(crate) async fn close(mut self) {
        self.stream.shutdown().await;
        tracing::debug!(dc_id = self.dc_id, "session stopped");
    }
}
