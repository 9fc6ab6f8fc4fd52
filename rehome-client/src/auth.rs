//! The key-exchange driver: one throwaway plaintext connection per exchange.

use std::time::Duration;

use rehome_mtproto::{handshake, Message, PlainSession};
use rehome_tl::{types, Deserializable};

use crate::errors::InvocationError;
use crate::transport::FramedStream;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// Perform a full key exchange against `addr` and return the new key.
///
/// Opens its own connection and discards it afterwards — the caller starts
/// the real session separately, with the key. `addr` must be the
/// post-reconciliation endpoint for `dc_id`; this function trusts it.
pub(crate) async fn create_key(
    dc_id: i32,
    test_mode: bool,
    addr: &str,
) -> Result<[u8; 256], InvocationError> {
    tracing::debug!(dc_id, addr, "key exchange start");

    let addr = addr.to_string();
    let fut = async move {
        let mut stream = FramedStream::connect(&addr).await?;
        let mut plain = PlainSession::new();

        let (req, s1) = handshake::step1(dc_id, test_mode);
        stream.send(&plain.pack(&req).to_plaintext_bytes()).await?;
        let server_nonce: types::DhServerNonce = recv_plain(&mut stream).await?;

        let (req, s2) = handshake::step2(s1, server_nonce)?;
        stream.send(&plain.pack(&req).to_plaintext_bytes()).await?;
        let answer: rehome_tl::enums::DhAnswer = recv_plain(&mut stream).await?;

        let done = handshake::finish(s2, answer)?;
        stream.shutdown().await;
        Ok::<_, InvocationError>(done.auth_key)
    };

    // A silent server must fail the exchange, not hang the migration cycle.
    let key = tokio::time::timeout(HANDSHAKE_TIMEOUT, fut)
        .await
        .map_err(|_| {
            InvocationError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("key exchange with DC{dc_id} timed out"),
            ))
        })??;

    tracing::debug!(dc_id, "key exchange complete");
    Ok(key)
}

async fn recv_plain<T: Deserializable>(stream: &mut FramedStream) -> Result<T, InvocationError> {
    let raw = stream.recv().await?;
    let msg = Message::from_plaintext_bytes(&raw)
        .map_err(|e| InvocationError::Protocol(e.to_string()))?;
    T::from_bytes(&msg.body).map_err(Into::into)
}
