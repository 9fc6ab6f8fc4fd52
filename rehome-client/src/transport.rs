//! Length-prefixed TCP framing.
//!
//! Every message is `[4-byte LE length][payload]`, in both directions and
//! for both plaintext and sealed traffic. Inbound frames are capped so a
//! corrupt length field cannot make the client allocate without bound.

use std::io;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Largest inbound frame this client will accept.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// A TCP stream carrying length-prefixed frames.
pub struct FramedStream {
    stream: TcpStream,
}

impl FramedStream {
    /// Connect to `addr`.
    pub async fn connect(addr: &str) -> io::Result<Self> {
        Ok(Self { stream: TcpStream::connect(addr).await? })
    }

    /// Wrap an already-connected stream (used by servers and tests).
    pub fn from_stream(stream: TcpStream) -> Self {
        Self { stream }
    }

    /// Send one frame.
    pub async fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(&(data.len() as u32).to_le_bytes()).await?;
        self.stream.write_all(data).await
    }

    /// Receive the next frame.
    pub async fn recv(&mut self) -> io::Result<Vec<u8>> {
        let mut len_buf = [0u8; 4];
        self.stream.read_exact(&mut len_buf).await?;
        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("inbound frame of {len} bytes exceeds the {MAX_FRAME_LEN} byte cap"),
            ));
        }
        let mut buf = vec![0u8; len];
        self.stream.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Close the write half. Tolerates a peer that already went away.
    pub async fn shutdown(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}
