//! Length-prefixed framing.
//!
//! Every message is a 4-byte big-endian length followed by exactly that many
//! payload bytes. A zero length is a valid empty message. There is no resync
//! marker, so an oversized length is fatal for the connection.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Hard upper bound for a frame payload (16 MiB).
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const HEADER_LEN: usize = 4;

/// Error type for frame I/O.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The peer closed the stream on a frame boundary.
    #[error("connection closed")]
    Closed,
    /// Declared or outgoing length is above the limit.
    #[error("frame length {len} exceeds limit {max}")]
    TooLarge { len: usize, max: usize },
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

impl FrameError {
    /// Protocol violations, as opposed to the stream going away.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, FrameError::TooLarge { .. })
    }
}

/// Read one frame, blocking until the whole payload is available.
///
/// Short reads are retried; only end-of-stream or an I/O error stops the read.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            return Err(if filled == 0 {
                FrameError::Closed
            } else {
                FrameError::Io(io::ErrorKind::UnexpectedEof.into())
            });
        }
        filled += n;
    }

    let len = u32::from_be_bytes(header) as usize;
    if len == 0 {
        return Ok(Vec::new());
    }
    if len > max_len {
        return Err(FrameError::TooLarge { len, max: max_len });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Write one frame; returns once prefix and payload are fully flushed.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    if payload.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let header = (payload.len() as u32).to_be_bytes();
    writer.write_all(&header).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
