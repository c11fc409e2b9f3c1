//! Length-prefixed framing.
//!
//! Every frame is a 4-byte big-endian length followed by exactly that many
//! payload bytes. The length is validated before the payload buffer is
//! allocated, so a peer can't make us reserve more than `max_len` bytes.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::TransportError;

/// Size of the length prefix in bytes.
pub const HEADER_LEN: usize = 4;

/// Default upper bound on a single frame's payload.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// Reads one frame from `reader`.
///
/// Returns `Ok(None)` if the stream ends cleanly before a new frame
/// starts. A stream that ends inside a frame is a receive error.
pub async fn read_frame<R>(
    reader: &mut R,
    max_len: usize,
) -> Result<Option<Vec<u8>>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = reader
            .read(&mut header[filled..])
            .await
            .map_err(TransportError::ReceiveFailed)?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(TransportError::ReceiveFailed(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended inside a frame header",
            )));
        }
        filled += n;
    }

    let len = u32::from_be_bytes(header) as usize;
    if len == 0 {
        return Err(TransportError::EmptyFrame);
    }
    if len > max_len {
        return Err(TransportError::FrameTooLarge { len, max: max_len });
    }

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(TransportError::ReceiveFailed)?;
    Ok(Some(payload))
}

/// Writes `payload` as one frame and flushes.
pub async fn write_frame<W>(
    writer: &mut W,
    payload: &[u8],
    max_len: usize,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    if payload.is_empty() {
        return Err(TransportError::EmptyFrame);
    }
    if payload.len() > max_len {
        return Err(TransportError::FrameTooLarge {
            len: payload.len(),
            max: max_len,
        });
    }
    let len = u32::try_from(payload.len()).map_err(|_| TransportError::FrameTooLarge {
        len: payload.len(),
        max: max_len,
    })?;

    writer
        .write_all(&len.to_be_bytes())
        .await
        .map_err(TransportError::SendFailed)?;
    writer
        .write_all(payload)
        .await
        .map_err(TransportError::SendFailed)?;
    writer.flush().await.map_err(TransportError::SendFailed)
}
