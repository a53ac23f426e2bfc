//! Native messaging framing: a 32-bit length in native byte order, then UTF-8 JSON.

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::HostError;

/// Browsers refuse messages from a host larger than this.
pub const MAX_OUTGOING_LEN: usize = 1024 * 1024;

/// Browsers never send messages larger than this.
pub const MAX_INCOMING_LEN: usize = 64 * 1024 * 1024;

/// Read one frame body. `Ok(None)` on a clean EOF at a frame boundary.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, HostError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            return if filled == 0 {
                Ok(None)
            } else {
                Err(HostError::TruncatedFrame)
            };
        }
        filled += n;
    }

    let len = u32::from_ne_bytes(header) as usize;
    if len > MAX_INCOMING_LEN {
        return Err(HostError::FrameTooLarge {
            len,
            max: MAX_INCOMING_LEN,
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            HostError::TruncatedFrame
        } else {
            HostError::Io(e)
        }
    })?;
    Ok(Some(body))
}

/// Serialize `message` and write it as one frame.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), HostError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(message)?;
    if body.len() > MAX_OUTGOING_LEN {
        return Err(HostError::FrameTooLarge {
            len: body.len(),
            max: MAX_OUTGOING_LEN,
        });
    }

    writer.write_all(&(body.len() as u32).to_ne_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
