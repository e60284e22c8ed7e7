//! Length-prefixed bincode frames.

use std::io::ErrorKind;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::domain::{PexMessage, TransportError, PEX_CHANNEL};

/// Frames larger than this are refused in both directions.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// A payload multiplexed on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    /// Channel byte.
    pub channel: u8,
    /// Encoded channel message.
    pub payload: Vec<u8>,
}

impl Packet {
    /// Wrap an exchange message.
    pub fn pex(msg: &PexMessage) -> Result<Self, TransportError> {
        Ok(Self {
            channel: PEX_CHANNEL,
            payload: bincode::serialize(msg)?,
        })
    }

    /// Decode an exchange message. `Ok(None)` for other channels.
    pub fn into_pex(self) -> Result<Option<PexMessage>, TransportError> {
        if self.channel != PEX_CHANNEL {
            return Ok(None);
        }
        Ok(Some(bincode::deserialize(&self.payload)?))
    }
}

/// Encode `value` and write it as one frame.
pub async fn write_frame<W, T>(
    writer: &mut W,
    value: &T,
    max_frame_size: usize,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = bincode::serialize(value)?;
    if bytes.len() > max_frame_size {
        return Err(TransportError::FrameTooLarge {
            size: bytes.len(),
            max: max_frame_size,
        });
    }

    let len = bytes.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read and decode one frame. `Ok(None)` on a clean end of stream.
pub async fn read_frame<R, T>(reader: &mut R, max_frame_size: usize) -> Result<Option<T>, TransportError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_frame_size {
        return Err(TransportError::FrameTooLarge {
            size: len,
            max: max_frame_size,
        });
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(Some(bincode::deserialize(&buf)?))
}
