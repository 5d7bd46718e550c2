//! Wire framing: a 4-byte big-endian length prefix followed by one JSON frame.

use enclave_core::{OperationRequest, OperationResponse};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{BridgeError, BridgeResult};

/// Largest frame either side accepts (10 MiB).
pub const MAX_FRAME_LEN: usize = 10_485_760;

/// Bridge protocol revision sent in the handshake.
pub const BRIDGE_VERSION: u32 = 1;

/// One message on a bridge connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// First frame from the client.
    Hello {
        /// Shared session token, if the client has one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        /// Client protocol revision.
        version: u32,
    },
    /// Server accepted the handshake.
    Welcome {
        /// Project root the server's engine is confined to.
        root: String,
        /// Server protocol revision.
        version: u32,
    },
    /// Server refused the handshake; the connection closes after this frame.
    Reject {
        /// Why.
        reason: String,
    },
    /// An operation for the remote engine.
    Request {
        /// The request.
        request: OperationRequest,
    },
    /// The remote engine's answer.
    Response {
        /// The response.
        response: OperationResponse,
    },
    /// Heartbeat probe.
    Ping {
        /// Echoed back in the matching pong.
        nonce: u64,
    },
    /// Heartbeat answer.
    Pong {
        /// Nonce of the ping being answered.
        nonce: u64,
    },
}

/// Write one frame.
///
/// # Errors
///
/// Returns [`BridgeError::FrameTooLarge`] if the encoded frame exceeds
/// [`MAX_FRAME_LEN`], or an I/O error from the writer.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> BridgeResult<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = serde_json::to_vec(frame)?;
    if bytes.len() > MAX_FRAME_LEN {
        return Err(BridgeError::FrameTooLarge {
            len: bytes.len(),
            max: MAX_FRAME_LEN,
        });
    }
    let len = u32::try_from(bytes.len()).map_err(|_| BridgeError::FrameTooLarge {
        len: bytes.len(),
        max: MAX_FRAME_LEN,
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. Returns `None` on a clean end of stream before a frame
/// starts.
///
/// # Errors
///
/// Returns [`BridgeError::FrameTooLarge`] for an oversized length prefix,
/// [`BridgeError::Codec`] for undecodable JSON, or an I/O error if the stream
/// ends mid-frame.
pub async fn read_frame<R>(reader: &mut R) -> BridgeResult<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {},
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = usize::try_from(u32::from_be_bytes(len_buf)).unwrap_or(usize::MAX);
    if len > MAX_FRAME_LEN {
        return Err(BridgeError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(serde_json::from_slice(&payload)?))
}
