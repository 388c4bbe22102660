use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{PoolError, PoolResult};

/// Handshake byte: a pool slot was bound to this connection.
pub const SLOT_BOUND: u8 = b'1';

/// Handshake byte: the pool is exhausted. Advisory only — the connection
/// stays open, but operations will be rejected until a slot frees up for
/// a later connection.
pub const POOL_EXHAUSTED: u8 = b'0';

/// Maximum message size (16 MB)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Encode a message with a length prefix.
pub fn encode_message<T: Serialize>(msg: &T) -> PoolResult<Vec<u8>> {
    let payload = serde_json::to_vec(msg)?;
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(PoolError::MessageTooLarge);
    }
    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Write one framed message.
pub async fn write_message<W, T>(stream: &mut W, msg: &T) -> PoolResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let data = encode_message(msg)?;
    stream.write_all(&data).await?;
    stream.flush().await?;
    Ok(())
}

/// Read one framed payload. `Ok(None)` means the peer closed the
/// connection cleanly before the next frame.
pub async fn read_frame<R>(stream: &mut R) -> PoolResult<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let msg_len = u32::from_be_bytes(len_buf) as usize;
    if msg_len > MAX_MESSAGE_SIZE {
        return Err(PoolError::MessageTooLarge);
    }
    let mut payload = vec![0u8; msg_len];
    stream.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Read one framed message.
pub async fn read_message<R, T>(stream: &mut R) -> PoolResult<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    match read_frame(stream).await? {
        Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
        None => Ok(None),
    }
}
