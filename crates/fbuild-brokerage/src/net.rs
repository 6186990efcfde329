//! Framed async TCP I/O against the coordinator.
//!
//! Wire format: `u32 length prefix (big-endian) + bincode(message)` in
//! both directions. Frames larger than
//! [`DEFAULT_MAX_MESSAGE_SIZE`](fbuild_proto::defaults::DEFAULT_MAX_MESSAGE_SIZE)
//! are rejected to protect against corrupt length prefixes.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use fbuild_proto::defaults::DEFAULT_MAX_MESSAGE_SIZE;
use fbuild_proto::error::{BrokerageError, BrokerageResult};

/// Connect to `addr:port`, bounded by `timeout`.
pub async fn connect_with_timeout(
    addr: &str,
    port: u16,
    timeout: Duration,
) -> BrokerageResult<TcpStream> {
    let target = format!("{}:{}", addr, port);
    debug!("connecting to {}", target);

    let stream = tokio::time::timeout(timeout, TcpStream::connect(&target))
        .await
        .map_err(|_| BrokerageError::CoordinatorUnreachable)?
        .map_err(|_| BrokerageError::CoordinatorUnreachable)?;

    stream.set_nodelay(true).ok();
    Ok(stream)
}

/// Write one framed message.
pub async fn send_msg<T: Serialize>(stream: &mut TcpStream, msg: &T) -> BrokerageResult<()> {
    let data = bincode::serialize(msg).map_err(|_| BrokerageError::ProtocolError)?;

    stream
        .write_u32(data.len() as u32)
        .await
        .map_err(|_| BrokerageError::NetworkError)?;
    stream
        .write_all(&data)
        .await
        .map_err(|_| BrokerageError::NetworkError)?;

    Ok(())
}

/// Read one framed message.
pub async fn read_msg<T: DeserializeOwned>(stream: &mut TcpStream) -> BrokerageResult<T> {
    let len = stream
        .read_u32()
        .await
        .map_err(|_| BrokerageError::NetworkError)? as usize;

    if len > DEFAULT_MAX_MESSAGE_SIZE {
        return Err(BrokerageError::ProtocolError);
    }

    let mut buf = vec![0u8; len];
    stream
        .read_exact(&mut buf)
        .await
        .map_err(|_| BrokerageError::NetworkError)?;

    bincode::deserialize(&buf).map_err(|_| BrokerageError::ProtocolError)
}
