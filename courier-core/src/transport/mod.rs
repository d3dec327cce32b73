//! Byte-stream transports a [`Client`](crate::Client) can run on.

use std::{future::Future, io};

use tokio::io::{AsyncRead, AsyncWrite};

pub use self::tcp::TcpConnector;
#[cfg(feature = "tls")]
pub use self::tls::TlsConnector;

pub mod tcp;
#[cfg(feature = "tls")]
pub mod tls;

/// Opens a fresh stream to the broker, called again on every reconnect
pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    fn connect(&self) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}
