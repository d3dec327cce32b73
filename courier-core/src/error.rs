use std::{io, time::Duration};

use courier_codec::{
    common::{TopicFilterError, TopicNameError},
    control::variable_header::ConnectReturnCode,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O: {0}")]
    Io(#[from] io::Error),
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error(transparent)]
    TopicName(#[from] TopicNameError),
    #[error(transparent)]
    TopicFilter(#[from] TopicFilterError),
    #[error("not connected")]
    NotConnected,
    #[error("already connected")]
    AlreadyConnected,
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
    #[error("connection refused: {0}")]
    ConnectionRefused(ConnectReturnCode),
    #[error("no CONNACK within {0:?}")]
    ConnackTimeout(Duration),
    #[error("connection lost")]
    ConnectionLost,
    #[error("packet #{0} exhausted its retries")]
    RetriesExhausted(u16),
    #[cfg(feature = "tls")]
    #[error("rustls: {0}")]
    Rustls(#[from] rustls::Error),
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),
    #[error("outbound channel closed")]
    ChannelClosed,
}

/// Why a connection was torn down
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DisconnectReason {
    #[error("disconnect requested")]
    Requested,
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("transport closed by peer")]
    TransportClosed,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("broker did not answer PINGREQ")]
    KeepAliveTimeout,
    #[error("no CONNACK in time")]
    ConnackTimeout,
    #[error("connection refused: {0}")]
    ConnectionRefused(ConnectReturnCode),
}

impl DisconnectReason {
    /// Whether the orchestrator may try to bring the connection back
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            DisconnectReason::Requested | DisconnectReason::ConnectionRefused(_)
        )
    }
}

impl From<Error> for DisconnectReason {
    fn from(err: Error) -> Self {
        match err {
            Error::ChannelClosed | Error::ConnectionLost => DisconnectReason::TransportClosed,
            Error::Io(err) => DisconnectReason::Transport(err.to_string()),
            Error::ConnectionRefused(code) => DisconnectReason::ConnectionRefused(code),
            Error::ConnackTimeout(_) => DisconnectReason::ConnackTimeout,
            err => DisconnectReason::Transport(err.to_string()),
        }
    }
}
