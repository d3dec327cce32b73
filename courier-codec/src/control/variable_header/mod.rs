//! Variable header in MQTT
use std::{io, string::FromUtf8Error};

use crate::common::{
    topic_name::{TopicNameDecodeError, TopicNameError},
    ConnectAckFlagsError, ConnectFlagsError, ProtocolLevelError,
};

pub use self::connect_ret_code::ConnectReturnCode;

mod connect_ret_code;

/// Errors while decoding variable header
#[derive(Debug, thiserror::Error)]
pub enum VariableHeaderError {
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error(transparent)]
    FromUtf8Error(#[from] FromUtf8Error),
    #[error(transparent)]
    TopicNameError(#[from] TopicNameError),
    #[error("invalid protocol name ({0})")]
    InvalidProtocolName(String),
    #[error(transparent)]
    InvalidProtocolLevel(#[from] ProtocolLevelError),
    #[error(transparent)]
    InvalidConnectFlags(#[from] ConnectFlagsError),
    #[error(transparent)]
    InvalidConnackFlags(#[from] ConnectAckFlagsError),
    #[error("invalid connect return code ({0})")]
    InvalidConnectReturnCode(u8),
    #[error("packet identifier must not be zero")]
    ZeroPacketIdentifier,
}

impl From<TopicNameDecodeError> for VariableHeaderError {
    fn from(err: TopicNameDecodeError) -> Self {
        match err {
            TopicNameDecodeError::IoError(e) => VariableHeaderError::IoError(e),
            TopicNameDecodeError::InvalidTopicName(e) => VariableHeaderError::TopicNameError(e),
        }
    }
}
