//! Topic name

use std::{
    fmt::Display,
    io::{self, Read, Write},
    ops::Deref,
    str::FromStr,
};

use crate::common::{Decodable, Encodable, MATCH_ALL_CHAR, MATCH_ONE_CHAR};

#[inline]
fn is_invalid_topic_name(topic_name: &str) -> bool {
    topic_name.len() > u16::MAX as usize
        || topic_name.contains([MATCH_ALL_CHAR, MATCH_ONE_CHAR])
}

/// Topic name used by `PUBLISH` packets and the will message.
///
/// Wildcards are rejected and the UTF-8 length must fit in 16 bits.
///
/// [MQTT v3.1.1](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718106)
#[derive(Debug, Eq, PartialEq, Clone, Hash, Ord, PartialOrd)]
pub struct TopicName(String);

impl TopicName {
    /// Creates a new topic name from string
    /// Return error if the string is not a valid topic name
    pub fn new<S: Into<String>>(topic_name: S) -> Result<Self, TopicNameError> {
        let topic_name = topic_name.into();
        if is_invalid_topic_name(&topic_name) {
            Err(TopicNameError(topic_name))
        } else {
            Ok(Self(topic_name))
        }
    }

    /// Topic names beginning with a '$' character are reserved for servers
    pub fn is_server_specific(&self) -> bool {
        self.0.starts_with('$')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<TopicName> for String {
    fn from(topic_name: TopicName) -> Self {
        topic_name.0
    }
}

impl FromStr for TopicName {
    type Err = TopicNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TopicName::new(s)
    }
}

impl Deref for TopicName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for TopicName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Encodable for TopicName {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<(), io::Error> {
        (&self.0[..]).encode(writer)
    }

    fn encoded_length(&self) -> u32 {
        (&self.0[..]).encoded_length()
    }
}

impl Decodable for TopicName {
    type Error = TopicNameDecodeError;
    type Cond = ();

    fn decode_with<R: Read>(reader: &mut R, _rest: ()) -> Result<Self, Self::Error> {
        let topic_name = String::decode(reader)?;
        Ok(Self::new(topic_name)?)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid topic name ({0})")]
pub struct TopicNameError(pub String);

/// Errors while parsing topic names
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub enum TopicNameDecodeError {
    IoError(#[from] io::Error),
    InvalidTopicName(#[from] TopicNameError),
}
