//! Topic filter

use std::{
    fmt::Display,
    io::{self, Read, Write},
    ops::Deref,
};

use crate::common::{Decodable, Encodable, LEVEL_SEP, MATCH_ALL_STR, MATCH_ONE_STR};

#[inline]
fn is_invalid_topic_filter(topic: &str) -> bool {
    if topic.is_empty() || topic.len() > u16::MAX as usize {
        return true;
    }

    let mut found_hash = false;
    for member in topic.split(LEVEL_SEP) {
        if found_hash {
            return true;
        }

        match member {
            MATCH_ALL_STR => found_hash = true,
            MATCH_ONE_STR => {}
            _ => {
                if member.contains(['#', '+']) {
                    return true;
                }
            }
        }
    }

    false
}

/// Topic filter carried by `SUBSCRIBE` and `UNSUBSCRIBE` packets
///
/// <http://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718106>
#[derive(Debug, Eq, PartialEq, Clone, Hash, Ord, PartialOrd)]
pub struct TopicFilter(String);

impl TopicFilter {
    /// Creates a new topic filter from string
    /// Return error if it is not a valid topic filter
    pub fn new<S: Into<String>>(topic: S) -> Result<Self, TopicFilterError> {
        let topic = topic.into();
        if is_invalid_topic_filter(&topic) {
            Err(TopicFilterError(topic))
        } else {
            Ok(Self(topic))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<TopicFilter> for String {
    fn from(topic: TopicFilter) -> Self {
        topic.0
    }
}

impl Deref for TopicFilter {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Encodable for TopicFilter {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<(), io::Error> {
        (&self.0[..]).encode(writer)
    }

    fn encoded_length(&self) -> u32 {
        (&self.0[..]).encoded_length()
    }
}

impl Decodable for TopicFilter {
    type Error = TopicFilterDecodeError;
    type Cond = ();

    fn decode_with<R: Read>(reader: &mut R, _rest: ()) -> Result<Self, Self::Error> {
        let topic_filter = String::decode(reader)?;
        Ok(Self::new(topic_filter)?)
    }
}

impl Display for TopicFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid topic filter ({0})")]
pub struct TopicFilterError(pub String);

/// Errors while parsing topic filters
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub enum TopicFilterDecodeError {
    IoError(#[from] io::Error),
    InvalidTopicFilter(#[from] TopicFilterError),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn topic_filter_validate() {
        TopicFilter::new("#").unwrap();
        TopicFilter::new("sport/tennis/player1").unwrap();
        TopicFilter::new("sport/tennis/player1/#").unwrap();
        TopicFilter::new("+").unwrap();
        TopicFilter::new("+/tennis/#").unwrap();
        TopicFilter::new("sport/+/player1").unwrap();
        TopicFilter::new("+/+").unwrap();
        TopicFilter::new("$SYS/#").unwrap();

        assert!(TopicFilter::new("").is_err());
        assert!(TopicFilter::new("sport/tennis#").is_err());
        assert!(TopicFilter::new("sport/tennis/#/ranking").is_err());
        assert!(TopicFilter::new("sport+").is_err());
    }
}
