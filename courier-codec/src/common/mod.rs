//! Types shared by every control packet: the encode/decode traits, QoS,
//! topic names and filters, and the building blocks of variable headers.

pub use self::{
    encodable::{Decodable, Encodable, VarBytes, VarInt, MAX_VAR_INT},
    qos::{QoSWithPacketIdentifier, QualityOfService},
    topic_filter::{TopicFilter, TopicFilterDecodeError, TopicFilterError},
    topic_name::{TopicName, TopicNameDecodeError, TopicNameError},
    variable_header::*,
};

pub mod encodable;
pub mod packet;
pub mod qos;
pub mod topic_filter;
pub mod topic_name;
pub mod variable_header;

/// Character used to separate each level within a topic tree and provide a hierarchical structure.
pub const LEVEL_SEP: char = '/';
/// Wildcard character that matches only one topic level.
pub const MATCH_ONE_CHAR: char = '+';
/// Wildcard character that matches any number of levels within a topic.
pub const MATCH_ALL_CHAR: char = '#';
/// The &str version of `MATCH_ONE_CHAR`
pub const MATCH_ONE_STR: &str = "+";
/// The &str version of `MATCH_ALL_CHAR`
pub const MATCH_ALL_STR: &str = "#";
