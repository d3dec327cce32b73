//! UNSUBSCRIBE

use std::{
    fmt::Display,
    io::{self, Read},
};

use crate::{
    common::{
        packet::DecodablePacket,
        topic_filter::{TopicFilterDecodeError, TopicFilterError},
        Decodable, Encodable, PacketIdentifier, TopicFilter,
    },
    control::{ControlType, FixedHeader, PacketType},
    packet::PacketError,
};

/// `UNSUBSCRIBE` packet, restricted to a single topic filter
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct UnsubscribePacket {
    fixed_header: FixedHeader,
    packet_identifier: PacketIdentifier,
    topic_filter: TopicFilter,
}

encodable_packet!(UnsubscribePacket(packet_identifier, topic_filter));

impl UnsubscribePacket {
    pub fn new(pkid: u16, topic_filter: TopicFilter) -> Self {
        let mut pkt = Self {
            fixed_header: FixedHeader::new(PacketType::with_default(ControlType::Unsubscribe), 0),
            packet_identifier: PacketIdentifier(pkid),
            topic_filter,
        };
        pkt.fix_header_remaining_len();
        pkt
    }

    pub fn packet_identifier(&self) -> u16 {
        self.packet_identifier.0
    }

    pub fn set_packet_identifier(&mut self, pkid: u16) {
        self.packet_identifier.0 = pkid;
    }

    pub fn topic_filter(&self) -> &TopicFilter {
        &self.topic_filter
    }
}

impl DecodablePacket for UnsubscribePacket {
    type DecodePacketError = UnsubscribePacketError;
    type F = FixedHeader;
    type Error = PacketError<Self>;

    fn decode_packet<R: Read>(reader: &mut R, fixed_header: Self::F) -> Result<Self, Self::Error> {
        let packet_identifier: PacketIdentifier = PacketIdentifier::decode(reader)?;
        if fixed_header.remaining_length <= packet_identifier.encoded_length() {
            return Err(PacketError::PayloadError(UnsubscribePacketError::TopicCount));
        }

        let topic_filter = TopicFilter::decode(reader)
            .map_err(|e| PacketError::PayloadError(UnsubscribePacketError::from(e)))?;

        if packet_identifier.encoded_length() + topic_filter.encoded_length()
            != fixed_header.remaining_length
        {
            return Err(PacketError::PayloadError(UnsubscribePacketError::TopicCount));
        }

        Ok(Self {
            fixed_header,
            packet_identifier,
            topic_filter,
        })
    }
}

impl Display for UnsubscribePacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{fixed_header: {}, packet_identifier: {}, topic_filter: {}}}",
            self.fixed_header, self.packet_identifier, self.topic_filter
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UnsubscribePacketError {
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error(transparent)]
    TopicFilterError(#[from] TopicFilterError),
    #[error("unsubscribe must carry exactly one topic filter")]
    TopicCount,
}

impl From<TopicFilterDecodeError> for UnsubscribePacketError {
    fn from(e: TopicFilterDecodeError) -> Self {
        match e {
            TopicFilterDecodeError::IoError(e) => e.into(),
            TopicFilterDecodeError::InvalidTopicFilter(e) => e.into(),
        }
    }
}
