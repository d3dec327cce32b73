//! SUBSCRIBE

use std::{
    fmt::Display,
    io::{self, Read, Write},
};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::{
    common::{
        packet::DecodablePacket,
        topic_filter::{TopicFilterDecodeError, TopicFilterError},
        Decodable, Encodable, PacketIdentifier, QualityOfService, TopicFilter,
    },
    control::{ControlType, FixedHeader, PacketType},
    packet::PacketError,
};

/// `SUBSCRIBE` packet, restricted to a single topic filter
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct SubscribePacket {
    fixed_header: FixedHeader,
    packet_identifier: PacketIdentifier,
    payload: SubscribePacketPayload,
}

encodable_packet!(SubscribePacket(packet_identifier, payload));

impl SubscribePacket {
    pub fn new(pkid: u16, topic_filter: TopicFilter, qos: QualityOfService) -> Self {
        let mut pkt = Self {
            fixed_header: FixedHeader::new(PacketType::with_default(ControlType::Subscribe), 0),
            packet_identifier: PacketIdentifier(pkid),
            payload: SubscribePacketPayload { topic_filter, qos },
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
        &self.payload.topic_filter
    }

    /// Requested maximum QoS
    pub fn qos(&self) -> QualityOfService {
        self.payload.qos
    }
}

impl DecodablePacket for SubscribePacket {
    type DecodePacketError = SubscribePacketError;
    type F = FixedHeader;
    type Error = PacketError<Self>;

    fn decode_packet<R: Read>(reader: &mut R, fixed_header: Self::F) -> Result<Self, Self::Error> {
        let packet_identifier: PacketIdentifier = PacketIdentifier::decode(reader)?;
        let payload_len = fixed_header
            .remaining_length
            .checked_sub(packet_identifier.encoded_length())
            .ok_or(PacketError::InvalidRemainingLength(
                fixed_header.packet_type,
                fixed_header.remaining_length,
            ))?;
        let payload = SubscribePacketPayload::decode_with(reader, payload_len)
            .map_err(PacketError::PayloadError)?;
        Ok(Self {
            fixed_header,
            packet_identifier,
            payload,
        })
    }
}

impl Display for SubscribePacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{fixed_header: {}, packet_identifier: {}, topic_filter: {}, qos: {}}}",
            self.fixed_header, self.packet_identifier, self.payload.topic_filter, self.payload.qos
        )
    }
}

#[derive(Debug, Eq, PartialEq, Clone)]
struct SubscribePacketPayload {
    topic_filter: TopicFilter,
    qos: QualityOfService,
}

impl Encodable for SubscribePacketPayload {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<(), io::Error> {
        self.topic_filter.encode(writer)?;
        writer.write_u8(self.qos as u8)
    }

    fn encoded_length(&self) -> u32 {
        self.topic_filter.encoded_length() + 1
    }
}

impl Decodable for SubscribePacketPayload {
    type Error = SubscribePacketError;
    type Cond = u32;

    fn decode_with<R: Read>(reader: &mut R, payload_len: u32) -> Result<Self, Self::Error> {
        if payload_len == 0 {
            return Err(SubscribePacketError::TopicCount);
        }

        let topic_filter = TopicFilter::decode(reader)?;
        // upper six bits are reserved
        let qos = QualityOfService::try_from(reader.read_u8()?)
            .map_err(|_| SubscribePacketError::InvalidQualityOfService)?;

        if topic_filter.encoded_length() + 1 != payload_len {
            return Err(SubscribePacketError::TopicCount);
        }

        Ok(Self { topic_filter, qos })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubscribePacketError {
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error("invalid quality of service")]
    InvalidQualityOfService,
    #[error(transparent)]
    TopicFilterError(#[from] TopicFilterError),
    #[error("subscribe must carry exactly one topic filter")]
    TopicCount,
}

impl From<TopicFilterDecodeError> for SubscribePacketError {
    fn from(e: TopicFilterDecodeError) -> Self {
        match e {
            TopicFilterDecodeError::IoError(e) => e.into(),
            TopicFilterDecodeError::InvalidTopicFilter(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use crate::common::encodable::Encodable;

    use super::*;

    #[test]
    fn test_subscribe_packet_encode_hex() {
        let packet = SubscribePacket::new(
            40300,
            TopicFilter::new("a/b").unwrap(),
            QualityOfService::Level1,
        );

        let expected = b"\x82\x08\x9d\x6c\x00\x03\x61\x2f\x62\x01";

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();

        assert_eq!(&expected[..], &buf[..]);
    }

    #[test]
    fn test_subscribe_packet_decode_hex() {
        let encoded_data = b"\x82\x08\x9d\x6f\x00\x03\x61\x2f\x23\x02";

        let mut buf = Cursor::new(&encoded_data[..]);
        let packet = SubscribePacket::decode(&mut buf).unwrap();

        assert_eq!(packet.packet_identifier(), 40303);
        assert_eq!(packet.topic_filter().as_str(), "a/#");
        assert_eq!(packet.qos(), QualityOfService::Level2);
    }

    #[test]
    fn test_subscribe_packet_rejects_multiple_topics() {
        let encoded_data = b"\x82\x0e\x9d\x6c\x00\x03\x61\x2f\x62\x00\x00\x03\x61\x2f\x63\x00";
        assert!(matches!(
            SubscribePacket::decode(&mut Cursor::new(&encoded_data[..])),
            Err(PacketError::PayloadError(SubscribePacketError::TopicCount))
        ));
    }

    #[test]
    fn test_subscribe_packet_rejects_empty_payload() {
        let encoded_data = b"\x82\x02\x00\x01";
        assert!(matches!(
            SubscribePacket::decode(&mut Cursor::new(&encoded_data[..])),
            Err(PacketError::PayloadError(SubscribePacketError::TopicCount))
        ));
    }

    #[test]
    fn test_subscribe_packet_rejects_qos() {
        let encoded_data = b"\x82\x08\x00\x01\x00\x03\x61\x2f\x62\x03";
        assert!(matches!(
            SubscribePacket::decode(&mut Cursor::new(&encoded_data[..])),
            Err(PacketError::PayloadError(
                SubscribePacketError::InvalidQualityOfService
            ))
        ));
    }

    #[test]
    fn test_display_subscribe_packet() {
        let packet = SubscribePacket::new(
            2345,
            TopicFilter::new("test/topic/1").unwrap(),
            QualityOfService::Level2,
        );

        assert_eq!(
            packet.to_string(),
            "{fixed_header: {packet_type: SUBSCRIBE, remaining_length: 17}, packet_identifier: 2345, topic_filter: test/topic/1, qos: 2}"
        );
    }
}
