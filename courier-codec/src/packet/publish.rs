//! PUBLISH

use std::{fmt::Display, io::Read};

use crate::{
    common::{
        packet::DecodablePacket, qos::QoSWithPacketIdentifier, Decodable, Encodable,
        PacketIdentifier, TopicName,
    },
    control::{FixedHeader, PacketType, VariableHeaderError},
    packet::PacketError,
};

/// `PUBLISH` packet
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct PublishPacket {
    fixed_header: FixedHeader,
    topic_name: TopicName,
    packet_identifier: Option<PacketIdentifier>,
    payload: Vec<u8>,
}

encodable_packet!(PublishPacket(topic_name, packet_identifier, payload));

impl PublishPacket {
    pub fn new<P: Into<Vec<u8>>>(
        topic_name: TopicName,
        qos: QoSWithPacketIdentifier,
        payload: P,
    ) -> Self {
        let (qos, pkid) = qos.split();
        let mut pkt = Self {
            fixed_header: FixedHeader::new(PacketType::publish(qos), 0),
            topic_name,
            packet_identifier: pkid.map(PacketIdentifier),
            payload: payload.into(),
        };
        pkt.fix_header_remaining_len();
        pkt
    }

    /// Marks a retransmission, ignored for QoS 0
    pub fn set_dup(&mut self, dup: bool) {
        let dup = dup && self.packet_identifier.is_some();
        self.fixed_header
            .packet_type
            .update_flags(|flags| (flags & !0b1000) | ((dup as u8) << 3))
    }

    pub fn dup(&self) -> bool {
        self.fixed_header.packet_type.flags() & 0b1000 != 0
    }

    pub fn set_qos(&mut self, qos: QoSWithPacketIdentifier) {
        let (qos, pkid) = qos.split();
        self.fixed_header
            .packet_type
            .update_flags(|flags| (flags & !0b0110) | ((qos as u8) << 1));
        self.packet_identifier = pkid.map(PacketIdentifier);
        if pkid.is_none() {
            self.set_dup(false);
        }
        self.fix_header_remaining_len();
    }

    pub fn qos(&self) -> QoSWithPacketIdentifier {
        match self.packet_identifier {
            None => QoSWithPacketIdentifier::Level0,
            Some(pkid) => match (self.fixed_header.packet_type.flags() & 0b0110) >> 1 {
                1 => QoSWithPacketIdentifier::Level1(pkid.0),
                _ => QoSWithPacketIdentifier::Level2(pkid.0),
            },
        }
    }

    pub fn set_retain(&mut self, ret: bool) {
        self.fixed_header
            .packet_type
            .update_flags(|flags| (flags & !0b0001) | (ret as u8))
    }

    pub fn retain(&self) -> bool {
        self.fixed_header.packet_type.flags() & 0b0001 != 0
    }

    pub fn set_topic_name(&mut self, topic_name: TopicName) {
        self.topic_name = topic_name;
        self.fix_header_remaining_len();
    }

    pub fn topic_name(&self) -> &TopicName {
        &self.topic_name
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn set_payload<P: Into<Vec<u8>>>(&mut self, payload: P) {
        self.payload = payload.into();
        self.fix_header_remaining_len();
    }
}

impl DecodablePacket for PublishPacket {
    type DecodePacketError = std::convert::Infallible;
    type F = FixedHeader;
    type Error = PacketError<Self>;

    fn decode_packet<R: Read>(reader: &mut R, fixed_header: Self::F) -> Result<Self, Self::Error> {
        let topic_name = TopicName::decode(reader)?;

        let qos = (fixed_header.packet_type.flags() & 0b0110) >> 1;
        let packet_identifier = if qos > 0 {
            let pkid = PacketIdentifier::decode(reader)?;
            if pkid.0 == 0 {
                return Err(VariableHeaderError::ZeroPacketIdentifier.into());
            }
            Some(pkid)
        } else {
            None
        };

        let vhead_len = topic_name.encoded_length() + packet_identifier.encoded_length();
        let payload_len = fixed_header
            .remaining_length
            .checked_sub(vhead_len)
            .ok_or(PacketError::InvalidRemainingLength(
                fixed_header.packet_type,
                fixed_header.remaining_length,
            ))?;

        let payload = Vec::<u8>::decode_with(reader, Some(payload_len))?;

        Ok(Self {
            fixed_header,
            topic_name,
            packet_identifier,
            payload,
        })
    }
}

impl Display for PublishPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{fixed_header: {}, topic_name: {}",
            self.fixed_header, self.topic_name
        )?;
        match self.packet_identifier {
            Some(packet_identifier) => write!(f, ", packet_identifier: {packet_identifier}")?,
            None => write!(f, ", packet_identifier: None")?,
        };

        match std::str::from_utf8(&self.payload) {
            Ok(s) if s.chars().all(|c| c.is_ascii_graphic() || c == ' ') => {
                write!(f, ", payload: {s}")?;
            }
            _ => write!(f, ", payload: {} bytes", self.payload.len())?,
        };
        write!(f, "}}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::io::Cursor;

    use crate::common::{Decodable, Encodable};

    #[test]
    fn test_publish_packet_encode_hex() {
        let mut packet = PublishPacket::new(
            TopicName::new("a/b").unwrap(),
            QoSWithPacketIdentifier::Level1(40306),
            b"{\"msg\":\"hello, world!\"}",
        );

        packet.set_retain(true);

        let expected = b"\x33\x1e\x00\x03\x61\x2f\x62\x9d\x72\x7b\x22\x6d\x73\x67\x22\x3a\x22\x68\x65\x6c\x6c\x6f\x2c\x20\x77\x6f\x72\x6c\x64\x21\x22\x7d";

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();

        assert_eq!(&expected[..], &buf[..]);
    }

    #[test]
    fn test_publish_packet_decode_hex() {
        let encoded_data = b"\x30\x1c\x00\x03\x61\x2f\x62\x7b\x22\x6d\x73\x67\x22\x3a\x22\x68\x65\x6c\x6c\x6f\x2c\x20\x77\x6f\x72\x6c\x64\x21\x22\x7d";

        let mut buf = Cursor::new(&encoded_data[..]);
        let packet = PublishPacket::decode(&mut buf).unwrap();

        let expected = PublishPacket::new(
            TopicName::new("a/b").unwrap(),
            QoSWithPacketIdentifier::Level0,
            b"{\"msg\":\"hello, world!\"}",
        );

        assert_eq!(expected, packet);
    }

    #[test]
    fn test_publish_packet_dup_flag() {
        let mut packet = PublishPacket::new(
            TopicName::new("a/b").unwrap(),
            QoSWithPacketIdentifier::Level2(10),
            b"x".to_vec(),
        );
        assert!(!packet.dup());

        packet.set_dup(true);
        assert!(packet.dup());

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        assert_eq!(buf[0], 0x3C);

        let decoded = PublishPacket::decode(&mut Cursor::new(buf)).unwrap();
        assert!(decoded.dup());
        assert_eq!(decoded.qos(), QoSWithPacketIdentifier::Level2(10));

        packet.set_qos(QoSWithPacketIdentifier::Level0);
        assert!(!packet.dup());
    }

    #[test]
    fn test_publish_packet_topic_lengths() {
        for topic in ["".to_owned(), "t".to_owned(), "t".repeat(65535)] {
            for qos in [
                QoSWithPacketIdentifier::Level0,
                QoSWithPacketIdentifier::Level1(1),
                QoSWithPacketIdentifier::Level2(65535),
            ] {
                let packet = PublishPacket::new(TopicName::new(topic.clone()).unwrap(), qos, vec![]);

                let mut buf = Vec::new();
                packet.encode(&mut buf).unwrap();

                let decoded = PublishPacket::decode(&mut Cursor::new(buf)).unwrap();
                assert_eq!(packet, decoded);
            }
        }
    }

    #[test]
    fn test_publish_packet_rejects_zero_identifier() {
        let encoded_data = b"\x32\x07\x00\x03a/b\x00\x00";
        assert!(matches!(
            PublishPacket::decode(&mut Cursor::new(&encoded_data[..])),
            Err(PacketError::VariableHeaderError(
                VariableHeaderError::ZeroPacketIdentifier
            ))
        ));
    }

    #[test]
    fn test_publish_packet_rejects_short_remaining_length() {
        let encoded_data = b"\x30\x02\x00\x03a/b";
        assert!(matches!(
            PublishPacket::decode(&mut Cursor::new(&encoded_data[..])),
            Err(PacketError::InvalidRemainingLength(_, 2))
        ));
    }

    #[test]
    fn test_publish_packet_rejects_wildcard_topic() {
        let encoded_data = b"\x30\x05\x00\x03a/#";
        assert!(matches!(
            PublishPacket::decode(&mut Cursor::new(&encoded_data[..])),
            Err(PacketError::TopicNameError(_))
        ));
    }

    #[test]
    fn test_display_readable_publish_packet() {
        let packet = PublishPacket::new(
            TopicName::new("a/b".to_owned()).unwrap(),
            QoSWithPacketIdentifier::Level2(10),
            b"Hello world!".to_vec(),
        );

        assert_eq!(
            packet.to_string(),
            "{fixed_header: {packet_type: PUBLISH, remaining_length: 19}, topic_name: a/b, packet_identifier: 10, payload: Hello world!}"
        );
    }

    #[test]
    fn test_display_binary_publish_packet() {
        let packet = PublishPacket::new(
            TopicName::new("a/b".to_owned()).unwrap(),
            QoSWithPacketIdentifier::Level0,
            vec![1, 2, 3, 4],
        );

        assert_eq!(
            packet.to_string(),
            "{fixed_header: {packet_type: PUBLISH, remaining_length: 9}, topic_name: a/b, packet_identifier: None, payload: 4 bytes}"
        );
    }
}
