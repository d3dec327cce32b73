//! PUBREL

use std::{fmt::Display, io::Read};

use crate::{
    common::{packet::DecodablePacket, Decodable, PacketIdentifier},
    control::{ControlType, FixedHeader, PacketType},
    packet::{check_fixed_length, PacketError},
};

/// `PUBREL` packet
///
/// Releases a QoS 2 `PUBLISH` after its `PUBREC`.
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct PubrelPacket {
    fixed_header: FixedHeader,
    packet_identifier: PacketIdentifier,
}

encodable_packet!(PubrelPacket(packet_identifier));

impl PubrelPacket {
    pub fn new(pkid: u16) -> Self {
        Self {
            fixed_header: FixedHeader::new(PacketType::with_default(ControlType::PublishRelease), 2),
            packet_identifier: PacketIdentifier(pkid),
        }
    }

    pub fn packet_identifier(&self) -> u16 {
        self.packet_identifier.0
    }

    pub fn set_packet_identifier(&mut self, pkid: u16) {
        self.packet_identifier.0 = pkid;
    }
}

impl DecodablePacket for PubrelPacket {
    type DecodePacketError = std::convert::Infallible;
    type F = FixedHeader;
    type Error = PacketError<Self>;

    fn decode_packet<R: Read>(reader: &mut R, fixed_header: Self::F) -> Result<Self, Self::Error> {
        check_fixed_length(&fixed_header)?;
        let packet_identifier = PacketIdentifier::decode(reader)?;
        Ok(Self {
            fixed_header,
            packet_identifier,
        })
    }
}

impl Display for PubrelPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{fixed_header: {}, packet_identifier: {}}}",
            self.fixed_header, self.packet_identifier
        )
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use crate::common::encodable::Encodable;

    use super::*;

    #[test]
    pub fn test_pubrel_packet_encode_hex() {
        let packet = PubrelPacket::new(40306);

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();

        // PUBREL always carries the 0b0010 flags
        assert_eq!(&b"\x62\x02\x9d\x72"[..], &buf[..]);
    }

    #[test]
    pub fn test_pubrel_packet_decode_hex() {
        let encoded_data = b"\x62\x02\x00\x05";

        let packet = PubrelPacket::decode(&mut Cursor::new(&encoded_data[..])).unwrap();
        assert_eq!(packet.packet_identifier(), 5);

        let encoded_data = b"\x60\x02\x00\x05";
        assert!(PubrelPacket::decode(&mut Cursor::new(&encoded_data[..])).is_err());
    }

    #[test]
    pub fn test_display_pubrel_packet() {
        assert_eq!(
            PubrelPacket::new(5).to_string(),
            "{fixed_header: {packet_type: PUBREL, remaining_length: 2}, packet_identifier: 5}"
        );
    }
}
