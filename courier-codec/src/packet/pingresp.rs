//! PINGRESP

use std::io::Read;

use crate::{
    common::packet::DecodablePacket,
    control::{ControlType, FixedHeader, PacketType},
    packet::{check_fixed_length, PacketError},
};

/// `PINGRESP` packet
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct PingrespPacket {
    fixed_header: FixedHeader,
}

encodable_packet!(PingrespPacket());

impl PingrespPacket {
    pub fn new() -> PingrespPacket {
        PingrespPacket {
            fixed_header: FixedHeader::new(PacketType::with_default(ControlType::PingResponse), 0),
        }
    }
}

impl Default for PingrespPacket {
    fn default() -> PingrespPacket {
        PingrespPacket::new()
    }
}

impl DecodablePacket for PingrespPacket {
    type DecodePacketError = std::convert::Infallible;
    type F = FixedHeader;
    type Error = PacketError<Self>;

    fn decode_packet<R: Read>(_reader: &mut R, fixed_header: Self::F) -> Result<Self, Self::Error> {
        check_fixed_length(&fixed_header)?;
        Ok(PingrespPacket { fixed_header })
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use crate::common::encodable::{Decodable, Encodable};

    use super::*;

    #[test]
    pub fn test_pingresp_packet_basic() {
        let packet = PingrespPacket::new();

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        assert_eq!(&b"\xd0\x00"[..], &buf[..]);

        let decoded = PingrespPacket::decode(&mut Cursor::new(buf)).unwrap();
        assert_eq!(packet, decoded);
    }

    #[test]
    pub fn test_pingresp_packet_rejects_flags() {
        let encoded_data = b"\xd1\x00";
        assert!(PingrespPacket::decode(&mut Cursor::new(&encoded_data[..])).is_err());
    }
}
