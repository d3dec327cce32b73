//! CONNACK

use std::io::Read;

use crate::{
    common::{packet::DecodablePacket, ConnackFlags, Decodable},
    control::{
        variable_header::ConnectReturnCode, ControlType, FixedHeader, PacketType,
        VariableHeaderError,
    },
    packet::{check_fixed_length, PacketError},
};

/// `CONNACK` packet
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct ConnackPacket {
    fixed_header: FixedHeader,
    flags: ConnackFlags,
    ret_code: ConnectReturnCode,
}

encodable_packet!(ConnackPacket(flags, ret_code));

impl ConnackPacket {
    pub fn new(session_present: bool, ret_code: ConnectReturnCode) -> ConnackPacket {
        ConnackPacket {
            fixed_header: FixedHeader::new(
                PacketType::with_default(ControlType::ConnectAcknowledgement),
                2,
            ),
            flags: ConnackFlags { session_present },
            ret_code,
        }
    }

    pub fn connack_flags(&self) -> ConnackFlags {
        self.flags
    }

    pub fn session_present(&self) -> bool {
        self.flags.session_present
    }

    pub fn connect_return_code(&self) -> ConnectReturnCode {
        self.ret_code
    }
}

impl DecodablePacket for ConnackPacket {
    type DecodePacketError = std::convert::Infallible;
    type F = FixedHeader;
    type Error = PacketError<Self>;

    fn decode_packet<R: Read>(reader: &mut R, fixed_header: Self::F) -> Result<Self, Self::Error> {
        check_fixed_length(&fixed_header)?;
        let flags: ConnackFlags =
            Decodable::decode(reader).map_err(VariableHeaderError::InvalidConnackFlags)?;
        let ret_code: ConnectReturnCode = Decodable::decode(reader)?;

        Ok(ConnackPacket {
            fixed_header,
            flags,
            ret_code,
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use crate::common::encodable::{Decodable, Encodable};

    use super::*;

    #[test]
    pub fn test_connack_packet_encode_hex() {
        let packet = ConnackPacket::new(true, ConnectReturnCode::ConnectionAccepted);

        let expected = b"\x20\x02\x01\x00";

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();

        assert_eq!(&expected[..], &buf[..]);
    }

    #[test]
    pub fn test_connack_packet_decode_hex() {
        let encoded_data = b"\x20\x02\x00\x05";

        let mut buf = Cursor::new(&encoded_data[..]);
        let packet = ConnackPacket::decode(&mut buf).unwrap();

        assert!(!packet.session_present());
        assert_eq!(packet.connect_return_code(), ConnectReturnCode::NotAuthorized);
    }

    #[test]
    pub fn test_connack_packet_rejects_return_code() {
        let encoded_data = b"\x20\x02\x00\x06";
        assert!(matches!(
            ConnackPacket::decode(&mut Cursor::new(&encoded_data[..])),
            Err(PacketError::VariableHeaderError(
                VariableHeaderError::InvalidConnectReturnCode(6)
            ))
        ));
    }

    #[test]
    pub fn test_connack_packet_rejects_reserved_flags() {
        let encoded_data = b"\x20\x02\x02\x00";
        assert!(matches!(
            ConnackPacket::decode(&mut Cursor::new(&encoded_data[..])),
            Err(PacketError::VariableHeaderError(
                VariableHeaderError::InvalidConnackFlags(_)
            ))
        ));
    }
}
