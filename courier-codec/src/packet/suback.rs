//! SUBACK

use std::{
    fmt::Display,
    io::{self, Read, Write},
};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::{
    common::{packet::DecodablePacket, Decodable, Encodable, PacketIdentifier, QualityOfService},
    control::{ControlType, FixedHeader, PacketType},
    packet::PacketError,
};

/// Subscribe code
#[repr(u8)]
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum SubscribeReturnCode {
    MaximumQoSLevel0 = 0x00,
    MaximumQoSLevel1 = 0x01,
    MaximumQoSLevel2 = 0x02,
    Failure = 0x80,
}

impl SubscribeReturnCode {
    /// Granted QoS, `None` when the broker refused the subscription
    pub fn granted_qos(self) -> Option<QualityOfService> {
        match self {
            SubscribeReturnCode::MaximumQoSLevel0 => Some(QualityOfService::Level0),
            SubscribeReturnCode::MaximumQoSLevel1 => Some(QualityOfService::Level1),
            SubscribeReturnCode::MaximumQoSLevel2 => Some(QualityOfService::Level2),
            SubscribeReturnCode::Failure => None,
        }
    }
}

impl From<QualityOfService> for SubscribeReturnCode {
    fn from(qos: QualityOfService) -> Self {
        match qos {
            QualityOfService::Level0 => SubscribeReturnCode::MaximumQoSLevel0,
            QualityOfService::Level1 => SubscribeReturnCode::MaximumQoSLevel1,
            QualityOfService::Level2 => SubscribeReturnCode::MaximumQoSLevel2,
        }
    }
}

impl TryFrom<u8> for SubscribeReturnCode {
    type Error = SubackPacketError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x00 => Ok(SubscribeReturnCode::MaximumQoSLevel0),
            0x01 => Ok(SubscribeReturnCode::MaximumQoSLevel1),
            0x02 => Ok(SubscribeReturnCode::MaximumQoSLevel2),
            0x80 => Ok(SubscribeReturnCode::Failure),
            code => Err(SubackPacketError::InvalidSubscribeReturnCode(code)),
        }
    }
}

impl Encodable for SubscribeReturnCode {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<(), io::Error> {
        writer.write_u8(*self as u8)
    }

    fn encoded_length(&self) -> u32 {
        1
    }
}

impl Display for SubscribeReturnCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

/// `SUBACK` packet, answering a single-topic `SUBSCRIBE`
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct SubackPacket {
    fixed_header: FixedHeader,
    packet_identifier: PacketIdentifier,
    return_code: SubscribeReturnCode,
}

encodable_packet!(SubackPacket(packet_identifier, return_code));

impl SubackPacket {
    pub fn new(pkid: u16, return_code: SubscribeReturnCode) -> Self {
        Self {
            fixed_header: FixedHeader::new(
                PacketType::with_default(ControlType::SubscribeAcknowledgement),
                3,
            ),
            packet_identifier: PacketIdentifier(pkid),
            return_code,
        }
    }

    pub fn packet_identifier(&self) -> u16 {
        self.packet_identifier.0
    }

    pub fn set_packet_identifier(&mut self, pkid: u16) {
        self.packet_identifier.0 = pkid;
    }

    pub fn return_code(&self) -> SubscribeReturnCode {
        self.return_code
    }
}

impl DecodablePacket for SubackPacket {
    type DecodePacketError = SubackPacketError;
    type F = FixedHeader;
    type Error = PacketError<Self>;

    fn decode_packet<R: Read>(reader: &mut R, fixed_header: Self::F) -> Result<Self, Self::Error> {
        if fixed_header.remaining_length != 3 {
            return Err(PacketError::InvalidRemainingLength(
                fixed_header.packet_type,
                fixed_header.remaining_length,
            ));
        }
        let packet_identifier = PacketIdentifier::decode(reader)?;
        let return_code =
            SubscribeReturnCode::try_from(reader.read_u8()?).map_err(PacketError::PayloadError)?;
        Ok(Self {
            fixed_header,
            packet_identifier,
            return_code,
        })
    }
}

impl Display for SubackPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{fixed_header: {}, packet_identifier: {}, return_code: {}}}",
            self.fixed_header, self.packet_identifier, self.return_code
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubackPacketError {
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error("invalid subscribe return code {0}")]
    InvalidSubscribeReturnCode(u8),
}
