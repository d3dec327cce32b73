//! Protocol level header

use std::io::{self, Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::common::{Decodable, Encodable};

pub const SPEC_3_1_1: u8 = 0x04;

/// Protocol level in MQTT (`0x04` in v3.1.1, the only level spoken here)
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default)]
#[repr(u8)]
pub enum ProtocolLevel {
    #[default]
    Version311 = SPEC_3_1_1,
}

impl TryFrom<u8> for ProtocolLevel {
    type Error = ProtocolLevelError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            SPEC_3_1_1 => Ok(ProtocolLevel::Version311),
            lvl => Err(ProtocolLevelError::InvalidProtocolLevel(lvl)),
        }
    }
}

impl Encodable for ProtocolLevel {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<(), io::Error> {
        writer.write_u8(*self as u8)
    }

    fn encoded_length(&self) -> u32 {
        1
    }
}

impl Decodable for ProtocolLevel {
    type Error = ProtocolLevelError;
    type Cond = ();

    fn decode_with<R: Read>(reader: &mut R, _rest: ()) -> Result<Self, Self::Error> {
        ProtocolLevel::try_from(reader.read_u8()?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolLevelError {
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error("invalid protocol level ({0})")]
    InvalidProtocolLevel(u8),
}
