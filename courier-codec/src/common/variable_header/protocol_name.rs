use std::io::{self, Read, Write};

use crate::common::{Decodable, Encodable};

/// Protocol name carried by every v3.1.1 `CONNECT` packet
pub const PROTOCOL_NAME: &str = "MQTT";

/// Protocol name in variable header
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct ProtocolName(pub String);

impl Default for ProtocolName {
    fn default() -> Self {
        Self(PROTOCOL_NAME.to_owned())
    }
}

impl Encodable for ProtocolName {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<(), io::Error> {
        (&self.0[..]).encode(writer)
    }

    fn encoded_length(&self) -> u32 {
        (&self.0[..]).encoded_length()
    }
}

impl Decodable for ProtocolName {
    type Error = io::Error;
    type Cond = ();

    fn decode_with<R: Read>(reader: &mut R, _rest: ()) -> Result<Self, io::Error> {
        Ok(Self(Decodable::decode(reader)?))
    }
}
