//! CONNECT

use std::io::{self, Read, Write};

use crate::{
    common::{
        encodable::VarBytes,
        packet::DecodablePacket,
        topic_name::{TopicNameDecodeError, TopicNameError},
        ConnectFlags, Decodable, Encodable, KeepAlive, ProtocolLevel, ProtocolName,
        QualityOfService, TopicName, PROTOCOL_NAME,
    },
    control::{variable_header::VariableHeaderError, ControlType, FixedHeader, PacketType},
    packet::PacketError,
};

/// `CONNECT` packet
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct ConnectPacket {
    fixed_header: FixedHeader,
    protocol_name: ProtocolName,
    protocol_level: ProtocolLevel,
    flags: ConnectFlags,
    keep_alive: KeepAlive,
    payload: ConnectPacketPayload,
}

encodable_packet!(ConnectPacket(
    protocol_name,
    protocol_level,
    flags,
    keep_alive,
    payload
));

impl ConnectPacket {
    pub fn new<C>(client_identifier: C) -> Self
    where
        C: Into<String>,
    {
        let mut pkt = Self {
            fixed_header: FixedHeader::new(PacketType::with_default(ControlType::Connect), 0),
            protocol_name: ProtocolName::default(),
            protocol_level: ProtocolLevel::Version311,
            flags: ConnectFlags::default(),
            keep_alive: KeepAlive(0),
            payload: ConnectPacketPayload::new(client_identifier.into()),
        };

        pkt.fix_header_remaining_len();
        pkt
    }

    pub fn set_keep_alive(&mut self, keep_alive: u16) {
        self.keep_alive = KeepAlive(keep_alive);
    }

    pub fn set_username(&mut self, username: Option<String>) {
        self.flags.username = username.is_some();
        self.payload.username = username;
        self.fix_header_remaining_len();
    }

    pub fn set_password(&mut self, password: Option<Vec<u8>>) {
        self.flags.password = password.is_some();
        self.payload.password = password.map(VarBytes);
        self.fix_header_remaining_len();
    }

    /// Sets the will message, the will flags follow the message's QoS and retain
    pub fn set_will(&mut self, will: Option<LastWill>) {
        self.flags.will_flag = will.is_some();
        self.flags.will_qos = will.as_ref().map_or(0, |w| w.qos as u8);
        self.flags.will_retain = will.as_ref().is_some_and(|w| w.retain);
        self.payload.last_will = will;
        self.fix_header_remaining_len();
    }

    pub fn set_client_identifier<I: Into<String>>(&mut self, id: I) {
        self.payload.client_identifier = id.into();
        self.fix_header_remaining_len();
    }

    pub fn set_clean_session(&mut self, clean_session: bool) {
        self.flags.clean_session = clean_session;
    }

    pub fn username(&self) -> Option<&str> {
        self.payload.username.as_deref()
    }

    pub fn password(&self) -> Option<&[u8]> {
        self.payload.password.as_ref().map(|x| &x.0[..])
    }

    pub fn will(&self) -> Option<&LastWill> {
        self.payload.last_will.as_ref()
    }

    pub fn client_identifier(&self) -> &str {
        &self.payload.client_identifier[..]
    }

    pub fn protocol_name(&self) -> &str {
        &self.protocol_name.0
    }

    pub fn protocol_level(&self) -> ProtocolLevel {
        self.protocol_level
    }

    pub fn clean_session(&self) -> bool {
        self.flags.clean_session
    }

    pub fn keep_alive(&self) -> u16 {
        self.keep_alive.0
    }
}

impl DecodablePacket for ConnectPacket {
    type DecodePacketError = ConnectPacketError;
    type F = FixedHeader;
    type Error = PacketError<Self>;

    fn decode_packet<R: Read>(reader: &mut R, fixed_header: Self::F) -> Result<Self, Self::Error> {
        let protocol_name: ProtocolName = Decodable::decode(reader)?;
        if protocol_name.0 != PROTOCOL_NAME {
            return Err(VariableHeaderError::InvalidProtocolName(protocol_name.0).into());
        }
        let protocol_level: ProtocolLevel =
            Decodable::decode(reader).map_err(VariableHeaderError::InvalidProtocolLevel)?;
        let flags: ConnectFlags =
            Decodable::decode(reader).map_err(VariableHeaderError::InvalidConnectFlags)?;
        let keep_alive: KeepAlive = Decodable::decode(reader)?;
        let payload: ConnectPacketPayload =
            Decodable::decode_with(reader, flags).map_err(PacketError::PayloadError)?;

        Ok(Self {
            fixed_header,
            protocol_name,
            protocol_level,
            flags,
            keep_alive,
            payload,
        })
    }
}

/// Payloads for connect packet
#[derive(Debug, Eq, PartialEq, Clone)]
struct ConnectPacketPayload {
    client_identifier: String,
    last_will: Option<LastWill>,
    username: Option<String>,
    password: Option<VarBytes>,
}

impl ConnectPacketPayload {
    pub fn new(client_identifier: String) -> Self {
        ConnectPacketPayload {
            client_identifier,
            last_will: None,
            username: None,
            password: None,
        }
    }
}

impl Encodable for ConnectPacketPayload {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<(), io::Error> {
        self.client_identifier.encode(writer)?;
        self.last_will.encode(writer)?;
        self.username.encode(writer)?;
        self.password.encode(writer)
    }

    fn encoded_length(&self) -> u32 {
        self.client_identifier.encoded_length()
            + self.last_will.encoded_length()
            + self.username.encoded_length()
            + self.password.encoded_length()
    }
}

impl Decodable for ConnectPacketPayload {
    type Error = ConnectPacketError;
    type Cond = ConnectFlags;

    fn decode_with<R: Read>(reader: &mut R, flags: ConnectFlags) -> Result<Self, Self::Error> {
        let client_identifier = String::decode(reader)?;

        let last_will = if flags.will_flag {
            let topic = TopicName::decode(reader)?;
            let message = VarBytes::decode(reader)?;
            let qos = QualityOfService::try_from(flags.will_qos)
                .map_err(|_| ConnectPacketError::InvalidQualityOfService)?;
            Some(LastWill {
                topic,
                message,
                qos,
                retain: flags.will_retain,
            })
        } else {
            None
        };

        let username = if flags.username {
            Some(String::decode(reader)?)
        } else {
            None
        };
        let password = if flags.password {
            Some(VarBytes::decode(reader)?)
        } else {
            None
        };

        Ok(Self {
            client_identifier,
            last_will,
            username,
            password,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectPacketError {
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error(transparent)]
    TopicNameError(#[from] TopicNameError),
    #[error("invalid quality of service")]
    InvalidQualityOfService,
}

impl From<TopicNameDecodeError> for ConnectPacketError {
    fn from(err: TopicNameDecodeError) -> Self {
        match err {
            TopicNameDecodeError::IoError(err) => err.into(),
            TopicNameDecodeError::InvalidTopicName(err) => err.into(),
        }
    }
}

/// Will message published by the broker when the client vanishes without a `DISCONNECT`
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct LastWill {
    topic: TopicName,
    message: VarBytes,
    qos: QualityOfService,
    retain: bool,
}

impl LastWill {
    pub fn new<M: Into<Vec<u8>>>(
        topic: TopicName,
        message: M,
        qos: QualityOfService,
        retain: bool,
    ) -> Self {
        Self {
            topic,
            message: VarBytes(message.into()),
            qos,
            retain,
        }
    }

    pub fn topic(&self) -> &TopicName {
        &self.topic
    }

    pub fn message(&self) -> &[u8] {
        &self.message.0
    }

    pub fn qos(&self) -> QualityOfService {
        self.qos
    }

    pub fn retain(&self) -> bool {
        self.retain
    }
}

impl Encodable for LastWill {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.topic.encode(writer)?;
        self.message.encode(writer)
    }

    fn encoded_length(&self) -> u32 {
        self.topic.encoded_length() + self.message.encoded_length()
    }
}
