//! Packet types

use std::fmt::Display;

use crate::common::QualityOfService;

/// Packet type
// INVARIANT: the high 4 bits of the byte must be a valid control type
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct PacketType(u8);

/// Defined control types
#[repr(u8)]
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ControlType {
    /// Client request to connect to Server
    Connect = value::CONNECT,
    /// Connect acknowledgment
    ConnectAcknowledgement = value::CONNACK,
    /// Publish message
    Publish = value::PUBLISH,
    /// Publish acknowledgment
    PublishAcknowledgement = value::PUBACK,
    /// Publish received (assured delivery part 1)
    PublishReceived = value::PUBREC,
    /// Publish release (assured delivery part 2)
    PublishRelease = value::PUBREL,
    /// Publish complete (assured delivery part 3)
    PublishComplete = value::PUBCOMP,
    /// Client subscribe request
    Subscribe = value::SUBSCRIBE,
    /// Subscribe acknowledgment
    SubscribeAcknowledgement = value::SUBACK,
    /// Unsubscribe request
    Unsubscribe = value::UNSUBSCRIBE,
    /// Unsubscribe acknowledgment
    UnsubscribeAcknowledgement = value::UNSUBACK,
    /// PING request
    PingRequest = value::PINGREQ,
    /// PING response
    PingResponse = value::PINGRESP,
    /// Client is disconnecting
    Disconnect = value::DISCONNECT,
}

impl ControlType {
    #[inline]
    fn default_flags(self) -> u8 {
        match self {
            ControlType::PublishRelease | ControlType::Subscribe | ControlType::Unsubscribe => {
                0b0010
            }
            _ => 0,
        }
    }

    /// Remaining length of packets whose body never varies
    #[inline]
    pub fn fixed_remaining_length(self) -> Option<u32> {
        match self {
            ControlType::ConnectAcknowledgement
            | ControlType::PublishAcknowledgement
            | ControlType::PublishReceived
            | ControlType::PublishRelease
            | ControlType::PublishComplete
            | ControlType::UnsubscribeAcknowledgement => Some(2),
            ControlType::PingRequest | ControlType::PingResponse | ControlType::Disconnect => {
                Some(0)
            }
            _ => None,
        }
    }
}

impl PacketType {
    /// Creates a packet type. Returns an error if `flags` is an invalid value for the given
    /// ControlType as defined by the [MQTT spec].
    ///
    /// [MQTT spec]: http://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Table_2.2_-
    pub fn new(t: ControlType, flags: u8) -> Result<Self, InvalidFlag> {
        let flags_ok = match t {
            ControlType::Publish => {
                let qos = (flags & 0b0110) >> 1;
                let dup = flags & 0b1000 != 0;
                qos <= 2 && !(dup && qos == 0)
            }
            _ => t.default_flags() == flags,
        };
        if flags_ok {
            Ok(Self::new_unchecked(t, flags))
        } else {
            Err(InvalidFlag(t, flags))
        }
    }

    #[inline]
    fn new_unchecked(t: ControlType, flags: u8) -> Self {
        Self(((t as u8) << 4) | (flags & 0x0F))
    }

    /// Creates a packet type with default flags
    #[inline]
    pub fn with_default(t: ControlType) -> Self {
        Self::new_unchecked(t, t.default_flags())
    }

    pub(crate) fn publish(qos: QualityOfService) -> Self {
        Self::new_unchecked(ControlType::Publish, (qos as u8) << 1)
    }

    #[inline]
    pub(crate) fn update_flags(&mut self, upd: impl FnOnce(u8) -> u8) {
        let flags = upd(self.flags());
        self.0 = (self.0 & !0x0F) | (flags & 0x0F)
    }

    #[inline]
    pub fn control_type(self) -> ControlType {
        // the constructors only accept known control types
        get_control_type(self.0 >> 4).unwrap_or(ControlType::Disconnect)
    }

    #[inline]
    pub fn flags(self) -> u8 {
        self.0 & 0x0F
    }
}

impl From<PacketType> for u8 {
    fn from(value: PacketType) -> Self {
        value.0
    }
}

impl TryFrom<u8> for PacketType {
    type Error = PacketTypeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let type_val = value >> 4;
        let flags = value & 0x0F;

        let control_type =
            get_control_type(type_val).ok_or(PacketTypeError::ReservedType(type_val, flags))?;
        Ok(PacketType::new(control_type, flags)?)
    }
}

#[inline]
fn get_control_type(val: u8) -> Option<ControlType> {
    let typ = match val {
        value::CONNECT => ControlType::Connect,
        value::CONNACK => ControlType::ConnectAcknowledgement,
        value::PUBLISH => ControlType::Publish,
        value::PUBACK => ControlType::PublishAcknowledgement,
        value::PUBREC => ControlType::PublishReceived,
        value::PUBREL => ControlType::PublishRelease,
        value::PUBCOMP => ControlType::PublishComplete,
        value::SUBSCRIBE => ControlType::Subscribe,
        value::SUBACK => ControlType::SubscribeAcknowledgement,
        value::UNSUBSCRIBE => ControlType::Unsubscribe,
        value::UNSUBACK => ControlType::UnsubscribeAcknowledgement,
        value::PINGREQ => ControlType::PingRequest,
        value::PINGRESP => ControlType::PingResponse,
        value::DISCONNECT => ControlType::Disconnect,
        _ => return None,
    };
    Some(typ)
}

impl Display for PacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self.control_type() {
            ControlType::Connect => "CONNECT",
            ControlType::ConnectAcknowledgement => "CONNACK",
            ControlType::Publish => "PUBLISH",
            ControlType::PublishAcknowledgement => "PUBACK",
            ControlType::PublishReceived => "PUBREC",
            ControlType::PublishRelease => "PUBREL",
            ControlType::PublishComplete => "PUBCOMP",
            ControlType::Subscribe => "SUBSCRIBE",
            ControlType::SubscribeAcknowledgement => "SUBACK",
            ControlType::Unsubscribe => "UNSUBSCRIBE",
            ControlType::UnsubscribeAcknowledgement => "UNSUBACK",
            ControlType::PingRequest => "PINGREQ",
            ControlType::PingResponse => "PINGRESP",
            ControlType::Disconnect => "DISCONNECT",
        };
        write!(f, "{name}")
    }
}

/// Parsing packet type errors
#[derive(Debug, thiserror::Error)]
pub enum PacketTypeError {
    #[error("reserved type {0:?} (flags {1:#X})")]
    ReservedType(u8, u8),
    #[error(transparent)]
    InvalidFlag(#[from] InvalidFlag),
}

#[derive(Debug, thiserror::Error)]
#[error("invalid flag for {0:?} ({1:#X})")]
pub struct InvalidFlag(pub ControlType, pub u8);

mod value {
    pub const CONNECT: u8 = 1;
    pub const CONNACK: u8 = 2;
    pub const PUBLISH: u8 = 3;
    pub const PUBACK: u8 = 4;
    pub const PUBREC: u8 = 5;
    pub const PUBREL: u8 = 6;
    pub const PUBCOMP: u8 = 7;
    pub const SUBSCRIBE: u8 = 8;
    pub const SUBACK: u8 = 9;
    pub const UNSUBSCRIBE: u8 = 10;
    pub const UNSUBACK: u8 = 11;
    pub const PINGREQ: u8 = 12;
    pub const PINGRESP: u8 = 13;
    pub const DISCONNECT: u8 = 14;
}
