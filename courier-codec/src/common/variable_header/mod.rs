pub use self::{
    connect_ack_flags::{ConnackFlags, ConnectAckFlagsError},
    connect_flags::{ConnectFlags, ConnectFlagsError},
    keep_alive::KeepAlive,
    packet_identifier::PacketIdentifier,
    protocol_level::{ProtocolLevel, ProtocolLevelError},
    protocol_name::{ProtocolName, PROTOCOL_NAME},
};

pub mod connect_ack_flags;
pub mod connect_flags;
pub mod keep_alive;
pub mod packet_identifier;
pub mod protocol_level;
pub mod protocol_name;
