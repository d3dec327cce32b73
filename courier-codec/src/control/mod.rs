//! Fixed header, packet type and the CONNACK return code

pub use self::{
    fixed_header::{FixedHeader, FixedHeaderError},
    packet_type::{ControlType, PacketType, PacketTypeError},
    variable_header::*,
};

pub mod fixed_header;
pub mod packet_type;
pub mod variable_header;
