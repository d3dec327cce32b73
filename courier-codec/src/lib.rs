//! MQTT 3.1.1 packet codec
//!
//! Strictly implements the wire format of
//! [MQTT v3.1.1](http://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html), with
//! `SUBSCRIBE`, `SUBACK` and `UNSUBSCRIBE` restricted to a single topic per packet.
//!
//! ## Usage
//!
//! ```rust
//! use std::io::Cursor;
//!
//! use courier_codec::common::{Decodable, Encodable, QoSWithPacketIdentifier, TopicName};
//! use courier_codec::packet::{PublishPacket, VariablePacket};
//!
//! let packet = PublishPacket::new(
//!     TopicName::new("mqtt/learning").unwrap(),
//!     QoSWithPacketIdentifier::Level2(10),
//!     b"Hello MQTT!".to_vec(),
//! );
//!
//! let mut buf = Vec::new();
//! packet.encode(&mut buf).unwrap();
//!
//! // Decode it with known type
//! let decoded = PublishPacket::decode(&mut Cursor::new(&buf[..])).unwrap();
//! assert_eq!(packet, decoded);
//!
//! // Auto decode by the fixed header
//! let auto_decode = VariablePacket::decode(&mut Cursor::new(&buf[..])).unwrap();
//! assert_eq!(VariablePacket::PublishPacket(packet), auto_decode);
//! ```

pub mod common;
pub mod control;
pub mod packet;
