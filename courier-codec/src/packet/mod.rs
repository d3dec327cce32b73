//! Specific packets

use std::{
    fmt::{self, Debug, Display},
    io::{self, Read, Write},
};

#[cfg(feature = "parse")]
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{
    common::{
        packet::{DecodablePacket, EncodablePacket},
        Decodable, TopicNameDecodeError, TopicNameError,
    },
    control::{
        fixed_header::FixedHeaderError, variable_header::VariableHeaderError, ControlType,
        FixedHeader, PacketType,
    },
};

macro_rules! encodable_packet {
    ($typ:ident($($field:ident),* $(,)?)) => {
        impl $crate::common::packet::EncodablePacket for $typ {
            type Output = $crate::control::fixed_header::FixedHeader;

            fn fixed_header(&self) -> &Self::Output {
                &self.fixed_header
            }

            #[allow(unused_variables)]
            fn encode_packet<W: ::std::io::Write>(&self, writer: &mut W) -> ::std::io::Result<()> {
                $($crate::common::Encodable::encode(&self.$field, writer)?;)*
                Ok(())
            }

            fn encoded_packet_length(&self) -> u32 {
                $($crate::common::Encodable::encoded_length(&self.$field) +)*
                    0
            }
        }

        impl $typ {
            #[allow(dead_code)]
            #[inline(always)]
            fn fix_header_remaining_len(&mut self) {
                self.fixed_header.remaining_length =
                    $crate::common::packet::EncodablePacket::encoded_packet_length(self);
            }
        }
    };
}

pub use self::{
    connack::ConnackPacket,
    connect::{ConnectPacket, ConnectPacketError, LastWill},
    disconnect::DisconnectPacket,
    pingreq::PingreqPacket,
    pingresp::PingrespPacket,
    puback::PubackPacket,
    pubcomp::PubcompPacket,
    publish::PublishPacket,
    pubrec::PubrecPacket,
    pubrel::PubrelPacket,
    suback::{SubackPacket, SubackPacketError, SubscribeReturnCode},
    subscribe::{SubscribePacket, SubscribePacketError},
    unsuback::UnsubackPacket,
    unsubscribe::{UnsubscribePacket, UnsubscribePacketError},
};

pub mod connack;
pub mod connect;
pub mod disconnect;
pub mod pingreq;
pub mod pingresp;
pub mod puback;
pub mod pubcomp;
pub mod publish;
pub mod pubrec;
pub mod pubrel;
pub mod suback;
pub mod subscribe;
pub mod unsuback;
pub mod unsubscribe;

macro_rules! impl_decodable {
    ($($typ:ident,)+) => {
        $(impl $crate::common::encodable::Decodable for $typ {
            type Error = PacketError<Self>;
            type Cond = Option<FixedHeader>;

            fn decode_with<R: std::io::Read>(
                reader: &mut R,
                fixed_header: Self::Cond,
            ) -> Result<Self, Self::Error> {
                let fixed_header: FixedHeader = if let Some(hdr) = fixed_header {
                    hdr
                } else {
                    $crate::common::encodable::Decodable::decode(reader)?
                };

                <Self as DecodablePacket>::decode_packet(reader, fixed_header)
            }
        })+
    };
}

impl_decodable! {
    ConnectPacket,
    ConnackPacket,

    PublishPacket,
    PubackPacket,
    PubrecPacket,
    PubrelPacket,
    PubcompPacket,

    PingreqPacket,
    PingrespPacket,

    SubscribePacket,
    SubackPacket,

    UnsubscribePacket,
    UnsubackPacket,

    DisconnectPacket,
}

/// Rejects a fixed-size packet whose remaining length differs from the protocol value
pub(crate) fn check_fixed_length<P: DecodablePacket>(
    fixed_header: &FixedHeader,
) -> Result<(), PacketError<P>> {
    match fixed_header.packet_type.control_type().fixed_remaining_length() {
        Some(expected) if expected != fixed_header.remaining_length => Err(
            PacketError::InvalidRemainingLength(fixed_header.packet_type, fixed_header.remaining_length),
        ),
        _ => Ok(()),
    }
}

/// Parsing errors for packet
#[derive(thiserror::Error)]
pub enum PacketError<P>
where
    P: DecodablePacket,
{
    #[error(transparent)]
    FixedHeaderError(#[from] FixedHeaderError),
    #[error(transparent)]
    VariableHeaderError(#[from] VariableHeaderError),
    #[error(transparent)]
    PayloadError(<P as DecodablePacket>::DecodePacketError),
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error(transparent)]
    TopicNameError(#[from] TopicNameError),
    #[error("invalid remaining length for {0} ({1})")]
    InvalidRemainingLength(PacketType, u32),
}

impl<P> Debug for PacketError<P>
where
    P: DecodablePacket,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PacketError::FixedHeaderError(ref e) => {
                f.debug_tuple("FixedHeaderError").field(e).finish()
            }
            PacketError::VariableHeaderError(ref e) => {
                f.debug_tuple("VariableHeaderError").field(e).finish()
            }
            PacketError::PayloadError(ref e) => f.debug_tuple("PayloadError").field(e).finish(),
            PacketError::IoError(ref e) => f.debug_tuple("IoError").field(e).finish(),
            PacketError::TopicNameError(ref e) => f.debug_tuple("TopicNameError").field(e).finish(),
            PacketError::InvalidRemainingLength(ref ty, len) => f
                .debug_tuple("InvalidRemainingLength")
                .field(ty)
                .field(&len)
                .finish(),
        }
    }
}

impl<P: DecodablePacket> From<TopicNameDecodeError> for PacketError<P> {
    fn from(e: TopicNameDecodeError) -> Self {
        match e {
            TopicNameDecodeError::IoError(e) => e.into(),
            TopicNameDecodeError::InvalidTopicName(e) => e.into(),
        }
    }
}

macro_rules! impl_variable_packet {
    ($($name:ident & $errname:ident => $hdr:ident,)+) => {
        /// Any MQTT v3.1.1 control packet
        #[derive(Debug, Eq, PartialEq, Clone)]
        pub enum VariablePacket {
            $(
                $name($name),
            )+
        }

        #[cfg(feature = "parse")]
        impl VariablePacket {
            /// Asynchronously parse a packet from a `tokio::io::AsyncRead`
            pub async fn parse<A: AsyncRead + Unpin>(rdr: &mut A) -> Result<Self, VariablePacketError> {
                use std::io::Cursor;
                let fixed_header = FixedHeader::parse(rdr).await?;

                let mut buffer = vec![0u8; fixed_header.remaining_length as usize];
                rdr.read_exact(&mut buffer).await?;

                decode_with_header(&mut Cursor::new(buffer), fixed_header)
            }
        }

        #[inline]
        fn decode_with_header<R: io::Read>(rdr: &mut R, fixed_header: FixedHeader) -> Result<VariablePacket, VariablePacketError> {
            match fixed_header.packet_type.control_type() {
                $(
                    ControlType::$hdr => {
                        let pk = <$name as DecodablePacket>::decode_packet(rdr, fixed_header)?;
                        Ok(VariablePacket::$name(pk))
                    }
                )+
            }
        }

        $(
            impl From<$name> for VariablePacket {
                fn from(pk: $name) -> VariablePacket {
                    VariablePacket::$name(pk)
                }
            }
        )+

        impl EncodablePacket for VariablePacket {
            type Output = FixedHeader;

            fn fixed_header(&self) -> &Self::Output {
                match *self {
                    $(
                        VariablePacket::$name(ref pk) => pk.fixed_header(),
                    )+
                }
            }

            fn encode_packet<W: Write>(&self, writer: &mut W) -> io::Result<()> {
                match *self {
                    $(
                        VariablePacket::$name(ref pk) => pk.encode_packet(writer),
                    )+
                }
            }

            fn encoded_packet_length(&self) -> u32 {
                match *self {
                    $(
                        VariablePacket::$name(ref pk) => pk.encoded_packet_length(),
                    )+
                }
            }
        }

        impl Decodable for VariablePacket {
            type Error = VariablePacketError;
            type Cond = Option<FixedHeader>;

            fn decode_with<R: Read>(reader: &mut R, fixed_header: Self::Cond)
                    -> Result<VariablePacket, Self::Error> {
                let fixed_header = match fixed_header {
                    Some(fh) => fh,
                    None => {
                        match FixedHeader::decode(reader) {
                            Ok(header) => header,
                            Err(FixedHeaderError::ReservedType(code, length)) => {
                                let reader = &mut reader.take(length as u64);
                                let mut buf = Vec::with_capacity(length as usize);
                                reader.read_to_end(&mut buf)?;
                                return Err(VariablePacketError::ReservedPacket(code, buf));
                            },
                            Err(err) => return Err(From::from(err))
                        }
                    }
                };
                let reader = &mut reader.take(fixed_header.remaining_length as u64);

                decode_with_header(reader, fixed_header)
            }
        }

        /// Parsing errors for variable packet
        #[derive(Debug, thiserror::Error)]
        pub enum VariablePacketError {
            #[error(transparent)]
            FixedHeaderError(#[from] FixedHeaderError),
            #[error("reserved packet type ({0}), [u8, ..{len}]", len = .1.len())]
            ReservedPacket(u8, Vec<u8>),
            #[error(transparent)]
            IoError(#[from] io::Error),
            $(
                #[error(transparent)]
                $errname(#[from] PacketError<$name>),
            )+
        }
    }
}

impl_variable_packet! {
    ConnectPacket       & ConnectPacketError        => Connect,
    ConnackPacket       & ConnackPacketError        => ConnectAcknowledgement,

    PublishPacket       & PublishPacketError        => Publish,
    PubackPacket        & PubackPacketError         => PublishAcknowledgement,
    PubrecPacket        & PubrecPacketError         => PublishReceived,
    PubrelPacket        & PubrelPacketError         => PublishRelease,
    PubcompPacket       & PubcompPacketError        => PublishComplete,

    PingreqPacket       & PingreqPacketError        => PingRequest,
    PingrespPacket      & PingrespPacketError       => PingResponse,

    SubscribePacket     & SubscribePacketDecodeError   => Subscribe,
    SubackPacket        & SubackPacketDecodeError      => SubscribeAcknowledgement,

    UnsubscribePacket   & UnsubscribePacketDecodeError => Unsubscribe,
    UnsubackPacket      & UnsubackPacketError       => UnsubscribeAcknowledgement,

    DisconnectPacket    & DisconnectPacketError     => Disconnect,
}

impl VariablePacket {
    pub fn new<T>(t: T) -> VariablePacket
    where
        VariablePacket: From<T>,
    {
        From::from(t)
    }

    pub fn packet_type(&self) -> PacketType {
        self.fixed_header().packet_type
    }

    /// Packet identifier carried in the variable header, if the packet type has one
    pub fn packet_identifier(&self) -> Option<u16> {
        match self {
            VariablePacket::PublishPacket(pk) => pk.qos().packet_identifier(),
            VariablePacket::PubackPacket(pk) => Some(pk.packet_identifier()),
            VariablePacket::PubrecPacket(pk) => Some(pk.packet_identifier()),
            VariablePacket::PubrelPacket(pk) => Some(pk.packet_identifier()),
            VariablePacket::PubcompPacket(pk) => Some(pk.packet_identifier()),
            VariablePacket::SubscribePacket(pk) => Some(pk.packet_identifier()),
            VariablePacket::SubackPacket(pk) => Some(pk.packet_identifier()),
            VariablePacket::UnsubscribePacket(pk) => Some(pk.packet_identifier()),
            VariablePacket::UnsubackPacket(pk) => Some(pk.packet_identifier()),
            _ => None,
        }
    }
}

impl Display for VariablePacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.packet_identifier() {
            Some(pkid) => write!(f, "{}({})", self.packet_type(), pkid),
            None => write!(f, "{}", self.packet_type()),
        }
    }
}

#[cfg(feature = "tokio-codec")]
mod codec {
    use bytes::{Buf as _, BufMut as _, BytesMut};
    use tokio_util::codec;

    use super::*;
    use crate::{
        common::Encodable,
        control::packet_type::{PacketType, PacketTypeError},
    };

    /// Incremental decoder, reads the fixed header then waits for the whole body
    pub struct MqttDecoder {
        state: DecodeState,
    }

    enum DecodeState {
        Start,
        Packet { length: u32, typ: DecodePacketType },
    }

    #[derive(Copy, Clone)]
    enum DecodePacketType {
        Standard(PacketType),
        Reserved(u8),
    }

    impl MqttDecoder {
        pub const fn new() -> Self {
            MqttDecoder {
                state: DecodeState::Start,
            }
        }
    }

    impl Default for MqttDecoder {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Like FixedHeader::decode(), but on a buffer instead of a stream. Returns None if it reaches
    /// the end of the buffer before it finishes decoding the header.
    #[inline]
    fn decode_header(
        mut data: &[u8],
    ) -> Option<Result<(DecodePacketType, u32, usize), FixedHeaderError>> {
        let mut header_size = 0;
        macro_rules! read_u8 {
            () => {{
                let (&x, rest) = data.split_first()?;
                data = rest;
                header_size += 1;
                x
            }};
        }

        let type_val = read_u8!();
        let remaining_len = {
            let mut cur = 0u32;
            for i in 0.. {
                let byte = read_u8!();

                if i >= 4 {
                    return Some(Err(FixedHeaderError::MalformedRemainingLength));
                }

                cur |= ((byte as u32) & 0x7F) << (7 * i);

                if byte & 0x80 == 0 {
                    break;
                }
            }

            cur
        };

        let packet_type = match PacketType::try_from(type_val) {
            Ok(ty) => DecodePacketType::Standard(ty),
            Err(PacketTypeError::ReservedType(ty, _)) => DecodePacketType::Reserved(ty),
            Err(err) => return Some(Err(err.into())),
        };
        Some(Ok((packet_type, remaining_len, header_size)))
    }

    impl codec::Decoder for MqttDecoder {
        type Item = VariablePacket;
        type Error = VariablePacketError;

        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
            loop {
                match &mut self.state {
                    DecodeState::Start => match decode_header(&src[..]) {
                        Some(Ok((typ, length, header_size))) => {
                            src.advance(header_size);
                            self.state = DecodeState::Packet { length, typ };
                            continue;
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(None),
                    },
                    DecodeState::Packet { length, typ } => {
                        let length = *length;
                        if src.remaining() < length as usize {
                            src.reserve(length as usize - src.remaining());
                            return Ok(None);
                        }
                        let typ = *typ;

                        self.state = DecodeState::Start;

                        let body = src.split_to(length as usize).freeze();
                        match typ {
                            DecodePacketType::Standard(typ) => {
                                let header = FixedHeader {
                                    packet_type: typ,
                                    remaining_length: length,
                                };
                                return decode_with_header(&mut body.reader(), header).map(Some);
                            }
                            DecodePacketType::Reserved(code) => {
                                return Err(VariablePacketError::ReservedPacket(
                                    code,
                                    body.to_vec(),
                                ));
                            }
                        }
                    }
                }
            }
        }
    }

    pub struct MqttEncoder {}

    impl MqttEncoder {
        pub const fn new() -> Self {
            MqttEncoder {}
        }
    }

    impl Default for MqttEncoder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<T: EncodablePacket + Encodable> codec::Encoder<T> for MqttEncoder {
        type Error = io::Error;
        fn encode(&mut self, packet: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
            dst.reserve(packet.encoded_length() as usize);
            packet.encode(&mut dst.writer())
        }
    }

    pub struct MqttCodec {
        decode: MqttDecoder,
        encode: MqttEncoder,
    }

    impl MqttCodec {
        pub const fn new() -> Self {
            MqttCodec {
                decode: MqttDecoder::new(),
                encode: MqttEncoder::new(),
            }
        }
    }

    impl Default for MqttCodec {
        fn default() -> Self {
            Self::new()
        }
    }

    impl codec::Decoder for MqttCodec {
        type Item = VariablePacket;
        type Error = VariablePacketError;
        #[inline]
        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
            self.decode.decode(src)
        }
    }

    impl<T: EncodablePacket + Encodable> codec::Encoder<T> for MqttCodec {
        type Error = io::Error;
        #[inline]
        fn encode(&mut self, packet: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
            self.encode.encode(packet, dst)
        }
    }
}

#[cfg(feature = "tokio-codec")]
pub use codec::{MqttCodec, MqttDecoder, MqttEncoder};

#[cfg(test)]
mod test {
    use super::*;

    use std::io::Cursor;

    use crate::common::{Encodable, QoSWithPacketIdentifier, QualityOfService, TopicFilter, TopicName};

    #[test]
    fn test_variable_packet_basic() {
        let packet = ConnectPacket::new("1234".to_owned());

        let var_packet = VariablePacket::new(packet);

        let mut buf = Vec::new();
        var_packet.encode(&mut buf).unwrap();

        let mut decode_buf = Cursor::new(buf);
        let decoded_packet = VariablePacket::decode(&mut decode_buf).unwrap();

        assert_eq!(var_packet, decoded_packet);
    }

    #[test]
    fn test_variable_packet_every_type() {
        let publish = PublishPacket::new(
            TopicName::new("a/b").unwrap(),
            QoSWithPacketIdentifier::Level2(5),
            b"hello".to_vec(),
        );
        let packets: Vec<VariablePacket> = vec![
            ConnectPacket::new("client").into(),
            ConnackPacket::new(false, crate::control::ConnectReturnCode::ConnectionAccepted).into(),
            publish.into(),
            PubackPacket::new(1).into(),
            PubrecPacket::new(2).into(),
            PubrelPacket::new(3).into(),
            PubcompPacket::new(4).into(),
            SubscribePacket::new(6, TopicFilter::new("a/+").unwrap(), QualityOfService::Level1)
                .into(),
            SubackPacket::new(6, SubscribeReturnCode::MaximumQoSLevel1).into(),
            UnsubscribePacket::new(7, TopicFilter::new("a/#").unwrap()).into(),
            UnsubackPacket::new(7).into(),
            PingreqPacket::new().into(),
            PingrespPacket::new().into(),
            DisconnectPacket::new().into(),
        ];

        for packet in packets {
            let mut buf = Vec::new();
            packet.encode(&mut buf).unwrap();
            assert_eq!(buf.len() as u32, packet.encoded_length());

            let decoded = VariablePacket::decode(&mut Cursor::new(buf)).unwrap();
            assert_eq!(packet, decoded);
        }
    }

    #[test]
    fn test_reserved_packet_type() {
        let mut buf = Cursor::new(b"\xf0\x02\x01\x02".to_vec());
        match VariablePacket::decode(&mut buf) {
            Err(err @ VariablePacketError::ReservedPacket(15, _)) => {
                assert_eq!(err.to_string(), "reserved packet type (15), [u8, ..2]");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_fixed_size_packets_reject_other_lengths() {
        for bytes in [
            &b"\x40\x03\x00\x01\x00"[..],
            &b"\x20\x01\x00"[..],
            &b"\xc0\x01\x00"[..],
            &b"\xd0\x01\x00"[..],
            &b"\xe0\x01\x00"[..],
            &b"\xb0\x03\x00\x01\x00"[..],
        ] {
            assert!(
                VariablePacket::decode(&mut Cursor::new(bytes)).is_err(),
                "{bytes:x?} should be rejected"
            );
        }
    }

    #[test]
    fn test_display_variable_packet() {
        assert_eq!(VariablePacket::new(PubrelPacket::new(9)).to_string(), "PUBREL(9)");
        assert_eq!(VariablePacket::new(PingreqPacket::new()).to_string(), "PINGREQ");
    }

    #[cfg(feature = "parse")]
    #[tokio::test]
    async fn test_variable_packet_async_parse() {
        let packet = ConnectPacket::new("1234".to_owned());

        let var_packet = VariablePacket::new(packet);

        let mut buf = Vec::new();
        var_packet.encode(&mut buf).unwrap();

        let mut async_buf = buf.as_slice();
        let decoded_packet = VariablePacket::parse(&mut async_buf).await.unwrap();

        assert_eq!(var_packet, decoded_packet);
    }

    #[cfg(feature = "tokio-codec")]
    #[tokio::test]
    async fn test_variable_packet_framed() {
        use futures::{SinkExt, StreamExt};
        use tokio_util::codec::{FramedRead, FramedWrite};

        let conn_packet = ConnectPacket::new("1234".to_owned());
        let sub_packet =
            SubscribePacket::new(1, TopicFilter::new("foo/#").unwrap(), QualityOfService::Level0);

        // small, to make sure buffering and stuff works
        let (reader, writer) = tokio::io::duplex(8);

        let task = tokio::spawn({
            let (conn_packet, sub_packet) = (conn_packet.clone(), sub_packet.clone());
            async move {
                let mut sink = FramedWrite::new(writer, MqttEncoder::new());
                sink.send(conn_packet).await.unwrap();
                sink.send(sub_packet).await.unwrap();
                SinkExt::<VariablePacket>::flush(&mut sink).await.unwrap();
            }
        });

        let mut stream = FramedRead::new(reader, MqttDecoder::new());
        let decoded_conn = stream.next().await.unwrap().unwrap();
        let decoded_sub = stream.next().await.unwrap().unwrap();

        task.await.unwrap();

        assert!(stream.next().await.is_none());

        assert_eq!(decoded_conn, conn_packet.into());
        assert_eq!(decoded_sub, sub_packet.into());
    }

    #[cfg(feature = "tokio-codec")]
    #[test]
    fn test_decoder_waits_for_full_body() {
        use bytes::BytesMut;
        use tokio_util::codec::Decoder;

        let mut decoder = MqttDecoder::new();
        let mut buf = BytesMut::from(&b"\x40"[..]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"\x02\x00");
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"\x07\xd0\x00");
        let packet = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(packet, VariablePacket::new(PubackPacket::new(7)));
        assert_eq!(&buf[..], b"\xd0\x00");

        let packet = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(packet, VariablePacket::new(PingrespPacket::new()));
        assert!(buf.is_empty());
    }
}
