use std::{
    convert::Infallible,
    error::Error,
    fmt::Display,
    io::{self, Read, Write},
    marker::Sized,
    slice,
};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

/// Largest value representable by the MQTT variable byte integer (4 bytes).
pub const MAX_VAR_INT: u32 = 268_435_455;

pub trait Encodable {
    /// Encodes to writer
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()>;
    /// Length of bytes after encoded
    fn encoded_length(&self) -> u32;
}

impl<T: Encodable> Encodable for Option<T> {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        if let Some(this) = self {
            this.encode(writer)?
        }
        Ok(())
    }

    fn encoded_length(&self) -> u32 {
        self.as_ref().map_or(0, |x| x.encoded_length())
    }
}

impl Encodable for &str {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<(), io::Error> {
        let len = u16::try_from(self.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "string longer than 65535 bytes")
        })?;

        writer
            .write_u16::<BigEndian>(len)
            .and_then(|_| writer.write_all(self.as_bytes()))
    }

    fn encoded_length(&self) -> u32 {
        2 + self.len() as u32
    }
}

impl Encodable for &[u8] {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<(), io::Error> {
        writer.write_all(self)
    }

    fn encoded_length(&self) -> u32 {
        self.len() as u32
    }
}

impl Encodable for String {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<(), io::Error> {
        (&self[..]).encode(writer)
    }

    fn encoded_length(&self) -> u32 {
        (&self[..]).encoded_length()
    }
}

impl Encodable for Vec<u8> {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<(), io::Error> {
        (&self[..]).encode(writer)
    }

    fn encoded_length(&self) -> u32 {
        (&self[..]).encoded_length()
    }
}

impl Encodable for () {
    fn encode<W: Write>(&self, _: &mut W) -> Result<(), io::Error> {
        Ok(())
    }

    fn encoded_length(&self) -> u32 {
        0
    }
}

/// Methods for decoding bytes to an Object according to MQTT specification
pub trait Decodable: Sized {
    type Error: Error;
    type Cond;

    /// Decodes object from reader
    fn decode<R: Read>(reader: &mut R) -> Result<Self, Self::Error>
    where
        Self::Cond: Default,
    {
        Self::decode_with(reader, Default::default())
    }

    /// Decodes object with additional data (or hints)
    fn decode_with<R: Read>(reader: &mut R, cond: Self::Cond) -> Result<Self, Self::Error>;
}

impl Decodable for String {
    type Error = io::Error;
    type Cond = ();

    fn decode_with<R: Read>(reader: &mut R, _rest: ()) -> Result<String, io::Error> {
        let VarBytes(buf) = VarBytes::decode(reader)?;

        String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl Decodable for Vec<u8> {
    type Error = io::Error;
    type Cond = Option<u32>;

    fn decode_with<R: Read>(reader: &mut R, length: Option<u32>) -> Result<Self, Self::Error> {
        match length {
            Some(length) => {
                let mut buf = Vec::with_capacity(length as usize);
                reader.take(length.into()).read_to_end(&mut buf)?;
                if buf.len() != length as usize {
                    return Err(io::ErrorKind::UnexpectedEof.into());
                }
                Ok(buf)
            }
            None => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

impl Decodable for () {
    type Error = Infallible;
    type Cond = ();

    fn decode_with<R: Read>(_: &mut R, _: ()) -> Result<Self, Self::Error> {
        Ok(())
    }
}

/// Bytes that encoded with length
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct VarBytes(pub Vec<u8>);

impl Encodable for VarBytes {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<(), io::Error> {
        let len = u16::try_from(self.0.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "binary data longer than 65535 bytes")
        })?;
        writer.write_u16::<BigEndian>(len)?;
        writer.write_all(&self.0)?;
        Ok(())
    }

    fn encoded_length(&self) -> u32 {
        2 + self.0.len() as u32
    }
}

impl Decodable for VarBytes {
    type Error = io::Error;
    type Cond = ();

    fn decode_with<R: Read>(reader: &mut R, _: ()) -> Result<Self, Self::Error> {
        let length = reader.read_u16::<BigEndian>()?;
        let mut buf = vec![0u8; length as usize];
        reader.read_exact(&mut buf)?;
        Ok(Self(buf))
    }
}

impl Display for VarBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) if s.chars().all(|c| c.is_ascii_graphic() || c == ' ') => {
                write!(f, "{}", s)
            }
            _ => write!(f, "{:?}", self.0),
        }
    }
}

/// Variable byte integer, used for the remaining length of the fixed header.
///
/// Seven data bits per byte, the high bit marks a continuation; at most four
/// bytes are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VarInt(pub u32);

impl VarInt {
    /// Number of bytes needed to encode `value`
    pub fn length_of(value: u32) -> u32 {
        if value >= 2_097_152 {
            4
        } else if value >= 16_384 {
            3
        } else if value >= 128 {
            2
        } else {
            1
        }
    }
}

impl Encodable for VarInt {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        if self.0 > MAX_VAR_INT {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("variable byte integer {} out of range", self.0),
            ));
        }

        let mut value = self.0;
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value > 0 {
                byte |= 0x80;
            }
            writer.write_u8(byte)?;
            if value == 0 {
                break;
            }
        }
        Ok(())
    }

    fn encoded_length(&self) -> u32 {
        Self::length_of(self.0)
    }
}

impl Decodable for VarInt {
    type Error = io::Error;
    type Cond = ();

    fn decode_with<R: Read>(reader: &mut R, _cond: Self::Cond) -> Result<Self, Self::Error> {
        let mut byte = 0u8;
        let mut var_int: u32 = 0;
        let mut i: usize = 0;
        loop {
            reader.read_exact(slice::from_mut(&mut byte))?;
            var_int |= (u32::from(byte) & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                break;
            } else if i < 3 {
                i += 1;
            } else {
                return Err(io::Error::from(io::ErrorKind::InvalidData));
            }
        }
        Ok(Self(var_int))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::io::Cursor;

    #[test]
    fn varbyte_encode() {
        let test_var = vec![0, 1, 2, 3, 4, 5];
        let bytes = VarBytes(test_var);

        assert_eq!(bytes.encoded_length() as usize, 2 + 6);

        let mut buf = Vec::new();
        bytes.encode(&mut buf).unwrap();

        assert_eq!(&buf, &[0, 6, 0, 1, 2, 3, 4, 5]);

        let mut reader = Cursor::new(buf);
        let decoded = VarBytes::decode(&mut reader).unwrap();

        assert_eq!(decoded, bytes);
    }

    #[test]
    fn varbyte_truncated() {
        let mut reader = Cursor::new(vec![0, 4, 1, 2]);
        assert!(VarBytes::decode(&mut reader).is_err());
    }

    #[test]
    fn var_int_boundaries_use_minimum_bytes() {
        let cases: [(u32, &[u8]); 8] = [
            (0, b"\x00"),
            (127, b"\x7f"),
            (128, b"\x80\x01"),
            (16_383, b"\xff\x7f"),
            (16_384, b"\x80\x80\x01"),
            (2_097_151, b"\xff\xff\x7f"),
            (2_097_152, b"\x80\x80\x80\x01"),
            (MAX_VAR_INT, b"\xff\xff\xff\x7f"),
        ];

        for (value, expected) in cases {
            let mut buf = Vec::new();
            VarInt(value).encode(&mut buf).unwrap();
            assert_eq!(&buf[..], expected, "encoding {value}");
            assert_eq!(VarInt(value).encoded_length() as usize, expected.len());

            let decoded = VarInt::decode(&mut Cursor::new(buf)).unwrap();
            assert_eq!(decoded, VarInt(value));
        }
    }

    #[test]
    fn var_int_sampled_range_round_trip() {
        let mut value = 0u32;
        while value <= MAX_VAR_INT {
            let mut buf = Vec::new();
            VarInt(value).encode(&mut buf).unwrap();
            assert_eq!(buf.len() as u32, VarInt::length_of(value));
            assert_eq!(VarInt::decode(&mut Cursor::new(buf)).unwrap().0, value);
            value = value * 3 + 1;
        }
    }

    #[test]
    fn var_int_rejects_out_of_range() {
        let mut buf = Vec::new();
        assert!(VarInt(MAX_VAR_INT + 1).encode(&mut buf).is_err());

        let mut reader = Cursor::new(b"\x80\x80\x80\x80\x01".to_vec());
        assert!(VarInt::decode(&mut reader).is_err());
    }
}
