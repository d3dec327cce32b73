use std::io::{self, Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::common::{Decodable, Encodable};

/// Flags in `CONNECT` packet
///
/// ```plain
///     7          6          5         4 3        2          1              0
/// +----------+----------+-------------+------+-----------+---------------+----------+
/// | username | password | will retain | will QoS | will flag | clean session | reserved |
/// +----------+----------+-------------+------+-----------+---------------+----------+
/// ```
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default)]
pub struct ConnectFlags {
    pub username: bool,
    pub password: bool,
    pub will_retain: bool,
    pub will_qos: u8,
    pub will_flag: bool,
    pub clean_session: bool,
    // We never use this, but must decode because brokers must verify it's zero per [MQTT-3.1.2-3]
    pub reserved: bool,
}

impl Encodable for ConnectFlags {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<(), io::Error> {
        let code = ((self.username as u8) << 7)
            | ((self.password as u8) << 6)
            | ((self.will_retain as u8) << 5)
            | ((self.will_qos & 0b11) << 3)
            | ((self.will_flag as u8) << 2)
            | ((self.clean_session as u8) << 1);

        writer.write_u8(code)
    }

    fn encoded_length(&self) -> u32 {
        1
    }
}

impl Decodable for ConnectFlags {
    type Error = ConnectFlagsError;
    type Cond = ();

    fn decode_with<R: Read>(reader: &mut R, _rest: ()) -> Result<Self, Self::Error> {
        let code = reader.read_u8()?;
        if code & 1 != 0 {
            return Err(ConnectFlagsError::InvalidReservedFlag);
        }

        let flags = Self {
            username: (code & 0b1000_0000) != 0,
            password: (code & 0b0100_0000) != 0,
            will_retain: (code & 0b0010_0000) != 0,
            will_qos: (code & 0b0001_1000) >> 3,
            will_flag: (code & 0b0000_0100) != 0,
            clean_session: (code & 0b0000_0010) != 0,
            reserved: false,
        };

        if flags.will_qos > 2 {
            return Err(ConnectFlagsError::InvalidWillQoS(flags.will_qos));
        }
        if !flags.will_flag && (flags.will_retain || flags.will_qos != 0) {
            return Err(ConnectFlagsError::WillFieldsWithoutWill);
        }
        if flags.password && !flags.username {
            return Err(ConnectFlagsError::PasswordWithoutUsername);
        }

        Ok(flags)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectFlagsError {
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error("invalid reserved flags")]
    InvalidReservedFlag,
    #[error("invalid will qos ({0})")]
    InvalidWillQoS(u8),
    #[error("will qos or retain set without will flag")]
    WillFieldsWithoutWill,
    #[error("password flag set without username flag")]
    PasswordWithoutUsername,
}
