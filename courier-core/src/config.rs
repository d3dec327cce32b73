use std::{path::PathBuf, time::Duration};

use courier_codec::packet::{ConnectPacket, LastWill};
use nanoid::nanoid;

use crate::{error::Error, tracker::RetryPolicy};

pub const DEFAULT_KEEP_ALIVE: u16 = 60;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_RETRY_COUNT: u32 = 3;
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_RECONNECT_ATTEMPTS: usize = 5;

/// Files used to build the rustls client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// PEM bundle of trusted roots
    pub ca_file: PathBuf,
    /// Client certificate chain, used together with `key_file`
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    /// Name checked against the broker certificate, defaults to the host part of the address
    pub server_name: Option<String>,
}

impl TlsConfig {
    pub fn new<P: Into<PathBuf>>(ca_file: P) -> Self {
        Self {
            ca_file: ca_file.into(),
            cert_file: None,
            key_file: None,
            server_name: None,
        }
    }

    pub fn with_client_auth<P: Into<PathBuf>>(mut self, cert_file: P, key_file: P) -> Self {
        self.cert_file = Some(cert_file.into());
        self.key_file = Some(key_file.into());
        self
    }

    pub fn with_server_name<S: Into<String>>(mut self, server_name: S) -> Self {
        self.server_name = Some(server_name.into());
        self
    }
}

/// Connection options of a [`Client`](crate::Client).
///
/// Built with `with_*` setters and checked by [`ClientOptions::validate`]
/// before the first byte is written.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    address: String,
    client_id: String,
    clean_session: bool,
    keep_alive: u16,
    retry_delay: Duration,
    max_retry_count: u32,
    tick_interval: Duration,
    will: Option<LastWill>,
    username: Option<String>,
    password: Option<Vec<u8>>,
    reconnect: bool,
    reconnect_attempts: usize,
    tls: Option<TlsConfig>,
}

impl ClientOptions {
    pub fn new<A: Into<String>, C: Into<String>>(address: A, client_id: C) -> Self {
        Self {
            address: address.into(),
            client_id: client_id.into(),
            clean_session: true,
            keep_alive: DEFAULT_KEEP_ALIVE,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            tick_interval: DEFAULT_TICK_INTERVAL,
            will: None,
            username: None,
            password: None,
            reconnect: true,
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            tls: None,
        }
    }

    pub fn with_clean_session(mut self, clean_session: bool) -> Self {
        self.clean_session = clean_session;
        self
    }

    /// Keep-alive in seconds, 0 disables PINGREQ
    pub fn with_keep_alive(mut self, keep_alive: u16) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_max_retry_count(mut self, max_retry_count: u32) -> Self {
        self.max_retry_count = max_retry_count;
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_will(mut self, will: LastWill) -> Self {
        self.will = Some(will);
        self
    }

    pub fn with_credentials<U: Into<String>>(mut self, username: U, password: Option<Vec<u8>>) -> Self {
        self.username = Some(username.into());
        self.password = password;
        self
    }

    pub fn with_password<P: Into<Vec<u8>>>(mut self, password: P) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_reconnect_attempts(mut self, attempts: usize) -> Self {
        self.reconnect_attempts = attempts;
        self
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn clean_session(&self) -> bool {
        self.clean_session
    }

    pub fn keep_alive(&self) -> u16 {
        self.keep_alive
    }

    pub fn keep_alive_duration(&self) -> Duration {
        Duration::from_secs(self.keep_alive as u64)
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn max_retry_count(&self) -> u32 {
        self.max_retry_count
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn will(&self) -> Option<&LastWill> {
        self.will.as_ref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn reconnect(&self) -> bool {
        self.reconnect
    }

    pub fn reconnect_attempts(&self) -> usize {
        self.reconnect_attempts
    }

    pub fn tls(&self) -> Option<&TlsConfig> {
        self.tls.as_ref()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_delay, self.max_retry_count)
    }

    /// How long the handshake waits for CONNACK
    pub fn connack_timeout(&self) -> Duration {
        if self.keep_alive == 0 {
            self.retry_delay
        } else {
            self.keep_alive_duration()
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.address.is_empty() {
            return Err(Error::InvalidOptions("broker address is empty".to_string()));
        }
        if self.max_retry_count == 0 {
            return Err(Error::InvalidOptions(
                "max retry count must be at least 1".to_string(),
            ));
        }
        if self.retry_delay.is_zero() {
            return Err(Error::InvalidOptions("retry delay must not be zero".to_string()));
        }
        if self.tick_interval.is_zero() {
            return Err(Error::InvalidOptions("tick interval must not be zero".to_string()));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(Error::InvalidOptions(
                "password requires a username".to_string(),
            ));
        }
        if self.client_id.is_empty() && !self.clean_session {
            return Err(Error::InvalidOptions(
                "empty client id requires a clean session".to_string(),
            ));
        }
        if self.client_id.len() > u16::MAX as usize {
            return Err(Error::InvalidOptions("client id too long".to_string()));
        }
        if let Some(password) = &self.password {
            if password.len() > u16::MAX as usize {
                return Err(Error::InvalidOptions("password too long".to_string()));
            }
        }
        if let Some(will) = &self.will {
            if will.message().len() > u16::MAX as usize {
                return Err(Error::InvalidOptions("will message too long".to_string()));
            }
        }
        Ok(())
    }

    /// Validates and assigns a generated client id when none was given
    pub(crate) fn into_validated(mut self) -> Result<Self, Error> {
        self.validate()?;
        if self.client_id.is_empty() {
            self.client_id = nanoid!();
        }
        Ok(self)
    }

    pub(crate) fn connect_packet(&self) -> ConnectPacket {
        let mut packet = ConnectPacket::new(self.client_id.clone());
        packet.set_clean_session(self.clean_session);
        packet.set_keep_alive(self.keep_alive);
        packet.set_will(self.will.clone());
        packet.set_username(self.username.clone());
        packet.set_password(self.password.clone());
        packet
    }
}

#[cfg(test)]
mod test {
    use courier_codec::common::{QualityOfService, TopicName};

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let options = ClientOptions::new("localhost:1883", "c1");
        options.validate().unwrap();
        assert_eq!(options.keep_alive(), DEFAULT_KEEP_ALIVE);
        assert_eq!(options.connack_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn rejects_bad_retry_policy() {
        let options = ClientOptions::new("localhost:1883", "c1").with_max_retry_count(0);
        assert!(matches!(options.validate(), Err(Error::InvalidOptions(_))));

        let options = ClientOptions::new("localhost:1883", "c1").with_retry_delay(Duration::ZERO);
        assert!(matches!(options.validate(), Err(Error::InvalidOptions(_))));
    }

    #[test]
    fn password_requires_username() {
        let options = ClientOptions::new("localhost:1883", "c1").with_password("secret");
        assert!(options.validate().is_err());

        let options = ClientOptions::new("localhost:1883", "c1")
            .with_credentials("user", Some(b"secret".to_vec()));
        options.validate().unwrap();
    }

    #[test]
    fn empty_client_id() {
        let options = ClientOptions::new("localhost:1883", "").into_validated().unwrap();
        assert!(!options.client_id().is_empty());

        let options = ClientOptions::new("localhost:1883", "").with_clean_session(false);
        assert!(options.into_validated().is_err());
    }

    #[test]
    fn connect_packet_carries_options() {
        let will = LastWill::new(
            TopicName::new("status/c1").unwrap(),
            "offline",
            QualityOfService::Level1,
            true,
        );
        let options = ClientOptions::new("localhost:1883", "c1")
            .with_clean_session(false)
            .with_keep_alive(0)
            .with_will(will.clone())
            .with_credentials("user", Some(b"pw".to_vec()));
        assert_eq!(options.connack_timeout(), DEFAULT_RETRY_DELAY);

        let packet = options.connect_packet();
        assert_eq!(packet.client_identifier(), "c1");
        assert!(!packet.clean_session());
        assert_eq!(packet.keep_alive(), 0);
        assert_eq!(packet.will(), Some(&will));
        assert_eq!(packet.username(), Some("user"));
        assert_eq!(packet.password(), Some(&b"pw"[..]));
    }
}
