//! MQTT v3.1.1 client engine.
//!
//! The [`Client`] owns one connection at a time. Every exchange that needs an
//! acknowledgement is kept in a [`tracker::ResendTracker`] until the broker
//! answers or the retry budget runs out; the state machines in [`machine`]
//! decide what to send next, and a single orchestrator task drives their
//! timers. Outcomes reach the application through an [`EventHandler`].
//!
//! ```no_run
//! use courier_core::{Client, ClientOptions, QualityOfService};
//!
//! # async fn run() -> Result<(), courier_core::Error> {
//! let options = ClientOptions::new("127.0.0.1:1883", "sensor-17").with_keep_alive(30);
//! let client = Client::new(options, ())?;
//! client.connect().await?;
//! client.subscribe("sensors/+/temp", QualityOfService::Level1).await?;
//! client.publish("sensors/17/temp", "21.5", QualityOfService::Level2, false)?;
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub use courier_codec::{
    common::{QualityOfService, TopicFilter, TopicName},
    packet::{LastWill, PublishPacket, SubscribeReturnCode},
};

pub use self::{
    client::Client,
    config::{ClientOptions, TlsConfig},
    error::{DisconnectReason, Error},
    event::{Event, EventHandler},
};

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod machine;
pub mod outbound;
pub mod packet_id;
pub mod tracker;
pub mod transport;

#[macro_export]
macro_rules! trace { ($($x:tt)*) => (
    #[cfg(feature = "log")] {
        log::trace!($($x)*)
    }
) }

#[macro_export]
macro_rules! debug { ($($x:tt)*) => (
    #[cfg(feature = "log")] {
        log::debug!($($x)*)
    }
) }

#[macro_export]
macro_rules! info { ($($x:tt)*) => (
    #[cfg(feature = "log")] {
        log::info!($($x)*)
    }
) }

#[macro_export]
macro_rules! warn { ($($x:tt)*) => (
    #[cfg(feature = "log")] {
        log::warn!($($x)*)
    }
) }

#[macro_export]
macro_rules! error { ($($x:tt)*) => (
    #[cfg(feature = "log")] {
        log::error!($($x)*)
    }
) }
