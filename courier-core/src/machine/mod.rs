//! Per-concern protocol state machines, each composed of one or more
//! [`ResendTracker`](crate::tracker::ResendTracker)s.

pub use self::{
    connect::ConnectHandshake,
    incoming::IncomingPublish,
    outgoing::OutgoingPublish,
    ping::Ping,
    subscribe::Subscriptions,
};

pub mod connect;
pub mod incoming;
pub mod outgoing;
pub mod ping;
pub mod subscribe;
