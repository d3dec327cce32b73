//! Handle used by every state machine to queue packets for the write loop.

use std::sync::Arc;

use courier_codec::packet::VariablePacket;
use kanal::{AsyncReceiver, Sender};
use parking_lot::RwLock;
use tokio::time::Instant;

use crate::{error::Error, trace};

#[derive(Clone)]
pub struct Outbound {
    tx: Sender<VariablePacket>,
    last_sent_at: Arc<RwLock<Instant>>,
}

impl Outbound {
    /// Creates the handle and the receiver drained by the write loop
    pub fn channel() -> (Self, AsyncReceiver<VariablePacket>) {
        let (tx, rx) = kanal::unbounded();
        let outbound = Self {
            tx,
            last_sent_at: Arc::new(RwLock::new(Instant::now())),
        };
        (outbound, rx.to_async())
    }

    pub fn send<P: Into<VariablePacket>>(&self, packet: P) -> Result<(), Error> {
        self.send_at(packet, Instant::now())
    }

    /// Queues `packet` and records `now` as the last time anything was sent
    pub fn send_at<P: Into<VariablePacket>>(&self, packet: P, now: Instant) -> Result<(), Error> {
        let packet = packet.into();
        trace!("queue {packet}");
        self.tx.send(packet).map_err(|_| Error::ChannelClosed)?;

        let mut last_sent_at = self.last_sent_at.write();
        if now > *last_sent_at {
            *last_sent_at = now;
        }
        Ok(())
    }

    pub fn last_sent_at(&self) -> Instant {
        *self.last_sent_at.read()
    }
}
