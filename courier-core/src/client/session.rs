use courier_codec::packet::DisconnectPacket;
use tokio::time::Instant;

use crate::{
    config::ClientOptions,
    error::{DisconnectReason, Error},
    event::EventSender,
    machine::{ConnectHandshake, IncomingPublish, OutgoingPublish, Ping, Subscriptions},
    outbound::Outbound,
    packet_id::PacketIdAllocator,
    warn,
};

/// Protocol state of one connection, dropped at teardown.
pub(crate) struct Session {
    packet_ids: PacketIdAllocator,
    outbound: Outbound,
    pub connect: ConnectHandshake,
    pub ping: Ping,
    pub subscriptions: Subscriptions,
    pub outgoing: OutgoingPublish,
    pub incoming: IncomingPublish,
    pub events: EventSender,
}

impl Session {
    pub fn new(options: &ClientOptions, outbound: Outbound, events: EventSender) -> Self {
        let policy = options.retry_policy();
        Self {
            packet_ids: PacketIdAllocator::new(),
            connect: ConnectHandshake::new(options.connack_timeout(), outbound.clone()),
            ping: Ping::new(
                options.keep_alive_duration(),
                options.retry_delay(),
                outbound.clone(),
            ),
            subscriptions: Subscriptions::new(policy, outbound.clone(), events.clone()),
            outgoing: OutgoingPublish::new(policy, outbound.clone(), events.clone()),
            incoming: IncomingPublish::new(policy, outbound.clone(), events.clone()),
            outbound,
            events,
        }
    }

    /// Next packet identifier not held by an unfinished exchange
    pub fn next_packet_id(&self) -> u16 {
        let mut packet_id = self.packet_ids.allocate();
        for _ in 0..u16::MAX {
            if !self.outgoing.contains(packet_id) && !self.subscriptions.contains(packet_id) {
                return packet_id;
            }
            packet_id = self.packet_ids.allocate();
        }
        warn!("every packet identifier is in flight, reusing #{packet_id}");
        packet_id
    }

    /// Advances the timers of every machine.
    ///
    /// Before CONNACK only the handshake timeout runs. Afterwards ping goes
    /// first and the retransmitting machines only run while the broker is
    /// alive.
    pub fn tick(&self, now: Instant) -> Result<(), DisconnectReason> {
        if !self.connect.is_accepted() {
            return self.connect.tick(now);
        }

        self.ping.tick(now)?;
        if !self.ping.broker_alive() {
            return Err(DisconnectReason::KeepAliveTimeout);
        }

        self.subscriptions.tick(now)?;
        self.outgoing.tick(now)?;
        self.incoming.tick(now)?;
        Ok(())
    }

    pub fn send_disconnect(&self) -> Result<(), Error> {
        self.outbound.send(DisconnectPacket::new())
    }

    /// Drops every outstanding exchange and fails pending waiters
    pub fn reset(&self) {
        self.connect.reset();
        self.subscriptions.reset();
        self.outgoing.reset();
        self.incoming.reset();
    }
}
