//! SUBSCRIBE and UNSUBSCRIBE exchanges.
//!
//! Each request carries a oneshot waiter. An acknowledgement resolves it and
//! raises an event; retry exhaustion and connection loss only resolve the
//! waiter.

use courier_codec::{
    common::{QualityOfService, TopicFilter},
    packet::{
        SubackPacket, SubscribePacket, SubscribeReturnCode, UnsubackPacket, UnsubscribePacket,
        VariablePacket,
    },
};
use tokio::{sync::oneshot, time::Instant};

use crate::{
    debug,
    error::Error,
    event::{Event, EventSender},
    outbound::Outbound,
    tracker::{ResendTracker, Retransmit, RetryPolicy},
    warn,
};

pub type SubscribeWaiter = oneshot::Receiver<Result<SubscribeReturnCode, Error>>;
pub type UnsubscribeWaiter = oneshot::Receiver<Result<(), Error>>;

pub struct SubscribeExchange {
    packet: SubscribePacket,
    waiter: oneshot::Sender<Result<SubscribeReturnCode, Error>>,
}

impl Retransmit for SubscribeExchange {
    fn packet_id(&self) -> u16 {
        self.packet.packet_identifier()
    }

    fn packet_for_attempt(&self, _attempt: u32) -> VariablePacket {
        self.packet.clone().into()
    }
}

pub struct UnsubscribeExchange {
    packet: UnsubscribePacket,
    waiter: oneshot::Sender<Result<(), Error>>,
}

impl Retransmit for UnsubscribeExchange {
    fn packet_id(&self) -> u16 {
        self.packet.packet_identifier()
    }

    fn packet_for_attempt(&self, _attempt: u32) -> VariablePacket {
        self.packet.clone().into()
    }
}

pub struct Subscriptions {
    subscribe: ResendTracker<SubscribeExchange>,
    unsubscribe: ResendTracker<UnsubscribeExchange>,
    events: EventSender,
}

impl Subscriptions {
    pub(crate) fn new(policy: RetryPolicy, outbound: Outbound, events: EventSender) -> Self {
        Self {
            subscribe: ResendTracker::new("subscribe", policy, outbound.clone()),
            unsubscribe: ResendTracker::new("unsubscribe", policy, outbound),
            events,
        }
    }

    pub fn subscribe(
        &self,
        packet_id: u16,
        topic_filter: TopicFilter,
        qos: QualityOfService,
        now: Instant,
    ) -> Result<SubscribeWaiter, Error> {
        let (waiter, rx) = oneshot::channel();
        let packet = SubscribePacket::new(packet_id, topic_filter, qos);
        self.subscribe
            .enqueue(SubscribeExchange { packet, waiter }, now)?;
        Ok(rx)
    }

    pub fn unsubscribe(
        &self,
        packet_id: u16,
        topic_filter: TopicFilter,
        now: Instant,
    ) -> Result<UnsubscribeWaiter, Error> {
        let (waiter, rx) = oneshot::channel();
        let packet = UnsubscribePacket::new(packet_id, topic_filter);
        self.unsubscribe
            .enqueue(UnsubscribeExchange { packet, waiter }, now)?;
        Ok(rx)
    }

    pub fn handle_suback(&self, packet: &SubackPacket) {
        let packet_id = packet.packet_identifier();
        let Some(context) = self.subscribe.try_finalize(packet_id) else {
            warn!("rogue SUBACK #{packet_id} discarded");
            return;
        };

        let SubscribeExchange { packet: request, waiter } = context.into_exchange();
        let return_code = packet.return_code();
        if return_code == SubscribeReturnCode::Failure {
            warn!("broker refused subscription to {}", request.topic_filter());
        }
        self.events.emit(Event::Subscribed {
            packet_id,
            topic_filter: request.topic_filter().clone(),
            return_code,
        });
        let _ = waiter.send(Ok(return_code));
    }

    pub fn handle_unsuback(&self, packet: &UnsubackPacket) {
        let packet_id = packet.packet_identifier();
        let Some(context) = self.unsubscribe.try_finalize(packet_id) else {
            warn!("rogue UNSUBACK #{packet_id} discarded");
            return;
        };

        let UnsubscribeExchange { packet: request, waiter } = context.into_exchange();
        self.events.emit(Event::Unsubscribed {
            packet_id,
            topic_filter: request.topic_filter().clone(),
        });
        let _ = waiter.send(Ok(()));
    }

    pub fn tick(&self, now: Instant) -> Result<(), Error> {
        for context in self.subscribe.tick(now)? {
            let packet_id = context.exchange().packet_id();
            let _ = context
                .into_exchange()
                .waiter
                .send(Err(Error::RetriesExhausted(packet_id)));
        }
        for context in self.unsubscribe.tick(now)? {
            let packet_id = context.exchange().packet_id();
            let _ = context
                .into_exchange()
                .waiter
                .send(Err(Error::RetriesExhausted(packet_id)));
        }
        Ok(())
    }

    pub fn contains(&self, packet_id: u16) -> bool {
        self.subscribe.contains(packet_id) || self.unsubscribe.contains(packet_id)
    }

    /// Fails every pending request with [`Error::ConnectionLost`]
    pub fn reset(&self) {
        let subscribes = self.subscribe.reset();
        let unsubscribes = self.unsubscribe.reset();
        if !subscribes.is_empty() || !unsubscribes.is_empty() {
            debug!(
                "connection lost with {} subscribe and {} unsubscribe request(s) pending",
                subscribes.len(),
                unsubscribes.len()
            );
        }
        for context in subscribes {
            let _ = context.into_exchange().waiter.send(Err(Error::ConnectionLost));
        }
        for context in unsubscribes {
            let _ = context.into_exchange().waiter.send(Err(Error::ConnectionLost));
        }
    }
}
