//! Publishes sent by the broker.

use courier_codec::{
    common::QoSWithPacketIdentifier,
    packet::{PubackPacket, PubcompPacket, PublishPacket, PubrecPacket, PubrelPacket, VariablePacket},
};
use tokio::time::Instant;

use crate::{
    debug,
    error::Error,
    event::{Event, EventSender},
    outbound::Outbound,
    tracker::{ResendTracker, Retransmit, RetryPolicy},
    warn,
};

#[derive(Debug, Clone, Copy)]
pub struct PubackReply(u16);

impl Retransmit for PubackReply {
    fn packet_id(&self) -> u16 {
        self.0
    }

    fn packet_for_attempt(&self, _attempt: u32) -> VariablePacket {
        PubackPacket::new(self.0).into()
    }
}

/// PUBREC of a QoS 2 publish, holds the message until PUBREL releases it
#[derive(Debug, Clone)]
pub struct PubrecReply {
    publish: PublishPacket,
    packet_id: u16,
}

impl Retransmit for PubrecReply {
    fn packet_id(&self) -> u16 {
        self.packet_id
    }

    fn packet_for_attempt(&self, _attempt: u32) -> VariablePacket {
        PubrecPacket::new(self.packet_id).into()
    }
}

pub struct IncomingPublish {
    /// Only writes the PUBACK, entries are finalized right after the send
    acknowledged: ResendTracker<PubackReply>,
    await_pubrel: ResendTracker<PubrecReply>,
    outbound: Outbound,
    events: EventSender,
}

impl IncomingPublish {
    pub(crate) fn new(policy: RetryPolicy, outbound: Outbound, events: EventSender) -> Self {
        Self {
            acknowledged: ResendTracker::new("puback", policy, outbound.clone()),
            await_pubrel: ResendTracker::new("await-pubrel", policy, outbound.clone()),
            outbound,
            events,
        }
    }

    pub fn handle_publish(&self, publish: PublishPacket, now: Instant) -> Result<(), Error> {
        match publish.qos() {
            QoSWithPacketIdentifier::Level0 => {
                self.events.emit(Event::PublishReceived(publish));
            }
            QoSWithPacketIdentifier::Level1(packet_id) => {
                self.acknowledged.enqueue(PubackReply(packet_id), now)?;
                self.events.emit(Event::PublishReceived(publish));
                // nothing ever acknowledges a PUBACK
                self.acknowledged.try_finalize(packet_id);
            }
            QoSWithPacketIdentifier::Level2(packet_id) => {
                if publish.dup() && self.await_pubrel.contains(packet_id) {
                    debug!("duplicate PUBLISH #{packet_id}, PUBREC sent again");
                }
                self.await_pubrel
                    .enqueue(PubrecReply { publish, packet_id }, now)?;
            }
        }
        Ok(())
    }

    /// Releases a QoS 2 message. PUBCOMP is sent even when nothing matches
    /// so the broker stops retrying.
    pub fn handle_pubrel(&self, packet: &PubrelPacket, now: Instant) -> Result<(), Error> {
        let packet_id = packet.packet_identifier();
        match self.await_pubrel.try_finalize(packet_id) {
            Some(context) => {
                let PubrecReply { publish, .. } = context.into_exchange();
                self.events.emit(Event::PublishReceived(publish));
            }
            None => {
                debug!("PUBREL #{packet_id} without a pending PUBREC");
            }
        }
        self.outbound.send_at(PubcompPacket::new(packet_id), now)
    }

    pub fn tick(&self, now: Instant) -> Result<(), Error> {
        self.acknowledged.tick(now)?;
        for context in self.await_pubrel.tick(now)? {
            warn!(
                "QoS 2 message #{} never released, dropped",
                context.exchange().packet_id()
            );
        }
        Ok(())
    }

    pub fn pending_release(&self) -> usize {
        self.await_pubrel.len()
    }

    pub fn reset(&self) {
        self.acknowledged.reset();
        let dropped = self.await_pubrel.reset().len();
        if dropped > 0 {
            debug!("dropped {dropped} unreleased incoming message(s)");
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use courier_codec::common::TopicName;
    use kanal::AsyncReceiver;

    use super::*;
    use crate::event;

    fn machine() -> (
        IncomingPublish,
        AsyncReceiver<VariablePacket>,
        AsyncReceiver<Event>,
    ) {
        let (outbound, packets) = Outbound::channel();
        let (sender, events) = event::channel();
        let policy = RetryPolicy::new(Duration::from_secs(5), 3);
        (IncomingPublish::new(policy, outbound, sender), packets, events)
    }

    fn publish(qos: QoSWithPacketIdentifier) -> PublishPacket {
        PublishPacket::new(TopicName::new("sensors/temp").unwrap(), qos, "21.5")
    }

    #[test]
    fn qos0_delivered_without_reply() {
        let (machine, packets, events) = machine();
        let packet = publish(QoSWithPacketIdentifier::Level0);
        machine.handle_publish(packet.clone(), Instant::now()).unwrap();

        assert_eq!(packets.try_recv().unwrap(), None);
        assert_eq!(events.try_recv().unwrap(), Some(Event::PublishReceived(packet)));
    }

    #[test]
    fn qos1_acknowledged_and_delivered() {
        let (machine, packets, events) = machine();
        let packet = publish(QoSWithPacketIdentifier::Level1(11));
        let t0 = Instant::now();
        machine.handle_publish(packet.clone(), t0).unwrap();

        assert_eq!(
            packets.try_recv().unwrap(),
            Some(VariablePacket::PubackPacket(PubackPacket::new(11)))
        );
        assert_eq!(events.try_recv().unwrap(), Some(Event::PublishReceived(packet)));
        assert!(machine.acknowledged.is_empty());

        // the PUBACK is not resent
        machine.tick(t0 + Duration::from_secs(30)).unwrap();
        assert_eq!(packets.try_recv().unwrap(), None);
    }

    #[test]
    fn qos2_delivered_on_pubrel() {
        let (machine, packets, events) = machine();
        let packet = publish(QoSWithPacketIdentifier::Level2(12));
        let now = Instant::now();
        machine.handle_publish(packet.clone(), now).unwrap();

        assert_eq!(
            packets.try_recv().unwrap(),
            Some(VariablePacket::PubrecPacket(PubrecPacket::new(12)))
        );
        assert_eq!(events.try_recv().unwrap(), None);
        assert_eq!(machine.pending_release(), 1);

        machine.handle_pubrel(&PubrelPacket::new(12), now).unwrap();
        assert_eq!(
            packets.try_recv().unwrap(),
            Some(VariablePacket::PubcompPacket(PubcompPacket::new(12)))
        );
        assert_eq!(events.try_recv().unwrap(), Some(Event::PublishReceived(packet)));
        assert_eq!(machine.pending_release(), 0);
    }

    #[test]
    fn unmatched_pubrel_still_completes() {
        let (machine, packets, events) = machine();
        machine
            .handle_pubrel(&PubrelPacket::new(40), Instant::now())
            .unwrap();

        assert_eq!(
            packets.try_recv().unwrap(),
            Some(VariablePacket::PubcompPacket(PubcompPacket::new(40)))
        );
        assert_eq!(events.try_recv().unwrap(), None);
    }

    #[test]
    fn pubrec_resent_until_released() {
        let (machine, packets, _events) = machine();
        let t0 = Instant::now();
        machine
            .handle_publish(publish(QoSWithPacketIdentifier::Level2(3)), t0)
            .unwrap();
        machine.tick(t0 + Duration::from_secs(6)).unwrap();

        let mut count = 0;
        while let Ok(Some(packet)) = packets.try_recv() {
            assert_eq!(packet, VariablePacket::PubrecPacket(PubrecPacket::new(3)));
            count += 1;
        }
        assert_eq!(count, 2);
    }
}
