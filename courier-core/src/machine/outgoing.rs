//! Publishes sent by the application.

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
    tracker::{ResendTracker, Retransmit, RetryPolicy, TransmissionContext},
    warn,
};

/// A QoS 1 or 2 publish waiting for its first acknowledgement
#[derive(Debug, Clone)]
pub struct PublishExchange {
    publish: PublishPacket,
    packet_id: u16,
}

impl PublishExchange {
    pub fn publish(&self) -> &PublishPacket {
        &self.publish
    }
}

impl Retransmit for PublishExchange {
    fn packet_id(&self) -> u16 {
        self.packet_id
    }

    fn packet_for_attempt(&self, attempt: u32) -> VariablePacket {
        let mut publish = self.publish.clone();
        publish.set_dup(attempt > 1);
        publish.into()
    }
}

/// PUBREL of a QoS 2 publish, keeps the publish it releases
#[derive(Debug, Clone)]
pub struct ReleaseExchange {
    publish: PublishPacket,
    packet_id: u16,
}

impl ReleaseExchange {
    pub fn publish(&self) -> &PublishPacket {
        &self.publish
    }
}

impl Retransmit for ReleaseExchange {
    fn packet_id(&self) -> u16 {
        self.packet_id
    }

    fn packet_for_attempt(&self, _attempt: u32) -> VariablePacket {
        PubrelPacket::new(self.packet_id).into()
    }
}

pub struct OutgoingPublish {
    await_puback: ResendTracker<PublishExchange>,
    await_pubrec: ResendTracker<PublishExchange>,
    await_pubcomp: ResendTracker<ReleaseExchange>,
    outbound: Outbound,
    events: EventSender,
}

impl OutgoingPublish {
    pub(crate) fn new(policy: RetryPolicy, outbound: Outbound, events: EventSender) -> Self {
        Self {
            await_puback: ResendTracker::new("await-puback", policy, outbound.clone()),
            await_pubrec: ResendTracker::new("await-pubrec", policy, outbound.clone()),
            await_pubcomp: ResendTracker::new("await-pubcomp", policy, outbound.clone()),
            outbound,
            events,
        }
    }

    pub fn publish(&self, publish: PublishPacket, now: Instant) -> Result<(), Error> {
        match publish.qos() {
            QoSWithPacketIdentifier::Level0 => {
                self.outbound.send_at(publish, now)?;
                self.events.emit(Event::Published {
                    packet_id: 0,
                    succeeded: true,
                });
                Ok(())
            }
            QoSWithPacketIdentifier::Level1(packet_id) => self
                .await_puback
                .enqueue(PublishExchange { publish, packet_id }, now),
            QoSWithPacketIdentifier::Level2(packet_id) => self
                .await_pubrec
                .enqueue(PublishExchange { publish, packet_id }, now),
        }
    }

    pub fn handle_puback(&self, packet: &PubackPacket) {
        let packet_id = packet.packet_identifier();
        match self.await_puback.try_finalize(packet_id) {
            Some(_) => self.published(packet_id, true),
            None => {
                warn!("rogue PUBACK #{packet_id} discarded");
            }
        }
    }

    /// Moves a QoS 2 publish from awaiting PUBREC to awaiting PUBCOMP.
    ///
    /// A repeated PUBREC for an exchange already awaiting PUBCOMP restarts
    /// its PUBREL with fresh attempt bookkeeping.
    pub fn handle_pubrec(&self, packet: &PubrecPacket, now: Instant) -> Result<(), Error> {
        let packet_id = packet.packet_identifier();
        if let Some(context) = self.await_pubrec.try_finalize(packet_id) {
            let PublishExchange { publish, packet_id } = context.into_exchange();
            return self
                .await_pubcomp
                .enqueue(ReleaseExchange { publish, packet_id }, now);
        }

        match self.await_pubcomp.take(packet_id) {
            Some(context) => {
                debug!("PUBREC #{packet_id} while awaiting PUBCOMP, restarting PUBREL");
                self.await_pubcomp.enqueue_context(context, now)
            }
            None => {
                warn!("rogue PUBREC #{packet_id} discarded");
                Ok(())
            }
        }
    }

    pub fn handle_pubcomp(&self, packet: &PubcompPacket) {
        let packet_id = packet.packet_identifier();
        match self.await_pubcomp.try_finalize(packet_id) {
            Some(_) => self.published(packet_id, true),
            None => {
                warn!("rogue PUBCOMP #{packet_id} discarded");
            }
        }
    }

    pub fn tick(&self, now: Instant) -> Result<(), Error> {
        let exhausted = self.await_puback.tick(now)?;
        self.exhausted(exhausted);
        let exhausted = self.await_pubrec.tick(now)?;
        self.exhausted(exhausted);
        let exhausted = self.await_pubcomp.tick(now)?;
        self.exhausted(exhausted);
        Ok(())
    }

    /// Whether `packet_id` belongs to an unfinished publish
    pub fn contains(&self, packet_id: u16) -> bool {
        self.await_puback.contains(packet_id)
            || self.await_pubrec.contains(packet_id)
            || self.await_pubcomp.contains(packet_id)
    }

    pub fn in_flight(&self) -> usize {
        self.await_puback.len() + self.await_pubrec.len() + self.await_pubcomp.len()
    }

    /// Forgets every unfinished publish, no event is raised
    pub fn reset(&self) {
        let dropped = self.await_puback.reset().len()
            + self.await_pubrec.reset().len()
            + self.await_pubcomp.reset().len();
        if dropped > 0 {
            debug!("dropped {dropped} unfinished outgoing publish(es)");
        }
    }

    fn exhausted<T: Retransmit>(&self, contexts: Vec<TransmissionContext<T>>) {
        for context in contexts {
            self.published(context.exchange().packet_id(), false);
        }
    }

    fn published(&self, packet_id: u16, succeeded: bool) {
        self.events.emit(Event::Published {
            packet_id,
            succeeded,
        });
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use courier_codec::common::TopicName;
    use kanal::AsyncReceiver;

    use super::*;
    use crate::event;

    struct Fixture {
        machine: OutgoingPublish,
        packets: AsyncReceiver<VariablePacket>,
        events: AsyncReceiver<Event>,
    }

    impl Fixture {
        fn new(max_retry_count: u32) -> Self {
            let (outbound, packets) = Outbound::channel();
            let (sender, events) = event::channel();
            let policy = RetryPolicy::new(Duration::from_secs(5), max_retry_count);
            Self {
                machine: OutgoingPublish::new(policy, outbound, sender),
                packets,
                events,
            }
        }

        fn sent(&self) -> Vec<VariablePacket> {
            let mut packets = Vec::new();
            while let Ok(Some(packet)) = self.packets.try_recv() {
                packets.push(packet);
            }
            packets
        }

        fn events(&self) -> Vec<Event> {
            let mut events = Vec::new();
            while let Ok(Some(event)) = self.events.try_recv() {
                events.push(event);
            }
            events
        }
    }

    fn publish(qos: QoSWithPacketIdentifier) -> PublishPacket {
        PublishPacket::new(TopicName::new("a/b").unwrap(), qos, "hello")
    }

    #[test]
    fn qos0_is_sent_untracked() {
        let fixture = Fixture::new(3);
        fixture
            .machine
            .publish(publish(QoSWithPacketIdentifier::Level0), Instant::now())
            .unwrap();

        assert_eq!(fixture.sent().len(), 1);
        assert_eq!(fixture.machine.in_flight(), 0);
        assert_eq!(
            fixture.events(),
            vec![Event::Published {
                packet_id: 0,
                succeeded: true
            }]
        );
    }

    #[test]
    fn qos1_resends_with_dup_then_fails() {
        let fixture = Fixture::new(3);
        let t0 = Instant::now();
        fixture
            .machine
            .publish(publish(QoSWithPacketIdentifier::Level1(4)), t0)
            .unwrap();

        for secs in [6, 12, 18, 24] {
            fixture.machine.tick(t0 + Duration::from_secs(secs)).unwrap();
        }

        let sent = fixture.sent();
        assert_eq!(sent.len(), 3);
        let dups = sent
            .iter()
            .map(|packet| match packet {
                VariablePacket::PublishPacket(publish) => publish.dup(),
                other => panic!("unexpected {other:?}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(dups, vec![false, true, true]);
        assert_eq!(
            fixture.events(),
            vec![Event::Published {
                packet_id: 4,
                succeeded: false
            }]
        );
        assert!(!fixture.machine.contains(4));
    }

    #[test]
    fn qos1_puback_completes() {
        let fixture = Fixture::new(3);
        fixture
            .machine
            .publish(publish(QoSWithPacketIdentifier::Level1(2)), Instant::now())
            .unwrap();
        fixture.machine.handle_puback(&PubackPacket::new(2));
        fixture.machine.handle_puback(&PubackPacket::new(2));

        assert_eq!(
            fixture.events(),
            vec![Event::Published {
                packet_id: 2,
                succeeded: true
            }]
        );
    }

    #[test]
    fn qos2_full_handshake() {
        let fixture = Fixture::new(3);
        let t0 = Instant::now();
        fixture
            .machine
            .publish(publish(QoSWithPacketIdentifier::Level2(5)), t0)
            .unwrap();

        let t1 = t0 + Duration::from_secs(4);
        fixture
            .machine
            .handle_pubrec(&PubrecPacket::new(5), t1)
            .unwrap();
        assert!(fixture.machine.await_pubcomp.contains(5));
        assert!(!fixture.machine.await_pubrec.contains(5));

        // still within the retry delay of the PUBREL
        fixture.machine.tick(t1 + Duration::from_secs(4)).unwrap();
        fixture.machine.handle_pubcomp(&PubcompPacket::new(5));

        let sent = fixture.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[0], VariablePacket::PublishPacket(_)));
        assert_eq!(sent[1], VariablePacket::PubrelPacket(PubrelPacket::new(5)));
        assert_eq!(
            fixture.events(),
            vec![Event::Published {
                packet_id: 5,
                succeeded: true
            }]
        );
        assert_eq!(fixture.machine.in_flight(), 0);
    }

    #[test]
    fn pubrel_gets_full_retry_budget_after_publish_retries() {
        let fixture = Fixture::new(3);
        let t0 = Instant::now();
        fixture
            .machine
            .publish(publish(QoSWithPacketIdentifier::Level2(6)), t0)
            .unwrap();
        fixture.machine.tick(t0 + Duration::from_secs(6)).unwrap();
        fixture.machine.tick(t0 + Duration::from_secs(12)).unwrap();

        let t1 = t0 + Duration::from_secs(13);
        fixture
            .machine
            .handle_pubrec(&PubrecPacket::new(6), t1)
            .unwrap();
        for secs in [6, 12] {
            fixture.machine.tick(t1 + Duration::from_secs(secs)).unwrap();
        }
        assert!(fixture.events().is_empty());
        fixture.machine.tick(t1 + Duration::from_secs(18)).unwrap();

        let kinds = fixture
            .sent()
            .iter()
            .map(|packet| match packet {
                VariablePacket::PublishPacket(_) => "PUBLISH",
                VariablePacket::PubrelPacket(_) => "PUBREL",
                other => panic!("unexpected {other:?}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec!["PUBLISH", "PUBLISH", "PUBLISH", "PUBREL", "PUBREL", "PUBREL"]
        );
        assert_eq!(
            fixture.events(),
            vec![Event::Published {
                packet_id: 6,
                succeeded: false
            }]
        );
        assert_eq!(fixture.machine.in_flight(), 0);
    }

    #[test]
    fn repeated_pubrec_restarts_pubrel() {
        let fixture = Fixture::new(2);
        let t0 = Instant::now();
        fixture
            .machine
            .publish(publish(QoSWithPacketIdentifier::Level2(8)), t0)
            .unwrap();
        fixture.machine.handle_pubrec(&PubrecPacket::new(8), t0).unwrap();
        fixture.machine.tick(t0 + Duration::from_secs(6)).unwrap();
        assert_eq!(fixture.sent().len(), 3);

        let t1 = t0 + Duration::from_secs(7);
        fixture.machine.handle_pubrec(&PubrecPacket::new(8), t1).unwrap();
        assert_eq!(
            fixture.sent(),
            vec![VariablePacket::PubrelPacket(PubrelPacket::new(8))]
        );

        // fresh bookkeeping, so the next tick resends instead of giving up
        fixture.machine.tick(t1 + Duration::from_secs(6)).unwrap();
        assert_eq!(fixture.sent().len(), 1);
        assert!(fixture.events().is_empty());
    }

    #[test]
    fn rogue_acks_are_discarded() {
        let fixture = Fixture::new(3);
        let now = Instant::now();
        fixture.machine.handle_puback(&PubackPacket::new(1));
        fixture.machine.handle_pubrec(&PubrecPacket::new(2), now).unwrap();
        fixture.machine.handle_pubcomp(&PubcompPacket::new(3));

        assert!(fixture.sent().is_empty());
        assert!(fixture.events().is_empty());
    }
}
