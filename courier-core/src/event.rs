//! Outcomes reported to the application.
//!
//! State machines emit [`Event`]s into an unbounded channel; the
//! [`EventPublisher`] task hands them to the [`EventHandler`] so a slow
//! handler never stalls the protocol timers.

use std::sync::Arc;

use courier_codec::{
    common::TopicFilter,
    packet::{PublishPacket, SubscribeReturnCode},
};
use kanal::{AsyncReceiver, Sender};

use crate::{debug, error::DisconnectReason};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// An application message from the broker
    PublishReceived(PublishPacket),
    /// An outgoing publish finished, `packet_id` is 0 for QoS 0
    Published { packet_id: u16, succeeded: bool },
    Subscribed {
        packet_id: u16,
        topic_filter: TopicFilter,
        return_code: SubscribeReturnCode,
    },
    Unsubscribed {
        packet_id: u16,
        topic_filter: TopicFilter,
    },
    Connected { session_present: bool },
    Disconnected(DisconnectReason),
}

/// Application callbacks. Every method defaults to doing nothing.
pub trait EventHandler: Send + Sync + 'static {
    fn on_publish_received(&self, _publish: &PublishPacket) {}

    fn on_published(&self, _packet_id: u16, _succeeded: bool) {}

    fn on_subscribed(
        &self,
        _packet_id: u16,
        _topic_filter: &TopicFilter,
        _return_code: SubscribeReturnCode,
    ) {
    }

    fn on_unsubscribed(&self, _packet_id: u16, _topic_filter: &TopicFilter) {}

    fn on_connected(&self, _session_present: bool) {}

    fn on_disconnected(&self, _reason: &DisconnectReason) {}

    /// Entry point of the publisher task, dispatches to the methods above
    fn handle(&self, event: Event) {
        match event {
            Event::PublishReceived(publish) => self.on_publish_received(&publish),
            Event::Published {
                packet_id,
                succeeded,
            } => self.on_published(packet_id, succeeded),
            Event::Subscribed {
                packet_id,
                topic_filter,
                return_code,
            } => self.on_subscribed(packet_id, &topic_filter, return_code),
            Event::Unsubscribed {
                packet_id,
                topic_filter,
            } => self.on_unsubscribed(packet_id, &topic_filter),
            Event::Connected { session_present } => self.on_connected(session_present),
            Event::Disconnected(reason) => self.on_disconnected(&reason),
        }
    }
}

impl EventHandler for () {}

/// Forwards every event into a channel
impl EventHandler for Sender<Event> {
    fn handle(&self, event: Event) {
        if self.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }
}

#[derive(Clone)]
pub(crate) struct EventSender(Sender<Event>);

impl EventSender {
    pub fn emit(&self, event: Event) {
        if self.0.send(event).is_err() {
            debug!("event publisher stopped, event dropped");
        }
    }
}

pub(crate) fn channel() -> (EventSender, AsyncReceiver<Event>) {
    let (tx, rx) = kanal::unbounded();
    (EventSender(tx), rx.to_async())
}

pub(crate) struct EventPublisher {
    rx: AsyncReceiver<Event>,
    handler: Arc<dyn EventHandler>,
}

impl EventPublisher {
    pub fn new(rx: AsyncReceiver<Event>, handler: Arc<dyn EventHandler>) -> Self {
        Self { rx, handler }
    }

    /// Runs until every [`EventSender`] is dropped
    pub async fn run(self) {
        while let Ok(event) = self.rx.recv().await {
            self.handler.handle(event);
        }
        debug!("event publisher finished");
    }
}
