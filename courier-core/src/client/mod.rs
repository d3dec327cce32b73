//! Application-facing client.

use std::sync::Arc;

use courier_codec::{
    common::{QoSWithPacketIdentifier, QualityOfService, TopicFilter, TopicName, MAX_VAR_INT},
    packet::{PublishPacket, SubscribeReturnCode},
};
use kanal::AsyncSender;
use parking_lot::{Mutex, RwLock};
use tokio::{sync::oneshot, task::JoinHandle, time::Instant};

use crate::{
    config::ClientOptions,
    error::Error,
    event::{self, EventHandler, EventPublisher, EventSender},
    machine::subscribe::{SubscribeWaiter, UnsubscribeWaiter},
    transport::{Connector, TcpConnector},
};

use self::{
    orchestrator::{Command, Orchestrator},
    session::Session,
};

mod orchestrator;
mod receive_loop;
mod session;
mod write_loop;

/// State shared between the [`Client`] handle and its orchestrator task
pub(crate) struct Shared {
    options: ClientOptions,
    events: EventSender,
    session: RwLock<Option<Arc<Session>>>,
}

impl Shared {
    fn session(&self) -> Option<Arc<Session>> {
        self.session.read().clone()
    }

    fn set_session(&self, session: Option<Arc<Session>>) {
        *self.session.write() = session;
    }
}

struct Control {
    commands: AsyncSender<Command>,
    task: JoinHandle<()>,
}

/// MQTT v3.1.1 client.
///
/// Cheap calls ([`publish`](Client::publish), the `_nowait` variants) queue
/// the packet and return its identifier; outcomes arrive through the
/// [`EventHandler`]. [`subscribe`](Client::subscribe) and
/// [`unsubscribe`](Client::unsubscribe) additionally wait for the broker's
/// acknowledgement. Dropping the client closes the connection.
pub struct Client {
    shared: Arc<Shared>,
    publisher: Mutex<Option<EventPublisher>>,
    control: Mutex<Option<Control>>,
}

impl Client {
    pub fn new<H: EventHandler>(options: ClientOptions, handler: H) -> Result<Self, Error> {
        let options = options.into_validated()?;
        let (events, events_rx) = event::channel();
        Ok(Self {
            shared: Arc::new(Shared {
                options,
                events,
                session: RwLock::new(None),
            }),
            publisher: Mutex::new(Some(EventPublisher::new(events_rx, Arc::new(handler)))),
            control: Mutex::new(None),
        })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.shared.options
    }

    /// Opens the transport configured in the options and waits for CONNACK.
    ///
    /// Returns the session-present flag.
    pub async fn connect(&self) -> Result<bool, Error> {
        let address = self.shared.options.address();
        match self.shared.options.tls() {
            #[cfg(feature = "tls")]
            Some(tls) => {
                let connector = crate::transport::TlsConnector::new(address, tls)?;
                self.connect_with(connector).await
            }
            #[cfg(not(feature = "tls"))]
            Some(_) => Err(Error::InvalidOptions(
                "tls requested but the tls feature is disabled".to_string(),
            )),
            None => self.connect_with(TcpConnector::new(address)).await,
        }
    }

    /// Like [`connect`](Client::connect) over a caller supplied transport
    pub async fn connect_with<C: Connector>(&self, connector: C) -> Result<bool, Error> {
        let waiter = {
            let mut control = self.control.lock();
            if control.as_ref().is_some_and(|c| !c.task.is_finished()) {
                return Err(Error::AlreadyConnected);
            }
            if let Some(publisher) = self.publisher.lock().take() {
                tokio::spawn(publisher.run());
            }

            let (tx, rx) = oneshot::channel();
            let (commands_tx, commands_rx) = kanal::bounded_async(1);
            let orchestrator = Orchestrator::new(self.shared.clone(), connector, commands_rx);
            *control = Some(Control {
                commands: commands_tx,
                task: tokio::spawn(orchestrator.run(tx)),
            });
            rx
        };

        waiter.await.map_err(|_| Error::ConnectionLost)?
    }

    /// Sends DISCONNECT, flushes, and closes the connection without reconnecting
    pub async fn disconnect(&self) -> Result<(), Error> {
        let Some(control) = self.control.lock().take() else {
            return Err(Error::NotConnected);
        };
        if control.task.is_finished() {
            return Err(Error::NotConnected);
        }

        let (tx, rx) = oneshot::channel();
        if control.commands.send(Command::Disconnect(tx)).await.is_ok() {
            let _ = rx.await;
        }
        let _ = control.task.await;
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.shared
            .session()
            .is_some_and(|session| session.connect.is_accepted())
    }

    /// Publishes an application message and returns its packet identifier,
    /// 0 for QoS 0
    pub fn publish<P: Into<Vec<u8>>>(
        &self,
        topic_name: &str,
        payload: P,
        qos: QualityOfService,
        retain: bool,
    ) -> Result<u16, Error> {
        let topic_name = TopicName::new(topic_name)?;
        let payload = payload.into();
        let packet_id_len = if qos == QualityOfService::Level0 { 0 } else { 2 };
        if 2 + topic_name.len() + packet_id_len + payload.len() > MAX_VAR_INT as usize {
            return Err(Error::PayloadTooLarge(payload.len()));
        }

        let session = self.connected_session()?;
        let packet_id = match qos {
            QualityOfService::Level0 => 0,
            _ => session.next_packet_id(),
        };
        let mut packet = PublishPacket::new(
            topic_name,
            QoSWithPacketIdentifier::new(qos, packet_id),
            payload,
        );
        packet.set_retain(retain);
        session.outgoing.publish(packet, Instant::now())?;
        Ok(packet_id)
    }

    /// Subscribes and waits for SUBACK
    pub async fn subscribe(
        &self,
        topic_filter: &str,
        qos: QualityOfService,
    ) -> Result<SubscribeReturnCode, Error> {
        let (_, waiter) = self.start_subscribe(topic_filter, qos)?;
        waiter.await.map_err(|_| Error::ConnectionLost)?
    }

    /// Sends SUBSCRIBE and returns its packet identifier, the outcome is
    /// reported through [`EventHandler::on_subscribed`]
    pub fn subscribe_nowait(&self, topic_filter: &str, qos: QualityOfService) -> Result<u16, Error> {
        let (packet_id, _) = self.start_subscribe(topic_filter, qos)?;
        Ok(packet_id)
    }

    /// Unsubscribes and waits for UNSUBACK
    pub async fn unsubscribe(&self, topic_filter: &str) -> Result<(), Error> {
        let (_, waiter) = self.start_unsubscribe(topic_filter)?;
        waiter.await.map_err(|_| Error::ConnectionLost)?
    }

    pub fn unsubscribe_nowait(&self, topic_filter: &str) -> Result<u16, Error> {
        let (packet_id, _) = self.start_unsubscribe(topic_filter)?;
        Ok(packet_id)
    }

    fn start_subscribe(
        &self,
        topic_filter: &str,
        qos: QualityOfService,
    ) -> Result<(u16, SubscribeWaiter), Error> {
        let topic_filter = TopicFilter::new(topic_filter)?;
        let session = self.connected_session()?;
        let packet_id = session.next_packet_id();
        let waiter = session
            .subscriptions
            .subscribe(packet_id, topic_filter, qos, Instant::now())?;
        Ok((packet_id, waiter))
    }

    fn start_unsubscribe(&self, topic_filter: &str) -> Result<(u16, UnsubscribeWaiter), Error> {
        let topic_filter = TopicFilter::new(topic_filter)?;
        let session = self.connected_session()?;
        let packet_id = session.next_packet_id();
        let waiter = session
            .subscriptions
            .unsubscribe(packet_id, topic_filter, Instant::now())?;
        Ok((packet_id, waiter))
    }

    fn connected_session(&self) -> Result<Arc<Session>, Error> {
        self.shared
            .session()
            .filter(|session| session.connect.is_accepted())
            .ok_or(Error::NotConnected)
    }
}
