use std::sync::Arc;

use courier_codec::packet::{VariablePacket, VariablePacketError};
use futures::StreamExt as _;
use kanal::AsyncSender;
use tokio::{io::AsyncRead, time::Instant};
use tokio_util::codec::{Decoder, FramedRead};

use crate::{
    debug,
    error::DisconnectReason,
    event::Event,
    info, trace,
};

use super::session::Session;

/// Decodes packets until the transport fails or a packet breaks the
/// protocol, then reports the cause on `fatal_tx`.
pub(crate) async fn receive_loop<T, D>(
    mut reader: FramedRead<T, D>,
    session: Arc<Session>,
    fatal_tx: AsyncSender<DisconnectReason>,
) where
    T: AsyncRead + Unpin,
    D: Decoder<Item = VariablePacket, Error = VariablePacketError>,
{
    let reason = loop {
        let packet = match reader.next().await {
            None => break DisconnectReason::TransportClosed,
            Some(Err(VariablePacketError::IoError(err))) => {
                break DisconnectReason::Transport(err.to_string())
            }
            Some(Err(err)) => break DisconnectReason::ProtocolViolation(err.to_string()),
            Some(Ok(packet)) => packet,
        };

        trace!("read {packet}");
        if let Err(reason) = route(&session, packet, Instant::now()) {
            break reason;
        }
    };

    debug!("receive loop stopped: {reason}");
    let _ = fatal_tx.try_send(reason);
}

/// Hands one decoded packet to the machine that owns it
pub(crate) fn route(
    session: &Session,
    packet: VariablePacket,
    now: Instant,
) -> Result<(), DisconnectReason> {
    if let VariablePacket::ConnackPacket(connack) = &packet {
        let session_present = session.connect.handle_connack(connack)?;
        info!("connection accepted, session present: {session_present}");
        session.events.emit(Event::Connected { session_present });
        return Ok(());
    }

    if !session.connect.is_accepted() {
        return Err(DisconnectReason::ProtocolViolation(format!(
            "{packet} before CONNACK"
        )));
    }

    match packet {
        VariablePacket::PublishPacket(publish) => session.incoming.handle_publish(publish, now)?,
        VariablePacket::PubrelPacket(pubrel) => session.incoming.handle_pubrel(&pubrel, now)?,
        VariablePacket::PubackPacket(puback) => session.outgoing.handle_puback(&puback),
        VariablePacket::PubrecPacket(pubrec) => session.outgoing.handle_pubrec(&pubrec, now)?,
        VariablePacket::PubcompPacket(pubcomp) => session.outgoing.handle_pubcomp(&pubcomp),
        VariablePacket::SubackPacket(suback) => session.subscriptions.handle_suback(&suback),
        VariablePacket::UnsubackPacket(unsuback) => {
            session.subscriptions.handle_unsuback(&unsuback)
        }
        VariablePacket::PingrespPacket(_) => session.ping.handle_pingresp(),
        VariablePacket::ConnackPacket(_)
        | VariablePacket::ConnectPacket(_)
        | VariablePacket::SubscribePacket(_)
        | VariablePacket::UnsubscribePacket(_)
        | VariablePacket::PingreqPacket(_)
        | VariablePacket::DisconnectPacket(_) => {
            return Err(DisconnectReason::ProtocolViolation(format!(
                "server sent {packet}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use courier_codec::{
        common::{QoSWithPacketIdentifier, TopicName},
        control::ConnectReturnCode,
        packet::{
            ConnackPacket, ConnectPacket, MqttDecoder, PingreqPacket, PubackPacket, PublishPacket,
        },
    };
    use kanal::AsyncReceiver;
    use tokio::io::AsyncWriteExt as _;

    use super::*;
    use crate::{config::ClientOptions, event, outbound::Outbound};

    fn session() -> (Arc<Session>, AsyncReceiver<VariablePacket>, AsyncReceiver<Event>) {
        let (outbound, packets) = Outbound::channel();
        let (sender, events) = event::channel();
        let options = ClientOptions::new("broker:1883", "c1");
        let session = Session::new(&options, outbound, sender);
        session
            .connect
            .start(ConnectPacket::new("c1"), None, Instant::now())
            .unwrap();
        let _ = packets.try_recv();
        (Arc::new(session), packets, events)
    }

    fn accept(session: &Session) {
        let connack = ConnackPacket::new(false, ConnectReturnCode::ConnectionAccepted);
        route(session, connack.into(), Instant::now()).unwrap();
    }

    #[test]
    fn packets_before_connack_are_violations() {
        let (session, _packets, _events) = session();
        let result = route(&session, PubackPacket::new(1).into(), Instant::now());
        assert!(matches!(result, Err(DisconnectReason::ProtocolViolation(_))));
    }

    #[test]
    fn server_only_packets_are_violations() {
        let (session, _packets, events) = session();
        accept(&session);
        assert_eq!(
            events.try_recv().unwrap(),
            Some(Event::Connected {
                session_present: false
            })
        );

        let result = route(&session, PingreqPacket::new().into(), Instant::now());
        assert!(matches!(result, Err(DisconnectReason::ProtocolViolation(_))));
    }

    #[test]
    fn publish_is_delivered() {
        let (session, packets, events) = session();
        accept(&session);
        let _ = events.try_recv();

        let publish = PublishPacket::new(
            TopicName::new("a/b").unwrap(),
            QoSWithPacketIdentifier::Level1(9),
            "x",
        );
        route(&session, publish.clone().into(), Instant::now()).unwrap();
        assert_eq!(
            packets.try_recv().unwrap(),
            Some(VariablePacket::PubackPacket(PubackPacket::new(9)))
        );
        assert_eq!(events.try_recv().unwrap(), Some(Event::PublishReceived(publish)));
    }

    #[tokio::test]
    async fn malformed_input_is_fatal() {
        let (session, _packets, _events) = session();
        let (client, mut server) = tokio::io::duplex(64);
        let (fatal_tx, fatal_rx) = kanal::bounded_async(1);

        // CONNACK with return code 6
        server.write_all(b"\x20\x02\x00\x06").await.unwrap();
        receive_loop(FramedRead::new(client, MqttDecoder::new()), session, fatal_tx).await;

        assert!(matches!(
            fatal_rx.recv().await.unwrap(),
            DisconnectReason::ProtocolViolation(_)
        ));
    }

    #[tokio::test]
    async fn peer_close_is_fatal() {
        let (session, _packets, _events) = session();
        let (client, server) = tokio::io::duplex(64);
        let (fatal_tx, fatal_rx) = kanal::bounded_async(1);
        drop(server);

        receive_loop(FramedRead::new(client, MqttDecoder::new()), session, fatal_tx).await;
        assert_eq!(
            fatal_rx.recv().await.unwrap(),
            DisconnectReason::TransportClosed
        );
    }
}
