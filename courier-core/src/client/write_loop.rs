use std::io;

use courier_codec::packet::VariablePacket;
use futures::SinkExt as _;
use kanal::{AsyncReceiver, AsyncSender};
use tokio::io::AsyncWrite;
use tokio_util::codec::{Encoder, FramedWrite};

use crate::{debug, error::DisconnectReason, trace, warn};

/// Drains the outbound channel into the transport. Returns after a
/// DISCONNECT has been flushed.
pub(crate) async fn write_loop<T, E>(
    mut writer: FramedWrite<T, E>,
    outbound_rx: AsyncReceiver<VariablePacket>,
    fatal_tx: AsyncSender<DisconnectReason>,
) where
    T: AsyncWrite + Unpin,
    E: Encoder<VariablePacket, Error = io::Error>,
{
    while let Ok(packet) = outbound_rx.recv().await {
        trace!("write {packet}");
        let disconnect = matches!(packet, VariablePacket::DisconnectPacket(_));

        let result = if disconnect || outbound_rx.is_empty() {
            writer.send(packet).await
        } else {
            writer.feed(packet).await
        };
        if let Err(err) = result {
            warn!("write packet: {err}");
            let _ = fatal_tx.try_send(DisconnectReason::Transport(err.to_string()));
            return;
        }

        if disconnect {
            if let Err(err) = writer.close().await {
                debug!("close writer: {err}");
            }
            return;
        }
    }
    debug!("outbound channel closed");
}
