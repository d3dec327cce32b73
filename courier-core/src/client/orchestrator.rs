use std::{io, sync::Arc};

use backon::{ExponentialBuilder, Retryable};
use courier_codec::packet::{MqttDecoder, MqttEncoder};
use kanal::{AsyncReceiver, ReceiveError};
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{interval, timeout, Instant, MissedTickBehavior},
};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::{
    error,
    error::DisconnectReason,
    event::Event,
    info,
    machine::connect::ConnectWaiter,
    outbound::Outbound,
    transport::Connector,
    warn,
};

use super::{receive_loop::receive_loop, session::Session, write_loop::write_loop, Shared};

const FATAL_CAPACITY: usize = 4;

pub(crate) enum Command {
    Disconnect(oneshot::Sender<()>),
}

/// Owns the connection lifecycle: transport setup, the tick loop, teardown
/// and reconnection.
pub(crate) struct Orchestrator<C> {
    shared: Arc<Shared>,
    connector: C,
    commands: AsyncReceiver<Command>,
}

impl<C: Connector> Orchestrator<C> {
    pub fn new(shared: Arc<Shared>, connector: C, commands: AsyncReceiver<Command>) -> Self {
        Self {
            shared,
            connector,
            commands,
        }
    }

    pub async fn run(self, waiter: ConnectWaiter) {
        let address = self.shared.options.address().to_string();

        let stream = tokio::select! {
            stream = self.connector.connect() => stream,
            command = self.commands.recv() => {
                acknowledge(command);
                return;
            }
        };
        let mut stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                error!("connect to {address}: {err}");
                let _ = waiter.send(Err(err.into()));
                return;
            }
        };

        let mut waiter = Some(waiter);
        loop {
            let (reason, accepted, done) = self.serve(stream, waiter.take()).await;
            if let Some(done) = done {
                let _ = done.send(());
            }
            if !(accepted && reason.is_recoverable() && self.shared.options.reconnect()) {
                return;
            }

            info!("reconnecting to {address}");
            let reconnect = async {
                tokio::time::sleep(self.shared.options.retry_delay()).await;
                self.establish().await
            };
            stream = tokio::select! {
                stream = reconnect => match stream {
                    Ok(stream) => stream,
                    Err(err) => {
                        error!("reconnect to {address} failed: {err}");
                        self.shared
                            .events
                            .emit(Event::Disconnected(DisconnectReason::Transport(err.to_string())));
                        return;
                    }
                },
                command = self.commands.recv() => {
                    acknowledge(command);
                    return;
                }
            };
        }
    }

    async fn establish(&self) -> io::Result<C::Stream> {
        let options = &self.shared.options;
        (|| async { self.connector.connect().await })
            .retry(ExponentialBuilder::default().with_max_times(options.reconnect_attempts()))
            .sleep(tokio::time::sleep)
            .notify(|err, dur| {
                warn!(
                    "connect to {} failed: {err}, retrying after {dur:?}",
                    options.address()
                );
            })
            .await
    }

    /// Runs one connection until it is torn down
    async fn serve(
        &self,
        stream: C::Stream,
        waiter: Option<ConnectWaiter>,
    ) -> (DisconnectReason, bool, Option<oneshot::Sender<()>>) {
        let options = &self.shared.options;
        let (reader, writer) = tokio::io::split(stream);
        let (outbound, outbound_rx) = Outbound::channel();
        let (fatal_tx, fatal_rx) = kanal::bounded_async(FATAL_CAPACITY);
        let session = Arc::new(Session::new(options, outbound, self.shared.events.clone()));

        let mut write_task = tokio::spawn(write_loop(
            FramedWrite::new(writer, MqttEncoder::new()),
            outbound_rx,
            fatal_tx.clone(),
        ));
        let read_task = tokio::spawn(receive_loop(
            FramedRead::new(reader, MqttDecoder::new()),
            session.clone(),
            fatal_tx,
        ));
        self.shared.set_session(Some(session.clone()));

        let mut done = None;
        let reason = match session
            .connect
            .start(options.connect_packet(), waiter, Instant::now())
        {
            Ok(()) => {
                self.drive(&session, &fatal_rx, &mut write_task, &mut done)
                    .await
            }
            Err(err) => err.into(),
        };

        read_task.abort();
        write_task.abort();
        self.shared.set_session(None);
        let accepted = session.connect.is_accepted();
        session.reset();

        match reason {
            DisconnectReason::Requested => {
                info!("disconnected from {}", options.address());
            }
            ref reason => {
                warn!("connection to {} lost: {reason}", options.address());
            }
        }
        self.shared.events.emit(Event::Disconnected(reason.clone()));
        (reason, accepted, done)
    }

    async fn drive(
        &self,
        session: &Session,
        fatal_rx: &AsyncReceiver<DisconnectReason>,
        write_task: &mut JoinHandle<()>,
        done: &mut Option<oneshot::Sender<()>>,
    ) -> DisconnectReason {
        let mut ticker = interval(self.shared.options.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(reason) = session.tick(Instant::now()) {
                        break reason;
                    }
                }
                reason = fatal_rx.recv() => {
                    break reason.unwrap_or(DisconnectReason::TransportClosed);
                }
                command = self.commands.recv() => {
                    if let Ok(Command::Disconnect(tx)) = command {
                        *done = Some(tx);
                    }
                    self.close_gracefully(session, write_task).await;
                    break DisconnectReason::Requested;
                }
            }
        }
    }

    /// Queues DISCONNECT behind everything already queued and waits for the
    /// write loop to flush it
    async fn close_gracefully(&self, session: &Session, write_task: &mut JoinHandle<()>) {
        if session.send_disconnect().is_err() {
            return;
        }
        let limit = self.shared.options.retry_delay();
        if timeout(limit, write_task).await.is_err() {
            warn!("DISCONNECT not flushed within {limit:?}");
        }
    }
}

fn acknowledge(command: Result<Command, ReceiveError>) {
    if let Ok(Command::Disconnect(done)) = command {
        let _ = done.send(());
    }
}
