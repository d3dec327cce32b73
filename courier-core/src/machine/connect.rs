//! CONNECT / CONNACK handshake. One attempt per connection, no retry.

use std::time::Duration;

use courier_codec::packet::{ConnackPacket, ConnectPacket};
use parking_lot::Mutex;
use tokio::{sync::oneshot, time::Instant};

use crate::{
    error::{DisconnectReason, Error},
    outbound::Outbound,
};

pub(crate) type ConnectWaiter = oneshot::Sender<Result<bool, Error>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    AwaitingConnack { sent_at: Instant },
    Accepted { session_present: bool },
    Failed,
}

pub struct ConnectHandshake {
    timeout: Duration,
    outbound: Outbound,
    state: Mutex<HandshakeState>,
    waiter: Mutex<Option<ConnectWaiter>>,
}

impl ConnectHandshake {
    pub(crate) fn new(timeout: Duration, outbound: Outbound) -> Self {
        Self {
            timeout,
            outbound,
            state: Mutex::new(HandshakeState::Idle),
            waiter: Mutex::new(None),
        }
    }

    /// Sends CONNECT, `waiter` is resolved with the outcome
    pub(crate) fn start(
        &self,
        packet: ConnectPacket,
        waiter: Option<ConnectWaiter>,
        now: Instant,
    ) -> Result<(), Error> {
        let mut state = self.state.lock();
        if *state != HandshakeState::Idle {
            return Err(Error::AlreadyConnected);
        }
        *self.waiter.lock() = waiter;
        self.outbound.send_at(packet, now)?;
        *state = HandshakeState::AwaitingConnack { sent_at: now };
        Ok(())
    }

    /// Returns the session-present flag of an accepted connection
    pub fn handle_connack(&self, packet: &ConnackPacket) -> Result<bool, DisconnectReason> {
        let mut state = self.state.lock();
        if !matches!(*state, HandshakeState::AwaitingConnack { .. }) {
            return Err(DisconnectReason::ProtocolViolation(
                "unexpected CONNACK".to_string(),
            ));
        }

        let code = packet.connect_return_code();
        if code.is_accepted() {
            let session_present = packet.session_present();
            *state = HandshakeState::Accepted { session_present };
            self.resolve(Ok(session_present));
            Ok(session_present)
        } else {
            *state = HandshakeState::Failed;
            self.resolve(Err(Error::ConnectionRefused(code)));
            Err(DisconnectReason::ConnectionRefused(code))
        }
    }

    pub fn tick(&self, now: Instant) -> Result<(), DisconnectReason> {
        let mut state = self.state.lock();
        if let HandshakeState::AwaitingConnack { sent_at } = *state {
            if now.saturating_duration_since(sent_at) > self.timeout {
                *state = HandshakeState::Failed;
                self.resolve(Err(Error::ConnackTimeout(self.timeout)));
                return Err(DisconnectReason::ConnackTimeout);
            }
        }
        Ok(())
    }

    pub fn state(&self) -> HandshakeState {
        *self.state.lock()
    }

    pub fn is_accepted(&self) -> bool {
        matches!(*self.state.lock(), HandshakeState::Accepted { .. })
    }

    /// Fails a handshake still waiting when the connection goes away
    pub fn reset(&self) {
        let mut state = self.state.lock();
        if matches!(*state, HandshakeState::AwaitingConnack { .. }) {
            *state = HandshakeState::Failed;
        }
        self.resolve(Err(Error::ConnectionLost));
    }

    fn resolve(&self, result: Result<bool, Error>) {
        if let Some(waiter) = self.waiter.lock().take() {
            let _ = waiter.send(result);
        }
    }
}
