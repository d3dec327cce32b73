//! Keep-alive. PINGREQ goes out once nothing was sent for a whole keep-alive
//! period; a missing PINGRESP within the retry delay marks the broker dead.

use std::time::Duration;

use courier_codec::packet::PingreqPacket;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::{debug, error::Error, outbound::Outbound, warn};

#[derive(Debug)]
struct PingState {
    awaiting_since: Option<Instant>,
    broker_alive: bool,
}

pub struct Ping {
    keep_alive: Duration,
    response_timeout: Duration,
    outbound: Outbound,
    state: Mutex<PingState>,
}

impl Ping {
    pub(crate) fn new(keep_alive: Duration, response_timeout: Duration, outbound: Outbound) -> Self {
        Self {
            keep_alive,
            response_timeout,
            outbound,
            state: Mutex::new(PingState {
                awaiting_since: None,
                broker_alive: true,
            }),
        }
    }

    pub fn tick(&self, now: Instant) -> Result<(), Error> {
        if self.keep_alive.is_zero() {
            return Ok(());
        }

        let mut state = self.state.lock();
        if !state.broker_alive {
            return Ok(());
        }

        match state.awaiting_since {
            Some(since) => {
                if now.saturating_duration_since(since) > self.response_timeout {
                    warn!("no PINGRESP within {:?}", self.response_timeout);
                    state.broker_alive = false;
                }
            }
            None => {
                let idle = now.saturating_duration_since(self.outbound.last_sent_at());
                if idle >= self.keep_alive {
                    debug!("idle for {idle:?}, sending PINGREQ");
                    self.outbound.send_at(PingreqPacket::new(), now)?;
                    state.awaiting_since = Some(now);
                }
            }
        }
        Ok(())
    }

    pub fn handle_pingresp(&self) {
        let mut state = self.state.lock();
        if state.awaiting_since.take().is_none() {
            debug!("PINGRESP without PINGREQ discarded");
        }
    }

    pub fn broker_alive(&self) -> bool {
        self.state.lock().broker_alive
    }

    pub fn awaiting_response(&self) -> bool {
        self.state.lock().awaiting_since.is_some()
    }
}

#[cfg(test)]
mod test {
    use courier_codec::packet::VariablePacket;
    use kanal::AsyncReceiver;

    use super::*;

    fn ping(keep_alive: u64) -> (Ping, Outbound, AsyncReceiver<VariablePacket>) {
        let (outbound, packets) = Outbound::channel();
        let ping = Ping::new(
            Duration::from_secs(keep_alive),
            Duration::from_secs(5),
            outbound.clone(),
        );
        (ping, outbound, packets)
    }

    #[test]
    fn pings_when_idle() {
        let (ping, outbound, packets) = ping(30);
        let t0 = outbound.last_sent_at();

        ping.tick(t0 + Duration::from_secs(29)).unwrap();
        assert_eq!(packets.try_recv().unwrap(), None);

        ping.tick(t0 + Duration::from_secs(30)).unwrap();
        assert_eq!(
            packets.try_recv().unwrap(),
            Some(VariablePacket::PingreqPacket(PingreqPacket::new()))
        );
        assert!(ping.awaiting_response());

        ping.handle_pingresp();
        assert!(!ping.awaiting_response());
        assert!(ping.broker_alive());
    }

    #[test]
    fn traffic_postpones_ping() {
        let (ping, outbound, packets) = ping(30);
        let t0 = outbound.last_sent_at();
        outbound
            .send_at(PingreqPacket::new(), t0 + Duration::from_secs(20))
            .unwrap();
        let _ = packets.try_recv();

        ping.tick(t0 + Duration::from_secs(40)).unwrap();
        assert_eq!(packets.try_recv().unwrap(), None);
    }

    #[test]
    fn missing_pingresp_kills_broker() {
        let (ping, outbound, _packets) = ping(10);
        let t0 = outbound.last_sent_at();
        ping.tick(t0 + Duration::from_secs(10)).unwrap();

        ping.tick(t0 + Duration::from_secs(15)).unwrap();
        assert!(ping.broker_alive());
        ping.tick(t0 + Duration::from_secs(16)).unwrap();
        assert!(!ping.broker_alive());
    }

    #[test]
    fn disabled_with_zero_keep_alive() {
        let (ping, outbound, packets) = ping(0);
        ping.tick(outbound.last_sent_at() + Duration::from_secs(3600))
            .unwrap();
        assert_eq!(packets.try_recv().unwrap(), None);
    }
}
