//! Bookkeeping for exchanges waiting on an acknowledgement.
//!
//! A [`ResendTracker`] writes an exchange as soon as it is enqueued and keeps
//! it until [`ResendTracker::try_finalize`] matches the acknowledgement or
//! [`ResendTracker::tick`] runs out of attempts. Presence in the map means
//! "sent, not yet acknowledged".

use std::{fmt, time::Duration};

use courier_codec::packet::VariablePacket;
use foldhash::{HashMap, HashMapExt};
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::{debug, error::Error, outbound::Outbound, warn};

/// An exchange a tracker can write again
pub trait Retransmit {
    fn packet_id(&self) -> u16;

    /// Packet written for the given attempt, the first attempt is 1
    fn packet_for_attempt(&self, attempt: u32) -> VariablePacket;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry_delay: Duration,
    pub max_retry_count: u32,
}

impl RetryPolicy {
    pub fn new(retry_delay: Duration, max_retry_count: u32) -> Self {
        Self {
            retry_delay,
            max_retry_count,
        }
    }
}

#[derive(Debug)]
pub struct TransmissionContext<T> {
    exchange: T,
    attempt: u32,
    last_sent_at: Instant,
    finished: bool,
    succeeded: bool,
}

impl<T> TransmissionContext<T> {
    pub fn new(exchange: T, now: Instant) -> Self {
        Self {
            exchange,
            attempt: 0,
            last_sent_at: now,
            finished: false,
            succeeded: false,
        }
    }

    pub fn exchange(&self) -> &T {
        &self.exchange
    }

    pub fn into_exchange(self) -> T {
        self.exchange
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn last_sent_at(&self) -> Instant {
        self.last_sent_at
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    fn restart(&mut self, now: Instant) {
        self.attempt = 1;
        self.last_sent_at = now;
        self.finished = false;
        self.succeeded = false;
    }

    fn finish(&mut self, succeeded: bool) {
        self.finished = true;
        self.succeeded = succeeded;
    }
}

pub struct ResendTracker<T> {
    name: &'static str,
    policy: RetryPolicy,
    outbound: Outbound,
    contexts: Mutex<HashMap<u16, TransmissionContext<T>>>,
}

impl<T: Retransmit> ResendTracker<T> {
    pub fn new(name: &'static str, policy: RetryPolicy, outbound: Outbound) -> Self {
        Self {
            name,
            policy,
            outbound,
            contexts: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Writes the first attempt of `exchange` and starts tracking it
    pub fn enqueue(&self, exchange: T, now: Instant) -> Result<(), Error> {
        self.enqueue_context(TransmissionContext::new(exchange, now), now)
    }

    /// Tracks an existing context again with fresh attempt bookkeeping
    pub fn enqueue_context(
        &self,
        mut context: TransmissionContext<T>,
        now: Instant,
    ) -> Result<(), Error> {
        context.restart(now);
        let packet_id = context.exchange.packet_id();

        let mut contexts = self.contexts.lock();
        self.outbound
            .send_at(context.exchange.packet_for_attempt(1), now)?;
        if contexts.insert(packet_id, context).is_some() {
            warn!(
                "{} tracker: packet #{} replaced an outstanding exchange",
                self.name, packet_id
            );
        }
        Ok(())
    }

    /// Resends every exchange whose retry delay elapsed and returns the ones
    /// that ran out of attempts.
    ///
    /// An exchange is dropped once its last attempt has also waited a full
    /// retry delay, so exactly `max_retry_count` writes happen.
    pub fn tick(&self, now: Instant) -> Result<Vec<TransmissionContext<T>>, Error> {
        let mut contexts = self.contexts.lock();
        let mut exhausted = Vec::new();

        for (packet_id, context) in contexts.iter_mut() {
            if now.saturating_duration_since(context.last_sent_at) <= self.policy.retry_delay {
                continue;
            }

            if context.attempt >= self.policy.max_retry_count {
                context.finish(false);
                exhausted.push(*packet_id);
                continue;
            }

            context.attempt += 1;
            context.last_sent_at = now;
            debug!(
                "{} tracker: resend packet #{}, attempt {}",
                self.name, packet_id, context.attempt
            );
            self.outbound
                .send_at(context.exchange.packet_for_attempt(context.attempt), now)?;
        }

        let exhausted = exhausted
            .into_iter()
            .filter_map(|packet_id| contexts.remove(&packet_id))
            .collect::<Vec<_>>();
        if !exhausted.is_empty() {
            warn!(
                "{} tracker: {} exchange(s) exhausted {} attempts",
                self.name,
                exhausted.len(),
                self.policy.max_retry_count
            );
        }
        Ok(exhausted)
    }

    /// Removes the exchange acknowledged by `packet_id`, marked as succeeded
    pub fn try_finalize(&self, packet_id: u16) -> Option<TransmissionContext<T>> {
        let mut context = self.contexts.lock().remove(&packet_id)?;
        context.finish(true);
        Some(context)
    }

    /// Removes an exchange without completing it
    pub fn take(&self, packet_id: u16) -> Option<TransmissionContext<T>> {
        self.contexts.lock().remove(&packet_id)
    }

    pub fn contains(&self, packet_id: u16) -> bool {
        self.contexts.lock().contains_key(&packet_id)
    }

    pub fn len(&self) -> usize {
        self.contexts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.lock().is_empty()
    }

    /// Drops every outstanding exchange, returning them unfinished
    pub fn reset(&self) -> Vec<TransmissionContext<T>> {
        self.contexts.lock().drain().map(|(_, context)| context).collect()
    }
}

impl<T> fmt::Debug for ResendTracker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResendTracker")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("outstanding", &self.contexts.lock().len())
            .finish()
    }
}
