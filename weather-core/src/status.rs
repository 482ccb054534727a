//! Single-slot published state for one fetch kind.
//!
//! Every invocation calls [`StatusChannel::begin`] (publishes `Loading`) and
//! later hands its [`Ticket`] back to [`StatusChannel::complete`] with the
//! outcome. A ticket dropped without being completed publishes an error, so
//! `Loading` is always followed by a terminal state. Observers read the latest
//! value through a `watch` receiver, or follow every transition through a
//! `broadcast` receiver.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use crate::model::{FetchKind, FetchStatus};

const EVENT_CAPACITY: usize = 32;

/// Published when a ticket is dropped before `complete` (panic, cancellation).
pub const ABANDONED_MESSAGE: &str = "Fetch task failed before completing";

/// How completions of overlapping fetches of the same kind are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlapPolicy {
    /// Only the most recently issued invocation may publish its result.
    #[default]
    LatestWins,
    /// Whatever completes last is published, even if it was issued earlier.
    LastCompletionWins,
}

/// A status tagged with the invocation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Published<T> {
    pub seq: u64,
    pub status: FetchStatus<T>,
}

#[derive(Debug)]
struct Shared<T> {
    kind: FetchKind,
    policy: OverlapPolicy,
    // Held across check-and-publish so `begin` cannot slip in between.
    issued: Mutex<u64>,
    latest: watch::Sender<Option<Published<T>>>,
    events: broadcast::Sender<Published<T>>,
}

impl<T: Clone> Shared<T> {
    fn finish(&self, seq: u64, status: FetchStatus<T>) -> bool {
        let issued = self.issued.lock();
        if self.policy == OverlapPolicy::LatestWins && seq != *issued {
            tracing::debug!(kind = %self.kind, seq, latest = *issued, "discarding stale completion");
            return false;
        }

        self.publish(Published { seq, status });
        true
    }

    fn publish(&self, published: Published<T>) {
        tracing::debug!(
            kind = %self.kind,
            seq = published.seq,
            loading = published.status.is_loading(),
            "publishing status"
        );
        // No subscribers is fine; the watch slot still holds the value.
        let _ = self.events.send(published.clone());
        self.latest.send_replace(Some(published));
    }
}

/// Proof that `Loading` was published for an invocation. Consumed by
/// `complete`, so one invocation can publish at most one terminal state.
/// Dropping it uncompleted publishes [`ABANDONED_MESSAGE`].
#[derive(Debug)]
#[must_use = "a ticket must be completed; dropping it publishes an error"]
pub struct Ticket<T: Clone> {
    seq: u64,
    shared: Arc<Shared<T>>,
    completed: bool,
}

impl<T: Clone> Ticket<T> {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl<T: Clone> Drop for Ticket<T> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        tracing::warn!(kind = %self.shared.kind, seq = self.seq, "fetch abandoned without a result");
        self.shared.finish(self.seq, FetchStatus::Error(ABANDONED_MESSAGE.to_string()));
    }
}

#[derive(Debug)]
pub struct StatusChannel<T> {
    shared: Arc<Shared<T>>,
}

impl<T> StatusChannel<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(kind: FetchKind, policy: OverlapPolicy) -> Self {
        let (latest, _) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Shared { kind, policy, issued: Mutex::new(0), latest, events };
        Self { shared: Arc::new(shared) }
    }

    pub fn kind(&self) -> FetchKind {
        self.shared.kind
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.shared.policy
    }

    /// Start an invocation: allocate its sequence number and publish `Loading`.
    pub fn begin(&self) -> Ticket<T> {
        let mut issued = self.shared.issued.lock();
        *issued += 1;
        let seq = *issued;
        self.shared.publish(Published { seq, status: FetchStatus::Loading });
        Ticket { seq, shared: Arc::clone(&self.shared), completed: false }
    }

    /// Publish the terminal status for `ticket`: `Ok` becomes `Success`,
    /// `Err` becomes `Error`. Returns `false` when the policy discarded it
    /// because a newer invocation has been issued.
    pub fn complete(&self, mut ticket: Ticket<T>, outcome: Result<T, String>) -> bool {
        ticket.completed = true;
        let status = match outcome {
            Ok(value) => FetchStatus::Success(value),
            Err(message) => FetchStatus::Error(message),
        };
        ticket.shared.finish(ticket.seq, status)
    }

    /// Latest published status; `None` until the first fetch (idle).
    pub fn current(&self) -> Option<FetchStatus<T>> {
        self.shared.latest.borrow().as_ref().map(|p| p.status.clone())
    }

    /// Latest published status together with its sequence number.
    pub fn current_published(&self) -> Option<Published<T>> {
        self.shared.latest.borrow().clone()
    }

    /// Highest sequence number issued so far (0 when idle).
    pub fn latest_seq(&self) -> u64 {
        *self.shared.issued.lock()
    }

    /// Receiver for the latest value. Intermediate states may be skipped.
    pub fn watch(&self) -> watch::Receiver<Option<Published<T>>> {
        self.shared.latest.subscribe()
    }

    /// Receiver that sees every transition published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Published<T>> {
        self.shared.events.subscribe()
    }
}
