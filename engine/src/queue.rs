//! Pending-update coalescing.
//!
//! Consumers can submit updates faster than calculations drain. The queue
//! holds at most one pending update and merges every further submission into
//! it, so memory stays bounded by the largest single dataset and the next
//! calculation always sees the net effect of everything submitted while the
//! previous one was running.

use serde::{Deserialize, Serialize};

/// How a submitted dataset combines with the current data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateAction {
    /// The dataset is the complete new state.
    Replace,
    /// The dataset extends the current state at the end.
    Append,
}

/// A submitted dataset plus how it should combine with the current data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Update<T> {
    /// The submitted elements.
    pub data: Vec<T>,
    /// How the elements combine with the current data.
    pub action: UpdateAction,
}

impl<T> Update<T> {
    /// An update that replaces the current data outright.
    pub fn replace(data: Vec<T>) -> Self {
        Self {
            data,
            action: UpdateAction::Replace,
        }
    }

    /// An update that appends to the current data.
    pub fn append(data: Vec<T>) -> Self {
        Self {
            data,
            action: UpdateAction::Append,
        }
    }
}

/// A queued update together with the consumer waiting on its result.
#[derive(Debug)]
pub struct PendingUpdate<T, C> {
    /// The merged dataset so far.
    pub data: Vec<T>,
    /// The merged action.
    pub action: UpdateAction,
    /// The consumer that fires when this update runs. Consumers displaced
    /// during merging are dropped without firing.
    pub consumer: C,
}

impl<T, C> PendingUpdate<T, C> {
    /// Create a pending update from a submission.
    pub fn new(update: Update<T>, consumer: C) -> Self {
        Self {
            data: update.data,
            action: update.action,
            consumer,
        }
    }
}

/// Single-slot queue that merges back-to-back pending updates.
///
/// Merge rules:
/// - an incoming replace supersedes whatever is queued: it already encodes
///   the complete target state
/// - replace + append merges into a replace carrying both datasets, keeping
///   the incoming consumer
/// - append + append merges into one append carrying both datasets, keeping
///   the pending consumer
#[derive(Debug)]
pub struct CoalescingQueue<T, C> {
    slot: Option<PendingUpdate<T, C>>,
}

impl<T, C> Default for CoalescingQueue<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C> CoalescingQueue<T, C> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self { slot: None }
    }

    /// Queue an update, merging it with whatever is already pending.
    pub fn set_next(&mut self, incoming: PendingUpdate<T, C>) {
        self.slot = Some(match self.slot.take() {
            None => incoming,
            Some(pending) => merge(pending, incoming),
        });
    }

    /// Take the pending update, leaving the queue empty.
    pub fn pop(&mut self) -> Option<PendingUpdate<T, C>> {
        self.slot.take()
    }

    /// Whether anything is queued.
    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }
}

fn merge<T, C>(
    pending: PendingUpdate<T, C>,
    incoming: PendingUpdate<T, C>,
) -> PendingUpdate<T, C> {
    match (pending.action, incoming.action) {
        (_, UpdateAction::Replace) => incoming,
        (UpdateAction::Replace, UpdateAction::Append) => {
            let mut data = pending.data;
            data.extend(incoming.data);
            PendingUpdate {
                data,
                action: UpdateAction::Replace,
                consumer: incoming.consumer,
            }
        }
        (UpdateAction::Append, UpdateAction::Append) => {
            let mut data = pending.data;
            data.extend(incoming.data);
            PendingUpdate {
                data,
                action: UpdateAction::Append,
                consumer: pending.consumer,
            }
        }
    }
}
