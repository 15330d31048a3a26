//! Serialized, coalescing calculation pipelines.
//!
//! A pipeline owns one collection's data and serializes reconciliation over
//! it: at most one calculation is in flight at a time, and updates submitted
//! while one is running coalesce in a single-slot [`CoalescingQueue`]. The
//! consumer of a finished calculation receives a commit handle carrying the
//! delta and the new data; only once the handle is applied (or dropped) does
//! the pipeline pop the queue and run the next merged update. Consumers
//! therefore never observe a calculation that started against data whose
//! previous delta they had not yet consumed.
//!
//! The reconciliation math itself is synchronous and lock-free; the mutex
//! guards only the data snapshot, the busy flag, and the queue. Submissions
//! are accepted from any thread, and a queued consumer fires on whichever
//! thread drives the preceding commit.

use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::delta::{IndexDelta, IndexPathDelta};
use crate::diff::diff;
use crate::identity::{Diffable, DiffableSection};
use crate::queue::{CoalescingQueue, PendingUpdate, Update, UpdateAction};
use crate::section::{diff_sections, SectionedDelta};

/// Thresholds gating per-element change tracking.
///
/// When a threshold trips, the calculation still produces and commits the
/// final data, but the returned delta is the empty sentinel — the consumer
/// is expected to fall back to a full refresh instead of replaying
/// per-element changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOptions {
    /// Skip per-element tracking outright when the current element count
    /// exceeds this. `None` disables the check.
    pub data_count_threshold: Option<usize>,
    /// Discard a computed delta whose change count exceeds this. `None`
    /// disables the check.
    pub delta_count_threshold: Option<usize>,
}

fn exceeds(threshold: Option<usize>, value: usize) -> bool {
    threshold.is_some_and(|limit| value > limit)
}

// ---------------------------------------------------------------------------
// Flat pipeline
// ---------------------------------------------------------------------------

type ListConsumer<T> = Box<dyn FnOnce(ListCommit<T>) + Send>;

struct ListShared<T: Diffable + PartialEq + Clone> {
    options: PipelineOptions,
    state: Mutex<ListState<T>>,
}

struct ListState<T: Diffable + PartialEq + Clone> {
    items: Vec<T>,
    busy: bool,
    queue: CoalescingQueue<T, ListConsumer<T>>,
}

/// Serialized reconciliation over a flat collection.
pub struct ListPipeline<T: Diffable + PartialEq + Clone> {
    shared: Arc<ListShared<T>>,
}

impl<T: Diffable + PartialEq + Clone> Clone for ListPipeline<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> ListPipeline<T>
where
    T: Diffable + PartialEq + Clone + Send + 'static,
{
    /// Create an empty pipeline.
    pub fn new(options: PipelineOptions) -> Self {
        Self::with_items(Vec::new(), options)
    }

    /// Create a pipeline seeded with initial data.
    pub fn with_items(items: Vec<T>, options: PipelineOptions) -> Self {
        Self {
            shared: Arc::new(ListShared {
                options,
                state: Mutex::new(ListState {
                    items,
                    busy: false,
                    queue: CoalescingQueue::new(),
                }),
            }),
        }
    }

    /// A snapshot of the current data.
    pub fn items(&self) -> Vec<T> {
        self.shared.state.lock().items.clone()
    }

    /// Number of elements currently held.
    pub fn len(&self) -> usize {
        self.shared.state.lock().items.len()
    }

    /// Whether the pipeline currently holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether no calculation is in flight.
    pub fn is_idle(&self) -> bool {
        !self.shared.state.lock().busy
    }

    /// Submit an update.
    ///
    /// If the pipeline is idle the calculation runs immediately on the
    /// calling thread and `consumer` fires with the result. If a calculation
    /// is in flight, the update is merged into the queue; a consumer
    /// displaced by the merge is dropped without firing, and the surviving
    /// one fires with the net result once the in-flight commit is consumed.
    pub fn submit<F>(&self, update: Update<T>, consumer: F)
    where
        F: FnOnce(ListCommit<T>) + Send + 'static,
    {
        let pending = PendingUpdate::new(update, Box::new(consumer) as ListConsumer<T>);
        let pending = {
            let mut state = self.shared.state.lock();
            if state.busy {
                tracing::debug!("calculation in flight, coalescing update");
                state.queue.set_next(pending);
                return;
            }
            state.busy = true;
            pending
        };
        run_list_calculation(&self.shared, pending);
    }
}

fn run_list_calculation<T>(shared: &Arc<ListShared<T>>, pending: PendingUpdate<T, ListConsumer<T>>)
where
    T: Diffable + PartialEq + Clone,
{
    let source = shared.state.lock().items.clone();
    let (data, delta) = calculate_list(&shared.options, &source, pending.data, pending.action);
    let commit = ListCommit {
        shared: Arc::clone(shared),
        delta,
        data,
        applied: false,
    };
    (pending.consumer)(commit);
}

fn calculate_list<T>(
    options: &PipelineOptions,
    source: &[T],
    submitted: Vec<T>,
    action: UpdateAction,
) -> (Vec<T>, IndexDelta)
where
    T: Diffable + PartialEq + Clone,
{
    let target = match action {
        UpdateAction::Replace => submitted,
        UpdateAction::Append => {
            let mut target = source.to_vec();
            target.extend(submitted);
            target
        }
    };

    let delta = if exceeds(options.data_count_threshold, source.len()) {
        tracing::debug!(
            count = source.len(),
            "element count over threshold, skipping per-element delta"
        );
        IndexDelta::empty()
    } else {
        let delta = diff(source, &target);
        if exceeds(options.delta_count_threshold, delta.change_count()) {
            tracing::debug!(
                changes = delta.change_count(),
                "change count over threshold, falling back to empty delta"
            );
            IndexDelta::empty()
        } else {
            delta
        }
    };

    (target, delta)
}

/// A finished flat calculation, waiting to be applied.
///
/// Applying commits the new data and lets the pipeline run the next queued
/// update. Dropping the handle without calling [`ListCommit::apply`] commits
/// as well, so a queued update can never be stranded.
pub struct ListCommit<T: Diffable + PartialEq + Clone> {
    shared: Arc<ListShared<T>>,
    delta: IndexDelta,
    data: Vec<T>,
    applied: bool,
}

impl<T: Diffable + PartialEq + Clone> ListCommit<T> {
    /// The computed delta.
    pub fn delta(&self) -> &IndexDelta {
        &self.delta
    }

    /// The data that will be committed.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Commit the new data and release the pipeline for the next update.
    pub fn apply(mut self) {
        self.commit();
    }

    fn commit(&mut self) {
        if self.applied {
            return;
        }
        self.applied = true;
        let next = {
            let mut state = self.shared.state.lock();
            state.items = mem::take(&mut self.data);
            let next = state.queue.pop();
            if next.is_none() {
                state.busy = false;
            }
            next
        };
        if let Some(pending) = next {
            tracing::debug!("running coalesced update");
            run_list_calculation(&self.shared, pending);
        }
    }
}

impl<T: Diffable + PartialEq + Clone> Drop for ListCommit<T> {
    fn drop(&mut self) {
        self.commit();
    }
}

// ---------------------------------------------------------------------------
// Sectioned pipeline
// ---------------------------------------------------------------------------

type SectionConsumer<S> = Box<dyn FnOnce(SectionCommit<S>) + Send>;

struct SectionShared<S: DiffableSection + PartialEq + Clone> {
    options: PipelineOptions,
    state: Mutex<SectionState<S>>,
}

struct SectionState<S: DiffableSection + PartialEq + Clone> {
    sections: Vec<S>,
    busy: bool,
    queue: CoalescingQueue<S, SectionConsumer<S>>,
}

/// Serialized reconciliation over a sectioned collection.
pub struct SectionPipeline<S: DiffableSection + PartialEq + Clone> {
    shared: Arc<SectionShared<S>>,
}

impl<S: DiffableSection + PartialEq + Clone> Clone for SectionPipeline<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> SectionPipeline<S>
where
    S: DiffableSection + PartialEq + Clone + Send + 'static,
{
    /// Create an empty pipeline.
    pub fn new(options: PipelineOptions) -> Self {
        Self::with_sections(Vec::new(), options)
    }

    /// Create a pipeline seeded with initial sections.
    pub fn with_sections(sections: Vec<S>, options: PipelineOptions) -> Self {
        Self {
            shared: Arc::new(SectionShared {
                options,
                state: Mutex::new(SectionState {
                    sections,
                    busy: false,
                    queue: CoalescingQueue::new(),
                }),
            }),
        }
    }

    /// A snapshot of the current sections.
    pub fn sections(&self) -> Vec<S> {
        self.shared.state.lock().sections.clone()
    }

    /// Whether no calculation is in flight.
    pub fn is_idle(&self) -> bool {
        !self.shared.state.lock().busy
    }

    /// Submit an update of whole sections.
    ///
    /// Scheduling behaves exactly like [`ListPipeline::submit`]: immediate
    /// when idle, coalesced when busy.
    pub fn submit<F>(&self, update: Update<S>, consumer: F)
    where
        F: FnOnce(SectionCommit<S>) + Send + 'static,
    {
        let pending = PendingUpdate::new(update, Box::new(consumer) as SectionConsumer<S>);
        let pending = {
            let mut state = self.shared.state.lock();
            if state.busy {
                tracing::debug!("calculation in flight, coalescing sectioned update");
                state.queue.set_next(pending);
                return;
            }
            state.busy = true;
            pending
        };
        run_section_calculation(&self.shared, pending);
    }
}

fn run_section_calculation<S>(
    shared: &Arc<SectionShared<S>>,
    pending: PendingUpdate<S, SectionConsumer<S>>,
) where
    S: DiffableSection + PartialEq + Clone,
{
    let source = shared.state.lock().sections.clone();
    let outcome = calculate_sections(&shared.options, &source, pending.data, pending.action);
    let commit = SectionCommit {
        shared: Arc::clone(shared),
        outcome,
        applied: false,
    };
    (pending.consumer)(commit);
}

fn calculate_sections<S>(
    options: &PipelineOptions,
    source: &[S],
    submitted: Vec<S>,
    action: UpdateAction,
) -> SectionedDelta<S>
where
    S: DiffableSection + PartialEq + Clone,
{
    let target = match action {
        UpdateAction::Replace => submitted,
        UpdateAction::Append => {
            let mut target = source.to_vec();
            target.extend(submitted);
            target
        }
    };

    let item_count: usize = source.iter().map(|section| section.items().len()).sum();
    if exceeds(options.data_count_threshold, item_count) {
        tracing::debug!(
            count = item_count,
            "item count over threshold, skipping per-element delta"
        );
        return SectionedDelta {
            section_delta: IndexDelta::empty(),
            item_delta: IndexPathDelta::empty(),
            sections: target
                .into_iter()
                .filter(|section| !section.items().is_empty())
                .collect(),
            deleted_items: Vec::new(),
        };
    }

    let mut outcome = diff_sections(source, &target);
    if exceeds(options.delta_count_threshold, outcome.change_count()) {
        tracing::debug!(
            changes = outcome.change_count(),
            "change count over threshold, falling back to empty delta"
        );
        outcome.section_delta = IndexDelta::empty();
        outcome.item_delta = IndexPathDelta::empty();
        outcome.deleted_items.clear();
    }
    outcome
}

/// A finished sectioned calculation, waiting to be applied.
///
/// Same contract as [`ListCommit`]: applying (or dropping) commits the
/// sanitized target sections and releases the pipeline.
pub struct SectionCommit<S: DiffableSection + PartialEq + Clone> {
    shared: Arc<SectionShared<S>>,
    outcome: SectionedDelta<S>,
    applied: bool,
}

impl<S: DiffableSection + PartialEq + Clone> SectionCommit<S> {
    /// The computed two-level delta, including the sections that will be
    /// committed and the items this transition removed.
    pub fn delta(&self) -> &SectionedDelta<S> {
        &self.outcome
    }

    /// Commit the new sections and release the pipeline for the next update.
    pub fn apply(mut self) {
        self.commit();
    }

    fn commit(&mut self) {
        if self.applied {
            return;
        }
        self.applied = true;
        let next = {
            let mut state = self.shared.state.lock();
            state.sections = mem::take(&mut self.outcome.sections);
            let next = state.queue.pop();
            if next.is_none() {
                state.busy = false;
            }
            next
        };
        if let Some(pending) = next {
            tracing::debug!("running coalesced sectioned update");
            run_section_calculation(&self.shared, pending);
        }
    }
}

impl<S: DiffableSection + PartialEq + Clone> Drop for SectionCommit<S> {
    fn drop(&mut self) {
        self.commit();
    }
}
