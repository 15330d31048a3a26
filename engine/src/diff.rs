//! Flat reconciliation between two ordered sequences.
//!
//! This is the core of the engine. Given a source and a target snapshot of
//! identity-bearing elements, it computes the deletions, insertions, moves,
//! and reloads that transform one into the other.
//!
//! # Algorithm
//!
//! 1. Build identity indexes for both snapshots (key → index)
//! 2. Deletions: source elements whose key is absent from the target
//! 3. Insertions: target elements whose key is absent from the source
//! 4. Walk the matched elements in source order, tracking each element's
//!    settled position — where it would land if only the deletions and
//!    insertions were applied. A matched element whose settled position
//!    differs from its target index is a move; one that stays put but whose
//!    content changed is a reload.
//!
//! Each deletion and insertion index is consumed exactly once across the
//! walk, so the whole pass is O(n). An element that both moved and changed
//! content is recorded as a move only.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::delta::{IndexDelta, IndexPair};
use crate::identity::Diffable;

/// Controls which matched pairs are recorded as moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MoveDetection {
    /// Record a move only when an element's settled position differs from
    /// its target index. Elements that stay put fall through to the reload
    /// check.
    #[default]
    Effective,
    /// Record every matched pair as a move, including elements whose settled
    /// position already equals their target index. No reloads are emitted in
    /// this mode. The sectioned orchestrator relies on it: item positions
    /// are judged in a coordinate space that shifts again once section
    /// insertions land, so stay-put pairs must survive until coordinates are
    /// translated.
    All,
}

/// Compute the delta that transforms `source` into `target`.
///
/// Identity comes from [`Diffable::diff_key`], content comparison from
/// `PartialEq`. Keys must be unique within each snapshot; see the
/// [`Diffable`] contract for what happens when they are not.
pub fn diff<T>(source: &[T], target: &[T]) -> IndexDelta
where
    T: Diffable + PartialEq,
{
    diff_with(source, target, MoveDetection::Effective)
}

/// Compute the delta that transforms `source` into `target` with an explicit
/// move-detection mode.
pub fn diff_with<T>(source: &[T], target: &[T], detection: MoveDetection) -> IndexDelta
where
    T: Diffable + PartialEq,
{
    let source_index: HashMap<T::Key, usize> = source
        .iter()
        .enumerate()
        .map(|(index, element)| (element.diff_key(), index))
        .collect();
    let target_index: HashMap<T::Key, usize> = target
        .iter()
        .enumerate()
        .map(|(index, element)| (element.diff_key(), index))
        .collect();

    let mut deletions = Vec::new();
    for (index, element) in source.iter().enumerate() {
        if !target_index.contains_key(&element.diff_key()) {
            deletions.push(index);
        }
    }

    let mut insertions = Vec::new();
    for (index, element) in target.iter().enumerate() {
        if !source_index.contains_key(&element.diff_key()) {
            insertions.push(index);
        }
    }

    // Settled-position walk over the matched elements, in source order.
    // Deletion indices strictly below the current source index shift it
    // down; insertion indices at or below the running settled position
    // shift it back up. Both cursors only ever advance.
    let mut reloads = Vec::new();
    let mut moves = Vec::new();
    let mut deletions_consumed = 0;
    let mut insertions_consumed = 0;
    for (from, element) in source.iter().enumerate() {
        let Some(&to) = target_index.get(&element.diff_key()) else {
            continue;
        };

        while deletions_consumed < deletions.len() && deletions[deletions_consumed] < from {
            deletions_consumed += 1;
        }
        let mut settled = from - deletions_consumed + insertions_consumed;
        while insertions_consumed < insertions.len()
            && insertions[insertions_consumed] <= settled
        {
            insertions_consumed += 1;
            settled += 1;
        }

        if settled != to || detection == MoveDetection::All {
            tracing::trace!(from, to, settled, "element moved");
            moves.push(IndexPair::new(from, to));
        } else if element != &target[to] {
            tracing::trace!(from, to, "element content changed");
            reloads.push(IndexPair::new(from, to));
        }
    }

    tracing::debug!(
        deletions = deletions.len(),
        insertions = insertions.len(),
        reloads = reloads.len(),
        moves = moves.len(),
        "reconciled snapshots"
    );

    IndexDelta {
        deletions,
        insertions,
        reloads,
        moves,
    }
}
