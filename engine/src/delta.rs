//! Delta value types: the computed transformation between two snapshots.
//!
//! A delta is the full output of a reconciliation pass. Deletion indices
//! address the source sequence, insertion indices the target sequence, and
//! move/reload pairs carry one index into each. Consumers that replay a
//! delta against live state should process deletions highest-first and
//! insertions lowest-first to avoid index shifting.

use serde::{Deserialize, Serialize};

/// A source/target index pairing for a moved or reloaded element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexPair {
    /// Index into the source sequence.
    pub from: usize,
    /// Index into the target sequence.
    pub to: usize,
}

impl IndexPair {
    /// Create a new index pairing.
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }
}

/// Position of an item inside a sectioned collection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct IndexPath {
    /// Index of the owning section.
    pub section: usize,
    /// Offset of the item within its section.
    pub item: usize,
}

impl IndexPath {
    /// Create a new item position.
    pub fn new(section: usize, item: usize) -> Self {
        Self { section, item }
    }
}

/// A source/target position pairing for a sectioned collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexPathPair {
    /// Position in the source coordinate space.
    pub from: IndexPath,
    /// Position in the target coordinate space.
    pub to: IndexPath,
}

impl IndexPathPair {
    /// Create a new position pairing.
    pub fn new(from: IndexPath, to: IndexPath) -> Self {
        Self { from, to }
    }
}

/// The computed transformation from one flat sequence to another.
///
/// - `deletions`: indices into the source sequence, ascending.
/// - `insertions`: indices into the target sequence, ascending.
/// - `reloads`: pairs whose identity matched in place but whose content
///   differs.
/// - `moves`: pairs whose identity matched at a different position.
///
/// An element appears in at most one of `reloads`/`moves`: a repositioned
/// element whose content also changed is recorded as a move only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDelta {
    /// Source indices of removed elements.
    pub deletions: Vec<usize>,
    /// Target indices of added elements.
    pub insertions: Vec<usize>,
    /// In-place content changes.
    pub reloads: Vec<IndexPair>,
    /// Position changes.
    pub moves: Vec<IndexPair>,
}

impl IndexDelta {
    /// A delta with no changes. Also serves as the sentinel a pipeline
    /// returns when a threshold suppresses per-element change tracking.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Total number of recorded changes across all four lists.
    pub fn change_count(&self) -> usize {
        self.deletions.len() + self.insertions.len() + self.reloads.len() + self.moves.len()
    }

    /// Whether the delta records any change at all.
    pub fn has_changes(&self) -> bool {
        self.change_count() > 0
    }

    /// Replay this delta against the data it was computed from, producing
    /// the reordered sequence.
    ///
    /// `source` and `target` must be the sequences the delta was computed
    /// between; for a delta produced by [`crate::diff()`], the result equals
    /// `target`. Inserted, moved, and reloaded positions take target values
    /// (a moved element may also carry a content change).
    pub fn apply<T: Clone>(&self, source: &[T], target: &[T]) -> Vec<T> {
        let mut keep = vec![true; source.len()];
        for &index in &self.deletions {
            keep[index] = false;
        }
        for pair in &self.moves {
            keep[pair.from] = false;
        }

        let mut result: Vec<Option<T>> = vec![None; target.len()];
        for &index in &self.insertions {
            result[index] = Some(target[index].clone());
        }
        for pair in &self.moves {
            result[pair.to] = Some(target[pair.to].clone());
        }

        // Surviving elements fill the remaining slots in source order; the
        // open slots ascend with them, so each lands at its target index.
        let mut survivors = source
            .iter()
            .enumerate()
            .filter(|(index, _)| keep[*index])
            .map(|(_, element)| element);
        for slot in result.iter_mut() {
            if slot.is_none() {
                *slot = survivors.next().cloned();
            }
        }

        for pair in &self.reloads {
            result[pair.to] = Some(target[pair.to].clone());
        }

        result.into_iter().flatten().collect()
    }
}

/// The computed transformation between two sectioned snapshots, expressed in
/// (section, item) coordinates.
///
/// Source positions are valid in the coordinate space that exists after
/// section-level deletions and moves have settled but before section
/// insertions land; target positions are valid in the final space. See
/// [`crate::section::diff_sections`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexPathDelta {
    /// Source positions of removed items.
    pub deletions: Vec<IndexPath>,
    /// Target positions of added items.
    pub insertions: Vec<IndexPath>,
    /// In-place content changes.
    pub reloads: Vec<IndexPathPair>,
    /// Position changes.
    pub moves: Vec<IndexPathPair>,
}

impl IndexPathDelta {
    /// A delta with no changes.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Total number of recorded changes across all four lists.
    pub fn change_count(&self) -> usize {
        self.deletions.len() + self.insertions.len() + self.reloads.len() + self.moves.len()
    }

    /// Whether the delta records any change at all.
    pub fn has_changes(&self) -> bool {
        self.change_count() > 0
    }
}
