//! # Riffle Engine
//!
//! A reconciliation engine for ordered, identity-bearing collections.
//!
//! Given a previous snapshot of a collection and a new one, the engine
//! computes the minimal set of deletions, insertions, moves, and in-place
//! content changes (reloads) that transforms the former into the latter —
//! for flat sequences and for two-level section → item hierarchies. A
//! serialized, coalescing pipeline feeds rapid concurrent submissions
//! through the calculator one at a time, collapsing redundant intermediate
//! updates into their net effect.
//!
//! ## Design Principles
//!
//! - **No rendering**: the engine knows nothing about views. It computes
//!   index-level transformations and hands them to a caller-supplied
//!   consumer along with an apply step
//! - **Deterministic**: the same pair of snapshots always produces the same
//!   delta, in O(n)
//! - **Total**: the reconciliation math has no failure modes; malformed
//!   input (duplicate keys) degrades to an unspecified delta, never a panic
//! - **Caller-owned data**: inputs are borrowed or consumed per call and
//!   outputs are fresh values; the engine retains nothing beyond one
//!   collection snapshot per pipeline
//!
//! ## Core Concepts
//!
//! ### Identity
//!
//! Every element implements [`Diffable`]: a stable key that survives
//! content changes, plus `PartialEq` for content comparison. Same key at a
//! new position is a move; same key, same position, different content is a
//! reload. Sections implement [`DiffableSection`] on top.
//!
//! ### Deltas
//!
//! [`IndexDelta`] carries flat index changes, [`IndexPathDelta`] the
//! (section, item) equivalent produced by [`diff_sections`]. Both are plain
//! serializable values with a [`change_count`](IndexDelta::change_count)
//! and an [`empty`](IndexDelta::empty) sentinel.
//!
//! ### Coalescing
//!
//! [`ListPipeline`] and [`SectionPipeline`] serialize calculations per
//! collection. Updates submitted while one is in flight merge in a
//! single-slot [`CoalescingQueue`]: appends accumulate, a replace
//! supersedes everything queued before it.
//!
//! ## Quick Start
//!
//! ```rust
//! use riffle_engine::{diff, Diffable};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Task {
//!     id: u64,
//!     title: String,
//! }
//!
//! impl Diffable for Task {
//!     type Key = u64;
//!
//!     fn diff_key(&self) -> u64 {
//!         self.id
//!     }
//! }
//!
//! let before = vec![
//!     Task { id: 1, title: "write".into() },
//!     Task { id: 2, title: "review".into() },
//!     Task { id: 3, title: "ship".into() },
//! ];
//! let after = vec![
//!     Task { id: 2, title: "re-review".into() },
//!     Task { id: 1, title: "write".into() },
//!     Task { id: 4, title: "deploy".into() },
//! ];
//!
//! let delta = diff(&before, &after);
//! assert_eq!(delta.deletions, vec![2]);
//! assert_eq!(delta.insertions, vec![2]);
//! // Tasks 1 and 2 swapped; the renamed task 2 is covered by its move.
//! assert_eq!(delta.moves.len(), 2);
//! assert!(delta.reloads.is_empty());
//! assert_eq!(delta.change_count(), 4);
//!
//! // Replaying the delta against the old data yields the new data.
//! assert_eq!(delta.apply(&before, &after), after);
//! ```

pub mod delta;
pub mod diff;
pub mod error;
pub mod identity;
pub mod pipeline;
pub mod queue;
pub mod section;

// Re-export main types at crate root
pub use delta::{IndexDelta, IndexPair, IndexPath, IndexPathDelta, IndexPathPair};
pub use diff::{diff, diff_with, MoveDetection};
pub use error::{Error, Result};
pub use identity::{validate_keys, validate_section_keys, Diffable, DiffableSection};
pub use pipeline::{ListCommit, ListPipeline, PipelineOptions, SectionCommit, SectionPipeline};
pub use queue::{CoalescingQueue, PendingUpdate, Update, UpdateAction};
pub use section::{diff_sections, SectionedDelta};
