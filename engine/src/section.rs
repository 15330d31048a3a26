//! Sectioned reconciliation: a two-level (section → item) hierarchy.
//!
//! Section-level and item-level changes cannot be computed independently:
//! section deletions, moves, and insertions change the coordinate space item
//! positions are expressed in. The orchestrator therefore works through
//! three snapshots:
//!
//! 1. Sanitize the target: sections without items carry nothing
//!    reconcilable and are dropped
//! 2. Compute the section-level delta over the section sequences
//! 3. Build the *intermediate* snapshot: surviving source sections,
//!    reordered to target order, still carrying their source items — the
//!    state once section deletions and moves have settled
//! 4. Build the target snapshot *without inserted sections* — the same
//!    coordinate space as the intermediate one
//! 5. Reconcile the two flattened item sequences with
//!    [`MoveDetection::All`], then translate flat indices into
//!    (section, item) coordinates: source positions against the
//!    intermediate snapshot, target positions against the no-insertion
//!    snapshot with the section number shifted past the sections inserted
//!    at or before it
//! 6. Reclassify moves that land in their own slot: a content change
//!    becomes a reload, an identical pair disappears
//!
//! Item positions are judged relative to a coordinate space that shifts
//! again once section insertions land, which is why stay-put pairs must
//! survive the flat pass until coordinates are translated.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::delta::{IndexDelta, IndexPath, IndexPathDelta, IndexPathPair};
use crate::diff::{diff, diff_with, MoveDetection};
use crate::identity::{Diffable, DiffableSection};

/// Result of sectioned reconciliation.
#[derive(Clone, PartialEq)]
pub struct SectionedDelta<S: DiffableSection> {
    /// Section-level changes, as indices into the section sequences.
    pub section_delta: IndexDelta,
    /// Item-level changes in (section, item) coordinates.
    pub item_delta: IndexPathDelta,
    /// The sanitized target sections: the state to keep once the delta has
    /// been consumed.
    pub sections: Vec<S>,
    /// Items removed by this transition: the contents of deleted sections
    /// followed by individually deleted items.
    pub deleted_items: Vec<S::Item>,
}

impl<S> fmt::Debug for SectionedDelta<S>
where
    S: DiffableSection + fmt::Debug,
    S::Item: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectionedDelta")
            .field("section_delta", &self.section_delta)
            .field("item_delta", &self.item_delta)
            .field("sections", &self.sections)
            .field("deleted_items", &self.deleted_items)
            .finish()
    }
}

impl<S> SectionedDelta<S>
where
    S: DiffableSection + PartialEq + Clone,
{
    /// Total number of recorded changes across both levels.
    pub fn change_count(&self) -> usize {
        self.section_delta.change_count() + self.item_delta.change_count()
    }

    /// Whether either level records any change.
    pub fn has_changes(&self) -> bool {
        self.change_count() > 0
    }

    /// Replay this delta against the source hierarchy it was computed from,
    /// producing the reordered hierarchy.
    ///
    /// `source` must be the hierarchy the delta was computed from; for a
    /// delta produced by [`diff_sections`] the result carries the same
    /// sections and items as [`SectionedDelta::sections`]. Section-level
    /// deletions and moves are applied first, then item removals in the
    /// settled coordinate space, then section insertions, and finally item
    /// additions and reloads in the final space.
    pub fn apply(&self, source: &[S]) -> Vec<S> {
        let inserted: HashSet<usize> =
            self.section_delta.insertions.iter().copied().collect();
        let source_by_key: HashMap<S::Key, usize> = source
            .iter()
            .enumerate()
            .map(|(index, section)| (section.diff_key(), index))
            .collect();

        // Item lists in final section order. Surviving sections start from
        // their source items; inserted sections arrive complete.
        let mut final_items: Vec<Vec<S::Item>> = Vec::with_capacity(self.sections.len());
        let mut survivor_positions: Vec<usize> = Vec::new();
        for (index, section) in self.sections.iter().enumerate() {
            if inserted.contains(&index) {
                final_items.push(section.items().to_vec());
            } else {
                survivor_positions.push(index);
                let items = source_by_key
                    .get(&section.diff_key())
                    .map(|&source_index| source[source_index].items().to_vec())
                    .unwrap_or_default();
                final_items.push(items);
            }
        }

        // Deleted and moved-out items leave at their settled coordinates,
        // highest offsets first.
        let mut removals: Vec<IndexPath> = self.item_delta.deletions.clone();
        removals.extend(self.item_delta.moves.iter().map(|pair| pair.from));
        removals.sort();
        for path in removals.iter().rev() {
            let section = survivor_positions[path.section];
            final_items[section].remove(path.item);
        }

        // Inserted and moved-in items land at their final coordinates,
        // lowest offsets first, taking target values.
        let mut additions: Vec<IndexPath> = self.item_delta.insertions.clone();
        additions.extend(self.item_delta.moves.iter().map(|pair| pair.to));
        additions.sort();
        for path in &additions {
            let value = self.sections[path.section].items()[path.item].clone();
            final_items[path.section].insert(path.item, value);
        }

        for pair in &self.item_delta.reloads {
            let value = self.sections[pair.to.section].items()[pair.to.item].clone();
            final_items[pair.to.section][pair.to.item] = value;
        }

        self.sections
            .iter()
            .zip(final_items)
            .map(|(section, items)| section.with_items(items))
            .collect()
    }
}

/// Compute the delta that transforms the `source` hierarchy into the
/// `target` hierarchy.
///
/// Target sections without items are dropped before anything else. Section
/// identity and content come from the section's own [`Diffable`] impl and
/// `PartialEq`; item identity must be unique across the whole hierarchy, not
/// just within one section, since items are reconciled across section
/// boundaries.
pub fn diff_sections<S>(source: &[S], target: &[S]) -> SectionedDelta<S>
where
    S: DiffableSection + PartialEq + Clone,
{
    let sections: Vec<S> = target
        .iter()
        .filter(|section| !section.items().is_empty())
        .cloned()
        .collect();

    let section_delta = diff(source, &sections);

    let source_by_key: HashMap<S::Key, usize> = source
        .iter()
        .enumerate()
        .map(|(index, section)| (section.diff_key(), index))
        .collect();

    // Intermediate snapshot: surviving source sections in target order, and
    // the target sections they pair with. Both flatten into the coordinate
    // space that exists before section insertions land.
    let mut intermediate: Vec<&S> = Vec::with_capacity(sections.len());
    let mut surviving_target: Vec<&S> = Vec::with_capacity(sections.len());
    for section in &sections {
        if let Some(&source_index) = source_by_key.get(&section.diff_key()) {
            intermediate.push(&source[source_index]);
            surviving_target.push(section);
        }
    }

    let intermediate_items: Vec<&S::Item> = intermediate
        .iter()
        .flat_map(|section| section.items())
        .collect();
    let target_items: Vec<&S::Item> = surviving_target
        .iter()
        .flat_map(|section| section.items())
        .collect();

    let raw = diff_with(&intermediate_items, &target_items, MoveDetection::All);

    let source_offsets = section_offsets(&intermediate);
    let target_offsets = section_offsets(&surviving_target);
    let locate_source = |flat: usize| locate(flat, &source_offsets);
    let locate_target = |flat: usize| {
        let path = locate(flat, &target_offsets);
        IndexPath::new(
            shifted_section(path.section, &section_delta.insertions),
            path.item,
        )
    };

    let mut item_delta = IndexPathDelta {
        deletions: raw.deletions.iter().map(|&flat| locate_source(flat)).collect(),
        insertions: raw.insertions.iter().map(|&flat| locate_target(flat)).collect(),
        reloads: raw
            .reloads
            .iter()
            .map(|pair| IndexPathPair::new(locate_source(pair.from), locate_target(pair.to)))
            .collect(),
        moves: Vec::with_capacity(raw.moves.len()),
    };

    // A move that lands in its own slot is no move at all: a content change
    // becomes a reload, an identical pair disappears.
    for pair in &raw.moves {
        let from = locate_source(pair.from);
        let to = locate_target(pair.to);
        if from == to {
            if intermediate_items[pair.from] != target_items[pair.to] {
                item_delta.reloads.push(IndexPathPair::new(from, to));
            }
        } else {
            item_delta.moves.push(IndexPathPair::new(from, to));
        }
    }

    let mut deleted_items: Vec<S::Item> = Vec::new();
    for &index in &section_delta.deletions {
        deleted_items.extend(source[index].items().iter().cloned());
    }
    for &flat in &raw.deletions {
        deleted_items.push((*intermediate_items[flat]).clone());
    }

    tracing::debug!(
        section_changes = section_delta.change_count(),
        item_changes = item_delta.change_count(),
        deleted_items = deleted_items.len(),
        "reconciled sectioned snapshots"
    );

    SectionedDelta {
        section_delta,
        item_delta,
        sections,
        deleted_items,
    }
}

fn section_offsets<S: DiffableSection>(sections: &[&S]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(sections.len());
    let mut total = 0;
    for section in sections {
        offsets.push(total);
        total += section.items().len();
    }
    offsets
}

/// Convert a flat item index into a (section, item) position. With empty
/// sections, several entries share a start offset; the owner is the last
/// section starting at or before the flat index.
fn locate(flat: usize, offsets: &[usize]) -> IndexPath {
    let section = offsets.partition_point(|&start| start <= flat) - 1;
    IndexPath::new(section, flat - offsets[section])
}

/// Shift a section index from the no-insertion coordinate space into the
/// final one, stepping past every section inserted at or before it.
/// `insertions` holds final-space indices in ascending order.
fn shifted_section(section: usize, insertions: &[usize]) -> usize {
    let mut shifted = section;
    for &inserted in insertions {
        if inserted <= shifted {
            shifted += 1;
        } else {
            break;
        }
    }
    shifted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Group {
        name: &'static str,
        revision: u8,
        rows: Vec<Cell>,
    }

    impl Group {
        fn new(name: &'static str, rows: Vec<Cell>) -> Self {
            Self {
                name,
                revision: 0,
                rows,
            }
        }

        fn with_revision(mut self, revision: u8) -> Self {
            self.revision = revision;
            self
        }
    }

    // Section content equality covers section-level state only, never the
    // items.
    impl PartialEq for Group {
        fn eq(&self, other: &Self) -> bool {
            self.name == other.name && self.revision == other.revision
        }
    }

    impl Diffable for Group {
        type Key = &'static str;

        fn diff_key(&self) -> &'static str {
            self.name
        }
    }

    impl DiffableSection for Group {
        type Item = Cell;

        fn items(&self) -> &[Cell] {
            &self.rows
        }

        fn with_items(&self, items: Vec<Cell>) -> Self {
            Self {
                name: self.name,
                revision: self.revision,
                rows: items,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Cell {
        id: u64,
        text: &'static str,
    }

    fn cell(id: u64, text: &'static str) -> Cell {
        Cell { id, text }
    }

    impl Diffable for Cell {
        type Key = u64;

        fn diff_key(&self) -> u64 {
            self.id
        }
    }

    fn assert_same_hierarchy(got: &[Group], want: &[Group]) {
        assert_eq!(got.len(), want.len());
        for (got, want) in got.iter().zip(want) {
            assert_eq!(got, want);
            assert_eq!(got.rows, want.rows);
        }
    }

    #[test]
    fn identical_hierarchies() {
        let sections = vec![
            Group::new("a", vec![cell(1, "x"), cell(2, "y")]),
            Group::new("b", vec![cell(3, "z")]),
        ];
        let result = diff_sections(&sections, &sections);

        assert!(!result.section_delta.has_changes());
        assert!(!result.item_delta.has_changes());
        assert!(result.deleted_items.is_empty());
    }

    #[test]
    fn empty_target_sections_are_dropped() {
        let source = vec![Group::new("a", vec![cell(1, "x")])];
        let target = vec![
            Group::new("a", vec![cell(1, "x")]),
            Group::new("empty", vec![]),
        ];
        let result = diff_sections(&source, &target);

        assert_eq!(result.sections.len(), 1);
        assert!(!result.section_delta.has_changes());
        assert!(!result.item_delta.has_changes());
    }

    #[test]
    fn item_move_within_section() {
        let source = vec![Group::new("a", vec![cell(1, "x"), cell(2, "y")])];
        let target = vec![Group::new("a", vec![cell(2, "y"), cell(1, "x")])];
        let result = diff_sections(&source, &target);

        assert!(!result.section_delta.has_changes());
        assert_eq!(
            result.item_delta.moves,
            vec![
                IndexPathPair::new(IndexPath::new(0, 0), IndexPath::new(0, 1)),
                IndexPathPair::new(IndexPath::new(0, 1), IndexPath::new(0, 0)),
            ]
        );
        assert!(result.item_delta.reloads.is_empty());
    }

    #[test]
    fn item_move_across_sections() {
        let source = vec![
            Group::new("a", vec![cell(1, "x"), cell(2, "y")]),
            Group::new("b", vec![cell(3, "z")]),
        ];
        let target = vec![
            Group::new("a", vec![cell(1, "x")]),
            Group::new("b", vec![cell(2, "y"), cell(3, "z")]),
        ];
        let result = diff_sections(&source, &target);

        assert!(!result.section_delta.has_changes());
        assert_eq!(
            result.item_delta.moves,
            vec![IndexPathPair::new(
                IndexPath::new(0, 1),
                IndexPath::new(1, 0)
            )]
        );
        assert!(result.item_delta.deletions.is_empty());
        assert!(result.item_delta.insertions.is_empty());
    }

    #[test]
    fn stay_put_content_change_is_a_reload() {
        let source = vec![Group::new("a", vec![cell(1, "old"), cell(2, "y")])];
        let target = vec![Group::new("a", vec![cell(1, "new"), cell(2, "y")])];
        let result = diff_sections(&source, &target);

        assert!(result.item_delta.moves.is_empty());
        assert_eq!(
            result.item_delta.reloads,
            vec![IndexPathPair::new(
                IndexPath::new(0, 0),
                IndexPath::new(0, 0)
            )]
        );
    }

    #[test]
    fn section_insertion_shifts_item_coordinates() {
        let source = vec![
            Group::new("a", vec![cell(1, "x"), cell(2, "y")]),
            Group::new("b", vec![cell(3, "z")]),
        ];
        let target = vec![
            Group::new("new", vec![cell(9, "n")]),
            Group::new("a", vec![cell(2, "y"), cell(1, "x")]),
            Group::new("b", vec![cell(3, "z")]),
        ];
        let result = diff_sections(&source, &target);

        assert_eq!(result.section_delta.insertions, vec![0]);
        // Source positions are settled before the insertion lands; target
        // positions already account for it. Even the stay-put item in "b"
        // moves, because its section number changes underneath it.
        assert_eq!(
            result.item_delta.moves,
            vec![
                IndexPathPair::new(IndexPath::new(0, 0), IndexPath::new(1, 1)),
                IndexPathPair::new(IndexPath::new(0, 1), IndexPath::new(1, 0)),
                IndexPathPair::new(IndexPath::new(1, 0), IndexPath::new(2, 0)),
            ]
        );
        // Items of the inserted section arrive with it, not as item-level
        // insertions.
        assert!(result.item_delta.insertions.is_empty());
    }

    #[test]
    fn deleted_section_reports_its_items() {
        let source = vec![
            Group::new("a", vec![cell(1, "x")]),
            Group::new("b", vec![cell(2, "y"), cell(3, "z")]),
        ];
        let target = vec![Group::new("a", vec![cell(1, "x")])];
        let result = diff_sections(&source, &target);

        assert_eq!(result.section_delta.deletions, vec![1]);
        assert_eq!(result.deleted_items, vec![cell(2, "y"), cell(3, "z")]);
        assert!(result.item_delta.deletions.is_empty());
    }

    #[test]
    fn individually_deleted_items_are_reported() {
        let source = vec![Group::new("a", vec![cell(1, "x"), cell(2, "y")])];
        let target = vec![Group::new("a", vec![cell(1, "x")])];
        let result = diff_sections(&source, &target);

        assert_eq!(
            result.item_delta.deletions,
            vec![IndexPath::new(0, 1)]
        );
        assert_eq!(result.deleted_items, vec![cell(2, "y")]);
    }

    #[test]
    fn section_reload_is_independent_of_items() {
        let source = vec![Group::new("a", vec![cell(1, "x")])];
        let target = vec![Group::new("a", vec![cell(1, "x")]).with_revision(1)];
        let result = diff_sections(&source, &target);

        assert_eq!(
            result.section_delta.reloads,
            vec![crate::delta::IndexPair::new(0, 0)]
        );
        assert!(!result.item_delta.has_changes());
    }

    #[test]
    fn replay_reproduces_target() {
        let source = vec![
            Group::new("a", vec![cell(1, "x"), cell(2, "y")]),
            Group::new("b", vec![cell(3, "z"), cell(4, "w")]),
            Group::new("c", vec![cell(5, "v")]),
        ];
        let target = vec![
            Group::new("new", vec![cell(9, "n")]),
            Group::new("b", vec![cell(4, "w"), cell(1, "x")]),
            Group::new("a", vec![cell(2, "changed")]),
        ];
        let result = diff_sections(&source, &target);

        assert_same_hierarchy(&result.apply(&source), &result.sections);
        // Section "c" disappeared with its item; cell 3 was deleted from "b".
        assert_eq!(result.deleted_items, vec![cell(5, "v"), cell(3, "z")]);
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        const SECTION_NAMES: [&str; 5] = ["s0", "s1", "s2", "s3", "s4"];

        #[derive(Debug, Clone)]
        struct Block {
            name: &'static str,
            revision: u8,
            rows: Vec<Item>,
        }

        impl PartialEq for Block {
            fn eq(&self, other: &Self) -> bool {
                self.name == other.name && self.revision == other.revision
            }
        }

        impl Diffable for Block {
            type Key = &'static str;

            fn diff_key(&self) -> &'static str {
                self.name
            }
        }

        impl DiffableSection for Block {
            type Item = Item;

            fn items(&self) -> &[Item] {
                &self.rows
            }

            fn with_items(&self, items: Vec<Item>) -> Self {
                Self {
                    name: self.name,
                    revision: self.revision,
                    rows: items,
                }
            }
        }

        #[derive(Debug, Clone, PartialEq)]
        struct Item {
            id: u64,
            revision: u8,
        }

        impl Diffable for Item {
            type Key = u64;

            fn diff_key(&self) -> u64 {
                self.id
            }
        }

        fn arb_hierarchy() -> impl Strategy<Value = Vec<Block>> {
            (1usize..=5)
                .prop_flat_map(|count| {
                    proptest::collection::hash_set(0u64..48, 0..24).prop_flat_map(
                        move |ids| {
                            let ids: Vec<u64> = ids.into_iter().collect();
                            let len = ids.len();
                            (
                                Just(ids),
                                proptest::collection::vec((0..count, 0u8..3), len),
                                proptest::collection::vec(0u8..3, count),
                            )
                        },
                    )
                })
                .prop_map(|(ids, assignments, revisions)| {
                    let mut blocks: Vec<Block> = revisions
                        .iter()
                        .enumerate()
                        .map(|(index, &revision)| Block {
                            name: SECTION_NAMES[index],
                            revision,
                            rows: Vec::new(),
                        })
                        .collect();
                    for (id, (section, revision)) in ids.into_iter().zip(assignments) {
                        blocks[section].rows.push(Item { id, revision });
                    }
                    blocks
                })
                .prop_shuffle()
        }

        fn sanitized(target: &[Block]) -> Vec<Block> {
            target
                .iter()
                .filter(|block| !block.rows.is_empty())
                .cloned()
                .collect()
        }

        proptest! {
            #[test]
            fn prop_replay_reproduces_target(
                source in arb_hierarchy(),
                target in arb_hierarchy(),
            ) {
                let result = diff_sections(&source, &target);
                let want = sanitized(&target);
                let got = result.apply(&source);

                prop_assert_eq!(got.len(), want.len());
                for (got, want) in got.iter().zip(&want) {
                    prop_assert_eq!(got, want);
                    prop_assert_eq!(&got.rows, &want.rows);
                }
            }

            #[test]
            fn prop_identical_hierarchies_empty_delta(source in arb_hierarchy()) {
                let target = sanitized(&source);
                let result = diff_sections(&source, &target);

                // Empty source sections fall out as section deletions; apart
                // from that, nothing changes.
                let empty_sections =
                    source.iter().filter(|block| block.rows.is_empty()).count();
                prop_assert_eq!(result.section_delta.deletions.len(), empty_sections);
                prop_assert!(result.section_delta.insertions.is_empty());
                prop_assert!(result.section_delta.moves.is_empty());
                prop_assert!(result.section_delta.reloads.is_empty());
                prop_assert!(!result.item_delta.has_changes());
                prop_assert!(result.deleted_items.is_empty());
            }

            #[test]
            fn prop_moves_and_reloads_disjoint(
                source in arb_hierarchy(),
                target in arb_hierarchy(),
            ) {
                let result = diff_sections(&source, &target);
                let moved: std::collections::HashSet<IndexPath> = result
                    .item_delta
                    .moves
                    .iter()
                    .map(|pair| pair.from)
                    .collect();
                for pair in &result.item_delta.reloads {
                    prop_assert!(!moved.contains(&pair.from));
                }
            }
        }
    }
}
