//! Identity contract for reconcilable elements.
//!
//! Reconciliation separates *identity* (which logical element is this?) from
//! *content* (what does it currently show?). Identity is a stable key that
//! survives mutation; content changes are observed through value equality.
//! The calculators never inspect anything else about an element.

use std::collections::HashSet;
use std::hash::Hash;

use crate::error::{Error, Result};

/// An element that can participate in reconciliation.
///
/// The key must be unique within one collection snapshot and stable for the
/// element's logical lifetime. Value equality (`PartialEq`) reflects whether
/// the element's displayable content changed: two snapshots of the same
/// logical element compare equal exactly when nothing visible changed.
///
/// Duplicate keys within one snapshot are a caller contract violation. The
/// calculators do not check for them; the last occurrence wins in the
/// identity index and the resulting delta is unspecified but non-panicking.
/// Use [`validate_keys`] to surface such bugs during development.
pub trait Diffable {
    /// Stable identity key type.
    type Key: Hash + Eq + Clone;

    /// The element's identity, independent of its content.
    fn diff_key(&self) -> Self::Key;
}

impl<T: Diffable + ?Sized> Diffable for &T {
    type Key = T::Key;

    fn diff_key(&self) -> Self::Key {
        (**self).diff_key()
    }
}

/// A grouping level above items: itself identity-bearing, and owning an
/// ordered sequence of reconcilable items.
///
/// A section's own equality must be independent of its items: it reflects
/// section-level content only (a header, say). Item-level changes are picked
/// up by the item delta, not by section equality.
pub trait DiffableSection: Diffable {
    /// The item element type.
    type Item: Diffable + PartialEq + Clone;

    /// The section's items, in display order.
    fn items(&self) -> &[Self::Item];

    /// Rebuild this section around a replacement item sequence, keeping the
    /// section-level identity and content.
    fn with_items(&self, items: Vec<Self::Item>) -> Self;
}

// Self-keyed impls for types whose value is its own identity.
macro_rules! self_keyed {
    ($($ty:ty),* $(,)?) => {
        $(impl Diffable for $ty {
            type Key = $ty;

            fn diff_key(&self) -> Self::Key {
                self.clone()
            }
        })*
    };
}

self_keyed!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, char, String);

impl Diffable for str {
    type Key = String;

    fn diff_key(&self) -> Self::Key {
        self.to_string()
    }
}

/// Check that every key in `elements` occurs exactly once.
///
/// Opt-in precondition check; returns the index of the first repeated key.
pub fn validate_keys<T: Diffable>(elements: &[T]) -> Result<()> {
    let mut seen = HashSet::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        if !seen.insert(element.diff_key()) {
            return Err(Error::DuplicateKey { index });
        }
    }
    Ok(())
}

/// Check key uniqueness across a hierarchy: section keys against each other,
/// and item keys across all sections combined. An item key repeated in a
/// *different* section is still a violation, since items are reconciled
/// across section boundaries.
pub fn validate_section_keys<S: DiffableSection>(sections: &[S]) -> Result<()> {
    let mut section_keys = HashSet::with_capacity(sections.len());
    let mut item_keys = HashSet::new();
    for (section_index, section) in sections.iter().enumerate() {
        if !section_keys.insert(section.diff_key()) {
            return Err(Error::DuplicateSectionKey {
                section: section_index,
            });
        }
        for (item_index, item) in section.items().iter().enumerate() {
            if !item_keys.insert(item.diff_key()) {
                return Err(Error::DuplicateItemKey {
                    section: section_index,
                    item: item_index,
                });
            }
        }
    }
    Ok(())
}
