//! Error types for the riffle engine.

use thiserror::Error;

/// Contract violations detectable by the opt-in validators.
///
/// The calculators themselves never raise these. Duplicate keys within one
/// snapshot are a caller bug in data modeling: the identity index maps each
/// key to the last occurrence and the computed delta is unspecified but never
/// panics. Callers that cannot guarantee uniqueness should disambiguate
/// upstream, or run [`crate::identity::validate_keys`] before submitting.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("duplicate key at index {index}")]
    DuplicateKey { index: usize },

    #[error("duplicate section key at index {section}")]
    DuplicateSectionKey { section: usize },

    #[error("duplicate item key at section {section}, item {item}")]
    DuplicateItemKey { section: usize, item: usize },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
