//! Error types for Vigil.
//!
//! Only [`LayoutError`] is fatal, and only at startup. Everything the stat core
//! does per tick degrades to a safe default instead of returning an error.

use thiserror::Error;

/// An authored name or value that does not resolve.
///
/// Reported when content is applied; the offending entry is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    /// Unknown stat key
    #[error("'{0}' is not a valid stat")]
    UnknownStat(String),

    /// Unknown primary stat
    #[error("'{0}' is not a valid primary stat")]
    UnknownPrimaryStat(String),

    /// Power ID not present in the power table
    #[error("power {0} does not exist")]
    UnknownPower(u32),

    /// Unknown AI trigger category
    #[error("'{0}' is not a valid enemy power type")]
    UnknownTrigger(String),

    /// Unknown combat style
    #[error("unknown combat style '{0}'")]
    UnknownCombatStyle(String),

    /// Damage type index outside the layout
    #[error("damage type {index} is out of range (count {count})")]
    DamageTypeOutOfRange {
        /// Offending index
        index: usize,
        /// Number of damage types in the layout
        count: usize,
    },

    /// Value rejected for a known key
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue {
        /// Key being set
        key: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Structural problems with the stat layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// Two slots share one key
    #[error("stat key '{0}' is defined more than once")]
    DuplicateKey(String),

    /// A slot has an empty key
    #[error("empty stat key for {0}")]
    EmptyKey(String),
}

/// Settings file errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}
