//! Error types for CMDB operations.
//!
//! All fallible operations return [`Result<T>`]. Expected conditions (unknown
//! ids, constraint violations, malformed input) are reported as values and
//! never panic.

use thiserror::Error;

/// Result type alias for CMDB operations.
pub type Result<T> = std::result::Result<T, CmdbError>;

/// Comprehensive error type for all store operations.
#[derive(Error, Debug)]
pub enum CmdbError {
    /// Storage backend error (file I/O, rename guard, etc.)
    #[error("Storage error: {message}")]
    Storage {
        /// Detailed error message
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Snapshot encoding/decoding error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error details
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration item not found in the store
    #[error("CI not found: {id}")]
    CiNotFound {
        /// ID of the missing CI
        id: String,
    },

    /// A CI with the same id is already registered
    #[error("CI already exists: {id}")]
    DuplicateCi {
        /// Conflicting id
        id: String,
    },

    /// Level index does not exist
    #[error("Level not found: {index} (store has {count} levels)")]
    LevelNotFound {
        /// Requested level index
        index: usize,
        /// Number of levels currently defined
        count: usize,
    },

    /// Level is still referenced by at least one CI
    #[error("Level {index} is in use by {ci_count} CI(s)")]
    LevelInUse {
        /// Level index that was to be removed
        index: usize,
        /// Number of CIs still at that level
        ci_count: usize,
    },

    /// The level list can only be replaced while the store holds no CIs
    #[error("Levels cannot be replaced while {ci_count} CI(s) exist")]
    LevelsLocked {
        /// Number of CIs currently stored
        ci_count: usize,
    },

    /// No relationship matched the request
    #[error("Relationship not found: {source_id} -> {destination_id}")]
    RelationshipNotFound {
        /// Source CI id
        source_id: String,
        /// Destination CI id
        destination_id: String,
    },

    /// Malformed or missing input
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },
}

impl CmdbError {
    /// Create a storage error from a message and optional source.
    pub fn storage<E>(message: impl Into<String>, source: Option<E>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            message: message.into(),
            source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        }
    }

    /// Create a serialization error from a message and optional source.
    pub fn serialization<E>(message: impl Into<String>, source: Option<E>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Serialization {
            message: message.into(),
            source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Whether the error means the addressed entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CiNotFound { .. } | Self::LevelNotFound { .. } | Self::RelationshipNotFound { .. }
        )
    }

    /// Whether the error is a rejected constraint (the store state is unchanged).
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::DuplicateCi { .. } | Self::LevelInUse { .. } | Self::LevelsLocked { .. }
        )
    }
}
