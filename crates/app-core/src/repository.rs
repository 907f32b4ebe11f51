//! Shared repository plumbing
//!
//! Storage keys owned by each repository, and the error type common to
//! every repository read/write path. Each repository owns a disjoint set
//! of keys; only the backup service reads across them.

use storage::StorageError;
use thiserror::Error;

/// Single-slot key for the resident user-progress record
pub(crate) const PROGRESS_KEY: &str = "gita:user_progress";

/// Key for the full study-notes collection
pub(crate) const NOTES_KEY: &str = "gita:study_notes";

/// Key for the singleton preferences record
pub(crate) const PREFERENCES_KEY: &str = "gita:preferences";

/// Key for the singleton usage-analytics record
pub(crate) const ANALYTICS_KEY: &str = "gita:analytics";

/// Key for the local users table
pub(crate) const AUTH_USERS_KEY: &str = "gita:auth_users";

/// Key for the persisted current-session pointer
pub(crate) const SESSION_KEY: &str = "gita:current_session";

/// Every key owned by the persistence layer, in wipe order
pub(crate) const ALL_KEYS: [&str; 6] = [
    PROGRESS_KEY,
    NOTES_KEY,
    PREFERENCES_KEY,
    ANALYTICS_KEY,
    AUTH_USERS_KEY,
    SESSION_KEY,
];

/// Repository error types
///
/// Read-path callers that want the "degrade to empty state" behavior do so
/// explicitly at the call site; the repositories themselves never swallow
/// an error.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Underlying key-value store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Stored or incoming JSON could not be read or written
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepositoryError>;
