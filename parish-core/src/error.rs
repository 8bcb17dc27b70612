//! Error types for parish operations

use crate::{EntityId, EntityType};
use thiserror::Error;

/// Backing store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type:?} with id {id}")]
    NotFound { entity_type: EntityType, id: EntityId },

    #[error("Insert failed for {entity_type:?}: {reason}")]
    InsertFailed { entity_type: EntityType, reason: String },

    #[error("Query failed for {entity_type:?}: {reason}")]
    QueryFailed { entity_type: EntityType, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Cache registry errors.
///
/// Plain absence is not an error: single-entity lookups return `Ok(None)`.
/// These variants cover faults in the cache machinery itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache registry lock poisoned")]
    LockPoisoned,
}

/// Financial batch resolution errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("Batch name resolved empty from prefix {prefix:?}")]
    EmptyName { prefix: String },

    #[error("Invalid batch window for {name}: {reason}")]
    InvalidWindow { name: String, reason: String },
}

/// Master error type for all parish errors.
#[derive(Debug, Clone, Error)]
pub enum ParishError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),
}

/// Result type alias for parish operations.
pub type ParishResult<T> = Result<T, ParishError>;

// =============================================================================
// TESTS
// =============================================================================
