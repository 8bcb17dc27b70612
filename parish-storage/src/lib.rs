//! Parish Storage - Backing Store and Entity Cache Tier
//!
//! Defines the storage abstraction the rest of the application consumes:
//! the [`BackingStore`] query trait with an in-memory implementation, the
//! read-through entity cache registry, and financial batch resolution.
//! The relational implementation of [`BackingStore`] lives with the web
//! application, not here.

pub mod batch;
pub mod cache;
pub mod store;

pub use batch::{
    resolve_batch_name, BatchStore, FinancialBatchService, BATCH_NAME_SUFFIX_ATTRIBUTE,
};
pub use cache::{
    CacheEntry, CacheRecord, CacheStats, ContentChannelRecord, DefinedValueRecord, EntityCache,
    GroupTypeRecord, RelationSlot,
};
pub use store::{BackingStore, MemoryStore, Model, StoreStats};
