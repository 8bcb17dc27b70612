//! In-process entity cache with read-through loading and lazy relations.
//!
//! This module fronts the [`BackingStore`](crate::store::BackingStore) with a
//! keyed registry of immutable entity snapshots, so hot entities (content
//! channels, group types, defined values) are materialized once per process
//! instead of once per web request.
//!
//! # Design Philosophy
//!
//! The original layer this replaces leaned on process-wide statics and a
//! nullable-list-plus-lock idiom for lazy relations. Here the registry is an
//! explicit object you construct and inject, and each relation list is a
//! single-flight cell: Unresolved until first access, Resolving while exactly
//! one caller runs the store query, Resolved thereafter until the owning
//! entry is invalidated.
//!
//! # Staleness
//!
//! Invalidation is per-entry and does not cascade. A memoized child id whose
//! row has since been deleted is silently filtered at resolution time; an
//! entry whose *list membership* changed stays stale until it is invalidated
//! itself. Callers that mutate relations must invalidate both ends.
//!
//! # Example
//!
//! ```ignore
//! let cache = EntityCache::<ContentChannelRecord, _>::new(store);
//!
//! let channel = cache.get_by_id(42).await?.expect("seeded");
//! for child in cache.children_of(&channel).await? {
//!     println!("{child}");
//! }
//!
//! // A mutation elsewhere:
//! cache.invalidate(42)?;
//! ```

pub mod entry;
pub mod record;
pub mod registry;

pub use entry::{CacheEntry, RelationSlot};
pub use record::{CacheRecord, ContentChannelRecord, DefinedValueRecord, GroupTypeRecord};
pub use registry::{CacheStats, EntityCache};
