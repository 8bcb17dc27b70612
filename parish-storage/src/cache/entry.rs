//! Cache entry: immutable scalar snapshot plus lazily-resolved relations.

use std::fmt;
use std::future::Future;

use parish_core::{EntityGuid, EntityId, ParishResult};
use tokio::sync::OnceCell;

use super::record::CacheRecord;

/// Single-flight slot for one memoized relation id list.
///
/// The slot moves Unresolved -> Resolving -> Resolved. Resolving is held
/// only while exactly one caller runs the backing query; concurrent callers
/// wait on the same cell rather than issuing duplicate queries. A failed
/// resolution leaves the slot Unresolved so a later call may retry.
/// Resolved is terminal for the lifetime of the owning entry.
#[derive(Debug, Default)]
pub struct RelationSlot {
    ids: OnceCell<Vec<EntityId>>,
}

impl RelationSlot {
    /// Create an unresolved slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the id list has been computed.
    pub fn is_resolved(&self) -> bool {
        self.ids.get().is_some()
    }

    /// The memoized id list, if resolved.
    pub fn resolved_ids(&self) -> Option<&[EntityId]> {
        self.ids.get().map(Vec::as_slice)
    }

    /// Return the memoized ids, running `load` under the slot's single-flight
    /// guard if this is the first (successful) access.
    pub(crate) async fn get_or_resolve<F, Fut>(&self, load: F) -> ParishResult<&[EntityId]>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ParishResult<Vec<EntityId>>>,
    {
        let ids = self.ids.get_or_try_init(load).await?;
        Ok(ids.as_slice())
    }
}

/// An immutable-after-construction snapshot of one entity, owned by the
/// registry and shared with callers behind `Arc`.
///
/// Scalar fields live in the record and never change; the relation slots are
/// written exactly once, by the registry's resolvers.
#[derive(Debug)]
pub struct CacheEntry<R> {
    record: R,
    children: RelationSlot,
    parents: RelationSlot,
}

impl<R: CacheRecord> CacheEntry<R> {
    /// Build an entry by snapshotting an already-fetched model.
    pub fn from_model(model: &R::Model) -> Self {
        Self {
            record: R::from_model(model),
            children: RelationSlot::new(),
            parents: RelationSlot::new(),
        }
    }

    /// The scalar snapshot.
    pub fn record(&self) -> &R {
        &self.record
    }

    /// Integer primary key.
    pub fn id(&self) -> EntityId {
        self.record.id()
    }

    /// Stable external identifier.
    pub fn guid(&self) -> EntityGuid {
        self.record.guid()
    }

    /// Child relation slot.
    pub fn children(&self) -> &RelationSlot {
        &self.children
    }

    /// Parent relation slot.
    pub fn parents(&self) -> &RelationSlot {
        &self.parents
    }
}

impl<R: CacheRecord> fmt::Display for CacheEntry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.record.name())
    }
}

// ============================================================================
// TESTS
// ============================================================================
