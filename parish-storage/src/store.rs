//! Backing store abstraction and in-memory implementation.
//!
//! The cache tier only ever talks to a [`BackingStore`]; the production
//! implementation wraps the relational database, while [`MemoryStore`]
//! backs tests and single-process deployments.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde::Serialize;

use parish_core::{
    ContentChannel, DefinedValue, EntityGuid, EntityId, EntityType, FinancialBatch, GroupType,
    ParishResult, StorageError,
};

// ============================================================================
// MODEL TRAIT
// ============================================================================

/// Accessor trait for backing-store rows.
///
/// Every persisted entity exposes its integer id, stable guid, and type
/// discriminator through this trait so generic store and cache code can
/// key rows without knowing the concrete entity.
pub trait Model: Clone + Send + Sync + 'static {
    /// Type discriminator, consistent across all instances.
    fn entity_type() -> EntityType;

    /// Integer primary key.
    fn id(&self) -> EntityId;

    /// Stable external identifier.
    fn guid(&self) -> EntityGuid;
}

impl Model for ContentChannel {
    fn entity_type() -> EntityType {
        EntityType::ContentChannel
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn guid(&self) -> EntityGuid {
        self.guid
    }
}

impl Model for GroupType {
    fn entity_type() -> EntityType {
        EntityType::GroupType
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn guid(&self) -> EntityGuid {
        self.guid
    }
}

impl Model for DefinedValue {
    fn entity_type() -> EntityType {
        EntityType::DefinedValue
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn guid(&self) -> EntityGuid {
        self.guid
    }
}

impl Model for FinancialBatch {
    fn entity_type() -> EntityType {
        EntityType::FinancialBatch
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn guid(&self) -> EntityGuid {
        self.guid
    }
}

// ============================================================================
// BACKING STORE TRAIT
// ============================================================================

/// Query interface the cache tier consumes.
///
/// Implementations own query semantics such as authorization filtering and
/// soft-delete exclusion; the cache treats results as authoritative.
/// Absence is `Ok(None)` / an empty Vec, never an error.
#[async_trait]
pub trait BackingStore<M: Model>: Send + Sync {
    /// Fetch one row by integer id.
    async fn find_by_id(&self, id: EntityId) -> ParishResult<Option<M>>;

    /// Fetch one row by guid.
    async fn find_by_guid(&self, guid: EntityGuid) -> ParishResult<Option<M>>;

    /// Fetch the direct children of `parent_id`, in the store's natural order.
    async fn find_children(&self, parent_id: EntityId) -> ParishResult<Vec<M>>;

    /// Fetch the direct parents of `child_id`.
    async fn find_parents(&self, child_id: EntityId) -> ParishResult<Vec<M>>;

    /// Fetch every row.
    async fn find_all(&self) -> ParishResult<Vec<M>>;
}

// ============================================================================
// STORE STATS
// ============================================================================

/// Per-method call counts, snapshotted from a [`MemoryStore`].
///
/// Tests use these to verify the cache's single-flight contracts by
/// counting how many times the store was actually hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub find_by_id_calls: u64,
    pub find_by_guid_calls: u64,
    pub find_children_calls: u64,
    pub find_parents_calls: u64,
    pub find_all_calls: u64,
}

#[derive(Debug, Default)]
struct StoreCounters {
    find_by_id: AtomicU64,
    find_by_guid: AtomicU64,
    find_children: AtomicU64,
    find_parents: AtomicU64,
    find_all: AtomicU64,
}

impl StoreCounters {
    fn snapshot(&self) -> StoreStats {
        StoreStats {
            find_by_id_calls: self.find_by_id.load(Ordering::Relaxed),
            find_by_guid_calls: self.find_by_guid.load(Ordering::Relaxed),
            find_children_calls: self.find_children.load(Ordering::Relaxed),
            find_parents_calls: self.find_parents.load(Ordering::Relaxed),
            find_all_calls: self.find_all.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-memory backing store.
///
/// Rows are keyed by id with a secondary guid index; parent/child relations
/// live in an explicit link table that preserves insertion order, which is
/// the store's natural child ordering.
#[derive(Debug, Default)]
pub struct MemoryStore<M> {
    rows: Arc<RwLock<HashMap<EntityId, M>>>,
    guid_index: Arc<RwLock<HashMap<EntityGuid, EntityId>>>,
    child_links: Arc<RwLock<HashMap<EntityId, Vec<EntityId>>>>,
    counters: StoreCounters,
}

impl<M: Model> MemoryStore<M> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
            guid_index: Arc::new(RwLock::new(HashMap::new())),
            child_links: Arc::new(RwLock::new(HashMap::new())),
            counters: StoreCounters::default(),
        }
    }

    fn read<T>(lock: &RwLock<T>) -> ParishResult<RwLockReadGuard<'_, T>> {
        lock.read().map_err(|_| StorageError::LockPoisoned.into())
    }

    fn write<T>(lock: &RwLock<T>) -> ParishResult<RwLockWriteGuard<'_, T>> {
        lock.write().map_err(|_| StorageError::LockPoisoned.into())
    }

    /// Insert a new row. Fails on duplicate id.
    pub fn insert(&self, row: M) -> ParishResult<()> {
        let mut rows = Self::write(&self.rows)?;
        if rows.contains_key(&row.id()) {
            return Err(StorageError::InsertFailed {
                entity_type: M::entity_type(),
                reason: format!("duplicate id {}", row.id()),
            }
            .into());
        }
        Self::write(&self.guid_index)?.insert(row.guid(), row.id());
        rows.insert(row.id(), row);
        Ok(())
    }

    /// Replace an existing row, or insert if absent.
    pub fn upsert(&self, row: M) -> ParishResult<()> {
        Self::write(&self.guid_index)?.insert(row.guid(), row.id());
        Self::write(&self.rows)?.insert(row.id(), row);
        Ok(())
    }

    /// Delete a row and its link-table references. No-op if absent.
    pub fn remove(&self, id: EntityId) -> ParishResult<()> {
        if let Some(row) = Self::write(&self.rows)?.remove(&id) {
            Self::write(&self.guid_index)?.remove(&row.guid());
        }
        let mut links = Self::write(&self.child_links)?;
        links.remove(&id);
        for children in links.values_mut() {
            children.retain(|child| *child != id);
        }
        Ok(())
    }

    /// Record a parent → child association. Appends to the parent's child
    /// list, preserving order; duplicate links are ignored.
    pub fn link_child(&self, parent_id: EntityId, child_id: EntityId) -> ParishResult<()> {
        let mut links = Self::write(&self.child_links)?;
        let children = links.entry(parent_id).or_default();
        if !children.contains(&child_id) {
            children.push(child_id);
        }
        Ok(())
    }

    /// Number of rows currently stored.
    pub fn row_count(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    /// Snapshot the per-method call counters.
    pub fn stats(&self) -> StoreStats {
        self.counters.snapshot()
    }
}

#[async_trait]
impl<M: Model> BackingStore<M> for MemoryStore<M> {
    async fn find_by_id(&self, id: EntityId) -> ParishResult<Option<M>> {
        self.counters.find_by_id.fetch_add(1, Ordering::Relaxed);
        Ok(Self::read(&self.rows)?.get(&id).cloned())
    }

    async fn find_by_guid(&self, guid: EntityGuid) -> ParishResult<Option<M>> {
        self.counters.find_by_guid.fetch_add(1, Ordering::Relaxed);
        let id = match Self::read(&self.guid_index)?.get(&guid) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(Self::read(&self.rows)?.get(&id).cloned())
    }

    async fn find_children(&self, parent_id: EntityId) -> ParishResult<Vec<M>> {
        self.counters.find_children.fetch_add(1, Ordering::Relaxed);
        let child_ids = Self::read(&self.child_links)?
            .get(&parent_id)
            .cloned()
            .unwrap_or_default();
        let rows = Self::read(&self.rows)?;
        Ok(child_ids
            .iter()
            .filter_map(|id| rows.get(id).cloned())
            .collect())
    }

    async fn find_parents(&self, child_id: EntityId) -> ParishResult<Vec<M>> {
        self.counters.find_parents.fetch_add(1, Ordering::Relaxed);
        let links = Self::read(&self.child_links)?;
        let mut parent_ids: Vec<EntityId> = links
            .iter()
            .filter(|(_, children)| children.contains(&child_id))
            .map(|(parent, _)| *parent)
            .collect();
        parent_ids.sort_unstable();
        drop(links);

        let rows = Self::read(&self.rows)?;
        Ok(parent_ids
            .iter()
            .filter_map(|id| rows.get(id).cloned())
            .collect())
    }

    async fn find_all(&self) -> ParishResult<Vec<M>> {
        self.counters.find_all.fetch_add(1, Ordering::Relaxed);
        let mut all: Vec<M> = Self::read(&self.rows)?.values().cloned().collect();
        all.sort_unstable_by_key(Model::id);
        Ok(all)
    }
}

// ============================================================================
// TESTS
// ============================================================================
