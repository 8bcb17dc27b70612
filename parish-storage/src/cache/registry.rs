//! Process-wide entity cache registry with read-through loading.
//!
//! The registry owns every [`CacheEntry`] and hands out shared `Arc`
//! references. Lookups are identity-stable: the same id yields the same
//! entry instance until that id is invalidated.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use parish_core::{CacheError, EntityGuid, EntityId, ParishResult};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::entry::CacheEntry;
use super::record::CacheRecord;
use crate::store::{BackingStore, Model};

/// Statistics about registry usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the map.
    pub hits: u64,
    /// Lookups that went to the backing store.
    pub misses: u64,
    /// Entries currently cached.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Read-through cache registry for one entity type.
///
/// # Type Parameters
///
/// - `R`: the cached record type, supplying field extraction
/// - `S`: the backing store queried on miss
///
/// # Concurrency
///
/// The id and guid maps sit behind `std::sync::RwLock`, held only for map
/// operations and never across an await. Two racing cold loads may both hit
/// the store, but the slot converges on the first inserted entry and both
/// callers receive that instance. Relation resolution is single-flight per
/// entry (see [`RelationSlot`](super::entry::RelationSlot)); the full-set
/// load behind [`all`](EntityCache::all) is single-flight per registry.
pub struct EntityCache<R, S>
where
    R: CacheRecord,
    S: BackingStore<R::Model>,
{
    store: Arc<S>,
    entries: RwLock<HashMap<EntityId, Arc<CacheEntry<R>>>>,
    guid_index: RwLock<HashMap<EntityGuid, EntityId>>,
    all_loaded: AtomicBool,
    full_load: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<R, S> EntityCache<R, S>
where
    R: CacheRecord,
    S: BackingStore<R::Model>,
{
    /// Create an empty registry over `store`.
    ///
    /// Registries are plain values: construct one per entity type, share it
    /// behind an `Arc`, and drop it to shut down. There is no process-global
    /// instance.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            entries: RwLock::new(HashMap::new()),
            guid_index: RwLock::new(HashMap::new()),
            all_loaded: AtomicBool::new(false),
            full_load: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// The injected backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of entries currently cached.
    pub fn len(&self) -> usize {
        self.entries.read().map(|map| map.len()).unwrap_or(0)
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot usage statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.len() as u64,
        }
    }

    fn read_entries(
        &self,
    ) -> ParishResult<RwLockReadGuard<'_, HashMap<EntityId, Arc<CacheEntry<R>>>>> {
        self.entries
            .read()
            .map_err(|_| CacheError::LockPoisoned.into())
    }

    fn write_entries(
        &self,
    ) -> ParishResult<RwLockWriteGuard<'_, HashMap<EntityId, Arc<CacheEntry<R>>>>> {
        self.entries
            .write()
            .map_err(|_| CacheError::LockPoisoned.into())
    }

    fn read_guids(&self) -> ParishResult<RwLockReadGuard<'_, HashMap<EntityGuid, EntityId>>> {
        self.guid_index
            .read()
            .map_err(|_| CacheError::LockPoisoned.into())
    }

    fn write_guids(&self) -> ParishResult<RwLockWriteGuard<'_, HashMap<EntityGuid, EntityId>>> {
        self.guid_index
            .write()
            .map_err(|_| CacheError::LockPoisoned.into())
    }

    /// Insert `entry` unless the slot is already occupied; either way the
    /// stored instance is returned. First-writer-wins keeps lookups
    /// identity-stable for callers that lose a cold-load race.
    fn insert_if_absent(&self, entry: CacheEntry<R>) -> ParishResult<Arc<CacheEntry<R>>> {
        let id = entry.id();
        let guid = entry.guid();
        let mut entries = self.write_entries()?;
        if let Some(existing) = entries.get(&id) {
            return Ok(Arc::clone(existing));
        }
        let arc = Arc::new(entry);
        entries.insert(id, Arc::clone(&arc));
        drop(entries);
        self.write_guids()?.insert(guid, id);
        Ok(arc)
    }

    /// Get an entry by id, loading from the backing store on miss.
    ///
    /// Returns `Ok(None)` when the store has no matching row; absence is not
    /// an error at this layer.
    pub async fn get_by_id(&self, id: EntityId) -> ParishResult<Option<Arc<CacheEntry<R>>>> {
        if let Some(entry) = self.read_entries()?.get(&id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(Arc::clone(entry)));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(entity_type = ?R::entity_type(), id, "cache miss, loading from store");
        let model = match self.store.find_by_id(id).await? {
            Some(model) => model,
            None => return Ok(None),
        };
        Ok(Some(self.insert_if_absent(CacheEntry::from_model(&model))?))
    }

    /// Get an entry by guid.
    ///
    /// Resolves through the guid index when warm; otherwise queries the store
    /// by guid, records the mapping, and stores through the id map so that at
    /// most one entry instance ever exists per id.
    pub async fn get_by_guid(&self, guid: EntityGuid) -> ParishResult<Option<Arc<CacheEntry<R>>>> {
        let indexed = self.read_guids()?.get(&guid).copied();
        if let Some(id) = indexed {
            return self.get_by_id(id).await;
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(entity_type = ?R::entity_type(), %guid, "guid not indexed, loading from store");
        let model = match self.store.find_by_guid(guid).await? {
            Some(model) => model,
            None => return Ok(None),
        };
        Ok(Some(self.insert_if_absent(CacheEntry::from_model(&model))?))
    }

    /// Add an entry built from an already-fetched model, replacing any entry
    /// cached for that id. Use this when the caller has just paid the store
    /// round trip (e.g. right after a write).
    pub fn register(&self, model: &R::Model) -> ParishResult<Arc<CacheEntry<R>>> {
        let entry = Arc::new(CacheEntry::<R>::from_model(model));
        debug!(entity_type = ?R::entity_type(), id = entry.id(), "registering entry");
        self.write_entries()?.insert(entry.id(), Arc::clone(&entry));
        self.write_guids()?.insert(entry.guid(), entry.id());
        Ok(entry)
    }

    /// Return every cached entry, ensuring the full backing set has been
    /// loaded at least once. Rows already cached are reused rather than
    /// replaced. The result is a point-in-time snapshot ordered by id, not a
    /// live view.
    pub async fn all(&self) -> ParishResult<Vec<Arc<CacheEntry<R>>>> {
        if !self.all_loaded.load(Ordering::Acquire) {
            let _guard = self.full_load.lock().await;
            // Re-check: another caller may have completed the load while we
            // waited on the mutex.
            if !self.all_loaded.load(Ordering::Acquire) {
                debug!(entity_type = ?R::entity_type(), "loading full entity set");
                let models = self.store.find_all().await?;
                for model in &models {
                    self.insert_if_absent(CacheEntry::from_model(model))?;
                }
                self.all_loaded.store(true, Ordering::Release);
            }
        }

        let mut snapshot: Vec<Arc<CacheEntry<R>>> =
            self.read_entries()?.values().cloned().collect();
        snapshot.sort_unstable_by_key(|entry| entry.id());
        Ok(snapshot)
    }

    /// Remove the entry for `id`, returning whether one was present. The next
    /// `get_by_id` for this id reloads from the store. Relationship lists of
    /// *other* entries that reference `id` are not touched; invalidate those
    /// entries too if their lists must reflect the change.
    pub fn invalidate(&self, id: EntityId) -> ParishResult<bool> {
        let removed = self.write_entries()?.remove(&id);
        match removed {
            Some(entry) => {
                self.write_guids()?.remove(&entry.guid());
                debug!(entity_type = ?R::entity_type(), id, "invalidated entry");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drop every cached entry and re-arm the full-set load. Returns the
    /// number of entries removed.
    pub fn invalidate_all(&self) -> ParishResult<u64> {
        let mut entries = self.write_entries()?;
        let count = entries.len() as u64;
        entries.clear();
        drop(entries);
        self.write_guids()?.clear();
        self.all_loaded.store(false, Ordering::Release);
        debug!(entity_type = ?R::entity_type(), count, "invalidated all entries");
        Ok(count)
    }

    // ========================================================================
    // RELATIONSHIP RESOLUTION
    // ========================================================================

    /// Direct children of `entry`.
    ///
    /// The child id list is computed at most once per entry (single-flight);
    /// each call then maps the memoized ids through
    /// [`get_by_id`](EntityCache::get_by_id), silently dropping ids that no
    /// longer resolve (the row was deleted behind the memoized list).
    pub async fn children_of(
        &self,
        entry: &CacheEntry<R>,
    ) -> ParishResult<Vec<Arc<CacheEntry<R>>>> {
        let id = entry.id();
        let store = &self.store;
        let ids = entry
            .children()
            .get_or_resolve(|| async move {
                debug!(entity_type = ?R::entity_type(), id, "resolving child ids");
                let models = store.find_children(id).await?;
                Ok(models.iter().map(Model::id).collect())
            })
            .await?;
        self.entries_for_ids(ids).await
    }

    /// Direct parents of `entry`. Memoized exactly like
    /// [`children_of`](EntityCache::children_of); both lists live and die
    /// with the entry.
    pub async fn parents_of(&self, entry: &CacheEntry<R>) -> ParishResult<Vec<Arc<CacheEntry<R>>>> {
        let id = entry.id();
        let store = &self.store;
        let ids = entry
            .parents()
            .get_or_resolve(|| async move {
                debug!(entity_type = ?R::entity_type(), id, "resolving parent ids");
                let models = store.find_parents(id).await?;
                Ok(models.iter().map(Model::id).collect())
            })
            .await?;
        self.entries_for_ids(ids).await
    }

    /// Map memoized ids through the registry, filtering out ids whose rows
    /// have since disappeared.
    async fn entries_for_ids(&self, ids: &[EntityId]) -> ParishResult<Vec<Arc<CacheEntry<R>>>> {
        let mut related = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = self.get_by_id(*id).await? {
                related.push(entry);
            }
        }
        Ok(related)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::record::ContentChannelRecord;
    use crate::store::MemoryStore;
    use parish_core::{new_entity_guid, ContentChannel};

    type ChannelCache = EntityCache<ContentChannelRecord, MemoryStore<ContentChannel>>;

    fn make_channel(id: EntityId, name: &str) -> ContentChannel {
        ContentChannel {
            id,
            guid: new_entity_guid(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn seeded_cache(channels: &[ContentChannel]) -> (Arc<MemoryStore<ContentChannel>>, ChannelCache) {
        let store = Arc::new(MemoryStore::new());
        for channel in channels {
            store.insert(channel.clone()).unwrap();
        }
        let cache = EntityCache::new(Arc::clone(&store));
        (store, cache)
    }

    #[tokio::test]
    async fn test_get_by_id_is_identity_stable() {
        let (_store, cache) = seeded_cache(&[make_channel(1, "News")]);

        let first = cache.get_by_id(1).await.unwrap().unwrap();
        let second = cache.get_by_id(1).await.unwrap().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_get_by_id_missing_returns_none() {
        let (_store, cache) = seeded_cache(&[]);
        let result = cache.get_by_id(99).await.unwrap();
        assert!(result.is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_forces_exactly_one_fresh_load() {
        let (store, cache) = seeded_cache(&[make_channel(5, "Sermons")]);

        let before = cache.get_by_id(5).await.unwrap().unwrap();
        assert_eq!(store.stats().find_by_id_calls, 1);

        assert!(cache.invalidate(5).unwrap());

        let after = cache.get_by_id(5).await.unwrap().unwrap();
        assert_eq!(store.stats().find_by_id_calls, 2);
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.record().name, "Sermons");

        // Warm again: no further store traffic.
        cache.get_by_id(5).await.unwrap().unwrap();
        assert_eq!(store.stats().find_by_id_calls, 2);
    }

    #[tokio::test]
    async fn test_invalidate_unknown_id_is_noop() {
        let (_store, cache) = seeded_cache(&[]);
        assert!(!cache.invalidate(99).unwrap());
    }

    #[tokio::test]
    async fn test_get_by_guid_matches_get_by_id() {
        let channel = make_channel(8, "Podcast");
        let guid = channel.guid;
        let (_store, cache) = seeded_cache(&[channel]);

        let by_guid = cache.get_by_guid(guid).await.unwrap().unwrap();
        let by_id = cache.get_by_id(8).await.unwrap().unwrap();

        assert!(Arc::ptr_eq(&by_guid, &by_id));
        assert_eq!(by_guid.record(), by_id.record());
    }

    #[tokio::test]
    async fn test_get_by_guid_unknown_returns_none() {
        let (_store, cache) = seeded_cache(&[make_channel(1, "News")]);
        let result = cache.get_by_guid(new_entity_guid()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_register_replaces_slot() {
        let channel = make_channel(3, "Events");
        let (_store, cache) = seeded_cache(&[channel.clone()]);

        let loaded = cache.get_by_id(3).await.unwrap().unwrap();

        let mut renamed = channel;
        renamed.name = "All Events".to_string();
        let registered = cache.register(&renamed).unwrap();

        assert!(!Arc::ptr_eq(&loaded, &registered));
        let current = cache.get_by_id(3).await.unwrap().unwrap();
        assert_eq!(current.record().name, "All Events");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_all_returns_superset_of_individual_loads() {
        let (_store, cache) = seeded_cache(&[
            make_channel(1, "A"),
            make_channel(2, "B"),
            make_channel(3, "C"),
        ]);

        let individually_loaded = cache.get_by_id(2).await.unwrap().unwrap();

        let all = cache.all().await.unwrap();
        let ids: Vec<EntityId> = all.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        // The individually-loaded entry is reused, not replaced.
        let from_all = all.iter().find(|e| e.id() == 2).unwrap();
        assert!(Arc::ptr_eq(&individually_loaded, from_all));
    }

    #[tokio::test]
    async fn test_all_full_load_runs_once() {
        let (store, cache) = seeded_cache(&[make_channel(1, "A"), make_channel(2, "B")]);

        cache.all().await.unwrap();
        cache.all().await.unwrap();
        assert_eq!(store.stats().find_all_calls, 1);

        // invalidate_all re-arms the full load.
        cache.invalidate_all().unwrap();
        cache.all().await.unwrap();
        assert_eq!(store.stats().find_all_calls, 2);
    }

    #[tokio::test]
    async fn test_all_is_snapshot_not_live_view() {
        let (store, cache) = seeded_cache(&[make_channel(1, "A")]);

        let snapshot = cache.all().await.unwrap();
        store.insert(make_channel(2, "B")).unwrap();
        cache.get_by_id(2).await.unwrap().unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_children_resolved_once_and_filter_deleted() {
        let (store, cache) = seeded_cache(&[
            make_channel(5, "Parent"),
            make_channel(12, "First"),
            make_channel(7, "Second"),
        ]);
        store.link_child(5, 12).unwrap();
        store.link_child(5, 7).unwrap();

        let parent = cache.get_by_id(5).await.unwrap().unwrap();

        let children = cache.children_of(&parent).await.unwrap();
        let ids: Vec<EntityId> = children.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![12, 7]);
        assert_eq!(store.stats().find_children_calls, 1);

        // Delete child 7 from the store without touching parent 5's entry,
        // and drop its cached entry so the next lookup goes to the store.
        store.remove(7).unwrap();
        cache.invalidate(7).unwrap();

        let children = cache.children_of(&parent).await.unwrap();
        let ids: Vec<EntityId> = children.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![12]);
        // Memoized: the relation query never re-runs.
        assert_eq!(store.stats().find_children_calls, 1);
    }

    #[tokio::test]
    async fn test_parents_memoized_like_children() {
        let (store, cache) = seeded_cache(&[
            make_channel(1, "Parent A"),
            make_channel(2, "Parent B"),
            make_channel(9, "Child"),
        ]);
        store.link_child(1, 9).unwrap();
        store.link_child(2, 9).unwrap();

        let child = cache.get_by_id(9).await.unwrap().unwrap();

        let parents = cache.parents_of(&child).await.unwrap();
        let ids: Vec<EntityId> = parents.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![1, 2]);

        cache.parents_of(&child).await.unwrap();
        assert_eq!(store.stats().find_parents_calls, 1);
    }

    #[tokio::test]
    async fn test_relation_lists_only_direct_no_recursion() {
        // 1 -> 2 -> 1 cycle: resolution must return direct relations only.
        let (store, cache) = seeded_cache(&[make_channel(1, "A"), make_channel(2, "B")]);
        store.link_child(1, 2).unwrap();
        store.link_child(2, 1).unwrap();

        let a = cache.get_by_id(1).await.unwrap().unwrap();
        let children = cache.children_of(&a).await.unwrap();

        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_cold_get_converges_to_one_entry() {
        let (_store, cache) = seeded_cache(&[make_channel(42, "Racy")]);
        let cache = Arc::new(cache);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(
                async move { cache.get_by_id(42).await.unwrap() },
            ));
        }

        let mut entries = Vec::new();
        for handle in handles {
            let entry = handle.await.unwrap().unwrap();
            assert_eq!(entry.record().name, "Racy");
            entries.push(entry);
        }

        assert_eq!(cache.len(), 1);
        let stored = cache.get_by_id(42).await.unwrap().unwrap();
        for entry in &entries {
            assert_eq!(entry.record(), stored.record());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_relation_resolution_is_single_flight() {
        let (store, cache) = seeded_cache(&[
            make_channel(1, "Parent"),
            make_channel(2, "X"),
            make_channel(3, "Y"),
        ]);
        store.link_child(1, 2).unwrap();
        store.link_child(1, 3).unwrap();
        let cache = Arc::new(cache);

        let parent = cache.get_by_id(1).await.unwrap().unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let parent = Arc::clone(&parent);
            handles.push(tokio::spawn(async move {
                cache.children_of(&parent).await.unwrap().len()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), 2);
        }

        assert_eq!(store.stats().find_children_calls, 1);
    }

    #[tokio::test]
    async fn test_stats_hit_rate() {
        let (_store, cache) = seeded_cache(&[make_channel(1, "News")]);

        cache.get_by_id(1).await.unwrap(); // miss
        cache.get_by_id(1).await.unwrap(); // hit
        cache.get_by_id(1).await.unwrap(); // hit

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 0.001);
    }
}
