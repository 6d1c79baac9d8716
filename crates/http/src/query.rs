//! Client-side query cache
//!
//! Reads are cached under hierarchical [`QueryKey`]s and served from memory
//! until a mutation invalidates them. Invalidation matches by key prefix, so
//! invalidating `["tasks"]` also drops `["tasks", "<project>"]`.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use taskboard_core::{NewProject, NewTask, Project, ProjectUpdate, Task, TaskUpdate};
use tracing::{debug, warn};

use crate::client::{ApiClient, ApiError};

/// Hierarchical cache key, e.g. `["tasks", "p1"]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn tasks(project_id: Option<&str>) -> Self {
        match project_id {
            Some(project_id) => Self::new(["tasks", project_id]),
            None => Self::new(["tasks"]),
        }
    }

    #[must_use]
    pub fn task(id: &str) -> Self {
        Self::new(["task", id])
    }

    #[must_use]
    pub fn projects() -> Self {
        Self::new(["projects"])
    }

    #[must_use]
    pub fn project(id: &str) -> Self {
        Self::new(["project", id])
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Check if `self` equals `prefix` or extends it
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// JSON values keyed by [`QueryKey`].
///
/// Every invalidation advances a generation counter. A fetch that started
/// before an invalidation must not repopulate the cache with what it read,
/// so writers pass the generation they observed to
/// [`insert_if_current`](Self::insert_if_current).
#[derive(Debug, Default)]
pub struct QueryCache {
    state: RwLock<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<QueryKey, Value>,
    generation: u64,
    /// Session epoch the entries belong to
    epoch: u64,
}

impl CacheState {
    fn invalidate(&mut self, prefix: &QueryKey) -> usize {
        self.generation += 1;
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        before - self.entries.len()
    }

    fn clear(&mut self) {
        self.generation += 1;
        self.entries.clear();
    }
}

impl QueryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &QueryKey) -> Option<Value> {
        self.read().entries.get(key).cloned()
    }

    pub fn insert(&self, key: QueryKey, value: Value) {
        self.write().entries.insert(key, value);
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Insert unless the cache was invalidated after `generation` was read
    pub fn insert_if_current(&self, key: QueryKey, value: Value, generation: u64) -> bool {
        let mut state = self.write();
        if state.generation != generation {
            return false;
        }
        state.entries.insert(key, value);
        true
    }

    /// Drop every entry whose key starts with `prefix`
    pub fn invalidate(&self, prefix: &QueryKey) {
        let removed = self.write().invalidate(prefix);
        if removed > 0 {
            debug!(%prefix, removed, "invalidated cached queries");
        }
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Empty the cache if it holds data from a session other than `epoch`
    pub fn sync_epoch(&self, epoch: u64) -> bool {
        let mut state = self.write();
        if state.epoch == epoch {
            return false;
        }
        state.clear();
        state.epoch = epoch;
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cached task and project queries over an [`ApiClient`]
#[derive(Debug, Clone)]
pub struct QueryClient {
    client: ApiClient,
    cache: Arc<QueryCache>,
}

impl QueryClient {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            cache: Arc::new(QueryCache::new()),
        }
    }

    #[must_use]
    pub const fn client(&self) -> &ApiClient {
        &self.client
    }

    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Tasks of one project, or all tasks when `project_id` is `None`
    pub async fn tasks(&self, project_id: Option<&str>) -> Result<Vec<Task>, ApiError> {
        let key = QueryKey::tasks(project_id);
        self.cached(key, || async {
            match project_id {
                Some(project_id) => self.client.list_project_tasks(project_id).await,
                None => self.client.list_tasks().await,
            }
        })
        .await
    }

    pub async fn task(&self, id: &str) -> Result<Task, ApiError> {
        self.cached(QueryKey::task(id), || self.client.get_task(id))
            .await
    }

    pub async fn projects(&self) -> Result<Vec<Project>, ApiError> {
        self.cached(QueryKey::projects(), || self.client.list_projects())
            .await
    }

    pub async fn project(&self, id: &str) -> Result<Project, ApiError> {
        self.cached(QueryKey::project(id), || self.client.get_project(id))
            .await
    }

    /// Project task counts change with the task list
    pub async fn create_task(&self, task: &NewTask) -> Result<Task, ApiError> {
        let created = self.client.create_task(task).await?;
        self.cache.invalidate(&QueryKey::tasks(None));
        self.cache.invalidate(&QueryKey::projects());
        Ok(created)
    }

    pub async fn update_task(&self, id: &str, update: &TaskUpdate) -> Result<Task, ApiError> {
        let updated = self.client.update_task(id, update).await?;
        self.cache.invalidate(&QueryKey::tasks(None));
        self.cache.invalidate(&QueryKey::task(id));
        Ok(updated)
    }

    pub async fn delete_task(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete_task(id).await?;
        self.cache.invalidate(&QueryKey::tasks(None));
        self.cache.invalidate(&QueryKey::task(id));
        self.cache.invalidate(&QueryKey::projects());
        Ok(())
    }

    pub async fn create_project(&self, project: &NewProject) -> Result<Project, ApiError> {
        let created = self.client.create_project(project).await?;
        self.cache.invalidate(&QueryKey::projects());
        Ok(created)
    }

    pub async fn update_project(
        &self,
        id: &str,
        update: &ProjectUpdate,
    ) -> Result<Project, ApiError> {
        let updated = self.client.update_project(id, update).await?;
        self.cache.invalidate(&QueryKey::projects());
        self.cache.invalidate(&QueryKey::project(id));
        Ok(updated)
    }

    /// Deleting a project also removes its tasks server-side
    pub async fn delete_project(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete_project(id).await?;
        self.cache.invalidate(&QueryKey::projects());
        self.cache.invalidate(&QueryKey::project(id));
        self.cache.invalidate(&QueryKey::tasks(None));
        Ok(())
    }

    /// Serve `key` from the cache or fetch and store it.
    ///
    /// Entries never outlive the session they were fetched under, and a
    /// fetch that overlaps an invalidation is returned but not stored.
    async fn cached<T, F, Fut>(&self, key: QueryKey, fetch: F) -> Result<T, ApiError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let epoch = self.client.session().epoch();
        if self.cache.sync_epoch(epoch) {
            debug!(epoch, "session changed; query cache cleared");
        }

        if let Some(value) = self.cache.get(&key) {
            match serde_json::from_value(value) {
                Ok(hit) => {
                    debug!(%key, "query cache hit");
                    return Ok(hit);
                }
                Err(error) => {
                    warn!(%error, %key, "cached value no longer decodes; refetching");
                    self.cache.invalidate(&key);
                }
            }
        }

        let generation = self.cache.generation();
        let fresh = fetch().await?;

        if self.client.session().epoch() != epoch {
            debug!(%key, "session changed during fetch; result not cached");
            return Ok(fresh);
        }
        match serde_json::to_value(&fresh) {
            Ok(value) => {
                if !self.cache.insert_if_current(key.clone(), value, generation) {
                    debug!(%key, "invalidated during fetch; result not cached");
                }
            }
            Err(error) => warn!(%error, %key, "response could not be cached"),
        }
        Ok(fresh)
    }
}
