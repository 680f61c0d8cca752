//! Process-wide result store
//!
//! Query results may be paged asynchronously after the submitting call
//! returns, so they are kept in a keyed store shared across independent
//! submissions. The map is sharded by key hash: concurrent puts/gets for
//! distinct jobs contend only within their shard, never on one global lock.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;

use sluice_core::domain::result::TypedResult;

const SHARD_COUNT: usize = 16;

/// Keyed store of typed results, one entry per job id.
pub struct ResultStore {
    shards: Vec<RwLock<HashMap<String, TypedResult>>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT)
                .map(|_| RwLock::new(HashMap::new()))
                .collect(),
        }
    }

    fn shard(&self, key: &str) -> &RwLock<HashMap<String, TypedResult>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    pub fn put(&self, job_id: impl Into<String>, result: TypedResult) {
        let job_id = job_id.into();
        let mut shard = self.shard(&job_id).write().expect("result store lock");
        shard.insert(job_id, result);
    }

    pub fn get(&self, job_id: &str) -> Option<TypedResult> {
        let shard = self.shard(job_id).read().expect("result store lock");
        shard.get(job_id).cloned()
    }

    pub fn remove(&self, job_id: &str) -> Option<TypedResult> {
        let mut shard = self.shard(job_id).write().expect("result store lock");
        shard.remove(job_id)
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}
