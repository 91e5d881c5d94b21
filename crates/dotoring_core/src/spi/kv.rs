//! Durable key-value collaborator.

use super::CollabResult;
use async_trait::async_trait;

/// String key-value storage that survives process restart.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> CollabResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> CollabResult<()>;

    /// Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> CollabResult<()>;

    /// Returns one `(key, value)` pair per requested key, in request order.
    async fn multi_get(&self, keys: &[String]) -> CollabResult<Vec<(String, Option<String>)>>;

    async fn multi_remove(&self, keys: &[String]) -> CollabResult<()>;

    /// Returns every stored key starting with `prefix`, sorted ascending.
    async fn list_keys_with_prefix(&self, prefix: &str) -> CollabResult<Vec<String>>;
}
