//! Object-storage URL signing collaborator.

use super::CollabResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

#[async_trait]
pub trait UrlSigner: Send + Sync {
    /// Signs many storage keys in one round trip.
    ///
    /// Keys the backend cannot sign map to `None`; the response may also
    /// contain keys that were not requested.
    async fn create_signed_urls(
        &self,
        keys: &[String],
        ttl: Duration,
    ) -> CollabResult<HashMap<String, Option<String>>>;
}
