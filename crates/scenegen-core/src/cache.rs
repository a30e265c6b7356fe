//! Per-batch API detail cache using moka
//!
//! Variable registration and generation both need the detail of every
//! selected API. The cache loads each one once per batch; concurrent
//! lookups of the same id wait on a single catalog call.

use crate::context::ApplyContext;
use crate::error::{Cancelled, PlatformError};
use crate::platform::{ApiCatalog, ApiOperation};
use moka::future::Cache;
use std::sync::Arc;

/// API detail cache bound to one catalog
#[derive(Clone)]
pub struct ApiDetailCache {
    inner: Cache<u64, Arc<ApiOperation>>,
    catalog: Arc<dyn ApiCatalog>,
}

impl std::fmt::Debug for ApiDetailCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiDetailCache")
            .field("entry_count", &self.inner.entry_count())
            .finish_non_exhaustive()
    }
}

impl ApiDetailCache {
    /// Create new cache with max capacity
    #[inline]
    #[must_use]
    pub fn new(catalog: Arc<dyn ApiCatalog>, max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
            catalog,
        }
    }

    /// Get the detail of an API, loading it on first use
    ///
    /// Failed loads are not cached.
    ///
    /// # Errors
    /// - `Ok(Err(_))` with the catalog failure
    /// - `Err(Cancelled)` if the batch was cancelled
    pub async fn get(
        &self,
        ctx: &ApplyContext,
        api_index_id: u64,
    ) -> Result<Result<Arc<ApiOperation>, PlatformError>, Cancelled> {
        if ctx.is_cancelled() {
            return Err(Cancelled);
        }
        let catalog = Arc::clone(&self.catalog);
        let load = self.inner.try_get_with(api_index_id, async move {
            tracing::debug!("loading api detail for api index {}", api_index_id);
            catalog
                .get_api_operation(ctx.org_id, &ctx.user_id, api_index_id)
                .await
                .map(Arc::new)
        });
        let out = ctx.guard(load).await?;
        Ok(out.map_err(|e| PlatformError::clone(&e)))
    }

    /// Number of cached details
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}
