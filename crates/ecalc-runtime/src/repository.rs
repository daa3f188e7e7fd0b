//! Catalog repositories
//!
//! The resolver never fetches anything itself. A [`CatalogRepository`]
//! produces a [`CatalogSnapshot`] from wherever records live; callers turn
//! it into a [`MemoryCatalog`] and hand that to the resolver.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ecalc_model::{CatalogError, CatalogSnapshot, MemoryCatalog};
use moka::future::Cache;

use crate::error::RepositoryError;

/// Source of catalog snapshots
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Fetch all formulas, lookups and card fields
    async fn load_snapshot(&self) -> Result<Arc<CatalogSnapshot>, RepositoryError>;

    /// Fetch and index a validated catalog
    async fn load_catalog(&self) -> Result<MemoryCatalog, RepositoryError> {
        let snapshot = self.load_snapshot().await?;
        Ok(MemoryCatalog::from_snapshot(CatalogSnapshot::clone(&snapshot))?)
    }
}

/// Catalog stored as a JSON or YAML file
#[derive(Debug, Clone)]
pub struct FileCatalogRepository {
    path: PathBuf,
}

impl FileCatalogRepository {
    /// Create repository for `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get file path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CatalogRepository for FileCatalogRepository {
    async fn load_snapshot(&self) -> Result<Arc<CatalogSnapshot>, RepositoryError> {
        let extension = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let decode: fn(&str) -> Result<CatalogSnapshot, CatalogError> = match extension.as_deref() {
            Some("json") => CatalogSnapshot::from_json_str,
            Some("yaml" | "yml") => CatalogSnapshot::from_yaml_str,
            _ => return Err(RepositoryError::UnsupportedFormat(self.path.clone())),
        };

        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| RepositoryError::Io {
                path: self.path.clone(),
                source,
            })?;
        let snapshot = decode(&text)?;
        tracing::info!(
            "Loaded catalog from {}: {} formulas, {} lookups, {} fields",
            self.path.display(),
            snapshot.formulas.len(),
            snapshot.lookups.len(),
            snapshot.card_fields.len()
        );
        Ok(Arc::new(snapshot))
    }
}

/// Caches the snapshot of an inner repository for a fixed time
pub struct CachedRepository<R> {
    inner: R,
    cache: Cache<(), Arc<CatalogSnapshot>>,
}

impl<R> std::fmt::Debug for CachedRepository<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedRepository")
            .field("cached", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl<R: CatalogRepository> CachedRepository<R> {
    /// Wrap `inner`, keeping its snapshot for `ttl`
    #[must_use]
    pub fn new(inner: R, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    /// Drop the cached snapshot
    pub async fn invalidate(&self) {
        self.cache.invalidate(&()).await;
    }

    /// Get inner repository
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &R {
        &self.inner
    }
}

#[async_trait]
impl<R: CatalogRepository> CatalogRepository for CachedRepository<R> {
    async fn load_snapshot(&self) -> Result<Arc<CatalogSnapshot>, RepositoryError> {
        if let Some(cached) = self.cache.get(&()).await {
            tracing::debug!("Catalog cache hit");
            return Ok(cached);
        }

        let snapshot = self.inner.load_snapshot().await?;
        self.cache.insert((), Arc::clone(&snapshot)).await;
        Ok(snapshot)
    }
}
