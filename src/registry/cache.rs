//! Per-run metadata cache
//!
//! Each package name is fetched at most once per run; concurrent callers
//! asking for the same name wait on the same in-flight request. Failures
//! are cached too.

use super::{PackageMetadata, RegistryAdapter};
use crate::error::RegistryError;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::{OnceCell, Semaphore};
use tokio::task::JoinSet;
use tracing::debug;

/// Default concurrency limit for registry requests
pub const DEFAULT_CONCURRENCY: usize = 10;

type CachedResult = Result<Arc<PackageMetadata>, RegistryError>;

/// Registry adapter wrapper that caches per package name
pub struct MetadataCache {
    adapter: Arc<dyn RegistryAdapter>,
    cells: Mutex<HashMap<String, Arc<OnceCell<CachedResult>>>>,
    semaphore: Arc<Semaphore>,
}

impl MetadataCache {
    pub fn new(adapter: Arc<dyn RegistryAdapter>) -> Self {
        Self::with_concurrency(adapter, DEFAULT_CONCURRENCY)
    }

    pub fn with_concurrency(adapter: Arc<dyn RegistryAdapter>, concurrency: usize) -> Self {
        Self {
            adapter,
            cells: Mutex::new(HashMap::new()),
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Registry name of the wrapped adapter
    pub fn registry_name(&self) -> &str {
        self.adapter.registry_name()
    }

    fn cell(&self, package: &str) -> Arc<OnceCell<CachedResult>> {
        let mut cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.entry(package.to_string()).or_default().clone()
    }

    /// Fetch one package, hitting the registry only on first use
    pub async fn fetch(&self, package: &str) -> CachedResult {
        let cell = self.cell(package);
        cell.get_or_init(|| async {
            let _permit = self.semaphore.acquire().await;
            debug!("fetching metadata for {package}");
            self.adapter.fetch_metadata(package).await.map(Arc::new)
        })
        .await
        .clone()
    }

    /// Fetch distinct names concurrently and wait for all of them
    pub async fn fetch_all<I, S>(self: &Arc<Self>, packages: I) -> BTreeMap<String, CachedResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = JoinSet::new();
        let mut results = BTreeMap::new();
        for package in packages {
            let package: String = package.into();
            if results.contains_key(&package) {
                continue;
            }
            results.insert(
                package.clone(),
                Err(RegistryError::network_error(
                    &package,
                    self.registry_name(),
                    "metadata request did not complete",
                )),
            );
            let cache = Arc::clone(self);
            set.spawn(async move {
                let result = cache.fetch(&package).await;
                (package, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((package, result)) => {
                    results.insert(package, result);
                }
                Err(e) => debug!("metadata task failed: {e}"),
            }
        }
        results
    }
}
