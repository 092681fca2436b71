//! Module loading for hydration.
//!
//! Every URL is fetched at most once. Concurrent requests for the same URL
//! share one in-flight future, and a module is only reported as loaded once
//! its dependencies have loaded too.

use futures::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::validate::{CompilerError, ERR_MODULE_LOAD};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    pub url: String,
    pub exports: Vec<String>,
    pub dependencies: Vec<String>,
}

impl ModuleRecord {
    pub fn new(url: &str, exports: &[&str]) -> Self {
        ModuleRecord {
            url: url.to_string(),
            exports: exports.iter().map(|e| e.to_string()).collect(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: &[&str]) -> Self {
        self.dependencies = dependencies.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn has_export(&self, name: &str) -> bool {
        self.exports.iter().any(|e| e == name)
    }
}

/// Where module records come from.
pub trait ModuleSource: Send + Sync {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<ModuleRecord, CompilerError>>;
}

/// A fixed set of modules held in memory.
#[derive(Debug, Default)]
pub struct InMemorySource {
    modules: HashMap<String, ModuleRecord>,
    fetches: AtomicUsize,
}

impl InMemorySource {
    pub fn new(modules: impl IntoIterator<Item = ModuleRecord>) -> Self {
        InMemorySource {
            modules: modules.into_iter().map(|m| (m.url.clone(), m)).collect(),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of `fetch` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ModuleSource for InMemorySource {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<ModuleRecord, CompilerError>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let result = self.modules.get(url).cloned().ok_or_else(|| {
            CompilerError::runtime(
                ERR_MODULE_LOAD,
                &format!("Module '{}' not found", url),
                Some(url.to_string()),
            )
        });
        future::ready(result).boxed()
    }
}

type LoadResult = Result<Arc<ModuleRecord>, CompilerError>;
type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

enum ModuleState {
    Loading {
        /// Resolves when the module's own record is available.
        fetched: SharedLoad,
        /// Resolves when the module and all its dependencies are loaded.
        done: SharedLoad,
    },
    Loaded(Arc<ModuleRecord>),
    Failed(CompilerError),
}

/// Per-URL load state shared by every hydration that uses this cache.
#[derive(Clone)]
pub struct ModuleCache {
    source: Arc<dyn ModuleSource>,
    states: Arc<Mutex<HashMap<String, ModuleState>>>,
}

impl ModuleCache {
    pub fn new(source: Arc<dyn ModuleSource>) -> Self {
        ModuleCache {
            source,
            states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Loads `url` and, transitively, its dependencies.
    pub async fn load(&self, url: &str) -> LoadResult {
        self.load_from(url.to_string(), Vec::new()).await
    }

    pub fn loaded(&self, url: &str) -> Option<Arc<ModuleRecord>> {
        match self.states.lock().get(url) {
            Some(ModuleState::Loaded(record)) => Some(record.clone()),
            _ => None,
        }
    }

    pub fn failure(&self, url: &str) -> Option<CompilerError> {
        match self.states.lock().get(url) {
            Some(ModuleState::Failed(error)) => Some(error.clone()),
            _ => None,
        }
    }

    /// `importers` is the chain of modules whose dependency list led here.
    fn load_from(&self, url: String, importers: Vec<String>) -> BoxFuture<'static, LoadResult> {
        let mut states = self.states.lock();
        match states.get(&url) {
            Some(ModuleState::Loaded(record)) => return future::ready(Ok(record.clone())).boxed(),
            Some(ModuleState::Failed(error)) => return future::ready(Err(error.clone())).boxed(),
            Some(ModuleState::Loading { fetched, done }) => {
                if importers.is_empty() {
                    return done.clone().boxed();
                }
                // Another load owns this module and may itself be waiting on
                // an importer, so a dependency edge only waits for the fetch.
                if importers.contains(&url) {
                    debug!(url = %url, "module dependency cycle");
                }
                return fetched.clone().boxed();
            }
            None => {}
        }

        let fetched: SharedLoad = self
            .source
            .fetch(&url)
            .map(|result| result.map(Arc::new))
            .boxed()
            .shared();

        let cache = self.clone();
        let link_url = url.clone();
        let link_fetched = fetched.clone();
        let done: SharedLoad = async move {
            let result = cache.link(&link_url, link_fetched, importers).await;
            let mut states = cache.states.lock();
            match &result {
                Ok(record) => {
                    states.insert(link_url.clone(), ModuleState::Loaded(record.clone()));
                }
                Err(error) => {
                    states.insert(link_url.clone(), ModuleState::Failed(error.clone()));
                }
            }
            result
        }
        .boxed()
        .shared();

        states.insert(
            url,
            ModuleState::Loading {
                fetched,
                done: done.clone(),
            },
        );
        drop(states);
        done.boxed()
    }

    async fn link(&self, url: &str, fetched: SharedLoad, mut importers: Vec<String>) -> LoadResult {
        let record = fetched.await.map_err(|e| {
            debug!(url = %url, error = %e.message, "module fetch failed");
            e
        })?;
        importers.push(url.to_string());
        for dependency in &record.dependencies {
            if let Err(e) = self.load_from(dependency.clone(), importers.clone()).await {
                return Err(CompilerError::runtime(
                    ERR_MODULE_LOAD,
                    &format!(
                        "Module '{}' failed to load because its dependency '{}' failed: {}",
                        url, dependency, e.message
                    ),
                    Some(url.to_string()),
                ));
            }
        }
        debug!(url = %url, dependencies = record.dependencies.len(), "module loaded");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_concurrent_loads_fetch_once() {
        let source = Arc::new(InMemorySource::new([ModuleRecord::new("/a.js", &["A"])]));
        let cache = ModuleCache::new(source.clone());
        let (first, second) = block_on(future::join(cache.load("/a.js"), cache.load("/a.js")));
        assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
        assert_eq!(source.fetch_count(), 1);
        assert!(cache.loaded("/a.js").is_some());
    }

    #[test]
    fn test_dependency_cycle_completes() {
        let source = Arc::new(InMemorySource::new([
            ModuleRecord::new("/a.js", &["A"]).with_dependencies(&["/b.js"]),
            ModuleRecord::new("/b.js", &["B"]).with_dependencies(&["/a.js"]),
        ]));
        let cache = ModuleCache::new(source.clone());
        let record = block_on(cache.load("/a.js")).unwrap();
        assert!(record.has_export("A"));
        assert!(cache.loaded("/b.js").is_some());
        assert_eq!(source.fetch_count(), 2);
    }

    #[test]
    fn test_failed_dependency_fails_importer() {
        let source = Arc::new(InMemorySource::new([
            ModuleRecord::new("/a.js", &["A"]).with_dependencies(&["/missing.js"]),
            ModuleRecord::new("/c.js", &["C"]),
        ]));
        let cache = ModuleCache::new(source.clone());
        let error = block_on(cache.load("/a.js")).unwrap_err();
        assert_eq!(error.code, ERR_MODULE_LOAD);
        assert!(cache.failure("/missing.js").is_some());
        assert!(cache.failure("/a.js").is_some());

        // Unrelated modules are unaffected, and failures are not refetched.
        assert!(block_on(cache.load("/c.js")).is_ok());
        assert!(block_on(cache.load("/a.js")).is_err());
        assert_eq!(source.fetch_count(), 3);
    }
}
