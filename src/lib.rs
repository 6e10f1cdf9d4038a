pub mod cache;
pub mod isbn;
pub mod lookup;
pub mod pool;
pub mod providers;
pub mod report;

use cache::{CacheError, FileCache, ResolutionCache, DEFAULT_CACHE_TTL};
use isbn::{at_least_two_agree, normalize_and_order, normalize_title_key};
use lookup::{IsbnLookupMode, LookupResult, ProviderSelection};
use pool::{WorkerPool, DEFAULT_POOL_SIZE};
use providers::{
    google_books::GoogleBooksProvider, openlibrary::OpenLibraryProvider, IsbnProvider,
    ProviderError,
};

use futures::future::join_all;
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Configuration for the resolver
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Optional Google Books API key; blank means anonymous access
    pub google_api_key: Option<String>,
    pub worker_pool_size: usize,
    pub cache_ttl: Duration,
    pub cache_enabled: bool,
    /// Overrides the user cache directory
    pub cache_dir: Option<PathBuf>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            google_api_key: None,
            worker_pool_size: DEFAULT_POOL_SIZE,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_enabled: true,
            cache_dir: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("Failed to set up cache: {0}")]
    Cache(#[from] CacheError),
    #[error("Failed to set up provider: {0}")]
    Provider(#[from] ProviderError),
}

/// Resolves titles to ISBNs by consulting every selected provider concurrently
pub struct IsbnResolver {
    providers: Vec<Arc<dyn IsbnProvider>>,
    cache: Arc<dyn ResolutionCache>,
    pool: WorkerPool,
    cache_ttl: Duration,
}

impl IsbnResolver {
    pub fn new(
        providers: Vec<Arc<dyn IsbnProvider>>,
        cache: Arc<dyn ResolutionCache>,
        pool: WorkerPool,
    ) -> Self {
        Self {
            providers,
            cache,
            pool,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Build the Google Books and Open Library providers over a file cache
    pub fn from_config(config: &ResolverConfig) -> Result<Self, ResolverError> {
        let cache = match &config.cache_dir {
            Some(dir) => FileCache::in_dir(dir.clone(), config.cache_enabled)?,
            None => FileCache::new(config.cache_enabled)?,
        };

        let providers: Vec<Arc<dyn IsbnProvider>> = vec![
            Arc::new(GoogleBooksProvider::new(config.google_api_key.clone())?),
            Arc::new(OpenLibraryProvider::new()?),
        ];

        Ok(
            Self::new(providers, Arc::new(cache), WorkerPool::new(config.worker_pool_size))
                .with_cache_ttl(config.cache_ttl),
        )
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Close the worker pool. Later lookups find nothing but still answer.
    pub fn shutdown(&self) {
        self.pool.close();
    }

    /// Resolve `title` under `mode`.
    ///
    /// Never fails: provider and cache faults degrade to an empty, uncached
    /// result.
    pub async fn get_isbns_by_title(&self, title: &str, mode: IsbnLookupMode) -> LookupResult {
        let selected = self.select_providers(mode);
        let names: Vec<&str> = selected.iter().map(|p| p.name()).collect();
        let key = cache_key(title, mode, &names);

        match self.cache.get(&key).await {
            Ok(Some(stored)) => {
                tracing::debug!(%key, "cache hit");
                return LookupResult::from_cache(title, mode, split_cached(&stored));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(%key, error = %e, "cache read failed, treating as miss"),
        }

        let outputs = self.fan_out(&selected, title).await;
        let merged = merge(mode, &outputs);
        let sources_used = contributing_sources(&outputs, &merged);

        if !merged.is_empty() {
            if let Err(e) = self.cache.set(&key, &merged.join(","), self.cache_ttl).await {
                tracing::warn!(%key, error = %e, "cache write failed");
            }
        }

        tracing::info!(
            title,
            mode = mode.name(),
            found = merged.len(),
            sources = ?sources_used,
            "resolved title"
        );

        LookupResult::fresh(title, mode, merged, sources_used)
    }

    fn select_providers(&self, mode: IsbnLookupMode) -> Vec<Arc<dyn IsbnProvider>> {
        self.providers
            .iter()
            .filter(|p| match mode.selection() {
                ProviderSelection::All => true,
                ProviderSelection::Only(name) => p.name() == name,
            })
            .cloned()
            .collect()
    }

    /// Run every provider through the pool and wait for all of them.
    ///
    /// Output order follows `selected`, not completion order.
    async fn fan_out(
        &self,
        selected: &[Arc<dyn IsbnProvider>],
        title: &str,
    ) -> Vec<(&'static str, Vec<String>)> {
        let handles: Vec<_> = selected
            .iter()
            .map(|provider| {
                let provider = Arc::clone(provider);
                let title = title.to_string();
                self.pool
                    .spawn(async move { provider.find_isbns_by_title(&title).await })
            })
            .collect();

        let outcomes = join_all(handles).await;

        selected
            .iter()
            .zip(outcomes)
            .map(|(provider, outcome)| {
                let isbns = match outcome {
                    Ok(Some(isbns)) => isbns,
                    Ok(None) => {
                        tracing::warn!(provider = provider.name(), "worker pool closed, skipping");
                        Vec::new()
                    }
                    Err(e) => {
                        tracing::warn!(provider = provider.name(), error = %e, "provider task failed");
                        Vec::new()
                    }
                };
                (provider.name(), isbns)
            })
            .collect()
    }
}

/// Cache key for a title, mode and provider subset.
///
/// Provider names are sorted so the key does not depend on configuration order.
pub fn cache_key(title: &str, mode: IsbnLookupMode, provider_names: &[&str]) -> String {
    let mut names = provider_names.to_vec();
    names.sort_unstable();

    format!(
        "isbn:title:{}:mode:{}:providers:{}",
        normalize_title_key(title),
        mode.name(),
        names.join("+")
    )
}

fn split_cached(stored: &str) -> Vec<String> {
    stored
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn merge(mode: IsbnLookupMode, outputs: &[(&'static str, Vec<String>)]) -> Vec<String> {
    if mode.requires_agreement() {
        let lists: Vec<Vec<&str>> = outputs
            .iter()
            .map(|(_, isbns)| isbns.iter().map(String::as_str).collect())
            .collect();
        at_least_two_agree(&lists)
    } else {
        let all: Vec<&str> = outputs
            .iter()
            .flat_map(|(_, isbns)| isbns.iter().map(String::as_str))
            .collect();
        normalize_and_order(&all)
    }
}

/// Providers whose normalized output made it into the merged set
fn contributing_sources(
    outputs: &[(&'static str, Vec<String>)],
    merged: &[String],
) -> BTreeSet<String> {
    let merged: HashSet<&str> = merged.iter().map(String::as_str).collect();

    outputs
        .iter()
        .filter(|(_, isbns)| {
            normalize_and_order(isbns)
                .iter()
                .any(|isbn| merged.contains(isbn.as_str()))
        })
        .map(|(name, _)| name.to_string())
        .collect()
}
