//! Stream lookup facade
//!
//! Ties the catalog, the identity resolver, the provider release listing and
//! the link extractor together behind the operations the HTTP API and the CLI
//! call. Every operation runs under one deadline of `request_ceiling`.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::{info, warn};
use undertow_core::cache::{CacheKey, CacheStore, CoalescingCache, open_store};
use undertow_core::http::{HttpExecutor, RequestExecutor};
use undertow_core::{
    CatalogEntry, Deadline, EpisodeDescriptor, EpisodeId, LookupError, ProviderSession,
    StreamVariant, UndertowConfig,
};
use undertow_extract::LinkExtractor;

use crate::catalog::CatalogClient;
use crate::providers::{AnimepaheProvider, ProviderCatalog};
use crate::resolver::IdentityResolver;
use crate::types::{CatalogEpisodePage, ReleaseEntry};

/// Name under which the single supported provider is addressed.
pub const SUPPORTED_PROVIDER: &str = "kwik";

const RELEASE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Rejects any provider other than the supported one.
///
/// # Errors
/// - `LookupError::InvalidInput` - `provider` is not supported
pub fn ensure_provider(provider: &str) -> Result<(), LookupError> {
    if provider == SUPPORTED_PROVIDER {
        Ok(())
    } else {
        Err(LookupError::invalid_input(format!(
            "provider {provider} not supported"
        )))
    }
}

/// Cache key for one page of an entry's provider episode listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EpisodePageKey {
    pub catalog_id: u64,
    pub page: u32,
}

impl CacheKey for EpisodePageKey {
    fn cache_key(&self) -> String {
        format!("{}:episodes_{}", self.catalog_id, self.page)
    }
}

/// Catalog lookup, session resolution, episode listing and stream extraction.
#[derive(Debug)]
pub struct StreamLookupService {
    catalog: CatalogClient,
    entries: CoalescingCache<u64, CatalogEntry>,
    provider: Arc<dyn ProviderCatalog>,
    resolver: IdentityResolver,
    episodes: CoalescingCache<EpisodePageKey, Vec<EpisodeDescriptor>>,
    extractor: LinkExtractor,
    catalog_ttl: Duration,
    request_ceiling: Duration,
}

impl StreamLookupService {
    /// Builds the service with a live HTTP executor and the configured store.
    ///
    /// # Errors
    /// - `LookupError::Upstream` - The configured Redis store is unreachable
    /// - `LookupError::Internal` - The HTTP client or extractor could not be built
    pub async fn connect(config: &UndertowConfig) -> Result<Self, LookupError> {
        let executor: Arc<dyn RequestExecutor> = Arc::new(HttpExecutor::new()?);
        let store = open_store(&config.cache).await?;
        Self::new(config, executor, store)
    }

    /// Builds the service on an existing executor and store.
    ///
    /// # Errors
    /// - `LookupError::Internal` - The extractor could not be built
    pub fn new(
        config: &UndertowConfig,
        executor: Arc<dyn RequestExecutor>,
        store: Arc<dyn CacheStore>,
    ) -> Result<Self, LookupError> {
        let provider = Arc::new(AnimepaheProvider::new(
            Arc::clone(&executor),
            config.provider.clone(),
        ));
        Self::with_provider(config, executor, provider, store)
    }

    /// Builds the service with a custom provider implementation.
    ///
    /// # Errors
    /// - `LookupError::Internal` - The extractor could not be built
    pub fn with_provider(
        config: &UndertowConfig,
        executor: Arc<dyn RequestExecutor>,
        provider: Arc<dyn ProviderCatalog>,
        store: Arc<dyn CacheStore>,
    ) -> Result<Self, LookupError> {
        let namespace = config.cache.namespace.as_str();

        Ok(Self {
            catalog: CatalogClient::new(Arc::clone(&executor), &config.catalog),
            entries: CoalescingCache::new(
                Arc::clone(&store),
                format!("{namespace}:catalog"),
                Some(config.cache.catalog_ttl),
            ),
            resolver: IdentityResolver::new(
                Arc::clone(&provider),
                Arc::clone(&store),
                namespace,
                config.matching.clone(),
            ),
            provider,
            episodes: CoalescingCache::new(
                Arc::clone(&store),
                format!("{namespace}:provider"),
                Some(config.cache.episode_ttl),
            ),
            extractor: LinkExtractor::new(executor, store, config)?,
            catalog_ttl: config.cache.catalog_ttl,
            request_ceiling: config.extraction.request_ceiling,
        })
    }

    fn deadline(&self) -> Deadline {
        Deadline::after(self.request_ceiling)
    }

    /// Searches the catalog for `term`.
    ///
    /// Entries without a media type or year are skipped since they can never
    /// be matched to a provider. Returned entries are cached so a follow-up
    /// lookup by id does not hit the catalog again.
    ///
    /// # Errors
    /// - `LookupError::InvalidInput` - `term` is blank
    /// - `LookupError::Upstream` - The catalog search failed
    /// - `LookupError::Timeout` - The request ceiling elapsed
    pub async fn search_catalog(&self, term: &str) -> Result<Vec<CatalogEntry>, LookupError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(LookupError::invalid_input("search query must not be empty"));
        }

        let deadline = self.deadline();
        let entries: Vec<CatalogEntry> = self
            .catalog
            .search(term, 1, &deadline)
            .await?
            .into_iter()
            .filter(|entry| entry.media_type.is_some() && entry.year.is_some())
            .collect();

        for entry in &entries {
            if let Err(e) = self.entries.set(&entry.id, entry, Some(self.catalog_ttl)).await {
                warn!("Failed to cache catalog entry {}: {}", entry.id, e);
            }
        }

        Ok(entries)
    }

    /// Looks up a catalog entry by id.
    ///
    /// # Errors
    /// - `LookupError::NotFound` - The catalog has no such entry
    /// - `LookupError::Upstream` - The catalog request failed
    /// - `LookupError::Timeout` - The request ceiling elapsed
    pub async fn catalog_entry(&self, catalog_id: u64) -> Result<CatalogEntry, LookupError> {
        let deadline = self.deadline();
        self.entry_within(catalog_id, &deadline).await
    }

    async fn entry_within(
        &self,
        catalog_id: u64,
        deadline: &Deadline,
    ) -> Result<CatalogEntry, LookupError> {
        self.entries
            .get_or_compute(&catalog_id, || self.catalog.get_by_id(catalog_id, deadline))
            .await
    }

    /// Fetches one page of the catalog's own episode list, uncached.
    ///
    /// # Errors
    /// - `LookupError::InvalidInput` - `page` is zero
    /// - `LookupError::NotFound` - The catalog has no such entry
    /// - `LookupError::Upstream` - The catalog request failed
    /// - `LookupError::Timeout` - The request ceiling elapsed
    pub async fn catalog_episodes(
        &self,
        catalog_id: u64,
        page: u32,
    ) -> Result<CatalogEpisodePage, LookupError> {
        ensure_page(page)?;
        self.catalog
            .get_episodes(catalog_id, page, &self.deadline())
            .await
    }

    /// Resolves a catalog entry to its provider session.
    ///
    /// # Errors
    /// - `LookupError::NotFound` - No provider candidate matches
    /// - `LookupError::Upstream` - The provider search failed
    /// - `LookupError::Internal` - The entry has no usable title
    /// - `LookupError::Timeout` - The request ceiling elapsed
    pub async fn resolve_session(
        &self,
        entry: &CatalogEntry,
    ) -> Result<ProviderSession, LookupError> {
        self.resolver.resolve(entry, &self.deadline()).await
    }

    /// Looks up the catalog entry and resolves its provider session.
    ///
    /// # Errors
    /// - Any error of [`Self::catalog_entry`] or [`Self::resolve_session`]
    pub async fn resolve_by_id(
        &self,
        catalog_id: u64,
    ) -> Result<(CatalogEntry, ProviderSession), LookupError> {
        let deadline = self.deadline();
        let entry = self.entry_within(catalog_id, &deadline).await?;
        let session = self.resolver.resolve(&entry, &deadline).await?;
        Ok((entry, session))
    }

    /// Forgets the cached provider session of `catalog_id`.
    ///
    /// # Errors
    /// - `LookupError::Upstream` - The cache store could not be reached
    pub async fn invalidate_session(&self, catalog_id: u64) -> Result<(), LookupError> {
        self.resolver.invalidate(catalog_id).await?;
        info!("Invalidated provider session for {}", catalog_id);
        Ok(())
    }

    /// Lists one page of provider episodes, newest first.
    ///
    /// # Errors
    /// - `LookupError::InvalidInput` - `page` is zero
    /// - `LookupError::NotFound` - Unknown entry, no provider match, or an empty page
    /// - `LookupError::Upstream` - A catalog or provider request failed
    /// - `LookupError::Timeout` - The request ceiling elapsed
    pub async fn list_episodes(
        &self,
        catalog_id: u64,
        page: u32,
    ) -> Result<Vec<EpisodeDescriptor>, LookupError> {
        ensure_page(page)?;
        let deadline = self.deadline();
        let key = EpisodePageKey { catalog_id, page };

        self.episodes
            .get_or_compute(&key, || async {
                let entry = self.entry_within(catalog_id, &deadline).await?;
                let session = self.resolver.resolve(&entry, &deadline).await?;
                let releases = self.provider.releases(&session, page, &deadline).await?;
                if releases.is_empty() {
                    return Err(LookupError::not_found("episodes"));
                }
                Ok(releases.into_iter().map(describe_release).collect())
            })
            .await
    }

    /// Extracts the playable variants of one episode.
    ///
    /// # Errors
    /// - `LookupError::InvalidInput` - `episode` is not a provider episode session
    /// - `LookupError::NotFound` - Unknown entry, no provider match, or no such episode
    /// - `LookupError::Upstream` - A catalog, provider or page request failed
    /// - `LookupError::Timeout` - The request ceiling elapsed
    pub async fn get_variants(
        &self,
        catalog_id: u64,
        episode: &EpisodeId,
    ) -> Result<Vec<StreamVariant>, LookupError> {
        if let EpisodeId::Number(number) = episode {
            return Err(LookupError::invalid_input(format!(
                "episode id {number} is not a provider episode session"
            )));
        }

        let deadline = self.deadline();
        let entry = self.entry_within(catalog_id, &deadline).await?;
        let session = self.resolver.resolve(&entry, &deadline).await?;
        self.extractor
            .get_variants(catalog_id, &session, episode, &deadline)
            .await
    }
}

fn ensure_page(page: u32) -> Result<(), LookupError> {
    if page == 0 {
        return Err(LookupError::invalid_input("page must be at least 1"));
    }
    Ok(())
}

fn describe_release(release: ReleaseEntry) -> EpisodeDescriptor {
    let created_at =
        NaiveDateTime::parse_from_str(&release.created_at, RELEASE_TIMESTAMP_FORMAT).ok();
    let duration = Some(release.duration).filter(|duration| !duration.is_empty());

    EpisodeDescriptor {
        id: EpisodeId::Session(release.session),
        episode: release.episode,
        title: format!("Episode {}", release.episode),
        snapshot: release.snapshot,
        duration,
        created_at,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    fn release(episode: u32, created_at: &str) -> ReleaseEntry {
        ReleaseEntry {
            id: 1,
            episode,
            title: String::new(),
            snapshot: format!("https://i.test/{episode}.jpg"),
            audio: "jpn".to_string(),
            duration: "00:23:40".to_string(),
            session: format!("ep{episode}"),
            created_at: created_at.to_string(),
        }
    }

    #[test]
    fn test_release_description() {
        let descriptor = describe_release(release(12, "2024-03-22 17:05:12"));

        assert_eq!(descriptor.id, EpisodeId::Session("ep12".to_string()));
        assert_eq!(descriptor.title, "Episode 12");
        assert_eq!(descriptor.duration.as_deref(), Some("00:23:40"));
        let created_at = descriptor.created_at.unwrap();
        assert_eq!(created_at.year(), 2024);
        assert_eq!(created_at.hour(), 17);
    }

    #[test]
    fn test_unparseable_timestamp_is_dropped() {
        let descriptor = describe_release(release(1, "yesterday"));
        assert!(descriptor.created_at.is_none());
    }

    #[test]
    fn test_provider_name_check() {
        assert!(ensure_provider("kwik").is_ok());
        assert!(matches!(
            ensure_provider("gogo"),
            Err(LookupError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_episode_page_key() {
        let key = EpisodePageKey {
            catalog_id: 21,
            page: 3,
        };
        assert_eq!(key.cache_key(), "21:episodes_3");
    }
}
