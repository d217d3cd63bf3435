//! Catalog identity to provider session resolution.

use std::sync::Arc;

use tracing::{debug, info};
use undertow_core::cache::{CacheError, CacheStore, CoalescingCache};
use undertow_core::config::MatchingConfig;
use undertow_core::{CatalogEntry, Deadline, LookupError, ProviderSession};

use crate::matching::select_candidate;
use crate::providers::ProviderCatalog;

/// Finds the provider session matching a catalog entry.
///
/// Sessions are cached without expiry under the catalog id; provider
/// identities are stable once established.
#[derive(Debug)]
pub struct IdentityResolver {
    provider: Arc<dyn ProviderCatalog>,
    sessions: CoalescingCache<u64, ProviderSession>,
    matching: MatchingConfig,
}

impl IdentityResolver {
    pub fn new(
        provider: Arc<dyn ProviderCatalog>,
        store: Arc<dyn CacheStore>,
        namespace: &str,
        matching: MatchingConfig,
    ) -> Self {
        Self {
            provider,
            sessions: CoalescingCache::new(store, format!("{namespace}:session"), None),
            matching,
        }
    }

    /// Resolves `entry` to its provider session.
    ///
    /// # Errors
    /// - `LookupError::Internal` - The entry has no usable title to search for
    /// - `LookupError::NotFound` - No candidate passes the filters and threshold
    /// - `LookupError::Upstream` - The provider search failed
    /// - `LookupError::Timeout` - `deadline` elapsed
    pub async fn resolve(
        &self,
        entry: &CatalogEntry,
        deadline: &Deadline,
    ) -> Result<ProviderSession, LookupError> {
        self.sessions
            .get_or_compute(&entry.id, || self.search_session(entry, deadline))
            .await
    }

    /// Forgets the cached session for `catalog_id`.
    ///
    /// # Errors
    /// - `CacheError::Backend` - The store could not be reached
    pub async fn invalidate(&self, catalog_id: u64) -> Result<(), CacheError> {
        self.sessions.invalidate(&catalog_id).await
    }

    async fn search_session(
        &self,
        entry: &CatalogEntry,
        deadline: &Deadline,
    ) -> Result<ProviderSession, LookupError> {
        let term = entry.search_term().ok_or_else(|| {
            LookupError::internal(format!("catalog entry {} has no title", entry.id))
        })?;

        let candidates = self.provider.search(term, 1, deadline).await?;
        if candidates.is_empty() {
            return Err(LookupError::not_found("provider session"));
        }
        debug!(
            "Scoring {} provider candidates for {} ('{}')",
            candidates.len(),
            entry.id,
            term
        );

        let Some(chosen) = select_candidate(entry, &candidates, &self.matching) else {
            return Err(LookupError::not_found("provider session"));
        };

        info!(
            "Resolved {} to provider session {} ('{}', score {:.1})",
            entry.id, chosen.candidate.session, chosen.candidate.title, chosen.score
        );
        Ok(ProviderSession::new(chosen.candidate.session.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use undertow_core::{CatalogTitle, MemoryStore};

    use super::*;
    use crate::providers::MockProvider;
    use crate::providers::mock::candidate;

    fn entry() -> CatalogEntry {
        CatalogEntry {
            id: 40748,
            titles: vec![
                CatalogTitle {
                    kind: "Default".to_string(),
                    title: "Jujutsu Kaisen".to_string(),
                },
                CatalogTitle {
                    kind: "Japanese".to_string(),
                    title: "呪術廻戦".to_string(),
                },
            ],
            native_title: Some("呪術廻戦".to_string()),
            english_title: Some("Jujutsu Kaisen".to_string()),
            synonyms: Vec::new(),
            year: Some(2020),
            season: Some("fall".to_string()),
            media_type: Some("TV".to_string()),
            episodes: Some(24),
            poster: None,
            rating: None,
            synopsis: None,
        }
    }

    fn resolver(provider: Arc<MockProvider>) -> IdentityResolver {
        IdentityResolver::new(
            provider,
            Arc::new(MemoryStore::new(16)),
            "test",
            MatchingConfig::default(),
        )
    }

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_resolves_and_caches_session() {
        let provider = Arc::new(MockProvider::new(vec![
            candidate("Jujutsu Kaisen 0", 2021, "winter", "Movie", "movie"),
            candidate("Jujutsu Kaisen", 2020, "Fall", "TV", "jjk-session"),
        ]));
        let resolver = resolver(Arc::clone(&provider));

        let first = resolver.resolve(&entry(), &deadline()).await.unwrap();
        let second = resolver.resolve(&entry(), &deadline()).await.unwrap();

        assert_eq!(first, ProviderSession::new("jjk-session"));
        assert_eq!(second, first);
        assert_eq!(provider.search_count(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_new_search() {
        let provider = Arc::new(MockProvider::new(vec![candidate(
            "Jujutsu Kaisen",
            2020,
            "fall",
            "TV",
            "jjk-session",
        )]));
        let resolver = resolver(Arc::clone(&provider));

        resolver.resolve(&entry(), &deadline()).await.unwrap();
        resolver.invalidate(40748).await.unwrap();
        resolver.resolve(&entry(), &deadline()).await.unwrap();

        assert_eq!(provider.search_count(), 2);
    }

    #[tokio::test]
    async fn test_no_candidates_is_not_found() {
        let resolver = resolver(Arc::new(MockProvider::new(Vec::new())));

        let result = resolver.resolve(&entry(), &deadline()).await;
        assert_eq!(result, Err(LookupError::not_found("provider session")));
    }

    #[tokio::test]
    async fn test_no_qualifying_candidate_is_not_found() {
        let resolver = resolver(Arc::new(MockProvider::new(vec![
            candidate("Jujutsu Kaisen", 2023, "summer", "TV", "season-two"),
            candidate("Completely Different", 2020, "fall", "TV", "other"),
        ])));

        let result = resolver.resolve(&entry(), &deadline()).await;
        assert_eq!(result, Err(LookupError::not_found("provider session")));
    }

    #[tokio::test]
    async fn test_entry_without_titles_is_internal_error() {
        let mut entry = entry();
        entry.native_title = None;
        entry.english_title = None;
        let resolver = resolver(Arc::new(MockProvider::new(Vec::new())));

        let result = resolver.resolve(&entry, &deadline()).await;
        assert!(matches!(result, Err(LookupError::Internal { .. })));
    }

    #[tokio::test]
    async fn test_upstream_failure_propagates_and_is_not_cached() {
        let failing = Arc::new(MockProvider::failing(LookupError::upstream(
            "provider",
            "returned status code 503",
        )));
        let resolver = resolver(Arc::clone(&failing));

        let result = resolver.resolve(&entry(), &deadline()).await;
        assert!(matches!(result, Err(LookupError::Upstream { .. })));

        let _ = resolver.resolve(&entry(), &deadline()).await;
        assert_eq!(failing.search_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let slow = Arc::new(
            MockProvider::new(vec![candidate("Jujutsu Kaisen", 2020, "fall", "TV", "s")])
                .with_latency(Duration::from_secs(10)),
        );
        let resolver = resolver(slow);

        let result = resolver
            .resolve(&entry(), &Deadline::after(Duration::from_secs(5)))
            .await;
        assert!(matches!(result, Err(LookupError::Timeout { .. })));
    }
}
