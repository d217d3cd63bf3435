//! HTTP client for the provider's JSON API.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use undertow_core::config::ProviderConfig;
use undertow_core::http::{FetchRequest, RequestExecutor, browser_headers};
use undertow_core::{Deadline, LookupError, ProviderSession};

use super::ProviderCatalog;
use crate::types::{ProviderPage, ReleaseEntry, SearchCandidate};

const SERVICE: &str = "provider";

/// Provider API client over a shared request executor.
#[derive(Debug, Clone)]
pub struct AnimepaheProvider {
    executor: Arc<dyn RequestExecutor>,
    config: ProviderConfig,
}

impl AnimepaheProvider {
    pub fn new(executor: Arc<dyn RequestExecutor>, config: ProviderConfig) -> Self {
        Self { executor, config }
    }

    /// URL of the search endpoint for `term`.
    pub fn search_url(&self, term: &str, page: u32) -> String {
        format!(
            "{}/api?m=search&q={}&p={}",
            self.config.base_url,
            urlencoding::encode(term),
            page
        )
    }

    /// URL of the release listing for `session`.
    pub fn releases_url(&self, session: &ProviderSession, page: u32) -> String {
        format!(
            "{}/api?m=release&id={}&sort=episode_desc&page={}",
            self.config.base_url,
            urlencoding::encode(session.as_str()),
            page
        )
    }

    async fn fetch_page<T: serde::de::DeserializeOwned + Send>(
        &self,
        url: String,
        what: &str,
        deadline: &Deadline,
    ) -> Result<ProviderPage<T>, LookupError> {
        let request = FetchRequest::get(SERVICE, url).headers(browser_headers(&self.config));
        let response = self
            .executor
            .execute(request, deadline)
            .await?
            .error_for_status(SERVICE, what)?;
        response.json(SERVICE)
    }
}

#[async_trait]
impl ProviderCatalog for AnimepaheProvider {
    async fn search(
        &self,
        term: &str,
        page: u32,
        deadline: &Deadline,
    ) -> Result<Vec<SearchCandidate>, LookupError> {
        let results: ProviderPage<SearchCandidate> = self
            .fetch_page(self.search_url(term, page), "search results", deadline)
            .await?;
        debug!(
            "Provider search for '{}' returned {} of {} candidates",
            term,
            results.data.len(),
            results.total
        );
        Ok(results.data)
    }

    async fn releases(
        &self,
        session: &ProviderSession,
        page: u32,
        deadline: &Deadline,
    ) -> Result<Vec<ReleaseEntry>, LookupError> {
        let releases: ProviderPage<ReleaseEntry> = self
            .fetch_page(self.releases_url(session, page), "anime", deadline)
            .await?;
        debug!(
            "Provider releases for {} page {}/{}: {} entries",
            session,
            releases.current_page,
            releases.last_page,
            releases.data.len()
        );
        Ok(releases.data)
    }
}
