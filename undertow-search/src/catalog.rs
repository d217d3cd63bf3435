//! Client for the metadata catalog (Jikan v4).

use std::sync::Arc;

use tracing::debug;
use undertow_core::config::CatalogConfig;
use undertow_core::http::{FetchRequest, RequestExecutor};
use undertow_core::{CatalogEntry, Deadline, LookupError};

use crate::types::{AnimeRecord, CatalogEpisode, CatalogEpisodePage, CatalogPage, CatalogRecord};

const SERVICE: &str = "catalog";

/// Maximum entries returned by one catalog search.
pub const SEARCH_LIMIT: u32 = 25;

/// Read-only catalog API client.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    executor: Arc<dyn RequestExecutor>,
    base_url: String,
}

impl CatalogClient {
    pub fn new(executor: Arc<dyn RequestExecutor>, config: &CatalogConfig) -> Self {
        Self {
            executor,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Searches the catalog, newest titles first.
    ///
    /// # Errors
    /// - `LookupError::Upstream` - Non-success status, transport failure or bad JSON
    /// - `LookupError::Timeout` - `deadline` elapsed
    pub async fn search(
        &self,
        term: &str,
        page: u32,
        deadline: &Deadline,
    ) -> Result<Vec<CatalogEntry>, LookupError> {
        let url = format!(
            "{}/v4/anime?q={}&order_by=start_date&sort=desc&limit={}&page={}",
            self.base_url,
            urlencoding::encode(term),
            SEARCH_LIMIT,
            page
        );
        let results: CatalogPage<AnimeRecord> = self.get_json(url, "search results", deadline).await?;
        debug!("Catalog search for '{}' returned {} entries", term, results.data.len());

        Ok(results
            .data
            .into_iter()
            .map(AnimeRecord::into_entry)
            .collect())
    }

    /// Fetches one entry by catalog id.
    ///
    /// # Errors
    /// - `LookupError::NotFound` - No entry has this id
    /// - `LookupError::Upstream` - Other non-success status, transport failure or bad JSON
    /// - `LookupError::Timeout` - `deadline` elapsed
    pub async fn get_by_id(&self, id: u64, deadline: &Deadline) -> Result<CatalogEntry, LookupError> {
        let url = format!("{}/v4/anime/{}", self.base_url, id);
        let record: CatalogRecord<AnimeRecord> = self.get_json(url, "anime", deadline).await?;
        Ok(record.data.into_entry())
    }

    /// Fetches one page of the catalog's own episode list.
    ///
    /// # Errors
    /// - `LookupError::NotFound` - No entry has this id
    /// - `LookupError::Upstream` - Other non-success status, transport failure or bad JSON
    /// - `LookupError::Timeout` - `deadline` elapsed
    pub async fn get_episodes(
        &self,
        id: u64,
        page: u32,
        deadline: &Deadline,
    ) -> Result<CatalogEpisodePage, LookupError> {
        let url = format!("{}/v4/anime/{}/episodes?page={}", self.base_url, id, page);
        let results: CatalogPage<CatalogEpisode> = self.get_json(url, "anime", deadline).await?;

        Ok(CatalogEpisodePage {
            episodes: results.data,
            has_next_page: results.pagination.has_next_page,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned + Send>(
        &self,
        url: String,
        what: &str,
        deadline: &Deadline,
    ) -> Result<T, LookupError> {
        let request = FetchRequest::get(SERVICE, url).header("Accept", "application/json");
        self.executor
            .execute(request, deadline)
            .await?
            .error_for_status(SERVICE, what)?
            .json(SERVICE)
    }
}
