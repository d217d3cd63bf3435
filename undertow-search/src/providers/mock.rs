//! Mock provider implementation for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use undertow_core::{Deadline, LookupError, ProviderSession};

use super::ProviderCatalog;
use crate::types::{ReleaseEntry, SearchCandidate};

/// Provider answering from fixed candidate and release lists.
#[derive(Debug, Default)]
pub struct MockProvider {
    candidates: Vec<SearchCandidate>,
    releases: Vec<ReleaseEntry>,
    failure: Option<LookupError>,
    latency: Option<Duration>,
    searches: AtomicUsize,
}

impl MockProvider {
    pub fn new(candidates: Vec<SearchCandidate>) -> Self {
        Self {
            candidates,
            ..Default::default()
        }
    }

    pub fn with_releases(mut self, releases: Vec<ReleaseEntry>) -> Self {
        self.releases = releases;
        self
    }

    /// Makes every call fail with `error`.
    pub fn failing(error: LookupError) -> Self {
        Self {
            failure: Some(error),
            ..Default::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    async fn respond<T: Clone>(&self, items: &[T], deadline: &Deadline) -> Result<Vec<T>, LookupError> {
        let latency = self.latency;
        let failure = self.failure.clone();
        let items = items.to_vec();

        deadline
            .run("mock provider", async move {
                if let Some(latency) = latency {
                    tokio::time::sleep(latency).await;
                }
                match failure {
                    Some(error) => Err(error),
                    None => Ok(items),
                }
            })
            .await
    }
}

/// Builds a candidate with the given attributes.
pub fn candidate(title: &str, year: u16, season: &str, media_type: &str, session: &str) -> SearchCandidate {
    SearchCandidate {
        id: 0,
        title: title.to_string(),
        media_type: media_type.to_string(),
        episodes: 12,
        season: season.to_string(),
        year,
        poster: String::new(),
        session: session.to_string(),
    }
}

#[async_trait]
impl ProviderCatalog for MockProvider {
    async fn search(
        &self,
        _term: &str,
        _page: u32,
        deadline: &Deadline,
    ) -> Result<Vec<SearchCandidate>, LookupError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.respond(&self.candidates, deadline).await
    }

    async fn releases(
        &self,
        _session: &ProviderSession,
        _page: u32,
        deadline: &Deadline,
    ) -> Result<Vec<ReleaseEntry>, LookupError> {
        self.respond(&self.releases, deadline).await
    }
}
