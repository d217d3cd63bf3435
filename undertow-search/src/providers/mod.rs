//! Content-hosting provider API.

use async_trait::async_trait;
use undertow_core::{Deadline, LookupError, ProviderSession};

use crate::types::{ReleaseEntry, SearchCandidate};

pub mod animepahe;
#[cfg(test)]
pub mod mock;

pub use animepahe::AnimepaheProvider;
#[cfg(test)]
pub use mock::MockProvider;

/// Search and release listing on the content-hosting provider.
///
/// The identity resolver only needs this narrow surface, so tests swap in a
/// canned implementation instead of a whole HTTP client.
#[async_trait]
pub trait ProviderCatalog: Send + Sync + std::fmt::Debug {
    /// Searches the provider for `term`, returning candidates in provider order.
    ///
    /// # Errors
    /// - `LookupError::Upstream` - Non-success status, transport failure or bad JSON
    /// - `LookupError::Timeout` - `deadline` elapsed
    async fn search(
        &self,
        term: &str,
        page: u32,
        deadline: &Deadline,
    ) -> Result<Vec<SearchCandidate>, LookupError>;

    /// Lists one page of episode releases for `session`, newest first.
    ///
    /// # Errors
    /// - `LookupError::NotFound` - The provider does not know `session`
    /// - `LookupError::Upstream` - Non-success status, transport failure or bad JSON
    /// - `LookupError::Timeout` - `deadline` elapsed
    async fn releases(
        &self,
        session: &ProviderSession,
        page: u32,
        deadline: &Deadline,
    ) -> Result<Vec<ReleaseEntry>, LookupError>;
}
