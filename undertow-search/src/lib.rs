//! Undertow Search - Catalog lookup and provider identity resolution
//!
//! Maps catalog entries onto the content-hosting provider by fuzzy title
//! matching, and exposes the whole lookup pipeline through
//! [`StreamLookupService`].

pub mod catalog;
pub mod matching;
pub mod providers;
pub mod resolver;
pub mod service;
pub mod types;

pub use catalog::CatalogClient;
pub use matching::{select_candidate, title_similarity};
pub use providers::{AnimepaheProvider, ProviderCatalog};
pub use resolver::IdentityResolver;
pub use service::{SUPPORTED_PROVIDER, StreamLookupService, ensure_provider};
pub use types::{CatalogEpisodePage, ReleaseEntry, SearchCandidate, SearchHit};

pub type Result<T> = std::result::Result<T, undertow_core::LookupError>;
