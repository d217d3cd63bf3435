//! Undertow Core - Shared building blocks for stream lookup
//!
//! Configuration, the error taxonomy, request deadlines, the outbound request
//! seam, domain models and the coalescing cache used by every other crate.

pub mod cache;
pub mod config;
pub mod deadline;
pub mod error;
pub mod http;
pub mod models;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use cache::{CacheError, CacheKey, CacheStats, CacheStore, CoalescingCache, MemoryStore};
pub use config::{MatchPolicy, UndertowConfig};
pub use deadline::Deadline;
pub use error::{ErrorKind, LookupError};
pub use http::{FetchRequest, FetchResponse, HttpExecutor, RequestExecutor};
pub use models::{
    CatalogEntry, CatalogTitle, EpisodeDescriptor, EpisodeId, ProviderSession, StreamVariant,
    SubtitleTrack,
};

pub type Result<T> = std::result::Result<T, LookupError>;
