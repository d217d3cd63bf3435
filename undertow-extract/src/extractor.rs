//! Stream variant extraction from the provider's delivery page.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use undertow_core::cache::{CacheKey, CacheStore, CoalescingCache};
use undertow_core::config::{ProviderConfig, UndertowConfig};
use undertow_core::http::{FetchRequest, RequestExecutor, browser_headers};
use undertow_core::{Deadline, EpisodeId, LookupError, ProviderSession, StreamVariant};

use crate::unpacker::ScriptUnpacker;

/// Container holding one button per playable rendition.
const RESOLUTION_MENU: &str = "#resolutionMenu > button";

/// Cache key for the variant list of one episode of one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantKey {
    pub catalog_id: u64,
    pub episode: EpisodeId,
}

impl CacheKey for VariantKey {
    fn cache_key(&self) -> String {
        format!("{}:{}", self.catalog_id, self.episode)
    }
}

/// Attributes read from one resolution-menu button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSource {
    pub resolution: String,
    pub language: String,
    /// Embed page holding the packed player script
    pub embed_url: String,
}

/// Fetches delivery pages and turns them into playable stream variants.
#[derive(Debug)]
pub struct LinkExtractor {
    executor: Arc<dyn RequestExecutor>,
    provider: ProviderConfig,
    unpacker: ScriptUnpacker,
    variants: CoalescingCache<VariantKey, Vec<StreamVariant>>,
    variant_workers: usize,
    menu_selector: Selector,
}

impl LinkExtractor {
    /// Creates an extractor caching variant lists in `store`.
    ///
    /// # Errors
    ///
    /// - `LookupError::Internal` - A built-in pattern or selector is invalid
    pub fn new(
        executor: Arc<dyn RequestExecutor>,
        store: Arc<dyn CacheStore>,
        config: &UndertowConfig,
    ) -> Result<Self, LookupError> {
        let menu_selector = Selector::parse(RESOLUTION_MENU)
            .map_err(|e| LookupError::internal(format!("invalid selector: {e}")))?;

        Ok(Self {
            executor,
            provider: config.provider.clone(),
            unpacker: ScriptUnpacker::new(&config.extraction)?,
            variants: CoalescingCache::new(
                store,
                format!("{}:streaming", config.cache.namespace),
                Some(config.cache.variant_ttl),
            ),
            variant_workers: config.extraction.variant_workers.max(1),
            menu_selector,
        })
    }

    /// Returns the playable variants of `episode`, in page order.
    ///
    /// Variants whose embed page cannot be fetched or unpacked are dropped;
    /// the list may therefore be shorter than the menu, or empty. A page
    /// without a resolution menu yields an empty list, which is cached like
    /// any other result.
    ///
    /// # Errors
    ///
    /// - `LookupError::InvalidInput` - `episode` is numeric; the provider
    ///   only addresses episodes by session token
    /// - `LookupError::NotFound` - The delivery page does not exist
    /// - `LookupError::Upstream` - The delivery page could not be fetched
    /// - `LookupError::Timeout` - `deadline` elapsed
    pub async fn get_variants(
        &self,
        catalog_id: u64,
        session: &ProviderSession,
        episode: &EpisodeId,
        deadline: &Deadline,
    ) -> Result<Vec<StreamVariant>, LookupError> {
        let EpisodeId::Session(episode_session) = episode else {
            return Err(LookupError::invalid_input(format!(
                "episode id {episode} is not a provider episode session"
            )));
        };

        let key = VariantKey {
            catalog_id,
            episode: episode.clone(),
        };

        self.variants
            .get_or_compute(&key, || async {
                let page = self.fetch_play_page(session, episode_session, deadline).await?;
                let sources = self.parse_resolution_menu(&page);
                if sources.is_empty() {
                    warn!(
                        "Delivery page for {} episode {} has no resolution menu",
                        catalog_id, episode_session
                    );
                    return Ok(Vec::new());
                }
                debug!(
                    "Found {} variant buttons for {} episode {}",
                    sources.len(),
                    catalog_id,
                    episode_session
                );

                let variants = self.extract_all(sources, deadline).await?;
                info!(
                    "Extracted {} variants for {} episode {}",
                    variants.len(),
                    catalog_id,
                    episode_session
                );
                Ok(variants)
            })
            .await
    }

    async fn fetch_play_page(
        &self,
        session: &ProviderSession,
        episode_session: &str,
        deadline: &Deadline,
    ) -> Result<String, LookupError> {
        let url = format!(
            "{}/play/{}/{}",
            self.provider.base_url, session, episode_session
        );
        let request = FetchRequest::get("provider", url).headers(browser_headers(&self.provider));

        let response = self
            .executor
            .execute(request, deadline)
            .await?
            .error_for_status("provider", "episode")?;
        Ok(response.body)
    }

    /// Reads resolution, audio tag and embed URL from every menu button.
    ///
    /// Returns an empty list when the page has no menu buttons.
    pub fn parse_resolution_menu(&self, page: &str) -> Vec<VariantSource> {
        let document = Html::parse_document(page);

        document
            .select(&self.menu_selector)
            .map(|button| {
                let attr = |name: &str| {
                    button
                        .value()
                        .attr(name)
                        .unwrap_or_default()
                        .trim()
                        .to_string()
                };
                VariantSource {
                    resolution: attr("data-resolution"),
                    language: attr("data-audio"),
                    embed_url: attr("data-src"),
                }
            })
            .collect()
    }

    async fn extract_all(
        &self,
        sources: Vec<VariantSource>,
        deadline: &Deadline,
    ) -> Result<Vec<StreamVariant>, LookupError> {
        let outcomes: Vec<_> = stream::iter(sources)
            .map(|source| async move {
                let outcome = self.extract_variant(&source, deadline).await;
                (source, outcome)
            })
            .buffered(self.variant_workers)
            .collect()
            .await;

        let mut variants = Vec::with_capacity(outcomes.len());
        for (source, outcome) in outcomes {
            match outcome {
                Ok(variant) => variants.push(variant),
                Err(e @ LookupError::Timeout { .. }) => return Err(e),
                Err(e) => warn!(
                    "Dropping {} {} variant from {}: {}",
                    source.resolution, source.language, source.embed_url, e
                ),
            }
        }
        Ok(variants)
    }

    async fn extract_variant(
        &self,
        source: &VariantSource,
        deadline: &Deadline,
    ) -> Result<StreamVariant, LookupError> {
        if source.embed_url.is_empty() {
            return Err(LookupError::extraction("variant button has no source"));
        }

        let request = FetchRequest::get("kwik", source.embed_url.as_str())
            .header("Referer", self.provider.base_url.as_str())
            .header("User-Agent", self.provider.user_agent.as_str());
        let response = self.executor.execute(request, deadline).await?;

        if response.status != 200 {
            return Err(LookupError::upstream(
                "kwik",
                format!("returned status code {}", response.status),
            ));
        }
        if !response.is_html() {
            return Err(LookupError::upstream("kwik", "content type is not text/html"));
        }

        let url = self.unpacker.unpack(&response.body)?;

        Ok(StreamVariant {
            url,
            resolution: source.resolution.clone(),
            language: normalize_language(&source.language),
            subtitles: Vec::new(),
        })
    }
}

/// Maps the provider's ISO 639-2 audio tags to BCP-47 primary subtags.
///
/// Unknown tags are passed through lower-cased.
pub fn normalize_language(tag: &str) -> String {
    let tag = tag.trim().to_lowercase();
    let primary = match tag.as_str() {
        "jpn" | "jp" => "ja",
        "eng" => "en",
        "chi" | "zho" | "cn" => "zh",
        "kor" => "ko",
        "spa" => "es",
        "fre" | "fra" => "fr",
        "ger" | "deu" => "de",
        "por" => "pt",
        "ita" => "it",
        "rus" => "ru",
        "ara" => "ar",
        _ => return tag,
    };
    primary.to_string()
}
