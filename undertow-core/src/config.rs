//! Centralized configuration for Undertow.
//!
//! The configuration is a plain value built once at startup and passed into
//! each component's constructor.

use std::time::Duration;

/// Central configuration for all Undertow components.
#[derive(Debug, Clone, Default)]
pub struct UndertowConfig {
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
    pub provider: ProviderConfig,
    pub cache: CacheConfig,
    pub extraction: ExtractionConfig,
    pub matching: MatchingConfig,
}

/// HTTP API listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Metadata catalog API settings.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub base_url: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.jikan.moe".to_string(),
        }
    }
}

/// Content-hosting provider settings.
///
/// The provider rejects requests that do not look like they come from a
/// browser, so every request carries `user_agent` and a matching header set.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the provider, without trailing slash
    pub base_url: String,
    /// Browser user agent sent with provider and embed requests
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://animepahe.ru".to_string(),
            user_agent:
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:143.0) Gecko/20100101 Firefox/143.0"
                    .to_string(),
        }
    }
}

/// Durable cache settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Redis connection URL; `None` selects the in-process store
    pub redis_url: Option<String>,
    /// Prefix for every key written by this process
    pub namespace: String,
    /// Lifetime of cached catalog records
    pub catalog_ttl: Duration,
    /// Lifetime of cached episode listing pages
    pub episode_ttl: Duration,
    /// Lifetime of cached stream variant lists
    pub variant_ttl: Duration,
    /// Maximum entries held by the in-process store
    pub memory_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            namespace: "undertow".to_string(),
            catalog_ttl: Duration::from_secs(24 * 60 * 60),
            episode_ttl: Duration::from_secs(24 * 60 * 60),
            variant_ttl: Duration::from_secs(24 * 60 * 60),
            memory_capacity: 4096,
        }
    }
}

/// Link extraction limits.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Hard ceiling for a whole streaming-link request
    pub request_ceiling: Duration,
    /// Largest packed script, in bytes, the unpacker will decode
    pub max_packed_bytes: usize,
    /// Maximum variants extracted concurrently
    pub variant_workers: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            request_ceiling: Duration::from_secs(5),
            max_packed_bytes: 512 * 1024,
            variant_workers: 4,
        }
    }
}

/// How the identity resolver picks among candidates that clear the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// Accept the first candidate, in provider order, that clears the threshold
    #[default]
    FirstAboveThreshold,
    /// Accept the highest scoring candidate; ties go to the earlier one
    BestAboveThreshold,
}

impl std::str::FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first" => Ok(MatchPolicy::FirstAboveThreshold),
            "best" => Ok(MatchPolicy::BestAboveThreshold),
            _ => Err(format!("Invalid match policy: {s}")),
        }
    }
}

/// Title matching settings for the identity resolver.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Minimum similarity on the 0-100 scale
    pub threshold: f64,
    pub policy: MatchPolicy,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: 90.0,
            policy: MatchPolicy::default(),
        }
    }
}

impl UndertowConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("UNDERTOW_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = std::env::var("UNDERTOW_PORT")
            && let Ok(port) = port.parse::<u16>()
        {
            config.server.port = port;
        }

        if let Ok(url) = std::env::var("UNDERTOW_CATALOG_URL") {
            config.catalog.base_url = url.trim_end_matches('/').to_string();
        }

        if let Ok(url) = std::env::var("UNDERTOW_PROVIDER_URL") {
            config.provider.base_url = url.trim_end_matches('/').to_string();
        }

        if let Ok(url) = std::env::var("UNDERTOW_REDIS_URL")
            && !url.is_empty()
        {
            config.cache.redis_url = Some(url);
        }

        if let Ok(namespace) = std::env::var("UNDERTOW_CACHE_NAMESPACE") {
            config.cache.namespace = namespace;
        }

        if let Ok(ceiling) = std::env::var("UNDERTOW_REQUEST_CEILING_MS")
            && let Ok(millis) = ceiling.parse::<u64>()
        {
            config.extraction.request_ceiling = Duration::from_millis(millis);
        }

        if let Ok(limit) = std::env::var("UNDERTOW_MAX_PACKED_BYTES")
            && let Ok(bytes) = limit.parse::<usize>()
        {
            config.extraction.max_packed_bytes = bytes;
        }

        if let Ok(workers) = std::env::var("UNDERTOW_VARIANT_WORKERS")
            && let Ok(count) = workers.parse::<usize>()
        {
            config.extraction.variant_workers = count.max(1);
        }

        if let Ok(policy) = std::env::var("UNDERTOW_MATCH_POLICY")
            && let Ok(policy) = policy.parse::<MatchPolicy>()
        {
            config.matching.policy = policy;
        }

        config
    }

    /// Creates a configuration with short budgets for tests.
    pub fn for_testing() -> Self {
        Self {
            extraction: ExtractionConfig {
                request_ceiling: Duration::from_secs(2),
                max_packed_bytes: 64 * 1024,
                variant_workers: 2,
            },
            cache: CacheConfig {
                namespace: "undertow-test".to_string(),
                memory_capacity: 256,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = UndertowConfig::default();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.extraction.request_ceiling, Duration::from_secs(5));
        assert_eq!(config.cache.variant_ttl, Duration::from_secs(86_400));
        assert_eq!(config.cache.episode_ttl, Duration::from_secs(86_400));
        assert!(config.cache.redis_url.is_none());
        assert_eq!(config.matching.threshold, 90.0);
        assert_eq!(config.matching.policy, MatchPolicy::FirstAboveThreshold);
    }

    #[test]
    fn test_match_policy_parsing() {
        assert_eq!(
            "first".parse::<MatchPolicy>(),
            Ok(MatchPolicy::FirstAboveThreshold)
        );
        assert_eq!(
            "BEST".parse::<MatchPolicy>(),
            Ok(MatchPolicy::BestAboveThreshold)
        );
        assert!("closest".parse::<MatchPolicy>().is_err());
    }

    #[test]
    fn test_testing_preset() {
        let config = UndertowConfig::for_testing();
        assert!(config.extraction.request_ceiling < Duration::from_secs(5));
        assert_eq!(config.extraction.max_packed_bytes, 64 * 1024);
        assert_eq!(config.cache.namespace, "undertow-test");
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("UNDERTOW_PORT", "9090");
            std::env::set_var("UNDERTOW_PROVIDER_URL", "https://provider.test/");
            std::env::set_var("UNDERTOW_REDIS_URL", "redis://127.0.0.1:6379/0");
            std::env::set_var("UNDERTOW_VARIANT_WORKERS", "0");
            std::env::set_var("UNDERTOW_MATCH_POLICY", "best");
        }

        let config = UndertowConfig::from_env();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.provider.base_url, "https://provider.test");
        assert_eq!(
            config.cache.redis_url.as_deref(),
            Some("redis://127.0.0.1:6379/0")
        );
        assert_eq!(config.extraction.variant_workers, 1);
        assert_eq!(config.matching.policy, MatchPolicy::BestAboveThreshold);

        unsafe {
            std::env::remove_var("UNDERTOW_PORT");
            std::env::remove_var("UNDERTOW_PROVIDER_URL");
            std::env::remove_var("UNDERTOW_REDIS_URL");
            std::env::remove_var("UNDERTOW_VARIANT_WORKERS");
            std::env::remove_var("UNDERTOW_MATCH_POLICY");
        }
    }
}
