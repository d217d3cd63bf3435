//! Domain types passed between the resolver, the extractor and the API.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One of the alternate titles a catalog entry is known by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTitle {
    /// Catalog-assigned tag such as `Default`, `Japanese`, `English` or `Synonym`
    pub kind: String,
    pub title: String,
}

/// Canonical metadata for a title, as published by the catalog.
///
/// Read-only input to identity resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: u64,
    /// Ordered alternate titles; every one is scored during matching
    pub titles: Vec<CatalogTitle>,
    pub native_title: Option<String>,
    pub english_title: Option<String>,
    pub synonyms: Vec<String>,
    pub year: Option<u16>,
    pub season: Option<String>,
    pub media_type: Option<String>,
    pub episodes: Option<u32>,
    pub poster: Option<String>,
    pub rating: Option<String>,
    pub synopsis: Option<String>,
}

impl CatalogEntry {
    /// Picks the title used to query the provider.
    ///
    /// Prefers the native-language title, then the English title, then the
    /// first non-empty synonym.
    pub fn search_term(&self) -> Option<&str> {
        fn non_empty(title: &Option<String>) -> Option<&str> {
            title
                .as_deref()
                .map(str::trim)
                .filter(|title| !title.is_empty())
        }

        non_empty(&self.native_title)
            .or_else(|| non_empty(&self.english_title))
            .or_else(|| {
                self.synonyms
                    .iter()
                    .map(|synonym| synonym.trim())
                    .find(|synonym| !synonym.is_empty())
            })
    }

    /// Checks whether the catalog rates the title as adult content.
    pub fn is_nsfw(&self) -> bool {
        self.rating
            .as_deref()
            .is_some_and(|rating| rating.starts_with('R'))
    }
}

/// Opaque provider token addressing a catalog entry on the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderSession(pub String);

impl ProviderSession {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Episode identifier as supplied by API clients.
///
/// The provider addresses episodes by session token, other sources by number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EpisodeId {
    Number(u64),
    Session(String),
}

impl EpisodeId {
    /// Parses a raw query value; all-digit values become `Number`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.parse::<u64>() {
            Ok(number) => Some(EpisodeId::Number(number)),
            Err(_) => Some(EpisodeId::Session(raw.to_string())),
        }
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpisodeId::Number(number) => write!(f, "{number}"),
            EpisodeId::Session(session) => f.write_str(session),
        }
    }
}

/// One entry of a paginated provider episode listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeDescriptor {
    pub id: EpisodeId,
    pub episode: u32,
    pub title: String,
    pub snapshot: String,
    pub duration: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

/// Subtitle track attached to a stream variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub language: String,
    pub url: String,
}

/// One playable rendition of an episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamVariant {
    pub url: String,
    pub resolution: String,
    pub language: String,
    pub subtitles: Vec<SubtitleTrack>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> CatalogEntry {
        CatalogEntry {
            id: 52991,
            titles: vec![CatalogTitle {
                kind: "Default".to_string(),
                title: "Sousou no Frieren".to_string(),
            }],
            native_title: Some("葬送のフリーレン".to_string()),
            english_title: Some("Frieren: Beyond Journey's End".to_string()),
            synonyms: vec!["Frieren at the Funeral".to_string()],
            year: Some(2023),
            season: Some("fall".to_string()),
            media_type: Some("TV".to_string()),
            episodes: Some(28),
            poster: None,
            rating: Some("PG-13 - Teens 13 or older".to_string()),
            synopsis: None,
        }
    }

    #[test]
    fn test_search_term_prefers_native_title() {
        assert_eq!(entry().search_term(), Some("葬送のフリーレン"));
    }

    #[test]
    fn test_search_term_falls_back_in_order() {
        let mut entry = entry();
        entry.native_title = Some("   ".to_string());
        assert_eq!(entry.search_term(), Some("Frieren: Beyond Journey's End"));

        entry.english_title = None;
        entry.synonyms = vec![String::new(), "Frieren".to_string()];
        assert_eq!(entry.search_term(), Some("Frieren"));

        entry.synonyms = vec![String::new()];
        assert_eq!(entry.search_term(), None);
    }

    #[test]
    fn test_episode_id_parsing() {
        assert_eq!(EpisodeId::parse("12"), Some(EpisodeId::Number(12)));
        assert_eq!(
            EpisodeId::parse("a1b2c3"),
            Some(EpisodeId::Session("a1b2c3".to_string()))
        );
        assert_eq!(EpisodeId::parse("  "), None);
    }

    #[test]
    fn test_episode_id_serializes_untagged() {
        let number = serde_json::to_string(&EpisodeId::Number(3)).unwrap();
        let session = serde_json::to_string(&EpisodeId::Session("abc".to_string())).unwrap();
        assert_eq!(number, "3");
        assert_eq!(session, "\"abc\"");

        let back: EpisodeId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(back, EpisodeId::Session("abc".to_string()));
    }

    #[test]
    fn test_nsfw_rating() {
        let mut entry = entry();
        assert!(!entry.is_nsfw());
        entry.rating = Some("R+ - Mild Nudity".to_string());
        assert!(entry.is_nsfw());
    }
}
