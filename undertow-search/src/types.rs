//! Wire formats of the catalog and provider APIs.

use serde::{Deserialize, Deserializer, Serialize};
use undertow_core::{CatalogEntry, CatalogTitle};

/// Treats an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Paginated envelope returned by the provider's `/api` endpoint.
///
/// An empty result set omits `data` entirely.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ProviderPage<T> {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_page: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_page: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<T>,
}

/// One provider search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: u64,
    pub title: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub media_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub episodes: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub season: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub year: u16,
    #[serde(default, deserialize_with = "null_as_default")]
    pub poster: String,
    /// Provider session token for the title
    pub session: String,
}

/// One entry of the provider's episode release listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: u64,
    pub episode: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub snapshot: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub audio: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration: String,
    /// Provider session token for the episode
    pub session: String,
    /// `YYYY-MM-DD HH:MM:SS`, provider local time
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
}

/// `{ "data": ... }` wrapper used by single-record catalog responses.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogRecord<T> {
    pub data: T,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogPagination {
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_visible_page: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub has_next_page: bool,
}

/// Paginated catalog response.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogPage<T> {
    pub data: Vec<T>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pagination: CatalogPagination,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageUrls {
    pub image_url: Option<String>,
    pub large_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Images {
    #[serde(default, deserialize_with = "null_as_default")]
    pub jpg: ImageUrls,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TitleRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
}

/// Anime record as published by the catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct AnimeRecord {
    pub mal_id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub titles: Vec<TitleRecord>,
    pub title: Option<String>,
    pub title_english: Option<String>,
    pub title_japanese: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title_synonyms: Vec<String>,
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    pub episodes: Option<u32>,
    pub rating: Option<String>,
    pub synopsis: Option<String>,
    pub season: Option<String>,
    pub year: Option<u16>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Images,
}

impl AnimeRecord {
    /// Converts the record into the domain entry used for matching.
    ///
    /// When the record has no typed titles, the bare `title` becomes the
    /// single default title so matching still has something to score.
    pub fn into_entry(self) -> CatalogEntry {
        let mut titles: Vec<CatalogTitle> = self
            .titles
            .into_iter()
            .map(|t| CatalogTitle {
                kind: t.kind,
                title: t.title,
            })
            .collect();
        if titles.is_empty()
            && let Some(title) = &self.title
        {
            titles.push(CatalogTitle {
                kind: "Default".to_string(),
                title: title.clone(),
            });
        }

        CatalogEntry {
            id: self.mal_id,
            titles,
            native_title: self.title_japanese,
            english_title: self.title_english,
            synonyms: self.title_synonyms,
            year: self.year.filter(|year| *year > 0),
            season: self.season,
            media_type: self.media_type,
            episodes: self.episodes,
            poster: self.images.jpg.large_image_url.or(self.images.jpg.image_url),
            rating: self.rating,
            synopsis: self.synopsis,
        }
    }
}

/// Episode record from the catalog's episode listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEpisode {
    #[serde(rename = "mal_id")]
    pub number: u32,
    pub title: Option<String>,
    pub title_japanese: Option<String>,
    pub aired: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub filler: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recap: bool,
}

/// One page of catalog episodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEpisodePage {
    pub episodes: Vec<CatalogEpisode>,
    pub has_next_page: bool,
}

/// Compact search result shown to API clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: u64,
    pub title: Option<String>,
    pub native_title: Option<String>,
    pub english_title: Option<String>,
    pub media_type: Option<String>,
    pub year: Option<u16>,
    pub total_episodes: Option<u32>,
    pub poster: Option<String>,
    pub is_nsfw: bool,
}

impl From<&CatalogEntry> for SearchHit {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            id: entry.id,
            title: entry.titles.first().map(|t| t.title.clone()),
            native_title: entry.native_title.clone(),
            english_title: entry.english_title.clone(),
            media_type: entry.media_type.clone(),
            year: entry.year,
            total_episodes: entry.episodes,
            poster: entry.poster.clone(),
            is_nsfw: entry.is_nsfw(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANIME_JSON: &str = r#"{
        "mal_id": 52991,
        "titles": [
            {"type": "Default", "title": "Sousou no Frieren"},
            {"type": "English", "title": "Frieren: Beyond Journey's End"}
        ],
        "title": "Sousou no Frieren",
        "title_english": "Frieren: Beyond Journey's End",
        "title_japanese": "葬送のフリーレン",
        "title_synonyms": ["Frieren at the Funeral"],
        "type": "TV",
        "episodes": 28,
        "rating": "PG-13 - Teens 13 or older",
        "synopsis": null,
        "season": "fall",
        "year": 2023,
        "images": {"jpg": {"image_url": "https://cdn.test/s.jpg", "large_image_url": "https://cdn.test/l.jpg"}}
    }"#;

    #[test]
    fn test_anime_record_into_entry() {
        let record: AnimeRecord = serde_json::from_str(ANIME_JSON).unwrap();
        let entry = record.into_entry();

        assert_eq!(entry.id, 52991);
        assert_eq!(entry.titles.len(), 2);
        assert_eq!(entry.native_title.as_deref(), Some("葬送のフリーレン"));
        assert_eq!(entry.year, Some(2023));
        assert_eq!(entry.media_type.as_deref(), Some("TV"));
        assert_eq!(entry.poster.as_deref(), Some("https://cdn.test/l.jpg"));
    }

    #[test]
    fn test_record_without_year_or_titles() {
        let record: AnimeRecord = serde_json::from_str(
            r#"{"mal_id": 1, "title": "Lonely", "title_english": null, "title_japanese": null,
                "type": null, "episodes": null, "rating": null, "synopsis": null,
                "season": null, "year": null}"#,
        )
        .unwrap();
        let entry = record.into_entry();

        assert_eq!(entry.year, None);
        assert_eq!(entry.titles[0].title, "Lonely");
        assert!(entry.synonyms.is_empty());
    }

    #[test]
    fn test_empty_provider_page_has_no_data() {
        let page: ProviderPage<SearchCandidate> = serde_json::from_str(r#"{"total": 0}"#).unwrap();
        assert!(page.data.is_empty());
    }

    #[test]
    fn test_null_provider_fields_fall_back_to_defaults() {
        let page: ProviderPage<SearchCandidate> = serde_json::from_str(
            r#"{"total": 1, "current_page": 1, "last_page": null, "data": [
                {"id": 7, "title": "Frieren", "type": null, "episodes": null,
                 "season": null, "year": null, "poster": null, "session": "abc"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(page.last_page, 0);
        let hit = &page.data[0];
        assert_eq!(hit.media_type, "");
        assert_eq!(hit.season, "");
        assert_eq!(hit.year, 0);
        assert_eq!(hit.session, "abc");

        let release: ReleaseEntry = serde_json::from_str(
            r#"{"episode": 3, "session": "ep3", "title": null, "audio": null, "created_at": null}"#,
        )
        .unwrap();
        assert_eq!(release.episode, 3);
        assert!(release.created_at.is_empty());
    }

    #[test]
    fn test_null_data_is_an_empty_page() {
        let page: ProviderPage<ReleaseEntry> =
            serde_json::from_str(r#"{"total": 0, "data": null}"#).unwrap();
        assert!(page.data.is_empty());
    }

    #[test]
    fn test_search_hit_flags_adult_rating() {
        let mut entry = serde_json::from_str::<AnimeRecord>(ANIME_JSON)
            .unwrap()
            .into_entry();
        entry.rating = Some("Rx - Hentai".to_string());

        let hit = SearchHit::from(&entry);
        assert!(hit.is_nsfw);
        assert_eq!(hit.title.as_deref(), Some("Sousou no Frieren"));
    }
}
