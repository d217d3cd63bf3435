//! Route handlers for the `/v1/anime` API.
//!
//! Query values are decoded by hand so malformed input gets the same JSON
//! envelope as every other failure.

use axum::extract::{Path, Query, State};
use serde::Deserialize;
use undertow_core::{EpisodeId, LookupError};
use undertow_search::{SearchHit, ensure_provider};

use crate::response::{ApiError, ApiResponse};
use crate::server::AppState;

type ApiResult<T> = Result<axum::Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EpisodesQuery {
    pub provider: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StreamsQuery {
    pub provider: Option<String>,
    pub episode_id: Option<String>,
}

fn parse_id(raw: &str) -> Result<u64, LookupError> {
    raw.parse::<u64>()
        .map_err(|_| LookupError::invalid_input(format!("invalid anime id: {raw}")))
}

/// Missing or zero pages mean the first page.
fn parse_page(raw: Option<&str>) -> Result<u32, LookupError> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => Ok(1),
        Some(raw) => raw
            .parse::<u32>()
            .map(|page| page.max(1))
            .map_err(|_| LookupError::invalid_input(format!("invalid page: {raw}"))),
    }
}

fn require_provider(provider: Option<&str>) -> Result<(), LookupError> {
    let provider = provider.ok_or_else(|| LookupError::invalid_input("provider is required"))?;
    ensure_provider(provider)
}

/// `GET /v1/anime/search?q=`
pub async fn search_anime(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<SearchHit>> {
    let term = query.q.unwrap_or_default();
    let entries = state.lookup.search_catalog(&term).await?;
    Ok(ApiResponse::ok(entries.iter().map(SearchHit::from).collect()))
}

/// `GET /v1/anime/{id}`
pub async fn anime_info(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<undertow_core::CatalogEntry> {
    let id = parse_id(&id)?;
    Ok(ApiResponse::ok(state.lookup.catalog_entry(id).await?))
}

/// `GET /v1/anime/{id}/episodes?provider=&page=`
pub async fn anime_episodes(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<EpisodesQuery>,
) -> ApiResult<Vec<undertow_core::EpisodeDescriptor>> {
    let id = parse_id(&id)?;
    require_provider(query.provider.as_deref())?;
    let page = parse_page(query.page.as_deref())?;

    Ok(ApiResponse::ok(state.lookup.list_episodes(id, page).await?))
}

/// `GET /v1/anime/{id}/streams?provider=&episode_id=`
pub async fn anime_streams(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<StreamsQuery>,
) -> ApiResult<Vec<undertow_core::StreamVariant>> {
    let id = parse_id(&id)?;
    require_provider(query.provider.as_deref())?;
    let episode = query
        .episode_id
        .as_deref()
        .and_then(EpisodeId::parse)
        .ok_or_else(|| LookupError::invalid_input("episode_id is required"))?;

    Ok(ApiResponse::ok(state.lookup.get_variants(id, &episode).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults_and_normalization() {
        assert_eq!(parse_page(None), Ok(1));
        assert_eq!(parse_page(Some("")), Ok(1));
        assert_eq!(parse_page(Some("0")), Ok(1));
        assert_eq!(parse_page(Some("4")), Ok(4));
        assert!(parse_page(Some("-2")).is_err());
    }

    #[test]
    fn test_id_must_be_numeric() {
        assert_eq!(parse_id("52991"), Ok(52991));
        assert!(matches!(
            parse_id("frieren"),
            Err(LookupError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_provider_is_required() {
        assert!(require_provider(None).is_err());
        assert!(require_provider(Some("kwik")).is_ok());
        assert!(require_provider(Some("zoro")).is_err());
    }
}
