//! Plex HTTP client: libraries, series and seasons (spec §4.5, §6).

use super::ClientError;
use crate::models::plex::{Library, Season, Series};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Capability set the mapping/orchestration layer consumes from Plex.
/// Implementations are pluggable so the engine can be tested against a
/// fake without touching the network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlexClient: Send + Sync {
    async fn get_libraries(&self) -> Result<Vec<Library>, ClientError>;

    /// Series in a library, with each series' seasons already populated.
    async fn get_series(&self, library_key: &str) -> Result<Vec<Series>, ClientError>;

    async fn get_seasons(&self, series_rating_key: &str) -> Result<Vec<Season>, ClientError>;
}

#[derive(Deserialize)]
struct BaseResponse<T> {
    #[serde(rename = "MediaContainer")]
    media_container: T,
}

#[derive(Deserialize)]
struct LibraryContainer {
    #[serde(default, rename = "Directory")]
    directory: Vec<Library>,
}

#[derive(Deserialize)]
struct SeriesContainer {
    #[serde(default, rename = "Metadata")]
    metadata: Vec<SeriesMetadata>,
}

#[derive(Deserialize)]
struct SeasonContainer {
    #[serde(default, rename = "Metadata")]
    metadata: Vec<Season>,
}

/// Raw series metadata as returned by `/library/sections/{key}/all`; lacks
/// the season list, which is fetched separately per series.
#[derive(Deserialize)]
struct SeriesMetadata {
    #[serde(rename = "ratingKey")]
    rating_key: String,
    title: String,
    year: i32,
}

/// `reqwest`-backed [`PlexClient`], mirroring the query-param-token auth
/// and JSON envelope the Plex API uses (spec §6).
#[derive(Clone)]
pub struct PlexHttpClient {
    client: Client,
    base_url: String,
    token: String,
}

impl PlexHttpClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .user_agent("plex-anilist-sync/0.1")
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ClientError> {
        let url = format!("{}{path}", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .query(&[("X-Plex-Token", &self.token)])
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClientError::Transport(format!(
                "Plex request to {path} failed with status {}",
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PlexClient for PlexHttpClient {
    async fn get_libraries(&self) -> Result<Vec<Library>, ClientError> {
        let response: BaseResponse<LibraryContainer> = self.get("/library/sections").await?;
        Ok(response.media_container.directory)
    }

    async fn get_series(&self, library_key: &str) -> Result<Vec<Series>, ClientError> {
        let response: BaseResponse<SeriesContainer> =
            self.get(&format!("/library/sections/{library_key}/all")).await?;

        let mut series = Vec::with_capacity(response.media_container.metadata.len());
        for meta in response.media_container.metadata {
            let seasons = self.get_seasons(&meta.rating_key).await?;
            series.push(Series { rating_key: meta.rating_key, title: meta.title, year: meta.year, seasons });
        }

        Ok(series)
    }

    async fn get_seasons(&self, series_rating_key: &str) -> Result<Vec<Season>, ClientError> {
        let response: BaseResponse<SeasonContainer> = self
            .get(&format!("/library/metadata/{series_rating_key}/children"))
            .await?;
        Ok(response.media_container.metadata)
    }
}
