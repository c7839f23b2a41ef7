//! Fans mapping work out across every series in the selected Plex
//! libraries and aggregates the results (spec §4.6, §5).

use crate::clients::plex::PlexClient;
use crate::clients::ClientError;
use crate::models::anilist::{Format, MediaStatus};
use crate::models::plex::Series as PlexSeries;
use crate::services::mapping_engine::{MappingEngine, MappingError};
use crate::services::watch_status::{WatchStatus, WatchStatusClassifier};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

/// One AniList entry contributing to a series' mapping, flattened to the
/// fields a caller needs without holding onto the full `Media`.
#[derive(Debug, Clone)]
pub struct MappingEntry {
    pub anilist_id: i32,
    pub episodes: i32,
    pub format: Format,
    pub status: MediaStatus,
}

#[derive(Debug, Clone)]
pub struct SeasonWatchStatus {
    pub season_rating_key: String,
    pub status: WatchStatus,
}

#[derive(Debug, Clone)]
pub struct SeriesMapping {
    pub series_rating_key: String,
    pub entries: Vec<MappingEntry>,
    pub season_watch_status: Vec<SeasonWatchStatus>,
}

#[derive(Debug, Error, Clone)]
pub enum SeriesSyncError {
    #[error("mapping failed for series {series_rating_key}: {source}")]
    Mapping { series_rating_key: String, source: MappingError },
}

pub type SeriesSyncResult = Result<SeriesMapping, SeriesSyncError>;

/// Bounded-concurrency fan-out over Plex series, one
/// [`MappingEngine::get_series_anilist_entries`] call per series (spec
/// §5: series-level parallelism, strictly sequential per series).
pub struct SyncOrchestrator {
    plex: Arc<dyn PlexClient>,
    engine: Arc<MappingEngine>,
    watch_status: WatchStatusClassifier,
    concurrency: usize,
}

impl SyncOrchestrator {
    #[must_use]
    pub fn new(
        plex: Arc<dyn PlexClient>,
        engine: Arc<MappingEngine>,
        watch_status: WatchStatusClassifier,
        concurrency: usize,
    ) -> Self {
        Self { plex, engine, watch_status, concurrency: concurrency.max(1) }
    }

    /// Show libraries (`type == "show"`), as a list of library keys —
    /// the unit `sync_libraries` expects. The surrounding application may
    /// instead pass its own out-of-band selection (spec §6).
    pub async fn discover_show_libraries(&self) -> Result<Vec<String>, ClientError> {
        let libraries = self.plex.get_libraries().await?;
        Ok(libraries.into_iter().filter(|l| l.is_show_library()).map(|l| l.key).collect())
    }

    /// Lists every series in `library_keys`, then maps them concurrently,
    /// bounded by `SyncConfig::concurrency`. A library that fails to list
    /// is logged and skipped; per-series mapping failures are aggregated
    /// as `Err` rather than aborting the batch (spec §4.6, §7).
    pub async fn sync_libraries(&self, library_keys: &[String], now: i64) -> Vec<SeriesSyncResult> {
        let mut all_series: Vec<PlexSeries> = Vec::new();
        for key in library_keys {
            match self.plex.get_series(key).await {
                Ok(series) => all_series.extend(series),
                Err(e) => error!("failed to list series for library {key}: {e}"),
            }
        }

        stream::iter(all_series)
            .map(|series| self.sync_series(series, now))
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }

    async fn sync_series(&self, series: PlexSeries, now: i64) -> SeriesSyncResult {
        let rating_key = series.rating_key.clone();

        let season_watch_status = series
            .seasons_ascending()
            .iter()
            .filter(|s| !s.is_specials())
            .map(|s| SeasonWatchStatus {
                season_rating_key: s.rating_key.clone(),
                status: self.watch_status.classify(s, now),
            })
            .collect();

        let mapping = self.engine.get_series_anilist_entries(&series).await.map_err(|e| {
            error!("mapping failed for series {rating_key}: {e}");
            SeriesSyncError::Mapping { series_rating_key: rating_key.clone(), source: e }
        })?;

        let entries = mapping
            .into_iter()
            .map(|m| MappingEntry { anilist_id: m.id, episodes: m.episodes, format: m.format, status: m.status })
            .collect();

        Ok(SeriesMapping { series_rating_key: rating_key, entries, season_watch_status })
    }
}
