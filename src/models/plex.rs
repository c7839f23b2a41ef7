//! Plex data model: libraries, series and seasons as read from the Plex API.

use serde::{Deserialize, Serialize};

/// A Plex library section, e.g. "TV Shows" or "Movies".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub key: String,

    pub title: String,

    #[serde(rename = "type")]
    pub kind: String,
}

impl Library {
    #[must_use]
    pub fn is_show_library(&self) -> bool {
        self.kind == "show"
    }
}

/// A television series in a Plex show library.
///
/// Immutable for the duration of one sync pass: the engine reads it once
/// and never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub rating_key: String,

    pub title: String,

    pub year: i32,

    #[serde(default)]
    pub seasons: Vec<Season>,
}

impl Series {
    /// Seasons in ascending `index` order, as the mapping engine walks them.
    #[must_use]
    pub fn seasons_ascending(&self) -> Vec<&Season> {
        let mut seasons: Vec<&Season> = self.seasons.iter().collect();
        seasons.sort_by_key(|s| s.index);
        seasons
    }
}

/// One season of a Plex series.
///
/// `index == 0` denotes the "Specials" pseudo-season, skipped by the
/// mapping engine (spec §4.3 step 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Season {
    #[serde(rename = "ratingKey")]
    pub rating_key: String,

    #[serde(rename = "parentTitle")]
    pub parent_title: String,

    pub title: String,

    pub index: i32,

    #[serde(rename = "leafCount")]
    pub episodes: i32,

    #[serde(rename = "viewedLeafCount")]
    pub episodes_watched: i32,

    #[serde(default, rename = "lastViewedAt")]
    pub last_viewed_at: i64,
}

impl Season {
    #[must_use]
    pub fn is_specials(&self) -> bool {
        self.index == 0
    }
}
