//! Derives a watch status for a Plex season from its view counts and
//! recency (spec §4.4).

use crate::models::plex::Season as PlexSeason;
use std::fmt;

/// Where a season sits in a viewer's AniList list.
///
/// Variant order mirrors the precedence the classifier checks in: once a
/// guard matches, no later guard is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchStatus {
    Completed,
    Dropped,
    Paused,
    Watching,
    Planning,
}

impl fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WatchStatus::Completed => "Completed",
            WatchStatus::Dropped => "Dropped",
            WatchStatus::Paused => "Paused",
            WatchStatus::Watching => "Watching",
            WatchStatus::Planning => "Planning",
        };
        write!(f, "{s}")
    }
}

/// Classifies [`WatchStatus`] from a season's episode counts and the
/// configured staleness thresholds (spec §4.4, `SyncConfig`).
#[derive(Debug, Clone, Copy)]
pub struct WatchStatusClassifier {
    pub days_until_paused: i64,
    pub days_until_dropped: i64,
}

impl WatchStatusClassifier {
    #[must_use]
    pub fn new(days_until_paused: i64, days_until_dropped: i64) -> Self {
        Self { days_until_paused, days_until_dropped }
    }

    /// `now` is a unix timestamp, passed in rather than read from the
    /// clock so the guard ordering below can be tested deterministically.
    ///
    /// Staleness is computed as the absolute value of an *integer*
    /// division of seconds-since-viewed by seconds-per-day: the truncation
    /// happens before the sign flip, not after, so a future-dated
    /// `last_viewed_at` a few hours ahead of `now` truncates to zero
    /// days stale rather than minus one.
    #[must_use]
    pub fn classify(&self, season: &PlexSeason, now: i64) -> WatchStatus {
        if season.episodes_watched == season.episodes {
            return WatchStatus::Completed;
        }

        let days_since_last_watched = ((season.last_viewed_at - now) / 86400).abs();

        if season.episodes_watched > 0 && days_since_last_watched > self.days_until_dropped {
            return WatchStatus::Dropped;
        }

        if season.episodes_watched > 0 && days_since_last_watched > self.days_until_paused {
            return WatchStatus::Paused;
        }

        if season.episodes_watched != 0 {
            return WatchStatus::Watching;
        }

        WatchStatus::Planning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = 86_400;

    fn season(episodes: i32, watched: i32, last_viewed_at: i64) -> PlexSeason {
        PlexSeason {
            rating_key: "s1".into(),
            parent_title: "Show".into(),
            title: "Season 1".into(),
            index: 1,
            episodes,
            episodes_watched: watched,
            last_viewed_at,
        }
    }

    #[test]
    fn fully_watched_is_completed_regardless_of_recency() {
        let classifier = WatchStatusClassifier::new(14, 31);
        let s = season(12, 12, 0);
        assert_eq!(classifier.classify(&s, 100 * DAY), WatchStatus::Completed);
    }

    #[test]
    fn stale_past_dropped_threshold() {
        let classifier = WatchStatusClassifier::new(14, 31);
        let now = 100 * DAY;
        let s = season(12, 5, now - 40 * DAY);
        assert_eq!(classifier.classify(&s, now), WatchStatus::Dropped);
    }

    #[test]
    fn stale_past_paused_but_not_dropped_threshold() {
        let classifier = WatchStatusClassifier::new(14, 31);
        let now = 100 * DAY;
        let s = season(12, 5, now - 20 * DAY);
        assert_eq!(classifier.classify(&s, now), WatchStatus::Paused);
    }

    #[test]
    fn recently_watched_partial_progress_is_watching() {
        let classifier = WatchStatusClassifier::new(14, 31);
        let now = 100 * DAY;
        let s = season(12, 5, now - 2 * DAY);
        assert_eq!(classifier.classify(&s, now), WatchStatus::Watching);
    }

    #[test]
    fn untouched_season_is_planning() {
        let classifier = WatchStatusClassifier::new(14, 31);
        let s = season(12, 0, 0);
        assert_eq!(classifier.classify(&s, 100 * DAY), WatchStatus::Planning);
    }

    #[test]
    fn future_dated_last_viewed_truncates_toward_zero_before_abs() {
        // last_viewed_at a few hours ahead of `now`: (negative seconds)/86400
        // truncates to 0 in both Go and Rust integer division, so this
        // must not read as "31 days stale" from a sign error.
        let classifier = WatchStatusClassifier::new(14, 31);
        let now = 100 * DAY;
        let s = season(12, 5, now + 3600);
        assert_eq!(classifier.classify(&s, now), WatchStatus::Watching);
    }
}
