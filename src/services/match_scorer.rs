//! Scores an AniList candidate against a Plex series/season pair.

use crate::models::anilist::Media as AniListMedia;
use crate::models::plex::{Season as PlexSeason, Series as PlexSeries};
use crate::services::title_normalizer::normalize;

const NAME_MATCH_POINTS: i32 = 30;
const EPISODE_COUNT_MATCH_POINTS: i32 = 25;
const YEAR_MATCH_POINTS: i32 = 10;

/// Additive match score between a Plex season and an AniList candidate
/// (spec §4.2). Always one of `{0, 10, 25, 30, 35, 40, 55, 65}`.
#[must_use]
pub fn score(series: &PlexSeries, season: &PlexSeason, candidate: &AniListMedia) -> i32 {
    let mut total = 0;

    if anilist_name_matches_plex_name(season, candidate) {
        total += NAME_MATCH_POINTS;
    }

    if candidate.episodes == season.episodes {
        total += EPISODE_COUNT_MATCH_POINTS;
    }

    if series.year == candidate.start_date.year.unwrap_or(i32::MIN) {
        total += YEAR_MATCH_POINTS;
    }

    total
}

/// True iff any Plex name variant is a substring of any AniList title.
///
/// The direction matters: Plex-in-AniList lets "attack on titan" match
/// "attack on titan final season", while the reverse would not.
#[must_use]
pub fn anilist_name_matches_plex_name(season: &PlexSeason, candidate: &AniListMedia) -> bool {
    let plex_variants = name_variants(season, true);
    let anilist_titles: Vec<String> = candidate.all_titles().into_iter().map(normalize).collect();

    anilist_titles
        .iter()
        .any(|anilist_title| plex_variants.iter().any(|plex| anilist_title.contains(plex)))
}

/// Builds the set of normalized Plex name variants for a season:
/// `"{parent} {season title}"`, `"{parent} {index}"`, and (when
/// `include_parent_only` or this is season 1) the bare parent title.
fn name_variants(season: &PlexSeason, include_parent_only: bool) -> Vec<String> {
    let mut variants = vec![
        normalize(&format!("{} {}", season.parent_title, season.title)),
        normalize(&format!("{} {}", season.parent_title, season.index)),
    ];

    if include_parent_only || season.index == 1 {
        variants.push(normalize(&season.parent_title));
    }

    variants
}
