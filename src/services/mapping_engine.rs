//! Discovers the ordered run of AniList entries that corresponds to a Plex
//! series, one Plex season at a time (spec §4.3).
//!
//! The walk alternates between two strategies per season: a fresh title
//! search when there's no anchor yet (the first mapped season), and a graph
//! walk from the previous season's anchor entry otherwise (sequel / side
//! story / special edges). Both strategies bottom out in the same "does
//! this season still need more episodes" fill loop.

use crate::clients::anilist::AniListClient;
use crate::models::anilist::{Format, Media, RelationType};
use crate::models::plex::{Season as PlexSeason, Series as PlexSeries};
use crate::services::match_scorer::score;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum MappingError {
    /// The title search backing a fresh anchor lookup failed outright.
    /// Unlike relation-graph fetch failures (absorbed as "no such entry"),
    /// this aborts the whole series: without a search result there is
    /// nothing to anchor subsequent seasons to.
    #[error("anilist search failed: {message}")]
    Search { message: String },
}

/// Caps the AniList detail fetches ([`AniListClient::get_anime_details`])
/// one [`MappingEngine::get_series_anilist_entries`] call may spend walking
/// relation edges, so a pathological relation graph can't turn one series
/// into an unbounded number of requests.
struct FetchBudget {
    remaining: usize,
}

impl FetchBudget {
    fn new(limit: usize) -> Self {
        Self { remaining: limit }
    }

    fn try_consume(&mut self) -> bool {
        if self.remaining == 0 {
            false
        } else {
            self.remaining -= 1;
            true
        }
    }
}

pub struct MappingEngine {
    anilist: Arc<dyn AniListClient>,
    max_detail_fetches_per_series: usize,
}

impl MappingEngine {
    #[must_use]
    pub fn new(anilist: Arc<dyn AniListClient>, max_detail_fetches_per_series: usize) -> Self {
        Self { anilist, max_detail_fetches_per_series }
    }

    /// The full ordered mapping for one series: every AniList entry, across
    /// every mapped season, in watch order.
    ///
    /// Specials (`index == 0`) are skipped. A season whose episodes are
    /// already absorbed by the previous block's remaining episode count
    /// contributes no new entries. The walk stops early if the most
    /// recently mapped block is a single still-`RELEASING` entry: there's
    /// nothing downstream to search for yet.
    pub async fn get_series_anilist_entries(
        &self,
        series: &PlexSeries,
    ) -> Result<Vec<Media>, MappingError> {
        let mut mapping: Vec<Media> = Vec::new();
        let mut previous_season_entries: Vec<Media> = Vec::new();
        let mut mapped_episodes: i32 = 0;
        let mut budget = FetchBudget::new(self.max_detail_fetches_per_series);
        let mut visited: HashSet<i32> = HashSet::new();

        for season in series.seasons_ascending() {
            if season.is_specials() {
                continue;
            }

            if let Some(last) = mapping.last() {
                if mapped_episodes + season.episodes <= last.episodes {
                    mapped_episodes += season.episodes;
                    continue;
                }
            }
            mapped_episodes = 0;

            let season_entries = self
                .find_mapping_for_season(
                    series,
                    season,
                    &previous_season_entries,
                    &mapping,
                    &mut budget,
                    &mut visited,
                )
                .await?;

            mapped_episodes += season_entries.iter().map(|m| m.episodes).sum::<i32>();
            mapping.extend(season_entries.iter().cloned());
            previous_season_entries = season_entries;

            if previous_season_entries.len() == 1 && previous_season_entries[0].status.is_releasing() {
                return Ok(mapping);
            }
        }

        Ok(mapping)
    }

    /// Maps one season, given the previous season's mapped entries (empty
    /// for the first mapped season) and the mapping built so far.
    async fn find_mapping_for_season(
        &self,
        series: &PlexSeries,
        season: &PlexSeason,
        previous_season_entries: &[Media],
        mapping: &[Media],
        budget: &mut FetchBudget,
        visited: &mut HashSet<i32>,
    ) -> Result<Vec<Media>, MappingError> {
        let mut season_entries: Vec<Media> = if previous_season_entries.is_empty() {
            self.search_anchor(series, season).await?.into_iter().collect()
        } else {
            self.walk_from_anchor(series, season, previous_season_entries, budget, visited)
                .await
        };

        let mut mapped_in_block: i32 = season_entries.iter().map(|m| m.episodes).sum();
        if mapped_in_block >= season.episodes {
            return Ok(season_entries);
        }

        if let Some(last) = season_entries.last().cloned() {
            if let Some(side_story) = self.get_anime_side_story(&last, budget, visited).await {
                if mapped_in_block + side_story.episodes == season.episodes {
                    season_entries.push(side_story);
                    return Ok(season_entries);
                }
            }

            if let Some(special) = self.get_anime_special(&last, budget, visited).await {
                if mapped_in_block + special.episodes == season.episodes {
                    season_entries.push(special);
                    return Ok(season_entries);
                }
            }
        }

        while mapped_in_block < season.episodes {
            let Some(last) = season_entries.last().cloned() else { break };
            let Some(sequel) = self.get_anime_sequel(&last, last.format, budget, visited).await else {
                break;
            };
            season_entries.push(sequel);
            mapped_in_block = season_entries.iter().map(|m| m.episodes).sum();
        }

        if mapped_in_block < season.episodes && mapping.len() >= 2 {
            let second_to_last = &mapping[mapping.len() - 2];
            if let Some(sequel) =
                self.get_anime_sequel(second_to_last, second_to_last.format, budget, visited).await
            {
                season_entries.push(sequel);
            }
        }

        Ok(season_entries)
    }

    /// Case A: no anchor yet, search by title and keep the single best
    /// scoring candidate, if any candidate scored at all.
    async fn search_anchor(
        &self,
        series: &PlexSeries,
        season: &PlexSeason,
    ) -> Result<Option<Media>, MappingError> {
        let search_term = if season.index > 1 {
            format!("{} {}", season.parent_title, season.index)
        } else {
            season.parent_title.clone()
        };

        let results = self
            .anilist
            .search_for_anime(&search_term)
            .await
            .map_err(|e| MappingError::Search { message: e.to_string() })?;

        Ok(find_best_match(series, season, &results))
    }

    /// Case B: an anchor from the previous season exists. The anchor is
    /// the last TV-format entry in the previous block (falling back to its
    /// first entry if none were TV), and the candidate is whichever of its
    /// sequel / side story scores higher, with the sequel favored on ties
    /// via a flat bonus (spec §4.3 "Case B" scoring note).
    async fn walk_from_anchor(
        &self,
        series: &PlexSeries,
        season: &PlexSeason,
        previous_season_entries: &[Media],
        budget: &mut FetchBudget,
        visited: &mut HashSet<i32>,
    ) -> Vec<Media> {
        let mut anchor = &previous_season_entries[0];
        for entry in previous_season_entries {
            if entry.format == Format::Tv {
                anchor = entry;
            }
        }

        let sequel = self.get_anime_sequel(anchor, anchor.format, budget, visited).await;
        let side_story = self.get_anime_side_story(anchor, budget, visited).await;

        let sequel_score = sequel.as_ref().map(|m| score(series, season, m)).unwrap_or(0) + 10;
        let side_story_score = side_story.as_ref().map(|m| score(series, season, m)).unwrap_or(0);

        if let Some(candidate) = &sequel {
            if sequel_score >= 10 && sequel_score >= side_story_score {
                return vec![candidate.clone()];
            }
        }
        if let Some(candidate) = &side_story {
            if side_story_score > 0 && side_story_score > sequel_score {
                return vec![candidate.clone()];
            }
        }

        Vec::new()
    }

    /// The sequel edge whose format is `wanted_format` (or `TV`, when
    /// `wanted_format` is `OVA`/`ONA` — a TV continuation of an OVA/ONA
    /// still counts). If no sequel edge matches but the first sequel edge
    /// itself has a sequel, the walk continues from there.
    async fn get_anime_sequel(
        &self,
        anime: &Media,
        wanted_format: Format,
        budget: &mut FetchBudget,
        visited: &mut HashSet<i32>,
    ) -> Option<Media> {
        let sequels = self.get_anime_relations(anime, RelationType::Sequel, budget, visited).await;

        let mut accepted = vec![wanted_format];
        if matches!(wanted_format, Format::Ova | Format::Ona) {
            accepted.push(Format::Tv);
        }

        for candidate in &sequels {
            if accepted.contains(&candidate.format) {
                return Some(candidate.clone());
            }
        }

        let first_sequel = sequels.into_iter().next()?;
        if first_sequel.relations_of(RelationType::Sequel).is_empty() {
            return None;
        }

        Box::pin(self.get_anime_sequel(&first_sequel, wanted_format, budget, visited)).await
    }

    async fn get_anime_side_story(
        &self,
        anime: &Media,
        budget: &mut FetchBudget,
        visited: &mut HashSet<i32>,
    ) -> Option<Media> {
        self.get_anime_relation(anime, RelationType::SideStory, budget, visited).await
    }

    /// A special counts for this purpose only if AniList links it via a
    /// `SEQUEL` edge (not `SIDE_STORY`) and its format is actually
    /// `SPECIAL` — some shows file their specials as side stories instead.
    async fn get_anime_special(
        &self,
        anime: &Media,
        budget: &mut FetchBudget,
        visited: &mut HashSet<i32>,
    ) -> Option<Media> {
        let candidate = self.get_anime_relation(anime, RelationType::Sequel, budget, visited).await?;
        (candidate.format == Format::Special).then_some(candidate)
    }

    async fn get_anime_relation(
        &self,
        anime: &Media,
        relation_type: RelationType,
        budget: &mut FetchBudget,
        visited: &mut HashSet<i32>,
    ) -> Option<Media> {
        self.get_anime_relations(anime, relation_type, budget, visited).await.into_iter().next()
    }

    /// Fetches full details for every `relation_type` edge on `anime`, in
    /// edge order. An id already visited this series (cycle guard) is
    /// skipped. A fetch failure is treated as "this edge doesn't exist" —
    /// it does not abort the walk. Once the per-series fetch budget is
    /// exhausted, the walk stops accumulating further relations rather
    /// than erroring: the caller gets whatever it already found.
    async fn get_anime_relations(
        &self,
        anime: &Media,
        relation_type: RelationType,
        budget: &mut FetchBudget,
        visited: &mut HashSet<i32>,
    ) -> Vec<Media> {
        let mut entries = Vec::new();

        for edge in anime.relations_of(relation_type) {
            if visited.contains(&edge.media_id) {
                continue;
            }
            if !budget.try_consume() {
                break;
            }
            visited.insert(edge.media_id);

            match self.anilist.get_anime_details(edge.media_id).await {
                Ok(Some(media)) => entries.push(media),
                Ok(None) | Err(_) => {}
            }
        }

        entries
    }
}

/// The candidate with the highest [`score`]; the first candidate seen wins
/// ties (and seeds the initial "best" even at score zero, so a later
/// zero-scoring candidate can't displace it). `None` if no candidate
/// scored above zero, or the result set was empty.
fn find_best_match(series: &PlexSeries, season: &PlexSeason, candidates: &[Media]) -> Option<Media> {
    let mut best: Option<&Media> = None;
    let mut highest = 0;

    for candidate in candidates {
        let candidate_score = score(series, season, candidate);
        if best.is_none() || candidate_score > highest {
            highest = candidate_score;
            best = Some(candidate);
        }
    }

    best.filter(|_| highest > 0).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::anilist::MockAniListClient;
    use crate::models::anilist::{MediaStatus, RelationEdge, StartDate, Title};
    use mockall::predicate::eq;

    fn plex_series(title: &str, year: i32, seasons: Vec<PlexSeason>) -> PlexSeries {
        PlexSeries { rating_key: "1".into(), title: title.into(), year, seasons }
    }

    fn plex_season(index: i32, episodes: i32) -> PlexSeason {
        PlexSeason {
            rating_key: format!("s{index}"),
            parent_title: "Mysterious Girlfriend X".into(),
            title: format!("Season {index}"),
            index,
            episodes,
            episodes_watched: 0,
            last_viewed_at: 0,
        }
    }

    fn anilist_media(
        id: i32,
        title: &str,
        format: Format,
        episodes: i32,
        year: i32,
        status: MediaStatus,
        relations: Vec<RelationEdge>,
    ) -> Media {
        Media {
            id,
            title: Title { english: Some(title.into()), romaji: None },
            synonyms: vec![],
            format,
            episodes,
            status,
            start_date: StartDate { year: Some(year) },
            relations,
        }
    }

    /// Single-season series, single search hit: the engine should return
    /// exactly that entry (mirrors Mysterious Girlfriend X -> [12467]).
    #[tokio::test]
    async fn single_season_resolves_via_search() {
        let mut mock = MockAniListClient::new();
        mock.expect_search_for_anime()
            .with(eq("Mysterious Girlfriend X"))
            .returning(|_| {
                Ok(vec![anilist_media(
                    12467,
                    "Mysterious Girlfriend X",
                    Format::Tv,
                    13,
                    2012,
                    MediaStatus::Finished,
                    vec![],
                )])
            });

        let engine = MappingEngine::new(Arc::new(mock), 10);
        let series = plex_series("Mysterious Girlfriend X", 2012, vec![plex_season(1, 13)]);

        let entries = engine.get_series_anilist_entries(&series).await.unwrap();
        assert_eq!(entries.iter().map(|m| m.id).collect::<Vec<_>>(), vec![12467]);
    }

    /// A season fully absorbed by the previous block's leftover episode
    /// count should not trigger another search/fetch at all.
    #[tokio::test]
    async fn absorbed_season_contributes_no_new_entries() {
        let mut mock = MockAniListClient::new();
        mock.expect_search_for_anime().times(1).returning(|_| {
            Ok(vec![anilist_media(1, "One Piece", Format::Tv, 1122, 1999, MediaStatus::Releasing, vec![])])
        });
        // No get_anime_details expectation: the second season must never
        // trigger a relation walk if it's fully absorbed by the first.
        mock.expect_get_anime_details().times(0);

        let engine = MappingEngine::new(Arc::new(mock), 10);
        let series = plex_series(
            "One Piece",
            1999,
            vec![
                PlexSeason {
                    rating_key: "s1".into(),
                    parent_title: "One Piece".into(),
                    title: "Season 1".into(),
                    index: 1,
                    episodes: 500,
                    episodes_watched: 0,
                    last_viewed_at: 0,
                },
                PlexSeason {
                    rating_key: "s2".into(),
                    parent_title: "One Piece".into(),
                    title: "Season 2".into(),
                    index: 2,
                    episodes: 600,
                    episodes_watched: 0,
                    last_viewed_at: 0,
                },
            ],
        );

        let entries = engine.get_series_anilist_entries(&series).await.unwrap();
        assert_eq!(entries.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1]);
    }

    /// A RELEASING single-entry block must stop the walk immediately —
    /// there's nothing to search for beyond an ongoing show.
    #[tokio::test]
    async fn releasing_single_entry_cuts_the_walk_short() {
        let mut mock = MockAniListClient::new();
        mock.expect_search_for_anime().returning(|_| {
            Ok(vec![anilist_media(1, "Ongoing Show", Format::Tv, 24, 2020, MediaStatus::Releasing, vec![])])
        });
        mock.expect_get_anime_details().times(0);

        let engine = MappingEngine::new(Arc::new(mock), 10);
        let series = plex_series(
            "Ongoing Show",
            2020,
            vec![plex_season(1, 12), plex_season(2, 12)],
        );

        let entries = engine.get_series_anilist_entries(&series).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    /// Specials (index 0) never enter the mapping.
    #[tokio::test]
    async fn specials_season_is_skipped() {
        let mut mock = MockAniListClient::new();
        mock.expect_search_for_anime().times(1).returning(|_| {
            Ok(vec![anilist_media(1, "Show", Format::Tv, 12, 2020, MediaStatus::Finished, vec![])])
        });

        let engine = MappingEngine::new(Arc::new(mock), 10);
        let series = plex_series(
            "Show",
            2020,
            vec![
                PlexSeason {
                    rating_key: "s0".into(),
                    parent_title: "Show".into(),
                    title: "Specials".into(),
                    index: 0,
                    episodes: 5,
                    episodes_watched: 0,
                    last_viewed_at: 0,
                },
                plex_season(1, 12),
            ],
        );

        let entries = engine.get_series_anilist_entries(&series).await.unwrap();
        assert_eq!(entries.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1]);
    }

    /// A failed title search aborts mapping for the whole series.
    #[tokio::test]
    async fn search_failure_propagates_as_mapping_error() {
        let mut mock = MockAniListClient::new();
        mock.expect_search_for_anime()
            .returning(|_| Err(crate::clients::ClientError::Transport("boom".into())));

        let engine = MappingEngine::new(Arc::new(mock), 10);
        let series = plex_series("Show", 2020, vec![plex_season(1, 12)]);

        assert!(engine.get_series_anilist_entries(&series).await.is_err());
    }

    /// Second season walks the sequel edge from the first season's anchor.
    #[tokio::test]
    async fn second_season_follows_sequel_edge() {
        let season_one = anilist_media(
            1,
            "Show",
            Format::Tv,
            12,
            2020,
            MediaStatus::Finished,
            vec![RelationEdge { relation_type: RelationType::Sequel, media_id: 2 }],
        );
        let season_two =
            anilist_media(2, "Show 2nd Season", Format::Tv, 12, 2021, MediaStatus::Finished, vec![]);

        let mut mock = MockAniListClient::new();
        mock.expect_search_for_anime().times(1).returning(move |_| Ok(vec![season_one.clone()]));
        mock.expect_get_anime_details()
            .with(eq(2))
            .returning(move |_| Ok(Some(season_two.clone())));

        let engine = MappingEngine::new(Arc::new(mock), 10);
        let series = plex_series("Show", 2020, vec![plex_season(1, 12), plex_season(2, 12)]);

        let entries = engine.get_series_anilist_entries(&series).await.unwrap();
        assert_eq!(entries.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn find_best_match_prefers_first_on_zero_score_tie() {
        let a = anilist_media(1, "Unrelated A", Format::Tv, 1, 1900, MediaStatus::Finished, vec![]);
        let b = anilist_media(2, "Unrelated B", Format::Tv, 1, 1900, MediaStatus::Finished, vec![]);
        let series = plex_series("Show", 2020, vec![]);
        let season = plex_season(1, 12);

        assert!(find_best_match(&series, &season, &[a, b]).is_none());
    }

    #[test]
    fn find_best_match_returns_none_for_empty_results() {
        let series = plex_series("Show", 2020, vec![]);
        let season = plex_season(1, 12);
        assert!(find_best_match(&series, &season, &[]).is_none());
    }
}
