//! AniList data model: media entries and their relation graph.
//!
//! AniList models a franchise as a graph of [`Media`] nodes connected by
//! typed [`RelationType`] edges (sequel, side story, ...). The mapping
//! engine walks this graph lazily, one [`Media::relations`] lookup at a
//! time, rather than pulling the whole graph up front.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Release format of an AniList entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    #[serde(rename = "TV")]
    Tv,
    #[serde(rename = "TV_SHORT")]
    TvShort,
    #[serde(rename = "OVA")]
    Ova,
    #[serde(rename = "ONA")]
    Ona,
    #[serde(rename = "MOVIE")]
    Movie,
    #[serde(rename = "SPECIAL")]
    Special,
    #[serde(rename = "MUSIC")]
    Music,
    #[serde(other)]
    Other,
}

impl Format {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Tv => "TV",
            Format::TvShort => "TV_SHORT",
            Format::Ova => "OVA",
            Format::Ona => "ONA",
            Format::Movie => "MOVIE",
            Format::Special => "SPECIAL",
            Format::Music => "MUSIC",
            Format::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Release status of an AniList entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaStatus {
    #[serde(rename = "FINISHED")]
    Finished,
    #[serde(rename = "RELEASING")]
    Releasing,
    #[serde(rename = "NOT_YET_RELEASED")]
    NotYetReleased,
    #[serde(rename = "CANCELLED")]
    Cancelled,
    #[serde(rename = "HIATUS")]
    Hiatus,
    #[serde(other)]
    Unknown,
}

impl MediaStatus {
    #[must_use]
    pub fn is_releasing(&self) -> bool {
        matches!(self, MediaStatus::Releasing)
    }
}

/// The kind of relationship a [`RelationEdge`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationType {
    #[serde(rename = "SEQUEL")]
    Sequel,
    #[serde(rename = "PREQUEL")]
    Prequel,
    #[serde(rename = "SIDE_STORY")]
    SideStory,
    #[serde(rename = "PARENT")]
    Parent,
    #[serde(rename = "SPIN_OFF")]
    SpinOff,
    #[serde(rename = "ALTERNATIVE")]
    Alternative,
    #[serde(other)]
    Other,
}

/// A directed edge from one [`Media`] to another, tagged with its relation
/// kind. Pairs AniList's parallel `edges`/`nodes` arrays (indexed by
/// position in the source GraphQL response) into a single structural value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEdge {
    pub relation_type: RelationType,
    pub media_id: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Title {
    pub english: Option<String>,
    pub romaji: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartDate {
    pub year: Option<i32>,
}

/// One releasable AniList work: a TV season, a movie, an OVA, a special.
///
/// Relation edges are returned in the order AniList's API returns them;
/// the mapping engine relies on that order being stable within one fetch
/// (spec §4.3 "Tie-break & ordering rules").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub id: i32,

    pub title: Title,

    #[serde(default)]
    pub synonyms: Vec<String>,

    pub format: Format,

    #[serde(default)]
    pub episodes: i32,

    pub status: MediaStatus,

    #[serde(default, rename = "startDate")]
    pub start_date: StartDate,

    #[serde(default, deserialize_with = "deserialize_relations")]
    pub relations: Vec<RelationEdge>,
}

/// AniList's GraphQL response shapes `relations` as two parallel arrays
/// (`edges`, each carrying a `relationType`; `nodes`, each carrying the
/// related media's `id`) rather than a single array of edge objects.
/// Zips them back into position-paired [`RelationEdge`]s.
fn deserialize_relations<'de, D>(deserializer: D) -> Result<Vec<RelationEdge>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct RawEdge {
        #[serde(rename = "relationType")]
        relation_type: RelationType,
    }

    #[derive(Deserialize)]
    struct RawNode {
        id: i32,
    }

    #[derive(Deserialize, Default)]
    struct RawRelations {
        #[serde(default)]
        edges: Vec<RawEdge>,
        #[serde(default)]
        nodes: Vec<RawNode>,
    }

    let raw = RawRelations::deserialize(deserializer)?;
    Ok(raw
        .edges
        .into_iter()
        .zip(raw.nodes)
        .map(|(edge, node)| RelationEdge { relation_type: edge.relation_type, media_id: node.id })
        .collect())
}

impl Media {
    /// Every title AniList has on file for this entry: synonyms plus the
    /// localized titles, used by [`crate::services::match_scorer`] for
    /// substring matching.
    #[must_use]
    pub fn all_titles(&self) -> HashSet<&str> {
        let mut titles: HashSet<&str> = self.synonyms.iter().map(String::as_str).collect();
        if let Some(t) = self.title.english.as_deref() {
            titles.insert(t);
        }
        if let Some(t) = self.title.romaji.as_deref() {
            titles.insert(t);
        }
        titles
    }

    /// Relation edges matching `kind`, in the order AniList returned them.
    #[must_use]
    pub fn relations_of(&self, kind: RelationType) -> Vec<&RelationEdge> {
        self.relations
            .iter()
            .filter(|edge| edge.relation_type == kind)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(id: i32) -> Media {
        Media {
            id,
            title: Title { english: Some("Attack on Titan".into()), romaji: Some("Shingeki no Kyojin".into()) },
            synonyms: vec!["AoT".into()],
            format: Format::Tv,
            episodes: 25,
            status: MediaStatus::Finished,
            start_date: StartDate { year: Some(2013) },
            relations: vec![
                RelationEdge { relation_type: RelationType::Sequel, media_id: 2 },
                RelationEdge { relation_type: RelationType::SideStory, media_id: 3 },
                RelationEdge { relation_type: RelationType::Sequel, media_id: 4 },
            ],
        }
    }

    #[test]
    fn all_titles_includes_synonyms_and_localized_titles() {
        let m = media(1);
        let titles = m.all_titles();
        assert!(titles.contains("AoT"));
        assert!(titles.contains("Attack on Titan"));
        assert!(titles.contains("Shingeki no Kyojin"));
    }

    #[test]
    fn relations_of_preserves_source_order() {
        let m = media(1);
        let sequels: Vec<i32> = m
            .relations_of(RelationType::Sequel)
            .iter()
            .map(|e| e.media_id)
            .collect();
        assert_eq!(sequels, vec![2, 4]);
    }

    #[test]
    fn media_deserializes_relations_from_parallel_edges_and_nodes() {
        let json = r#"{
            "id": 16498,
            "title": { "english": "Attack on Titan", "romaji": null },
            "format": "TV",
            "episodes": 25,
            "status": "FINISHED",
            "startDate": { "year": 2013 },
            "relations": {
                "edges": [
                    { "relationType": "SEQUEL" },
                    { "relationType": "SIDE_STORY" }
                ],
                "nodes": [
                    { "id": 20958 },
                    { "id": 140960 }
                ]
            }
        }"#;

        let m: Media = serde_json::from_str(json).unwrap();
        assert_eq!(m.start_date.year, Some(2013));
        assert_eq!(
            m.relations,
            vec![
                RelationEdge { relation_type: RelationType::Sequel, media_id: 20958 },
                RelationEdge { relation_type: RelationType::SideStory, media_id: 140960 },
            ]
        );
    }

    #[test]
    fn media_defaults_relations_when_field_absent() {
        let json = r#"{
            "id": 1,
            "title": { "english": "Show", "romaji": null },
            "format": "TV",
            "episodes": 12,
            "status": "FINISHED",
            "startDate": { "year": 2020 }
        }"#;

        let m: Media = serde_json::from_str(json).unwrap();
        assert!(m.relations.is_empty());
    }

    #[test]
    fn is_releasing_only_true_for_releasing_status() {
        assert!(MediaStatus::Releasing.is_releasing());
        assert!(!MediaStatus::Finished.is_releasing());
    }
}
