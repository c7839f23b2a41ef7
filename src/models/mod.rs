pub mod anilist;
pub mod plex;

pub use anilist::Media as AniListMedia;
pub use plex::{Library, Season as PlexSeason, Series as PlexSeries};
