pub mod anilist;
pub mod plex;

pub use anilist::{AniListClient, AniListHttpClient};
pub use plex::{PlexClient, PlexHttpClient};

use thiserror::Error;

/// Transport/decode failures surfaced by [`PlexClient`] and
/// [`AniListClient`] implementations (spec §7).
///
/// `NotFound` (an empty search or absent relation) is deliberately *not* a
/// variant here: the source interfaces return `Ok(vec![])` /
/// `Ok(None)` for that case, so the mapping engine never has to match on
/// an error to detect it.
#[derive(Debug, Error, Clone)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("request cancelled")]
    Cancelled,
}

impl ClientError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::RateLimited { .. })
    }
}
