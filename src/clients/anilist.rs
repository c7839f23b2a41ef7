//! AniList GraphQL client: search, media-by-id, and the rate limiter that
//! backs both (spec §4.5, §5, §6).

use super::ClientError;
use crate::models::anilist::Media;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

const ANILIST_API: &str = "https://graphql.anilist.co";

const SEARCH_QUERY: &str = r"
    query ($search: String) {
        Page(page: 1, perPage: 25) {
            media(search: $search, type: ANIME) {
                ...fields
            }
        }
    }
";

const DETAILS_QUERY: &str = r"
    query ($id: Int) {
        Media(id: $id, type: ANIME) {
            ...fields
            relations {
                edges {
                    relationType
                }
                nodes {
                    id
                }
            }
        }
    }
";

/// Capability set the mapping engine consumes from AniList. Implementations
/// are pluggable so the engine can be unit tested without the network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AniListClient: Send + Sync {
    async fn search_for_anime(&self, term: &str) -> Result<Vec<Media>, ClientError>;

    /// Media by id, with `relations` populated. `Ok(None)` if AniList has
    /// no such media — not an error (spec §7's `NotFound` row).
    async fn get_anime_details(&self, id: i32) -> Result<Option<Media>, ClientError>;
}

/// Backoff policy for AniList's 429s, tuned the way the rest of this
/// codebase's providers tune theirs: exponential with a cap, honoring
/// `Retry-After` when the server sends one.
#[derive(Debug, Clone)]
struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
}

impl RetryPolicy {
    fn anilist() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(700),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 1.5,
        }
    }

    fn calculate_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(server_delay) = retry_after {
            return server_delay.min(self.max_delay);
        }

        let multiplier = self.backoff_multiplier.powi(attempt as i32);
        let delay = Duration::from_millis((self.base_delay.as_millis() as f64 * multiplier) as u64);
        delay.min(self.max_delay)
    }
}

/// Single-writer-per-bucket token bucket: the sole place `AniListClient`
/// paces outgoing requests, shared (via `Arc`) across every concurrent
/// `SyncOrchestrator` worker (spec §5).
struct TokenBucket {
    capacity: u32,
    tokens: Mutex<(u32, Instant)>,
    refill_interval: Duration,
}

impl TokenBucket {
    fn new(requests_per_minute: u32) -> Self {
        let capacity = requests_per_minute.max(1);
        Self {
            capacity,
            tokens: Mutex::new((capacity, Instant::now())),
            refill_interval: Duration::from_secs(60) / capacity,
        }
    }

    async fn acquire(&self) {
        loop {
            let wait = {
                let mut guard = self.tokens.lock().await;
                let (tokens, last_refill) = &mut *guard;

                let elapsed = last_refill.elapsed();
                let refilled = (elapsed.as_millis() / self.refill_interval.as_millis().max(1)) as u32;
                if refilled > 0 {
                    *tokens = self.capacity.min(tokens.saturating_add(refilled));
                    *last_refill = Instant::now();
                }

                if *tokens > 0 {
                    *tokens -= 1;
                    None
                } else {
                    Some(self.refill_interval)
                }
            };

            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }
}

/// `reqwest`-backed [`AniListClient`] over the single GraphQL endpoint.
/// Cheap to clone: the HTTP client and rate limiter are both `Arc`-shared.
#[derive(Clone)]
pub struct AniListHttpClient {
    client: Client,
    token: String,
    limiter: Arc<TokenBucket>,
    retry_policy: RetryPolicy,
}

impl AniListHttpClient {
    #[must_use]
    pub fn new(token: impl Into<String>, requests_per_minute: u32) -> Self {
        Self {
            client: Client::builder()
                .user_agent("plex-anilist-sync/0.1")
                .build()
                .unwrap_or_else(|_| Client::new()),
            token: token.into(),
            limiter: Arc::new(TokenBucket::new(requests_per_minute)),
            retry_policy: RetryPolicy::anilist(),
        }
    }

    async fn post_graphql<V: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        query: &str,
        variables: V,
    ) -> Result<R, ClientError> {
        #[derive(Serialize)]
        struct Body<'a, V> {
            query: &'a str,
            variables: V,
        }

        let body = Body { query, variables };

        for attempt in 0..=self.retry_policy.max_retries {
            self.limiter.acquire().await;

            let response = self
                .client
                .post(ANILIST_API)
                .bearer_auth(&self.token)
                .json(&body)
                .send()
                .await
                .map_err(|e| ClientError::Transport(e.to_string()))?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs);

                if attempt == self.retry_policy.max_retries {
                    return Err(ClientError::RateLimited {
                        retry_after_secs: retry_after.unwrap_or_default().as_secs(),
                    });
                }

                let delay = self.retry_policy.calculate_delay(attempt, retry_after);
                warn!("AniList rate limited, retrying in {:?} (attempt {attempt})", delay);
                tokio::time::sleep(delay).await;
                continue;
            }

            if !response.status().is_success() {
                return Err(ClientError::Transport(format!(
                    "AniList request failed with status {}",
                    response.status()
                )));
            }

            return response.json::<R>().await.map_err(|e| ClientError::Decode(e.to_string()));
        }

        unreachable!("loop always returns before exhausting its range")
    }
}

#[derive(Serialize)]
struct SearchVariables<'a> {
    search: &'a str,
}

#[derive(Serialize)]
struct IdVariables {
    id: i32,
}

#[derive(Deserialize)]
struct SearchResponse {
    data: Option<SearchData>,
}

#[derive(Deserialize)]
struct SearchData {
    #[serde(rename = "Page")]
    page: Page,
}

#[derive(Deserialize)]
struct Page {
    media: Vec<Media>,
}

#[derive(Deserialize)]
struct DetailsResponse {
    data: Option<DetailsData>,
}

#[derive(Deserialize)]
struct DetailsData {
    #[serde(rename = "Media")]
    media: Option<Media>,
}

#[async_trait]
impl AniListClient for AniListHttpClient {
    async fn search_for_anime(&self, term: &str) -> Result<Vec<Media>, ClientError> {
        let query = SEARCH_QUERY.replace("...fields", MEDIA_FIELDS);
        let response: SearchResponse =
            self.post_graphql(&query, SearchVariables { search: term }).await?;

        Ok(response.data.map(|d| d.page.media).unwrap_or_default())
    }

    async fn get_anime_details(&self, id: i32) -> Result<Option<Media>, ClientError> {
        let query = DETAILS_QUERY.replace("...fields", MEDIA_FIELDS);
        let response: DetailsResponse = self.post_graphql(&query, IdVariables { id }).await?;

        Ok(response.data.and_then(|d| d.media))
    }
}

const MEDIA_FIELDS: &str = r"
    id
    title { english romaji }
    synonyms
    format
    episodes
    status
    startDate { year }
";
