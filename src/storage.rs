//! The persistence boundary this crate sits behind but never implements
//! (spec §1 "Out of scope", §6, §9 "Concurrency shape").
//!
//! A host application owns the relational database that stores user
//! sessions, Plex/AniList tokens, and which library keys are selected for
//! sync; this crate only needs a narrow read/write surface onto the
//! "selected libraries" row, expressed here as a trait so the mapping
//! core stays storage-agnostic. No implementation lives in this crate.

use async_trait::async_trait;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn selected_library_keys(&self) -> anyhow::Result<Vec<String>>;

    async fn save_selected_library_keys(&self, keys: &[String]) -> anyhow::Result<()>;
}
