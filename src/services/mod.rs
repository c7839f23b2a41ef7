pub mod mapping_engine;
pub mod match_scorer;
pub mod sync_orchestrator;
pub mod title_normalizer;
pub mod watch_status;

pub use mapping_engine::{MappingEngine, MappingError};
pub use sync_orchestrator::{SeriesMapping, SeriesSyncError, SeriesSyncResult, SyncOrchestrator};
pub use watch_status::{WatchStatus, WatchStatusClassifier};
