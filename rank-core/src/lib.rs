pub mod classify;
pub mod config;
pub mod error;
pub mod feed;
pub mod poller;
pub mod ranking;
pub mod service;
pub mod source;
pub mod storage;

pub use classify::{CompetitionClassifier, TrackedPostLocator};
pub use config::{AppConfig, CompetitionConfig, FeedConfig, RefreshConfig};
pub use error::{ConfigError, FetchError, NormalizeError, SchedulerError, StoreError};
pub use feed::{ContentType, Post, PostTime};
pub use poller::{spawn_scheduler, SchedulerHandle};
pub use ranking::{build_snapshot, find_tracked, RankedPost, Snapshot, SnapshotStats, TrackedPosition};
pub use service::{RankingService, RefreshOutcome, RefreshState, RefreshStatus, TriggerOutcome};
pub use source::{fetch_all, FeedPage, FeedSource, HttpFeedSource, RawRecord};
pub use storage::SnapshotStore;
