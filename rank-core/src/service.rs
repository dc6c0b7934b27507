use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::classify::CompetitionClassifier;
use crate::config::{AppConfig, FeedConfig, RefreshConfig};
use crate::error::FetchError;
use crate::feed::Post;
use crate::ranking::{build_snapshot, find_tracked, Snapshot, SnapshotStats, TrackedPosition};
use crate::source::{fetch_all, FeedSource};
use crate::storage::SnapshotStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RefreshState {
    Idle,
    Running,
    /// Idle again, but the last episode gave up. The previous snapshot is still served.
    Error {
        #[serde(rename = "error")]
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshStatus {
    #[serde(flatten)]
    pub state: RefreshState,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug)]
pub enum RefreshOutcome {
    Refreshed { posts: usize },
    Failed(FetchError),
    AlreadyRunning,
}

struct Shared {
    snapshot: Arc<Snapshot>,
    state: RefreshState,
    last_attempt_at: Option<DateTime<Utc>>,
    last_success_at: Option<DateTime<Utc>>,
}

/// Owns the current ranking and the refresh state machine.
///
/// The lock only ever guards field reads and writes; fetching happens with it
/// released. Readers get an `Arc<Snapshot>` and never see a half-published ranking.
pub struct RankingService {
    source: Arc<dyn FeedSource>,
    store: SnapshotStore,
    classifier: CompetitionClassifier,
    feed: FeedConfig,
    refresh: RefreshConfig,
    shared: RwLock<Shared>,
}

impl RankingService {
    /// Builds the service around whatever snapshot the store holds.
    pub async fn load(source: Arc<dyn FeedSource>, store: SnapshotStore, config: &AppConfig) -> Self {
        let classifier = CompetitionClassifier::from_config(&config.competition);
        let mut snapshot = store.load().await;
        snapshot.reclassify(&classifier);

        Self {
            source,
            store,
            classifier,
            feed: config.feed.clone(),
            refresh: config.refresh.clone(),
            shared: RwLock::new(Shared {
                last_success_at: snapshot.scraped_at,
                snapshot: Arc::new(snapshot),
                state: RefreshState::Idle,
                last_attempt_at: None,
            }),
        }
    }

    pub fn classifier(&self) -> &CompetitionClassifier {
        &self.classifier
    }

    pub fn refresh_config(&self) -> &RefreshConfig {
        &self.refresh
    }

    pub async fn snapshot(&self) -> Arc<Snapshot> {
        self.shared.read().await.snapshot.clone()
    }

    pub async fn status(&self) -> RefreshStatus {
        let shared = self.shared.read().await;
        RefreshStatus {
            state: shared.state.clone(),
            last_attempt_at: shared.last_attempt_at,
            last_success_at: shared.last_success_at,
        }
    }

    pub async fn stats(&self) -> SnapshotStats {
        self.snapshot().await.stats()
    }

    pub async fn tracked(&self) -> Option<TrackedPosition> {
        find_tracked(&*self.snapshot().await, self.classifier.locator())
    }

    /// Runs one refresh episode to completion on the caller's task.
    pub async fn refresh(&self) -> RefreshOutcome {
        if !self.try_begin().await {
            return RefreshOutcome::AlreadyRunning;
        }
        self.run_episode().await
    }

    /// Starts an episode in the background and reports whether it was accepted.
    pub async fn trigger(self: &Arc<Self>) -> TriggerOutcome {
        if !self.try_begin().await {
            return TriggerOutcome::AlreadyRunning;
        }
        let service = Arc::clone(self);
        let episode = tokio::spawn(async move {
            service.run_episode().await;
        });
        let service = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = episode.await {
                error!(error = %e, "refresh episode aborted");
                service.abandon_episode(e.to_string()).await;
            }
        });
        TriggerOutcome::Started
    }

    /// Leaves `Running` after an episode died without finishing.
    async fn abandon_episode(&self, message: String) {
        let mut shared = self.shared.write().await;
        if shared.state == RefreshState::Running {
            shared.state = RefreshState::Error { message };
        }
    }

    async fn try_begin(&self) -> bool {
        let mut shared = self.shared.write().await;
        if shared.state == RefreshState::Running {
            return false;
        }
        shared.state = RefreshState::Running;
        shared.last_attempt_at = Some(Utc::now());
        true
    }

    async fn run_episode(&self) -> RefreshOutcome {
        let attempts = self.refresh.retry_attempts.max(1);
        let mut last_err = FetchError::NoPosts;

        for attempt in 1..=attempts {
            match self.fetch_snapshot().await {
                Ok(snapshot) => return self.publish(snapshot).await,
                Err(err) => {
                    warn!(attempt, attempts, error = %err, "refresh attempt failed");
                    last_err = err;
                    if attempt < attempts {
                        tokio::time::sleep(self.refresh.retry_delay()).await;
                    }
                }
            }
        }

        let mut shared = self.shared.write().await;
        shared.state = RefreshState::Error {
            message: last_err.to_string(),
        };
        drop(shared);
        warn!(error = %last_err, "refresh gave up, keeping previous snapshot");
        RefreshOutcome::Failed(last_err)
    }

    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError> {
        let records = fetch_all(self.source.as_ref(), &self.feed).await?;

        let mut posts: Vec<Post> = Vec::with_capacity(records.len());
        for raw in &records {
            match Post::from_raw(&raw.record, &raw.content_type, &self.feed.base_url) {
                Ok(post) => posts.push(post),
                Err(e) => warn!(error = %e, content_type = %raw.content_type, "skipping feed record"),
            }
        }
        if posts.is_empty() {
            return Err(FetchError::NoPosts);
        }

        self.classifier.tag_all(&mut posts);
        Ok(build_snapshot(posts, Utc::now()))
    }

    async fn publish(&self, snapshot: Snapshot) -> RefreshOutcome {
        if let Err(e) = self.store.save(&snapshot).await {
            warn!(error = %e, "failed to persist snapshot; serving it from memory");
        }

        let posts = snapshot.len();
        let scraped_at = snapshot.scraped_at;
        let mut shared = self.shared.write().await;
        shared.snapshot = Arc::new(snapshot);
        shared.state = RefreshState::Idle;
        shared.last_success_at = scraped_at;
        drop(shared);

        info!(posts, "ranking refreshed");
        RefreshOutcome::Refreshed { posts }
    }
}
