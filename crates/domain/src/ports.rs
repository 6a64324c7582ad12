//! Port definitions (traits) for external collaborators
//!
//! These traits define the boundaries between the core and external
//! systems. Adapters implement them to connect to real feeds, storage,
//! and outbound channels.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{AnnounceAction, AnnouncementState, Article, FeedEntry, Publication};

/// Error type for feed retrieval
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("unparseable feed: {0}")]
    Parse(String),
}

/// Port for pulling parsed entries from a publication's feed
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse the feed at `feed_url`, entries in feed order
    async fn fetch_entries(&self, feed_url: &str) -> Result<Vec<FeedEntry>, FeedError>;
}

/// Error type for the article store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Port for the persistent article and announcement-state store.
///
/// `upsert_article` is idempotent: it inserts on first sighting of a guid
/// and otherwise refreshes mutable fields only (`guid` and `first_seen_at`
/// never change), so calling it every cycle with unchanged data is a
/// semantic no-op.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// All publications whose feeds should be polled
    async fn list_publications(&self) -> Result<Vec<Publication>, StoreError>;

    /// Look up a stored article by guid
    async fn find_article(&self, guid: &str) -> Result<Option<Article>, StoreError>;

    /// Insert or refresh an article; returns the stored row
    async fn upsert_article(&self, article: &Article) -> Result<Article, StoreError>;

    /// Announcement bookkeeping for (guid, channel), if any
    async fn announcement_state(
        &self,
        guid: &str,
        channel: &str,
    ) -> Result<Option<AnnouncementState>, StoreError>;

    /// Atomically increment `times_announced` and set `last_announced_at`
    /// for (guid, channel). Calling this twice with the same `at` must not
    /// double-count the same logical announcement.
    async fn record_announcement(
        &self,
        guid: &str,
        channel: &str,
        at: OffsetDateTime,
    ) -> Result<(), StoreError>;
}

/// Error type for outbound queues
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue write failed: {0}")]
    Write(String),
}

/// Port for one channel's outbound announcement queue.
///
/// A collaborator consumes the queue and performs delivery; delivery
/// success or failure is never observed here.
#[async_trait]
pub trait AnnouncementQueue: Send + Sync {
    async fn enqueue(&self, action: &AnnounceAction) -> Result<(), QueueError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
