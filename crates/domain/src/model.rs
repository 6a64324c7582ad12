//! Domain models and value objects

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// One entry pulled from a publication's feed.
///
/// Every field a feed may omit is an explicit `Option`; fallbacks are
/// applied during ingestion, never at parse time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntry {
    /// Feed-provided stable entry id, if any
    pub id: Option<String>,
    /// Entry title
    pub title: String,
    /// Link to the published item
    pub url: String,
    /// Entry author as given by the feed
    pub author: Option<String>,
    /// Raw tags in feed order
    pub categories: Vec<String>,
    /// Publication timestamp, if the feed provides one
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
}

impl FeedEntry {
    /// Dedup key: the feed's entry id, falling back to the entry URL.
    pub fn guid(&self) -> &str {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.url)
    }
}

/// A publication whose feed is polled. Owned by the persistence layer;
/// the core only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publication {
    pub id: Uuid,
    pub title: String,
    pub feed_url: String,
    /// Fallback author when an entry carries none
    pub default_author: Option<String>,
    /// Per-channel handle overrides (channel name -> handle)
    #[serde(default)]
    pub channel_handles: BTreeMap<String, String>,
}

impl Publication {
    /// Author to credit in an announcement on `channel`: the publication's
    /// handle for that channel, then the article author, then the
    /// publication default.
    pub fn announcement_author(
        &self,
        channel: &str,
        article_author: Option<&str>,
    ) -> Option<String> {
        self.channel_handles
            .get(channel)
            .cloned()
            .or_else(|| article_author.map(str::to_string))
            .or_else(|| self.default_author.clone())
    }
}

/// One feed entry, uniquely identified by guid, tracked through its
/// announcement lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Unique within the store; the sole dedup key
    pub guid: String,
    pub title: String,
    pub url: String,
    pub author: Option<String>,
    /// Raw tags in feed order
    pub categories: Vec<String>,
    /// Normalized tag set; `None` when normalization is disabled (distinct
    /// from an empty set, which means "no tags")
    pub categories_normalised: Option<BTreeSet<String>>,
    /// Owning publication, when known
    pub publication_id: Option<Uuid>,
    /// UTC publication timestamp from feed metadata
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
    /// Set on first sighting; never updated afterwards
    #[serde(with = "time::serde::rfc3339")]
    pub first_seen_at: OffsetDateTime,
}

impl Article {
    /// Age of the article relative to `now`.
    pub fn age(&self, now: OffsetDateTime) -> time::Duration {
        now - self.published_at
    }

    /// Tag set used for filtered-tag and special-tag matching: the
    /// normalized set when present, the raw categories otherwise.
    pub fn matching_tags(&self) -> BTreeSet<&str> {
        match &self.categories_normalised {
            Some(tags) => tags.iter().map(String::as_str).collect(),
            None => self.categories.iter().map(String::as_str).collect(),
        }
    }
}

/// Per (article, channel) announcement bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementState {
    pub guid: String,
    pub channel: String,
    /// Never exceeds the channel's configured repeat budget
    pub times_announced: u32,
    /// Absent until the first announcement on this channel
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_announced_at: Option<OffsetDateTime>,
}

impl AnnouncementState {
    /// State for an article never announced on `channel`.
    pub fn fresh(guid: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            channel: channel.into(),
            times_announced: 0,
            last_announced_at: None,
        }
    }
}

/// An announcement the core has decided to emit to a channel queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnounceAction {
    pub channel: String,
    pub guid: String,
    pub url: String,
    /// Rendered message text for the channel
    pub message: String,
    /// Whether the special hashtag was attached
    pub attach_hashtag: bool,
}

/// Outcome of processing a single feed entry.
#[derive(Debug, Clone)]
pub enum EntryOutcome {
    /// Stored and announced on the listed channels
    Announced { channels: Vec<String> },
    /// Stored; no channel was due
    Stored,
    /// Carried every filtered tag; stored but never scheduled
    Filtered,
    /// No parseable publish date; the store is left untouched so the entry
    /// is re-evaluated next cycle
    MissingDate,
    /// Processing aborted for this entry
    Failed { error: String },
}
