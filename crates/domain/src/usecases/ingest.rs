//! Ingest use case - orchestrates polling, deduplication, and scheduling
//!
//! One `poll_once` call is one polling cycle: list publications, pull each
//! feed, route every entry through normalize -> filter -> upsert, then ask
//! the scheduler per enabled channel whether to emit an announcement.
//! Feed fetches may run concurrently; the schedule-and-record step is
//! single-threaded, which keeps announcement decisions for a given
//! (guid, channel) linearized.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};

use crate::{
    filter::is_filtered,
    model::{AnnounceAction, AnnouncementState, Article, EntryOutcome, FeedEntry, Publication},
    ports::{AnnouncementQueue, ArticleStore, Clock, FeedError, FeedSource},
    scheduler::{ChannelPolicy, Decision, Scheduler, SchedulerConfig},
    tags::normalize_tags,
    usecases::render::Renderer,
};

/// Configuration for the ingest loop
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Whether tag normalization is applied at all
    pub normalise_tags: bool,
    /// Articles carrying every one of these tags are never announced
    pub filtered_tags: BTreeSet<String>,
    /// Hashtag appended when an article carries a special tag
    pub hashtag: String,
    /// Bound on concurrent feed fetches
    pub max_concurrent_fetches: usize,
    /// Log decisions without persisting or enqueueing anything
    pub dry_run: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            normalise_tags: true,
            filtered_tags: BTreeSet::new(),
            hashtag: String::new(),
            max_concurrent_fetches: 4,
            dry_run: false,
        }
    }
}

/// One enabled announcement channel: its policy plus the queue a delivery
/// collaborator consumes.
#[derive(Clone)]
pub struct ChannelSink {
    pub policy: ChannelPolicy,
    pub queue: Arc<dyn AnnouncementQueue>,
}

/// Tally of one polling cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Entries announced on at least one channel
    pub announced: usize,
    /// Total announce actions emitted
    pub announcements: usize,
    /// Entries stored with no channel due
    pub stored: usize,
    /// Entries excluded by the filter engine
    pub filtered: usize,
    /// Entries skipped for lack of a publish date
    pub missing_date: usize,
    /// Entries whose processing failed
    pub failed: usize,
    /// Publications whose feed could not be fetched
    pub failed_feeds: usize,
}

impl CycleReport {
    fn tally(&mut self, outcome: &EntryOutcome) {
        match outcome {
            EntryOutcome::Announced { channels } => {
                self.announced += 1;
                self.announcements += channels.len();
            }
            EntryOutcome::Stored => self.stored += 1,
            EntryOutcome::Filtered => self.filtered += 1,
            EntryOutcome::MissingDate => self.missing_date += 1,
            EntryOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Errors that abort a whole cycle
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("store error: {0}")]
    Store(String),
}

/// Ingest loop orchestrator
pub struct IngestLoop<F, S, C>
where
    F: FeedSource + ?Sized,
    S: ArticleStore + ?Sized,
    C: Clock + ?Sized,
{
    feed_source: Arc<F>,
    store: Arc<S>,
    channels: Vec<ChannelSink>,
    scheduler: Scheduler,
    renderer: Renderer,
    clock: Arc<C>,
    config: IngestConfig,
}

impl<F, S, C> IngestLoop<F, S, C>
where
    F: FeedSource + ?Sized,
    S: ArticleStore + ?Sized,
    C: Clock + ?Sized,
{
    pub fn new(
        feed_source: Arc<F>,
        store: Arc<S>,
        channels: Vec<ChannelSink>,
        scheduler_config: SchedulerConfig,
        clock: Arc<C>,
        config: IngestConfig,
    ) -> Self {
        let renderer = Renderer::new(config.hashtag.clone());
        Self {
            feed_source,
            store,
            channels,
            scheduler: Scheduler::new(scheduler_config),
            renderer,
            clock,
            config,
        }
    }

    /// Run a single polling cycle over all known publications.
    ///
    /// Only an unreachable store aborts the cycle; a failed feed skips
    /// that publication and a failed entry skips that entry.
    pub async fn poll_once(&self) -> Result<CycleReport, IngestError> {
        let publications = self
            .store
            .list_publications()
            .await
            .map_err(|e| IngestError::Store(e.to_string()))?;

        tracing::info!(publications = publications.len(), "Starting ingest cycle");

        let mut report = CycleReport::default();

        for (publication, fetched) in self.fetch_feeds(publications).await {
            let entries = match fetched {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(
                        publication = %publication.title,
                        feed_url = %publication.feed_url,
                        error = %e,
                        "Feed unreachable, skipping publication"
                    );
                    report.failed_feeds += 1;
                    continue;
                }
            };

            tracing::debug!(
                publication = %publication.title,
                entries = entries.len(),
                "Fetched feed"
            );

            for entry in entries {
                let outcome = self.process_entry(&publication, entry).await;
                report.tally(&outcome);
            }
        }

        tracing::info!(
            announced = report.announced,
            announcements = report.announcements,
            stored = report.stored,
            filtered = report.filtered,
            missing_date = report.missing_date,
            failed = report.failed,
            failed_feeds = report.failed_feeds,
            "Ingest cycle complete"
        );

        Ok(report)
    }

    /// Fetch all publication feeds with bounded concurrency, preserving
    /// the publication association. Entry processing stays sequential.
    async fn fetch_feeds(
        &self,
        publications: Vec<Publication>,
    ) -> Vec<(Publication, Result<Vec<FeedEntry>, FeedError>)> {
        let max_concurrent = self.config.max_concurrent_fetches.max(1);
        let mut fetched = Vec::with_capacity(publications.len());
        let mut pending = publications.into_iter();
        let mut tasks: FuturesUnordered<
            BoxFuture<'_, (Publication, Result<Vec<FeedEntry>, FeedError>)>,
        > = FuturesUnordered::new();

        loop {
            while tasks.len() < max_concurrent {
                let Some(publication) = pending.next() else {
                    break;
                };
                tasks.push(Box::pin(async move {
                    let result = self.feed_source.fetch_entries(&publication.feed_url).await;
                    (publication, result)
                }));
            }

            match tasks.next().await {
                Some(item) => fetched.push(item),
                None => break,
            }
        }

        fetched
    }

    /// Process one feed entry: normalize, filter, upsert, then schedule
    /// per enabled channel. Never propagates an error into the loop.
    async fn process_entry(&self, publication: &Publication, entry: FeedEntry) -> EntryOutcome {
        let Some(published_at) = entry.published_at else {
            // Probably a page that accidentally got added to the feed; the
            // store is untouched so the entry is re-evaluated next cycle.
            tracing::debug!(url = %entry.url, "Entry has no publish date, skipping");
            return EntryOutcome::MissingDate;
        };

        let guid = entry.guid().to_string();
        let categories_normalised = normalize_tags(&entry.categories, self.config.normalise_tags);

        let existing = match self.store.find_article(&guid).await {
            Ok(existing) => existing,
            Err(e) => {
                tracing::warn!(guid = %guid, error = %e, "Store lookup failed, skipping entry");
                return EntryOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        let article = Article {
            guid,
            title: entry.title,
            url: entry.url,
            author: entry
                .author
                .or_else(|| publication.default_author.clone()),
            categories: entry.categories,
            categories_normalised,
            publication_id: Some(publication.id),
            published_at,
            first_seen_at: existing
                .as_ref()
                .map(|a| a.first_seen_at)
                .unwrap_or_else(|| self.clock.now()),
        };

        let excluded = is_filtered(&article, &self.config.filtered_tags);

        let article = if self.config.dry_run {
            article
        } else {
            match self.store.upsert_article(&article).await {
                Ok(stored) => stored,
                Err(e) => {
                    tracing::warn!(guid = %article.guid, error = %e, "Upsert failed, skipping entry");
                    return EntryOutcome::Failed {
                        error: e.to_string(),
                    };
                }
            }
        };

        if excluded {
            tracing::debug!(guid = %article.guid, "Article carries every filtered tag, not scheduling");
            return EntryOutcome::Filtered;
        }

        let mut announced = Vec::new();
        for channel in &self.channels {
            if self.announce_on_channel(publication, &article, channel).await {
                announced.push(channel.policy.name.clone());
            }
        }

        if announced.is_empty() {
            EntryOutcome::Stored
        } else {
            EntryOutcome::Announced {
                channels: announced,
            }
        }
    }

    /// Ask the scheduler about one channel and, on announce, record the
    /// intent before emitting the action so a re-entered loop cannot
    /// re-decide it. Returns whether an announcement was made.
    async fn announce_on_channel(
        &self,
        publication: &Publication,
        article: &Article,
        channel: &ChannelSink,
    ) -> bool {
        let name = &channel.policy.name;

        let state = match self.store.announcement_state(&article.guid, name).await {
            Ok(state) => {
                state.unwrap_or_else(|| AnnouncementState::fresh(&article.guid, name.clone()))
            }
            Err(e) => {
                tracing::warn!(guid = %article.guid, channel = %name, error = %e, "State lookup failed");
                return false;
            }
        };

        let now = self.clock.now();
        let attach_hashtag = match self.scheduler.decide(article, now, &channel.policy, &state) {
            Decision::Skip(reason) => {
                tracing::debug!(
                    guid = %article.guid,
                    channel = %name,
                    reason = ?reason,
                    "Not announcing"
                );
                return false;
            }
            Decision::Announce { attach_hashtag } => attach_hashtag,
        };

        let author = publication
            .announcement_author(name, article.author.as_deref())
            .unwrap_or_else(|| "unknown".to_string());
        let message = self.renderer.render(
            article,
            &author,
            state.times_announced,
            &channel.policy,
            attach_hashtag,
        );

        if self.config.dry_run {
            tracing::info!(
                guid = %article.guid,
                channel = %name,
                message = %message,
                "[dry run] Would announce"
            );
            return true;
        }

        if let Err(e) = self
            .store
            .record_announcement(&article.guid, name, now)
            .await
        {
            tracing::warn!(
                guid = %article.guid,
                channel = %name,
                error = %e,
                "Failed to record announcement, not emitting"
            );
            return false;
        }

        let action = AnnounceAction {
            channel: name.clone(),
            guid: article.guid.clone(),
            url: article.url.clone(),
            message,
            attach_hashtag,
        };

        if let Err(e) = channel.queue.enqueue(&action).await {
            // Already counted: the contract is intent to announce, not
            // confirmed delivery.
            tracing::error!(
                guid = %article.guid,
                channel = %name,
                error = %e,
                "Failed to enqueue announcement"
            );
        } else {
            tracing::info!(
                guid = %article.guid,
                channel = %name,
                attach_hashtag = attach_hashtag,
                "Announcement queued"
            );
        }

        true
    }
}
