//! Channel scheduler: per-channel announce/skip decisions

use std::collections::BTreeSet;

use time::{Duration, OffsetDateTime};

use crate::model::{AnnouncementState, Article};

/// Announcement policy for one channel, fixed at startup.
#[derive(Debug, Clone)]
pub struct ChannelPolicy {
    pub name: String,
    /// Minimum gap between repeat announcements of the same article
    pub min_hours_between_repeats: i64,
    /// Total number of times an article may go out on this channel
    pub max_repeat_count: u32,
    /// Titles longer than this are truncated in rendered messages
    pub max_title_chars: usize,
}

/// Scheduling settings shared by every channel.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Articles older than this are ingested but never announced
    pub max_age_days: i64,
    /// Tags that trigger the special hashtag on announcement
    pub special_tags: BTreeSet<String>,
}

/// Outcome of a scheduling decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Announce { attach_hashtag: bool },
    Skip(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Older than the announce window; permanent, age only increases
    TooOld,
    /// Repeat budget exhausted; permanent for this (article, channel)
    BudgetExhausted,
    /// Announced recently; eligible again at the contained time
    NotYetDue { due_at: OffsetDateTime },
}

pub struct Scheduler {
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// Decide whether `article` should be announced on a channel right now.
    ///
    /// Permanent exclusions (age, repeat budget) are checked before the
    /// timing window so an expired or exhausted article can never come back,
    /// and a never-announced article (no `last_announced_at`, whether or not
    /// a state record exists) is due immediately once it passes those.
    pub fn decide(
        &self,
        article: &Article,
        now: OffsetDateTime,
        policy: &ChannelPolicy,
        state: &AnnouncementState,
    ) -> Decision {
        if article.age(now).whole_days() > self.config.max_age_days {
            return Decision::Skip(SkipReason::TooOld);
        }

        if state.times_announced >= policy.max_repeat_count {
            return Decision::Skip(SkipReason::BudgetExhausted);
        }

        if let Some(last) = state.last_announced_at {
            let due_at = last + Duration::hours(policy.min_hours_between_repeats);
            if now < due_at {
                return Decision::Skip(SkipReason::NotYetDue { due_at });
            }
        }

        Decision::Announce {
            attach_hashtag: self.attach_hashtag(article),
        }
    }

    /// The special hashtag rides along when the article carries any
    /// configured special tag.
    fn attach_hashtag(&self, article: &Article) -> bool {
        let tags = article.matching_tags();
        self.config
            .special_tags
            .iter()
            .any(|tag| tags.contains(tag.as_str()))
    }
}
