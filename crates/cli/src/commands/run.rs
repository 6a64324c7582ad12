//! Run command - poll feeds, ingest articles, and queue announcements

use anyhow::{Context, Result};
use herald_adapters::{
    feed::HttpFeedSource,
    outbox::{OutboxQueue, OutboxWriter},
    store::SqliteArticleStore,
};
use herald_domain::{
    ChannelPolicy, SchedulerConfig, SystemClock,
    usecases::{ChannelSink, CycleReport, IngestConfig, IngestLoop},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use crate::args::RunArgs;
use crate::config::{AppConfig, ChannelConfig};

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    config.validate(args.dry_run)?;

    let enabled: Vec<&ChannelConfig> = config.channels.iter().filter(|c| c.enabled).collect();
    if enabled.is_empty() {
        tracing::warn!("No channels enabled; articles will be ingested but never announced");
    }

    tracing::info!(
        dry_run = args.dry_run,
        once = args.once,
        channels = ?enabled.iter().map(|c| &c.name).collect::<Vec<_>>(),
        state_db = %config.general.state_db_path.display(),
        "Starting herald run"
    );

    // Build dependencies
    let store = Arc::new(
        SqliteArticleStore::new(&config.general.state_db_path)
            .await
            .context("Failed to initialize SQLite article store")?,
    );

    let feed_source = Arc::new(HttpFeedSource::default());

    let mut channels = Vec::with_capacity(enabled.len());
    for channel in &enabled {
        let path = config
            .general
            .outbox_dir
            .join(format!("{}.jsonl", channel.name));
        let writer = OutboxWriter::new(path)
            .await
            .with_context(|| format!("Failed to initialize outbox for '{}'", channel.name))?;

        channels.push(ChannelSink {
            policy: channel_policy(channel),
            queue: Arc::new(OutboxQueue::new(writer)),
        });
    }

    let ingest = IngestLoop::new(
        feed_source,
        store,
        channels,
        SchedulerConfig {
            max_age_days: config.ingest.max_days_age_of_articles_to_announce,
            special_tags: config.ingest.special_tags.iter().cloned().collect(),
        },
        Arc::new(SystemClock),
        IngestConfig {
            normalise_tags: config.ingest.normalise_tags,
            filtered_tags: config.ingest.filtered_tags.iter().cloned().collect(),
            hashtag: config.ingest.special_hashtag.clone(),
            max_concurrent_fetches: config.general.max_concurrent_fetches,
            dry_run: args.dry_run,
        },
    );

    // Execute
    if args.once {
        tracing::info!("Running single polling cycle");
        let report = ingest.poll_once().await?;
        log_report(&report);
    } else {
        // Continuous polling loop
        let poll_interval = Duration::from_secs(config.general.poll_interval_minutes * 60);
        let mut ticker = interval(poll_interval);

        // Set up graceful shutdown
        let shutdown = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
            tracing::info!("Shutdown signal received");
        };

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match ingest.poll_once().await {
                        Ok(report) => log_report(&report),
                        Err(e) => {
                            tracing::error!(error = %e, "Polling cycle failed");
                        }
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("Shutting down gracefully");
                    break;
                }
            }
        }
    }

    tracing::info!("herald run completed");
    Ok(())
}

fn channel_policy(channel: &ChannelConfig) -> ChannelPolicy {
    ChannelPolicy {
        name: channel.name.clone(),
        min_hours_between_repeats: channel.min_hours_between_repeats,
        max_repeat_count: channel.max_repeat_count,
        max_title_chars: channel.max_title_chars,
    }
}

fn log_report(report: &CycleReport) {
    tracing::info!(
        announced = report.announced,
        announcements = report.announcements,
        stored = report.stored,
        filtered = report.filtered,
        missing_date = report.missing_date,
        failed = report.failed,
        failed_feeds = report.failed_feeds,
        "Polling cycle complete"
    );
}
