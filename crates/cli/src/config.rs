//! Configuration loading and management

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Top-level configuration, loaded once at startup and immutable after
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub ingest: IngestSettings,

    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_state_db_path")]
    pub state_db_path: PathBuf,

    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_minutes: u64,

    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSettings {
    /// Articles older than this are ingested but never announced
    #[serde(default = "default_max_days_age")]
    pub max_days_age_of_articles_to_announce: i64,

    #[serde(default = "default_true")]
    pub normalise_tags: bool,

    /// Articles carrying every one of these tags are excluded
    #[serde(default)]
    pub filtered_tags: Vec<String>,

    /// Tags that trigger the special hashtag
    #[serde(default)]
    pub special_tags: Vec<String>,

    #[serde(default)]
    pub special_hashtag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_min_hours_between_repeats")]
    pub min_hours_between_repeats: i64,

    #[serde(default = "default_max_repeat_count")]
    pub max_repeat_count: u32,

    #[serde(default = "default_max_title_chars")]
    pub max_title_chars: usize,

    /// Env var holding the delivery collaborator's credential for this
    /// channel; checked for presence at startup, never read beyond that
    #[serde(default)]
    pub access_token_env: String,
}

// Default value functions
fn default_state_db_path() -> PathBuf {
    PathBuf::from("./herald.sqlite")
}

fn default_outbox_dir() -> PathBuf {
    PathBuf::from("./outbox")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval() -> u64 {
    60
}

fn default_max_concurrent_fetches() -> usize {
    4
}

fn default_max_days_age() -> i64 {
    7
}

fn default_true() -> bool {
    true
}

fn default_min_hours_between_repeats() -> i64 {
    18
}

fn default_max_repeat_count() -> u32 {
    2
}

fn default_max_title_chars() -> usize {
    300
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            state_db_path: default_state_db_path(),
            outbox_dir: default_outbox_dir(),
            log_level: default_log_level(),
            poll_interval_minutes: default_poll_interval(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
        }
    }
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            max_days_age_of_articles_to_announce: default_max_days_age(),
            normalise_tags: default_true(),
            filtered_tags: vec![],
            special_tags: vec![],
            special_hashtag: String::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("HERALD")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate the configuration before the first polling cycle.
    ///
    /// Failures here are fatal by design: a misconfigured process must not
    /// start announcing. Credential presence is skipped in dry-run since
    /// nothing will be delivered.
    pub fn validate(&self, dry_run: bool) -> Result<()> {
        if self.general.poll_interval_minutes == 0 {
            bail!("poll_interval_minutes must be at least 1");
        }

        let mut seen = HashSet::new();
        for channel in &self.channels {
            if channel.name.trim().is_empty() {
                bail!("Channel with empty name in configuration");
            }
            if !seen.insert(channel.name.as_str()) {
                bail!("Duplicate channel name: {}", channel.name);
            }
        }

        for channel in self.channels.iter().filter(|c| c.enabled) {
            if channel.access_token_env.is_empty() {
                bail!(
                    "Channel '{}' is enabled but has no access_token_env configured",
                    channel.name
                );
            }
            if !dry_run && std::env::var(&channel.access_token_env).is_err() {
                bail!(
                    "Channel '{}' is enabled but credentials are missing: {} is not set",
                    channel.name,
                    channel.access_token_env
                );
            }
        }

        if !self.ingest.special_tags.is_empty() && self.ingest.special_hashtag.is_empty() {
            bail!("special_tags configured without a special_hashtag");
        }

        Ok(())
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r##"# herald configuration

[general]
state_db_path = "./herald.sqlite"
outbox_dir = "./outbox"
log_level = "info"
# Fetching every feed takes a while; keep this at 15 minutes or more
poll_interval_minutes = 60
max_concurrent_fetches = 4

[ingest]
max_days_age_of_articles_to_announce = 7
normalise_tags = true
# Tags are matched in normalized form: lowercase alphanumeric only.
# An article is excluded only when it carries EVERY filtered tag.
filtered_tags = ["nobot"]
# Articles carrying any special tag get the hashtag appended
special_tags = ["blogclub"]
special_hashtag = "#BlogClub"

[[channels]]
name = "mastodon"
enabled = false
min_hours_between_repeats = 18
max_repeat_count = 2
max_title_chars = 300
access_token_env = "MASTODON_ACCESS_TOKEN"

[[channels]]
name = "bluesky"
enabled = false
min_hours_between_repeats = 10
max_repeat_count = 3
max_title_chars = 150
access_token_env = "BLUESKY_ACCESS_TOKEN"
"##
        .to_string()
    }
}
