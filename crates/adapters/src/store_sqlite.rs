//! SQLite article store implementation

use async_trait::async_trait;
use herald_domain::{AnnouncementState, Article, ArticleStore, Publication, StoreError};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use time::OffsetDateTime;
use uuid::Uuid;

/// SQLite-backed article and announcement-state store
pub struct SqliteArticleStore {
    pool: SqlitePool,
}

impl SqliteArticleStore {
    /// Create a new store, initializing the database if needed
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Database(format!("Failed to create directory: {}", e)))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS publications (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                feed_url TEXT NOT NULL UNIQUE,
                default_author TEXT,
                channel_handles TEXT NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                guid TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                author TEXT,
                categories TEXT NOT NULL,
                categories_normalised TEXT,
                publication_id TEXT,
                published_at TEXT NOT NULL,
                first_seen_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS announcement_state (
                guid TEXT NOT NULL,
                channel TEXT NOT NULL,
                times_announced INTEGER NOT NULL DEFAULT 0,
                last_announced_at TEXT,
                PRIMARY KEY (guid, channel)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    /// Seed or refresh a publication row. Publications are owned by the
    /// persistence layer; the ingest core only ever reads them.
    pub async fn insert_publication(&self, publication: &Publication) -> Result<(), StoreError> {
        let channel_handles = serde_json::to_string(&publication.channel_handles)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO publications (id, title, feed_url, default_author, channel_handles)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                feed_url = excluded.feed_url,
                default_author = excluded.default_author,
                channel_handles = excluded.channel_handles
            "#,
        )
        .bind(publication.id.to_string())
        .bind(&publication.title)
        .bind(&publication.feed_url)
        .bind(&publication.default_author)
        .bind(&channel_handles)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

type ArticleRow = (
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    String,
    String,
);

fn article_from_row(row: ArticleRow) -> Result<Article, StoreError> {
    let (
        guid,
        title,
        url,
        author,
        categories,
        categories_normalised,
        publication_id,
        published_at,
        first_seen_at,
    ) = row;

    let categories: Vec<String> = serde_json::from_str(&categories)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    let categories_normalised: Option<BTreeSet<String>> = categories_normalised
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    let publication_id = publication_id
        .map(|raw| Uuid::parse_str(&raw))
        .transpose()
        .map_err(|e| StoreError::Serialization(e.to_string()))?;

    Ok(Article {
        guid,
        title,
        url,
        author,
        categories,
        categories_normalised,
        publication_id,
        published_at: parse_timestamp(&published_at)?,
        first_seen_at: parse_timestamp(&first_seen_at)?,
    })
}

fn format_timestamp(value: OffsetDateTime) -> Result<String, StoreError> {
    value
        .format(&time::format_description::well_known::Rfc3339)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::parse(raw, &time::format_description::well_known::Rfc3339)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl ArticleStore for SqliteArticleStore {
    async fn list_publications(&self) -> Result<Vec<Publication>, StoreError> {
        let rows: Vec<(String, String, String, Option<String>, String)> = sqlx::query_as(
            "SELECT id, title, feed_url, default_author, channel_handles FROM publications ORDER BY title",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|(id, title, feed_url, default_author, channel_handles)| {
                let id = Uuid::parse_str(&id)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                let channel_handles: BTreeMap<String, String> =
                    serde_json::from_str(&channel_handles)
                        .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Publication {
                    id,
                    title,
                    feed_url,
                    default_author,
                    channel_handles,
                })
            })
            .collect()
    }

    async fn find_article(&self, guid: &str) -> Result<Option<Article>, StoreError> {
        let row: Option<ArticleRow> = sqlx::query_as(
            r#"
            SELECT guid, title, url, author, categories, categories_normalised,
                   publication_id, published_at, first_seen_at
            FROM articles WHERE guid = ?
            "#,
        )
        .bind(guid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        row.map(article_from_row).transpose()
    }

    async fn upsert_article(&self, article: &Article) -> Result<Article, StoreError> {
        let categories = serde_json::to_string(&article.categories)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let categories_normalised = article
            .categories_normalised
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        // Mutable fields refresh on every sighting; guid and first_seen_at
        // are fixed at insert time.
        sqlx::query(
            r#"
            INSERT INTO articles
            (guid, title, url, author, categories, categories_normalised,
             publication_id, published_at, first_seen_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(guid) DO UPDATE SET
                title = excluded.title,
                url = excluded.url,
                author = excluded.author,
                categories = excluded.categories,
                categories_normalised = excluded.categories_normalised,
                publication_id = COALESCE(excluded.publication_id, articles.publication_id),
                published_at = excluded.published_at
            "#,
        )
        .bind(&article.guid)
        .bind(&article.title)
        .bind(&article.url)
        .bind(&article.author)
        .bind(&categories)
        .bind(&categories_normalised)
        .bind(article.publication_id.map(|id| id.to_string()))
        .bind(format_timestamp(article.published_at)?)
        .bind(format_timestamp(article.first_seen_at)?)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        self.find_article(&article.guid)
            .await?
            .ok_or_else(|| StoreError::Database("upserted article vanished".to_string()))
    }

    async fn announcement_state(
        &self,
        guid: &str,
        channel: &str,
    ) -> Result<Option<AnnouncementState>, StoreError> {
        let row: Option<(String, String, i64, Option<String>)> = sqlx::query_as(
            r#"
            SELECT guid, channel, times_announced, last_announced_at
            FROM announcement_state WHERE guid = ? AND channel = ?
            "#,
        )
        .bind(guid)
        .bind(channel)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        match row {
            Some((guid, channel, times_announced, last_announced_at)) => {
                Ok(Some(AnnouncementState {
                    guid,
                    channel,
                    times_announced: times_announced as u32,
                    last_announced_at: last_announced_at
                        .as_deref()
                        .map(parse_timestamp)
                        .transpose()?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn record_announcement(
        &self,
        guid: &str,
        channel: &str,
        at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        // The guarded update makes a repeat call with the same timestamp a
        // no-op, so one logical announcement is never counted twice.
        sqlx::query(
            r#"
            INSERT INTO announcement_state (guid, channel, times_announced, last_announced_at)
            VALUES (?, ?, 1, ?)
            ON CONFLICT(guid, channel) DO UPDATE SET
                times_announced = announcement_state.times_announced + 1,
                last_announced_at = excluded.last_announced_at
            WHERE announcement_state.last_announced_at IS NOT excluded.last_announced_at
            "#,
        )
        .bind(guid)
        .bind(channel)
        .bind(format_timestamp(at)?)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn sample_article() -> Article {
        Article {
            guid: "tag:example.org,2026:post-1".to_string(),
            title: "Rock Pools Revisited".to_string(),
            url: "https://example.org/rock-pools-revisited".to_string(),
            author: Some("An Author".to_string()),
            categories: vec!["Rock-Pool!".to_string()],
            categories_normalised: Some(["rockpool".to_string()].into_iter().collect()),
            publication_id: Some(Uuid::new_v4()),
            published_at: OffsetDateTime::now_utc() - Duration::hours(1),
            first_seen_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = SqliteArticleStore::in_memory().await.unwrap();
        let article = sample_article();

        let first = store.upsert_article(&article).await.unwrap();
        let second = store.upsert_article(&article).await.unwrap();

        assert_eq!(first, second);

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn upsert_refreshes_mutable_fields_only() {
        let store = SqliteArticleStore::in_memory().await.unwrap();
        let article = sample_article();
        store.upsert_article(&article).await.unwrap();

        let mut updated = article.clone();
        updated.title = "Rock Pools, Retitled".to_string();
        updated.author = None;
        // A later sighting carries a later first-seen candidate, which must
        // not displace the original
        updated.first_seen_at = article.first_seen_at + Duration::hours(5);
        let stored = store.upsert_article(&updated).await.unwrap();

        assert_eq!(stored.guid, article.guid);
        assert_eq!(stored.title, "Rock Pools, Retitled");
        assert_eq!(stored.author, None);
        assert_eq!(stored.first_seen_at, article.first_seen_at);
    }

    #[tokio::test]
    async fn announcement_state_starts_absent_and_increments() {
        let store = SqliteArticleStore::in_memory().await.unwrap();

        let state = store
            .announcement_state("guid-1", "mastodon")
            .await
            .unwrap();
        assert!(state.is_none());

        let t1 = OffsetDateTime::now_utc().replace_nanosecond(0).unwrap();
        store
            .record_announcement("guid-1", "mastodon", t1)
            .await
            .unwrap();

        let state = store
            .announcement_state("guid-1", "mastodon")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.times_announced, 1);
        assert_eq!(state.last_announced_at, Some(t1));

        let t2 = t1 + Duration::hours(18);
        store
            .record_announcement("guid-1", "mastodon", t2)
            .await
            .unwrap();

        let state = store
            .announcement_state("guid-1", "mastodon")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.times_announced, 2);
        assert_eq!(state.last_announced_at, Some(t2));
    }

    #[tokio::test]
    async fn repeat_record_with_same_timestamp_does_not_double_count() {
        let store = SqliteArticleStore::in_memory().await.unwrap();

        let at = OffsetDateTime::now_utc().replace_nanosecond(0).unwrap();
        store
            .record_announcement("guid-1", "mastodon", at)
            .await
            .unwrap();
        store
            .record_announcement("guid-1", "mastodon", at)
            .await
            .unwrap();

        let state = store
            .announcement_state("guid-1", "mastodon")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.times_announced, 1);
    }

    #[tokio::test]
    async fn channels_are_tracked_independently() {
        let store = SqliteArticleStore::in_memory().await.unwrap();

        let at = OffsetDateTime::now_utc().replace_nanosecond(0).unwrap();
        store
            .record_announcement("guid-1", "mastodon", at)
            .await
            .unwrap();

        assert!(store
            .announcement_state("guid-1", "bluesky")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn publication_roundtrip() {
        let store = SqliteArticleStore::in_memory().await.unwrap();

        let publication = Publication {
            id: Uuid::new_v4(),
            title: "Example Blog".to_string(),
            feed_url: "https://example.org/feed.xml".to_string(),
            default_author: Some("Default Author".to_string()),
            channel_handles: [("mastodon".to_string(), "@example@example.social".to_string())]
                .into_iter()
                .collect(),
        };

        store.insert_publication(&publication).await.unwrap();
        let listed = store.list_publications().await.unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, publication.id);
        assert_eq!(
            listed[0].channel_handles.get("mastodon").map(String::as_str),
            Some("@example@example.social")
        );
    }
}
