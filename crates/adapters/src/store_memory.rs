//! In-memory article store for testing and offline runs

use async_trait::async_trait;
use herald_domain::{AnnouncementState, Article, ArticleStore, Publication, StoreError};
use std::collections::HashMap;
use std::sync::RwLock;
use time::OffsetDateTime;

/// In-memory store mirroring the SQLite semantics
pub struct InMemoryArticleStore {
    publications: RwLock<Vec<Publication>>,
    articles: RwLock<HashMap<String, Article>>,
    states: RwLock<HashMap<(String, String), AnnouncementState>>,
}

impl InMemoryArticleStore {
    pub fn new() -> Self {
        Self {
            publications: RwLock::new(Vec::new()),
            articles: RwLock::new(HashMap::new()),
            states: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_publications(publications: Vec<Publication>) -> Self {
        let store = Self::new();
        *store.publications.write().unwrap() = publications;
        store
    }

    pub fn add_publication(&self, publication: Publication) {
        self.publications.write().unwrap().push(publication);
    }
}

impl Default for InMemoryArticleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleStore for InMemoryArticleStore {
    async fn list_publications(&self) -> Result<Vec<Publication>, StoreError> {
        let publications = self
            .publications
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(publications.clone())
    }

    async fn find_article(&self, guid: &str) -> Result<Option<Article>, StoreError> {
        let articles = self
            .articles
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(articles.get(guid).cloned())
    }

    async fn upsert_article(&self, article: &Article) -> Result<Article, StoreError> {
        let mut articles = self
            .articles
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let stored = match articles.get(&article.guid) {
            // guid and first_seen_at never change on update
            Some(existing) => Article {
                first_seen_at: existing.first_seen_at,
                ..article.clone()
            },
            None => article.clone(),
        };

        articles.insert(stored.guid.clone(), stored.clone());
        Ok(stored)
    }

    async fn announcement_state(
        &self,
        guid: &str,
        channel: &str,
    ) -> Result<Option<AnnouncementState>, StoreError> {
        let states = self
            .states
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(states
            .get(&(guid.to_string(), channel.to_string()))
            .cloned())
    }

    async fn record_announcement(
        &self,
        guid: &str,
        channel: &str,
        at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut states = self
            .states
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let state = states
            .entry((guid.to_string(), channel.to_string()))
            .or_insert_with(|| AnnouncementState::fresh(guid, channel));

        // Same timestamp means the same logical announcement: no-op
        if state.last_announced_at != Some(at) {
            state.times_announced += 1;
            state.last_announced_at = Some(at);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;
    use uuid::Uuid;

    fn sample_article() -> Article {
        Article {
            guid: "guid-1".to_string(),
            title: "A Post".to_string(),
            url: "https://example.org/post".to_string(),
            author: None,
            categories: vec![],
            categories_normalised: None,
            publication_id: Some(Uuid::new_v4()),
            published_at: OffsetDateTime::now_utc(),
            first_seen_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn upsert_preserves_first_seen() {
        let store = InMemoryArticleStore::new();
        let article = sample_article();
        store.upsert_article(&article).await.unwrap();

        let mut updated = article.clone();
        updated.title = "Retitled".to_string();
        updated.first_seen_at = article.first_seen_at + Duration::hours(5);
        let stored = store.upsert_article(&updated).await.unwrap();

        assert_eq!(stored.title, "Retitled");
        assert_eq!(stored.first_seen_at, article.first_seen_at);
    }

    #[tokio::test]
    async fn record_announcement_matches_sqlite_semantics() {
        let store = InMemoryArticleStore::new();
        let at = OffsetDateTime::now_utc();

        store
            .record_announcement("guid-1", "mastodon", at)
            .await
            .unwrap();
        store
            .record_announcement("guid-1", "mastodon", at)
            .await
            .unwrap();
        store
            .record_announcement("guid-1", "mastodon", at + Duration::hours(18))
            .await
            .unwrap();

        let state = store
            .announcement_state("guid-1", "mastodon")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.times_announced, 2);
    }
}
