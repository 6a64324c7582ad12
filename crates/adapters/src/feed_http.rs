//! HTTP feed source adapter: fetches and parses RSS/Atom feeds

use async_trait::async_trait;
use herald_domain::{FeedEntry, FeedError, FeedSource};
use reqwest::Client;
use std::time::Duration;
use time::OffsetDateTime;

/// Feed source backed by reqwest and feed-rs.
///
/// Fetching is best-effort per feed: the ingest loop isolates failures to
/// the owning publication, so no retry policy lives here.
pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }
}

impl Default for HttpFeedSource {
    fn default() -> Self {
        Self::new(
            concat!("herald/", env!("CARGO_PKG_VERSION")),
            Duration::from_secs(30),
        )
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch_entries(&self, feed_url: &str) -> Result<Vec<FeedEntry>, FeedError> {
        tracing::debug!(feed_url = %feed_url, "Fetching feed");

        let response = self
            .client
            .get(feed_url)
            .send()
            .await
            .map_err(|e| FeedError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FeedError::Status(response.status().as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FeedError::Network(e.to_string()))?;

        let feed =
            feed_rs::parser::parse(body.as_ref()).map_err(|e| FeedError::Parse(e.to_string()))?;

        Ok(feed.entries.into_iter().map(map_entry).collect())
    }
}

/// Map a parsed entry onto the domain's explicit-optional shape.
fn map_entry(entry: feed_rs::model::Entry) -> FeedEntry {
    let url = entry
        .links
        .first()
        .map(|link| link.href.clone())
        .unwrap_or_default();

    FeedEntry {
        id: Some(entry.id).filter(|id| !id.is_empty()),
        title: entry.title.map(|t| t.content).unwrap_or_default(),
        url,
        author: entry
            .authors
            .into_iter()
            .map(|person| person.name)
            .find(|name| !name.is_empty()),
        categories: entry.categories.into_iter().map(|c| c.term).collect(),
        published_at: entry.published.and_then(to_offset_datetime),
    }
}

// feed-rs hands back chrono timestamps; everything downstream uses `time`.
fn to_offset_datetime(value: chrono::DateTime<chrono::Utc>) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(value.timestamp()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Example Blog</title>
    <link>https://example.org</link>
    <description>An example feed</description>
    <item>
      <guid>tag:example.org,2026:post-1</guid>
      <title>Rock Pools Revisited</title>
      <link>https://example.org/rock-pools-revisited</link>
      <dc:creator>An Author</dc:creator>
      <category>Rock-Pool!</category>
      <category>GLAM Blog Club</category>
      <pubDate>Mon, 06 Jul 2026 10:30:00 GMT</pubDate>
    </item>
    <item>
      <title>An Undated Page</title>
      <link>https://example.org/about</link>
    </item>
  </channel>
</rss>"#;

    #[tokio::test]
    async fn fetches_and_maps_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(RSS_FIXTURE, "application/rss+xml"),
            )
            .mount(&server)
            .await;

        let source = HttpFeedSource::default();
        let entries = source
            .fetch_entries(&format!("{}/feed.xml", server.uri()))
            .await
            .unwrap();

        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.id.as_deref(), Some("tag:example.org,2026:post-1"));
        assert_eq!(first.title, "Rock Pools Revisited");
        assert_eq!(first.url, "https://example.org/rock-pools-revisited");
        assert_eq!(first.author.as_deref(), Some("An Author"));
        assert_eq!(
            first.categories,
            vec!["Rock-Pool!".to_string(), "GLAM Blog Club".to_string()]
        );
        let published = first.published_at.expect("pubDate parsed");
        assert_eq!(published.year(), 2026);

        // The second item has no pubDate; the ingest loop decides what to
        // do with that, not the adapter
        let second = &entries[1];
        assert_eq!(second.title, "An Undated Page");
        assert!(second.published_at.is_none());
    }

    #[tokio::test]
    async fn http_error_surfaces_as_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = HttpFeedSource::default();
        let result = source
            .fetch_entries(&format!("{}/feed.xml", server.uri()))
            .await;

        assert!(matches!(result, Err(FeedError::Status(500))));
    }

    #[tokio::test]
    async fn garbage_body_surfaces_as_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not a feed"))
            .mount(&server)
            .await;

        let source = HttpFeedSource::default();
        let result = source
            .fetch_entries(&format!("{}/feed.xml", server.uri()))
            .await;

        assert!(matches!(result, Err(FeedError::Parse(_))));
    }
}
