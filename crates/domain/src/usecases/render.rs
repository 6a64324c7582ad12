//! Rendering use case - turns an announce decision into channel message text
//!
//! Message formatting is deliberately dumb string templating; the only
//! decision the core makes is whether the special hashtag rides along.

use crate::model::Article;
use crate::scheduler::ChannelPolicy;

/// Renderer for outbound announcement messages
pub struct Renderer {
    hashtag: String,
}

impl Renderer {
    pub fn new(hashtag: impl Into<String>) -> Self {
        Self {
            hashtag: hashtag.into(),
        }
    }

    /// Render the announcement text for one channel.
    ///
    /// The separator tracks how many times the article has already gone
    /// out (`-` for a first announcement, then `:` after odd counts and
    /// `|` after even), so repeat posts are not byte-identical.
    pub fn render(
        &self,
        article: &Article,
        author: &str,
        times_announced: u32,
        policy: &ChannelPolicy,
        attach_hashtag: bool,
    ) -> String {
        let separator = match times_announced {
            0 => "-",
            n if n % 2 == 1 => ":",
            _ => "|",
        };

        let title = truncate_title(&article.title, policy.max_title_chars);
        let mut message = format!(
            "{} {} {} {} {}",
            title, separator, author, separator, article.url
        );

        if attach_hashtag && !self.hashtag.is_empty() {
            message.push(' ');
            message.push_str(&self.hashtag);
        }

        message
    }
}

fn truncate_title(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        return title.to_string();
    }
    let truncated: String = title.chars().take(max_chars).collect();
    format!("{}...", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn sample_article(title: &str) -> Article {
        Article {
            guid: "guid-1".to_string(),
            title: title.to_string(),
            url: "https://example.org/post".to_string(),
            author: None,
            categories: vec![],
            categories_normalised: None,
            publication_id: None,
            published_at: OffsetDateTime::UNIX_EPOCH,
            first_seen_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn policy(max_title_chars: usize) -> ChannelPolicy {
        ChannelPolicy {
            name: "mastodon".to_string(),
            min_hours_between_repeats: 18,
            max_repeat_count: 2,
            max_title_chars,
        }
    }

    #[test]
    fn first_announcement_uses_dash_separator() {
        let renderer = Renderer::new("#BlogClub");
        let message = renderer.render(&sample_article("A Post"), "An Author", 0, &policy(300), false);
        assert_eq!(message, "A Post - An Author - https://example.org/post");
    }

    #[test]
    fn separator_alternates_with_announcement_count() {
        let renderer = Renderer::new("#BlogClub");
        let article = sample_article("A Post");

        let second = renderer.render(&article, "An Author", 1, &policy(300), false);
        assert!(second.contains(" : "));

        let third = renderer.render(&article, "An Author", 2, &policy(300), false);
        assert!(third.contains(" | "));
    }

    #[test]
    fn hashtag_appended_when_attached() {
        let renderer = Renderer::new("#BlogClub");
        let article = sample_article("A Post");

        let with = renderer.render(&article, "An Author", 0, &policy(300), true);
        assert!(with.ends_with(" #BlogClub"));

        let without = renderer.render(&article, "An Author", 0, &policy(300), false);
        assert!(!without.contains("#BlogClub"));
    }

    #[test]
    fn long_titles_are_truncated_with_ellipsis() {
        let renderer = Renderer::new("");
        let article = sample_article(&"x".repeat(200));

        let message = renderer.render(&article, "An Author", 0, &policy(150), false);
        assert!(message.starts_with(&format!("{}...", "x".repeat(150))));

        let untouched = renderer.render(&article, "An Author", 0, &policy(300), false);
        assert!(!untouched.contains("..."));
    }

    #[test]
    fn truncation_respects_character_boundaries() {
        let renderer = Renderer::new("");
        let article = sample_article(&"é".repeat(200));
        let message = renderer.render(&article, "An Author", 0, &policy(150), false);
        assert!(message.starts_with(&format!("{}...", "é".repeat(150))));
    }
}
