//! Filter engine: excludes articles that carry every filtered tag

use std::collections::BTreeSet;

use crate::model::Article;

/// True when the article is excluded from announcement entirely.
///
/// An article is excluded iff the configured filtered-tag set is non-empty
/// and every filtered tag is present on the article (subset match, not
/// any-match). With a single filtered tag this degenerates to "contains
/// that tag". An empty configured set excludes nothing; the literal subset
/// rule would exclude every article.
///
/// Filtered articles are still persisted so they are not re-processed from
/// scratch every cycle; they are just never scheduled.
pub fn is_filtered(article: &Article, filtered_tags: &BTreeSet<String>) -> bool {
    if filtered_tags.is_empty() {
        return false;
    }
    let tags = article.matching_tags();
    filtered_tags.iter().all(|tag| tags.contains(tag.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn article_with_tags(tags: &[&str]) -> Article {
        Article {
            guid: "guid-1".to_string(),
            title: "Title".to_string(),
            url: "https://example.org/post".to_string(),
            author: None,
            categories: tags.iter().map(|t| t.to_string()).collect(),
            categories_normalised: Some(tags.iter().map(|t| t.to_string()).collect()),
            publication_id: None,
            published_at: OffsetDateTime::UNIX_EPOCH,
            first_seen_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn filtered(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn excluded_when_filtered_tag_present() {
        let article = article_with_tags(&["rockpool", "notrockpool"]);
        assert!(is_filtered(&article, &filtered(&["notrockpool"])));
    }

    #[test]
    fn not_excluded_without_filtered_tag() {
        let article = article_with_tags(&["rockpool"]);
        assert!(!is_filtered(&article, &filtered(&["notrockpool"])));
    }

    #[test]
    fn requires_every_filtered_tag() {
        let article = article_with_tags(&["private", "rockpool"]);
        assert!(!is_filtered(&article, &filtered(&["private", "draft"])));

        let article = article_with_tags(&["private", "draft", "rockpool"]);
        assert!(is_filtered(&article, &filtered(&["private", "draft"])));
    }

    #[test]
    fn empty_filter_set_excludes_nothing() {
        let article = article_with_tags(&["rockpool"]);
        assert!(!is_filtered(&article, &BTreeSet::new()));

        let untagged = article_with_tags(&[]);
        assert!(!is_filtered(&untagged, &BTreeSet::new()));
    }

    #[test]
    fn raw_categories_used_when_normalization_disabled() {
        let mut article = article_with_tags(&["notrockpool"]);
        article.categories_normalised = None;
        assert!(is_filtered(&article, &filtered(&["notrockpool"])));
    }
}
