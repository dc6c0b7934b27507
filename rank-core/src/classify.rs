//! Competition tagging.
//!
//! Keyword matching is a plain case-insensitive substring test over the title.
//! It is not tokenized, so short keywords also hit unrelated words ("AI" in
//! "maintain"). That imprecision is accepted: the keyword list is the only
//! statement of intent there is.

use serde::{Deserialize, Serialize};

use crate::config::CompetitionConfig;
use crate::feed::Post;

/// Identifies "our" post within a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedPostLocator {
    /// Fragment of the tracked post's `uri` or `id`.
    pub key: String,
    /// Case-insensitive title fragment. Breaks as soon as the title is edited,
    /// so it is only consulted when `key` matches nothing.
    pub title_pattern: Option<String>,
}

impl TrackedPostLocator {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title_pattern: None,
        }
    }

    pub fn with_title_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.title_pattern = Some(pattern.into());
        self
    }

    /// True when the post's `id` or `uri` contains the key, or is contained in it.
    pub fn matches_key(&self, post: &Post) -> bool {
        if self.key.is_empty() {
            return false;
        }
        [post.id.as_str(), post.uri.as_str()]
            .into_iter()
            .filter(|candidate| !candidate.is_empty())
            .any(|candidate| candidate.contains(&self.key) || self.key.contains(candidate))
    }

    pub fn matches_title(&self, post: &Post) -> bool {
        match &self.title_pattern {
            Some(pattern) if !pattern.is_empty() => post
                .title
                .to_lowercase()
                .contains(&pattern.to_lowercase()),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompetitionClassifier {
    locator: TrackedPostLocator,
    keywords: Vec<String>,
}

impl CompetitionClassifier {
    pub fn new<I, S>(locator: TrackedPostLocator, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|kw| kw.as_ref().trim().to_lowercase())
            .filter(|kw| !kw.is_empty())
            .collect();
        Self { locator, keywords }
    }

    pub fn from_config(config: &CompetitionConfig) -> Self {
        let mut locator = TrackedPostLocator::new(config.tracked_locator.clone());
        if let Some(pattern) = &config.tracked_title_pattern {
            locator = locator.with_title_pattern(pattern.clone());
        }
        Self::new(locator, &config.keywords)
    }

    pub fn locator(&self) -> &TrackedPostLocator {
        &self.locator
    }

    pub fn is_competition(&self, post: &Post) -> bool {
        if self.locator.matches_key(post) {
            return true;
        }
        let title = post.title.to_lowercase();
        self.keywords.iter().any(|kw| title.contains(kw.as_str()))
    }

    /// Recomputes the flag on every post; safe to repeat after keyword changes.
    pub fn tag_all(&self, posts: &mut [Post]) {
        for post in posts {
            post.is_competition = self.is_competition(post);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Post;
    use serde_json::json;

    fn post(id: &str, uri: &str, title: &str) -> Post {
        Post::from_raw(
            &json!({ "contentId": id, "uri": uri, "title": title }),
            "post",
            "https://example.com",
        )
        .unwrap()
    }

    fn classifier() -> CompetitionClassifier {
        CompetitionClassifier::new(
            TrackedPostLocator::new("/content/X123/my-entry"),
            ["AIdeas", "wellness", "  "],
        )
    }

    #[test]
    fn locator_matches_in_either_direction() {
        let c = classifier();
        // id contained in the locator
        assert!(c.is_competition(&post("X123", "", "unrelated")));
        // locator contained in the uri
        assert!(c.is_competition(&post("zzz", "/content/X123/my-entry?ref=feed", "unrelated")));
        assert!(!c.is_competition(&post("Y999", "/content/Y999/other", "unrelated")));
    }

    #[test]
    fn keywords_are_case_insensitive_substrings() {
        let c = classifier();
        assert!(c.is_competition(&post("a", "", "My AIDEAS submission")));
        assert!(c.is_competition(&post("b", "", "Corporate Wellness tips")));
        assert!(!c.is_competition(&post("c", "", "Serverless on a budget")));
    }

    #[test]
    fn substring_matching_has_false_positives() {
        let c = CompetitionClassifier::new(TrackedPostLocator::default(), ["AI"]);
        assert!(c.is_competition(&post("a", "", "How to maintain Lambda layers")));
    }

    #[test]
    fn empty_locator_and_empty_fields_never_match() {
        let c = CompetitionClassifier::new(TrackedPostLocator::default(), Vec::<String>::new());
        assert!(!c.is_competition(&post("", "", "anything")));

        let c = classifier();
        let mut p = post("", "", "nothing");
        p.id.clear();
        assert!(!c.is_competition(&p));
    }

    #[test]
    fn classification_is_idempotent() {
        let c = classifier();
        let mut posts = vec![post("X123", "", "x"), post("q", "", "wellness"), post("r", "", "plain")];
        c.tag_all(&mut posts);
        let first: Vec<bool> = posts.iter().map(|p| p.is_competition).collect();
        c.tag_all(&mut posts);
        let second: Vec<bool> = posts.iter().map(|p| p.is_competition).collect();

        assert_eq!(first, vec![true, true, false]);
        assert_eq!(first, second);
    }

    #[test]
    fn title_pattern_is_separate_from_key() {
        let locator = TrackedPostLocator::new("nomatch").with_title_pattern("My Entry");
        let p = post("a", "", "my entry: the sequel");
        assert!(!locator.matches_key(&p));
        assert!(locator.matches_title(&p));
    }
}
