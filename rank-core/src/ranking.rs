use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::{CompetitionClassifier, TrackedPostLocator};
use crate::feed::Post;

/// One complete ranking. `posts[i]` holds rank `i + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub scraped_at: Option<DateTime<Utc>>,
    pub posts: Vec<Post>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// A post paired with its rank, as handed to presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPost {
    pub rank: usize,
    #[serde(flatten)]
    pub post: Post,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedPosition {
    pub rank: usize,
    pub total: usize,
    /// `rank / total` as a percentage; smaller is better ("top 4.2%").
    pub percentile: f64,
    pub post: Post,
    pub neighbor_above: Option<RankedPost>,
    pub neighbor_below: Option<RankedPost>,
    pub likes_to_climb: u64,
    /// Rank among competition-tagged posts, if the tracked post is tagged.
    pub competition_rank: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SnapshotStats {
    pub total_posts: usize,
    pub total_likes: u64,
    pub average_likes: f64,
    pub max_likes: u64,
    pub competition_posts: usize,
    pub posts_with_20_plus_likes: usize,
    pub posts_with_50_plus_likes: usize,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            scraped_at: None,
            posts: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn ranked(&self) -> impl Iterator<Item = RankedPost> + '_ {
        self.posts.iter().enumerate().map(|(idx, post)| RankedPost {
            rank: idx + 1,
            post: post.clone(),
        })
    }

    /// Re-applies the classifier, e.g. after loading a snapshot written under older keywords.
    pub fn reclassify(&mut self, classifier: &CompetitionClassifier) {
        classifier.tag_all(&mut self.posts);
    }

    pub fn stats(&self) -> SnapshotStats {
        let total_posts = self.posts.len();
        let total_likes: u64 = self.posts.iter().map(|p| p.likes_count).sum();
        let average_likes = if total_posts == 0 {
            0.0
        } else {
            round_one_decimal(total_likes as f64 / total_posts as f64)
        };
        let count_at_least = |n: u64| self.posts.iter().filter(|p| p.likes_count >= n).count();

        SnapshotStats {
            total_posts,
            total_likes,
            average_likes,
            max_likes: self.posts.iter().map(|p| p.likes_count).max().unwrap_or(0),
            competition_posts: self.posts.iter().filter(|p| p.is_competition).count(),
            posts_with_20_plus_likes: count_at_least(20),
            posts_with_50_plus_likes: count_at_least(50),
        }
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Sorts by likes (descending, stable) and drops repeated ids, first occurrence wins.
pub fn build_snapshot(mut posts: Vec<Post>, scraped_at: DateTime<Utc>) -> Snapshot {
    posts.sort_by(|a, b| b.likes_count.cmp(&a.likes_count));

    let mut seen: HashSet<String> = HashSet::with_capacity(posts.len());
    posts.retain(|p| seen.insert(p.id.clone()));

    Snapshot {
        scraped_at: Some(scraped_at),
        posts,
    }
}

/// Locates the tracked post by `id`/`uri`, falling back to the title pattern.
pub fn find_tracked(snapshot: &Snapshot, locator: &TrackedPostLocator) -> Option<TrackedPosition> {
    let posts = &snapshot.posts;
    let idx = posts
        .iter()
        .position(|p| locator.matches_key(p))
        .or_else(|| posts.iter().position(|p| locator.matches_title(p)))?;

    let post = &posts[idx];
    let rank = idx + 1;
    let neighbor_above = idx.checked_sub(1).map(|i| RankedPost {
        rank: i + 1,
        post: posts[i].clone(),
    });
    let neighbor_below = posts.get(idx + 1).map(|p| RankedPost {
        rank: idx + 2,
        post: p.clone(),
    });
    let likes_to_climb = neighbor_above
        .as_ref()
        .map(|above| above.post.likes_count.saturating_sub(post.likes_count) + 1)
        .unwrap_or(0);
    let competition_rank = post.is_competition.then(|| {
        posts[..=idx].iter().filter(|p| p.is_competition).count()
    });

    Some(TrackedPosition {
        rank,
        total: posts.len(),
        percentile: round_one_decimal(rank as f64 / posts.len() as f64 * 100.0),
        post: post.clone(),
        neighbor_above,
        neighbor_below,
        likes_to_climb,
        competition_rank,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post(id: &str, likes: u64) -> Post {
        Post::from_raw(
            &json!({ "contentId": id, "likesCount": likes, "title": format!("post {id}") }),
            "post",
            "https://example.com",
        )
        .unwrap()
    }

    fn ids(snapshot: &Snapshot) -> Vec<&str> {
        snapshot.posts.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn duplicates_removed_first_occurrence_kept() {
        let snapshot = build_snapshot(vec![post("a", 50), post("b", 90), post("a", 50)], Utc::now());

        assert_eq!(ids(&snapshot), vec!["b", "a"]);
        let ranked: Vec<(usize, u64)> = snapshot.ranked().map(|r| (r.rank, r.post.likes_count)).collect();
        assert_eq!(ranked, vec![(1, 90), (2, 50)]);
    }

    #[test]
    fn higher_ranked_duplicate_wins() {
        let snapshot = build_snapshot(vec![post("a", 10), post("b", 20), post("a", 30)], Utc::now());
        assert_eq!(ids(&snapshot), vec!["a", "b"]);
        assert_eq!(snapshot.posts[0].likes_count, 30);
    }

    #[test]
    fn ties_keep_input_order() {
        let snapshot = build_snapshot(
            vec![post("x", 5), post("y", 7), post("z", 5), post("w", 5)],
            Utc::now(),
        );
        assert_eq!(ids(&snapshot), vec!["y", "x", "z", "w"]);
    }

    #[test]
    fn output_is_unique_and_non_increasing() {
        let input: Vec<Post> = (0..200u64)
            .map(|i| post(&format!("p{}", i % 37), (i * 7919) % 101))
            .collect();
        let snapshot = build_snapshot(input, Utc::now());

        let unique: HashSet<&str> = snapshot.posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(unique.len(), snapshot.len());
        assert!(snapshot
            .posts
            .windows(2)
            .all(|w| w[0].likes_count >= w[1].likes_count));
    }

    #[test]
    fn likes_to_climb_counts_past_the_post_above() {
        let input = vec![
            post("r1", 80),
            post("r2", 60),
            post("r3", 40),
            post("r4", 35),
            post("X123", 30),
            post("r6", 10),
        ];
        let snapshot = build_snapshot(input, Utc::now());
        let tracked = find_tracked(&snapshot, &TrackedPostLocator::new("X123")).unwrap();

        assert_eq!(tracked.rank, 5);
        assert_eq!(tracked.likes_to_climb, 6);
        assert_eq!(tracked.neighbor_above.as_ref().map(|p| p.rank), Some(4));
        assert_eq!(tracked.neighbor_below.as_ref().map(|p| p.post.id.as_str()), Some("r6"));
        assert_eq!(tracked.total, 6);
        assert_eq!(tracked.percentile, 83.3);
    }

    #[test]
    fn rank_one_has_nothing_to_climb() {
        let snapshot = build_snapshot(vec![post("me", 99), post("other", 1)], Utc::now());
        let tracked = find_tracked(&snapshot, &TrackedPostLocator::new("me")).unwrap();

        assert_eq!(tracked.rank, 1);
        assert_eq!(tracked.likes_to_climb, 0);
        assert!(tracked.neighbor_above.is_none());
    }

    #[test]
    fn tie_with_post_above_needs_one_like() {
        let snapshot = build_snapshot(vec![post("a", 10), post("me", 10)], Utc::now());
        let tracked = find_tracked(&snapshot, &TrackedPostLocator::new("me")).unwrap();
        assert_eq!(tracked.likes_to_climb, 1);
        assert!(tracked.neighbor_below.is_none());
    }

    #[test]
    fn title_pattern_is_a_fallback() {
        let snapshot = build_snapshot(vec![post("a", 10), post("b", 5)], Utc::now());
        let locator = TrackedPostLocator::new("missing").with_title_pattern("POST B");
        let tracked = find_tracked(&snapshot, &locator).unwrap();
        assert_eq!(tracked.post.id, "b");
    }

    #[test]
    fn competition_rank_counts_only_tagged_posts() {
        let mut input = vec![post("a", 90), post("b", 80), post("me", 70)];
        input[1].is_competition = true;
        input[2].is_competition = true;
        let snapshot = build_snapshot(input, Utc::now());
        let tracked = find_tracked(&snapshot, &TrackedPostLocator::new("me")).unwrap();

        assert_eq!(tracked.rank, 3);
        assert_eq!(tracked.competition_rank, Some(2));
    }

    #[test]
    fn empty_batch_is_not_an_error() {
        let snapshot = build_snapshot(Vec::new(), Utc::now());
        assert!(snapshot.is_empty());
        assert!(find_tracked(&snapshot, &TrackedPostLocator::new("X123")).is_none());

        let stats = snapshot.stats();
        assert_eq!(stats.total_posts, 0);
        assert_eq!(stats.total_likes, 0);
        assert_eq!(stats.average_likes, 0.0);
        assert_eq!(stats.max_likes, 0);
    }

    #[test]
    fn stats_summarize_the_snapshot() {
        let mut input = vec![post("a", 55), post("b", 21), post("c", 4)];
        input[0].is_competition = true;
        let stats = build_snapshot(input, Utc::now()).stats();

        assert_eq!(stats.total_posts, 3);
        assert_eq!(stats.total_likes, 80);
        assert_eq!(stats.average_likes, 26.7);
        assert_eq!(stats.max_likes, 55);
        assert_eq!(stats.competition_posts, 1);
        assert_eq!(stats.posts_with_20_plus_likes, 2);
        assert_eq!(stats.posts_with_50_plus_likes, 1);
    }
}
