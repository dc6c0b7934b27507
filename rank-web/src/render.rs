//! Text and CSV views of a snapshot.

use std::fmt::Write as _;

use rank_core::{RefreshState, RefreshStatus, Snapshot, TrackedPosition};

const TITLE_WIDTH: usize = 60;

pub const CSV_HEADERS: [&str; 11] = [
    "rank",
    "id",
    "title",
    "content_type",
    "likes_count",
    "comments_count",
    "created_at",
    "last_published_at",
    "author_alias",
    "author_name",
    "url",
];

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_row(out: &mut String, row: &[String]) {
    let mut first = true;
    for cell in row {
        if !first {
            out.push(',');
        } else {
            first = false;
        }
        if needs_quotes(cell) {
            let escaped = cell.replace('"', "\"\"");
            let _ = write!(out, "\"{}\"", escaped);
        } else {
            out.push_str(cell);
        }
    }
    out.push('\n');
}

pub fn render_csv(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    let headers: Vec<String> = CSV_HEADERS.iter().map(|h| h.to_string()).collect();
    write_row(&mut out, &headers);

    for entry in snapshot.ranked() {
        let p = &entry.post;
        write_row(
            &mut out,
            &[
                entry.rank.to_string(),
                p.id.clone(),
                p.title.clone(),
                p.content_type.to_string(),
                p.likes_count.to_string(),
                p.comments_count.to_string(),
                p.created_at.to_string(),
                p.last_published_at.to_string(),
                p.author_alias.clone(),
                p.author_name.clone(),
                p.url.clone(),
            ],
        );
    }
    out
}

fn truncate(title: &str, width: usize) -> String {
    if title.chars().count() <= width {
        return title.to_string();
    }
    let cut: String = title.chars().take(width.saturating_sub(3)).collect();
    format!("{cut}...")
}

/// Plain-text leaderboard with the tracked post summary on top.
pub fn render_leaderboard(
    snapshot: &Snapshot,
    tracked: Option<&TrackedPosition>,
    status: &RefreshStatus,
) -> String {
    let mut out = String::new();
    let updated = snapshot
        .scraped_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());
    let _ = writeln!(out, "Leaderboard: {} posts, updated {}", snapshot.len(), updated);

    match &status.state {
        RefreshState::Idle => {}
        RefreshState::Running => {
            let _ = writeln!(out, "Refresh in progress...");
        }
        RefreshState::Error { message } => {
            let _ = writeln!(out, "WARNING: last refresh failed ({message}); showing cached ranking");
        }
    }

    let stats = snapshot.stats();
    let _ = writeln!(
        out,
        "Total likes: {}  Avg: {:.1}  Max: {}  Competition posts: {}",
        stats.total_likes, stats.average_likes, stats.max_likes, stats.competition_posts
    );
    out.push('\n');

    match tracked {
        Some(t) => {
            let _ = writeln!(out, ">>> YOUR POST: #{} of {} (top {:.1}%)", t.rank, t.total, t.percentile);
            let _ = writeln!(out, "    {} - {} likes", t.post.title, t.post.likes_count);
            if let Some(above) = &t.neighbor_above {
                let _ = writeln!(
                    out,
                    "    above: #{} {} ({} likes), need {} more to climb",
                    above.rank,
                    truncate(&above.post.title, 30),
                    above.post.likes_count,
                    t.likes_to_climb
                );
            }
            if let Some(below) = &t.neighbor_below {
                let _ = writeln!(
                    out,
                    "    below: #{} {} ({} likes)",
                    below.rank,
                    truncate(&below.post.title, 30),
                    below.post.likes_count
                );
            }
        }
        None => {
            let _ = writeln!(out, "Tracked post not found in current ranking.");
        }
    }
    out.push('\n');

    let _ = writeln!(out, "{:<6} {:<8} {:<10} {:<5} {}", "#", "Likes", "Type", "Comp", "Title");
    for entry in snapshot.ranked() {
        let marker = match tracked {
            Some(t) if t.rank == entry.rank => ">>",
            _ => "",
        };
        let _ = writeln!(
            out,
            "{:<6} {:<8} {:<10} {:<5} {}{}",
            entry.rank,
            entry.post.likes_count,
            entry.post.content_type,
            if entry.post.is_competition { "yes" } else { "" },
            marker,
            truncate(&entry.post.title, TITLE_WIDTH)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rank_core::{build_snapshot, find_tracked, Post, TrackedPostLocator};
    use serde_json::json;

    fn snapshot() -> Snapshot {
        let posts = vec![
            Post::from_raw(
                &json!({ "contentId": "a", "title": "Hello, \"world\"", "likesCount": 9, "createdAt": 1700000000 }),
                "article",
                "https://example.com",
            )
            .unwrap(),
            Post::from_raw(
                &json!({ "contentId": "me", "title": "Mine", "likesCount": 4 }),
                "post",
                "https://example.com",
            )
            .unwrap(),
        ];
        build_snapshot(posts, chrono::Utc::now())
    }

    fn idle() -> RefreshStatus {
        RefreshStatus {
            state: RefreshState::Idle,
            last_attempt_at: None,
            last_success_at: None,
        }
    }

    #[test]
    fn csv_quotes_fields_that_need_it() {
        let csv = render_csv(&snapshot());
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], CSV_HEADERS.join(","));
        assert_eq!(
            lines[1],
            "1,a,\"Hello, \"\"world\"\"\",article,9,0,2023-11-14T22:13:20Z,N/A,N/A,N/A,https://example.com/content/a"
        );
        assert!(lines[2].starts_with("2,me,Mine,post,4,"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn leaderboard_marks_tracked_post() {
        let snap = snapshot();
        let tracked = find_tracked(&snap, &TrackedPostLocator::new("me"));
        let text = render_leaderboard(&snap, tracked.as_ref(), &idle());

        assert!(text.contains(">>> YOUR POST: #2 of 2"));
        assert!(text.contains("need 6 more to climb"));
        assert!(text.contains(">>Mine"));
    }

    #[test]
    fn leaderboard_warns_on_failed_refresh() {
        let status = RefreshStatus {
            state: RefreshState::Error {
                message: "no posts retrieved".into(),
            },
            ..idle()
        };
        let text = render_leaderboard(&Snapshot::empty(), None, &status);
        assert!(text.contains("WARNING: last refresh failed"));
        assert!(text.contains("Tracked post not found"));
        assert!(text.contains("0 posts, updated never"));
    }

    #[test]
    fn long_titles_are_truncated() {
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
        assert_eq!(truncate("short", 8), "short");
    }
}
