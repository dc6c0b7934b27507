use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::NormalizeError;

/// Shown wherever the feed left a field out.
pub const NOT_AVAILABLE: &str = "N/A";
pub const UNTITLED: &str = "Untitled";

/// Epoch values above this are milliseconds, below it seconds.
const MILLIS_THRESHOLD: f64 = 1e12;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContentType {
    Article,
    Post,
    Wish,
    Other(String),
}

impl From<String> for ContentType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "article" => ContentType::Article,
            "post" => ContentType::Post,
            "wish" => ContentType::Wish,
            _ => ContentType::Other(value),
        }
    }
}

impl From<&str> for ContentType {
    fn from(value: &str) -> Self {
        ContentType::from(value.to_string())
    }
}

impl From<ContentType> for String {
    fn from(value: ContentType) -> Self {
        value.as_str().to_string()
    }
}

impl ContentType {
    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Article => "article",
            ContentType::Post => "post",
            ContentType::Wish => "wish",
            ContentType::Other(s) => s,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A feed timestamp after normalization.
///
/// Serialized as a single string: RFC 3339 in UTC for known instants, the
/// original text for values that could not be interpreted, and `N/A` when the
/// feed carried nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostTime {
    At(DateTime<Utc>),
    Raw(String),
    Unavailable,
}

impl PostTime {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => PostTime::Unavailable,
            Some(Value::Number(n)) => n
                .as_i64()
                .map_or_else(|| n.as_f64().and_then(from_epoch), from_epoch_int)
                .map(PostTime::At)
                .unwrap_or_else(|| PostTime::Raw(n.to_string())),
            Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|dt| PostTime::At(dt.with_timezone(&Utc)))
                .unwrap_or_else(|_| PostTime::Raw(s.clone())),
            Some(other) => PostTime::Raw(other.to_string()),
        }
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            PostTime::At(dt) => Some(*dt),
            _ => None,
        }
    }
}

fn from_epoch_int(value: i64) -> Option<DateTime<Utc>> {
    if value as f64 > MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}

/// Fractional epochs. Integer values use `from_epoch_int`.
fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    let secs = if value > MILLIS_THRESHOLD {
        value / 1000.0
    } else {
        value
    };
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = (((secs - whole) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(whole as i64, nanos)
}

impl fmt::Display for PostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostTime::At(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            PostTime::Raw(s) => f.write_str(s),
            PostTime::Unavailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

impl Serialize for PostTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PostTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(match raw {
            None => PostTime::Unavailable,
            Some(s) if s == NOT_AVAILABLE => PostTime::Unavailable,
            Some(s) => PostTime::from_value(Some(&Value::String(s))),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content_type: ContentType,
    pub likes_count: u64,
    pub comments_count: u64,
    pub views_count: Option<u64>,
    pub created_at: PostTime,
    pub last_published_at: PostTime,
    pub uri: String,
    pub url: String,
    #[serde(default)]
    pub status: String,
    pub author_alias: String,
    pub author_name: String,
    #[serde(default)]
    pub is_competition: bool,
}

impl Post {
    /// Builds a post from one raw feed record.
    ///
    /// Every field degrades to a default on its own; only a record that is not
    /// a JSON object at all is rejected. `content_type` is used when the record
    /// does not name its own type.
    pub fn from_raw(
        record: &Value,
        content_type: &str,
        base_url: &str,
    ) -> Result<Self, NormalizeError> {
        let obj = record
            .as_object()
            .ok_or_else(|| NormalizeError::MalformedRecord(json_kind(record)))?;

        let id = text_field(obj, "contentId")
            .unwrap_or(NOT_AVAILABLE)
            .to_owned();
        let uri = text_field(obj, "uri").unwrap_or_default().to_owned();
        let url = derive_url(base_url, &uri, &id);

        let author = obj.get("author").and_then(Value::as_object);
        let author_field = |key: &str| {
            author
                .and_then(|a| text_field(a, key))
                .unwrap_or(NOT_AVAILABLE)
                .to_owned()
        };

        Ok(Self {
            title: text_field(obj, "title").unwrap_or(UNTITLED).to_owned(),
            content_type: ContentType::from(text_field(obj, "contentType").unwrap_or(content_type)),
            likes_count: count_field(obj, "likesCount").unwrap_or(0),
            comments_count: count_field(obj, "commentsCount").unwrap_or(0),
            views_count: count_field(obj, "viewsCount"),
            created_at: PostTime::from_value(obj.get("createdAt")),
            last_published_at: PostTime::from_value(obj.get("lastPublishedAt")),
            status: text_field(obj, "status").unwrap_or_default().to_owned(),
            author_alias: author_field("alias"),
            author_name: author_field("preferredName"),
            is_competition: false,
            id,
            uri,
            url,
        })
    }
}

/// Absolute link for a post: `uri` if known, else a `/content/<id-tail>` path, else the site root.
pub fn derive_url(base_url: &str, uri: &str, id: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if !uri.is_empty() {
        if uri.starts_with('/') {
            format!("{base}{uri}")
        } else {
            format!("{base}/{uri}")
        }
    } else if !id.is_empty() && id != NOT_AVAILABLE {
        let tail = id.rsplit('/').next().unwrap_or(id);
        format!("{base}/content/{tail}")
    } else {
        base.to_string()
    }
}

fn text_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn count_field(obj: &Map<String, Value>, key: &str) -> Option<u64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.trunc() as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: &str = "https://example.com";

    #[test]
    fn missing_fields_get_defaults() {
        let post = Post::from_raw(&json!({ "contentId": "abc" }), "article", BASE).unwrap();

        assert_eq!(post.title, UNTITLED);
        assert_eq!(post.likes_count, 0);
        assert_eq!(post.comments_count, 0);
        assert_eq!(post.views_count, None);
        assert_eq!(post.created_at, PostTime::Unavailable);
        assert_eq!(post.author_alias, NOT_AVAILABLE);
        assert_eq!(post.author_name, NOT_AVAILABLE);
        assert_eq!(post.content_type, ContentType::Article);
    }

    #[test]
    fn zero_views_differs_from_missing_views() {
        let post = Post::from_raw(&json!({ "contentId": "a", "viewsCount": 0 }), "post", BASE).unwrap();
        assert_eq!(post.views_count, Some(0));
    }

    #[test]
    fn seconds_and_millis_normalize_to_same_instant() {
        let secs = PostTime::from_value(Some(&json!(1700000000)));
        let millis = PostTime::from_value(Some(&json!(1700000000000u64)));

        assert_eq!(secs, millis);
        assert_eq!(secs.to_string(), "2023-11-14T22:13:20Z");
    }

    #[test]
    fn millisecond_part_is_kept_exactly() {
        let time = PostTime::from_value(Some(&json!(1700000000123u64)));
        assert_eq!(time.to_string(), "2023-11-14T22:13:20.123Z");

        let fractional = PostTime::from_value(Some(&json!(1700000000.5)));
        assert_eq!(fractional.to_string(), "2023-11-14T22:13:20.500Z");
    }

    #[test]
    fn unparseable_timestamps_pass_through() {
        assert_eq!(
            PostTime::from_value(Some(&json!("last tuesday"))),
            PostTime::Raw("last tuesday".into())
        );
        assert_eq!(PostTime::from_value(Some(&json!(null))), PostTime::Unavailable);
        assert_eq!(PostTime::from_value(Some(&json!(1e300))).to_string(), "1e300");
    }

    #[test]
    fn post_time_survives_serde() {
        for time in [
            PostTime::from_value(Some(&json!(1700000000))),
            PostTime::Raw("yesterday".into()),
            PostTime::Unavailable,
        ] {
            let encoded = serde_json::to_string(&time).unwrap();
            let decoded: PostTime = serde_json::from_str(&encoded).unwrap();
            assert_eq!(decoded, time);
        }
    }

    #[test]
    fn malformed_counters_degrade_to_zero() {
        let post = Post::from_raw(
            &json!({
                "contentId": "a",
                "likesCount": "12",
                "commentsCount": -3,
                "viewsCount": { "nested": true },
            }),
            "post",
            BASE,
        )
        .unwrap();

        assert_eq!(post.likes_count, 12);
        assert_eq!(post.comments_count, 0);
        assert_eq!(post.views_count, None);
    }

    #[test]
    fn url_prefers_uri_then_id_then_base() {
        assert_eq!(derive_url(BASE, "/content/x/slug", "x"), "https://example.com/content/x/slug");
        assert_eq!(derive_url(BASE, "", "feed/ITEM9"), "https://example.com/content/ITEM9");
        assert_eq!(derive_url("https://example.com/", "", NOT_AVAILABLE), BASE);
        assert_eq!(derive_url(BASE, "", ""), BASE);
    }

    #[test]
    fn null_author_and_missing_id() {
        let post = Post::from_raw(&json!({ "author": null, "title": "Hello" }), "wish", BASE).unwrap();

        assert_eq!(post.id, NOT_AVAILABLE);
        assert_eq!(post.url, BASE);
        assert_eq!(post.author_alias, NOT_AVAILABLE);
        assert_eq!(post.title, "Hello");
    }

    #[test]
    fn non_object_record_is_malformed() {
        let err = Post::from_raw(&json!([1, 2]), "post", BASE).unwrap_err();
        assert!(matches!(err, NormalizeError::MalformedRecord("array")));
    }

    #[test]
    fn full_record_maps_every_field() {
        let raw = json!({
            "contentId": "feed/3AAMRb",
            "title": "AIdeas: wellness",
            "contentType": "article",
            "likesCount": 42,
            "commentsCount": 7,
            "viewsCount": 900,
            "createdAt": 1700000000000u64,
            "lastPublishedAt": 1700000100,
            "uri": "/content/3AAMRb/aideas",
            "status": "PUBLISHED",
            "author": { "alias": "jdoe", "preferredName": "J. Doe" }
        });
        let post = Post::from_raw(&raw, "post", BASE).unwrap();

        assert_eq!(post.id, "feed/3AAMRb");
        assert_eq!(post.content_type, ContentType::Article);
        assert_eq!(post.likes_count, 42);
        assert_eq!(post.comments_count, 7);
        assert_eq!(post.views_count, Some(900));
        assert_eq!(post.url, "https://example.com/content/3AAMRb/aideas");
        assert_eq!(post.status, "PUBLISHED");
        assert_eq!(post.author_alias, "jdoe");
        assert_eq!(post.author_name, "J. Doe");
        assert!(post.last_published_at.instant().is_some());
    }
}
