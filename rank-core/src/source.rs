use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER};
use reqwest::{redirect, Client, ClientBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::FeedConfig;
use crate::error::FetchError;

const SESSION_TOKEN_HEADER: &str = "builder-session-token";

/// One page of the feed, items still untyped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedPage {
    #[serde(default, rename = "feedContents")]
    pub items: Vec<Value>,
    #[serde(default, rename = "nextToken")]
    pub next_token: Option<String>,
}

/// A raw feed item together with the content type it was requested under.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub content_type: String,
    pub record: Value,
}

/// Anything that can page through the platform feed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_page(
        &self,
        content_type: &str,
        page_size: u32,
        next_token: Option<&str>,
    ) -> Result<FeedPage, FetchError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedRequest<'a> {
    content_type: &'a str,
    page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a str>,
}

/// Talks to the JSON feed endpoint directly.
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: Client,
    endpoint: Url,
    session_token: Option<String>,
}

impl HttpFeedSource {
    pub fn new(client: Client, config: &FeedConfig) -> Result<Self, FetchError> {
        let endpoint = Url::parse(&config.base_url)?.join(&config.endpoint)?;
        Ok(Self {
            client,
            endpoint,
            session_token: config.session_token.clone().filter(|t| !t.is_empty()),
        })
    }

    pub fn from_config(config: &FeedConfig) -> Result<Self, FetchError> {
        let client = build_client(config)?;
        Self::new(client, config)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

pub fn build_client(config: &FeedConfig) -> Result<Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    if let Ok(origin) = HeaderValue::from_str(config.base_url.trim_end_matches('/')) {
        headers.insert(ORIGIN, origin);
    }
    if let Ok(referer) = HeaderValue::from_str(&format!("{}/", config.base_url.trim_end_matches('/'))) {
        headers.insert(REFERER, referer);
    }

    let client = ClientBuilder::new()
        .redirect(redirect::Policy::limited(5))
        .timeout(config.request_timeout())
        .user_agent(concat!("rankwatch/", env!("CARGO_PKG_VERSION")))
        .default_headers(headers)
        .build()?;
    Ok(client)
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch_page(
        &self,
        content_type: &str,
        page_size: u32,
        next_token: Option<&str>,
    ) -> Result<FeedPage, FetchError> {
        let body = FeedRequest {
            content_type,
            page_size,
            next_token,
        };
        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(token) = &self.session_token {
            request = request.header(SESSION_TOKEN_HEADER, token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        let page = serde_json::from_slice::<FeedPage>(&bytes)?;
        Ok(page)
    }
}

/// Walks every configured content type to the end of its pagination.
///
/// A page that still fails after rate-limit backoff ends that content type;
/// records already collected are kept and the next type is fetched. The call
/// fails only when nothing was collected and some type reported an error.
pub async fn fetch_all(
    source: &dyn FeedSource,
    config: &FeedConfig,
) -> Result<Vec<RawRecord>, FetchError> {
    let mut records = Vec::new();
    let mut last_err: Option<FetchError> = None;

    for content_type in &config.content_types {
        let mut token: Option<String> = None;
        let mut pages = 0usize;
        let before = records.len();

        loop {
            let page = match fetch_page_with_backoff(source, config, content_type, token.as_deref()).await {
                Ok(page) => page,
                Err(err) => {
                    warn!(
                        content_type = %content_type,
                        pages,
                        error = %err,
                        "feed page failed, skipping rest of content type"
                    );
                    last_err = Some(err);
                    break;
                }
            };
            pages += 1;

            let next = page.next_token.filter(|t| !t.is_empty());
            let exhausted = page.items.is_empty();
            records.extend(page.items.into_iter().map(|record| RawRecord {
                content_type: content_type.clone(),
                record,
            }));

            match next {
                Some(next) if !exhausted => {
                    if token.as_deref() == Some(next.as_str()) {
                        warn!(content_type = %content_type, "feed returned the same continuation token twice, stopping");
                        break;
                    }
                    token = Some(next);
                    tokio::time::sleep(config.page_delay()).await;
                }
                _ => break,
            }
        }

        info!(
            content_type = %content_type,
            pages,
            items = records.len() - before,
            "fetched feed"
        );
    }

    match last_err {
        Some(err) if records.is_empty() => Err(err),
        _ => Ok(records),
    }
}

async fn fetch_page_with_backoff(
    source: &dyn FeedSource,
    config: &FeedConfig,
    content_type: &str,
    token: Option<&str>,
) -> Result<FeedPage, FetchError> {
    let mut rate_limited = 0u8;
    loop {
        match source.fetch_page(content_type, config.page_size, token).await {
            Err(err) if err.is_transient() && rate_limited < config.max_rate_limit_retries => {
                rate_limited += 1;
                warn!(
                    content_type = %content_type,
                    attempt = rate_limited,
                    backoff = ?config.rate_limit_backoff(),
                    "rate limited, backing off"
                );
                tokio::time::sleep(config.rate_limit_backoff()).await;
            }
            Err(err) => {
                debug!(content_type = %content_type, error = %err, "feed page failed");
                return Err(err);
            }
            Ok(page) => return Ok(page),
        }
    }
}
