// ABOUTME: Async HTTP client for the Readwise export API
// ABOUTME: Handles token auth, pagination, rate-limit retries and error classification

use crate::{
    model::{Book, ExportPage},
    settings::{Settings, DEFAULT_RATE_LIMIT_RETRIES},
    util::truncate_str,
    Error, Result,
};
use reqwest::header::{HeaderValue, AUTHORIZATION, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://readwise.io/api/v2";
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 30;
pub const MAX_RETRY_AFTER_SECS: u64 = 3600;

const INVALID_TOKEN_MESSAGE: &str = "The supplied Readwise token seems to be invalid";

type SleepFn = Arc<dyn Fn(Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Delay before retrying a rate-limited request: the advertised
/// `Retry-After` (seconds or HTTP date, 30 s if absent, capped at an hour)
/// plus one second.
pub fn retry_delay(retry_after: Option<&HeaderValue>) -> Duration {
    let secs = retry_after
        .and_then(|value| value.to_str().ok())
        .and_then(parse_retry_after)
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
        .min(MAX_RETRY_AFTER_SECS);
    Duration::from_millis(secs.saturating_mul(1000).saturating_add(1000))
}

fn parse_retry_after(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs);
    }
    let date = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let secs = (date.with_timezone(&chrono::Utc) - chrono::Utc::now()).num_seconds();
    Some(secs.max(0) as u64)
}

pub struct ReadwiseClient {
    client: Client,
    base_url: String,
    token: String,
    updated_after: Option<String>,
    max_retries: u32,
    sleep: SleepFn,
}

impl ReadwiseClient {
    pub fn new(token: String, base_url: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .build()?;

        let base_url = base_url.unwrap_or_else(|| DEFAULT_API_BASE.into());

        Ok(ReadwiseClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            updated_after: None,
            max_retries: DEFAULT_RATE_LIMIT_RETRIES,
            sleep: Arc::new(|delay| Box::pin(tokio::time::sleep(delay))),
        })
    }

    pub fn from_settings(settings: &Settings, base_url: Option<String>) -> Result<Self> {
        let mut client = Self::new(settings.readwise_token.clone(), base_url)?;
        client.rebind(settings);
        Ok(client)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Replaces the delay used while waiting out a rate limit.
    pub fn with_sleep<F, Fut>(mut self, sleep: F) -> Self
    where
        F: Fn(Duration) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.sleep = Arc::new(move |delay| Box::pin(sleep(delay)));
        self
    }

    pub fn set_token(&mut self, token: String) {
        self.token = token;
    }

    pub fn set_updated_after(&mut self, updated_after: Option<String>) {
        self.updated_after = updated_after.filter(|ts| !ts.is_empty());
    }

    pub fn updated_after(&self) -> Option<&str> {
        self.updated_after.as_deref()
    }

    /// Picks up token, high-water mark and retry budget from `settings`.
    pub fn rebind(&mut self, settings: &Settings) {
        self.set_token(settings.readwise_token.clone());
        self.set_updated_after(settings.readwise_update_after.clone());
        self.max_retries = settings.rate_limit_retries;
    }

    pub async fn validate_token(&self) -> Result<()> {
        let response = self.request("/auth/", &[]).await?;
        if response.status() == StatusCode::NO_CONTENT {
            Ok(())
        } else {
            log::warn!("token probe answered {} instead of 204", response.status());
            Err(Error::InvalidToken(INVALID_TOKEN_MESSAGE.into()))
        }
    }

    /// Fetches every book changed since the high-water mark (or all books
    /// when there is none), following page cursors to the end.
    pub async fn get_highlights(&self) -> Result<Vec<Book>> {
        self.validate_token().await?;

        let mut books = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0;

        loop {
            let mut query = Vec::new();
            if let Some(cursor) = &cursor {
                query.push(("pageCursor", cursor.clone()));
            }
            if let Some(updated_after) = &self.updated_after {
                query.push(("updatedAfter", updated_after.clone()));
            }

            let response = self.request("/export/", &query).await?;
            let body = response.text().await?;
            let page: ExportPage = serde_json::from_str(&body).map_err(|e| {
                log::error!("Failed to parse export page: {}", e);
                log::error!("Response body (first 500 chars): {}", truncate_str(&body, 500));
                Error::Parse(e)
            })?;

            pages += 1;
            log::debug!("export page {}: {} books", pages, page.results.len());

            cursor = page.next_cursor();
            books.extend(page.results);

            if cursor.is_none() {
                break;
            }
        }

        log::info!("fetched {} books in {} pages", books.len(), pages);
        Ok(books)
    }

    async fn request(&self, resource: &str, query: &[(&str, String)]) -> Result<Response> {
        let url = format!("{}{}", self.base_url, resource);
        let mut retries = 0;

        loop {
            log::debug!("GET {} {:?}", url, query);
            let response = self
                .client
                .get(&url)
                .query(query)
                .header(AUTHORIZATION, format!("Token {}", self.token))
                .header(
                    USER_AGENT,
                    concat!("readwise-atoms/", env!("CARGO_PKG_VERSION")),
                )
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let failed_url = response.url().to_string();
            let status_text = status.canonical_reason().unwrap_or_default().to_string();

            match status {
                StatusCode::UNAUTHORIZED => {
                    return Err(Error::InvalidToken(format!(
                        "{} ({} answered {}: {})",
                        INVALID_TOKEN_MESSAGE,
                        failed_url,
                        status.as_u16(),
                        status_text
                    )));
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    if retries >= self.max_retries {
                        return Err(Error::RetryBudgetExhausted {
                            url: failed_url,
                            attempts: retries + 1,
                        });
                    }
                    let delay = retry_delay(response.headers().get(RETRY_AFTER));
                    retries += 1;
                    log::warn!(
                        "rate limited on {}, retry {}/{} in {}s",
                        failed_url,
                        retries,
                        self.max_retries,
                        delay.as_secs()
                    );
                    (self.sleep)(delay).await;
                }
                s if s.is_client_error() => {
                    return Err(Error::Client {
                        url: failed_url,
                        status: s.as_u16(),
                        status_text,
                    });
                }
                s if s.is_server_error() => {
                    return Err(Error::Server {
                        url: failed_url,
                        status: s.as_u16(),
                        status_text,
                    });
                }
                s => {
                    return Err(Error::Unidentified {
                        url: failed_url,
                        status: s.as_u16(),
                        status_text,
                    });
                }
            }
        }
    }
}
