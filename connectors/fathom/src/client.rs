use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::config::{FathomConfig, USER_AGENT};
use crate::endpoints::{EndpointStrategy, ListQuery, STRATEGIES};
use crate::error::{FathomError, Result};
use crate::models::MeetingsPage;
use crate::progress::ProgressSink;
use crate::retry::{parse_retry_after_body, parse_retry_after_header, RetryPolicy};

pub const API_KEY_HEADER: &str = "X-Api-Key";

/// The two calls the exporter needs from the Fathom API.
#[async_trait]
pub trait MeetingsApi: Send + Sync {
    /// One page of the meetings list.
    async fn list_meetings(&self, query: &ListQuery) -> Result<MeetingsPage>;

    /// Raw transcript payload for a recording.
    async fn fetch_transcript(&self, recording_id: &str) -> Result<Value>;
}

pub struct FathomClient {
    client: Client,
    base_url: Url,
    api_key: String,
    // Index into STRATEGIES, pinned by the first successful list call.
    active_strategy: OnceLock<usize>,
}

impl FathomClient {
    pub fn new(config: &FathomConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            FathomError::Config(format!(
                "FATHOM_API_BASE_URL is not a valid URL ({}): {}",
                config.base_url, e
            ))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(FathomError::Config(format!(
                "FATHOM_API_BASE_URL cannot be used as a base URL: {}",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FathomError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            active_strategy: OnceLock::new(),
        })
    }

    /// Path of the list endpoint chosen by discovery, if any.
    pub fn active_endpoint(&self) -> Option<&'static str> {
        self.active_strategy.get().map(|i| STRATEGIES[*i].path)
    }

    fn build_url(&self, segments: &[&str], params: &[(&'static str, String)]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        }
        url
    }

    async fn get_json(&self, endpoint: &str, url: Url) -> Result<Value> {
        info!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                FathomError::transient(format!("Request to {} failed: {}", endpoint, e))
            })?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FathomError::Auth {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
            });
        }

        if status == StatusCode::NOT_FOUND {
            return Err(FathomError::NotFound(format!("{} returned HTTP 404", endpoint)));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let header_hint = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after_header);
            let body = response.text().await.unwrap_or_default();
            let retry_after = header_hint.or_else(|| parse_retry_after_body(&body));
            warn!(
                "Rate limited by Fathom API on {} (retry after {:?})",
                endpoint, retry_after
            );
            return Err(FathomError::Transient {
                message: format!("{} returned HTTP 429: {}", endpoint, body.trim()),
                retry_after,
            });
        }

        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(FathomError::transient(format!(
                "{} returned HTTP {}: {}",
                endpoint,
                status,
                body.trim()
            )));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FathomError::Protocol(format!(
                "{} returned HTTP {}: {}",
                endpoint,
                status,
                body.trim()
            )));
        }

        let body = response.text().await.map_err(|e| {
            FathomError::transient(format!("Failed to read response from {}: {}", endpoint, e))
        })?;
        info!("Response status: {}, bytes: {}", status.as_u16(), body.len());

        serde_json::from_str(&body).map_err(|e| {
            FathomError::Protocol(format!("{} returned invalid JSON: {}", endpoint, e))
        })
    }

    async fn request_page(
        &self,
        strategy: &EndpointStrategy,
        query: &ListQuery,
    ) -> Result<Value> {
        let params = (strategy.query)(query);
        let segments: Vec<&str> = strategy.path.split('/').collect();
        let url = self.build_url(&segments, &params);
        self.get_json(strategy.path, url).await
    }

    /// Tries each candidate list endpoint in order. Only a shape mismatch or a
    /// non-auth 4xx moves on to the next candidate. Auth and transient errors
    /// end discovery at once; the caller's retry policy restarts it from the
    /// first candidate.
    async fn discover(&self, query: &ListQuery) -> Result<MeetingsPage> {
        let mut attempted = Vec::new();

        for (i, strategy) in STRATEGIES.iter().enumerate() {
            let label = describe(strategy, query);
            info!("Trying endpoint: {}", label);

            match self.request_page(strategy, query).await {
                Ok(payload) => match (strategy.parse)(&payload) {
                    Some(page) => {
                        info!(
                            "Using endpoint {} ({} items on first page)",
                            label,
                            page.items.len()
                        );
                        let _ = self.active_strategy.set(i);
                        return Ok(page);
                    }
                    None => {
                        debug!("Endpoint {} returned an unrecognized shape", label);
                        attempted.push(format!("{}: unrecognized response shape", label));
                    }
                },
                Err(e @ FathomError::Auth { .. }) => return Err(e),
                Err(e) if e.is_transient() => {
                    warn!(
                        "Endpoint {} failed transiently, stopping discovery: {}",
                        label, e
                    );
                    return Err(e);
                }
                Err(e) => {
                    debug!("Endpoint {} failed: {}", label, e);
                    attempted.push(format!("{}: {}", label, e));
                }
            }
        }

        Err(FathomError::Discovery { attempted })
    }
}

#[async_trait]
impl MeetingsApi for FathomClient {
    async fn list_meetings(&self, query: &ListQuery) -> Result<MeetingsPage> {
        let Some(index) = self.active_strategy.get().copied() else {
            return self.discover(query).await;
        };

        let strategy = &STRATEGIES[index];
        let payload = self.request_page(strategy, query).await?;
        (strategy.parse)(&payload).ok_or_else(|| {
            FathomError::Protocol(format!(
                "{} returned an unexpected response shape",
                strategy.path
            ))
        })
    }

    async fn fetch_transcript(&self, recording_id: &str) -> Result<Value> {
        let endpoint = format!("external/v1/recordings/{}/transcript", recording_id);
        let url = self.build_url(
            &["external", "v1", "recordings", recording_id, "transcript"],
            &[],
        );
        self.get_json(&endpoint, url).await
    }
}

fn describe(strategy: &EndpointStrategy, query: &ListQuery) -> String {
    let keys: Vec<&str> = (strategy.query)(query).iter().map(|(k, _)| *k).collect();
    format!("{}?{}", strategy.path, keys.join("&"))
}

/// Walks the cursor chain to the end (or to `page_limit` pages), retrying
/// each page call on transient errors. Items keep API order.
pub async fn fetch_all_meetings(
    api: &dyn MeetingsApi,
    base_query: &ListQuery,
    page_limit: Option<u32>,
    retry: &RetryPolicy,
    progress: &dyn ProgressSink,
) -> Result<Vec<Value>> {
    let mut all_items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0u32;

    loop {
        let query = ListQuery {
            cursor: cursor.clone(),
            ..base_query.clone()
        };

        debug!(
            "Fetching meetings page {} (cursor: {:?})",
            pages + 1,
            query.cursor
        );

        let label = format!("List meetings page {}", pages + 1);
        let page = retry.run(&label, || api.list_meetings(&query)).await?;
        pages += 1;

        let next = page.cursor().map(str::to_string);
        progress.page_listed(pages, page.items.len(), next.is_some());
        all_items.extend(page.items);

        let Some(next) = next else {
            break;
        };

        if cursor.as_deref() == Some(next.as_str()) {
            warn!(
                "API returned the same cursor twice ({}), stopping pagination",
                next
            );
            break;
        }

        if page_limit.is_some_and(|limit| pages >= limit) {
            info!(
                "Page limit of {} reached, stopping pagination with more pages available",
                pages
            );
            break;
        }

        cursor = Some(next);
    }

    info!(
        "Fetched {} meeting records across {} page(s)",
        all_items.len(),
        pages
    );
    Ok(all_items)
}
