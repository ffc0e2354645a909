use std::fmt;
use std::time::Duration;

use anyhow::{Result, bail};
use base64::Engine;
use reqwest::header::HeaderMap;
use reqwest::{Client as HttpClient, Method, Response, StatusCode};
use serde_json::Value;
use url::Url;

use crate::auth::AuthMethod;
use crate::pagination::{absolutize_next_url, next_link_from_body, next_link_from_headers};

const USER_AGENT: &str = concat!("confpack/", env!("CARGO_PKG_VERSION"));

/// Retry settings for transient failures (network errors, 5xx, 429).
/// Backoff doubles per attempt starting from `base_backoff`, plus jitter;
/// a `Retry-After` header overrides the computed wait.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
        }
    }
}

/// An HTTP status failure, kept as a typed error source so callers can
/// branch on the status (the crawler tolerates 404 on re-roots).
#[derive(Debug)]
pub struct StatusError {
    pub status: StatusCode,
    pub body: String,
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = self.body.trim();
        if body.is_empty() {
            write!(f, "Request failed: {}", self.status)
        } else {
            write!(f, "Request failed: {} {}", self.status, body)
        }
    }
}

impl std::error::Error for StatusError {}

/// True when the error chain bottoms out in an HTTP 404.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<StatusError>()
            .is_some_and(|status| status.status == StatusCode::NOT_FOUND)
    })
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    /// Site base URL including the `/wiki` context path.
    base_url: String,
    /// Scheme+host(+port), used to resolve relative pagination links.
    origin: String,
    auth: AuthMethod,
    http: HttpClient,
    retry: RetryPolicy,
    verbose: u8,
}

impl ApiClient {
    /// `site` may be a bare domain, an origin, or a full `/wiki` URL;
    /// requests always go through `<scheme>://<host>/wiki`.
    pub fn new(site: String, auth: AuthMethod, verbose: u8) -> Result<Self> {
        let base_url = normalize_site_url(&site);
        let origin = origin_from_url(&base_url)?;
        let http = HttpClient::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            base_url,
            origin,
            auth,
            http,
            retry: RetryPolicy::default(),
            verbose,
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn v2_url(&self, path: &str) -> String {
        format!("{}/api/v2{}", self.base_url, path)
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            AuthMethod::Basic { email, token } => {
                let raw = format!("{email}:{token}");
                let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
                builder.header("Authorization", format!("Basic {encoded}"))
            }
            AuthMethod::Bearer { token } => {
                builder.header("Authorization", format!("Bearer {token}"))
            }
        }
    }

    /// Wait before the next attempt: `Retry-After` seconds when the server
    /// sent one, else exponential backoff, jittered either way.
    fn retry_wait(&self, headers: &HeaderMap, attempt: u32) -> Duration {
        if let Some(val) = headers.get("retry-after")
            && let Ok(s) = val.to_str()
            && let Ok(secs) = s.trim().parse::<u64>()
        {
            return Duration::from_secs(secs) + jitter(Duration::from_millis(250));
        }
        self.retry.base_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
            + jitter(Duration::from_millis(250))
    }

    async fn send(&self, method: Method, url: String, body: Option<&Value>) -> Result<Response> {
        let mut attempts = 0;

        loop {
            if self.verbose > 0 {
                if attempts > 0 {
                    eprintln!("{} {} (retry {})", method, url, attempts);
                } else {
                    eprintln!("{} {}", method, url);
                }
            }
            let start = std::time::Instant::now();
            let mut builder = self.http.request(method.clone(), url.clone());
            if let Some(body) = body {
                builder = builder.json(body);
            }
            let builder = self.apply_auth(builder);

            match builder.send().await {
                Ok(response) => {
                    if self.verbose > 1 {
                        eprintln!("<- {} ({:?})", response.status(), start.elapsed());
                    }

                    if response.status().is_success() {
                        return Ok(response);
                    }

                    let status = response.status();
                    if attempts + 1 < self.retry.max_attempts
                        && (status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error())
                    {
                        attempts += 1;
                        let wait = self.retry_wait(response.headers(), attempts);
                        if self.verbose > 0 {
                            eprintln!("Received {status}, retrying in {wait:?}...");
                        }
                        tokio::time::sleep(wait).await;
                        continue;
                    }

                    let body = response.text().await.unwrap_or_default();
                    return Err(StatusError { status, body }.into());
                }
                Err(err) => {
                    if attempts + 1 < self.retry.max_attempts {
                        attempts += 1;
                        let wait = self.retry.base_backoff
                            * 2u32.saturating_pow(attempts.saturating_sub(1));
                        if self.verbose > 0 {
                            eprintln!("Request error: {err}, retrying in {wait:?}...");
                        }
                        tokio::time::sleep(wait).await;
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
    }

    pub async fn get_json(&self, url: String) -> Result<(Value, HeaderMap)> {
        let response = self.send(Method::GET, url, None).await?;
        let headers = response.headers().clone();
        let json = response.json::<Value>().await?;
        Ok((json, headers))
    }

    /// Follow pagination links and collect `results` arrays until the server
    /// runs out of pages or `max_items` results have been gathered.
    pub async fn get_paginated_results(
        &self,
        url: String,
        max_items: Option<usize>,
    ) -> Result<Vec<Value>> {
        let mut results = Vec::new();
        let mut next_url: Option<String> = Some(url);
        while let Some(url) = next_url {
            let (json, headers) = self.get_json(url).await?;
            if let Some(array) = json.get("results").and_then(|v| v.as_array()) {
                results.extend(array.iter().cloned());
            } else if let Some(array) = json.as_array() {
                results.extend(array.iter().cloned());
            } else {
                bail!("Unexpected response shape: missing results array");
            }

            if let Some(max) = max_items
                && results.len() >= max
            {
                results.truncate(max);
                break;
            }

            next_url = next_link_from_headers(&headers)
                .or_else(|| next_link_from_body(&json))
                .map(|next| absolutize_next_url(&self.origin, &next));
        }
        Ok(results)
    }

    #[cfg(feature = "write")]
    pub async fn post_json(&self, url: String, body: Value) -> Result<Value> {
        let response = self.send(Method::POST, url, Some(&body)).await?;
        Ok(response.json::<Value>().await?)
    }

    #[cfg(feature = "write")]
    pub async fn delete(&self, url: String) -> Result<()> {
        self.send(Method::DELETE, url, None).await?;
        Ok(())
    }
}

fn normalize_site_url(site: &str) -> String {
    let mut url = site.trim().trim_end_matches('/').to_string();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        url = format!("https://{url}");
    }
    if !url.ends_with("/wiki") {
        url.push_str("/wiki");
    }
    url
}

fn origin_from_url(base_url: &str) -> Result<String> {
    let url = Url::parse(base_url)?;
    let host = url
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid Confluence URL: missing host"))?;
    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    Ok(format!("{}://{}{}", url.scheme(), host, port))
}

fn jitter(max: Duration) -> Duration {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::from_millis(0);
    }
    Duration::from_millis(nanos % max_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::http_server::start_server;

    fn test_client(base: &str) -> ApiClient {
        ApiClient::new(
            base.to_string(),
            AuthMethod::Basic {
                email: "dev@example.com".to_string(),
                token: "token".to_string(),
            },
            0,
        )
        .unwrap()
        .with_retry_policy(RetryPolicy {
            max_attempts: 3,
            base_backoff: Duration::from_millis(5),
        })
    }

    #[test]
    fn site_urls_are_normalized() {
        let auth = AuthMethod::Bearer {
            token: "token".to_string(),
        };
        let bare = ApiClient::new("acme.atlassian.net".to_string(), auth.clone(), 0).unwrap();
        assert_eq!(bare.base_url(), "https://acme.atlassian.net/wiki");

        let origin = ApiClient::new("http://localhost:8080/".to_string(), auth.clone(), 0).unwrap();
        assert_eq!(origin.base_url(), "http://localhost:8080/wiki");

        let full = ApiClient::new("https://acme.atlassian.net/wiki".to_string(), auth, 0).unwrap();
        assert_eq!(full.base_url(), "https://acme.atlassian.net/wiki");
    }

    #[tokio::test]
    async fn retries_server_errors_until_success() {
        let server = start_server(|hit, _target| {
            if hit < 3 {
                (500, vec![], b"boom".to_vec())
            } else {
                (200, vec![], b"{\"ok\": true}".to_vec())
            }
        })
        .await;

        let client = test_client(&server.base_url);
        let (json, _) = client
            .get_json(client.v2_url("/spaces?limit=1"))
            .await
            .unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(server.hits.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_429_with_retry_after() {
        let server = start_server(|hit, _target| {
            if hit == 1 {
                (
                    429,
                    vec![("Retry-After".to_string(), "0".to_string())],
                    Vec::new(),
                )
            } else {
                (200, vec![], b"{\"ok\": true}".to_vec())
            }
        })
        .await;

        let client = test_client(&server.base_url);
        client
            .get_json(client.v2_url("/spaces?limit=1"))
            .await
            .unwrap();
        assert_eq!(server.hits.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn not_found_is_fatal_and_typed() {
        let server = start_server(|_hit, _target| (404, vec![], b"no such page".to_vec())).await;

        let client = test_client(&server.base_url);
        let err = client
            .get_json(client.v2_url("/pages/1"))
            .await
            .unwrap_err();
        assert!(is_not_found(&err));
        // 4xx other than 429 must not be retried
        assert_eq!(server.hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pagination_follows_next_links_and_honours_max_items() {
        let server = start_server(|_hit, target| {
            let body = if target.contains("cursor=2") {
                serde_json::json!({"results": [{"n": 3}, {"n": 4}]})
            } else {
                serde_json::json!({
                    "results": [{"n": 1}, {"n": 2}],
                    "_links": {"next": "/wiki/api/v2/items?cursor=2"},
                })
            };
            (200, vec![], serde_json::to_vec(&body).unwrap())
        })
        .await;

        let client = test_client(&server.base_url);
        let all = client
            .get_paginated_results(client.v2_url("/items"), None)
            .await
            .unwrap();
        assert_eq!(all.len(), 4);

        let capped = client
            .get_paginated_results(client.v2_url("/items"), Some(2))
            .await
            .unwrap();
        assert_eq!(capped.len(), 2);
    }
}
