//! Rate-limited HTTP fetcher with TTL caching and request coalescing.
//!
//! One instance owns all cross-cutting state: the response cache, the
//! in-flight request map, and the throttle cooldown shared by every caller.

use crate::cooldown::{CooldownState, RetryPolicy, ThrottlePolicy};
use crate::error::FeedError;
use dashmap::DashMap;
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Configuration for the feed client.
#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    /// Hard timeout on every outbound request.
    pub request_timeout: Duration,
    /// Optional API key sent as `x-api-key`.
    pub api_key: Option<String>,
    pub throttle: ThrottlePolicy,
    pub retry: RetryPolicy,
}

impl Default for FeedClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            api_key: None,
            throttle: ThrottlePolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    fetched_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.fetched_at) < self.ttl
    }
}

type FetchResult = Result<Value, FeedError>;

enum Role {
    Leader(broadcast::Sender<FetchResult>),
    Follower(broadcast::Receiver<FetchResult>),
}

/// TTL-cached, coalescing, cooldown-aware JSON fetcher.
pub struct FeedClient {
    http: reqwest::Client,
    cache: DashMap<String, CacheEntry>,
    in_flight: Mutex<HashMap<String, broadcast::Sender<FetchResult>>>,
    cooldown: Mutex<CooldownState>,
    config: FeedClientConfig,
}

impl FeedClient {
    pub fn new(config: FeedClientConfig) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FeedError::Network(e.to_string()))?;
        Ok(Self {
            http,
            cache: DashMap::new(),
            in_flight: Mutex::new(HashMap::new()),
            cooldown: Mutex::new(CooldownState::default()),
            config,
        })
    }

    /// Fetch a URL as JSON.
    ///
    /// A fresh cache entry bypasses the network entirely; concurrent
    /// callers for the same URL share one outstanding request; every
    /// request waits out the shared cooldown first.
    pub async fn fetch(&self, url: &str, ttl: Duration) -> FetchResult {
        if let Some(entry) = self.cache.get(url) {
            if entry.is_fresh(Instant::now()) {
                debug!(url, "feed cache hit");
                return Ok(entry.value.clone());
            }
        }

        let role = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            match in_flight.get(url) {
                Some(tx) => Role::Follower(tx.subscribe()),
                None => {
                    let (tx, _rx) = broadcast::channel(1);
                    in_flight.insert(url.to_string(), tx.clone());
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Follower(mut rx) => match rx.recv().await {
                Ok(result) => result,
                Err(_) => Err(FeedError::ChannelClosed),
            },
            Role::Leader(tx) => {
                let result = self.fetch_uncoalesced(url).await;
                if let Ok(value) = &result {
                    self.cache.insert(
                        url.to_string(),
                        CacheEntry {
                            value: value.clone(),
                            fetched_at: Instant::now(),
                            ttl,
                        },
                    );
                }
                // Deregister before publishing so late arrivals start a new
                // request instead of subscribing to a finished channel.
                self.in_flight
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(url);
                let _ = tx.send(result.clone());
                result
            }
        }
    }

    /// Time left on the shared cooldown, if one is active.
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        self.cooldown
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remaining(Instant::now())
    }

    /// Number of cached responses (fresh or stale).
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Drop cache entries whose TTL has lapsed.
    pub fn evict_stale_cache(&self) -> usize {
        let now = Instant::now();
        let before = self.cache.len();
        self.cache.retain(|_, entry| entry.is_fresh(now));
        before - self.cache.len()
    }

    async fn fetch_uncoalesced(&self, url: &str) -> FetchResult {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.wait_for_cooldown().await;
            match self.send_once(url).await {
                Ok(value) => {
                    self.cooldown
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .note_success();
                    return Ok(value);
                }
                Err(FeedError::Throttled { retry_after }) => {
                    let wait = self
                        .cooldown
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .note_throttled(&self.config.throttle, retry_after, Instant::now());
                    warn!(
                        url,
                        wait_ms = wait.as_millis() as u64,
                        "upstream throttled, cooling down"
                    );
                    // Surface immediately; the next tick waits out the
                    // shared cooldown instead of blocking this caller.
                    return Err(FeedError::Throttled { retry_after });
                }
                Err(e) if e.is_transient() && attempt < self.config.retry.max_attempts() => {
                    let delay = self.config.retry.delay_for(attempt);
                    debug!(
                        url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient feed error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn wait_for_cooldown(&self) {
        loop {
            let remaining = self
                .cooldown
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remaining(Instant::now());
            match remaining {
                Some(wait) => tokio::time::sleep(wait).await,
                None => return,
            }
        }
    }

    async fn send_once(&self, url: &str) -> FetchResult {
        let mut request = self.http.get(url).header(ACCEPT, "application/json");
        if let Some(key) = &self.config.api_key {
            request = request.header("x-api-key", key);
        }
        let response = request.send().await.map_err(FeedError::from)?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FeedError::Throttled {
                retry_after: parse_retry_after(response.headers()),
            });
        }
        if status == StatusCode::NOT_FOUND {
            return Err(FeedError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(FeedError::Upstream {
                status: status.as_u16(),
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| FeedError::Parse(e.to_string()))
    }
}

/// Parse a `Retry-After` header given in whole seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal HTTP stub: answers every connection with the same response
    /// and counts requests. `connection: close` keeps reqwest from reusing
    /// sockets so the count equals the request count.
    async fn spawn_stub(
        status_line: &'static str,
        extra_headers: &'static str,
        body: &'static str,
        delay: Duration,
    ) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let response = format!(
                    "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\n{extra_headers}connection: close\r\n\r\n{body}",
                    body.len()
                );
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        (format!("http://{addr}/data"), hits)
    }

    fn test_client(retry: RetryPolicy) -> FeedClient {
        FeedClient::new(FeedClientConfig {
            request_timeout: Duration::from_secs(5),
            api_key: None,
            throttle: ThrottlePolicy::default().without_jitter(),
            retry,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let (url, hits) = spawn_stub("HTTP/1.1 200 OK", "", r#"{"ok":1}"#, Duration::ZERO).await;
        let client = test_client(RetryPolicy::default());

        let first = client.fetch(&url, Duration::from_secs(60)).await.unwrap();
        let second = client.fetch(&url, Duration::from_secs(60)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(client.cache_len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_coalesce() {
        let (url, hits) = spawn_stub(
            "HTTP/1.1 200 OK",
            "",
            r#"{"ok":true}"#,
            Duration::from_millis(300),
        )
        .await;
        let client = Arc::new(test_client(RetryPolicy::default()));

        // Zero TTL: any sharing must come from coalescing, not the cache.
        let (a, b, c, d) = tokio::join!(
            client.fetch(&url, Duration::ZERO),
            client.fetch(&url, Duration::ZERO),
            client.fetch(&url, Duration::ZERO),
            client.fetch(&url, Duration::ZERO),
        );

        for result in [a, b, c, d] {
            assert_eq!(result.unwrap()["ok"], true);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_throttle_sets_shared_cooldown() {
        let (url, hits) = spawn_stub(
            "HTTP/1.1 429 Too Many Requests",
            "retry-after: 30\r\n",
            "{}",
            Duration::ZERO,
        )
        .await;
        let client = test_client(RetryPolicy::default());

        let err = client.fetch(&url, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(
            err,
            FeedError::Throttled {
                retry_after: Some(d)
            } if d == Duration::from_secs(30)
        ));
        // A single throttled request: no retries burned on it.
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let remaining = client.cooldown_remaining().unwrap();
        assert!(remaining > Duration::from_secs(25));
        assert!(remaining <= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_no_request_before_cooldown_elapses() {
        let (throttled_url, _) = spawn_stub(
            "HTTP/1.1 429 Too Many Requests",
            "retry-after: 1\r\n",
            "{}",
            Duration::ZERO,
        )
        .await;
        let (ok_url, ok_hits) =
            spawn_stub("HTTP/1.1 200 OK", "", r#"{"ok":1}"#, Duration::ZERO).await;
        let client = test_client(RetryPolicy::default());

        client
            .fetch(&throttled_url, Duration::from_secs(1))
            .await
            .unwrap_err();

        // The cooldown applies to every caller, not just the throttled one.
        let started = std::time::Instant::now();
        client.fetch(&ok_url, Duration::from_secs(1)).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(900));
        assert_eq!(ok_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_found_surfaces_immediately() {
        let (url, hits) =
            spawn_stub("HTTP/1.1 404 Not Found", "", "{}", Duration::ZERO).await;
        let client = test_client(RetryPolicy::default());

        let err = client.fetch(&url, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, FeedError::NotFound(_)));
        assert!(err.is_permanent());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_errors_retry_up_to_cap() {
        let (url, hits) = spawn_stub(
            "HTTP/1.1 500 Internal Server Error",
            "",
            "{}",
            Duration::ZERO,
        )
        .await;
        let client = test_client(RetryPolicy::new(2, Duration::from_millis(10)));

        let err = client.fetch(&url, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, FeedError::Upstream { status: 500 }));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_parse_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, "17".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(17)));

        headers.insert(RETRY_AFTER, "soon".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_cache_entry_freshness() {
        let entry = CacheEntry {
            value: Value::Null,
            fetched_at: Instant::now(),
            ttl: Duration::from_secs(1),
        };
        assert!(entry.is_fresh(entry.fetched_at));
        assert!(entry.is_fresh(entry.fetched_at + Duration::from_millis(999)));
        assert!(!entry.is_fresh(entry.fetched_at + Duration::from_secs(1)));
    }
}
