//! Paged HTTP fetcher for the price listing endpoint.
//!
//! Posts one form-encoded request per page, waits a politeness delay between
//! requests, and retries transient failures with exponential backoff. The
//! HTTP client is created lazily on first use.

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use rand::Rng;
use reqwest::blocking::Client;
use reqwest::header;

use crate::config;
use crate::error::{PriceError, Result};
use crate::models::{PageRequest, RawPage};

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first. At least 1.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Add up to 25% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: config::DEFAULT_MAX_ATTEMPTS,
            base_delay: config::DEFAULT_BACKOFF,
            max_delay: config::DEFAULT_MAX_BACKOFF,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Backoff to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay);
        if self.jitter && !delay.is_zero() {
            let extra = rand::thread_rng().gen_range(0.0..0.25);
            delay.mul_f64(1.0 + extra).min(self.max_delay)
        } else {
            delay
        }
    }
}

// ---------------------------------------------------------------------------
// FetchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub endpoint: String,
    pub timeout: Duration,
    /// Minimum spacing between consecutive requests.
    pub request_delay: Duration,
    pub page_size: u32,
    /// Stop after this many pages even if the source reports more.
    pub max_pages: Option<u32>,
    pub retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            endpoint: config::PRICE_API_URL.to_string(),
            timeout: config::DEFAULT_TIMEOUT,
            request_delay: config::DEFAULT_REQUEST_DELAY,
            page_size: config::DEFAULT_PAGE_SIZE,
            max_pages: None,
            retry: RetryPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// PageSource
// ---------------------------------------------------------------------------

/// Anything that can produce the raw page for a request.
pub trait PageSource {
    /// Fetch one page, or fail with [`PriceError::Network`].
    fn fetch_page(&mut self, request: &PageRequest) -> Result<RawPage>;
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

pub struct HttpFetcher {
    config: FetchConfig,
    client: Option<Client>,
    last_request: Option<Instant>,
    requests: u64,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Self {
        Self {
            config,
            client: None,
            last_request: None,
            requests: 0,
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Number of HTTP requests issued so far, retries included.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Lazy HTTP client, created on first use.
    fn client(&mut self) -> Result<&Client> {
        if self.client.is_none() {
            let client = Client::builder()
                .timeout(self.config.timeout)
                .user_agent(config::USER_AGENT)
                .redirect(reqwest::redirect::Policy::limited(10))
                .build()?;
            self.client = Some(client);
        }
        self.client
            .as_ref()
            .ok_or_else(|| PriceError::InvalidArgument("HTTP client unavailable".to_string()))
    }

    /// Sleep until the politeness delay since the previous request has passed.
    fn throttle(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.config.request_delay {
                thread::sleep(self.config.request_delay - elapsed);
            }
        }
        self.last_request = Some(Instant::now());
    }

    fn send_once(&mut self, request: &PageRequest) -> Result<String> {
        self.throttle();
        self.requests += 1;
        let url = self.config.endpoint.clone();
        let client = self.client()?.clone();
        let resp = client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .form(request)
            .send()?;
        debug!("POST {} page {} -> {}", url, request.page_index(), resp.status());
        let resp = resp.error_for_status()?;
        Ok(resp.text()?)
    }

    /// Close the HTTP client, if open.
    pub fn close(&mut self) {
        self.client = None;
    }
}

impl PageSource for HttpFetcher {
    fn fetch_page(&mut self, request: &PageRequest) -> Result<RawPage> {
        let policy = self.config.retry.clone();
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.send_once(request) {
                Ok(body) => {
                    return Ok(RawPage {
                        request: request.clone(),
                        body,
                    })
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        "Page {} attempt {}/{} failed: {}; retrying in {:?}",
                        request.page_index(),
                        attempt,
                        max_attempts,
                        e,
                        delay
                    );
                    thread::sleep(delay);
                }
                Err(e) => {
                    return Err(PriceError::Network {
                        url: self.config.endpoint.clone(),
                        attempts: attempt,
                        message: e.to_string(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            jitter: false,
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(5));
        assert_eq!(policy.delay_for(40), Duration::from_secs(5));
    }

    #[test]
    fn jitter_stays_within_cap() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(110),
            jitter: true,
        };
        for _ in 0..20 {
            let d = policy.delay_for(1);
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(110));
        }
    }

    #[test]
    fn unreachable_endpoint_is_network_error() {
        let mut fetcher = HttpFetcher::new(FetchConfig {
            endpoint: "http://127.0.0.1:9/getPriceData.html".to_string(),
            timeout: Duration::from_secs(2),
            request_delay: Duration::ZERO,
            page_size: 10,
            max_pages: None,
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(10),
                jitter: false,
            },
        });
        let req = PageRequest {
            limit: 10,
            current: Some(1),
            ..Default::default()
        };
        match fetcher.fetch_page(&req) {
            Err(PriceError::Network { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected network error, got {:?}", other.map(|p| p.body)),
        }
        assert_eq!(fetcher.requests(), 2);
    }
}
