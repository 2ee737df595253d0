//! Rate-limited delivery client.
//!
//! All outbound telemetry shares one remote endpoint, so every request
//! passes through a token bucket before it is sent. A request either waits
//! for a token or fails with [`ReportError::Cancelled`] when the cycle's
//! cancellation token fires; it is never sent half-limited.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode, header};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::ReportError;

/// Fixed request rate toward the telemetry endpoint (requests per second).
pub const DELIVERY_RPS: u32 = 5;

/// Fixed burst capacity toward the telemetry endpoint.
pub const DELIVERY_BURST: u32 = 10;

/// Default request timeout (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client with a token-bucket limiter in front of every send.
pub struct DeliveryClient {
    http: Client,
    limiter: TokenBucket,
}

impl DeliveryClient {
    /// Create a client with the fixed delivery limits.
    ///
    /// # Errors
    /// Returns `ReportError::Http` if the underlying client cannot be built.
    pub fn new() -> Result<Self, ReportError> {
        Self::with_limits(DELIVERY_RPS, DELIVERY_BURST)
    }

    /// Create a client with explicit rate and burst limits.
    pub fn with_limits(rps: u32, burst: u32) -> Result<Self, ReportError> {
        let http = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            http,
            limiter: TokenBucket::new(rps, burst),
        })
    }

    /// POST a JSON body, returning `Ok` only on HTTP 200.
    ///
    /// Blocks on the limiter first; a cancellation while waiting fails with
    /// [`ReportError::Cancelled`] without sending anything, and a
    /// cancellation mid-send aborts the in-flight request. Transport errors
    /// and non-200 statuses surface as-is, with no retry.
    pub async fn post(
        &self,
        cancel: &CancellationToken,
        url: &str,
        body: &Value,
    ) -> Result<(), ReportError> {
        self.limiter.acquire(cancel).await?;

        let send = self
            .http
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(body)
            .send();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ReportError::Cancelled),
            response = send => response?,
        };

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ReportError::UnexpectedStatus(status.as_u16()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for DeliveryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryClient")
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

/// Async token bucket: `rate` tokens per second, up to `capacity` stored.
#[derive(Debug)]
struct TokenBucket {
    rate: f64,
    capacity: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    refilled: Instant,
}

impl TokenBucket {
    fn new(rps: u32, burst: u32) -> Self {
        Self {
            rate: f64::from(rps.max(1)),
            capacity: f64::from(burst.max(1)),
            state: Mutex::new(BucketState {
                tokens: f64::from(burst.max(1)),
                refilled: Instant::now(),
            }),
        }
    }

    /// Take one token, sleeping until one accrues.
    ///
    /// An already-cancelled token fails immediately, even if a token is
    /// available.
    async fn acquire(&self, cancel: &CancellationToken) -> Result<(), ReportError> {
        loop {
            if cancel.is_cancelled() {
                return Err(ReportError::Cancelled);
            }
            let wait = {
                let mut state = self.state.lock().expect("bucket state poisoned");
                let now = Instant::now();
                let elapsed = now.duration_since(state.refilled).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
                state.refilled = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }
                Duration::from_secs_f64((1.0 - state.tokens) / self.rate)
            };

            tokio::select! {
                _ = cancel.cancelled() => return Err(ReportError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}
