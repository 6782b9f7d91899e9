//! Token bucket rate limiting for provider requests.

use std::sync::{Mutex, MutexGuard};

use tokio::time::{Duration, Instant};

use super::ProviderError;

/// Tokens are added at a constant rate and consumed per request.
#[derive(Debug)]
pub struct TokenBucket {
    /// Max tokens (= requests per minute).
    capacity: f32,
    tokens: f32,
    /// Tokens added per second.
    refill_rate: f32,
    last_refill: Instant,
}

impl TokenBucket {
    /// The bucket starts full.
    pub fn new(requests_per_minute: u32) -> Self {
        let capacity = requests_per_minute.max(1) as f32;
        Self {
            capacity,
            tokens: capacity,
            refill_rate: capacity / 60.0,
            last_refill: Instant::now(),
        }
    }

    /// Take one token, or return how long until one is available.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(self.wait_time())
        }
    }

    pub fn available(&mut self) -> f32 {
        self.refill();
        self.tokens
    }

    fn wait_time(&self) -> Duration {
        let tokens_needed = 1.0 - self.tokens;
        Duration::from_secs_f32(tokens_needed / self.refill_rate)
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f32();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

#[derive(Debug)]
struct LimiterState {
    bucket: TokenBucket,
    /// Set after the remote side answered 429.
    blocked_until: Option<Instant>,
}

/// Per-provider limiter shared by search and download calls.
#[derive(Debug)]
pub struct RateLimiter {
    provider: String,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(provider: impl Into<String>, requests_per_minute: u32) -> Self {
        Self {
            provider: provider.into(),
            state: Mutex::new(LimiterState {
                bucket: TokenBucket::new(requests_per_minute),
                blocked_until: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn try_acquire(&self) -> Result<(), ProviderError> {
        let mut state = self.state();
        if let Some(until) = state.blocked_until {
            let now = Instant::now();
            if until > now {
                return Err(ProviderError::RateLimited {
                    provider: self.provider.clone(),
                    retry_after_ms: (until - now).as_millis() as u64,
                });
            }
            state.blocked_until = None;
        }
        state
            .bucket
            .try_acquire()
            .map_err(|wait| ProviderError::RateLimited {
                provider: self.provider.clone(),
                retry_after_ms: wait.as_millis() as u64,
            })
    }

    /// Refuse requests for `duration`.
    pub fn block_for(&self, duration: Duration) {
        self.state().blocked_until = Some(Instant::now() + duration);
    }

    /// True while no request would be let through.
    pub fn is_exhausted(&self) -> bool {
        let mut state = self.state();
        let blocked = state.blocked_until.is_some_and(|until| until > Instant::now());
        blocked || state.bucket.available() < 1.0
    }
}
