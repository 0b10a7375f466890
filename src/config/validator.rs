//! Rate-limited configuration validation.
//!
//! Operators can submit candidate cache configurations for validation
//! without restarting the service. Validation itself is cheap, but the
//! endpoint is rate-limited per client id so a misbehaving automation loop
//! cannot spin on it: a per-minute cap, a per-hour cap, and a per-request
//! cooldown, all enforced with sliding windows. A rejected call is reported
//! as a non-valid result with a wait-time suggestion rather than an error,
//! and is not counted against the windows.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use super::cache::CacheConfig;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Limits for validation calls per client id.
#[derive(Debug, Clone)]
pub struct ValidationRateLimits {
    pub per_minute: usize,
    pub per_hour: usize,
    pub cooldown: Duration,
}

impl Default for ValidationRateLimits {
    fn default() -> Self {
        Self {
            per_minute: 60,
            per_hour: 1000,
            cooldown: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Default)]
struct ClientWindow {
    /// Accepted call instants within the trailing hour (covers the minute
    /// window as a prefix).
    accepted: VecDeque<Instant>,
    last_accepted: Option<Instant>,
}

impl ClientWindow {
    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.accepted.front() {
            if now.duration_since(*front) >= HOUR {
                self.accepted.pop_front();
            } else {
                break;
            }
        }
    }

    fn last_minute(&self, now: Instant) -> usize {
        self.accepted
            .iter()
            .rev()
            .take_while(|t| now.duration_since(**t) < MINUTE)
            .count()
    }
}

/// Snapshot of a client's validation-call accounting.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitInfo {
    pub requests_last_minute: usize,
    pub requests_last_hour: usize,
    /// Seconds until the cooldown allows another call; zero when a call
    /// would be accepted right now.
    pub cooldown_remaining_secs: f64,
}

/// Result of a validation call.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Validates candidate configurations, enforcing per-client rate limits.
pub struct ConfigValidator {
    limits: ValidationRateLimits,
    clients: Mutex<HashMap<String, ClientWindow>>,
}

impl ConfigValidator {
    pub fn new(limits: ValidationRateLimits) -> Self {
        Self {
            limits,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Validate a candidate cache configuration on behalf of `client_id`.
    ///
    /// Rate-limit violations produce `is_valid = false` with a suggestion
    /// describing how long to wait; they never panic or error.
    pub fn validate_cache_config(&self, client_id: &str, candidate: &CacheConfig) -> ValidationOutcome {
        if let Err(wait) = self.check_rate_limit(client_id) {
            return ValidationOutcome {
                is_valid: false,
                errors: vec!["validation rate limit exceeded".to_string()],
                suggestion: Some(format!(
                    "retry after {:.1}s (limits: {}/min, {}/hour, {:.0}ms cooldown)",
                    wait.as_secs_f64(),
                    self.limits.per_minute,
                    self.limits.per_hour,
                    self.limits.cooldown.as_millis()
                )),
            };
        }

        match candidate.validate() {
            Ok(()) => ValidationOutcome {
                is_valid: true,
                errors: vec![],
                suggestion: None,
            },
            Err(e) => ValidationOutcome {
                is_valid: false,
                errors: vec![e.to_string()],
                suggestion: None,
            },
        }
    }

    /// Record-and-check a validation call for `client_id`. Returns the
    /// required wait time on violation; accepted calls are recorded in the
    /// sliding windows.
    pub fn check_rate_limit(&self, client_id: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let mut clients = self.clients.lock();
        let window = clients.entry(client_id.to_string()).or_default();
        window.prune(now);

        if let Some(last) = window.last_accepted {
            let since = now.duration_since(last);
            if since < self.limits.cooldown {
                return Err(self.limits.cooldown - since);
            }
        }

        if window.accepted.len() >= self.limits.per_hour {
            // Wait until the oldest call ages out of the hour window.
            let oldest = *window.accepted.front().expect("non-empty window");
            return Err(HOUR.saturating_sub(now.duration_since(oldest)));
        }

        let last_minute = window.last_minute(now);
        if last_minute >= self.limits.per_minute {
            let idx = window.accepted.len() - last_minute;
            let oldest_in_minute = window.accepted[idx];
            return Err(MINUTE.saturating_sub(now.duration_since(oldest_in_minute)));
        }

        window.accepted.push_back(now);
        window.last_accepted = Some(now);
        Ok(())
    }

    /// Current accounting for a client id.
    pub fn info(&self, client_id: &str) -> RateLimitInfo {
        let now = Instant::now();
        let mut clients = self.clients.lock();
        let window = clients.entry(client_id.to_string()).or_default();
        window.prune(now);

        let cooldown_remaining = window
            .last_accepted
            .map(|last| {
                self.limits
                    .cooldown
                    .saturating_sub(now.duration_since(last))
            })
            .unwrap_or(Duration::ZERO);

        RateLimitInfo {
            requests_last_minute: window.last_minute(now),
            requests_last_hour: window.accepted.len(),
            cooldown_remaining_secs: cooldown_remaining.as_secs_f64(),
        }
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new(ValidationRateLimits::default())
    }
}
