//! Circuit breaker for outbound model calls.
//!
//! Tracks failures per `(operation, strategy)` pair and temporarily rejects
//! calls after a threshold is exceeded, so an unhealthy provider is not
//! hammered while it recovers.
//!
//! # States
//!
//! - **Closed**: normal operation, failures are counted.
//! - **Open**: calls are rejected until the cooldown elapses.
//! - **Half-Open**: a single probe is allowed through; enough consecutive
//!   probe successes close the circuit, any probe failure reopens it.
//!
//! State lives in one packed atomic (upper 2 bits state, lower 30 bits
//! counter) so the hot path is lock-free. The half-open probe permit is a
//! separate flag: while one probe is in flight, `try_acquire` rejects.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Breaker tuning, derived from a strategy config.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Failures in the current window that trip the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before probing.
    pub cooldown: Duration,
    /// Consecutive half-open successes required to close.
    pub required_successes: u32,
}

/// Rejection returned while the circuit is open or a probe is in flight.
#[derive(Debug, Error)]
#[error("circuit breaker open for '{name}', retry in {retry_after_secs}s")]
pub struct BreakerRejection {
    pub name: String,
    pub retry_after_secs: u64,
}

// State encoding: upper 2 bits = state, lower 30 bits = counter
const STATE_CLOSED: u32 = 0;
const STATE_OPEN: u32 = 1;
const STATE_HALF_OPEN: u32 = 2;
const STATE_SHIFT: u32 = 30;
const COUNTER_MASK: u32 = (1 << STATE_SHIFT) - 1;

pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    /// Packed state: upper 2 bits = state, lower 30 bits = failure count
    /// (closed) or consecutive probe successes (half-open).
    state_and_counter: AtomicU32,
    /// Millis since UNIX epoch when the circuit opened.
    opened_at: AtomicU64,
    /// Set while a half-open probe is in flight.
    probe_in_flight: AtomicBool,
    /// Total state transitions, for metrics.
    transitions: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state_and_counter: AtomicU32::new(pack_state(STATE_CLOSED, 0)),
            opened_at: AtomicU64::new(0),
            probe_in_flight: AtomicBool::new(false),
            transitions: AtomicU64::new(0),
        }
    }

    /// Ask to make a call.
    ///
    /// Returns `Ok(())` when the call may proceed. In half-open state only
    /// one caller at a time wins the probe permit; the caller must report
    /// the outcome via [`record_success`](Self::record_success),
    /// [`record_failure`](Self::record_failure), or
    /// [`release_probe`](Self::release_probe) (cancellation).
    pub fn try_acquire(&self) -> Result<(), BreakerRejection> {
        let packed = self.state_and_counter.load(Ordering::Acquire);
        let (state, _) = unpack_state(packed);

        match state {
            STATE_CLOSED => Ok(()),
            STATE_OPEN => {
                let opened_at = self.opened_at.load(Ordering::Acquire);
                let now = current_time_millis();
                let cooldown = self.config.cooldown.as_millis() as u64;

                if now >= opened_at + cooldown {
                    self.transition_to_half_open();
                    self.acquire_probe()
                } else {
                    Err(BreakerRejection {
                        name: self.name.clone(),
                        retry_after_secs: (opened_at + cooldown - now).div_ceil(1000),
                    })
                }
            }
            STATE_HALF_OPEN => self.acquire_probe(),
            _ => Ok(()),
        }
    }

    fn acquire_probe(&self) -> Result<(), BreakerRejection> {
        if self
            .probe_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Ok(())
        } else {
            Err(BreakerRejection {
                name: self.name.clone(),
                retry_after_secs: 1,
            })
        }
    }

    /// Release a half-open probe permit without recording an outcome
    /// (caller cancelled).
    pub fn release_probe(&self) {
        self.probe_in_flight.store(false, Ordering::Release);
    }

    pub fn record_success(&self) {
        loop {
            let packed = self.state_and_counter.load(Ordering::Acquire);
            let (state, counter) = unpack_state(packed);

            match state {
                STATE_CLOSED => {
                    if counter == 0 {
                        return;
                    }
                    if self
                        .state_and_counter
                        .compare_exchange_weak(
                            packed,
                            pack_state(STATE_CLOSED, 0),
                            Ordering::Release,
                            Ordering::Relaxed,
                        )
                        .is_ok()
                    {
                        debug!(breaker = %self.name, "failure counter reset after success");
                        return;
                    }
                    std::hint::spin_loop();
                }
                STATE_HALF_OPEN => {
                    self.release_probe();
                    let successes = counter + 1;
                    if successes >= self.config.required_successes {
                        self.transition_to_closed();
                        return;
                    }
                    if self
                        .state_and_counter
                        .compare_exchange_weak(
                            packed,
                            pack_state(STATE_HALF_OPEN, successes),
                            Ordering::Release,
                            Ordering::Relaxed,
                        )
                        .is_ok()
                    {
                        debug!(
                            breaker = %self.name,
                            successes,
                            required = self.config.required_successes,
                            "successful probe"
                        );
                        return;
                    }
                    std::hint::spin_loop();
                }
                _ => return,
            }
        }
    }

    pub fn record_failure(&self) {
        loop {
            let packed = self.state_and_counter.load(Ordering::Acquire);
            let (state, counter) = unpack_state(packed);

            match state {
                STATE_CLOSED => {
                    let failures = counter + 1;
                    if failures >= self.config.failure_threshold {
                        self.transition_to_open();
                        return;
                    }
                    if self
                        .state_and_counter
                        .compare_exchange_weak(
                            packed,
                            pack_state(STATE_CLOSED, failures),
                            Ordering::Release,
                            Ordering::Relaxed,
                        )
                        .is_ok()
                    {
                        debug!(
                            breaker = %self.name,
                            failures,
                            threshold = self.config.failure_threshold,
                            "failure recorded"
                        );
                        return;
                    }
                    std::hint::spin_loop();
                }
                STATE_HALF_OPEN => {
                    // Any probe failure reopens the circuit.
                    self.release_probe();
                    self.transition_to_open();
                    return;
                }
                _ => return,
            }
        }
    }

    /// Current state, accounting for cooldown expiry on read.
    pub fn state(&self) -> CircuitState {
        let packed = self.state_and_counter.load(Ordering::Acquire);
        let (state, _) = unpack_state(packed);

        if state == STATE_OPEN {
            let opened_at = self.opened_at.load(Ordering::Acquire);
            let cooldown = self.config.cooldown.as_millis() as u64;
            if current_time_millis() >= opened_at + cooldown {
                return CircuitState::HalfOpen;
            }
        }

        match state {
            STATE_OPEN => CircuitState::Open,
            STATE_HALF_OPEN => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    pub fn failure_count(&self) -> u32 {
        let (state, counter) = unpack_state(self.state_and_counter.load(Ordering::Acquire));
        if state == STATE_CLOSED { counter } else { 0 }
    }

    pub fn transition_count(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn transition_to_open(&self) {
        self.opened_at
            .store(current_time_millis(), Ordering::Release);
        self.state_and_counter
            .store(pack_state(STATE_OPEN, 0), Ordering::Release);
        self.transitions.fetch_add(1, Ordering::Relaxed);
        warn!(
            breaker = %self.name,
            cooldown_ms = self.config.cooldown.as_millis() as u64,
            "Circuit breaker OPENED"
        );
    }

    fn transition_to_half_open(&self) {
        self.state_and_counter
            .store(pack_state(STATE_HALF_OPEN, 0), Ordering::Release);
        self.transitions.fetch_add(1, Ordering::Relaxed);
        info!(breaker = %self.name, "Circuit breaker HALF-OPEN, probing recovery");
    }

    fn transition_to_closed(&self) {
        self.state_and_counter
            .store(pack_state(STATE_CLOSED, 0), Ordering::Release);
        self.transitions.fetch_add(1, Ordering::Relaxed);
        info!(breaker = %self.name, "Circuit breaker CLOSED, recovered");
    }
}

fn pack_state(state: u32, counter: u32) -> u32 {
    (state << STATE_SHIFT) | (counter & COUNTER_MASK)
}

fn unpack_state(packed: u32) -> (u32, u32) {
    (packed >> STATE_SHIFT, packed & COUNTER_MASK)
}

fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}
