//! Per-service three-state circuit breaker.
//!
//! Unlike a breaker that wraps a `Result`-returning future end to end, this
//! one separates admission (`poll`) from outcome reporting (`report_success`
//! / `report_failure`) so a caller can classify a client cancellation as
//! neither — cancellations must never advance the failure/success counters
//! (SPEC_FULL.md §4.4, §4.6).

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use log::{info, warn};

/// Observable breaker state. Numeric values match the gauge encoding in
/// SPEC_FULL.md §4.8 (`circuit_breaker_state`: 0=Closed, 1=Open, 2=HalfOpen).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Outcome of one admitted request, as classified by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Request may proceed to the inner handler.
    Admit,
    /// Request may proceed, and it is the single HalfOpen probe: its outcome
    /// must be reported to resolve HalfOpen back to Closed or Open.
    Probe,
    /// Breaker is Open and the reset timeout has not elapsed; reject.
    Rejected,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u64,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Three-state breaker guarding one service's upstream.
///
/// State reads/writes are atomic (`AtomicU8`), the failure count is a
/// separate atomic, and `open_since` lives behind a `RwLock` only because
/// `Instant` has no lock-free representation — the critical section never
/// spans I/O.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: AtomicU8,
    failure_count: AtomicU64,
    open_since: RwLock<Option<Instant>>,
    /// Single-permit gate: true while a HalfOpen probe is in flight.
    probe_in_flight: AtomicBool,
    /// When the current probe was admitted. Used to detect a probe whose
    /// caller was cancelled before it ever called `report()` — otherwise
    /// the permit stays claimed and the breaker wedges in HalfOpen forever
    /// (SPEC_FULL.md §4.4, §4.6).
    probe_started: RwLock<Option<Instant>>,
    name: String,
}

impl CircuitBreaker {
    pub fn new(name: String, config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: AtomicU8::new(CircuitState::Closed as u8),
            failure_count: AtomicU64::new(0),
            open_since: RwLock::new(None),
            probe_in_flight: AtomicBool::new(false),
            probe_started: RwLock::new(None),
            name,
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Checks whether a request may be admitted, performing the
    /// Open-to-HalfOpen transition on reset-timeout elapse.
    pub fn poll(&self) -> Admission {
        match self.state() {
            CircuitState::Closed => Admission::Admit,
            CircuitState::HalfOpen => {
                if self.reclaim_abandoned_probe() {
                    // Forced back to Open because the outstanding probe was
                    // never resolved; this caller gets first shot at the
                    // reclaimed permit instead of waiting for admission to
                    // cycle through Open again.
                    return if self.try_enter_half_open() {
                        Admission::Probe
                    } else {
                        Admission::Rejected
                    };
                }

                // Only one probe in flight at a time; concurrent arrivals
                // while HalfOpen are rejected as if Open (§4.4).
                if self
                    .probe_in_flight
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    *self.probe_started.write().expect("probe_started lock poisoned") = Some(Instant::now());
                    Admission::Probe
                } else {
                    Admission::Rejected
                }
            }
            CircuitState::Open => {
                let elapsed = self
                    .open_since
                    .read()
                    .expect("open_since lock poisoned")
                    .map(|since| since.elapsed() >= self.config.reset_timeout)
                    .unwrap_or(false);

                if !elapsed {
                    return Admission::Rejected;
                }

                if self.try_enter_half_open() {
                    Admission::Probe
                } else {
                    Admission::Rejected
                }
            }
        }
    }

    /// If the outstanding HalfOpen probe has run longer than the reset
    /// timeout, its caller was cancelled before ever calling `report()` —
    /// a handler future dropped mid-flight skips all remaining code, and an
    /// explicitly cancelled one is deliberately excluded from `report()` by
    /// the middleware (§4.6). Either way the permit would stay claimed and
    /// `state` would stay HalfOpen forever with no admission ever
    /// resolving it. Detecting staleness here and forcing the breaker back
    /// to `Open` (with a fresh `open_since`) lets the next poll treat it
    /// exactly like a normal Open-to-HalfOpen transition. Returns true if
    /// this call performed the reclaim.
    fn reclaim_abandoned_probe(&self) -> bool {
        if !self.probe_in_flight.load(Ordering::Acquire) {
            return false;
        }
        let stale = self
            .probe_started
            .read()
            .expect("probe_started lock poisoned")
            .map(|started| started.elapsed() >= self.config.reset_timeout)
            .unwrap_or(false);
        if !stale {
            return false;
        }

        let reclaimed = self
            .state
            .compare_exchange(
                CircuitState::HalfOpen as u8,
                CircuitState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if reclaimed {
            *self.open_since.write().expect("open_since lock poisoned") = Some(Instant::now());
            self.probe_in_flight.store(false, Ordering::Release);
            *self.probe_started.write().expect("probe_started lock poisoned") = None;
            warn!(
                "circuit breaker {} reclaimed an abandoned half-open probe",
                self.name
            );
        }
        reclaimed
    }

    /// Claims the probe permit and flips Open to HalfOpen as one unit.
    /// Claiming the permit first means no observer can ever see
    /// state=HalfOpen with the permit still free — a second arrival reading
    /// HalfOpen between a state CAS and a later permit store could
    /// otherwise win the HalfOpen branch's own CAS and admit a second
    /// probe.
    fn try_enter_half_open(&self) -> bool {
        if self
            .probe_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        if self.transition_open_to_half_open() {
            *self.probe_started.write().expect("probe_started lock poisoned") = Some(Instant::now());
            true
        } else {
            // Unreachable in practice (holding the unique permit means no
            // one else can race this transition) but leaves no stuck
            // permit if it ever happens.
            self.probe_in_flight.store(false, Ordering::Release);
            false
        }
    }

    /// Records the outcome of an admitted request. Cancellations must not
    /// call this at all (§4.6).
    pub fn report(&self, outcome: Outcome) {
        match self.state() {
            CircuitState::Closed => match outcome {
                Outcome::Success => {
                    self.failure_count.store(0, Ordering::Relaxed);
                }
                Outcome::Failure => {
                    let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
                    if failures >= self.config.failure_threshold {
                        self.transition_to_open();
                    }
                }
            },
            CircuitState::HalfOpen => {
                self.probe_in_flight.store(false, Ordering::Release);
                *self.probe_started.write().expect("probe_started lock poisoned") = None;
                match outcome {
                    Outcome::Success => self.transition_to_closed(),
                    Outcome::Failure => self.transition_to_open(),
                }
            }
            CircuitState::Open => {
                // A stray report after a state flip; nothing to do.
            }
        }
    }

    fn transition_open_to_half_open(&self) -> bool {
        let won = self
            .state
            .compare_exchange(
                CircuitState::Open as u8,
                CircuitState::HalfOpen as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if won {
            info!("circuit breaker {} half-open, probing", self.name);
        }
        won
    }

    fn transition_to_open(&self) {
        self.state.store(CircuitState::Open as u8, Ordering::Release);
        *self.open_since.write().expect("open_since lock poisoned") = Some(Instant::now());
        self.probe_in_flight.store(false, Ordering::Release);
        *self.probe_started.write().expect("probe_started lock poisoned") = None;
        warn!("circuit breaker {} opened", self.name);
    }

    fn transition_to_closed(&self) {
        self.state.store(CircuitState::Closed as u8, Ordering::Release);
        self.failure_count.store(0, Ordering::Relaxed);
        info!("circuit breaker {} closed, service recovered", self.name);
    }
}
