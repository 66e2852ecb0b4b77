//! Circuit breaker for instance protection.
//!
//! # States
//! - Closed: normal operation, failures accumulate
//! - Open: instance assumed down, excluded from selection
//! - Half-Open: probationary, eligible again until the next outcome
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= max_failures
//! Open → Half-Open: recovery timeout elapsed since last failure (checked at selection time)
//! Half-Open → Closed: request succeeds
//! Half-Open → Open: request fails (zero tolerance)
//! Open/Half-Open → Closed: health probe flips the instance back to healthy
//! ```
//!
//! # Design Decisions
//! - Per-instance circuit breaker (not global)
//! - No terminal state; the machine cycles for the lifetime of the instance
//! - `is_healthy` is derived from the state plus the last probe verdict, so an
//!   open circuit can never report healthy

use std::fmt;
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change produced by one of the breaker operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Result of evaluating an instance for the eligible set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub eligible: bool,
    pub transition: Option<Transition>,
}

/// Result of applying a health probe verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// `Some(new_value)` when the derived health flag flipped.
    pub health_changed: Option<bool>,
    pub transition: Option<Transition>,
}

/// Mutable failure-tracking state of one instance.
#[derive(Debug, Clone)]
pub struct Breaker {
    state: CircuitState,
    /// Verdict of the most recent health probe (true until a probe says otherwise).
    probe_healthy: bool,
    failure_count: u32,
    last_failure: Option<Instant>,
    last_failure_at: Option<SystemTime>,
}

impl Default for Breaker {
    fn default() -> Self {
        Self::new()
    }
}

impl Breaker {
    /// A closed, healthy breaker with zero counters.
    pub fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            probe_healthy: true,
            failure_count: 0,
            last_failure: None,
            last_failure_at: None,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Wall-clock time of the most recent failure, for reporting.
    pub fn last_failure_at(&self) -> Option<SystemTime> {
        self.last_failure_at
    }

    /// Healthy means "not open, and the last probe (if any) passed".
    pub fn is_healthy(&self) -> bool {
        self.state != CircuitState::Open && self.probe_healthy
    }

    fn recovery_elapsed(&self, recovery_timeout: Duration, now: Instant) -> bool {
        match self.last_failure {
            Some(at) => now.saturating_duration_since(at) > recovery_timeout,
            None => true,
        }
    }

    /// Decide whether the instance joins the eligible set, moving an open
    /// circuit to half-open once its recovery timeout has elapsed.
    pub fn admit(&mut self, recovery_timeout: Duration, now: Instant) -> Admission {
        match self.state {
            CircuitState::Open => {
                if self.recovery_elapsed(recovery_timeout, now) {
                    let transition = self.transition_to(CircuitState::HalfOpen);
                    Admission { eligible: true, transition }
                } else {
                    Admission { eligible: false, transition: None }
                }
            }
            CircuitState::Closed | CircuitState::HalfOpen => Admission {
                eligible: self.is_healthy(),
                transition: None,
            },
        }
    }

    /// Same decision as [`Breaker::admit`] without performing the transition.
    pub fn would_admit(&self, recovery_timeout: Duration, now: Instant) -> bool {
        match self.state {
            CircuitState::Open => self.recovery_elapsed(recovery_timeout, now),
            CircuitState::Closed | CircuitState::HalfOpen => self.is_healthy(),
        }
    }

    /// A dispatched request succeeded. The only path that clears failures.
    pub fn record_success(&mut self) -> Option<Transition> {
        self.failure_count = 0;
        self.transition_to(CircuitState::Closed)
    }

    /// A dispatched request failed.
    pub fn record_failure(&mut self, max_failures: u32, now: Instant) -> Option<Transition> {
        self.note_failure(now);
        if self.failure_count >= max_failures || self.state == CircuitState::HalfOpen {
            self.transition_to(CircuitState::Open)
        } else {
            None
        }
    }

    /// Fold a health probe verdict into the breaker.
    ///
    /// A passing probe closes an open or half-open circuit immediately,
    /// regardless of the recovery timer or how half-open was reached. A
    /// failing probe counts as a failure but only opens a closed circuit.
    pub fn apply_probe(&mut self, healthy: bool, max_failures: u32, now: Instant) -> ProbeOutcome {
        let was_healthy = self.is_healthy();
        let mut transition = None;

        if healthy {
            self.probe_healthy = true;
            if matches!(self.state, CircuitState::Open | CircuitState::HalfOpen) {
                transition = self.transition_to(CircuitState::Closed);
            }
        } else {
            self.probe_healthy = false;
            self.note_failure(now);
            if self.failure_count >= max_failures && self.state == CircuitState::Closed {
                transition = self.transition_to(CircuitState::Open);
            }
        }

        let is_healthy = self.is_healthy();
        ProbeOutcome {
            health_changed: (was_healthy != is_healthy).then_some(is_healthy),
            transition,
        }
    }

    fn note_failure(&mut self, now: Instant) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure = Some(now);
        self.last_failure_at = Some(SystemTime::now());
    }

    fn transition_to(&mut self, to: CircuitState) -> Option<Transition> {
        let from = self.state;
        if from == to {
            return None;
        }
        self.state = to;
        if to == CircuitState::Closed {
            self.failure_count = 0;
        }
        Some(Transition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECOVERY: Duration = Duration::from_secs(30);

    fn opened(max_failures: u32, now: Instant) -> Breaker {
        let mut b = Breaker::new();
        for _ in 0..max_failures {
            b.record_failure(max_failures, now);
        }
        b
    }

    #[test]
    fn test_opens_at_threshold() {
        let now = Instant::now();
        let mut b = Breaker::new();

        assert_eq!(b.record_failure(3, now), None);
        assert_eq!(b.record_failure(3, now), None);
        assert_eq!(b.state(), CircuitState::Closed);
        assert!(b.is_healthy());

        let t = b.record_failure(3, now).unwrap();
        assert_eq!(t.from, CircuitState::Closed);
        assert_eq!(t.to, CircuitState::Open);
        assert!(!b.is_healthy());
        assert_eq!(b.failure_count(), 3);
        assert!(b.last_failure_at().is_some());
    }

    #[test]
    fn test_open_excluded_until_recovery_elapsed() {
        let now = Instant::now();
        let mut b = opened(3, now);

        let adm = b.admit(RECOVERY, now + Duration::from_secs(10));
        assert!(!adm.eligible);
        assert_eq!(b.state(), CircuitState::Open);

        // Exactly at the boundary is still not past it.
        assert!(!b.would_admit(RECOVERY, now + RECOVERY));

        let adm = b.admit(RECOVERY, now + RECOVERY + Duration::from_millis(1));
        assert!(adm.eligible);
        assert_eq!(adm.transition.map(|t| t.to), Some(CircuitState::HalfOpen));
        assert_eq!(b.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_single_failure_reopens() {
        let now = Instant::now();
        let mut b = opened(5, now);
        b.admit(RECOVERY, now + RECOVERY * 2);
        assert_eq!(b.state(), CircuitState::HalfOpen);

        let t = b.record_failure(100, now + RECOVERY * 2).unwrap();
        assert_eq!(t.to, CircuitState::Open);
        assert!(!b.is_healthy());
    }

    #[test]
    fn test_half_open_success_closes() {
        let now = Instant::now();
        let mut b = opened(3, now);
        b.admit(RECOVERY, now + RECOVERY * 2);

        let t = b.record_success().unwrap();
        assert_eq!(t.from, CircuitState::HalfOpen);
        assert_eq!(t.to, CircuitState::Closed);
        assert_eq!(b.failure_count(), 0);
        assert!(b.is_healthy());
    }

    #[test]
    fn test_success_resets_failures_without_transition() {
        let now = Instant::now();
        let mut b = Breaker::new();
        b.record_failure(3, now);
        b.record_failure(3, now);
        assert_eq!(b.record_success(), None);
        assert_eq!(b.failure_count(), 0);
    }

    #[test]
    fn test_healthy_probe_closes_open_circuit() {
        let now = Instant::now();
        let mut b = opened(3, now);

        let outcome = b.apply_probe(true, 3, now);
        assert_eq!(outcome.health_changed, Some(true));
        assert_eq!(outcome.transition.map(|t| t.to), Some(CircuitState::Closed));
        assert_eq!(b.failure_count(), 0);
    }

    #[test]
    fn test_healthy_probe_closes_timer_half_open_circuit() {
        let now = Instant::now();
        let mut b = opened(3, now);
        let admission = b.admit(RECOVERY, now + RECOVERY * 2);
        assert_eq!(admission.transition.map(|t| t.to), Some(CircuitState::HalfOpen));
        assert!(b.is_healthy());

        let outcome = b.apply_probe(true, 3, now + RECOVERY * 2);
        assert_eq!(outcome.health_changed, None);
        assert_eq!(
            outcome.transition,
            Some(Transition { from: CircuitState::HalfOpen, to: CircuitState::Closed })
        );
        assert_eq!(b.failure_count(), 0);

        // A single stray failure no longer reopens it.
        assert_eq!(b.record_failure(3, now + RECOVERY * 2), None);
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[test]
    fn test_unhealthy_probes_open_closed_circuit() {
        let now = Instant::now();
        let mut b = Breaker::new();

        let first = b.apply_probe(false, 2, now);
        assert_eq!(first.health_changed, Some(false));
        assert_eq!(first.transition, None);
        assert_eq!(b.state(), CircuitState::Closed);
        assert!(!b.admit(RECOVERY, now).eligible);

        let second = b.apply_probe(false, 2, now);
        assert_eq!(second.health_changed, None);
        assert_eq!(second.transition.map(|t| t.to), Some(CircuitState::Open));
    }

    #[test]
    fn test_unhealthy_probe_keeps_half_open() {
        let now = Instant::now();
        let mut b = opened(1, now);
        b.admit(RECOVERY, now + RECOVERY * 2);

        let outcome = b.apply_probe(false, 1, now + RECOVERY * 2);
        assert_eq!(outcome.transition, None);
        assert_eq!(b.state(), CircuitState::HalfOpen);
        assert!(!b.is_healthy());
    }

    #[test]
    fn test_healthy_probe_recovers_unhealthy_closed_instance() {
        let now = Instant::now();
        let mut b = Breaker::new();
        b.apply_probe(false, 5, now);

        let outcome = b.apply_probe(true, 5, now);
        assert_eq!(outcome.health_changed, Some(true));
        assert_eq!(outcome.transition, None);
        // Failures are only cleared by a success or a circuit close.
        assert_eq!(b.failure_count(), 1);
    }
}
