use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::configuration::AdmissionSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Breaker {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// Only one concurrent probe is admitted while half-open.
    probing: bool,
}

/// WG's admission gate: an in-flight cap plus a three-state circuit
/// breaker, guarding the DQ publish call. Every field here is updated under
/// a lock that never spans an I/O suspension point, per spec.md §5 — the
/// lock only ever protects plain counters and enum state.
pub struct Admission {
    in_flight: AtomicU32,
    max_in_flight: u32,
    breaker: Mutex<Breaker>,
    threshold: u32,
    reset: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("in-flight publish cap reached")]
    Backpressure,
    #[error("circuit breaker open")]
    CircuitOpen,
}

/// Held for the duration of a publish attempt. Decrements the in-flight
/// counter on drop regardless of which exit path the handler takes.
pub struct AdmitGuard<'a> {
    admission: &'a Admission,
    was_probe: bool,
    settled: bool,
}

impl Admission {
    #[must_use]
    pub fn new(settings: &AdmissionSettings) -> Self {
        Self {
            in_flight: AtomicU32::new(0),
            max_in_flight: settings.max_in_flight,
            breaker: Mutex::new(Breaker {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probing: false,
            }),
            threshold: settings.breaker_threshold,
            reset: Duration::from_millis(settings.breaker_reset_ms),
        }
    }

    /// Admits a single publish attempt or rejects it. On success the
    /// caller must call `guard.succeeded()` or `guard.failed()` before it
    /// drops so the breaker learns the outcome; an undeclared drop is
    /// treated as neither (the in-flight counter still decrements).
    pub fn try_admit(&self) -> Result<AdmitGuard<'_>, AdmissionError> {
        let was_probe = {
            let mut breaker = self.breaker.lock().unwrap();
            match breaker.state {
                CircuitState::Closed => false,
                CircuitState::Open => {
                    let elapsed = breaker.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::MAX);
                    if elapsed < self.reset {
                        return Err(AdmissionError::CircuitOpen);
                    }
                    breaker.state = CircuitState::HalfOpen;
                    breaker.probing = true;
                    true
                }
                CircuitState::HalfOpen => {
                    if breaker.probing {
                        return Err(AdmissionError::CircuitOpen);
                    }
                    breaker.probing = true;
                    true
                }
            }
        };

        if self.in_flight.fetch_add(1, Ordering::SeqCst) >= self.max_in_flight {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if was_probe {
                let mut breaker = self.breaker.lock().unwrap();
                breaker.probing = false;
            }
            return Err(AdmissionError::Backpressure);
        }

        Ok(AdmitGuard {
            admission: self,
            was_probe,
            settled: false,
        })
    }

    pub fn retry_after_ms(&self) -> u64 {
        let breaker = self.breaker.lock().unwrap();
        match (breaker.state, breaker.opened_at) {
            (CircuitState::Open, Some(opened_at)) => {
                self.reset.saturating_sub(opened_at.elapsed()).as_millis() as u64
            }
            _ => self.reset.as_millis() as u64,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> (u32, CircuitState, u32) {
        let breaker = self.breaker.lock().unwrap();
        (
            self.in_flight.load(Ordering::SeqCst),
            breaker.state,
            breaker.consecutive_failures,
        )
    }

    fn on_success(&self, was_probe: bool) {
        let mut breaker = self.breaker.lock().unwrap();
        if was_probe {
            breaker.probing = false;
        }
        breaker.state = CircuitState::Closed;
        breaker.consecutive_failures = 0;
        breaker.opened_at = None;
    }

    fn on_failure(&self, was_probe: bool) {
        let mut breaker = self.breaker.lock().unwrap();
        if was_probe {
            breaker.probing = false;
            breaker.state = CircuitState::Open;
            breaker.opened_at = Some(Instant::now());
            return;
        }
        breaker.consecutive_failures += 1;
        if breaker.consecutive_failures >= self.threshold {
            breaker.state = CircuitState::Open;
            breaker.opened_at = Some(Instant::now());
        }
    }
}

impl AdmitGuard<'_> {
    pub fn succeeded(mut self) {
        self.admission.on_success(self.was_probe);
        self.settled = true;
    }

    pub fn failed(mut self) {
        self.admission.on_failure(self.was_probe);
        self.settled = true;
    }
}

impl Drop for AdmitGuard<'_> {
    fn drop(&mut self) {
        self.admission.in_flight.fetch_sub(1, Ordering::SeqCst);
        if !self.settled && self.was_probe {
            // A guard dropped without an explicit outcome during a probe
            // (e.g. the handler panicked) is treated as a failed probe so
            // the breaker doesn't get stuck half-open forever.
            self.admission.on_failure(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AdmissionSettings {
        AdmissionSettings {
            max_in_flight: 2,
            breaker_threshold: 3,
            breaker_reset_ms: 50,
        }
    }

    #[test]
    fn in_flight_cap_rejects_past_the_limit() {
        let admission = Admission::new(&settings());
        let g1 = admission.try_admit().expect("first admitted");
        let g2 = admission.try_admit().expect("second admitted");
        assert!(matches!(admission.try_admit(), Err(AdmissionError::Backpressure)));
        drop(g1);
        drop(g2);
    }

    #[test]
    fn breaker_opens_after_threshold_consecutive_failures() {
        let admission = Admission::new(&settings());
        for _ in 0..3 {
            let guard = admission.try_admit().expect("admitted while closed");
            guard.failed();
        }
        assert!(matches!(admission.try_admit(), Err(AdmissionError::CircuitOpen)));
    }

    #[test]
    fn a_single_success_resets_the_failure_count() {
        let admission = Admission::new(&settings());
        for _ in 0..2 {
            let guard = admission.try_admit().expect("admitted");
            guard.failed();
        }
        let guard = admission.try_admit().expect("admitted");
        guard.succeeded();
        // Two more failures shouldn't trip the threshold of 3 since the
        // success reset the streak.
        for _ in 0..2 {
            let guard = admission.try_admit().expect("admitted while closed");
            guard.failed();
        }
        assert!(admission.try_admit().is_ok());
    }

    #[test]
    fn half_open_admits_a_single_probe_after_reset() {
        let admission = Admission::new(&settings());
        for _ in 0..3 {
            let guard = admission.try_admit().expect("admitted while closed");
            guard.failed();
        }
        assert!(matches!(admission.try_admit(), Err(AdmissionError::CircuitOpen)));

        std::thread::sleep(Duration::from_millis(60));

        let probe = admission.try_admit().expect("probe admitted after reset window");
        assert!(matches!(admission.try_admit(), Err(AdmissionError::CircuitOpen)));
        probe.succeeded();
        assert!(admission.try_admit().is_ok());
    }
}
