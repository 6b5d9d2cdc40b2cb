use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex,
};

use rand::{rngs::StdRng, Rng, SeedableRng};
use shared::domain::EntityId;
use tracing::info;

/// Verdict of a failure policy for a single commit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitDecision {
    Proceed,
    Fail(String),
}

/// Decides whether a simulated backend call goes through.
///
/// The store consults the policy inside its write section, before touching
/// the record, so a `Fail` verdict always leaves data unchanged.
pub trait FailurePolicy: Send + Sync {
    fn decide(&self, entity_id: &EntityId) -> CommitDecision;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NeverFail;

impl FailurePolicy for NeverFail {
    fn decide(&self, _entity_id: &EntityId) -> CommitDecision {
        CommitDecision::Proceed
    }
}

/// Fails the next `n` commits, then lets everything through.
#[derive(Debug, Default)]
pub struct FailNext {
    remaining: AtomicUsize,
}

impl FailNext {
    pub fn new(count: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(count),
        }
    }

    pub fn arm(&self, count: usize) {
        self.remaining.store(count, Ordering::SeqCst);
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::SeqCst)
    }
}

impl FailurePolicy for FailNext {
    fn decide(&self, _entity_id: &EntityId) -> CommitDecision {
        let consumed = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        match consumed {
            Ok(_) => CommitDecision::Fail("injected failure".into()),
            Err(_) => CommitDecision::Proceed,
        }
    }
}

/// Fails each commit independently with probability `rate`.
pub struct RandomFailures {
    rate: f64,
    rng: Mutex<StdRng>,
}

impl RandomFailures {
    pub fn new(rate: f64) -> Self {
        Self::with_rng(rate, StdRng::from_entropy())
    }

    pub fn seeded(rate: f64, seed: u64) -> Self {
        Self::with_rng(rate, StdRng::seed_from_u64(seed))
    }

    fn with_rng(rate: f64, rng: StdRng) -> Self {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        Self {
            rate,
            rng: Mutex::new(rng),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl FailurePolicy for RandomFailures {
    fn decide(&self, _entity_id: &EntityId) -> CommitDecision {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if rng.gen_bool(self.rate) {
            CommitDecision::Fail("connection to backend interrupted".into())
        } else {
            CommitDecision::Proceed
        }
    }
}

/// Simulates a backend link that can be cut and restored at runtime.
#[derive(Debug)]
pub struct ConnectionSwitch {
    connected: AtomicBool,
}

impl Default for ConnectionSwitch {
    fn default() -> Self {
        Self {
            connected: AtomicBool::new(true),
        }
    }
}

impl ConnectionSwitch {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn set_connected(&self, connected: bool) {
        let previous = self.connected.swap(connected, Ordering::SeqCst);
        if previous != connected {
            if connected {
                info!("backend connection restored");
            } else {
                info!("backend connection lost");
            }
        }
    }
}

impl FailurePolicy for ConnectionSwitch {
    fn decide(&self, _entity_id: &EntityId) -> CommitDecision {
        if self.is_connected() {
            CommitDecision::Proceed
        } else {
            CommitDecision::Fail("backend offline".into())
        }
    }
}

#[cfg(test)]
#[path = "tests/failure_tests.rs"]
mod tests;
