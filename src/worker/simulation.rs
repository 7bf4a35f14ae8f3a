//! Injectable processing policy.
//!
//! The worker's variable latency and probabilistic failure are modeled
//! behavior, not infrastructure faults. Both draws sit behind this trait so
//! tests can force deterministic outcomes.

use crate::config::WorkerConfig;
use rand::Rng;
use std::time::Duration;

pub trait ProcessingPolicy: Send + Sync {
    /// How long the simulated work should take.
    fn work_delay(&self) -> Duration;

    /// Whether this invocation ends in the modeled business failure.
    fn should_fail(&self) -> bool;
}

/// Production policy: uniform random delay and a fixed failure probability.
pub struct SimulatedPolicy {
    delay_min_ms: u64,
    delay_max_ms: u64,
    failure_probability: f64,
}

impl SimulatedPolicy {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            delay_min_ms: config.processing_delay_min_ms,
            delay_max_ms: config.processing_delay_max_ms,
            failure_probability: config.failure_probability,
        }
    }
}

impl ProcessingPolicy for SimulatedPolicy {
    fn work_delay(&self) -> Duration {
        let ms = rand::thread_rng().gen_range(self.delay_min_ms..=self.delay_max_ms);
        Duration::from_millis(ms)
    }

    fn should_fail(&self) -> bool {
        rand::thread_rng().gen_bool(self.failure_probability)
    }
}

/// Deterministic policy for tests.
pub struct FixedPolicy {
    pub delay: Duration,
    pub fail: bool,
}

impl ProcessingPolicy for FixedPolicy {
    fn work_delay(&self) -> Duration {
        self.delay
    }

    fn should_fail(&self) -> bool {
        self.fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_delay_stays_within_bounds() {
        let policy = SimulatedPolicy {
            delay_min_ms: 10,
            delay_max_ms: 20,
            failure_probability: 0.0,
        };
        for _ in 0..100 {
            let delay = policy.work_delay();
            assert!(delay >= Duration::from_millis(10));
            assert!(delay <= Duration::from_millis(20));
        }
    }

    #[test]
    fn failure_probability_extremes_are_deterministic() {
        let never = SimulatedPolicy {
            delay_min_ms: 0,
            delay_max_ms: 0,
            failure_probability: 0.0,
        };
        let always = SimulatedPolicy {
            delay_min_ms: 0,
            delay_max_ms: 0,
            failure_probability: 1.0,
        };
        for _ in 0..50 {
            assert!(!never.should_fail());
            assert!(always.should_fail());
        }
    }

    #[test]
    fn fixed_policy_returns_what_it_was_given() {
        let policy = FixedPolicy {
            delay: Duration::from_millis(5),
            fail: true,
        };
        assert_eq!(policy.work_delay(), Duration::from_millis(5));
        assert!(policy.should_fail());
    }
}
