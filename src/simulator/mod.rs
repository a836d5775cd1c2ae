//! Single-zero wheel simulator.
//!
//! Stands in for the live table: produces settled `RoundOutcome`s either on
//! demand or as a paced stream. A fixed seed makes a run reproducible, which
//! the backtester and tests rely on.

use futures::stream::{self, BoxStream, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tracing::debug;

use crate::types::{RoundOutcome, MAX_POCKET};

#[derive(Debug, Clone)]
pub struct WheelSimulator {
    rng: StdRng,
    spins: u64,
}

impl WheelSimulator {
    /// Seeded wheel when `seed` is given, OS-seeded otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng, spins: 0 }
    }

    /// Number of spins produced so far.
    pub fn spin_count(&self) -> u64 {
        self.spins
    }

    pub fn spin(&mut self) -> RoundOutcome {
        let number = self.rng.random_range(0..=MAX_POCKET);
        self.spins += 1;
        let outcome = RoundOutcome::from_pocket(number);
        debug!(spin = self.spins, outcome = %outcome, "Wheel spun");
        outcome
    }

    /// The next `count` outcomes.
    pub fn spins(&mut self, count: usize) -> Vec<RoundOutcome> {
        (0..count).map(|_| self.spin()).collect()
    }

    /// Endless stream yielding one outcome per `interval`.
    pub fn into_stream(self, interval: Duration) -> BoxStream<'static, RoundOutcome> {
        stream::unfold(self, move |mut wheel| async move {
            tokio::time::sleep(interval).await;
            let outcome = wheel.spin();
            Some((outcome, wheel))
        })
        .boxed()
    }
}
