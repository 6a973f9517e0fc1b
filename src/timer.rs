//! Flight retransmission timer.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Spread of the jitter around the nominal timeout, either way.
const JITTER: f64 = 0.25;

/// RFC 6347 4.2.4.1 upper bound.
const MAX_RTO: Duration = Duration::from_secs(60);

/// Resend timeout of the current flight.
///
/// Starts at the configured timeout and doubles with every resend until
/// the retry budget is spent. Every timeout is jittered by up to 25%. The
/// jitter is reproducible when [`Config::rng_seed`](crate::Config::rng_seed)
/// is set; nothing on the wire comes from this generator.
pub(crate) struct Backoff {
    start: Duration,
    retries: usize,
    nominal: Duration,
    current: Duration,
    left: usize,
    rng: StdRng,
}

impl Backoff {
    pub fn new(start: Duration, retries: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut backoff = Backoff {
            start,
            retries,
            nominal: start,
            current: start,
            left: retries,
            rng,
        };
        backoff.reset();
        backoff
    }

    /// Rearm for a new flight.
    pub fn reset(&mut self) {
        self.nominal = self.start.min(MAX_RTO);
        self.left = self.retries;
        self.jitter();
    }

    /// Time from a send to the next resend.
    pub fn rto(&self) -> Duration {
        self.current
    }

    /// Spend one resend. `false` once the budget is gone.
    pub fn attempt(&mut self) -> bool {
        let Some(left) = self.left.checked_sub(1) else {
            return false;
        };

        self.left = left;
        self.nominal = self.nominal.saturating_mul(2).min(MAX_RTO);
        self.jitter();
        true
    }

    fn jitter(&mut self) {
        let factor = self.rng.gen_range(1.0 - JITTER..=1.0 + JITTER);
        self.current = self.nominal.mul_f64(factor);
    }
}
