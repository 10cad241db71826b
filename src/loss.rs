//! Simulated packet-loss hook for exercising retransmission.
//!
//! Real networks drop packets; loopback tests do not.  [`LossPolicy`] lets
//! the receiver intentionally discard an inbound DATA packet with a
//! configured probability, *after* corruption checking but *before*
//! buffering, so a dropped packet goes unacknowledged and the sender's
//! retransmission timer has to recover it — the real loss path, end to end.
//!
//! Disabled (the default) it is a strict no-op.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Decides per inbound packet whether to pretend the network lost it.
#[derive(Debug)]
pub struct LossPolicy {
    rate: f64,
    rng: StdRng,
}

impl LossPolicy {
    /// A policy that never drops anything.
    pub fn disabled() -> Self {
        Self {
            rate: 0.0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Drop with probability `rate`, randomly seeded.
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            rng: StdRng::from_entropy(),
        }
    }

    /// Drop with probability `rate` from a fixed seed, so test runs are
    /// reproducible.
    pub fn with_seed(rate: f64, seed: u64) -> Self {
        Self {
            rate,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// `true` when the policy is active at all.
    pub fn is_enabled(&self) -> bool {
        self.rate > 0.0
    }

    /// Roll the dice for one packet.
    pub fn should_drop(&mut self) -> bool {
        self.rate > 0.0 && self.rng.gen::<f64>() < self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_policy_never_drops() {
        let mut p = LossPolicy::disabled();
        assert!(!p.is_enabled());
        assert!((0..1000).all(|_| !p.should_drop()));
    }

    #[test]
    fn certain_loss_always_drops() {
        let mut p = LossPolicy::new(1.0);
        assert!((0..100).all(|_| p.should_drop()));
    }

    #[test]
    fn seeded_policy_is_reproducible() {
        let mut a = LossPolicy::with_seed(0.3, 42);
        let mut b = LossPolicy::with_seed(0.3, 42);
        let da: Vec<bool> = (0..100).map(|_| a.should_drop()).collect();
        let db: Vec<bool> = (0..100).map(|_| b.should_drop()).collect();
        assert_eq!(da, db);
    }

    #[test]
    fn rate_roughly_respected() {
        let mut p = LossPolicy::with_seed(0.1, 7);
        let drops = (0..10_000).filter(|_| p.should_drop()).count();
        // 10% ± generous slack.
        assert!((500..1500).contains(&drops), "drops = {drops}");
    }
}
