//! Simulated network with deterministic latency and per-link FIFO delivery.

use phalanx_types::ReplicaId;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for the simulated network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Base one-way latency, for both client submissions and replica links.
    pub base_latency: Duration,
    /// Jitter as a fraction of base latency (0.0 - 1.0).
    pub jitter_fraction: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_latency: Duration::from_millis(50),
            jitter_fraction: 0.5,
        }
    }
}

/// Simulated network.
///
/// Messages on one `(from, to)` link are delivered in send order, which is
/// what the ordering engine assumes of the evidence layer. Across links,
/// jitter reorders freely.
#[derive(Debug)]
pub struct SimulatedNetwork {
    config: NetworkConfig,
    /// Last scheduled delivery per directed link.
    last_delivery: HashMap<(ReplicaId, ReplicaId), Duration>,
}

impl SimulatedNetwork {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            last_delivery: HashMap::new(),
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Sample a one-way latency.
    pub fn sample_latency(&self, rng: &mut ChaCha8Rng) -> Duration {
        let base = self.config.base_latency.as_secs_f64();
        let jitter_range = base * self.config.jitter_fraction;
        let jitter = if jitter_range > 0.0 {
            rng.gen_range(-jitter_range..jitter_range)
        } else {
            0.0
        };
        Duration::from_secs_f64((base + jitter).max(0.001))
    }

    /// Delivery time for a message sent on `from → to` at `send_time`.
    ///
    /// Never earlier than the previous delivery on the same link.
    pub fn schedule(
        &mut self,
        from: ReplicaId,
        to: ReplicaId,
        send_time: Duration,
        rng: &mut ChaCha8Rng,
    ) -> Duration {
        let sampled = send_time + self.sample_latency(rng);
        let link = self.last_delivery.entry((from, to)).or_default();
        let delivery = sampled.max(*link);
        *link = delivery;
        delivery
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_link_delivery_is_fifo() {
        let mut network = SimulatedNetwork::new(NetworkConfig {
            base_latency: Duration::from_millis(50),
            jitter_fraction: 0.9,
        });
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let mut last = Duration::ZERO;
        for i in 0..100 {
            let at = network.schedule(ReplicaId(1), ReplicaId(2), Duration::from_micros(i), &mut rng);
            assert!(at >= last);
            last = at;
        }
    }

    #[test]
    fn test_zero_jitter_is_constant() {
        let network = SimulatedNetwork::new(NetworkConfig {
            base_latency: Duration::from_millis(20),
            jitter_fraction: 0.0,
        });
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(network.sample_latency(&mut rng), Duration::from_millis(20));
    }
}
