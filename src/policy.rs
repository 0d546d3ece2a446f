//! Retry, admission-control, and watchdog tuning.
//!
//! Every empirically-chosen interval and threshold lives here as a
//! configurable field so a coordinator can tune the engine without code
//! changes. The defaults keep the intended shape: reconnect attempts are
//! jittered more widely as a swarm learns about more sources, and the
//! ceiling on simultaneously active connections scales down with the
//! local bandwidth class.

use std::time::Duration;

use rand::Rng as _;

/// Local bandwidth class, used to pick the active-connection ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandwidthClass {
    /// Dial-up or similarly constrained uplink.
    Constrained,
    /// Typical consumer broadband.
    Medium,
    /// High-capacity link.
    High,
}

/// Tuning knobs for connection retry, admission control, and watchdogs.
#[derive(Debug, Clone)]
pub struct TransferPolicy {
    /// Local bandwidth class.
    pub bandwidth_class: BandwidthClass,
    /// Active-connection ceiling for [`BandwidthClass::Constrained`].
    pub constrained_ceiling: usize,
    /// Active-connection ceiling for [`BandwidthClass::Medium`].
    pub medium_ceiling: usize,
    /// Active-connection ceiling for [`BandwidthClass::High`].
    pub high_ceiling: usize,
    /// Period of the retry-scheduler tick once a connection is live.
    pub retry_tick: Duration,
    /// Retry countdown after an ordinary disconnect.
    pub retry_count: i32,
    /// Retry countdown after a mid-transfer disconnect worth resuming
    /// promptly.
    pub quick_retry_count: i32,
    /// Retry countdown re-armed when admission control refuses a connect.
    pub cooldown_count: i32,
    /// How long an outbound connect may take before the watchdog fires.
    pub connect_timeout: Duration,
    /// Period of the stall watchdog; a `Downloading` connection that moves
    /// no bytes for one full period is torn down.
    pub stall_interval: Duration,
    /// Smallest advertised segment worth extending a transfer request into.
    pub min_segment: u64,
    /// Size of the socket receive buffer.
    pub recv_buffer_size: usize,
    /// First retry delay for a rehydrated connection.
    pub rehydrate_delay: Duration,
    /// One-in-N sampling of the stall tick for queued-transfer liveness
    /// probes (N=24 at a 20s tick averages one probe per 8 minutes).
    pub queue_probe_period: i32,
    /// Client identification sent in transfer requests.
    pub user_agent: String,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            bandwidth_class: BandwidthClass::Medium,
            constrained_ceiling: 4,
            medium_ceiling: 25,
            high_ceiling: 50,
            retry_tick: Duration::from_secs(1),
            retry_count: 40,
            quick_retry_count: 2,
            cooldown_count: 50,
            connect_timeout: Duration::from_secs(12),
            stall_interval: Duration::from_secs(20),
            min_segment: 64 * 1024,
            recv_buffer_size: 16 * 1024,
            rehydrate_delay: Duration::from_secs(40),
            queue_probe_period: 24,
            user_agent: concat!("rswarm/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl TransferPolicy {
    /// The active-connection ceiling for the configured bandwidth class.
    pub fn active_ceiling(&self) -> usize {
        match self.bandwidth_class {
            BandwidthClass::Constrained => self.constrained_ceiling,
            BandwidthClass::Medium => self.medium_ceiling,
            BandwidthClass::High => self.high_ceiling,
        }
    }

    /// Initial delay before a connection's first reconnect tick.
    ///
    /// The window widens with the number of sources already known to the
    /// swarm so that large swarms do not produce synchronized reconnect
    /// storms. The very first connection of a swarm starts immediately.
    pub fn initial_delay(&self, connection_index: usize, known_source_count: usize) -> Duration {
        if connection_index == 0 {
            return Duration::from_millis(10);
        }
        let mut rng = rand::rng();
        let millis = match known_source_count {
            n if n > 800 => rng.random_range(100..600_000u64),
            n if n > 400 => rng.random_range(100..220_000u64),
            n if n > 200 => rng.random_range(100..80_000u64),
            n if n > 80 => rng.random_range(100..35_000u64),
            n if n > 40 => rng.random_range(100..15_000u64),
            _ => rng.random_range(10..4_000u64),
        };
        Duration::from_millis(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceiling_scales_with_bandwidth_class() {
        let mut policy = TransferPolicy::default();

        policy.bandwidth_class = BandwidthClass::Constrained;
        assert_eq!(policy.active_ceiling(), 4);

        policy.bandwidth_class = BandwidthClass::Medium;
        assert_eq!(policy.active_ceiling(), 25);

        policy.bandwidth_class = BandwidthClass::High;
        assert_eq!(policy.active_ceiling(), 50);
    }

    #[test]
    fn test_first_connection_starts_immediately() {
        let policy = TransferPolicy::default();
        assert_eq!(policy.initial_delay(0, 500), Duration::from_millis(10));
    }

    #[test]
    fn test_initial_delay_widens_with_swarm_size() {
        let policy = TransferPolicy::default();
        for _ in 0..32 {
            let small = policy.initial_delay(3, 10);
            assert!(small >= Duration::from_millis(10));
            assert!(small < Duration::from_millis(4_000));

            let large = policy.initial_delay(3, 1000);
            assert!(large >= Duration::from_millis(100));
            assert!(large < Duration::from_millis(600_000));
        }
    }
}
