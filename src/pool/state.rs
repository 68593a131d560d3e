use std::collections::VecDeque;
use std::time::Duration;

use super::connection::PooledEntry;

/// The pool's ledger: who is idle, who is out, and the running totals.
///
/// Lives inside the pool's mutex and carries no synchronization of its own;
/// it is the critical section's payload.
pub(crate) struct PoolState<C> {
    /// Insertion order is release order; reuse pops the front.
    pub(crate) idle: VecDeque<PooledEntry<C>>,
    /// Insertion order is checkout order; the front is the overdue-scan target.
    pub(crate) active: VecDeque<PooledEntry<C>>,
    pub(crate) expected_type_code: u64,
    pub(crate) closed: bool,
    pub(crate) stats: PoolStats,
}

impl<C> PoolState<C> {
    pub(crate) fn new(expected_type_code: u64) -> Self {
        Self {
            idle: VecDeque::new(),
            active: VecDeque::new(),
            expected_type_code,
            closed: false,
            stats: PoolStats::default(),
        }
    }
}

/// Cumulative counters, only ever mutated while the pool lock is held.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PoolStats {
    pub(crate) request_count: u64,
    pub(crate) accumulated_request_time: Duration,
    pub(crate) accumulated_checkout_time: Duration,
    pub(crate) claimed_overdue_connection_count: u64,
    pub(crate) accumulated_overdue_checkout_time: Duration,
    pub(crate) accumulated_wait_time: Duration,
    pub(crate) had_to_wait_count: u64,
    pub(crate) bad_connection_count: u64,
}

/// Point-in-time copy of the pool's counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct PoolMetrics {
    /// Connections parked and ready for reuse.
    pub idle_count: usize,
    /// Connections currently checked out.
    pub active_count: usize,
    /// Completed acquires.
    pub request_count: u64,
    /// Total time spent inside acquire, waits included.
    pub accumulated_request_time: Duration,
    /// Total time connections spent checked out.
    pub accumulated_checkout_time: Duration,
    /// Connections forcibly repossessed past their checkout budget.
    pub claimed_overdue_connection_count: u64,
    /// Total checkout time of repossessed connections.
    pub accumulated_overdue_checkout_time: Duration,
    /// Total time acquires spent blocked on a full pool.
    pub accumulated_wait_time: Duration,
    /// Acquires that had to block at least once.
    pub had_to_wait_count: u64,
    /// Unusable connections encountered, on acquire or release.
    pub bad_connection_count: u64,
}

impl PoolMetrics {
    pub(crate) fn from_state<C>(state: &PoolState<C>) -> PoolMetrics {
        let stats = &state.stats;
        PoolMetrics {
            idle_count: state.idle.len(),
            active_count: state.active.len(),
            request_count: stats.request_count,
            accumulated_request_time: stats.accumulated_request_time,
            accumulated_checkout_time: stats.accumulated_checkout_time,
            claimed_overdue_connection_count: stats.claimed_overdue_connection_count,
            accumulated_overdue_checkout_time: stats.accumulated_overdue_checkout_time,
            accumulated_wait_time: stats.accumulated_wait_time,
            had_to_wait_count: stats.had_to_wait_count,
            bad_connection_count: stats.bad_connection_count,
        }
    }

    pub fn average_request_time(&self) -> Duration {
        per(self.accumulated_request_time, self.request_count)
    }

    pub fn average_wait_time(&self) -> Duration {
        per(self.accumulated_wait_time, self.had_to_wait_count)
    }

    pub fn average_checkout_time(&self) -> Duration {
        per(self.accumulated_checkout_time, self.request_count)
    }

    pub fn average_overdue_checkout_time(&self) -> Duration {
        per(self.accumulated_overdue_checkout_time, self.claimed_overdue_connection_count)
    }
}

fn per(total: Duration, count: u64) -> Duration {
    total.checked_div(count as u32).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_guard_against_zero_counts() {
        let metrics = PoolMetrics::default();

        assert_eq!(metrics.average_request_time(), Duration::ZERO);
        assert_eq!(metrics.average_wait_time(), Duration::ZERO);
        assert_eq!(metrics.average_checkout_time(), Duration::ZERO);
        assert_eq!(metrics.average_overdue_checkout_time(), Duration::ZERO);
    }

    #[test]
    fn averages_divide_by_their_own_counts() {
        let metrics = PoolMetrics {
            request_count: 4,
            accumulated_request_time: Duration::from_millis(200),
            accumulated_checkout_time: Duration::from_millis(400),
            had_to_wait_count: 2,
            accumulated_wait_time: Duration::from_millis(100),
            claimed_overdue_connection_count: 1,
            accumulated_overdue_checkout_time: Duration::from_millis(75),
            ..Default::default()
        };

        assert_eq!(metrics.average_request_time(), Duration::from_millis(50));
        assert_eq!(metrics.average_checkout_time(), Duration::from_millis(100));
        assert_eq!(metrics.average_wait_time(), Duration::from_millis(50));
        assert_eq!(metrics.average_overdue_checkout_time(), Duration::from_millis(75));
    }
}
