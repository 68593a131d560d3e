use std::time::Duration;

/// Tunables for the pool's sizing, reclaim and liveness-probe behavior.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Most connections checked out at once; further acquires reclaim an
    /// overdue connection or block.
    pub max_active: usize,
    /// Most idle connections retained; surplus releases close the raw
    /// connection instead.
    pub max_idle: usize,
    /// Checkout duration after which an active connection may be forcibly
    /// reclaimed by a starving acquire.
    pub max_checkout_time: Duration,
    /// Upper bound of a single bounded wait for a freed connection.
    pub wait_timeout: Duration,
    /// Probe idle connections with `ping_query` before handing them out.
    pub ping_enabled: bool,
    /// Statement run as the liveness probe. `None` skips the probe.
    pub ping_query: Option<String>,
    /// Only probe connections that have been idle for longer than this.
    pub ping_idle_threshold: Duration,
}

impl PoolConfig {
    pub fn new(max_active: usize, max_idle: usize) -> Self {
        Self {
            max_active,
            max_idle,
            ..Default::default()
        }
    }

    pub fn with_max_checkout_time(mut self, max_checkout_time: Duration) -> Self {
        self.max_checkout_time = max_checkout_time;
        self
    }

    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    pub fn with_ping<T>(mut self, query: T, idle_threshold: Duration) -> Self
    where
        T: Into<String>,
    {
        self.ping_enabled = true;
        self.ping_query = Some(query.into());
        self.ping_idle_threshold = idle_threshold;
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_active: 10,
            max_idle: 5,
            max_checkout_time: Duration::from_millis(20_000),
            wait_timeout: Duration::from_millis(20_000),
            ping_enabled: false,
            ping_query: None,
            ping_idle_threshold: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PoolConfig::default();

        assert_eq!(config.max_active, 10);
        assert_eq!(config.max_idle, 5);
        assert_eq!(config.max_checkout_time, Duration::from_secs(20));
        assert_eq!(config.wait_timeout, Duration::from_secs(20));
        assert!(!config.ping_enabled);
        assert!(config.ping_query.is_none());
        assert_eq!(config.ping_idle_threshold, Duration::ZERO);
    }

    #[test]
    fn with_ping_enables_the_probe() {
        let config = PoolConfig::new(4, 2).with_ping("SELECT 1", Duration::from_secs(30));

        assert!(config.ping_enabled);
        assert_eq!(config.ping_query.as_deref(), Some("SELECT 1"));
        assert_eq!(config.ping_idle_threshold, Duration::from_secs(30));
    }
}
