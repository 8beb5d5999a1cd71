//! Configuration for the simulated network.

use std::time::Duration;

/// Configuration for a [`crate::SimNetwork`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use drydock_sim::SimConfig;
///
/// let config = SimConfig::default()
///     .with_host_name("test-net:0")
///     .with_epoch(Duration::from_secs(1));
/// assert_eq!(config.host_name, "test-net:0");
/// ```
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Name the interface reports for itself.
    pub host_name: String,
    /// Starting virtual time.
    pub epoch: Duration,
}

impl SimConfig {
    /// Set the reported host name.
    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = host_name.into();
        self
    }

    /// Set the starting virtual time.
    pub fn with_epoch(mut self, epoch: Duration) -> Self {
        self.epoch = epoch;
        self
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            host_name: "drydock:0".to_string(),
            epoch: Duration::ZERO,
        }
    }
}
