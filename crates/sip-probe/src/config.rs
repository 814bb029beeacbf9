//! Probe timing configuration

use std::time::Duration;

/// Overall budget for dial, send and response receipt
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Dial timeout applied to plain TCP connects
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Timing knobs for a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Wall-clock budget for the whole probe, armed once when probing starts
    pub timeout: Duration,
    /// Timeout for the TCP connect of the `tcp` transport
    pub connect_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            timeout: DEFAULT_PROBE_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ProbeConfig {
    /// Set the overall probe timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the TCP dial timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
