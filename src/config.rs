//! Engine and discovery tunables.

use std::time::Duration;

/// Interval between polling iterations.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Unanswered display requests tolerated before the device is declared
/// unresponsive.
pub const MAX_UNANSWERED: u32 = 10;

/// How long each identity probe waits for a reply.
pub const PROBE_WINDOW: Duration = Duration::from_millis(100);

/// Client name announced when opening ports.
pub const CLIENT_NAME: &str = "MWII Display";

/// Client name for the temporary ports opened during discovery.
pub const PROBE_CLIENT_NAME: &str = "MWSD Synth Probe";

/// Settings for a mirror session.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    pub poll_interval: Duration,
    pub max_unanswered: u32,
    pub probe_window: Duration,
    pub client_name: String,
    pub probe_client_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            max_unanswered: MAX_UNANSWERED,
            probe_window: PROBE_WINDOW,
            client_name: CLIENT_NAME.to_string(),
            probe_client_name: PROBE_CLIENT_NAME.to_string(),
        }
    }
}
