//! Telemetry initialization

mod logging;

pub use logging::init_logging;

use crate::config::TelemetryConfig;

/// Initialize all telemetry subsystems from config
pub fn init_telemetry(cfg: &TelemetryConfig) -> anyhow::Result<()> {
    init_logging(&cfg.log_level)
}
