pub mod config;
pub mod correlator;
pub mod fusion;
pub mod rate_monitor;
pub mod solution;
pub mod units;

pub use config::{ConfigError, GpsConfig};
pub use fusion::{FixFusionEngine, SharedFusionEngine};
pub use rate_monitor::{FixRateMonitor, FixTickSink};
