//! Runtime mode
//!
//! Development-only diagnostics (registration chatter, resolution summaries,
//! status tables) are gated on the runtime mode rather than on log level, so
//! that a production deployment running at `debug` does not suddenly start
//! emitting developer dumps.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Environment variable consulted when no mode is configured explicitly
pub const MODE_ENV_VAR: &str = "FEATUREHUB_MODE";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Development,
    #[default]
    Production,
    Test,
}

impl RuntimeMode {
    /// Resolve the mode from the environment, falling back to the default
    pub fn from_env() -> Self {
        std::env::var(MODE_ENV_VAR)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    pub fn is_development(self) -> bool {
        self == RuntimeMode::Development
    }

    pub fn is_test(self) -> bool {
        self == RuntimeMode::Test
    }
}

/// Log at info level only when running in development mode
#[macro_export]
macro_rules! dev_log {
    ($mode:expr, $($arg:tt)+) => {
        if $mode.is_development() {
            log::info!($($arg)+);
        }
    };
}

/// Log at warn level only when running in development mode
#[macro_export]
macro_rules! dev_warn {
    ($mode:expr, $($arg:tt)+) => {
        if $mode.is_development() {
            log::warn!($($arg)+);
        }
    };
}
