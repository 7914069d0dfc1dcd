//! Logging setup
//!
//! The subscriber is installed before the configuration is read, so the
//! filter sits behind a reload layer and the configured level is applied
//! afterwards through [`LogLevel`].

use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

/// Handle for changing the level after the subscriber is installed
pub struct LogLevel {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl LogLevel {
    /// Switch to `level` unless `RUST_LOG` pinned the filter at startup
    pub fn set(&self, level: &str) {
        if self.from_env {
            return;
        }
        if let Err(e) = self.handle.reload(EnvFilter::new(level)) {
            warn!("Could not switch log level to {}: {}", level, e);
        }
    }
}

/// Install the global subscriber at `level`, or at `RUST_LOG` when it is set.
///
/// Later calls leave the first subscriber in place.
pub fn setup_logging(level: &str) -> LogLevel {
    let (filter, from_env) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (EnvFilter::new(level), false),
    };
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .try_init()
        .ok();

    LogLevel { handle, from_env }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_twice_and_set_level() {
        let first = setup_logging("debug");
        let second = setup_logging("info");
        first.set("warn");
        second.set("info");
        tracing::info!("logging initialised");
    }
}
