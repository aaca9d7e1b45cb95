//! Logging setup for the browser engine.
//!
//! Every engine log line is emitted under a per-component target,
//! `classview::<component>`, so components can be filtered independently
//! of the module they live in. Components: `worker`, `model`,
//! `reconciler`, `updater`, `accumulator`, `index`.
//!
//! # Configuration
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! worker = "debug"              # same as "classview::worker"
//! "classview::reconciler" = "trace"
//! ```
//!
//! # Environment Variable
//!
//! `RUST_LOG` takes precedence over config:
//! ```bash
//! RUST_LOG=classview::worker=debug classview demo
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Prefix of every component target.
pub const TARGET_PREFIX: &str = "classview";

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Filter directives for a logging config.
///
/// Bare component names (`worker`) are expanded to their target
/// (`classview::worker`); anything containing `::` is taken as written.
pub fn filter_directives(config: &LoggingConfig) -> String {
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();

    let mut directives = config.default.clone();
    for (module, level) in modules {
        directives.push(',');
        if module.contains("::") || module == TARGET_PREFIX {
            directives.push_str(module);
        } else {
            directives.push_str(TARGET_PREFIX);
            directives.push_str("::");
            directives.push_str(module);
        }
        directives.push('=');
        directives.push_str(level);
    }
    directives
}

/// Initialize logging with configuration.
///
/// Call once at startup. Later calls are ignored. Output goes to stderr so
/// that command output on stdout stays machine readable.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// Log an event under a component target.
///
/// # Examples
/// ```ignore
/// log_event!("model", "project opened", "{project}");
/// log_event!("model", "disposed");
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:literal, $event:expr) => {
        tracing::info!(target: concat!("classview::", $component), "{}", $event)
    };
    ($component:literal, $event:expr, $($arg:tt)*) => {
        tracing::info!(target: concat!("classview::", $component), "{}: {}", $event, format!($($arg)*))
    };
}

/// Debug-only event logging.
///
/// # Examples
/// ```ignore
/// debug_event!("worker", "applied", "{count} events");
/// ```
#[macro_export]
macro_rules! debug_event {
    ($component:literal, $event:expr) => {
        tracing::debug!(target: concat!("classview::", $component), "{}", $event)
    };
    ($component:literal, $event:expr, $($arg:tt)*) => {
        tracing::debug!(target: concat!("classview::", $component), "{}: {}", $event, format!($($arg)*))
    };
}

/// Degraded path: something was skipped but the engine carries on.
#[macro_export]
macro_rules! warn_event {
    ($component:literal, $event:expr) => {
        tracing::warn!(target: concat!("classview::", $component), "{}", $event)
    };
    ($component:literal, $event:expr, $($arg:tt)*) => {
        tracing::warn!(target: concat!("classview::", $component), "{}: {}", $event, format!($($arg)*))
    };
}

/// A batch or invariant failed.
#[macro_export]
macro_rules! error_event {
    ($component:literal, $event:expr) => {
        tracing::error!(target: concat!("classview::", $component), "{}", $event)
    };
    ($component:literal, $event:expr, $($arg:tt)*) => {
        tracing::error!(target: concat!("classview::", $component), "{}: {}", $event, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(filter_directives(&LoggingConfig::default()), "warn");
    }

    #[test]
    fn test_component_names_expand_to_targets() {
        let mut config = LoggingConfig::default();
        config
            .modules
            .insert("worker".to_string(), "debug".to_string());
        config
            .modules
            .insert("classview::model".to_string(), "trace".to_string());

        assert_eq!(
            filter_directives(&config),
            "warn,classview::model=trace,classview::worker=debug"
        );
    }

    #[test]
    fn test_directives_parse() {
        let mut config = LoggingConfig::default();
        config
            .modules
            .insert("reconciler".to_string(), "trace".to_string());
        assert!(EnvFilter::try_new(filter_directives(&config)).is_ok());
    }
}
