//! Logging setup.
//!
//! Compact timestamped lines on stderr with per-target level configuration.
//! Library code logs under the targets `loader`, `chunker`, `remote`,
//! `store`, `session` and `server`.
//!
//! # Configuration
//!
//! ```toml
//! [logging]
//! default = "warn"  # quiet by default
//!
//! [logging.modules]
//! remote = "debug"  # show every API call
//! ```
//!
//! # Environment Variable
//!
//! `RUST_LOG` takes precedence over config:
//! ```bash
//! RUST_LOG=debug docqa ingest syllabus.pdf
//! RUST_LOG=session=debug,remote=trace docqa serve
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Build the filter directive string from config.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();

    let mut directives = config.default.clone();
    for (target, level) in modules {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

/// Initialize logging with configuration.
///
/// Only the first call takes effect. If another subscriber is already
/// installed (e.g. by a test harness) this is a no-op.
///
/// The `RUST_LOG` environment variable takes precedence over config settings.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::try_new(filter_directives(config))
                .unwrap_or_else(|_| EnvFilter::new("warn"))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
    });
}

/// Initialize logging with default configuration (`warn`).
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Log an info event under a component target.
///
/// # Examples
/// ```ignore
/// log_event!("store", "swapped", "{name}");
/// log_event!("session", "ready");
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:literal, $event:expr) => {
        tracing::info!(target: $component, "[{}] {}", $component, $event)
    };
    ($component:literal, $event:expr, $($arg:tt)*) => {
        tracing::info!(target: $component, "[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Debug-level variant of [`log_event!`].
///
/// # Examples
/// ```ignore
/// debug_event!("session", "retrieved", "{} hits", hits.len());
/// ```
#[macro_export]
macro_rules! debug_event {
    ($component:literal, $event:expr) => {
        tracing::debug!(target: $component, "[{}] {}", $component, $event)
    };
    ($component:literal, $event:expr, $($arg:tt)*) => {
        tracing::debug!(target: $component, "[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_sorted() {
        let mut config = LoggingConfig::default();
        config.modules.insert("store".to_string(), "debug".to_string());
        config.modules.insert("remote".to_string(), "trace".to_string());

        assert_eq!(filter_directives(&config), "warn,remote=trace,store=debug");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init();
        init_with_config(&LoggingConfig {
            default: "debug".to_string(),
            ..LoggingConfig::default()
        });
    }
}
