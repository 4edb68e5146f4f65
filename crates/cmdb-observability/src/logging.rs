//! Tracing setup for broker processes.
//!
//! The broker calls this once at startup, before the first change is
//! analyzed:
//!
//! ```no_run
//! use cmdb_observability::{init_logging_with_config, LoggingConfig};
//!
//! let config = LoggingConfig::production().with_audit_trail(false);
//! init_logging_with_config(config).expect("subscriber already installed");
//! ```
//!
//! `RUST_LOG` overrides the generated filter directive when set.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer,
};

use crate::audit::CHANGE_AUDIT_TARGET;

const BROKER_CRATES: [&str; 3] = ["cmdb_core", "cmdb_policy", "cmdb_observability"];

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Level applied to the broker crates.
    pub level: Level,
    /// Emit one JSON object per event.
    pub json_format: bool,
    /// Log span open and close, which brackets each analysis and validation.
    pub include_spans: bool,
    /// Include file and line of the call site.
    pub include_location: bool,
    /// Emit change-management audit records on their own target.
    pub audit_trail: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            include_spans: false,
            include_location: false,
            audit_trail: true,
        }
    }
}

impl LoggingConfig {
    /// Verbose text output showing every walker step.
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            include_spans: true,
            include_location: true,
            ..Self::default()
        }
    }

    /// JSON output suitable for log shipping.
    pub fn production() -> Self {
        Self {
            json_format: true,
            ..Self::default()
        }
    }

    pub fn with_audit_trail(mut self, enabled: bool) -> Self {
        self.audit_trail = enabled;
        self
    }

    /// Filter directive used when `RUST_LOG` is not set.
    ///
    /// Audit records are logged at `info` whatever the crate level is, so
    /// a quiet broker still writes its compliance trail.
    pub fn filter_directive(&self) -> String {
        let audit_level = if self.audit_trail { "info" } else { "off" };
        let mut directives: Vec<String> = BROKER_CRATES
            .iter()
            .map(|krate| format!("{}={}", krate, self.level))
            .collect();
        directives.push(format!("{}={}", CHANGE_AUDIT_TARGET, audit_level));
        directives.join(",")
    }
}

/// Installs the global subscriber with the default configuration.
pub fn init_logging() -> Result<(), TryInitError> {
    init_logging_with_config(LoggingConfig::default())
}

/// Installs the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_logging_with_config(config: LoggingConfig) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));

    let span_events = if config.include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = fmt::layer()
        .with_span_events(span_events)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_target(true);
    let fmt_layer = if config.json_format {
        fmt_layer.json().boxed()
    } else {
        fmt_layer.boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
}
