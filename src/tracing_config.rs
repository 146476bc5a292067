//! Tracing subscriber configuration for the CLI
//!
//! Libraries only emit trace events; the application configures the
//! subscriber. This module maps the CLI verbosity count onto an environment
//! filter (`RUST_LOG` wins when set) and installs a console formatting
//! layer.

use crate::error::{PhotoError, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Console output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output (default for interactive use)
    Console,
    /// Compact single-line output for CI environments
    Compact,
}

/// Tracing configuration builder
#[derive(Debug, Clone)]
pub struct TracingConfig {
    verbosity: u8,
    format: TracingFormat,
    env_filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            env_filter: None,
        }
    }
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the verbosity level (0 = warn, 1 = info, 2 = debug, 3+ = trace)
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Override the filter directive, bypassing the verbosity mapping
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Default level directive for a verbosity count
    #[must_use]
    pub fn level_directive(verbosity: u8) -> &'static str {
        match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Install the global tracing subscriber
    ///
    /// `RUST_LOG` takes precedence over the verbosity mapping so operators
    /// can scope logging to individual modules.
    ///
    /// # Errors
    /// Returns `PhotoError::Internal` for unparsable filter directives or
    /// when a global subscriber is already installed.
    pub fn init(self) -> Result<()> {
        let filter = match &self.env_filter {
            Some(directive) => EnvFilter::try_new(directive)
                .map_err(|e| PhotoError::internal(format!("Invalid filter directive: {e}")))?,
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(Self::level_directive(self.verbosity))),
        };

        let result = match self.format {
            TracingFormat::Console => Registry::default()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_target(false))
                .try_init(),
            TracingFormat::Compact => Registry::default()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().compact().with_target(false))
                .try_init(),
        };
        result.map_err(|e| PhotoError::internal(format!("Failed to install subscriber: {e}")))
    }
}

/// Install the CLI tracing subscriber for a verbosity count
///
/// # Errors
/// See [`TracingConfig::init`].
pub fn init_cli_tracing(verbosity: u8) -> Result<()> {
    TracingConfig::new()
        .with_verbosity(verbosity)
        .with_format(TracingFormat::Console)
        .init()
}
