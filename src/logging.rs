// ABOUTME: Logging configuration and tracing subscriber setup
// ABOUTME: Env-driven level and format with HTTP client noise reduction
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured logging setup.
//!
//! `RUST_LOG` drives the filter; `LOG_FORMAT` picks json, compact, or pretty
//! output. HTTP client internals are capped at warn so provider traffic does
//! not drown sync-level events.

use std::env;
use std::io;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Log output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON lines for production ingestion.
    Json,
    /// Human-readable multi-line output.
    Pretty,
    /// Single-line output for space-constrained environments.
    Compact,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty,
        }
    }
}

impl LoggingConfig {
    /// Read configuration from `RUST_LOG` and `LOG_FORMAT`.
    #[must_use]
    pub fn from_env() -> Self {
        let level = env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
        let format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        };
        Self { level, format }
    }

    /// Install the global tracing subscriber.
    ///
    /// # Errors
    /// Fails when a subscriber is already installed.
    pub fn init(&self) -> Result<()> {
        let filter = EnvFilter::new(&self.level)
            .add_directive("hyper=warn".parse()?)
            .add_directive("reqwest=warn".parse()?)
            .add_directive("rustls=warn".parse()?);

        let builder = fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .with_target(true);
        match self.format {
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Compact => builder.compact().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
        }
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

        info!(
            version = env!("CARGO_PKG_VERSION"),
            format = ?self.format,
            "logging initialized"
        );
        Ok(())
    }
}
