//! Structured log output.
//!
//! Services never reach for a global logger; they hold an
//! `Arc<dyn NotificationSink>` handed to them at construction.

use std::sync::Mutex;

use serde_json::Value;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::utils::sanitize::sanitize_json;

pub const LOG_TARGET: &str = "unitedpay";

pub trait NotificationSink: Send + Sync {
    fn log(&self, level: Level, message: &str, data: Value);
}

/// Forwards to `tracing` with sensitive fields masked.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn log(&self, level: Level, message: &str, data: Value) {
        let data = sanitize_json(&data);
        match level {
            Level::ERROR => tracing::error!(target: LOG_TARGET, data = %data, "{}", message),
            Level::WARN => tracing::warn!(target: LOG_TARGET, data = %data, "{}", message),
            Level::INFO => tracing::info!(target: LOG_TARGET, data = %data, "{}", message),
            Level::DEBUG => tracing::debug!(target: LOG_TARGET, data = %data, "{}", message),
            _ => tracing::trace!(target: LOG_TARGET, data = %data, "{}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
    pub data: Value,
}

/// Keeps every entry in memory. Meant for tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn contains(&self, level: Level, message: &str) -> bool {
        self.entries()
            .iter()
            .any(|entry| entry.level == level && entry.message == message)
    }
}

impl NotificationSink for MemorySink {
    fn log(&self, level: Level, message: &str, data: Value) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(LogEntry {
                level,
                message: message.to_string(),
                data,
            });
    }
}

/// Installs the global subscriber. `json` switches to machine-readable output.
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
