//! Logging bootstrap and the tracing-backed event sink
//!
//! Engine events go through [`erpsync_core::EventSink`]. The default sink,
//! [`TracingEventSink`], turns them into `tracing` events with `source` and
//! `context` as structured fields so they land in whatever subscriber the
//! host process installed.

use erpsync_core::EventSink;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` (e.g.
/// `"info,erpsync_infra=debug"`) is used. Returns `false` if a global
/// subscriber was already installed, which makes repeated calls harmless.
pub fn init_tracing(default_filter: &str, format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
    };
    installed.is_ok()
}

/// [`EventSink`] that forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn info(&self, source: &str, context: &str, message: &str) {
        tracing::info!(target: "erpsync::events", source, context, "{message}");
    }

    fn warning(&self, source: &str, context: &str, message: &str) {
        tracing::warn!(target: "erpsync::events", source, context, "{message}");
    }

    fn error(&self, source: &str, context: &str, message: &str) {
        tracing::error!(target: "erpsync::events", source, context, "{message}");
    }
}
