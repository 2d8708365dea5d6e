//! # arbor-logging
//!
//! `tracing` subscriber setup driven by [`LoggingSettings`].
//!
//! Output goes to stderr so CLI results on stdout stay machine-readable.
//! `RUST_LOG`, when set, replaces the configured filter entirely.

#![deny(unsafe_code)]

use arbor_settings::{LogFormat, LoggingSettings};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Build the filter directive string: default level followed by
/// `target=level` overrides, e.g. `info,arbor_store=debug`.
pub fn filter_directives(settings: &LoggingSettings) -> String {
    let mut directives = settings.level.to_ascii_lowercase();
    for (module, level) in &settings.modules {
        directives.push(',');
        directives.push_str(module);
        directives.push('=');
        directives.push_str(&level.to_ascii_lowercase());
    }
    directives
}

/// Resolve the effective filter (`RUST_LOG` first, then settings).
pub fn env_filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directives(settings)))
}

fn subscriber(settings: &LoggingSettings) -> impl tracing::Subscriber + Send + Sync + 'static {
    let filter = env_filter(settings);

    let fmt_layer = match settings.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry().with(fmt_layer.with_filter(filter))
}

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init_logging(settings: &LoggingSettings) -> bool {
    let installed = subscriber(settings).try_init().is_ok();
    if installed {
        tracing::debug!(format = %settings.format, "logging initialized");
    }
    installed
}

/// Run `f` under a thread-scoped subscriber built from default settings.
/// Covers settings loading, which runs before [`init_logging`] can be given
/// the configured [`LoggingSettings`].
pub fn with_startup_logging<T>(f: impl FnOnce() -> T) -> T {
    tracing::subscriber::with_default(subscriber(&LoggingSettings::default()), f)
}
