//! Shared tracing/logging initialization.
//!
//! The `ecobin` binary sets up `tracing_subscriber` with an env-filter and
//! optional JSON output. With the `metrics` feature enabled an OTLP layer
//! can be attached as well.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn env_filter(default_filter: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
    )
}

/// Initialise the global tracing subscriber.
///
/// * `default_filter` -- default `RUST_LOG` value when the env-var is not set
///   (e.g. `"ecobin=info"`).
/// * `log_json` -- when `true`, emit structured JSON log lines instead of the
///   human-readable format.
///
/// Logs go to stderr so command output on stdout stays clean.
pub fn init_tracing(default_filter: &str, log_json: bool) {
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter(default_filter))
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter(default_filter))
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Initialise tracing and, when an endpoint is given, the OTLP pipeline.
///
/// The returned guard must be held for the process lifetime. A failing
/// exporter falls back to plain tracing with a warning.
#[cfg(feature = "metrics")]
pub fn init_tracing_with_metrics(
    default_filter: &str,
    log_json: bool,
    endpoint: Option<&str>,
) -> Option<crate::metrics::MetricsGuard> {
    let Some(endpoint) = endpoint else {
        init_tracing(default_filter, log_json);
        return None;
    };

    match crate::metrics::init_metrics(endpoint) {
        Ok(guard) => {
            let otel_layer = tracing_opentelemetry::layer().with_tracer(guard.tracer("ecobin"));
            if log_json {
                tracing_subscriber::registry()
                    .with(env_filter(default_filter))
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(std::io::stderr),
                    )
                    .with(otel_layer)
                    .init();
            } else {
                tracing_subscriber::registry()
                    .with(env_filter(default_filter))
                    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                    .with(otel_layer)
                    .init();
            }
            tracing::info!(endpoint, "OpenTelemetry export enabled");
            Some(guard)
        }
        Err(e) => {
            init_tracing(default_filter, log_json);
            tracing::warn!(error = %e, endpoint, "Failed to initialise OpenTelemetry export");
            None
        }
    }
}

/// Initialise tracing; the endpoint is ignored without the `metrics` feature.
#[cfg(not(feature = "metrics"))]
pub fn init_tracing_with_metrics(
    default_filter: &str,
    log_json: bool,
    _endpoint: Option<&str>,
) -> Option<()> {
    init_tracing(default_filter, log_json);
    None
}
