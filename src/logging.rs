//! Structured logging for scale test runs.
//!
//! Scenarios run inside a `scenario` span and every concurrent call inside an
//! `action` span, so each event carries the scenario name and action it
//! belongs to.

use std::io;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

pub const DEFAULT_LOG_FILTER: &str = "scaletest=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Initialize logging to stderr, as JSON lines when `json_output` is set
pub fn init_logging(json_output: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let registry = Registry::default().with(env_filter());

    if json_output {
        // One flat object per event, with scenario and action from the span stack
        registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_span_list(true)
                    .with_writer(io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().compact().with_target(false).with_writer(io::stderr))
            .try_init()?;
    }

    Ok(())
}

#[macro_export]
macro_rules! log_remote_operation {
    ($method:expr, $status:expr, $duration_ms:expr) => {
        tracing::debug!(
            method = $method,
            status = $status,
            duration_ms = $duration_ms,
            "Manager request completed"
        );
    };
}

#[macro_export]
macro_rules! log_action_complete {
    ($metrics:expr) => {
        tracing::info!(
            action = %$metrics.action,
            total = $metrics.total_operations,
            failed = $metrics.failed_operations,
            elapsed_secs = $metrics.elapsed_secs(),
            p95_ms = $metrics.p95_latency_ms,
            "Action completed"
        );
    };
}

#[macro_export]
macro_rules! log_scenario_complete {
    ($name:expr, $elapsed_secs:expr) => {
        tracing::info!(
            scenario = $name,
            elapsed_secs = $elapsed_secs,
            "{} took {:.2} seconds",
            $name,
            $elapsed_secs
        );
    };
}
