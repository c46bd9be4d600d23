use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Install JSON structured logging on stderr, filtered by `RUST_LOG` (default `info`).
///
/// Stdout is left alone; Actions captures stderr into the job log.
pub fn init_telemetry() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .try_init();

    // A subscriber may already be installed when running under a test harness.
    if result.is_ok() {
        tracing::debug!("Smyklot telemetry initialized with structured logging");
    }
}

/// Generate a correlation ID for linking the log lines of one invocation
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span wrapping one whole invocation.
pub fn invocation_span(mode: &str, owner: &str, repo: &str, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "smyklot",
        mode = mode,
        repo.owner = owner,
        repo.name = repo,
        correlation.id = correlation_id,
    )
}

/// Span for work on a single pull request.
pub fn pr_span(number: u64) -> tracing::Span {
    tracing::info_span!("pull_request", pr.number = number)
}
