use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};

/// Initialize the tracing system
///
/// Honors `RUST_LOG` and falls back to `info`. Output goes to stderr in the
/// compact format; ANSI colors are only used when stderr is a terminal.
/// Returns an error if a global subscriber is already installed.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    init_with_default("info")
}

/// Initialize the tracing system with a custom default directive
pub fn init_with_default(
    default_directive: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)?,
    };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(is_tty())
        .compact()
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Check if we're running in a TTY environment
fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

/// Create a span for a storage operation on one dataset
pub fn storage_span(operation: &'static str, backend: &'static str, dataset_id: &str) -> Span {
    span!(
        Level::DEBUG,
        "storage",
        operation = operation,
        backend = backend,
        dataset_id = %datavault_core::sanitize_for_logging(dataset_id)
    )
}
