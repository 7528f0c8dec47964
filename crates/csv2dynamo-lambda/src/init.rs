// Logging setup shared by the Lambda binary and the CLI

use csv2dynamo_config::LogFormat;

/// Initialize tracing with the given filter directive and output format.
///
/// Falls back to `info` when the directive does not parse. Calling this more
/// than once keeps the first subscriber.
pub fn init_tracing(filter: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let _ = match format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_current_span(false)),
        ),
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
    };
}
