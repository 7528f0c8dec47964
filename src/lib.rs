// csv2dynamo command line
//
// - synth:  render the four stacks to CloudFormation templates
// - create: interactive wizard writing a provisioning context
// - load:   run the loader against a CSV file on disk
// - invoke: run the loader against a notification event and real buckets

use csv2dynamo_config::normalize_log_level;

mod clients;

pub mod create;
pub mod invoke;
pub mod load;
pub mod synth;

/// Human-readable logging on stderr, keeping stdout for command output.
pub fn init_cli_tracing(log_level: Option<&str>) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = normalize_log_level(log_level.unwrap_or("info"));
    let env_filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing::subscriber::set_global_default(
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false)),
    );
}
