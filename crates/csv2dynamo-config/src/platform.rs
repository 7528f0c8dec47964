use std::path::PathBuf;

use crate::env_overrides::EnvSource;
use crate::LogFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Running inside the Lambda execution environment
    Lambda,
    /// Local CLI runs and tests
    Local,
}

impl Platform {
    /// Auto-detect the current platform from the environment.
    ///
    /// The Lambda runtime always sets AWS_LAMBDA_FUNCTION_NAME.
    pub fn detect<E: EnvSource>(env: &E) -> Self {
        if env.get_raw("AWS_LAMBDA_FUNCTION_NAME").is_some() {
            Platform::Lambda
        } else {
            Platform::Local
        }
    }

    /// Get platform-specific defaults
    pub fn defaults(&self) -> PlatformDefaults {
        match self {
            Platform::Lambda => PlatformDefaults {
                log_level: "debug",
                log_format: LogFormat::Json,
                scratch_dir: PathBuf::from("/tmp"),
                // 100+200+400ms of backoff fits the function's 3s timeout
                max_unprocessed_retries: 3,
            },
            Platform::Local => PlatformDefaults {
                log_level: "info",
                log_format: LogFormat::Text,
                scratch_dir: std::env::temp_dir(),
                max_unprocessed_retries: 5,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlatformDefaults {
    pub log_level: &'static str,
    pub log_format: LogFormat,
    pub scratch_dir: PathBuf,
    pub max_unprocessed_retries: u32,
}
