use std::env::var;
use std::str::FromStr;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format, picked from `RUST_LOG_FORMAT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Compact,
}

impl LogFormat {
    fn from_env() -> Self {
        var("RUST_LOG_FORMAT")
            .map(|value| Self::from_name(&value))
            .unwrap_or_default()
    }

    fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Level from a config or CLI value such as `info` or `DEBUG`
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    LevelFilter::from_str(level.trim()).ok()
}

/// Install the global subscriber. `RUST_LOG` directives take precedence over
/// `level`.
pub fn init_with_level(level: LevelFilter) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();
    let format = LogFormat::from_env();

    let log_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_filter(env_filter)
            .boxed(),
    };

    if let Err(error) = tracing_subscriber::registry().with(log_layer).try_init() {
        warn!("Tracing subscriber already installed: {error}");
    }
}
