//! Logging initialization

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for bridge logs, picked by `LOG_FORMAT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    /// One JSON object per event, carrying the request span fields
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        Self::parse(std::env::var("LOG_FORMAT").ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Default filter directives, used when `RUST_LOG` is unset
fn directives(crate_name: &str) -> [String; 2] {
    [format!("{}=info", crate_name), "tower_http=info".to_string()]
}

/// `RUST_LOG` wins outright when set; otherwise the defaults apply
fn log_filter(crate_name: &str, rust_log: Option<&str>) -> anyhow::Result<EnvFilter> {
    match rust_log.map(str::trim) {
        Some(custom) if !custom.is_empty() => Ok(EnvFilter::try_new(custom)?),
        _ => Ok(EnvFilter::try_new(directives(crate_name).join(","))?),
    }
}

/// Initialize tracing for the bridge
///
/// Logs go to stderr. `RUST_LOG` is honored as given; without it the bridge
/// and the HTTP trace layer log at `info`. Set `LOG_FORMAT=json` for
/// structured output in which every event carries its `request_id`.
pub fn init_tracing(crate_name: &str) -> anyhow::Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = log_filter(crate_name, rust_log.as_deref())?;

    let registry = tracing_subscriber::registry().with(filter);

    match LogFormat::from_env() {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }

    Ok(())
}
