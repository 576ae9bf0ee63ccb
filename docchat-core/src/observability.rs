use clap::ValueEnum;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::{Error, ErrorDetails};

#[derive(Clone, Debug, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

const DEFAULT_LOG_DIRECTIVES: &str = "warn,docchat_core=info,gateway=info";

/// Initializes the global tracing subscriber. If the `RUST_LOG` environment
/// variable is set, it takes precedence over the default directives.
pub fn setup_logs(log_format: LogFormat) -> Result<(), Error> {
    let env_var_name = "RUST_LOG";
    let filter = if std::env::var(env_var_name).is_ok() {
        EnvFilter::builder()
            .with_env_var(env_var_name)
            .from_env()
            .map_err(|e| {
                Error::new(ErrorDetails::Config {
                    message: format!("Invalid `{env_var_name}` environment variable: {e}"),
                })
            })?
    } else {
        EnvFilter::builder()
            .parse(DEFAULT_LOG_DIRECTIVES)
            .map_err(|e| {
                Error::new(ErrorDetails::InternalError {
                    message: format!("Failed to parse default log directives: {e}"),
                })
            })?
    };

    let log_layer = match log_format {
        LogFormat::Pretty => {
            Box::new(tracing_subscriber::fmt::layer()) as Box<dyn Layer<_> + Send + Sync>
        }
        LogFormat::Json => Box::new(tracing_subscriber::fmt::layer().json()),
    };

    tracing_subscriber::registry()
        .with(log_layer.with_filter(filter))
        .init();
    Ok(())
}
