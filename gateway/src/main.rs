use std::fmt::Display;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use clap::Parser;
use tokio::signal;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultOnFailure, TraceLayer};
use tracing::Level;

use docchat_core::config::{Config, CorsConfig};
use docchat_core::endpoints;
use docchat_core::endpoints::status::DOCCHAT_VERSION;
use docchat_core::error;
use docchat_core::observability::{self, LogFormat};
use docchat_core::utils::gateway::AppStateData;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Use the specified config file. Incompatible with `--default-config`
    #[arg(long)]
    config_file: Option<PathBuf>,

    /// Use a default config. Incompatible with `--config-file`
    #[arg(long)]
    default_config: bool,

    /// Sets the log format used for all gateway logs.
    #[arg(long)]
    #[arg(value_enum)]
    #[clap(default_value_t = LogFormat::default())]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    // Set up logs immediately, so that we can use `tracing`.
    observability::setup_logs(args.log_format).expect_pretty("Failed to set up logs");

    tracing::info!("Starting docchat gateway {DOCCHAT_VERSION}");

    if args.config_file.is_some() && args.default_config {
        tracing::error!("Cannot specify both `--config-file` and `--default-config`");
        std::process::exit(1);
    }

    let config = if let Some(path) = &args.config_file {
        Arc::new(Config::load_from_path(path).expect_pretty("Failed to load config"))
    } else {
        if !args.default_config {
            tracing::warn!(
                "No config file provided, so default settings will be used. Use `--config-file path/to/docchat.toml` to specify a config file."
            );
        }
        Arc::new(Config::default())
    };

    error::set_debug(config.gateway.debug).expect_pretty("Failed to set debug mode");

    // Initialize the shared state. This resolves the provider credential and
    // fails fast if it is missing, so the process never starts serving
    // traffic without one.
    let app_state = AppStateData::new(config.clone()).expect_pretty("Failed to initialize AppState");

    let api_routes = Router::new()
        .route("/chat", post(endpoints::chat::chat_handler))
        .route("/upload-pdf", post(endpoints::documents::upload_pdf_handler))
        .route("/ask-pdf", post(endpoints::document_qa::ask_pdf_handler))
        .route("/status", get(endpoints::status::status_handler))
        .route("/health", get(endpoints::status::health_handler));

    let base_path = config.gateway.base_path.as_deref().unwrap_or("/");
    if !base_path.starts_with('/') {
        tracing::error!("[gateway.base_path] must start with a `/` : `{base_path}`");
        std::process::exit(1);
    }
    let base_path = base_path.trim_end_matches('/');

    // The path was just `/` (or multiple slashes)
    let router = if base_path.is_empty() {
        Router::new().merge(api_routes)
    } else {
        Router::new().nest(base_path, api_routes)
    };

    let router = router
        .fallback(endpoints::fallback::handle_404)
        .layer(build_cors_layer(&config.cors))
        .layer(DefaultBodyLimit::max(config.extraction.max_upload_bytes))
        // This is only used to output request/response information to our
        // logs; failed requests are logged at DEBUG since we already have our
        // own error-logging code.
        .layer(TraceLayer::new_for_http().on_failure(DefaultOnFailure::new().level(Level::DEBUG)))
        .with_state(app_state.clone());

    // Bind to the socket address specified in the config, or default to 0.0.0.0:3000
    let bind_address = config
        .gateway
        .bind_address
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

    let listener = match tokio::net::TcpListener::bind(bind_address).await {
        Ok(listener) => listener,
        Err(e) if e.kind() == ErrorKind::AddrInUse => {
            tracing::error!(
                "Failed to bind to socket address {bind_address}: {e}. Tip: Ensure no other process is using port {} or try a different port.",
                bind_address.port()
            );
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!("Failed to bind to socket address {bind_address}: {e}");
            std::process::exit(1);
        }
    };

    // This will give us the chosen port if the user specified a port of 0
    let actual_bind_address = listener
        .local_addr()
        .expect_pretty("Failed to get bind address from listener");

    tracing::info!("docchat gateway is listening on {actual_bind_address}");

    if base_path.is_empty() {
        tracing::info!("├ API Base Path: /");
    } else {
        tracing::info!("├ API Base Path: {base_path}");
    }

    tracing::info!(
        "├ Model: {} ({})",
        app_state.model.model_name(),
        app_state.model.provider_type()
    );

    if let Some(path) = &args.config_file {
        tracing::info!("└ Configuration: {}", path.display());
    } else {
        tracing::info!("└ Configuration: default");
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect_pretty("Failed to start server");
}

fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(cors.to_header_values()))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(cors.allow_credentials)
        .max_age(cors.max_age())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect_pretty("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect_pretty("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        }
    };
}

/// We don't allow panic, escape, unwrap, or similar methods in the codebase,
/// except for the private `expect_pretty` method, which is to be used only in
/// main.rs during initialization. After initialization, we expect all code to
/// handle errors gracefully.
///
/// `expect_pretty` will print an error message and exit with a status code of 1.
trait ExpectPretty<T> {
    fn expect_pretty(self, msg: &str) -> T;
}

impl<T, E: Display> ExpectPretty<T> for Result<T, E> {
    fn expect_pretty(self, msg: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::error!("{msg}: {err}");
                std::process::exit(1);
            }
        }
    }
}

impl<T> ExpectPretty<T> for Option<T> {
    fn expect_pretty(self, msg: &str) -> T {
        match self {
            Some(value) => value,
            None => {
                tracing::error!("{msg}");
                std::process::exit(1);
            }
        }
    }
}
