use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tessera::{
    AppState, AppStateError, build_app,
    cache::RemoteTier,
    config::{CACHE_PRESETS, CoreConfig, get_preset_details},
    observability::init_tracing,
    provider::{GeminiClient, LlmClient},
};

/// Exit codes: 0 normal, 64 configuration error, 69 required remote cache
/// unreachable, 70 internal invariant violation.
const EXIT_CONFIG: u8 = 64;
const EXIT_UNAVAILABLE: u8 = 69;
const EXIT_INTERNAL: u8 = 70;

#[derive(Parser)]
#[command(name = "tessera", version, about)]
struct Args {
    /// Optional JSON override file applied between preset and environment
    /// overrides.
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Print the preset catalog (or one preset) as JSON and exit.
    Presets {
        /// Preset name; omit to list all.
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(Command::Presets { name }) = args.command {
        return run_presets(name);
    }

    let config = match CoreConfig::resolve(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    init_tracing(&config.logging);
    tracing::info!(
        environment = %config.environment,
        cache_preset = %config.cache.preset,
        resilience_preset = %config.resilience.preset,
        "starting tessera"
    );

    // Connect the remote cache tier when configured. In hardened
    // environments a configured remote is required at startup; elsewhere
    // the service degrades to L1-only.
    let remote = match connect_remote(&config).await {
        Ok(remote) => remote,
        Err(message) => {
            tracing::error!(%message, "remote cache is required but unreachable");
            return ExitCode::from(EXIT_UNAVAILABLE);
        }
    };

    let llm: Arc<dyn LlmClient> = match &config.ai.api_key {
        Some(key) => {
            let http = match reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
            {
                Ok(http) => http,
                Err(e) => {
                    tracing::error!(error = %e, "failed to build HTTP client");
                    return ExitCode::from(EXIT_INTERNAL);
                }
            };
            Arc::new(GeminiClient::new(http, key.clone()))
        }
        None => {
            eprintln!(
                "Configuration error: GEMINI_API_KEY is required for model calls"
            );
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let state = match AppState::new(config.clone(), remote, llm) {
        Ok(state) => state,
        Err(AppStateError::Registry(e)) => {
            tracing::error!(error = %e, "operation registry validation failed");
            return ExitCode::from(EXIT_INTERNAL);
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to build application state");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let app = build_app(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "failed to bind");
            return ExitCode::from(EXIT_UNAVAILABLE);
        }
    };
    tracing::info!(addr = %addr, "listening");

    let serve = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = serve.await {
        tracing::error!(error = %e, "server error");
        return ExitCode::from(EXIT_INTERNAL);
    }

    tracing::info!("shutdown complete");
    ExitCode::SUCCESS
}

/// Connect the configured remote tier, honoring the hardened-environment
/// requirement. Returns `Err` only when the remote is required and down.
async fn connect_remote(
    config: &CoreConfig,
) -> Result<Option<Arc<dyn RemoteTier>>, String> {
    let Some(redis_config) = &config.cache.redis else {
        return Ok(None);
    };

    #[cfg(feature = "redis")]
    {
        match tessera::cache::RedisTier::connect(redis_config).await {
            Ok(tier) => {
                tracing::info!("remote cache connected");
                Ok(Some(Arc::new(tier)))
            }
            Err(e) if config.environment.is_hardened() => Err(e.to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "remote cache unreachable, running L1-only");
                Ok(None)
            }
        }
    }
    #[cfg(not(feature = "redis"))]
    {
        let _ = redis_config;
        if config.environment.is_hardened() {
            Err("remote cache configured but the 'redis' feature is not compiled".to_string())
        } else {
            tracing::warn!(
                "REDIS_URL is set but the 'redis' feature is not compiled; running L1-only"
            );
            Ok(None)
        }
    }
}

fn run_presets(name: Option<String>) -> ExitCode {
    match name {
        Some(name) => match get_preset_details(&name) {
            Some(details) => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&details).expect("preset serializes")
                );
                ExitCode::SUCCESS
            }
            None => {
                eprintln!(
                    "Unknown preset '{name}'. Known presets: {}",
                    CACHE_PRESETS
                        .iter()
                        .map(|p| p.name)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                ExitCode::from(EXIT_CONFIG)
            }
        },
        None => {
            let all: Vec<_> = CACHE_PRESETS
                .iter()
                .filter_map(|p| get_preset_details(p.name))
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&all).expect("presets serialize")
            );
            ExitCode::SUCCESS
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
