//! Chorus agent binary.
//!
//! Resolves the config path, initializes structured logging, starts the
//! agent, and tears it down on SIGINT/SIGTERM.

use chorus_agent::config::{self, LoggingConfig};
use chorus_agent::Agent;
use tracing_subscriber::EnvFilter;

/// Config file path: first CLI argument, then `CHORUS_CONFIG_PATH`,
/// then `config.toml` in the working directory.
fn config_path() -> String {
    std::env::args()
        .nth(1)
        .filter(|arg| !arg.trim().is_empty())
        .or_else(|| {
            std::env::var("CHORUS_CONFIG_PATH")
                .ok()
                .filter(|value| !value.trim().is_empty())
        })
        .unwrap_or_else(|| "config.toml".to_string())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    let path = config_path();
    let config = config::load_config(Some(&path))
        .expect("configuration file is unreadable or malformed");

    init_tracing(&config.logging);
    tracing::info!(config = %path, "starting chorus agent");

    let agent = Agent::start(&config)
        .await
        .expect("agent failed to start; is the metrics port free?");

    wait_for_signal().await;
    agent.shutdown().await;
}

/// Blocks until SIGINT or SIGTERM arrives.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = signal(SignalKind::terminate()).expect("SIGTERM handler installs");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("SIGINT received, shutting down"),
            _ = term.recv() => tracing::info!("SIGTERM received, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("ctrl-c received, shutting down");
    }
}
