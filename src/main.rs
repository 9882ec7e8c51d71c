//! Process entry point: parses configuration, initializes logging,
//! ensures the temp directory exists, and serves the router.

use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use seafhttp::backend::LocalBackend;
use seafhttp::config::Config;
use seafhttp::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    std::fs::create_dir_all(&config.temp_dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&config.temp_dir, std::fs::Permissions::from_mode(0o777))?;
    }

    let backend: Arc<dyn seafhttp::backend::Backend> =
        Arc::new(LocalBackend::new(config.temp_dir.join("repos"), HashMap::new()));
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState { config, backend });
    let app = router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolves once a `SIGINT`/`SIGTERM` (or, on non-Unix, `Ctrl+C`) arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
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
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
