//! Server initialization and run loop

use super::config::AppConfig;
use super::hooks::{router, HookState};
use super::interactions::LoggingHandler;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use switchboard_channels::{InteractionHandler, TelegramAdapter};
use switchboard_core::{MessageEngine, RemoteMessenger};
use tracing::{info, warn};

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }
}

/// Engine and Telegram adapter built from the configuration
pub struct Runtime {
    pub engine: Arc<MessageEngine>,
    pub adapter: Arc<TelegramAdapter>,
}

/// Open the store and connect the Telegram adapter
pub async fn build_runtime(config: &AppConfig) -> Result<Runtime> {
    let store = config
        .store
        .open()
        .await
        .context("Failed to open message store")?;
    info!(backend = %config.store.backend, "Message store ready");

    let adapter = TelegramAdapter::new(config.telegram.resolve()?)
        .context("Failed to create Telegram adapter")?;

    Ok(Runtime {
        engine: Arc::new(MessageEngine::new(store, config.engine.clone())),
        adapter: Arc::new(adapter),
    })
}

/// Run the HTTP server (and the Telegram update loop) until shutdown
pub async fn run(config: AppConfig) -> Result<()> {
    info!("Starting Switchboard v{}", env!("CARGO_PKG_VERSION"));

    if !config.telegram.enabled {
        anyhow::bail!("telegram.enabled is false; the service has no remote to edit messages on");
    }
    let runtime = build_runtime(&config).await?;
    let bot_id = runtime.adapter.bot_id();

    let polling = if config.telegram.polling {
        let adapter = runtime.adapter.clone();
        let engine = runtime.engine.clone();
        let handler: Arc<dyn InteractionHandler> = Arc::new(LoggingHandler);
        Some(tokio::spawn(async move {
            if let Err(e) = adapter.run(engine, handler).await {
                warn!("Telegram update loop stopped: {}", e);
            }
        }))
    } else {
        info!("Telegram polling disabled");
        None
    };

    if config.hooks.secret.is_none() {
        warn!("hooks.secret is not set; /hooks requests will be rejected");
    }

    let remote: Arc<dyn RemoteMessenger> = runtime.adapter.clone();
    let app = router(HookState {
        engine: runtime.engine.clone(),
        remote,
        bot_id,
        hooks: config.hooks.clone(),
    });

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    info!("HTTP server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    if let Some(handle) = polling {
        handle.abort();
    }

    info!("Switchboard shutdown complete");
    Ok(())
}
