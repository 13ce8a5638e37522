use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::{broadcast, mpsc};

use wallet_relay::config::Settings;
use wallet_relay::notification::NotificationProducer;
use wallet_relay::server::{create_app, AppState};
use wallet_relay::shutdown::{GracefulShutdown, ShutdownConfig};
use wallet_relay::tasks::ChangeTask;
use wallet_relay::telemetry::init_telemetry;
use wallet_relay::transport::{TelegramTransport, Transport};
use wallet_relay::triggers::TelegramPoller;
use wallet_relay::watcher::{Debouncer, FileWatcher};

#[tokio::main]
async fn main() -> Result<()> {
    // Missing bot token or chat id is fatal here
    let settings = Settings::new().context("Failed to load configuration")?;

    let telemetry = init_telemetry(&settings.otel).context("Failed to initialize telemetry")?;
    tracing::info!(
        address_file = %settings.watcher.address_file.display(),
        removal_mode = settings.notifier.removal_mode.as_str(),
        persist_notified = settings.notifier.persist_notified,
        otel_exporting = telemetry.is_exporting(),
        "Configuration loaded"
    );

    let telegram = Arc::new(TelegramTransport::new(&settings.telegram));
    let transport: Arc<dyn Transport> = telegram.clone();
    let state = AppState::initialize(settings.clone(), transport).await;
    tracing::info!("Application state initialized");

    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    // Watcher -> debouncer -> change task
    let (raw_tx, raw_rx) = mpsc::unbounded_channel();
    let (changes_tx, changes_rx) = mpsc::channel(1);
    let watcher = FileWatcher::start(&settings.watcher.address_file, raw_tx)
        .context("Failed to watch address file")?;

    let debounce_handle = tokio::spawn(
        Debouncer::new(settings.watcher.debounce()).run(raw_rx, changes_tx, shutdown_tx.subscribe()),
    );

    let change_task = ChangeTask::new(
        NotificationProducer::from_state(&state),
        changes_rx,
        shutdown_tx.subscribe(),
    );
    let change_handle = tokio::spawn(change_task.run());

    let poller = TelegramPoller::new(telegram, state.clone(), shutdown_tx.subscribe());
    let poller_handle = tokio::spawn(poller.run());

    let server_handle = if settings.server.enabled {
        let addr = settings.server_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        tracing::info!("Server listening on {}", addr);

        let app = create_app(state.clone());
        let mut server_shutdown = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
            }
        }))
    } else {
        None
    };

    let reason = wait_for_signal().await;

    let shutdown = GracefulShutdown::with_config(
        state.queue.clone(),
        shutdown_tx,
        ShutdownConfig::from(&settings.queue),
    );
    let result = shutdown.execute(reason).await;

    tracing::info!("Waiting for background tasks to finish...");
    tracing::debug!(path = %watcher.path().display(), "Stopping file watcher");
    drop(watcher);
    let _ = tokio::join!(debounce_handle, change_handle, poller_handle);
    if let Some(handle) = server_handle {
        let _ = handle.await;
    }

    tracing::info!(
        queue_drained = result.queue_drained,
        messages_left = result.messages_left,
        "Relay shutdown complete"
    );
    drop(telemetry);
    Ok(())
}

async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
            "interrupt"
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
            "terminate"
        }
    }
}
