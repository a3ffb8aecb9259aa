use std::sync::Arc;

use learning_sync::auth::{AuthProvider, SessionAuth};
use learning_sync::config::Config;
use learning_sync::events::{AlertLevel, StoreEvent};
use learning_sync::logging::{init_tracing, LogConfig};
use learning_sync::remote::HttpRemoteStore;
use learning_sync::services::Trackers;
use learning_sync::store::Store;
use learning_sync::sync::{SyncOrchestrator, SyncSettings};
use tokio::sync::broadcast;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    init_tracing(&LogConfig::from(&config));
    tracing::info!("Starting learning-sync");

    let store = Arc::new(
        Store::open(&config.sled_path, &config.storage).expect("Failed to open sled database"),
    );
    store.run_migrations().expect("Failed to run migrations");

    let warning = store.check_warning(config.storage.warning_percent);
    if let Some(message) = warning.message {
        tracing::warn!(usage_percent = warning.usage_percent, "{message}");
        store.events().alert(AlertLevel::Warning, message);
    }

    let mut trackers = Trackers::new(store.clone());
    trackers.load();
    tracing::info!(
        completed_chapters = trackers.progress.completed_chapters(),
        unlocked_badges = trackers.badges.unlocked_count(),
        current_streak = trackers.statistics.current_streak(),
        quests_done_today = trackers.quests.completion_count(),
        "Local learning data loaded"
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(8);

    let auth = Arc::new(SessionAuth::new(config.sync.auth_token.clone()));
    let remote = Arc::new(HttpRemoteStore::new(&config.sync));
    let orchestrator = Arc::new(SyncOrchestrator::new(
        store.clone(),
        remote,
        auth.clone(),
        SyncSettings::from(&config.sync),
    ));
    let (sync_handle, sync_task) = orchestrator.clone().spawn(shutdown_tx.subscribe());

    // 同步、重置或导入后内存副本已过期，重新加载；存储告警仅记录日志
    let mut events = store.subscribe();
    let mut shutdown_rx = shutdown_tx.subscribe();
    let reload_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(StoreEvent::StorageAlert { level, message }) => {
                        tracing::warn!(?level, %message, "Storage alert");
                    }
                    Ok(event) => {
                        if trackers.handle_event(&event) {
                            tracing::info!(?event, "Trackers reloaded");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown_rx.recv() => break,
            }
        }
        if let Err(e) = trackers.statistics.end_session() {
            tracing::warn!(error = %e, "Failed to record final study session");
        }
    });

    if auth.is_logged_in() {
        sync_handle.login().await;
    } else {
        tracing::info!("No auth token configured, running offline");
    }

    shutdown_signal(shutdown_tx.clone()).await;

    for (name, task) in [("sync", sync_task), ("reload", reload_task)] {
        if let Err(e) = task.await {
            tracing::error!(task = name, error = %e, "Background task panicked");
        }
    }

    tracing::info!(last_sync = ?orchestrator.last_sync_time(), "Flushing store before exit");
    if let Err(e) = store.flush() {
        tracing::error!(error = %e, "Failed to flush store before exit");
    }
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}
