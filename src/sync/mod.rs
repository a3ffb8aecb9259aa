//! Sync Orchestrator: full pull → merge → push cycles on login / foreground,
//! debounced push-only cycles after tracked local writes.

pub mod debounce;
pub mod snapshot;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::auth::AuthProvider;
use crate::config::SyncConfig;
use crate::domain::merge::Merge;
use crate::events::StoreEvent;
use crate::remote::{RemoteError, RemoteStore};
use crate::store::keys;
use crate::store::{Store, StoreError, WriteError};

use debounce::Debouncer;
use snapshot::SyncSnapshot;

const TRIGGER_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub debounce: Duration,
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            debounce: config.debounce(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncState {
    Idle,
    Syncing,
    PendingPush,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Login,
    Foreground,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Whether the remote held a snapshot to merge.
    pub pulled: bool,
    pub written_keys: usize,
    pub pushed_sections: usize,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync disabled: not logged in")]
    Disabled,
    #[error("a sync cycle is already running")]
    AlreadySyncing,
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Clears the in-flight flag when the cycle ends, however it ends.
struct CycleGuard<'a>(&'a AtomicBool);

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncOrchestrator {
    store: Arc<Store>,
    remote: Arc<dyn RemoteStore>,
    auth: Arc<dyn AuthProvider>,
    settings: SyncSettings,
    syncing: AtomicBool,
    pending: AtomicBool,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<Store>,
        remote: Arc<dyn RemoteStore>,
        auth: Arc<dyn AuthProvider>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            store,
            remote,
            auth,
            settings,
            syncing: AtomicBool::new(false),
            pending: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> SyncSettings {
        self.settings
    }

    pub fn state(&self) -> SyncState {
        if self.syncing.load(Ordering::Acquire) {
            SyncState::Syncing
        } else if self.pending.load(Ordering::Acquire) {
            SyncState::PendingPush
        } else {
            SyncState::Idle
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Runs one full pull → merge → push cycle.
    ///
    /// The merged snapshot is written locally before anything is pushed, so
    /// a failed push leaves local state converged with what was pulled.
    pub async fn sync_now(&self) -> Result<SyncReport, SyncError> {
        let token = self.auth.sync_token().ok_or(SyncError::Disabled)?;
        let _guard = CycleGuard::acquire(&self.syncing).ok_or(SyncError::AlreadySyncing)?;

        let remote = self.remote.pull(&token).await?;
        let pulled = remote.is_some();

        // 合并时读取最新的本地快照，而不是周期开始时的旧副本
        let local = SyncSnapshot::collect(&self.store);
        let merged = match &remote {
            Some(remote) => local.merge(remote),
            None => local,
        };

        let written_keys = merged.apply_quiet(&self.store)?;
        let completed_at = Utc::now();
        if written_keys > 0 {
            self.store
                .events()
                .publish(StoreEvent::SyncCompleted { at: completed_at });
        }

        self.remote.push(&token, &merged).await?;
        self.record_sync_time(completed_at)?;

        let report = SyncReport {
            pulled,
            written_keys,
            pushed_sections: merged.section_count(),
            completed_at,
        };
        tracing::info!(
            pulled,
            written_keys,
            pushed_sections = report.pushed_sections,
            "Sync cycle completed"
        );
        Ok(report)
    }

    /// Pushes the current local snapshot without pulling and records the
    /// sync time. Returns `false` when skipped because a full cycle is in
    /// flight.
    pub async fn push_local(&self) -> Result<bool, SyncError> {
        let token = self.auth.sync_token().ok_or(SyncError::Disabled)?;
        if self.is_syncing() {
            tracing::debug!("Full sync in flight, skipping debounced push");
            return Ok(false);
        }

        let snapshot = SyncSnapshot::collect(&self.store);
        self.remote.push(&token, &snapshot).await?;
        self.record_sync_time(Utc::now())?;
        tracing::debug!(sections = snapshot.section_count(), "Pushed local changes");
        Ok(true)
    }

    fn record_sync_time(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.store
            .set_meta(keys::LAST_SYNC_TIME, at.to_rfc3339().as_bytes())
    }

    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        let raw = match self.store.get_meta(keys::LAST_SYNC_TIME) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read last sync time");
                return None;
            }
        };
        let text = String::from_utf8(raw).ok()?;
        DateTime::parse_from_rfc3339(&text)
            .ok()
            .map(|at| at.with_timezone(&Utc))
    }

    /// Starts the event loop. It stops when `shutdown` fires or every
    /// [`SyncHandle`] has been dropped.
    pub fn spawn(self: Arc<Self>, shutdown: broadcast::Receiver<()>) -> (SyncHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(TRIGGER_CHANNEL_CAPACITY);
        let events = self.store.subscribe();
        let handle = tokio::spawn(self.run(events, rx, shutdown));
        (SyncHandle { tx }, handle)
    }

    /// A debounce that expires during a full cycle is re-armed rather than
    /// dropped, since the cycle may have collected before the last write.
    async fn run(
        self: Arc<Self>,
        mut events: broadcast::Receiver<StoreEvent>,
        mut triggers: mpsc::Receiver<SyncTrigger>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut debouncer = Debouncer::new(self.settings.debounce);
        tracing::info!(
            debounce_ms = self.settings.debounce.as_millis() as u64,
            "Sync orchestrator started"
        );

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(StoreEvent::Changed { key }) => {
                        if keys::is_sync_target(&key) && self.auth.is_logged_in() {
                            debouncer.arm();
                            self.pending.store(true, Ordering::Release);
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Sync orchestrator lagged behind store events");
                        if self.auth.is_logged_in() {
                            debouncer.arm();
                            self.pending.store(true, Ordering::Release);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                trigger = triggers.recv() => match trigger {
                    Some(trigger) => self.clone().spawn_cycle(trigger),
                    None => break,
                },
                _ = debouncer.fired() => {
                    if self.is_syncing() {
                        // 进行中的同步可能已读过旧快照，稍后再推一次
                        debouncer.arm();
                    } else {
                        self.pending.store(false, Ordering::Release);
                        self.clone().spawn_push();
                    }
                }
                _ = shutdown.recv() => break,
            }
        }

        debouncer.cancel();
        tracing::info!("Sync orchestrator stopped");
    }

    fn spawn_cycle(self: Arc<Self>, trigger: SyncTrigger) {
        tokio::spawn(async move {
            match self.sync_now().await {
                Ok(_) => {}
                Err(SyncError::Disabled) => {
                    tracing::debug!(?trigger, "Sync trigger ignored while logged out")
                }
                Err(SyncError::AlreadySyncing) => {
                    tracing::debug!(?trigger, "Sync trigger ignored, cycle already running")
                }
                Err(e) => tracing::warn!(?trigger, error = %e, "Sync cycle failed"),
            }
        });
    }

    fn spawn_push(self: Arc<Self>) {
        tokio::spawn(async move {
            match self.push_local().await {
                Ok(_) | Err(SyncError::Disabled) => {}
                Err(e) => tracing::warn!(error = %e, "Debounced push failed"),
            }
        });
    }
}

/// Sender side of the orchestrator loop.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<SyncTrigger>,
}

impl SyncHandle {
    pub async fn login(&self) -> bool {
        self.send(SyncTrigger::Login).await
    }

    pub async fn foreground(&self) -> bool {
        self.send(SyncTrigger::Foreground).await
    }

    pub async fn request_sync(&self) -> bool {
        self.send(SyncTrigger::Manual).await
    }

    /// Returns `false` when the loop has already stopped.
    pub async fn send(&self, trigger: SyncTrigger) -> bool {
        self.tx.send(trigger).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_is_exclusive_and_released_on_drop() {
        let flag = AtomicBool::new(false);
        let first = CycleGuard::acquire(&flag);
        assert!(first.is_some());
        assert!(CycleGuard::acquire(&flag).is_none());
        drop(first);
        assert!(CycleGuard::acquire(&flag).is_some());
    }

    #[test]
    fn settings_follow_config() {
        let config = SyncConfig {
            api_url: "http://localhost".into(),
            auth_token: None,
            debounce_ms: 750,
            timeout_secs: 5,
        };
        assert_eq!(
            SyncSettings::from(&config).debounce,
            Duration::from_millis(750)
        );
    }
}
