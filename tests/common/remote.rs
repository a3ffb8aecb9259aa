use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use learning_sync::auth::AuthProvider;
use learning_sync::remote::{RemoteError, RemoteStore};
use learning_sync::sync::snapshot::SyncSnapshot;

/// Last-write-wins remote that keeps one snapshot in memory.
#[derive(Default)]
pub struct MemoryRemote {
    snapshot: Mutex<Option<SyncSnapshot>>,
    pulls: AtomicUsize,
    pushes: AtomicUsize,
    failing: AtomicBool,
    pull_delay_ms: AtomicU64,
}

impl MemoryRemote {
    pub fn with_snapshot(snapshot: SyncSnapshot) -> Self {
        let remote = Self::default();
        *remote.snapshot.lock().unwrap() = Some(snapshot);
        remote
    }

    pub fn snapshot(&self) -> Option<SyncSnapshot> {
        self.snapshot.lock().unwrap().clone()
    }

    pub fn pull_count(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    pub fn push_count(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Keeps every pull in flight for `delay`.
    pub fn set_pull_delay(&self, delay: Duration) {
        self.pull_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn pull(&self, _token: &str) -> Result<Option<SyncSnapshot>, RemoteError> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        // 让出一次调度，模拟网络往返
        tokio::task::yield_now().await;
        let delay = self.pull_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Network("connection refused".into()));
        }
        Ok(self.snapshot())
    }

    async fn push(&self, _token: &str, snapshot: &SyncSnapshot) -> Result<(), RemoteError> {
        tokio::task::yield_now().await;
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Network("connection refused".into()));
        }
        self.pushes.fetch_add(1, Ordering::SeqCst);
        *self.snapshot.lock().unwrap() = Some(snapshot.clone());
        Ok(())
    }
}

/// Auth collaborator with a fixed answer.
pub struct StaticAuth(pub Option<&'static str>);

impl AuthProvider for StaticAuth {
    fn is_logged_in(&self) -> bool {
        self.0.is_some()
    }

    fn token(&self) -> Option<String> {
        self.0.map(str::to_string)
    }
}
