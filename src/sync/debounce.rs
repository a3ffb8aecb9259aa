use std::time::Duration;

use tokio::time::Instant;

/// Cancellable trailing-edge timer. Every [`arm`](Debouncer::arm) pushes the
/// deadline out by the full delay; [`fired`](Debouncer::fired) resolves once
/// the deadline passes without another arm.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arms the timer, or resets it when already armed.
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Waits for the armed deadline and disarms. Never resolves while
    /// disarmed. Safe to drop mid-wait (e.g. as a `select!` branch): the
    /// deadline is kept until it actually fires.
    pub async fn fired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
