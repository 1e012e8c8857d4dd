//! Inactivity countdown driving automatic logout.
//!
//! Armed after login, the monitor sleeps toward a deadline that every
//! user-activity signal pushes back to `now + window`. If the deadline
//! elapses untouched, the idle callback fires exactly once and the monitor
//! disarms itself; `disarm` cancels the pending countdown with no residual
//! callback.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// The activity signals the host shell forwards; used for logging only,
/// every kind resets the countdown the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    PointerMove,
    PointerDown,
    KeyPress,
    Scroll,
    TouchStart,
}

struct Armed {
    generation: u64,
    activity_tx: watch::Sender<()>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Inner {
    armed: Option<Armed>,
    generation: u64,
}

pub struct IdleMonitor {
    window: Duration,
    inner: Arc<Mutex<Inner>>,
}

impl IdleMonitor {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
        inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start (or restart) the countdown. Must only be called once the
    /// session is authenticated; re-arming replaces any previous countdown.
    pub fn arm<F, Fut>(&self, on_idle: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut inner = Self::lock(&self.inner);
        if let Some(previous) = inner.armed.take() {
            previous.task.abort();
        }

        inner.generation += 1;
        let generation = inner.generation;
        let (activity_tx, mut activity_rx) = watch::channel(());
        let window = self.window;
        let shared = Arc::clone(&self.inner);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(window) => {
                        // Claim the fire atomically: if a disarm won the
                        // race, the slot is already empty or re-armed and
                        // the callback must not run.
                        let claimed = {
                            let mut inner = Self::lock(&shared);
                            match &inner.armed {
                                Some(armed) if armed.generation == generation => {
                                    inner.armed = None;
                                    true
                                }
                                _ => false,
                            }
                        };
                        if claimed {
                            info!("Idle window elapsed with no activity; firing idle callback");
                            on_idle().await;
                        }
                        return;
                    }
                    changed = activity_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        // Activity observed: fall through and restart the sleep.
                    }
                }
            }
        });

        inner.armed = Some(Armed {
            generation,
            activity_tx,
            task,
        });
        debug!(window_secs = window.as_secs(), "Idle monitor armed");
    }

    /// Push the deadline back to `now + window`. No-op while disarmed.
    pub fn activity(&self, kind: ActivityKind) {
        let inner = Self::lock(&self.inner);
        if let Some(armed) = &inner.armed {
            debug!(?kind, "Activity; idle deadline reset");
            let _ = armed.activity_tx.send(());
        }
    }

    /// Cancel the pending countdown. Guarantees no callback fires after
    /// this returns.
    pub fn disarm(&self) {
        let mut inner = Self::lock(&self.inner);
        if let Some(armed) = inner.armed.take() {
            armed.task.abort();
            debug!("Idle monitor disarmed");
        }
    }

    pub fn is_armed(&self) -> bool {
        Self::lock(&self.inner).armed.is_some()
    }
}

impl Drop for IdleMonitor {
    fn drop(&mut self) {
        self.disarm();
    }
}
