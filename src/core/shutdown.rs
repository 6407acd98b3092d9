//! Shutdown coordination
//!
//! One coordinator per process. Signal handlers and programmatic callers both
//! trip the same flag and broadcast, and a second signal forces an exit.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Exit status used when a second signal forces termination
pub const FORCED_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    requested: Arc<AtomicBool>,
    signals_seen: Arc<AtomicUsize>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(8);
        Self {
            shutdown_tx,
            requested: Arc::new(AtomicBool::new(false)),
            signals_seen: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn trigger_shutdown(&self) {
        self.requested.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Resolve once shutdown has been requested, including before the call
    pub async fn wait(&self) {
        let mut rx = self.subscribe();
        if self.is_shutdown_requested() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// Route SIGINT/SIGTERM/SIGHUP (or Ctrl-C elsewhere) into this coordinator
    pub fn install_signal_handlers(&self) {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            for kind in [
                SignalKind::interrupt(),
                SignalKind::terminate(),
                SignalKind::hangup(),
            ] {
                let coordinator = self.clone();
                tokio::spawn(async move {
                    let Ok(mut stream) = signal(kind) else {
                        log::warn!("Could not install handler for signal {:?}", kind);
                        return;
                    };
                    while stream.recv().await.is_some() {
                        coordinator.on_signal();
                    }
                });
            }
        }

        #[cfg(not(unix))]
        {
            let coordinator = self.clone();
            tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    coordinator.on_signal();
                }
            });
        }
    }

    fn on_signal(&self) {
        let previous = self.signals_seen.fetch_add(1, Ordering::AcqRel);
        if previous >= 1 {
            log::warn!("Second signal received; exiting");
            std::process::exit(FORCED_EXIT_CODE);
        }
        log::info!("Shutdown requested");
        self.trigger_shutdown();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
