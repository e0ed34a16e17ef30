//! Cooperative shutdown: the first Ctrl-C asks workers to stop after their
//! current item, the second aborts the process.

use tokio::sync::watch;
use tracing::warn;

/// Exit code for an interrupted run.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Sending half, owned by the orchestrator.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Receiving half, cloned into every worker.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Create a connected trigger/receiver pair.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

impl Shutdown {
    /// A receiver that never fires, for single-site runs and tests.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested.
    pub async fn requested(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                // trigger dropped without firing
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Install the Ctrl-C handler: first signal triggers a graceful stop,
/// second exits the process with code 130.
pub fn install_ctrl_c(trigger: ShutdownTrigger) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received, finishing current items (press Ctrl-C again to abort)");
        trigger.trigger();

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Second interrupt, aborting");
            std::process::exit(EXIT_INTERRUPTED);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_reaches_all_receivers() {
        let (trigger, shutdown) = channel();
        let mut a = shutdown.clone();
        let b = trigger.subscribe();
        assert!(!a.is_requested());

        trigger.trigger();
        tokio::time::timeout(Duration::from_secs(1), a.requested()).await.unwrap();
        assert!(b.is_requested());
        assert!(trigger.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_does_not_fire() {
        let mut never = Shutdown::never();
        let waited = tokio::time::timeout(Duration::from_secs(5), never.requested()).await;
        assert!(waited.is_err());
        assert!(!never.is_requested());
    }
}
