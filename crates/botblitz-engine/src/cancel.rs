// Cooperative cancellation, checked at the top of every turn.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Set `flag` on the first Ctrl-C. The turn in flight still finishes.
pub fn cancel_on_ctrl_c(flag: CancelFlag) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received; stopping after the current turn");
                flag.cancel();
            }
            Err(e) => warn!("failed to listen for Ctrl-C: {e}"),
        }
    });
}
