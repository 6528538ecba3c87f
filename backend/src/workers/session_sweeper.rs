//! Expired session sweeper

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, info};

use crate::authn::session_store::SessionStore;

/// Session sweeper options
#[derive(Debug, Clone)]
pub struct Options {
    /// Time between sweeps
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30 * 60),
        }
    }
}

/// Run the session sweeper until shutdown.
///
/// Sweeping only frees memory; token validation checks expiry on its own.
pub async fn run<S, F>(
    options: &Options,
    sessions: &SessionStore,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Session sweeper starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Session sweeper shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }

        let removed = sessions.sweep_expired().await;
        if removed > 0 {
            info!("Removed {} expired session(s)", removed);
        } else {
            debug!("No expired sessions");
        }
    }
}
