//! Server state

use std::sync::Arc;
use std::time::Instant;

use crate::authn::session_store::SessionStore;
use crate::deploy::orchestrator::Deployer;

/// Streaming endpoint options
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Progress events buffered between a deployment and its client
    pub event_buffer: usize,

    /// Cancel the deployment when the client disconnects early
    pub cancel_on_disconnect: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            event_buffer: 100,
            cancel_on_disconnect: true,
        }
    }
}

/// Server state shared across handlers
pub struct ServerState {
    pub sessions: Arc<SessionStore>,
    pub deployer: Arc<Deployer>,
    pub stream: StreamOptions,
    pub started_at: Instant,
}

impl ServerState {
    pub fn new(sessions: Arc<SessionStore>, deployer: Arc<Deployer>, stream: StreamOptions) -> Self {
        Self {
            sessions,
            deployer,
            stream,
            started_at: Instant::now(),
        }
    }
}
