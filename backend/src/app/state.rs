//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::authn::session_store::SessionStore;
use crate::deploy::command::{CommandRunner, ProcessRunner};
use crate::deploy::orchestrator::Deployer;
use crate::server::state::ServerState;

/// Main application state
pub struct AppState {
    /// Password and session tokens
    pub sessions: Arc<SessionStore>,

    /// Deployment pipeline
    pub deployer: Arc<Deployer>,
}

impl AppState {
    /// Initialize application state with real processes
    pub fn init(options: &AppOptions) -> Self {
        Self::with_runner(options, Arc::new(ProcessRunner::new()))
    }

    /// Initialize application state on top of a given command runner
    pub fn with_runner(options: &AppOptions, runner: Arc<dyn CommandRunner>) -> Self {
        info!("Initializing application state...");

        let sessions = Arc::new(SessionStore::new(
            options.auth.password.clone(),
            options.auth.session_ttl,
        ));
        let deployer = Arc::new(Deployer::new(runner, options.deploy.clone()));

        Self { sessions, deployer }
    }

    /// State handed to the HTTP layer
    pub fn server_state(&self, options: &AppOptions) -> ServerState {
        ServerState::new(
            self.sessions.clone(),
            self.deployer.clone(),
            options.stream.clone(),
        )
    }
}
