//! Application configuration options

use std::time::Duration;

use secrecy::SecretString;

use crate::deploy::orchestrator::DeployOptions;
use crate::server::state::StreamOptions;
use crate::storage::settings::Settings;
use crate::workers::session_sweeper;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Server configuration
    pub server: ServerOptions,

    /// Password and session lifetime
    pub auth: AuthOptions,

    /// Deployment pipeline options
    pub deploy: DeployOptions,

    /// Streaming endpoint options
    pub stream: StreamOptions,

    /// Session sweeper worker options
    pub session_sweeper: session_sweeper::Options,

    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl AppOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            auth: AuthOptions {
                password: settings.auth.password.clone(),
                session_ttl: Duration::from_secs(settings.auth.session_ttl_secs),
            },
            deploy: DeployOptions {
                workspace_root: settings.deploy.workspace_root.clone(),
                public_host: settings.deploy.public_host.clone(),
            },
            stream: StreamOptions {
                event_buffer: settings.deploy.event_buffer,
                cancel_on_disconnect: settings.deploy.cancel_on_disconnect,
            },
            session_sweeper: session_sweeper::Options {
                interval: Duration::from_secs(settings.auth.sweep_interval_secs.max(1)),
            },
            max_shutdown_delay: Duration::from_secs(settings.max_shutdown_delay_secs),
        }
    }
}

/// Authentication options
#[derive(Debug, Clone)]
pub struct AuthOptions {
    /// Password at startup
    pub password: SecretString,

    /// Lifetime of a session token
    pub session_ttl: Duration,
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}
