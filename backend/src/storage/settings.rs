//! Settings file management

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Listen address override, `host:port`
pub const ENV_HTTP_ADDR: &str = "HTTP_ADDR";
/// Initial password override
pub const ENV_PASSWORD: &str = "HARBORY_PASSWORD";
/// Log level override
pub const ENV_LOG_LEVEL: &str = "HARBORY_LOG_LEVEL";

/// Backend settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,

    /// Directory for rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthSettings,

    /// Deployment configuration
    #[serde(default)]
    pub deploy: DeploySettings,

    /// Upper bound on graceful shutdown
    #[serde(default = "default_max_shutdown_delay")]
    pub max_shutdown_delay_secs: u64,
}

fn default_max_shutdown_delay() -> u64 {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            server: ServerSettings::default(),
            auth: AuthSettings::default(),
            deploy: DeploySettings::default(),
            max_shutdown_delay_secs: default_max_shutdown_delay(),
        }
    }
}

impl Settings {
    /// Settings from `path` (defaults when `None`), then environment overrides
    pub async fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut settings = match path {
            Some(path) => {
                info!("Reading settings from {}", path.display());
                File::new(path).read_json::<Settings>().await?
            }
            None => Settings::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(ENV_HTTP_ADDR).filter(|v| !v.is_empty()) {
            let (host, port) = addr
                .rsplit_once(':')
                .ok_or_else(|| AppError::Config(format!("{} must be host:port, got {}", ENV_HTTP_ADDR, addr)))?;
            self.server.port = port
                .parse()
                .map_err(|_| AppError::Config(format!("invalid port in {}: {}", ENV_HTTP_ADDR, addr)))?;
            if !host.is_empty() {
                self.server.host = host.to_string();
            }
        }

        if let Some(password) = lookup(ENV_PASSWORD).filter(|v| !v.is_empty()) {
            self.auth.password = SecretString::from(password);
        }

        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.is_empty()) {
            self.log_level = level.parse().map_err(AppError::Config)?;
        }

        Ok(())
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Authentication settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Initial dashboard password
    #[serde(default = "default_password")]
    pub password: SecretString,

    /// Session lifetime in seconds
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// Seconds between expired session sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_password() -> SecretString {
    SecretString::from("admin".to_string())
}

fn default_session_ttl() -> u64 {
    24 * 60 * 60
}

fn default_sweep_interval() -> u64 {
    30 * 60
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            password: default_password(),
            session_ttl_secs: default_session_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Deployment settings
#[derive(Debug, Clone, Deserialize)]
pub struct DeploySettings {
    /// Parent directory of deployment working directories
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    /// Host name used in the reported application URL
    #[serde(default = "default_public_host")]
    pub public_host: String,

    /// Progress events buffered per streaming client
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Cancel a deployment when its streaming client goes away
    #[serde(default = "default_true")]
    pub cancel_on_disconnect: bool,
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir()
}

fn default_public_host() -> String {
    "localhost".to_string()
}

fn default_event_buffer() -> usize {
    100
}

fn default_true() -> bool {
    true
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            public_host: default_public_host(),
            event_buffer: default_event_buffer(),
            cancel_on_disconnect: true,
        }
    }
}
