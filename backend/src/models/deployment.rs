//! Deployment models

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// A deployment request received from a client
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentRequest {
    /// Source repository to clone
    #[serde(default)]
    pub repo_url: String,

    /// Whether the repository already ships a Dockerfile
    #[serde(default)]
    pub has_dockerfile: bool,

    /// Path of the shipped Dockerfile, relative to the repository root
    #[serde(default)]
    pub dockerfile_path: Option<String>,

    /// Framework used to generate a Dockerfile when none is shipped
    #[serde(default)]
    pub framework: Option<String>,

    /// Access token for private repositories
    #[serde(default, alias = "access_token")]
    pub github_token: Option<SecretString>,
}

impl DeploymentRequest {
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            has_dockerfile: false,
            dockerfile_path: None,
            framework: None,
            github_token: None,
        }
    }

    /// Checks the request shape and derives the deployment name.
    ///
    /// The framework itself is only resolved once the repository is cloned.
    pub fn validate(&self) -> Result<DeploymentName, AppError> {
        if self.repo_url.trim().is_empty() {
            return Err(AppError::Validation("repo_url is required".to_string()));
        }
        if self.repo_url.trim_start().starts_with('-') {
            return Err(AppError::Validation("repo_url must not start with '-'".to_string()));
        }
        if !self.has_dockerfile && self.framework().is_none() {
            return Err(AppError::Validation(
                "framework required when Dockerfile not provided".to_string(),
            ));
        }
        DeploymentName::from_source_url(&self.repo_url)
    }

    /// Dockerfile path to build from, defaulting to `Dockerfile`
    pub fn dockerfile_path(&self) -> &str {
        match self.dockerfile_path.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => path,
            _ => "Dockerfile",
        }
    }

    pub fn framework(&self) -> Option<&str> {
        self.framework
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
    }

    pub fn access_token(&self) -> Option<&str> {
        self.github_token
            .as_ref()
            .map(|t| t.expose_secret())
            .filter(|t| !t.is_empty())
    }
}

/// Name shared by the working directory, the image tag and the container
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeploymentName(String);

impl DeploymentName {
    /// Last path segment of the source URL with any `.git` suffix removed
    pub fn from_source_url(url: &str) -> Result<Self, AppError> {
        let last = url.trim().rsplit('/').next().unwrap_or_default();
        let name = last.strip_suffix(".git").unwrap_or(last);

        let mut chars = name.chars();
        let valid_head = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
        let valid_tail = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
        if !valid_head || !valid_tail {
            return Err(AppError::Validation(format!(
                "cannot derive a deployment name from '{}'",
                url
            )));
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeploymentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of a progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    Status,
    Log,
    Error,
    Success,
}

impl ProgressKind {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressKind::Error | ProgressKind::Success)
    }
}

/// Pipeline step a progress event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Initializing,
    Cloning,
    Dockerfile,
    Cleanup,
    Building,
    Ports,
    Running,
}

impl Step {
    pub fn label(&self) -> &'static str {
        match self {
            Step::Initializing => "initializing",
            Step::Cloning => "cloning",
            Step::Dockerfile => "dockerfile",
            Step::Cleanup => "cleanup",
            Step::Building => "building",
            Step::Ports => "ports",
            Step::Running => "running",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One unit of the ordered progress stream, also the wire message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: ProgressKind,

    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<Step>,
}

impl ProgressEvent {
    pub fn status(step: Step, message: impl Into<String>) -> Self {
        Self {
            kind: ProgressKind::Status,
            message: message.into(),
            step: Some(step),
        }
    }

    pub fn log(message: impl Into<String>) -> Self {
        Self {
            kind: ProgressKind::Log,
            message: message.into(),
            step: None,
        }
    }

    pub fn error(step: Option<Step>, message: impl Into<String>) -> Self {
        Self {
            kind: ProgressKind::Error,
            message: message.into(),
            step,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: ProgressKind::Success,
            message: message.into(),
            step: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

/// Result of a completed deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentOutcome {
    pub name: String,
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}
