//! Names of the deployments currently in flight

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::errors::AppError;
use crate::models::deployment::DeploymentName;

/// Advisory lock per deployment name.
///
/// Two runs with the same name would share a working directory, an image tag
/// and a container name, so the second one is rejected instead.
#[derive(Debug, Clone, Default)]
pub struct ActiveDeployments {
    names: Arc<Mutex<HashSet<String>>>,
}

impl ActiveDeployments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `name` until the returned guard is dropped
    pub fn claim(&self, name: &DeploymentName) -> Result<DeploymentGuard, AppError> {
        let mut names = self
            .names
            .lock()
            .map_err(|_| AppError::Internal("deployment registry lock poisoned".to_string()))?;
        if !names.insert(name.as_str().to_string()) {
            return Err(AppError::DeploymentInProgress(name.to_string()));
        }
        Ok(DeploymentGuard {
            names: self.names.clone(),
            name: name.as_str().to_string(),
        })
    }

    pub fn is_active(&self, name: &DeploymentName) -> bool {
        self.names
            .lock()
            .map(|names| names.contains(name.as_str()))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.names.lock().map(|names| names.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases its name on drop
#[derive(Debug)]
pub struct DeploymentGuard {
    names: Arc<Mutex<HashSet<String>>>,
    name: String,
}

impl Drop for DeploymentGuard {
    fn drop(&mut self) {
        if let Ok(mut names) = self.names.lock() {
            names.remove(&self.name);
        }
    }
}
