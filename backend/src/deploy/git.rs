//! Git commands for fetching deployment sources

use std::path::Path;

use url::Url;

use crate::deploy::command::CommandSpec;
use crate::errors::AppError;
use crate::models::deployment::DeploymentName;

/// `git clone -- <url> <name>` run inside `workdir`
pub fn clone_command(
    repo_url: &str,
    access_token: Option<&str>,
    name: &DeploymentName,
    workdir: &Path,
) -> Result<CommandSpec, AppError> {
    let spec = match access_token {
        Some(token) => CommandSpec::new("git")
            .args(["clone", "--", authenticated_url(repo_url, token)?.as_str(), name.as_str()])
            .redacting(token),
        None => CommandSpec::new("git").args(["clone", "--", repo_url, name.as_str()]),
    };
    Ok(spec.current_dir(workdir))
}

/// Embed an access token as HTTPS basic credentials
pub fn authenticated_url(repo_url: &str, token: &str) -> Result<Url, AppError> {
    let mut url = Url::parse(repo_url)
        .map_err(|e| AppError::Validation(format!("invalid repo_url: {}", e)))?;
    if url.scheme() != "https" {
        return Err(AppError::Validation(
            "access tokens can only be used with https repositories".to_string(),
        ));
    }
    url.set_username("x-access-token")
        .and_then(|_| url.set_password(Some(token)))
        .map_err(|_| AppError::Validation("repo_url cannot carry credentials".to_string()))?;
    Ok(url)
}
