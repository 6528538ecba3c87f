//! Deployment pipeline: clone, prepare Dockerfile, build, run

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::deploy::command::{CommandRunner, CommandSpec};
use crate::deploy::progress::{ProgressSink, Reporter};
use crate::deploy::registry::ActiveDeployments;
use crate::deploy::{docker, git, templates};
use crate::errors::AppError;
use crate::filesys::dir::Dir;
use crate::models::deployment::{DeploymentName, DeploymentOutcome, DeploymentRequest, Step};

/// Lines buffered between a running command and the progress sink
const LINE_BUFFER: usize = 64;

/// Deployer options
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Parent of the per-deployment working directories
    pub workspace_root: PathBuf,

    /// Host used in the URL reported after a successful run
    pub public_host: String,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            workspace_root: std::env::temp_dir(),
            public_host: "localhost".to_string(),
        }
    }
}

/// Runs deployments, one independent pipeline per call
pub struct Deployer {
    runner: Arc<dyn CommandRunner>,
    options: DeployOptions,
    active: ActiveDeployments,
    shutdown: CancellationToken,
}

impl Deployer {
    pub fn new(runner: Arc<dyn CommandRunner>, options: DeployOptions) -> Self {
        Self {
            runner,
            options,
            active: ActiveDeployments::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token for one deployment, also cancelled by [`Deployer::cancel_all`]
    pub fn cancel_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Cancel every deployment started with a [`Deployer::cancel_token`]
    pub fn cancel_all(&self) {
        if !self.active.is_empty() {
            info!("Cancelling {} running deployment(s)", self.active.len());
        }
        self.shutdown.cancel();
    }

    pub fn active(&self) -> &ActiveDeployments {
        &self.active
    }

    /// Working directory of a deployment
    pub fn workdir(&self, name: &DeploymentName) -> Dir {
        Dir::new(self.options.workspace_root.join(format!("harbory-deploy-{}", name)))
    }

    /// Deploy a repository, reporting progress to `sink`.
    ///
    /// Exactly one terminal event (`success` or `error`) is sent last. Nothing
    /// is rolled back on failure.
    pub async fn deploy(
        &self,
        request: &DeploymentRequest,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<DeploymentOutcome, AppError> {
        let mut reporter = Reporter::new(sink);

        let result = match request.validate() {
            Ok(name) => {
                let span = info_span!("deploy", id = %uuid::Uuid::new_v4(), name = %name);
                self.run_pipeline(request, name, &mut reporter, cancel)
                    .instrument(span)
                    .await
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(outcome) => {
                info!("Deployment {} is running", outcome.name);
                reporter.succeed(success_message(outcome)).await;
            }
            Err(e) => {
                error!("Deployment failed: {}", e);
                reporter.fail(e).await;
            }
        }
        result
    }

    async fn run_pipeline(
        &self,
        request: &DeploymentRequest,
        name: DeploymentName,
        reporter: &mut Reporter<'_>,
        cancel: &CancellationToken,
    ) -> Result<DeploymentOutcome, AppError> {
        let _guard = self.active.claim(&name)?;

        // 1. Fresh working directory
        let workdir = self.workdir(&name);
        reporter
            .step(
                Step::Initializing,
                format!("Creating deployment directory: {}", workdir.path().display()),
            )
            .await;
        workdir.reset().await?;

        // 2. Clone
        checkpoint(cancel)?;
        let clone = git::clone_command(&request.repo_url, request.access_token(), &name, workdir.path())?;
        reporter
            .step(Step::Cloning, format!("Cloning repository: {}", request.repo_url))
            .await;
        self.run_streamed(&clone, reporter, cancel).await?;
        let repo_dir = workdir.subdir(name.as_str());

        // 3. Dockerfile
        checkpoint(cancel)?;
        let dockerfile = if request.has_dockerfile {
            let path = request.dockerfile_path();
            reporter
                .step(Step::Dockerfile, format!("Using existing Dockerfile: {}", path))
                .await;
            path.to_string()
        } else {
            let framework = request.framework().unwrap_or_default();
            reporter
                .step(
                    Step::Dockerfile,
                    format!("Generating Dockerfile for framework: {}", framework),
                )
                .await;
            let recipe = templates::dockerfile_for(framework)?;
            repo_dir.file("Dockerfile").write_string(recipe).await?;
            "Dockerfile".to_string()
        };

        // 4. Leftovers from a previous run under the same name
        checkpoint(cancel)?;
        reporter
            .step(
                Step::Cleanup,
                format!("Removing previous container and image: {}", name),
            )
            .await;
        for spec in [docker::remove_container(&name), docker::remove_image(&name)] {
            match self.runner.run(&spec, None, cancel).await {
                Ok(()) => {}
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(e) => debug!("Ignoring cleanup failure: {}", e),
            }
        }

        // 5. Build
        checkpoint(cancel)?;
        reporter
            .step(Step::Building, format!("Building Docker image: {}", name))
            .await;
        self.run_streamed(&docker::build(&name, &dockerfile, repo_dir.path()), reporter, cancel)
            .await?;

        // 6. Exposed ports
        checkpoint(cancel)?;
        reporter.step(Step::Ports, "Detecting exposed ports...").await;
        let ports = match self
            .runner
            .output(&docker::inspect_exposed_ports(&name), cancel)
            .await
        {
            Ok(raw) => docker::detect_ports(&raw),
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => {
                warn!("Port detection failed, publishing no ports: {}", e);
                Vec::new()
            }
        };
        for port in &ports {
            reporter
                .status(format!("Mapping port: {} -> {}", port, port))
                .await;
        }

        // 7. Run
        checkpoint(cancel)?;
        reporter
            .step(Step::Running, format!("Starting container: {}", name))
            .await;
        self.run_streamed(&docker::run(&name, &ports), reporter, cancel)
            .await?;

        let url = ports
            .first()
            .map(|port| format!("http://{}:{}", self.options.public_host, port));
        Ok(DeploymentOutcome {
            name: name.to_string(),
            ports,
            url,
        })
    }

    /// Run a command while relaying its output lines as `log` events
    async fn run_streamed(
        &self,
        spec: &CommandSpec,
        reporter: &mut Reporter<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), AppError> {
        let (tx, mut rx) = mpsc::channel(LINE_BUFFER);
        let run = self.runner.run(spec, Some(tx), cancel);
        let relay = async {
            while let Some(line) = rx.recv().await {
                reporter.log(line).await;
            }
        };
        let (result, ()) = tokio::join!(run, relay);
        result
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), AppError> {
    if cancel.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    Ok(())
}

fn success_message(outcome: &DeploymentOutcome) -> String {
    match &outcome.url {
        Some(url) => format!(
            "Container {} is now running! Access your application at: {}",
            outcome.name, url
        ),
        None => format!("Container {} is now running!", outcome.name),
    }
}
