//! Ordered progress reporting for deployments
//!
//! The orchestrator only talks to [`ProgressSink`]; the WebSocket relay plugs
//! in a bounded channel and the blocking endpoint plugs in [`TracingSink`].

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::deploy::fsm::{DeploymentEvent, DeploymentFsm};
use crate::errors::AppError;
use crate::models::deployment::{ProgressEvent, ProgressKind, Step};

/// The consumer of a sink went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkClosed;

/// Receives the progress events of one deployment, in emission order
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn send(&self, event: ProgressEvent) -> Result<(), SinkClosed>;
}

/// Bounded channel: the producer waits when the consumer lags behind
#[async_trait]
impl ProgressSink for mpsc::Sender<ProgressEvent> {
    async fn send(&self, event: ProgressEvent) -> Result<(), SinkClosed> {
        mpsc::Sender::send(self, event).await.map_err(|_| SinkClosed)
    }
}

/// Writes events to the log; used when nobody is streaming
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

#[async_trait]
impl ProgressSink for TracingSink {
    async fn send(&self, event: ProgressEvent) -> Result<(), SinkClosed> {
        match event.kind {
            ProgressKind::Status => info!("{}", event.message),
            ProgressKind::Log => debug!("{}", event.message),
            ProgressKind::Error => error!("{}", event.message),
            ProgressKind::Success => info!("{}", event.message),
        }
        Ok(())
    }
}

/// Emits the events of one deployment and guarantees a single terminal event
pub struct Reporter<'a> {
    sink: &'a dyn ProgressSink,
    fsm: DeploymentFsm,
    detached: bool,
}

impl<'a> Reporter<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            fsm: DeploymentFsm::new(),
            detached: false,
        }
    }

    pub fn current_step(&self) -> Option<Step> {
        self.fsm.current_step()
    }

    /// Enter `step` and announce it
    pub async fn step(&mut self, step: Step, message: impl Into<String>) {
        if let Err(e) = self.fsm.process(DeploymentEvent::Enter(step)) {
            warn!("{}", e);
            return;
        }
        self.emit(ProgressEvent::status(step, message)).await;
    }

    /// Extra status line within the current step
    pub async fn status(&mut self, message: impl Into<String>) {
        if let Some(step) = self.current_step() {
            self.emit(ProgressEvent::status(step, message)).await;
        }
    }

    pub async fn log(&mut self, line: impl Into<String>) {
        if !self.fsm.is_terminal() {
            self.emit(ProgressEvent::log(line)).await;
        }
    }

    pub async fn fail(&mut self, err: &AppError) {
        let step = self.current_step();
        let message = match step {
            Some(step) => format!("Deployment failed during {}: {}", step, err),
            None => format!("Deployment failed: {}", err),
        };
        if self.fsm.process(DeploymentEvent::Fail(err.to_string())).is_ok() {
            self.emit(ProgressEvent::error(step, message)).await;
        }
    }

    pub async fn succeed(&mut self, message: impl Into<String>) {
        if self.fsm.process(DeploymentEvent::Succeed).is_ok() {
            self.emit(ProgressEvent::success(message)).await;
        }
    }

    async fn emit(&mut self, event: ProgressEvent) {
        if self.detached {
            return;
        }
        if self.sink.send(event).await.is_err() {
            debug!("Progress consumer is gone, continuing without it");
            self.detached = true;
        }
    }
}
