//! Finite State Machine for a single deployment run

use crate::models::deployment::Step;

/// Deployment state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentState {
    /// Nothing has happened yet
    Pending,

    /// Working on a pipeline step
    InProgress(Step),

    /// Container started
    Succeeded,

    /// Stopped on an error
    Failed,
}

/// Deployment event
#[derive(Debug, Clone)]
pub enum DeploymentEvent {
    /// Begin a pipeline step
    Enter(Step),

    /// Pipeline finished
    Succeed,

    /// Pipeline aborted
    Fail(String),
}

/// Tracks the pipeline position of one deployment.
///
/// Steps only move forward, success is only reachable from the run step and
/// both terminal states are final.
#[derive(Debug, Clone)]
pub struct DeploymentFsm {
    state: DeploymentState,
    error: Option<String>,
}

impl DeploymentFsm {
    /// Create a new FSM in pending state
    pub fn new() -> Self {
        Self {
            state: DeploymentState::Pending,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> &DeploymentState {
        &self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Step currently being worked on
    pub fn current_step(&self) -> Option<Step> {
        match self.state {
            DeploymentState::InProgress(step) => Some(step),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, DeploymentState::Succeeded | DeploymentState::Failed)
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: DeploymentEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (DeploymentState::Pending, DeploymentEvent::Enter(step)) => {
                DeploymentState::InProgress(*step)
            }
            (DeploymentState::InProgress(current), DeploymentEvent::Enter(next))
                if next > current =>
            {
                DeploymentState::InProgress(*next)
            }

            (DeploymentState::InProgress(Step::Running), DeploymentEvent::Succeed) => {
                DeploymentState::Succeeded
            }

            (DeploymentState::Pending | DeploymentState::InProgress(_), DeploymentEvent::Fail(err)) => {
                self.error = Some(err.clone());
                DeploymentState::Failed
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!(
                    "Invalid transition: {:?} -> {:?}",
                    state, event
                ));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for DeploymentFsm {
    fn default() -> Self {
        Self::new()
    }
}
