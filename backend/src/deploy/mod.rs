//! Deployment module

pub mod command;
pub mod docker;
pub mod fsm;
pub mod git;
pub mod orchestrator;
pub mod progress;
pub mod registry;
pub mod templates;
