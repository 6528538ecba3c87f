//! Authentication

pub mod bearer;
pub mod session_store;
