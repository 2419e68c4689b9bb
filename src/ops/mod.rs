//! High-level operations.
//!
//! This module contains the implementation of mcbuild commands.

pub mod build;
pub mod status;

pub use build::{build, detect_build_system, BuildPlan, BuildRequest};
pub use status::{format_report, status, StatusReport};
