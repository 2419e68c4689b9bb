//! Shared utilities

pub mod config;
pub mod env;
pub mod fs;
pub mod process;

pub use config::ProjectConfig;
pub use env::{Environment, HostFamily, Tools};
pub use process::{ProcessBuilder, RunStatus};
