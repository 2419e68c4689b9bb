//! mcbuild - build driver for CMake and Meson projects
//!
//! This crate picks a compiler toolchain, decides whether an existing build
//! directory can be reused, and drives the selected build system through
//! generate, build, test and install.

pub mod backend;
pub mod errors;
pub mod ops;
pub mod staleness;
pub mod store;
pub mod toolchain;
pub mod util;

/// Fake tools and fixtures for unit tests.
#[cfg(test)]
pub mod test_support;

pub use backend::{Backend, BuildBackend, BuildContext, BuildSystem, Driver, PipelineReport};
pub use errors::{BuildError, Result};
pub use staleness::{decide, StalenessVerdict, WipeReason};
pub use store::{ConfigurationStore, PersistedConfig};
pub use toolchain::{resolve, Role, ToolchainSpec, Vendor};
