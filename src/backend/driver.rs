//! The generate → build → test → install sequence shared by every backend.
//!
//! Stages only move forward. The first failing stage ends the run and the
//! stages after it never start; whatever earlier stages produced stays on
//! disk.

use std::fmt;
use std::time::SystemTime;

use sha2::{Digest, Sha256};

use super::{BuildBackend, BuildContext};
use crate::errors::{BuildError, Result};
use crate::staleness::{decide, StalenessVerdict};
use crate::store::PersistedConfig;
use crate::util::fs::{modified_time, remove_dir_all_if_exists, remove_file_if_exists};
use crate::util::process::{ProcessBuilder, RunStatus};

/// One step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Generate,
    Build,
    Test,
    Install,
}

impl Stage {
    fn failure(self, exit_code: Option<i32>) -> BuildError {
        match self {
            Stage::Generate => BuildError::GenerateFailed { exit_code },
            Stage::Build => BuildError::BuildFailed { exit_code },
            Stage::Test => BuildError::TestFailed { exit_code },
            Stage::Install => BuildError::InstallFailed { exit_code },
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Generate => write!(f, "generate"),
            Stage::Build => write!(f, "build"),
            Stage::Test => write!(f, "test"),
            Stage::Install => write!(f, "install"),
        }
    }
}

/// What the generate stage did.
#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    /// Staleness verdict for the build directory
    pub verdict: StalenessVerdict,

    /// True when the directory was reused without running the generator
    pub skipped: bool,

    /// Set when the new configuration could not be recorded
    pub persist_warning: Option<String>,
}

/// Summary of a completed pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub generate: GenerateOutcome,

    /// Stages that ran, in order
    pub stages: Vec<Stage>,
}

/// Drives one backend through the pipeline for one build context.
pub struct Driver<'a> {
    backend: &'a dyn BuildBackend,
    ctx: &'a BuildContext,
}

impl<'a> Driver<'a> {
    pub fn new(backend: &'a dyn BuildBackend, ctx: &'a BuildContext) -> Self {
        Driver { backend, ctx }
    }

    /// Persisted configuration of the build directory and the verdict for it.
    ///
    /// Reads files only; never starts a process.
    pub fn assess(&self) -> (Option<PersistedConfig>, StalenessVerdict) {
        let persisted = self.backend.store().read(&self.ctx.build_dir);
        let description = self
            .ctx
            .source_dir
            .join(self.backend.build_system().description_file());
        let hint = self.backend.generator_hint(self.ctx);

        let verdict = decide(
            &self.ctx.toolchain,
            hint.as_deref(),
            persisted.as_ref(),
            self.ctx.wipe,
            modified_time(&description),
            self.ctx.host,
        );
        (persisted, verdict)
    }

    /// Digest of everything that shapes generation: arguments and compilers.
    pub fn args_digest(&self, args: &[String]) -> String {
        let mut hasher = Sha256::new();
        for arg in args {
            hasher.update(arg.as_bytes());
            hasher.update([0]);
        }
        for (key, value) in self.ctx.toolchain.env_vars() {
            hasher.update(format!("{}={}", key, value).as_bytes());
            hasher.update([0]);
        }
        hex::encode(hasher.finalize())
    }

    /// Run the generator, wiping stale metadata first.
    ///
    /// An up-to-date directory generated with the same arguments is reused
    /// as is.
    pub fn generate(&self) -> Result<GenerateOutcome> {
        let build_dir = &self.ctx.build_dir;
        let store = self.backend.store();
        let (mut persisted, verdict) = self.assess();

        if verdict.must_wipe {
            if let Some(reason) = verdict.reason_text() {
                tracing::info!("wiping {} metadata in {}: {}", store.name(), build_dir.display(), reason);
            }
            self.wipe_metadata()?;
            persisted = None;
        }

        let args = self.backend.generate_args(self.ctx);
        let digest = self.args_digest(&args);

        let unchanged = persisted
            .as_ref()
            .and_then(|p| p.args_digest.as_deref())
            .is_some_and(|previous| previous == digest);
        if unchanged && self.backend.is_configured(build_dir) {
            tracing::info!("{} is up to date, skipping generation", build_dir.display());
            return Ok(GenerateOutcome {
                verdict,
                skipped: true,
                persist_warning: None,
            });
        }

        if let Err(e) = store.prepare(build_dir) {
            tracing::warn!("could not request {} introspection: {:#}", store.name(), e);
        }

        tracing::info!(
            "generating {} build files in {}",
            self.backend.build_system(),
            build_dir.display()
        );
        run_step(Stage::Generate, self.backend.generate_command(self.ctx, &args))?;

        let config = PersistedConfig {
            generator: self.backend.generator_hint(self.ctx),
            compilers: self.ctx.toolchain.compilers().clone(),
            captured_at: Some(SystemTime::now()),
            args_digest: Some(digest),
        };
        let persist_warning = match store.write(build_dir, &config) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!("{}; the next run will regenerate", e);
                Some(e.to_string())
            }
        };

        Ok(GenerateOutcome {
            verdict,
            skipped: false,
            persist_warning,
        })
    }

    pub fn build(&self) -> Result<()> {
        tracing::info!("building in {}", self.ctx.build_dir.display());
        run_step(Stage::Build, self.backend.build_command(self.ctx))
    }

    /// Run the test suite. Does nothing unless tests were requested.
    pub fn test(&self) -> Result<bool> {
        if !self.ctx.run_tests {
            return Ok(false);
        }
        let cmd = self.backend.test_command(self.ctx)?;
        tracing::info!("running tests");
        run_step(Stage::Test, cmd)?;
        Ok(true)
    }

    /// Install. Does nothing without an install directory.
    pub fn install(&self) -> Result<bool> {
        let Some(ref prefix) = self.ctx.install_dir else {
            return Ok(false);
        };
        tracing::info!("installing to {}", prefix.display());
        run_step(Stage::Install, self.backend.install_command(self.ctx))?;
        Ok(true)
    }

    /// Run every stage in order, stopping at the first failure.
    pub fn run(&self) -> Result<PipelineReport> {
        let generate = self.generate()?;
        let mut stages = Vec::new();
        if !generate.skipped {
            stages.push(Stage::Generate);
        }

        self.build()?;
        stages.push(Stage::Build);

        if self.test()? {
            stages.push(Stage::Test);
        }
        if self.install()? {
            stages.push(Stage::Install);
        }

        Ok(PipelineReport { generate, stages })
    }

    /// Remove the backend's generated metadata, leaving the rest of the
    /// build directory untouched.
    fn wipe_metadata(&self) -> Result<()> {
        for path in self.backend.store().metadata_paths(&self.ctx.build_dir) {
            if path.is_dir() {
                remove_dir_all_if_exists(&path)?;
            } else {
                remove_file_if_exists(&path)?;
            }
        }
        Ok(())
    }
}

fn run_step(stage: Stage, cmd: ProcessBuilder) -> Result<()> {
    tracing::debug!("{}: {}", stage, cmd.display_command());

    match cmd.run()? {
        status if status.success() => Ok(()),
        RunStatus::Exited(code) => Err(stage.failure(code)),
        RunStatus::TimedOut => Err(BuildError::Timeout {
            command: cmd.display_command(),
            limit: cmd.get_timeout().unwrap_or_default(),
        }),
    }
}
