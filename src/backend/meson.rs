//! Meson + Ninja backend.

use std::path::{Path, PathBuf};

use super::{missing_tool, BuildBackend, BuildContext, BuildSystem};
use crate::errors::Result;
use crate::store::meson::BUILD_NINJA;
use crate::store::{ConfigurationStore, MesonStore};
use crate::util::env::Tools;
use crate::util::process::ProcessBuilder;

/// Meson build backend; compiles with Ninja.
#[derive(Debug)]
pub struct MesonBackend {
    meson: PathBuf,
    ninja: PathBuf,
    store: MesonStore,
}

impl MesonBackend {
    pub fn new(tools: &Tools) -> Result<Self> {
        let meson = tools
            .meson
            .clone()
            .ok_or_else(|| missing_tool("meson", "build Meson projects"))?;
        let ninja = tools
            .ninja
            .clone()
            .ok_or_else(|| missing_tool("ninja", "build Meson projects"))?;
        Ok(Self::with_tools(meson, ninja))
    }

    pub fn for_inspection(tools: &Tools) -> Self {
        Self::with_tools(
            tools.meson.clone().unwrap_or_else(|| PathBuf::from("meson")),
            tools.ninja.clone().unwrap_or_else(|| PathBuf::from("ninja")),
        )
    }

    pub fn with_tools(meson: PathBuf, ninja: PathBuf) -> Self {
        MesonBackend {
            meson,
            ninja,
            store: MesonStore::new(),
        }
    }
}

impl BuildBackend for MesonBackend {
    fn build_system(&self) -> BuildSystem {
        BuildSystem::Meson
    }

    fn store(&self) -> &dyn ConfigurationStore {
        &self.store
    }

    fn generator_hint(&self, _ctx: &BuildContext) -> Option<String> {
        Some("Ninja".to_string())
    }

    fn is_configured(&self, build_dir: &Path) -> bool {
        build_dir.join(BUILD_NINJA).is_file()
    }

    fn generate_args(&self, ctx: &BuildContext) -> Vec<String> {
        let mut args = vec![
            "--backend=ninja".to_string(),
            format!("--buildtype={}", ctx.build_type().to_ascii_lowercase()),
        ];
        if let Some(ref prefix) = ctx.install_dir {
            args.push(format!("--prefix={}", prefix.display()));
        }
        args.extend(ctx.extra_args.iter().cloned());
        args
    }

    fn generate_command(&self, ctx: &BuildContext, args: &[String]) -> ProcessBuilder {
        let mut cmd = ProcessBuilder::new(&self.meson).arg("setup");
        if self.is_configured(&ctx.build_dir) {
            cmd = cmd.arg("--reconfigure");
        }
        let cmd = cmd.args(args).arg(&ctx.build_dir).arg(&ctx.source_dir);
        ctx.decorate(cmd)
    }

    fn build_command(&self, ctx: &BuildContext) -> ProcessBuilder {
        let mut cmd = ProcessBuilder::new(&self.ninja).arg("-C").arg(&ctx.build_dir);
        // Ninja runs at full parallelism unless told otherwise.
        if let Some(jobs) = ctx.jobs {
            cmd = cmd.args(["-j", &jobs.to_string()]);
        }
        ctx.decorate(cmd)
    }

    fn test_command(&self, ctx: &BuildContext) -> Result<ProcessBuilder> {
        let cmd = ProcessBuilder::new(&self.meson)
            .arg("test")
            .arg("-C")
            .arg(&ctx.build_dir)
            .args(["--num-processes", &ctx.parallelism().to_string()]);
        Ok(ctx.decorate(cmd))
    }

    fn install_command(&self, ctx: &BuildContext) -> ProcessBuilder {
        let cmd = ProcessBuilder::new(&self.meson)
            .arg("install")
            .arg("-C")
            .arg(&ctx.build_dir);
        ctx.decorate(cmd)
    }
}
