//! Implementation of `mcbuild build`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::{Backend, BuildContext, BuildSystem, Driver, PipelineReport, DEFAULT_MSVC_GENERATOR};
use crate::errors::{BuildError, Result};
use crate::staleness::is_msvc_generator;
use crate::toolchain::{self, Role, ToolchainSpec};
use crate::util::config::{project_config_path, ProjectConfig};
use crate::util::env::{Environment, Tools};
use crate::util::fs::absolutize;

/// Vendor used when neither the command line nor the config names one.
pub const DEFAULT_VENDOR: &str = "gnu";

/// Name of the default build directory inside the source directory.
pub const DEFAULT_BUILD_DIR: &str = "build";

/// One build invocation, as requested by the caller.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    /// Source directory (default: current directory)
    pub source_dir: Option<PathBuf>,

    /// Build directory (default: `<source>/build`, which must exist)
    pub build_dir: Option<PathBuf>,

    /// Compiler vendor
    pub vendor: Option<String>,

    /// Build system to use instead of auto-detection
    pub build_system: Option<BuildSystem>,

    /// Per-role compiler overrides
    pub hints: BTreeMap<Role, String>,

    /// Arguments passed verbatim to the generate step
    pub extra_args: Vec<String>,

    /// Wipe generated metadata before generating
    pub wipe: bool,

    /// Run the test suite after building
    pub run_tests: bool,

    /// Install prefix
    pub install_dir: Option<PathBuf>,

    /// Debug build
    pub debug: bool,

    /// Parallel job count
    pub jobs: Option<usize>,

    /// Visual Studio generator for MSVC builds
    pub msvc_generator: Option<String>,

    /// Explicit project config file
    pub config_path: Option<PathBuf>,

    /// Per-process deadline
    pub timeout: Option<Duration>,
}

/// A validated request, ready to drive a backend.
#[derive(Debug)]
pub struct BuildPlan {
    pub build_system: BuildSystem,
    pub context: BuildContext,
    pub tools: Tools,
}

impl BuildPlan {
    /// Validate `request` against the environment.
    ///
    /// Starts no process: every failure here leaves the filesystem as it
    /// was.
    pub fn new(request: &BuildRequest, env: &Environment) -> Result<Self> {
        let source_dir = resolve_source_dir(request.source_dir.as_deref(), env)?;
        let config = load_config(request.config_path.as_deref(), &source_dir, env)?;
        let build_dir = resolve_build_dir(request.build_dir.as_deref(), &config, &source_dir, env)?;

        let requested_system = match request.build_system {
            Some(system) => Some(system),
            None => config
                .build
                .build_system
                .as_deref()
                .map(|s| s.parse::<BuildSystem>())
                .transpose()
                .map_err(|message| config_error(request, &source_dir, message))?,
        };
        let build_system = detect_build_system(&source_dir, requested_system)?;

        let toolchain = resolve_toolchain(request, &config, env)?;
        tracing::debug!(
            "{} project in {}, building in {}",
            build_system,
            source_dir.display(),
            build_dir.display()
        );

        let mut context = BuildContext::new(source_dir, build_dir, toolchain);
        context.extra_args = request.extra_args.clone();
        context.install_dir = request
            .install_dir
            .as_deref()
            .map(|dir| absolutize(dir, env.cwd()));
        context.wipe = request.wipe;
        context.run_tests = request.run_tests;
        context.debug = request.debug;
        context.jobs = request.jobs.or(config.build.jobs);
        context.library_defines = config.library_defines();
        context.msvc_generator = msvc_generator(request, &config, env);
        context.timeout = request.timeout;
        context.host = env.host();

        Ok(BuildPlan {
            build_system,
            context,
            tools: Tools::discover(env),
        })
    }
}

/// Run the full pipeline for `request`.
pub fn build(request: &BuildRequest, env: &Environment) -> Result<PipelineReport> {
    let plan = BuildPlan::new(request, env)?;
    let backend = Backend::new(plan.build_system, &plan.tools)?;

    let report = Driver::new(backend.as_backend(), &plan.context).run()?;
    tracing::info!(
        "finished {} build in {}",
        plan.context.build_type().to_ascii_lowercase(),
        plan.context.build_dir.display()
    );
    Ok(report)
}

fn resolve_source_dir(requested: Option<&Path>, env: &Environment) -> Result<PathBuf> {
    let Some(dir) = requested else {
        return Ok(env.cwd().to_path_buf());
    };
    let dir = absolutize(dir, env.cwd());
    if !dir.is_dir() {
        return Err(BuildError::NotADirectory { path: dir });
    }
    Ok(dir)
}

/// Explicit directories must exist. The default one must exist too, so a
/// build never lands in a directory the caller did not choose.
fn resolve_build_dir(
    requested: Option<&Path>,
    config: &ProjectConfig,
    source_dir: &Path,
    env: &Environment,
) -> Result<PathBuf> {
    let explicit = match (requested, config.build.build_dir.as_deref()) {
        (Some(dir), _) => Some(absolutize(dir, env.cwd())),
        (None, Some(dir)) => Some(absolutize(dir, source_dir)),
        (None, None) => None,
    };

    match explicit {
        Some(dir) if dir.is_dir() => Ok(dir),
        Some(dir) => Err(BuildError::NotADirectory { path: dir }),
        None => {
            let dir = source_dir.join(DEFAULT_BUILD_DIR);
            if dir.is_dir() {
                Ok(dir)
            } else {
                Err(BuildError::DefaultBuildDirMissing { path: dir })
            }
        }
    }
}

fn load_config(explicit: Option<&Path>, source_dir: &Path, env: &Environment) -> Result<ProjectConfig> {
    let path = match explicit {
        Some(path) => {
            let path = absolutize(path, env.cwd());
            if !path.is_file() {
                return Err(BuildError::Config {
                    path,
                    message: "file not found".to_string(),
                });
            }
            path
        }
        None => project_config_path(source_dir),
    };

    match ProjectConfig::load_if_exists(&path) {
        Ok(config) => Ok(config.unwrap_or_default()),
        Err(e) => Err(BuildError::Config {
            path,
            message: format!("{:#}", e),
        }),
    }
}

fn config_error(request: &BuildRequest, source_dir: &Path, message: String) -> BuildError {
    let path = request
        .config_path
        .clone()
        .unwrap_or_else(|| project_config_path(source_dir));
    BuildError::Config { path, message }
}

/// Pick the build system from the description files in `source_dir`.
///
/// Probes in [`BuildSystem::PROBE_ORDER`]; a requested system must have its
/// own description file.
pub fn detect_build_system(source_dir: &Path, requested: Option<BuildSystem>) -> Result<BuildSystem> {
    if let Some(system) = requested {
        if source_dir.join(system.description_file()).is_file() {
            return Ok(system);
        }
        return Err(BuildError::NoBuildDescription {
            source_dir: source_dir.to_path_buf(),
            detail: format!("{} was requested but {} is missing", system, system.description_file()),
        });
    }

    BuildSystem::PROBE_ORDER
        .into_iter()
        .find(|system| source_dir.join(system.description_file()).is_file())
        .ok_or_else(|| BuildError::NoBuildDescription {
            source_dir: source_dir.to_path_buf(),
            detail: "no CMakeLists.txt or meson.build".to_string(),
        })
}

fn resolve_toolchain(request: &BuildRequest, config: &ProjectConfig, env: &Environment) -> Result<ToolchainSpec> {
    let vendor = request
        .vendor
        .as_deref()
        .or(config.build.vendor.as_deref())
        .unwrap_or(DEFAULT_VENDOR);

    let mut hints = BTreeMap::new();
    let configured = [
        (Role::C, &config.compilers.cc),
        (Role::Cxx, &config.compilers.cxx),
        (Role::Fortran, &config.compilers.fc),
    ];
    for (role, name) in configured {
        if let Some(name) = name {
            hints.insert(role, name.clone());
        }
    }
    hints.extend(request.hints.iter().map(|(role, name)| (*role, name.clone())));

    toolchain::resolve(vendor, &hints, env)
}

fn msvc_generator(request: &BuildRequest, config: &ProjectConfig, env: &Environment) -> String {
    request
        .msvc_generator
        .clone()
        .or_else(|| config.build.msvc_generator.clone())
        .or_else(|| {
            env.var("CMAKE_GENERATOR")
                .filter(|generator| is_msvc_generator(generator))
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_MSVC_GENERATOR.to_string())
}
