//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use mcbuild::backend::BuildSystem;

/// mcbuild - build CMake and Meson projects with any compiler vendor
#[derive(Parser)]
#[command(name = "mcbuild")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate, build, and optionally test and install a project
    Build(BuildArgs),

    /// Show how the build directory is configured and whether it is stale
    Status(SelectArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Options that select the project, build directory and toolchain.
#[derive(Args)]
pub struct SelectArgs {
    /// Compiler vendor: gnu, clang, clang-cl, intel, msvc, pgi
    pub vendor: Option<String>,

    /// Source directory (defaults to the current directory)
    #[arg(short = 's', long = "source", value_name = "DIR")]
    pub source_dir: Option<PathBuf>,

    /// Build directory (defaults to <source>/build, which must exist)
    #[arg(short = 'b', long = "build-dir", value_name = "DIR")]
    pub build_dir: Option<PathBuf>,

    /// Build system to use instead of auto-detection
    #[arg(long, value_name = "cmake|meson")]
    pub build_system: Option<BuildSystem>,

    /// C compiler, overriding the vendor default
    #[arg(long, value_name = "EXE")]
    pub cc: Option<String>,

    /// C++ compiler, overriding the vendor default
    #[arg(long, value_name = "EXE")]
    pub cxx: Option<String>,

    /// Fortran compiler, overriding the vendor default
    #[arg(long, value_name = "EXE")]
    pub fc: Option<String>,

    /// Visual Studio generator used with MSVC
    #[arg(long, value_name = "GENERATOR")]
    pub msvc_generator: Option<String>,

    /// Project config file (defaults to <source>/mcbuild.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Wipe generated metadata and regenerate
    #[arg(long)]
    pub wipe: bool,

    /// Debug build (default: release)
    #[arg(long)]
    pub debug: bool,
}

#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Run the test suite after building
    #[arg(long)]
    pub test: bool,

    /// Install into DIR after building
    #[arg(long, value_name = "DIR")]
    pub install: Option<PathBuf>,

    /// Number of parallel jobs
    #[arg(short, long, env = "MCBUILD_JOBS")]
    pub jobs: Option<usize>,

    /// Abort any step that runs longer than SECS seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Extra arguments passed verbatim to the generate step
    #[arg(last = true, allow_hyphen_values = true)]
    pub extra_args: Vec<String>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
