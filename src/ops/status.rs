//! Implementation of `mcbuild status`.

use std::fmt::Write as _;
use std::path::PathBuf;

use crate::backend::{Backend, BuildSystem, Driver};
use crate::errors::Result;
use crate::ops::build::{BuildPlan, BuildRequest};
use crate::staleness::StalenessVerdict;
use crate::store::PersistedConfig;
use crate::toolchain::ToolchainSpec;
use crate::util::env::Environment;

/// What a build invocation would find in its build directory.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub build_system: BuildSystem,
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub toolchain: ToolchainSpec,
    pub persisted: Option<PersistedConfig>,
    pub verdict: StalenessVerdict,
}

/// Inspect the build directory for `request` without running any tool.
pub fn status(request: &BuildRequest, env: &Environment) -> Result<StatusReport> {
    let plan = BuildPlan::new(request, env)?;
    let backend = Backend::for_inspection(plan.build_system, &plan.tools);
    let (persisted, verdict) = Driver::new(backend.as_backend(), &plan.context).assess();

    Ok(StatusReport {
        build_system: plan.build_system,
        source_dir: plan.context.source_dir.clone(),
        build_dir: plan.context.build_dir.clone(),
        toolchain: plan.context.toolchain.clone(),
        persisted,
        verdict,
    })
}

/// Format a status report for display.
pub fn format_report(report: &StatusReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "build system: {}", report.build_system);
    let _ = writeln!(out, "source:       {}", report.source_dir.display());
    let _ = writeln!(out, "build:        {}", report.build_dir.display());
    let _ = writeln!(out, "vendor:       {}", report.toolchain.vendor());
    for (role, exe) in report.toolchain.compilers() {
        let _ = writeln!(out, "  {:<8}    {}", role.env_var(), exe);
    }

    match report.persisted {
        Some(ref persisted) => {
            let _ = writeln!(out, "configured with:");
            if let Some(ref generator) = persisted.generator {
                let _ = writeln!(out, "  generator   {}", generator);
            }
            for (role, exe) in &persisted.compilers {
                let _ = writeln!(out, "  {:<8}    {}", role.env_var(), exe);
            }
        }
        None => {
            let _ = writeln!(out, "not configured");
        }
    }

    match report.verdict.reason_text() {
        Some(reason) => {
            let _ = writeln!(out, "next build:   regenerate from scratch ({})", reason);
        }
        None => {
            let _ = writeln!(out, "next build:   reuse");
        }
    }
    out
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_support::{fake_env, install_fake_compilers, tool_log, write_meson_info};
    use tempfile::TempDir;

    fn meson_project(cc: &str) -> (TempDir, BuildRequest) {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(src.join("build")).unwrap();
        std::fs::write(src.join("meson.build"), "project('demo', 'c')\n").unwrap();
        install_fake_compilers(tmp.path(), &[cc]);

        let request = BuildRequest {
            source_dir: Some(src),
            ..Default::default()
        };
        (tmp, request)
    }

    #[test]
    fn test_fresh_directory() {
        let (tmp, request) = meson_project("gcc");
        let report = status(&request, &fake_env(tmp.path())).unwrap();

        assert_eq!(report.build_system, BuildSystem::Meson);
        assert!(report.persisted.is_none());
        assert!(format_report(&report).contains("not configured"));
        assert!(format_report(&report).contains("next build:   reuse"));
    }

    #[test]
    fn test_reports_compiler_change() {
        let (tmp, mut request) = meson_project("clang");
        request.vendor = Some("clang".into());
        let build = tmp.path().join("src/build");
        write_meson_info(
            &build,
            r#"[{"name": "demo", "target_sources": [{"language": "c", "compiler": ["/usr/bin/gcc"]}]}]"#,
            Some("ninja"),
        );

        let report = status(&request, &fake_env(tmp.path())).unwrap();
        assert!(report.verdict.must_wipe);

        let text = format_report(&report);
        assert!(text.contains("generator   Ninja"));
        assert!(text.contains("C compiler changed: gcc => clang"));
        assert!(tool_log(tmp.path(), "meson").is_empty());
    }
}
