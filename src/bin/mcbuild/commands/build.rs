//! `mcbuild build` command

use std::time::Duration;

use crate::cli::BuildArgs;
use mcbuild::errors::Result;
use mcbuild::ops::build::build;
use mcbuild::util::Environment;

use super::request_from;

pub fn execute(args: BuildArgs) -> Result<()> {
    let env = Environment::capture()?;

    let mut request = request_from(args.select);
    request.run_tests = args.test;
    request.install_dir = args.install;
    request.jobs = args.jobs;
    request.timeout = args.timeout.map(Duration::from_secs);
    request.extra_args = args.extra_args;

    let report = build(&request, &env)?;

    if let Some(warning) = report.generate.persist_warning {
        eprintln!("warning: {}", warning);
    }

    Ok(())
}
