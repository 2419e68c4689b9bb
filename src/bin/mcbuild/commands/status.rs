//! `mcbuild status` command

use crate::cli::SelectArgs;
use mcbuild::errors::Result;
use mcbuild::ops::{format_report, status};
use mcbuild::util::Environment;

use super::request_from;

pub fn execute(args: SelectArgs) -> Result<()> {
    let env = Environment::capture()?;
    let request = request_from(args);

    let report = status(&request, &env)?;
    print!("{}", format_report(&report));

    Ok(())
}
