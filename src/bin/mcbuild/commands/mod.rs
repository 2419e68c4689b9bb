//! Command implementations

pub mod build;
pub mod completions;
pub mod status;

use mcbuild::ops::BuildRequest;
use mcbuild::toolchain::Role;

use crate::cli::SelectArgs;

/// Build request carrying the selection flags shared by every command.
pub fn request_from(args: SelectArgs) -> BuildRequest {
    let mut request = BuildRequest {
        source_dir: args.source_dir,
        build_dir: args.build_dir,
        vendor: args.vendor,
        build_system: args.build_system,
        wipe: args.wipe,
        debug: args.debug,
        msvc_generator: args.msvc_generator,
        config_path: args.config,
        ..Default::default()
    };

    let hints = [(Role::C, args.cc), (Role::Cxx, args.cxx), (Role::Fortran, args.fc)];
    for (role, exe) in hints {
        if let Some(exe) = exe {
            request.hints.insert(role, exe);
        }
    }
    request
}
