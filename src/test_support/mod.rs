//! Test utilities for mcbuild unit tests.
//!
//! Fake compilers and build tools are small shell scripts written into a
//! temporary directory. An [`Environment`] whose search path is only that
//! directory makes the resolver and the backends see exactly those tools.
//!
//! The fake `cmake`, `meson` and `ninja` append their arguments to
//! `<dir>/<tool>.log` and react to marker files in `<dir>`:
//!
//! - `fail-generate`: the generate step exits with 4
//! - `fail-build`: the build step exits with 3
//! - `hang-build`: the build step sleeps instead of finishing
//! - `fail-test`: `meson test` exits with 5
//! - `no-reply`: `cmake` configures without writing a file-API reply
//!
//! A successful build step leaves an `app` file in the build directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::toolchain::{Role, ToolchainSpec, Vendor};
use crate::util::env::{Environment, HostFamily};

/// Environment that only finds executables in `dir`.
pub fn fake_env(dir: &Path) -> Environment {
    Environment::new(dir, HostFamily::Posix).with_search_path(dir.as_os_str())
}

/// Toolchain from compiler names, assigned to C, C++ and Fortran in order.
pub fn toolchain(names: &[&str]) -> ToolchainSpec {
    let compilers: BTreeMap<Role, String> = Role::ALL
        .iter()
        .zip(names)
        .map(|(role, name)| (*role, name.to_string()))
        .collect();
    let vendor = match names.first().copied() {
        Some("cl") => Vendor::Msvc,
        Some(cc) if cc.starts_with("clang") => Vendor::Clang,
        _ => Vendor::Gnu,
    };
    ToolchainSpec::new(vendor, compilers)
}

/// Write an executable shell script.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Install compilers that do nothing.
#[cfg(unix)]
pub fn install_fake_compilers(dir: &Path, names: &[&str]) {
    for name in names {
        write_script(dir, name, "exit 0\n");
    }
}

/// Lines logged by a fake tool, one per invocation.
pub fn tool_log(dir: &Path, tool: &str) -> Vec<String> {
    std::fs::read_to_string(dir.join(format!("{}.log", tool)))
        .map(|text| text.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

const SCRIPT_PRELUDE: &str = r#"here="$(dirname "$0")"
echo "$@" >> "$here/$(basename "$0").log"
"#;

/// Fake CMake 3.28: writes a cache file and, when queried, a file-API reply.
///
/// The recorded generator is the last `-G` received, `Unix Makefiles` otherwise.
#[cfg(unix)]
pub fn fake_cmake(dir: &Path) -> PathBuf {
    let body = format!(
        r#"{prelude}
case "$1" in
--version)
    echo "cmake version 3.28.1"
    exit 0
    ;;
--build)
    [ -f "$2/CMakeCache.txt" ] || {{ echo "Error: could not load cache" >&2; exit 2; }}
    [ -f "$here/fail-build" ] && exit 3
    [ -f "$here/hang-build" ] && exec sleep 5
    : > "$2/app"
    exit 0
    ;;
esac
[ -f "$here/fail-generate" ] && exit 4
build="$(pwd)"
generator="Unix Makefiles"
while [ $# -gt 0 ]; do
    case "$1" in
    -B) build="$2" ;;
    -G) generator="$2" ;;
    -G*) generator="${{1#-G}}" ;;
    esac
    shift
done
mkdir -p "$build/CMakeFiles"
printf 'CMAKE_GENERATOR:INTERNAL=%s\nCMAKE_C_COMPILER:FILEPATH=%s\n' "$generator" "$CC" > "$build/CMakeCache.txt"
if [ -f "$build/.cmake/api/v1/query/cache-v2" ] && [ ! -f "$here/no-reply" ]; then
    reply="$build/.cmake/api/v1/reply"
    mkdir -p "$reply"
    printf '{{"reply": {{"cache-v2": {{"jsonFile": "cache-v2-1.json"}}}}}}' > "$reply/index-1.json"
    printf '{{"entries": [{{"name": "CMAKE_GENERATOR", "value": "%s"}}, {{"name": "CMAKE_C_COMPILER", "value": "%s"}}]}}' "$generator" "$CC" > "$reply/cache-v2-1.json"
fi
exit 0
"#,
        prelude = SCRIPT_PRELUDE
    );
    write_script(dir, "cmake", &body)
}

/// Fake `meson` supporting `setup`, `test` and `install`.
#[cfg(unix)]
pub fn fake_meson(dir: &Path) -> PathBuf {
    let body = format!(
        r#"{prelude}
cmd="$1"
shift
case "$cmd" in
setup)
    [ -f "$here/fail-generate" ] && exit 4
    build=""
    for arg in "$@"; do
        case "$arg" in
        -*) ;;
        *) if [ -z "$build" ]; then build="$arg"; fi ;;
        esac
    done
    mkdir -p "$build/meson-info" "$build/meson-private"
    : > "$build/build.ninja"
    printf '[{{"name": "app", "target_sources": [{{"language": "c", "compiler": ["%s"]}}]}}]' "$CC" > "$build/meson-info/intro-targets.json"
    printf '[{{"name": "backend", "value": "ninja"}}]' > "$build/meson-info/intro-buildoptions.json"
    ;;
test)
    [ -f "$here/fail-test" ] && exit 5
    ;;
esac
exit 0
"#,
        prelude = SCRIPT_PRELUDE
    );
    write_script(dir, "meson", &body)
}

/// Fake `ninja -C <dir>` that fails unless the directory was set up.
#[cfg(unix)]
pub fn fake_ninja(dir: &Path) -> PathBuf {
    let body = format!(
        r#"{prelude}
[ -f "$2/build.ninja" ] || {{ echo "ninja: error: loading 'build.ninja'" >&2; exit 1; }}
[ -f "$here/fail-build" ] && exit 3
: > "$2/app"
exit 0
"#,
        prelude = SCRIPT_PRELUDE
    );
    write_script(dir, "ninja", &body)
}

/// Write a CMake file-API reply with the given index name.
pub fn write_cmake_reply(build_dir: &Path, index_name: &str, generator: &str, cc: &str) {
    let reply = build_dir.join(".cmake/api/v1/reply");
    std::fs::create_dir_all(&reply).unwrap();

    let cache_name = format!("cache-v2-{}", index_name.trim_start_matches("index-"));
    let index = serde_json::json!({
        "cmake": { "version": { "string": "3.28.1" } },
        "reply": { "cache-v2": { "kind": "cache", "jsonFile": cache_name } }
    });
    let cache = serde_json::json!({
        "kind": "cache",
        "entries": [
            { "name": "CMAKE_GENERATOR", "value": generator, "type": "INTERNAL" },
            { "name": "CMAKE_C_COMPILER", "value": cc, "type": "FILEPATH" }
        ]
    });
    std::fs::write(reply.join(index_name), index.to_string()).unwrap();
    std::fs::write(reply.join(&cache_name), cache.to_string()).unwrap();
}

/// Write Meson introspection files as `meson setup` would.
pub fn write_meson_info(build_dir: &Path, targets_json: &str, backend: Option<&str>) {
    let info = build_dir.join("meson-info");
    std::fs::create_dir_all(&info).unwrap();
    std::fs::create_dir_all(build_dir.join("meson-private")).unwrap();
    std::fs::write(info.join("intro-targets.json"), targets_json).unwrap();

    if let Some(backend) = backend {
        let options = serde_json::json!([
            { "name": "buildtype", "value": "release" },
            { "name": "backend", "value": backend }
        ]);
        std::fs::write(info.join("intro-buildoptions.json"), options.to_string()).unwrap();
    }
}
