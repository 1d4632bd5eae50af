//! Referenced-path derivation for file-mutating commands
//!
//! For sub-commands whose program is a known file-mutating utility, every
//! non-flag argument is resolved to a canonical absolute path relative to
//! the execution cwd before sandbox comparison. Resolution consults the
//! real filesystem (`canonicalize`) so symlinks and relative components are
//! resolved; targets that do not exist yet fall back to lexical
//! normalization. This is a blocking filesystem call per path.

use std::path::{Component, Path, PathBuf};

use super::shell::CommandInvocation;

/// Programs whose arguments are treated as filesystem paths
const FILE_MUTATING_PROGRAMS: &[&str] =
    &["cd", "rm", "cp", "mv", "mkdir", "touch", "chmod", "chown"];

/// Programs whose first non-flag argument is a mode/owner, not a path
const FIRST_ARG_NOT_A_PATH: &[&str] = &["chmod", "chown"];

/// Derive the canonical paths a parsed command references
pub fn referenced_paths(invocations: &[CommandInvocation], cwd: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for invocation in invocations {
        let program = base_program(&invocation.program);
        if !FILE_MUTATING_PROGRAMS.contains(&program) {
            continue;
        }
        let mut skip_first_value = FIRST_ARG_NOT_A_PATH.contains(&program);
        for arg in &invocation.args {
            if arg.starts_with('-') {
                continue;
            }
            if skip_first_value {
                skip_first_value = false;
                continue;
            }
            let resolved = resolve_path(arg, cwd);
            if !paths.contains(&resolved) {
                paths.push(resolved);
            }
        }
    }
    paths
}

/// Strip any directory prefix from a program name (`/usr/bin/rm` -> `rm`)
pub fn base_program(program: &str) -> &str {
    Path::new(program)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(program)
}

/// Resolve one argument to an absolute, platform-normalized path
pub fn resolve_path(arg: &str, cwd: &Path) -> PathBuf {
    let arg = normalize_msys_drive(arg);
    let joined = if Path::new(&arg).is_absolute() {
        PathBuf::from(&arg)
    } else {
        cwd.join(&arg)
    };
    // Symlinks and `..` must be resolved against the real filesystem; for
    // paths that do not exist yet, normalize lexically instead.
    match joined.canonicalize() {
        Ok(canonical) => canonical,
        Err(_) => normalize_lexically(&joined),
    }
}

/// Rewrite MSYS/Git-Bash style `/c/Users/...` to `C:\Users\...`
///
/// Only applied on Windows, where POSIX-emulation shells emit such paths;
/// the transformation itself is platform-independent and unit tested
/// everywhere.
fn normalize_msys_drive(arg: &str) -> String {
    if cfg!(windows) {
        msys_to_windows(arg).unwrap_or_else(|| arg.to_string())
    } else {
        arg.to_string()
    }
}

/// The pure `/c/...` -> `C:\...` rewrite; `None` if the shape doesn't match
pub(crate) fn msys_to_windows(arg: &str) -> Option<String> {
    let rest = arg.strip_prefix('/')?;
    let mut chars = rest.chars();
    let drive = chars.next()?;
    if !drive.is_ascii_alphabetic() {
        return None;
    }
    match chars.next() {
        Some('/') => {
            let tail = &rest[2..];
            Some(format!(
                "{}:\\{}",
                drive.to_ascii_uppercase(),
                tail.replace('/', "\\")
            ))
        }
        None => Some(format!("{}:\\", drive.to_ascii_uppercase())),
        Some(_) => None,
    }
}

/// Remove `.` components and fold `..` against parents, without touching
/// the filesystem
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(Component::ParentDir);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}
