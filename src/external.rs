use crate::command::{ExitCode, Stdin, Stdout};
use crate::env::Environment;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus};

/// Command that is not a builtin.
pub struct ExternalCommand {
    program: OsString,
    arg0: OsString,
    args: Vec<OsString>,
}

impl ExternalCommand {
    /// `program` is the resolved executable, `arg0` the name the user typed.
    pub fn new(program: OsString, arg0: OsString, args: Vec<OsString>) -> Self {
        Self {
            program,
            arg0,
            args,
        }
    }

    /// Starts the program without waiting for it.
    ///
    /// The streams are handed over to the child; once this returns, the caller holds no
    /// copy of them, so a pipe end given here is closed on the shell's side.
    pub fn spawn(
        self,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
        stderr: Box<dyn Stdout>,
        env: &Environment,
    ) -> std::io::Result<Child> {
        let mut cmd = std::process::Command::new(&self.program);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.arg0(&self.arg0);
        }
        cmd.args(&self.args)
            .stdin(stdin.stdio())
            .stdout(stdout.stdio())
            .stderr(stderr.stdio())
            .envs(env.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&env.current_dir);
        cmd.spawn()
    }
}

/// Maps a child's status to a shell exit code.
pub fn exit_code(exit_status: ExitStatus) -> ExitCode {
    match exit_status.code() {
        Some(x) => x,
        None => terminated_by_signal(exit_status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it is an executable file.
/// - Relative with multiple components (e.g., `bin/sh` or `./foo`): resolved against
///   `cwd`, returned if it is an executable file.
/// - Single path component (no separators): search each directory in `search_paths` (PATH)
///   and return the first executable match.
/// - Empty path: returns `None`.
///
/// Returns either a borrowed reference to the provided `path` or an owned `PathBuf`
/// when the result is discovered via PATH lookup or relative to `cwd`.
pub fn find_command_path<'a>(
    search_paths: &OsStr,
    path: &'a Path,
    cwd: &Path,
) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return is_executable(path).then_some(Cow::Borrowed(path));
    }

    let mut components = path.components();
    let first = components.next();
    let second = components.next();
    match (first, second) {
        // Empty path -> not found
        (None, _) => None,
        // Single component -> search in PATH
        (Some(x), None) => {
            find_in_path(search_paths, x.as_os_str()).map(Cow::Owned)
        }
        // Multiple components -> relative to the working directory
        _ => {
            let candidate = cwd.join(path);
            is_executable(&candidate).then_some(Cow::Owned(candidate))
        }
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(cmd))
        .find(|path| is_executable(path))
}

/// True for regular files that carry an execute permission bit.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Names of the executables in every `PATH` directory that start with `prefix`.
///
/// Unreadable or missing directories are skipped. The set is sorted and holds each
/// name once even when several directories provide it.
pub fn executables_with_prefix(search_paths: &OsStr, prefix: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for dir in std::env::split_paths(search_paths) {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(Result::ok) {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with(prefix) && is_executable(&entry.path()) {
                names.insert(name);
            }
        }
    }
    names
}
