use crate::env::Environment;
use crate::external;
use anyhow::Result;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::Stdio;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Exit code reported for a command that could not be resolved.
pub const NOT_FOUND: ExitCode = 127;

/// Abstraction over a readable input stream that can also be converted into
/// a [`Stdio`] handle for spawning external processes.
///
/// Implementors typically wrap standard input or a pipe. A blanket implementation
/// exists for any type that implements `Read` and `Into<Stdio>` (e.g. `File` or `PipeReader`).
pub trait Stdin: Read {
    /// Convert this input into a [`Stdio`] handle suitable for `std::process::Command`.
    fn stdio(self: Box<Self>) -> Stdio;
}

impl<T: Read + Into<Stdio>> Stdin for T {
    fn stdio(self: Box<Self>) -> Stdio {
        (*self).into()
    }
}

/// Abstraction over a writable output stream that can also be converted into
/// a [`Stdio`] handle for spawning external processes.
///
/// A blanket implementation exists for any type that implements `Write` and `Into<Stdio>`.
pub trait Stdout: Write {
    /// Convert this output into a [`Stdio`] handle suitable for `std::process::Command`.
    fn stdio(self: Box<Self>) -> Stdio;
}

impl<T: Write + Into<Stdio>> Stdout for T {
    fn stdio(self: Box<Self>) -> Stdio {
        (*self).into()
    }
}

/// Object-safe trait for any command that can be executed by the shell.
///
/// Implemented by built-ins via a blanket impl.
pub trait ExecutableCommand {
    /// Executes the command with the given standard streams.
    fn execute(
        self: Box<Self>,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
        stderr: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

/// Names of the commands implemented inside the shell, sorted.
pub const BUILTIN_NAMES: [&str; 6] = ["cd", "echo", "exit", "history", "pwd", "type"];

/// What a command name refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Exit,
    Echo,
    Type,
    Pwd,
    Cd,
    History,
    /// A program found on disk, with its resolved path.
    External(PathBuf),
}

impl CommandKind {
    /// Looks `name` up among the builtins.
    pub fn builtin(name: &str) -> Option<CommandKind> {
        Some(match name {
            "exit" => CommandKind::Exit,
            "echo" => CommandKind::Echo,
            "type" => CommandKind::Type,
            "pwd" => CommandKind::Pwd,
            "cd" => CommandKind::Cd,
            "history" => CommandKind::History,
            _ => return None,
        })
    }

    /// Classifies `name`: builtins first, then an executable resolved through `PATH`.
    ///
    /// Returns `None` when the name is neither.
    pub fn classify(name: &str, env: &Environment) -> Option<CommandKind> {
        if let Some(kind) = Self::builtin(name) {
            return Some(kind);
        }
        let search_paths = env.get_var("PATH").unwrap_or_default();
        external::find_command_path(search_paths.as_ref(), name.as_ref(), &env.current_dir)
            .map(|path| CommandKind::External(path.into_owned()))
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, CommandKind::External(_))
    }

    /// Builds the in-process command for `argv` (`argv[0]` is the name as typed).
    ///
    /// Returns `None` for [`CommandKind::External`]: programs are started by the pipeline
    /// engine, never run in-process.
    pub fn instantiate(self, argv: &[String]) -> Option<Box<dyn ExecutableCommand>> {
        use crate::builtin::{self, Cd, Echo, Exit, HistoryCmd, Pwd, Type};

        let (name, args) = match argv.split_first() {
            Some((name, args)) => (name.as_str(), args),
            None => ("", argv),
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        Some(match self {
            CommandKind::Exit => builtin::create::<Exit>(name, &args),
            CommandKind::Echo => builtin::create::<Echo>(name, &args),
            CommandKind::Type => builtin::create::<Type>(name, &args),
            CommandKind::Pwd => builtin::create::<Pwd>(name, &args),
            CommandKind::Cd => builtin::create::<Cd>(name, &args),
            CommandKind::History => builtin::create::<HistoryCmd>(name, &args),
            CommandKind::External(_) => return None,
        })
    }
}
