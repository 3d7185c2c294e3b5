use crate::command::{CommandKind, ExecutableCommand, ExitCode, Stdin, Stdout};
use crate::env::Environment;
use crate::io_adapters::io_error_message;
use anyhow::{Result, anyhow, bail};
use argh::{EarlyExit, FromArgs};
use std::fs;
use std::io::{Read, Write};

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command using provided IO streams and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        mut stdin: Box<dyn Stdin>,
        mut stdout: Box<dyn Stdout>,
        _stderr: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let code = match T::execute(*self, &mut stdin, &mut stdout, env) {
            Ok(x) => x,
            Err(e) => {
                writeln!(stdout, "{e}")?;
                1
            }
        };
        stdout.flush()?;
        Ok(code)
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        _stdin: Box<dyn Stdin>,
        mut stdout: Box<dyn Stdout>,
        _stderr: Box<dyn Stdout>,
        _env: &mut Environment,
    ) -> anyhow::Result<i32> {
        stdout.write_all(self.output.as_bytes())?;
        if !self.output.ends_with('\n') {
            stdout.write_all(b"\n")?;
        }
        stdout.flush()?;
        Ok(if self.is_error { 1 } else { 0 })
    }
}

/// Parses `args` for the builtin `T`; parse failures and `--help` turn into a command
/// that prints argh's message.
pub(crate) fn create<T: BuiltinCommand + 'static>(
    name: &str,
    args: &[&str],
) -> Box<dyn ExecutableCommand> {
    tracing::trace!(builtin = T::name(), ?args, "parsing builtin arguments");
    match T::from_args(&[name], args) {
        Ok(cmd) => Box::new(cmd),
        Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
            output,
            is_error: status.is_err(),
        }),
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// A leading `~` stands for the directory in the HOME environment variable.
pub struct Cd {
    #[argh(positional, greedy)]
    /// directory to switch to; absolute or relative to the current directory.
    pub args: Vec<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let [target] = self.args.as_slice() else {
            bail!("cd: missing argument");
        };
        let target = expand_tilde(target, env)?;
        let new_dir = env.current_dir.join(&target);

        match fs::canonicalize(&new_dir) {
            Ok(canonical) if canonical.is_dir() => {
                env.set_var("PWD", canonical.to_string_lossy());
                env.current_dir = canonical;
                Ok(0)
            }
            Ok(_) => bail!("cd: {target}: Not a directory"),
            Err(err) => bail!("cd: {target}: {}", io_error_message(&err)),
        }
    }
}

/// Expands `~` and `~/...` against `HOME`; other paths are returned unchanged.
fn expand_tilde(path: &str, env: &Environment) -> Result<String> {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return Ok(path.to_string()),
    };
    match env.get_var("HOME") {
        Some(home) if !home.is_empty() => Ok(format!("{home}{rest}")),
        _ => Err(anyhow!("cd: HOME environment variable not set")),
    }
}

/// Explains how to leave the shell.
///
/// The session ends only on the line `exit 0`, which the interpreter recognizes before
/// anything is dispatched; every form that reaches this builtin gets the hint.
pub struct Exit;

impl FromArgs for Exit {
    fn from_args(_command_name: &[&str], _args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Exit)
    }
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "Use 'exit 0' to quit.")?;
        Ok(2)
    }
}

/// Write the arguments to standard output, separated by spaces, followed by a newline.
///
/// Every argument is printed as given, including ones that look like options.
pub struct Echo {
    pub args: Vec<String>,
}

impl FromArgs for Echo {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Echo {
            args: args.iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", self.args.join(" "))?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Describe how each name would be interpreted as a command.
pub struct Type {
    #[argh(positional, greedy)]
    /// command names to look up.
    pub names: Vec<String>,
}

impl BuiltinCommand for Type {
    fn name() -> &'static str {
        "type"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.names.is_empty() {
            bail!("type: missing argument");
        }
        let mut code = 0;
        for name in &self.names {
            match CommandKind::classify(name, env) {
                Some(CommandKind::External(path)) => {
                    writeln!(stdout, "{name} is {}", path.display())?
                }
                Some(_) => writeln!(stdout, "{name} is a shell builtin")?,
                None => {
                    writeln!(stdout, "{name}: not found")?;
                    code = 1;
                }
            }
        }
        Ok(code)
    }
}

#[derive(FromArgs)]
/// Show the lines entered in this session, optionally only the last N.
pub struct HistoryCmd {
    #[argh(positional, greedy)]
    /// how many of the most recent entries to show.
    pub args: Vec<String>,
}

impl BuiltinCommand for HistoryCmd {
    fn name() -> &'static str {
        "history"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let count = match self.args.as_slice() {
            [] => usize::MAX,
            [n] => n
                .parse::<usize>()
                .map_err(|_| anyhow!("history: {n}: numeric argument required"))?,
            _ => bail!("history: too many arguments"),
        };
        for (index, line) in env.history.last(count) {
            writeln!(stdout, "{index:>5}  {line}")?;
        }
        Ok(0)
    }
}
