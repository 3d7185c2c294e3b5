//! Stream bindings for commands: where a stage reads from and writes to.

use crate::command::{Stdin, Stdout};
use std::fs::File;
use std::io::{self, ErrorKind, PipeReader, PipeWriter, Read, Write};
use std::process::Stdio;

/// Input of a command: the shell's own standard input or the read end of a pipe.
pub enum Input {
    Inherit,
    Pipe(PipeReader),
}

impl Input {
    pub fn into_stdin(self) -> Box<dyn Stdin> {
        match self {
            Input::Inherit => Box::new(InheritedStdin(io::stdin().lock())),
            Input::Pipe(reader) => Box::new(reader),
        }
    }
}

/// Output of a command.
pub enum Output {
    /// The shell's standard output.
    Stdout,
    /// The shell's standard error.
    Stderr,
    /// The write end of a pipe to the next stage.
    Pipe(PipeWriter),
    /// A redirection target or a capture file.
    File(File),
}

impl Output {
    pub fn into_stdout(self) -> Box<dyn Stdout> {
        match self {
            Output::Stdout => Box::new(io::stdout()),
            Output::Stderr => Box::new(io::stderr()),
            Output::Pipe(writer) => Box::new(writer),
            Output::File(file) => Box::new(file),
        }
    }
}

/// Where the shell itself writes: the messages it prints and the output of commands
/// that are not redirected.
///
/// `Capture` sends both streams to one file instead of the process's standard streams;
/// every handle is a clone of the same open file, so writes land in order.
#[derive(Debug)]
pub enum Terminal {
    Inherit,
    Capture(File),
}

impl Terminal {
    pub fn stdout(&self) -> io::Result<Output> {
        match self {
            Terminal::Inherit => Ok(Output::Stdout),
            Terminal::Capture(file) => Ok(Output::File(file.try_clone()?)),
        }
    }

    pub fn stderr(&self) -> io::Result<Output> {
        match self {
            Terminal::Inherit => Ok(Output::Stderr),
            Terminal::Capture(file) => Ok(Output::File(file.try_clone()?)),
        }
    }

    /// Writes one line of shell output (an error message or a notice).
    pub fn message(&self, text: &str) -> io::Result<()> {
        let mut out = self.stdout()?.into_stdout();
        writeln!(out, "{text}")?;
        out.flush()
    }
}

struct InheritedStdin(io::StdinLock<'static>);

impl Read for InheritedStdin {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Stdin for InheritedStdin {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::inherit()
    }
}

/// Shell-style text for an I/O error, without Rust's `(os error N)` suffix.
pub fn io_error_message(err: &io::Error) -> String {
    match err.kind() {
        ErrorKind::NotFound => "No such file or directory".to_string(),
        ErrorKind::PermissionDenied => "Permission denied".to_string(),
        ErrorKind::NotADirectory => "Not a directory".to_string(),
        ErrorKind::IsADirectory => "Is a directory".to_string(),
        _ => err.to_string(),
    }
}
