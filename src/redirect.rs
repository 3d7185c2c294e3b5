//! Output redirection: pulling `>`, `>>`, `2>` and friends out of a word list.

use regex::Regex;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::LazyLock;

/// `>`, `1>`, `2>`, `>>`, `1>>`, `2>>`.
static OPERATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([12]?)(>>?)$").expect("operator pattern is valid"));

/// How a redirection target is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    /// Create the file or cut it to zero length (`>`).
    Truncate,
    /// Create the file or write after its current end (`>>`).
    Append,
}

/// One redirected stream: where it goes and how the file is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    pub path: String,
    pub mode: RedirectMode,
}

impl RedirectTarget {
    pub fn new(path: impl Into<String>, mode: RedirectMode) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }

    /// Opens the target for writing. Relative paths are taken relative to `cwd`.
    pub fn open(&self, cwd: &Path) -> io::Result<File> {
        let mut options = OpenOptions::new();
        options.create(true);
        match self.mode {
            RedirectMode::Truncate => options.write(true).truncate(true),
            RedirectMode::Append => options.append(true),
        };
        options.open(cwd.join(&self.path))
    }
}

/// The active redirections of one command: at most one per stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redirections {
    pub stdout: Option<RedirectTarget>,
    pub stderr: Option<RedirectTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectError {
    /// An operator was the last word of the command.
    MissingTarget { operator: String },
}

impl fmt::Display for RedirectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedirectError::MissingTarget { .. } => {
                write!(f, "syntax error near unexpected token `newline'")
            }
        }
    }
}

impl std::error::Error for RedirectError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

fn parse_operator(word: &str) -> Option<(Stream, RedirectMode)> {
    let caps = OPERATOR.captures(word)?;
    let stream = match &caps[1] {
        "2" => Stream::Stderr,
        _ => Stream::Stdout,
    };
    let mode = match &caps[2] {
        ">>" => RedirectMode::Append,
        _ => RedirectMode::Truncate,
    };
    Some((stream, mode))
}

/// Separates redirection operators and their targets from the command's arguments.
///
/// Each operator consumes the word right after it as its path. A later operator for the
/// same stream replaces an earlier one. The remaining words keep their relative order.
pub fn split_redirections(
    tokens: Vec<String>,
) -> Result<(Vec<String>, Redirections), RedirectError> {
    let mut args = Vec::with_capacity(tokens.len());
    let mut redirections = Redirections::default();
    let mut iter = tokens.into_iter();

    while let Some(word) = iter.next() {
        let Some((stream, mode)) = parse_operator(&word) else {
            args.push(word);
            continue;
        };
        let path = iter
            .next()
            .ok_or(RedirectError::MissingTarget { operator: word })?;
        let target = Some(RedirectTarget::new(path, mode));
        match stream {
            Stream::Stdout => redirections.stdout = target,
            Stream::Stderr => redirections.stderr = target,
        }
    }

    Ok((args, redirections))
}
