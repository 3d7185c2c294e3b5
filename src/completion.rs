//! Tab completion of command names.

use crate::command::BUILTIN_NAMES;
use crate::external;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use std::cell::RefCell;
use std::ffi::OsString;
use std::io::{self, Write};

/// What the line editor should do in answer to a completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionAction {
    /// Leave the line alone.
    None,
    /// Replace the typed prefix with this text.
    Replace(String),
    /// Ring the bell without touching the line.
    Bell,
    /// Show these names under the prompt.
    List(Vec<String>),
}

/// Completion state for the line being edited.
///
/// Repeated requests for the same prefix walk through the phases: the first one that
/// cannot make progress rings the bell, every further one lists the candidates.
#[derive(Debug, Default)]
pub struct CompletionEngine {
    search_paths: OsString,
    last_prefix: Option<String>,
    candidates: Vec<String>,
    phase: u32,
}

impl CompletionEngine {
    pub fn new(search_paths: impl Into<OsString>) -> Self {
        Self {
            search_paths: search_paths.into(),
            ..Self::default()
        }
    }

    /// Forgets everything about the previous line and takes the current `PATH`.
    pub fn reset(&mut self, search_paths: impl Into<OsString>) {
        *self = Self::new(search_paths);
    }

    /// Builtins and `PATH` executables whose name starts with `prefix`, sorted and unique.
    pub fn candidates_for(&self, prefix: &str) -> Vec<String> {
        let mut names = external::executables_with_prefix(&self.search_paths, prefix);
        names.extend(
            BUILTIN_NAMES
                .iter()
                .filter(|name| name.starts_with(prefix))
                .map(|name| name.to_string()),
        );
        names.into_iter().collect()
    }

    pub fn request(&mut self, prefix: &str) -> CompletionAction {
        if self.last_prefix.as_deref() != Some(prefix) {
            self.last_prefix = Some(prefix.to_string());
            self.candidates = self.candidates_for(prefix);
            self.phase = 0;
        }

        match self.candidates.as_slice() {
            [] => CompletionAction::None,
            [only] => {
                let replacement = format!("{only} ");
                self.phase = 0;
                CompletionAction::Replace(replacement)
            }
            many => {
                let common = longest_common_prefix(many);
                if common.len() > prefix.len() {
                    let common = common.to_string();
                    // The extended text is what the user will be looking at next time.
                    self.last_prefix = Some(common.clone());
                    self.candidates = self.candidates_for(&common);
                    self.phase = 0;
                    CompletionAction::Replace(common)
                } else {
                    self.phase += 1;
                    if self.phase == 1 {
                        CompletionAction::Bell
                    } else {
                        CompletionAction::List(self.candidates.clone())
                    }
                }
            }
        }
    }
}

/// The longest string every name starts with.
pub fn longest_common_prefix(names: &[String]) -> &str {
    let Some((first, rest)) = names.split_first() else {
        return "";
    };
    let mut end = first.len();
    for name in rest {
        end = first
            .char_indices()
            .zip(name.chars())
            .take_while(|((_, a), b)| a == b)
            .map(|((i, a), _)| i + a.len_utf8())
            .last()
            .unwrap_or(0)
            .min(end);
    }
    &first[..end]
}

/// Writes a candidate listing on a line of its own.
pub fn render_listing(out: &mut dyn Write, names: &[String]) -> io::Result<()> {
    write!(out, "\r\n{}\r\n", names.join("  "))?;
    out.flush()
}

/// Line editor glue: answers rustyline's completion calls from a [`CompletionEngine`].
pub struct ShellHelper {
    engine: RefCell<CompletionEngine>,
}

impl ShellHelper {
    pub fn new(search_paths: impl Into<OsString>) -> Self {
        Self {
            engine: RefCell::new(CompletionEngine::new(search_paths)),
        }
    }

    /// Called before reading each line.
    pub fn begin_line(&mut self, search_paths: impl Into<OsString>) {
        self.engine.get_mut().reset(search_paths);
    }

    fn action(&self, line: &str, pos: usize) -> (usize, CompletionAction) {
        let start = line.len() - line.trim_start().len();
        if pos < start {
            return (pos, CompletionAction::None);
        }
        let word = &line[start..pos];
        if word.contains(char::is_whitespace) {
            return (pos, CompletionAction::None);
        }
        (start, self.engine.borrow_mut().request(word))
    }
}

impl ShellHelper {
    /// Turns the engine's answer into rustyline candidates; listings go to `out`.
    fn candidates(&self, line: &str, pos: usize, out: &mut dyn Write) -> io::Result<(usize, Vec<Pair>)> {
        let (start, action) = self.action(line, pos);
        tracing::debug!(?action, "completion");
        let pair = |text: String| Pair {
            display: text.clone(),
            replacement: text,
        };
        match action {
            CompletionAction::Replace(text) => Ok((start, vec![pair(text)])),
            // No candidates makes the editor beep.
            CompletionAction::Bell => Ok((start, Vec::new())),
            CompletionAction::List(names) => {
                render_listing(out, &names)?;
                // Put back what was typed; the editor redraws the prompt below the list.
                Ok((start, vec![pair(line[start..pos].to_string())]))
            }
            CompletionAction::None => Ok((pos, vec![pair(String::new())])),
        }
    }
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(self.candidates(line, pos, &mut io::stdout())?)
    }
}

impl Hinter for ShellHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<String> {
        None
    }
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}
