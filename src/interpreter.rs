use crate::command::{CommandKind, ExitCode, NOT_FOUND};
use crate::completion::ShellHelper;
use crate::config::Config;
use crate::env::Environment;
use crate::io_adapters::{Input, Output, Terminal, io_error_message};
use crate::lexer;
use crate::pipeline::{self, Stage};
use crate::redirect::{self, RedirectTarget, Redirections};
use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Editor};

/// The one line that ends the session.
const EXIT_LINE: &str = "exit 0";

/// The shell session: reads lines, dispatches them and keeps the state they share.
///
/// Example
/// ```
/// use tinysh::Interpreter;
/// let mut sh = Interpreter::default();
/// let code = sh.run("echo", &["hello", "world"]).unwrap();
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    terminal: Terminal,
    prompt: String,
}

impl Interpreter {
    /// A session over the process environment that talks to the real terminal.
    pub fn new(config: &Config) -> Self {
        Self {
            env: Environment::new(),
            terminal: Terminal::Inherit,
            prompt: config.shell.prompt.clone(),
        }
    }

    /// A session with explicit state and output sink.
    pub fn with_terminal(env: Environment, terminal: Terminal) -> Self {
        Self {
            env,
            terminal,
            prompt: "$ ".to_string(),
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// True once the line `exit 0` was entered.
    pub fn should_exit(&self) -> bool {
        self.env.should_exit
    }

    /// Run a single command invocation by name with arguments, without redirections.
    ///
    /// Returns the command's exit code; an unknown name is reported and yields 127.
    pub fn run(&mut self, name: &str, args: &[&str]) -> Result<ExitCode> {
        let argv = std::iter::once(name)
            .chain(args.iter().copied())
            .map(String::from)
            .collect();
        self.dispatch(argv, Redirections::default())
    }

    /// Executes one input line.
    ///
    /// Every problem with the line itself is reported on the terminal; the error case is
    /// reserved for failures to write to the terminal.
    pub fn execute_line(&mut self, line: &str) -> Result<()> {
        let tokens = lexer::split_into_tokens(line);
        if tokens.is_empty() {
            return Ok(());
        }
        let index = self.env.history.push(line.trim());
        tracing::debug!(index, line = line.trim(), "accepted line");

        // Decided on the text itself, before any word splitting.
        if line.trim() == EXIT_LINE {
            self.env.should_exit = true;
            return Ok(());
        }

        if lexer::split_pipeline(line).len() > 1 {
            return match pipeline::parse_pipeline(line) {
                Ok(stages) => {
                    let codes = self.run_stages(stages)?;
                    tracing::debug!(?codes, "pipeline finished");
                    Ok(())
                }
                Err(err) => Ok(self.terminal.message(&err.to_string())?),
            };
        }

        match redirect::split_redirections(tokens) {
            Ok((argv, redirections)) => {
                self.dispatch(argv, redirections)?;
                Ok(())
            }
            Err(err) => Ok(self.terminal.message(&err.to_string())?),
        }
    }

    /// Runs one simple command: builtins in-process against the session, programs as a
    /// single-stage pipeline.
    fn dispatch(&mut self, argv: Vec<String>, redirections: Redirections) -> Result<ExitCode> {
        let Some(name) = argv.first() else {
            return Ok(0);
        };
        let Some(kind) = CommandKind::classify(name, &self.env) else {
            self.terminal.message(&format!("{name}: command not found"))?;
            return Ok(NOT_FOUND);
        };
        tracing::debug!(command = %name, ?kind, "classified");

        if !kind.is_builtin() {
            let codes = self.run_stages(vec![Stage::new(argv, redirections)])?;
            return Ok(codes.first().copied().unwrap_or(1));
        }

        let stdout = match self.open_output(redirections.stdout.as_ref(), self.terminal.stdout()?)? {
            Some(output) => output,
            None => return Ok(1),
        };
        let stderr = match self.open_output(redirections.stderr.as_ref(), self.terminal.stderr()?)? {
            Some(output) => output,
            None => return Ok(1),
        };

        let Some(command) = kind.instantiate(&argv) else {
            return Ok(1);
        };
        match command.execute(
            Input::Inherit.into_stdin(),
            stdout.into_stdout(),
            stderr.into_stdout(),
            &mut self.env,
        ) {
            Ok(code) => Ok(code),
            Err(err) => {
                self.terminal.message(&format!("Error executing command: {err}"))?;
                Ok(1)
            }
        }
    }

    /// Runs stages through the pipeline engine. A failure of the engine itself is
    /// reported like any other execution error and leaves the session running.
    fn run_stages(&self, stages: Vec<Stage>) -> Result<Vec<ExitCode>> {
        match pipeline::execute(stages, &self.env, &self.terminal) {
            Ok(codes) => Ok(codes),
            Err(err) => {
                tracing::warn!(error = %err, "pipeline failed");
                self.terminal.message(&format!("Error executing command: {err}"))?;
                Ok(Vec::new())
            }
        }
    }

    /// Opens a redirection target, or keeps `default` when there is none. `None` means
    /// the target could not be opened; that has already been reported.
    fn open_output(&self, target: Option<&RedirectTarget>, default: Output) -> Result<Option<Output>> {
        let Some(target) = target else {
            return Ok(Some(default));
        };
        match target.open(&self.env.current_dir) {
            Ok(file) => Ok(Some(Output::File(file))),
            Err(err) => {
                tracing::warn!(path = %target.path, error = %err, "redirection target could not be opened");
                self.terminal
                    .message(&format!("{}: {}", target.path, io_error_message(&err)))?;
                Ok(None)
            }
        }
    }

    fn search_paths(&self) -> String {
        self.env.get_var("PATH").unwrap_or_default()
    }

    /// Read-eval-print loop on the terminal, until `exit 0`, end of input or Ctrl-C.
    pub fn repl(&mut self) -> Result<()> {
        let config = rustyline::Config::builder()
            .completion_type(CompletionType::List)
            .build();
        let mut rl: Editor<ShellHelper, DefaultHistory> = Editor::with_config(config)?;
        rl.set_helper(Some(ShellHelper::new(self.search_paths())));
        tracing::info!("shell started");

        while !self.should_exit() {
            let search_paths = self.search_paths();
            if let Some(helper) = rl.helper_mut() {
                helper.begin_line(search_paths);
            }
            match rl.readline(&self.prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    self.execute_line(&line)?;
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                    self.terminal.message("")?;
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }

        tracing::info!("shell stopped");
        Ok(())
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::with_terminal(Environment::new(), Terminal::Inherit)
    }
}
