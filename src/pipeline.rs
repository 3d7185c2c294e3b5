//! The pipeline and process engine.
//!
//! Every stage of a pipeline runs concurrently: external programs as child processes,
//! builtins on their own thread against a copy of the session. Adjacent stages are
//! connected by anonymous pipes. The shell keeps no pipe end longer than it needs to,
//! so a reader sees end-of-stream as soon as its writer is gone.

use crate::command::{CommandKind, ExitCode, NOT_FOUND};
use crate::env::Environment;
use crate::external::{self, ExternalCommand};
use crate::io_adapters::{Input, Output, Terminal, io_error_message};
use crate::lexer;
use crate::redirect::{self, RedirectError, Redirections};
use anyhow::Result;
use std::fmt;
use std::io::{self, PipeReader, PipeWriter};
use std::process::Child;
use std::thread::{self, JoinHandle};

/// One command of a pipeline with its own redirections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub argv: Vec<String>,
    pub redirections: Redirections,
}

impl Stage {
    pub fn new(argv: Vec<String>, redirections: Redirections) -> Self {
        Self { argv, redirections }
    }

    /// Lexes and redirection-splits one stage's text.
    fn parse(text: &str) -> Result<Stage, PipelineError> {
        let tokens = lexer::split_into_tokens(text);
        if tokens.is_empty() {
            return Err(PipelineError::EmptyStage);
        }
        let (argv, redirections) = redirect::split_redirections(tokens)?;
        if argv.is_empty() {
            return Err(PipelineError::EmptyStage);
        }
        Ok(Stage::new(argv, redirections))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// A stage with no command words, as in `echo hi |` or `| wc`.
    EmptyStage,
    /// The line has fewer than two stages.
    TooFewStages,
    Redirect(RedirectError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::EmptyStage => write!(f, "syntax error near unexpected token `|'"),
            PipelineError::TooFewStages => write!(f, "syntax error: a pipeline needs two commands"),
            PipelineError::Redirect(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<RedirectError> for PipelineError {
    fn from(err: RedirectError) -> Self {
        PipelineError::Redirect(err)
    }
}

/// Splits a line at its unquoted `|` separators and parses every stage.
///
/// Any stage that fails to parse invalidates the whole line.
pub fn parse_pipeline(line: &str) -> Result<Vec<Stage>, PipelineError> {
    let texts = lexer::split_pipeline(line);
    if texts.len() < 2 {
        return Err(PipelineError::TooFewStages);
    }
    texts.into_iter().map(Stage::parse).collect()
}

/// A running (or already finished) stage.
#[derive(Debug)]
pub enum StageHandle {
    Process(Child),
    Thread(JoinHandle<ExitCode>),
    /// The stage never started; holds the status it is reported with.
    Finished(ExitCode),
}

/// Allocates a pipe. Both ends are close-on-exec, so a child only ever sees the end
/// that was installed as one of its standard streams.
pub fn make_pipe() -> io::Result<(PipeReader, PipeWriter)> {
    io::pipe()
}

/// Starts one stage with the given standard input and the output it would use when
/// not redirected.
///
/// Redirections of the stage win over `stdout`; a pipe end passed in but replaced by a
/// redirection is dropped here, which closes it. Setup failures (unknown command,
/// unopenable target) are reported on the terminal and yield [`StageHandle::Finished`].
pub fn spawn(
    stage: Stage,
    stdin: Input,
    stdout: Output,
    env: &Environment,
    terminal: &Terminal,
) -> Result<StageHandle> {
    let Some(name) = stage.argv.first().cloned() else {
        return Ok(StageHandle::Finished(0));
    };
    let Some(kind) = CommandKind::classify(&name, env) else {
        terminal.message(&format!("{name}: command not found"))?;
        return Ok(StageHandle::Finished(NOT_FOUND));
    };

    let (stdout, stderr) = match open_outputs(&stage.redirections, stdout, env, terminal)? {
        Ok(outputs) => outputs,
        Err(message) => {
            tracing::warn!(%message, "redirection target could not be opened");
            terminal.message(&message)?;
            return Ok(StageHandle::Finished(1));
        }
    };

    match kind {
        CommandKind::External(path) => {
            let args = stage.argv[1..].iter().map(Into::into).collect();
            let command = ExternalCommand::new(path.into_os_string(), name.clone().into(), args);
            match command.spawn(stdin.into_stdin(), stdout.into_stdout(), stderr.into_stdout(), env) {
                Ok(child) => {
                    tracing::debug!(program = %name, pid = child.id(), "spawned stage");
                    Ok(StageHandle::Process(child))
                }
                Err(err) => {
                    tracing::warn!(program = %name, error = %err, "spawn failed");
                    terminal.message(&format!("Error executing command: {err}"))?;
                    Ok(StageHandle::Finished(1))
                }
            }
        }
        builtin => {
            let mut local_env = env.clone();
            let argv = stage.argv;
            let spawned = thread::Builder::new()
                .name(format!("builtin-{name}"))
                .spawn(move || {
                    let Some(command) = builtin.instantiate(&argv) else {
                        return 1;
                    };
                    if let Err(err) = command.execute(
                        stdin.into_stdin(),
                        stdout.into_stdout(),
                        stderr.into_stdout(),
                        &mut local_env,
                    ) {
                        tracing::warn!(builtin = %argv[0], error = %err, "builtin stage failed");
                    }
                    // A builtin stage always reports success.
                    0
                });
            match spawned {
                Ok(handle) => Ok(StageHandle::Thread(handle)),
                Err(err) => {
                    tracing::warn!(builtin = %name, error = %err, "thread spawn failed");
                    terminal.message(&format!("Error executing command: {err}"))?;
                    Ok(StageHandle::Finished(1))
                }
            }
        }
    }
}

/// Blocks until the stage has terminated and returns its exit code.
///
/// A stage that cannot be waited for counts as failed.
pub fn wait(handle: StageHandle) -> ExitCode {
    match handle {
        StageHandle::Process(mut child) => match child.wait() {
            Ok(status) => {
                tracing::debug!(pid = child.id(), %status, "reaped stage");
                external::exit_code(status)
            }
            Err(err) => {
                tracing::warn!(pid = child.id(), error = %err, "wait failed");
                1
            }
        },
        StageHandle::Thread(handle) => handle.join().unwrap_or(1),
        StageHandle::Finished(code) => code,
    }
}

/// Runs `stages` connected left to right and waits for all of them.
///
/// Returns one exit code per stage, in stage order. A failing stage does not stop the
/// others. The first stage reads the shell's standard input and the last one writes to
/// the terminal, unless redirected. Every stage that was started is waited for, even
/// when the terminal can no longer be written to; that failure is the only error.
pub fn execute(
    stages: Vec<Stage>,
    env: &Environment,
    terminal: &Terminal,
) -> Result<Vec<ExitCode>> {
    let mut handles = Vec::with_capacity(stages.len());
    let started = start_all(stages, env, terminal, &mut handles);
    let codes = handles.into_iter().map(wait).collect();
    started?;
    Ok(codes)
}

/// Starts every stage, pushing one handle per stage.
///
/// When a pipe cannot be allocated, the stages from that point on cannot be connected:
/// they are reported and count as failed, without being started.
fn start_all(
    stages: Vec<Stage>,
    env: &Environment,
    terminal: &Terminal,
    handles: &mut Vec<StageHandle>,
) -> Result<()> {
    let count = stages.len();
    // The only pipe end the shell holds between spawns: input for the next stage.
    let mut upstream: Option<PipeReader> = None;
    let mut stages = stages.into_iter().enumerate();

    while let Some((index, stage)) = stages.next() {
        tracing::debug!(index, argv = ?stage.argv, "starting stage");
        let stdin = upstream.take().map_or(Input::Inherit, Input::Pipe);
        let stdout = if index + 1 < count {
            match make_pipe() {
                Ok((reader, writer)) => {
                    upstream = Some(reader);
                    Output::Pipe(writer)
                }
                Err(err) => {
                    tracing::warn!(index, error = %err, "cannot create pipe");
                    drop(stdin);
                    let unstarted = stages.len() + 1;
                    handles.extend((0..unstarted).map(|_| StageHandle::Finished(1)));
                    terminal.message(&format!("Error executing command: {err}"))?;
                    return Ok(());
                }
            }
        } else {
            terminal.stdout()?
        };
        handles.push(spawn(stage, stdin, stdout, env, terminal)?);
    }
    Ok(())
}

/// Opens the stage's stdout and stderr, honoring its redirections.
///
/// The outer error is a failure to talk to the terminal; the inner one is the message
/// for a redirection target that cannot be opened.
fn open_outputs(
    redirections: &Redirections,
    stdout: Output,
    env: &Environment,
    terminal: &Terminal,
) -> io::Result<Result<(Output, Output), String>> {
    let open = |target: &redirect::RedirectTarget| {
        target
            .open(&env.current_dir)
            .map(Output::File)
            .map_err(|err| format!("{}: {}", target.path, io_error_message(&err)))
    };

    let stdout = match &redirections.stdout {
        Some(target) => match open(target) {
            Ok(file) => file,
            Err(message) => return Ok(Err(message)),
        },
        None => stdout,
    };
    let stderr = match &redirections.stderr {
        Some(target) => match open(target) {
            Ok(file) => file,
            Err(message) => return Ok(Err(message)),
        },
        None => terminal.stderr()?,
    };
    Ok(Ok((stdout, stderr)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redirect::{RedirectMode, RedirectTarget};
    use std::collections::HashMap;
    use std::fs::{self, File};
    use std::io::{Read, Seek};
    use std::path::Path;

    fn test_env(dir: &Path) -> Environment {
        let mut vars = HashMap::new();
        vars.insert("PATH".to_string(), "/bin:/usr/bin".to_string());
        Environment::with_vars(vars, fs::canonicalize(dir).unwrap())
    }

    struct Captured {
        terminal: Terminal,
        reader: File,
    }

    impl Captured {
        fn new() -> Self {
            let file = tempfile::tempfile().unwrap();
            let reader = file.try_clone().unwrap();
            Self {
                terminal: Terminal::Capture(file),
                reader,
            }
        }

        fn contents(&mut self) -> String {
            self.reader.rewind().unwrap();
            let mut s = String::new();
            self.reader.read_to_string(&mut s).unwrap();
            s
        }
    }

    fn stages(line: &str) -> Vec<Stage> {
        parse_pipeline(line).unwrap()
    }

    #[test]
    fn test_parse_pipeline_lexes_every_stage() {
        let parsed = stages("echo 'a | b' one | wc -l > out.txt");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].argv, vec!["echo", "a | b", "one"]);
        assert_eq!(parsed[1].argv, vec!["wc", "-l"]);
        assert_eq!(
            parsed[1].redirections.stdout,
            Some(RedirectTarget::new("out.txt", RedirectMode::Truncate))
        );
    }

    #[test]
    fn test_parse_pipeline_rejects_empty_stages() {
        assert_eq!(parse_pipeline("echo hi |"), Err(PipelineError::EmptyStage));
        assert_eq!(parse_pipeline("| wc"), Err(PipelineError::EmptyStage));
        assert_eq!(parse_pipeline("a | '' | b"), Err(PipelineError::EmptyStage));
        assert_eq!(parse_pipeline("a | > out"), Err(PipelineError::EmptyStage));
        assert_eq!(parse_pipeline("a | 2> err"), Err(PipelineError::EmptyStage));
    }

    #[test]
    fn test_parse_pipeline_reports_missing_target() {
        assert_eq!(
            parse_pipeline("echo hi | cat >"),
            Err(PipelineError::Redirect(RedirectError::MissingTarget {
                operator: ">".to_string()
            }))
        );
    }

    #[test]
    fn test_parse_pipeline_needs_two_stages() {
        assert_eq!(parse_pipeline("echo hi"), Err(PipelineError::TooFewStages));
    }

    #[test]
    #[cfg(unix)]
    fn test_builtin_into_external() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_env(dir.path());
        let mut captured = Captured::new();

        let codes = execute(stages("echo one two | cat"), &env, &captured.terminal).unwrap();
        assert_eq!(codes, vec![0, 0]);
        assert_eq!(captured.contents(), "one two\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_three_external_stages() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("data.txt"), "b\na\nc\na\n").unwrap();
        let env = test_env(dir.path());
        let mut captured = Captured::new();

        let codes = execute(
            stages("cat data.txt | sort | uniq"),
            &env,
            &captured.terminal,
        )
        .unwrap();
        assert_eq!(codes, vec![0, 0, 0]);
        assert_eq!(captured.contents(), "a\nb\nc\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_external_into_builtin_ends_without_reading() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_env(dir.path());
        let mut captured = Captured::new();

        // `yes` never stops on its own; it must die once `type` is done with the pipe.
        let codes = execute(stages("yes | type exit"), &env, &captured.terminal).unwrap();
        assert_eq!(codes.len(), 2);
        assert_eq!(codes[1], 0);
        assert_eq!(captured.contents(), "exit is a shell builtin\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_stage_redirection_replaces_pipe() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_env(dir.path());
        let mut captured = Captured::new();

        let codes = execute(
            stages("echo hello > first.txt | cat"),
            &env,
            &captured.terminal,
        )
        .unwrap();
        assert_eq!(codes, vec![0, 0]);
        assert_eq!(
            fs::read_to_string(dir.path().join("first.txt")).unwrap(),
            "hello\n"
        );
        assert_eq!(captured.contents(), "");
    }

    #[test]
    #[cfg(unix)]
    fn test_last_stage_appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_env(dir.path());
        let captured = Captured::new();

        for _ in 0..2 {
            execute(stages("echo line | cat >> log.txt"), &env, &captured.terminal).unwrap();
        }
        assert_eq!(
            fs::read_to_string(dir.path().join("log.txt")).unwrap(),
            "line\nline\n"
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_unknown_stage_does_not_cancel_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_env(dir.path());
        let mut captured = Captured::new();

        let codes = execute(
            stages("not_a_real_cmd_4242 | echo still here"),
            &env,
            &captured.terminal,
        )
        .unwrap();
        assert_eq!(codes, vec![NOT_FOUND, 0]);
        let out = captured.contents();
        assert!(out.contains("not_a_real_cmd_4242: command not found\n"), "{out}");
        assert!(out.contains("still here\n"), "{out}");
    }

    #[test]
    #[cfg(unix)]
    fn test_unopenable_redirect_skips_only_that_stage() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_env(dir.path());
        let mut captured = Captured::new();

        let codes = execute(
            stages("echo hi > missing/out.txt | cat"),
            &env,
            &captured.terminal,
        )
        .unwrap();
        assert_eq!(codes, vec![1, 0]);
        assert_eq!(
            captured.contents(),
            "missing/out.txt: No such file or directory\n"
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_external_status_is_reported_per_stage() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_env(dir.path());
        let captured = Captured::new();

        let codes = execute(stages("false | true"), &env, &captured.terminal).unwrap();
        assert_eq!(codes, vec![1, 0]);
    }

    #[test]
    #[cfg(unix)]
    fn test_builtin_stage_works_on_a_copy_of_the_session() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let env = test_env(dir.path());
        let before = env.current_dir.clone();
        let mut captured = Captured::new();

        let codes = execute(stages("cd sub | exit 0"), &env, &captured.terminal).unwrap();
        assert_eq!(codes, vec![0, 0]);
        assert_eq!(env.current_dir, before);
        assert!(!env.should_exit);
        assert_eq!(captured.contents(), "");
    }

    #[test]
    #[cfg(unix)]
    fn test_builtin_error_goes_to_its_output() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_env(dir.path());
        let mut captured = Captured::new();

        let codes = execute(stages("cd nowhere | cat"), &env, &captured.terminal).unwrap();
        assert_eq!(codes, vec![0, 0]);
        assert_eq!(
            captured.contents(),
            "cd: nowhere: No such file or directory\n"
        );
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_no_stage_process_outlives_execute() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_env(dir.path());
        let captured = Captured::new();

        let codes = execute(
            stages("sh -c 'echo $$ > first.pid' | sh -c 'echo $$ > second.pid'"),
            &env,
            &captured.terminal,
        )
        .unwrap();
        assert_eq!(codes, vec![0, 0]);
        for name in ["first.pid", "second.pid"] {
            let pid = fs::read_to_string(dir.path().join(name)).unwrap();
            // A zombie keeps its /proc entry until it is reaped.
            let proc_entry = Path::new("/proc").join(pid.trim());
            assert!(!proc_entry.exists(), "{name}: {} not reaped", pid.trim());
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_single_external_stage_runs_in_session_directory() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_env(dir.path());
        let mut captured = Captured::new();

        // Through its absolute path, so the builtin is not picked.
        let stage = Stage::new(vec!["/bin/pwd".to_string()], Redirections::default());
        let codes = execute(vec![stage], &env, &captured.terminal).unwrap();
        assert_eq!(codes, vec![0]);
        assert_eq!(
            captured.contents(),
            format!("{}\n", env.current_dir.display())
        );
    }
}
