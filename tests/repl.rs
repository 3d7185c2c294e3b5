use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

fn tinysh(home: &Path, args: &[&str], input: &str) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_tinysh"));
    command.args(args);
    feed(command, home, input)
}

fn feed(mut command: Command, home: &Path, input: &str) -> Output {
    let mut child = command
        .env("HOME", home)
        .env_remove("TINYSH_LOG")
        .current_dir(home)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn tinysh");
    // The shell may quit before reading everything.
    let _ = child.stdin.take().unwrap().write_all(input.as_bytes());
    child.wait_with_output().expect("wait for tinysh")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_session_until_exit() {
    let home = tempfile::tempdir().unwrap();
    let output = tinysh(
        home.path(),
        &[],
        "echo hello world\nnot_a_real_cmd\ntype echo\nexit 0\necho unreachable\n",
    );
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("hello world\n"), "{out}");
    assert!(out.contains("not_a_real_cmd: command not found\n"), "{out}");
    assert!(out.contains("echo is a shell builtin\n"), "{out}");
    assert!(!out.contains("unreachable"), "{out}");
}

#[test]
fn test_end_of_input_ends_cleanly() {
    let home = tempfile::tempdir().unwrap();
    let output = tinysh(home.path(), &[], "echo last\n");
    assert!(output.status.success());
    assert!(stdout(&output).contains("last\n"));
}

#[test]
#[cfg(unix)]
fn test_pipeline_and_redirect() {
    let home = tempfile::tempdir().unwrap();
    let output = tinysh(
        home.path(),
        &[],
        "echo one two | cat\necho saved > out.txt\necho more >> out.txt\n",
    );
    assert!(output.status.success());
    assert!(stdout(&output).contains("one two\n"));
    assert_eq!(
        fs::read_to_string(home.path().join("out.txt")).unwrap(),
        "saved\nmore\n"
    );
}

#[test]
#[cfg(target_os = "linux")]
fn test_descriptor_exhaustion_keeps_shell_running() {
    let home = tempfile::tempdir().unwrap();
    let mut command = Command::new("/bin/sh");
    command.args(["-c", "ulimit -n 6; exec \"$0\"", env!("CARGO_BIN_EXE_tinysh")]);
    let output = feed(command, home.path(), "echo a | cat | cat\necho after\n");
    let out = stdout(&output);
    assert!(output.status.success(), "{out}");
    assert!(out.contains("after\n"), "{out}");
}

#[test]
fn test_history_across_lines() {
    let home = tempfile::tempdir().unwrap();
    let output = tinysh(home.path(), &[], "echo a\necho b\nhistory 2\n");
    let out = stdout(&output);
    assert!(out.contains("    2  echo b\n    3  history 2\n"), "{out}");
    assert!(!out.contains("    1  echo a"), "{out}");
}

#[test]
fn test_single_command_flag() {
    let home = tempfile::tempdir().unwrap();
    let output = tinysh(home.path(), &["-c", "echo 'from flag'"], "");
    assert!(output.status.success());
    assert_eq!(stdout(&output), "from flag\n");
}

#[test]
fn test_prompt_from_config_file() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("custom.toml");
    fs::write(&config, "[shell]\nprompt = \"tiny> \"\n").unwrap();
    let output = tinysh(
        home.path(),
        &["--config", config.to_str().unwrap()],
        "echo hi\n",
    );
    assert!(output.status.success());
    assert!(stdout(&output).contains("hi\n"));
}

#[test]
fn test_malformed_config_fails_startup() {
    let home = tempfile::tempdir().unwrap();
    let config_dir = home.path().join(".config").join("tinysh");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "[shell\n").unwrap();
    let output = tinysh(home.path(), &[], "echo hi\n");
    assert!(!output.status.success());
    assert!(!stdout(&output).contains("hi"));
}
