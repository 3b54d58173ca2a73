use std::fs;
use std::io::Write;
use std::process::{Command, Output, Stdio};

fn exec_path() -> String {
    env!("CARGO_BIN_EXE_sshell").to_string()
}

/// Feed `input` to a fresh shell running in `dir` and collect its transcript.
fn session(dir: &std::path::Path, input: impl AsRef<[u8]>) -> Output {
    let mut child = Command::new(exec_path())
        .current_dir(dir)
        .env_remove("SSHELL_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to start shell");
    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(input.as_ref())
        .expect("failed to write input");
    child.wait_with_output().expect("failed to run")
}

#[test]
fn test_redirect_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let output = session(dir.path(), "echo hi > out.txt\nexit\n");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "exit: {:?}", output.status);
    assert_eq!(
        stderr,
        "+ completed 'echo hi > out.txt' [0]\nBye...\n+ completed 'exit' [0]\n"
    );
    assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), "hi\n");
}

#[test]
fn test_prompt_and_echoed_input_on_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let output = session(dir.path(), "echo hello\nexit\n");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout,
        "sshell@ucd$ echo hello\nhello\nsshell@ucd$ exit\n"
    );
}

#[test]
fn test_pipeline_reports_every_stage() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a"), "").unwrap();
    fs::write(dir.path().join("b"), "").unwrap();
    let output = session(dir.path(), "ls | wc -l\n");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("\n2\n"), "stdout: {}", stdout);
    assert_eq!(stderr, "+ completed 'ls | wc -l' [0][0]\n");
}

#[test]
fn test_errors_do_not_end_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let input = "| ls\ndoesnotexist123\necho x >\ncat > nodir/out\ntrue\n";
    let output = session(dir.path(), input);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success());
    assert_eq!(
        stderr,
        "Error: missing command\n\
         Error: command not found\n\
         + completed 'doesnotexist123' [1]\n\
         Error: no outputfile\n\
         Error: cannot open output file\n\
         + completed 'true' [0]\n"
    );
}

#[test]
fn test_builtins() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub").join("data"), "abc").unwrap();
    let output = session(dir.path(), "cd sub\nsls\ncd missing\npwd\n");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("data (3 bytes)\n"), "stdout: {}", stdout);
    assert!(stdout.contains("sub\n"), "stdout: {}", stdout);
    assert_eq!(
        stderr,
        "+ completed 'cd sub' [0]\n\
         + completed 'sls' [0]\n\
         Error: cannot cd into directory\n\
         + completed 'cd missing' [1]\n\
         + completed 'pwd' [0]\n"
    );
}

#[test]
fn test_error_pipe_and_error_redirect() {
    let dir = tempfile::tempdir().unwrap();
    let output = session(dir.path(), "doesnotexist123 |& cat >& log\n");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(
        stderr,
        "+ completed 'doesnotexist123 |& cat >& log' [1][0]\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("log")).unwrap(),
        "Error: command not found\n"
    );
}

#[test]
fn test_end_of_input_exits_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let output = session(dir.path(), "true");

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr, "+ completed 'true' [0]\n");
}

#[test]
fn test_invalid_utf8_line_does_not_end_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let output = session(dir.path(), b"echo caf\xe9\ntrue\n");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "exit: {:?}", output.status);
    assert!(
        stderr.ends_with("+ completed 'true' [0]\n"),
        "stderr: {}",
        stderr
    );
    assert_eq!(stderr.lines().count(), 2, "stderr: {}", stderr);
}

#[test]
fn test_doubled_redirect_writes_named_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = session(dir.path(), "echo hi >> out\n");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr, "+ completed 'echo hi >> out' [0]\n");
    assert_eq!(fs::read_to_string(dir.path().join("out")).unwrap(), "hi\n");
    assert!(!dir.path().join(">").exists());
}
