use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use vintage_process::{run_command, CommandSpec, RunOptions};

fn helper(args: &[&str]) -> CommandSpec {
    let program = PathBuf::from(env!("CARGO_BIN_EXE_vintage_process_test_helper"));
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    CommandSpec::new(Path::new("."), &program, &args)
}

fn short_timeout() -> RunOptions {
    RunOptions {
        timeout: Some(Duration::from_millis(50)),
        max_bytes: 1024,
        ..RunOptions::default()
    }
}

#[test]
fn captures_both_streams() {
    let result = run_command(
        &helper(&["--print", "L1 C0: f-strings require !2, 3.6", "--eprint", "warming up"]),
        &RunOptions::default(),
    )
    .unwrap();

    assert!(result.status.success());
    assert_eq!(result.output.stdout, "L1 C0: f-strings require !2, 3.6\n");
    assert_eq!(result.output.stderr, "warming up\n");
    assert!(!result.output.truncated);
}

#[test]
fn truncates_large_stdout() {
    let opts = RunOptions {
        timeout: Some(Duration::from_secs(5)),
        max_bytes: 1024,
        ..RunOptions::default()
    };

    let result = run_command(&helper(&["--stdout-bytes", "1048576"]), &opts).unwrap();

    assert!(result.status.success());
    assert!(!result.timed_out);
    assert!(result.output.truncated);
    assert_eq!(result.output.stdout.len(), 1024);
}

#[test]
fn timeout_kills_child() {
    let result = run_command(&helper(&["--sleep-ms", "5000"]), &short_timeout()).unwrap();
    assert!(result.timed_out);
}

#[test]
fn timeout_kills_process_tree() {
    let start = Instant::now();
    let result = run_command(
        &helper(&["--spawn-child-sleep-ms", "5000", "--sleep-ms", "5000"]),
        &short_timeout(),
    )
    .unwrap();

    assert!(result.timed_out);
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "expected timeout kill to return promptly, took {:?}",
        start.elapsed()
    );
}

#[test]
fn non_zero_exit_is_returned_with_stderr() {
    let result = run_command(
        &helper(&["--eprint", "Traceback", "--eprint", "SyntaxError: bad", "--exit-code", "3"]),
        &RunOptions::default(),
    )
    .unwrap();

    assert_eq!(result.status.code(), Some(3));
    assert!(!result.timed_out);
    assert_eq!(result.output.stderr.lines().last(), Some("SyntaxError: bad"));
}

#[test]
fn missing_program_is_a_spawn_error() {
    let spec = CommandSpec::new(
        Path::new("."),
        Path::new("/nonexistent/vintage-detector"),
        &[],
    );
    let err = run_command(&spec, &RunOptions::default()).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
}
