// tests/runner_process.rs

//! Process runner behaviour against real child processes.

use std::error::Error;

use privexec::errors::PrivexecError;
use privexec::runner;
use privexec::types::CommandSpec;
use privexec_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn run_captures_stdout_stderr_and_exit_code() -> TestResult {
    init_tracing();

    let spec = CommandSpec::new(["sh", "-c", "printf 'out\\n'; printf 'err\\n' 1>&2"]);
    let result = with_timeout(runner::run(&spec)).await?;

    assert_eq!(result.exit_code, 0);
    assert!(result.success());
    assert_eq!(result.stdout, "out\n");
    assert_eq!(result.stderr, "err\n");
    Ok(())
}

#[tokio::test]
async fn nonzero_exit_is_a_value_not_an_error() -> TestResult {
    init_tracing();

    let spec = CommandSpec::new(["sh", "-c", "exit 3"]);
    let result = with_timeout(runner::run(&spec)).await?;

    assert_eq!(result.exit_code, 3);
    assert!(!result.success());
    Ok(())
}

#[tokio::test]
async fn missing_binary_is_a_spawn_error() {
    init_tracing();

    let spec = CommandSpec::new(["definitely-not-a-real-binary-a8f3"]);
    let err = with_timeout(runner::run(&spec))
        .await
        .expect_err("spawn must fail");

    match err {
        PrivexecError::Spawn { program, .. } => {
            assert_eq!(program, "definitely-not-a-real-binary-a8f3");
        }
        other => panic!("expected Spawn error, got {other:?}"),
    }
}

#[tokio::test]
async fn stdin_payload_is_written_then_closed() -> TestResult {
    init_tracing();

    // cat only terminates if it sees EOF after the payload.
    let spec = CommandSpec::new(["cat"]).stdin("hello runner\n");
    let result = with_timeout(runner::run(&spec)).await?;

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout, "hello runner\n");
    Ok(())
}

#[tokio::test]
async fn env_overlay_reaches_the_child() -> TestResult {
    init_tracing();

    let spec = CommandSpec::new(["sh", "-c", "printf '%s' \"$PRIVEXEC_TEST_MARKER\""])
        .env("PRIVEXEC_TEST_MARKER", "overlay-works");
    let result = with_timeout(runner::run(&spec)).await?;

    assert_eq!(result.stdout, "overlay-works");
    Ok(())
}

#[tokio::test]
async fn streaming_merges_stdout_and_stderr() -> TestResult {
    init_tracing();

    let spec = CommandSpec::new(["sh", "-c", "echo out1; echo err1 1>&2; echo out2"]);
    let mut lines = Vec::new();
    let code = with_timeout(runner::run_streaming(&spec, |line| {
        lines.push(line.to_string());
    }))
    .await?;

    assert_eq!(code, 0);
    assert!(lines.contains(&"out1".to_string()));
    assert!(lines.contains(&"err1".to_string()));
    assert!(lines.contains(&"out2".to_string()));
    Ok(())
}

#[tokio::test]
async fn streaming_preserves_single_stream_order() -> TestResult {
    init_tracing();

    let spec = CommandSpec::new(["sh", "-c", "for i in 1 2 3 4 5; do echo $i; done"]);
    let mut lines = Vec::new();
    let code = with_timeout(runner::run_streaming(&spec, |line| {
        lines.push(line.to_string());
    }))
    .await?;

    assert_eq!(code, 0);
    assert_eq!(lines, vec!["1", "2", "3", "4", "5"]);
    Ok(())
}

#[tokio::test]
async fn streaming_reports_nonzero_exit_as_value() -> TestResult {
    init_tracing();

    let spec = CommandSpec::new(["sh", "-c", "echo partial; exit 7"]);
    let mut lines = Vec::new();
    let code = with_timeout(runner::run_streaming(&spec, |line| {
        lines.push(line.to_string());
    }))
    .await?;

    assert_eq!(code, 7);
    assert_eq!(lines, vec!["partial"]);
    Ok(())
}
