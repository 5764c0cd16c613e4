// tests/privileged_auth.rs

//! Credential broker + privileged executor behaviour with a scripted prompt
//! and a fake elevator (no real sudo, no real prompting).

use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use privexec::auth::{spawn_prompt_actor, CredentialBroker, DEFAULT_CREDENTIAL_TTL};
use privexec::errors::PrivexecError;
use privexec::exec::{Elevator, PrivilegedExecutor};
use privexec::types::CommandSpec;
use privexec_test_utils::clock::ManualClock;
use privexec_test_utils::elevator::FakeElevator;
use privexec_test_utils::prompts::ScriptedPrompt;
use privexec_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

struct Harness {
    executor: PrivilegedExecutor,
    broker: Arc<CredentialBroker>,
    elevator: FakeElevator,
    messages: Arc<Mutex<Vec<String>>>,
}

fn harness(prompt: ScriptedPrompt, elevator: FakeElevator) -> Harness {
    harness_with_clock(prompt, elevator, ManualClock::new())
}

fn harness_with_clock(
    prompt: ScriptedPrompt,
    elevator: FakeElevator,
    clock: ManualClock,
) -> Harness {
    let messages = prompt.messages();
    let handle = spawn_prompt_actor(prompt);
    let shared: Arc<dyn Elevator> = Arc::new(elevator.clone());
    let broker = Arc::new(CredentialBroker::with_clock(
        handle,
        Arc::clone(&shared),
        DEFAULT_CREDENTIAL_TTL,
        Arc::new(clock),
    ));
    let executor = PrivilegedExecutor::new(Arc::clone(&broker), shared);
    Harness {
        executor,
        broker,
        elevator,
        messages,
    }
}

fn install_spec() -> CommandSpec {
    CommandSpec::new(["apt-get", "install", "-y", "curl"])
}

#[tokio::test]
async fn one_prompt_one_validation_on_first_try_success() -> TestResult {
    init_tracing();

    let h = harness(
        ScriptedPrompt::answering(&["correct"]),
        FakeElevator::accepting("correct"),
    );

    let result = with_timeout(h.executor.run_privileged(&install_spec())).await?;

    assert!(result.success());
    assert_eq!(h.messages.lock().unwrap().len(), 1);
    assert_eq!(h.elevator.validate_calls(), 1);
    assert_eq!(h.elevator.exec_calls(), 1);
    assert_eq!(h.elevator.executed()[0].argv[0], "apt-get");
    Ok(())
}

#[tokio::test]
async fn three_wrong_answers_exhaust_budget_without_running_command() {
    init_tracing();

    let h = harness(
        ScriptedPrompt::answering(&["wrong", "wrong", "wrong"]),
        FakeElevator::accepting("correct"),
    );

    let err = with_timeout(h.executor.run_privileged(&install_spec()))
        .await
        .expect_err("budget must be exhausted");

    assert!(matches!(err, PrivexecError::MaxRetriesExceeded));
    // The real command was never attempted with a wrong secret.
    assert_eq!(h.elevator.exec_calls(), 0);
    assert_eq!(h.elevator.validate_calls(), 3);

    let messages = h.messages.lock().unwrap();
    assert_eq!(messages.len(), 3);
    assert!(messages[0].contains("requires root privileges"));
    assert!(messages[1].contains("Incorrect password"));
    assert!(messages[2].contains("Incorrect password"));
}

#[tokio::test]
async fn declined_prompt_cancels_without_validation() {
    init_tracing();

    let h = harness(ScriptedPrompt::declining(), FakeElevator::accepting("correct"));

    let err = with_timeout(h.executor.run_privileged(&install_spec()))
        .await
        .expect_err("decline must cancel");

    assert!(matches!(err, PrivexecError::AuthCancelled));
    assert_eq!(h.elevator.validate_calls(), 0);
    assert_eq!(h.elevator.exec_calls(), 0);
}

#[tokio::test]
async fn cached_credential_is_reused_without_prompting() -> TestResult {
    init_tracing();

    let h = harness(
        ScriptedPrompt::answering(&["correct"]),
        FakeElevator::accepting("correct"),
    );

    with_timeout(h.executor.run_privileged(&install_spec())).await?;
    with_timeout(h.executor.run_privileged(&install_spec())).await?;

    // One interactive prompt total; the second run revalidated the cache.
    assert_eq!(h.messages.lock().unwrap().len(), 1);
    assert_eq!(h.elevator.validate_calls(), 2);
    assert_eq!(h.elevator.exec_calls(), 2);
    Ok(())
}

#[tokio::test]
async fn invalidate_forces_a_new_prompt() -> TestResult {
    init_tracing();

    let h = harness(
        ScriptedPrompt::answering(&["correct", "correct"]),
        FakeElevator::accepting("correct"),
    );

    with_timeout(h.executor.run_privileged(&install_spec())).await?;
    h.broker.invalidate().await;
    with_timeout(h.executor.run_privileged(&install_spec())).await?;

    assert_eq!(h.messages.lock().unwrap().len(), 2);
    Ok(())
}

#[tokio::test]
async fn expired_credential_forces_a_new_prompt() -> TestResult {
    init_tracing();

    let clock = ManualClock::new();
    let h = harness_with_clock(
        ScriptedPrompt::answering(&["correct", "correct"]),
        FakeElevator::accepting("correct"),
        clock.clone(),
    );

    with_timeout(h.executor.run_privileged(&install_spec())).await?;
    assert!(h.broker.is_cached().await);

    clock.advance(DEFAULT_CREDENTIAL_TTL + Duration::from_secs(1));
    assert!(!h.broker.is_cached().await);

    with_timeout(h.executor.run_privileged(&install_spec())).await?;
    assert_eq!(h.messages.lock().unwrap().len(), 2);
    Ok(())
}

#[tokio::test]
async fn already_elevated_bypasses_broker_entirely() -> TestResult {
    init_tracing();

    let h = harness(ScriptedPrompt::declining(), FakeElevator::already_elevated());

    // Goes straight to the process runner; use a harmless real command.
    let spec = CommandSpec::new(["echo", "ok"]);
    let result = with_timeout(h.executor.run_privileged(&spec)).await?;

    assert_eq!(result.stdout.trim(), "ok");
    assert_eq!(h.messages.lock().unwrap().len(), 0);
    assert_eq!(h.elevator.validate_calls(), 0);
    assert_eq!(h.elevator.exec_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn validation_timeouts_consume_the_retry_budget() {
    init_tracing();

    let h = harness(
        ScriptedPrompt::answering(&["a", "b", "c"]),
        FakeElevator::timing_out(),
    );

    let err = with_timeout(h.executor.run_privileged(&install_spec()))
        .await
        .expect_err("timeouts must exhaust the budget");

    assert!(matches!(err, PrivexecError::MaxRetriesExceeded));
    assert_eq!(h.elevator.validate_calls(), 3);
    assert_eq!(h.elevator.exec_calls(), 0);
}

#[tokio::test]
async fn streaming_emits_breadcrumbs_and_scrubs_the_secret() -> TestResult {
    init_tracing();

    let h = harness(
        ScriptedPrompt::answering(&["wrong", "sekrit"]),
        FakeElevator::accepting("sekrit").with_stream_lines([
            "Reading package lists...",
            "child echoed sekrit back",
        ]),
    );

    let mut lines = Vec::new();
    let code = with_timeout(
        h.executor
            .run_privileged_streaming(&install_spec(), |line| lines.push(line.to_string())),
    )
    .await?;

    assert_eq!(code, 0);
    assert_eq!(
        lines,
        vec![
            "[auth] Validating credentials...",
            "[error] Incorrect password.",
            "[auth] Validating credentials...",
            "[auth] Credentials validated. Starting operation...",
            "Reading package lists...",
            "child echoed [REDACTED] back",
        ]
    );
    assert!(lines.iter().all(|l| !l.contains("sekrit")));
    assert_eq!(h.messages.lock().unwrap().len(), 2);
    Ok(())
}

#[tokio::test]
async fn streaming_reports_command_failure_as_exit_code() -> TestResult {
    init_tracing();

    let h = harness(
        ScriptedPrompt::answering(&["sekrit"]),
        FakeElevator::accepting("sekrit")
            .with_stream_lines(["E: Unable to locate package nope"])
            .with_exit_code(100),
    );

    let mut lines = Vec::new();
    let code = with_timeout(
        h.executor
            .run_privileged_streaming(&install_spec(), |line| lines.push(line.to_string())),
    )
    .await?;

    // Nonzero application exit is a value, not an authentication error.
    assert_eq!(code, 100);
    assert_eq!(
        lines.last().map(String::as_str),
        Some("[error] Command failed with exit code 100")
    );
    Ok(())
}

#[tokio::test]
async fn broker_acquire_within_window_never_reprompts() -> TestResult {
    init_tracing();

    let h = harness(
        ScriptedPrompt::answering(&["sekrit"]),
        FakeElevator::accepting("sekrit"),
    );

    let first = with_timeout(h.broker.acquire(false)).await?;
    assert!(first.is_some());
    assert!(with_timeout(h.broker.validate()).await?);

    for _ in 0..5 {
        let again = with_timeout(h.broker.acquire(false)).await?;
        assert!(again.is_some());
    }

    assert_eq!(h.messages.lock().unwrap().len(), 1);
    assert!(h.broker.is_authenticated().await);
    Ok(())
}

#[tokio::test]
async fn failed_validation_clears_cache_instead_of_marking_stale() -> TestResult {
    init_tracing();

    let h = harness(
        ScriptedPrompt::answering(&["wrong", "wrong"]),
        FakeElevator::accepting("correct"),
    );

    let acquired = with_timeout(h.broker.acquire(false)).await?;
    assert!(acquired.is_some());
    assert!(!with_timeout(h.broker.validate()).await?);

    // The secret is gone, not merely stale: the next acquire prompts again.
    assert!(!h.broker.is_cached().await);
    let again = with_timeout(h.broker.acquire(false)).await?;
    assert!(again.is_some());
    assert_eq!(h.messages.lock().unwrap().len(), 2);
    Ok(())
}
