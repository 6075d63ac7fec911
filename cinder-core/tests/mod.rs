use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cinder_client::{CompileBackend, CompileRequest, CompileResponse};
use cinder_core::editor::HELLO_WORLD_C;
use cinder_core::transcript::TRIM_NOTICE;
use cinder_core::{
    Affordance, Console, ConsoleConfig, ConsoleError, ConsoleEvent, ErrorKind, ExecutionError,
    InputBuffer, MemoryEditor, RunStatus, Session, SourceEditor, Transcript, TranscriptEntry,
    TranscriptMode,
};

// ============================================================================
// Scripted Backend
// ============================================================================

/// Replays canned results in order and records every request it receives.
#[derive(Default)]
struct ScriptedBackend {
    script: Mutex<VecDeque<Result<CompileResponse, ExecutionError>>>,
    requests: Mutex<Vec<CompileRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedBackend {
    fn new(script: Vec<Result<CompileResponse, ExecutionError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        })
    }

    fn requests(&self) -> Vec<CompileRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompileBackend for ScriptedBackend {
    async fn execute(&self, request: &CompileRequest) -> Result<CompileResponse, ExecutionError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        tokio::task::yield_now().await;

        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ExecutionError::Unknown("script exhausted".to_string())));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        next
    }
}

/// Never answers.
struct SilentBackend;

#[async_trait]
impl CompileBackend for SilentBackend {
    async fn execute(&self, _request: &CompileRequest) -> Result<CompileResponse, ExecutionError> {
        std::future::pending().await
    }
}

fn finished(output: &str, code: i32) -> Result<CompileResponse, ExecutionError> {
    Ok(CompileResponse {
        output: output.to_string(),
        exit_code: Some(code),
        waiting_for_input: false,
    })
}

fn waiting(output: &str) -> Result<CompileResponse, ExecutionError> {
    Ok(CompileResponse {
        output: output.to_string(),
        exit_code: None,
        waiting_for_input: true,
    })
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_hello_world_completes() {
    let backend = ScriptedBackend::new(vec![finished("Hello, World!\n", 0)]);
    let mut session = Session::new(backend.clone(), ConsoleConfig::default());

    let status = session.run(HELLO_WORLD_C).await.unwrap();

    assert_eq!(status, RunStatus::Completed(Some(0)));
    assert!(session.console().transcript().render().trim_end().ends_with("Hello, World!"));
    assert_eq!(backend.requests(), vec![CompileRequest::new(HELLO_WORLD_C, "")]);
    assert_eq!(session.affordance(), Affordance::Run);
}

#[tokio::test]
async fn test_read_name_then_greet() {
    let backend = ScriptedBackend::new(vec![
        waiting("What is your name? "),
        finished("What is your name? Hello, Ada\n", 0),
    ]);
    let mut session = Session::new(backend.clone(), ConsoleConfig::default());

    let status = session.run("greet.c").await.unwrap();
    assert_eq!(status, RunStatus::AwaitingInput);
    assert_eq!(session.affordance(), Affordance::Submit);

    let status = session.submit("Ada").await.unwrap();
    assert_eq!(status, RunStatus::Completed(Some(0)));

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].stdin, "Ada\n");
    assert_eq!(requests[1].source, "greet.c");

    let text = session.console().transcript().render();
    assert_eq!(text, "Compiling...\nWhat is your name? Ada\nHello, Ada\n");
    assert!(session.console().input().is_empty());
}

#[tokio::test]
async fn test_unreachable_service_fails_with_hint() {
    let backend = ScriptedBackend::new(vec![Err(ExecutionError::Transport(
        "connection refused".to_string(),
    ))]);
    let mut session = Session::new(backend, ConsoleConfig::default());

    let status = session.run("src").await.unwrap();

    assert_eq!(status, RunStatus::Failed(ErrorKind::Transport));
    assert_eq!(session.affordance(), Affordance::Run);
    let last = session.console().transcript().entries().last().unwrap().clone();
    assert_eq!(
        last,
        TranscriptEntry::Error(
            "Cannot connect to the compiler service. Please check if the server is running."
                .to_string()
        )
    );
}

#[tokio::test]
async fn test_service_error_is_shown_verbatim() {
    let backend = ScriptedBackend::new(vec![Err(ExecutionError::Service {
        status: 500,
        message: Some("compile failed".to_string()),
    })]);
    let mut session = Session::new(backend, ConsoleConfig::default());

    let status = session.run("src").await.unwrap();

    assert_eq!(status, RunStatus::Failed(ErrorKind::Service));
    assert!(session.console().transcript().render().contains("Error: compile failed"));
}

// ============================================================================
// Input Accumulation
// ============================================================================

#[tokio::test]
async fn test_every_request_resends_all_input() {
    let lines = ["3", "", "seven", "  padded  "];
    let mut script = vec![waiting("> ")];
    for _ in 0..lines.len() - 1 {
        script.push(waiting(""));
    }
    script.push(finished("done\n", 0));
    let backend = ScriptedBackend::new(script);
    let mut session = Session::new(backend.clone(), ConsoleConfig::default());

    session.run("src").await.unwrap();
    for line in lines {
        session.submit(line).await.unwrap();
    }

    let requests = backend.requests();
    assert_eq!(requests.len(), lines.len() + 1);
    assert_eq!(requests[0].stdin, "");
    for n in 1..=lines.len() {
        let expected: String = lines[..n].iter().map(|l| format!("{}\n", l)).collect();
        assert_eq!(requests[n].stdin, expected);
    }
    assert_eq!(session.status(), RunStatus::Completed(Some(0)));
}

#[tokio::test]
async fn test_empty_line_is_forwarded() {
    let backend = ScriptedBackend::new(vec![waiting("Press Enter"), finished("ok\n", 0)]);
    let mut session = Session::new(backend.clone(), ConsoleConfig::default());

    session.run("src").await.unwrap();
    session.submit("").await.unwrap();

    assert_eq!(backend.requests()[1].stdin, "\n");
}

#[tokio::test]
async fn test_new_run_resets_input() {
    let backend = ScriptedBackend::new(vec![
        waiting("? "),
        Err(ExecutionError::Unknown("boom".to_string())),
        finished("again\n", 0),
    ]);
    let mut session = Session::new(backend.clone(), ConsoleConfig::default());

    session.run("src").await.unwrap();
    session.submit("first").await.unwrap();
    assert_eq!(session.status(), RunStatus::Failed(ErrorKind::Unknown));

    session.run("src").await.unwrap();
    assert_eq!(backend.requests()[2].stdin, "");
}

#[test]
fn test_input_buffer_normalizes_line_endings() {
    let mut buf = InputBuffer::new();
    buf.push_line("a\r\n");
    buf.push_line("b\n");
    buf.push_line("c");
    assert_eq!(buf.stdin(), "a\nb\nc\n");
    assert_eq!(buf.len(), 3);
}

// ============================================================================
// Transition Guards
// ============================================================================

#[test]
fn test_run_rejected_while_running() {
    let mut console = Console::default();
    console.apply(ConsoleEvent::Run { source: "a".into() }).unwrap();

    let err = console
        .apply(ConsoleEvent::Run { source: "b".into() })
        .unwrap_err();
    assert_eq!(err, ConsoleError::Busy);
    assert_eq!(console.affordance(), Affordance::Disabled);

    let err = console
        .apply(ConsoleEvent::Submit { line: "x".into() })
        .unwrap_err();
    assert_eq!(err, ConsoleError::Busy);
}

#[test]
fn test_run_rejected_while_awaiting_input() {
    let mut console = Console::default();
    console.apply(ConsoleEvent::Run { source: "a".into() }).unwrap();
    console.apply(ConsoleEvent::Responded(waiting("?").unwrap())).unwrap();

    let err = console
        .apply(ConsoleEvent::Run { source: "a".into() })
        .unwrap_err();
    assert_eq!(err, ConsoleError::AwaitingInput);
    assert_eq!(console.status(), RunStatus::AwaitingInput);
}

#[test]
fn test_stray_response_is_rejected() {
    let mut console = Console::default();
    let err = console
        .apply(ConsoleEvent::Responded(finished("x", 0).unwrap()))
        .unwrap_err();
    assert_eq!(err, ConsoleError::NoRequestInFlight);
    assert_eq!(console.status(), RunStatus::Idle);
}

#[test]
fn test_marker_flag_decides_next_state() {
    for (resp, expected) in [
        (waiting("x"), RunStatus::AwaitingInput),
        (finished("x", 1), RunStatus::Completed(Some(1))),
    ] {
        let mut console = Console::default();
        console.apply(ConsoleEvent::Run { source: "s".into() }).unwrap();
        console.apply(ConsoleEvent::Responded(resp.unwrap())).unwrap();
        assert_eq!(console.status(), expected);
    }
}

#[test]
fn test_empty_output_reports_exit_code() {
    let mut console = Console::default();
    console.apply(ConsoleEvent::Run { source: "s".into() }).unwrap();
    console
        .apply(ConsoleEvent::Responded(finished("", 2).unwrap()))
        .unwrap();
    assert_eq!(
        console.transcript().render(),
        "Compiling...\nProcess exited with code 2\n"
    );
}

#[tokio::test]
async fn test_one_request_in_flight() {
    let backend = ScriptedBackend::new(vec![waiting("a"), waiting("ab"), finished("abc", 0)]);
    let mut session = Session::new(backend.clone(), ConsoleConfig::default());

    session.run("s").await.unwrap();
    session.submit("1").await.unwrap();
    session.submit("2").await.unwrap();

    assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(backend.in_flight.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancel_in_flight_request() {
    let mut session = Session::new(Arc::new(SilentBackend), ConsoleConfig::default());

    let status = session
        .run_until("s", tokio::time::sleep(Duration::from_millis(50)))
        .await
        .unwrap();

    assert_eq!(status, RunStatus::Failed(ErrorKind::Cancelled));
    assert_eq!(session.affordance(), Affordance::Run);
    assert!(session.console().transcript().render().ends_with("Run cancelled.\n"));
}

#[tokio::test]
async fn test_abandon_program_waiting_for_input() {
    let backend = ScriptedBackend::new(vec![waiting("? ")]);
    let mut session = Session::new(backend, ConsoleConfig::default());

    session.run("s").await.unwrap();
    let status = session.abandon().unwrap();

    assert_eq!(status, RunStatus::Failed(ErrorKind::Cancelled));
    assert!(session.console().input().is_empty());
}

#[test]
fn test_abandon_when_idle_is_rejected() {
    let mut console = Console::default();
    assert_eq!(
        console.apply(ConsoleEvent::Cancel).unwrap_err(),
        ConsoleError::NoRequestInFlight
    );
}

// ============================================================================
// Transcript Modes
// ============================================================================

#[tokio::test]
async fn test_reset_per_run_starts_fresh() {
    let backend = ScriptedBackend::new(vec![finished("one\n", 0), finished("two\n", 0)]);
    let mut session = Session::new(backend, ConsoleConfig::default());

    session.run("s").await.unwrap();
    session.run("s").await.unwrap();

    assert_eq!(session.console().transcript().render(), "Compiling...\ntwo\n");
    assert_eq!(session.console().run_number(), 2);
}

#[tokio::test]
async fn test_scrollback_keeps_earlier_runs() {
    let backend = ScriptedBackend::new(vec![finished("one\n", 0), finished("two\n", 0)]);
    let config = ConsoleConfig {
        mode: TranscriptMode::Scrollback,
        scrollback_limit: None,
    };
    let mut session = Session::new(backend, config);

    session.run("s").await.unwrap();
    session.run("s").await.unwrap();

    assert_eq!(
        session.console().transcript().render(),
        "Compiling...\none\n── run #2 ──\nCompiling...\ntwo\n"
    );
}

#[test]
fn test_transcript_limit_trims_oldest() {
    let mut t = Transcript::with_limit(10);
    t.push(TranscriptEntry::Output("aaaaaa".into()));
    t.push(TranscriptEntry::Output("bbbbbb".into()));

    assert_eq!(
        t.entries(),
        &[
            TranscriptEntry::Status(TRIM_NOTICE.to_string()),
            TranscriptEntry::Output("bbbbbb".into()),
        ]
    );
}

#[test]
fn test_clear_transcript_blocked_while_running() {
    let mut console = Console::default();
    console.apply(ConsoleEvent::Run { source: "s".into() }).unwrap();
    assert_eq!(console.clear_transcript().unwrap_err(), ConsoleError::Busy);
}

#[test]
fn test_transcript_mode_parsing() {
    assert_eq!(TranscriptMode::from_str("Scrollback"), Some(TranscriptMode::Scrollback));
    assert_eq!(TranscriptMode::from_str("reset"), Some(TranscriptMode::ResetPerRun));
    assert_eq!(TranscriptMode::from_str("sideways"), None);
    assert_eq!(TranscriptMode::default(), TranscriptMode::ResetPerRun);
}

// ============================================================================
// Editing Capability
// ============================================================================

#[test]
fn test_memory_editor_defaults_to_hello_world() {
    let ed = MemoryEditor::default();
    assert_eq!(ed.language(), "c");
    assert!(ed.text().contains("Hello, World!"));
}

#[test]
fn test_memory_editor_fires_change_callbacks() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut ed = MemoryEditor::new("c", "");
    let sink = seen.clone();
    ed.on_change(Box::new(move |text| sink.lock().unwrap().push(text.to_string())));

    ed.set_text("int main(){}").unwrap();
    ed.set_text("int main(){}").unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["int main(){}".to_string()]);
    assert_eq!(ed.text(), "int main(){}");
}
