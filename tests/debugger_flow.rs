//! Editor-facing flows against a scripted engine.

mod common;

use common::{test_config, EditorEvent, RecordingEditor, APP_SOURCE};
use dbgp_debugger::{Config, Debugger, DebuggerError, DebuggerState};
use dbgp_mock::{MockEngine, Reply};
use std::net::SocketAddr;
use std::time::Duration;

const APP: &str = "file:///app.php";

async fn connect(addr: SocketAddr) -> MockEngine {
    MockEngine::connect_with_retry(addr, APP, Duration::from_secs(5))
        .await
        .expect("engine connects")
}

/// Answer the step/stack_get/source chain for a stop at `line` of `app.php`.
async fn stop_at(engine: &mut MockEngine, verb: &str, line: u32) -> Vec<u32> {
    let step = engine
        .answer(verb, Reply::new().status("break", "ok").location(APP, line))
        .await
        .unwrap();
    let stack = engine
        .answer(
            "stack_get",
            Reply::new()
                .stack_frame(1, APP, 12, "{main}")
                .stack_frame(0, APP, line, "f"),
        )
        .await
        .unwrap();
    let source = engine
        .answer("source", Reply::new().source(APP_SOURCE))
        .await
        .unwrap();
    assert_eq!(source.arg('f'), Some(APP));
    vec![step.transaction_id, stack.transaction_id, source.transaction_id]
}

#[tokio::test]
async fn start_replays_breakpoints_and_jumps_to_first_stop() {
    let (config, addr) = test_config(&["app.php 10"]);
    let engine = tokio::spawn(async move {
        let mut engine = connect(addr).await;
        let bp = engine
            .answer("breakpoint_set", Reply::new().attr("id", "1001"))
            .await
            .unwrap();
        stop_at(&mut engine, "step_into", 10).await;
        bp
    });

    let mut debugger = Debugger::new(config, RecordingEditor::default());
    debugger.execute("start").await.unwrap();

    let bp = engine.await.unwrap();
    assert_eq!(bp.arg('t'), Some("line"));
    assert_eq!(bp.arg('f'), Some(APP));
    assert_eq!(bp.arg('n'), Some("10"));

    assert_eq!(debugger.state(), DebuggerState::Broken);
    let editor = debugger.editor();
    assert_eq!(editor.jumps(), vec![("app.php".to_string(), 10)]);
    assert!(editor.messages()[0].starts_with("waiting on 127.0.0.1:"));
    assert!(editor.errors().is_empty(), "{:?}", editor.errors());

    let session = debugger.session().unwrap();
    assert_eq!(session.current_file(), APP);
    assert_eq!(session.current_line(), 10);
    assert_eq!(session.last_source_line(), "$c = f();");
    assert_eq!(session.init().file_uri, APP);
}

#[tokio::test]
async fn step_auto_starts_and_transaction_ids_increase() {
    let (config, addr) = test_config(&[]);
    let engine = tokio::spawn(async move {
        let mut engine = connect(addr).await;
        let mut ids = stop_at(&mut engine, "step_into", 4).await;
        ids.extend(stop_at(&mut engine, "step_over", 6).await);
        ids.extend(stop_at(&mut engine, "step_out", 12).await);
        ids
    });

    let mut debugger = Debugger::new(config, RecordingEditor::default());
    debugger.execute("n").await.unwrap();
    assert_eq!(debugger.state(), DebuggerState::Broken);
    debugger.execute("n").await.unwrap();
    debugger.execute("so").await.unwrap();

    let ids = engine.await.unwrap();
    assert_eq!(ids, (0..9).collect::<Vec<u32>>());
    assert_eq!(debugger.session().unwrap().next_transaction_id(), 9);
    assert_eq!(
        debugger.editor().jumps(),
        vec![
            ("app.php".to_string(), 4),
            ("app.php".to_string(), 6),
            ("app.php".to_string(), 12),
        ]
    );
}

#[tokio::test]
async fn assignment_on_previous_line_is_evaluated_after_step() {
    let (config, addr) = test_config(&[]);
    let engine = tokio::spawn(async move {
        let mut engine = connect(addr).await;
        stop_at(&mut engine, "step_into", 3).await;
        engine
            .answer("step_over", Reply::new().status("break", "ok").location(APP, 4))
            .await
            .unwrap();
        let eval = engine
            .answer("eval", Reply::new().string_property("", "2"))
            .await
            .unwrap();
        engine
            .answer("stack_get", Reply::new().stack_frame(0, APP, 4, "{main}"))
            .await
            .unwrap();
        engine
            .answer("source", Reply::new().source(APP_SOURCE))
            .await
            .unwrap();
        eval
    });

    let mut debugger = Debugger::new(config, RecordingEditor::default());
    debugger.execute("s").await.unwrap();
    assert_eq!(debugger.session().unwrap().last_source_line(), "$b = $a + 1;");
    debugger.execute("n").await.unwrap();

    let eval = engine.await.unwrap();
    assert_eq!(eval.data_str().as_deref(), Some("var_export($b, TRUE)"));

    let messages = debugger.editor().messages();
    let shown = messages
        .iter()
        .find(|m| m.starts_with("=== $b ==="))
        .expect("eval result shown");
    assert!(shown.contains(":string = 2"), "{shown}");
    assert_eq!(debugger.session().unwrap().last_source_line(), "echo $b;");
}

#[tokio::test]
async fn failed_opportunistic_eval_does_not_fail_the_step() {
    let (config, addr) = test_config(&[]);
    let engine = tokio::spawn(async move {
        let mut engine = connect(addr).await;
        stop_at(&mut engine, "step_into", 2).await;
        engine
            .answer("step_over", Reply::new().status("break", "ok").location(APP, 3))
            .await
            .unwrap();
        engine
            .answer("eval", Reply::new().error(206, "error evaluating code"))
            .await
            .unwrap();
        engine
            .answer("stack_get", Reply::new().stack_frame(0, APP, 3, "{main}"))
            .await
            .unwrap();
        engine
            .answer("source", Reply::new().source(APP_SOURCE))
            .await
            .unwrap();
    });

    let mut debugger = Debugger::new(config, RecordingEditor::default());
    debugger.execute("s").await.unwrap();
    debugger.execute("n").await.unwrap();
    engine.await.unwrap();

    assert!(debugger.editor().errors().is_empty());
    assert_eq!(debugger.session().unwrap().current_line(), 3);
}

#[tokio::test]
async fn run_to_completion_closes_the_session() {
    let (config, addr) = test_config(&[]);
    let engine = tokio::spawn(async move {
        let mut engine = connect(addr).await;
        stop_at(&mut engine, "step_into", 2).await;
        engine
            .answer("run", Reply::new().status("stopping", "ok"))
            .await
            .unwrap();
        engine.wait_closed().await.unwrap();
    });

    let mut debugger = Debugger::new(config, RecordingEditor::default());
    debugger.execute("s").await.unwrap();
    debugger.execute("c").await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), engine)
        .await
        .expect("connection closed")
        .unwrap();

    assert_eq!(debugger.state(), DebuggerState::Stopped);
    assert!(!debugger.is_started());
    assert_eq!(
        debugger.editor().messages().last().copied(),
        Some("debugger stopped. start to debug again")
    );

    let err = debugger.execute("bl").await.unwrap_err();
    assert!(matches!(err, DebuggerError::NotStarted));
}

#[tokio::test]
async fn run_to_breakpoint_refreshes_location() {
    let (config, addr) = test_config(&[]);
    let engine = tokio::spawn(async move {
        let mut engine = connect(addr).await;
        stop_at(&mut engine, "step_into", 2).await;
        stop_at(&mut engine, "run", 10).await;
    });

    let mut debugger = Debugger::new(config, RecordingEditor::default());
    debugger.execute("s").await.unwrap();
    debugger.execute("c").await.unwrap();
    engine.await.unwrap();

    assert_eq!(debugger.state(), DebuggerState::Broken);
    assert_eq!(debugger.editor().jumps().last(), Some(&("app.php".to_string(), 10)));
    assert_eq!(debugger.editor().messages().last().copied(), Some("run: break ok"));
}

#[tokio::test]
async fn break_here_sets_and_lists_breakpoints() {
    let (config, addr) = test_config(&[]);
    let engine = tokio::spawn(async move {
        let mut engine = connect(addr).await;
        stop_at(&mut engine, "step_into", 10).await;
        let set = engine
            .answer("breakpoint_set", Reply::new().attr("id", "7"))
            .await
            .unwrap();
        engine
            .answer(
                "breakpoint_list",
                Reply::new().breakpoint("7", APP, 10).breakpoint("8", APP, 12),
            )
            .await
            .unwrap();
        set
    });

    let mut debugger = Debugger::new(config, RecordingEditor::default());
    debugger.execute("s").await.unwrap();
    debugger.execute("b").await.unwrap();

    let set = engine.await.unwrap();
    assert_eq!(set.arg('f'), Some(APP));
    assert_eq!(set.arg('n'), Some("10"));

    let messages = debugger.editor().messages();
    let n = messages.len();
    assert_eq!(messages[n - 2], "breakpoint 7 set at app.php:10");
    assert_eq!(messages[n - 1], "breakpoints: app.php:10, app.php:12");
}

#[tokio::test]
async fn raw_command_reply_is_reported() {
    let (config, addr) = test_config(&[]);
    let engine = tokio::spawn(async move {
        let mut engine = connect(addr).await;
        stop_at(&mut engine, "step_into", 2).await;
        engine
            .answer("status", Reply::new().status("break", "ok"))
            .await
            .unwrap();
        engine
            .answer("feature_get", Reply::new().error(3, "invalid or missing options"))
            .await
            .unwrap()
    });

    let mut debugger = Debugger::new(config, RecordingEditor::default());
    debugger.execute("s").await.unwrap();
    debugger.execute("status").await.unwrap();
    let err = debugger.execute("feature_get -n max_depth").await.unwrap_err();

    let feature = engine.await.unwrap();
    assert_eq!(feature.arg('n'), Some("max_depth"));
    assert!(matches!(err, DebuggerError::EngineError { code: 3, .. }), "{err}");
    assert!(debugger.editor().messages().contains(&"status: break ok"));
    assert_eq!(debugger.editor().errors().len(), 1);
    assert_eq!(debugger.state(), DebuggerState::Broken);
}

#[tokio::test]
async fn stop_then_start_again() {
    let (config, addr) = test_config(&[]);
    let engine = tokio::spawn(async move {
        let mut first = connect(addr).await;
        stop_at(&mut first, "step_into", 2).await;
        first.wait_closed().await.unwrap();

        let mut second = connect(addr).await;
        stop_at(&mut second, "step_into", 3).await
    });

    let mut debugger = Debugger::new(config, RecordingEditor::default());
    debugger.execute("start").await.unwrap();
    let err = debugger.execute("start").await.unwrap_err();
    assert!(matches!(err, DebuggerError::AlreadyStarted));

    debugger.execute("stop").await.unwrap();
    assert_eq!(debugger.state(), DebuggerState::Stopped);
    assert!(debugger.editor().messages().contains(&"debugger stopped"));

    debugger.execute("start").await.unwrap();
    let ids = engine.await.unwrap();
    assert_eq!(ids, vec![0, 1, 2]);
    assert_eq!(debugger.session().unwrap().current_line(), 3);
}

#[tokio::test]
async fn accept_timeout_leaves_debugger_not_started() {
    let (mut config, _addr) = test_config(&[]);
    config.accept_timeout_secs = 1;

    let mut debugger = Debugger::new(config, RecordingEditor::default());
    let err = debugger.execute("start").await.unwrap_err();

    assert!(matches!(err, DebuggerError::AcceptTimeout(_)), "{err}");
    assert_eq!(debugger.state(), DebuggerState::NotStarted);
    assert!(!debugger.is_started());
    assert_eq!(debugger.editor().errors().len(), 1);
}

#[tokio::test]
async fn init_command_failure_reaches_the_editor() {
    let (mut config, _addr) = test_config(&[]);
    config.accept_timeout_secs = 1;
    config.init_command = Some("echo no engine here; exit 7".to_string());

    let mut debugger = Debugger::new(config, RecordingEditor::default());
    let err = debugger.execute("start").await.unwrap_err();
    assert!(matches!(err, DebuggerError::AcceptTimeout(_)), "{err}");

    let errors = debugger.editor().errors();
    assert_eq!(errors.len(), 2, "{errors:?}");
    assert!(errors[0].contains("exit 7"), "{}", errors[0]);
    assert!(errors[0].contains("no engine here"), "{}", errors[0]);
}

#[tokio::test]
async fn cancelling_start_interrupts_accept() {
    let (config, _addr) = test_config(&[]);
    let mut debugger = Debugger::new(config, RecordingEditor::default());
    let cancel = debugger.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let started = std::time::Instant::now();
    let err = debugger.execute("start").await.unwrap_err();
    assert!(matches!(err, DebuggerError::IoError(_)), "{err}");
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(debugger.state(), DebuggerState::NotStarted);
}

#[tokio::test]
async fn unknown_editor_input_is_rejected_without_session() {
    let mut debugger = Debugger::new(Config::default(), RecordingEditor::default());
    let err = debugger.execute("   ").await.unwrap_err();
    assert!(matches!(err, DebuggerError::InvalidCommand(_)));
    assert!(matches!(
        debugger.editor().events.as_slice(),
        [EditorEvent::Error(_)]
    ));
}

#[tokio::test]
async fn wrong_source_reply_aborts_the_step_but_not_the_session() {
    let (config, addr) = test_config(&[]);
    let engine = tokio::spawn(async move {
        let mut engine = connect(addr).await;
        stop_at(&mut engine, "step_into", 4).await;
        engine
            .answer("step_over", Reply::new().status("break", "ok").location(APP, 6))
            .await
            .unwrap();
        engine
            .answer("stack_get", Reply::new().stack_frame(0, APP, 6, "{main}"))
            .await
            .unwrap();
        engine
            .answer("source", Reply::new().command("eval"))
            .await
            .unwrap();
        stop_at(&mut engine, "step_over", 12).await
    });

    let mut debugger = Debugger::new(config, RecordingEditor::default());
    debugger.execute("s").await.unwrap();

    let err = debugger.execute("n").await.unwrap_err();
    match &err {
        DebuggerError::ProtocolError { expected, actual } => {
            assert_eq!(expected, "source");
            assert_eq!(actual, "eval");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(debugger.editor().errors(), vec![err.to_string().as_str()]);
    assert_eq!(debugger.state(), DebuggerState::Broken);

    debugger.execute("n").await.unwrap();
    let ids = engine.await.unwrap();
    assert_eq!(ids, vec![6, 7, 8]);
    assert_eq!(debugger.editor().errors().len(), 1);
    assert_eq!(debugger.session().unwrap().current_line(), 12);
}

#[tokio::test]
async fn failed_stack_get_aborts_the_step_before_source() {
    let (config, addr) = test_config(&[]);
    let engine = tokio::spawn(async move {
        let mut engine = connect(addr).await;
        stop_at(&mut engine, "step_into", 4).await;
        engine
            .answer("step_over", Reply::new().status("break", "ok").location(APP, 6))
            .await
            .unwrap();
        engine
            .answer("stack_get", Reply::new().error(5, "command is not available"))
            .await
            .unwrap();
        // the next command must be the following step, not `source`
        stop_at(&mut engine, "step_over", 10).await
    });

    let mut debugger = Debugger::new(config, RecordingEditor::default());
    debugger.execute("s").await.unwrap();

    let err = debugger.execute("n").await.unwrap_err();
    assert!(matches!(err, DebuggerError::EngineError { code: 5, .. }), "{err}");
    let errors = debugger.editor().errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("command is not available"), "{}", errors[0]);
    assert_eq!(debugger.editor().jumps().len(), 1);

    debugger.execute("n").await.unwrap();
    let ids = engine.await.unwrap();
    assert_eq!(ids, vec![5, 6, 7]);
    assert_eq!(
        debugger.editor().jumps().last(),
        Some(&("app.php".to_string(), 10))
    );
}

#[tokio::test]
async fn wrong_stack_get_reply_is_reported() {
    let (config, addr) = test_config(&[]);
    let engine = tokio::spawn(async move {
        let mut engine = connect(addr).await;
        stop_at(&mut engine, "step_into", 4).await;
        engine
            .answer("step_over", Reply::new().status("break", "ok").location(APP, 6))
            .await
            .unwrap();
        engine
            .answer("stack_get", Reply::new().command("source"))
            .await
            .unwrap();
        stop_at(&mut engine, "step_over", 12).await
    });

    let mut debugger = Debugger::new(config, RecordingEditor::default());
    debugger.execute("s").await.unwrap();
    let err = debugger.execute("n").await.unwrap_err();
    assert!(
        matches!(&err, DebuggerError::ProtocolError { expected, .. } if expected == "stack_get"),
        "{err}"
    );
    assert_eq!(debugger.editor().errors().len(), 1);

    debugger.execute("n").await.unwrap();
    engine.await.unwrap();
    assert_eq!(debugger.session().unwrap().current_line(), 12);
}

#[tokio::test]
async fn engine_error_on_source_is_reported() {
    let (config, addr) = test_config(&[]);
    let engine = tokio::spawn(async move {
        let mut engine = connect(addr).await;
        stop_at(&mut engine, "step_into", 4).await;
        engine
            .answer("step_over", Reply::new().status("break", "ok").location(APP, 6))
            .await
            .unwrap();
        engine
            .answer("stack_get", Reply::new().stack_frame(0, APP, 6, "{main}"))
            .await
            .unwrap();
        engine
            .answer("source", Reply::new().error(100, "can not open file"))
            .await
            .unwrap();
        stop_at(&mut engine, "step_over", 12).await
    });

    let mut debugger = Debugger::new(config, RecordingEditor::default());
    debugger.execute("s").await.unwrap();
    let err = debugger.execute("n").await.unwrap_err();
    assert!(matches!(err, DebuggerError::EngineError { code: 100, .. }), "{err}");
    assert_eq!(debugger.editor().errors().len(), 1);

    debugger.execute("n").await.unwrap();
    engine.await.unwrap();
    assert_eq!(debugger.state(), DebuggerState::Broken);
}
