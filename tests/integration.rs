//! End-to-end tests against the in-process mock application
//!
//! Every test drives the real session facade, event pump, and state machines;
//! only the application behind the client trait is scripted. Tests run under a
//! paused clock, so a 60 second timeout costs no wall time.

use canoe_bridge::bridge::{DiagRequestSpec, DiagResponse, ModuleStage, StopReason};
use canoe_bridge::testing::{MockAutomation, ModuleScript};
use canoe_bridge::{Config, Error, Session, VariableValue, Verdict};

/// A mock scripted like a small demo configuration: one environment with two
/// modules, one callable function, and one diagnosable ECU
fn scripted_mock() -> MockAutomation {
    let mut mock = MockAutomation::new();
    mock.add_module("Env", "doors");
    mock.add_module("Env", "smoke");
    mock.script_module(
        "smoke",
        ModuleScript {
            auto_complete: true,
            stop_reason: 0,
            verdict: Verdict::Passed,
            report: Some((true, "smoke.xml".to_string(), "smoke.html".to_string())),
        },
    );
    mock.add_function("PrepareBus");
    mock.add_diag_target("Door");
    mock.script_diag_responses(
        "Door",
        vec![
            DiagResponse {
                sender: "Door".to_string(),
                positive: true,
                response_code: 0x62,
                payload: vec![0x62, 0xF1, 0x90, 0x01],
            },
            DiagResponse {
                sender: "Gateway".to_string(),
                positive: false,
                response_code: 0x7F,
                payload: vec![0x7F, 0x22, 0x31],
            },
        ],
    );
    mock
}

async fn open_session(mock: MockAutomation) -> Session<MockAutomation> {
    let functions = vec!["PrepareBus".to_string()];
    let mut session = Session::connect(mock, Config::default(), functions).unwrap();
    assert!(session.open("demo.cfg").await.unwrap());
    session
}

#[tokio::test(start_paused = true)]
async fn full_lifecycle_runs_clean() {
    let mut session = open_session(scripted_mock()).await;

    assert!(session.state().application.is_open());
    assert_eq!(
        session.state().application.config_full_name(),
        Some("demo.cfg")
    );
    assert!(session.state().modules.contains("smoke"));
    assert!(session.state().modules.contains("doors"));
    assert_eq!(session.diag_targets(), ["Door"]);

    assert!(session.start_measurement().await.unwrap());
    assert!(session.state().measurement.is_started());

    // Resolved at measurement init, so callable now
    assert_eq!(session.call_function("PrepareBus", &[2, 3]).await.unwrap(), 0);
    assert_eq!(session.client().function_calls, vec![(0, vec![2, 3])]);

    let verdict = session.execute_test_module("smoke").await.unwrap();
    assert_eq!(verdict, Verdict::Passed);
    let record = session.state().modules.get("smoke").unwrap();
    assert_eq!(record.stage, ModuleStage::Stopped);
    assert_eq!(record.stop_reason, Some(StopReason::Completed));
    let report = record.report.as_ref().unwrap();
    assert!(report.success);
    assert_eq!(report.generated_path, "smoke.html");

    assert!(session
        .set_variable("Env::speed", VariableValue::Int(42))
        .await
        .unwrap());
    assert_eq!(
        session.last_confirmed_value("Env::speed"),
        Some(&VariableValue::Int(42))
    );
    assert_eq!(
        session.read_variable("Env::speed").await.unwrap(),
        VariableValue::Int(42)
    );

    assert!(session.stop_measurement().await.unwrap());
    assert!(session.state().measurement.is_stopped());
    assert!(session.quit().await.unwrap());
    assert!(session.state().application.has_quit());
}

#[tokio::test(start_paused = true)]
async fn addressed_diag_request_keeps_only_the_addressed_ecu() {
    let mut session = open_session(scripted_mock()).await;

    let payload = session
        .send_diag_request("Door", DiagRequestSpec::Stream(vec![0x22, 0xF1, 0x90]), None)
        .await
        .unwrap();
    assert_eq!(payload, vec![0x62, 0xF1, 0x90, 0x01]);
}

#[tokio::test(start_paused = true)]
async fn mapped_diag_request_keys_responses_by_sender() {
    let mut session = open_session(scripted_mock()).await;

    let responses = session
        .send_diag_request_mapped(
            "Door",
            DiagRequestSpec::Qualifier("ReadVin".to_string()),
            None,
        )
        .await
        .unwrap();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses["Door"], vec![0x62, 0xF1, 0x90, 0x01]);
    assert_eq!(responses["Gateway"], vec![0x7F, 0x22, 0x31]);
}

#[tokio::test(start_paused = true)]
async fn diag_request_to_unknown_ecu_yields_nothing() {
    let mut session = open_session(scripted_mock()).await;

    let payload = session
        .send_diag_request("Engine", DiagRequestSpec::Stream(vec![0x10, 0x03]), None)
        .await
        .unwrap();
    assert!(payload.is_empty());
}

#[tokio::test(start_paused = true)]
async fn timeouts_are_reported_not_fatal() {
    let mut mock = scripted_mock();
    mock.mute();
    let mut session = Session::connect(mock, Config::default(), Vec::new()).unwrap();

    // Commands go through but no confirmation ever arrives
    assert!(!session.open("demo.cfg").await.unwrap());
    assert!(!session.start_measurement().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn rejected_command_is_a_typed_error() {
    let mut mock = scripted_mock();
    mock.fail_command("start");
    let mut session = Session::connect(mock, Config::default(), Vec::new()).unwrap();
    assert!(session.open("demo.cfg").await.unwrap());

    let err = session.start_measurement().await.unwrap_err();
    assert!(matches!(err, Error::CommandFailed { .. }));
}

#[tokio::test(start_paused = true)]
async fn unknown_module_is_a_typed_error() {
    let mut session = open_session(scripted_mock()).await;

    let err = session.start_test_module("nope").await.unwrap_err();
    assert!(matches!(err, Error::ModuleNotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn function_call_before_measurement_start_is_rejected() {
    let mut session = open_session(scripted_mock()).await;

    let err = session.call_function("PrepareBus", &[]).await.unwrap_err();
    assert!(matches!(err, Error::FunctionNotResolved(_)));
}

#[tokio::test(start_paused = true)]
async fn redundant_start_and_stop_do_not_reissue_the_command() {
    let mut session = open_session(scripted_mock()).await;

    assert!(session.start_measurement().await.unwrap());
    assert!(session.start_measurement().await.unwrap());
    assert!(session.state().measurement.is_started());
    assert_eq!(session.client().start_commands, 1);

    assert!(session.stop_measurement().await.unwrap());
    assert!(session.stop_measurement().await.unwrap());
    assert_eq!(session.client().stop_commands, 1);
}

#[tokio::test(start_paused = true)]
async fn animated_start_sets_the_delay_before_starting() {
    let mut session = open_session(scripted_mock()).await;

    assert!(session.start_measurement_animated(500).await.unwrap());
    assert!(session.state().measurement.is_started());
    assert_eq!(session.client().animation_delay, Some(500));
    assert_eq!(session.client().start_commands, 1);
}

#[tokio::test(start_paused = true)]
async fn measurement_index_round_trips_through_the_application() {
    let mut session = open_session(scripted_mock()).await;

    assert_eq!(session.measurement_index().await.unwrap(), 0);
    assert_eq!(session.set_measurement_index(3).await.unwrap(), 3);
    assert_eq!(session.measurement_index().await.unwrap(), 3);
}

#[tokio::test(start_paused = true)]
async fn manual_module_control_follows_the_stage_machine() {
    let mut mock = scripted_mock();
    mock.script_module(
        "doors",
        ModuleScript {
            auto_complete: false,
            stop_reason: 0,
            verdict: Verdict::NotAvailable,
            report: None,
        },
    );
    let mut session = open_session(mock).await;

    // Control commands on an idle module are refused, not fatal
    assert!(!session.pause_test_module("doors").await.unwrap());

    assert!(session.start_test_module("doors").await.unwrap());
    assert!(session.pause_test_module("doors").await.unwrap());
    assert_eq!(
        session.state().modules.get("doors").unwrap().stage,
        ModuleStage::Paused
    );
    assert!(session.resume_test_module("doors").await.unwrap());
    assert!(session.stop_test_module("doors").await.unwrap());

    let record = session.state().modules.get("doors").unwrap();
    assert_eq!(record.stage, ModuleStage::Stopped);
    assert_eq!(record.stop_reason, Some(StopReason::UserAborted));
}

#[tokio::test(start_paused = true)]
async fn environment_execution_runs_modules_in_name_order() {
    let mut mock = scripted_mock();
    mock.script_module(
        "doors",
        ModuleScript {
            auto_complete: true,
            stop_reason: 0,
            verdict: Verdict::Failed,
            report: None,
        },
    );
    let mut session = open_session(mock).await;

    let results = session.execute_all_in_environment("Env").await.unwrap();
    assert_eq!(
        results,
        vec![
            ("doors".to_string(), Verdict::Failed),
            ("smoke".to_string(), Verdict::Passed),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn waiting_on_an_idle_module_warns_and_yields_no_verdict() {
    let mut session = open_session(scripted_mock()).await;

    let verdict = session.wait_for_module_completion("doors").await.unwrap();
    assert_eq!(verdict, Verdict::NotAvailable);
}
