mod common;

use common::{device, Call, RecordingNotifier, RecordingTransport};
use roku_remote::error::{MacroError, TransportError};
use roku_remote::macro_store::MacroStore;
use roku_remote::notify::NotifyLevel;
use roku_remote::runner::{MacroRunner, RunnerState};
use roku_remote::step::Step;
use roku_remote::storage::MemoryStorage;
use std::sync::Arc;
use std::time::Duration;

type TestRunner = MacroRunner<Arc<RecordingTransport>, Arc<RecordingNotifier>>;

fn setup() -> (TestRunner, Arc<RecordingTransport>, Arc<RecordingNotifier>) {
    let transport = Arc::new(RecordingTransport::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let runner = MacroRunner::new(transport.clone(), notifier.clone());
    (runner, transport, notifier)
}

fn key(k: &str) -> Step {
    Step::KeyPress { key: k.to_string() }
}

fn launch(app_id: &str, label: &str) -> Step {
    Step::Launch {
        app_id: app_id.to_string(),
        params: String::new(),
        label: label.to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn bedtime_macro_reports_progress_and_ends_idle() {
    let (runner, transport, notifier) = setup();
    let mut store = MacroStore::open(MemoryStorage::new());
    let bedtime = store
        .create(
            "Bedtime",
            vec![key("Home"), Step::Delay { duration_ms: 2000 }, launch("12", "Netflix")],
            true,
        )
        .unwrap()
        .value;

    let report = runner.run(&store, Some(&device()), &bedtime.id).await.unwrap();

    assert_eq!(report.steps_executed, 3);
    assert_eq!(
        notifier.texts(),
        vec![
            "Running macro \"Bedtime\"...",
            "Macro launching Netflix...",
            "Macro \"Bedtime\" finished!",
        ]
    );
    assert_eq!(
        notifier.last().map(|(level, _)| level),
        Some(NotifyLevel::Success)
    );
    assert_eq!(
        transport.calls(),
        vec![
            Call::Key("Home".into()),
            Call::Launch {
                app_id: "12".into(),
                params: String::new(),
            },
        ]
    );
    assert_eq!(runner.state(), RunnerState::Idle);
    assert_eq!(runner.status().last_outcome, Some(RunnerState::Completed));
}

#[tokio::test(start_paused = true)]
async fn settle_delays_follow_each_command() {
    let (runner, transport, _notifier) = setup();
    let mut store = MacroStore::open(MemoryStorage::new());
    let m = store
        .create(
            "Timed",
            vec![key("Home"), launch("12", ""), key("Select"), Step::Delay { duration_ms: 250 }],
            false,
        )
        .unwrap()
        .value;

    let start = tokio::time::Instant::now();
    runner.run(&store, Some(&device()), &m.id).await.unwrap();

    let offsets: Vec<Duration> = transport
        .timed_calls()
        .into_iter()
        .map(|(_, at)| at - start)
        .collect();
    assert_eq!(
        offsets,
        vec![
            Duration::ZERO,
            Duration::from_millis(300),
            Duration::from_millis(1800),
        ]
    );
    // 300 + 1500 + 300 + 250
    assert_eq!(start.elapsed(), Duration::from_millis(2350));
}

#[tokio::test(start_paused = true)]
async fn second_run_is_rejected_while_first_is_in_flight() {
    let (runner, transport, notifier) = setup();
    let mut store = MacroStore::open(MemoryStorage::new());
    let a = store
        .create("A", vec![key("Up"), Step::Delay { duration_ms: 1000 }, key("Down")], false)
        .unwrap()
        .value;
    let b = store.create("B", vec![key("Left")], false).unwrap().value;

    let dev = device();
    let (first, second) = tokio::join!(runner.run(&store, Some(&dev), &a.id), async {
        tokio::task::yield_now().await;
        runner.run(&store, Some(&dev), &b.id).await
    });

    assert!(first.is_ok());
    assert_eq!(second.unwrap_err(), MacroError::AlreadyRunning);
    assert!(!transport.calls().contains(&Call::Key("Left".into())));
    assert!(notifier
        .messages()
        .contains(&(NotifyLevel::Error, "A macro is already running.".to_string())));
    assert_eq!(runner.state(), RunnerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn transport_failure_aborts_and_releases_the_runner() {
    let (runner, transport, notifier) = setup();
    transport.fail_on_key("Select");
    let mut store = MacroStore::open(MemoryStorage::new());
    let broken = store
        .create("Broken", vec![key("Home"), key("Select"), key("Down")], false)
        .unwrap()
        .value;
    let other = store.create("Other", vec![key("Back")], false).unwrap().value;

    let err = runner
        .run(&store, Some(&device()), &broken.id)
        .await
        .unwrap_err();

    assert_eq!(err, MacroError::Transport(TransportError::Status(500)));
    assert_eq!(
        transport.calls(),
        vec![Call::Key("Home".into()), Call::Key("Select".into())]
    );
    assert_eq!(
        notifier.last(),
        Some((NotifyLevel::Error, "Macro stopped: HTTP 500".to_string()))
    );
    assert_eq!(runner.state(), RunnerState::Idle);
    let status = runner.status();
    assert_eq!(status.last_outcome, Some(RunnerState::Failed));
    assert_eq!(status.last_error.as_deref(), Some("HTTP 500"));

    runner.run(&store, Some(&device()), &other.id).await.unwrap();
    assert_eq!(transport.calls().last(), Some(&Call::Key("Back".into())));
}

#[tokio::test(start_paused = true)]
async fn failed_launch_skips_the_remaining_steps() {
    let (runner, transport, notifier) = setup();
    transport.fail_on_launch("12");
    let mut store = MacroStore::open(MemoryStorage::new());
    let m = store
        .create(
            "Netflix",
            vec![key("Home"), launch("12", "Netflix"), key("Select")],
            false,
        )
        .unwrap()
        .value;

    let start = tokio::time::Instant::now();
    let err = runner.run(&store, Some(&device()), &m.id).await.unwrap_err();

    assert_eq!(err, MacroError::Transport(TransportError::Status(500)));
    assert_eq!(
        transport.calls(),
        vec![
            Call::Key("Home".into()),
            Call::Launch {
                app_id: "12".into(),
                params: String::new(),
            },
        ]
    );
    // no launch settle after the failure
    assert_eq!(start.elapsed(), Duration::from_millis(300));
    assert!(notifier
        .texts()
        .contains(&"Macro launching Netflix...".to_string()));
    assert_eq!(
        notifier.last(),
        Some((NotifyLevel::Error, "Macro stopped: HTTP 500".to_string()))
    );
    assert_eq!(runner.state(), RunnerState::Idle);
    assert_eq!(runner.status().last_outcome, Some(RunnerState::Failed));
}

#[tokio::test(start_paused = true)]
async fn unknown_macro_and_missing_device_leave_runner_idle() {
    let (runner, transport, notifier) = setup();
    let mut store = MacroStore::open(MemoryStorage::new());
    let m = store.create("M", vec![key("Home")], false).unwrap().value;

    let missing = runner.run(&store, Some(&device()), "macro-404").await;
    assert_eq!(missing.unwrap_err(), MacroError::NotFound("macro-404".into()));
    assert_eq!(notifier.last(), Some((NotifyLevel::Error, "Macro not found.".to_string())));
    assert_eq!(runner.state(), RunnerState::Idle);

    let no_device = runner.run(&store, None, &m.id).await;
    assert_eq!(no_device.unwrap_err(), MacroError::NoDeviceConfigured);
    assert_eq!(
        notifier.last(),
        Some((
            NotifyLevel::Error,
            "Enter the Roku IP address in settings first.".to_string()
        ))
    );
    assert_eq!(runner.state(), RunnerState::Idle);
    assert!(transport.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn status_tracks_the_step_in_flight() {
    let (runner, _transport, _notifier) = setup();
    let mut store = MacroStore::open(MemoryStorage::new());
    let m = store
        .create("Slow", vec![key("Home"), Step::Delay { duration_ms: 5000 }], false)
        .unwrap()
        .value;

    let dev = device();
    let run = runner.run(&store, Some(&dev), &m.id);
    tokio::pin!(run);
    let observed = tokio::select! {
        _ = &mut run => None,
        _ = tokio::time::sleep(Duration::from_millis(1000)) => Some(runner.status()),
    };
    let observed = observed.expect("run should still be in its delay");
    assert_eq!(observed.state, RunnerState::Running);
    assert_eq!(observed.macro_name.as_deref(), Some("Slow"));
    assert_eq!(observed.current_step, 2);
    assert_eq!(observed.progress(), 100.0);

    run.await.unwrap();
    assert_eq!(runner.state(), RunnerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn dropping_a_run_midway_frees_the_runner() {
    let (runner, _transport, _notifier) = setup();
    let mut store = MacroStore::open(MemoryStorage::new());
    let m = store
        .create("Long", vec![Step::Delay { duration_ms: 60_000 }], false)
        .unwrap()
        .value;

    let dev = device();
    let timed_out = tokio::time::timeout(
        Duration::from_millis(10),
        runner.run(&store, Some(&dev), &m.id),
    )
    .await;
    assert!(timed_out.is_err());

    assert_eq!(runner.state(), RunnerState::Idle);
    assert_eq!(runner.status().last_outcome, Some(RunnerState::Failed));
}
