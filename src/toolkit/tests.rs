// src/toolkit/tests.rs
//! End-to-end tests: a headless host loop driving the toolkit in every
//! pump/thread mode combination.

use super::*;
use crate::config::{PumpConfig, ThreadingConfig};
use crate::pump::HeadlessQueue;
use crate::threading::StartupError;
use crate::webview::test_support::*;
use crate::webview::{ViewEvent, ViewOp, ViewState};
use std::time::{Duration, Instant};
use test_log::test;

const DEADLINE: Duration = Duration::from_secs(5);

fn config(pump_mode: PumpMode, thread_mode: ThreadMode) -> ToolkitConfig {
    ToolkitConfig {
        pump_mode,
        thread_mode,
        pump: PumpConfig {
            time_slice_ms: 20,
            ..PumpConfig::default()
        },
        threading: ThreadingConfig {
            startup_timeout_ms: 5_000,
            ..ThreadingConfig::default()
        },
        ..ToolkitConfig::default()
    }
}

fn start(pump_mode: PumpMode, thread_mode: ThreadMode) -> (Toolkit, Arc<HeadlessQueue>, EngineProbe) {
    let queue = Arc::new(HeadlessQueue::new());
    let probe = EngineProbe::new();
    let parts = EmbedderParts {
        native_queue: queue.clone(),
        engine: Box::new(RecordingEngine::new(probe.clone())),
        app_work: None,
    };
    let toolkit = Toolkit::new(&config(pump_mode, thread_mode), parts).unwrap();
    (toolkit, queue, probe)
}

/// Dispatches one native message the way the host's loop would.
fn dispatch(toolkit: &Toolkit, msg: &NativeMessage) {
    match toolkit.pump_mode() {
        PumpMode::Manual => {
            toolkit.pre_handle_message(msg);
            toolkit.post_handle_message(msg);
        }
        PumpMode::Automatic => {
            toolkit.window_proc(msg);
        }
    }
}

/// Runs the host loop until `done` holds.
fn run_until(toolkit: &Toolkit, queue: &HeadlessQueue, mut done: impl FnMut() -> bool) {
    let started = Instant::now();
    while !done() {
        assert!(started.elapsed() < DEADLINE, "host loop timed out");
        if let Some(msg) = queue.get_message(Duration::from_millis(10)) {
            dispatch(toolkit, &msg);
        }
    }
}

fn exercise_view_lifecycle(pump_mode: PumpMode, thread_mode: ThreadMode) {
    let (toolkit, queue, probe) = start(pump_mode, thread_mode);
    let (delegate, log) = RecordingDelegate::new();
    let view = toolkit.create_web_view(toolkit.default_create_params(), Some(Box::new(delegate)));
    view.load_url("https://example.com/");
    run_until(&toolkit, &queue, || view.state() == ViewState::Live);

    run_until(&toolkit, &queue, || !probe.ops_for(view.routing_id()).is_empty());
    assert_eq!(probe.ops_for(view.routing_id()), vec![ViewOp::LoadUrl("https://example.com/".into())]);

    probe.notify(view.routing_id(), ViewEvent::DidFinishLoad("https://example.com/".into()));
    run_until(&toolkit, &queue, || !log.borrow().is_empty());
    assert_eq!(
        log.borrow().as_slice(),
        &[(view.routing_id(), Callback::FinishLoad("https://example.com/".into()))]
    );

    toolkit.shutdown();
    assert!(probe.is_shut_down());
    assert_eq!(probe.calls_for(view.routing_id()).last(), Some(&ImplCall::Destroy(view.routing_id())));
    assert_eq!(view.state(), ViewState::Destroyed);
}

#[test]
fn it_should_run_views_on_the_application_thread_with_a_manual_pump() {
    exercise_view_lifecycle(PumpMode::Manual, ThreadMode::Original);
}

#[test]
fn it_should_run_views_on_the_application_thread_with_an_automatic_pump() {
    exercise_view_lifecycle(PumpMode::Automatic, ThreadMode::Original);
}

#[test]
fn it_should_run_views_on_browser_main_with_a_manual_pump() {
    exercise_view_lifecycle(PumpMode::Manual, ThreadMode::RendererMain);
}

#[test]
fn it_should_run_views_on_browser_main_with_an_automatic_pump() {
    exercise_view_lifecycle(PumpMode::Automatic, ThreadMode::RendererMain);
}

#[test]
fn it_should_move_views_synchronously_in_original_mode() {
    let (toolkit, queue, probe) = start(PumpMode::Manual, ThreadMode::Original);
    let view = toolkit.create_web_view(WebViewCreateParams::default(), None);
    let rect = crate::geometry::Rect::new(0, 0, 320, 240);
    view.move_to(rect);
    assert_eq!(probe.moves_for(view.routing_id()), vec![rect]);
    run_until(&toolkit, &queue, || view.state() == ViewState::Live);
    toolkit.shutdown();
}

#[test]
fn it_should_sync_with_browser_main() {
    let (toolkit, _queue, probe) = start(PumpMode::Manual, ThreadMode::RendererMain);
    let view = toolkit.create_web_view(WebViewCreateParams::default(), None);
    view.go_forward();
    view.stop();
    toolkit.sync().unwrap();
    assert_eq!(probe.ops_for(view.routing_id()), vec![ViewOp::GoForward, ViewOp::Stop]);
    toolkit.shutdown();
}

#[test]
fn it_should_fail_to_start_when_browser_main_is_not_ready_in_time() {
    let mut config = config(PumpMode::Manual, ThreadMode::RendererMain);
    config.threading.startup_timeout_ms = 20;
    let parts = EmbedderParts {
        native_queue: Arc::new(HeadlessQueue::new()),
        engine: Box::new(RecordingEngine::new(EngineProbe::new()).with_start_delay(Duration::from_millis(300))),
        app_work: None,
    };
    let err = match Toolkit::new(&config, parts) {
        Ok(_) => panic!("startup should have timed out"),
        Err(e) => e,
    };
    assert!(matches!(
        err.downcast_ref::<StartupError>(),
        Some(StartupError::BrowserMainTimeout(_))
    ));
}

#[test]
fn it_should_fail_to_start_when_the_engine_refuses_in_original_mode() {
    let parts = EmbedderParts {
        native_queue: Arc::new(HeadlessQueue::new()),
        engine: Box::new(RecordingEngine::new(EngineProbe::new()).failing_start()),
        app_work: None,
    };
    let err = match Toolkit::new(&config(PumpMode::Manual, ThreadMode::Original), parts) {
        Ok(_) => panic!("startup should have failed"),
        Err(e) => e,
    };
    assert!(format!("{:#}", err).contains("refused to start"));
}

#[test]
fn it_should_release_every_view_on_drop() {
    let (toolkit, queue, probe) = start(PumpMode::Manual, ThreadMode::RendererMain);
    let a = toolkit.create_web_view(WebViewCreateParams::default(), None);
    let b = toolkit.create_web_view(WebViewCreateParams::default(), None);
    run_until(&toolkit, &queue, || a.state() == ViewState::Live && b.state() == ViewState::Live);
    assert_eq!(toolkit.view_count(), 2);

    drop(toolkit);
    assert!(probe.is_shut_down());
    assert_eq!(a.state(), ViewState::Destroyed);
    assert_eq!(b.state(), ViewState::Destroyed);
}

#[test]
fn it_should_run_embedder_work_from_the_pump() {
    struct Countdown(Rc<RefCell<u32>>);
    impl WorkSource for Countdown {
        fn do_work(&mut self) -> bool {
            let mut left = self.0.borrow_mut();
            *left = left.saturating_sub(1);
            *left > 0
        }
        fn do_delayed_work(&mut self, next: &mut Option<std::time::Instant>) -> bool {
            *next = None;
            false
        }
        fn do_idle_work(&mut self) -> bool {
            false
        }
    }

    let queue = Arc::new(HeadlessQueue::new());
    let left = Rc::new(RefCell::new(3));
    let parts = EmbedderParts {
        native_queue: queue.clone(),
        engine: Box::new(RecordingEngine::new(EngineProbe::new())),
        app_work: Some(Box::new(Countdown(left.clone()))),
    };
    let toolkit = Toolkit::new(&config(PumpMode::Manual, ThreadMode::Original), parts).unwrap();
    toolkit.pump().schedule_work();
    run_until(&toolkit, &queue, || *left.borrow() == 0);
    toolkit.shutdown();
}
