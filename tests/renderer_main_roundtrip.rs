//! Round trips through a real browser-main thread, driven by a headless host
//! loop on the test thread.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use test_log::test;
use webview_bridge::config::{PumpMode, ThreadMode, ToolkitConfig};
use webview_bridge::geometry::{Rect, Size};
use webview_bridge::pump::{HeadlessQueue, NativeMessage};
use webview_bridge::webview::{
    ImplEvent, ImplEventSink, RoutingId, ViewEngine, ViewEvent, ViewOp, ViewState, WebViewCreateParams,
    WebViewDelegate, WebViewImpl, WebViewProxy,
};
use webview_bridge::{EmbedderParts, Toolkit};

const DEADLINE: Duration = Duration::from_secs(5);

type MoveLog = Arc<Mutex<Vec<(RoutingId, Rect)>>>;

/// Views finish loads right away, and "render" a frame of every new size so a
/// deferred move completes one round trip later.
struct RenderingEngine {
    moves: MoveLog,
}

impl ViewEngine for RenderingEngine {
    fn create_view(&mut self, _: RoutingId, _: &WebViewCreateParams) -> anyhow::Result<Box<dyn WebViewImpl>> {
        Ok(Box::new(RenderingView {
            sink: None,
            moves: self.moves.clone(),
            frame: Size::default(),
        }))
    }
}

struct RenderingView {
    sink: Option<ImplEventSink>,
    moves: MoveLog,
    frame: Size,
}

impl RenderingView {
    fn send(&self, event: ImplEvent) {
        if let Some(sink) = &self.sink {
            sink.send(event).unwrap();
        }
    }
}

impl WebViewImpl for RenderingView {
    fn attach(&mut self, sink: ImplEventSink) {
        self.sink = Some(sink);
    }

    fn perform(&mut self, op: ViewOp) {
        if let ViewOp::LoadUrl(url) = op {
            self.send(ImplEvent::Notify(ViewEvent::DidFinishLoad(url.clone())));
            self.send(ImplEvent::Notify(ViewEvent::UpdateTargetUrl(url)));
        }
    }

    fn move_to(&mut self, rect: Rect) {
        let routing_id = self.sink.as_ref().map_or(RoutingId(0), |s| s.routing_id());
        self.moves.lock().unwrap().push((routing_id, rect));
        self.frame = rect.size();
    }

    fn renderer_matches_size(&self, size: Size) -> bool {
        if size == self.frame {
            return true;
        }
        // Not yet: produce the frame asynchronously.
        self.send(ImplEvent::DidUpdateBackingStore(size));
        false
    }
}

#[derive(Default)]
struct Log {
    loads: Vec<String>,
    target_urls: Vec<String>,
}

struct Delegate {
    log: Rc<RefCell<Log>>,
    destroy_after_load: bool,
}

impl WebViewDelegate for Delegate {
    fn did_finish_load(&mut self, source: &WebViewProxy, url: &str) {
        self.log.borrow_mut().loads.push(url.to_string());
        if self.destroy_after_load {
            source.destroy();
        }
    }

    fn update_target_url(&mut self, _source: &WebViewProxy, url: &str) {
        self.log.borrow_mut().target_urls.push(url.to_string());
    }
}

struct Shell {
    toolkit: Toolkit,
    queue: Arc<HeadlessQueue>,
    moves: MoveLog,
}

impl Shell {
    fn start(pump_mode: PumpMode) -> Self {
        let config = ToolkitConfig {
            pump_mode,
            thread_mode: ThreadMode::RendererMain,
            ..ToolkitConfig::default()
        };
        let queue = Arc::new(HeadlessQueue::new());
        let moves = MoveLog::default();
        let parts = EmbedderParts {
            native_queue: queue.clone(),
            engine: Box::new(RenderingEngine { moves: moves.clone() }),
            app_work: None,
        };
        let toolkit = Toolkit::new(&config, parts).unwrap();
        Self { toolkit, queue, moves }
    }

    fn view(&self, destroy_after_load: bool) -> (WebViewProxy, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let delegate = Delegate {
            log: log.clone(),
            destroy_after_load,
        };
        let view = self
            .toolkit
            .create_web_view(WebViewCreateParams::default(), Some(Box::new(delegate)));
        (view, log)
    }

    fn dispatch(&self, msg: &NativeMessage) {
        match self.toolkit.pump_mode() {
            PumpMode::Manual => {
                self.toolkit.pre_handle_message(msg);
                self.toolkit.post_handle_message(msg);
            }
            PumpMode::Automatic => {
                self.toolkit.window_proc(msg);
            }
        }
    }

    fn run_until(&self, mut done: impl FnMut() -> bool) {
        let started = Instant::now();
        while !done() {
            assert!(started.elapsed() < DEADLINE, "host loop timed out");
            if let Some(msg) = self.queue.get_message(Duration::from_millis(10)) {
                self.dispatch(&msg);
            }
        }
    }

    /// Pumps until browser-main and the application queue are both quiet.
    fn settle(&self) {
        for _ in 0..3 {
            self.toolkit.sync().unwrap();
            while let Some(msg) = self.queue.try_get_message() {
                self.dispatch(&msg);
            }
        }
    }

    fn moves_for(&self, routing_id: RoutingId) -> Vec<Rect> {
        self.moves
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == routing_id)
            .map(|(_, rect)| *rect)
            .collect()
    }
}

#[test]
fn it_should_deliver_host_events_in_order() {
    let shell = Shell::start(PumpMode::Manual);
    let (view, log) = shell.view(false);
    view.load_url("https://one.example/");
    view.load_url("https://two.example/");
    shell.run_until(|| log.borrow().loads.len() == 2);

    assert_eq!(log.borrow().loads, vec!["https://one.example/", "https://two.example/"]);
    shell.run_until(|| log.borrow().target_urls.len() == 2);
    assert_eq!(log.borrow().target_urls, vec!["https://one.example/", "https://two.example/"]);
    shell.toolkit.shutdown();
}

#[test]
fn it_should_end_at_the_latest_geometry_after_a_burst_of_moves() {
    let shell = Shell::start(PumpMode::Automatic);
    let (view, _log) = shell.view(false);
    shell.run_until(|| view.state() == ViewState::Live);

    let burst: Vec<Rect> = (1..=20).map(|i| Rect::new(i, i, 100 + i * 10, 80 + i * 5)).collect();
    for rect in &burst {
        view.move_to(*rect);
    }
    let last = *burst.last().unwrap();
    shell.run_until(|| shell.moves_for(view.routing_id()).last() == Some(&last));
    shell.settle();

    let moves = shell.moves_for(view.routing_id());
    assert_eq!(moves.last(), Some(&last));
    assert!(moves.len() < burst.len(), "moves were not coalesced: {:?}", moves);
    shell.toolkit.shutdown();
}

#[test]
fn it_should_not_call_a_delegate_after_its_view_is_destroyed() {
    let shell = Shell::start(PumpMode::Manual);
    let (view, log) = shell.view(true);
    view.load_url("https://gone.example/");
    shell.run_until(|| view.state() == ViewState::Destroyed);
    shell.settle();

    let log = log.borrow();
    assert_eq!(log.loads, vec!["https://gone.example/"]);
    // Events still in flight when the delegate destroyed the view are dropped.
    assert!(log.target_urls.is_empty());
    assert_eq!(shell.toolkit.view_count(), 0);
}

#[test]
fn it_should_keep_views_independent() {
    let shell = Shell::start(PumpMode::Manual);
    let (first, first_log) = shell.view(false);
    let (second, second_log) = shell.view(true);
    first.load_url("https://first.example/");
    second.load_url("https://second.example/");
    shell.run_until(|| second.state() == ViewState::Destroyed && first_log.borrow().target_urls.len() == 1);

    assert_eq!(first.state(), ViewState::Live);
    assert_eq!(first_log.borrow().loads, vec!["https://first.example/"]);
    assert_eq!(second_log.borrow().loads, vec!["https://second.example/"]);
    assert!(second_log.borrow().target_urls.is_empty());
    shell.toolkit.shutdown();
}
