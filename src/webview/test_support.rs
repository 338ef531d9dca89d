// src/webview/test_support.rs
//! Recording engine and delegate shared by the crate's tests.

use super::engine::{ImplEventSink, ViewEngine, WebViewImpl};
use super::messages::{ImplEvent, ViewEvent, ViewOp};
use super::proxy::{WebViewDelegate, WebViewProxy};
use super::types::*;
use crate::geometry::{Point, Rect, Size};
use anyhow::{bail, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What an implementation was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum ImplCall {
    Created(RoutingId),
    Op(RoutingId, ViewOp),
    Move(RoutingId, Rect),
    Destroy(RoutingId),
}

#[derive(Default)]
struct ProbeState {
    calls: Mutex<Vec<ImplCall>>,
    sinks: Mutex<HashMap<RoutingId, ImplEventSink>>,
    renderer_matches: AtomicBool,
    fail_create: AtomicBool,
    shut_down: AtomicBool,
}

/// Test-side view of everything a [`RecordingEngine`] did. Cloneable and
/// `Send`, so it can watch an engine living on another thread.
#[derive(Clone, Default)]
pub struct EngineProbe {
    state: Arc<ProbeState>,
}

impl EngineProbe {
    pub fn new() -> Self {
        let probe = Self::default();
        probe.set_renderer_matches(true);
        probe
    }

    pub fn calls(&self) -> Vec<ImplCall> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, routing_id: RoutingId) -> Vec<ImplCall> {
        self.calls()
            .into_iter()
            .filter(|call| match call {
                ImplCall::Created(id) | ImplCall::Destroy(id) => *id == routing_id,
                ImplCall::Op(id, _) | ImplCall::Move(id, _) => *id == routing_id,
            })
            .collect()
    }

    pub fn ops_for(&self, routing_id: RoutingId) -> Vec<ViewOp> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ImplCall::Op(id, op) if id == routing_id => Some(op),
                _ => None,
            })
            .collect()
    }

    pub fn moves_for(&self, routing_id: RoutingId) -> Vec<Rect> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ImplCall::Move(id, rect) if id == routing_id => Some(rect),
                _ => None,
            })
            .collect()
    }

    pub fn set_renderer_matches(&self, matches: bool) {
        self.state.renderer_matches.store(matches, Ordering::SeqCst);
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.state.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.shut_down.load(Ordering::SeqCst)
    }

    /// Reports `event` from the implementation of `routing_id`.
    pub fn emit(&self, routing_id: RoutingId, event: ImplEvent) {
        let sink = self.state.sinks.lock().unwrap().get(&routing_id).cloned();
        sink.expect("view was never attached")
            .send(event)
            .expect("host queue is gone");
    }

    pub fn notify(&self, routing_id: RoutingId, event: ViewEvent) {
        self.emit(routing_id, ImplEvent::Notify(event));
    }

    /// An implementation the engine "opened" on its own, for
    /// `ImplEvent::DidCreateNewView`.
    pub fn make_view(&self) -> Box<dyn WebViewImpl> {
        Box::new(RecordingView {
            routing_id: None,
            probe: self.clone(),
        })
    }

    fn record(&self, call: ImplCall) {
        self.state.calls.lock().unwrap().push(call);
    }
}

pub struct RecordingEngine {
    probe: EngineProbe,
    start_delay: Option<Duration>,
    fail_start: bool,
}

impl RecordingEngine {
    pub fn new(probe: EngineProbe) -> Self {
        Self {
            probe,
            start_delay: None,
            fail_start: false,
        }
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = Some(delay);
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }
}

impl ViewEngine for RecordingEngine {
    fn start(&mut self) -> Result<()> {
        if let Some(delay) = self.start_delay {
            std::thread::sleep(delay);
        }
        if self.fail_start {
            bail!("renderer host refused to start");
        }
        Ok(())
    }

    fn create_view(&mut self, routing_id: RoutingId, _params: &WebViewCreateParams) -> Result<Box<dyn WebViewImpl>> {
        if self.probe.state.fail_create.load(Ordering::SeqCst) {
            bail!("no renderer available");
        }
        self.probe.record(ImplCall::Created(routing_id));
        Ok(self.probe.make_view())
    }

    fn shutdown(&mut self) {
        self.probe.state.shut_down.store(true, Ordering::SeqCst);
    }
}

struct RecordingView {
    routing_id: Option<RoutingId>,
    probe: EngineProbe,
}

impl RecordingView {
    fn id(&self) -> RoutingId {
        self.routing_id.unwrap_or(RoutingId(0))
    }
}

impl WebViewImpl for RecordingView {
    fn attach(&mut self, sink: ImplEventSink) {
        self.routing_id = Some(sink.routing_id());
        self.probe.state.sinks.lock().unwrap().insert(sink.routing_id(), sink);
    }

    fn perform(&mut self, op: ViewOp) {
        self.probe.record(ImplCall::Op(self.id(), op));
    }

    fn move_to(&mut self, rect: Rect) {
        self.probe.record(ImplCall::Move(self.id(), rect));
    }

    fn renderer_matches_size(&self, _size: Size) -> bool {
        self.probe.state.renderer_matches.load(Ordering::SeqCst)
    }

    fn destroy(&mut self) {
        let id = self.id();
        self.probe.state.sinks.lock().unwrap().remove(&id);
        self.probe.record(ImplCall::Destroy(id));
    }
}

/// A delegate callback as seen by the application.
#[derive(Debug, Clone, PartialEq)]
pub enum Callback {
    TargetUrl(String),
    NavigationState(NavigationState),
    Committed(String),
    FinishLoad(String),
    FailLoad(String),
    NewView(RoutingId),
    DestroyView,
    FocusBefore,
    FocusAfter,
    Focused,
    ContextMenu,
    ExternalProtocol(String),
    MoveView(Rect),
    NcHitTest,
    DragBegin(HitTestCode, Point),
    DragMove(Point),
    DragEnd(Point),
    Tooltip(String),
    FindState(i32, i32, bool),
}

pub type CallbackLog = Rc<RefCell<Vec<(RoutingId, Callback)>>>;

/// Records every callback. Optionally accepts new child views and destroys
/// its view when a given callback arrives.
#[derive(Default)]
pub struct RecordingDelegate {
    log: CallbackLog,
    accept_children: bool,
    destroy_on: Option<Callback>,
}

impl RecordingDelegate {
    pub fn new() -> (Self, CallbackLog) {
        let delegate = Self::default();
        let log = delegate.log.clone();
        (delegate, log)
    }

    pub fn accepting_children(mut self) -> Self {
        self.accept_children = true;
        self
    }

    pub fn destroying_on(mut self, callback: Callback) -> Self {
        self.destroy_on = Some(callback);
        self
    }

    fn record(&mut self, source: &WebViewProxy, callback: Callback) {
        let destroy = self.destroy_on.as_ref() == Some(&callback);
        self.log.borrow_mut().push((source.routing_id(), callback));
        if destroy {
            source.destroy();
        }
    }
}

impl WebViewDelegate for RecordingDelegate {
    fn update_target_url(&mut self, source: &WebViewProxy, url: &str) {
        self.record(source, Callback::TargetUrl(url.to_string()));
    }

    fn update_navigation_state(&mut self, source: &WebViewProxy, state: &NavigationState) {
        self.record(source, Callback::NavigationState(*state));
    }

    fn did_navigate_main_frame_post_commit(&mut self, source: &WebViewProxy, url: &str) {
        self.record(source, Callback::Committed(url.to_string()));
    }

    fn did_finish_load(&mut self, source: &WebViewProxy, url: &str) {
        self.record(source, Callback::FinishLoad(url.to_string()));
    }

    fn did_fail_load(&mut self, source: &WebViewProxy, url: &str) {
        self.record(source, Callback::FailLoad(url.to_string()));
    }

    fn did_create_new_view(
        &mut self,
        source: &WebViewProxy,
        new_view: WebViewProxy,
        _params: &NewViewParams,
    ) -> Option<Box<dyn WebViewDelegate>> {
        self.record(source, Callback::NewView(new_view.routing_id()));
        if !self.accept_children {
            new_view.destroy();
            return None;
        }
        Some(Box::new(RecordingDelegate {
            log: self.log.clone(),
            accept_children: true,
            destroy_on: None,
        }))
    }

    fn destroy_view(&mut self, source: &WebViewProxy) {
        self.log.borrow_mut().push((source.routing_id(), Callback::DestroyView));
        source.destroy();
    }

    fn focus_before(&mut self, source: &WebViewProxy) {
        self.record(source, Callback::FocusBefore);
    }

    fn focus_after(&mut self, source: &WebViewProxy) {
        self.record(source, Callback::FocusAfter);
    }

    fn focused(&mut self, source: &WebViewProxy) {
        self.record(source, Callback::Focused);
    }

    fn show_context_menu(&mut self, source: &WebViewProxy, _params: &ContextMenuParams) {
        self.record(source, Callback::ContextMenu);
    }

    fn handle_external_protocol(&mut self, source: &WebViewProxy, url: &str) {
        self.record(source, Callback::ExternalProtocol(url.to_string()));
    }

    fn move_view(&mut self, source: &WebViewProxy, rect: Rect) {
        self.record(source, Callback::MoveView(rect));
    }

    fn request_nc_hit_test(&mut self, source: &WebViewProxy) {
        self.record(source, Callback::NcHitTest);
        source.on_nc_hit_test_result(Point::new(7, 7), HitTestCode::Caption);
    }

    fn nc_drag_begin(&mut self, source: &WebViewProxy, hit_test: HitTestCode, point: Point) {
        self.record(source, Callback::DragBegin(hit_test, point));
    }

    fn nc_drag_move(&mut self, source: &WebViewProxy, point: Point) {
        self.record(source, Callback::DragMove(point));
    }

    fn nc_drag_end(&mut self, source: &WebViewProxy, point: Point) {
        self.record(source, Callback::DragEnd(point));
    }

    fn show_tooltip(&mut self, source: &WebViewProxy, text: &str, _direction: TextDirection) {
        self.record(source, Callback::Tooltip(text.to_string()));
    }

    fn find_state(&mut self, source: &WebViewProxy, number_of_matches: i32, active_match_index: i32, final_update: bool) {
        self.record(source, Callback::FindState(number_of_matches, active_match_index, final_update));
    }
}
