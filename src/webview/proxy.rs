// src/webview/proxy.rs
//! Application side of the WebView protocol.
//!
//! A [`WebViewProxy`] is a cheap, `!Send` handle to a view. Every operation is
//! turned into a [`ViewCommand`] and handed to the host, either across the
//! browser-main channel or, in `Original` mode, synchronously to a host on
//! this thread. Host events are routed back through [`ViewTable`] to the
//! view's [`WebViewDelegate`].
//!
//! Once a handle is destroyed its delegate is dropped and no further
//! callbacks are made, whatever is still in flight.

use super::find::FindOnPage;
use super::host::HostTable;
use super::messages::{AppTask, BrowserTask, ViewCommand, ViewEvent, ViewOp};
use super::types::*;
use crate::geometry::{Point, Rect};
use crate::threading::TaskSender;
use log::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Application callbacks for one view. Every method has a default, so
/// delegates implement only what they need.
#[allow(unused_variables)]
pub trait WebViewDelegate {
    fn update_target_url(&mut self, source: &WebViewProxy, url: &str) {}

    fn update_navigation_state(&mut self, source: &WebViewProxy, state: &NavigationState) {}

    fn did_navigate_main_frame_post_commit(&mut self, source: &WebViewProxy, url: &str) {}

    fn did_finish_load(&mut self, source: &WebViewProxy, url: &str) {}

    fn did_fail_load(&mut self, source: &WebViewProxy, url: &str) {}

    /// The engine opened `new_view` on behalf of `source`. Return the child's
    /// delegate, or destroy the child to refuse it.
    fn did_create_new_view(
        &mut self,
        source: &WebViewProxy,
        new_view: WebViewProxy,
        params: &NewViewParams,
    ) -> Option<Box<dyn WebViewDelegate>> {
        new_view.destroy();
        None
    }

    /// The page asked to be closed.
    fn destroy_view(&mut self, source: &WebViewProxy) {
        source.destroy();
    }

    fn focus_before(&mut self, source: &WebViewProxy) {}

    fn focus_after(&mut self, source: &WebViewProxy) {}

    fn focused(&mut self, source: &WebViewProxy) {}

    fn show_context_menu(&mut self, source: &WebViewProxy, params: &ContextMenuParams) {}

    fn handle_external_protocol(&mut self, source: &WebViewProxy, url: &str) {}

    fn move_view(&mut self, source: &WebViewProxy, rect: Rect) {}

    /// Answer with [`WebViewProxy::on_nc_hit_test_result`].
    fn request_nc_hit_test(&mut self, source: &WebViewProxy) {
        source.on_nc_hit_test_result(Point::default(), HitTestCode::Error);
    }

    fn nc_drag_begin(&mut self, source: &WebViewProxy, hit_test: HitTestCode, point: Point) {}

    fn nc_drag_move(&mut self, source: &WebViewProxy, point: Point) {}

    fn nc_drag_end(&mut self, source: &WebViewProxy, point: Point) {}

    fn show_tooltip(&mut self, source: &WebViewProxy, text: &str, direction: TextDirection) {}

    fn find_state(
        &mut self,
        source: &WebViewProxy,
        number_of_matches: i32,
        active_match_index: i32,
        final_update: bool,
    ) {
    }
}

struct ProxyEntry {
    state: ViewState,
    delegate: Option<Box<dyn WebViewDelegate>>,
    /// Latest geometry requested by the application.
    rect: Option<Rect>,
    /// Geometry of the last move sent to the host.
    sent_rect: Option<Rect>,
    move_ack_pending: bool,
    move_flush_scheduled: bool,
    nc_drag_needs_ack: bool,
    find: FindOnPage,
}

impl ProxyEntry {
    fn new(state: ViewState, delegate: Option<Box<dyn WebViewDelegate>>) -> Self {
        Self {
            state,
            delegate,
            rect: None,
            sent_rect: None,
            move_ack_pending: false,
            move_flush_scheduled: false,
            nc_drag_needs_ack: false,
            find: FindOnPage::new(),
        }
    }

    fn is_usable(&self) -> bool {
        matches!(self.state, ViewState::Initializing | ViewState::Live)
    }
}

/// Application-side state of every view, keyed by routing id.
#[derive(Default)]
pub struct ViewTable {
    entries: HashMap<RoutingId, ProxyEntry>,
}

impl ViewTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn state(&self, routing_id: RoutingId) -> ViewState {
        self.entries
            .get(&routing_id)
            .map_or(ViewState::Destroyed, |entry| entry.state)
    }

    fn usable_mut(&mut self, routing_id: RoutingId) -> Option<&mut ProxyEntry> {
        self.entries.get_mut(&routing_id).filter(|entry| entry.is_usable())
    }
}

/// Where commands go.
pub(crate) enum Transport {
    /// Across the channel to browser-main.
    Remote(TaskSender<BrowserTask>),
    /// Straight into hosts living on this thread.
    Local(Rc<RefCell<HostTable>>),
}

/// Shared by every handle of one toolkit.
pub(crate) struct ProxyContext {
    views: RefCell<ViewTable>,
    transport: Transport,
    app_tx: TaskSender<AppTask>,
    ids: Arc<RoutingIdAllocator>,
}

impl ProxyContext {
    pub(crate) fn new(transport: Transport, app_tx: TaskSender<AppTask>, ids: Arc<RoutingIdAllocator>) -> Rc<Self> {
        Rc::new(Self {
            views: RefCell::new(ViewTable::default()),
            transport,
            app_tx,
            ids,
        })
    }

    pub(crate) fn view_count(&self) -> usize {
        self.views.borrow().len()
    }

    pub(crate) fn create_view(
        self: &Rc<Self>,
        params: WebViewCreateParams,
        delegate: Option<Box<dyn WebViewDelegate>>,
    ) -> WebViewProxy {
        let routing_id = self.ids.allocate();
        self.views
            .borrow_mut()
            .entries
            .insert(routing_id, ProxyEntry::new(ViewState::Initializing, delegate));
        debug!("WebViewProxy: Creating {}", routing_id);
        self.send(routing_id, ViewCommand::Create(params));
        self.handle(routing_id)
    }

    /// Drops every entry, and with it every delegate.
    pub(crate) fn clear(&self) {
        let entries = std::mem::take(&mut self.views.borrow_mut().entries);
        if !entries.is_empty() {
            debug!("WebViewProxy: Releasing {} view entr(ies)", entries.len());
        }
        drop(entries);
    }

    fn handle(self: &Rc<Self>, routing_id: RoutingId) -> WebViewProxy {
        WebViewProxy {
            routing_id,
            ctx: self.clone(),
        }
    }

    fn send(&self, routing_id: RoutingId, command: ViewCommand) {
        match &self.transport {
            Transport::Remote(tx) => {
                if let Err(e) = tx.send(BrowserTask::Command(routing_id, command)) {
                    debug!("WebViewProxy: Dropping command for {}: {}", routing_id, e);
                }
            }
            Transport::Local(hosts) => match hosts.try_borrow_mut() {
                Ok(mut hosts) => hosts.handle_command(routing_id, command),
                Err(_) => error!("WebViewProxy: Host table busy, dropping {:?} for {}", command, routing_id),
            },
        }
    }

    fn is_local(&self) -> bool {
        matches!(self.transport, Transport::Local(_))
    }

    /// Runs one application task addressed to the proxies.
    pub(crate) fn run_task(self: &Rc<Self>, task: AppTask) {
        match task {
            AppTask::View(routing_id, event) => self.dispatch(routing_id, event),
            AppTask::FlushMove(routing_id) => self.flush_move(routing_id),
            AppTask::Impl(routing_id, event) => match &self.transport {
                Transport::Local(hosts) => match hosts.try_borrow_mut() {
                    Ok(mut hosts) => hosts.handle_impl_event(routing_id, event),
                    Err(_) => error!("WebViewProxy: Host table busy, dropping {:?} for {}", event, routing_id),
                },
                Transport::Remote(_) => {
                    warn!("WebViewProxy: Implementation event {:?} for {} reached the app thread", event, routing_id);
                }
            },
        }
    }

    /// Records the latest geometry. The first move of a turn is flushed from
    /// the application queue, or earlier by the next operation on the same
    /// handle; moves issued while one is in flight wait for its ack.
    fn move_to(&self, routing_id: RoutingId, rect: Rect) {
        if self.is_local() {
            // Same-thread hosts move synchronously; acks are informational.
            self.send(routing_id, ViewCommand::Move(rect));
            return;
        }
        let schedule = {
            let mut views = self.views.borrow_mut();
            let Some(entry) = views.usable_mut(routing_id) else {
                return;
            };
            if entry.rect == Some(rect) {
                return;
            }
            entry.rect = Some(rect);
            let schedule = !entry.move_ack_pending && !entry.move_flush_scheduled;
            entry.move_flush_scheduled |= schedule;
            schedule
        };
        if schedule {
            if let Err(e) = self.app_tx.send(AppTask::FlushMove(routing_id)) {
                debug!("WebViewProxy: Could not schedule move flush for {}: {}", routing_id, e);
            }
        }
    }

    /// Sends the latest geometry unless a move is already in flight.
    fn flush_move(&self, routing_id: RoutingId) {
        let rect = {
            let mut views = self.views.borrow_mut();
            let Some(entry) = views.usable_mut(routing_id) else {
                return;
            };
            if !entry.move_flush_scheduled {
                return;
            }
            entry.move_flush_scheduled = false;
            if entry.move_ack_pending || entry.rect == entry.sent_rect {
                return;
            }
            entry.move_ack_pending = true;
            entry.sent_rect = entry.rect;
            entry.rect
        };
        if let Some(rect) = rect {
            trace!("WebViewProxy: Flushing move of {} to {:?}", routing_id, rect);
            self.send(routing_id, ViewCommand::Move(rect));
        }
    }

    fn on_move_ack(&self, routing_id: RoutingId) {
        let resend = {
            let mut views = self.views.borrow_mut();
            let Some(entry) = views.usable_mut(routing_id) else {
                return;
            };
            if !entry.move_ack_pending {
                trace!("WebViewProxy: Dropping stray move ack for {}", routing_id);
                return;
            }
            entry.move_ack_pending = false;
            if entry.rect == entry.sent_rect {
                return;
            }
            entry.move_ack_pending = true;
            entry.sent_rect = entry.rect;
            entry.rect
        };
        if let Some(rect) = resend {
            self.send(routing_id, ViewCommand::Move(rect));
        }
    }

    fn destroy(&self, routing_id: RoutingId) {
        let delegate = {
            let mut views = self.views.borrow_mut();
            let Some(entry) = views.usable_mut(routing_id) else {
                debug!("WebViewProxy: Ignoring destroy of {}, already released", routing_id);
                return;
            };
            entry.state = ViewState::Destroying;
            entry.delegate.take()
        };
        debug!("WebViewProxy: Destroying {}", routing_id);
        // The delegate may own handles to this view; drop it outside the borrow.
        drop(delegate);
        self.send(routing_id, ViewCommand::Destroy);
    }

    /// Delivers one host event. Events for views that are gone or going are
    /// dropped without reaching any delegate.
    fn dispatch(self: &Rc<Self>, routing_id: RoutingId, event: ViewEvent) {
        match event {
            ViewEvent::Created => {
                if let Some(entry) = self.views.borrow_mut().usable_mut(routing_id) {
                    entry.state = ViewState::Live;
                }
                return;
            }
            ViewEvent::MoveAck => return self.on_move_ack(routing_id),
            ViewEvent::DestroyAck => {
                self.views.borrow_mut().entries.remove(&routing_id);
                trace!("WebViewProxy: {} released", routing_id);
                return;
            }
            _ => {}
        }

        let taken = {
            let mut views = self.views.borrow_mut();
            match views.usable_mut(routing_id) {
                None => None,
                Some(entry) => {
                    if let ViewEvent::NcDragBegin { hit_test, .. } = &event {
                        entry.nc_drag_needs_ack = hit_test.needs_drag_ack();
                    }
                    let mut find_result = None;
                    if let ViewEvent::FindState { req_id, number_of_matches, active_match_ordinal, .. } = &event {
                        if !entry.find.apply_update(*req_id, *number_of_matches, *active_match_ordinal) {
                            trace!("WebViewProxy: Dropping stale find result {} for {}", req_id, routing_id);
                            return;
                        }
                        find_result = Some((entry.find.number_of_matches(), entry.find.active_match_index()));
                    }
                    Some((entry.delegate.take(), entry.nc_drag_needs_ack, find_result))
                }
            }
        };
        let Some((delegate, needs_drag_ack, find_result)) = taken else {
            trace!("WebViewProxy: Dropping {:?} for released {}", event, routing_id);
            if let ViewEvent::DidCreateNewView { child, .. } = event {
                self.send(child, ViewCommand::Destroy);
            }
            return;
        };

        let source = self.handle(routing_id);
        let delegate = match delegate {
            Some(mut delegate) => {
                self.deliver(&mut *delegate, &source, event.clone(), find_result);
                Some(delegate)
            }
            None => {
                self.deliver_without_delegate(&source, &event);
                None
            }
        };

        // Drag acks follow the delegate's handling of the update.
        match event {
            ViewEvent::NcDragMove(point) if needs_drag_ack => self.send_if_usable(routing_id, ViewCommand::NcDragMoveAck(point)),
            ViewEvent::NcDragEnd(_) => self.send_if_usable(routing_id, ViewCommand::NcDragEndAck),
            _ => {}
        }

        if let Some(delegate) = delegate {
            self.restore_delegate(routing_id, delegate);
        }
    }

    fn send_if_usable(&self, routing_id: RoutingId, command: ViewCommand) {
        let usable = self.views.borrow().entries.get(&routing_id).is_some_and(|e| e.is_usable());
        if usable {
            self.send(routing_id, command);
        }
    }

    fn restore_delegate(&self, routing_id: RoutingId, delegate: Box<dyn WebViewDelegate>) {
        {
            let mut views = self.views.borrow_mut();
            if let Some(entry) = views.usable_mut(routing_id) {
                if entry.delegate.is_none() {
                    entry.delegate = Some(delegate);
                    return;
                }
            }
        }
        // Destroyed during the callback. Dropped outside the borrow, since the
        // delegate may hold handles of its own.
        drop(delegate);
    }

    fn register_child(self: &Rc<Self>, child: RoutingId) -> WebViewProxy {
        self.views
            .borrow_mut()
            .entries
            .insert(child, ProxyEntry::new(ViewState::Live, None));
        self.handle(child)
    }

    fn deliver(
        self: &Rc<Self>,
        delegate: &mut dyn WebViewDelegate,
        source: &WebViewProxy,
        event: ViewEvent,
        find_result: Option<(i32, i32)>,
    ) {
        match event {
            ViewEvent::UpdateTargetUrl(url) => delegate.update_target_url(source, &url),
            ViewEvent::UpdateNavigationState(state) => delegate.update_navigation_state(source, &state),
            ViewEvent::DidNavigateMainFramePostCommit(url) => {
                delegate.did_navigate_main_frame_post_commit(source, &url)
            }
            ViewEvent::DidFinishLoad(url) => delegate.did_finish_load(source, &url),
            ViewEvent::DidFailLoad(url) => delegate.did_fail_load(source, &url),
            ViewEvent::DidCreateNewView { child, params } => {
                let new_view = self.register_child(child);
                let child_delegate = delegate.did_create_new_view(source, new_view, &params);
                if let Some(child_delegate) = child_delegate {
                    self.restore_delegate(child, child_delegate);
                }
            }
            ViewEvent::DestroyView => delegate.destroy_view(source),
            ViewEvent::FocusBefore => delegate.focus_before(source),
            ViewEvent::FocusAfter => delegate.focus_after(source),
            ViewEvent::Focused => delegate.focused(source),
            ViewEvent::ShowContextMenu(params) => delegate.show_context_menu(source, &params),
            ViewEvent::HandleExternalProtocol(url) => delegate.handle_external_protocol(source, &url),
            ViewEvent::MoveView(rect) => delegate.move_view(source, rect),
            ViewEvent::RequestNcHitTest => delegate.request_nc_hit_test(source),
            ViewEvent::NcDragBegin { hit_test, point } => delegate.nc_drag_begin(source, hit_test, point),
            ViewEvent::NcDragMove(point) => delegate.nc_drag_move(source, point),
            ViewEvent::NcDragEnd(point) => delegate.nc_drag_end(source, point),
            ViewEvent::ShowTooltip { text, direction } => delegate.show_tooltip(source, &text, direction),
            ViewEvent::FindState { final_update, .. } => {
                if let Some((matches, active)) = find_result {
                    delegate.find_state(source, matches, active, final_update);
                }
            }
            ViewEvent::Created | ViewEvent::MoveAck | ViewEvent::DestroyAck => {}
        }
    }

    fn deliver_without_delegate(self: &Rc<Self>, source: &WebViewProxy, event: &ViewEvent) {
        match event {
            ViewEvent::DestroyView => source.destroy(),
            ViewEvent::DidCreateNewView { child, .. } => self.register_child(*child).destroy(),
            ViewEvent::RequestNcHitTest => source.on_nc_hit_test_result(Point::default(), HitTestCode::Error),
            _ => {}
        }
    }
}

/// Application-thread handle to a WebView. Clones address the same view.
#[derive(Clone)]
pub struct WebViewProxy {
    routing_id: RoutingId,
    ctx: Rc<ProxyContext>,
}

impl fmt::Debug for WebViewProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebViewProxy")
            .field("routing_id", &self.routing_id)
            .field("state", &self.state())
            .finish()
    }
}

impl WebViewProxy {
    pub fn routing_id(&self) -> RoutingId {
        self.routing_id
    }

    pub fn state(&self) -> ViewState {
        self.ctx.views.borrow().state(self.routing_id)
    }

    fn op(&self, op: ViewOp) {
        if !self.check_usable(&op) {
            return;
        }
        // A move issued earlier in this turn goes out first.
        self.ctx.flush_move(self.routing_id);
        self.ctx.send(self.routing_id, ViewCommand::Op(op));
    }

    fn check_usable(&self, what: &dyn fmt::Debug) -> bool {
        let usable = self
            .ctx
            .views
            .borrow()
            .entries
            .get(&self.routing_id)
            .is_some_and(|e| e.is_usable());
        if !usable {
            warn!("WebViewProxy: {:?} on destroyed {}", what, self.routing_id);
            debug_assert!(false, "operation on a destroyed WebViewProxy");
        }
        usable
    }

    pub fn load_url(&self, url: &str) {
        self.op(ViewOp::LoadUrl(url.to_string()));
    }

    /// Makes this view the inspector of `inspected`.
    pub fn load_inspector(&self, inspected: &WebViewProxy) {
        self.op(ViewOp::LoadInspector(inspected.routing_id));
    }

    pub fn inspect_element_at(&self, point: Point) {
        self.op(ViewOp::InspectElementAt(point));
    }

    pub fn reload(&self, ignore_cache: bool) {
        self.op(ViewOp::Reload { ignore_cache });
    }

    pub fn go_back(&self) {
        self.op(ViewOp::GoBack);
    }

    pub fn go_forward(&self) {
        self.op(ViewOp::GoForward);
    }

    pub fn stop(&self) {
        self.op(ViewOp::Stop);
    }

    pub fn focus(&self) {
        self.op(ViewOp::Focus);
    }

    pub fn show(&self) {
        self.op(ViewOp::Show);
    }

    pub fn hide(&self) {
        self.op(ViewOp::Hide);
    }

    pub fn set_parent(&self, parent: Option<NativeView>) {
        self.op(ViewOp::SetParent(parent));
    }

    /// Requests new geometry. Consecutive requests coalesce: at most one move
    /// is in flight, and the host always ends up at the latest rectangle.
    pub fn move_to(&self, rect: Rect) {
        if self.check_usable(&rect) {
            self.ctx.move_to(self.routing_id, rect);
        }
    }

    pub fn cut_selection(&self) {
        self.op(ViewOp::CutSelection);
    }

    pub fn copy_selection(&self) {
        self.op(ViewOp::CopySelection);
    }

    pub fn paste(&self) {
        self.op(ViewOp::Paste);
    }

    pub fn delete_selection(&self) {
        self.op(ViewOp::DeleteSelection);
    }

    pub fn enable_focus_before(&self, enabled: bool) {
        self.op(ViewOp::EnableFocusBefore(enabled));
    }

    pub fn enable_focus_after(&self, enabled: bool) {
        self.op(ViewOp::EnableFocusAfter(enabled));
    }

    pub fn enable_nc_hit_test(&self, enabled: bool) {
        self.op(ViewOp::EnableNcHitTest(enabled));
    }

    /// Answers a `request_nc_hit_test` callback.
    pub fn on_nc_hit_test_result(&self, point: Point, code: HitTestCode) {
        self.op(ViewOp::NcHitTestResult { point, code });
    }

    pub fn perform_custom_context_menu_action(&self, action: i32) {
        self.op(ViewOp::PerformCustomContextMenuAction(action));
    }

    pub fn enable_custom_tooltip(&self, enabled: bool) {
        self.op(ViewOp::EnableCustomTooltip(enabled));
    }

    pub fn set_zoom_percent(&self, percent: i32) {
        self.op(ViewOp::SetZoomPercent(percent));
    }

    /// Searches the page. Repeating the previous text finds the next match;
    /// an empty text clears the search.
    pub fn find(&self, text: &str, match_case: bool, forward: bool) {
        let request = self
            .ctx
            .views
            .borrow_mut()
            .usable_mut(self.routing_id)
            .map(|entry| entry.find.make_request(text, match_case, forward));
        match request {
            Some(request) => self.op(ViewOp::Find(request)),
            None => {
                self.check_usable(&text);
            }
        }
    }

    pub fn replace_misspelled_range(&self, text: &str) {
        self.op(ViewOp::ReplaceMisspelledRange(text.to_string()));
    }

    pub fn root_window_position_changed(&self) {
        self.op(ViewOp::RootWindowPositionChanged);
    }

    pub fn root_window_settings_changed(&self) {
        self.op(ViewOp::RootWindowSettingsChanged);
    }

    /// Releases the view. The delegate is dropped immediately and receives
    /// nothing further.
    ///
    /// Clones share one lifetime: destroying through any clone destroys the
    /// view for all of them, and later `destroy` calls on any clone are
    /// ignored.
    pub fn destroy(&self) {
        self.ctx.destroy(self.routing_id);
    }
}
