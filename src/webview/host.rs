// src/webview/host.rs
//! Host side of the WebView protocol.
//!
//! A `WebViewHost` owns one implementation and mediates between it and the
//! application: commands arrive as [`ViewCommand`]s, implementation reports
//! arrive as [`ImplEvent`]s, and notifications leave as [`ViewEvent`]s on the
//! application queue. `HostTable` is the arena of hosts for one thread.

use super::engine::{ImplEventSink, ViewEngine, WebViewImpl};
use super::messages::{AppTask, BrowserTask, ImplEvent, ViewCommand, ViewEvent};
use super::nc_drag::NcDragTracker;
use super::types::{NewViewParams, RoutingId, RoutingIdAllocator, WebViewCreateParams};
use crate::geometry::{Rect, Size};
use crate::threading::TaskSender;
use anyhow::Result;
use log::*;
use std::collections::HashMap;
use std::sync::Arc;

pub struct WebViewHost {
    routing_id: RoutingId,
    view: Box<dyn WebViewImpl>,
    impl_rect: Rect,
    impl_move_ack_pending: bool,
    nc_drag: NcDragTracker,
}

impl WebViewHost {
    fn new(routing_id: RoutingId, mut view: Box<dyn WebViewImpl>, sink: ImplEventSink) -> Self {
        view.attach(sink);
        Self {
            routing_id,
            view,
            impl_rect: Rect::default(),
            impl_move_ack_pending: false,
            nc_drag: NcDragTracker::new(),
        }
    }

    pub fn routing_id(&self) -> RoutingId {
        self.routing_id
    }

    /// Returns `true` when the move can be acked right away.
    fn on_move(&mut self, rect: Rect) -> bool {
        if self.impl_move_ack_pending {
            warn!("WebViewHost: {} moved again before the previous move was acked", self.routing_id);
            debug_assert!(false, "overlapping move requests");
        }
        // No backing store update arrives for empty rects, and none is
        // needed when the renderer already has frames of this size.
        if rect.is_empty() || self.view.renderer_matches_size(rect.size()) {
            self.impl_move_ack_pending = false;
            self.view.move_to(rect);
            return true;
        }
        trace!("WebViewHost: {} deferring move until the backing store is {:?}", self.routing_id, rect.size());
        self.impl_rect = rect;
        self.impl_move_ack_pending = true;
        false
    }

    /// Returns `true` when a deferred move completed.
    fn did_update_backing_store(&mut self, size: Size) -> bool {
        if self.impl_move_ack_pending && self.impl_rect.size() == size {
            self.impl_move_ack_pending = false;
            self.view.move_to(self.impl_rect);
            return true;
        }
        false
    }
}

/// Every host on one thread, keyed by routing id.
pub struct HostTable {
    hosts: HashMap<RoutingId, WebViewHost>,
    engine: Box<dyn ViewEngine>,
    events: TaskSender<AppTask>,
    sinks: ImplEventSink,
    ids: Arc<RoutingIdAllocator>,
}

impl HostTable {
    /// `sinks` is any sink on the channel implementations should report on;
    /// each host gets a copy addressed to its own routing id.
    pub(crate) fn new(
        engine: Box<dyn ViewEngine>,
        events: TaskSender<AppTask>,
        sinks: ImplEventSink,
        ids: Arc<RoutingIdAllocator>,
    ) -> Self {
        Self {
            hosts: HashMap::new(),
            engine,
            events,
            sinks,
            ids,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        self.engine.start()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn contains(&self, routing_id: RoutingId) -> bool {
        self.hosts.contains_key(&routing_id)
    }

    fn post(&self, routing_id: RoutingId, event: ViewEvent) {
        if let Err(e) = self.events.send(AppTask::View(routing_id, event)) {
            debug!("HostTable: Dropping event for {}: {}", routing_id, e);
        }
    }

    fn post_all(&self, routing_id: RoutingId, events: Vec<ViewEvent>) {
        for event in events {
            self.post(routing_id, event);
        }
    }

    /// Runs one browser-main task. Returns `false` on `Quit`.
    pub fn handle_task(&mut self, task: BrowserTask) -> bool {
        match task {
            BrowserTask::Command(routing_id, command) => self.handle_command(routing_id, command),
            BrowserTask::Impl(routing_id, event) => self.handle_impl_event(routing_id, event),
            BrowserTask::Sync(reply) => {
                let _ = reply.send(());
            }
            BrowserTask::DestroyAll => self.destroy_all(),
            BrowserTask::Quit => return false,
        }
        true
    }

    pub fn handle_command(&mut self, routing_id: RoutingId, command: ViewCommand) {
        match command {
            ViewCommand::Create(params) => self.create(routing_id, &params),
            ViewCommand::Destroy => self.destroy(routing_id),
            command => self.forward_command(routing_id, command),
        }
    }

    fn forward_command(&mut self, routing_id: RoutingId, command: ViewCommand) {
        let Some(host) = self.hosts.get_mut(&routing_id) else {
            trace!("HostTable: Dropping {:?} for unknown {}", command, routing_id);
            return;
        };
        let events = match command {
            ViewCommand::Op(op) => {
                host.view.perform(op);
                Vec::new()
            }
            ViewCommand::Move(rect) => {
                if host.on_move(rect) {
                    vec![ViewEvent::MoveAck]
                } else {
                    Vec::new()
                }
            }
            ViewCommand::NcDragMoveAck(point) => host.nc_drag.move_ack(point),
            ViewCommand::NcDragEndAck => host.nc_drag.end_ack(),
            ViewCommand::Create(_) | ViewCommand::Destroy => Vec::new(),
        };
        self.post_all(routing_id, events);
    }

    pub fn handle_impl_event(&mut self, routing_id: RoutingId, event: ImplEvent) {
        let event = match event {
            ImplEvent::DidCreateNewView { view, params } => return self.adopt_child(routing_id, view, params),
            event => event,
        };
        let Some(host) = self.hosts.get_mut(&routing_id) else {
            trace!("HostTable: Dropping {:?} from released {}", event, routing_id);
            return;
        };
        let events = match event {
            ImplEvent::Notify(event) => vec![event],
            ImplEvent::DidUpdateBackingStore(size) => {
                if host.did_update_backing_store(size) {
                    vec![ViewEvent::MoveAck]
                } else {
                    Vec::new()
                }
            }
            ImplEvent::NcDragBegin { hit_test, point } => host.nc_drag.begin(hit_test, point),
            ImplEvent::NcDragMove(point) => host.nc_drag.update(point),
            ImplEvent::NcDragEnd(point) => host.nc_drag.end(point),
            ImplEvent::DidCreateNewView { .. } => Vec::new(),
        };
        self.post_all(routing_id, events);
    }

    fn create(&mut self, routing_id: RoutingId, params: &WebViewCreateParams) {
        if self.hosts.contains_key(&routing_id) {
            warn!("HostTable: {} created twice", routing_id);
            return;
        }
        match self.engine.create_view(routing_id, params) {
            Ok(view) => {
                let sink = self.sinks.for_view(routing_id);
                self.hosts.insert(routing_id, WebViewHost::new(routing_id, view, sink));
                debug!("HostTable: Created {} ({} live)", routing_id, self.hosts.len());
                self.post(routing_id, ViewEvent::Created);
            }
            Err(e) => {
                error!("HostTable: Engine failed to create {}: {:#}", routing_id, e);
                // Ask the application to tear its handle down.
                self.post(routing_id, ViewEvent::DestroyView);
            }
        }
    }

    /// Wraps an engine-created child before the application hears about it.
    fn adopt_child(&mut self, source: RoutingId, mut view: Box<dyn WebViewImpl>, params: NewViewParams) {
        if !self.hosts.contains_key(&source) {
            trace!("HostTable: Source {} gone, releasing its new child view", source);
            view.destroy();
            return;
        }
        let child = self.ids.allocate();
        let sink = self.sinks.for_view(child);
        self.hosts.insert(child, WebViewHost::new(child, view, sink));
        debug!("HostTable: {} opened child {}", source, child);
        self.post(source, ViewEvent::DidCreateNewView { child, params });
    }

    fn destroy(&mut self, routing_id: RoutingId) {
        match self.hosts.remove(&routing_id) {
            Some(mut host) => {
                host.view.destroy();
                debug!("HostTable: Destroyed {} ({} live)", routing_id, self.hosts.len());
                self.post(routing_id, ViewEvent::DestroyAck);
            }
            None => {
                // Creation failed or the host already went; release the proxy anyway.
                trace!("HostTable: Destroy for unknown {}", routing_id);
                self.post(routing_id, ViewEvent::DestroyAck);
            }
        }
    }

    /// Releases every host, then shuts the engine down.
    pub fn destroy_all(&mut self) {
        if !self.hosts.is_empty() {
            info!("HostTable: Destroying {} remaining view(s)", self.hosts.len());
        }
        let hosts: Vec<_> = self.hosts.drain().collect();
        for (routing_id, mut host) in hosts {
            host.view.destroy();
            self.post(routing_id, ViewEvent::DestroyAck);
        }
        self.engine.shutdown();
    }
}
