// src/webview/engine.rs
//! The browser engine as seen by the toolkit.
//!
//! The engine (profiles, renderer processes, content) lives outside this
//! crate. It hands the toolkit one [`WebViewImpl`] per view and reports back
//! through the [`ImplEventSink`] it receives on attach.

use super::messages::{AppTask, BrowserTask, ImplEvent, ViewOp};
use super::types::{RoutingId, WebViewCreateParams};
use crate::geometry::{Rect, Size};
use crate::threading::{PostError, TaskSender};
use anyhow::Result;

/// Creates view implementations on the thread that owns them.
pub trait ViewEngine: Send {
    /// Runs once on the owning thread before the toolkit reports ready. This is
    /// where the default in-process renderer host is brought up.
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Builds the implementation for `routing_id`, honoring the renderer
    /// affinity in `params`.
    fn create_view(&mut self, routing_id: RoutingId, params: &WebViewCreateParams) -> Result<Box<dyn WebViewImpl>>;

    /// Runs once after every view is gone.
    fn shutdown(&mut self) {}
}

/// The real WebView, owned by a `WebViewHost`.
pub trait WebViewImpl: Send {
    /// Called once, before any other method, with the channel back to the
    /// host.
    fn attach(&mut self, sink: ImplEventSink);

    fn perform(&mut self, op: ViewOp);

    /// Repositions the view immediately.
    fn move_to(&mut self, rect: Rect);

    /// Whether the renderer already produced frames of `size`, in which case a
    /// move can be acknowledged without waiting for the backing store.
    fn renderer_matches_size(&self, size: Size) -> bool;

    /// Releases renderer resources. The host drops the implementation next.
    fn destroy(&mut self) {}
}

#[derive(Clone)]
enum ImplTarget {
    BrowserMain(TaskSender<BrowserTask>),
    App(TaskSender<AppTask>),
}

/// Channel from one implementation to its host.
#[derive(Clone)]
pub struct ImplEventSink {
    routing_id: RoutingId,
    target: ImplTarget,
}

impl ImplEventSink {
    pub(crate) fn to_browser_main(routing_id: RoutingId, tx: TaskSender<BrowserTask>) -> Self {
        Self {
            routing_id,
            target: ImplTarget::BrowserMain(tx),
        }
    }

    pub(crate) fn to_app(routing_id: RoutingId, tx: TaskSender<AppTask>) -> Self {
        Self {
            routing_id,
            target: ImplTarget::App(tx),
        }
    }

    /// Same channel, different view.
    pub(crate) fn for_view(&self, routing_id: RoutingId) -> Self {
        Self {
            routing_id,
            target: self.target.clone(),
        }
    }

    pub fn routing_id(&self) -> RoutingId {
        self.routing_id
    }

    pub fn send(&self, event: ImplEvent) -> Result<(), PostError> {
        match &self.target {
            ImplTarget::BrowserMain(tx) => tx.send(BrowserTask::Impl(self.routing_id, event)),
            ImplTarget::App(tx) => tx.send(AppTask::Impl(self.routing_id, event)),
        }
    }
}
