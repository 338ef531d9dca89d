// src/webview/messages.rs
//! Messages crossing the application/browser-main boundary.
//!
//! App -> host traffic is a [`ViewCommand`]; host -> app traffic is a
//! [`ViewEvent`]. Implementations report to their host with [`ImplEvent`].
//! Each direction is a FIFO channel, so per-view ordering follows from the
//! order of sends.

use super::engine::WebViewImpl;
use super::find::FindRequest;
use super::types::*;
use crate::geometry::{Point, Rect, Size};
use std::fmt;
use std::sync::mpsc::SyncSender;

/// Fire-and-forget WebView operations, forwarded unchanged to the
/// implementation.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewOp {
    LoadUrl(String),
    /// Turn this view into the inspector for another view.
    LoadInspector(RoutingId),
    InspectElementAt(Point),
    Reload { ignore_cache: bool },
    GoBack,
    GoForward,
    Stop,
    Focus,
    Show,
    Hide,
    SetParent(Option<NativeView>),
    CutSelection,
    CopySelection,
    Paste,
    DeleteSelection,
    EnableFocusBefore(bool),
    EnableFocusAfter(bool),
    EnableNcHitTest(bool),
    NcHitTestResult { point: Point, code: HitTestCode },
    PerformCustomContextMenuAction(i32),
    EnableCustomTooltip(bool),
    SetZoomPercent(i32),
    Find(FindRequest),
    ReplaceMisspelledRange(String),
    RootWindowPositionChanged,
    RootWindowSettingsChanged,
}

/// Application -> host.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    Create(WebViewCreateParams),
    Op(ViewOp),
    /// Acknowledged with `ViewEvent::MoveAck`.
    Move(Rect),
    NcDragMoveAck(Point),
    NcDragEndAck,
    Destroy,
}

/// Host -> application. Everything except the protocol acks maps to a
/// delegate callback of the same name.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// The implementation exists; the handle is live.
    Created,
    UpdateTargetUrl(String),
    UpdateNavigationState(NavigationState),
    DidNavigateMainFramePostCommit(String),
    DidFinishLoad(String),
    DidFailLoad(String),
    /// The host already wraps the child implementation under `child`.
    DidCreateNewView { child: RoutingId, params: NewViewParams },
    DestroyView,
    FocusBefore,
    FocusAfter,
    Focused,
    ShowContextMenu(ContextMenuParams),
    HandleExternalProtocol(String),
    MoveView(Rect),
    RequestNcHitTest,
    NcDragBegin { hit_test: HitTestCode, point: Point },
    NcDragMove(Point),
    NcDragEnd(Point),
    ShowTooltip { text: String, direction: TextDirection },
    FindState { req_id: i32, number_of_matches: i32, active_match_ordinal: i32, final_update: bool },
    MoveAck,
    /// The host has released the implementation.
    DestroyAck,
}

/// Implementation -> its host.
pub enum ImplEvent {
    /// A notification relayed to the application as-is.
    Notify(ViewEvent),
    DidCreateNewView { view: Box<dyn WebViewImpl>, params: NewViewParams },
    /// The renderer produced a frame of `size`; releases a deferred move.
    DidUpdateBackingStore(Size),
    NcDragBegin { hit_test: HitTestCode, point: Point },
    NcDragMove(Point),
    NcDragEnd(Point),
}

impl fmt::Debug for ImplEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImplEvent::Notify(event) => f.debug_tuple("Notify").field(event).finish(),
            ImplEvent::DidCreateNewView { params, .. } => f
                .debug_struct("DidCreateNewView")
                .field("params", params)
                .finish_non_exhaustive(),
            ImplEvent::DidUpdateBackingStore(size) => {
                f.debug_tuple("DidUpdateBackingStore").field(size).finish()
            }
            ImplEvent::NcDragBegin { hit_test, point } => f
                .debug_struct("NcDragBegin")
                .field("hit_test", hit_test)
                .field("point", point)
                .finish(),
            ImplEvent::NcDragMove(point) => f.debug_tuple("NcDragMove").field(point).finish(),
            ImplEvent::NcDragEnd(point) => f.debug_tuple("NcDragEnd").field(point).finish(),
        }
    }
}

/// Work for the application thread's task queue.
#[derive(Debug)]
pub enum AppTask {
    /// A host event for one view.
    View(RoutingId, ViewEvent),
    /// An implementation event, in `Original` mode where the hosts live on
    /// the application thread too.
    Impl(RoutingId, ImplEvent),
    /// Flush the latest requested geometry of a view.
    FlushMove(RoutingId),
}

/// Work for the browser-main thread.
#[derive(Debug)]
pub enum BrowserTask {
    Command(RoutingId, ViewCommand),
    Impl(RoutingId, ImplEvent),
    /// Replies once every earlier task has run.
    Sync(SyncSender<()>),
    /// Destroys every remaining view.
    DestroyAll,
    Quit,
}
