// src/webview/types.rs

use crate::config::WebViewDefaults;
use crate::geometry::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Identifies one WebView across the application/browser-main boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoutingId(pub u32);

impl fmt::Display for RoutingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// Process-wide routing id source, shared by both threads so that views
/// created by the application and child views created by the engine never
/// collide.
#[derive(Debug)]
pub struct RoutingIdAllocator {
    next: AtomicU32,
}

impl Default for RoutingIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingIdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    pub fn allocate(&self) -> RoutingId {
        RoutingId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Lifecycle of an application-side handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// Creation posted, implementation not confirmed yet.
    Initializing,
    Live,
    /// Destroy requested; nothing more is delivered to the delegate.
    Destroying,
    Destroyed,
}

/// Opaque native window handle used as a WebView parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NativeView(pub u64);

/// Result of a non-client hit test, in window-manager terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HitTestCode {
    Error,
    Nowhere,
    Client,
    Caption,
    Left,
    Right,
    Top,
    TopLeft,
    TopRight,
    Bottom,
    BottomLeft,
    BottomRight,
}

impl HitTestCode {
    /// Caption drags move the window and do not wait for move acks.
    pub fn needs_drag_ack(self) -> bool {
        self != HitTestCode::Caption
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NavigationState {
    pub can_go_back: bool,
    pub can_go_forward: bool,
    pub is_loading: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMenuItem {
    pub label: String,
    pub action: i32,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContextMenuParams {
    pub point: Point,
    pub can_cut: bool,
    pub can_copy: bool,
    pub can_paste: bool,
    pub can_delete: bool,
    pub misspelled_word: Option<String>,
    pub suggestions: Vec<String>,
    pub custom_items: Vec<ContextMenuItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NewViewDisposition {
    CurrentTab,
    NewForegroundTab,
    NewBackgroundTab,
    #[default]
    NewPopup,
    NewWindow,
}

/// How the engine asked for a child view to be presented.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewViewParams {
    pub disposition: NewViewDisposition,
    pub target_url: String,
    pub rect: Option<Rect>,
    pub is_hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextDirection {
    #[default]
    Default,
    LeftToRight,
    RightToLeft,
}

/// Which renderer process a new view is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RendererAffinity {
    /// Let the engine pick a fresh out-of-process renderer.
    #[default]
    AnyOutOfProcess,
    /// Share the in-process renderer hosted by the toolkit.
    InProcess,
    /// Pin to a renderer id previously handed out by the engine.
    Renderer(i32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebViewCreateParams {
    pub initially_visible: bool,
    pub take_focus_on_mouse_down: bool,
    pub renderer_affinity: RendererAffinity,
    pub dom_paste_enabled: bool,
    pub javascript_can_access_clipboard: bool,
    pub parent: Option<NativeView>,
}

impl WebViewCreateParams {
    pub fn from_defaults(defaults: &WebViewDefaults) -> Self {
        Self {
            initially_visible: defaults.initially_visible,
            take_focus_on_mouse_down: defaults.take_focus_on_mouse_down,
            renderer_affinity: RendererAffinity::default(),
            dom_paste_enabled: defaults.dom_paste_enabled,
            javascript_can_access_clipboard: defaults.javascript_can_access_clipboard,
            parent: None,
        }
    }
}

impl Default for WebViewCreateParams {
    fn default() -> Self {
        Self::from_defaults(&WebViewDefaults::default())
    }
}
