// src/webview/mod.rs
//! WebView proxy/host protocol.
//!
//! The application holds [`WebViewProxy`] handles on its own thread. Each one
//! is paired with a `WebViewHost` that owns the engine's [`WebViewImpl`],
//! either on a dedicated browser-main thread or on the application thread
//! itself, depending on the thread mode.

pub mod engine;
pub mod find;
pub mod host;
pub mod messages;
pub mod nc_drag;
pub mod proxy;
pub mod types;

pub use engine::{ImplEventSink, ViewEngine, WebViewImpl};
pub use find::{FindOnPage, FindRequest};
pub use host::{HostTable, WebViewHost};
pub use messages::{AppTask, BrowserTask, ImplEvent, ViewCommand, ViewEvent, ViewOp};
pub use nc_drag::{drag_rect, NcDragTracker};
pub use proxy::{ViewTable, WebViewDelegate, WebViewProxy};
pub use types::*;

#[cfg(test)]
pub(crate) mod test_support;
