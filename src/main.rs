// src/main.rs

//! `bridge-shell`: runs the toolkit against a headless native queue and a
//! logging engine, loads one URL and shuts down. Useful for watching the pump
//! and the proxy protocol at `RUST_LOG=trace`.

use anyhow::Context;
use log::{info, warn};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use webview_bridge::config::{PumpMode, CONFIG};
use webview_bridge::geometry::{Rect, Size};
use webview_bridge::pump::{HeadlessQueue, NativeMessage};
use webview_bridge::webview::{
    ImplEvent, ImplEventSink, RoutingId, ViewEngine, ViewEvent, ViewOp, WebViewCreateParams, WebViewDelegate,
    WebViewImpl, WebViewProxy,
};
use webview_bridge::{EmbedderParts, Toolkit};

const LOAD_DEADLINE: Duration = Duration::from_secs(10);

/// Engine whose views log what they are asked to do and finish every load
/// immediately.
struct LoggingEngine;

impl ViewEngine for LoggingEngine {
    fn create_view(
        &mut self,
        routing_id: RoutingId,
        params: &WebViewCreateParams,
    ) -> anyhow::Result<Box<dyn WebViewImpl>> {
        info!("LoggingEngine: Creating {} with {:?}", routing_id, params);
        Ok(Box::new(LoggingView { sink: None }))
    }

    fn shutdown(&mut self) {
        info!("LoggingEngine: Shut down");
    }
}

struct LoggingView {
    sink: Option<ImplEventSink>,
}

impl LoggingView {
    fn notify(&self, event: ViewEvent) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.send(ImplEvent::Notify(event)) {
                warn!("LoggingView: {}", e);
            }
        }
    }
}

impl WebViewImpl for LoggingView {
    fn attach(&mut self, sink: ImplEventSink) {
        self.sink = Some(sink);
    }

    fn perform(&mut self, op: ViewOp) {
        info!("LoggingView: {:?}", op);
        if let ViewOp::LoadUrl(url) = op {
            self.notify(ViewEvent::DidNavigateMainFramePostCommit(url.clone()));
            self.notify(ViewEvent::DidFinishLoad(url));
        }
    }

    fn move_to(&mut self, rect: Rect) {
        info!("LoggingView: Moved to {:?}", rect);
    }

    fn renderer_matches_size(&self, _size: Size) -> bool {
        true
    }
}

struct ShellDelegate {
    loaded: Rc<Cell<bool>>,
}

impl WebViewDelegate for ShellDelegate {
    fn did_navigate_main_frame_post_commit(&mut self, source: &WebViewProxy, url: &str) {
        info!("Shell: {} committed {}", source.routing_id(), url);
    }

    fn did_finish_load(&mut self, source: &WebViewProxy, url: &str) {
        info!("Shell: {} finished loading {}", source.routing_id(), url);
        self.loaded.set(true);
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize the logger. Default filter is "info" if RUST_LOG is not set.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    info!("Starting bridge-shell...");
    let url = std::env::args().nth(1).unwrap_or_else(|| "about:blank".to_string());

    let queue = Arc::new(HeadlessQueue::new());
    let parts = EmbedderParts {
        native_queue: queue.clone(),
        engine: Box::new(LoggingEngine),
        app_work: None,
    };
    let toolkit = Toolkit::new(&CONFIG, parts).context("Failed to start the toolkit")?;

    let loaded = Rc::new(Cell::new(false));
    let view = toolkit.create_web_view(
        toolkit.default_create_params(),
        Some(Box::new(ShellDelegate { loaded: loaded.clone() })),
    );
    view.move_to(Rect::new(0, 0, 800, 600));
    view.load_url(&url);

    let started = Instant::now();
    while !loaded.get() {
        if started.elapsed() > LOAD_DEADLINE {
            warn!("Shell: Gave up waiting for {} after {:?}", url, LOAD_DEADLINE);
            break;
        }
        let Some(msg) = queue.get_message(Duration::from_millis(50)) else {
            continue;
        };
        if msg == NativeMessage::Quit {
            break;
        }
        match toolkit.pump_mode() {
            PumpMode::Manual => {
                // The shell has no windows of its own to dispatch to.
                toolkit.pre_handle_message(&msg);
                toolkit.post_handle_message(&msg);
            }
            PumpMode::Automatic => {
                toolkit.window_proc(&msg);
            }
        }
    }

    toolkit.shutdown();
    info!("bridge-shell exited");
    Ok(())
}
