// src/toolkit/mod.rs
//! Toolkit entry point.
//!
//! `Toolkit` wires the pieces together for one application thread: the
//! message pump on the host's native queue, the application task queue that
//! wakes it, and the WebView hosts, either on this thread (`Original`) or on
//! a spawned browser-main thread (`RendererMain`). The modes are fixed at
//! construction.

mod app_tasks;

use crate::config::{PumpMode, ThreadMode, ToolkitConfig};
use crate::pump::{MessagePump, ModalLoopDetector, NativeEventQueue, NativeMessage, PumpHandle, WorkSource};
use crate::threading::{task_channel, BrowserMainThread, EventLoopWaker};
use crate::webview::proxy::{ProxyContext, Transport};
use crate::webview::{
    AppTask, HostTable, ImplEventSink, RoutingId, RoutingIdAllocator, ViewEngine, WebViewCreateParams,
    WebViewDelegate, WebViewProxy,
};
use anyhow::{Context, Result};
use app_tasks::AppTaskRunner;
use log::*;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// What the embedding application brings.
pub struct EmbedderParts {
    /// The host's native event queue, shared with whatever loop dispatches it.
    pub native_queue: Arc<dyn NativeEventQueue>,
    /// Creates the real WebViews. Moved to browser-main in `RendererMain` mode.
    pub engine: Box<dyn ViewEngine>,
    /// Extra work to run from the pump, after the toolkit's own tasks.
    pub app_work: Option<Box<dyn WorkSource>>,
}

enum Backend {
    Original(Rc<RefCell<HostTable>>),
    RendererMain(Option<BrowserMainThread>),
}

pub struct Toolkit {
    config: ToolkitConfig,
    pump: Rc<MessagePump>,
    ctx: Rc<ProxyContext>,
    backend: Backend,
    shut_down: bool,
}

impl Toolkit {
    /// Builds the toolkit on the calling thread, which becomes the
    /// application thread. In `RendererMain` mode this blocks until
    /// browser-main is ready, failing with a
    /// [`StartupError`](crate::threading::StartupError) otherwise.
    pub fn new(config: &ToolkitConfig, parts: EmbedderParts) -> Result<Self> {
        info!(
            "Toolkit: Starting (pump_mode={:?}, thread_mode={:?})",
            config.pump_mode, config.thread_mode
        );
        let handle = PumpHandle::new(config.pump_mode, config.pump.have_work_message_id, parts.native_queue);
        let waker: Arc<dyn EventLoopWaker> = Arc::new(handle.clone());
        let (app_tx, app_queue) = task_channel::<AppTask>(waker);
        let ids = Arc::new(RoutingIdAllocator::new());

        let (backend, transport) = match config.thread_mode {
            ThreadMode::Original => {
                let sinks = ImplEventSink::to_app(RoutingId(0), app_tx.clone());
                let mut hosts = HostTable::new(parts.engine, app_tx.clone(), sinks, ids.clone());
                hosts.start().context("Failed to start the engine on the application thread")?;
                let hosts = Rc::new(RefCell::new(hosts));
                (Backend::Original(hosts.clone()), Transport::Local(hosts))
            }
            ThreadMode::RendererMain => {
                let thread = BrowserMainThread::spawn(parts.engine, app_tx.clone(), ids.clone(), &config.threading)?;
                let tx = thread.sender();
                (Backend::RendererMain(Some(thread)), Transport::Remote(tx))
            }
        };

        let ctx = ProxyContext::new(transport, app_tx, ids);
        let runner = AppTaskRunner::new(app_queue, ctx.clone(), parts.app_work);
        let pump = Rc::new(MessagePump::new(handle, &config.pump, Box::new(runner)));
        pump.init();

        Ok(Self {
            config: config.clone(),
            pump,
            ctx,
            backend,
            shut_down: false,
        })
    }

    pub fn pump_mode(&self) -> PumpMode {
        self.config.pump_mode
    }

    pub fn thread_mode(&self) -> ThreadMode {
        self.config.thread_mode
    }

    pub fn pump(&self) -> &Rc<MessagePump> {
        &self.pump
    }

    /// Creation parameters seeded from the configured WebView defaults.
    pub fn default_create_params(&self) -> WebViewCreateParams {
        WebViewCreateParams::from_defaults(&self.config.webview)
    }

    /// Starts creating a view. The handle is usable at once; operations
    /// queue behind the creation.
    pub fn create_web_view(
        &self,
        params: WebViewCreateParams,
        delegate: Option<Box<dyn WebViewDelegate>>,
    ) -> WebViewProxy {
        self.ctx.create_view(params, delegate)
    }

    /// Number of views whose application-side state is still held.
    pub fn view_count(&self) -> usize {
        self.ctx.view_count()
    }

    /// `Manual` mode hook, see [`MessagePump::pre_handle_message`].
    pub fn pre_handle_message(&self, msg: &NativeMessage) -> bool {
        self.pump.pre_handle_message(msg)
    }

    /// `Manual` mode hook, see [`MessagePump::post_handle_message`].
    pub fn post_handle_message(&self, msg: &NativeMessage) {
        self.pump.post_handle_message(msg)
    }

    /// Routes a message addressed to the pump's window. Hosts in `Automatic`
    /// mode call this from their window procedure.
    pub fn window_proc(&self, msg: &NativeMessage) -> bool {
        self.pump.window_proc(msg)
    }

    pub fn modal_loop_detector(&self) -> ModalLoopDetector {
        ModalLoopDetector::new(self.pump.clone())
    }

    /// Returns once browser-main has run every task posted so far. Hosts on
    /// the application thread are always in sync.
    pub fn sync(&self) -> Result<()> {
        if let Backend::RendererMain(Some(thread)) = &self.backend {
            thread.sync().context("browser-main went away")?;
        }
        Ok(())
    }

    /// Destroys every view, drains outstanding work and stops browser-main.
    pub fn shutdown(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if std::mem::replace(&mut self.shut_down, true) {
            return;
        }
        info!("Toolkit: Shutting down with {} view(s)", self.ctx.view_count());
        match &mut self.backend {
            Backend::Original(hosts) => match hosts.try_borrow_mut() {
                Ok(mut hosts) => hosts.destroy_all(),
                Err(_) => error!("Toolkit: Shutdown from inside a host call, views not destroyed"),
            },
            Backend::RendererMain(thread) => {
                if let Some(thread) = thread.take() {
                    thread.shutdown();
                }
            }
        }
        // Delivers the destroy acks and anything else still queued.
        self.pump.cleanup();
        // Delegates may hold handles back into the context.
        self.ctx.clear();
        info!("Toolkit: Shutdown complete");
    }
}

impl Drop for Toolkit {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests;
