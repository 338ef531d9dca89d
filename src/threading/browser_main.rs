// src/threading/browser_main.rs
//! Browser-main thread - owns every WebView host in `RendererMain` mode.
//!
//! The thread builds a [`HostTable`], starts the engine, reports ready, then
//! blocks on its task queue until told to quit. The application thread talks
//! to it only through [`BrowserTask`]s.

use super::{task_channel, NoopWaker, PostError, StartupError, TaskQueue, TaskSender};
use crate::config::ThreadingConfig;
use crate::webview::{AppTask, BrowserTask, HostTable, ImplEventSink, RoutingId, RoutingIdAllocator, ViewEngine};
use anyhow::{Context, Result};
use log::*;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub struct BrowserMainThread {
    tx: TaskSender<BrowserTask>,
    thread_handle: Option<JoinHandle<()>>,
}

impl BrowserMainThread {
    /// Spawns the thread and blocks until it is ready.
    ///
    /// Fails with a [`StartupError`] when the engine does not start or the
    /// thread does not report within `config.startup_timeout()`.
    pub fn spawn(
        engine: Box<dyn ViewEngine>,
        app_tx: TaskSender<AppTask>,
        ids: Arc<RoutingIdAllocator>,
        config: &ThreadingConfig,
    ) -> Result<Self> {
        info!("BrowserMain: Spawning '{}' thread", config.browser_thread_name);

        // The loop blocks on its own channel, so senders need no doorbell.
        let (tx, queue) = task_channel::<BrowserTask>(Arc::new(NoopWaker));
        let sinks = ImplEventSink::to_browser_main(RoutingId(0), tx.clone());
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), String>>(1);

        let thread_handle = thread::Builder::new()
            .name(config.browser_thread_name.clone())
            .spawn(move || {
                let mut hosts = HostTable::new(engine, app_tx, sinks, ids);
                if let Err(e) = hosts.start() {
                    error!("BrowserMain: Engine failed to start: {:#}", e);
                    let _ = ready_tx.send(Err(format!("{:#}", e)));
                    return;
                }
                if ready_tx.send(Ok(())).is_err() {
                    warn!("BrowserMain: Application stopped waiting, shutting down");
                    hosts.destroy_all();
                    return;
                }
                Self::thread_main(hosts, queue);
            })
            .context("Failed to spawn browser-main thread")?;

        let timeout = config.startup_timeout();
        match ready_rx.recv_timeout(timeout) {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => {
                let _ = thread_handle.join();
                return Err(StartupError::EngineStart(reason).into());
            }
            Err(RecvTimeoutError::Timeout) => {
                // Left detached; it exits on its own once startup finishes.
                error!("BrowserMain: Not ready after {:?}", timeout);
                return Err(StartupError::BrowserMainTimeout(timeout).into());
            }
            Err(RecvTimeoutError::Disconnected) => {
                if let Err(e) = thread_handle.join() {
                    error!("BrowserMain: Thread panicked during startup: {:?}", e);
                }
                return Err(StartupError::BrowserMainExited.into());
            }
        }

        info!("BrowserMain: Ready");
        Ok(Self {
            tx,
            thread_handle: Some(thread_handle),
        })
    }

    fn thread_main(mut hosts: HostTable, queue: TaskQueue<BrowserTask>) {
        debug!("BrowserMain: Starting task loop");
        while let Some(task) = queue.recv() {
            if !hosts.handle_task(task) {
                info!("BrowserMain: Quit received");
                break;
            }
        }
        if !hosts.is_empty() {
            hosts.destroy_all();
        }
        debug!("BrowserMain: Task loop finished");
    }

    pub fn sender(&self) -> TaskSender<BrowserTask> {
        self.tx.clone()
    }

    /// Returns once every task posted before this call has run.
    pub fn sync(&self) -> Result<(), PostError> {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        self.tx.send(BrowserTask::Sync(reply_tx))?;
        reply_rx.recv().map_err(|_| PostError::Disconnected)
    }

    /// Destroys every remaining view, stops the thread and joins it.
    pub fn shutdown(mut self) {
        let _ = self.tx.send(BrowserTask::DestroyAll);
        self.join();
    }

    fn join(&mut self) {
        let Some(handle) = self.thread_handle.take() else {
            return;
        };
        let _ = self.tx.send(BrowserTask::Quit);
        if let Err(e) = handle.join() {
            error!("BrowserMain thread panicked: {:?}", e);
        }
    }
}

impl Drop for BrowserMainThread {
    fn drop(&mut self) {
        debug!("BrowserMainThread dropped");
        self.join();
    }
}
