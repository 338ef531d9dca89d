// src/threading/mod.rs
//! Cross-thread plumbing: task channels with wake-ups, and the browser-main
//! thread used in `RendererMain` mode.

pub mod browser_main;
pub mod task_queue;
pub mod waker;

pub use browser_main::BrowserMainThread;
pub use task_queue::{task_channel, PostError, TaskQueue, TaskSender};
pub use waker::{EventLoopWaker, NoopWaker};

use std::fmt;
use std::time::Duration;

/// Why the browser-main thread did not come up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupError {
    /// The thread did not report ready within the configured timeout.
    BrowserMainTimeout(Duration),
    /// The thread went away before reporting anything.
    BrowserMainExited,
    /// The engine refused to start.
    EngineStart(String),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::BrowserMainTimeout(timeout) => {
                write!(f, "browser-main thread not ready after {:?}", timeout)
            }
            StartupError::BrowserMainExited => write!(f, "browser-main thread exited during startup"),
            StartupError::EngineStart(reason) => write!(f, "engine failed to start: {}", reason),
        }
    }
}

impl std::error::Error for StartupError {}
