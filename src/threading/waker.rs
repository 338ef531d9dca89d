// src/threading/waker.rs
//! EventLoopWaker - cross-thread signaling to wake a thread's event loop.
//!
//! Whoever posts a task to another thread's queue calls `wake()` afterwards so
//! the owning loop notices the task. The application thread's pump handle is
//! the main implementation; a blocking channel loop needs no waker at all.

use anyhow::Result;

/// Trait for waking an event loop from other threads.
pub trait EventLoopWaker: Send + Sync {
    /// Wake the event loop, causing it to look for pending work.
    fn wake(&self) -> Result<()>;
}

/// Waker for loops that block on their own channel and wake on delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopWaker;

impl EventLoopWaker for NoopWaker {
    fn wake(&self) -> Result<()> {
        Ok(())
    }
}
