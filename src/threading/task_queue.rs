// src/threading/task_queue.rs
//! FIFO task channel with a doorbell.
//!
//! `TaskSender::send` enqueues, then rings the receiving loop's
//! [`EventLoopWaker`]. Tasks from one sender arrive in the order they were
//! sent.

use super::EventLoopWaker;
use log::warn;
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;

/// Error returned when posting to a thread whose queue is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostError {
    /// Receiver dropped, the target thread has shut down
    Disconnected,
}

impl fmt::Display for PostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostError::Disconnected => write!(f, "task queue disconnected"),
        }
    }
}

impl std::error::Error for PostError {}

impl<T> From<mpsc::SendError<T>> for PostError {
    fn from(_: mpsc::SendError<T>) -> Self {
        PostError::Disconnected
    }
}

/// Sending half. Clone it freely; every clone rings the same doorbell.
pub struct TaskSender<T> {
    tx: Sender<T>,
    waker: Arc<dyn EventLoopWaker>,
}

impl<T> Clone for TaskSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            waker: self.waker.clone(),
        }
    }
}

impl<T> TaskSender<T> {
    pub fn send(&self, task: T) -> Result<(), PostError> {
        self.tx.send(task)?;
        if let Err(e) = self.waker.wake() {
            // The task is queued; the next wake of any kind will find it.
            warn!("TaskSender: Failed to wake receiving loop: {:#}", e);
        }
        Ok(())
    }
}

/// Receiving half, owned by the loop that runs the tasks.
pub struct TaskQueue<T> {
    rx: Receiver<T>,
}

impl<T> TaskQueue<T> {
    /// Returns the next task without blocking.
    pub fn try_next(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(task) => Some(task),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Blocks for the next task. `None` once every sender is gone.
    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }
}

/// Creates a task channel whose sends wake `waker`.
pub fn task_channel<T>(waker: Arc<dyn EventLoopWaker>) -> (TaskSender<T>, TaskQueue<T>) {
    let (tx, rx) = mpsc::channel();
    (TaskSender { tx, waker }, TaskQueue { rx })
}
