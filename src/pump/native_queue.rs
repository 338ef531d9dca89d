// src/pump/native_queue.rs
//! The host's per-thread native event queue, as seen by the pump.
//!
//! The pump never retrieves messages itself. It only posts its wake message,
//! arms or kills its timer, and inspects the queue status to decide when to
//! hand control back to the host loop. `HeadlessQueue` is an in-memory
//! implementation used by the shell binary and the tests.

use anyhow::{bail, Result};
use bitflags::bitflags;
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

bitflags! {
    /// Pending-message classes reported by [`NativeEventQueue::status`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct QueueStatus: u32 {
        const KEY = 0x0001;
        const MOUSE_MOVE = 0x0002;
        const MOUSE_BUTTON = 0x0004;
        const POSTED = 0x0008;
        const TIMER = 0x0010;
        const PAINT = 0x0020;
        const SENT = 0x0040;
        const HOTKEY = 0x0080;
        const ALL_POSTED = 0x0100;

        const INPUT = Self::KEY.bits() | Self::MOUSE_MOVE.bits() | Self::MOUSE_BUTTON.bits();
        /// Classes that must be serviced before the pump runs more engine work.
        const YIELD_MASK = Self::POSTED.bits()
            | Self::ALL_POSTED.bits()
            | Self::HOTKEY.bits()
            | Self::PAINT.bits()
            | Self::TIMER.bits();
    }
}

/// A message retrieved from (or posted to) the native queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeMessage {
    /// Synchronous cross-thread message. Delivered before anything else.
    Sent(u32),
    /// Asynchronous message posted to the thread.
    Posted(u32),
    /// Keyboard or mouse input.
    Input(u32),
    Paint,
    /// A timer elapsed. Carries the timer id.
    Timer(u32),
    Quit,
}

/// Host event queue contract. Implementations must be callable from any
/// thread; only `post` is used off the owning thread.
pub trait NativeEventQueue: Send + Sync {
    /// Non-consuming snapshot of the pending message classes.
    fn status(&self) -> QueueStatus;

    /// Non-destructive peek. Delivers pending sent messages as a side effect
    /// and reports whether a message is ready to be retrieved.
    fn peek(&self) -> bool;

    /// Posts a message to the owning thread. Fails once the queue is closed.
    fn post(&self, msg: NativeMessage) -> Result<()>;

    /// Arms (or re-arms) a repeating timer.
    fn set_timer(&self, id: u32, delay: Duration);

    fn kill_timer(&self, id: u32);
}

struct HeadlessTimer {
    period: Duration,
    deadline: Instant,
}

#[derive(Default)]
struct HeadlessInner {
    sent: VecDeque<NativeMessage>,
    posted: VecDeque<NativeMessage>,
    input: VecDeque<NativeMessage>,
    paint: bool,
    quit: bool,
    closed: bool,
    timers: HashMap<u32, HeadlessTimer>,
    delivered_sent: usize,
}

impl HeadlessInner {
    fn due_timer(&self, now: Instant) -> Option<u32> {
        self.timers
            .iter()
            .filter(|(_, t)| t.deadline <= now)
            .min_by_key(|(_, t)| t.deadline)
            .map(|(id, _)| *id)
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|t| t.deadline).min()
    }

    /// Retrieval order: sent, posted, input, quit, paint, timer.
    fn take(&mut self, now: Instant) -> Option<NativeMessage> {
        if let Some(msg) = self.sent.pop_front() {
            return Some(msg);
        }
        if let Some(msg) = self.posted.pop_front() {
            return Some(msg);
        }
        if let Some(msg) = self.input.pop_front() {
            return Some(msg);
        }
        if self.quit {
            self.quit = false;
            return Some(NativeMessage::Quit);
        }
        if self.paint {
            self.paint = false;
            return Some(NativeMessage::Paint);
        }
        let id = self.due_timer(now)?;
        if let Some(timer) = self.timers.get_mut(&id) {
            timer.deadline = now + timer.period;
        }
        Some(NativeMessage::Timer(id))
    }
}

/// In-memory native queue with Win32-like retrieval priorities.
///
/// Timers repeat until killed. A zero-delay timer becomes due immediately but,
/// like any timer, is only retrieved once nothing else is pending.
#[derive(Default)]
pub struct HeadlessQueue {
    inner: Mutex<HeadlessInner>,
    available: Condvar,
}

impl HeadlessQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessInner> {
        // A panicking test thread must not wedge every other user of the queue.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queues a synchronous message, as another thread blocked in a send would.
    pub fn send(&self, msg: NativeMessage) {
        self.lock().sent.push_back(msg);
        self.available.notify_all();
    }

    pub fn push_input(&self, msg: NativeMessage) {
        self.lock().input.push_back(msg);
        self.available.notify_all();
    }

    pub fn invalidate(&self) {
        self.lock().paint = true;
        self.available.notify_all();
    }

    pub fn post_quit(&self) {
        self.lock().quit = true;
        self.available.notify_all();
    }

    /// Closes the queue; later `post` calls fail.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    /// Number of sent messages delivered by `peek` instead of retrieval.
    pub fn delivered_sent_count(&self) -> usize {
        self.lock().delivered_sent
    }

    pub fn is_timer_armed(&self, id: u32) -> bool {
        self.lock().timers.contains_key(&id)
    }

    /// Messages currently pending in the posted class, in order.
    pub fn posted_messages(&self) -> Vec<NativeMessage> {
        self.lock().posted.iter().copied().collect()
    }

    /// Retrieves the next message without blocking.
    pub fn try_get_message(&self) -> Option<NativeMessage> {
        self.lock().take(Instant::now())
    }

    /// Retrieves the next message, waiting up to `timeout` for one to arrive
    /// or for a timer to become due.
    pub fn get_message(&self, timeout: Duration) -> Option<NativeMessage> {
        let give_up = Instant::now() + timeout;
        let mut inner = self.lock();
        loop {
            let now = Instant::now();
            if let Some(msg) = inner.take(now) {
                return Some(msg);
            }
            if now >= give_up || inner.closed {
                return None;
            }
            let wake_at = inner.next_deadline().map_or(give_up, |d| d.min(give_up));
            let wait = wake_at.saturating_duration_since(now);
            inner = match self.available.wait_timeout(inner, wait) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

impl NativeEventQueue for HeadlessQueue {
    fn status(&self) -> QueueStatus {
        let inner = self.lock();
        let mut status = QueueStatus::empty();
        if !inner.sent.is_empty() {
            status |= QueueStatus::SENT;
        }
        if !inner.posted.is_empty() || inner.quit {
            status |= QueueStatus::POSTED | QueueStatus::ALL_POSTED;
        }
        if !inner.input.is_empty() {
            status |= QueueStatus::KEY;
        }
        if inner.paint {
            status |= QueueStatus::PAINT;
        }
        if inner.due_timer(Instant::now()).is_some() {
            status |= QueueStatus::TIMER;
        }
        status
    }

    fn peek(&self) -> bool {
        let mut inner = self.lock();
        let delivered = inner.sent.len();
        if delivered > 0 {
            trace!("HeadlessQueue: Delivering {} sent message(s) during peek", delivered);
            inner.sent.clear();
            inner.delivered_sent += delivered;
        }
        !inner.posted.is_empty()
            || !inner.input.is_empty()
            || inner.quit
            || inner.paint
            || inner.due_timer(Instant::now()).is_some()
    }

    fn post(&self, msg: NativeMessage) -> Result<()> {
        let mut inner = self.lock();
        if inner.closed {
            bail!("HeadlessQueue: Queue closed, dropping {:?}", msg);
        }
        inner.posted.push_back(msg);
        drop(inner);
        self.available.notify_all();
        Ok(())
    }

    fn set_timer(&self, id: u32, delay: Duration) {
        let deadline = Instant::now() + delay;
        // A zero period would make the timer due on every retrieval.
        let period = delay.max(Duration::from_millis(1));
        self.lock().timers.insert(id, HeadlessTimer { period, deadline });
        self.available.notify_all();
    }

    fn kill_timer(&self, id: u32) {
        self.lock().timers.remove(&id);
    }
}
