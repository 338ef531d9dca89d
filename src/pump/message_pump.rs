// src/pump/message_pump.rs
//! MessagePump - interleaves engine work with the host's native event loop.
//!
//! The pump has two wake paths:
//! - the *have-work* message, posted at most once per wake (guarded by an
//!   atomic counter so any thread may call `schedule_work`), and
//! - the pump *timer*, used in `Automatic` mode, during nested host loops and
//!   for delayed work.
//!
//! All other state is owned by the pump's thread. `MessagePump` is `!Sync` and
//! is shared on its thread through `Rc`; other threads only ever see a
//! [`PumpHandle`].

use super::{MessageFilter, NativeEventQueue, NativeMessage, QueueStatus, WorkSource};
use crate::config::{PumpConfig, PumpMode};
use crate::threading::EventLoopWaker;
use anyhow::Result;
use log::*;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Timer id used for the pump's own timer.
pub const PUMP_TIMER_ID: u32 = 1;

// have_work counter states.
const IDLE: u8 = 0;
const WAKE_PENDING: u8 = 1;
const DRAINING: u8 = 2;

/// Thread-affine pump flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpState {
    pub has_auto_pump_timer: bool,
    pub more_work_is_plausible: bool,
    pub is_nested_loop: bool,
    pub is_drag_resizing: bool,
    pub delayed_work_time: Option<Instant>,
}

struct PumpShared {
    mode: PumpMode,
    have_work_id: u32,
    have_work: AtomicU8,
    queue: Arc<dyn NativeEventQueue>,
}

/// Cross-thread handle to a pump. Cheap to clone; only wakes the pump.
#[derive(Clone)]
pub struct PumpHandle {
    shared: Arc<PumpShared>,
}

impl PumpHandle {
    pub fn new(mode: PumpMode, have_work_message_id: u32, queue: Arc<dyn NativeEventQueue>) -> Self {
        Self {
            shared: Arc::new(PumpShared {
                mode,
                have_work_id: have_work_message_id,
                have_work: AtomicU8::new(IDLE),
                queue,
            }),
        }
    }

    pub fn mode(&self) -> PumpMode {
        self.shared.mode
    }

    pub fn queue(&self) -> &Arc<dyn NativeEventQueue> {
        &self.shared.queue
    }

    /// The message the pump posts to wake itself.
    pub fn have_work_message(&self) -> NativeMessage {
        NativeMessage::Posted(self.shared.have_work_id)
    }

    pub fn is_have_work(&self, msg: &NativeMessage) -> bool {
        *msg == self.have_work_message()
    }

    /// Returns `true` for the have-work message and the pump timer.
    pub fn is_pump_message(&self, msg: &NativeMessage) -> bool {
        self.is_have_work(msg) || *msg == NativeMessage::Timer(PUMP_TIMER_ID)
    }

    /// Requests that the pump drain its work source soon. Callable from any
    /// thread and never blocks.
    ///
    /// At most one have-work message is outstanding at a time. During an
    /// `Automatic`-mode drain the request is recorded instead of posted; the
    /// drain re-arms the timer when it finishes.
    pub fn schedule_work(&self) {
        let have_work = &self.shared.have_work;
        let mut expected = IDLE;
        loop {
            match have_work.compare_exchange(expected, WAKE_PENDING, Ordering::AcqRel, Ordering::Acquire) {
                Ok(IDLE) => break,
                Ok(_) => {
                    trace!("MessagePump: Wake recorded during drain");
                    return;
                }
                Err(WAKE_PENDING) => return,
                Err(actual) => expected = actual,
            }
        }

        let msg = self.have_work_message();
        if let Err(e) = self.shared.queue.post(msg) {
            // Nothing will consume the flag, so release it for the next caller.
            have_work.store(IDLE, Ordering::Release);
            warn!("MessagePump: Failed to post have-work message: {:#}", e);
        }
    }

    fn have_work(&self) -> &AtomicU8 {
        &self.shared.have_work
    }
}

impl fmt::Debug for PumpHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PumpHandle")
            .field("mode", &self.shared.mode)
            .field("have_work", &self.shared.have_work.load(Ordering::Relaxed))
            .finish()
    }
}

impl EventLoopWaker for PumpHandle {
    fn wake(&self) -> Result<()> {
        self.schedule_work();
        Ok(())
    }
}

/// The application-thread message pump.
pub struct MessagePump {
    handle: PumpHandle,
    time_slice: Duration,
    state: Cell<PumpState>,
    work: RefCell<Box<dyn WorkSource>>,
    filter: RefCell<Option<Box<dyn MessageFilter>>>,
    running: Cell<bool>,
}

impl MessagePump {
    pub fn new(handle: PumpHandle, config: &PumpConfig, work: Box<dyn WorkSource>) -> Self {
        Self {
            handle,
            time_slice: config.time_slice(),
            state: Cell::new(PumpState::default()),
            work: RefCell::new(work),
            filter: RefCell::new(None),
            running: Cell::new(false),
        }
    }

    pub fn handle(&self) -> PumpHandle {
        self.handle.clone()
    }

    pub fn mode(&self) -> PumpMode {
        self.handle.mode()
    }

    pub fn state(&self) -> PumpState {
        self.state.get()
    }

    pub fn is_nested_loop(&self) -> bool {
        self.state.get().is_nested_loop
    }

    fn modify(&self, f: impl FnOnce(&mut PumpState)) {
        let mut state = self.state.get();
        f(&mut state);
        self.state.set(state);
    }

    fn queue(&self) -> &dyn NativeEventQueue {
        self.handle.queue().as_ref()
    }

    pub fn set_message_filter(&self, filter: Option<Box<dyn MessageFilter>>) {
        *self.filter.borrow_mut() = filter;
    }

    /// Starts accepting wake messages. Before `init` and after `cleanup` the
    /// pump ignores its own messages.
    pub fn init(&self) {
        info!("MessagePump: Started in {:?} mode", self.mode());
        self.running.set(true);
    }

    /// Kills the timer and drains all immediate and delayed work before the
    /// pump goes away. This is the pump's only blocking path.
    pub fn cleanup(&self) {
        if !self.running.replace(false) {
            return;
        }
        self.kill_timer();

        let Ok(mut work) = self.work.try_borrow_mut() else {
            error!("MessagePump: cleanup called from inside a work item, skipping final drain");
            return;
        };
        let mut next_delayed = self.state.get().delayed_work_time;
        let mut drained = 0usize;
        loop {
            let mut more = run_step("do_work", || work.do_work());
            more |= run_step("do_delayed_work", || work.do_delayed_work(&mut next_delayed));
            drained += 1;
            if !more {
                break;
            }
        }
        drop(work);
        self.modify(|s| {
            s.more_work_is_plausible = false;
            s.delayed_work_time = None;
        });
        info!("MessagePump: Cleanup complete after {} drain pass(es)", drained);
    }

    pub fn schedule_work(&self) {
        self.handle.schedule_work();
    }

    /// Host hook, `Manual` mode: call before dispatching `msg`. Returns `true`
    /// when the message was consumed and must not be dispatched.
    pub fn pre_handle_message(&self, msg: &NativeMessage) -> bool {
        debug_assert_eq!(self.mode(), PumpMode::Manual, "pre_handle_message used in Automatic mode");
        if self.window_proc(msg) {
            return true;
        }
        match self.filter.try_borrow_mut() {
            Ok(mut filter) => filter.as_mut().is_some_and(|f| f.process_message(msg)),
            Err(_) => {
                warn!("MessagePump: Message filter re-entered, passing {:?} through", msg);
                false
            }
        }
    }

    /// Host hook, `Manual` mode: call unconditionally after dispatching `msg`.
    pub fn post_handle_message(&self, msg: &NativeMessage) {
        // Reaching the top-level loop again means any nested loop has ended.
        if self.state.get().is_nested_loop {
            debug!("MessagePump: Exiting nested loop");
            self.modify(|s| s.is_nested_loop = false);
        }

        // Rotate the wake back onto the have-work path once the host message
        // that made the drain yield has been handled.
        if self.state.get().more_work_is_plausible && !self.handle.is_have_work(msg) {
            if self.state.get().has_auto_pump_timer {
                self.kill_timer();
            }
            self.schedule_work();
        }
    }

    /// The pump's window procedure. Handles the have-work message and the pump
    /// timer and returns `true` for them; every other message is ignored.
    pub fn window_proc(&self, msg: &NativeMessage) -> bool {
        if self.handle.is_have_work(msg) {
            self.handle_work_message();
            true
        } else if *msg == NativeMessage::Timer(PUMP_TIMER_ID) {
            self.handle_timer_message();
            true
        } else {
            false
        }
    }

    pub(crate) fn enter_nested_loop(&self) {
        if !self.state.get().is_nested_loop {
            debug!("MessagePump: Entering nested loop");
        }
        self.modify(|s| s.is_nested_loop = true);
        self.schedule_work();
    }

    pub(crate) fn set_drag_resizing(&self, resizing: bool) {
        debug!("MessagePump: Drag-resize {}", if resizing { "started" } else { "ended" });
        self.modify(|s| s.is_drag_resizing = resizing);
    }

    fn handle_work_message(&self) {
        if self.mode() == PumpMode::Manual {
            let old = self.handle.have_work().swap(IDLE, Ordering::AcqRel);
            debug_assert_eq!(old, WAKE_PENDING, "have-work message without a pending wake");
        }

        if !self.running.get() {
            return;
        }

        // Set before draining in case the drain yields immediately to a
        // pending native message; post_handle_message then re-arms the wake.
        self.modify(|s| s.more_work_is_plausible = true);

        if self.mode() == PumpMode::Automatic || self.is_nested_loop() {
            // Engine work runs at timer priority here so host messages are
            // never starved. In Automatic mode the wake stays pending until
            // the timer drains.
            self.arm_timer(Duration::ZERO);
            return;
        }

        self.do_work(false);
        self.schedule_more_work_if_necessary();
    }

    fn handle_timer_message(&self) {
        self.kill_timer();

        if !self.running.get() {
            return;
        }

        if self.mode() == PumpMode::Automatic {
            self.handle.have_work().store(DRAINING, Ordering::Release);
        }
        self.do_work(true);
        self.schedule_more_work_if_necessary();
    }

    fn arm_timer(&self, delay: Duration) {
        trace!("MessagePump: Arming timer for {:?}", delay);
        self.queue().set_timer(PUMP_TIMER_ID, delay);
        self.modify(|s| s.has_auto_pump_timer = true);
    }

    fn kill_timer(&self) {
        self.queue().kill_timer(PUMP_TIMER_ID);
        self.modify(|s| s.has_auto_pump_timer = false);
    }

    /// `true` when a native message that outranks engine work is pending.
    /// Flushes sent messages first.
    pub fn native_message_pending(&self) -> bool {
        let queue = self.queue();
        let mut status = queue.status();
        while status.contains(QueueStatus::SENT) {
            if queue.peek() {
                return true;
            }
            status = queue.status();
        }
        status.intersects(QueueStatus::YIELD_MASK)
    }

    /// Whether a drain in progress should hand control back to the host.
    /// Always yields while the host runs an interactive resize/move loop.
    pub fn should_stop_doing_work(&self) -> bool {
        self.state.get().is_drag_resizing || self.native_message_pending()
    }

    /// Drains the work source until it runs dry or the host needs the thread.
    /// Timer-driven drains (and every drain in `Automatic` mode) are bounded by
    /// the configured time slice.
    pub fn do_work(&self, timer_driven: bool) {
        let mode = self.mode();
        if mode == PumpMode::Manual && self.native_message_pending() {
            trace!("MessagePump: Native message pending, deferring drain");
            return;
        }

        let Ok(mut work) = self.work.try_borrow_mut() else {
            // A work item is spinning a nested loop that dispatched our wake.
            debug!("MessagePump: Re-entrant drain refused, re-arming timer");
            self.modify(|s| s.more_work_is_plausible = true);
            self.arm_timer(Duration::ZERO);
            return;
        };

        let bounded = timer_driven || mode == PumpMode::Automatic;
        let started = Instant::now();
        let out_of_time = || bounded && started.elapsed() >= self.time_slice;
        let mut next_delayed = self.state.get().delayed_work_time;

        loop {
            let immediate = run_step("do_work", || work.do_work());
            self.modify(|s| s.more_work_is_plausible = immediate);
            let mut more = immediate;
            more |= run_step("do_delayed_work", || work.do_delayed_work(&mut next_delayed));
            self.modify(|s| s.delayed_work_time = next_delayed);

            if self.should_stop_doing_work() || out_of_time() {
                break;
            }
            if more {
                continue;
            }

            more = run_step("do_idle_work", || work.do_idle_work());
            if !more || self.should_stop_doing_work() || out_of_time() {
                break;
            }
        }

        if bounded && started.elapsed() >= self.time_slice {
            trace!("MessagePump: Drain hit its {:?} slice", self.time_slice);
        }
    }

    /// Picks the next wake after a drain.
    pub fn schedule_more_work_if_necessary(&self) {
        let mode = self.mode();
        let mut raced = false;
        if mode == PumpMode::Automatic {
            // A foreign schedule_work during the drain flipped DRAINING to
            // WAKE_PENDING without posting; that wake is ours to deliver.
            raced = self
                .handle
                .have_work()
                .compare_exchange(DRAINING, IDLE, Ordering::AcqRel, Ordering::Acquire)
                .is_err();
        }

        let state = self.state.get();
        if state.more_work_is_plausible || raced {
            match mode {
                PumpMode::Automatic => {
                    if !raced {
                        // Keep foreign wakes quiet while the timer is armed.
                        let _ = self.handle.have_work().compare_exchange(
                            IDLE,
                            WAKE_PENDING,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        );
                    }
                    self.arm_timer(Duration::ZERO);
                }
                PumpMode::Manual if state.is_nested_loop => self.arm_timer(Duration::ZERO),
                // A pending native message means post_handle_message re-arms
                // the wake once it has been handled.
                PumpMode::Manual if !self.native_message_pending() => self.schedule_work(),
                PumpMode::Manual => {}
            }
        } else if let Some(when) = state.delayed_work_time {
            self.arm_timer(when.saturating_duration_since(Instant::now()));
        }
    }
}

/// Runs one work source step, containing any panic to the pump.
fn run_step(step: &str, f: impl FnOnce() -> bool) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(more) => more,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!("MessagePump: Work source panicked in {}: {}", step, reason);
            // The failed item is gone; whatever follows it may still be ready.
            true
        }
    }
}
