// src/pump/work_source.rs

use super::NativeMessage;
use std::time::Instant;

/// The engine's internal task queue, drained cooperatively by the pump.
///
/// Every step returns `true` when more work is plausibly ready. Sources run on
/// the pump's thread only, so they need not be `Send`.
pub trait WorkSource {
    /// Runs at least one ready immediate task, if any.
    fn do_work(&mut self) -> bool;

    /// Runs delayed tasks that are due and updates `next_delayed_work_time`
    /// to the earliest remaining deadline (`None` when there is none).
    fn do_delayed_work(&mut self, next_delayed_work_time: &mut Option<Instant>) -> bool;

    /// Runs low-priority work once the immediate queue is empty.
    fn do_idle_work(&mut self) -> bool;
}

/// Engine-side pre-dispatch filter consulted by `pre_handle_message` for
/// messages that are not the pump's own.
pub trait MessageFilter {
    /// Returns `true` when the message was consumed and must not be dispatched.
    fn process_message(&mut self, msg: &NativeMessage) -> bool;
}
