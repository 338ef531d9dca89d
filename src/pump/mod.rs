// src/pump/mod.rs
//! Application-thread message pump.
//!
//! Engine work (a [`WorkSource`]) and host messages (a [`NativeEventQueue`])
//! share one thread. The [`MessagePump`] decides when to drain engine work
//! without starving the host, and [`ModalLoopDetector`] keeps it informed
//! about nested host loops it cannot otherwise see.

mod message_pump;
mod modal;
mod native_queue;
mod work_source;

pub use message_pump::{MessagePump, PumpHandle, PumpState, PUMP_TIMER_ID};
pub use modal::{FilterCode, HostLoopObserver, ModalLoopDetector, WindowNotification};
pub use native_queue::{HeadlessQueue, NativeEventQueue, NativeMessage, QueueStatus};
pub use work_source::{MessageFilter, WorkSource};
