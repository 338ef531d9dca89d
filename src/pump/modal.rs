// src/pump/modal.rs
//! Nested/modal host loop detection.
//!
//! The host OS runs its own loops for menus, modal dialogs and interactive
//! resize/move. Those loops dispatch messages without going through the
//! host's `pre_handle_message`/`post_handle_message` calls, so the pump must be
//! told about them. Platform code forwards its hook notifications to a
//! [`HostLoopObserver`]; tests call the observer directly.

use super::MessagePump;
use log::trace;
use std::rc::Rc;

/// Receives host loop transitions.
pub trait HostLoopObserver {
    fn on_nested_loop_enter(&self);
    fn on_nested_loop_exit(&self);
    fn on_drag_resize_enter(&self);
    fn on_drag_resize_exit(&self);
}

/// Message-filter hook codes reported while the host runs a modal loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterCode {
    DialogBox,
    Menu,
    ScrollBar,
    Other(i32),
}

impl FilterCode {
    fn is_modal(self) -> bool {
        matches!(self, FilterCode::DialogBox | FilterCode::Menu | FilterCode::ScrollBar)
    }
}

/// Window notifications that bracket host-owned loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowNotification {
    EnterSizeMove,
    ExitSizeMove,
    EnterMenuLoop,
    ExitMenuLoop,
}

/// Flips the pump's nested-loop and drag-resize flags.
///
/// The nested-loop flag is only ever set here; `post_handle_message` clears it
/// the next time control reaches the top-level loop, because generic modal
/// loops have no reliable exit notification.
#[derive(Clone)]
pub struct ModalLoopDetector {
    pump: Rc<MessagePump>,
}

impl ModalLoopDetector {
    pub fn new(pump: Rc<MessagePump>) -> Self {
        Self { pump }
    }

    /// Adapter for a message-filter hook. Enters a nested loop once per
    /// modal episode.
    pub fn on_message_filter(&self, code: FilterCode) {
        if code.is_modal() && !self.pump.is_nested_loop() {
            trace!("ModalLoopDetector: Filter code {:?} entered a modal loop", code);
            self.on_nested_loop_enter();
        }
    }

    /// Adapter for window-procedure notifications.
    pub fn on_window_notification(&self, notification: WindowNotification) {
        trace!("ModalLoopDetector: {:?}", notification);
        match notification {
            WindowNotification::EnterSizeMove => self.on_drag_resize_enter(),
            WindowNotification::ExitSizeMove => self.on_drag_resize_exit(),
            WindowNotification::EnterMenuLoop => self.on_nested_loop_enter(),
            WindowNotification::ExitMenuLoop => self.on_nested_loop_exit(),
        }
    }
}

impl HostLoopObserver for ModalLoopDetector {
    fn on_nested_loop_enter(&self) {
        self.pump.enter_nested_loop();
    }

    fn on_nested_loop_exit(&self) {
        // Cleared lazily by post_handle_message.
    }

    fn on_drag_resize_enter(&self) {
        self.pump.set_drag_resizing(true);
        self.pump.enter_nested_loop();
    }

    fn on_drag_resize_exit(&self) {
        self.pump.set_drag_resizing(false);
    }
}
