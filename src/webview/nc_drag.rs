// src/webview/nc_drag.rs
//! Non-client drag relay and drag geometry.
//!
//! A drag on a WebView's non-client area (caption or resize border) is
//! reported by the implementation as begin/move/end. The host relays it to
//! the application, which moves or resizes its root window. At most one
//! resize update or end is outstanding at a time: further pointer moves are
//! folded into the latest position and re-issued when the application acks.
//! Caption drags only move the window, so their updates are not acked.

use super::messages::ViewEvent;
use super::types::HitTestCode;
use crate::geometry::{Point, Rect, Size};
use log::{debug, trace, warn};

/// Host-side drag state for one view.
///
/// `begin` is never gated. A drag that begins while the previous drag's end
/// ack is still outstanding inherits that ack: its moves fold until the late
/// ack lands, which then re-issues one notification for the new drag. The
/// application can therefore see a request it did not expect for the new
/// drag. This double request is a known limitation and is left as is.
#[derive(Debug, Default)]
pub struct NcDragTracker {
    hit_test: Option<HitTestCode>,
    latest_point: Point,
    /// An end the application has not been told about yet.
    end_point: Option<Point>,
    dragging: bool,
    needs_ack: bool,
    ack_pending: bool,
}

impl NcDragTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ack_pending(&self) -> bool {
        self.ack_pending
    }

    pub fn begin(&mut self, hit_test: HitTestCode, point: Point) -> Vec<ViewEvent> {
        if self.dragging {
            warn!("NcDragTracker: Drag began before the previous one ended");
        }
        if self.ack_pending {
            debug!("NcDragTracker: Drag began with an ack outstanding from the previous drag");
        }
        self.hit_test = Some(hit_test);
        self.latest_point = point;
        self.end_point = None;
        self.dragging = true;
        self.needs_ack = hit_test.needs_drag_ack();
        vec![ViewEvent::NcDragBegin { hit_test, point }]
    }

    pub fn update(&mut self, point: Point) -> Vec<ViewEvent> {
        if !self.dragging {
            warn!("NcDragTracker: Drag move without a drag");
            return Vec::new();
        }
        self.latest_point = point;
        if self.ack_pending {
            trace!("NcDragTracker: Folding move to {:?}", point);
            return Vec::new();
        }
        self.ack_pending = self.needs_ack;
        vec![ViewEvent::NcDragMove(point)]
    }

    pub fn end(&mut self, point: Point) -> Vec<ViewEvent> {
        if !self.dragging {
            warn!("NcDragTracker: Drag end without a drag");
            return Vec::new();
        }
        self.dragging = false;
        self.latest_point = point;
        if self.ack_pending {
            self.end_point = Some(point);
            return Vec::new();
        }
        self.ack_pending = true;
        vec![ViewEvent::NcDragEnd(point)]
    }

    /// The application handled a move at `acked_point`.
    pub fn move_ack(&mut self, acked_point: Point) -> Vec<ViewEvent> {
        if !self.ack_pending {
            trace!("NcDragTracker: Dropping unexpected move ack");
            return Vec::new();
        }
        self.ack_pending = false;
        self.reissue(Some(acked_point))
    }

    pub fn end_ack(&mut self) -> Vec<ViewEvent> {
        if !self.ack_pending {
            trace!("NcDragTracker: Dropping unexpected end ack");
            return Vec::new();
        }
        self.ack_pending = false;
        self.reissue(None)
    }

    /// At most one notification per ack, with the latest pointer position.
    fn reissue(&mut self, acked_point: Option<Point>) -> Vec<ViewEvent> {
        if let Some(end_point) = self.end_point.take() {
            self.ack_pending = true;
            return vec![ViewEvent::NcDragEnd(end_point)];
        }
        if !self.dragging || acked_point == Some(self.latest_point) {
            return Vec::new();
        }
        trace!("NcDragTracker: Re-issuing move to {:?} for {:?}", self.latest_point, self.hit_test);
        self.ack_pending = self.needs_ack;
        vec![ViewEvent::NcDragMove(self.latest_point)]
    }
}

fn clamp(value: i32, min: i32, max: i32) -> i32 {
    debug_assert!(min <= max);
    value.max(min).min(max)
}

/// Computes the root window rectangle for a drag that started at
/// `start_point` over `start_rect` and is now at `point`.
///
/// Caption drags translate the rectangle; border drags move only the grabbed
/// edges, keeping the size within `min_track..=max_track`. Returns `None` for
/// hit-test codes that do not start a drag.
pub fn drag_rect(
    hit_test: HitTestCode,
    start_rect: Rect,
    start_point: Point,
    point: Point,
    min_track: Size,
    max_track: Size,
) -> Option<Rect> {
    let dx = point.x - start_point.x;
    let dy = point.y - start_point.y;
    let (mut left, mut top, mut right, mut bottom) =
        (start_rect.left(), start_rect.top(), start_rect.right(), start_rect.bottom());

    let grab_left = |left: &mut i32| {
        let min = start_rect.right() - max_track.width;
        let max = start_rect.right() - min_track.width;
        *left = clamp(start_rect.left() + dx, min, max);
    };
    let grab_right = |right: &mut i32| {
        let min = start_rect.left() + min_track.width;
        let max = start_rect.left() + max_track.width;
        *right = clamp(start_rect.right() + dx, min, max);
    };
    let grab_top = |top: &mut i32| {
        let min = start_rect.bottom() - max_track.height;
        let max = start_rect.bottom() - min_track.height;
        *top = clamp(start_rect.top() + dy, min, max);
    };
    let grab_bottom = |bottom: &mut i32| {
        let min = start_rect.top() + min_track.height;
        let max = start_rect.top() + max_track.height;
        *bottom = clamp(start_rect.bottom() + dy, min, max);
    };

    match hit_test {
        HitTestCode::Caption => {
            left += dx;
            right += dx;
            top += dy;
            bottom += dy;
        }
        HitTestCode::Top => grab_top(&mut top),
        HitTestCode::Bottom => grab_bottom(&mut bottom),
        HitTestCode::Left => grab_left(&mut left),
        HitTestCode::Right => grab_right(&mut right),
        HitTestCode::TopLeft => {
            grab_top(&mut top);
            grab_left(&mut left);
        }
        HitTestCode::TopRight => {
            grab_top(&mut top);
            grab_right(&mut right);
        }
        HitTestCode::BottomLeft => {
            grab_bottom(&mut bottom);
            grab_left(&mut left);
        }
        HitTestCode::BottomRight => {
            grab_bottom(&mut bottom);
            grab_right(&mut right);
        }
        HitTestCode::Error | HitTestCode::Nowhere | HitTestCode::Client => return None,
    }
    Some(Rect::from_edges(left, top, right, bottom))
}
