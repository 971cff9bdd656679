//! Per-container drag/momentum/snap state machine.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    container::ScrollContainer,
    frame::{FrameHandle, FrameScheduler},
    pointer::{PRIMARY_BUTTON, PointerEvent, PointerInput, PointerKind},
};

/// Movement (px) a press must exceed to become a drag instead of a click.
pub const ACTIVATION_DISTANCE: f64 = 4.0;
/// Snap animation ends once within this distance (px).
pub const SETTLE_TOLERANCE: f64 = 0.5;
/// Share of the remaining snap distance covered per 60 Hz frame.
const SETTLE_EASING: f64 = 0.25;
const REFERENCE_FRAME_MS: f64 = 1000.0 / 60.0;
/// Longest frame delta fed into the simulation (ms), so a stalled tab does not jump.
const MAX_FRAME_DELTA_MS: f64 = 64.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumOptions {
    /// Release speed (px/ms) above which momentum kicks in.
    pub threshold: f64,
    /// Cap on release speed (px/ms).
    pub max_velocity: f64,
    /// Speed lost per millisecond (px/ms²).
    pub deceleration: f64,
    /// Items the strip snaps to.
    pub snap_selector: String,
}

impl Default for MomentumOptions {
    fn default() -> Self {
        Self {
            threshold: 0.005,
            max_velocity: 5.0,
            deceleration: 0.00375,
            snap_selector: ".forecast-item".to_string(),
        }
    }
}

impl MomentumOptions {
    /// Replace values that would stall or invert the simulation with defaults.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let positive = |value: f64, fallback: f64| {
            if value.is_finite() && value > 0.0 { value } else { fallback }
        };

        Self {
            threshold: if self.threshold.is_finite() && self.threshold >= 0.0 {
                self.threshold
            } else {
                defaults.threshold
            },
            max_velocity: positive(self.max_velocity, defaults.max_velocity),
            deceleration: positive(self.deceleration, defaults.deceleration),
            snap_selector: if self.snap_selector.trim().is_empty() {
                defaults.snap_selector
            } else {
                self.snap_selector
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollPhase {
    Idle,
    Dragging,
    Momentum,
    Settling,
}

/// One press-drag-release gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragState {
    pub pointer_id: i32,
    pub start_x: f64,
    pub scroll_left_at_start: f64,
    pub last_event_time: f64,
    pub last_scroll_left: f64,
    /// Scroll speed in px/ms; positive scrolls towards the end.
    pub velocity: f64,
    pub has_moved: bool,
    pub pointer_captured: bool,
}

impl DragState {
    fn new(event: &PointerEvent, scroll_left: f64) -> Self {
        Self {
            pointer_id: event.pointer_id,
            start_x: event.client_x,
            scroll_left_at_start: scroll_left,
            last_event_time: event.time_stamp,
            last_scroll_left: scroll_left,
            velocity: 0.0,
            has_moved: false,
            pointer_captured: false,
        }
    }
}

/// A running deceleration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentumState {
    pub velocity: f64,
    pub last_frame_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Motion {
    Idle,
    Dragging(DragState),
    Momentum(MomentumState),
    Settling { target: f64, last_frame_time: f64 },
}

/// What the host should do after an input was handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Reaction {
    prevent_default: bool,
    animate: bool,
}

pub(crate) type SharedEngine = Rc<RefCell<Engine>>;

#[derive(Debug)]
pub(crate) struct Engine {
    container: Rc<dyn ScrollContainer>,
    scheduler: Rc<dyn FrameScheduler>,
    options: MomentumOptions,
    motion: Motion,
    frame: Option<FrameHandle>,
    suppress_click: bool,
    detached: bool,
}

impl Engine {
    pub(crate) fn new(
        container: Rc<dyn ScrollContainer>,
        scheduler: Rc<dyn FrameScheduler>,
        options: MomentumOptions,
    ) -> SharedEngine {
        Rc::new(RefCell::new(Self {
            container,
            scheduler,
            options: options.sanitized(),
            motion: Motion::Idle,
            frame: None,
            suppress_click: false,
            detached: false,
        }))
    }

    pub(crate) fn phase(&self) -> ScrollPhase {
        match self.motion {
            Motion::Idle => ScrollPhase::Idle,
            Motion::Dragging(_) => ScrollPhase::Dragging,
            Motion::Momentum(_) => ScrollPhase::Momentum,
            Motion::Settling { .. } => ScrollPhase::Settling,
        }
    }

    pub(crate) fn drag_state(&self) -> Option<DragState> {
        match self.motion {
            Motion::Dragging(drag) => Some(drag),
            _ => None,
        }
    }

    pub(crate) fn momentum_state(&self) -> Option<MomentumState> {
        match self.motion {
            Motion::Momentum(momentum) => Some(momentum),
            _ => None,
        }
    }

    /// Feed one input. Returns whether the host should prevent the default action.
    pub(crate) fn handle(engine: &SharedEngine, input: PointerInput) -> bool {
        let mut this = engine.borrow_mut();
        if this.detached {
            return false;
        }

        let reaction = match input {
            PointerInput::Down(event) => this.on_down(&event),
            PointerInput::Move(event) => this.on_move(&event),
            PointerInput::Up(event) => this.on_release(&event, true),
            PointerInput::Cancel(event) => this.on_release(&event, false),
            PointerInput::Click => this.on_click(),
        };

        if reaction.animate {
            this.request_frame(Rc::downgrade(engine));
        }
        reaction.prevent_default
    }

    /// Stop everything and ignore further input.
    pub(crate) fn detach(&mut self) {
        if self.detached {
            return;
        }
        self.stop();
        self.detached = true;
        debug!(container = self.container.id().raw(), "momentum scroll detached");
    }

    fn on_down(&mut self, event: &PointerEvent) -> Reaction {
        if matches!(self.motion, Motion::Dragging(_)) {
            return Reaction::default();
        }
        if event.kind == PointerKind::Touch
            || event.button != PRIMARY_BUTTON
            || !self.container.overflows()
        {
            return Reaction::default();
        }

        self.stop();
        self.suppress_click = false;
        self.motion = Motion::Dragging(DragState::new(event, self.container.scroll_left()));

        Reaction::default()
    }

    fn on_move(&mut self, event: &PointerEvent) -> Reaction {
        let Motion::Dragging(drag) = &mut self.motion else {
            return Reaction::default();
        };
        if drag.pointer_id != event.pointer_id {
            return Reaction::default();
        }

        let dx = event.client_x - drag.start_x;
        if !drag.has_moved {
            if dx.abs() <= ACTIVATION_DISTANCE {
                return Reaction::default();
            }
            drag.has_moved = true;
            self.container.set_scrolling_state(true);
            match self.container.set_pointer_capture(event.pointer_id) {
                Ok(()) => drag.pointer_captured = true,
                Err(err) => warn!(pointer = event.pointer_id, %err, "tracking drag without pointer capture"),
            }
            debug!(container = self.container.id().raw(), "drag started");
        }

        let next = (drag.scroll_left_at_start - dx).clamp(0.0, self.container.max_scroll_left());
        self.container.set_scroll_left(next);

        let dt = event.time_stamp - drag.last_event_time;
        if dt > 0.0 {
            drag.velocity = (next - drag.last_scroll_left) / dt;
            drag.last_event_time = event.time_stamp;
            drag.last_scroll_left = next;
        }

        Reaction {
            prevent_default: true,
            animate: false,
        }
    }

    fn on_release(&mut self, event: &PointerEvent, is_up: bool) -> Reaction {
        let Motion::Dragging(drag) = self.motion else {
            return Reaction::default();
        };
        if drag.pointer_id != event.pointer_id {
            return Reaction::default();
        }

        if drag.pointer_captured {
            self.container.release_pointer_capture(drag.pointer_id);
        }

        if !drag.has_moved {
            // A plain click or tap; leave it to the host.
            self.motion = Motion::Idle;
            return Reaction::default();
        }

        self.suppress_click = is_up;

        let velocity = drag.velocity;
        let animate = if velocity.abs() > self.options.threshold {
            let velocity = velocity.clamp(-self.options.max_velocity, self.options.max_velocity);
            debug!(velocity, "momentum started");
            self.motion = Motion::Momentum(MomentumState {
                velocity,
                last_frame_time: event.time_stamp,
            });
            true
        } else {
            self.begin_settle(event.time_stamp)
        };

        Reaction {
            prevent_default: true,
            animate,
        }
    }

    fn on_click(&mut self) -> Reaction {
        let swallow = std::mem::take(&mut self.suppress_click);
        Reaction {
            prevent_default: swallow,
            animate: false,
        }
    }

    fn request_frame(&mut self, engine: Weak<RefCell<Engine>>) {
        if let Some(previous) = self.frame.take() {
            self.scheduler.cancel_frame(previous);
        }

        let handle = self.scheduler.request_frame(Box::new(move |time_stamp| {
            if let Some(engine) = engine.upgrade() {
                Engine::on_frame(&engine, time_stamp);
            }
        }));
        self.frame = Some(handle);
    }

    fn on_frame(engine: &SharedEngine, time_stamp: f64) {
        let mut this = engine.borrow_mut();
        this.frame = None;
        if this.detached {
            return;
        }

        if this.step(time_stamp) {
            this.request_frame(Rc::downgrade(engine));
        }
    }

    /// Advance the running animation by one frame. Returns whether another frame is needed.
    fn step(&mut self, time_stamp: f64) -> bool {
        if !self.container.is_connected() {
            debug!("container disconnected mid-animation");
            self.finish();
            return false;
        }

        match self.motion {
            Motion::Momentum(momentum) => self.step_momentum(momentum, time_stamp),
            Motion::Settling {
                target,
                last_frame_time,
            } => self.step_settle(target, last_frame_time, time_stamp),
            Motion::Idle | Motion::Dragging(_) => false,
        }
    }

    fn step_momentum(&mut self, momentum: MomentumState, time_stamp: f64) -> bool {
        let dt = (time_stamp - momentum.last_frame_time).min(MAX_FRAME_DELTA_MS);
        if dt <= 0.0 {
            return true;
        }

        let max = self.container.max_scroll_left();
        let velocity = momentum.velocity;
        let next = (self.container.scroll_left() + velocity * dt).clamp(0.0, max);
        self.container.set_scroll_left(next);

        let at_edge = (velocity < 0.0 && next <= 0.0) || (velocity > 0.0 && next >= max);
        let decrement = self.options.deceleration * dt;
        if at_edge || velocity.abs() <= decrement {
            debug!(scroll_left = next, at_edge, "momentum finished");
            return self.begin_settle(time_stamp);
        }

        self.motion = Motion::Momentum(MomentumState {
            velocity: velocity - velocity.signum() * decrement,
            last_frame_time: time_stamp,
        });
        true
    }

    fn step_settle(&mut self, target: f64, last_frame_time: f64, time_stamp: f64) -> bool {
        let current = self.container.scroll_left();
        let distance = target - current;
        if distance.abs() <= SETTLE_TOLERANCE {
            self.container.set_scroll_left(target);
            self.finish();
            return false;
        }

        let dt = (time_stamp - last_frame_time).clamp(0.0, MAX_FRAME_DELTA_MS);
        let eased = 1.0 - (1.0 - SETTLE_EASING).powf(dt / REFERENCE_FRAME_MS);
        self.container.set_scroll_left(current + distance * eased);

        // Hosts that round scrollLeft can stall short of the target.
        if dt > 0.0 && self.container.scroll_left() == current {
            self.container.set_scroll_left(target);
            self.finish();
            return false;
        }

        self.motion = Motion::Settling {
            target,
            last_frame_time: time_stamp,
        };
        true
    }

    /// Pick the snap target. Returns whether an animation is needed to reach it.
    fn begin_settle(&mut self, time_stamp: f64) -> bool {
        let current = self.container.scroll_left();
        let padding = self.container.padding_left();

        let nearest = self
            .container
            .item_offsets(&self.options.snap_selector)
            .into_iter()
            .map(|offset| offset - padding)
            .min_by(|a, b| (a - current).abs().total_cmp(&(b - current).abs()));

        let Some(target) = nearest else {
            self.finish();
            return false;
        };
        let target = target.clamp(0.0, self.container.max_scroll_left());

        if (target - current).abs() <= SETTLE_TOLERANCE {
            self.container.set_scroll_left(target);
            self.finish();
            return false;
        }

        debug!(from = current, to = target, "settling");
        self.motion = Motion::Settling {
            target,
            last_frame_time: time_stamp,
        };
        true
    }

    fn finish(&mut self) {
        self.motion = Motion::Idle;
        self.container.set_scrolling_state(false);
    }

    /// Cancel any frame, drop the gesture and return to idle.
    fn stop(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.scheduler.cancel_frame(frame);
        }
        if let Motion::Dragging(drag) = self.motion
            && drag.pointer_captured
        {
            self.container.release_pointer_capture(drag.pointer_id);
        }
        if self.phase() != ScrollPhase::Idle {
            self.finish();
        }
    }
}
