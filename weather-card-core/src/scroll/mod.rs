//! Momentum drag-scrolling for horizontally scrollable forecast strips.
//!
//! Mouse and pen drags move the strip directly; on release the strip keeps
//! gliding, decelerates, and finally snaps so an item lines up with the
//! start of the viewport. Touch input is left to the platform.
//!
//! The host owns the containers and the display loop. It attaches each
//! container to a [`MomentumScroll`] registry, forwards pointer input through
//! [`MomentumScroll::dispatch`] and calls the returned [`Cleanup`] when the
//! container goes away.

mod container;
mod engine;
mod frame;
mod pointer;

use std::{
    cell::RefCell,
    collections::HashMap,
    fmt,
    rc::{Rc, Weak},
};

use tracing::debug;

pub use container::{ContainerId, MemoryContainer, ScrollContainer};
pub use engine::{
    ACTIVATION_DISTANCE, DragState, MomentumOptions, MomentumState, SETTLE_TOLERANCE, ScrollPhase,
};
pub use frame::{FrameCallback, FrameHandle, FrameScheduler, ManualFrameScheduler};
pub use pointer::{PRIMARY_BUTTON, PointerEvent, PointerInput, PointerKind};

use engine::{Engine, SharedEngine};

type EngineMap = RefCell<HashMap<ContainerId, SharedEngine>>;

/// Registry of attached containers sharing one frame scheduler.
#[derive(Debug)]
pub struct MomentumScroll {
    scheduler: Rc<dyn FrameScheduler>,
    engines: Rc<EngineMap>,
}

impl MomentumScroll {
    pub fn new(scheduler: Rc<dyn FrameScheduler>) -> Self {
        Self {
            scheduler,
            engines: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Start handling drags on `container`.
    ///
    /// Attaching an already attached container returns its existing cleanup
    /// handle; the new `options` are ignored in that case.
    pub fn attach(&self, container: Rc<dyn ScrollContainer>, options: MomentumOptions) -> Cleanup {
        let id = container.id();

        if let Some(existing) = self.engines.borrow().get(&id) {
            return Cleanup::new(id, &self.engines, existing);
        }

        let engine = Engine::new(container, Rc::clone(&self.scheduler), options);
        self.engines.borrow_mut().insert(id, Rc::clone(&engine));
        debug!(container = id.raw(), "momentum scroll attached");

        Cleanup::new(id, &self.engines, &engine)
    }

    /// Detach `id` if attached. Safe to call repeatedly.
    pub fn detach(&self, id: ContainerId) {
        let engine = self.engines.borrow_mut().remove(&id);
        if let Some(engine) = engine {
            engine.borrow_mut().detach();
        }
    }

    /// Forward pointer input for `id`. Returns whether the host should
    /// prevent the event's default action.
    pub fn dispatch(&self, id: ContainerId, input: PointerInput) -> bool {
        let engine = self.engines.borrow().get(&id).cloned();
        match engine {
            Some(engine) => Engine::handle(&engine, input),
            None => false,
        }
    }

    pub fn phase(&self, id: ContainerId) -> Option<ScrollPhase> {
        self.with_engine(id, |engine| engine.phase())
    }

    pub fn drag_state(&self, id: ContainerId) -> Option<DragState> {
        self.with_engine(id, |engine| engine.drag_state()).flatten()
    }

    pub fn momentum_state(&self, id: ContainerId) -> Option<MomentumState> {
        self.with_engine(id, |engine| engine.momentum_state()).flatten()
    }

    pub fn is_attached(&self, id: ContainerId) -> bool {
        self.engines.borrow().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.engines.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.borrow().is_empty()
    }

    fn with_engine<T>(&self, id: ContainerId, f: impl FnOnce(&Engine) -> T) -> Option<T> {
        let engine = self.engines.borrow().get(&id).cloned()?;
        let engine = engine.borrow();
        Some(f(&engine))
    }
}

/// Detaches one container. Idempotent, and a no-op once the registry is gone
/// or the container was re-attached through a different handle.
#[derive(Clone)]
pub struct Cleanup {
    id: ContainerId,
    engines: Weak<EngineMap>,
    engine: Weak<RefCell<Engine>>,
}

impl Cleanup {
    fn new(id: ContainerId, engines: &Rc<EngineMap>, engine: &SharedEngine) -> Self {
        Self {
            id,
            engines: Rc::downgrade(engines),
            engine: Rc::downgrade(engine),
        }
    }

    pub fn container_id(&self) -> ContainerId {
        self.id
    }

    pub fn call(&self) {
        let Some(engine) = self.engine.upgrade() else {
            return;
        };

        if let Some(engines) = self.engines.upgrade() {
            let mut engines = engines.borrow_mut();
            if engines
                .get(&self.id)
                .is_some_and(|current| Rc::ptr_eq(current, &engine))
            {
                engines.remove(&self.id);
            }
        }

        engine.borrow_mut().detach();
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cleanup").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_FRAMES: usize = 1_000;

    struct Harness {
        scheduler: Rc<ManualFrameScheduler>,
        registry: MomentumScroll,
        container: Rc<MemoryContainer>,
        id: ContainerId,
        cleanup: Cleanup,
    }

    impl Harness {
        /// 2000 px of content in a 500 px viewport, items every 100 px.
        fn new() -> Self {
            Self::with_container(MemoryContainer::new(2000.0, 500.0, 100.0))
        }

        fn with_container(container: MemoryContainer) -> Self {
            let scheduler = Rc::new(ManualFrameScheduler::new(0.0));
            let registry = MomentumScroll::new(scheduler.clone());
            let container = Rc::new(container);
            let id = container.id();
            let cleanup = registry.attach(container.clone(), MomentumOptions::default());

            Self {
                scheduler,
                registry,
                container,
                id,
                cleanup,
            }
        }

        fn send(&self, input: PointerInput) -> bool {
            self.registry.dispatch(self.id, input)
        }

        fn event(&self, pointer_id: i32, x: f64) -> PointerEvent {
            PointerEvent::mouse(pointer_id, x, self.scheduler.now())
        }

        fn press(&self, pointer_id: i32, x: f64) -> bool {
            self.send(PointerInput::Down(self.event(pointer_id, x)))
        }

        fn move_to(&self, pointer_id: i32, x: f64) -> bool {
            self.send(PointerInput::Move(self.event(pointer_id, x)))
        }

        fn release(&self, pointer_id: i32, x: f64) -> bool {
            self.send(PointerInput::Up(self.event(pointer_id, x)))
        }

        fn cancel(&self, pointer_id: i32, x: f64) -> bool {
            self.send(PointerInput::Cancel(self.event(pointer_id, x)))
        }

        /// Let `ms` pass, running any frames that were due.
        fn wait(&self, ms: f64) {
            self.scheduler.tick_by(ms);
        }

        /// Press at `from`, move to `to` after `duration` ms and release there.
        fn drag(&self, from: f64, to: f64, duration: f64) {
            self.press(1, from);
            self.wait(duration);
            self.move_to(1, to);
            self.release(1, to);
        }

        fn phase(&self) -> Option<ScrollPhase> {
            self.registry.phase(self.id)
        }

        fn scroll_left(&self) -> f64 {
            self.container.scroll_left()
        }
    }

    #[test]
    fn fast_release_glides_forward_then_snaps() {
        let h = Harness::new();
        h.press(1, 300.0);
        h.wait(100.0);
        h.move_to(1, 200.0);

        let drag = h.registry.drag_state(h.id).expect("dragging");
        assert!((drag.velocity - 1.0).abs() < 1e-9);
        assert_eq!(h.scroll_left(), 100.0);

        h.release(1, 200.0);
        assert_eq!(h.phase(), Some(ScrollPhase::Momentum));

        let mut previous = h.scroll_left();
        let mut frames = 0;
        while h.phase() == Some(ScrollPhase::Momentum) && frames < MAX_FRAMES {
            h.scheduler.tick();
            frames += 1;
            let current = h.scroll_left();
            assert!(current > previous, "frame {frames}: {current} <= {previous}");
            assert!((0.0..=1500.0).contains(&current));
            previous = current;
        }
        assert!(previous > 200.0);

        h.scheduler.run_until_idle(MAX_FRAMES);
        assert_eq!(h.phase(), Some(ScrollPhase::Idle));

        let settled = h.scroll_left();
        assert!((0.0..=1500.0).contains(&settled));
        assert_eq!(settled % 100.0, 0.0, "snapped to an item edge, got {settled}");
        assert!(!h.container.is_scrolling_state());
        assert_eq!(h.scheduler.pending(), 0);
    }

    #[test]
    fn momentum_stops_at_the_end_of_the_strip() {
        let h = Harness::new();
        h.container.set_scroll_left(1400.0);

        // 60 px in 10 ms is above the 5 px/ms cap.
        h.drag(300.0, 240.0, 10.0);

        let momentum = h.registry.momentum_state(h.id).expect("momentum");
        assert_eq!(momentum.velocity, 5.0);

        h.scheduler.run_until_idle(MAX_FRAMES);
        assert_eq!(h.phase(), Some(ScrollPhase::Idle));
        assert_eq!(h.scroll_left(), 1500.0);
    }

    #[test]
    fn slow_release_snaps_without_momentum() {
        let h = Harness::new();
        // 130 px over 2 s, then the pointer comes to rest before letting go.
        h.press(1, 400.0);
        h.wait(2000.0);
        h.move_to(1, 270.0);
        h.wait(500.0);
        h.move_to(1, 270.0);
        assert_eq!(h.registry.drag_state(h.id).unwrap().velocity, 0.0);
        h.release(1, 270.0);

        assert_eq!(h.phase(), Some(ScrollPhase::Settling));
        h.scheduler.run_until_idle(MAX_FRAMES);

        assert_eq!(h.phase(), Some(ScrollPhase::Idle));
        assert_eq!(h.scroll_left(), 100.0);
    }

    #[test]
    fn dragging_backwards_scrolls_towards_the_start() {
        let h = Harness::new();
        h.container.set_scroll_left(1000.0);
        h.drag(200.0, 260.0, 60.0);

        assert!(h.registry.momentum_state(h.id).unwrap().velocity < 0.0);
        h.scheduler.run_until_idle(MAX_FRAMES);

        let settled = h.scroll_left();
        assert!(settled < 940.0);
        assert_eq!(settled % 100.0, 0.0);
    }

    #[test]
    fn snapping_accounts_for_left_padding() {
        let h = Harness::with_container(MemoryContainer::with_padding(2000.0, 500.0, 100.0, 16.0));
        h.press(1, 400.0);
        h.wait(1000.0);
        h.move_to(1, 280.0);
        h.wait(500.0);
        h.move_to(1, 280.0);
        h.release(1, 280.0);
        h.scheduler.run_until_idle(MAX_FRAMES);

        // Items start at 16, 116, ... so aligned positions are 0, 100, ...
        assert_eq!(h.scroll_left(), 100.0);
    }

    #[test]
    fn small_movement_stays_a_click() {
        let h = Harness::new();
        h.press(1, 300.0);
        h.wait(20.0);
        assert!(!h.move_to(1, 297.0));
        assert!(!h.container.is_scrolling_state());
        assert_eq!(h.container.captured_pointer(), None);

        h.release(1, 297.0);
        assert_eq!(h.phase(), Some(ScrollPhase::Idle));
        assert_eq!(h.scroll_left(), 0.0);
        assert!(!h.send(PointerInput::Click));
    }

    #[test]
    fn pausing_before_release_keeps_the_drag_velocity() {
        let h = Harness::new();
        h.press(1, 300.0);
        h.wait(100.0);
        h.move_to(1, 200.0);
        h.wait(150.0);
        h.release(1, 200.0);

        let momentum = h.registry.momentum_state(h.id).expect("momentum");
        assert!((momentum.velocity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn moving_exactly_the_activation_distance_is_not_a_drag() {
        let h = Harness::new();
        h.press(1, 300.0);
        h.wait(20.0);
        assert!(!h.move_to(1, 296.0));
        assert!(!h.container.is_scrolling_state());
        assert_eq!(h.scroll_left(), 0.0);

        h.wait(20.0);
        assert!(h.move_to(1, 295.0));
        assert_eq!(h.scroll_left(), 5.0);
    }

    #[test]
    fn cancel_after_a_fast_drag_glides_without_arming_click_suppression() {
        let h = Harness::new();
        h.press(1, 300.0);
        h.wait(100.0);
        h.move_to(1, 200.0);
        assert!(h.cancel(1, 200.0));

        assert_eq!(h.phase(), Some(ScrollPhase::Momentum));
        assert_eq!(h.container.captured_pointer(), None);
        assert!(!h.send(PointerInput::Click));

        h.scheduler.run_until_idle(MAX_FRAMES);
        assert_eq!(h.phase(), Some(ScrollPhase::Idle));
        assert_eq!(h.scroll_left() % 100.0, 0.0);
    }

    #[test]
    fn slow_cancel_settles_on_an_item() {
        let h = Harness::new();
        h.press(1, 400.0);
        h.wait(2000.0);
        h.move_to(1, 270.0);
        h.wait(100.0);
        h.move_to(1, 270.0);
        h.cancel(1, 270.0);

        assert_eq!(h.phase(), Some(ScrollPhase::Settling));
        h.scheduler.run_until_idle(MAX_FRAMES);
        assert_eq!(h.scroll_left(), 100.0);
    }

    #[test]
    fn cancel_before_the_activation_distance_returns_to_idle() {
        let h = Harness::new();
        h.press(1, 300.0);
        h.wait(20.0);
        h.move_to(1, 298.0);

        assert!(!h.cancel(1, 298.0));
        assert_eq!(h.phase(), Some(ScrollPhase::Idle));
        assert_eq!(h.scroll_left(), 0.0);
        assert_eq!(h.scheduler.pending(), 0);
    }

    #[test]
    fn click_after_a_drag_is_swallowed_once() {
        let h = Harness::new();
        h.drag(300.0, 250.0, 50.0);

        assert!(h.send(PointerInput::Click));
        assert!(!h.send(PointerInput::Click));
    }

    #[test]
    fn drag_captures_the_pointer_and_releases_it() {
        let h = Harness::new();
        h.press(7, 300.0);
        h.wait(16.0);
        h.move_to(7, 280.0);

        assert_eq!(h.container.captured_pointer(), Some(7));
        assert!(h.container.is_scrolling_state());

        h.wait(16.0);
        h.release(7, 280.0);
        assert_eq!(h.container.captured_pointer(), None);
    }

    #[test]
    fn refused_capture_does_not_abort_the_drag() {
        let h = Harness::new();
        h.container.refuse_capture(true);

        h.press(1, 300.0);
        h.wait(16.0);
        h.move_to(1, 250.0);

        assert_eq!(h.scroll_left(), 50.0);
        let drag = h.registry.drag_state(h.id).unwrap();
        assert!(drag.has_moved);
        assert!(!drag.pointer_captured);
    }

    #[test]
    fn touch_secondary_buttons_and_short_content_are_ignored() {
        let h = Harness::new();
        let touch = h.event(1, 300.0).with_kind(PointerKind::Touch);
        h.send(PointerInput::Down(touch));
        assert_eq!(h.phase(), Some(ScrollPhase::Idle));

        let right = h.event(1, 300.0).with_button(2);
        h.send(PointerInput::Down(right));
        assert_eq!(h.phase(), Some(ScrollPhase::Idle));

        let pen = h.event(1, 300.0).with_kind(PointerKind::Pen);
        h.send(PointerInput::Down(pen));
        assert_eq!(h.phase(), Some(ScrollPhase::Dragging));

        let fits = Harness::with_container(MemoryContainer::new(400.0, 500.0, 100.0));
        fits.press(1, 300.0);
        assert_eq!(fits.phase(), Some(ScrollPhase::Idle));
    }

    #[test]
    fn second_pointer_is_ignored_while_dragging() {
        let h = Harness::new();
        h.press(1, 300.0);
        h.press(2, 100.0);
        h.move_to(2, 0.0);

        assert_eq!(h.registry.drag_state(h.id).unwrap().pointer_id, 1);
        assert_eq!(h.scroll_left(), 0.0);

        h.move_to(1, 250.0);
        assert_eq!(h.scroll_left(), 50.0);
    }

    #[test]
    fn same_timestamp_moves_do_not_divide_by_zero() {
        let h = Harness::new();
        h.press(1, 300.0);
        h.move_to(1, 250.0);

        let drag = h.registry.drag_state(h.id).unwrap();
        assert_eq!(h.scroll_left(), 50.0);
        assert_eq!(drag.velocity, 0.0);

        h.wait(50.0);
        h.move_to(1, 200.0);
        // Both moves are measured against the press: 100 px in 50 ms.
        assert_eq!(h.registry.drag_state(h.id).unwrap().velocity, 2.0);
    }

    #[test]
    fn new_press_cancels_running_momentum() {
        let h = Harness::new();
        h.drag(300.0, 200.0, 100.0);
        h.scheduler.tick();
        assert_eq!(h.phase(), Some(ScrollPhase::Momentum));

        h.press(1, 300.0);
        assert_eq!(h.phase(), Some(ScrollPhase::Dragging));
        assert_eq!(h.scheduler.pending(), 0);

        let held = h.scroll_left();
        h.scheduler.tick();
        assert_eq!(h.scroll_left(), held);
    }

    #[test]
    fn cleanup_halts_momentum_and_ignores_later_input() {
        let h = Harness::new();
        h.drag(300.0, 200.0, 100.0);
        h.scheduler.tick();
        assert_eq!(h.phase(), Some(ScrollPhase::Momentum));

        h.cleanup.call();
        let writes = h.container.scroll_writes();
        let position = h.scroll_left();

        for _ in 0..10 {
            h.scheduler.tick();
        }
        h.drag(300.0, 100.0, 50.0);

        assert_eq!(h.container.scroll_writes(), writes);
        assert_eq!(h.scroll_left(), position);
        assert_eq!(h.scheduler.pending(), 0);
        assert!(!h.registry.is_attached(h.id));
        assert!(!h.container.is_scrolling_state());

        // Calling again is harmless.
        h.cleanup.call();
        h.registry.detach(h.id);
    }

    #[test]
    fn attaching_twice_returns_the_same_cleanup() {
        let h = Harness::new();
        let again = h
            .registry
            .attach(h.container.clone(), MomentumOptions::default());
        assert_eq!(again.container_id(), h.id);
        assert_eq!(h.registry.len(), 1);

        again.call();
        assert!(h.registry.is_empty());

        h.drag(300.0, 100.0, 50.0);
        h.scheduler.run_until_idle(MAX_FRAMES);
        assert_eq!(h.scroll_left(), 0.0);
        assert_eq!(h.container.scroll_writes(), 0);
    }

    #[test]
    fn stale_cleanup_does_not_detach_a_fresh_attachment() {
        let h = Harness::new();
        h.cleanup.call();
        let fresh = h
            .registry
            .attach(h.container.clone(), MomentumOptions::default());

        h.cleanup.call();
        assert!(h.registry.is_attached(h.id));

        fresh.call();
        assert!(!h.registry.is_attached(h.id));
    }

    #[test]
    fn disconnecting_mid_animation_returns_to_idle() {
        let h = Harness::new();
        h.drag(300.0, 200.0, 100.0);
        h.container.set_connected(false);

        h.scheduler.tick();
        assert_eq!(h.phase(), Some(ScrollPhase::Idle));
        assert_eq!(h.scheduler.pending(), 0);
    }

    #[test]
    fn containers_scroll_independently() {
        let scheduler = Rc::new(ManualFrameScheduler::new(0.0));
        let registry = MomentumScroll::new(scheduler.clone());
        let a = Rc::new(MemoryContainer::new(2000.0, 500.0, 100.0));
        let b = Rc::new(MemoryContainer::new(2000.0, 500.0, 100.0));
        registry.attach(a.clone(), MomentumOptions::default());
        let cleanup_b = registry.attach(b.clone(), MomentumOptions::default());

        registry.dispatch(a.id(), PointerInput::Down(PointerEvent::mouse(1, 300.0, 0.0)));
        scheduler.tick_by(100.0);
        registry.dispatch(a.id(), PointerInput::Move(PointerEvent::mouse(1, 200.0, 100.0)));
        registry.dispatch(a.id(), PointerInput::Up(PointerEvent::mouse(1, 200.0, 100.0)));
        cleanup_b.call();

        scheduler.run_until_idle(MAX_FRAMES);
        assert!(a.scroll_left() > 100.0);
        assert_eq!(b.scroll_left(), 0.0);
        assert_eq!(registry.phase(a.id()), Some(ScrollPhase::Idle));
    }

    #[test]
    fn options_fall_back_to_defaults_when_unusable() {
        let options = MomentumOptions {
            threshold: -1.0,
            max_velocity: f64::NAN,
            deceleration: 0.0,
            snap_selector: "  ".into(),
        }
        .sanitized();

        assert_eq!(options, MomentumOptions::default());
    }
}
