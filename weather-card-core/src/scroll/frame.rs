use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    fmt,
};

/// Called with the frame timestamp in milliseconds.
pub type FrameCallback = Box<dyn FnOnce(f64)>;

/// Token returned by [`FrameScheduler::request_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameHandle(u64);

impl FrameHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// The host's display loop (`requestAnimationFrame` in a browser).
///
/// Callbacks must never run synchronously from inside `request_frame`.
pub trait FrameScheduler: fmt::Debug {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle;
    fn cancel_frame(&self, handle: FrameHandle);
}

/// Frame loop driven by hand, for tests and headless replays.
pub struct ManualFrameScheduler {
    now: Cell<f64>,
    interval: f64,
    next_id: Cell<u64>,
    pending: RefCell<BTreeMap<FrameHandle, FrameCallback>>,
}

impl ManualFrameScheduler {
    /// 60 Hz refresh rate.
    pub const DEFAULT_INTERVAL_MS: f64 = 1000.0 / 60.0;

    pub fn new(start_ms: f64) -> Self {
        Self::with_interval(start_ms, Self::DEFAULT_INTERVAL_MS)
    }

    pub fn with_interval(start_ms: f64, interval_ms: f64) -> Self {
        Self {
            now: Cell::new(start_ms),
            interval: interval_ms,
            next_id: Cell::new(1),
            pending: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn now(&self) -> f64 {
        self.now.get()
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Advance one refresh interval and run the callbacks queued before it.
    pub fn tick(&self) -> usize {
        self.tick_by(self.interval)
    }

    /// Advance by `delta_ms` and run the callbacks queued before the tick.
    /// Callbacks requested while running wait for the next tick.
    pub fn tick_by(&self, delta_ms: f64) -> usize {
        let now = self.now.get() + delta_ms;
        self.now.set(now);

        let due = std::mem::take(&mut *self.pending.borrow_mut());
        let count = due.len();
        for callback in due.into_values() {
            callback(now);
        }
        count
    }

    /// Tick until nothing is queued, up to `max_frames`. Returns the ticks spent.
    pub fn run_until_idle(&self, max_frames: usize) -> usize {
        let mut frames = 0;
        while frames < max_frames && self.pending() > 0 {
            self.tick();
            frames += 1;
        }
        frames
    }
}

impl fmt::Debug for ManualFrameScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualFrameScheduler")
            .field("now", &self.now.get())
            .field("interval", &self.interval)
            .field("pending", &self.pending())
            .finish()
    }
}

impl FrameScheduler for ManualFrameScheduler {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let handle = FrameHandle::new(self.next_id.get());
        self.next_id.set(handle.raw() + 1);
        self.pending.borrow_mut().insert(handle, callback);
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.pending.borrow_mut().remove(&handle);
    }
}
