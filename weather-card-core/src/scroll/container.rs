use std::{
    cell::Cell,
    fmt::Debug,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::error::CaptureError;

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a scroll container, used to key the engine registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(u64);

impl ContainerId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// A process-unique id.
    pub fn next() -> Self {
        Self(NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A horizontally scrollable element owned by the host.
pub trait ScrollContainer: Debug {
    fn id(&self) -> ContainerId;

    fn scroll_left(&self) -> f64;
    fn set_scroll_left(&self, value: f64);
    fn scroll_width(&self) -> f64;
    fn client_width(&self) -> f64;

    fn padding_left(&self) -> f64 {
        0.0
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn set_pointer_capture(&self, pointer_id: i32) -> Result<(), CaptureError>;
    fn release_pointer_capture(&self, pointer_id: i32);

    /// Left edges of the elements matching `selector`, in scroll content coordinates.
    fn item_offsets(&self, selector: &str) -> Vec<f64>;

    /// Toggle the "being dragged" styling.
    fn set_scrolling_state(&self, active: bool);

    fn max_scroll_left(&self) -> f64 {
        (self.scroll_width() - self.client_width()).max(0.0)
    }

    fn overflows(&self) -> bool {
        self.scroll_width() > self.client_width()
    }
}

/// A scroll strip of equally wide items, kept in memory.
#[derive(Debug)]
pub struct MemoryContainer {
    id: ContainerId,
    scroll_left: Cell<f64>,
    scroll_width: f64,
    client_width: f64,
    padding_left: f64,
    item_selector: String,
    item_offsets: Vec<f64>,
    connected: Cell<bool>,
    refuse_capture: Cell<bool>,
    captured: Cell<Option<i32>>,
    scrolling: Cell<bool>,
    writes: Cell<usize>,
}

impl MemoryContainer {
    pub const DEFAULT_ITEM_SELECTOR: &'static str = ".forecast-item";

    /// A strip of `item_width` wide items filling `scroll_width`.
    pub fn new(scroll_width: f64, client_width: f64, item_width: f64) -> Self {
        Self::with_padding(scroll_width, client_width, item_width, 0.0)
    }

    pub fn with_padding(
        scroll_width: f64,
        client_width: f64,
        item_width: f64,
        padding_left: f64,
    ) -> Self {
        let mut item_offsets = Vec::new();
        if item_width > 0.0 {
            let mut offset = padding_left;
            while offset < scroll_width {
                item_offsets.push(offset);
                offset += item_width;
            }
        }

        Self {
            id: ContainerId::next(),
            scroll_left: Cell::new(0.0),
            scroll_width,
            client_width,
            padding_left,
            item_selector: Self::DEFAULT_ITEM_SELECTOR.to_string(),
            item_offsets,
            connected: Cell::new(true),
            refuse_capture: Cell::new(false),
            captured: Cell::new(None),
            scrolling: Cell::new(false),
            writes: Cell::new(0),
        }
    }

    pub fn set_item_selector(&mut self, selector: impl Into<String>) {
        self.item_selector = selector.into();
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.set(connected);
    }

    /// Make subsequent pointer capture requests fail.
    pub fn refuse_capture(&self, refuse: bool) {
        self.refuse_capture.set(refuse);
    }

    pub fn captured_pointer(&self) -> Option<i32> {
        self.captured.get()
    }

    pub fn is_scrolling_state(&self) -> bool {
        self.scrolling.get()
    }

    /// Number of `set_scroll_left` calls so far.
    pub fn scroll_writes(&self) -> usize {
        self.writes.get()
    }
}

impl ScrollContainer for MemoryContainer {
    fn id(&self) -> ContainerId {
        self.id
    }

    fn scroll_left(&self) -> f64 {
        self.scroll_left.get()
    }

    fn set_scroll_left(&self, value: f64) {
        // Same clamping as a browser applies to scrollLeft.
        self.scroll_left.set(value.clamp(0.0, self.max_scroll_left()));
        self.writes.set(self.writes.get() + 1);
    }

    fn scroll_width(&self) -> f64 {
        self.scroll_width
    }

    fn client_width(&self) -> f64 {
        self.client_width
    }

    fn padding_left(&self) -> f64 {
        self.padding_left
    }

    fn is_connected(&self) -> bool {
        self.connected.get()
    }

    fn set_pointer_capture(&self, pointer_id: i32) -> Result<(), CaptureError> {
        if !self.connected.get() {
            return Err(CaptureError::NotConnected);
        }
        if self.refuse_capture.get() {
            return Err(CaptureError::InactivePointer(pointer_id));
        }
        self.captured.set(Some(pointer_id));
        Ok(())
    }

    fn release_pointer_capture(&self, pointer_id: i32) {
        if self.captured.get() == Some(pointer_id) {
            self.captured.set(None);
        }
    }

    fn item_offsets(&self, selector: &str) -> Vec<f64> {
        if selector == self.item_selector {
            self.item_offsets.clone()
        } else {
            Vec::new()
        }
    }

    fn set_scrolling_state(&self, active: bool) {
        self.scrolling.set(active);
    }
}
