#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerKind {
    Mouse,
    Pen,
    Touch,
}

/// Button index of the primary (usually left) button.
pub const PRIMARY_BUTTON: i16 = 0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub pointer_id: i32,
    pub kind: PointerKind,
    pub button: i16,
    pub client_x: f64,
    /// Milliseconds, on the same clock as frame timestamps.
    pub time_stamp: f64,
}

impl PointerEvent {
    pub fn mouse(pointer_id: i32, client_x: f64, time_stamp: f64) -> Self {
        Self {
            pointer_id,
            kind: PointerKind::Mouse,
            button: PRIMARY_BUTTON,
            client_x,
            time_stamp,
        }
    }

    pub fn with_kind(mut self, kind: PointerKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_button(mut self, button: i16) -> Self {
        self.button = button;
        self
    }
}

/// Input delivered by the host to an attached container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerInput {
    Down(PointerEvent),
    Move(PointerEvent),
    Up(PointerEvent),
    Cancel(PointerEvent),
    Click,
}
