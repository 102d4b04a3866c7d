//! Press counting and debouncing for the user switches SW1 and SW2

use ufmt::derive::uDebug;

/// Debounce window used by the debounced counter example
pub const DEBOUNCE_MS: u32 = 10;

/// The Launchpad has two user buttons on port J
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub enum Button {
    /// SW1 on PJ0
    Sw1,
    /// SW2 on PJ1
    Sw2,
}

impl Button {
    /// Both buttons, in pin order
    pub const ALL: [Button; 2] = [Button::Sw1, Button::Sw2];

    /// Bit of this button in the port J registers
    pub const fn pin_mask(self) -> u32 {
        match self {
            Button::Sw1 => 1 << 0,
            Button::Sw2 => 1 << 1,
        }
    }

    /// Buttons flagged in a port J interrupt status word
    pub fn flagged(status: u32) -> impl Iterator<Item = Button> {
        Self::ALL
            .into_iter()
            .filter(move |b| status & b.pin_mask() != 0)
    }

    const fn index(self) -> usize {
        match self {
            Button::Sw1 => 0,
            Button::Sw2 => 1,
        }
    }
}

/// Rejects edges that arrive within `window_ms` of the last accepted one
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Debouncer {
    window_ms: u32,
    last_ms: Option<u32>,
}

impl Debouncer {
    /// A window of zero accepts every edge
    pub const fn new(window_ms: u32) -> Self {
        Debouncer {
            window_ms,
            last_ms: None,
        }
    }

    /// Decide whether an edge at `now_ms` is real. Timestamps may wrap.
    pub fn accept(&mut self, now_ms: u32) -> bool {
        match self.last_ms {
            Some(last) if now_ms.wrapping_sub(last) < self.window_ms => false,
            _ => {
                self.last_ms = Some(now_ms);
                true
            }
        }
    }
}

/// An accepted change of a button
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub struct ButtonEvent {
    /// Which button changed
    pub button: Button,
    /// New level; true while held down
    pub pressed: bool,
    /// Presses counted so far on this button, including this one
    pub count: u32,
}

/// Per-button press counters behind a debouncer
#[derive(Clone, Copy, Debug)]
pub struct ButtonTracker {
    counts: [u32; 2],
    pressed: [bool; 2],
    debouncers: [Debouncer; 2],
}

impl ButtonTracker {
    /// Both buttons released, nothing counted
    pub const fn new(window_ms: u32) -> Self {
        ButtonTracker {
            counts: [0; 2],
            pressed: [false; 2],
            debouncers: [Debouncer::new(window_ms); 2],
        }
    }

    /// Handle an edge reported on both-edges interrupts.
    ///
    /// `pressed` is the pin level sampled in the interrupt (active low already
    /// inverted). Presses increment the count; releases never do. Edges inside
    /// the debounce window, or that repeat the current level, are dropped.
    pub fn on_edge(&mut self, button: Button, pressed: bool, now_ms: u32) -> Option<ButtonEvent> {
        let i = button.index();
        if self.pressed[i] == pressed || !self.debouncers[i].accept(now_ms) {
            return None;
        }
        self.pressed[i] = pressed;
        if pressed {
            self.counts[i] = self.counts[i].wrapping_add(1);
        }
        Some(ButtonEvent {
            button,
            pressed,
            count: self.counts[i],
        })
    }

    /// Handle a falling-edge-only interrupt, where every edge is a press
    pub fn on_press(&mut self, button: Button, now_ms: u32) -> Option<u32> {
        let i = button.index();
        if !self.debouncers[i].accept(now_ms) {
            return None;
        }
        self.counts[i] = self.counts[i].wrapping_add(1);
        Some(self.counts[i])
    }

    /// Presses counted on `button`
    pub fn count(&self, button: Button) -> u32 {
        self.counts[button.index()]
    }

    /// Last accepted level of `button`
    pub fn is_pressed(&self, button: Button) -> bool {
        self.pressed[button.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flagged_buttons_from_status() {
        let both: Vec<Button> = Button::flagged(0b11).collect();
        assert_eq!(both, [Button::Sw1, Button::Sw2]);
        let sw2: Vec<Button> = Button::flagged(0b10).collect();
        assert_eq!(sw2, [Button::Sw2]);
        assert_eq!(Button::flagged(0b100).count(), 0);
    }

    #[test]
    fn debouncer_drops_edges_inside_window() {
        let mut d = Debouncer::new(DEBOUNCE_MS);
        assert!(d.accept(100));
        assert!(!d.accept(105));
        assert!(!d.accept(109));
        assert!(d.accept(110));
    }

    #[test]
    fn debouncer_survives_timestamp_wrap() {
        let mut d = Debouncer::new(DEBOUNCE_MS);
        assert!(d.accept(u32::MAX - 2));
        assert!(!d.accept(3));
        assert!(d.accept(8));
    }

    #[test]
    fn bouncy_press_counts_once() {
        let mut t = ButtonTracker::new(DEBOUNCE_MS);
        let first = t.on_edge(Button::Sw1, true, 0);
        assert_eq!(
            first,
            Some(ButtonEvent {
                button: Button::Sw1,
                pressed: true,
                count: 1
            })
        );
        // Contact bounce
        assert_eq!(t.on_edge(Button::Sw1, false, 2), None);
        assert_eq!(t.on_edge(Button::Sw1, true, 4), None);
        // Release after the window
        let release = t.on_edge(Button::Sw1, false, 200).unwrap();
        assert!(!release.pressed);
        assert_eq!(release.count, 1);
        assert_eq!(t.count(Button::Sw1), 1);
        assert_eq!(t.count(Button::Sw2), 0);
    }

    #[test]
    fn repeated_level_is_ignored() {
        let mut t = ButtonTracker::new(0);
        assert!(t.on_edge(Button::Sw2, true, 0).is_some());
        assert!(t.on_edge(Button::Sw2, true, 50).is_none());
        assert!(t.is_pressed(Button::Sw2));
        assert_eq!(t.count(Button::Sw2), 1);
    }

    #[test]
    fn repeated_level_leaves_window_alone() {
        let mut t = ButtonTracker::new(DEBOUNCE_MS);
        assert!(t.on_edge(Button::Sw1, true, 0).is_some());
        // Same level late in the window must not extend it
        assert!(t.on_edge(Button::Sw1, true, 8).is_none());
        let release = t.on_edge(Button::Sw1, false, 12).unwrap();
        assert!(!release.pressed);
    }

    #[test]
    fn falling_edge_counter_without_debounce() {
        let mut t = ButtonTracker::new(0);
        assert_eq!(t.on_press(Button::Sw1, 0), Some(1));
        assert_eq!(t.on_press(Button::Sw1, 0), Some(2));
        assert_eq!(t.on_press(Button::Sw2, 1), Some(1));
    }
}
