//! Two-bit counter shown on the user LEDs D2 (PN0) and D1 (PN1)

/// Counts 0..=3 and wraps, one bit per LED
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BinaryCounter {
    value: u8,
}

impl BinaryCounter {
    /// Start with both LEDs off
    pub const fn new() -> Self {
        BinaryCounter { value: 0 }
    }

    /// Step to the next pattern and return it
    pub fn advance(&mut self) -> u8 {
        self.value = (self.value + 1) % 4;
        self.value
    }

    /// Current pattern
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Level of the LED on PN0
    pub fn pn0(&self) -> bool {
        self.value & 0b01 != 0
    }

    /// Level of the LED on PN1
    pub fn pn1(&self) -> bool {
        self.value & 0b10 != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_through_all_patterns_and_wraps() {
        let mut c = BinaryCounter::new();
        let seen: Vec<(bool, bool)> = (0..5)
            .map(|_| {
                c.advance();
                (c.pn1(), c.pn0())
            })
            .collect();
        assert_eq!(
            seen,
            [
                (false, true),
                (true, false),
                (true, true),
                (false, false),
                (false, true)
            ]
        );
    }
}
