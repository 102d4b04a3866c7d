//! Bookkeeping for two-buffer (ping-pong) acquisition
//!
//! The uDMA controller fills the primary buffer, then switches to the alternate
//! one while software drains the first. Software must see the halves complete in
//! strict alternation; a half that completes twice in a row means the other
//! half's samples were overwritten before they were processed.

use ufmt::derive::uDebug;

/// One side of the double buffer
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub enum Half {
    /// Buffer described by the primary control structure
    Primary,
    /// Buffer described by the alternate control structure
    Alternate,
}

impl Half {
    /// The half that fills after this one
    pub const fn other(self) -> Half {
        match self {
            Half::Primary => Half::Alternate,
            Half::Alternate => Half::Primary,
        }
    }

    /// Array index, 0 for primary and 1 for alternate
    pub const fn index(self) -> usize {
        match self {
            Half::Primary => 0,
            Half::Alternate => 1,
        }
    }
}

/// Ping-pong ordering violations
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub enum PingPongError {
    /// This half completed again before the other half did
    Overrun(Half),
}

/// Completion tracking for a pair of buffers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PingPong {
    counts: [u32; 2],
    expected: Half,
}

impl Default for PingPong {
    fn default() -> Self {
        Self::new()
    }
}

impl PingPong {
    /// Start expecting the primary half first
    pub const fn new() -> Self {
        PingPong {
            counts: [0, 0],
            expected: Half::Primary,
        }
    }

    /// Record that `half` finished filling.
    ///
    /// The completion is always counted. Returns that half's completion count,
    /// or `Overrun` if the halves did not alternate.
    pub fn complete(&mut self, half: Half) -> Result<u32, PingPongError> {
        let count = self.counts[half.index()].wrapping_add(1);
        self.counts[half.index()] = count;

        let in_order = half == self.expected;
        self.expected = half.other();
        match in_order {
            true => Ok(count),
            false => Err(PingPongError::Overrun(half)),
        }
    }

    /// Completion counts as (primary, alternate)
    pub fn counts(&self) -> (u32, u32) {
        (self.counts[0], self.counts[1])
    }

    /// The half that should complete next
    pub fn next_expected(&self) -> Half {
        self.expected
    }

    /// Order in which to service halves that both show as stopped.
    ///
    /// When the interrupt is late, both halves can be finished at once; the one
    /// that filled first is the one we expected.
    pub fn service_order(&self, primary_done: bool, alternate_done: bool) -> [Option<Half>; 2] {
        let done = |h: Half| match h {
            Half::Primary => primary_done,
            Half::Alternate => alternate_done,
        };
        let first = self.expected;
        let second = first.other();
        match (done(first), done(second)) {
            (true, true) => [Some(first), Some(second)],
            (true, false) => [Some(first), None],
            (false, true) => [Some(second), None],
            (false, false) => [None, None],
        }
    }
}

/// Mean of a batch of samples, rounded to nearest. `None` for an empty batch.
pub fn average(samples: &[u32]) -> Option<u32> {
    let n = samples.len() as u64;
    if n == 0 {
        return None;
    }
    let sum: u64 = samples.iter().map(|&s| s as u64).sum();
    Some(((sum + n / 2) / n) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternating_halves_count_up() {
        let mut pp = PingPong::new();
        assert_eq!(pp.complete(Half::Primary), Ok(1));
        assert_eq!(pp.complete(Half::Alternate), Ok(1));
        assert_eq!(pp.complete(Half::Primary), Ok(2));
        assert_eq!(pp.counts(), (2, 1));
        assert_eq!(pp.next_expected(), Half::Alternate);
    }

    #[test]
    fn repeated_half_is_overrun_but_still_counted() {
        let mut pp = PingPong::new();
        pp.complete(Half::Primary).unwrap();
        assert_eq!(
            pp.complete(Half::Primary),
            Err(PingPongError::Overrun(Half::Primary))
        );
        assert_eq!(pp.counts(), (2, 0));
        // Resynchronizes on the next alternation
        assert_eq!(pp.complete(Half::Alternate), Ok(1));
    }

    #[test]
    fn late_interrupt_services_expected_half_first() {
        let mut pp = PingPong::new();
        pp.complete(Half::Primary).unwrap();
        assert_eq!(
            pp.service_order(true, true),
            [Some(Half::Alternate), Some(Half::Primary)]
        );
        assert_eq!(pp.service_order(true, false), [Some(Half::Primary), None]);
        assert_eq!(pp.service_order(false, false), [None, None]);
    }

    #[test]
    fn average_rounds_to_nearest() {
        assert_eq!(average(&[1, 2]), Some(2));
        assert_eq!(average(&[1, 1, 2]), Some(1));
        assert_eq!(average(&[4095; 200]), Some(4095));
        assert_eq!(average(&[]), None);
    }
}
