//! Timer and SysTick reload arithmetic

use ufmt::derive::uDebug;

/// Prescale and reload pair for a 16-bit general purpose timer half.
///
/// The timer fires at `clock / ((prescale + 1) * (reload + 1))`.
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub struct TimerPeriod {
    /// Value of TAPR
    pub prescale: u8,
    /// Value of TAILR
    pub reload: u16,
}

impl TimerPeriod {
    /// Find register values for `rate_hz`.
    ///
    /// Takes the smallest prescale for which the 16-bit reload fits, with the
    /// reload rounded to the nearest count. Returns `None` when the rate is
    /// zero, faster than the clock, or too slow for the 24-bit combined range.
    pub fn for_rate(clock_hz: u32, rate_hz: u32) -> Option<Self> {
        if rate_hz == 0 || rate_hz > clock_hz {
            return None;
        }
        let clock = clock_hz as u64;
        let rate = rate_hz as u64;
        (1..=256_u64).find_map(|p| {
            let div = rate * p;
            let reload = (clock + div / 2) / div;
            (1..=0x1_0000).contains(&reload).then(|| TimerPeriod {
                prescale: (p - 1) as u8,
                reload: (reload - 1) as u16,
            })
        })
    }

    /// Resulting interrupt rate in Hz, rounded down
    pub fn rate_hz(&self, clock_hz: u32) -> u32 {
        let div = (self.prescale as u32 + 1) * (self.reload as u32 + 1);
        clock_hz / div
    }
}

/// 32-bit general purpose timer reload for a period in milliseconds
pub fn periodic_ticks(clock_hz: u32, period_ms: u32) -> u32 {
    let ticks = clock_hz as u64 * period_ms as u64 / 1000;
    ticks.saturating_sub(1).min(u32::MAX as u64) as u32
}

/// SysTick reload value for a period in milliseconds, saturated to 24 bits
pub fn systick_reload(clock_hz: u32, period_ms: u32) -> u32 {
    periodic_ticks(clock_hz, period_ms).min(0x00FF_FFFF)
}

/// Widens a wrapping 32-bit millisecond count to 64 bits.
///
/// Must see the count at least once per wrap (about 49 days).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WideMillis {
    last: u32,
    wraps: u32,
}

impl WideMillis {
    /// Starts at zero with no wraps seen
    pub const fn new() -> Self {
        WideMillis { last: 0, wraps: 0 }
    }

    /// 64-bit milliseconds for the current 32-bit reading
    pub fn extend(&mut self, now_ms: u32) -> u64 {
        if now_ms < self.last {
            self.wraps = self.wraps.wrapping_add(1);
        }
        self.last = now_ms;
        ((self.wraps as u64) << 32) | now_ms as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_hertz_from_pll() {
        let t = TimerPeriod::for_rate(120_000_000, 10).unwrap();
        assert_eq!(
            t,
            TimerPeriod {
                prescale: 183,
                reload: 65_216
            }
        );
        assert_eq!(t.rate_hz(120_000_000), 10);
    }

    #[test]
    fn handwritten_settings_agree() {
        let t = TimerPeriod {
            prescale: 199,
            reload: 59_999,
        };
        assert_eq!(t.rate_hz(120_000_000), 10);
    }

    #[test]
    fn fast_rates_need_no_prescale() {
        let t = TimerPeriod::for_rate(16_000_000, 1000).unwrap();
        assert_eq!(t.prescale, 0);
        assert_eq!(t.reload, 15_999);
    }

    #[test]
    fn inexact_rates_round_to_nearest() {
        // 120 MHz / 7 kHz is 17142.86 counts
        let t = TimerPeriod::for_rate(120_000_000, 7000).unwrap();
        assert_eq!(t.prescale, 0);
        assert_eq!(t.reload, 17_142);
    }

    #[test]
    fn impossible_rates() {
        assert_eq!(TimerPeriod::for_rate(120_000_000, 0), None);
        assert_eq!(TimerPeriod::for_rate(1000, 2000), None);
        // Below clock / 2^24
        assert_eq!(TimerPeriod::for_rate(120_000_000, 1), None);
    }

    #[test]
    fn timer_half_second() {
        assert_eq!(periodic_ticks(120_000_000, 500), 59_999_999);
        assert_eq!(periodic_ticks(16_000_000, 500), 7_999_999);
        assert_eq!(periodic_ticks(120_000_000, 100_000), u32::MAX);
    }

    #[test]
    fn systick_saturates_at_24_bits() {
        assert_eq!(systick_reload(120_000_000, 1), 119_999);
        assert_eq!(systick_reload(16_000_000, 500), 7_999_999);
        assert_eq!(systick_reload(120_000_000, 500), 0x00FF_FFFF);
    }

    #[test]
    fn wide_millis_carries_over_the_wrap() {
        let mut wide = WideMillis::new();
        assert_eq!(wide.extend(5), 5);
        assert_eq!(wide.extend(u32::MAX), u32::MAX as u64);
        assert_eq!(wide.extend(2), (1 << 32) + 2);
        assert_eq!(wide.extend(2), (1 << 32) + 2);
        assert_eq!(wide.extend(10), (1 << 32) + 10);
    }
}
