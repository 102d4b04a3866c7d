//! PWM generator arithmetic
//!
//! In count-down mode the generator reloads to `period - 1`, drives the output
//! high on reload and low when the counter passes the compare value, so a pulse
//! of `width` clocks needs a compare value of `period - width`.
//!
//! In count-up/down mode the counter runs 0..LOAD..0 and the output is high
//! while the counter is below the compare value, giving centre-aligned pulses
//! of twice the compare value.

use ufmt::derive::uDebug;

/// GENA actions: high on load, low on compare A while counting down
pub const GEN_A_DOWN: u32 = 0x0000_008C;
/// GENB actions: high on load, low on compare B while counting down
pub const GEN_B_DOWN: u32 = 0x0000_080C;

/// GENA actions for up/down: low on compare A counting up, high counting down
pub const GEN_A_UP_DOWN: u32 = 0x0000_00E0;
/// GENB actions for up/down: low on compare B counting up, high counting down
pub const GEN_B_UP_DOWN: u32 = 0x0000_0E00;

/// Counter direction of a generator
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub enum GeneratorMode {
    /// Left-aligned pulses
    CountDown,
    /// Centre-aligned pulses
    CountUpDown,
}

impl GeneratorMode {
    /// PWMnCTL value, generator still disabled
    pub const fn ctl_word(self) -> u32 {
        match self {
            GeneratorMode::CountDown => 0,
            GeneratorMode::CountUpDown => 1 << 1,
        }
    }

    /// PWMnGENA value
    pub const fn gen_a(self) -> u32 {
        match self {
            GeneratorMode::CountDown => GEN_A_DOWN,
            GeneratorMode::CountUpDown => GEN_A_UP_DOWN,
        }
    }

    /// PWMnGENB value
    pub const fn gen_b(self) -> u32 {
        match self {
            GeneratorMode::CountDown => GEN_B_DOWN,
            GeneratorMode::CountUpDown => GEN_B_UP_DOWN,
        }
    }
}

/// PWM configuration errors
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub enum PwmError {
    /// Period must be at least 2 clocks
    PeriodTooShort,
    /// Period does not fit the 16-bit load register
    PeriodTooLong,
    /// Output number outside 0..=7
    NoSuchOutput(u8),
    /// Generator number outside 0..=3
    NoSuchGenerator(u8),
    /// The output's generator has no period yet
    Unconfigured(u8),
}

/// PWM clock prescaler applied to the system clock
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum PwmDivider {
    _1,
    _2,
    _4,
    _8,
    _16,
    _32,
    _64,
}

impl PwmDivider {
    /// Value of the PWMCC register
    pub const fn cc_word(self) -> u32 {
        const USEPWM: u32 = 1 << 8;
        match self {
            PwmDivider::_1 => 0,
            PwmDivider::_2 => USEPWM,
            PwmDivider::_4 => USEPWM | 1,
            PwmDivider::_8 => USEPWM | 2,
            PwmDivider::_16 => USEPWM | 3,
            PwmDivider::_32 => USEPWM | 4,
            PwmDivider::_64 => USEPWM | 5,
        }
    }

    /// PWM clock frequency for a given system clock
    pub const fn clock_hz(self, sysclk_hz: u32) -> u32 {
        let div = match self {
            PwmDivider::_1 => 1,
            PwmDivider::_2 => 2,
            PwmDivider::_4 => 4,
            PwmDivider::_8 => 8,
            PwmDivider::_16 => 16,
            PwmDivider::_32 => 32,
            PwmDivider::_64 => 64,
        };
        sysclk_hz / div
    }
}

/// One of the eight PWM0 outputs
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub struct PwmOutput(u8);

impl PwmOutput {
    /// Output `n`, 0..=7
    pub const fn new(n: u8) -> Result<Self, PwmError> {
        match n {
            0..=7 => Ok(PwmOutput(n)),
            _ => Err(PwmError::NoSuchOutput(n)),
        }
    }

    /// Output number
    pub const fn number(self) -> u8 {
        self.0
    }

    /// Generator that drives this output
    pub const fn generator(self) -> u8 {
        self.0 / 2
    }

    /// Even outputs use comparator A, odd outputs comparator B
    pub const fn uses_comparator_a(self) -> bool {
        self.0 % 2 == 0
    }

    /// Bit in PWMENABLE
    pub const fn enable_mask(self) -> u32 {
        1 << self.0
    }
}

/// Load and compare values for one generator
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub struct PwmTiming {
    period: u32,
    mode: GeneratorMode,
}

impl PwmTiming {
    /// A count-down generator period in PWM clocks
    pub const fn new(period: u32) -> Result<Self, PwmError> {
        Self::with_mode(period, GeneratorMode::CountDown)
    }

    /// A generator period in PWM clocks for either counting mode. Up/down
    /// periods are rounded down to an even count.
    pub const fn with_mode(period: u32, mode: GeneratorMode) -> Result<Self, PwmError> {
        let (min, max) = match mode {
            GeneratorMode::CountDown => (2, 0x1_0000),
            GeneratorMode::CountUpDown => (4, 0x1_FFFE),
        };
        if period < min {
            return Err(PwmError::PeriodTooShort);
        }
        if period > max {
            return Err(PwmError::PeriodTooLong);
        }
        let period = match mode {
            GeneratorMode::CountDown => period,
            GeneratorMode::CountUpDown => period & !1,
        };
        Ok(PwmTiming { period, mode })
    }

    /// Counting mode
    pub const fn mode(&self) -> GeneratorMode {
        self.mode
    }

    /// Period in PWM clocks
    pub const fn period(&self) -> u32 {
        self.period
    }

    /// Value of the LOAD register
    pub const fn load(&self) -> u32 {
        match self.mode {
            GeneratorMode::CountDown => self.period - 1,
            GeneratorMode::CountUpDown => self.period / 2,
        }
    }

    /// Compare value giving a high time of `width` clocks.
    ///
    /// Width is clamped to `1..period` since the ends of the range would never
    /// reach the compare event. Up/down widths resolve to two clocks.
    pub fn compare(&self, width: u32) -> u32 {
        let width = width.clamp(1, self.period - 1);
        match self.mode {
            GeneratorMode::CountDown => self.period - width,
            GeneratorMode::CountUpDown => (width / 2).clamp(1, self.load() - 1),
        }
    }
}

/// Scale a 12-bit ADC reading onto a pulse width: `(raw * period) >> 12`
pub fn duty_from_adc(raw: u16, period: u32) -> u32 {
    ((raw as u32 & 0xFFF) * period) >> 12
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_khz_at_fifteen_percent() {
        // 120 MHz system clock, /2 prescale, 60000 clock period
        let clk = PwmDivider::_2.clock_hz(120_000_000);
        let t = PwmTiming::new(60_000).unwrap();
        assert_eq!(clk / t.period(), 1000);
        assert_eq!(t.load(), 59_999);
        assert_eq!(t.compare(9000), 51_000);
    }

    #[test]
    fn width_is_clamped_inside_period() {
        let t = PwmTiming::new(8000).unwrap();
        assert_eq!(t.compare(0), 7999);
        assert_eq!(t.compare(8000), 1);
        assert_eq!(t.compare(4000), 4000);
    }

    #[test]
    fn period_limits() {
        assert_eq!(PwmTiming::new(1), Err(PwmError::PeriodTooShort));
        assert_eq!(PwmTiming::new(0x1_0001), Err(PwmError::PeriodTooLong));
        assert!(PwmTiming::new(0x1_0000).is_ok());
    }

    #[test]
    fn outputs_map_to_generators() {
        let out6 = PwmOutput::new(6).unwrap();
        assert_eq!(out6.generator(), 3);
        assert!(out6.uses_comparator_a());
        let out3 = PwmOutput::new(3).unwrap();
        assert_eq!(out3.generator(), 1);
        assert!(!out3.uses_comparator_a());
        assert_eq!(out3.enable_mask(), 0b1000);
        assert_eq!(PwmOutput::new(8), Err(PwmError::NoSuchOutput(8)));
    }

    #[test]
    fn adc_scales_to_duty() {
        assert_eq!(duty_from_adc(0, 60_000), 0);
        assert_eq!(duty_from_adc(2048, 60_000), 30_000);
        assert_eq!(duty_from_adc(4095, 60_000), 59_985);
    }

    #[test]
    fn centre_aligned_timing() {
        let t = PwmTiming::with_mode(1001, GeneratorMode::CountUpDown).unwrap();
        assert_eq!(t.period(), 1000);
        assert_eq!(t.load(), 500);
        assert_eq!(t.compare(300), 150);
        assert_eq!(t.compare(0), 1);
        assert_eq!(t.compare(1000), 499);
        assert_eq!(GeneratorMode::CountUpDown.ctl_word(), 0b10);
        assert_eq!(GeneratorMode::CountDown.gen_b(), GEN_B_DOWN);
        assert_eq!(
            PwmTiming::with_mode(3, GeneratorMode::CountUpDown),
            Err(PwmError::PeriodTooShort)
        );
    }

    #[test]
    fn divider_register_words() {
        assert_eq!(PwmDivider::_1.cc_word(), 0);
        assert_eq!(PwmDivider::_2.cc_word(), 0x100);
        assert_eq!(PwmDivider::_64.cc_word(), 0x105);
    }
}
