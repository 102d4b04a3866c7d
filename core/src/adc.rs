//! ADC0 channel map and sample sequencer register words
//!
//! A sample sequence is programmed through three words per sequencer: SSMUX
//! picks the low four bits of each step's input, SSEMUX its fifth bit, and
//! SSCTL holds a nibble of flags per step (differential, end, interrupt,
//! temperature sensor). SSTSH holds a sample-and-hold nibble per step.

use ufmt::derive::uDebug;

/// Sequencer priority with SS3 highest and SS0 lowest
pub const PRIORITY_SS3_FIRST: u32 = 0x0123;
/// Conversion result bits in an SSFIFO read
pub const FIFO_DATA_MASK: u32 = 0x0FFF;
/// SSFSTAT bit set while the FIFO is empty
pub const FIFO_EMPTY: u32 = 1 << 8;

const CTL_END: u32 = 1 << 1;
const CTL_IE: u32 = 1 << 2;
const CTL_TS: u32 = 1 << 3;

/// ADC configuration errors
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub enum AdcError {
    /// There is no AIN with this number
    InvalidChannel(u8),
    /// A sequence needs at least one step
    EmptySequence,
    /// More steps than the sequencer's FIFO holds
    SequenceTooLong,
}

/// GPIO ports that carry analog inputs
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Port {
    B,
    D,
    E,
    K,
}

/// Analog input AIN0..AIN19
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub struct AnalogInput(u8);

impl AnalogInput {
    /// Check the channel number
    pub const fn new(channel: u8) -> Result<Self, AdcError> {
        match channel {
            0..=19 => Ok(AnalogInput(channel)),
            _ => Err(AdcError::InvalidChannel(channel)),
        }
    }

    /// Channel number
    pub const fn channel(self) -> u8 {
        self.0
    }

    /// Port and pin that carry this input
    pub const fn pin(self) -> (Port, u8) {
        match self.0 {
            0..=3 => (Port::E, 3 - self.0),
            4..=7 => (Port::D, 11 - self.0),
            8 => (Port::E, 5),
            9 => (Port::E, 4),
            10 => (Port::B, 4),
            11 => (Port::B, 5),
            12..=15 => (Port::D, 15 - self.0),
            _ => (Port::K, self.0 - 16),
        }
    }

    /// PD7 is an NMI-capable pin behind the GPIO commit lock
    pub const fn needs_unlock(self) -> bool {
        self.0 == 4
    }
}

/// Sample sequencers, which differ in FIFO depth
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Sequencer {
    Ss0,
    Ss1,
    Ss2,
    Ss3,
}

impl Sequencer {
    /// Sequencer number
    pub const fn index(self) -> u8 {
        match self {
            Sequencer::Ss0 => 0,
            Sequencer::Ss1 => 1,
            Sequencer::Ss2 => 2,
            Sequencer::Ss3 => 3,
        }
    }

    /// Maximum number of steps
    pub const fn depth(self) -> usize {
        match self {
            Sequencer::Ss0 => 8,
            Sequencer::Ss1 | Sequencer::Ss2 => 4,
            Sequencer::Ss3 => 1,
        }
    }

    /// Bit of this sequencer in ACTSS, IM, RIS, ISC, PSSI and DMA registers
    pub const fn mask(self) -> u32 {
        1 << self.index()
    }
}

/// What starts a sequence
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub enum Trigger {
    /// Software writes PSSI
    Processor,
    /// A general purpose timer with ADC output enabled
    Timer,
    /// Continuous sampling
    Always,
}

impl Trigger {
    /// EMUX field value
    pub const fn code(self) -> u32 {
        match self {
            Trigger::Processor => 0x0,
            Trigger::Timer => 0x5,
            Trigger::Always => 0xF,
        }
    }
}

/// Replace one sequencer's nibble in the EMUX register
pub const fn emux_word(current: u32, sequencer: Sequencer, trigger: Trigger) -> u32 {
    let shift = 4 * sequencer.index() as u32;
    (current & !(0xF << shift)) | (trigger.code() << shift)
}

/// Source of one step
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub enum Input {
    /// An external pin
    Channel(AnalogInput),
    /// The on-chip temperature sensor
    Temperature,
}

/// Hardware averaging
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Oversample {
    None,
    _2x,
    _4x,
    _8x,
    _16x,
    _32x,
    _64x,
}

impl Oversample {
    /// SAC register value
    pub const fn sac_word(self) -> u32 {
        match self {
            Oversample::None => 0,
            Oversample::_2x => 1,
            Oversample::_4x => 2,
            Oversample::_8x => 3,
            Oversample::_16x => 4,
            Oversample::_32x => 5,
            Oversample::_64x => 6,
        }
    }
}

/// Sample-and-hold width in ADC clocks
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum SampleHold {
    _4,
    _8,
    _16,
    _32,
    _64,
    _128,
    _256,
}

impl SampleHold {
    /// TSH nibble
    pub const fn code(self) -> u32 {
        match self {
            SampleHold::_4 => 0x0,
            SampleHold::_8 => 0x2,
            SampleHold::_16 => 0x4,
            SampleHold::_32 => 0x6,
            SampleHold::_64 => 0x8,
            SampleHold::_128 => 0xA,
            SampleHold::_256 => 0xC,
        }
    }
}

/// ADC conversion clock source
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub enum AdcClock {
    /// PLL VCO divided down; 480 MHz / 15 gives the 32 MHz maximum
    PllVco {
        /// Divisor 1..=64
        divisor: u8,
    },
    /// The alternate clock source (PIOSC unless reassigned)
    Alternate,
    /// Main oscillator
    MainOscillator,
}

impl AdcClock {
    /// CC register value
    pub const fn cc_word(self) -> u32 {
        match self {
            AdcClock::PllVco { divisor } => {
                let div = match divisor {
                    0 => 0,
                    d if d > 64 => 63,
                    d => d as u32 - 1,
                };
                div << 4
            }
            AdcClock::Alternate => 1,
            AdcClock::MainOscillator => 2,
        }
    }
}

/// Register words for one sample sequence
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub struct SequenceProgram {
    /// Target sequencer
    pub sequencer: Sequencer,
    /// SSMUXn
    pub mux: u32,
    /// SSEMUXn
    pub emux: u32,
    /// SSCTLn
    pub ctl: u32,
    /// SSTSHn
    pub tsh: u32,
    /// Number of steps, which is also the FIFO count per trigger
    pub steps: usize,
}

impl SequenceProgram {
    /// Lay out `inputs` as consecutive steps. The final step ends the
    /// sequence and raises the interrupt.
    pub fn build(
        sequencer: Sequencer,
        inputs: &[Input],
        hold: SampleHold,
    ) -> Result<Self, AdcError> {
        if inputs.is_empty() {
            return Err(AdcError::EmptySequence);
        }
        if inputs.len() > sequencer.depth() {
            return Err(AdcError::SequenceTooLong);
        }

        let mut program = SequenceProgram {
            sequencer,
            mux: 0,
            emux: 0,
            ctl: 0,
            tsh: 0,
            steps: inputs.len(),
        };
        for (step, input) in inputs.iter().enumerate() {
            let shift = 4 * step as u32;
            let mut ctl = 0;
            match input {
                Input::Channel(ain) => {
                    let ch = ain.channel() as u32;
                    program.mux |= (ch & 0xF) << shift;
                    program.emux |= (ch >> 4) << shift;
                }
                Input::Temperature => ctl |= CTL_TS,
            }
            if step + 1 == inputs.len() {
                ctl |= CTL_END | CTL_IE;
            }
            program.ctl |= ctl << shift;
            program.tsh |= hold.code() << shift;
        }
        Ok(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ain(n: u8) -> Input {
        Input::Channel(AnalogInput::new(n).unwrap())
    }

    #[test]
    fn pin_map() {
        let pin = |n| AnalogInput::new(n).unwrap().pin();
        assert_eq!(pin(0), (Port::E, 3));
        assert_eq!(pin(3), (Port::E, 0));
        assert_eq!(pin(4), (Port::D, 7));
        assert_eq!(pin(7), (Port::D, 4));
        assert_eq!(pin(8), (Port::E, 5));
        assert_eq!(pin(9), (Port::E, 4));
        assert_eq!(pin(10), (Port::B, 4));
        assert_eq!(pin(11), (Port::B, 5));
        assert_eq!(pin(12), (Port::D, 3));
        assert_eq!(pin(15), (Port::D, 0));
        assert_eq!(pin(16), (Port::K, 0));
        assert_eq!(pin(19), (Port::K, 3));
        assert!(AnalogInput::new(4).unwrap().needs_unlock());
        assert_eq!(AnalogInput::new(20), Err(AdcError::InvalidChannel(20)));
    }

    #[test]
    fn single_step_on_ss3() {
        let p = SequenceProgram::build(Sequencer::Ss3, &[ain(0)], SampleHold::_4).unwrap();
        assert_eq!(p.mux, 0);
        assert_eq!(p.emux, 0);
        assert_eq!(p.ctl, 0b0110);
        assert_eq!(p.steps, 1);
    }

    #[test]
    fn four_temperature_samples() {
        let t = [Input::Temperature; 4];
        let p = SequenceProgram::build(Sequencer::Ss1, &t, SampleHold::_4).unwrap();
        assert_eq!(p.ctl, 0xE888);
        assert_eq!(p.mux, 0);
    }

    #[test]
    fn ir_pair_and_extended_channels() {
        let p = SequenceProgram::build(Sequencer::Ss1, &[ain(0), ain(8)], SampleHold::_16).unwrap();
        assert_eq!(p.mux, 0x80);
        assert_eq!(p.ctl, 0x60);
        assert_eq!(p.tsh, 0x44);

        let p = SequenceProgram::build(Sequencer::Ss2, &[ain(17), ain(2)], SampleHold::_4).unwrap();
        assert_eq!(p.mux, 0x21);
        assert_eq!(p.emux, 0x01);
    }

    #[test]
    fn sequence_limits() {
        assert_eq!(
            SequenceProgram::build(Sequencer::Ss0, &[], SampleHold::_4),
            Err(AdcError::EmptySequence)
        );
        assert_eq!(
            SequenceProgram::build(Sequencer::Ss3, &[ain(0), ain(1)], SampleHold::_4),
            Err(AdcError::SequenceTooLong)
        );
        assert!(SequenceProgram::build(Sequencer::Ss0, &[ain(1); 8], SampleHold::_4).is_ok());
    }

    #[test]
    fn trigger_mux_keeps_other_sequencers() {
        let w = emux_word(0, Sequencer::Ss3, Trigger::Timer);
        assert_eq!(w, 0x5000);
        let w = emux_word(w, Sequencer::Ss1, Trigger::Always);
        assert_eq!(w, 0x50F0);
        assert_eq!(emux_word(w, Sequencer::Ss3, Trigger::Processor), 0x00F0);
    }

    #[test]
    fn clock_and_averaging_words() {
        assert_eq!(AdcClock::PllVco { divisor: 15 }.cc_word(), 14 << 4);
        assert_eq!(AdcClock::Alternate.cc_word(), 1);
        assert_eq!(AdcClock::MainOscillator.cc_word(), 2);
        assert_eq!(Oversample::_64x.sac_word(), 6);
        assert_eq!(SampleHold::_256.code(), 0xC);
    }
}
