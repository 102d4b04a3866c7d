//! Driver for analog-to-digital converter 0

use cortex_m::peripheral::NVIC;
use tm4c129x_hal::sysctl::{control_power, Domain, PowerControl, PowerState, RunMode};
use tm4c129x_hal::tm4c129x::{Interrupt, ADC0};
use tm4c1294_launchpad_core::adc::{
    emux_word, AdcClock, AnalogInput, Oversample, Sequencer, SequenceProgram, Trigger,
    FIFO_DATA_MASK, FIFO_EMPTY, PRIORITY_SS3_FIRST,
};

use super::gpio;

/// ADCCTL.VREF clear selects the internal 3.3V reference
const CTL_VREF_INTERNAL: u32 = 0;
/// ADCACTSS.ADENn, uDMA requests from sequencer n
const ACTSS_ADEN_SHIFT: u32 = 8;

/// Run `$body` with the per-sequencer registers of `$seq` bound
macro_rules! with_sequencer {
    ($adc:expr, $seq:expr, |$mux:ident, $emux:ident, $ctl:ident, $tsh:ident, $fifo:ident, $fstat:ident| $body:expr) => {
        match $seq {
            Sequencer::Ss0 => {
                let ($mux, $emux, $ctl, $tsh, $fifo, $fstat) = (
                    &$adc.ssmux0, &$adc.ssemux0, &$adc.ssctl0, &$adc.sstsh0, &$adc.ssfifo0, &$adc.ssfstat0,
                );
                $body
            }
            Sequencer::Ss1 => {
                let ($mux, $emux, $ctl, $tsh, $fifo, $fstat) = (
                    &$adc.ssmux1, &$adc.ssemux1, &$adc.ssctl1, &$adc.sstsh1, &$adc.ssfifo1, &$adc.ssfstat1,
                );
                $body
            }
            Sequencer::Ss2 => {
                let ($mux, $emux, $ctl, $tsh, $fifo, $fstat) = (
                    &$adc.ssmux2, &$adc.ssemux2, &$adc.ssctl2, &$adc.sstsh2, &$adc.ssfifo2, &$adc.ssfstat2,
                );
                $body
            }
            Sequencer::Ss3 => {
                let ($mux, $emux, $ctl, $tsh, $fifo, $fstat) = (
                    &$adc.ssmux3, &$adc.ssemux3, &$adc.ssctl3, &$adc.sstsh3, &$adc.ssfifo3, &$adc.ssfstat3,
                );
                $body
            }
        }
    };
}

/// ADC0 with the internal reference
pub struct Adc {
    registers: ADC0,
}

impl Adc {
    /// Power the converter and set its clock, reference and averaging. All
    /// sequencers start disabled.
    pub fn new(
        registers: ADC0,
        power_control: &PowerControl,
        oversample: Oversample,
        clock: AdcClock,
    ) -> Self {
        control_power(power_control, Domain::Adc0, RunMode::Run, PowerState::On);

        // Sequencers must be off while they are configured
        registers.actss.write(|w| unsafe { w.bits(0) });
        registers.cc.write(|w| unsafe { w.bits(clock.cc_word()) });
        registers.ctl.write(|w| unsafe { w.bits(CTL_VREF_INTERNAL) });
        registers.sac.write(|w| unsafe { w.bits(oversample.sac_word()) });

        Adc { registers }
    }

    /// Put the pins behind `inputs` in analog mode
    pub fn configure_pins(&self, power_control: &PowerControl, inputs: &[AnalogInput]) {
        for ain in inputs {
            let (port, pin) = ain.pin();
            gpio::analog_input(power_control, port.into(), 1 << pin, ain.needs_unlock());
        }
    }

    /// Load a sequence program and select what triggers it. The sequencer is
    /// disabled first and left disabled.
    pub fn configure(&self, trigger: Trigger, program: &SequenceProgram) {
        let seq = program.sequencer;
        self.disable(seq);

        let adc = &self.registers;
        with_sequencer!(adc, seq, |mux, emux, ctl, tsh, _fifo, _fstat| {
            mux.write(|w| unsafe { w.bits(program.mux) });
            emux.write(|w| unsafe { w.bits(program.emux) });
            tsh.write(|w| unsafe { w.bits(program.tsh) });
            ctl.write(|w| unsafe { w.bits(program.ctl) });
        });

        adc.emux
            .modify(|r, w| unsafe { w.bits(emux_word(r.bits(), seq, trigger)) });
        adc.sspri.write(|w| unsafe { w.bits(PRIORITY_SS3_FIRST) });
    }

    /// Start accepting triggers on `seq`
    pub fn enable(&self, seq: Sequencer) {
        self.registers
            .actss
            .modify(|r, w| unsafe { w.bits(r.bits() | seq.mask()) });
    }

    /// Stop `seq`
    pub fn disable(&self, seq: Sequencer) {
        self.registers
            .actss
            .modify(|r, w| unsafe { w.bits(r.bits() & !seq.mask()) });
    }

    /// Raise the ADC0SSn interrupt at the end of each sequence and unmask it
    /// in the NVIC
    pub fn enable_interrupt(&self, seq: Sequencer) {
        self.arm_interrupt(seq);
        Self::unmask_interrupt(seq);
    }

    /// Raise the interrupt at the end of each sequence, leaving the NVIC line
    /// as it is
    pub fn arm_interrupt(&self, seq: Sequencer) {
        self.clear_interrupt(seq);
        self.registers
            .im
            .modify(|r, w| unsafe { w.bits(r.bits() | seq.mask()) });
    }

    /// Let the NVIC deliver the ADC0SSn interrupt. Anything already pending
    /// fires right away.
    pub fn unmask_interrupt(seq: Sequencer) {
        let irq = match seq {
            Sequencer::Ss0 => Interrupt::ADC0SS0,
            Sequencer::Ss1 => Interrupt::ADC0SS1,
            Sequencer::Ss2 => Interrupt::ADC0SS2,
            Sequencer::Ss3 => Interrupt::ADC0SS3,
        };
        unsafe { NVIC::unmask(irq) };
    }

    /// Let `seq` request uDMA transfers out of its FIFO
    pub fn enable_dma(&self, seq: Sequencer) {
        let aden = seq.mask() << ACTSS_ADEN_SHIFT;
        self.registers
            .actss
            .modify(|r, w| unsafe { w.bits(r.bits() | aden) });
    }

    /// Acknowledge the interrupt of `seq`
    pub fn clear_interrupt(&self, seq: Sequencer) {
        self.registers.isc.write(|w| unsafe { w.bits(seq.mask()) });
    }

    /// Whether `seq` has finished a sequence since the last clear
    pub fn interrupt_pending(&self, seq: Sequencer) -> bool {
        self.registers.ris.read().bits() & seq.mask() != 0
    }

    /// Software trigger
    pub fn trigger(&self, seq: Sequencer) {
        self.registers.pssi.write(|w| unsafe { w.bits(seq.mask()) });
    }

    /// Drain the FIFO of `seq` into `buf`, returning the number of samples
    /// read. Samples that don't fit are left in the FIFO.
    pub fn read_fifo(&self, seq: Sequencer, buf: &mut [u16]) -> usize {
        let adc = &self.registers;
        with_sequencer!(adc, seq, |_mux, _emux, _ctl, _tsh, fifo, fstat| {
            let mut n = 0;
            for slot in buf.iter_mut() {
                if fstat.read().bits() & FIFO_EMPTY != 0 {
                    break;
                }
                *slot = (fifo.read().bits() & FIFO_DATA_MASK) as u16;
                n += 1;
            }
            n
        })
    }

    /// Address of the FIFO of `seq`, the uDMA source for that sequencer
    pub fn fifo_address(&self, seq: Sequencer) -> u32 {
        let adc = &self.registers;
        with_sequencer!(adc, seq, |_mux, _emux, _ctl, _tsh, fifo, _fstat| {
            fifo as *const _ as u32
        })
    }

    /// Trigger `seq`, wait for it to finish and read the results
    pub fn sample_blocking(&self, seq: Sequencer, buf: &mut [u16]) -> usize {
        self.trigger(seq);
        while !self.interrupt_pending(seq) {}
        let n = self.read_fifo(seq, buf);
        self.clear_interrupt(seq);
        n
    }
}
