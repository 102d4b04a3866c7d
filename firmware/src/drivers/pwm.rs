//! Pulse width modulator 0

use tm4c129x_hal::sysctl::{control_power, Domain, PowerControl, PowerState, RunMode};
use tm4c129x_hal::tm4c129x::PWM0;
use tm4c1294_launchpad_core::pwm::{GeneratorMode, PwmDivider, PwmError, PwmOutput, PwmTiming};

use super::gpio::{self, Port};

/// PCTL code of the M0PWMn pin function
const PCTL_PWM: u8 = 6;
/// PWMnCTL.ENABLE
const CTL_ENABLE: u32 = 1 << 0;
/// Number of generators
const GENERATORS: u8 = 4;

/// Run `$body` with the registers of generator `$gen` bound
macro_rules! with_generator {
    ($pwm:expr, $gen:expr, |$ctl:ident, $load:ident, $cmpa:ident, $cmpb:ident, $gena:ident, $genb:ident| $body:expr) => {
        match $gen {
            0 => {
                let ($ctl, $load, $cmpa, $cmpb, $gena, $genb) = (
                    &$pwm._0_ctl, &$pwm._0_load, &$pwm._0_cmpa, &$pwm._0_cmpb, &$pwm._0_gena, &$pwm._0_genb,
                );
                $body
            }
            1 => {
                let ($ctl, $load, $cmpa, $cmpb, $gena, $genb) = (
                    &$pwm._1_ctl, &$pwm._1_load, &$pwm._1_cmpa, &$pwm._1_cmpb, &$pwm._1_gena, &$pwm._1_genb,
                );
                $body
            }
            2 => {
                let ($ctl, $load, $cmpa, $cmpb, $gena, $genb) = (
                    &$pwm._2_ctl, &$pwm._2_load, &$pwm._2_cmpa, &$pwm._2_cmpb, &$pwm._2_gena, &$pwm._2_genb,
                );
                $body
            }
            _ => {
                let ($ctl, $load, $cmpa, $cmpb, $gena, $genb) = (
                    &$pwm._3_ctl, &$pwm._3_load, &$pwm._3_cmpa, &$pwm._3_cmpb, &$pwm._3_gena, &$pwm._3_genb,
                );
                $body
            }
        }
    };
}

/// Pin carrying an output
const fn output_pin(output: PwmOutput) -> (Port, u8) {
    match output.number() {
        0..=3 => (Port::F, 1 << output.number()),
        4 => (Port::G, 1 << 0),
        5 => (Port::G, 1 << 1),
        6 => (Port::K, 1 << 4),
        _ => (Port::K, 1 << 5),
    }
}

/// PWM0 with one timing per generator
pub struct Pwm0 {
    registers: PWM0,
    timings: [Option<PwmTiming>; GENERATORS as usize],
}

impl Pwm0 {
    /// Power the module and set the PWM clock divider
    pub fn new(registers: PWM0, power_control: &PowerControl, divider: PwmDivider) -> Self {
        control_power(power_control, Domain::Pwm0, RunMode::Run, PowerState::On);
        registers.cc.write(|w| unsafe { w.bits(divider.cc_word()) });
        registers.enable.write(|w| unsafe { w.bits(0) });
        Pwm0 {
            registers,
            timings: [None; GENERATORS as usize],
        }
    }

    /// Hand the pin of `output` to the PWM module
    pub fn route_output(&self, power_control: &PowerControl, output: PwmOutput) {
        let (port, mask) = output_pin(output);
        gpio::alternate_function(power_control, port, mask, PCTL_PWM);
    }

    /// Set a generator's counting mode and period. The generator is left
    /// disabled with both compare values at the shortest pulse.
    pub fn configure_generator(
        &mut self,
        gen: u8,
        mode: GeneratorMode,
        period: u32,
    ) -> Result<PwmTiming, PwmError> {
        if gen >= GENERATORS {
            return Err(PwmError::NoSuchGenerator(gen));
        }
        let timing = PwmTiming::with_mode(period, mode)?;
        let shortest = timing.compare(1);

        let pwm = &self.registers;
        with_generator!(pwm, gen, |ctl, load, cmpa, cmpb, gena, genb| {
            ctl.write(|w| unsafe { w.bits(mode.ctl_word()) });
            gena.write(|w| unsafe { w.bits(mode.gen_a()) });
            genb.write(|w| unsafe { w.bits(mode.gen_b()) });
            load.write(|w| unsafe { w.bits(timing.load()) });
            cmpa.write(|w| unsafe { w.bits(shortest) });
            cmpb.write(|w| unsafe { w.bits(shortest) });
        });

        self.timings[gen as usize] = Some(timing);
        Ok(timing)
    }

    /// High time of `output` in PWM clocks, clamped inside the period
    pub fn set_pulse_width(&mut self, output: PwmOutput, width: u32) -> Result<(), PwmError> {
        let gen = output.generator();
        let timing = self
            .timings
            .get(gen as usize)
            .copied()
            .flatten()
            .ok_or(PwmError::Unconfigured(gen))?;
        let compare = timing.compare(width);

        let pwm = &self.registers;
        with_generator!(pwm, gen, |_ctl, _load, cmpa, cmpb, _gena, _genb| {
            if output.uses_comparator_a() {
                cmpa.write(|w| unsafe { w.bits(compare) });
            } else {
                cmpb.write(|w| unsafe { w.bits(compare) });
            }
        });
        Ok(())
    }

    /// Turn on the outputs whose bits are set in `mask`; others are unchanged
    pub fn enable_outputs(&mut self, mask: u32) {
        self.registers
            .enable
            .modify(|r, w| unsafe { w.bits(r.bits() | (mask & 0xFF)) });
    }

    /// Start a generator counting
    pub fn enable_generator(&mut self, gen: u8) -> Result<(), PwmError> {
        if gen >= GENERATORS {
            return Err(PwmError::NoSuchGenerator(gen));
        }
        let pwm = &self.registers;
        with_generator!(pwm, gen, |ctl, _load, _cmpa, _cmpb, _gena, _genb| {
            ctl.modify(|r, w| unsafe { w.bits(r.bits() | CTL_ENABLE) });
        });
        Ok(())
    }
}
