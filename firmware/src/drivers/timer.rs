//! General-purpose Timer 0, half A

use cortex_m::peripheral::NVIC;
use tm4c129x_hal::sysctl::{control_power, Domain, PowerControl, PowerState, RunMode};
use tm4c129x_hal::tm4c129x::{Interrupt, TIMER0};
use tm4c1294_launchpad_core::timing::TimerPeriod;

/// GPTMCFG: one 32-bit timer
const CFG_32_BIT: u32 = 0x0;
/// GPTMCFG: split into two 16-bit timers
const CFG_16_BIT: u32 = 0x4;
/// GPTMTAMR: periodic, counting down
const TAMR_PERIODIC: u32 = 0x2;
/// GPTMCTL.TAEN
const CTL_TAEN: u32 = 1 << 0;
/// GPTMCTL.TAOTE, timer A drives the ADC trigger
const CTL_TAOTE: u32 = 1 << 5;
/// Timer A time-out bit in IMR, RIS and ICR
const TATO: u32 = 1 << 0;
/// GPTMADCEV.TATOADCEN
const ADCEV_TATO: u32 = 1 << 0;

/// Timer 0A in periodic mode
pub struct Timer0 {
    timer: TIMER0,
}

impl Timer0 {
    fn power(timer: TIMER0, power_control: &PowerControl) -> Self {
        control_power(power_control, Domain::Timer0, RunMode::Run, PowerState::On);
        let timer0 = Timer0 { timer };
        // Disable before any configuration
        timer0.stop();
        timer0
    }

    /// 32-bit periodic timer that interrupts every `ticks + 1` system clocks.
    ///
    /// The TIMER0A interrupt is unmasked in the NVIC; the timer is left
    /// stopped.
    pub fn periodic(timer: TIMER0, power_control: &PowerControl, ticks: u32) -> Self {
        let t = Self::power(timer, power_control);
        t.timer.cfg.write(|w| unsafe { w.bits(CFG_32_BIT) });
        t.timer.tamr.write(|w| unsafe { w.bits(TAMR_PERIODIC) });
        t.timer.tailr.write(|w| unsafe { w.bits(ticks) });
        t.clear_timeout();
        t.timer.imr.write(|w| unsafe { w.bits(TATO) });
        unsafe { NVIC::unmask(Interrupt::TIMER0A) };
        t
    }

    /// 16-bit periodic timer with an 8-bit prescaler whose time-out triggers
    /// the ADC. No CPU interrupt is raised. The timer is left stopped.
    pub fn adc_trigger(timer: TIMER0, power_control: &PowerControl, period: TimerPeriod) -> Self {
        let t = Self::power(timer, power_control);
        t.timer.cfg.write(|w| unsafe { w.bits(CFG_16_BIT) });
        t.timer.tamr.write(|w| unsafe { w.bits(TAMR_PERIODIC) });
        t.timer.tapr.write(|w| unsafe { w.bits(period.prescale as u32) });
        t.timer.tailr.write(|w| unsafe { w.bits(period.reload as u32) });
        t.timer.adcev.write(|w| unsafe { w.bits(ADCEV_TATO) });
        t.timer.ctl.modify(|r, w| unsafe { w.bits(r.bits() | CTL_TAOTE) });
        t
    }

    /// Start counting
    pub fn start(&self) {
        self.timer.ctl.modify(|r, w| unsafe { w.bits(r.bits() | CTL_TAEN) });
    }

    /// Stop counting; the configuration is kept
    pub fn stop(&self) {
        self.timer.ctl.modify(|r, w| unsafe { w.bits(r.bits() & !CTL_TAEN) });
    }

    /// Acknowledge the time-out interrupt
    pub fn clear_timeout(&self) {
        self.timer.icr.write(|w| unsafe { w.bits(TATO) });
    }

    /// Give the peripheral back
    pub fn free(self) -> TIMER0 {
        self.stop();
        self.timer
    }
}
