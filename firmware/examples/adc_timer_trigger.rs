//! Timer-triggered ADC driving the brightness of D4
//!
//! Timer 0A triggers sequencer 3 on AIN0 (PE3) ten times a second. The ADC0SS3
//! ISR reads the conversion, toggles D1 and sets the duty of M0PWM0, which is
//! the pin under LED D4 (PF0), in proportion to the reading.

#![no_std]
#![no_main]

extern crate tm4c1294_launchpad;

use core::sync::atomic::{AtomicU32, Ordering};

use embedded_hal::digital::v2::OutputPin;
use irq::{handler, scope};
use tm4c1294_launchpad::board::{safe, Board, SYSCLK_HZ};
use tm4c1294_launchpad::console;
use tm4c1294_launchpad::drivers::adc::Adc;
use tm4c1294_launchpad::drivers::pwm::Pwm0;
use tm4c1294_launchpad::drivers::timer::Timer0;
use tm4c1294_launchpad::startup::DeviceInterrupt;
use tm4c1294_launchpad_core::adc::{
    AdcClock, AnalogInput, Input, Oversample, SampleHold, SequenceProgram, Sequencer, Trigger,
};
use tm4c1294_launchpad_core::pwm::{duty_from_adc, GeneratorMode, PwmDivider, PwmOutput};
use tm4c1294_launchpad_core::timing::TimerPeriod;
use ufmt::uwriteln;

const SEQUENCER: Sequencer = Sequencer::Ss3;
const CHANNEL: u8 = 0;
const SAMPLE_HZ: u32 = 10;
const PWM_DIVIDER: PwmDivider = PwmDivider::_64;
const PWM_HZ: u32 = 1000;
const INITIAL_DUTY_PERCENT: u32 = 15;

static LATEST: AtomicU32 = AtomicU32::new(0);
static SAMPLES: AtomicU32 = AtomicU32::new(0);

#[no_mangle]
pub fn stellaris_main(board: Board) -> ! {
    let mut console = console::uart0(board.UART0, board.GPIO_PORTA_AHB, &board.power_control);
    let pc = &board.power_control;

    // PWM first, so D4 shows the initial duty before any sample arrives
    let period = PWM_DIVIDER.clock_hz(SYSCLK_HZ) / PWM_HZ;
    let mut pwm = Pwm0::new(board.PWM0, pc, PWM_DIVIDER);
    let Ok(out0) = PwmOutput::new(0) else { safe() };
    pwm.route_output(pc, out0);
    let started = pwm
        .configure_generator(out0.generator(), GeneratorMode::CountDown, period)
        .and_then(|_| pwm.set_pulse_width(out0, period * INITIAL_DUTY_PERCENT / 100))
        .and_then(|_| {
            pwm.enable_outputs(out0.enable_mask());
            pwm.enable_generator(out0.generator())
        });
    if let Err(e) = started {
        uwriteln!(console, "PWM setup failed: {:?}", e).unwrap_or_default();
        safe();
    }

    let adc = Adc::new(board.ADC0, pc, Oversample::None, AdcClock::PllVco { divisor: 15 });
    let program = AnalogInput::new(CHANNEL).and_then(|ain| {
        adc.configure_pins(pc, &[ain]);
        SequenceProgram::build(SEQUENCER, &[Input::Channel(ain)], SampleHold::_16)
    });
    match program {
        Ok(program) => adc.configure(Trigger::Timer, &program),
        Err(e) => {
            uwriteln!(console, "ADC setup failed: {:?}", e).unwrap_or_default();
            safe();
        }
    }
    adc.enable_interrupt(SEQUENCER);
    adc.enable(SEQUENCER);

    let Some(rate) = TimerPeriod::for_rate(SYSCLK_HZ, SAMPLE_HZ) else { safe() };
    let timer = Timer0::adc_trigger(board.TIMER0, pc, rate);

    let mut d1 = board.led0;
    let mut on = false;
    handler!(
        adc0ss3_handler = move || {
            adc.clear_interrupt(SEQUENCER);
            let mut value = [0_u16; 1];
            if adc.read_fifo(SEQUENCER, &mut value) == 1 {
                let _ = pwm.set_pulse_width(out0, duty_from_adc(value[0], period));
                LATEST.store(value[0] as u32, Ordering::Relaxed);
                SAMPLES.fetch_add(1, Ordering::Release);
            }
            on = !on;
            let _ = if on { d1.set_high() } else { d1.set_low() };
        }
    );

    uwriteln!(
        console,
        "AIN{} at {} Hz, PWM period {}",
        CHANNEL,
        rate.rate_hz(SYSCLK_HZ),
        period
    )
    .unwrap_or_default();

    scope(|s| {
        s.register(DeviceInterrupt::ADC0SS3, adc0ss3_handler);
        timer.start();

        let mut shown = 0;
        loop {
            let n = SAMPLES.load(Ordering::Acquire);
            if n != shown {
                shown = n;
                let value = LATEST.load(Ordering::Relaxed);
                uwriteln!(console, "{}: {}", n, value).unwrap_or_default();
            }
            cortex_m::asm::wfi();
        }
    });

    loop {}
}
