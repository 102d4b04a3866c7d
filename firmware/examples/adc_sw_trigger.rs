//! Software-triggered ADC on one selectable channel, paced by Timer 0A
//!
//! At 10 Hz the timer ISR triggers sequencer 3, waits for the single
//! conversion, stores it and toggles D1. The foreground prints each new
//! value. Typing a channel number (0-19) and Enter switches the input.

#![no_std]
#![no_main]

extern crate tm4c1294_launchpad;

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use embedded_hal::digital::v2::OutputPin;
use irq::{handler, scope};
use tm4c1294_launchpad::board::{Board, SYSCLK_HZ};
use tm4c1294_launchpad::console;
use tm4c1294_launchpad::drivers::adc::Adc;
use tm4c1294_launchpad::drivers::timer::Timer0;
use tm4c1294_launchpad::startup::DeviceInterrupt;
use tm4c1294_launchpad_core::adc::{
    AdcClock, AnalogInput, Input, Oversample, SampleHold, SequenceProgram, Sequencer, Trigger,
};
use ufmt::uwriteln;

const SEQUENCER: Sequencer = Sequencer::Ss3;
const SAMPLE_HZ: u32 = 10;
const DEFAULT_CHANNEL: u8 = 0;

/// Channel the foreground asked for
static REQUESTED: AtomicU8 = AtomicU8::new(DEFAULT_CHANNEL);
/// Last conversion
static LATEST: AtomicU32 = AtomicU32::new(0);
/// Conversions so far
static SAMPLES: AtomicU32 = AtomicU32::new(0);

/// Point sequencer 3 at `channel`; false if there is no such input
fn select(adc: &Adc, channel: u8) -> bool {
    let Ok(ain) = AnalogInput::new(channel) else {
        return false;
    };
    match SequenceProgram::build(SEQUENCER, &[Input::Channel(ain)], SampleHold::_16) {
        Ok(program) => {
            adc.configure(Trigger::Processor, &program);
            adc.enable(SEQUENCER);
            true
        }
        Err(_) => false,
    }
}

#[no_mangle]
pub fn stellaris_main(board: Board) -> ! {
    let mut console = console::uart0(board.UART0, board.GPIO_PORTA_AHB, &board.power_control);

    let adc = Adc::new(
        board.ADC0,
        &board.power_control,
        Oversample::_4x,
        AdcClock::PllVco { divisor: 15 },
    );
    // Every input gets its pin in analog mode up front so switching is just
    // a new sequence
    for channel in 0..20 {
        if let Ok(ain) = AnalogInput::new(channel) {
            adc.configure_pins(&board.power_control, &[ain]);
        }
    }
    select(&adc, DEFAULT_CHANNEL);

    let timer = Timer0::periodic(board.TIMER0, &board.power_control, SYSCLK_HZ / SAMPLE_HZ - 1);
    let mut d1 = board.led0;
    let mut current = DEFAULT_CHANNEL;
    let mut on = false;

    uwriteln!(console, "Sampling AIN{} at {} Hz", current, SAMPLE_HZ).unwrap_or_default();

    let timer = &timer;
    handler!(
        timer0a_handler = move || {
            timer.clear_timeout();

            let wanted = REQUESTED.load(Ordering::Relaxed);
            if wanted != current && select(&adc, wanted) {
                current = wanted;
            }

            let mut value = [0_u16; 1];
            if adc.sample_blocking(SEQUENCER, &mut value) == 1 {
                LATEST.store(value[0] as u32, Ordering::Relaxed);
                SAMPLES.fetch_add(1, Ordering::Release);
            }

            on = !on;
            let _ = if on { d1.set_high() } else { d1.set_low() };
        }
    );

    scope(|s| {
        s.register(DeviceInterrupt::TIMER0A, timer0a_handler);
        timer.start();

        let mut line = heapless::String::<8>::new();
        let mut shown = 0;
        loop {
            let n = SAMPLES.load(Ordering::Acquire);
            if n != shown {
                shown = n;
                let value = LATEST.load(Ordering::Relaxed);
                let channel = REQUESTED.load(Ordering::Relaxed);
                uwriteln!(console, "AIN{}: {}", channel, value).unwrap_or_default();
            }

            if console.poll_line(&mut line) {
                match line.trim().parse::<u8>() {
                    Ok(ch) if AnalogInput::new(ch).is_ok() => {
                        REQUESTED.store(ch, Ordering::Relaxed);
                    }
                    _ => uwriteln!(console, "Channels are 0-19").unwrap_or_default(),
                }
                line.clear();
            }
        }
    });

    loop {}
}
