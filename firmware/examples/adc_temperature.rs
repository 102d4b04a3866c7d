//! Read the on-chip temperature sensor once a second
//!
//! Sequencer 1 takes four samples of the sensor per software trigger. The
//! four are averaged with rounding and converted to degrees C and F.

#![no_std]
#![no_main]

extern crate tm4c1294_launchpad;

use embedded_hal::blocking::delay::DelayMs;
use tm4c1294_launchpad::board::{safe, Board};
use tm4c1294_launchpad::console;
use tm4c1294_launchpad::drivers::adc::Adc;
use tm4c1294_launchpad::startup::clock;
use tm4c1294_launchpad_core::adc::{
    AdcClock, Input, Oversample, SampleHold, SequenceProgram, Sequencer, Trigger,
};
use tm4c1294_launchpad_core::temperature::Temperature;
use ufmt::uwriteln;

const SEQUENCER: Sequencer = Sequencer::Ss1;
const SAMPLES: usize = 4;
const REPORT_MS: u32 = 1000;

#[no_mangle]
pub fn stellaris_main(mut board: Board) -> ! {
    let mut console = console::uart0(board.UART0, board.GPIO_PORTA_AHB, &board.power_control);
    let mut delay = clock::start(&mut board.core_peripherals.SYST);

    let adc = Adc::new(
        board.ADC0,
        &board.power_control,
        Oversample::None,
        AdcClock::PllVco { divisor: 15 },
    );
    let program = match SequenceProgram::build(
        SEQUENCER,
        &[Input::Temperature; SAMPLES],
        SampleHold::_256,
    ) {
        Ok(p) => p,
        Err(e) => {
            uwriteln!(console, "Sequence rejected: {:?}", e).unwrap_or_default();
            safe();
        }
    };
    adc.configure(Trigger::Processor, &program);
    adc.enable(SEQUENCER);

    uwriteln!(console, "Temperature sensor").unwrap_or_default();
    loop {
        let mut raw = [0_u16; SAMPLES];
        let n = adc.sample_blocking(SEQUENCER, &mut raw);
        let samples = raw.map(|s| s as u32);

        match Temperature::from_samples(&samples[..n]) {
            Some(t) => uwriteln!(
                console,
                "raw {}  {} C  {} F",
                t.raw,
                t.celsius,
                t.fahrenheit
            )
            .unwrap_or_default(),
            None => uwriteln!(console, "No samples").unwrap_or_default(),
        }

        delay.delay_ms(REPORT_MS);
    }
}
