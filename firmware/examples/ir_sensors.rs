//! Read the left and right IR range sensors
//!
//! Sequencer 1 converts AIN0 (PE3, left) then AIN8 (PE5, right) per software
//! trigger. Every 100 ms the pair is turned into distances and the command the
//! avoidance policy would give; a command is only printed when it changes.

#![no_std]
#![no_main]

extern crate tm4c1294_launchpad;

use embedded_hal::blocking::delay::DelayMs;
use tm4c1294_launchpad::board::{safe, Board};
use tm4c1294_launchpad::console;
use tm4c1294_launchpad::drivers::adc::Adc;
use tm4c1294_launchpad::startup::clock;
use tm4c1294_launchpad_core::adc::{
    AdcClock, AnalogInput, Input, Oversample, SampleHold, SequenceProgram, Sequencer, Trigger,
};
use tm4c1294_launchpad_core::ir::ObstacleReading;
use tm4c1294_launchpad_core::motor::CommandLatch;
use ufmt::uwriteln;

const SEQUENCER: Sequencer = Sequencer::Ss1;
const LEFT: u8 = 0;
const RIGHT: u8 = 8;
const SAMPLE_MS: u32 = 100;
/// Distances are printed every this many samples
const PRINT_EVERY: u32 = 10;

#[no_mangle]
pub fn stellaris_main(mut board: Board) -> ! {
    let mut console = console::uart0(board.UART0, board.GPIO_PORTA_AHB, &board.power_control);
    let mut delay = clock::start(&mut board.core_peripherals.SYST);
    let pc = &board.power_control;

    let adc = Adc::new(board.ADC0, pc, Oversample::_4x, AdcClock::PllVco { divisor: 15 });
    let program = AnalogInput::new(LEFT)
        .and_then(|left| AnalogInput::new(RIGHT).map(|right| (left, right)))
        .and_then(|(left, right)| {
            adc.configure_pins(pc, &[left, right]);
            SequenceProgram::build(
                SEQUENCER,
                &[Input::Channel(left), Input::Channel(right)],
                SampleHold::_16,
            )
        });
    match program {
        Ok(program) => adc.configure(Trigger::Processor, &program),
        Err(e) => {
            uwriteln!(console, "ADC setup failed: {:?}", e).unwrap_or_default();
            safe();
        }
    }
    adc.enable(SEQUENCER);

    let mut latch = CommandLatch::new();
    let mut count = 0_u32;
    loop {
        let mut raw = [0_u16; 2];
        if adc.sample_blocking(SEQUENCER, &mut raw) == 2 {
            let reading = ObstacleReading::from_raw(raw[0], raw[1]);

            if count % PRINT_EVERY == 0 {
                uwriteln!(
                    console,
                    "left {:?} cm  right {:?} cm  diff {}",
                    reading.left_cm,
                    reading.right_cm,
                    reading.difference()
                )
                .unwrap_or_default();
            }
            if let Some(drive) = latch.update(reading.avoidance()) {
                uwriteln!(console, "-> {:?}", drive).unwrap_or_default();
            }
            count = count.wrapping_add(1);
        }

        delay.delay_ms(SAMPLE_MS);
    }
}
