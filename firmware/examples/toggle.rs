//! Toggle LEDs D1 and D2 together from a busy loop

#![no_std]
#![no_main]

extern crate tm4c1294_launchpad;

use embedded_hal::blocking::delay::DelayMs;
use tm4c1294_launchpad::board::{Board, Led};
use tm4c1294_launchpad::startup::clock;

/// Half of the blink period
const TOGGLE_MS: u32 = 200;

#[no_mangle]
pub fn stellaris_main(mut board: Board) -> ! {
    let mut delay = clock::start(&mut board.core_peripherals.SYST);

    let mut on = false;
    loop {
        on = !on;
        board.set_led(Led::D1, on);
        board.set_led(Led::D2, on);
        delay.delay_ms(TOGGLE_MS);
    }
}
