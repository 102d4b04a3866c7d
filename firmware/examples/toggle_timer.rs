//! Toggle LEDs D1 and D2 from the Timer 0A time-out interrupt
//!
//! The foreground does nothing but sleep; every half second the timer ISR
//! acknowledges the time-out and flips both LEDs.

#![no_std]
#![no_main]

extern crate tm4c1294_launchpad;

use embedded_hal::digital::v2::OutputPin;
use irq::{handler, scope};
use tm4c1294_launchpad::board::{Board, SYSCLK_HZ};
use tm4c1294_launchpad::drivers::timer::Timer0;
use tm4c1294_launchpad::startup::DeviceInterrupt;
use tm4c1294_launchpad_core::timing::periodic_ticks;

const PERIOD_MS: u32 = 500;

#[no_mangle]
pub fn stellaris_main(board: Board) -> ! {
    let timer = Timer0::periodic(
        board.TIMER0,
        &board.power_control,
        periodic_ticks(SYSCLK_HZ, PERIOD_MS),
    );
    let mut d1 = board.led0;
    let mut d2 = board.led1;
    let timer = &timer;

    let mut on = false;
    handler!(
        timer0a_handler = move || {
            timer.clear_timeout();
            on = !on;
            if on {
                d1.set_high().unwrap_or_default();
                d2.set_high().unwrap_or_default();
            } else {
                d1.set_low().unwrap_or_default();
                d2.set_low().unwrap_or_default();
            }
        }
    );

    scope(|s| {
        s.register(DeviceInterrupt::TIMER0A, timer0a_handler);
        timer.start();

        loop {
            cortex_m::asm::wfi();
        }
    });

    loop {}
}
