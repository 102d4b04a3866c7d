//! Mirror SW1 on D1 and SW2 on D2 from the port J edge interrupt

#![no_std]
#![no_main]

extern crate tm4c1294_launchpad;

use embedded_hal::digital::v2::OutputPin;
use irq::{handler, scope};
use tm4c1294_launchpad::board::{Board, Button};
use tm4c1294_launchpad::drivers::gpio::{ButtonInterrupts, Edge};
use tm4c1294_launchpad::startup::DeviceInterrupt;

#[no_mangle]
pub fn stellaris_main(board: Board) -> ! {
    let mut d1 = board.led0;
    let mut d2 = board.led1;
    let mut buttons = ButtonInterrupts::new(Edge::Both);

    handler!(
        gpioj_handler = move || {
            for button in Button::flagged(buttons.take_flags()) {
                let pressed = buttons.is_pressed(button);
                let _ = match (button, pressed) {
                    (Button::Sw1, true) => d1.set_high(),
                    (Button::Sw1, false) => d1.set_low(),
                    (Button::Sw2, true) => d2.set_high(),
                    (Button::Sw2, false) => d2.set_low(),
                };
            }
        }
    );

    scope(|s| {
        s.register(DeviceInterrupt::GPIOJ, gpioj_handler);

        loop {
            cortex_m::asm::wfi();
        }
    });

    loop {}
}
