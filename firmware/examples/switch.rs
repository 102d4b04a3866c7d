//! Light D1 while SW1 is held and D2 while SW2 is held, by polling

#![no_std]
#![no_main]

extern crate tm4c1294_launchpad;

use tm4c1294_launchpad::board::{Board, Button, Led};

#[no_mangle]
pub fn stellaris_main(mut board: Board) -> ! {
    loop {
        let sw1 = board.is_pressed(Button::Sw1);
        let sw2 = board.is_pressed(Button::Sw2);
        board.set_led(Led::D1, sw1);
        board.set_led(Led::D2, sw2);
    }
}
