//! Count presses of SW1 and SW2 from the falling-edge interrupt and report the
//! counts on the console

#![no_std]
#![no_main]

extern crate tm4c1294_launchpad;

use core::sync::atomic::{AtomicU32, Ordering};

use irq::{handler, scope};
use tm4c1294_launchpad::board::{Board, Button};
use tm4c1294_launchpad::console;
use tm4c1294_launchpad::drivers::gpio::{ButtonInterrupts, Edge};
use tm4c1294_launchpad::startup::{clock, DeviceInterrupt};
use tm4c1294_launchpad_core::buttons::ButtonTracker;
use ufmt::uwriteln;

/// Presses on SW1 and SW2, written by the ISR
static COUNTS: [AtomicU32; 2] = [AtomicU32::new(0), AtomicU32::new(0)];

#[no_mangle]
pub fn stellaris_main(mut board: Board) -> ! {
    let mut console = console::uart0(board.UART0, board.GPIO_PORTA_AHB, &board.power_control);
    clock::start(&mut board.core_peripherals.SYST);
    uwriteln!(console, "Press SW1 or SW2").unwrap_or_default();

    let mut buttons = ButtonInterrupts::new(Edge::Falling);
    let mut tracker = ButtonTracker::new(0);

    handler!(
        gpioj_handler = move || {
            let now = clock::now_ms();
            for button in Button::flagged(buttons.take_flags()) {
                if let Some(count) = tracker.on_press(button, now) {
                    COUNTS[button as usize].store(count, Ordering::Relaxed);
                }
            }
        }
    );

    scope(|s| {
        s.register(DeviceInterrupt::GPIOJ, gpioj_handler);

        let mut shown = [0_u32; 2];
        loop {
            let counts = [
                COUNTS[0].load(Ordering::Relaxed),
                COUNTS[1].load(Ordering::Relaxed),
            ];
            if counts != shown {
                shown = counts;
                uwriteln!(console, "SW1: {}  SW2: {}", counts[0], counts[1]).unwrap_or_default();
            }
            cortex_m::asm::wfi();
        }
    });

    loop {}
}
