//! Debounced press counter on SW1 and SW2
//!
//! Both edges interrupt. An edge within `DEBOUNCE_MS` of the last accepted
//! edge on the same button is ignored, so contact bounce neither counts nor
//! flickers the LEDs. D1 follows SW1 and D2 follows SW2.

#![no_std]
#![no_main]

extern crate tm4c1294_launchpad;

use core::sync::atomic::{AtomicU32, Ordering};

use embedded_hal::digital::v2::OutputPin;
use irq::{handler, scope};
use tm4c1294_launchpad::board::{Board, Button};
use tm4c1294_launchpad::console;
use tm4c1294_launchpad::drivers::gpio::{ButtonInterrupts, Edge};
use tm4c1294_launchpad::startup::{clock, DeviceInterrupt};
use tm4c1294_launchpad_core::buttons::{ButtonTracker, DEBOUNCE_MS};
use ufmt::uwriteln;

static COUNTS: [AtomicU32; 2] = [AtomicU32::new(0), AtomicU32::new(0)];

#[no_mangle]
pub fn stellaris_main(mut board: Board) -> ! {
    let mut console = console::uart0(board.UART0, board.GPIO_PORTA_AHB, &board.power_control);
    clock::start(&mut board.core_peripherals.SYST);
    uwriteln!(console, "Debounce window {} ms", DEBOUNCE_MS).unwrap_or_default();

    let mut d1 = board.led0;
    let mut d2 = board.led1;
    let mut buttons = ButtonInterrupts::new(Edge::Both);
    let mut tracker = ButtonTracker::new(DEBOUNCE_MS);

    handler!(
        gpioj_handler = move || {
            let now = clock::now_ms();
            for button in Button::flagged(buttons.take_flags()) {
                let pressed = buttons.is_pressed(button);
                let Some(event) = tracker.on_edge(button, pressed, now) else {
                    continue;
                };
                COUNTS[button as usize].store(event.count, Ordering::Relaxed);
                let _ = match (event.button, event.pressed) {
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
