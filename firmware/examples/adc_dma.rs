//! Continuous ADC capture into a uDMA ping-pong buffer pair
//!
//! Sequencer 1 samples the on-chip temperature sensor back to back. Its uDMA
//! channel alternates between two 100-word buffers: while one fills, the
//! ADC0SS1 ISR finds the other stopped, counts it and re-arms it. The
//! foreground prints the counts once a second.

#![no_std]
#![no_main]

extern crate tm4c1294_launchpad;

use core::ptr::addr_of_mut;
use core::sync::atomic::{AtomicU32, Ordering};

use embedded_hal::blocking::delay::DelayMs;
use irq::{handler, scope};
use tm4c1294_launchpad::board::{safe, Board};
use tm4c1294_launchpad::console;
use tm4c1294_launchpad::drivers::adc::Adc;
use tm4c1294_launchpad::drivers::udma::Udma;
use tm4c1294_launchpad::startup::{clock, DeviceInterrupt};
use tm4c1294_launchpad_core::adc::{
    AdcClock, Input, Oversample, SampleHold, SequenceProgram, Sequencer, Trigger,
};
use tm4c1294_launchpad_core::pingpong::{Half, PingPong};
use tm4c1294_launchpad_core::udma::{DmaChannel, Priority, Transfer, TransferMode};
use ufmt::uwriteln;

const SEQUENCER: Sequencer = Sequencer::Ss1;
const BUFFER_LEN: usize = 100;
const REPORT_MS: u32 = 1000;

static mut BUFFER_A: [u32; BUFFER_LEN] = [0; BUFFER_LEN];
static mut BUFFER_B: [u32; BUFFER_LEN] = [0; BUFFER_LEN];

/// Completions of (primary, alternate)
static COUNT_A: AtomicU32 = AtomicU32::new(0);
static COUNT_B: AtomicU32 = AtomicU32::new(0);
/// Times a half finished twice in a row
static OVERRUNS: AtomicU32 = AtomicU32::new(0);

#[no_mangle]
pub fn stellaris_main(mut board: Board) -> ! {
    let mut console = console::uart0(board.UART0, board.GPIO_PORTA_AHB, &board.power_control);
    let mut delay = clock::start(&mut board.core_peripherals.SYST);
    let pc = &board.power_control;

    let adc = Adc::new(board.ADC0, pc, Oversample::None, AdcClock::PllVco { divisor: 15 });
    let steps = [Input::Temperature; 4];
    let Ok(program) = SequenceProgram::build(SEQUENCER, &steps, SampleHold::_256) else {
        safe()
    };
    adc.configure(Trigger::Always, &program);

    let udma = Udma::new(board.UDMA, pc);
    let ch = DmaChannel::for_adc0(SEQUENCER);
    udma.configure_channel(ch, Priority::Default);

    let fifo = adc.fifo_address(SEQUENCER);
    let dst = |half: Half| match half {
        Half::Primary => unsafe { addr_of_mut!(BUFFER_A) } as u32,
        Half::Alternate => unsafe { addr_of_mut!(BUFFER_B) } as u32,
    };
    let transfer = |half: Half| {
        Transfer::peripheral_to_memory(fifo, dst(half), BUFFER_LEN, TransferMode::PingPong)
    };
    let (primary, alternate) = match (transfer(Half::Primary), transfer(Half::Alternate)) {
        (Ok(p), Ok(a)) => (p, a),
        (Err(e), _) | (_, Err(e)) => {
            uwriteln!(console, "Transfer rejected: {:?}", e).unwrap_or_default();
            safe();
        }
    };
    udma.set_transfer(ch, Half::Primary, &primary);
    udma.set_transfer(ch, Half::Alternate, &alternate);
    udma.enable(ch);

    // Sampling starts here, but the CPU only hears about it once the handler
    // is in place
    adc.enable_dma(SEQUENCER);
    adc.arm_interrupt(SEQUENCER);
    adc.enable(SEQUENCER);

    let mut pingpong = PingPong::new();
    handler!(
        adc0ss1_handler = move || {
            adc.clear_interrupt(SEQUENCER);

            let primary_done = udma.mode(ch, Half::Primary) == TransferMode::Stop;
            let alternate_done = udma.mode(ch, Half::Alternate) == TransferMode::Stop;
            for half in pingpong.service_order(primary_done, alternate_done).into_iter().flatten() {
                if pingpong.complete(half).is_err() {
                    OVERRUNS.fetch_add(1, Ordering::Relaxed);
                }
                let (a, b) = pingpong.counts();
                COUNT_A.store(a, Ordering::Relaxed);
                COUNT_B.store(b, Ordering::Relaxed);

                let rearm = match half {
                    Half::Primary => &primary,
                    Half::Alternate => &alternate,
                };
                udma.set_transfer(ch, half, rearm);
            }

            // The channel stops itself when it runs into a finished structure
            if !udma.is_enabled(ch) {
                udma.enable(ch);
            }
        }
    );

    scope(|s| {
        s.register(DeviceInterrupt::ADC0SS1, adc0ss1_handler);
        Adc::unmask_interrupt(SEQUENCER);

        loop {
            delay.delay_ms(REPORT_MS);
            uwriteln!(
                console,
                "A: {}  B: {}  overruns: {}",
                COUNT_A.load(Ordering::Relaxed),
                COUNT_B.load(Ordering::Relaxed),
                OVERRUNS.load(Ordering::Relaxed)
            )
            .unwrap_or_default();
        }
    });

    loop {}
}
