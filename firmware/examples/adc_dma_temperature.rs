//! Timer-paced temperature logging through uDMA ping-pong buffers
//!
//! Timer 0A triggers sequencer 0 ten times a second, four sensor samples per
//! trigger, so each 200-word buffer holds five seconds of data. When a buffer
//! completes, the ADC0SS0 ISR averages it, converts the result, steps the
//! two-LED counter on D1/D2 and re-arms the buffer.

#![no_std]
#![no_main]

extern crate tm4c1294_launchpad;

use core::ptr::{addr_of, addr_of_mut};
use core::sync::atomic::{compiler_fence, AtomicI32, AtomicU32, Ordering};

use embedded_hal::digital::v2::OutputPin;
use irq::{handler, scope};
use tm4c1294_launchpad::board::{safe, Board, SYSCLK_HZ};
use tm4c1294_launchpad::console;
use tm4c1294_launchpad::drivers::adc::Adc;
use tm4c1294_launchpad::drivers::timer::Timer0;
use tm4c1294_launchpad::drivers::udma::Udma;
use tm4c1294_launchpad::startup::DeviceInterrupt;
use tm4c1294_launchpad_core::adc::{
    AdcClock, Input, Oversample, SampleHold, SequenceProgram, Sequencer, Trigger,
};
use tm4c1294_launchpad_core::leds::BinaryCounter;
use tm4c1294_launchpad_core::pingpong::{Half, PingPong};
use tm4c1294_launchpad_core::temperature::Temperature;
use tm4c1294_launchpad_core::timing::TimerPeriod;
use tm4c1294_launchpad_core::udma::{DmaChannel, Priority, Transfer, TransferMode};
use ufmt::uwriteln;

const SEQUENCER: Sequencer = Sequencer::Ss0;
const STEPS: usize = 4;
const TRIGGER_HZ: u32 = 10;
const BUFFER_LEN: usize = 200;

static mut BUFFER_A: [u32; BUFFER_LEN] = [0; BUFFER_LEN];
static mut BUFFER_B: [u32; BUFFER_LEN] = [0; BUFFER_LEN];

static CELSIUS: AtomicI32 = AtomicI32::new(0);
static FAHRENHEIT: AtomicI32 = AtomicI32::new(0);
static RAW: AtomicU32 = AtomicU32::new(0);
/// Buffers converted so far
static READINGS: AtomicU32 = AtomicU32::new(0);

/// The samples of a stopped half
fn samples(half: Half) -> &'static [u32; BUFFER_LEN] {
    // The DMA has moved on to the other half
    compiler_fence(Ordering::SeqCst);
    unsafe {
        match half {
            Half::Primary => &*addr_of!(BUFFER_A),
            Half::Alternate => &*addr_of!(BUFFER_B),
        }
    }
}

#[no_mangle]
pub fn stellaris_main(board: Board) -> ! {
    let mut console = console::uart0(board.UART0, board.GPIO_PORTA_AHB, &board.power_control);
    let pc = &board.power_control;

    let adc = Adc::new(board.ADC0, pc, Oversample::None, AdcClock::PllVco { divisor: 15 });
    let Ok(program) =
        SequenceProgram::build(SEQUENCER, &[Input::Temperature; STEPS], SampleHold::_256)
    else {
        safe()
    };
    adc.configure(Trigger::Timer, &program);

    let udma = Udma::new(board.UDMA, pc);
    let ch = DmaChannel::for_adc0(SEQUENCER);
    udma.configure_channel(ch, Priority::Default);

    let fifo = adc.fifo_address(SEQUENCER);
    let a = unsafe { addr_of_mut!(BUFFER_A) } as u32;
    let b = unsafe { addr_of_mut!(BUFFER_B) } as u32;
    let transfers = (
        Transfer::peripheral_to_memory(fifo, a, BUFFER_LEN, TransferMode::PingPong),
        Transfer::peripheral_to_memory(fifo, b, BUFFER_LEN, TransferMode::PingPong),
    );
    let (primary, alternate) = match transfers {
        (Ok(p), Ok(a)) => (p, a),
        (Err(e), _) | (_, Err(e)) => {
            uwriteln!(console, "Transfer rejected: {:?}", e).unwrap_or_default();
            safe();
        }
    };
    udma.set_transfer(ch, Half::Primary, &primary);
    udma.set_transfer(ch, Half::Alternate, &alternate);
    udma.enable(ch);

    adc.enable_dma(SEQUENCER);
    adc.enable_interrupt(SEQUENCER);
    adc.enable(SEQUENCER);

    let Some(rate) = TimerPeriod::for_rate(SYSCLK_HZ, TRIGGER_HZ) else { safe() };
    let timer = Timer0::adc_trigger(board.TIMER0, pc, rate);

    let mut d1 = board.led0;
    let mut d2 = board.led1;
    let mut counter = BinaryCounter::new();
    let mut pingpong = PingPong::new();
    handler!(
        adc0ss0_handler = move || {
            adc.clear_interrupt(SEQUENCER);

            let primary_done = udma.mode(ch, Half::Primary) == TransferMode::Stop;
            let alternate_done = udma.mode(ch, Half::Alternate) == TransferMode::Stop;
            for half in pingpong.service_order(primary_done, alternate_done).into_iter().flatten() {
                let _ = pingpong.complete(half);

                if let Some(t) = Temperature::from_samples(samples(half)) {
                    RAW.store(t.raw, Ordering::Relaxed);
                    CELSIUS.store(t.celsius, Ordering::Relaxed);
                    FAHRENHEIT.store(t.fahrenheit, Ordering::Relaxed);
                    READINGS.fetch_add(1, Ordering::Release);
                }

                counter.advance();
                let _ = if counter.pn0() { d2.set_high() } else { d2.set_low() };
                let _ = if counter.pn1() { d1.set_high() } else { d1.set_low() };

                let rearm = match half {
                    Half::Primary => &primary,
                    Half::Alternate => &alternate,
                };
                udma.set_transfer(ch, half, rearm);
            }

            if !udma.is_enabled(ch) {
                udma.enable(ch);
            }
        }
    );

    uwriteln!(
        console,
        "Averaging {} samples per reading",
        BUFFER_LEN
    )
    .unwrap_or_default();

    scope(|s| {
        s.register(DeviceInterrupt::ADC0SS0, adc0ss0_handler);
        timer.start();

        let mut shown = 0;
        loop {
            let n = READINGS.load(Ordering::Acquire);
            if n != shown {
                shown = n;
                uwriteln!(
                    console,
                    "raw {}  {} C  {} F",
                    RAW.load(Ordering::Relaxed),
                    CELSIUS.load(Ordering::Relaxed),
                    FAHRENHEIT.load(Ordering::Relaxed)
                )
                .unwrap_or_default();
            }
            cortex_m::asm::wfi();
        }
    });

    loop {}
}
