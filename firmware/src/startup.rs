//! Handles board-specific CPU startup

use cortex_m;
use cortex_m_rt::{entry, exception, ExceptionFrame};

use super::board::{safe, Board};
use tm4c129x_hal::tm4c129x::interrupt;

use irq::{handler, scope, scoped_interrupts};

// This function must be implemented by the application that uses the crate
// and is the entry-point for that application after board initialization
extern "Rust" {
    fn stellaris_main(board: Board);
}

/// Performs what you might otherwise call 'C Startup'.
/// This routine is specified at the reset vector in the ISR vector table.
///
/// Registers placeholder handlers for everything an application may override,
/// brings up the board and hands it to `stellaris_main`.
#[entry]
unsafe fn call_main() -> ! {
    // Initialize runtime-defined exception handlers before running any
    // application code or doing anything that might trigger them
    handler!(systick_default_handler = || clock::tick());
    handler!(pendsv_default_handler = || {});
    handler!(svcall_default_handler = || {});

    // Device interrupts stay masked in the NVIC until an application unmasks them
    handler!(gpioj_default_handler = || {});
    handler!(timer0a_default_handler = || {});
    handler!(adc0ss0_default_handler = || {});
    handler!(adc0ss1_default_handler = || {});
    handler!(adc0ss3_default_handler = || {});

    scope(|default| {
        default.register(Interrupt::SysTick, systick_default_handler);
        default.register(Interrupt::PendSV, pendsv_default_handler);
        default.register(Interrupt::SVCall, svcall_default_handler);

        default.register(DeviceInterrupt::GPIOJ, gpioj_default_handler);
        default.register(DeviceInterrupt::TIMER0A, timer0a_default_handler);
        default.register(DeviceInterrupt::ADC0SS0, adc0ss0_default_handler);
        default.register(DeviceInterrupt::ADC0SS1, adc0ss1_default_handler);
        default.register(DeviceInterrupt::ADC0SS3, adc0ss3_default_handler);

        let board = Board::new();
        stellaris_main(board);
    });

    loop {
        cortex_m::asm::wfi();
    }
}

/// Millisecond time base on SysTick
pub mod clock {
    use core::sync::atomic::{AtomicU32, Ordering};

    use cortex_m::peripheral::syst::SystClkSource;
    use cortex_m::peripheral::SYST;
    use embedded_hal::blocking::delay::DelayMs;
    use tm4c1294_launchpad_core::timing::systick_reload;

    use crate::board::clocks;

    static MILLIS: AtomicU32 = AtomicU32::new(0);

    /// Interrupt once per millisecond from the core clock.
    ///
    /// The count advances from the default SysTick handler, so an application
    /// that registers its own SysTick handler must call [`tick`] from it.
    pub fn start(syst: &mut SYST) -> Delay {
        syst.set_clock_source(SystClkSource::Core);
        syst.set_reload(systick_reload(clocks().sysclk.0, 1));
        syst.clear_current();
        syst.enable_interrupt();
        syst.enable_counter();
        Delay { _private: () }
    }

    /// Advance the count by one millisecond
    pub fn tick() {
        MILLIS.fetch_add(1, Ordering::Relaxed);
    }

    /// Milliseconds since [`start`]. Wraps after about 49 days.
    pub fn now_ms() -> u32 {
        MILLIS.load(Ordering::Relaxed)
    }

    /// Sleeping delay on the millisecond count
    #[derive(Clone, Copy)]
    pub struct Delay {
        _private: (),
    }

    impl DelayMs<u32> for Delay {
        fn delay_ms(&mut self, ms: u32) {
            let start = now_ms();
            while now_ms().wrapping_sub(start) < ms {
                cortex_m::asm::wfi();
            }
        }
    }
}

/// A HardFault is an exception that occurs because of an error during
/// exception processing, or because an exception cannot be managed by any
/// other exception mechanism. HardFaults have a fixed priority of -1, meaning
/// they have higher priority than any exception with configurable priority.
#[exception]
unsafe fn HardFault(_sf: &ExceptionFrame) -> ! {
    #[cfg(debug_assertions)]
    {
        use tm4c129x_hal::sysctl::SysctlExt;

        let peripherals = tm4c129x_hal::Peripherals::steal();
        let sysctl = peripherals.SYSCTL.constrain();
        let mut console = crate::console::uart0(
            peripherals.UART0,
            peripherals.GPIO_PORTA_AHB,
            &sysctl.power_control,
        );
        console.print_fmt(format_args!("SF: {:?}\n", _sf));
    }

    safe();
}

/// A Non Maskable Interrupt (NMI) can be signalled by a peripheral or
/// triggered by software. It is permanently enabled and has a fixed priority
/// of -2.
#[exception]
unsafe fn NonMaskableInt() {
    safe();
}

/// Memory protection fault, including execution from an Execute Never region.
#[exception]
fn MemoryManagement() {
    safe();
}

/// Bus error on an instruction or data transaction.
#[exception]
fn BusFault() {
    safe();
}

/// Undefined instruction, invalid state or a bad exception return. When the
/// core is configured to report them, also unaligned access and division by
/// zero.
#[exception]
fn UsageFault() {
    safe();
}

/// A place-holder ISR used when we have nothing better to use.
#[exception]
unsafe fn DefaultHandler(_irq_number: i16) {
    // Nothing
}

scoped_interrupts! {
    /// Exception interrupts that can be overridden by the user at runtime
    ///
    /// SysTick drives [`clock`] unless an application replaces it. SVCall and
    /// PendSV have no default work.
    #[allow(missing_docs)]
    pub enum Interrupt {
        SysTick,
        SVCall,
        PendSV
    }

    use #[exception];
}

scoped_interrupts! {
    /// Device interrupts used by the examples, overridable at runtime
    ///
    /// Each must also be unmasked in the NVIC before it fires.
    #[allow(missing_docs)]
    #[allow(clippy::upper_case_acronyms)]
    pub enum DeviceInterrupt {
        GPIOJ,
        TIMER0A,
        ADC0SS0,
        ADC0SS1,
        ADC0SS3
    }

    use #[interrupt];
}
