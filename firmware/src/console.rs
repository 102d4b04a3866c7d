//! Serial console on UART0, routed through the debugger's virtual COM port
//!
//! Output goes through `ufmt` so that logging does not pull in the core
//! formatting machinery. `core::fmt` is still available for the few places
//! that print floats.

use core::fmt;

use embedded_hal::serial;
use tm4c129x_hal::gpio::GpioExt;
use tm4c129x_hal::serial::{NewlineMode, Serial};
use tm4c129x_hal::sysctl::PowerControl;
use tm4c129x_hal::time::Bps;
use tm4c129x_hal::tm4c129x::{GPIO_PORTA_AHB, UART0};
use ufmt::uWrite;

use crate::board::clocks;

/// Console baud rate
pub const BAUD: u32 = 115_200;

/// Line-oriented serial console
pub struct Console<S> {
    serial: S,
}

/// Open UART0 on PA0/PA1 at 115200 8N1, translating `\n` to `\r\n`
pub fn uart0(
    uart: UART0,
    porta: GPIO_PORTA_AHB,
    power_control: &PowerControl,
) -> Console<impl fmt::Write + serial::Read<u8>> {
    let mut pins_a = porta.split(power_control);
    let serial = Serial::uart0(
        uart,
        pins_a.pa1.into_af_push_pull(&mut pins_a.control),
        pins_a.pa0.into_af_push_pull(&mut pins_a.control),
        (),
        (),
        Bps(BAUD),
        NewlineMode::SwapLFtoCRLF,
        clocks(),
        power_control,
    );
    Console { serial }
}

impl<S: fmt::Write> Console<S> {
    /// Print with `core::fmt`, for values `ufmt` can't format
    pub fn print_fmt(&mut self, args: fmt::Arguments) {
        self.serial.write_fmt(args).unwrap_or_default();
    }
}

impl<S: serial::Read<u8>> Console<S> {
    /// Next received byte, if one is waiting
    pub fn read_byte(&mut self) -> Option<u8> {
        self.serial.read().ok()
    }

    /// Collect received bytes into `line` until a newline arrives.
    ///
    /// Returns true once a complete line is buffered. Bytes past the capacity
    /// of `line` are dropped and `\r` is ignored.
    pub fn poll_line<const N: usize>(&mut self, line: &mut heapless::String<N>) -> bool {
        while let Some(b) = self.read_byte() {
            match b {
                b'\n' => return true,
                b'\r' => {}
                b if b.is_ascii() => {
                    let _ = line.push(b as char);
                }
                _ => {}
            }
        }
        false
    }
}

impl<S: fmt::Write> uWrite for Console<S> {
    type Error = fmt::Error;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        self.serial.write_str(s)
    }
}
