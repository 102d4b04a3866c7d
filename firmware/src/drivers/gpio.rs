//! Raw pin configuration for analog, alternate-function and interrupt use
//!
//! The HAL pin types cover plain digital I/O. Pins that belong to the ADC, PWM
//! or an interrupt are set up here directly through the port registers.

use cortex_m::peripheral::NVIC;
use tm4c129x_hal::sysctl::{control_power, Domain, PowerControl, PowerState, RunMode};
use tm4c129x_hal::tm4c129x::{
    Interrupt, GPIO_PORTA_AHB, GPIO_PORTB_AHB, GPIO_PORTD_AHB, GPIO_PORTE_AHB, GPIO_PORTF_AHB,
    GPIO_PORTG_AHB, GPIO_PORTJ_AHB, GPIO_PORTK, GPIO_PORTN,
};
use tm4c1294_launchpad_core::adc;
use tm4c1294_launchpad_core::buttons::Button;
use ufmt::derive::uDebug;

/// Value that opens GPIOCR for writing
const UNLOCK_KEY: u32 = 0x4C4F_434B;

/// GPIO ports reachable through this module
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Port {
    A,
    B,
    D,
    E,
    F,
    G,
    J,
    K,
    N,
}

impl Port {
    fn domain(self) -> Domain {
        match self {
            Port::A => Domain::GpioA,
            Port::B => Domain::GpioB,
            Port::D => Domain::GpioD,
            Port::E => Domain::GpioE,
            Port::F => Domain::GpioF,
            Port::G => Domain::GpioG,
            Port::J => Domain::GpioJ,
            Port::K => Domain::GpioK,
            Port::N => Domain::GpioN,
        }
    }
}

impl From<adc::Port> for Port {
    fn from(port: adc::Port) -> Self {
        match port {
            adc::Port::B => Port::B,
            adc::Port::D => Port::D,
            adc::Port::E => Port::E,
            adc::Port::K => Port::K,
        }
    }
}

/// Run `$body` with `$gpio` bound to the register block of `$port`
macro_rules! with_port {
    ($port:expr, |$gpio:ident| $body:expr) => {
        match $port {
            Port::A => {
                let $gpio = unsafe { &*GPIO_PORTA_AHB::ptr() };
                $body
            }
            Port::B => {
                let $gpio = unsafe { &*GPIO_PORTB_AHB::ptr() };
                $body
            }
            Port::D => {
                let $gpio = unsafe { &*GPIO_PORTD_AHB::ptr() };
                $body
            }
            Port::E => {
                let $gpio = unsafe { &*GPIO_PORTE_AHB::ptr() };
                $body
            }
            Port::F => {
                let $gpio = unsafe { &*GPIO_PORTF_AHB::ptr() };
                $body
            }
            Port::G => {
                let $gpio = unsafe { &*GPIO_PORTG_AHB::ptr() };
                $body
            }
            Port::J => {
                let $gpio = unsafe { &*GPIO_PORTJ_AHB::ptr() };
                $body
            }
            Port::K => {
                let $gpio = unsafe { &*GPIO_PORTK::ptr() };
                $body
            }
            Port::N => {
                let $gpio = unsafe { &*GPIO_PORTN::ptr() };
                $body
            }
        }
    };
}

/// Set or clear `mask` in a register through read-modify-write
macro_rules! set_bits {
    ($reg:expr, $mask:expr, $on:expr) => {
        $reg.modify(|r, w| unsafe {
            w.bits(if $on {
                r.bits() | $mask
            } else {
                r.bits() & !$mask
            })
        })
    };
}

/// Power a port's clock gate
pub fn power(power_control: &PowerControl, port: Port) {
    control_power(power_control, port.domain(), RunMode::Run, PowerState::On);
}

/// Hand the pins in `mask` to the ADC: alternate function and analog mode
/// on, digital buffer off.
///
/// Locked pins (PD7) are unlocked first when `unlock` is set.
pub fn analog_input(power_control: &PowerControl, port: Port, mask: u8, unlock: bool) {
    power(power_control, port);
    let mask = mask as u32;
    with_port!(port, |gpio| {
        if unlock {
            gpio.lock.write(|w| unsafe { w.bits(UNLOCK_KEY) });
            set_bits!(gpio.cr, mask, true);
        }
        set_bits!(gpio.dir, mask, false);
        set_bits!(gpio.afsel, mask, true);
        set_bits!(gpio.den, mask, false);
        set_bits!(gpio.amsel, mask, true);
    });
}

/// Route the pins in `mask` to peripheral function `function` (PCTL code)
pub fn alternate_function(power_control: &PowerControl, port: Port, mask: u8, function: u8) {
    power(power_control, port);
    let pctl = pctl_word(mask, function);
    let mask = mask as u32;
    with_port!(port, |gpio| {
        set_bits!(gpio.amsel, mask, false);
        set_bits!(gpio.afsel, mask, true);
        set_bits!(gpio.den, mask, true);
        gpio.pctl.modify(|r, w| unsafe { w.bits((r.bits() & !pctl.0) | pctl.1) });
    });
}

/// Plain push-pull outputs, for pins the HAL doesn't hand out
pub fn output(power_control: &PowerControl, port: Port, mask: u8) {
    power(power_control, port);
    let mask = mask as u32;
    with_port!(port, |gpio| {
        set_bits!(gpio.afsel, mask, false);
        set_bits!(gpio.dir, mask, true);
        set_bits!(gpio.den, mask, true);
    });
}

/// Drive the outputs in `mask` high or low
pub fn write(port: Port, mask: u8, high: bool) {
    let mask = mask as u32;
    with_port!(port, |gpio| set_bits!(gpio.data, mask, high));
}

/// Current levels of the whole port
pub fn read(port: Port) -> u8 {
    with_port!(port, |gpio| gpio.data.read().bits() as u8)
}

/// Clear mask and new value for the PCTL nibbles of `mask`
fn pctl_word(mask: u8, function: u8) -> (u32, u32) {
    let mut clear = 0_u32;
    let mut set = 0_u32;
    for pin in 0..8 {
        if mask & (1 << pin) != 0 {
            clear |= 0xF << (4 * pin);
            set |= ((function & 0xF) as u32) << (4 * pin);
        }
    }
    (clear, set)
}

/// Which transitions of a button pin raise the interrupt
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub enum Edge {
    /// Press only, since the buttons are active low
    Falling,
    /// Release only
    Rising,
    /// Press and release
    Both,
}

/// Edge interrupts from SW1 and SW2 on port J
///
/// The HAL has already made PJ0/PJ1 pulled-up inputs; this only touches the
/// interrupt registers.
pub struct ButtonInterrupts {
    _private: (),
}

impl ButtonInterrupts {
    const MASK: u32 = Button::Sw1.pin_mask() | Button::Sw2.pin_mask();

    /// Arm the port J interrupt for both buttons and unmask it in the NVIC
    pub fn new(edge: Edge) -> Self {
        let gpio = unsafe { &*GPIO_PORTJ_AHB::ptr() };
        // Mask while reconfiguring so a half-set sense can't fire
        set_bits!(gpio.im, Self::MASK, false);
        set_bits!(gpio.is, Self::MASK, false);
        match edge {
            Edge::Both => set_bits!(gpio.ibe, Self::MASK, true),
            Edge::Falling => {
                set_bits!(gpio.ibe, Self::MASK, false);
                set_bits!(gpio.iev, Self::MASK, false);
            }
            Edge::Rising => {
                set_bits!(gpio.ibe, Self::MASK, false);
                set_bits!(gpio.iev, Self::MASK, true);
            }
        }
        gpio.icr.write(|w| unsafe { w.bits(Self::MASK) });
        set_bits!(gpio.im, Self::MASK, true);

        unsafe { NVIC::unmask(Interrupt::GPIOJ) };
        ButtonInterrupts { _private: () }
    }

    /// Read and acknowledge the pending button flags. Call from the GPIOJ
    /// handler.
    pub fn take_flags(&mut self) -> u32 {
        let gpio = unsafe { &*GPIO_PORTJ_AHB::ptr() };
        let flags = gpio.mis.read().bits() & Self::MASK;
        gpio.icr.write(|w| unsafe { w.bits(flags) });
        flags
    }

    /// Whether `button` is held down right now
    pub fn is_pressed(&self, button: Button) -> bool {
        read(Port::J) as u32 & button.pin_mask() == 0
    }
}
