//! Hardware definitions capturing the configuration of the board
use embedded_hal::digital::v2::{InputPin, OutputPin};
use tm4c129x_hal::gpio::{gpiof::*, gpioj::*, gpion::*, GpioExt, Input, Output, PullUp, PushPull};
use tm4c129x_hal::sysctl::{
    Clocks, CrystalFrequency, Oscillator, PllOutputFrequency, SysctlExt, SystemClock,
};
use tm4c129x_hal::time::Hertz;

pub use tm4c1294_launchpad_core::buttons::Button;

/// System clock after [`Board::new`]
pub const SYSCLK_HZ: u32 = 120_000_000;

/// The four user LEDs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Led {
    /// D1 on PN1
    D1,
    /// D2 on PN0
    D2,
    /// D3 on PF4
    D3,
    /// D4 on PF0
    D4,
}

/// Hardware definitions for the TM4C1294-XL Launchpad board
#[allow(non_snake_case)]
pub struct Board {
    /// The core peripherals on the TM4C129x
    pub core_peripherals: tm4c129x_hal::CorePeripherals,
    /// Power gating for peripherals in the TM4C129x
    pub power_control: tm4c129x_hal::sysctl::PowerControl,

    /// LED D1
    pub led0: PN1<Output<PushPull>>,
    /// LED D2
    pub led1: PN0<Output<PushPull>>,
    /// LED D3
    pub led2: PF4<Output<PushPull>>,
    /// LED D4
    pub led3: PF0<Output<PushPull>>,

    /// Button SW1, low while pressed
    pub button0: PJ0<Input<PullUp>>,
    /// Button SW2, low while pressed
    pub button1: PJ1<Input<PullUp>>,

    /// GPIO control for GPIO port F
    pub portf_control: tm4c129x_hal::gpio::gpiof::GpioControl,
    /// GPIO control for GPIO port N
    pub portn_control: tm4c129x_hal::gpio::gpion::GpioControl,
    /// GPIO control for GPIO port J
    pub portj_control: tm4c129x_hal::gpio::gpioj::GpioControl,

    #[doc = "GPIO_PORTA_AHB"]
    pub GPIO_PORTA_AHB: tm4c129x_hal::tm4c129x::GPIO_PORTA_AHB,
    #[doc = "GPIO_PORTB_AHB"]
    pub GPIO_PORTB_AHB: tm4c129x_hal::tm4c129x::GPIO_PORTB_AHB,
    #[doc = "GPIO_PORTD_AHB"]
    pub GPIO_PORTD_AHB: tm4c129x_hal::tm4c129x::GPIO_PORTD_AHB,
    #[doc = "GPIO_PORTE_AHB"]
    pub GPIO_PORTE_AHB: tm4c129x_hal::tm4c129x::GPIO_PORTE_AHB,
    #[doc = "GPIO_PORTG_AHB"]
    pub GPIO_PORTG_AHB: tm4c129x_hal::tm4c129x::GPIO_PORTG_AHB,
    #[doc = "GPIO_PORTK"]
    pub GPIO_PORTK: tm4c129x_hal::tm4c129x::GPIO_PORTK,

    #[doc = "UART0"]
    pub UART0: tm4c129x_hal::tm4c129x::UART0,
    #[doc = "PWM0"]
    pub PWM0: tm4c129x_hal::tm4c129x::PWM0,
    #[doc = "TIMER0"]
    pub TIMER0: tm4c129x_hal::tm4c129x::TIMER0,
    #[doc = "ADC0"]
    pub ADC0: tm4c129x_hal::tm4c129x::ADC0,
    #[doc = "UDMA"]
    pub UDMA: tm4c129x_hal::tm4c129x::UDMA,
    #[doc = "FLASH_CTRL"]
    pub FLASH_CTRL: tm4c129x_hal::tm4c129x::FLASH_CTRL,
    #[doc = "EMAC0"]
    pub EMAC0: tm4c129x_hal::tm4c129x::EMAC0,
}

/// Clock speed defaults
static mut CLOCKS: Clocks = Clocks {
    osc: Hertz(25_000_000),
    sysclk: Hertz(SYSCLK_HZ),
};

/// Get the current clock rate of the CPU
pub fn clocks() -> &'static Clocks {
    unsafe { &*core::ptr::addr_of!(CLOCKS) }
}

impl Board {
    // Initialize peripherals
    pub(crate) fn new() -> Board {
        let core_peripherals = match tm4c129x_hal::CorePeripherals::take() {
            Some(x) => x,
            None => loop {}, // This error occurs before the panic handler could even work
        };
        let peripherals = match tm4c129x_hal::Peripherals::take() {
            Some(x) => x,
            None => loop {}, // This error occurs before the panic handler could even work
        };

        let mut sysctl = peripherals.SYSCTL.constrain();

        // FPU
        unsafe {
            core_peripherals.SCB.cpacr.modify(|d| {
                d | (0x3 /* full */ << 20/* CP10 privilege */)
                    | (0x3 /* full */ << 22/* CP11 privilege */)
            });
        }

        // Clocks
        sysctl.clock_setup.oscillator = Oscillator::Main(
            CrystalFrequency::_25mhz,
            SystemClock::UsePll(PllOutputFrequency::_120mhz),
        );
        unsafe {
            CLOCKS = sysctl.clock_setup.freeze();
        }

        // GPIO (LEDs and buttons)
        let pins_gpion = peripherals.GPIO_PORTN.split(&sysctl.power_control);
        let led1: PN0<Output<PushPull>> = pins_gpion.pn0.into_push_pull_output();
        let led0: PN1<Output<PushPull>> = pins_gpion.pn1.into_push_pull_output();

        let pins_gpiof = peripherals.GPIO_PORTF_AHB.split(&sysctl.power_control);
        let led3: PF0<Output<PushPull>> = pins_gpiof.pf0.into_push_pull_output();
        let led2: PF4<Output<PushPull>> = pins_gpiof.pf4.into_push_pull_output();

        let pins_gpioj = peripherals.GPIO_PORTJ_AHB.split(&sysctl.power_control);
        let button0 = pins_gpioj.pj0.into_pull_up_input();
        let button1 = pins_gpioj.pj1.into_pull_up_input();

        Board {
            core_peripherals,
            power_control: sysctl.power_control,

            // --------- Board-specific ---------
            led0,
            led1,
            led2,
            led3,

            button0,
            button1,

            portf_control: pins_gpiof.control,
            portn_control: pins_gpion.control,
            portj_control: pins_gpioj.control,

            // ----------------------------------
            GPIO_PORTA_AHB: peripherals.GPIO_PORTA_AHB,
            GPIO_PORTB_AHB: peripherals.GPIO_PORTB_AHB,
            GPIO_PORTD_AHB: peripherals.GPIO_PORTD_AHB,
            GPIO_PORTE_AHB: peripherals.GPIO_PORTE_AHB,
            GPIO_PORTG_AHB: peripherals.GPIO_PORTG_AHB,
            GPIO_PORTK: peripherals.GPIO_PORTK,

            UART0: peripherals.UART0,
            PWM0: peripherals.PWM0,
            TIMER0: peripherals.TIMER0,
            ADC0: peripherals.ADC0,
            UDMA: peripherals.UDMA,
            FLASH_CTRL: peripherals.FLASH_CTRL,
            EMAC0: peripherals.EMAC0,
        }
    }

    /// Drive one of the user LEDs
    pub fn set_led(&mut self, led: Led, on: bool) {
        let _ = match (led, on) {
            (Led::D1, true) => self.led0.set_high(),
            (Led::D1, false) => self.led0.set_low(),
            (Led::D2, true) => self.led1.set_high(),
            (Led::D2, false) => self.led1.set_low(),
            (Led::D3, true) => self.led2.set_high(),
            (Led::D3, false) => self.led2.set_low(),
            (Led::D4, true) => self.led3.set_high(),
            (Led::D4, false) => self.led3.set_low(),
        };
    }

    /// Whether a user button is held down
    pub fn is_pressed(&self, button: Button) -> bool {
        match button {
            Button::Sw1 => self.button0.is_low().unwrap_or_default(),
            Button::Sw2 => self.button1.is_low().unwrap_or_default(),
        }
    }
}

/// Unrecoverable error; blink PF1 until reset
pub fn safe() -> ! {
    use embedded_hal::blocking::delay::DelayMs;
    let core_peripherals = unsafe { tm4c129x_hal::CorePeripherals::steal() };
    let p = unsafe { tm4c129x_hal::Peripherals::steal() };
    let pins = p.GPIO_PORTF_AHB.split(&p.SYSCTL.constrain().power_control);

    let mut delay = tm4c129x_hal::delay::Delay::new(core_peripherals.SYST, clocks());
    let mut fault_led = pins.pf1.into_push_pull_output();
    loop {
        fault_led.set_high().unwrap_or_default();
        delay.delay_ms(200u32);
        fault_led.set_low().unwrap_or_default();
        delay.delay_ms(200u32);
    }
}
