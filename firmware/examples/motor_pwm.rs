//! Rover drive over UART0
//!
//! Generators 1 and 2 run the drive outputs M0PWM2..5 (PF2, PF3, PG0, PG1) and
//! generator 3 the steering servo on M0PWM6 (PK4). PA7 holds the motor
//! driver's reset line low. Commands arrive one per line on the console, e.g.
//! `F1`, `LB2`, `STOP`, `S0` or `auto1`. With `auto1` the IR pair on AIN0 and
//! AIN8 is read every 100 ms and the rover steers away from obstacles until
//! `auto0` or any drive command.

#![no_std]
#![no_main]

extern crate tm4c1294_launchpad;

use tm4c129x_hal::sysctl::PowerControl;
use tm4c1294_launchpad::board::{safe, Board};
use tm4c1294_launchpad::console;
use tm4c1294_launchpad::drivers::adc::Adc;
use tm4c1294_launchpad::drivers::gpio::{self, Port};
use tm4c1294_launchpad::drivers::pwm::Pwm0;
use tm4c1294_launchpad::startup::clock;
use tm4c1294_launchpad_core::adc::{
    AdcClock, AnalogInput, Input, Oversample, SampleHold, SequenceProgram, Sequencer, Trigger,
};
use tm4c1294_launchpad_core::ir::ObstacleReading;
use tm4c1294_launchpad_core::motor::{
    CommandLatch, Drive, ServoPosition, DRIVE_PERIOD, SERVO_PERIOD,
};
use tm4c1294_launchpad_core::pwm::{GeneratorMode, PwmDivider, PwmError, PwmOutput};
use tm4c1294_launchpad_core::rover::RoverCommand;
use ufmt::uwriteln;

const PWM_DIVIDER: PwmDivider = PwmDivider::_2;
const DRIVE_GENERATORS: [u8; 2] = [1, 2];
const SERVO_GENERATOR: u8 = 3;
const DRIVE_OUTPUTS: [u8; 4] = [2, 3, 4, 5];
const SERVO_OUTPUT: u8 = 6;
/// Motor driver reset, PA7
const RESET_PIN: u8 = 1 << 7;

const SEQUENCER: Sequencer = Sequencer::Ss1;
const IR_LEFT: u8 = 0;
const IR_RIGHT: u8 = 8;
const AUTONOMOUS_PERIOD_MS: u32 = 100;

/// Load the widths of `drive` into the outputs it changes
fn apply(pwm: &mut Pwm0, drive: Drive) -> Result<(), PwmError> {
    for (output, width) in drive.pulse_widths().changes() {
        pwm.set_pulse_width(PwmOutput::new(output.number())?, width as u32)?;
    }
    Ok(())
}

fn set_servo(pwm: &mut Pwm0, position: ServoPosition) -> Result<(), PwmError> {
    pwm.set_pulse_width(PwmOutput::new(SERVO_OUTPUT)?, position.pulse_width() as u32)
}

/// Generators, pins and a stopped initial state
fn setup_pwm(pwm: &mut Pwm0, pc: &PowerControl) -> Result<(), PwmError> {
    for gen in DRIVE_GENERATORS {
        pwm.configure_generator(gen, GeneratorMode::CountDown, DRIVE_PERIOD as u32)?;
    }
    pwm.configure_generator(SERVO_GENERATOR, GeneratorMode::CountDown, SERVO_PERIOD as u32)?;

    let mut mask = 0;
    for n in DRIVE_OUTPUTS.into_iter().chain([SERVO_OUTPUT]) {
        let output = PwmOutput::new(n)?;
        pwm.route_output(pc, output);
        mask |= output.enable_mask();
    }

    apply(pwm, Drive::Stop)?;
    set_servo(pwm, ServoPosition::Middle)?;
    pwm.enable_outputs(mask);
    for gen in DRIVE_GENERATORS.into_iter().chain([SERVO_GENERATOR]) {
        pwm.enable_generator(gen)?;
    }
    Ok(())
}

#[no_mangle]
pub fn stellaris_main(mut board: Board) -> ! {
    let _delay = clock::start(&mut board.core_peripherals.SYST);

    gpio::output(&board.power_control, Port::A, RESET_PIN);
    gpio::write(Port::A, RESET_PIN, false);

    let mut pwm = Pwm0::new(board.PWM0, &board.power_control, PWM_DIVIDER);
    let pwm_result = setup_pwm(&mut pwm, &board.power_control);

    let mut console = console::uart0(board.UART0, board.GPIO_PORTA_AHB, &board.power_control);
    if let Err(e) = pwm_result {
        uwriteln!(console, "PWM setup failed: {:?}", e).unwrap_or_default();
        safe();
    }

    let pc = &board.power_control;
    let adc = Adc::new(board.ADC0, pc, Oversample::_4x, AdcClock::PllVco { divisor: 15 });
    let program = AnalogInput::new(IR_LEFT)
        .and_then(|left| AnalogInput::new(IR_RIGHT).map(|right| (left, right)))
        .and_then(|(left, right)| {
            adc.configure_pins(pc, &[left, right]);
            SequenceProgram::build(
                SEQUENCER,
                &[Input::Channel(left), Input::Channel(right)],
                SampleHold::_16,
            )
        });
    match program {
        Ok(program) => adc.configure(Trigger::Processor, &program),
        Err(e) => {
            uwriteln!(console, "ADC setup failed: {:?}", e).unwrap_or_default();
            safe();
        }
    }
    adc.enable(SEQUENCER);

    uwriteln!(console, "Rover ready").unwrap_or_default();

    let mut line = heapless::String::<16>::new();
    let mut latch = CommandLatch::new();
    let mut autonomous = false;
    let mut last_sample = clock::now_ms();
    loop {
        if console.poll_line(&mut line) {
            match RoverCommand::parse(&line) {
                Ok(RoverCommand::Drive(drive)) => {
                    autonomous = false;
                    latch.reset();
                    apply(&mut pwm, drive).unwrap_or_default();
                    uwriteln!(console, "{:?}", drive).unwrap_or_default();
                }
                Ok(RoverCommand::Servo(position)) => {
                    set_servo(&mut pwm, position).unwrap_or_default();
                    uwriteln!(console, "Servo {:?}", position).unwrap_or_default();
                }
                Ok(RoverCommand::Autonomous(on)) => {
                    autonomous = on;
                    latch.reset();
                    if !on {
                        apply(&mut pwm, Drive::Stop).unwrap_or_default();
                    }
                    uwriteln!(console, "Autonomous {}", on).unwrap_or_default();
                }
                Err(e) => uwriteln!(console, "? {:?}", e).unwrap_or_default(),
            }
            line.clear();
        }

        let now = clock::now_ms();
        if autonomous && now.wrapping_sub(last_sample) >= AUTONOMOUS_PERIOD_MS {
            last_sample = now;
            let mut raw = [0_u16; 2];
            if adc.sample_blocking(SEQUENCER, &mut raw) == 2 {
                let reading = ObstacleReading::from_raw(raw[0], raw[1]);
                if let Some(drive) = latch.update(reading.avoidance()) {
                    apply(&mut pwm, drive).unwrap_or_default();
                    uwriteln!(console, "{:?}", drive).unwrap_or_default();
                }
            }
        }
    }
}
