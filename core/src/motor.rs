//! Drive commands for the two-motor rover on PWM0
//!
//! The motor driver takes one PWM pair per side. Generator 1 drives outputs 2
//! and 3, generator 2 drives outputs 4 and 5, both with a period of 8000 PWM
//! clocks. The steering servo hangs off output 6 on generator 3.

use ufmt::derive::uDebug;

/// Period of generators 1 and 2 in PWM clocks
pub const DRIVE_PERIOD: u16 = 8000;
/// Period of generator 3 in PWM clocks
pub const SERVO_PERIOD: u16 = 800;
/// Width that holds an output in the stopped state
pub const STOP_WIDTH: u16 = 4000;

/// Speed step of a drive command
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub enum Speed {
    /// Step 1
    Slow,
    /// Step 2
    Fast,
}

/// Motion command
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub enum Drive {
    /// Hold every output at the stop width
    Stop,
    /// Straight ahead
    Forward(Speed),
    /// Straight back
    Backward(Speed),
    /// Ahead, veering left
    LeftForward(Speed),
    /// Back, veering left
    LeftBackward(Speed),
    /// Ahead, veering right
    RightForward(Speed),
    /// Back, veering right
    RightBackward(Speed),
}

/// A PWM0 output used by the drive
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub enum MotorOutput {
    /// M0PWM2 on PF2
    Out2,
    /// M0PWM3 on PF3
    Out3,
    /// M0PWM4 on PG0
    Out4,
    /// M0PWM5 on PG1
    Out5,
}

impl MotorOutput {
    /// PWM0 output number
    pub const fn number(self) -> u8 {
        match self {
            MotorOutput::Out2 => 2,
            MotorOutput::Out3 => 3,
            MotorOutput::Out4 => 4,
            MotorOutput::Out5 => 5,
        }
    }
}

/// Pulse widths for one command. `None` leaves that output as it was.
#[derive(Clone, Copy, Debug, uDebug, Default, PartialEq, Eq)]
pub struct PulseWidths {
    /// M0PWM2
    pub out2: Option<u16>,
    /// M0PWM3
    pub out3: Option<u16>,
    /// M0PWM4
    pub out4: Option<u16>,
    /// M0PWM5
    pub out5: Option<u16>,
}

impl PulseWidths {
    /// Outputs that change, in the order the motor driver expects them written
    pub fn changes(&self) -> impl Iterator<Item = (MotorOutput, u16)> {
        [
            (MotorOutput::Out3, self.out3),
            (MotorOutput::Out2, self.out2),
            (MotorOutput::Out4, self.out4),
            (MotorOutput::Out5, self.out5),
        ]
        .into_iter()
        .filter_map(|(out, w)| w.map(|w| (out, w)))
    }
}

impl Drive {
    /// Widths to load for this command
    pub fn pulse_widths(self) -> PulseWidths {
        use Drive::*;

        // (out3, out2) on the first generator
        let (out3, out2) = match self {
            Stop => {
                return PulseWidths {
                    out2: Some(STOP_WIDTH),
                    out3: Some(STOP_WIDTH),
                    out4: Some(STOP_WIDTH),
                    out5: Some(STOP_WIDTH),
                }
            }
            Forward(s) | LeftForward(s) | RightForward(s) => match s {
                Speed::Slow => (2000, 200),
                Speed::Fast => (3000, 300),
            },
            Backward(s) => match s {
                Speed::Slow => (200, 2000),
                Speed::Fast => (300, 3000),
            },
            // Both steps of a veering reverse use the slow widths
            LeftBackward(_) | RightBackward(_) => (200, 2000),
        };

        // (out4, out5) on the second generator
        let steer = match self {
            LeftForward(_) | LeftBackward(_) => Some((4000, 400)),
            RightForward(_) | RightBackward(_) => Some((400, 4000)),
            _ => None,
        };

        PulseWidths {
            out2: Some(out2),
            out3: Some(out3),
            out4: steer.map(|(a, _)| a),
            out5: steer.map(|(_, b)| b),
        }
    }
}

/// Steering servo position on M0PWM6
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub enum ServoPosition {
    /// Position 0
    Low,
    /// Position 1
    Middle,
    /// Position 2
    High,
}

impl ServoPosition {
    /// Width in PWM clocks out of [`SERVO_PERIOD`]
    pub const fn pulse_width(self) -> u16 {
        match self {
            ServoPosition::Low => 40,
            ServoPosition::Middle => 60,
            ServoPosition::High => 80,
        }
    }

    /// Position from its index 0..=2
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(ServoPosition::Low),
            1 => Some(ServoPosition::Middle),
            2 => Some(ServoPosition::High),
            _ => None,
        }
    }
}

/// Passes a command through only when it differs from the previous one
#[derive(Clone, Copy, Debug, Default)]
pub struct CommandLatch<T> {
    last: Option<T>,
}

impl<T: Copy + PartialEq> CommandLatch<T> {
    /// Nothing latched yet
    pub const fn new() -> Self {
        CommandLatch { last: None }
    }

    /// Returns `Some(cmd)` if `cmd` is new
    pub fn update(&mut self, cmd: T) -> Option<T> {
        if self.last == Some(cmd) {
            return None;
        }
        self.last = Some(cmd);
        Some(cmd)
    }

    /// Forget the last command so the next one always passes
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widths(d: Drive) -> [Option<u16>; 4] {
        let p = d.pulse_widths();
        [p.out3, p.out2, p.out4, p.out5]
    }

    #[test]
    fn straight_commands_leave_steering_alone() {
        assert_eq!(widths(Drive::Forward(Speed::Slow)), [Some(2000), Some(200), None, None]);
        assert_eq!(widths(Drive::Forward(Speed::Fast)), [Some(3000), Some(300), None, None]);
        assert_eq!(widths(Drive::Backward(Speed::Slow)), [Some(200), Some(2000), None, None]);
        assert_eq!(widths(Drive::Backward(Speed::Fast)), [Some(300), Some(3000), None, None]);
    }

    #[test]
    fn stop_holds_every_output() {
        assert_eq!(widths(Drive::Stop), [Some(4000); 4]);
    }

    #[test]
    fn veering_commands() {
        assert_eq!(
            widths(Drive::LeftForward(Speed::Fast)),
            [Some(3000), Some(300), Some(4000), Some(400)]
        );
        assert_eq!(
            widths(Drive::RightForward(Speed::Slow)),
            [Some(2000), Some(200), Some(400), Some(4000)]
        );
        assert_eq!(
            widths(Drive::LeftBackward(Speed::Fast)),
            widths(Drive::LeftBackward(Speed::Slow))
        );
        assert_eq!(
            widths(Drive::RightBackward(Speed::Fast)),
            [Some(200), Some(2000), Some(400), Some(4000)]
        );
    }

    #[test]
    fn changes_skip_untouched_outputs() {
        let c: Vec<_> = Drive::Backward(Speed::Slow).pulse_widths().changes().collect();
        assert_eq!(c, [(MotorOutput::Out3, 200), (MotorOutput::Out2, 2000)]);
    }

    #[test]
    fn every_width_fits_its_period() {
        let all = [
            Drive::Stop,
            Drive::Forward(Speed::Fast),
            Drive::LeftForward(Speed::Fast),
            Drive::RightBackward(Speed::Slow),
        ];
        for d in all {
            for (_, w) in d.pulse_widths().changes() {
                assert!(w < DRIVE_PERIOD);
            }
        }
        for i in 0..3 {
            assert!(ServoPosition::from_index(i).unwrap().pulse_width() < SERVO_PERIOD);
        }
        assert_eq!(ServoPosition::from_index(3), None);
    }

    #[test]
    fn latch_suppresses_repeats() {
        let mut latch = CommandLatch::new();
        assert_eq!(latch.update(Drive::Stop), Some(Drive::Stop));
        assert_eq!(latch.update(Drive::Stop), None);
        assert_eq!(
            latch.update(Drive::Forward(Speed::Slow)),
            Some(Drive::Forward(Speed::Slow))
        );
        latch.reset();
        assert_eq!(
            latch.update(Drive::Forward(Speed::Slow)),
            Some(Drive::Forward(Speed::Slow))
        );
    }
}
