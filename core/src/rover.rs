//! Text command protocol for driving the rover
//!
//! Commands are short ASCII words, one per line. Motion commands are a direction
//! mnemonic followed by a signed velocity: `F`, `B`, `L`, `R`, `LF`, `RF`, `LB`
//! and `RB`, e.g. `LF2` or `B-1`. Velocity 0 stops, a negative velocity reverses
//! the direction and any magnitude above 2 runs at the fast step. `STOP` stops,
//! `S0`..`S2` position the servo and `auto0`/`auto1` switch obstacle avoidance.

use ufmt::derive::uDebug;

use crate::motor::{Drive, ServoPosition, Speed};

/// A parsed command line
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub enum RoverCommand {
    /// Apply a motion command
    Drive(Drive),
    /// Move the steering servo
    Servo(ServoPosition),
    /// Turn obstacle avoidance on or off
    Autonomous(bool),
}

/// Command parse errors
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub enum CommandError {
    /// Blank line
    Empty,
    /// Mnemonic not recognized
    UnknownCommand,
    /// Missing or unparseable number after the mnemonic
    BadArgument,
}

impl RoverCommand {
    /// Parse one line, ignoring surrounding whitespace
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandError::Empty);
        }
        if line.eq_ignore_ascii_case("STOP") {
            return Ok(RoverCommand::Drive(Drive::Stop));
        }

        let split = line
            .find(|c: char| c == '-' || c.is_ascii_digit())
            .ok_or(CommandError::BadArgument)?;
        let (head, arg) = line.split_at(split);
        let arg: i8 = arg.parse().map_err(|_| CommandError::BadArgument)?;

        match head {
            "auto" => match arg {
                0 => Ok(RoverCommand::Autonomous(false)),
                1 => Ok(RoverCommand::Autonomous(true)),
                _ => Err(CommandError::BadArgument),
            },
            "S" => u8::try_from(arg)
                .ok()
                .and_then(ServoPosition::from_index)
                .map(RoverCommand::Servo)
                .ok_or(CommandError::BadArgument),
            _ => parse_drive(head, arg).map(RoverCommand::Drive),
        }
    }
}

fn parse_drive(head: &str, velocity: i8) -> Result<Drive, CommandError> {
    use Drive::*;

    let speed = match velocity.unsigned_abs() {
        0 | 1 => Speed::Slow,
        _ => Speed::Fast,
    };
    let reverse = velocity < 0;
    let drive = match (head, reverse) {
        ("F", false) | ("B", true) => Forward(speed),
        ("B", false) | ("F", true) => Backward(speed),
        ("L" | "LF", false) | ("LB", true) => LeftForward(speed),
        ("LB", false) | ("L" | "LF", true) => LeftBackward(speed),
        ("R" | "RF", false) | ("RB", true) => RightForward(speed),
        ("RB", false) | ("R" | "RF", true) => RightBackward(speed),
        _ => return Err(CommandError::UnknownCommand),
    };
    match velocity {
        0 => Ok(Stop),
        _ => Ok(drive),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(line: &str) -> Drive {
        match RoverCommand::parse(line) {
            Ok(RoverCommand::Drive(d)) => d,
            other => panic!("{line:?} parsed as {other:?}"),
        }
    }

    #[test]
    fn straight_commands() {
        assert_eq!(drive("F1"), Drive::Forward(Speed::Slow));
        assert_eq!(drive("F2"), Drive::Forward(Speed::Fast));
        assert_eq!(drive("B1"), Drive::Backward(Speed::Slow));
        assert_eq!(drive(" STOP\r\n"), Drive::Stop);
        assert_eq!(drive("stop"), Drive::Stop);
    }

    #[test]
    fn veering_commands_and_turn_aliases() {
        assert_eq!(drive("LF2"), Drive::LeftForward(Speed::Fast));
        assert_eq!(drive("L2"), Drive::LeftForward(Speed::Fast));
        assert_eq!(drive("RB1"), Drive::RightBackward(Speed::Slow));
        assert_eq!(drive("R1"), Drive::RightForward(Speed::Slow));
    }

    #[test]
    fn negative_velocity_reverses() {
        assert_eq!(drive("F-2"), Drive::Backward(Speed::Fast));
        assert_eq!(drive("LF-1"), Drive::LeftBackward(Speed::Slow));
        assert_eq!(drive("RB-1"), Drive::RightForward(Speed::Slow));
    }

    #[test]
    fn zero_velocity_stops_and_large_saturates() {
        assert_eq!(drive("F0"), Drive::Stop);
        assert_eq!(drive("B9"), Drive::Backward(Speed::Fast));
    }

    #[test]
    fn servo_and_mode_commands() {
        assert_eq!(
            RoverCommand::parse("S1"),
            Ok(RoverCommand::Servo(ServoPosition::Middle))
        );
        assert_eq!(RoverCommand::parse("auto1"), Ok(RoverCommand::Autonomous(true)));
        assert_eq!(RoverCommand::parse("auto0"), Ok(RoverCommand::Autonomous(false)));
    }

    #[test]
    fn malformed_lines() {
        assert_eq!(RoverCommand::parse("   "), Err(CommandError::Empty));
        assert_eq!(RoverCommand::parse("F"), Err(CommandError::BadArgument));
        assert_eq!(RoverCommand::parse("X1"), Err(CommandError::UnknownCommand));
        assert_eq!(RoverCommand::parse("S5"), Err(CommandError::BadArgument));
        assert_eq!(RoverCommand::parse("auto7"), Err(CommandError::BadArgument));
        assert_eq!(RoverCommand::parse("F300"), Err(CommandError::BadArgument));
    }
}
