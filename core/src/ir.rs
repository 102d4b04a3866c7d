//! Infrared range sensor pair used for obstacle avoidance

use ufmt::derive::uDebug;

use crate::motor::{Drive, Speed};

/// Anything closer than this counts as an obstacle
pub const OBSTACLE_THRESHOLD_CM: u32 = 50;
/// Both sides closer than this means back off instead of steering
pub const BACK_OFF_CM: u32 = 15;

/// Convert a 12-bit reading to a distance in whole centimetres.
///
/// Uses the fitted curve `1 / ((37/648000) * raw - 67/6480)`. Returns `None`
/// below the sensor's range, where the curve has no positive solution.
pub fn distance_cm(raw: u16) -> Option<u32> {
    let inverse = (37.0_f32 / 648_000.0) * raw as f32 - 67.0_f32 / 6480.0;
    if inverse <= 0.0 {
        return None;
    }
    // Float to int casts saturate
    Some((1.0 / inverse) as u32)
}

/// One reading of the left and right sensors
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub struct ObstacleReading {
    /// Left distance, `None` when out of range
    pub left_cm: Option<u32>,
    /// Right distance, `None` when out of range
    pub right_cm: Option<u32>,
}

impl ObstacleReading {
    /// Convert a pair of raw samples
    pub fn from_raw(left: u16, right: u16) -> Self {
        ObstacleReading {
            left_cm: distance_cm(left),
            right_cm: distance_cm(right),
        }
    }

    fn near(d: Option<u32>, limit: u32) -> bool {
        matches!(d, Some(cm) if cm <= limit)
    }

    /// Right minus left when either side sees an obstacle, else zero.
    ///
    /// Positive means there is more room to the right.
    pub fn difference(&self) -> i32 {
        if !Self::near(self.left_cm, OBSTACLE_THRESHOLD_CM)
            && !Self::near(self.right_cm, OBSTACLE_THRESHOLD_CM)
        {
            return 0;
        }
        let far = |d: Option<u32>| d.unwrap_or(u32::MAX) as i64;
        (far(self.right_cm) - far(self.left_cm)).clamp(i32::MIN as i64, i32::MAX as i64) as i32
    }

    /// Drive command that steers away from whatever is closest
    pub fn avoidance(&self) -> Drive {
        let left = Self::near(self.left_cm, OBSTACLE_THRESHOLD_CM);
        let right = Self::near(self.right_cm, OBSTACLE_THRESHOLD_CM);
        if !left && !right {
            return Drive::Forward(Speed::Slow);
        }
        if Self::near(self.left_cm, BACK_OFF_CM) && Self::near(self.right_cm, BACK_OFF_CM) {
            return Drive::Backward(Speed::Slow);
        }
        match self.difference() {
            d if d > 0 => Drive::RightForward(Speed::Slow),
            _ => Drive::LeftForward(Speed::Slow),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_curve() {
        assert_eq!(distance_cm(1000), Some(21));
        assert_eq!(distance_cm(4095), Some(4));
        // Below about 182 counts the curve is undefined
        assert_eq!(distance_cm(100), None);
        assert_eq!(distance_cm(0), None);
    }

    #[test]
    fn close_readings_mean_larger_counts() {
        let near = distance_cm(3000).unwrap();
        let far = distance_cm(500).unwrap();
        assert!(near < far);
    }

    #[test]
    fn no_obstacle_means_no_difference() {
        let r = ObstacleReading {
            left_cm: Some(80),
            right_cm: None,
        };
        assert_eq!(r.difference(), 0);
        assert_eq!(r.avoidance(), Drive::Forward(Speed::Slow));
    }

    #[test]
    fn steer_toward_open_side() {
        let wall_left = ObstacleReading {
            left_cm: Some(20),
            right_cm: Some(90),
        };
        assert_eq!(wall_left.difference(), 70);
        assert_eq!(wall_left.avoidance(), Drive::RightForward(Speed::Slow));

        let wall_right = ObstacleReading {
            left_cm: Some(60),
            right_cm: Some(30),
        };
        assert_eq!(wall_right.difference(), -30);
        assert_eq!(wall_right.avoidance(), Drive::LeftForward(Speed::Slow));
    }

    #[test]
    fn boxed_in_backs_off() {
        let r = ObstacleReading {
            left_cm: Some(10),
            right_cm: Some(12),
        };
        assert_eq!(r.avoidance(), Drive::Backward(Speed::Slow));
    }

    #[test]
    fn out_of_range_side_counts_as_far() {
        let r = ObstacleReading {
            left_cm: Some(25),
            right_cm: None,
        };
        assert!(r.difference() > 0);
    }
}
