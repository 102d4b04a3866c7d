//! On-chip temperature sensor conversion

use ufmt::derive::uDebug;

use crate::pingpong::average;

/// Number of codes of the 12-bit converter
pub const ADC_CODES: i32 = 4096;

/// A temperature reading in whole degrees
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub struct Temperature {
    /// Averaged raw code the reading was computed from
    pub raw: u32,
    /// Degrees Celsius
    pub celsius: i32,
    /// Degrees Fahrenheit
    pub fahrenheit: i32,
}

impl Temperature {
    /// Convert an averaged 12-bit code from the internal sensor.
    ///
    /// The sensor transfer function is `147.5 - 247.5 * code / 4096` degrees C
    /// for a 3.3V reference. It is evaluated in tenths of a degree and truncated.
    pub fn from_raw(raw: u32) -> Self {
        let code = raw.min(ADC_CODES as u32 - 1) as i32;
        let celsius = (1475 - (2475 * code) / ADC_CODES) / 10;
        Temperature {
            raw: code as u32,
            celsius,
            fahrenheit: fahrenheit(celsius),
        }
    }

    /// Average a batch of samples, rounding to nearest, then convert.
    ///
    /// Returns `None` for an empty batch.
    pub fn from_samples(samples: &[u32]) -> Option<Self> {
        average(samples).map(Self::from_raw)
    }
}

/// Whole-degree Celsius to Fahrenheit, truncating toward zero
pub fn fahrenheit(celsius: i32) -> i32 {
    (celsius * 9 + 160) / 5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_code_is_sensor_maximum() {
        let t = Temperature::from_raw(0);
        assert_eq!(t.celsius, 147);
        assert_eq!(t.fahrenheit, 296);
    }

    #[test]
    fn room_temperature_code() {
        let t = Temperature::from_raw(1700);
        assert_eq!(t.celsius, 44);
        assert_eq!(t.fahrenheit, 111);
    }

    #[test]
    fn high_codes_go_negative() {
        let t = Temperature::from_raw(4095);
        assert_eq!(t.celsius, -99);
        assert_eq!(t.fahrenheit, -146);
        // Out-of-range codes are clamped to full scale
        assert_eq!(Temperature::from_raw(10_000), t);
    }

    #[test]
    fn four_sample_average_rounds() {
        // (1700 + 1701 + 1702 + 1703 + 2) / 4 = 1702
        let t = Temperature::from_samples(&[1700, 1701, 1702, 1703]).unwrap();
        assert_eq!(t.raw, 1702);
        assert!(Temperature::from_samples(&[]).is_none());
    }

    #[test]
    fn freezing_point() {
        assert_eq!(fahrenheit(0), 32);
        assert_eq!(fahrenheit(100), 212);
    }
}
