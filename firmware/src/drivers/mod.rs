//! Register-level drivers for the on-chip peripherals

pub mod adc;
pub mod ethernet;
pub mod gpio;
pub mod pwm;
pub mod timer;
pub mod udma;
