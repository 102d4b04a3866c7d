//! Hardware-independent logic for the TM4C1294-XL Launchpad examples
//!
//! Everything here is arithmetic, register-word construction or protocol handling
//! that does not touch a peripheral, so it builds for the board and for the host
//! test harness alike. The firmware crate writes the words computed here into the
//! actual registers.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

pub mod adc;
pub mod buttons;
pub mod ir;
pub mod leds;
pub mod m2x;
pub mod motor;
pub mod pingpong;
pub mod pwm;
pub mod rover;
pub mod temperature;
pub mod timing;
pub mod udma;
