//! Crate for operating the TM4C1294-XL Launchpad and its on-chip peripherals

#![no_std]
#![warn(dead_code)]
#![deny(missing_docs)]

extern crate cortex_m;
extern crate cortex_m_rt;
extern crate embedded_hal;
extern crate tm4c129x_hal;

pub mod board;
pub mod builtins;
pub mod console;
pub mod drivers;
pub mod net;
pub mod startup;
