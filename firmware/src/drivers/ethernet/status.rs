//! PHY status register parser
use modular_bitfield::prelude::*;
use ufmt::derive::uDebug;

/// EPHYSTS address on the internal PHY
pub const EPHYSTS: u8 = 0x10;

/// EPHYSTS register layout
#[bitfield(bits = 16)]
#[derive(Clone, Copy, Eq, PartialEq)]
#[allow(missing_docs)]
struct PhyStatusBitfield {
    pub link: bool,
    pub speed_10: bool,
    pub full_duplex: bool,
    pub loopback: bool,
    pub autoneg_done: bool,
    pub mii_interrupt: bool,
    pub remote_fault: bool,
    pub jabber: bool,
    _reserved0: B8,
}

/// Link state reported by the internal PHY
#[derive(Clone, Copy, Debug, uDebug, Eq, PartialEq)]
pub struct PhyStatus {
    /// A valid link is established
    pub link_up: bool,
    /// 10 or 100
    pub speed_mbps: u8,
    /// Full duplex negotiated
    pub full_duplex: bool,
    /// Autonegotiation has finished
    pub autoneg_done: bool,
}

impl PhyStatus {
    /// Parse a raw EPHYSTS value
    pub fn new(reg: u16) -> Self {
        let b = PhyStatusBitfield::from_bytes(reg.to_le_bytes());
        PhyStatus {
            link_up: b.link(),
            speed_mbps: if b.speed_10() { 10 } else { 100 },
            full_duplex: b.full_duplex(),
            autoneg_done: b.autoneg_done(),
        }
    }
}
