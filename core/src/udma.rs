//! uDMA channel control structures
//!
//! Each channel has a primary and an alternate 16-byte control structure in a
//! 1024-byte aligned table: source end pointer, destination end pointer, control
//! word and one unused word. In ping-pong mode the controller alternates between
//! the two structures, stopping each as it completes so software can re-arm it.

use modular_bitfield::{prelude::*, BitfieldSpecifier};
use static_assertions::assert_eq_size;
use ufmt::derive::uDebug;

use crate::adc::Sequencer;
use crate::pingpong::Half;

/// Number of channels in the control table
pub const CHANNELS: u8 = 32;
/// Largest transfer one control structure can describe
pub const MAX_TRANSFER: usize = 1024;

/// uDMA configuration errors
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub enum DmaError {
    /// There is no channel with this number
    InvalidChannel(u8),
    /// Item count outside `1..=1024`
    InvalidCount(usize),
}

/// XFERMODE field
#[derive(BitfieldSpecifier, Clone, Copy, Debug, uDebug, Eq, PartialEq)]
#[bits = 3]
#[allow(missing_docs)]
pub enum TransferMode {
    Stop = 0,
    Basic = 1,
    Auto = 2,
    PingPong = 3,
    MemoryScatterGather = 4,
    AltMemoryScatterGather = 5,
    PeripheralScatterGather = 6,
    AltPeripheralScatterGather = 7,
}

impl TransferMode {
    /// Decode the mode from the low bits of a raw control word
    pub const fn from_bits(bits: u32) -> Self {
        use TransferMode::*;
        match bits & 0b111 {
            0 => Stop,
            1 => Basic,
            2 => Auto,
            3 => PingPong,
            4 => MemoryScatterGather,
            5 => AltMemoryScatterGather,
            6 => PeripheralScatterGather,
            _ => AltPeripheralScatterGather,
        }
    }
}

/// SRCINC and DSTINC fields
#[derive(BitfieldSpecifier, Clone, Copy, Debug, uDebug, Eq, PartialEq)]
#[bits = 2]
#[allow(missing_docs)]
pub enum Increment {
    Byte = 0,
    HalfWord = 1,
    Word = 2,
    /// Address does not change
    Fixed = 3,
}

/// SRCSIZE and DSTSIZE codes
#[derive(Clone, Copy, Debug, uDebug, Eq, PartialEq)]
#[allow(missing_docs)]
pub enum DataSize {
    Byte,
    HalfWord,
    Word,
}

impl DataSize {
    /// Field value
    pub const fn code(self) -> u8 {
        match self {
            DataSize::Byte => 0,
            DataSize::HalfWord => 1,
            DataSize::Word => 2,
        }
    }

    /// Item width in bytes
    pub const fn bytes(self) -> u32 {
        match self {
            DataSize::Byte => 1,
            DataSize::HalfWord => 2,
            DataSize::Word => 4,
        }
    }
}

/// Items moved per bus arbitration
#[derive(Clone, Copy, Debug, uDebug, Eq, PartialEq)]
#[allow(missing_docs)]
pub enum Arbitration {
    _1,
    _2,
    _4,
    _8,
    _16,
    _32,
    _64,
    _128,
    _256,
    _512,
    _1024,
}

impl Arbitration {
    /// ARBSIZE field value, log2 of the item count
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Channel priority level
#[derive(Clone, Copy, Debug, uDebug, Eq, PartialEq)]
pub enum Priority {
    /// Fixed order by channel number
    Default,
    /// Served before every default-priority channel
    High,
}

/// Control word of a channel control structure
#[bitfield(bits = 32)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[allow(missing_docs)]
pub struct ControlWord {
    pub mode: TransferMode,
    pub next_use_burst: bool,
    /// Items to move, minus one
    pub xfer_size: B10,
    pub arb_size: B4,
    pub src_privileged: bool,
    _reserved0: B2,
    pub dst_privileged: bool,
    _reserved1: B2,
    pub src_size: B2,
    pub src_inc: Increment,
    pub dst_size: B2,
    pub dst_inc: Increment,
}

assert_eq_size!(ControlWord, u32);

impl ControlWord {
    /// Register representation
    pub fn bits(&self) -> u32 {
        u32::from_le_bytes(self.into_bytes())
    }

    /// Parse a word read back from the control table
    pub fn from_bits(bits: u32) -> Self {
        ControlWord::from_bytes(bits.to_le_bytes())
    }
}

/// A uDMA channel 0..=31
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub struct DmaChannel(u8);

impl DmaChannel {
    /// Check the channel number
    pub const fn new(n: u8) -> Result<Self, DmaError> {
        if n < CHANNELS {
            Ok(DmaChannel(n))
        } else {
            Err(DmaError::InvalidChannel(n))
        }
    }

    /// Default channel assignment of an ADC0 sample sequencer
    pub const fn for_adc0(sequencer: Sequencer) -> Self {
        DmaChannel(14 + sequencer.index())
    }

    /// Channel number
    pub const fn number(self) -> u8 {
        self.0
    }

    /// Bit of this channel in the set/clear registers
    pub const fn mask(self) -> u32 {
        1 << self.0
    }

    /// Index of the control structure in the table
    pub const fn table_index(self, half: Half) -> usize {
        match half {
            Half::Primary => self.0 as usize,
            Half::Alternate => (CHANNELS + self.0) as usize,
        }
    }
}

/// Contents of one control structure, ready to write to the table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transfer {
    /// Address of the last source item
    pub src_end: u32,
    /// Address of the last destination item
    pub dst_end: u32,
    /// Control word
    pub control: ControlWord,
}

impl Transfer {
    /// Drain `count` words from a fixed peripheral register into consecutive
    /// memory starting at `dst`, two items per arbitration.
    pub fn peripheral_to_memory(
        src: u32,
        dst: u32,
        count: usize,
        mode: TransferMode,
    ) -> Result<Self, DmaError> {
        if count == 0 || count > MAX_TRANSFER {
            return Err(DmaError::InvalidCount(count));
        }
        let size = DataSize::Word;
        let control = ControlWord::new()
            .with_mode(mode)
            .with_xfer_size((count - 1) as u16)
            .with_arb_size(Arbitration::_2.code())
            .with_src_size(size.code())
            .with_src_inc(Increment::Fixed)
            .with_dst_size(size.code())
            .with_dst_inc(Increment::Word);
        Ok(Transfer {
            src_end: src,
            dst_end: dst + (count as u32 - 1) * size.bytes(),
            control,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adc_ping_pong_word() {
        let t = Transfer::peripheral_to_memory(0x4003_8068, 0x2000_0000, 100, TransferMode::PingPong)
            .unwrap();
        // DSTINC 32, DSTSIZE 32, SRCINC none, SRCSIZE 32, ARB 2, 99 items, ping-pong
        let expected: u32 = (2 << 30) | (2 << 28) | (3 << 26) | (2 << 24) | (1 << 14) | (99 << 4) | 3;
        assert_eq!(t.control.bits(), expected);
        assert_eq!(t.src_end, 0x4003_8068);
        assert_eq!(t.dst_end, 0x2000_0000 + 99 * 4);
        assert_eq!(t.control.xfer_size(), 99);
    }

    #[test]
    fn count_limits() {
        let bad = |n| Transfer::peripheral_to_memory(0, 0, n, TransferMode::Basic);
        assert_eq!(bad(0), Err(DmaError::InvalidCount(0)));
        assert_eq!(bad(1025), Err(DmaError::InvalidCount(1025)));
        let max = bad(1024).unwrap();
        assert_eq!(max.control.xfer_size(), 1023);
    }

    #[test]
    fn mode_is_decoded_from_table() {
        let t = Transfer::peripheral_to_memory(0, 0x100, 4, TransferMode::PingPong).unwrap();
        let back = ControlWord::from_bits(t.control.bits());
        assert_eq!(back.mode(), TransferMode::PingPong);
        // The controller rewrites the mode to stop when a structure completes
        assert_eq!(TransferMode::from_bits(t.control.bits() & !0b111), TransferMode::Stop);
    }

    #[test]
    fn adc_channels_and_table_slots() {
        let ss0 = DmaChannel::for_adc0(Sequencer::Ss0);
        let ss3 = DmaChannel::for_adc0(Sequencer::Ss3);
        assert_eq!(ss0.number(), 14);
        assert_eq!(ss3.number(), 17);
        assert_eq!(DmaChannel::for_adc0(Sequencer::Ss1).mask(), 1 << 15);
        assert_eq!(ss0.table_index(Half::Primary), 14);
        assert_eq!(ss0.table_index(Half::Alternate), 46);
        assert_eq!(DmaChannel::new(32), Err(DmaError::InvalidChannel(32)));
    }
}
