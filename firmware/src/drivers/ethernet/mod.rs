//! Drivers for TM4C129's EMAC/PHY media access control peripherals

pub mod descriptor; // RX/TX descriptor rings
pub mod status; // PHY status parser

use core::sync::atomic::{AtomicBool, Ordering};

use tm4c129x_hal::{
    sysctl::{control_power, reset, Domain, PowerControl, PowerState, RunMode},
    tm4c129x::{EMAC0, FLASH_CTRL, SYSCTL},
};
use ufmt::derive::uDebug;

use self::descriptor::{rdes0, Ring, BUFFER_SIZE, DESCRIPTORS};
use self::status::{PhyStatus, EPHYSTS};

/// PHY MII Interrupt Status 1 address
const EPHYMISR1: u8 = 0x12;

/// PHY MII Interrupt Status 2 address
const EPHYMISR2: u8 = 0x13;

/// PHY Basic Mode Control address
const EPHYBMCR: u8 = 0x0;

/// BMCR autonegotiation enable
const BMCR_ANEN: u16 = 0x1000;

/// BMCR restart autonegotiation
const BMCR_RESTART_AN: u16 = 0x200;

/// Trailing frame check sequence the receiver leaves in the buffer
const CRC_LEN: usize = 4;

/// Set once the rings have been handed to a driver
static TAKEN: AtomicBool = AtomicBool::new(false);

/// Get preprogrammed MAC address from ROM
pub fn get_rom_macaddr(flash: &FLASH_CTRL) -> [u8; 6] {
    // Only the least-significant 3 bytes of each register are parts of the address,
    // and they're stored in reverse order
    let addr0: [u8; 4] = flash.userreg0.read().bits().to_be_bytes();
    let addr1: [u8; 4] = flash.userreg1.read().bits().to_be_bytes();
    [addr0[3], addr0[2], addr0[1], addr1[3], addr1[2], addr1[1]]
}

/// Tunables of the MAC and its DMA engine
#[derive(Debug, uDebug)]
pub struct EthernetConfig {
    /// Clock-sync preamble length
    pub preamble_length: PreambleLength,
    /// Inter-frame silence duration in bits
    pub interframe_gap: InterFrameGap,
    /// TX DMA transfer threshold
    pub tx_thresh: TXThresholdDMA,
    /// RX DMA transfer threshold
    pub rx_thresh: RXThresholdDMA,
    /// RX DMA burst size
    pub rx_burst_size: BurstSizeDMA,
    /// TX DMA burst size
    pub tx_burst_size: BurstSizeDMA,
}

impl Default for EthernetConfig {
    fn default() -> Self {
        EthernetConfig {
            preamble_length: PreambleLength::_7,
            interframe_gap: InterFrameGap::_96,
            tx_thresh: TXThresholdDMA::_64,
            rx_thresh: RXThresholdDMA::_64,
            rx_burst_size: BurstSizeDMA::_8,
            tx_burst_size: BurstSizeDMA::_8,
        }
    }
}

/// EMAC0 running as a full-duplex 100-baseT controller on the internal PHY.
///
/// The PHY uses MDIX and autonegotiation, descriptors use the 8-word layout and
/// all MMC interrupts are masked. Frames are sent and received one buffer each.
pub struct EthernetDriver {
    emac: EMAC0,
    ring: Ring,
    macaddr: [u8; 6],
    tx_next: usize,
    rx_next: usize,
}

impl EthernetDriver {
    /// Power, reset and configure the MAC and PHY, then start both DMA engines.
    ///
    /// Fails with [`EthernetError::AlreadyInUse`] on a second call; there is one
    /// set of descriptor rings.
    pub fn new(
        emac: EMAC0,
        flash: &FLASH_CTRL,
        power_control: &PowerControl,
        config: EthernetConfig,
    ) -> Result<Self, EthernetError> {
        if TAKEN.swap(true, Ordering::AcqRel) {
            return Err(EthernetError::AlreadyInUse);
        }

        power_up(power_control);

        // Nothing else holds the rings
        let ring = unsafe { Ring::init() };
        let mut enet = EthernetDriver {
            emac,
            ring,
            macaddr: get_rom_macaddr(flash),
            tx_next: 0,
            rx_next: 0,
        };
        enet.init(&config);
        Ok(enet)
    }

    /// Latching configuration, reset, then the run-time configuration
    fn init(&mut self, config: &EthernetConfig) {
        self.rxstop();
        self.txstop();
        self.emac_reset();

        // Internal PHY with MDIX and autonegotiation, in one write
        self.emac
            .pc
            .write(|w| w.phyext().clear_bit().mdixen().set_bit().anen().set_bit());
        self.emac
            .cfg
            .modify(|_, w| w.fes().set_bit().dupm().set_bit());

        // Reset again to latch
        self.emac_reset();
        self.emac
            .cfg
            .modify(|_, w| w.fes().set_bit().dupm().set_bit());

        self.rxstop();
        self.txstop();

        let rxburst = config.rx_burst_size as u8;
        let txburst = config.tx_burst_size as u8;
        self.emac.dmabusmod.modify(|_, w| unsafe {
            w.atds()
                .set_bit()
                .rpbl()
                .bits(rxburst)
                .pbl()
                .bits(txburst)
                .usp()
                .bit(rxburst != txburst)
        });

        // addr0l must be written last; that write latches the address
        let mac = self.macaddr;
        let hi = u16::from_le_bytes([mac[4], mac[5]]);
        let lo = u32::from_le_bytes([mac[0], mac[1], mac[2], mac[3]]);
        self.emac.addr0h.write(|w| unsafe { w.addrhi().bits(hi) });
        self.emac.addr0l.write(|w| unsafe { w.addrlo().bits(lo) });

        self.emac.mmcrxim.write(|w| unsafe { w.bits(u32::MAX) });
        self.emac.mmctxim.write(|w| unsafe { w.bits(u32::MAX) });

        // 120 MHz system clock
        self.emac.miiaddr.write(|w| w.cr()._100_150());

        self.emac.cfg.modify(|_, w| {
            let w = match config.preamble_length {
                PreambleLength::_3 => w.prelen()._3(),
                PreambleLength::_5 => w.prelen()._5(),
                PreambleLength::_7 => w.prelen()._7(),
            };
            match config.interframe_gap {
                InterFrameGap::_40 => w.ifg()._40(),
                InterFrameGap::_48 => w.ifg()._48(),
                InterFrameGap::_56 => w.ifg()._56(),
                InterFrameGap::_64 => w.ifg()._64(),
                InterFrameGap::_72 => w.ifg()._72(),
                InterFrameGap::_80 => w.ifg()._80(),
                InterFrameGap::_88 => w.ifg()._88(),
                InterFrameGap::_96 => w.ifg()._96(),
            }
        });

        self.emac.dmaopmode.modify(|_, w| {
            let w = match config.tx_thresh {
                TXThresholdDMA::_16 => w.ttc()._16(),
                TXThresholdDMA::_24 => w.ttc()._24(),
                TXThresholdDMA::_32 => w.ttc()._32(),
                TXThresholdDMA::_40 => w.ttc()._40(),
                TXThresholdDMA::_64 => w.ttc()._64(),
                TXThresholdDMA::_128 => w.ttc()._128(),
                TXThresholdDMA::_192 => w.ttc()._192(),
                TXThresholdDMA::_256 => w.ttc()._256(),
            };
            match config.rx_thresh {
                RXThresholdDMA::_32 => w.rtc()._32(),
                RXThresholdDMA::_64 => w.rtc()._64(),
                RXThresholdDMA::_96 => w.rtc()._96(),
                RXThresholdDMA::_128 => w.rtc()._128(),
            }
        });

        let (txdl, rxdl) = (self.ring.tx_list(), self.ring.rx_list());
        self.emac.txdladdr.write(|w| unsafe { w.bits(txdl) });
        self.emac.rxdladdr.write(|w| unsafe { w.bits(rxdl) });

        self.phyclear();
        self.emacclear();

        self.rxstart();
        self.txstart();

        self.phywrite(EPHYBMCR, BMCR_ANEN | BMCR_RESTART_AN);
    }

    /// Hardware address read from the user registers
    pub fn mac_address(&self) -> [u8; 6] {
        self.macaddr
    }

    /// Whether the next transmit descriptor is free
    pub fn tx_available(&self) -> bool {
        self.ring.tx_free(self.tx_next)
    }

    /// Queue one complete frame, without its CRC. Short frames are padded by
    /// the MAC.
    pub fn transmit(&mut self, frame: &[u8]) -> Result<(), EthernetError> {
        if frame.len() > BUFFER_SIZE {
            return Err(EthernetError::BufferOverflow);
        }
        if !self.ring.tx_free(self.tx_next) {
            return Err(EthernetError::DescriptorUnavailable);
        }

        self.ring.tx_load(self.tx_next, frame);
        self.tx_next = (self.tx_next + 1) % DESCRIPTORS;

        // Any write is a transmit demand
        self.emac.txpolld.write(|w| unsafe { w.tpd().bits(0) });
        Ok(())
    }

    /// Copy the next received frame into `buf` and return its length without
    /// the CRC. A frame with errors is dropped and reported once.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<usize, EthernetError> {
        let i = self.rx_next;
        let status = self
            .ring
            .rx_status(i)
            .ok_or(EthernetError::NothingToReceive)?;

        let whole = rdes0::FS | rdes0::LS;
        let result = if status & rdes0::ES != 0 || status & whole != whole {
            Err(EthernetError::FrameError)
        } else {
            let len = ((status >> rdes0::FL_SHIFT) & rdes0::FL_MASK) as usize;
            let len = len.saturating_sub(CRC_LEN);
            if len > buf.len() {
                Err(EthernetError::BufferOverflow)
            } else {
                Ok(self.ring.rx_copy(i, len, buf))
            }
        };

        self.ring.rx_release(i);
        self.rx_next = (i + 1) % DESCRIPTORS;
        // Resume the receive DMA in case it ran out of descriptors
        self.emac.rxpolld.write(|w| unsafe { w.rpd().bits(0) });
        result
    }

    /// Current link state from the PHY
    pub fn link_status(&mut self) -> PhyStatus {
        PhyStatus::new(self.phyread(EPHYSTS))
    }

    /// Stop transmit EMAC then DMA (order is important)
    fn txstop(&mut self) {
        self.emac.cfg.modify(|_, w| w.te().clear_bit());
        self.emac.dmaopmode.modify(|_, w| w.st().clear_bit());
    }

    /// Stop receive EMAC then DMA (order is important)
    fn rxstop(&mut self) {
        self.emac.cfg.modify(|_, w| w.re().clear_bit());
        self.emac.dmaopmode.modify(|_, w| w.sr().clear_bit());
    }

    /// Start transmit DMA then EMAC (order is important)
    fn txstart(&mut self) {
        self.emac.dmaopmode.modify(|_, w| w.st().set_bit());
        self.emac.cfg.modify(|_, w| w.te().set_bit());
    }

    /// Start receive DMA then EMAC (order is important)
    fn rxstart(&mut self) {
        self.emac.dmaopmode.modify(|_, w| w.sr().set_bit());
        self.emac.cfg.modify(|_, w| w.re().set_bit());
    }

    /// Read a register from the _internal_ PHY via MII.
    ///
    /// Blocks while the MII link is busy.
    fn phyread(&mut self, reg_addr: u8) -> u16 {
        while self.emac.miiaddr.read().miib().bit_is_set() {}

        self.emac.miiaddr.modify(|_, w| unsafe {
            w.mii().bits(reg_addr).pla().bits(0).miiw().clear_bit().miib().set_bit()
        });

        while self.emac.miiaddr.read().miib().bit_is_set() {}
        self.emac.miidata.read().data().bits()
    }

    /// Write a register on the _internal_ PHY via MII
    fn phywrite(&mut self, reg_addr: u8, value: u16) {
        while self.emac.miiaddr.read().miib().bit_is_set() {}

        self.emac.miidata.write(|w| unsafe { w.data().bits(value) });
        self.emac.miiaddr.modify(|_, w| unsafe {
            w.mii().bits(reg_addr).pla().bits(0).miiw().set_bit().miib().set_bit()
        });

        while self.emac.miiaddr.read().miib().bit_is_set() {}
    }

    /// Clear PHY interrupts by reading their status
    fn phyclear(&mut self) {
        self.phyread(EPHYMISR1);
        self.phyread(EPHYMISR2);
    }

    /// Clear EMAC interrupts by setting their bits.
    ///
    /// The summary bits are sticky, so all of them go in one write.
    fn emacclear(&mut self) {
        self.emac.dmaris.write(|w| unsafe { w.bits(u32::MAX) });
    }

    /// Soft reset of the EMAC and DMA
    fn emac_reset(&mut self) {
        self.emac.dmabusmod.modify(|_, w| w.swr().set_bit());
        while self.emac.dmabusmod.read().swr().bit_is_set() {}
    }
}

/// Power and reset both the MAC and the PHY, waiting for each to report ready
fn power_up(power_control: &PowerControl) {
    // Read-only access to the peripheral-ready registers
    let sysctl = unsafe { &*SYSCTL::ptr() };

    control_power(power_control, Domain::Emac0, RunMode::Run, PowerState::On);
    reset(power_control, Domain::Emac0);
    while sysctl.premac.read().r0().bit_is_clear() {}

    control_power(power_control, Domain::Ephy0, RunMode::Run, PowerState::On);
    reset(power_control, Domain::Ephy0);
    while sysctl.prephy.read().r0().bit_is_clear() {}
}

/// Choices of preamble length in bytes.
///
/// This is the number of alternating 0-1 bits transmitted at the start of each frame
/// in order to synchronize clocks between the transmitter and receiver.
#[derive(uDebug, Debug, Clone, Copy)]
#[allow(missing_docs)]
pub enum PreambleLength {
    _3,
    _5,
    _7,
}

/// Choices of interframe gap length in bits
#[derive(uDebug, Debug, Clone, Copy)]
#[allow(missing_docs)]
pub enum InterFrameGap {
    _40,
    _48,
    _56,
    _64,
    _72,
    _80,
    _88,
    _96,
}

/// Bytes in the TX FIFO required to start a DMA transfer
#[derive(uDebug, Debug, Clone, Copy)]
#[allow(missing_docs)]
pub enum TXThresholdDMA {
    _16,
    _24,
    _32,
    _40,
    _64,
    _128,
    _192,
    _256,
}

/// Bytes in the RX FIFO required to start a DMA transfer
#[derive(uDebug, Debug, Clone, Copy)]
#[allow(missing_docs)]
pub enum RXThresholdDMA {
    _32,
    _64,
    _96,
    _128,
}

/// DMA burst size in 32-bit words
#[derive(uDebug, Debug, Clone, Copy, Eq, PartialEq)]
#[allow(missing_docs)]
#[repr(u8)]
pub enum BurstSizeDMA {
    _1 = 1,
    _2 = 2,
    _4 = 4,
    _8 = 8,
    _16 = 16,
    _32 = 32,
}

/// Ethernet driver errors
#[derive(Debug, uDebug, Clone, Copy, Eq, PartialEq)]
pub enum EthernetError {
    /// Frame too large for a buffer
    BufferOverflow,
    /// The DMA still owns the next transmit descriptor
    DescriptorUnavailable,
    /// Nothing to receive from RX descriptor buffers
    NothingToReceive,
    /// Received frame had an error or spanned several descriptors
    FrameError,
    /// The driver was already created
    AlreadyInUse,
}
