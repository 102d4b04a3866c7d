//! Micro direct memory access controller

use core::ptr::{addr_of, addr_of_mut};

use static_assertions::const_assert_eq;
use tm4c129x_hal::sysctl::{control_power, Domain, PowerControl, PowerState, RunMode};
use tm4c129x_hal::tm4c129x::UDMA;
use tm4c1294_launchpad_core::pingpong::Half;
use tm4c1294_launchpad_core::udma::{
    ControlWord, DmaChannel, Priority, Transfer, TransferMode, CHANNELS,
};

/// DMACFG.MASTEN
const CFG_MASTEN: u32 = 1;

/// One channel control structure as the controller reads it
#[repr(C)]
#[derive(Clone, Copy)]
struct ChannelControl {
    src_end: u32,
    dst_end: u32,
    control: u32,
    _spare: u32,
}

/// Primary structures for every channel followed by the alternates
#[repr(C, align(1024))]
struct ControlTable([ChannelControl; 2 * CHANNELS as usize]);

const_assert_eq!(core::mem::size_of::<ControlTable>(), 1024);

static mut CONTROL_TABLE: ControlTable = ControlTable(
    [ChannelControl {
        src_end: 0,
        dst_end: 0,
        control: 0,
        _spare: 0,
    }; 2 * CHANNELS as usize],
);

/// The uDMA controller and its control table
pub struct Udma {
    registers: UDMA,
}

impl Udma {
    /// Power the controller, enable it and point it at the control table
    pub fn new(registers: UDMA, power_control: &PowerControl) -> Self {
        control_power(power_control, Domain::MicroDma, RunMode::Run, PowerState::On);
        registers.cfg.write(|w| unsafe { w.bits(CFG_MASTEN) });
        let base = unsafe { addr_of!(CONTROL_TABLE) } as u32;
        registers.ctlbase.write(|w| unsafe { w.bits(base) });
        Udma { registers }
    }

    /// Reset a channel's attributes: primary structure first, the given
    /// priority, requests unmasked, burst requests only. Also selects the
    /// channel's default peripheral assignment.
    pub fn configure_channel(&self, ch: DmaChannel, priority: Priority) {
        let udma = &self.registers;
        let mask = ch.mask();
        udma.altclr.write(|w| unsafe { w.bits(mask) });
        match priority {
            Priority::Default => udma.prioclr.write(|w| unsafe { w.bits(mask) }),
            Priority::High => udma.prioset.write(|w| unsafe { w.bits(mask) }),
        }
        udma.reqmaskclr.write(|w| unsafe { w.bits(mask) });
        udma.useburstset.write(|w| unsafe { w.bits(mask) });

        // Encoding 0 of the channel map is the peripheral in the datasheet's
        // first column, which is where the ADC0 sequencers sit
        let shift = 4 * (ch.number() as u32 % 8);
        let clear = |bits: u32| bits & !(0xF << shift);
        match ch.number() / 8 {
            0 => udma.chmap0.modify(|r, w| unsafe { w.bits(clear(r.bits())) }),
            1 => udma.chmap1.modify(|r, w| unsafe { w.bits(clear(r.bits())) }),
            2 => udma.chmap2.modify(|r, w| unsafe { w.bits(clear(r.bits())) }),
            _ => udma.chmap3.modify(|r, w| unsafe { w.bits(clear(r.bits())) }),
        }
    }

    /// Write one control structure
    pub fn set_transfer(&self, ch: DmaChannel, half: Half, transfer: &Transfer) {
        let entry = ChannelControl {
            src_end: transfer.src_end,
            dst_end: transfer.dst_end,
            control: transfer.control.bits(),
            _spare: 0,
        };
        unsafe {
            let table = addr_of_mut!(CONTROL_TABLE.0) as *mut ChannelControl;
            table.add(ch.table_index(half)).write_volatile(entry);
        }
    }

    /// Mode field of a control structure as the controller left it. A
    /// finished structure reads back as [`TransferMode::Stop`].
    pub fn mode(&self, ch: DmaChannel, half: Half) -> TransferMode {
        let control = unsafe {
            let table = addr_of!(CONTROL_TABLE.0) as *const ChannelControl;
            table.add(ch.table_index(half)).read_volatile().control
        };
        ControlWord::from_bits(control).mode()
    }

    /// Let the channel run
    pub fn enable(&self, ch: DmaChannel) {
        self.registers.enaset.write(|w| unsafe { w.bits(ch.mask()) });
    }

    /// Whether the channel is still enabled. The controller disables a
    /// channel when it reaches a stopped structure.
    pub fn is_enabled(&self, ch: DmaChannel) -> bool {
        self.registers.enaset.read().bits() & ch.mask() != 0
    }
}
