//! DMA descriptor rings and their frame buffers
//!
//! Both rings live in one static so the addresses handed to the DMA never move.
//! Descriptors use the 8-word alternate layout (ATDS) and are chained through
//! their fourth word.

/// Descriptors per ring
pub const DESCRIPTORS: usize = 4;

/// Bytes per frame buffer; a full-size frame with VLAN tag and CRC fits
pub const BUFFER_SIZE: usize = 1536;

/// TDES0/RDES0 OWN: the DMA owns the descriptor
pub const OWN: u32 = 1 << 31;

/// TDES0 bits
pub mod tdes0 {
    /// Last segment of the frame
    pub const LS: u32 = 1 << 29;
    /// First segment of the frame
    pub const FS: u32 = 1 << 28;
    /// Second address is the next descriptor
    pub const TCH: u32 = 1 << 20;
}

/// TDES1 transmit buffer 1 size
pub const TDES1_TBS1: u32 = 0x1FFF;

/// RDES0 bits
pub mod rdes0 {
    /// Frame length including CRC, bits 29:16
    pub const FL_SHIFT: u32 = 16;
    /// Frame length mask after shifting
    pub const FL_MASK: u32 = 0x3FFF;
    /// Error summary
    pub const ES: u32 = 1 << 15;
    /// First descriptor of the frame
    pub const FS: u32 = 1 << 9;
    /// Last descriptor of the frame
    pub const LS: u32 = 1 << 8;
}

/// RDES1 bits
pub mod rdes1 {
    /// Second address is the next descriptor
    pub const RCH: u32 = 1 << 14;
    /// Receive buffer 1 size mask
    pub const RBS1: u32 = 0x1FFF;
}

/// One 8-word descriptor
#[repr(C, align(4))]
#[derive(Clone, Copy)]
pub struct Descriptor {
    v: [u32; 8],
}

impl Descriptor {
    const EMPTY: Descriptor = Descriptor { v: [0; 8] };
}

/// Transmit and receive rings with their buffers
#[repr(C, align(4))]
pub struct Rings {
    tx: [Descriptor; DESCRIPTORS],
    rx: [Descriptor; DESCRIPTORS],
    tx_buffers: [[u8; BUFFER_SIZE]; DESCRIPTORS],
    rx_buffers: [[u8; BUFFER_SIZE]; DESCRIPTORS],
}

pub(crate) static mut RINGS: Rings = Rings {
    tx: [Descriptor::EMPTY; DESCRIPTORS],
    rx: [Descriptor::EMPTY; DESCRIPTORS],
    tx_buffers: [[0; BUFFER_SIZE]; DESCRIPTORS],
    rx_buffers: [[0; BUFFER_SIZE]; DESCRIPTORS],
};

/// Volatile access to the rings.
///
/// Only one instance may exist; the ethernet driver creates it once.
pub struct Ring {
    rings: *mut Rings,
}

impl Ring {
    /// Link both rings and hand every receive descriptor to the DMA.
    ///
    /// # Safety
    /// Must be called at most once, before the DMA is pointed at the rings.
    pub(crate) unsafe fn init() -> Ring {
        let rings = core::ptr::addr_of_mut!(RINGS);
        let ring = Ring { rings };
        for i in 0..DESCRIPTORS {
            let next = (i + 1) % DESCRIPTORS;

            let tx = ring.tx(i);
            let mut d = Descriptor::EMPTY;
            d.v[0] = tdes0::TCH;
            d.v[2] = ring.tx_buffer(i) as u32;
            d.v[3] = ring.tx(next) as u32;
            tx.write_volatile(d);

            let rx = ring.rx(i);
            let mut d = Descriptor::EMPTY;
            d.v[0] = OWN;
            d.v[1] = rdes1::RCH | (BUFFER_SIZE as u32 & rdes1::RBS1);
            d.v[2] = ring.rx_buffer(i) as u32;
            d.v[3] = ring.rx(next) as u32;
            rx.write_volatile(d);
        }
        ring
    }

    fn tx(&self, i: usize) -> *mut Descriptor {
        unsafe { core::ptr::addr_of_mut!((*self.rings).tx[i % DESCRIPTORS]) }
    }

    fn rx(&self, i: usize) -> *mut Descriptor {
        unsafe { core::ptr::addr_of_mut!((*self.rings).rx[i % DESCRIPTORS]) }
    }

    fn tx_buffer(&self, i: usize) -> *mut u8 {
        unsafe { core::ptr::addr_of_mut!((*self.rings).tx_buffers[i % DESCRIPTORS]) as *mut u8 }
    }

    fn rx_buffer(&self, i: usize) -> *const u8 {
        unsafe { core::ptr::addr_of!((*self.rings).rx_buffers[i % DESCRIPTORS]) as *const u8 }
    }

    /// Address of the first transmit descriptor
    pub fn tx_list(&self) -> u32 {
        self.tx(0) as u32
    }

    /// Address of the first receive descriptor
    pub fn rx_list(&self) -> u32 {
        self.rx(0) as u32
    }

    /// Whether software owns transmit descriptor `i`
    pub fn tx_free(&self, i: usize) -> bool {
        unsafe { self.tx(i).read_volatile().v[0] & OWN == 0 }
    }

    /// Copy `frame` into transmit buffer `i` and give it to the DMA as a
    /// complete single-buffer frame. The caller checks ownership and length.
    pub fn tx_load(&self, i: usize, frame: &[u8]) {
        unsafe {
            core::ptr::copy_nonoverlapping(frame.as_ptr(), self.tx_buffer(i), frame.len());
            let d = self.tx(i);
            let mut desc = d.read_volatile();
            desc.v[1] = frame.len() as u32 & TDES1_TBS1;
            d.write_volatile(desc);
            // Ownership changes hands last, after the buffer and length are visible
            cortex_m::asm::dmb();
            desc.v[0] = OWN | tdes0::FS | tdes0::LS | tdes0::TCH;
            d.write_volatile(desc);
        }
    }

    /// Status word of receive descriptor `i`, or `None` while the DMA owns it
    pub fn rx_status(&self, i: usize) -> Option<u32> {
        let status = unsafe { self.rx(i).read_volatile().v[0] };
        if status & OWN != 0 {
            None
        } else {
            Some(status)
        }
    }

    /// Copy up to `buf.len()` bytes of receive buffer `i`
    pub fn rx_copy(&self, i: usize, len: usize, buf: &mut [u8]) -> usize {
        let n = len.min(buf.len()).min(BUFFER_SIZE);
        unsafe {
            core::ptr::copy_nonoverlapping(self.rx_buffer(i), buf.as_mut_ptr(), n);
        }
        n
    }

    /// Hand receive descriptor `i` back to the DMA
    pub fn rx_release(&self, i: usize) {
        unsafe {
            let d = self.rx(i);
            let mut desc = d.read_volatile();
            desc.v[0] = OWN;
            cortex_m::asm::dmb();
            d.write_volatile(desc);
        }
    }
}
