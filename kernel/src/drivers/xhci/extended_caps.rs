use bitfield_struct::bitfield;

use crate::drivers::pci::extended_caps::{ExtendedCaptability, GenericCaptability};

/// Walks the xHC's own Extended Capabilities List, reachable through HCCPARAMS1's xECP
/// field (a dword offset from the capability registers' base). Unlike the PCI config space
/// capability list, each entry's Next Capability Pointer is a dword offset relative to the
/// entry itself, not an absolute offset from a shared base.
pub struct XHCIExtCapsIter {
    current: *const GenericCaptability,
}

impl XHCIExtCapsIter {
    /// `mmio_base` must point at the xHCI capability registers, `xecp_dword_offset` is
    /// `CapsReg::xecp_dword_offset()`.
    pub fn new(mmio_base: *const (), xecp_dword_offset: u32) -> Self {
        let current = if xecp_dword_offset == 0 {
            core::ptr::null()
        } else {
            unsafe {
                mmio_base.byte_add((xecp_dword_offset as usize) * 4) as *const GenericCaptability
            }
        };
        Self { current }
    }

    /// Find a captability with the `T::id()` id and transmute it, correctly performing dword reads
    pub unsafe fn find_next_transmute<T: ExtendedCaptability>(&mut self) -> Option<T> {
        while let Some(cap_ptr) = self.next() {
            let cap = unsafe { *cap_ptr };
            if cap.id() == T::id() {
                return Some(unsafe { T::from_dwords(cap_ptr as *mut u32) });
            }
        }
        None
    }
}

impl Iterator for XHCIExtCapsIter {
    type Item = *const GenericCaptability;
    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_null() {
            return None;
        }

        let next_dword_off = unsafe { (*self.current).next_off() };
        let result = self.current;

        if next_dword_off == 0 {
            self.current = core::ptr::null();
        } else {
            self.current =
                unsafe { (self.current as *const u32).add(next_dword_off as usize) as *const _ };
        }
        Some(result)
    }
}

#[bitfield(u32)]
struct XHCIUSBSupportedCapD3 {
    #[bits(4)]
    slot_type: u8,
    #[bits(28)]
    __: (),
}

#[repr(C)]
pub struct XHCIUSBSupportedProtocolCap {
    // dword 0
    header: GenericCaptability,
    minor_revision_version: u8,
    major_revision_version: u8,
    // dword 1
    name: u32,
    // dword 2
    compatible_port_offset: u8,
    compatible_port_count: u8,
    protocol_defined: u8,
    protocol_speed_id_count: u8,
    dword3: XHCIUSBSupportedCapD3,
}

impl ExtendedCaptability for XHCIUSBSupportedProtocolCap {
    fn id() -> u8 {
        0x2
    }

    fn header(&self) -> &crate::drivers::pci::extended_caps::GenericCaptability {
        &self.header
    }
}

impl XHCIUSBSupportedProtocolCap {
    /// Returns a ZERO-baased port index representing the first port compatible with this captability
    pub const fn first_compatible_port(&self) -> u8 {
        self.compatible_port_offset - 1
    }

    /// Returns a ZERO-baased port index representing the last port compatible with this captability
    pub const fn last_compatible_port(&self) -> u8 {
        self.first_compatible_port() + self.compatible_port_count - 1
    }

    /// Returns the major revision version of this captability, eg. 3 for USB3
    pub const fn major_version(&self) -> u8 {
        self.major_revision_version
    }

    pub const fn minor_version(&self) -> u8 {
        self.minor_revision_version
    }

    /// The number of Protocol Speed ID entries following this header, each one dword wide.
    /// A count of 0 means the protocol only uses the default PSIVs defined by the xHCI spec
    /// (table 7-13), which is the common case and what `PsivTable` assumes.
    pub const fn psi_count(&self) -> u8 {
        self.protocol_speed_id_count
    }
}
