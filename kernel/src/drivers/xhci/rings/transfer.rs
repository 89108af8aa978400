use crate::{
    drivers::xhci::{self, rings::trbs::TRB, utils::XHCIError},
    memory::frame_allocator::{self, FramePtr},
    PhysAddr, VirtAddr,
};

/// A Transfer Ring exists for each active endpoint or Stream declared by a USB
/// device. Transfer Rings contain “Transfer” specific TRBs. Section 4.11.2 for more
/// information on Transfer TRBs.
#[derive(Debug)]
pub struct XHCITransferRing {
    trbs_ptr: FramePtr<[TRB]>,
    trbs_len: usize,
    trbs_phys_base: PhysAddr,

    curr_ring_cycle_bit: u8,

    enqueue_ptr: usize,
    /// Only ever written from the interrupter's event-dispatch path, never from a
    /// caller enqueuing a TD, so there is a single writer for the whole ring's lifetime.
    dequeue_ptr: usize,

    doorbell_id: u8,
}

impl XHCITransferRing {
    pub const fn doorbell_id(&self) -> u8 {
        self.doorbell_id
    }

    pub const fn curr_ring_cycle_bit(&self) -> u8 {
        self.curr_ring_cycle_bit
    }

    pub fn create(max_trb_count: usize, doorbell_id: u8) -> Result<Self, XHCIError> {
        let curr_ring_cycle_bit = 1;

        let (trbs, trbs_phys_addr) =
            xhci::utils::allocate_buffers(max_trb_count).ok_or(XHCIError::OutOfMemory)?;
        trbs[max_trb_count - 1] = TRB::new_link(trbs_phys_addr, curr_ring_cycle_bit);

        let trbs_len = trbs.len();
        let trbs_ptr = unsafe { FramePtr::from_ptr(trbs) };

        Ok(Self {
            trbs_ptr,
            trbs_len,
            trbs_phys_base: trbs_phys_addr,
            enqueue_ptr: 0,
            dequeue_ptr: 0,
            curr_ring_cycle_bit,
            doorbell_id,
        })
    }
    unsafe fn get_trb(&self, index: usize) -> *mut TRB {
        assert!(index < self.trbs_len);
        unsafe { (self.trbs_ptr.as_ptr() as *mut TRB).add(index) }
    }

    unsafe fn write_trb(&mut self, index: usize, trb: TRB) {
        unsafe {
            self.get_trb(index).write_volatile(trb);
        }
    }

    pub fn get_physical_dequeue_pointer_base(&self) -> PhysAddr {
        unsafe { VirtAddr::from_ptr(self.get_trb(self.enqueue_ptr)).into_phys() }
    }

    /// Returns true if enqueuing one more TD would make the enqueue pointer catch up
    /// with the dequeue pointer published by the last processed Transfer Event.
    fn is_full(&self) -> bool {
        let next = (self.enqueue_ptr + 1) % (self.trbs_len - 1);
        next == self.dequeue_ptr
    }

    /// Advances the dequeue pointer to the TRB immediately following `completed_trb_addr`,
    /// wrapping past the Link TRB. Called exclusively from the interrupter's Transfer
    /// Event dispatch when a TRB Pointer is reported as completed.
    pub fn advance_dequeue_past(&mut self, completed_trb_addr: PhysAddr) -> Result<(), XHCIError> {
        if completed_trb_addr.into_bits() < self.trbs_phys_base.into_bits() {
            return Err(XHCIError::LinkInvalid);
        }
        let offset = completed_trb_addr - self.trbs_phys_base;
        let index = offset / size_of::<TRB>();
        if index >= self.trbs_len {
            return Err(XHCIError::LinkInvalid);
        }

        self.dequeue_ptr = (index + 1) % (self.trbs_len - 1);
        Ok(())
    }

    /// Enqueues a TRB into the current transfer ring
    pub fn enqueue(&mut self, mut trb: TRB) -> Result<(), XHCIError> {
        if self.is_full() {
            return Err(XHCIError::RingFull);
        }

        trb.cmd.set_cycle_bit(self.curr_ring_cycle_bit);

        unsafe {
            self.write_trb(self.enqueue_ptr, trb);
        }
        self.enqueue_ptr += 1;

        if self.enqueue_ptr >= self.trbs_len - 1 {
            // Update the link trb to refelect the current cycle
            let link_trb = unsafe { &mut *self.get_trb(self.trbs_len - 1) };
            link_trb.cmd.set_cycle_bit(self.curr_ring_cycle_bit);

            // Start a new cycle
            self.enqueue_ptr = 0;
            self.curr_ring_cycle_bit = (!self.curr_ring_cycle_bit) & 0x1;
        }

        Ok(())
    }

    /// Enqueues a Transfer Descriptor: one or more TRBs, chained by the caller via the
    /// Chain bit on all but the last, that the controller must treat as a single atomic
    /// unit of transfer. A dry run walks the ring's free-space arithmetic for every TRB in
    /// the TD before any of them are written, so a TD can never be torn half-onto the ring
    /// by a `RingFull` partway through — either the whole TD lands or none of it does.
    pub fn enqueue_td(&mut self, trbs: &[TRB]) -> Result<(), XHCIError> {
        assert!(!trbs.is_empty(), "a TD must contain at least one TRB");

        let mut sim_enqueue = self.enqueue_ptr;
        for _ in 0..trbs.len() {
            let next = (sim_enqueue + 1) % (self.trbs_len - 1);
            if next == self.dequeue_ptr {
                return Err(XHCIError::RingFull);
            }
            sim_enqueue = next;
        }

        for &trb in trbs {
            self.enqueue(trb)
                .expect("dry run above guarantees every enqueue in the TD succeeds");
        }

        Ok(())
    }

    /// Tears down the ring's backing memory ahead of the endpoint or device it belongs to
    /// being torn down. Equivalent to dropping the ring, spelled out explicitly so callers
    /// in the device/slot removal path can free it at a precise point rather than relying
    /// on scope exit.
    pub fn fini(self) {
        drop(self);
    }
}

impl Drop for XHCITransferRing {
    fn drop(&mut self) {
        frame_allocator::deallocate_frame(self.trbs_ptr.frame());
    }
}

#[test_case]
fn transfer_ring_rejects_enqueue_once_full() {
    use super::trbs::TRBCommand;

    let mut ring = XHCITransferRing::create(4, 0).unwrap();
    let noop = || TRB::new(TRBCommand::default(), 0, 0);

    ring.enqueue(noop()).unwrap();
    ring.enqueue(noop()).unwrap();
    assert!(matches!(ring.enqueue(noop()), Err(XHCIError::RingFull)));
}

#[test_case]
fn transfer_ring_dequeue_advances_past_completed_trb() {
    use super::trbs::TRBCommand;

    let mut ring = XHCITransferRing::create(4, 0).unwrap();
    let noop = || TRB::new(TRBCommand::default(), 0, 0);
    ring.enqueue(noop()).unwrap();

    let completed_addr = ring.trbs_phys_base;
    ring.advance_dequeue_past(completed_addr).unwrap();
    assert_eq!(ring.dequeue_ptr, 1);

    // Ring now has room again for the slot that was just freed
    ring.enqueue(noop()).unwrap();
    assert!(ring.enqueue(noop()).is_ok());
}

#[test_case]
fn transfer_ring_td_enqueue_is_all_or_nothing() {
    use super::trbs::TRBCommand;

    let mut ring = XHCITransferRing::create(4, 0).unwrap();
    let noop = || TRB::new(TRBCommand::default(), 0, 0);

    // Only 2 usable slots remain (ring size 4, 1 reserved for the Link TRB); a 3-TRB
    // TD must be rejected entirely rather than landing 2 TRBs and dropping the 3rd.
    let td = [noop(), noop(), noop()];
    assert!(matches!(ring.enqueue_td(&td), Err(XHCIError::RingFull)));
    assert_eq!(ring.enqueue_ptr, 0);

    let td = [noop(), noop()];
    ring.enqueue_td(&td).unwrap();
    assert!(matches!(ring.enqueue(noop()), Err(XHCIError::RingFull)));
}
