use super::super::utils::{allocate_buffers, XHCIError};
use crate::{debug, drivers::xhci::rings::trbs::TRB, PhysAddr};

#[derive(Debug)]
pub struct XHCICommandRing<'s> {
    enqueue_ptr: usize,
    dequeue_ptr: usize,
    // TODO: free this on drop?
    trbs_phys_addr: PhysAddr,
    trbs: &'s mut [TRB],
    curr_ring_cycle_bit: u8,
}

impl<'s> XHCICommandRing<'s> {
    pub fn create(trb_count: usize) -> Result<Self, XHCIError> {
        let (trbs, trbs_phys_addr) =
            allocate_buffers::<TRB>(trb_count).ok_or(XHCIError::OutOfMemory)?;

        let link_trb = &mut trbs[trb_count - 1];
        *link_trb = TRB::new_link(trbs_phys_addr, 1);

        debug!(
            XHCICommandRing,
            "created with {} TRBS at {:?}", trb_count, trbs_phys_addr
        );
        Ok(Self {
            trbs_phys_addr,
            trbs,
            enqueue_ptr: 0,
            dequeue_ptr: 0,
            curr_ring_cycle_bit: 1,
        })
    }

    /// Returns true if enqueuing one more TRB would make the enqueue pointer catch up
    /// with the dequeue pointer, i.e. the controller hasn't consumed enough of the ring yet.
    fn is_full(&self) -> bool {
        let next = (self.enqueue_ptr + 1) % (self.trbs.len() - 1);
        next == self.dequeue_ptr
    }

    /// Marks `count` TRBs starting at the current dequeue pointer as consumed by the
    /// controller. Called from the command-completion event path only.
    pub fn advance_dequeue(&mut self, count: usize) {
        self.dequeue_ptr = (self.dequeue_ptr + count) % (self.trbs.len() - 1);
    }

    pub fn enqueue(&mut self, mut trb: TRB) -> Result<(), XHCIError> {
        if self.is_full() {
            return Err(XHCIError::RingFull);
        }

        trb.cmd.set_cycle_bit(self.curr_ring_cycle_bit);

        self.trbs[self.enqueue_ptr] = trb;
        self.enqueue_ptr += 1;

        if self.enqueue_ptr >= self.trbs.len() - 1 {
            // Update the link trb to refelect the current cycle
            let link_trb = &mut self.trbs[self.trbs.len() - 1];
            link_trb.cmd.set_cycle_bit(self.curr_ring_cycle_bit);

            // Start a new cycle
            self.enqueue_ptr = 0;
            self.curr_ring_cycle_bit = !self.curr_ring_cycle_bit;
        }

        Ok(())
    }

    pub fn base_phys_addr(&self) -> PhysAddr {
        self.trbs_phys_addr
    }

    pub fn current_ring_cycle(&self) -> u8 {
        self.curr_ring_cycle_bit
    }
}

#[test_case]
fn command_ring_wraps_and_flips_cycle() {
    use super::super::trbs::TRBCommand;

    let mut ring = XHCICommandRing::create(4).unwrap();
    assert_eq!(ring.current_ring_cycle(), 1);

    let noop = || TRB::new(TRBCommand::default(), 0, 0);
    // 4 TRBs means 3 usable slots before the Link TRB forces a wrap. Advance the
    // dequeue pointer as if the controller consumed TRBs, same as
    // transfer_ring_dequeue_advances_past_completed_trb, so the 3rd enqueue doesn't
    // just report RingFull.
    ring.enqueue(noop()).unwrap();
    ring.enqueue(noop()).unwrap();
    ring.advance_dequeue(2);
    ring.enqueue(noop()).unwrap();

    assert_eq!(ring.current_ring_cycle(), 0);
}

#[test_case]
fn command_ring_reports_full_before_catching_dequeue() {
    use super::super::trbs::TRBCommand;

    let mut ring = XHCICommandRing::create(4).unwrap();
    let noop = || TRB::new(TRBCommand::default(), 0, 0);

    ring.enqueue(noop()).unwrap();
    ring.enqueue(noop()).unwrap();
    assert!(matches!(ring.enqueue(noop()), Err(XHCIError::RingFull)));

    ring.advance_dequeue(1);
    assert!(ring.enqueue(noop()).is_ok());
}
