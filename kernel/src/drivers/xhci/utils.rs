use thiserror::Error;

use crate::{
    drivers::xhci::rings::trbs::CompletionStatusCode,
    memory::{
        frame_allocator::{self, Frame},
        paging::{MapToError, PAGE_SIZE},
    },
    PhysAddr,
};

// FIXME: make a DMA allocator that doesn't waste memory like this
/// uses the given frame as a place to store an allocated list of T with length `len`
/// length must be less then 4096 / size_of::<T>()
/// allocated area is zero initialized
pub fn allocate_buffers_frame<'a, T: Clone>(
    frame: Frame,
    offset: usize,
    len: usize,
) -> (&'a mut [T], PhysAddr) {
    assert!(len / size_of::<T>() <= PAGE_SIZE - offset);
    let virt_addr = frame.virt_addr() + offset;
    let phys_addr = frame.phys_addr() + offset;
    let slice_ptr = virt_addr.into_ptr::<T>();
    let slice = unsafe { core::slice::from_raw_parts_mut(slice_ptr, len) };
    slice.fill(unsafe { core::mem::zeroed() });
    (slice, phys_addr)
}

// FIXME: make a DMA allocator that doesn't waste memory like this
/// allocates a frame then calls [`allocate_buffers_frame`] on it
/// returns None if frame allocation failed
pub fn allocate_buffers<'a, T: Clone>(len: usize) -> Option<(&'a mut [T], PhysAddr)> {
    frame_allocator::allocate_frame().map(|frame| allocate_buffers_frame(frame, 0, len))
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum XHCIError {
    /// A Transfer Event TRB completed with a non-Success completion code
    #[error("Transfer Response Not Successful, code: {0:?}")]
    TransferNotSuccessful(CompletionStatusCode),
    /// A Command Completion Event TRB completed with a non-Success completion code
    #[error("Command Response Not Successful, code: {0:?}")]
    CommandNotSuccessful(CompletionStatusCode),
    /// Timed out waiting for a Command Completion Event
    #[error("Timeout Waiting For Command Response")]
    NoCommandResponse,
    /// Timed out waiting for a Transfer Event
    #[error("Timeout Waiting For Transfer Event Response")]
    NoTransferResponse,
    /// A page or DMA buffer could not be allocated
    #[error("System Out Of Memory")]
    OutOfMemory,
    /// A ring has no free TRB slots for the requested enqueue and must be retried
    /// once the controller consumes more entries
    #[error("Ring Has No Free TRB Slots, Retry Later")]
    RingFull,
    /// The requested slot, port or endpoint is not in a state that allows the operation
    #[error("Resource Busy")]
    Busy,
    /// The host controller itself reported an error (HCE, or an unexpected register value)
    #[error("Host Controller Error")]
    HcError,
    /// A Link TRB or ring segment pointer is malformed
    #[error("Invalid Link TRB Or Segment Pointer")]
    LinkInvalid,
    /// The requested feature (e.g. Isochronous endpoints, endpoint data toggle) is not
    /// implemented by this driver
    #[error("Operation Not Supported")]
    NotSupported,
    /// A register bit that was expected to change state never did within the allotted time
    #[error("Timed Out Waiting For Host Controller")]
    Timeout,
    /// The referenced slot, endpoint or port does not exist or was already torn down
    #[error("Slot, Endpoint Or Port Not Present")]
    NotPresent,
    #[error("Unknown Error")]
    Other,
}

impl From<MapToError> for XHCIError {
    fn from(value: MapToError) -> Self {
        match value {
            MapToError::FrameAllocationFailed => Self::OutOfMemory,
        }
    }
}

impl XHCIError {
    /// Maps a completion code from a Command Completion Event into the matching error,
    /// or `None` if the command actually succeeded.
    pub const fn from_cmd_completion_code(code: CompletionStatusCode) -> Option<Self> {
        match code {
            CompletionStatusCode::Success => None,
            CompletionStatusCode::CommandRingStopped | CompletionStatusCode::CommandAborted => {
                Some(Self::Busy)
            }
            CompletionStatusCode::SlotNotEnabled | CompletionStatusCode::ParameterErr => {
                Some(Self::NotPresent)
            }
            code => Some(Self::CommandNotSuccessful(code)),
        }
    }

    /// Maps a completion code from a Transfer Event into the matching error,
    /// or `None` if the transfer actually succeeded (or completed with a Short Packet,
    /// which is not an error condition).
    pub const fn from_transfer_completion_code(code: CompletionStatusCode) -> Option<Self> {
        match code {
            CompletionStatusCode::Success | CompletionStatusCode::ShortPacket => None,
            CompletionStatusCode::StallErr => Some(Self::HcError),
            code => Some(Self::TransferNotSuccessful(code)),
        }
    }
}
