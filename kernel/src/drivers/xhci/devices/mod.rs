mod ctx;
mod device;

pub use ctx::{
    allocate_device_ctx, DeviceEndpointState, DeviceEndpointType, XHCIDeviceCtx32,
    XHCIEndpointDeviceCtx32, XHCIInputControlCtx32, XHCIInputCtx32, XHCIInputCtx64,
    XHCISlotDeviceCtx32,
};
pub use device::XHCIDevice;
