use serde::Serialize;

use crate::drivers::xhci::devices::DeviceEndpointType;

pub const USB_DESCRIPTOR_DEVICE_TYPE: u16 = 1;
pub const USB_DESCRIPTOR_CONFIGURATION_TYPE: u16 = 2;
pub const USB_DESCRIPTOR_STRING_TYPE: u16 = 3;
pub const USB_DESCRIPTOR_INTERFACE_TYPE: u8 = 4;
pub const USB_DESCRIPTOR_ENDPOINT_TYPE: u8 = 5;

#[derive(Debug, Clone, Copy, Serialize)]
#[repr(C)]
pub struct UsbDescriptorHeader {
    pub b_length: u8,
    pub b_descriptor_type: u8,
}

#[derive(Debug, Serialize)]
#[repr(C)]
pub struct UsbDeviceDescriptor {
    pub header: UsbDescriptorHeader,
    pub bcd_usb: u16,
    pub b_device_class: u8,
    pub b_device_subclass: u8,
    pub b_device_protocol: u8,
    pub b_max_packet_size_0: u8,
    pub id_vendor: u16,
    pub id_product: u16,
    pub bcd_device: u16,
    pub i_manufacturer: u8,
    pub i_product: u8,
    pub i_serial_number: u8,
    pub num_configurations: u8,
}

const _: () = assert!(size_of::<UsbDeviceDescriptor>() == 18);

/// USB2.0 ch.9.6.3 Configuration Descriptor. `extra` carries the interface and
/// endpoint descriptors that follow the configuration header on the wire; callers
/// walk it using the `b_length`/`b_descriptor_type` of each embedded header.
#[derive(Debug, Clone, Copy, Serialize)]
#[repr(C)]
pub struct UsbConfigurationDescriptor {
    pub header: UsbDescriptorHeader,
    pub w_total_len: u16,
    pub b_num_interfaces: u8,
    pub b_configuration_value: u8,
    pub i_configuration: u8,
    pub bm_attributes: u8,
    pub b_max_power: u8,
    pub extra: [u8; 247],
}

const _: () = assert!(size_of::<UsbConfigurationDescriptor>() == 256);

/// USB2.0 ch.9.6.5 Interface Descriptor
#[derive(Debug, Clone, Copy, Serialize)]
#[repr(C)]
pub struct UsbInterfaceDescriptor {
    pub header: UsbDescriptorHeader,
    pub b_interface_number: u8,
    pub b_alternate_setting: u8,
    pub b_num_endpoints: u8,
    pub b_interface_class: u8,
    pub b_interface_subclass: u8,
    pub b_interface_protocol: u8,
    pub i_interface: u8,
}

const _: () = assert!(size_of::<UsbInterfaceDescriptor>() == 9);

/// USB2.0 ch.9.6.6 Endpoint Descriptor
#[derive(Debug, Clone, Copy, Serialize)]
#[repr(C)]
pub struct UsbEndpointDescriptor {
    pub header: UsbDescriptorHeader,
    pub b_endpoint_address: u8,
    pub bm_attributes: u8,
    pub w_max_packet_size: u16,
    pub b_interval: u8,
}

const _: () = assert!(size_of::<UsbEndpointDescriptor>() == 7);

impl UsbEndpointDescriptor {
    /// The endpoint number, without the direction bit (bits 0-3 of bEndpointAddress)
    pub const fn endpoint_number(&self) -> u8 {
        self.b_endpoint_address & 0xF
    }

    /// True if this is an IN endpoint (bit 7 of bEndpointAddress)
    pub const fn is_in(&self) -> bool {
        self.b_endpoint_address & 0x80 != 0
    }

    /// The Device Context Index this endpoint occupies: (endpoint number * 2) + direction
    pub const fn endpoint_num(&self) -> u8 {
        (self.endpoint_number() * 2) + if self.is_in() { 1 } else { 0 }
    }

    pub const fn max_packet_size(&self) -> u16 {
        self.w_max_packet_size & 0x7FF
    }

    pub fn endpoint_type(&self) -> DeviceEndpointType {
        let xfer_type = self.bm_attributes & 0b11;
        match (xfer_type, self.is_in()) {
            (1, false) => DeviceEndpointType::IsochOut,
            (1, true) => DeviceEndpointType::IsochIn,
            (2, false) => DeviceEndpointType::BulkOut,
            (2, true) => DeviceEndpointType::BulkIn,
            (3, false) => DeviceEndpointType::IntOut,
            (3, true) => DeviceEndpointType::IntIn,
            _ => DeviceEndpointType::ControlBI,
        }
    }
}
