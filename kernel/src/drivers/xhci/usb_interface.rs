use core::fmt::Debug;

use alloc::{boxed::Box, vec::Vec};
use serde::{ser::SerializeStruct, Serialize};

use crate::{
    drivers::xhci::{
        usb::UsbInterfaceDescriptor, usb_endpoint::USBEndpoint, utils::XHCIError,
        XHCIResponseQueue,
    },
    PhysAddr,
};

pub trait USBInterfaceDriver: Debug {
    fn create() -> Self
    where
        Self: Sized;
    fn on_event(&mut self, endpoints: &mut [USBEndpoint], queue: &XHCIResponseQueue);
    fn start(&mut self, endpoints: &mut [USBEndpoint], queue: &XHCIResponseQueue);
}

#[derive(Debug)]
pub struct USBInterface {
    slot_id: u8,
    interface_descriptor: UsbInterfaceDescriptor,

    endpoints: Vec<USBEndpoint>,
    driver: Option<Box<dyn USBInterfaceDriver>>,
}

impl Serialize for USBInterface {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("USBInterface", 3)?;
        state.serialize_field("slot_id", &self.slot_id)?;
        state.serialize_field("interface_descriptor", &self.interface_descriptor)?;
        state.serialize_field("endpoints", &self.endpoints)?;
        state.end()
    }
}

impl USBInterface {
    pub fn endpoints(&mut self) -> &mut [USBEndpoint] {
        &mut self.endpoints
    }

    /// `endpoints` must already carry the same transfer rings registered into the
    /// device's hardware Endpoint Contexts for this interface.
    pub fn new(descriptor: UsbInterfaceDescriptor, endpoints: Vec<USBEndpoint>, slot_id: u8) -> Self {
        assert_eq!(descriptor.b_num_endpoints as usize, endpoints.len());

        Self {
            slot_id,
            interface_descriptor: descriptor,
            endpoints,
            driver: None,
        }
    }

    pub const fn desc(&self) -> &UsbInterfaceDescriptor {
        &self.interface_descriptor
    }

    pub const fn slot_id(&self) -> u8 {
        self.slot_id
    }

    pub fn start(&mut self, queue: &XHCIResponseQueue) {
        if let Some(driver) = self.driver.as_mut() {
            driver.start(&mut self.endpoints, queue);
        }
    }

    pub fn on_event(
        &mut self,
        queue: &XHCIResponseQueue,
        target_endpoint_num: u8,
        completed_trb_addr: PhysAddr,
    ) -> Result<(), XHCIError> {
        if let Some(endpoint) = self
            .endpoints
            .iter_mut()
            .find(|e| e.desc().endpoint_num() == target_endpoint_num)
        {
            endpoint
                .transfer_ring()
                .advance_dequeue_past(completed_trb_addr)?;
        }

        if let Some(driver) = self.driver.as_mut() {
            driver.on_event(&mut self.endpoints, queue);
        }

        Ok(())
    }

    pub fn attach_driver<T: USBInterfaceDriver + 'static + Sized>(&mut self) {
        self.driver = Some(Box::new(T::create()));
    }
}
