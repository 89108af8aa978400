use core::fmt::Debug;

use alloc::boxed::Box;

use crate::{
    debug,
    drivers::xhci::{
        rings::trbs::NormalTRB, usb_endpoint::USBEndpoint, usb_interface::USBInterfaceDriver,
        XHCIResponseQueue,
    },
};

pub trait USBHIDDriver: Debug {
    fn create() -> Self
    where
        Self: Sized;
    fn on_event(&mut self, data: &[u8]);
}

fn request_hid_report(endpoint: &mut USBEndpoint, queue: &XHCIResponseQueue) {
    let data_base = endpoint.data_buffer_base();
    let max_packet_size = endpoint.desc().max_packet_size();
    let endpoint_num = endpoint.desc().endpoint_num();

    let transfer_ring = endpoint.transfer_ring();

    let mut normal_trb = NormalTRB::new(data_base, max_packet_size as u32, 0);
    normal_trb.cmd.set_ioc(true);

    if let Err(err) = transfer_ring.enqueue(normal_trb.into_trb()) {
        debug!(USBHIDDevice, "failed to queue HID report request: {err}");
        return;
    }

    queue
        .doorbell_manager
        .lock()
        .ring_endpoint_doorbell(transfer_ring.doorbell_id(), endpoint_num);
}

/// Bridges a boot-protocol HID report driver `T` (keyboard, mouse, ...) into a
/// `USBInterfaceDriver`, re-arming the interrupt IN endpoint after every report.
/// Picks the first IN endpoint of the interface as the report pipe, which holds for
/// every boot-protocol HID device: a single interrupt IN endpoint carrying reports.
#[derive(Debug)]
pub struct HIDClassDriver<T: USBHIDDriver> {
    inner: Box<T>,
}

impl<T: USBHIDDriver + 'static> USBInterfaceDriver for HIDClassDriver<T> {
    fn create() -> Self
    where
        Self: Sized,
    {
        Self {
            inner: Box::new(T::create()),
        }
    }

    fn start(&mut self, endpoints: &mut [USBEndpoint], queue: &XHCIResponseQueue) {
        if let Some(endpoint) = endpoints.iter_mut().find(|e| e.desc().is_in()) {
            request_hid_report(endpoint, queue);
        }
    }

    fn on_event(&mut self, endpoints: &mut [USBEndpoint], queue: &XHCIResponseQueue) {
        if let Some(endpoint) = endpoints.iter_mut().find(|e| e.desc().is_in()) {
            self.inner.on_event(endpoint.data_buffer());
            request_hid_report(endpoint, queue);
        }
    }
}
