use core::cell::UnsafeCell;

use super::{
    interrupts::IRQInfo,
    utils::{read_ref, write_ref},
};
use alloc::vec::Vec;
use regs::{CapsReg, PortSpeed, XHCIDoorbellManager};
use rings::{
    trbs::{
        AddressDeviceCommandTRB, ConfigureEndpointCommandTRB, DataStageTRB,
        DisableSlotCommandTRB, EvaluateContextCMDTRB, GetPortBandwidthCommandTRB,
        NoOpCommandTRB, ResetEndpointCommandTRB, SetTRDequeuePointerCommandTRB, SetupStageTRB,
        StatusStageTRB, StopEndpointCommandTRB, CmdResponseTRB, EventResponseTRB,
        TransferResponseTRB, TRBCommand, TRB, TRB_TYPE_ENABLE_SLOT_CMD,
    },
    XHCICommandRing, XHCIEventRing,
};

use crate::{
    arch::{paging::current_higher_root_table, without_interrupts},
    debug, error,
    drivers::{
        driver_poll::{self, PolledDriver},
        interrupts::{self, IntTrigger, InterruptReceiver},
        pci::PCICommandReg,
        xhci::{
            devices::{allocate_device_ctx, XHCIDevice},
            extended_caps::{XHCIExtCapsIter, XHCIUSBSupportedProtocolCap},
            regs::XHCIRegisters,
            rings::trbs::{PacketRecipient, PacketType, XHCIDeviceRequestPacket},
            usb::{
                UsbConfigurationDescriptor, UsbDescriptorHeader, UsbDeviceDescriptor,
                UsbEndpointDescriptor, UsbInterfaceDescriptor, USB_DESCRIPTOR_ENDPOINT_TYPE,
                USB_DESCRIPTOR_INTERFACE_TYPE,
            },
            usb_device::USBDevice,
            usb_endpoint::USBEndpoint,
            usb_interface::USBInterface,
        },
    },
    memory::paging::{EntryFlags, PAGE_SIZE},
    sleep_until, warn,
    utils::locks::{Mutex, RwLock, RwLockReadGuard},
};

use super::pci::PCIDevice;
mod devices;
mod extended_caps;
mod regs;
mod rings;
mod usb;
mod usb_endpoint;
mod usb_hid;
mod usb_interface;
mod utils;

pub mod usb_device;

use usb_hid::HIDClassDriver;

/// The maximum number of TRBs a CommandRing can hold
const MAX_TRB_COUNT: usize = 256;

const USB_CLASS_HID: u8 = 3;
const USB_SUBCLASS_BOOT: u8 = 1;
const USB_PROTOCOL_KEYBOARD: u8 = 1;
const USB_PROTOCOL_MOUSE: u8 = 2;

impl<'s> InterruptReceiver for XHCI<'s> {
    fn handle_interrupt(&self) {
        let regs = unsafe { self.regs.as_mut_unchecked() };
        let events = self.event_ring.lock().dequeue_events();

        for event in events {
            if let Some(response_event) = event.into_event_trb() {
                match response_event {
                    EventResponseTRB::CommandCompletion(res) => {
                        debug!(
                            XHCI,
                            "command completed with code {:?} ({:#x}), slot: {}",
                            res.status.code(),
                            res.status.code() as u8,
                            res.cmd.slot_id(),
                        );
                        self.manager_queue.add_command_response(res)
                    }
                    EventResponseTRB::TransferResponse(res) => {
                        let endpoint_id = res.cmd.endpoint_id();
                        let slot_id = res.cmd.slot_id();

                        if endpoint_id <= 1 {
                            self.manager_queue.add_transfer_response(res);
                        } else {
                            let mut devices = self.connected_devices.write();
                            if let Some(device) =
                                devices.iter_mut().find(|d| d.slot_id() == slot_id)
                            {
                                if let Err(err) = device.on_event(
                                    &self.manager_queue,
                                    endpoint_id,
                                    res.trb_ptr,
                                ) {
                                    error!(
                                        XHCI,
                                        "failed to dispatch transfer event for slot {slot_id} endpoint {endpoint_id}: {err}"
                                    );
                                }
                            } else {
                                warn!(XHCI, "transfer event for unknown slot {slot_id}");
                            }
                        }
                    }
                    EventResponseTRB::PortStatusChange(_event) => {
                        // The event names one port, but a single interrupt can coalesce
                        // changes across several, so every root hub port is rechecked.
                        self.handle_port_status_change();
                    }
                }
            }
        }

        unsafe {
            // We only use interrupter 0 for now
            regs.acknowledge_irq(0);
        }
    }
}

impl<'s> PolledDriver for XHCI<'s> {
    fn poll(&self) {
        let regs = unsafe { self.regs.as_mut_unchecked() };

        let Some(event) = self.manager_queue.try_pop_port_connection_event() else {
            return;
        };

        if event.disconnected {
            if let Some(slot_id) = self.slot_for_port(event.port_index) {
                if let Err(err) = self.remove_device(slot_id) {
                    error!(
                        XHCI,
                        "failed to tear down device at port {}: {err}", event.port_index
                    );
                }
            }
            debug!(XHCI, "port {} disconnected", event.port_index);
            return;
        }

        let op_regs = unsafe { regs.operational_regs() };
        let is_usb3 = self.usb3_ports.contains(&event.port_index);
        let port_sc = read_ref!(unsafe { op_regs.port_registers(event.port_index) }.port_sc);

        // USB3 ports that already trained to U0 on their own never need the explicit
        // reset sequence; USB2 ports (and USB3 ports still negotiating) do.
        let reset_successful = if is_usb3 && port_sc.pls() == 0 {
            true
        } else {
            debug!(XHCI, "port {} resetting...", event.port_index);
            unsafe { op_regs.reset_port(is_usb3, event.port_index) }
        };

        if reset_successful {
            self.enumerate_device(event.port_index);
        }
    }
}

/// A port connection or disconnection event
pub struct XHCIPortConnectionEvent {
    pub port_index: u8,
    pub disconnected: bool,
}

/// A safe communicator with XHCI Interrupts that can safely send requests and receive responses without deadlocking
#[derive(Debug)]
pub struct XHCIResponseQueue<'s> {
    // Only 1 interrupter may hold the lock
    // and Only 1 Reader may hold the lock (requester)
    // the idea is we might have a reader and writer at the same time but not 2
    // the reader has previously requested the writer to write so it is aware of it, and the writer will never remove
    interrupter_lock: Mutex<()>,
    requester_lock: Mutex<()>,
    transfer_requester_lock: Mutex<()>,

    commands: UnsafeCell<Vec<CmdResponseTRB>>,
    transfer_events: UnsafeCell<Vec<TransferResponseTRB>>,
    port_connection_queue: UnsafeCell<Vec<XHCIPortConnectionEvent>>,

    doorbell_manager: Mutex<XHCIDoorbellManager<'s>>,
    commands_ring: Mutex<XHCICommandRing<'s>>,
}

impl<'s> XHCIResponseQueue<'s> {
    pub fn new(
        doorbell_manager: XHCIDoorbellManager<'s>,
        commands_ring: XHCICommandRing<'s>,
    ) -> Self {
        Self {
            interrupter_lock: Mutex::new(()),
            requester_lock: Mutex::new(()),
            transfer_requester_lock: Mutex::new(()),
            commands_ring: Mutex::new(commands_ring),
            doorbell_manager: Mutex::new(doorbell_manager),
            commands: UnsafeCell::new(Vec::new()),
            transfer_events: UnsafeCell::new(Vec::new()),
            port_connection_queue: UnsafeCell::new(Vec::new()),
        }
    }

    pub fn add_command_response(&self, response: CmdResponseTRB) {
        let interrupter = self.interrupter_lock.lock();
        unsafe {
            self.commands.as_mut_unchecked().push(response);
        }
        drop(interrupter);
    }

    pub fn add_transfer_response(&self, response: TransferResponseTRB) {
        let interrupter = self.interrupter_lock.lock();
        unsafe {
            self.transfer_events.as_mut_unchecked().push(response);
        }
        drop(interrupter);
    }

    pub fn add_port_connection_event(&self, port_index: u8, is_disconnected: bool) {
        let interrupter = self.interrupter_lock.lock();
        unsafe {
            self.port_connection_queue
                .as_mut_unchecked()
                .push(XHCIPortConnectionEvent {
                    port_index,
                    disconnected: is_disconnected,
                });
        }
        drop(interrupter);
    }

    pub fn try_pop_port_connection_event(&self) -> Option<XHCIPortConnectionEvent> {
        let lock = self.requester_lock.try_lock();
        let results = unsafe { self.port_connection_queue.as_mut_unchecked().pop() };
        drop(lock);
        results
    }

    fn wait_for_command_response(&self, cmds_len_before: usize) -> Result<CmdResponseTRB, utils::XHCIError> {
        let commands = unsafe { self.commands.as_mut_unchecked() };

        if !sleep_until!(200 ms, commands.len() != cmds_len_before) {
            return Err(utils::XHCIError::NoCommandResponse);
        }

        Ok(commands
            .pop()
            .expect("response just observed to have been pushed"))
    }

    /// Enqueues a TRB command in the XHCI command ring, rings the command doorbell, then
    /// blocks until the matching Command Completion Event arrives.
    pub fn send_command(&self, trb: TRB) -> Result<CmdResponseTRB, utils::XHCIError> {
        let requester = self.requester_lock.lock();
        let cmds_len_before = unsafe { self.commands.as_ref_unchecked().len() };

        self.commands_ring.lock().enqueue(trb)?;
        self.doorbell_manager.lock().ring_command_doorbell();

        let response = self.wait_for_command_response(cmds_len_before);
        drop(requester);
        response
    }

    fn check_cmd(response: CmdResponseTRB) -> Result<CmdResponseTRB, utils::XHCIError> {
        if let Some(err) = utils::XHCIError::from_cmd_completion_code(response.status.code()) {
            Err(err)
        } else {
            Ok(response)
        }
    }

    pub fn enable_slot(&self) -> Result<u8, utils::XHCIError> {
        let trb = TRB::new(TRBCommand::default().with_trb_type(TRB_TYPE_ENABLE_SLOT_CMD), 0, 0);
        let response = Self::check_cmd(self.send_command(trb)?)?;
        Ok(response.cmd.slot_id())
    }

    pub fn disable_slot(&self, slot_id: u8) -> Result<(), utils::XHCIError> {
        Self::check_cmd(self.send_command(DisableSlotCommandTRB::new(slot_id).into_trb())?)?;
        Ok(())
    }

    pub fn address_device(
        &self,
        input_ctx_phys_addr: crate::PhysAddr,
        slot_id: u8,
        bsr: bool,
    ) -> Result<(), utils::XHCIError> {
        let trb = AddressDeviceCommandTRB::new(input_ctx_phys_addr, bsr, slot_id, 0).into_trb();
        Self::check_cmd(self.send_command(trb)?)?;
        Ok(())
    }

    pub fn configure_endpoint(
        &self,
        input_ctx_phys_addr: crate::PhysAddr,
        slot_id: u8,
    ) -> Result<(), utils::XHCIError> {
        let trb = ConfigureEndpointCommandTRB::new(input_ctx_phys_addr, slot_id).into_trb();
        Self::check_cmd(self.send_command(trb)?)?;
        Ok(())
    }

    pub fn deconfigure_endpoint(&self, slot_id: u8) -> Result<(), utils::XHCIError> {
        let trb = ConfigureEndpointCommandTRB::new_deconfigure(slot_id).into_trb();
        Self::check_cmd(self.send_command(trb)?)?;
        Ok(())
    }

    pub fn evaluate_context(
        &self,
        input_ctx_phys_addr: crate::PhysAddr,
        slot_id: u8,
    ) -> Result<(), utils::XHCIError> {
        let trb = EvaluateContextCMDTRB::new(input_ctx_phys_addr, slot_id).into_trb();
        Self::check_cmd(self.send_command(trb)?)?;
        Ok(())
    }

    pub fn reset_endpoint(&self, slot_id: u8, endpoint_id: u8) -> Result<(), utils::XHCIError> {
        let trb = ResetEndpointCommandTRB::new(slot_id, endpoint_id).into_trb();
        Self::check_cmd(self.send_command(trb)?)?;
        Ok(())
    }

    pub fn stop_endpoint(&self, slot_id: u8, endpoint_id: u8) -> Result<(), utils::XHCIError> {
        let trb = StopEndpointCommandTRB::new(slot_id, endpoint_id).into_trb();
        Self::check_cmd(self.send_command(trb)?)?;
        Ok(())
    }

    pub fn set_tr_dequeue_pointer(
        &self,
        slot_id: u8,
        endpoint_id: u8,
        dequeue_ptr: crate::PhysAddr,
        dcs: u8,
    ) -> Result<(), utils::XHCIError> {
        let trb =
            SetTRDequeuePointerCommandTRB::new(slot_id, endpoint_id, dequeue_ptr, dcs).into_trb();
        Self::check_cmd(self.send_command(trb)?)?;
        Ok(())
    }

    pub fn get_port_bandwidth(
        &self,
        port_bandwidth_ctx_phys_addr: crate::PhysAddr,
        dev_speed: u8,
    ) -> Result<(), utils::XHCIError> {
        let trb =
            GetPortBandwidthCommandTRB::new(port_bandwidth_ctx_phys_addr, dev_speed).into_trb();
        Self::check_cmd(self.send_command(trb)?)?;
        Ok(())
    }

    pub fn no_op(&self) -> Result<(), utils::XHCIError> {
        Self::check_cmd(self.send_command(NoOpCommandTRB::new().into_trb())?)?;
        Ok(())
    }

    fn wait_for_transfer_response(
        &self,
        events_len_before: usize,
    ) -> Result<TransferResponseTRB, utils::XHCIError> {
        let events = unsafe { self.transfer_events.as_mut_unchecked() };

        if !sleep_until!(200 ms, events.len() != events_len_before) {
            return Err(utils::XHCIError::NoTransferResponse);
        }

        Ok(events
            .pop()
            .expect("response just observed to have been pushed"))
    }

    fn submit_control_td(
        &self,
        device: &mut XHCIDevice,
        trbs: &[TRB],
    ) -> Result<TransferResponseTRB, utils::XHCIError> {
        let requester = self.transfer_requester_lock.lock();
        let events_len_before = unsafe { self.transfer_events.as_ref_unchecked().len() };

        device.transfer_ring().enqueue_td(trbs)?;
        self.doorbell_manager
            .lock()
            .ring_control_endpoint_doorbell(device.slot_id());

        let response = self.wait_for_transfer_response(events_len_before);
        drop(requester);

        let response = response?;
        device
            .transfer_ring()
            .advance_dequeue_past(response.trb_ptr)?;
        Ok(response)
    }

    /// Runs a USB control transfer over `device`'s control endpoint: a Setup Stage, an
    /// optional Data Stage when `buffer` isn't empty, and a Status Stage in the opposite
    /// direction of the data stage. For an IN transfer, `buffer` is filled with the data
    /// the device returned.
    pub fn send_request_packet(
        &self,
        device: &mut XHCIDevice,
        packet: XHCIDeviceRequestPacket,
        buffer: &mut [u8],
    ) -> Result<(), utils::XHCIError> {
        let has_data = !buffer.is_empty();
        let dir_in = packet.device_to_host();

        let mut setup = SetupStageTRB::new(packet, 0, 0);
        setup.status.set_trb_transfer_length(8);
        setup
            .info
            .set_trt(if !has_data { 0 } else if dir_in { 3 } else { 2 });

        let mut trbs = Vec::with_capacity(3);
        trbs.push(setup.into_trb());

        if has_data {
            let data_phys = crate::VirtAddr::from_ptr(buffer.as_ptr()).into_phys();
            let mut data = DataStageTRB::new(data_phys, 0);
            data.cmd.set_dir_in(dir_in);
            data.parameter.set_trb_transfer_len(buffer.len() as u32);
            trbs.push(data.into_trb());
        }

        let mut status = StatusStageTRB::new(0);
        status.cmd.set_ioc(true);
        status.cmd.set_dir_in(if has_data { !dir_in } else { true });
        trbs.push(status.into_trb());

        let response = self.submit_control_td(device, &trbs)?;
        if let Some(err) = utils::XHCIError::from_transfer_completion_code(response.status.completion_code())
        {
            return Err(err);
        }

        Ok(())
    }

    /// Runs a control transfer with no Data Stage (e.g. SET_CONFIGURATION, SET_ADDRESS).
    pub fn send_no_data_request_packet(
        &self,
        device: &mut XHCIDevice,
        packet: XHCIDeviceRequestPacket,
    ) -> Result<(), utils::XHCIError> {
        self.send_request_packet(device, packet, &mut [])
    }
}

/// Walks a Configuration Descriptor's trailing bytes, grouping interface and endpoint
/// descriptors by the interface they belong to. USB2.0 ch.9.6.3: the descriptors follow
/// each other with no separators, identified only by their own `b_length`/`b_descriptor_type`.
fn parse_configuration_interfaces(
    configuration: &UsbConfigurationDescriptor,
) -> Vec<(UsbInterfaceDescriptor, Vec<UsbEndpointDescriptor>)> {
    let header_len = size_of::<UsbConfigurationDescriptor>() - configuration.extra.len();
    let total_len = configuration.w_total_len as usize;
    let extra_len = total_len
        .saturating_sub(header_len)
        .min(configuration.extra.len());
    let extra = &configuration.extra[..extra_len];

    let mut interfaces: Vec<(UsbInterfaceDescriptor, Vec<UsbEndpointDescriptor>)> = Vec::new();
    let mut offset = 0;

    while offset + size_of::<UsbDescriptorHeader>() <= extra.len() {
        let header: UsbDescriptorHeader =
            unsafe { (extra.as_ptr().add(offset) as *const UsbDescriptorHeader).read_unaligned() };

        if header.b_length == 0 || offset + header.b_length as usize > extra.len() {
            break;
        }

        match header.b_descriptor_type {
            USB_DESCRIPTOR_INTERFACE_TYPE
                if header.b_length as usize >= size_of::<UsbInterfaceDescriptor>() =>
            {
                let interface: UsbInterfaceDescriptor = unsafe {
                    (extra.as_ptr().add(offset) as *const UsbInterfaceDescriptor).read_unaligned()
                };
                interfaces.push((interface, Vec::new()));
            }
            USB_DESCRIPTOR_ENDPOINT_TYPE
                if header.b_length as usize >= size_of::<UsbEndpointDescriptor>() =>
            {
                let endpoint: UsbEndpointDescriptor = unsafe {
                    (extra.as_ptr().add(offset) as *const UsbEndpointDescriptor).read_unaligned()
                };
                if let Some((_, endpoints)) = interfaces.last_mut() {
                    endpoints.push(endpoint);
                }
            }
            _ => {}
        }

        offset += header.b_length as usize;
    }

    interfaces
}

/// Attaches a class driver to `interface` based on its class/subclass/protocol triple, if
/// one is known. Currently only boot-protocol HID devices (keyboards and mice) are handled.
fn attach_class_driver(interface: &mut USBInterface) {
    let desc = interface.desc();
    if desc.b_interface_class != USB_CLASS_HID || desc.b_interface_subclass != USB_SUBCLASS_BOOT {
        return;
    }

    match desc.b_interface_protocol {
        USB_PROTOCOL_KEYBOARD => {
            interface.attach_driver::<HIDClassDriver<crate::drivers::keyboard::usb_kbd::USBKeyboard>>()
        }
        USB_PROTOCOL_MOUSE => {
            interface.attach_driver::<HIDClassDriver<crate::drivers::usb_mouse::USBMouseDriver>>()
        }
        _ => {}
    }
}

// TODO: maybe stack interrupt stuff together in one struct behind a Mutex?
/// The main XHCI driver Instance
#[derive(Debug)]
pub struct XHCI<'s> {
    /// be careful using the registers everything there is unsafe
    regs: UnsafeCell<XHCIRegisters<'s>>,
    /// Only accessed by interrupts
    event_ring: Mutex<XHCIEventRing<'s>>,
    manager_queue: XHCIResponseQueue<'s>,
    /// A list of USB3 ports, all other ports are USB2
    usb3_ports: Vec<u8>,
    connected_devices: RwLock<Vec<USBDevice>>,

    irq_info: IRQInfo,
}

unsafe impl<'s> Send for XHCI<'s> {}
unsafe impl<'s> Sync for XHCI<'s> {}

impl<'s> XHCI<'s> {
    pub fn read_connected_devices(&self) -> RwLockReadGuard<'_, Vec<USBDevice>> {
        self.connected_devices.read()
    }

    fn slot_for_port(&self, port_index: u8) -> Option<u8> {
        self.connected_devices
            .read()
            .iter()
            .find(|d| d.port_index() == port_index)
            .map(|d| d.slot_id())
    }

    /// Checks all root hub ports for devices that are already connected (e.g. plugged in
    /// before the controller was reset) and queues them up for enumeration.
    pub fn scan_ports(&self) {
        let regs = unsafe { self.regs.as_mut_unchecked() };
        let caps = unsafe { regs.captabilities() };
        let op_regs = unsafe { regs.operational_regs() };

        for i in 0..caps.max_ports() {
            let port_regs = unsafe { op_regs.port_registers(i) };
            let port_sc = read_ref!(port_regs.port_sc);

            if port_sc.ccs() {
                self.manager_queue.add_port_connection_event(i, false);
            }
        }
    }

    /// A Port Status Change Event may coalesce changes on more than one port, so every
    /// invocation scans all root hub ports rather than trusting the single port index the
    /// event reports. Every RW1C change bit observed set is acknowledged unconditionally;
    /// only CSC additionally queues a connect/disconnect for the port monitor.
    fn handle_port_status_change(&self) {
        let regs = unsafe { self.regs.as_mut_unchecked() };
        let caps = unsafe { regs.captabilities() };
        let op_regs = unsafe { regs.operational_regs() };

        for port_index in 0..caps.max_ports() {
            let port_regs = unsafe { op_regs.port_registers(port_index) };
            let port_sc = read_ref!(port_regs.port_sc);

            if !(port_sc.csc()
                || port_sc.pec()
                || port_sc.wrc()
                || port_sc.occ()
                || port_sc.prc()
                || port_sc.plc()
                || port_sc.cec())
            {
                continue;
            }

            debug!(
                XHCI,
                "port {port_index} status change: ccs {} csc {} pls {}",
                port_sc.ccs(),
                port_sc.csc(),
                port_sc.pls()
            );

            // Acknowledge every RW1C change bit observed set, regardless of which one
            write_ref!(port_regs.port_sc, port_sc);

            if port_sc.csc() {
                self.manager_queue
                    .add_port_connection_event(port_index, !port_sc.ccs());
            }
        }
    }

    /// Enumerates the device on `port_index`, logging and rolling back the slot on failure.
    pub fn enumerate_device(&self, port_index: u8) {
        if let Err(err) = self.try_enumerate_device(port_index) {
            error!(XHCI, "failed to enumerate device at port {port_index}: {err}");
        }
    }

    fn try_enumerate_device(&self, port_index: u8) -> Result<(), utils::XHCIError> {
        let regs = unsafe { self.regs.as_mut_unchecked() };
        let cap_regs = unsafe { regs.captabilities() };
        let op_regs = unsafe { regs.operational_regs() };
        let port_regs = unsafe { op_regs.port_registers(port_index) };
        let use_64byte_ctx = cap_regs.context_sz_64bytes();
        let port_speed = read_ref!(port_regs.port_sc).port_speed();

        debug!(
            XHCI,
            "enumerating device at port {port_index} with speed {port_speed:?}"
        );

        let slot_id = self.manager_queue.enable_slot()?;
        debug!(XHCI, "slot {slot_id} enabled for port {port_index}");

        let result = self.configure_device(slot_id, port_index, port_speed, use_64byte_ctx);
        if let Err(ref err) = result {
            error!(XHCI, "enumeration of slot {slot_id} failed: {err}, disabling slot");
            let _ = self.manager_queue.disable_slot(slot_id);
        }
        result
    }

    fn configure_device(
        &self,
        slot_id: u8,
        port_index: u8,
        port_speed: PortSpeed,
        use_64byte_ctx: bool,
    ) -> Result<(), utils::XHCIError> {
        let regs = unsafe { self.regs.as_mut_unchecked() };

        let mut device = XHCIDevice::create(use_64byte_ctx, port_index, slot_id, port_speed)?;
        device.configure_ctrl_ep_input_ctx(port_speed.max_control_transfer_initial_packet_size());

        let device_ctx_phys = allocate_device_ctx(use_64byte_ctx)?;
        unsafe {
            regs.set_dcbaa_entry(slot_id, device_ctx_phys)?;
        }

        self.manager_queue
            .address_device(device.input_ctx_base_addr(), slot_id, false)?;

        let mut descriptor: UsbDeviceDescriptor = unsafe { core::mem::zeroed() };
        device.fill_usb_descriptor(
            &self.manager_queue,
            &mut descriptor,
            size_of::<UsbDescriptorHeader>(),
        )?;
        device.fill_usb_descriptor(
            &self.manager_queue,
            &mut descriptor,
            size_of::<UsbDeviceDescriptor>(),
        )?;

        let configuration = device.get_usb_configuration_descriptor(&self.manager_queue)?;
        let interfaces_desc = parse_configuration_interfaces(&configuration);

        let mut interfaces = Vec::with_capacity(interfaces_desc.len());
        for (interface_desc, endpoint_descs) in interfaces_desc {
            let mut endpoints = Vec::with_capacity(endpoint_descs.len());
            for endpoint_desc in endpoint_descs {
                let mut endpoint = USBEndpoint::create(endpoint_desc, slot_id)?;
                unsafe {
                    device.configure_ep_input_ctx(
                        endpoint_desc,
                        endpoint.transfer_ring().get_physical_dequeue_pointer_base(),
                        endpoint.transfer_ring().curr_ring_cycle_bit(),
                    )?;
                }
                endpoints.push(endpoint);
            }
            interfaces.push((interface_desc, endpoints));
        }

        self.manager_queue
            .configure_endpoint(device.input_ctx_base_addr(), slot_id)?;
        device.set_configuration(
            &self.manager_queue,
            configuration.b_configuration_value as u16,
        )?;

        let manufacturer =
            device.get_usb_string_descriptor(&self.manager_queue, descriptor.i_manufacturer)?;
        let product =
            device.get_usb_string_descriptor(&self.manager_queue, descriptor.i_product)?;
        let serial_number =
            device.get_usb_string_descriptor(&self.manager_queue, descriptor.i_serial_number)?;

        let mut usb_interfaces = Vec::with_capacity(interfaces.len());
        for (interface_desc, endpoints) in interfaces {
            let mut interface = USBInterface::new(interface_desc, endpoints, slot_id);
            attach_class_driver(&mut interface);
            interface.start(&self.manager_queue);
            usb_interfaces.push(interface);
        }

        let usb_device = USBDevice::new(
            manufacturer,
            product,
            serial_number,
            descriptor,
            slot_id,
            port_index,
            usb_interfaces,
        );
        self.connected_devices.write().push(usb_device);

        debug!(XHCI, "device enumerated: slot {slot_id} port {port_index}");
        Ok(())
    }

    /// Tears a slot down after its port reports a disconnect: stops every active
    /// endpoint, releases the slot's bandwidth/endpoint resources, disables the slot,
    /// and clears its DCBAA entry. The device's rings and buffers are released when
    /// the removed `USBDevice` is dropped at the end of this function.
    pub fn remove_device(&self, slot_id: u8) -> Result<(), utils::XHCIError> {
        let removed = {
            let mut devices = self.connected_devices.write();
            devices
                .iter()
                .position(|d| d.slot_id() == slot_id)
                .map(|index| devices.swap_remove(index))
        };

        let Some(mut device) = removed else {
            return Ok(());
        };

        for interface in device.interfaces_mut() {
            for endpoint in interface.endpoints() {
                let endpoint_num = endpoint.desc().endpoint_num();
                if let Err(err) = self.manager_queue.stop_endpoint(slot_id, endpoint_num) {
                    warn!(
                        XHCI,
                        "failed to stop endpoint {endpoint_num} on slot {slot_id}: {err}"
                    );
                }
            }
        }

        self.manager_queue.deconfigure_endpoint(slot_id)?;
        self.manager_queue.disable_slot(slot_id)?;

        let regs = unsafe { self.regs.as_mut_unchecked() };
        unsafe {
            regs.set_dcbaa_entry(slot_id, crate::PhysAddr::null())?;
        }

        debug!(XHCI, "removed device at slot {slot_id}");
        Ok(())
    }
}
impl<'s> PCIDevice for XHCI<'s> {
    fn class() -> (u8, u8, u8) {
        (0xc, 0x3, 0x30)
    }

    fn create(mut info: super::pci::PCIDeviceInfo) -> Self {
        // Map and enable the XHCI PCI Device
        let general_header = info.unwrap_general();
        write_ref!(
            general_header.common.command,
            PCICommandReg::BUS_MASTER | PCICommandReg::MEM_SPACE
        );

        let bars = info.get_bars();
        let (base_addr, _) = bars[0];
        let virt_base_addr = base_addr.into_virt();

        unsafe {
            for (bar_base_addr, bar_size) in bars {
                let page_num = bar_size.div_ceil(PAGE_SIZE);
                current_higher_root_table()
                    .map_contiguous_pages(
                        bar_base_addr.into_virt(),
                        bar_base_addr,
                        page_num,
                        EntryFlags::WRITE | EntryFlags::DEVICE_UNCACHEABLE,
                    )
                    .expect("failed to map the XHCI");
            }
        }
        // Create the XHCI Driver
        let caps_ptr = virt_base_addr.into_ptr::<CapsReg>();
        let caps_regs = unsafe { &mut *caps_ptr };

        // Collect USB3-capable ports by walking the xHC's own MMIO Extended
        // Capabilities List for USB Supported Protocol captabilities.
        let mut usb3_ports = Vec::new();
        let mut ext_caps =
            XHCIExtCapsIter::new(caps_ptr as *const (), caps_regs.xecp_dword_offset());
        while let Some(protocol_cap) =
            unsafe { ext_caps.find_next_transmute::<XHCIUSBSupportedProtocolCap>() }
        {
            if protocol_cap.major_version() == 3 {
                for port in
                    protocol_cap.first_compatible_port()..=protocol_cap.last_compatible_port()
                {
                    usb3_ports.push(port);
                }
            }
        }

        let runtime_regs = unsafe { &mut *caps_regs.runtime_regs_ptr() };
        let interrupter = unsafe { &mut *runtime_regs.interrupter_ptr(0) };

        let command_ring =
            XHCICommandRing::create(MAX_TRB_COUNT).expect("failed to allocate the XHCI command ring");
        let mut event_ring = XHCIEventRing::create(MAX_TRB_COUNT, interrupter);

        let mut xhci_registers = unsafe {
            XHCIRegisters::new(caps_regs).expect("failed to initialize the XHCI registers")
        };
        unsafe {
            xhci_registers
                .reconfigure(&mut event_ring, &command_ring)
                .expect("failed to reconfigure the XHCI after reset");
        }

        let doorbell_manager =
            XHCIDoorbellManager::new(caps_regs.doorbells_base(), caps_regs.max_device_slots());

        let xhci_queue_manager = XHCIResponseQueue::new(doorbell_manager, command_ring);
        // FIXME: switch to MSI if not available
        let irq_info = info
            .get_msix_cap()
            .map(|msix| msix.into_irq_info())
            .unwrap();

        let this = XHCI {
            event_ring: Mutex::new(event_ring),
            manager_queue: xhci_queue_manager,
            regs: UnsafeCell::new(xhci_registers),
            usb3_ports,
            connected_devices: RwLock::new(Vec::new()),
            irq_info,
        };
        unsafe {
            debug!(
                XHCI,
                "Created\n{}\n{}\nUSB 3 ports: {:?}",
                this.regs.as_ref_unchecked().captabilities(),
                this.regs.as_mut_unchecked().operational_regs(),
                this.usb3_ports
            );
        }
        this
    }

    fn start(&'static self) -> bool {
        without_interrupts(|| {
            let irq_info = self.irq_info.clone();

            interrupts::register_irq(irq_info, IntTrigger::Edge, self);
            driver_poll::add_to_poll(self);

            let regs = unsafe { self.regs.as_mut_unchecked() };
            let op_regs = unsafe { regs.operational_regs() };
            let usbsts_before = read_ref!(op_regs.usbstatus);
            let usbcmd_before = read_ref!(op_regs.usbcmd);
            unsafe {
                regs.start().expect("failed to start the XHCI controller");
                self.scan_ports();
            }
            let usbsts_after = read_ref!(op_regs.usbstatus);
            let usbcmd_after = read_ref!(op_regs.usbcmd);
            debug!(
                XHCI,
                "Started, usbsts before {:?} => usbsts after {:?}, usbcmd before {:?} => usbcmd after {:?}", usbsts_before, usbsts_after, usbcmd_before, usbcmd_after
            );
        });

        true
    }
}
