use crate::device::base::{ExecutableLockIn, LockInCommands, LockInDevice};
use crate::error::{CommandError, ConnectError};
use log::{debug, info, warn};
use rusb::{Device, DeviceHandle, GlobalContext, TransferType};
use std::time::Duration;

// Responses are short ASCII strings, a single packet always covers them.
const READ_LENGTH: usize = 100;

#[derive(Debug, Clone, Copy)]
struct Endpoint {
    address: u8,
    transfer_type: TransferType,
}

pub struct LockInUSB {
    handle: DeviceHandle<GlobalContext>,
    device: Device<GlobalContext>,

    interface: u8,
    command_endpoint: Endpoint,
    data_endpoint: Endpoint,

    timeout: Duration,
    read_timeout: Duration,
}

impl LockInUSB {
    fn find_device(device: LockInDevice) -> Result<Device<GlobalContext>, ConnectError> {
        let devices = rusb::devices()?;
        for usb_device in devices.iter() {
            if usb_device.bus_number() == device.bus_number
                && usb_device.address() == device.address
            {
                return Ok(usb_device);
            }
        }
        Err(ConnectError::UsbError(rusb::Error::NoDevice))
    }

    pub fn from_device(device: LockInDevice) -> Result<Self, ConnectError> {
        // Firstly, we need to locate the USB device based on the location..
        let usb_device = LockInUSB::find_device(device)?;
        let descriptor = usb_device.device_descriptor()?;
        let mut handle = usb_device.open()?;

        // Not every platform can detach kernel drivers, that's fine as long as the claim works.
        if let Err(error) = handle.set_auto_detach_kernel_driver(true) {
            debug!("Kernel driver auto-detach unavailable: {}", error);
        }

        // Select the default configuration, and bind the first interface within it.
        let config = usb_device.config_descriptor(0)?;
        if handle.active_configuration()? != config.number() {
            handle.set_active_configuration(config.number())?;
        }

        let interface = config.interfaces().next().ok_or(ConnectError::NoInterface)?;
        let setting = interface
            .descriptors()
            .next()
            .ok_or(ConnectError::NoInterface)?;

        let mut endpoints = setting.endpoint_descriptors().map(|endpoint| Endpoint {
            address: endpoint.address(),
            transfer_type: endpoint.transfer_type(),
        });
        let command_endpoint = endpoints.next().ok_or(ConnectError::MissingEndpoints)?;
        let data_endpoint = endpoints.next().ok_or(ConnectError::MissingEndpoints)?;

        let interface_number = interface.number();
        if handle.claim_interface(interface_number).is_err() {
            return Err(ConnectError::DeviceNotClaimed);
        }

        info!(
            "Connected to lock-in {:04x}:{:04x} at {:?}",
            descriptor.vendor_id(),
            descriptor.product_id(),
            usb_device
        );
        debug!(
            "Command endpoint {:#04x} ({:?}), data endpoint {:#04x} ({:?})",
            command_endpoint.address,
            command_endpoint.transfer_type,
            data_endpoint.address,
            data_endpoint.transfer_type
        );
        if data_endpoint.address & 0x80 == 0 {
            warn!("Data endpoint {:#04x} is not an IN endpoint", data_endpoint.address);
        }

        Ok(Self {
            device: handle.device(),
            handle,
            interface: interface_number,
            command_endpoint,
            data_endpoint,
            timeout: Duration::from_secs(1),
            read_timeout: Duration::from_millis(100),
        })
    }

    pub fn location(&self) -> LockInDevice {
        LockInDevice {
            bus_number: self.device.bus_number(),
            address: self.device.address(),
        }
    }
}

fn map_transfer_error(error: rusb::Error) -> CommandError {
    match error {
        rusb::Error::Timeout => CommandError::IoTimeout,
        error => CommandError::UsbError(error),
    }
}

impl ExecutableLockIn for LockInUSB {
    fn send(&mut self, command: &str) -> Result<(), CommandError> {
        let endpoint = self.command_endpoint;
        let data = command.as_bytes();

        let written = match endpoint.transfer_type {
            TransferType::Interrupt => {
                self.handle
                    .write_interrupt(endpoint.address, data, self.timeout)
            }
            _ => self.handle.write_bulk(endpoint.address, data, self.timeout),
        }
        .map_err(map_transfer_error)?;

        if written != data.len() {
            warn!(
                "Short write to lock-in, sent {} of {} bytes",
                written,
                data.len()
            );
        }
        Ok(())
    }

    fn read_raw(&mut self) -> Result<String, CommandError> {
        let endpoint = self.data_endpoint;
        let mut buf = vec![0; READ_LENGTH];

        let length = match endpoint.transfer_type {
            TransferType::Interrupt => {
                self.handle
                    .read_interrupt(endpoint.address, &mut buf, self.read_timeout)
            }
            _ => self
                .handle
                .read_bulk(endpoint.address, &mut buf, self.read_timeout),
        }
        .map_err(map_transfer_error)?;
        buf.truncate(length);

        // Each byte is one character, the trailing status bytes are not necessarily ASCII.
        let response: String = buf.iter().map(|&byte| byte as char).collect();
        debug!("Received {:?}", response);
        Ok(response)
    }
}

impl LockInCommands for LockInUSB {}

impl Drop for LockInUSB {
    fn drop(&mut self) {
        debug!("Releasing interface {} on {:?}", self.interface, self.device);
        if let Err(error) = self.handle.release_interface(self.interface) {
            warn!("Unable to release lock-in interface: {}", error);
        }
    }
}

pub fn find_devices(vendor_id: u16, product_id: u16) -> Vec<LockInDevice> {
    let mut found_devices: Vec<LockInDevice> = Vec::new();

    if let Ok(devices) = rusb::devices() {
        for device in devices.iter() {
            if let Ok(descriptor) = device.device_descriptor() {
                if descriptor.vendor_id() == vendor_id && descriptor.product_id() == product_id {
                    found_devices.push(LockInDevice {
                        bus_number: device.bus_number(),
                        address: device.address(),
                    });
                }
            }
        }
    }

    found_devices
}

