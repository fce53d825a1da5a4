// This file wraps the USB enumeration into the two ways a measurement opens lock-ins, a single
// unit, or a stacked pair of identical units. Callers get sessions back and never touch rusb.
use crate::device::base::LockInDevice;
use crate::device::libusb::device;
use crate::error::ConnectError;
use log::info;

pub use crate::device::libusb::device::LockInUSB;

pub const VID_SR7270: u16 = 0x0a2d;
pub const PID_SR7270: u16 = 0x001b;

pub fn find_devices(vendor_id: u16, product_id: u16) -> Vec<LockInDevice> {
    device::find_devices(vendor_id, product_id)
}

/// Opens the first matching lock-in. The session releases its interface when dropped.
pub fn open(vendor_id: u16, product_id: u16) -> Result<LockInUSB, ConnectError> {
    let device = find_devices(vendor_id, product_id)
        .into_iter()
        .next()
        .ok_or(ConnectError::DeviceNotFound {
            vendor_id,
            product_id,
        })?;

    LockInUSB::from_device(device)
}

/// Opens two identical lock-ins as `(top, bottom)`. The first one enumerated is the bottom unit.
pub fn open_pair(
    vendor_id: u16,
    product_id: u16,
) -> Result<(LockInUSB, LockInUSB), ConnectError> {
    let devices = find_devices(vendor_id, product_id);
    let (bottom, top) = match devices.as_slice() {
        [bottom, top, ..] => (*bottom, *top),
        _ => {
            return Err(ConnectError::NotEnoughDevices {
                expected: 2,
                found: devices.len(),
            })
        }
    };

    // If the top unit fails to open, the bottom session is dropped and released here.
    let bottom = LockInUSB::from_device(bottom)?;
    let top = LockInUSB::from_device(top)?;
    info!(
        "Opened lock-in pair, top at {:?}, bottom at {:?}",
        top.location(),
        bottom.location()
    );

    Ok((top, bottom))
}
