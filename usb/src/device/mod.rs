pub mod base;

// The lock-in presents a vendor class interface on every platform, so libusb handles it.
pub(crate) mod libusb;
