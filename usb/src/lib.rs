pub use rusb;
pub mod commands;
pub mod devices;
pub mod error;
pub mod status;

pub mod device;

pub use device::base::{ExecutableLockIn, LockInCommands, LockInDevice};
pub use devices::{open, open_pair, LockInUSB, PID_SR7270, VID_SR7270};
