use sr7270_types::StatusCondition;

#[derive(thiserror::Error, Debug)]
pub enum ConnectError {
    #[error("No lock-in was found with vendor {vendor_id:#06x} and product {product_id:#06x}")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("Expected {expected} lock-in amplifiers, but only {found} were found")]
    NotEnoughDevices { expected: usize, found: usize },

    #[error("USB error: {0}")]
    UsbError(#[from] rusb::Error),

    #[error("Lock-in does not expose an interface")]
    NoInterface,

    #[error("Lock-in interface is missing its command or data endpoint")]
    MissingEndpoints,

    #[error("Unable to Claim Interface")]
    DeviceNotClaimed,
}

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("USB error: {0}")]
    UsbError(#[from] rusb::Error),

    #[error("Timed out waiting for a response from the lock-in")]
    IoTimeout,

    #[error("{}", .0.message().unwrap_or("Lock in reported a fatal status"))]
    Protocol(StatusCondition),

    #[error("Malformed response from lock-in: {0:?}")]
    MalformedResponse(String),

    #[error("Unable to parse lock-in payload {0:?}")]
    InvalidPayload(String),

    #[error("Lock-in returned no value for '{0}'")]
    MissingValue(String),

    #[error("Overload persisted after {steps} sensitivity adjustments")]
    AdaptationExhausted { steps: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
