use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Payload too large for a metadata frame: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Descriptor 0x{id:02X} value too long: {len} bytes")]
    DescriptorTooLong { id: u8, len: usize },

    #[error("Dispatch console not connected")]
    NotConnected,
}

pub type Result<T> = std::result::Result<T, DispatchError>;
