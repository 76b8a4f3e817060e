use thiserror::Error as DeriveError;

#[cfg(feature = "ftdi")]
use libftd2xx::{DeviceTypeError, FtStatus, TimeoutError as FtdiTimeout};

/// Failures that abort a memory card operation.
///
/// Checksum and card status problems are not errors: they are reported as
/// [`Diagnostic`](crate::spi::protocol::response::Diagnostic)s inside a
/// [`ReadResult`](crate::spi::protocol::response::ReadResult).
#[derive(DeriveError, Debug)]
pub enum Error {
    #[error("Invalid frame address {address:#X} (limit {limit:#X})")]
    InvalidAddress { address: u32, limit: u32 },

    #[error("Invalid card slot {0} (must be 1 or 2)")]
    InvalidSlot(u8),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Malformed response: expected {expected} bytes, got {actual}")]
    MalformedResponse { expected: usize, actual: usize },

    #[error("Reader not initialized")]
    NotInitialized,
}

/// Underlying bus or device failure, kept as the original cause.
#[derive(DeriveError, Debug)]
pub enum TransportError {
    #[error("SPI bus error: {0:?}")]
    Spi(embedded_hal::spi::ErrorKind),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "ftdi")]
    #[error("FTDI Timeout")]
    DeviceTimeout(#[from] FtdiTimeout),

    #[cfg(feature = "ftdi")]
    #[error("FTDI Status: {0}")]
    FtStatus(#[from] FtStatus),

    #[cfg(feature = "ftdi")]
    #[error("FTDI Device Type Error: {0}")]
    DeviceTypeError(#[from] DeviceTypeError),
}

impl From<embedded_hal::spi::ErrorKind> for TransportError {
    fn from(kind: embedded_hal::spi::ErrorKind) -> Self {
        Self::Spi(kind)
    }
}
