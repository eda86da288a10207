//! Error types for the kernel I/O primitives

use std::io;
use thiserror::Error;

use crate::network::SocketState;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    #[error("Socket error: {0}")]
    Socket(#[from] SocketError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Converter error: {0}")]
    Converter(#[from] ConverterError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Address parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid IPv4 address: {0:?}")]
    InvalidIp(String),

    #[error("Invalid port: {0:?}")]
    InvalidPort(String),

    #[error("Address family not supported by protocol")]
    UnsupportedFamily,
}

/// Socket errors
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("Address family not supported by protocol")]
    UnsupportedFamily,

    #[error("Failed to open socket: {0}")]
    OpenFailed(#[source] io::Error),

    #[error("Socket bind failed: {0}")]
    BindFailed(#[source] io::Error),

    #[error("Socket listen failed: {0}")]
    ListenFailed(#[source] io::Error),

    #[error("Socket accept failed: {0}")]
    AcceptFailed(#[source] io::Error),

    #[error("Socket connect failed: {0}")]
    ConnectFailed(#[source] io::Error),

    #[error("Socket send failed: {0}")]
    SendFailed(#[source] io::Error),

    #[error("Socket receive failed: {0}")]
    ReceiveFailed(#[source] io::Error),

    #[error("Socket close failed: {0}")]
    CloseFailed(#[source] io::Error),

    #[error("Cannot {operation} a socket in state {state:?}")]
    NotInState {
        operation: &'static str,
        state: SocketState,
    },
}

/// Queue and event errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Invalid queue capacity: {0}")]
    InvalidCapacity(usize),

    #[error("Failed to write to queue")]
    WriteFailed,

    #[error("Failed to read from queue")]
    ReadFailed,

    #[error("Event mask must be {expected} bytes, got {actual}")]
    ProtocolError { expected: usize, actual: usize },

    #[error("Object is closed")]
    Closed,
}

/// Converter (DAC) errors
#[derive(Error, Debug)]
pub enum ConverterError {
    #[error("Output line {0} is already owned by another converter")]
    LineInUse(u32),

    #[error("Too many output lines: {0} (at most 2)")]
    TooManyLines(usize),

    #[error("At least one output line is required")]
    NoLines,

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("dac_init() failed: {0}")]
    InitFailed(String),

    #[error("dac_convert() failed: {0}")]
    ConversionFailed(String),

    #[error("dac_async_wait() failed: {0}")]
    WaitFailed(String),
}

/// Flat classification of every failure, for callers that translate
/// errors into another representation without matching nested enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidAddress,
    UnsupportedFamily,
    OpenFailed,
    BindFailed,
    ListenFailed,
    AcceptFailed,
    ConnectFailed,
    SendFailed,
    ReceiveFailed,
    CloseFailed,
    NotInState,
    InvalidCapacity,
    WriteFailed,
    ReadFailed,
    ProtocolError,
    Closed,
    LineInUse,
    InvalidConverterConfig,
    ConversionFailed,
    WaitFailed,
    InvalidConfig,
    Io,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Address(AddressError::UnsupportedFamily) => ErrorKind::UnsupportedFamily,
            Error::Address(_) => ErrorKind::InvalidAddress,
            Error::Socket(e) => e.kind(),
            Error::Sync(e) => e.kind(),
            Error::Converter(e) => e.kind(),
            Error::Config(_) => ErrorKind::InvalidConfig,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}

impl SocketError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SocketError::UnsupportedFamily => ErrorKind::UnsupportedFamily,
            SocketError::OpenFailed(_) => ErrorKind::OpenFailed,
            SocketError::BindFailed(_) => ErrorKind::BindFailed,
            SocketError::ListenFailed(_) => ErrorKind::ListenFailed,
            SocketError::AcceptFailed(_) => ErrorKind::AcceptFailed,
            SocketError::ConnectFailed(_) => ErrorKind::ConnectFailed,
            SocketError::SendFailed(_) => ErrorKind::SendFailed,
            SocketError::ReceiveFailed(_) => ErrorKind::ReceiveFailed,
            SocketError::CloseFailed(_) => ErrorKind::CloseFailed,
            SocketError::NotInState { .. } => ErrorKind::NotInState,
        }
    }
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::InvalidCapacity(_) => ErrorKind::InvalidCapacity,
            SyncError::WriteFailed => ErrorKind::WriteFailed,
            SyncError::ReadFailed => ErrorKind::ReadFailed,
            SyncError::ProtocolError { .. } => ErrorKind::ProtocolError,
            SyncError::Closed => ErrorKind::Closed,
        }
    }
}

impl ConverterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConverterError::LineInUse(_) => ErrorKind::LineInUse,
            ConverterError::TooManyLines(_)
            | ConverterError::NoLines
            | ConverterError::InvalidSampleRate(_) => ErrorKind::InvalidConverterConfig,
            ConverterError::InitFailed(_) => ErrorKind::OpenFailed,
            ConverterError::ConversionFailed(_) => ErrorKind::ConversionFailed,
            ConverterError::WaitFailed(_) => ErrorKind::WaitFailed,
        }
    }
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_is_distinct_per_failure() {
        let err: Error = SocketError::BindFailed(io::ErrorKind::AddrInUse.into()).into();
        assert_eq!(err.kind(), ErrorKind::BindFailed);

        let err: Error = SyncError::ProtocolError { expected: 4, actual: 2 }.into();
        assert_eq!(err.kind(), ErrorKind::ProtocolError);

        let err: Error = AddressError::InvalidIp("1.2.3".into()).into();
        assert_eq!(err.kind(), ErrorKind::InvalidAddress);

        let err: Error = AddressError::UnsupportedFamily.into();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFamily);
    }

    #[test]
    fn test_not_in_state_message() {
        let err = SocketError::NotInState {
            operation: "listen",
            state: SocketState::Open,
        };
        assert_eq!(err.to_string(), "Cannot listen a socket in state Open");
    }
}
