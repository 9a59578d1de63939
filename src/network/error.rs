//! Common error types for network operations

/// A common error type for network operations.
///
/// Transport failures are collapsed into these variants by the session layer;
/// the concrete error of the underlying [`Connection`](crate::network::Connection)
/// is not carried along so the type stays `Copy` and `no_std` friendly.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An error occurred during a write operation.
    WriteError,
    /// An error occurred during a read operation.
    ReadError,
    /// The peer closed the connection (a read or write returned zero bytes).
    ConnectionClosed,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::WriteError => write!(f, "write to connection failed"),
            Error::ReadError => write!(f, "read from connection failed"),
            Error::ConnectionClosed => write!(f, "connection closed by peer"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
        }
    }
}
