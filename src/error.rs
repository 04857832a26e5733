//! # Error Types
//!
//! This module defines the error types used throughout the node core,
//! covering the failure classes the runtime has to live with: transport
//! trouble, broker refusals, and operations attempted while offline.
//!
//! None of these errors escalate. The runtime's contract is to log the
//! failure, skip the affected step for that cycle, and let the periodic
//! schedule retry naturally.

/// The primary error enum for the MQTT session seam.
///
/// It is generic over the transport error type `T`, allowing it to wrap
/// specific errors from whatever stack the session implementation sits on
/// (TLS-over-TCP, plain TCP, a test fake).
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionError<T> {
    /// An error occurred in the underlying transport or protocol layer.
    Transport(T),
    /// The broker refused the connection. The enclosed code provides the reason.
    Refused(ConnectReasonCode),
    /// The operation requires a live connection and there is none.
    NotConnected,
    /// An operation timed out at the session level.
    Timeout,
}

/// Represents the reason codes for a connection refusal.
///
/// These mirror the numeric codes brokers return on a rejected CONNECT,
/// so a connect failure can be logged with a meaningful name instead of
/// a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectReasonCode {
    /// The connection was accepted.
    Success,
    /// The broker does not support the requested protocol version.
    UnacceptableProtocolVersion,
    /// The client identifier is not valid.
    IdentifierRejected,
    /// The broker is unavailable.
    ServerUnavailable,
    /// The username or password is not valid.
    BadUserNameOrPassword,
    /// The client is not authorized to connect.
    NotAuthorized,
    /// An unknown or unspecified error occurred.
    Other(u8),
}

impl From<u8> for ConnectReasonCode {
    fn from(val: u8) -> Self {
        match val {
            0 => Self::Success,
            1 => Self::UnacceptableProtocolVersion,
            2 => Self::IdentifierRejected,
            3 => Self::ServerUnavailable,
            4 => Self::BadUserNameOrPassword,
            5 => Self::NotAuthorized,
            _ => Self::Other(val),
        }
    }
}
