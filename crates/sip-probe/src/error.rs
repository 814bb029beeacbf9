//! Error types for the SIP probe
//!
//! Errors fall in two groups: configuration problems, which are detected
//! before any network activity, and transport problems, which end a probe
//! attempt. A non-200 response is not an error; see
//! [`ProbeResult::Rejected`](crate::orchestrator::ProbeResult::Rejected).

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for probe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the SIP probe
#[derive(Error, Debug)]
pub enum Error {
    /// No target address was supplied
    #[error("No address given")]
    MissingAddress,

    /// The target address is not a valid URL
    #[error("Invalid address {0}: {1}")]
    InvalidUrl(String, #[source] url::ParseError),

    /// The URL scheme is not one of udp, tcp, tls, ws or wss
    #[error("Unknown scheme: {0}")]
    UnsupportedScheme(String),

    /// The URL has no host component
    #[error("Address has no host: {0}")]
    MissingHost(String),

    /// A socket transport was requested without an explicit port
    #[error("Address has no port: {0}")]
    MissingPort(String),

    /// The host cannot be used as a TLS server name
    #[error("Invalid TLS server name: {0}")]
    InvalidServerName(String),

    /// Connecting or resolving the remote endpoint failed
    #[error("Failed to connect to {0}: {1}")]
    Dial(String, #[source] io::Error),

    /// The TCP connect did not complete within the dial timeout
    #[error("Timed out connecting to {0} after {1:?}")]
    ConnectTimeout(String, Duration),

    /// The TLS handshake or certificate validation failed
    #[error("TLS handshake with {0} failed: {1}")]
    TlsHandshake(String, #[source] io::Error),

    /// WebSocket handshake, send or receive failed
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Socket read or write failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer closed the connection before a complete response arrived
    #[error("Connection closed before a complete response was received")]
    ConnectionClosed,

    /// The transport task ended without delivering an outcome
    #[error("Probe task ended without reporting an outcome")]
    ProbeAborted,
}

impl Error {
    /// Whether this error was raised while interpreting the configuration
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::MissingAddress
                | Error::InvalidUrl(..)
                | Error::UnsupportedScheme(_)
                | Error::MissingHost(_)
                | Error::MissingPort(_)
                | Error::InvalidServerName(_)
        )
    }

    /// Whether this error was raised by the network exchange itself
    pub fn is_transport_error(&self) -> bool {
        !self.is_config_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::UnsupportedScheme("http".into()).is_config_error());
        assert!(Error::MissingPort("tcp://host".into()).is_config_error());
        assert!(Error::ConnectionClosed.is_transport_error());
        assert!(Error::Io(io::Error::new(io::ErrorKind::BrokenPipe, "pipe")).is_transport_error());
        assert!(!Error::ProbeAborted.is_config_error());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::UnsupportedScheme("http".into());
        assert_eq!(err.to_string(), "Unknown scheme: http");

        let err = Error::ConnectTimeout("10.0.0.1:5060".into(), Duration::from_secs(5));
        assert_eq!(err.to_string(), "Timed out connecting to 10.0.0.1:5060 after 5s");
    }
}
