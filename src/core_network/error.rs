// Error handling for the data channel module
use std::io;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataChannelError {
    #[error("No data connection has been negotiated")]
    NotNegotiated,

    #[error("PASV needs an IPv4 address, control connection is on {0}")]
    NoIpv4(IpAddr),

    #[error("Failed to open passive listener: {0}")]
    Listen(#[source] io::Error),

    #[error("No free port in passive range {0}-{1}")]
    NoFreePort(u16, u16),

    #[error("Timed out waiting for the data connection")]
    Timeout,

    #[error("Failed to accept data connection: {0}")]
    Accept(#[source] io::Error),

    #[error("Failed to connect to {0}: {1}")]
    Connect(SocketAddr, #[source] io::Error),

    #[error("Invalid PORT argument: {0}")]
    InvalidPort(String),

    #[error("PORT address {provided} does not match client address {expected}")]
    AddressMismatch { expected: IpAddr, provided: IpAddr },

    #[error("Transfer aborted")]
    Aborted,

    #[error("Data connection failed: {0}")]
    Connection(#[source] io::Error),

    #[error("Storage stream failed: {0}")]
    Storage(#[source] io::Error),
}

impl DataChannelError {
    pub fn to_ftp_response(&self) -> (u16, &'static str) {
        match self {
            DataChannelError::NotNegotiated => (425, "Use PORT or PASV first."),
            DataChannelError::NoIpv4(_)
            | DataChannelError::Listen(_)
            | DataChannelError::NoFreePort(..)
            | DataChannelError::Timeout
            | DataChannelError::Accept(_)
            | DataChannelError::Connect(..) => (425, "Can't open data connection."),
            DataChannelError::InvalidPort(_) => (501, "Syntax error in parameters or arguments."),
            DataChannelError::AddressMismatch { .. } => (501, "Illegal PORT command."),
            DataChannelError::Aborted | DataChannelError::Connection(_) => {
                (426, "Connection closed; transfer aborted.")
            }
            DataChannelError::Storage(_) => (451, "Requested action aborted. Local error in processing."),
        }
    }
}
