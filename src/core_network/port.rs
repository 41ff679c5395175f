use super::pasv::canonical_ip;
use super::DataChannelError;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Lowest client port accepted in a PORT command.
pub const MIN_ACTIVE_PORT: u16 = 1024;

/// Parses a PORT argument of the form `h1,h2,h3,h4,p1,p2`.
pub fn parse_port_argument(arg: &str) -> Result<SocketAddr, DataChannelError> {
    let parts: Vec<&str> = arg.trim().split(',').map(str::trim).collect();
    if parts.len() != 6 {
        return Err(DataChannelError::InvalidPort(arg.to_string()));
    }

    let mut bytes = [0u8; 6];
    for (slot, part) in bytes.iter_mut().zip(&parts) {
        *slot = part
            .parse::<u8>()
            .map_err(|_| DataChannelError::InvalidPort(arg.to_string()))?;
    }

    let ip = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
    let port = u16::from(bytes[4]) << 8 | u16::from(bytes[5]);
    Ok(SocketAddr::new(IpAddr::V4(ip), port))
}

/// Rejects targets other than the control peer and privileged ports.
pub fn validate_active_target(target: SocketAddr, peer: IpAddr) -> Result<(), DataChannelError> {
    let expected = canonical_ip(peer);
    if canonical_ip(target.ip()) != expected {
        return Err(DataChannelError::AddressMismatch {
            expected,
            provided: target.ip(),
        });
    }
    if target.port() < MIN_ACTIVE_PORT {
        return Err(DataChannelError::InvalidPort(format!(
            "port {} is below {}",
            target.port(),
            MIN_ACTIVE_PORT
        )));
    }
    Ok(())
}
