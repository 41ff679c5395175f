use std::net::{IpAddr, Ipv4Addr, SocketAddrV4};

/// Formats the `227` reply text for a passive listener.
///
/// The port is split into its high and low bytes, as in
/// `Entering Passive Mode (127,0,0,1,195,80).`
pub fn format_pasv_reply(addr: SocketAddrV4) -> String {
    let [h1, h2, h3, h4] = addr.ip().octets();
    let port = addr.port();
    format!(
        "Entering Passive Mode ({},{},{},{},{},{}).",
        h1,
        h2,
        h3,
        h4,
        port >> 8,
        port & 0xff
    )
}

/// Unmaps IPv4-mapped IPv6 addresses so that `::ffff:127.0.0.1` compares equal to `127.0.0.1`.
pub fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        IpAddr::V4(_) => ip,
    }
}

/// The IPv4 address to advertise in a PASV reply, if any.
pub fn advertised_ipv4(configured: Option<Ipv4Addr>, local: IpAddr) -> Option<Ipv4Addr> {
    if let Some(ip) = configured {
        return Some(ip);
    }
    match canonical_ip(local) {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(_) => None,
    }
}
