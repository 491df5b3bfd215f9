use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use qrcode::render::svg;
use qrcode::QrCode;

use crate::error::ServerError;

const QR_SIZE: u32 = 200;

/// First non-loopback IPv4 address of this machine. Connecting a UDP socket
/// only selects a route; nothing is sent.
pub fn lan_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

/// A host is public when it neither mentions localhost nor starts with a
/// dotted IPv4 quad; public hosts are used verbatim.
fn is_public_host(host: &str) -> bool {
    !host.contains("localhost") && !starts_with_ipv4(host)
}

/// Four dot-separated digit runs at the start of `host`, so wildcard DNS
/// names like `10.0.0.2.nip.io` count as addresses too.
fn starts_with_ipv4(host: &str) -> bool {
    let mut parts = host.splitn(4, '.');
    let leading = parts
        .by_ref()
        .take(3)
        .filter(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
        .count();
    leading == 3
        && parts
            .next()
            .is_some_and(|last| last.bytes().next().is_some_and(|b| b.is_ascii_digit()))
}

pub fn remote_url(host: Option<&str>, proto: &str, lan_ip: &str, port: u16) -> String {
    match host {
        Some(host) if is_public_host(host) => format!("{proto}://{host}/remote.html"),
        _ => format!("http://{lan_ip}:{port}/remote.html"),
    }
}

pub fn qr_data_url(content: &str) -> Result<String, ServerError> {
    let code = QrCode::new(content.as_bytes()).map_err(ServerError::QrCode)?;
    let image = code
        .render::<svg::Color>()
        .min_dimensions(QR_SIZE, QR_SIZE)
        .quiet_zone(true)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();
    Ok(format!(
        "data:image/svg+xml;base64,{}",
        STANDARD.encode(image)
    ))
}
