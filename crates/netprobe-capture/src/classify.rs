//! Lightweight frame classification
//!
//! The capture loop only needs three things from a frame: the transport
//! protocol, the source IP, and whether the payload looks like readable
//! text. No deep inspection, and raw bytes are never kept.

use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::Packet;
use std::net::IpAddr;

/// Transport-level classification of an observed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    /// IP traffic with some other next-header value
    OtherIp(u8),
    /// Non-IP ethernet traffic (ARP and friends)
    NonIp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
            Protocol::Icmp => write!(f, "icmp"),
            Protocol::OtherIp(p) => write!(f, "ip-{p}"),
            Protocol::NonIp => write!(f, "non-ip"),
        }
    }
}

/// What the capture loop records about one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketSummary {
    pub protocol: Protocol,
    pub src_ip: Option<IpAddr>,
    /// Whether the transport payload passed the printable heuristic
    pub printable_payload: bool,
}

/// Classify one link-layer frame. Returns None for frames too short to
/// carry an ethernet header.
pub fn classify_frame(frame: &[u8]) -> Option<PacketSummary> {
    let ethernet = EthernetPacket::new(frame)?;

    match ethernet.get_ethertype() {
        EtherTypes::Ipv4 => {
            let ip = Ipv4Packet::new(ethernet.payload())?;
            let src = IpAddr::V4(ip.get_source());
            Some(classify_transport(
                ip.get_next_level_protocol(),
                ip.payload(),
                src,
            ))
        }
        EtherTypes::Ipv6 => {
            let ip = Ipv6Packet::new(ethernet.payload())?;
            let src = IpAddr::V6(ip.get_source());
            Some(classify_transport(ip.get_next_header(), ip.payload(), src))
        }
        _ => Some(PacketSummary {
            protocol: Protocol::NonIp,
            src_ip: None,
            printable_payload: false,
        }),
    }
}

fn classify_transport(
    next: IpNextHeaderProtocol,
    payload: &[u8],
    src: IpAddr,
) -> PacketSummary {
    match next {
        IpNextHeaderProtocols::Tcp => {
            let printable = TcpPacket::new(payload)
                .map(|tcp| is_mostly_printable(tcp.payload()))
                .unwrap_or(false);
            PacketSummary {
                protocol: Protocol::Tcp,
                src_ip: Some(src),
                printable_payload: printable,
            }
        }
        IpNextHeaderProtocols::Udp => {
            let printable = UdpPacket::new(payload)
                .map(|udp| is_mostly_printable(udp.payload()))
                .unwrap_or(false);
            PacketSummary {
                protocol: Protocol::Udp,
                src_ip: Some(src),
                printable_payload: printable,
            }
        }
        IpNextHeaderProtocols::Icmp | IpNextHeaderProtocols::Icmpv6 => PacketSummary {
            protocol: Protocol::Icmp,
            src_ip: Some(src),
            printable_payload: false,
        },
        other => PacketSummary {
            protocol: Protocol::OtherIp(other.0),
            src_ip: Some(src),
            printable_payload: false,
        },
    }
}

/// Printable-payload heuristic: a non-empty payload where more than 70%
/// of the bytes are printable ASCII
pub fn is_mostly_printable(payload: &[u8]) -> bool {
    if payload.is_empty() {
        return false;
    }
    let printable = payload
        .iter()
        .filter(|b| (0x20..=0x7e).contains(*b))
        .count();
    printable as f64 / payload.len() as f64 > 0.7
}
