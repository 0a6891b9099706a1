//! Frame builders for tests

use pnet::packet::ethernet::{EtherTypes, MutableEthernetPacket};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::MutableIpv4Packet;
use pnet::packet::tcp::MutableTcpPacket;
use pnet::packet::udp::MutableUdpPacket;
use pnet::util::MacAddr;
use std::net::Ipv4Addr;

const ETH_LEN: usize = 14;
const IPV4_LEN: usize = 20;
const UDP_LEN: usize = 8;
const TCP_LEN: usize = 20;

fn build_ipv4_frame(src: Ipv4Addr, proto: IpNextHeaderProtocol, transport_len: usize) -> Vec<u8> {
    let ip_len = IPV4_LEN + transport_len;
    let mut buf = vec![0u8; ETH_LEN + ip_len];

    let mut eth = MutableEthernetPacket::new(&mut buf).unwrap();
    eth.set_destination(MacAddr::broadcast());
    eth.set_source(MacAddr::new(0x02, 0, 0, 0, 0, 1));
    eth.set_ethertype(EtherTypes::Ipv4);

    let mut ip = MutableIpv4Packet::new(&mut buf[ETH_LEN..]).unwrap();
    ip.set_version(4);
    ip.set_header_length(5);
    ip.set_total_length(ip_len as u16);
    ip.set_ttl(64);
    ip.set_next_level_protocol(proto);
    ip.set_source(src);
    ip.set_destination(Ipv4Addr::new(10, 0, 0, 255));

    buf
}

pub fn build_udp_frame(src: Ipv4Addr, payload: &[u8]) -> Vec<u8> {
    let udp_len = UDP_LEN + payload.len();
    let mut buf = build_ipv4_frame(src, IpNextHeaderProtocols::Udp, udp_len);

    let mut udp = MutableUdpPacket::new(&mut buf[ETH_LEN + IPV4_LEN..]).unwrap();
    udp.set_source(40000);
    udp.set_destination(53);
    udp.set_length(udp_len as u16);
    udp.set_payload(payload);

    buf
}

pub fn build_tcp_frame(src: Ipv4Addr, payload: &[u8]) -> Vec<u8> {
    let tcp_len = TCP_LEN + payload.len();
    let mut buf = build_ipv4_frame(src, IpNextHeaderProtocols::Tcp, tcp_len);

    let mut tcp = MutableTcpPacket::new(&mut buf[ETH_LEN + IPV4_LEN..]).unwrap();
    tcp.set_source(40000);
    tcp.set_destination(80);
    tcp.set_data_offset(5);
    tcp.set_payload(payload);

    buf
}
