//! Shared frame buffer and header layout
//!
//! Every inbound classification and every outbound construction happens in a
//! single `FrameBuffer`. Fields are addressed through the offset tables below
//! (Ethernet II, IPv4 without options), all multi-byte values big-endian.

use super::ethernet::MacAddress;
use super::ipv4::Ipv4Address;

/// Largest frame the stack will receive or build.
pub const FRAME_BUFFER_SIZE: usize = 600;

/// Ethernet II header
pub mod eth {
    pub const DST_MAC: usize = 0;
    pub const SRC_MAC: usize = 6;
    pub const TYPE: usize = 12;
    pub const HEADER_LEN: usize = 14;
}

/// ARP for Ethernet/IPv4
pub mod arp {
    pub const HEADER: usize = 14;
    pub const OPCODE: usize = 20;
    pub const SRC_MAC: usize = 22;
    pub const SRC_IP: usize = 28;
    pub const DST_MAC: usize = 32;
    pub const DST_IP: usize = 38;
    /// Ethernet header plus the 28 byte ARP body.
    pub const FRAME_LEN: usize = 42;
}

/// IPv4 header
pub mod ip {
    pub const HEADER: usize = 14;
    pub const VERSION_IHL: usize = 14;
    pub const TOTAL_LEN: usize = 16;
    pub const FLAGS: usize = 20;
    pub const TTL: usize = 22;
    pub const PROTOCOL: usize = 23;
    pub const CHECKSUM: usize = 24;
    pub const SRC: usize = 26;
    pub const DST: usize = 30;
    pub const HEADER_LEN: usize = 20;
}

/// ICMP echo
pub mod icmp {
    pub const TYPE: usize = 34;
    pub const CODE: usize = 35;
    pub const CHECKSUM: usize = 36;
    pub const IDENT: usize = 38;
    pub const SEQUENCE: usize = 40;
    pub const DATA: usize = 42;
    pub const HEADER_LEN: usize = 8;
}

/// UDP header
pub mod udp {
    pub const SRC_PORT: usize = 34;
    pub const DST_PORT: usize = 36;
    pub const LEN: usize = 38;
    pub const CHECKSUM: usize = 40;
    pub const DATA: usize = 42;
    pub const HEADER_LEN: usize = 8;
}

/// The one frame in flight.
///
/// Builders that derive a reply from the resident frame must read every
/// source field before writing a destination field at an overlapping offset.
pub struct FrameBuffer {
    buf: [u8; FRAME_BUFFER_SIZE],
}

impl FrameBuffer {
    pub const fn new() -> Self {
        Self {
            buf: [0u8; FRAME_BUFFER_SIZE],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// The first `len` bytes, clamped to the buffer size.
    pub fn frame(&self, len: usize) -> &[u8] {
        &self.buf[..len.min(FRAME_BUFFER_SIZE)]
    }

    pub fn u8_at(&self, offset: usize) -> u8 {
        self.buf[offset]
    }

    pub fn set_u8(&mut self, offset: usize, value: u8) {
        self.buf[offset] = value;
    }

    pub fn u16_at(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.buf[offset], self.buf[offset + 1]])
    }

    pub fn set_u16(&mut self, offset: usize, value: u16) {
        self.buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }

    pub fn mac_at(&self, offset: usize) -> MacAddress {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&self.buf[offset..offset + 6]);
        MacAddress(mac)
    }

    pub fn set_mac(&mut self, offset: usize, mac: &MacAddress) {
        self.buf[offset..offset + 6].copy_from_slice(mac.as_bytes());
    }

    pub fn ip_at(&self, offset: usize) -> Ipv4Address {
        let mut ip = [0u8; 4];
        ip.copy_from_slice(&self.buf[offset..offset + 4]);
        Ipv4Address(ip)
    }

    pub fn set_ip(&mut self, offset: usize, ip: &Ipv4Address) {
        self.buf[offset..offset + 4].copy_from_slice(ip.as_bytes());
    }

    pub fn slice(&self, offset: usize, len: usize) -> &[u8] {
        &self.buf[offset..offset + len]
    }

    pub fn slice_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        &mut self.buf[offset..offset + len]
    }

    pub fn copy_from(&mut self, offset: usize, data: &[u8]) {
        self.buf[offset..offset + data.len()].copy_from_slice(data);
    }

    pub fn fill(&mut self, offset: usize, len: usize, value: u8) {
        self.buf[offset..offset + len].fill(value);
    }

    /// Point the Ethernet header at `dst`, sourced from our own MAC.
    pub fn set_macs(&mut self, dst: &MacAddress, own: &MacAddress) {
        self.set_mac(eth::DST_MAC, dst);
        self.set_mac(eth::SRC_MAC, own);
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
