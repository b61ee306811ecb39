/// IPv4 addressing and header construction
///
/// Address helpers (subnet membership, broadcast derivation) and the routines
/// that fill the fixed 20 byte header in the shared frame buffer.
use core::str::FromStr;

use super::checksum::{fill_checksum, ChecksumKind};
use super::drivers::NetError;
use super::ethernet::{EtherType, MacAddress};
use super::frame::{eth, ip, FrameBuffer};
use super::identity::NetworkIdentity;

/// IPv4 address (4 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ipv4Address(pub [u8; 4]);

impl Ipv4Address {
    pub const UNSPECIFIED: Ipv4Address = Ipv4Address([0, 0, 0, 0]);
    pub const BROADCAST: Ipv4Address = Ipv4Address([255, 255, 255, 255]);

    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Self([a, b, c, d])
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn is_unspecified(&self) -> bool {
        *self == Self::UNSPECIFIED
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0xF0 == 0xE0
    }

    /// Subnet broadcast address: `ip | !mask`.
    pub fn broadcast(&self, netmask: &Ipv4Address) -> Ipv4Address {
        let mut out = [0u8; 4];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.0[i] | !netmask.0[i];
        }
        Ipv4Address(out)
    }
}

impl core::fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}.{}.{}.{}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

impl From<[u8; 4]> for Ipv4Address {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

/// Dotted quad, e.g. `192.168.1.5`.
impl FromStr for Ipv4Address {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 4];
        let mut parts = s.split('.');
        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or(NetError::InvalidAddress)?;
            if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(NetError::InvalidAddress);
            }
            *byte = part.parse().map_err(|_| NetError::InvalidAddress)?;
        }
        if parts.next().is_some() {
            return Err(NetError::InvalidAddress);
        }
        Ok(Self(bytes))
    }
}

/// True when both addresses are set and share the subnet under `netmask`.
///
/// An address whose first octet is zero counts as unset.
pub fn is_lan(a: &Ipv4Address, b: &Ipv4Address, netmask: &Ipv4Address) -> bool {
    if a.0[0] == 0 || b.0[0] == 0 {
        return false;
    }
    (0..4).all(|i| a.0[i] & netmask.0[i] == b.0[i] & netmask.0[i])
}

/// IP protocol numbers
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpProtocol {
    ICMP = 1,
    TCP = 6,
    UDP = 17,
    Unknown = 0xFF,
}

impl From<u8> for IpProtocol {
    fn from(value: u8) -> Self {
        match value {
            1 => IpProtocol::ICMP,
            6 => IpProtocol::TCP,
            17 => IpProtocol::UDP,
            _ => IpProtocol::Unknown,
        }
    }
}

impl From<IpProtocol> for u8 {
    fn from(value: IpProtocol) -> Self {
        value as u8
    }
}

/// Version/IHL byte of a header without options.
pub const VERSION_IHL: u8 = 0x45;
pub const DEFAULT_TTL: u8 = 64;
const FLAG_DONT_FRAGMENT: u8 = 0x40;

/// First nine header bytes: version/IHL, TOS, total length, id, DF, TTL.
/// Total length and TTL are overwritten by the builders.
const HEADER_TEMPLATE: [u8; 9] = [VERSION_IHL, 0, 0, 0x82, 0, 0, FLAG_DONT_FRAGMENT, 0, 0x20];

/// Set DF, TTL and recompute the header checksum.
pub fn fill_header_checksum(frame: &mut FrameBuffer) {
    frame.set_u16(ip::CHECKSUM, 0);
    frame.set_u8(ip::FLAGS, FLAG_DONT_FRAGMENT);
    frame.set_u8(ip::FLAGS + 1, 0);
    frame.set_u8(ip::TTL, DEFAULT_TTL);
    fill_checksum(
        frame,
        ip::CHECKSUM,
        ip::HEADER,
        ip::HEADER_LEN,
        ChecksumKind::Plain,
    );
}

/// Ethernet and IP addressing for a new outbound datagram.
pub fn set_macs_and_ips(
    frame: &mut FrameBuffer,
    identity: &NetworkIdentity,
    dst_mac: &MacAddress,
    dst_ip: &Ipv4Address,
) {
    frame.set_macs(dst_mac, &identity.mac());
    frame.set_ip(ip::DST, dst_ip);
    frame.set_ip(ip::SRC, &identity.ip());
}

/// Ether type plus the fixed header template for `protocol`.
pub fn write_header(frame: &mut FrameBuffer, protocol: IpProtocol) {
    frame.set_u16(eth::TYPE, EtherType::IPv4.into());
    frame.copy_from(ip::HEADER, &HEADER_TEMPLATE);
    frame.set_u8(ip::PROTOCOL, protocol.into());
}

/// Turn the resident datagram around: send it back to its source.
///
/// Source MAC and IP are read before the destination fields are written.
pub fn mirror_eth_ip(frame: &mut FrameBuffer, identity: &NetworkIdentity) {
    let src_mac = frame.mac_at(eth::SRC_MAC);
    let src_ip = frame.ip_at(ip::SRC);
    frame.set_macs(&src_mac, &identity.mac());
    frame.set_ip(ip::DST, &src_ip);
    frame.set_ip(ip::SRC, &identity.ip());
    fill_header_checksum(frame);
}
