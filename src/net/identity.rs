//! Own addressing of the interface.

use super::ethernet::MacAddress;
use super::ipv4::Ipv4Address;

/// MAC, IP and netmask of this host plus the derived subnet broadcast.
///
/// The broadcast address is recomputed by every setter that touches the IP
/// or the mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkIdentity {
    mac: MacAddress,
    ip: Ipv4Address,
    netmask: Ipv4Address,
    broadcast: Ipv4Address,
}

impl NetworkIdentity {
    pub fn new(mac: MacAddress, ip: Ipv4Address, netmask: Ipv4Address) -> Self {
        Self {
            mac,
            ip,
            netmask,
            broadcast: ip.broadcast(&netmask),
        }
    }

    pub const fn unconfigured() -> Self {
        Self {
            mac: MacAddress::ZERO,
            ip: Ipv4Address::UNSPECIFIED,
            netmask: Ipv4Address::UNSPECIFIED,
            broadcast: Ipv4Address::BROADCAST,
        }
    }

    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    pub fn ip(&self) -> Ipv4Address {
        self.ip
    }

    pub fn netmask(&self) -> Ipv4Address {
        self.netmask
    }

    pub fn broadcast(&self) -> Ipv4Address {
        self.broadcast
    }

    pub fn set_mac(&mut self, mac: MacAddress) {
        self.mac = mac;
    }

    pub fn set_ip(&mut self, ip: Ipv4Address) {
        self.ip = ip;
        self.update_broadcast();
    }

    pub fn set_netmask(&mut self, netmask: Ipv4Address) {
        self.netmask = netmask;
        self.update_broadcast();
    }

    /// Whether a datagram addressed to `dst` is meant for this host.
    pub fn accepts(&self, dst: &Ipv4Address) -> bool {
        *dst == self.ip || *dst == self.broadcast || dst.is_broadcast()
    }

    fn update_broadcast(&mut self) {
        self.broadcast = self.ip.broadcast(&self.netmask);
    }
}

impl Default for NetworkIdentity {
    fn default() -> Self {
        Self::unconfigured()
    }
}
