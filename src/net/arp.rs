/// ARP (Address Resolution Protocol) implementation
///
/// This module provides the ARP request/reply builders and the resolution
/// state machine that tracks the MAC addresses of the gateway, the DNS host
/// and one ad-hoc peer.
use crate::ntrace;

use super::drivers::NetError;
use super::ethernet::{EtherType, MacAddress};
use super::frame::{arp, eth, FrameBuffer};
use super::identity::NetworkIdentity;
use super::ipv4::{is_lan, Ipv4Address};

/// ARP operations
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOperation {
    Request = 1,
    Reply = 2,
    Unknown = 0xFFFF,
}

impl From<u16> for ArpOperation {
    fn from(value: u16) -> Self {
        match value {
            1 => ArpOperation::Request,
            2 => ArpOperation::Reply,
            _ => ArpOperation::Unknown,
        }
    }
}

/// Hardware type, protocol type, address lengths and opcode of a request.
const REQUEST_HEADER: [u8; 8] = [0, 1, 8, 0, 6, 4, 0, 1];

pub fn operation(frame: &FrameBuffer) -> ArpOperation {
    ArpOperation::from(frame.u16_at(arp::OPCODE))
}

pub fn sender_ip(frame: &FrameBuffer) -> Ipv4Address {
    frame.ip_at(arp::SRC_IP)
}

pub fn sender_mac(frame: &FrameBuffer) -> MacAddress {
    frame.mac_at(arp::SRC_MAC)
}

pub fn target_ip(frame: &FrameBuffer) -> Ipv4Address {
    frame.ip_at(arp::DST_IP)
}

/// Broadcast a who-has for `target`. Returns the frame length.
pub fn build_request(
    frame: &mut FrameBuffer,
    identity: &NetworkIdentity,
    target: &Ipv4Address,
) -> usize {
    frame.set_macs(&MacAddress::BROADCAST, &identity.mac());
    frame.set_u16(eth::TYPE, EtherType::ARP.into());
    frame.copy_from(arp::HEADER, &REQUEST_HEADER);
    frame.set_mac(arp::DST_MAC, &MacAddress::ZERO);
    frame.set_mac(arp::SRC_MAC, &identity.mac());
    frame.set_ip(arp::DST_IP, target);
    frame.set_ip(arp::SRC_IP, &identity.ip());
    arp::FRAME_LEN
}

/// Answer the resident request in place. Returns the frame length.
pub fn build_reply_from_request(frame: &mut FrameBuffer, identity: &NetworkIdentity) -> usize {
    let requester_mac = sender_mac(frame);
    let requester_ip = sender_ip(frame);

    frame.set_macs(&requester_mac, &identity.mac());
    frame.set_u16(arp::OPCODE, ArpOperation::Reply as u16);
    frame.set_mac(arp::DST_MAC, &requester_mac);
    frame.set_mac(arp::SRC_MAC, &identity.mac());
    frame.set_ip(arp::DST_IP, &requester_ip);
    frame.set_ip(arp::SRC_IP, &identity.ip());
    arp::FRAME_LEN
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Idle,
    AwaitingReply,
    Resolved,
}

/// The addresses the stack keeps a MAC for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Gateway,
    Dns,
    Peer,
}

impl TargetKind {
    pub const ALL: [TargetKind; 3] = [TargetKind::Gateway, TargetKind::Dns, TargetKind::Peer];

    const fn index(self) -> usize {
        match self {
            TargetKind::Gateway => 0,
            TargetKind::Dns => 1,
            TargetKind::Peer => 2,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            TargetKind::Gateway => "gateway",
            TargetKind::Dns => "dns",
            TargetKind::Peer => "peer",
        }
    }
}

/// One address awaiting or holding a MAC. An all-zero MAC means unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionTarget {
    ip: Ipv4Address,
    mac: MacAddress,
    state: ResolutionState,
}

impl ResolutionTarget {
    pub const fn unconfigured() -> Self {
        Self {
            ip: Ipv4Address::UNSPECIFIED,
            mac: MacAddress::ZERO,
            state: ResolutionState::Idle,
        }
    }

    pub fn ip(&self) -> Ipv4Address {
        self.ip
    }

    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    pub fn state(&self) -> ResolutionState {
        self.state
    }

    pub fn is_configured(&self) -> bool {
        !self.ip.is_unspecified()
    }

    pub fn is_resolved(&self) -> bool {
        self.state == ResolutionState::Resolved
    }
}

/// Resolution state for the gateway, DNS host and peer.
///
/// The gateway is retried from the idle tick until answered and only accepts
/// a reply while a request of ours is outstanding. DNS and peer are asked
/// once, and only when they sit on our subnet.
pub struct Resolver {
    targets: [ResolutionTarget; 3],
    gateway_refresh: bool,
    accept_gateway_reply: bool,
}

impl Resolver {
    pub const fn new() -> Self {
        Self {
            targets: [ResolutionTarget::unconfigured(); 3],
            gateway_refresh: false,
            accept_gateway_reply: false,
        }
    }

    /// Set the IP of a target, dropping whatever was resolved for it.
    pub fn configure(&mut self, kind: TargetKind, ip: Ipv4Address) {
        self.targets[kind.index()] = ResolutionTarget {
            ip,
            mac: MacAddress::ZERO,
            state: ResolutionState::Idle,
        };
        if kind == TargetKind::Gateway {
            self.gateway_refresh = false;
            self.accept_gateway_reply = false;
        }
    }

    pub fn target(&self, kind: TargetKind) -> &ResolutionTarget {
        &self.targets[kind.index()]
    }

    pub fn state(&self, kind: TargetKind) -> ResolutionState {
        self.targets[kind.index()].state
    }

    /// Re-ask for a resolved gateway; the known MAC stays in use meanwhile.
    pub fn refresh_gateway(&mut self) {
        if self.targets[TargetKind::Gateway.index()].is_resolved() {
            self.gateway_refresh = true;
        }
    }

    pub fn is_refreshing_gateway(&self) -> bool {
        self.gateway_refresh
    }

    pub fn waiting_for_gateway(&self) -> bool {
        !self.targets[TargetKind::Gateway.index()].is_resolved()
    }

    /// Whether the idle tick should (re)send the gateway who-has.
    pub fn gateway_request_due(&self) -> bool {
        let gateway = &self.targets[TargetKind::Gateway.index()];
        gateway.is_configured() && (!gateway.is_resolved() || self.gateway_refresh)
    }

    /// Whether the one-shot request for a DNS or peer target is due.
    pub fn one_shot_request_due(&self, kind: TargetKind, identity: &NetworkIdentity) -> bool {
        if kind == TargetKind::Gateway {
            return false;
        }
        let target = &self.targets[kind.index()];
        target.is_configured()
            && target.state == ResolutionState::Idle
            && is_lan(&identity.ip(), &target.ip, &identity.netmask())
    }

    /// Record that a who-has for `kind` went out.
    pub fn mark_requested(&mut self, kind: TargetKind) {
        let target = &mut self.targets[kind.index()];
        if kind == TargetKind::Gateway {
            self.accept_gateway_reply = true;
            if target.is_resolved() {
                return;
            }
        }
        target.state = ResolutionState::AwaitingReply;
    }

    /// Feed an ARP reply. Returns true if any target was resolved by it.
    pub fn handle_reply(&mut self, sender_ip: &Ipv4Address, sender_mac: &MacAddress) -> bool {
        let mut resolved = false;

        for kind in TargetKind::ALL {
            let gated = kind == TargetKind::Gateway;
            let target = &mut self.targets[kind.index()];
            if !target.is_configured() || target.ip != *sender_ip {
                continue;
            }

            let waiting = if gated {
                self.accept_gateway_reply
            } else {
                target.state == ResolutionState::AwaitingReply
            };
            if !waiting {
                continue;
            }

            target.mac = *sender_mac;
            target.state = ResolutionState::Resolved;
            if gated {
                self.accept_gateway_reply = false;
                self.gateway_refresh = false;
            }
            ntrace!("arp: {} {} is at {}", kind.as_str(), sender_ip, sender_mac);
            resolved = true;
        }

        resolved
    }

    /// MAC a datagram for `dst` must be sent to.
    ///
    /// Broadcast and multicast map to the broadcast MAC, subnet hosts to
    /// their own resolved MAC, everything else to the gateway.
    pub fn next_hop(
        &self,
        dst: &Ipv4Address,
        identity: &NetworkIdentity,
    ) -> Result<MacAddress, NetError> {
        if dst.is_broadcast() || dst.is_multicast() || *dst == identity.broadcast() {
            return Ok(MacAddress::BROADCAST);
        }

        let hop_ip = if is_lan(&identity.ip(), dst, &identity.netmask()) {
            *dst
        } else {
            self.targets[TargetKind::Gateway.index()].ip
        };
        self.resolved_mac(&hop_ip).ok_or(NetError::MustResolveFirst)
    }

    /// Any target answered for `ip`. Gateway and DNS are often one router,
    /// so whichever record got the reply serves both.
    fn resolved_mac(&self, ip: &Ipv4Address) -> Option<MacAddress> {
        self.targets
            .iter()
            .find(|target| target.is_configured() && target.is_resolved() && target.ip == *ip)
            .map(|target| target.mac)
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}
