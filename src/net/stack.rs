use crate::config::NetConfig;
use crate::{ndebug, ninfo, ntrace, nwarn};

#[cfg(feature = "net_icmp")]
use super::icmp::{self, PingCallback};
#[cfg(feature = "net_udp")]
use super::udp::{self, Port, UdpCallback, UdpServer};
#[cfg(feature = "net_wol")]
use super::wol;

use super::arp::{self, ArpOperation, Resolver, TargetKind};
use super::drivers::{NetError, NicDriver};
use super::ethernet::{EtherType, MacAddress};
use super::frame::{eth, ip, FrameBuffer, FRAME_BUFFER_SIZE};
use super::identity::NetworkIdentity;
use super::ipv4::{self, IpProtocol, Ipv4Address};

/// Shortest frames worth classifying.
const MIN_ARP_FRAME: usize = 41;
const MIN_IP_FRAME: usize = 42;

/// Outcome of one pass of the packet loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Nothing received; the idle tick ran.
    Idle,
    /// Answered an ARP request for our address.
    ArpAnswered,
    /// An ARP reply resolved the gateway, DNS server or peer.
    ArpResolved,
    EchoAnswered,
    /// A UDP listener consumed the datagram.
    UdpHandled,
    /// A datagram for us that no listener took. It stays resident until
    /// the next poll, so `make_udp_reply` can still answer it.
    UdpUnclaimed,
    Ignored,
}

/// What the frame buffer currently holds, as far as the send API cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resident {
    Nothing,
    /// Received datagram of this frame length.
    Datagram(usize),
    /// Headers written by `udp_prepare`, payload pending.
    PreparedUdp,
}

/// The whole endpoint: one frame buffer, our identity and the resolver.
pub struct NetStack {
    frame: FrameBuffer,
    identity: NetworkIdentity,
    resolver: Resolver,
    idle_ticks: u16,
    resident: Resident,
    #[cfg(feature = "net_icmp")]
    ping_callback: Option<PingCallback>,
    #[cfg(feature = "net_udp")]
    udp_server: UdpServer,
}

impl NetStack {
    pub const fn new() -> Self {
        Self {
            frame: FrameBuffer::new(),
            identity: NetworkIdentity::unconfigured(),
            resolver: Resolver::new(),
            idle_ticks: 0,
            resident: Resident::Nothing,
            #[cfg(feature = "net_icmp")]
            ping_callback: None,
            #[cfg(feature = "net_udp")]
            udp_server: UdpServer::new(),
        }
    }

    pub fn from_config(config: &NetConfig) -> Self {
        let mut stack = Self::new();
        stack.configure(config);
        stack
    }

    /// Apply addresses from `config`. Every resolution restarts.
    pub fn configure(&mut self, config: &NetConfig) {
        self.identity = NetworkIdentity::new(config.mac, config.ip, config.netmask);
        self.set_gateway_ip(config.gateway);
        self.set_dns_ip(config.dns);
        self.set_peer_ip(config.peer);
        ninfo!(
            "net: {} mac {} mask {} gw {}",
            config.ip,
            config.mac,
            config.netmask,
            config.gateway
        );
    }

    pub fn identity(&self) -> &NetworkIdentity {
        &self.identity
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn idle_ticks(&self) -> u16 {
        self.idle_ticks
    }

    pub fn set_mac(&mut self, mac: MacAddress) {
        self.identity.set_mac(mac);
    }

    pub fn set_ip(&mut self, ip: Ipv4Address) {
        self.identity.set_ip(ip);
    }

    pub fn set_netmask(&mut self, netmask: Ipv4Address) {
        self.identity.set_netmask(netmask);
    }

    /// Also rewinds the idle counter so the first who-has goes out on the
    /// next idle poll.
    pub fn set_gateway_ip(&mut self, ip: Ipv4Address) {
        self.resolver.configure(TargetKind::Gateway, ip);
        self.idle_ticks = 0;
    }

    pub fn set_dns_ip(&mut self, ip: Ipv4Address) {
        self.resolver.configure(TargetKind::Dns, ip);
    }

    pub fn set_peer_ip(&mut self, ip: Ipv4Address) {
        self.resolver.configure(TargetKind::Peer, ip);
    }

    pub fn refresh_gateway(&mut self) {
        self.resolver.refresh_gateway();
    }

    pub fn client_waiting_gateway(&self) -> bool {
        self.resolver.waiting_for_gateway()
    }

    /// Receive at most one frame from `nic` and process it.
    pub fn poll(&mut self, nic: &mut dyn NicDriver) -> Dispatch {
        let len = nic.receive(self.frame.as_bytes_mut());
        self.packet_loop(nic, len)
    }

    /// Process the `len` bytes resident in the frame buffer, or run the
    /// idle tick when `len` is 0.
    pub fn packet_loop(&mut self, nic: &mut dyn NicDriver, len: usize) -> Dispatch {
        self.resident = Resident::Nothing;
        if len == 0 {
            self.idle_tick(nic);
            return Dispatch::Idle;
        }
        let len = len.min(FRAME_BUFFER_SIZE);
        let ethertype = EtherType::from(self.frame.u16_at(eth::TYPE));

        if len >= MIN_ARP_FRAME
            && ethertype == EtherType::ARP
            && arp::target_ip(&self.frame) == self.identity.ip()
        {
            return self.handle_arp(nic);
        }

        if len < MIN_IP_FRAME
            || ethertype != EtherType::IPv4
            || self.frame.u8_at(ip::VERSION_IHL) != ipv4::VERSION_IHL
            || !self.identity.accepts(&self.frame.ip_at(ip::DST))
        {
            return Dispatch::Ignored;
        }

        self.handle_ipv4(nic, len)
    }

    fn handle_arp(&mut self, nic: &mut dyn NicDriver) -> Dispatch {
        match arp::operation(&self.frame) {
            ArpOperation::Request => {
                ntrace!("arp: who-has from {}", arp::sender_ip(&self.frame));
                let len = arp::build_reply_from_request(&mut self.frame, &self.identity);
                let _ = self.transmit(nic, len, "arp reply");
                Dispatch::ArpAnswered
            }
            ArpOperation::Reply => {
                let sender_ip = arp::sender_ip(&self.frame);
                let sender_mac = arp::sender_mac(&self.frame);
                if self.resolver.handle_reply(&sender_ip, &sender_mac) {
                    Dispatch::ArpResolved
                } else {
                    Dispatch::Ignored
                }
            }
            ArpOperation::Unknown => Dispatch::Ignored,
        }
    }

    #[cfg_attr(
        not(any(feature = "net_icmp", feature = "net_udp")),
        allow(unused_variables)
    )]
    fn handle_ipv4(&mut self, nic: &mut dyn NicDriver, len: usize) -> Dispatch {
        let protocol = IpProtocol::from(self.frame.u8_at(ip::PROTOCOL));
        match protocol {
            #[cfg(feature = "net_icmp")]
            IpProtocol::ICMP if icmp::is_echo_request(&self.frame) => {
                let src = self.frame.ip_at(ip::SRC);
                if let Some(callback) = self.ping_callback {
                    callback(src);
                }
                let len = icmp::build_echo_reply_from_request(&mut self.frame, &self.identity, len);
                let _ = self.transmit(nic, len, "echo reply");
                Dispatch::EchoAnswered
            }
            #[cfg(feature = "net_udp")]
            IpProtocol::UDP => {
                self.resident = Resident::Datagram(len);
                if self.udp_server.is_listening()
                    && self
                        .udp_server
                        .process_packet(&mut self.frame, &self.identity, nic, len)
                {
                    self.resident = Resident::Nothing;
                    return Dispatch::UdpHandled;
                }
                Dispatch::UdpUnclaimed
            }
            _ => Dispatch::Ignored,
        }
    }

    fn idle_tick(&mut self, nic: &mut dyn NicDriver) {
        if self.idle_ticks == 0 && self.resolver.gateway_request_due() && nic.is_link_up() {
            self.request(nic, TargetKind::Gateway);
        }
        self.idle_ticks = self.idle_ticks.wrapping_add(1);

        for kind in [TargetKind::Dns, TargetKind::Peer] {
            if self.resolver.one_shot_request_due(kind, &self.identity) {
                self.request(nic, kind);
            }
        }
    }

    /// Send a who-has for `kind`. A failed send leaves the target due.
    fn request(&mut self, nic: &mut dyn NicDriver, kind: TargetKind) {
        let target = self.resolver.target(kind).ip();
        let len = arp::build_request(&mut self.frame, &self.identity, &target);
        if self.transmit(nic, len, kind.as_str()).is_ok() {
            self.resolver.mark_requested(kind);
            ndebug!("arp: who-has {} ({})", target, kind.as_str());
        }
    }

    fn transmit(
        &mut self,
        nic: &mut dyn NicDriver,
        len: usize,
        what: &str,
    ) -> Result<(), NetError> {
        let result = nic.transmit(self.frame.frame(len));
        if let Err(err) = result {
            nwarn!("net: {} not sent ({:?})", what, err);
        }
        result
    }

    /// True if the resident frame is a pong to one of our pings from `host`.
    #[cfg(feature = "net_icmp")]
    pub fn is_echo_reply_from(&self, host: &Ipv4Address) -> bool {
        icmp::is_echo_reply_from(&self.frame, host)
    }

    /// The callback runs inside the packet loop. Under [`crate::net::poll`]
    /// the global lock is held, so calls back into `crate::net` fail with
    /// `NetError::Busy`.
    #[cfg(feature = "net_icmp")]
    pub fn register_ping_callback(&mut self, callback: PingCallback) {
        self.ping_callback = Some(callback);
    }

    /// Ping `dst` through its resolved next hop.
    #[cfg(feature = "net_icmp")]
    pub fn client_icmp_request(
        &mut self,
        nic: &mut dyn NicDriver,
        dst: &Ipv4Address,
    ) -> Result<(), NetError> {
        let hop = self.resolver.next_hop(dst, &self.identity)?;
        self.resident = Resident::Nothing;
        let len = icmp::build_echo_request(&mut self.frame, &self.identity, &hop, dst);
        self.transmit(nic, len, "echo request")
    }

    /// Same locking caveat as [`NetStack::register_ping_callback`]; answer
    /// through the `UdpRequest` instead.
    #[cfg(feature = "net_udp")]
    pub fn listen_on_port(&mut self, port: Port, callback: UdpCallback) -> Result<(), NetError> {
        self.udp_server.listen_on_port(port, callback)
    }

    #[cfg(feature = "net_udp")]
    pub fn pause_listen(&mut self, port: Port) {
        self.udp_server.pause_listen(port);
    }

    #[cfg(feature = "net_udp")]
    pub fn resume_listen(&mut self, port: Port) {
        self.udp_server.resume_listen(port);
    }

    /// Payload of the datagram left unclaimed by the last poll.
    #[cfg(feature = "net_udp")]
    pub fn resident_udp_payload(&self) -> Option<&[u8]> {
        match self.resident {
            Resident::Datagram(len) => Some(udp::payload(&self.frame, len)),
            _ => None,
        }
    }

    /// Write Ethernet, IP and UDP headers for a datagram to `dst`. The
    /// payload goes into `udp_payload_mut` before `udp_transmit`.
    #[cfg(feature = "net_udp")]
    pub fn udp_prepare(&mut self, sport: Port, dst: &Ipv4Address, dport: Port) -> Result<(), NetError> {
        let hop = self.resolver.next_hop(dst, &self.identity)?;
        udp::prepare(&mut self.frame, &self.identity, &hop, sport, dst, dport);
        self.resident = Resident::PreparedUdp;
        Ok(())
    }

    /// At most `udp::MAX_PAYLOAD` bytes are sent from this region.
    #[cfg(feature = "net_udp")]
    pub fn udp_payload_mut(&mut self) -> &mut [u8] {
        udp::payload_mut(&mut self.frame)
    }

    #[cfg(feature = "net_udp")]
    pub fn udp_transmit(&mut self, nic: &mut dyn NicDriver, datalen: usize) -> Result<(), NetError> {
        if self.resident != Resident::PreparedUdp {
            return Err(NetError::NotPrepared);
        }
        self.resident = Resident::Nothing;
        let len = udp::finish(&mut self.frame, datalen);
        self.transmit(nic, len, "udp datagram")
    }

    /// Send `data` to `dst:dport` in one go. Payloads beyond
    /// `udp::MAX_PAYLOAD` bytes are cut.
    #[cfg(feature = "net_udp")]
    pub fn send_udp(
        &mut self,
        nic: &mut dyn NicDriver,
        data: &[u8],
        sport: Port,
        dst: &Ipv4Address,
        dport: Port,
    ) -> Result<(), NetError> {
        self.udp_prepare(sport, dst, dport)?;
        let datalen = data.len().min(udp::MAX_PAYLOAD);
        self.udp_payload_mut()[..datalen].copy_from_slice(&data[..datalen]);
        self.udp_transmit(nic, datalen)
    }

    /// Answer the unclaimed datagram in the frame buffer from `sport`.
    #[cfg(feature = "net_udp")]
    pub fn make_udp_reply(
        &mut self,
        nic: &mut dyn NicDriver,
        data: &[u8],
        sport: Port,
    ) -> Result<(), NetError> {
        if !matches!(self.resident, Resident::Datagram(_)) {
            return Err(NetError::NoResidentFrame);
        }
        self.resident = Resident::Nothing;
        let len = udp::build_reply(&mut self.frame, &self.identity, data, sport);
        self.transmit(nic, len, "udp reply")
    }

    #[cfg(feature = "net_wol")]
    pub fn send_wol(&mut self, nic: &mut dyn NicDriver, target: &MacAddress) -> Result<(), NetError> {
        self.resident = Resident::Nothing;
        let len = wol::build_magic_packet(&mut self.frame, &self.identity, target);
        self.transmit(nic, len, "magic packet")
    }

    /// Copy a raw frame into the buffer, as a driver DMA would.
    #[cfg(test)]
    fn inject(&mut self, frame: &[u8]) -> usize {
        let len = frame.len().min(FRAME_BUFFER_SIZE);
        self.frame.copy_from(0, &frame[..len]);
        len
    }
}

impl Default for NetStack {
    fn default() -> Self {
        Self::new()
    }
}
