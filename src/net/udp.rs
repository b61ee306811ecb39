/// UDP (User Datagram Protocol) implementation
///
/// This module provides:
/// - the two-phase send path (headers first, payload and lengths later)
/// - replies built in place from the resident datagram
/// - a small port-indexed listener table for server callbacks
use crate::ndebug;

use super::checksum::{fill_checksum, ChecksumKind};
use super::drivers::{NetError, NicDriver};
use super::ethernet::MacAddress;
use super::frame::{ip, udp, FrameBuffer};
use super::identity::NetworkIdentity;
use super::ipv4::{self, IpProtocol, Ipv4Address};

/// UDP port number
pub type Port = u16;

/// Payloads above this are truncated; there is no fragmentation.
pub const MAX_PAYLOAD: usize = 220;

pub const MAX_LISTENERS: usize = 4;

fn clamp_payload(len: usize) -> usize {
    len.min(MAX_PAYLOAD)
}

/// Frame length of a datagram carrying `datalen` payload bytes.
pub const fn frame_len(datalen: usize) -> usize {
    udp::DATA + datalen
}

pub fn src_port(frame: &FrameBuffer) -> Port {
    frame.u16_at(udp::SRC_PORT)
}

pub fn dst_port(frame: &FrameBuffer) -> Port {
    frame.u16_at(udp::DST_PORT)
}

/// Payload of the resident datagram, bounded by both the UDP length field
/// and the received frame length.
pub fn payload(frame: &FrameBuffer, frame_len: usize) -> &[u8] {
    let declared = (frame.u16_at(udp::LEN) as usize).saturating_sub(udp::HEADER_LEN);
    let available = frame_len
        .min(frame.as_bytes().len())
        .saturating_sub(udp::DATA);
    frame.slice(udp::DATA, declared.min(available))
}

/// Phase one: Ethernet, IP and UDP headers with lengths left open.
pub fn prepare(
    frame: &mut FrameBuffer,
    identity: &NetworkIdentity,
    next_hop: &MacAddress,
    sport: Port,
    dst: &Ipv4Address,
    dport: Port,
) {
    ipv4::set_macs_and_ips(frame, identity, next_hop, dst);
    ipv4::write_header(frame, IpProtocol::UDP);
    frame.set_u16(ip::TOTAL_LEN, 0);
    frame.set_u16(udp::DST_PORT, dport);
    frame.set_u16(udp::SRC_PORT, sport);
    frame.set_u16(udp::LEN, 0);
    frame.set_u16(udp::CHECKSUM, 0);
}

/// Writable payload area of a prepared datagram.
pub fn payload_mut(frame: &mut FrameBuffer) -> &mut [u8] {
    frame.slice_mut(udp::DATA, MAX_PAYLOAD)
}

/// Phase two: lengths and both checksums for `datalen` payload bytes.
/// Returns the frame length.
pub fn finish(frame: &mut FrameBuffer, datalen: usize) -> usize {
    let datalen = clamp_payload(datalen);
    frame.set_u16(
        ip::TOTAL_LEN,
        (ip::HEADER_LEN + udp::HEADER_LEN + datalen) as u16,
    );
    ipv4::fill_header_checksum(frame);
    frame.set_u16(udp::LEN, (udp::HEADER_LEN + datalen) as u16);
    frame.set_u16(udp::CHECKSUM, 0);
    fill_checksum(
        frame,
        udp::CHECKSUM,
        ip::SRC,
        8 + udp::HEADER_LEN + datalen,
        ChecksumKind::Udp,
    );
    frame_len(datalen)
}

/// Answer the resident datagram from `sport` with `data`.
///
/// The requester's port is read before the port fields are rewritten.
pub fn build_reply(
    frame: &mut FrameBuffer,
    identity: &NetworkIdentity,
    data: &[u8],
    sport: Port,
) -> usize {
    let requester_port = src_port(frame);
    let data = &data[..clamp_payload(data.len())];

    ipv4::mirror_eth_ip(frame, identity);
    frame.set_u16(udp::DST_PORT, requester_port);
    frame.set_u16(udp::SRC_PORT, sport);
    frame.copy_from(udp::DATA, data);
    finish(frame, data.len())
}

/// A received datagram handed to a listener callback.
///
/// Source address and ports are captured up front; the payload is only
/// available until `reply` overwrites the frame buffer.
pub struct UdpRequest<'a> {
    frame: &'a mut FrameBuffer,
    identity: &'a NetworkIdentity,
    nic: &'a mut dyn NicDriver,
    len: usize,
    src_ip: Ipv4Address,
    src_port: Port,
    dst_port: Port,
    replied: bool,
}

impl<'a> UdpRequest<'a> {
    pub fn new(
        frame: &'a mut FrameBuffer,
        identity: &'a NetworkIdentity,
        nic: &'a mut dyn NicDriver,
        len: usize,
    ) -> Self {
        let src_ip = frame.ip_at(ip::SRC);
        let src_port = src_port(frame);
        let dst_port = dst_port(frame);
        Self {
            frame,
            identity,
            nic,
            len,
            src_ip,
            src_port,
            dst_port,
            replied: false,
        }
    }

    pub fn src_ip(&self) -> Ipv4Address {
        self.src_ip
    }

    pub fn src_port(&self) -> Port {
        self.src_port
    }

    pub fn dst_port(&self) -> Port {
        self.dst_port
    }

    /// Empty once a reply has been sent.
    pub fn payload(&self) -> &[u8] {
        if self.replied {
            return &[];
        }
        payload(&*self.frame, self.len)
    }

    /// Reply from the port the request was addressed to.
    pub fn reply(&mut self, data: &[u8]) -> Result<(), NetError> {
        self.reply_from(data, self.dst_port)
    }

    pub fn reply_from(&mut self, data: &[u8], sport: Port) -> Result<(), NetError> {
        if self.replied {
            return Err(NetError::NoResidentFrame);
        }
        self.replied = true;
        let len = build_reply(self.frame, self.identity, data, sport);
        self.nic.transmit(self.frame.frame(len))
    }
}

/// Listener callback for one port.
pub type UdpCallback = fn(&mut UdpRequest<'_>);

#[derive(Clone, Copy)]
struct Listener {
    port: Port,
    callback: UdpCallback,
    enabled: bool,
}

/// Port-indexed UDP listener table.
pub struct UdpServer {
    listeners: [Option<Listener>; MAX_LISTENERS],
}

impl UdpServer {
    pub const fn new() -> Self {
        Self {
            listeners: [None; MAX_LISTENERS],
        }
    }

    /// Register `callback` for `port`, replacing an existing listener.
    pub fn listen_on_port(&mut self, port: Port, callback: UdpCallback) -> Result<(), NetError> {
        if let Some(listener) = self.find_mut(port) {
            listener.callback = callback;
            listener.enabled = true;
            return Ok(());
        }

        let slot = self
            .listeners
            .iter_mut()
            .find(|slot| slot.is_none())
            .ok_or(NetError::TooManyListeners)?;
        *slot = Some(Listener {
            port,
            callback,
            enabled: true,
        });
        ndebug!("udp: listening on port {}", port);
        Ok(())
    }

    pub fn pause_listen(&mut self, port: Port) {
        if let Some(listener) = self.find_mut(port) {
            listener.enabled = false;
        }
    }

    pub fn resume_listen(&mut self, port: Port) {
        if let Some(listener) = self.find_mut(port) {
            listener.enabled = true;
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listeners.iter().flatten().any(|l| l.enabled)
    }

    /// Hand the resident datagram to the listener of its destination port.
    /// Returns true if a listener took it.
    pub fn process_packet(
        &self,
        frame: &mut FrameBuffer,
        identity: &NetworkIdentity,
        nic: &mut dyn NicDriver,
        len: usize,
    ) -> bool {
        let port = dst_port(frame);
        let Some(listener) = self
            .listeners
            .iter()
            .flatten()
            .find(|l| l.enabled && l.port == port)
        else {
            return false;
        };

        let mut request = UdpRequest::new(frame, identity, nic, len);
        (listener.callback)(&mut request);
        true
    }

    fn find_mut(&mut self, port: Port) -> Option<&mut Listener> {
        self.listeners
            .iter_mut()
            .flatten()
            .find(|listener| listener.port == port)
    }
}

impl Default for UdpServer {
    fn default() -> Self {
        Self::new()
    }
}
