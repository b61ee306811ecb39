/// ICMP echo (ping)
///
/// Echo requests are built from scratch with a fixed 56 byte payload; echo
/// replies are derived in place from the resident request.
use super::checksum::{fill_checksum, fold, ChecksumKind};
use super::ethernet::MacAddress;
use super::frame::{icmp, ip, FrameBuffer};
use super::identity::NetworkIdentity;
use super::ipv4::{self, IpProtocol, Ipv4Address};

pub const TYPE_ECHO_REPLY: u8 = 0;
pub const TYPE_ECHO_REQUEST: u8 = 8;

/// Fill byte of the echo payload, used to recognise our own pongs.
pub const PING_PATTERN: u8 = 0x42;
pub const PING_PAYLOAD_LEN: usize = 56;
const ECHO_IDENT_HIGH: u8 = 5;
const ECHO_SEQUENCE: u16 = 1;

/// Total length of an echo request frame.
pub const ECHO_FRAME_LEN: usize = icmp::DATA + PING_PAYLOAD_LEN;

/// Called with the source address of every echo request we answer.
pub type PingCallback = fn(Ipv4Address);

pub fn is_echo_request(frame: &FrameBuffer) -> bool {
    frame.u8_at(ip::PROTOCOL) == IpProtocol::ICMP as u8
        && frame.u8_at(icmp::TYPE) == TYPE_ECHO_REQUEST
}

/// True if the resident frame is a reply to one of our pings from `host`.
pub fn is_echo_reply_from(frame: &FrameBuffer, host: &Ipv4Address) -> bool {
    frame.u8_at(ip::PROTOCOL) == IpProtocol::ICMP as u8
        && frame.u8_at(icmp::TYPE) == TYPE_ECHO_REPLY
        && frame.u8_at(icmp::DATA) == PING_PATTERN
        && frame.ip_at(ip::SRC) == *host
}

/// Build an echo request to `dst` via `next_hop`. Returns the frame length.
pub fn build_echo_request(
    frame: &mut FrameBuffer,
    identity: &NetworkIdentity,
    next_hop: &MacAddress,
    dst: &Ipv4Address,
) -> usize {
    ipv4::set_macs_and_ips(frame, identity, next_hop, dst);
    ipv4::write_header(frame, IpProtocol::ICMP);
    frame.set_u16(ip::TOTAL_LEN, (ECHO_FRAME_LEN - ip::HEADER) as u16);
    ipv4::fill_header_checksum(frame);

    frame.set_u8(icmp::TYPE, TYPE_ECHO_REQUEST);
    frame.set_u8(icmp::CODE, 0);
    frame.set_u16(icmp::CHECKSUM, 0);
    frame.set_u8(icmp::IDENT, ECHO_IDENT_HIGH);
    frame.set_u8(icmp::IDENT + 1, identity.ip().0[3]);
    frame.set_u16(icmp::SEQUENCE, ECHO_SEQUENCE);
    frame.fill(icmp::DATA, PING_PAYLOAD_LEN, PING_PATTERN);
    fill_checksum(
        frame,
        icmp::CHECKSUM,
        icmp::TYPE,
        icmp::HEADER_LEN + PING_PAYLOAD_LEN,
        ChecksumKind::Plain,
    );
    ECHO_FRAME_LEN
}

/// Turn the resident echo request of `len` bytes into its reply.
///
/// Only the type byte changes inside the ICMP message, so the checksum is
/// adjusted by the difference of the two type codes instead of recomputed.
pub fn build_echo_reply_from_request(
    frame: &mut FrameBuffer,
    identity: &NetworkIdentity,
    len: usize,
) -> usize {
    ipv4::mirror_eth_ip(frame, identity);
    frame.set_u8(icmp::TYPE, TYPE_ECHO_REPLY);
    let delta = ((TYPE_ECHO_REQUEST - TYPE_ECHO_REPLY) as u32) << 8;
    let adjusted = fold(frame.u16_at(icmp::CHECKSUM) as u32 + delta);
    frame.set_u16(icmp::CHECKSUM, adjusted);
    len.min(frame.as_bytes().len())
}
