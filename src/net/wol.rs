//! Wake-on-LAN magic packet

use super::ethernet::MacAddress;
use super::frame::FrameBuffer;
use super::identity::NetworkIdentity;
use super::ipv4::Ipv4Address;
use super::udp::{self, Port};

pub const WOL_PORT: Port = 9;
/// Any source port works; receivers only look at the payload.
const WOL_SOURCE_PORT: Port = 0x0A42;
const MAC_REPEAT: usize = 16;

/// Sync stream followed by the target MAC sixteen times.
pub const MAGIC_PAYLOAD_LEN: usize = 6 + 6 * MAC_REPEAT;

/// Broadcast a magic packet waking `target`. Returns the frame length.
pub fn build_magic_packet(
    frame: &mut FrameBuffer,
    identity: &NetworkIdentity,
    target: &MacAddress,
) -> usize {
    udp::prepare(
        frame,
        identity,
        &MacAddress::BROADCAST,
        WOL_SOURCE_PORT,
        &Ipv4Address::BROADCAST,
        WOL_PORT,
    );

    let payload = udp::payload_mut(frame);
    payload[..6].copy_from_slice(MacAddress::BROADCAST.as_bytes());
    for chunk in payload[6..MAGIC_PAYLOAD_LEN].chunks_exact_mut(6) {
        chunk.copy_from_slice(target.as_bytes());
    }

    udp::finish(frame, MAGIC_PAYLOAD_LEN)
}
