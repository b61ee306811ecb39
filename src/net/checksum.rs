/// Internet checksum (RFC 1071)
///
/// UDP and TCP checksums are computed over a range that starts at the IP
/// source address, so the addresses of the pseudo-header are summed in place
/// and only protocol and transport length are added as a seed.
use super::frame::FrameBuffer;
use super::ipv4::IpProtocol;

/// Which pseudo-header seed to add before summing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    Plain,
    Udp,
    Tcp,
}

impl ChecksumKind {
    /// `len` covers both IP addresses (8 bytes) plus the transport segment.
    fn seed(self, len: usize) -> u32 {
        let segment_len = len.saturating_sub(8) as u32;
        match self {
            ChecksumKind::Plain => 0,
            ChecksumKind::Udp => IpProtocol::UDP as u32 + segment_len,
            ChecksumKind::Tcp => IpProtocol::TCP as u32 + segment_len,
        }
    }
}

/// One's-complement sum of `data` added to `initial`, not yet folded.
pub fn sum_words(data: &[u8], initial: u32) -> u32 {
    let mut sum = initial;
    let mut chunks = data.chunks_exact(2);
    for chunk in chunks.by_ref() {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }
    if let Some(&byte) = chunks.remainder().first() {
        sum += (byte as u32) << 8;
    }
    sum
}

pub fn fold(mut sum: u32) -> u16 {
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum as u16
}

pub fn checksum(data: &[u8], seed: u32) -> u16 {
    !fold(sum_words(data, seed))
}

/// True when `data`, checksum field included, sums to all ones.
pub fn verify(data: &[u8], seed: u32) -> bool {
    fold(sum_words(data, seed)) == 0xFFFF
}

/// Checksum `len` bytes at `offset` and store the result at `dest`.
///
/// The destination field must already be zero if it lies inside the range.
pub fn fill_checksum(
    frame: &mut FrameBuffer,
    dest: usize,
    offset: usize,
    len: usize,
    kind: ChecksumKind,
) {
    let value = checksum(frame.slice(offset, len), kind.seed(len));
    frame.set_u16(dest, value);
}

/// Verify `len` bytes at `offset` using the same seeding as `fill_checksum`.
pub fn verify_range(frame: &FrameBuffer, offset: usize, len: usize, kind: ChecksumKind) -> bool {
    verify(frame.slice(offset, len), kind.seed(len))
}
