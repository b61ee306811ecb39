//! NIC boundary
//!
//! The chip driver is an external collaborator: the stack only needs to poll
//! it for a received frame and hand it a finished frame to send.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetError {
    /// Driver could not queue the frame.
    TxBusy,
    LinkDown,
    /// The next-hop MAC for the destination has not been resolved yet.
    MustResolveFirst,
    /// No UDP datagram is resident in the frame buffer.
    NoResidentFrame,
    /// `udp_transmit` without a preceding `udp_prepare`.
    NotPrepared,
    InvalidAddress,
    UnknownDirective,
    NotInitialized,
    /// The global endpoint is locked, e.g. by a callback running under `poll`.
    Busy,
    AlreadyInitialized,
    TooManyListeners,
}

/// Raw frame primitives of an Ethernet controller.
pub trait NicDriver {
    /// Copy a pending frame into `buf` and return its length, 0 if none.
    ///
    /// Frames longer than `buf` must be truncated to `buf.len()`.
    fn receive(&mut self, buf: &mut [u8]) -> usize;

    /// Send `frame` as one Ethernet frame.
    fn transmit(&mut self, frame: &[u8]) -> Result<(), NetError>;

    fn is_link_up(&self) -> bool {
        true
    }
}
