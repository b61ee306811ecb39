//! micronet network stack
//!
//! A single-buffer Ethernet endpoint. Protocol modules are selected with
//! feature flags:
//!
//! - `net_icmp` - answer pings, send echo requests
//! - `net_udp` - UDP send/reply and the listener table
//! - `net_wol` - Wake-on-LAN magic packets (requires `net_udp`)
//!
//! ARP and IPv4 are always built. The crate-level instance behind
//! [`init`]/[`poll`] is optional; a [`NetStack`] can also be owned directly.

use core::sync::atomic::{AtomicBool, Ordering};
use spin::Mutex;

use crate::config::NetConfig;
use crate::{logger, ndebug, ninfo};

pub mod arp;
pub mod checksum;
pub mod drivers;
pub mod ethernet;
pub mod frame;

#[cfg(feature = "net_icmp")]
pub mod icmp;
#[cfg(not(feature = "net_icmp"))]
pub mod icmp {
    //! ICMP stub module (feature disabled)
}

pub mod identity;
pub mod ipv4;
pub mod stack;

#[cfg(feature = "net_udp")]
pub mod udp;
#[cfg(not(feature = "net_udp"))]
pub mod udp {
    //! UDP stub module (feature disabled)
}

#[cfg(feature = "net_wol")]
pub mod wol;
#[cfg(not(feature = "net_wol"))]
pub mod wol {
    //! Wake-on-LAN stub module (feature disabled)
}

pub use drivers::{NetError, NicDriver};
pub use stack::{Dispatch, NetStack};

/// Driver handed over at [`init`].
pub type StaticNic = &'static mut (dyn NicDriver + Send);

struct NetState {
    stack: NetStack,
    nic: Option<StaticNic>,
}

impl NetState {
    const fn new() -> Self {
        Self {
            stack: NetStack::new(),
            nic: None,
        }
    }
}

static NET_STATE: Mutex<NetState> = Mutex::new(NetState::new());

static NET_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Bring up the global endpoint on `nic`. Only the first call succeeds.
pub fn init(nic: StaticNic, config: &NetConfig) -> Result<(), NetError> {
    if NET_INITIALIZED.swap(true, Ordering::SeqCst) {
        ndebug!("[net::init] Already initialized");
        return Err(NetError::AlreadyInitialized);
    }

    if let Some(level) = config.log_level {
        logger::set_max_level(level);
    }

    let mut state = NET_STATE.lock();
    state.stack.configure(config);
    if !nic.is_link_up() {
        ninfo!("net: link down, gateway lookup deferred");
    }
    state.nic = Some(nic);
    Ok(())
}

pub fn is_initialized() -> bool {
    NET_INITIALIZED.load(Ordering::SeqCst)
}

/// Run one pass of the packet loop on the global endpoint.
///
/// Ping and UDP callbacks run with the global lock held; from inside one,
/// [`poll`] and [`with_net_stack`] fail with [`NetError::Busy`].
pub fn poll() -> Result<Dispatch, NetError> {
    with_net_stack(|stack, nic| stack.poll(nic))
}

/// Access the global endpoint together with its driver.
///
/// Not re-entrant: a nested call returns [`NetError::Busy`] instead of
/// spinning on the lock it already holds.
pub fn with_net_stack<F, R>(f: F) -> Result<R, NetError>
where
    F: FnOnce(&mut NetStack, &mut dyn NicDriver) -> R,
{
    let mut guard = NET_STATE.try_lock().ok_or(NetError::Busy)?;
    let state = &mut *guard;
    let nic = state.nic.as_deref_mut().ok_or(NetError::NotInitialized)?;
    Ok(f(&mut state.stack, nic))
}
