pub mod io_buffer;
pub mod link_layer;

use std::io;

use bitmask_enum::bitmask;

use crate::transport::completion::WorkCompletionStatus;
use io_buffer::IoBuffer;
use link_layer::{FrameError, LinkLayerProtocol};

/// Error returned by [`NetDeviceFramework::register_netdev`].
#[derive(Debug, thiserror::Error)]
#[error("failed to register network device")]
#[non_exhaustive]
pub struct RegisterNetDeviceError(#[from] pub RegisterNetDeviceErrorKind);

/// The enum type for [`RegisterNetDeviceError`].
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
#[non_exhaustive]
pub enum RegisterNetDeviceErrorKind {
    Framework(#[from] io::Error),
}

/// Per-packet failure reported upward through [`NetDeviceFramework::netdev_tx_complete`] and
/// [`NetDeviceFramework::netdev_rx_err`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum NetDeviceError {
    #[error("work completion failed with status {status:?}")]
    Transport {
        status: WorkCompletionStatus,
        source: io::Error,
    },
    #[error("malformed receive completion")]
    Frame(#[from] FrameError),
}

impl NetDeviceError {
    /// A transport I/O failure (`EIO`) carrying the completion's error syndrome.
    pub fn transport(status: WorkCompletionStatus) -> Self {
        NetDeviceError::Transport {
            status,
            source: io::Error::from_raw_os_error(libc::EIO),
        }
    }
}

/// State flags of a [`NetDevice`].
#[bitmask(u8)]
#[bitmask_config(vec_debug)]
pub enum NetDeviceState {
    Registered,
    Open,
}

/// The framework-facing half of a network device: its link-layer address and state.
#[derive(Debug)]
pub struct NetDevice<L: LinkLayerProtocol> {
    ll_addr: L::Address,
    state: NetDeviceState,
}

impl<L: LinkLayerProtocol> NetDevice<L> {
    /// Create a network device with its permanent link-layer address.
    pub fn new(ll_addr: L::Address) -> Self {
        NetDevice {
            ll_addr,
            state: NetDeviceState::none(),
        }
    }

    pub fn ll_addr(&self) -> &L::Address {
        &self.ll_addr
    }

    pub fn state(&self) -> NetDeviceState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.contains(NetDeviceState::Open)
    }

    pub fn is_registered(&self) -> bool {
        self.state.contains(NetDeviceState::Registered)
    }

    pub(crate) fn set_state(&mut self, flags: NetDeviceState) {
        self.state |= flags;
    }

    pub(crate) fn clear_state(&mut self, flags: NetDeviceState) {
        self.state &= !flags;
    }
}

/// What a network-device framework offers to a driver.
pub trait NetDeviceFramework<L: LinkLayerProtocol> {
    /// Allocate a buffer of `len` bytes, `None` when memory is exhausted.
    fn alloc_iob(&self, len: usize) -> Option<IoBuffer> {
        Some(IoBuffer::new(len))
    }

    /// Make `netdev` visible to the network stack.
    fn register_netdev(&self, netdev: &NetDevice<L>) -> Result<(), RegisterNetDeviceError>;

    fn unregister_netdev(&self, netdev: &NetDevice<L>);

    /// Hand a received frame (link-layer header included) to the network stack, which strips it
    /// with [`LinkLayerProtocol::rx`].
    fn netdev_rx(&self, netdev: &NetDevice<L>, iobuf: IoBuffer);

    /// Report the outcome of a transmission and give the buffer back.
    fn netdev_tx_complete(&self, netdev: &NetDevice<L>, iobuf: IoBuffer, result: Result<(), NetDeviceError>);

    /// Report a failed reception.
    fn netdev_rx_err(&self, netdev: &NetDevice<L>, iobuf: Option<IoBuffer>, err: NetDeviceError);
}

/// What a driver offers to a network-device framework.
pub trait NetDeviceOperations {
    type LinkLayer: LinkLayerProtocol;
    type OpenError: std::error::Error;
    type CloseError: std::error::Error;
    type TransmitError: std::error::Error;

    /// Bring the device up.
    fn open(&mut self) -> Result<(), Self::OpenError>;

    /// Take the device down.
    fn close(&mut self) -> Result<(), Self::CloseError>;

    /// Transmit a frame that already carries its link-layer header.
    fn transmit(&mut self, iobuf: IoBuffer) -> Result<(), Self::TransmitError>;

    /// Process pending completions without blocking, returns how many were handled.
    fn poll(&mut self) -> usize;

    /// Enable or disable interrupts.
    fn irq(&mut self, enable: bool);

    /// Build the link-layer header for `ll_dest` and transmit.
    fn net_tx(
        &mut self, iobuf: IoBuffer, ll_dest: &<Self::LinkLayer as LinkLayerProtocol>::Address, net_proto: u16,
    ) -> Result<(), Self::TransmitError> {
        self.transmit(Self::LinkLayer::tx(iobuf, ll_dest, net_proto))
    }
}
