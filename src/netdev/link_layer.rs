//! The link-layer protocol interface. A link type implements [`LinkLayerProtocol`] once and is
//! selected at compile time as the type parameter of a [`NetDevice`].
//!
//! [`NetDevice`]: super::NetDevice
use std::fmt;

use super::io_buffer::IoBuffer;

/// Error returned by [`LinkLayerProtocol::rx`] and by receive completions that cannot carry a
/// valid frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum FrameError {
    #[error("frame too short ({len} bytes, need at least {required})")]
    TooShort { len: usize, required: usize },
    #[error("frame too long ({len} bytes, only {room} bytes of room)")]
    TooLong { len: usize, room: usize },
}

/// A frame with its link-layer header stripped, ready for the network layer.
#[derive(Debug)]
pub struct ReceivedFrame<A> {
    /// The network-layer payload.
    pub iobuf: IoBuffer,
    /// Network-layer protocol number, in host byte order.
    pub net_proto: u16,
    /// Link-layer address of the sender.
    pub ll_source: A,
}

/// A link-layer protocol: header construction, header parsing and address presentation.
pub trait LinkLayerProtocol {
    /// The link-layer address type.
    type Address: Copy + Eq + fmt::Debug + fmt::Display;

    /// Protocol name.
    const NAME: &'static str;
    /// ARP hardware type, in host byte order.
    const LL_PROTO: u16;
    /// Length of a link-layer address in bytes.
    const LL_ADDR_LEN: usize;
    /// Length of the link-layer header in bytes.
    const LL_HEADER_LEN: usize;

    /// The address that reaches every peer on the link.
    fn broadcast() -> &'static Self::Address;

    /// Prepend the link-layer header for `ll_dest` and `net_proto` (host byte order).
    ///
    /// # Panics
    ///
    /// The caller must have reserved at least [`Self::LL_HEADER_LEN`] bytes of headroom.
    fn tx(iobuf: IoBuffer, ll_dest: &Self::Address, net_proto: u16) -> IoBuffer;

    /// Strip the link-layer header. A malformed frame is dropped and reported.
    fn rx(iobuf: IoBuffer) -> Result<ReceivedFrame<Self::Address>, FrameError>;

    /// Render an address in human-readable form.
    fn ntoa(ll_addr: &Self::Address) -> String {
        ll_addr.to_string()
    }
}
