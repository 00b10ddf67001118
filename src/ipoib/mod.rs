//! IP over InfiniBand.
//!
//! An [`IpoibDevice`] turns one InfiniBand port into a network device: outgoing frames lose
//! their pseudo-header and go out as unreliable datagrams, incoming datagrams lose their Global
//! Route Header and gain a pseudo-header naming the sender.
pub mod address;
pub mod completion;
pub mod config;
pub mod device;
pub mod header;
pub mod queue_set;

pub use address::IpoibAddress;
pub use config::{IpoibConfig, QueueSetConfig};
pub use device::{DeviceState, IpoibDevice};
pub use header::{IpoibHeader, PseudoHeader, RealHeader};
pub use queue_set::QueueSet;

/// IPoIB MTU, also the size of every receive buffer.
pub const IPOIB_MTU: usize = 2048;

/// Length of an IPoIB link-layer address.
pub const IPOIB_ALEN: usize = 20;

pub const IPOIB_PSEUDO_HLEN: usize = IPOIB_ALEN;

pub const IPOIB_REAL_HLEN: usize = 4;

/// Length of the full in-stack header.
pub const IPOIB_HLEN: usize = IPOIB_PSEUDO_HLEN + IPOIB_REAL_HLEN;

pub const IPOIB_DATA_NUM_SEND_WQES: u32 = 4;

pub const IPOIB_DATA_NUM_RECV_WQES: u32 = 8;

pub const IPOIB_DATA_NUM_CQES: u32 = 8;

/// ARP hardware type for InfiniBand.
pub const ARPHRD_INFINIBAND: u16 = 32;

/// The IPoIB link-layer protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ipoib;
