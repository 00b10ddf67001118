//! The InfiniBand transport capabilities the link layer is built on: completion queues,
//! unreliable datagram queue pairs, posting, polling and multicast attachment.
//!
//! The link layer never talks to hardware itself; it drives a [`Transport`] implementation,
//! which may wrap a verbs provider or an in-memory model of one.
pub mod address;
pub mod completion;
#[cfg(feature = "verbs")]
pub mod verbs;

use std::io;

use crate::netdev::io_buffer::IoBuffer;
use address::{AddressVector, Gid};
use completion::CompletionHandler;

/// Error returned by [`Transport::create_cq`] for creating a new completion queue.
#[derive(Debug, thiserror::Error)]
#[error("failed to create completion queue")]
#[non_exhaustive]
pub struct CreateCompletionQueueError(#[from] pub CreateCompletionQueueErrorKind);

/// The enum type for [`CreateCompletionQueueError`].
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
#[non_exhaustive]
pub enum CreateCompletionQueueErrorKind {
    Transport(#[from] io::Error),
}

/// Error returned by [`Transport::create_qp`] for creating a new queue pair.
#[derive(Debug, thiserror::Error)]
#[error("failed to create queue pair")]
#[non_exhaustive]
pub struct CreateQueuePairError(#[from] pub CreateQueuePairErrorKind);

/// The enum type for [`CreateQueuePairError`].
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
#[non_exhaustive]
pub enum CreateQueuePairErrorKind {
    Transport(#[from] io::Error),
}

/// Error returned by [`Transport::post_send`] for posting a buffer to a send queue.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PostSendError {
    #[error("post send failed")]
    Transport(#[from] io::Error),
    #[error("invalid value provided in queue pair")]
    InvalidQueuePair(#[source] io::Error),
    #[error("send queue is full or not enough resources to complete this operation")]
    NotEnoughResources(#[source] io::Error),
}

/// Error returned by [`Transport::post_recv`] for posting a buffer to a receive queue.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PostRecvError {
    #[error("post receive failed")]
    Transport(#[from] io::Error),
    #[error("invalid value provided in queue pair")]
    InvalidQueuePair(#[source] io::Error),
    #[error("receive queue is full or not enough resources to complete this operation")]
    NotEnoughResources(#[source] io::Error),
}

/// Error returned by [`Transport::mcast_attach`] and [`Transport::mcast_detach`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum MulticastError {
    #[error("failed to attach to multicast group {gid}")]
    Attach { gid: Gid, source: io::Error },
    #[error("failed to detach from multicast group {gid}")]
    Detach { gid: Gid, source: io::Error },
}

/// A queue pair handed out by a [`Transport`].
pub trait QueuePair {
    /// Get the [QueuePair]'s number.
    fn qp_number(&self) -> u32;
}

/// The capability set of an InfiniBand device, as seen by a link-layer driver.
///
/// All methods take `&self`; the driver borrows the transport for its whole lifetime and the
/// transport serializes its own state.
pub trait Transport {
    type CompletionQueue;
    type QueuePair: QueuePair;

    /// Create a completion queue with room for `num_cqes` completions.
    fn create_cq(&self, num_cqes: u32) -> Result<Self::CompletionQueue, CreateCompletionQueueError>;

    fn destroy_cq(&self, cq: Self::CompletionQueue);

    /// Create an unreliable datagram queue pair with `num_send_wqes` send slots completing on
    /// `send_cq` and `num_recv_wqes` receive slots completing on `recv_cq`, accepting datagrams
    /// carrying `qkey`.
    fn create_qp(
        &self, num_send_wqes: u32, send_cq: &Self::CompletionQueue, num_recv_wqes: u32,
        recv_cq: &Self::CompletionQueue, qkey: u32,
    ) -> Result<Self::QueuePair, CreateQueuePairError>;

    /// Destroy a queue pair. Buffers still posted to it are released.
    fn destroy_qp(&self, qp: Self::QueuePair);

    /// Post `iobuf` for transmission to `av`. The buffer comes back through
    /// [`CompletionHandler::complete_send`].
    fn post_send(&self, qp: &Self::QueuePair, av: &AddressVector, iobuf: IoBuffer) -> Result<(), PostSendError>;

    /// Post `iobuf` as a receive buffer. The buffer comes back through
    /// [`CompletionHandler::complete_recv`].
    fn post_recv(&self, qp: &Self::QueuePair, iobuf: IoBuffer) -> Result<(), PostRecvError>;

    /// Drain every pending completion on `cq` into `handler` without blocking. Returns the
    /// number of completions drained.
    fn poll_cq<H: CompletionHandler>(&self, cq: &Self::CompletionQueue, handler: &mut H) -> usize;

    fn mcast_attach(&self, qp: &Self::QueuePair, gid: &Gid) -> Result<(), MulticastError>;

    fn mcast_detach(&self, qp: &Self::QueuePair, gid: &Gid) -> Result<(), MulticastError>;

    /// GID of the local port.
    fn port_gid(&self) -> Gid;

    /// GID of the partition's broadcast multicast group.
    fn broadcast_gid(&self) -> Gid;
}
