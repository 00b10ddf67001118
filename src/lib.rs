//! IP over InfiniBand link layer.
//!
//! The crate is split the way the data flows:
//!
//! - [`transport`]: the InfiniBand capabilities a driver needs (queues, posting, polling,
//!   multicast), expressed as the [`Transport`](transport::Transport) trait.
//! - [`netdev`]: the network-device framework contract, I/O buffers and link-layer protocols.
//! - [`ipoib`]: the IPoIB link-layer protocol and the [`IpoibDevice`](ipoib::IpoibDevice) driver
//!   tying the other two together.

pub mod ipoib;

pub mod netdev;

pub mod transport;
