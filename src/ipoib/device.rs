//! The IPoIB network device: probe, open, poll, transmit, close and remove.
use std::{fmt, io};

use super::address::IpoibAddress;
use super::completion::DataCompletionHandler;
use super::config::{InvalidConfigError, IpoibConfig};
use super::queue_set::{CreateQueueSetError, QueueSet};
use super::{Ipoib, IPOIB_PSEUDO_HLEN};
use crate::netdev::io_buffer::IoBuffer;
use crate::netdev::{NetDevice, NetDeviceFramework, NetDeviceOperations, NetDeviceState, RegisterNetDeviceError};
use crate::transport::address::AddressVector;
use crate::transport::{MulticastError, PostSendError, Transport};

/// Error returned by [`IpoibDevice::probe`].
#[derive(Debug, thiserror::Error)]
#[error("failed to probe IPoIB device")]
#[non_exhaustive]
pub struct ProbeError(#[from] pub ProbeErrorKind);

/// The enum type for [`ProbeError`].
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
#[non_exhaustive]
pub enum ProbeErrorKind {
    InvalidConfig(#[from] InvalidConfigError),
    CreateQueueSet(#[from] CreateQueueSetError),
    Register(#[from] RegisterNetDeviceError),
}

/// Error returned by [`IpoibDevice`]'s [`NetDeviceOperations::open`].
#[derive(Debug, thiserror::Error)]
#[error("failed to open IPoIB device")]
#[non_exhaustive]
pub struct OpenError(#[from] pub OpenErrorKind);

/// The enum type for [`OpenError`].
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
#[non_exhaustive]
pub enum OpenErrorKind {
    Multicast(#[from] MulticastError),
}

/// Error returned by [`IpoibDevice`]'s [`NetDeviceOperations::close`].
#[derive(Debug, thiserror::Error)]
#[error("failed to close IPoIB device")]
#[non_exhaustive]
pub struct CloseError(#[from] pub CloseErrorKind);

/// The enum type for [`CloseError`].
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
#[non_exhaustive]
pub enum CloseErrorKind {
    Multicast(#[from] MulticastError),
}

/// Error returned by [`IpoibDevice::transmit_to`] and [`NetDeviceOperations::transmit`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransmitError {
    #[error("device is not open")]
    NotOpen,
    #[error("buffer too short ({len} bytes, need at least {required})")]
    InvalidArgument {
        len: usize,
        required: usize,
        source: io::Error,
    },
    #[error("post send failed")]
    PostSend(#[from] PostSendError),
}

/// Where an [`IpoibDevice`] is in its life. Removal consumes the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Registered, never opened.
    Probed,
    Open,
    Closed,
}

/// An IPoIB network device bound to one InfiniBand transport.
pub struct IpoibDevice<'a, T: Transport, F: NetDeviceFramework<Ipoib>> {
    netdev: NetDevice<Ipoib>,
    ibdev: &'a T,
    framework: &'a F,
    config: IpoibConfig,
    data: QueueSet<'a, T>,
    // reserved for control traffic, never populated
    meta: QueueSet<'a, T>,
    state: DeviceState,
}

impl<'a, T: Transport, F: NetDeviceFramework<Ipoib>> IpoibDevice<'a, T, F> {
    /// Validate `config`, create the data queue set, derive the link-layer address from it and
    /// register the network device. Nothing stays allocated or registered on failure.
    pub fn probe(ibdev: &'a T, framework: &'a F, config: IpoibConfig) -> Result<Self, ProbeError> {
        config.validate().map_err(|err| {
            tracing::debug!("IPoIB rejected configuration: {err}");
            ProbeErrorKind::InvalidConfig(err)
        })?;

        let data = QueueSet::create(
            ibdev,
            config.data.num_cqes,
            config.data.num_send_wqes,
            config.data.num_recv_wqes,
            config.qkey,
        )
        .map_err(|err| {
            tracing::debug!("IPoIB could not allocate data queue set: {err}");
            ProbeErrorKind::CreateQueueSet(err)
        })?;

        // a freshly created queue set always holds a queue pair
        let ll_addr = IpoibAddress::new(data.qp_number().unwrap_or_default(), ibdev.port_gid());

        let mut ipoib = IpoibDevice {
            netdev: NetDevice::new(ll_addr),
            ibdev,
            framework,
            config,
            data,
            meta: QueueSet::empty(ibdev),
            state: DeviceState::Probed,
        };

        // dropping `ipoib` tears the queue sets down
        framework.register_netdev(&ipoib.netdev).map_err(|err| {
            tracing::debug!("IPoIB {ll_addr} could not register network device: {err}");
            ProbeErrorKind::Register(err)
        })?;
        ipoib.netdev.set_state(NetDeviceState::Registered);

        tracing::debug!("IPoIB {ll_addr} probed");
        Ok(ipoib)
    }

    /// Unregister the network device and release everything it holds.
    ///
    /// An open device is closed first, and completions still pending are handled before the
    /// queue pair goes away.
    pub fn remove(mut self) {
        self.shutdown();
    }

    /// Transmit a frame starting with a pseudo-header to an explicit address vector.
    pub fn transmit_to(&mut self, mut iobuf: IoBuffer, av: &AddressVector) -> Result<(), TransmitError> {
        if self.state != DeviceState::Open {
            return Err(TransmitError::NotOpen);
        }
        if iobuf.len() < IPOIB_PSEUDO_HLEN {
            tracing::debug!("IPoIB {} buffer too short", self.ll_addr());
            return Err(TransmitError::InvalidArgument {
                len: iobuf.len(),
                required: IPOIB_PSEUDO_HLEN,
                source: io::Error::from_raw_os_error(libc::EINVAL),
            });
        }

        iobuf.pull(IPOIB_PSEUDO_HLEN);
        Ok(self.data.post_send(av, iobuf)?)
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn netdev(&self) -> &NetDevice<Ipoib> {
        &self.netdev
    }

    /// The link-layer address derived at probe time.
    pub fn ll_addr(&self) -> &IpoibAddress {
        self.netdev.ll_addr()
    }

    pub fn config(&self) -> &IpoibConfig {
        &self.config
    }

    pub fn data_queue_set(&self) -> &QueueSet<'a, T> {
        &self.data
    }

    pub fn meta_queue_set(&self) -> &QueueSet<'a, T> {
        &self.meta
    }

    fn drain_completions(&mut self) -> usize {
        let netdev = &self.netdev;
        let framework = self.framework;
        self.data
            .poll(|recv_fill| DataCompletionHandler::new(netdev, framework, recv_fill))
    }

    fn refill_recv(&mut self) -> u32 {
        let framework = self.framework;
        self.data.refill(self.config.mtu, |len| framework.alloc_iob(len))
    }

    fn shutdown(&mut self) {
        if self.state == DeviceState::Open {
            if let Err(err) = NetDeviceOperations::close(self) {
                tracing::warn!("IPoIB {} still attached at removal: {err}", self.ll_addr());
            }
            self.state = DeviceState::Closed;
            self.netdev.clear_state(NetDeviceState::Open);
        }

        if self.netdev.is_registered() {
            let drained = self.drain_completions();
            if drained > 0 {
                tracing::debug!("IPoIB {} drained {drained} completions before removal", self.ll_addr());
            }
            self.framework.unregister_netdev(&self.netdev);
            self.netdev.clear_state(NetDeviceState::Registered);
        }

        self.data.destroy();
        self.meta.destroy();
    }
}

impl<T: Transport, F: NetDeviceFramework<Ipoib>> NetDeviceOperations for IpoibDevice<'_, T, F> {
    type LinkLayer = Ipoib;
    type OpenError = OpenError;
    type CloseError = CloseError;
    type TransmitError = TransmitError;

    /// Attach to the broadcast group and fill the receive ring.
    fn open(&mut self) -> Result<(), OpenError> {
        if self.state == DeviceState::Open {
            return Ok(());
        }

        self.data.mcast_attach(&self.ibdev.broadcast_gid()).map_err(|err| {
            tracing::debug!("IPoIB {} could not attach to broadcast GID: {err}", self.ll_addr());
            OpenErrorKind::Multicast(err)
        })?;

        self.state = DeviceState::Open;
        self.netdev.set_state(NetDeviceState::Open);
        self.refill_recv();

        Ok(())
    }

    /// Detach from the broadcast group. Posted receive buffers stay posted for the next open.
    fn close(&mut self) -> Result<(), CloseError> {
        if self.state != DeviceState::Open {
            return Ok(());
        }

        self.data.mcast_detach(&self.ibdev.broadcast_gid()).map_err(|err| {
            tracing::debug!("IPoIB {} could not detach from broadcast GID: {err}", self.ll_addr());
            CloseErrorKind::Multicast(err)
        })?;

        self.state = DeviceState::Closed;
        self.netdev.clear_state(NetDeviceState::Open);

        Ok(())
    }

    /// Transmit to the configured broadcast address vector.
    fn transmit(&mut self, iobuf: IoBuffer) -> Result<(), TransmitError> {
        let av = self.config.broadcast_av;
        self.transmit_to(iobuf, &av)
    }

    fn poll(&mut self) -> usize {
        if self.state != DeviceState::Open {
            return 0;
        }

        let drained = self.drain_completions();
        self.refill_recv();
        drained
    }

    fn irq(&mut self, _enable: bool) {
        // No implementation
    }
}

impl<T: Transport, F: NetDeviceFramework<Ipoib>> Drop for IpoibDevice<'_, T, F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T: Transport, F: NetDeviceFramework<Ipoib>> fmt::Debug for IpoibDevice<'_, T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IpoibDevice")
            .field("ll_addr", &self.ll_addr().to_string())
            .field("state", &self.state)
            .field("data", &self.data)
            .finish()
    }
}
