use serde::{Deserialize, Serialize};

use super::address::IpoibAddress;
use super::{IPOIB_DATA_NUM_CQES, IPOIB_DATA_NUM_RECV_WQES, IPOIB_DATA_NUM_SEND_WQES, IPOIB_MTU, IPOIB_REAL_HLEN};
use crate::transport::address::{AddressVector, IB_GRH_LEN};

/// Smallest receive buffer able to hold a Global Route Header followed by an IPoIB header.
pub const IPOIB_MIN_MTU: usize = IB_GRH_LEN + IPOIB_REAL_HLEN;

/// Error returned by [`IpoibConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum InvalidConfigError {
    #[error("mtu {mtu} is below the minimum of {min}")]
    MtuTooSmall { mtu: usize, min: usize },
}

/// Sizes of one queue set.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueSetConfig {
    pub num_cqes: u32,
    pub num_send_wqes: u32,
    pub num_recv_wqes: u32,
}

impl Default for QueueSetConfig {
    fn default() -> Self {
        QueueSetConfig {
            num_cqes: IPOIB_DATA_NUM_CQES,
            num_send_wqes: IPOIB_DATA_NUM_SEND_WQES,
            num_recv_wqes: IPOIB_DATA_NUM_RECV_WQES,
        }
    }
}

/// Everything an IPoIB device needs to know that it cannot learn from the transport.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IpoibConfig {
    /// Queue key of the data queue pair.
    pub qkey: u32,
    /// Address vector used by [`IpoibDevice::transmit`].
    ///
    /// [`IpoibDevice::transmit`]: super::device::IpoibDevice::transmit
    pub broadcast_av: AddressVector,
    /// Data queue set sizes.
    pub data: QueueSetConfig,
    /// Size of each receive buffer, at least [`IPOIB_MIN_MTU`].
    pub mtu: usize,
}

impl Default for IpoibConfig {
    fn default() -> Self {
        let mut broadcast_av = AddressVector::new();
        broadcast_av.setup_dest_gid(&IpoibAddress::BROADCAST.gid);

        IpoibConfig {
            qkey: 0,
            broadcast_av,
            data: QueueSetConfig::default(),
            mtu: IPOIB_MTU,
        }
    }
}

impl IpoibConfig {
    pub fn setup_qkey(&mut self, qkey: u32) -> &mut Self {
        self.qkey = qkey;
        self.broadcast_av.qkey = qkey;
        self
    }

    pub fn setup_broadcast_av(&mut self, av: AddressVector) -> &mut Self {
        self.broadcast_av = av;
        self
    }

    pub fn setup_data_queue_set(&mut self, data: QueueSetConfig) -> &mut Self {
        self.data = data;
        self
    }

    pub fn setup_mtu(&mut self, mtu: usize) -> &mut Self {
        self.mtu = mtu;
        self
    }

    /// Check the values a device cannot run with. Deserialized configs bypass the setters, so
    /// [`IpoibDevice::probe`] calls this before allocating anything.
    ///
    /// [`IpoibDevice::probe`]: super::device::IpoibDevice::probe
    pub fn validate(&self) -> Result<(), InvalidConfigError> {
        if self.mtu < IPOIB_MIN_MTU {
            return Err(InvalidConfigError::MtuTooSmall {
                mtu: self.mtu,
                min: IPOIB_MIN_MTU,
            });
        }
        Ok(())
    }
}
