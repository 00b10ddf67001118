//! Completion handling for the data queue set.
use super::address::IpoibAddress;
use super::header::PseudoHeader;
use super::{Ipoib, IPOIB_PSEUDO_HLEN};
use crate::netdev::io_buffer::IoBuffer;
use crate::netdev::link_layer::FrameError;
use crate::netdev::{NetDevice, NetDeviceError, NetDeviceFramework};
use crate::transport::address::{Gid, IB_GRH_LEN};
use crate::transport::completion::{Completion, CompletionHandler};

/// Turns data queue pair completions into network device notifications.
///
/// Everything a completion needs to reach its device travels in here, rather than being looked
/// up from the queue pair.
pub struct DataCompletionHandler<'a, F> {
    netdev: &'a NetDevice<Ipoib>,
    framework: &'a F,
    recv_fill: &'a mut u32,
}

impl<'a, F: NetDeviceFramework<Ipoib>> DataCompletionHandler<'a, F> {
    pub fn new(netdev: &'a NetDevice<Ipoib>, framework: &'a F, recv_fill: &'a mut u32) -> Self {
        DataCompletionHandler {
            netdev,
            framework,
            recv_fill,
        }
    }
}

impl<F: NetDeviceFramework<Ipoib>> CompletionHandler for DataCompletionHandler<'_, F> {
    fn complete_send(&mut self, completion: Completion, iobuf: IoBuffer) {
        let result = if completion.is_error() {
            tracing::trace!("IPoIB send completion failed: {:?}", completion.status);
            Err(NetDeviceError::transport(completion.status))
        } else {
            Ok(())
        };

        self.framework.netdev_tx_complete(self.netdev, iobuf, result);
    }

    fn complete_recv(&mut self, completion: Completion, mut iobuf: IoBuffer) {
        if completion.is_error() {
            tracing::trace!("IPoIB receive completion failed: {:?}", completion.status);
            self.framework
                .netdev_rx_err(self.netdev, Some(iobuf), NetDeviceError::transport(completion.status));
        } else {
            match strip_grh(&completion, &mut iobuf) {
                Ok(()) => self.framework.netdev_rx(self.netdev, iobuf),
                Err(err) => {
                    tracing::debug!("IPoIB dropping malformed receive completion: {err}");
                    self.framework.netdev_rx_err(self.netdev, Some(iobuf), err.into());
                },
            }
        }

        *self.recv_fill = self.recv_fill.saturating_sub(1);
    }
}

/// Claim the received bytes and trim the Global Route Header down to a pseudo-header naming the
/// sender.
fn strip_grh(completion: &Completion, iobuf: &mut IoBuffer) -> Result<(), FrameError> {
    let len = completion.byte_len as usize;

    if len > iobuf.tailroom() {
        return Err(FrameError::TooLong {
            len,
            room: iobuf.tailroom(),
        });
    }
    if len < IB_GRH_LEN {
        return Err(FrameError::TooShort {
            len,
            required: IB_GRH_LEN,
        });
    }

    iobuf.put(len);
    let sgid = Gid::from_grh_source(iobuf.data()).unwrap_or_default();
    iobuf.pull(IB_GRH_LEN - IPOIB_PSEUDO_HLEN);

    PseudoHeader {
        peer: IpoibAddress::new(completion.src_qp, sgid),
    }
    .write(iobuf.data_mut());

    Ok(())
}
