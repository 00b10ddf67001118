//! A [`QueueSet`] is one completion queue and one queue pair completing on it, plus the fill
//! level of the queue pair's receive ring.
use std::{fmt, io};

use crate::netdev::io_buffer::IoBuffer;
use crate::transport::address::{AddressVector, Gid};
use crate::transport::completion::CompletionHandler;
use crate::transport::{
    CreateCompletionQueueError, CreateQueuePairError, MulticastError, PostSendError, QueuePair, Transport,
};

/// Error returned by [`QueueSet::create`].
#[derive(Debug, thiserror::Error)]
#[error("failed to create queue set")]
#[non_exhaustive]
pub struct CreateQueueSetError(#[from] pub CreateQueueSetErrorKind);

/// The enum type for [`CreateQueueSetError`].
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
#[non_exhaustive]
pub enum CreateQueueSetErrorKind {
    CompletionQueue(#[from] CreateCompletionQueueError),
    QueuePair(#[from] CreateQueuePairError),
}

/// A completion queue, a queue pair bound to it, and the receive ring fill level.
///
/// Dropping a queue set destroys whatever it still holds.
pub struct QueueSet<'ib, T: Transport> {
    ibdev: &'ib T,
    cq: Option<T::CompletionQueue>,
    qp: Option<T::QueuePair>,
    recv_fill: u32,
    recv_max_fill: u32,
}

impl<'ib, T: Transport> QueueSet<'ib, T> {
    /// A queue set holding nothing.
    pub fn empty(ibdev: &'ib T) -> Self {
        QueueSet {
            ibdev,
            cq: None,
            qp: None,
            recv_fill: 0,
            recv_max_fill: 0,
        }
    }

    /// Create a completion queue of `num_cqes` entries and a queue pair with `num_send_wqes` send
    /// and `num_recv_wqes` receive slots completing on it. Nothing is left allocated on failure.
    pub fn create(
        ibdev: &'ib T, num_cqes: u32, num_send_wqes: u32, num_recv_wqes: u32, qkey: u32,
    ) -> Result<Self, CreateQueueSetError> {
        let mut qset = QueueSet::empty(ibdev);
        qset.recv_max_fill = num_recv_wqes;

        let cq = ibdev.create_cq(num_cqes).map_err(|err| {
            tracing::debug!("IPoIB could not allocate completion queue: {err}");
            CreateQueueSetErrorKind::CompletionQueue(err)
        })?;
        let cq: &T::CompletionQueue = qset.cq.insert(cq);

        // on failure `qset` is dropped here, which releases the completion queue
        let qp = ibdev.create_qp(num_send_wqes, cq, num_recv_wqes, cq, qkey).map_err(|err| {
            tracing::debug!("IPoIB could not allocate queue pair: {err}");
            CreateQueueSetErrorKind::QueuePair(err)
        })?;
        qset.qp = Some(qp);

        Ok(qset)
    }

    /// Destroy the queue pair, then the completion queue, and reset the fill levels. Safe to
    /// call on an empty or partially built queue set.
    pub fn destroy(&mut self) {
        if let Some(qp) = self.qp.take() {
            self.ibdev.destroy_qp(qp);
        }
        if let Some(cq) = self.cq.take() {
            self.ibdev.destroy_cq(cq);
        }
        self.recv_fill = 0;
        self.recv_max_fill = 0;
    }

    pub fn cq(&self) -> Option<&T::CompletionQueue> {
        self.cq.as_ref()
    }

    pub fn qp(&self) -> Option<&T::QueuePair> {
        self.qp.as_ref()
    }

    pub fn qp_number(&self) -> Option<u32> {
        self.qp.as_ref().map(QueuePair::qp_number)
    }

    /// Number of receive buffers currently posted.
    pub fn recv_fill(&self) -> u32 {
        self.recv_fill
    }

    pub fn recv_max_fill(&self) -> u32 {
        self.recv_max_fill
    }

    /// Whether the queue set holds neither a queue pair nor a completion queue.
    pub fn is_empty(&self) -> bool {
        self.cq.is_none() && self.qp.is_none()
    }

    /// Top the receive ring up with `len`-byte buffers from `alloc_iob`.
    ///
    /// Stops quietly at the first allocation or post failure; the next refill tries again.
    /// Returns the number of buffers posted.
    pub fn refill<A>(&mut self, len: usize, mut alloc_iob: A) -> u32
    where
        A: FnMut(usize) -> Option<IoBuffer>,
    {
        let Some(qp) = self.qp.as_ref() else {
            return 0;
        };
        let mut posted = 0;

        while self.recv_fill < self.recv_max_fill {
            let Some(iobuf) = alloc_iob(len) else {
                tracing::trace!("IPoIB receive ring refill stopped: out of buffers");
                break;
            };
            // the transport owns and drops a rejected buffer
            if let Err(err) = self.ibdev.post_recv(qp, iobuf) {
                tracing::trace!("IPoIB receive ring refill stopped: {err}");
                break;
            }
            self.recv_fill += 1;
            posted += 1;
        }

        posted
    }

    /// Drain the completion queue into the handler `build` makes around the receive fill
    /// counter. Returns the number of completions drained.
    pub fn poll<'s, H, B>(&'s mut self, build: B) -> usize
    where
        H: CompletionHandler,
        B: FnOnce(&'s mut u32) -> H,
    {
        let ibdev = self.ibdev;
        let Some(cq) = self.cq.as_ref() else {
            return 0;
        };
        let mut handler = build(&mut self.recv_fill);
        ibdev.poll_cq(cq, &mut handler)
    }

    pub fn post_send(&self, av: &AddressVector, iobuf: IoBuffer) -> Result<(), PostSendError> {
        match self.qp.as_ref() {
            Some(qp) => self.ibdev.post_send(qp, av, iobuf),
            None => Err(PostSendError::InvalidQueuePair(io::Error::from_raw_os_error(libc::ENODEV))),
        }
    }

    pub fn mcast_attach(&self, gid: &Gid) -> Result<(), MulticastError> {
        match self.qp.as_ref() {
            Some(qp) => self.ibdev.mcast_attach(qp, gid),
            None => Err(MulticastError::Attach {
                gid: *gid,
                source: io::Error::from_raw_os_error(libc::ENODEV),
            }),
        }
    }

    pub fn mcast_detach(&self, gid: &Gid) -> Result<(), MulticastError> {
        match self.qp.as_ref() {
            Some(qp) => self.ibdev.mcast_detach(qp, gid),
            None => Err(MulticastError::Detach {
                gid: *gid,
                source: io::Error::from_raw_os_error(libc::ENODEV),
            }),
        }
    }
}

impl<T: Transport> Drop for QueueSet<'_, T> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<T: Transport> fmt::Debug for QueueSet<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueSet")
            .field("qpn", &self.qp_number())
            .field("has_cq", &self.cq.is_some())
            .field("recv_fill", &self.recv_fill)
            .field("recv_max_fill", &self.recv_max_fill)
            .finish()
    }
}
