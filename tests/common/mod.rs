//! In-memory transport and framework used by the integration tests.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;

use ipoib::ipoib::{Ipoib, IpoibAddress};
use ipoib::netdev::io_buffer::IoBuffer;
use ipoib::netdev::link_layer::{LinkLayerProtocol, ReceivedFrame};
use ipoib::netdev::{NetDevice, NetDeviceError, NetDeviceFramework, RegisterNetDeviceError, RegisterNetDeviceErrorKind};
use ipoib::transport::address::{AddressVector, Gid, IB_GRH_LEN, IB_GRH_SGID_OFFSET};
use ipoib::transport::completion::{Completion, CompletionHandler, WorkCompletionStatus};
use ipoib::transport::{
    CreateCompletionQueueError, CreateCompletionQueueErrorKind, CreateQueuePairError, CreateQueuePairErrorKind,
    MulticastError, PostRecvError, PostSendError, QueuePair, Transport,
};

pub const PORT_GID: Gid = Gid {
    raw: [0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0x02, 0xc9, 0x03, 0x00, 0x0a, 0xbc, 0xde],
};

/// Lay `frame` out behind a Global Route Header naming `sgid` as its source.
pub fn grh_frame(sgid: &Gid, frame: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0u8; IB_GRH_LEN + frame.len()];
    bytes[0] = 0x60;
    bytes[IB_GRH_SGID_OFFSET..IB_GRH_SGID_OFFSET + 16].copy_from_slice(&sgid.raw);
    bytes[IB_GRH_LEN..].copy_from_slice(frame);
    bytes
}

#[derive(Debug)]
pub struct MockCompletionQueue {
    id: u32,
}

#[derive(Debug)]
pub struct MockQueuePair {
    qpn: u32,
    send_cq: u32,
    recv_cq: u32,
}

impl QueuePair for MockQueuePair {
    fn qp_number(&self) -> u32 {
        self.qpn
    }
}

enum Pending {
    Send(Completion, IoBuffer),
    Recv(Completion, IoBuffer),
}

#[derive(Default)]
struct MockState {
    next_cq: u32,
    next_qpn: u32,
    cqs: HashSet<u32>,
    // qpn -> (send cq, recv cq)
    qps: HashMap<u32, (u32, u32)>,
    posted_recvs: HashMap<u32, VecDeque<IoBuffer>>,
    outstanding_sends: HashMap<u32, VecDeque<IoBuffer>>,
    pending: HashMap<u32, VecDeque<Pending>>,
    attached: HashSet<(u32, Gid)>,
    sent: Vec<(u32, AddressVector, Vec<u8>)>,
    total_recvs_posted: usize,
}

/// A [`Transport`] keeping every queue in memory, with failure injection.
pub struct MockTransport {
    state: RefCell<MockState>,
    port_gid: Gid,
    broadcast_gid: Gid,
    pub fail_create_cq: Cell<bool>,
    pub fail_create_qp: Cell<bool>,
    pub fail_post_send: Cell<bool>,
    /// Reject receive posts once this many have succeeded in total.
    pub recv_post_limit: Cell<Option<usize>>,
    pub fail_attach: Cell<bool>,
    pub fail_detach: Cell<bool>,
}

impl Default for MockTransport {
    fn default() -> Self {
        MockTransport::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            state: RefCell::new(MockState {
                next_cq: 1,
                next_qpn: 0x48,
                ..Default::default()
            }),
            port_gid: PORT_GID,
            broadcast_gid: IpoibAddress::BROADCAST.gid,
            fail_create_cq: Cell::new(false),
            fail_create_qp: Cell::new(false),
            fail_post_send: Cell::new(false),
            recv_post_limit: Cell::new(None),
            fail_attach: Cell::new(false),
            fail_detach: Cell::new(false),
        }
    }

    pub fn live_cqs(&self) -> usize {
        self.state.borrow().cqs.len()
    }

    pub fn live_qps(&self) -> usize {
        self.state.borrow().qps.len()
    }

    pub fn posted_recvs(&self, qpn: u32) -> usize {
        self.state.borrow().posted_recvs.get(&qpn).map_or(0, VecDeque::len)
    }

    pub fn pending_completions(&self) -> usize {
        self.state.borrow().pending.values().map(VecDeque::len).sum()
    }

    pub fn is_attached(&self, qpn: u32, gid: &Gid) -> bool {
        self.state.borrow().attached.contains(&(qpn, *gid))
    }

    /// Every datagram posted for sending: queue pair, address vector and wire bytes.
    pub fn sent(&self) -> Vec<(u32, AddressVector, Vec<u8>)> {
        self.state.borrow().sent.clone()
    }

    /// Land `frame` from `src_qp`/`sgid` in the next receive buffer posted on `qpn`. Returns
    /// `false` when no receive buffer is posted.
    pub fn deliver(&self, qpn: u32, src_qp: u32, sgid: &Gid, frame: &[u8]) -> bool {
        let bytes = grh_frame(sgid, frame);
        let mut state = self.state.borrow_mut();
        let Some(&(_, recv_cq)) = state.qps.get(&qpn) else {
            return false;
        };
        let Some(mut iobuf) = state.posted_recvs.get_mut(&qpn).and_then(VecDeque::pop_front) else {
            return false;
        };
        iobuf.tailroom_mut()[..bytes.len()].copy_from_slice(&bytes);

        let completion = Completion {
            qp_num: qpn,
            status: WorkCompletionStatus::Success,
            byte_len: bytes.len() as u32,
            src_qp,
        };
        state.pending.entry(recv_cq).or_default().push_back(Pending::Recv(completion, iobuf));
        true
    }

    /// Complete the next receive buffer posted on `qpn` with an error syndrome.
    pub fn fail_recv(&self, qpn: u32, status: WorkCompletionStatus) -> bool {
        let mut state = self.state.borrow_mut();
        let Some(&(_, recv_cq)) = state.qps.get(&qpn) else {
            return false;
        };
        let Some(iobuf) = state.posted_recvs.get_mut(&qpn).and_then(VecDeque::pop_front) else {
            return false;
        };
        let completion = Completion {
            qp_num: qpn,
            status,
            ..Default::default()
        };
        state.pending.entry(recv_cq).or_default().push_back(Pending::Recv(completion, iobuf));
        true
    }

    /// Complete every outstanding send on `qpn` with `status`. Returns how many were completed.
    pub fn complete_sends(&self, qpn: u32, status: WorkCompletionStatus) -> usize {
        let mut state = self.state.borrow_mut();
        let Some(&(send_cq, _)) = state.qps.get(&qpn) else {
            return 0;
        };
        let sends: Vec<IoBuffer> = state.outstanding_sends.remove(&qpn).unwrap_or_default().into();
        let count = sends.len();
        let queue = state.pending.entry(send_cq).or_default();
        for iobuf in sends {
            let completion = Completion {
                qp_num: qpn,
                status,
                ..Default::default()
            };
            queue.push_back(Pending::Send(completion, iobuf));
        }
        count
    }

    fn errno(errno: i32) -> io::Error {
        io::Error::from_raw_os_error(errno)
    }
}

impl Transport for MockTransport {
    type CompletionQueue = MockCompletionQueue;
    type QueuePair = MockQueuePair;

    fn create_cq(&self, _num_cqes: u32) -> Result<MockCompletionQueue, CreateCompletionQueueError> {
        if self.fail_create_cq.get() {
            return Err(CreateCompletionQueueErrorKind::Transport(Self::errno(libc::ENOMEM)).into());
        }
        let mut state = self.state.borrow_mut();
        let id = state.next_cq;
        state.next_cq += 1;
        state.cqs.insert(id);
        Ok(MockCompletionQueue { id })
    }

    fn destroy_cq(&self, cq: MockCompletionQueue) {
        let mut state = self.state.borrow_mut();
        state.cqs.remove(&cq.id);
        state.pending.remove(&cq.id);
    }

    fn create_qp(
        &self, _num_send_wqes: u32, send_cq: &MockCompletionQueue, _num_recv_wqes: u32,
        recv_cq: &MockCompletionQueue, _qkey: u32,
    ) -> Result<MockQueuePair, CreateQueuePairError> {
        if self.fail_create_qp.get() {
            return Err(CreateQueuePairErrorKind::Transport(Self::errno(libc::ENOMEM)).into());
        }
        let mut state = self.state.borrow_mut();
        let qpn = state.next_qpn;
        state.next_qpn += 1;
        state.qps.insert(qpn, (send_cq.id, recv_cq.id));
        Ok(MockQueuePair {
            qpn,
            send_cq: send_cq.id,
            recv_cq: recv_cq.id,
        })
    }

    fn destroy_qp(&self, qp: MockQueuePair) {
        let mut state = self.state.borrow_mut();
        state.qps.remove(&qp.qpn);
        state.posted_recvs.remove(&qp.qpn);
        state.outstanding_sends.remove(&qp.qpn);
        state.attached.retain(|(qpn, _)| *qpn != qp.qpn);
    }

    fn post_send(&self, qp: &MockQueuePair, av: &AddressVector, iobuf: IoBuffer) -> Result<(), PostSendError> {
        if self.fail_post_send.get() {
            return Err(PostSendError::NotEnoughResources(Self::errno(libc::ENOMEM)));
        }
        let mut state = self.state.borrow_mut();
        if !state.qps.contains_key(&qp.qpn) {
            return Err(PostSendError::InvalidQueuePair(Self::errno(libc::EINVAL)));
        }
        state.sent.push((qp.qpn, *av, iobuf.data().to_vec()));
        state.outstanding_sends.entry(qp.qpn).or_default().push_back(iobuf);
        Ok(())
    }

    fn post_recv(&self, qp: &MockQueuePair, iobuf: IoBuffer) -> Result<(), PostRecvError> {
        let mut state = self.state.borrow_mut();
        if !state.qps.contains_key(&qp.qpn) {
            return Err(PostRecvError::InvalidQueuePair(Self::errno(libc::EINVAL)));
        }
        if let Some(limit) = self.recv_post_limit.get() {
            if state.total_recvs_posted >= limit {
                return Err(PostRecvError::NotEnoughResources(Self::errno(libc::ENOMEM)));
            }
        }
        state.total_recvs_posted += 1;
        state.posted_recvs.entry(qp.qpn).or_default().push_back(iobuf);
        Ok(())
    }

    fn poll_cq<H: CompletionHandler>(&self, cq: &MockCompletionQueue, handler: &mut H) -> usize {
        let mut drained = 0;
        loop {
            // the handler may call back into the transport
            let next = self.state.borrow_mut().pending.get_mut(&cq.id).and_then(VecDeque::pop_front);
            match next {
                Some(Pending::Send(completion, iobuf)) => handler.complete_send(completion, iobuf),
                Some(Pending::Recv(completion, iobuf)) => handler.complete_recv(completion, iobuf),
                None => break,
            }
            drained += 1;
        }
        drained
    }

    fn mcast_attach(&self, qp: &MockQueuePair, gid: &Gid) -> Result<(), MulticastError> {
        if self.fail_attach.get() {
            return Err(MulticastError::Attach {
                gid: *gid,
                source: Self::errno(libc::EINVAL),
            });
        }
        self.state.borrow_mut().attached.insert((qp.qpn, *gid));
        Ok(())
    }

    fn mcast_detach(&self, qp: &MockQueuePair, gid: &Gid) -> Result<(), MulticastError> {
        if self.fail_detach.get() {
            return Err(MulticastError::Detach {
                gid: *gid,
                source: Self::errno(libc::EINVAL),
            });
        }
        self.state.borrow_mut().attached.remove(&(qp.qpn, *gid));
        Ok(())
    }

    fn port_gid(&self) -> Gid {
        self.port_gid
    }

    fn broadcast_gid(&self) -> Gid {
        self.broadcast_gid
    }
}

/// A [`NetDeviceFramework`] recording everything the driver reports.
#[derive(Default)]
pub struct MockFramework {
    /// Remaining buffer allocations, unlimited when `None`.
    pub alloc_budget: Cell<Option<usize>>,
    pub fail_register: Cell<bool>,
    pub registered: Cell<bool>,
    pub unregister_calls: Cell<usize>,
    /// Whether the device still claimed to be open when it was unregistered.
    pub unregistered_open: Cell<bool>,
    pub received: RefCell<Vec<ReceivedFrame<IpoibAddress>>>,
    pub rx_errors: RefCell<Vec<NetDeviceError>>,
    pub tx_completions: RefCell<Vec<Result<(), NetDeviceError>>>,
}

impl NetDeviceFramework<Ipoib> for MockFramework {
    fn alloc_iob(&self, len: usize) -> Option<IoBuffer> {
        match self.alloc_budget.get() {
            Some(0) => None,
            Some(budget) => {
                self.alloc_budget.set(Some(budget - 1));
                Some(IoBuffer::new(len))
            },
            None => Some(IoBuffer::new(len)),
        }
    }

    fn register_netdev(&self, _netdev: &NetDevice<Ipoib>) -> Result<(), RegisterNetDeviceError> {
        if self.fail_register.get() {
            return Err(RegisterNetDeviceErrorKind::Framework(io::Error::from_raw_os_error(libc::ENOMEM)).into());
        }
        self.registered.set(true);
        Ok(())
    }

    fn unregister_netdev(&self, netdev: &NetDevice<Ipoib>) {
        self.registered.set(false);
        self.unregistered_open.set(netdev.is_open());
        self.unregister_calls.set(self.unregister_calls.get() + 1);
    }

    fn netdev_rx(&self, _netdev: &NetDevice<Ipoib>, iobuf: IoBuffer) {
        match Ipoib::rx(iobuf) {
            Ok(frame) => self.received.borrow_mut().push(frame),
            Err(err) => self.rx_errors.borrow_mut().push(err.into()),
        }
    }

    fn netdev_tx_complete(&self, _netdev: &NetDevice<Ipoib>, _iobuf: IoBuffer, result: Result<(), NetDeviceError>) {
        self.tx_completions.borrow_mut().push(result);
    }

    fn netdev_rx_err(&self, _netdev: &NetDevice<Ipoib>, _iobuf: Option<IoBuffer>, err: NetDeviceError) {
        self.rx_errors.borrow_mut().push(err);
    }
}

/// A handler that only tracks the receive fill level, for driving a queue set directly.
pub struct CountingHandler<'a> {
    pub recv_fill: &'a mut u32,
    pub sends: usize,
    pub recvs: usize,
}

impl<'a> CountingHandler<'a> {
    pub fn new(recv_fill: &'a mut u32) -> Self {
        CountingHandler {
            recv_fill,
            sends: 0,
            recvs: 0,
        }
    }
}

impl CompletionHandler for CountingHandler<'_> {
    fn complete_send(&mut self, _completion: Completion, _iobuf: IoBuffer) {
        self.sends += 1;
    }

    fn complete_recv(&mut self, _completion: Completion, _iobuf: IoBuffer) {
        self.recvs += 1;
        *self.recv_fill -= 1;
    }
}
