//! Conversions between the transport types and their [rdma-core] verbs counterparts, for
//! [`Transport`] implementations backed by libibverbs.
//!
//! [rdma-core]: https://github.com/linux-rdma/rdma-core
//! [`Transport`]: super::Transport
use rdma_mummy_sys::{ibv_gid, ibv_wc};

use super::address::Gid;
use super::completion::{Completion, UnknownWorkCompletionStatus, WorkCompletionStatus};

impl From<ibv_gid> for Gid {
    fn from(gid: ibv_gid) -> Self {
        Self {
            raw: unsafe { gid.raw },
        }
    }
}

impl From<Gid> for ibv_gid {
    fn from(gid: Gid) -> Self {
        ibv_gid { raw: gid.raw }
    }
}

impl TryFrom<&ibv_wc> for Completion {
    type Error = UnknownWorkCompletionStatus;

    fn try_from(wc: &ibv_wc) -> Result<Self, Self::Error> {
        Ok(Completion {
            qp_num: wc.qp_num,
            status: WorkCompletionStatus::try_from(wc.status)?,
            byte_len: wc.byte_len,
            src_qp: wc.src_qp,
        })
    }
}
