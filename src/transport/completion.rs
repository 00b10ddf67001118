use crate::netdev::io_buffer::IoBuffer;

/// Error returned when a raw work completion status has no [`WorkCompletionStatus`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown work completion status: {0}")]
pub struct UnknownWorkCompletionStatus(pub u32);

/// Status of a work completion. Anything but [`WorkCompletionStatus::Success`] is an error
/// syndrome. Discriminants follow the verbs ABI (`enum ibv_wc_status`).
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkCompletionStatus {
    #[default]
    Success = 0,
    LocalLengthError = 1,
    LocalQueuePairOperationError = 2,
    LocalEndToEndContextOperationError = 3,
    LocalProtectionError = 4,
    WorkRequestFlushedError = 5,
    MemoryWindowBindError = 6,
    BadResponseError = 7,
    LocalAccessError = 8,
    RemoteInvalidRequestError = 9,
    RemoteAccessError = 10,
    RemoteOperationError = 11,
    RetryCounterExceededError = 12,
    ResponderNotReadyRetryCounterExceededError = 13,
    LocalReliableDatagramDomainViolationError = 14,
    RemoteInvalidReliableDatagramRequest = 15,
    RemoteAbortedError = 16,
    InvalidEndToEndContextNumberError = 17,
    InvalidEndToEndContextStateError = 18,
    FatalError = 19,
    ResponseTimeoutError = 20,
    GeneralError = 21,
    TagMatchingError = 22,
    TagMatchingRendezvousIncomplete = 23,
}

impl TryFrom<u32> for WorkCompletionStatus {
    type Error = UnknownWorkCompletionStatus;

    fn try_from(status: u32) -> Result<Self, Self::Error> {
        use WorkCompletionStatus::*;

        Ok(match status {
            0 => Success,
            1 => LocalLengthError,
            2 => LocalQueuePairOperationError,
            3 => LocalEndToEndContextOperationError,
            4 => LocalProtectionError,
            5 => WorkRequestFlushedError,
            6 => MemoryWindowBindError,
            7 => BadResponseError,
            8 => LocalAccessError,
            9 => RemoteInvalidRequestError,
            10 => RemoteAccessError,
            11 => RemoteOperationError,
            12 => RetryCounterExceededError,
            13 => ResponderNotReadyRetryCounterExceededError,
            14 => LocalReliableDatagramDomainViolationError,
            15 => RemoteInvalidReliableDatagramRequest,
            16 => RemoteAbortedError,
            17 => InvalidEndToEndContextNumberError,
            18 => InvalidEndToEndContextStateError,
            19 => FatalError,
            20 => ResponseTimeoutError,
            21 => GeneralError,
            22 => TagMatchingError,
            23 => TagMatchingRendezvousIncomplete,
            _ => return Err(UnknownWorkCompletionStatus(status)),
        })
    }
}

impl WorkCompletionStatus {
    pub fn is_success(&self) -> bool {
        *self == WorkCompletionStatus::Success
    }
}

/// Metadata of one drained work completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Completion {
    /// Number of the local queue pair the work request was posted to.
    pub qp_num: u32,
    /// Completion status; an error syndrome unless `Success`.
    pub status: WorkCompletionStatus,
    /// Number of bytes received, including the Global Route Header on UD queue pairs.
    pub byte_len: u32,
    /// Number of the remote queue pair that sent a received message.
    pub src_qp: u32,
}

impl Completion {
    /// Whether the completion carries an error syndrome.
    pub fn is_error(&self) -> bool {
        !self.status.is_success()
    }
}

/// Receives work completions drained by [`Transport::poll_cq`], one call per completion,
/// together with the buffer the work request was posted with.
///
/// [`Transport::poll_cq`]: super::Transport::poll_cq
pub trait CompletionHandler {
    fn complete_send(&mut self, completion: Completion, iobuf: IoBuffer);

    fn complete_recv(&mut self, completion: Completion, iobuf: IoBuffer);
}
