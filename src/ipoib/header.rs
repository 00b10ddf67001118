//! IPoIB framing.
//!
//! A frame travelling through the network stack carries a 24-byte header:
//!
//! ```text
//! +---------------------------+----------+----------+---------
//! | peer address (20 bytes)   | proto    | reserved | payload
//! | pseudo-header             | 2 bytes  | 2 bytes  |
//! +---------------------------+----------+----------+---------
//! ```
//!
//! Only the last four bytes of the header reach the wire; the pseudo-header is stripped before
//! the frame is posted and rebuilt from the completion when a frame is received.
use super::address::IpoibAddress;
use super::{Ipoib, ARPHRD_INFINIBAND, IPOIB_ALEN, IPOIB_HLEN, IPOIB_PSEUDO_HLEN, IPOIB_REAL_HLEN};
use crate::netdev::io_buffer::IoBuffer;
use crate::netdev::link_layer::{FrameError, LinkLayerProtocol, ReceivedFrame};

/// The pseudo-header: the peer's link-layer address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PseudoHeader {
    pub peer: IpoibAddress,
}

impl PseudoHeader {
    pub fn write(&self, buf: &mut [u8]) {
        buf[..IPOIB_PSEUDO_HLEN].copy_from_slice(&self.peer.to_bytes());
    }

    pub fn read(buf: &[u8]) -> Option<Self> {
        IpoibAddress::from_slice(buf).map(|peer| PseudoHeader { peer })
    }
}

/// The header that goes on the wire: network-layer protocol and a reserved field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealHeader {
    /// Network-layer protocol, in host byte order.
    pub proto: u16,
    pub reserved: u16,
}

impl RealHeader {
    pub fn write(&self, buf: &mut [u8]) {
        buf[..2].copy_from_slice(&self.proto.to_be_bytes());
        buf[2..IPOIB_REAL_HLEN].copy_from_slice(&self.reserved.to_be_bytes());
    }

    pub fn read(buf: &[u8]) -> Option<Self> {
        let buf = buf.get(..IPOIB_REAL_HLEN)?;
        Some(RealHeader {
            proto: u16::from_be_bytes([buf[0], buf[1]]),
            reserved: u16::from_be_bytes([buf[2], buf[3]]),
        })
    }
}

/// The full in-stack IPoIB header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpoibHeader {
    pub pseudo: PseudoHeader,
    pub real: RealHeader,
}

impl IpoibHeader {
    pub fn new(peer: IpoibAddress, proto: u16) -> Self {
        IpoibHeader {
            pseudo: PseudoHeader { peer },
            real: RealHeader { proto, reserved: 0 },
        }
    }

    pub fn write(&self, buf: &mut [u8]) {
        self.pseudo.write(&mut buf[..IPOIB_PSEUDO_HLEN]);
        self.real.write(&mut buf[IPOIB_PSEUDO_HLEN..IPOIB_HLEN]);
    }

    pub fn read(buf: &[u8]) -> Option<Self> {
        Some(IpoibHeader {
            pseudo: PseudoHeader::read(buf)?,
            real: RealHeader::read(buf.get(IPOIB_PSEUDO_HLEN..)?)?,
        })
    }
}

impl LinkLayerProtocol for Ipoib {
    type Address = IpoibAddress;

    const NAME: &'static str = "IPoIB";
    const LL_PROTO: u16 = ARPHRD_INFINIBAND;
    const LL_ADDR_LEN: usize = IPOIB_ALEN;
    const LL_HEADER_LEN: usize = IPOIB_HLEN;

    fn broadcast() -> &'static IpoibAddress {
        &IpoibAddress::BROADCAST
    }

    fn tx(mut iobuf: IoBuffer, ll_dest: &IpoibAddress, net_proto: u16) -> IoBuffer {
        IpoibHeader::new(*ll_dest, net_proto).write(iobuf.push(IPOIB_HLEN));
        iobuf
    }

    fn rx(mut iobuf: IoBuffer) -> Result<ReceivedFrame<IpoibAddress>, FrameError> {
        let header = match IpoibHeader::read(iobuf.data()) {
            Some(header) => header,
            None => {
                tracing::debug!("IPoIB packet too short ({} bytes)", iobuf.len());
                return Err(FrameError::TooShort {
                    len: iobuf.len(),
                    required: IPOIB_HLEN,
                });
            },
        };

        iobuf.pull(IPOIB_HLEN);

        Ok(ReceivedFrame {
            iobuf,
            net_proto: header.real.proto,
            ll_source: header.pseudo.peer,
        })
    }
}
