//! The IPoIB link-layer address: a queue pair number and a port GID.
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::IPOIB_ALEN;
use crate::transport::address::Gid;

/// Error returned when parsing an [`IpoibAddress`] from its colon-separated form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ParseIpoibAddressError {
    #[error("expected {IPOIB_ALEN} bytes, got {0}")]
    InvalidLength(usize),
    #[error("invalid hex byte {0:?}")]
    InvalidByte(String),
}

/// An IPoIB link-layer address.
///
/// On the wire it is the queue pair number in network byte order followed by the GID, 20 bytes
/// in total.
#[derive(Default, Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct IpoibAddress {
    /// Queue pair number. QPNs are 24-bit, the top byte must be zero.
    pub qpn: u32,
    /// Port GID.
    pub gid: Gid,
}

impl IpoibAddress {
    /// The IPv4 broadcast address: the all-nodes group of the default partition, QPN zero.
    ///
    /// The QPN comes first, so the colon-separated form reads `00:00:00:00:ff:12:40:1b:…`
    /// and the broadcast GID starts at the fifth byte.
    pub const BROADCAST: IpoibAddress = IpoibAddress {
        qpn: 0,
        gid: Gid {
            raw: [
                0xff, 0x12, 0x40, 0x1b, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff,
            ],
        },
    };

    pub fn new(qpn: u32, gid: Gid) -> Self {
        IpoibAddress { qpn, gid }
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    pub fn to_bytes(&self) -> [u8; IPOIB_ALEN] {
        let mut bytes = [0u8; IPOIB_ALEN];
        bytes[..4].copy_from_slice(&self.qpn.to_be_bytes());
        bytes[4..].copy_from_slice(&self.gid.raw);
        bytes
    }

    pub fn from_bytes(bytes: &[u8; IPOIB_ALEN]) -> Self {
        let mut qpn = [0u8; 4];
        let mut raw = [0u8; 16];
        qpn.copy_from_slice(&bytes[..4]);
        raw.copy_from_slice(&bytes[4..]);
        IpoibAddress {
            qpn: u32::from_be_bytes(qpn),
            gid: Gid { raw },
        }
    }

    /// Read an address from the first [`IPOIB_ALEN`] bytes of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes
            .get(..IPOIB_ALEN)
            .and_then(|b| <&[u8; IPOIB_ALEN]>::try_from(b).ok())
            .map(Self::from_bytes)
    }
}

impl fmt::Display for IpoibAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, byte) in self.to_bytes().iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for IpoibAddress {
    type Err = ParseIpoibAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; IPOIB_ALEN];
        let mut count = 0;

        for part in s.split(':') {
            if count < IPOIB_ALEN {
                if part.len() != 2 {
                    return Err(ParseIpoibAddressError::InvalidByte(part.to_owned()));
                }
                bytes[count] =
                    u8::from_str_radix(part, 16).map_err(|_| ParseIpoibAddressError::InvalidByte(part.to_owned()))?;
            }
            count += 1;
        }

        if count != IPOIB_ALEN {
            return Err(ParseIpoibAddressError::InvalidLength(count));
        }

        Ok(Self::from_bytes(&bytes))
    }
}
