use serde::{Deserialize, Serialize};
use std::{fmt, net::Ipv6Addr};

/// Length of the InfiniBand Global Route Header a UD queue pair places in front of every
/// received message.
pub const IB_GRH_LEN: usize = 40;

/// Offset of the source GID inside the Global Route Header.
pub const IB_GRH_SGID_OFFSET: usize = 8;

/// An InfiniBand Global Identifier.
#[derive(Default, Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Gid {
    pub raw: [u8; 16],
}

impl From<[u8; 16]> for Gid {
    fn from(raw: [u8; 16]) -> Self {
        Gid { raw }
    }
}

impl From<Gid> for Ipv6Addr {
    fn from(gid: Gid) -> Self {
        Ipv6Addr::from(gid.raw)
    }
}

impl From<Ipv6Addr> for Gid {
    fn from(addr: Ipv6Addr) -> Self {
        Gid { raw: addr.octets() }
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, &byte) in self.raw.iter().enumerate() {
            if i > 0 && i % 2 == 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl Gid {
    pub fn is_zero(&self) -> bool {
        self.raw.iter().all(|&x| x == 0)
    }

    pub fn is_multicast(&self) -> bool {
        self.raw[0] == 0xff
    }

    /// Read the source GID out of a received Global Route Header.
    pub fn from_grh_source(grh: &[u8]) -> Option<Gid> {
        grh.get(IB_GRH_SGID_OFFSET..IB_GRH_SGID_OFFSET + 16)
            .and_then(|sgid| <[u8; 16]>::try_from(sgid).ok())
            .map(Gid::from)
    }
}

/// Where a datagram sent on an unreliable datagram queue pair goes.
#[derive(Default, Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressVector {
    /// Destination queue pair number.
    pub qpn: u32,
    /// Queue key expected by the destination queue pair.
    pub qkey: u32,
    /// Destination local identifier.
    pub lid: u16,
    /// Static rate.
    pub rate: u8,
    /// Service level.
    pub sl: u8,
    /// Whether `gid` is valid and a Global Route Header must be sent.
    pub gid_present: bool,
    /// Destination GID.
    pub gid: Gid,
}

impl AddressVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn setup_qpn(&mut self, qpn: u32) -> &mut Self {
        self.qpn = qpn;
        self
    }

    pub fn setup_qkey(&mut self, qkey: u32) -> &mut Self {
        self.qkey = qkey;
        self
    }

    pub fn setup_dest_lid(&mut self, lid: u16) -> &mut Self {
        self.lid = lid;
        self
    }

    pub fn setup_rate(&mut self, rate: u8) -> &mut Self {
        self.rate = rate;
        self
    }

    pub fn setup_service_level(&mut self, sl: u8) -> &mut Self {
        self.sl = sl;
        self
    }

    pub fn setup_dest_gid(&mut self, gid: &Gid) -> &mut Self {
        self.gid = *gid;
        self.gid_present = true;
        self
    }
}
