//! Internet address values
//!
//! An [`Address`] is a dotted-decimal IPv4 address plus a port. It is built
//! from text per call and converted to the native `sockaddr` representation
//! (via `socket2::SockAddr`) at the socket boundary.

use serde::{Deserialize, Serialize};
use socket2::SockAddr;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

use crate::error::AddressError;

/// IPv4 address and port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl Address {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Parse a dotted-decimal IP text and pair it with `port`.
    ///
    /// Unparsable text is an error; it never degrades to `0.0.0.0`.
    pub fn parse(ip: &str, port: u16) -> Result<Self, AddressError> {
        let ip = ip
            .parse::<Ipv4Addr>()
            .map_err(|_| AddressError::InvalidIp(ip.to_string()))?;
        Ok(Self { ip, port })
    }

    /// `0.0.0.0` on the given port
    pub fn any(port: u16) -> Self {
        Self::new(Ipv4Addr::UNSPECIFIED, port)
    }

    /// `127.0.0.1` on the given port
    pub fn localhost(port: u16) -> Self {
        Self::new(Ipv4Addr::LOCALHOST, port)
    }

    /// Dotted-decimal text of the IP part
    pub fn ip_text(&self) -> String {
        self.ip.to_string()
    }

    /// The `(ip text, port)` pair callers exchange addresses as
    pub fn to_pair(&self) -> (String, u16) {
        (self.ip_text(), self.port)
    }

    pub fn to_sock_addr(&self) -> SockAddr {
        SockAddr::from(SocketAddrV4::from(*self))
    }

    /// Convert a native address back; only IPv4 is representable.
    pub fn from_sock_addr(addr: &SockAddr) -> Result<Self, AddressError> {
        match addr.as_socket() {
            Some(SocketAddr::V4(v4)) => Ok(v4.into()),
            _ => Err(AddressError::UnsupportedFamily),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    /// Parse `"a.b.c.d:port"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ip, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AddressError::InvalidPort(s.to_string()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| AddressError::InvalidPort(port.to_string()))?;
        Self::parse(ip, port)
    }
}

impl From<SocketAddrV4> for Address {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(*addr.ip(), addr.port())
    }
}

impl From<Address> for SocketAddrV4 {
    fn from(addr: Address) -> Self {
        SocketAddrV4::new(addr.ip, addr.port)
    }
}

impl From<Address> for SocketAddr {
    fn from(addr: Address) -> Self {
        SocketAddr::V4(addr.into())
    }
}

impl TryFrom<SocketAddr> for Address {
    type Error = AddressError;

    fn try_from(addr: SocketAddr) -> Result<Self, Self::Error> {
        match addr {
            SocketAddr::V4(v4) => Ok(v4.into()),
            SocketAddr::V6(_) => Err(AddressError::UnsupportedFamily),
        }
    }
}

impl TryFrom<(&str, u16)> for Address {
    type Error = AddressError;

    fn try_from((ip, port): (&str, u16)) -> Result<Self, Self::Error> {
        Self::parse(ip, port)
    }
}
