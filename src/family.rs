//! Address-family capability set shared by the IPv4 and IPv6 paths.
//!
//! Every address, gateway and neighbor operation in this crate is written
//! once against [`AddrFamily`] and instantiated with the [`Ipv4`] or
//! [`Ipv6`] tag, so the two families never grow diverging logic.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Capabilities of one IP address family.
pub trait AddrFamily {
    /// Prefix length assumed when none is configured.
    const DEFAULT_PREFIX: u8;
    /// Protocol tag used by the network service.
    const PROTOCOL: &'static str;
    /// Name of the default-gateway property for this family.
    const GATEWAY_PROPERTY: &'static str;

    /// Host address type. Its `Display` form is the textual encoding the
    /// network service expects.
    type Addr: Copy + Eq + core::fmt::Debug + core::fmt::Display;
    /// Network-byte-order wire encoding.
    type Octets: AsRef<[u8]>;

    /// Parse the service's textual address form.
    fn parse(s: &str) -> Option<Self::Addr>;
    /// Convert to the wire encoding.
    fn octets(addr: Self::Addr) -> Self::Octets;
    /// Convert from the wire encoding. `None` on length mismatch.
    fn from_octets(bytes: &[u8]) -> Option<Self::Addr>;
    /// The all-zero address used when nothing is configured.
    fn unspecified() -> Self::Addr;
}

/// IPv4 family tag.
pub enum Ipv4 {}

impl AddrFamily for Ipv4 {
    const DEFAULT_PREFIX: u8 = 32;
    const PROTOCOL: &'static str = "xyz.openbmc_project.Network.IP.Protocol.IPv4";
    const GATEWAY_PROPERTY: &'static str = "DefaultGateway";

    type Addr = Ipv4Addr;
    type Octets = [u8; 4];

    fn parse(s: &str) -> Option<Self::Addr> {
        Ipv4Addr::from_str(s).ok()
    }

    fn octets(addr: Self::Addr) -> Self::Octets {
        addr.octets()
    }

    fn from_octets(bytes: &[u8]) -> Option<Self::Addr> {
        let bytes: [u8; 4] = bytes.try_into().ok()?;
        Some(Ipv4Addr::from(bytes))
    }

    fn unspecified() -> Self::Addr {
        Ipv4Addr::UNSPECIFIED
    }
}

/// IPv6 family tag.
pub enum Ipv6 {}

impl AddrFamily for Ipv6 {
    const DEFAULT_PREFIX: u8 = 128;
    const PROTOCOL: &'static str = "xyz.openbmc_project.Network.IP.Protocol.IPv6";
    const GATEWAY_PROPERTY: &'static str = "DefaultGateway6";

    type Addr = Ipv6Addr;
    type Octets = [u8; 16];

    fn parse(s: &str) -> Option<Self::Addr> {
        Ipv6Addr::from_str(s).ok()
    }

    fn octets(addr: Self::Addr) -> Self::Octets {
        addr.octets()
    }

    fn from_octets(bytes: &[u8]) -> Option<Self::Addr> {
        let bytes: [u8; 16] = bytes.try_into().ok()?;
        Some(Ipv6Addr::from(bytes))
    }

    fn unspecified() -> Self::Addr {
        Ipv6Addr::UNSPECIFIED
    }
}

/// Provenance of a configured address as reported by the network service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressOrigin {
    Static,
    Dhcp,
    Slaac,
    LinkLocal,
}

impl AddressOrigin {
    const PREFIX: &'static str = "xyz.openbmc_project.Network.IP.AddressOrigin.";

    /// Parse the service's enumeration string.
    pub fn from_service(value: &str) -> Option<Self> {
        match value.strip_prefix(Self::PREFIX)? {
            "Static" => Some(Self::Static),
            "DHCP" => Some(Self::Dhcp),
            "SLAAC" => Some(Self::Slaac),
            "LinkLocal" => Some(Self::LinkLocal),
            _ => None,
        }
    }
}

/// Origins a v4 address query accepts.
pub const ORIGINS_V4: &[AddressOrigin] = &[AddressOrigin::Static, AddressOrigin::Dhcp];
/// Origins a v6 static-address query accepts.
pub const ORIGINS_V6_STATIC: &[AddressOrigin] = &[AddressOrigin::Static];
/// Origins a v6 dynamic-address query accepts.
pub const ORIGINS_V6_DYNAMIC: &[AddressOrigin] = &[AddressOrigin::Dhcp, AddressOrigin::Slaac];

/// An ethernet MAC address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// The wire encoding.
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Whether this is the all-zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }

    /// Whether the multicast bit (LSB of the first octet) is set.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 1 != 0
    }
}

impl core::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = InvalidMacAddr;

    /// Parse a colon-separated MAC address. Each group may be one or two
    /// hex digits, matching what the network service reports.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut groups = s.split(':');
        for octet in octets.iter_mut() {
            let group = groups.next().ok_or(InvalidMacAddr)?;
            if group.is_empty() || group.len() > 2 {
                return Err(InvalidMacAddr);
            }
            *octet = u8::from_str_radix(group, 16).map_err(|_| InvalidMacAddr)?;
        }
        if groups.next().is_some() {
            return Err(InvalidMacAddr);
        }
        Ok(MacAddr(octets))
    }
}

/// Error parsing a textual MAC address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid MAC address")]
pub struct InvalidMacAddr;

/// Turn a prefix length into a v4 netmask. `None` when the prefix is
/// longer than the address.
pub fn prefix_to_netmask(prefix: u8) -> Option<Ipv4Addr> {
    if prefix > 32 {
        return None;
    }
    if prefix == 0 {
        // avoids the 32-bit shift-by-32
        return Some(Ipv4Addr::UNSPECIFIED);
    }
    Some(Ipv4Addr::from(!0u32 << (32 - prefix)))
}

/// Turn a v4 netmask back into a prefix length. `None` when the set bits
/// are not a contiguous high-order run.
pub fn netmask_to_prefix(netmask: Ipv4Addr) -> Option<u8> {
    let x = u32::from(netmask);
    if (!x & (!x).wrapping_add(1)) != 0 {
        return None;
    }
    Some(x.count_ones() as u8)
}
