//! The object/property IPC surface this crate needs from the host.
//!
//! The network and console services are reached through a small verb set:
//! enumerate objects by capability interface, look up the service owning
//! an object, read/write/read-all properties, invoke the address, VLAN
//! and neighbor create methods, and delete objects. [`Bus`] captures
//! exactly that set so the dispatch logic never depends on the transport
//! or on the services' internal object model.

use std::collections::BTreeMap;

#[cfg(feature = "zbus")]
mod zbus_impl;
#[cfg(feature = "zbus")]
pub use zbus_impl::ZbusConnection;

/// Objects keyed by path, each mapping owning service to the capability
/// interfaces it implements there.
///
/// Ordered so that discovery order over the tree is deterministic.
pub type ObjectTree = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// All properties of one interface on one object.
pub type Props = BTreeMap<String, Value>;

/// A property value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    String(String),
}

impl Value {
    /// The contained string, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The contained boolean, if this is a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The contained integer widened to `u64`, if this is an integer.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U8(v) => Some(*v as u64),
            Value::U16(v) => Some(*v as u64),
            Value::U32(v) => Some(*v as u64),
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Value::U8(value)
    }
}

/// Errors surfaced by a [`Bus`] implementation.
///
/// `UnknownObject` and `InternalFailure` are distinguished because object
/// deletion tolerates exactly those two races (the object vanished, or
/// the service failed tearing down something already half-gone); every
/// other failure propagates.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum BusError {
    #[error("no such object: {0}")]
    UnknownObject(String),
    #[error("service reported an internal failure: {0}")]
    InternalFailure(String),
    #[error("property {interface}.{property} missing or of unexpected type")]
    PropertyType {
        interface: String,
        property: String,
    },
    #[error("bus call failed: {0}")]
    Call(String),
}

/// The IPC verb set used against the host services.
pub trait Bus {
    /// Enumerate all objects under `root` implementing at least one of
    /// `interfaces`.
    fn get_sub_tree(&self, root: &str, interfaces: &[&str]) -> Result<ObjectTree, BusError>;

    /// Look up the service owning `path` with `interface`.
    fn get_object(&self, path: &str, interface: &str) -> Result<String, BusError>;

    /// Read one property.
    fn get_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
    ) -> Result<Value, BusError>;

    /// Write one property.
    fn set_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
        value: Value,
    ) -> Result<(), BusError>;

    /// Read all properties of `interface` on `path`.
    fn get_all(&self, service: &str, path: &str, interface: &str) -> Result<Props, BusError>;

    /// Create an address object on the addressable interface object.
    fn create_ip(
        &self,
        service: &str,
        path: &str,
        protocol: &str,
        address: &str,
        prefix: u8,
        gateway: &str,
    ) -> Result<(), BusError>;

    /// Create a VLAN sub-interface, returning the new object path.
    fn create_vlan(&self, service: &str, ifname: &str, id: u32) -> Result<String, BusError>;

    /// Create a static neighbor entry on the addressable interface object.
    fn create_neighbor(
        &self,
        service: &str,
        path: &str,
        address: &str,
        mac: &str,
    ) -> Result<(), BusError>;

    /// Delete the object at `path`.
    fn delete(&self, service: &str, path: &str) -> Result<(), BusError>;
}

/// Well-known names on the network and console services.
pub mod names {
    /// Root of the network service's object tree.
    pub const PATH_ROOT: &str = "/xyz/openbmc_project/network";
    pub const INTF_ETHERNET: &str = "xyz.openbmc_project.Network.EthernetInterface";
    pub const INTF_VLAN: &str = "xyz.openbmc_project.Network.VLAN";
    pub const INTF_VLAN_CREATE: &str = "xyz.openbmc_project.Network.VLAN.Create";
    pub const INTF_IP: &str = "xyz.openbmc_project.Network.IP";
    pub const INTF_IP_CREATE: &str = "xyz.openbmc_project.Network.IP.Create";
    pub const INTF_NEIGHBOR: &str = "xyz.openbmc_project.Network.Neighbor";
    pub const INTF_NEIGHBOR_CREATE: &str = "xyz.openbmc_project.Network.Neighbor.CreateStatic";
    pub const INTF_MAC: &str = "xyz.openbmc_project.Network.MACAddress";
    pub const INTF_DELETE: &str = "xyz.openbmc_project.Object.Delete";

    pub const INTF_SOL: &str = "xyz.openbmc_project.Ipmi.SOL";
    /// SOL objects live at `PATH_SOL` + interface name.
    pub const PATH_SOL: &str = "/xyz/openbmc_project/ipmi/sol/";
    pub const CONSOLE_SERVICE: &str = "xyz.openbmc_project.console";
    pub const CONSOLE_PATH: &str = "/xyz/openbmc_project/console";
    pub const INTF_CONSOLE: &str = "xyz.openbmc_project.console";
}
