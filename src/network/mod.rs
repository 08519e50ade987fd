//! Read/write access to the per-channel network state.
//!
//! All entities here (addresses, neighbors, the VLAN object) are owned by
//! the network service; this module only performs transient lookups and
//! issues configuration intents. Address, gateway and neighbor logic is
//! family-polymorphic over [`AddrFamily`].

pub mod dhcp;
pub mod vlan;

use crate::bus::{names, Bus, BusError, Props, Value};
use crate::channel::ChannelParams;
use crate::family::{
    AddrFamily, AddressOrigin, Ipv4, Ipv6, MacAddr, ORIGINS_V4, ORIGINS_V6_STATIC,
};
use crate::Error;

/// Size of the IPv6 static address table.
pub const MAX_IPV6_STATIC_ADDRESSES: u8 = 15;
/// Number of reportable dynamically assigned IPv6 addresses.
pub const MAX_IPV6_DYNAMIC_ADDRESSES: u8 = 16;
/// Valid bits of a VLAN id.
pub const VLAN_VALUE_MASK: u16 = 0x0FFF;
/// Readback flag marking the VLAN as enabled.
pub const VLAN_ENABLE_FLAG: u16 = 0x8000;

/// A configured interface address.
#[derive(Clone, Debug)]
pub struct IfAddr<F: AddrFamily> {
    pub path: String,
    pub address: F::Addr,
    pub prefix: u8,
    pub origin: AddressOrigin,
}

/// A static neighbor table entry.
#[derive(Clone, Debug)]
pub struct IfNeigh<F: AddrFamily> {
    pub path: String,
    pub ip: F::Addr,
    pub mac: MacAddr,
}

/// Properties of every object under the channel's interface implementing
/// one capability interface, fetched once and reused across lookups
/// within a single command.
pub struct ObjectLookup {
    entries: Vec<(String, Props)>,
}

impl ObjectLookup {
    /// Enumerate and fetch all `interface` objects for the channel.
    pub fn new<B: Bus>(
        bus: &B,
        params: &ChannelParams,
        interface: &str,
    ) -> Result<Self, Error> {
        let objs = bus.get_sub_tree(names::PATH_ROOT, &[interface])?;
        let mut entries = Vec::new();
        for (path, _) in objs {
            if !path.contains(&params.ifname) {
                continue;
            }
            let props = bus.get_all(&params.service, &path, interface)?;
            entries.push((path, props));
        }
        Ok(Self { entries })
    }

    fn iter(&self) -> impl Iterator<Item = &(String, Props)> {
        self.entries.iter()
    }
}

fn prop_str<'a>(props: &'a Props, name: &'static str) -> Result<&'a str, Error> {
    props
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::unexpected_value(name, "missing or non-string"))
}

fn prop_u8(props: &Props, name: &'static str) -> Result<u8, Error> {
    props
        .get(name)
        .and_then(Value::as_u64)
        .and_then(|v| u8::try_from(v).ok())
        .ok_or_else(|| Error::unexpected_value(name, "missing or non-integer"))
}

/// Find the `idx`th address of family `F` whose origin is in `origins`,
/// in discovery order. Absence is not an error.
pub fn find_if_addr<F: AddrFamily>(
    mut idx: u8,
    origins: &[AddressOrigin],
    ips: &ObjectLookup,
) -> Result<Option<IfAddr<F>>, Error> {
    for (path, props) in ips.iter() {
        let address = match F::parse(prop_str(props, "Address")?) {
            Some(address) => address,
            // address of the other family
            None => continue,
        };
        let origin_str = prop_str(props, "Origin")?;
        let origin = AddressOrigin::from_service(origin_str)
            .ok_or_else(|| Error::unexpected_value("Origin", origin_str))?;
        if !origins.contains(&origin) {
            continue;
        }
        if idx > 0 {
            idx -= 1;
            continue;
        }
        return Ok(Some(IfAddr {
            path: path.clone(),
            address,
            prefix: prop_u8(props, "PrefixLength")?,
            origin,
        }));
    }
    Ok(None)
}

/// [`find_if_addr`] with a freshly built lookup.
pub fn get_if_addr<F: AddrFamily, B: Bus>(
    bus: &B,
    params: &ChannelParams,
    idx: u8,
    origins: &[AddressOrigin],
) -> Result<Option<IfAddr<F>>, Error> {
    let ips = ObjectLookup::new(bus, params, names::INTF_IP)?;
    find_if_addr::<F>(idx, origins, &ips)
}

/// Create a new address object on the addressable interface.
pub fn create_if_addr<F: AddrFamily, B: Bus>(
    bus: &B,
    params: &ChannelParams,
    address: F::Addr,
    prefix: u8,
) -> Result<(), Error> {
    bus.create_ip(
        &params.service,
        &params.logical_path,
        F::PROTOCOL,
        &address.to_string(),
        prefix,
        "",
    )?;
    Ok(())
}

/// Delete `path`, tolerating the object having vanished or the service
/// failing on an already-degraded object. Every other failure propagates.
pub fn delete_object_if_exists<B: Bus>(
    bus: &B,
    service: &str,
    path: &str,
) -> Result<(), Error> {
    if path.is_empty() {
        return Ok(());
    }
    match bus.delete(service, path) {
        Ok(()) | Err(BusError::UnknownObject(_)) | Err(BusError::InternalFailure(_)) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Replace the IPv4 address, keeping whichever of address and prefix the
/// caller did not supply. The service has no in-place mutation, so any
/// existing entry is deleted before the new one is created.
pub fn reconfigure_if_addr4<B: Bus>(
    bus: &B,
    params: &ChannelParams,
    address: Option<<Ipv4 as AddrFamily>::Addr>,
    prefix: Option<u8>,
) -> Result<(), Error> {
    let ifaddr = get_if_addr::<Ipv4, _>(bus, params, 0, ORIGINS_V4)?;
    let address = match address.or_else(|| ifaddr.as_ref().map(|a| a.address)) {
        Some(address) => address,
        None => {
            log::error!("Missing address for IPv4 assignment on {}", params.ifname);
            return Err(Error::MissingAddress);
        }
    };
    let mut fallback_prefix = Ipv4::DEFAULT_PREFIX;
    if let Some(ifaddr) = &ifaddr {
        fallback_prefix = ifaddr.prefix;
        delete_object_if_exists(bus, &params.service, &ifaddr.path)?;
    }
    create_if_addr::<Ipv4, _>(bus, params, address, prefix.unwrap_or(fallback_prefix))
}

/// Remove the IPv6 static address at `idx`, if one exists.
pub fn deconfigure_if_addr6<B: Bus>(
    bus: &B,
    params: &ChannelParams,
    idx: u8,
) -> Result<(), Error> {
    let ifaddr =
        get_if_addr::<Ipv6, _>(bus, params, idx, ORIGINS_V6_STATIC)?;
    if let Some(ifaddr) = ifaddr {
        delete_object_if_exists(bus, &params.service, &ifaddr.path)?;
    }
    Ok(())
}

/// Replace the IPv6 static address at `idx`.
pub fn reconfigure_if_addr6<B: Bus>(
    bus: &B,
    params: &ChannelParams,
    idx: u8,
    address: <Ipv6 as AddrFamily>::Addr,
    prefix: u8,
) -> Result<(), Error> {
    deconfigure_if_addr6(bus, params, idx)?;
    create_if_addr::<Ipv6, _>(bus, params, address, prefix)
}

/// Read the MAC of the physical interface.
pub fn get_mac<B: Bus>(bus: &B, params: &ChannelParams) -> Result<MacAddr, Error> {
    let value = bus.get_property(
        &params.service,
        &params.if_path,
        names::INTF_MAC,
        "MACAddress",
    )?;
    let text = value
        .as_str()
        .ok_or_else(|| Error::unexpected_value("MACAddress", format!("{value:?}")))?;
    text.parse()
        .map_err(|_| Error::unexpected_value("MACAddress", text))
}

/// Write the MAC of the physical interface.
pub fn set_mac<B: Bus>(bus: &B, params: &ChannelParams, mac: MacAddr) -> Result<(), Error> {
    bus.set_property(
        &params.service,
        &params.if_path,
        names::INTF_MAC,
        "MACAddress",
        Value::from(mac.to_string()),
    )?;
    Ok(())
}

/// Read the configured gateway for family `F`. An empty property means
/// no gateway is configured.
pub fn get_gateway<F: AddrFamily, B: Bus>(
    bus: &B,
    params: &ChannelParams,
) -> Result<Option<F::Addr>, Error> {
    let value = bus.get_property(
        &params.service,
        &params.logical_path,
        names::INTF_ETHERNET,
        F::GATEWAY_PROPERTY,
    )?;
    let text = value
        .as_str()
        .ok_or_else(|| Error::unexpected_value(F::GATEWAY_PROPERTY, format!("{value:?}")))?;
    if text.is_empty() {
        return Ok(None);
    }
    F::parse(text)
        .map(Some)
        .ok_or_else(|| Error::unexpected_value(F::GATEWAY_PROPERTY, text))
}

/// Write the gateway for family `F`.
pub fn set_gateway<F: AddrFamily, B: Bus>(
    bus: &B,
    params: &ChannelParams,
    gateway: F::Addr,
) -> Result<(), Error> {
    bus.set_property(
        &params.service,
        &params.logical_path,
        names::INTF_ETHERNET,
        F::GATEWAY_PROPERTY,
        Value::from(gateway.to_string()),
    )?;
    Ok(())
}

/// Find the static neighbor entry for `addr`, if any.
pub fn find_static_neighbor<F: AddrFamily>(
    addr: F::Addr,
    neighbors: &ObjectLookup,
) -> Result<Option<IfNeigh<F>>, Error> {
    for (path, props) in neighbors.iter() {
        let ip = match F::parse(prop_str(props, "IPAddress")?) {
            Some(ip) => ip,
            None => continue,
        };
        if ip != addr {
            continue;
        }
        let mac_str = prop_str(props, "MACAddress")?;
        let mac = mac_str
            .parse()
            .map_err(|_| Error::unexpected_value("MACAddress", mac_str))?;
        return Ok(Some(IfNeigh {
            path: path.clone(),
            ip,
            mac,
        }));
    }
    Ok(None)
}

/// Create a static neighbor entry.
pub fn create_neighbor<F: AddrFamily, B: Bus>(
    bus: &B,
    params: &ChannelParams,
    address: F::Addr,
    mac: MacAddr,
) -> Result<(), Error> {
    bus.create_neighbor(
        &params.service,
        &params.logical_path,
        &address.to_string(),
        &mac.to_string(),
    )?;
    Ok(())
}

/// Find the neighbor entry pinning the configured gateway's MAC.
pub fn find_gateway_neighbor<F: AddrFamily, B: Bus>(
    bus: &B,
    params: &ChannelParams,
    neighbors: &ObjectLookup,
) -> Result<Option<IfNeigh<F>>, Error> {
    let gateway = match get_gateway::<F, _>(bus, params)? {
        Some(gateway) => gateway,
        None => return Ok(None),
    };
    find_static_neighbor::<F>(gateway, neighbors)
}

/// [`find_gateway_neighbor`] with a freshly built lookup.
pub fn get_gateway_neighbor<F: AddrFamily, B: Bus>(
    bus: &B,
    params: &ChannelParams,
) -> Result<Option<IfNeigh<F>>, Error> {
    let neighbors = ObjectLookup::new(bus, params, names::INTF_NEIGHBOR)?;
    find_gateway_neighbor::<F, _>(bus, params, &neighbors)
}

/// Re-pin the gateway's MAC: drop any existing neighbor entry for the
/// gateway and create one with `mac`.
pub fn reconfigure_gateway_mac<F: AddrFamily, B: Bus>(
    bus: &B,
    params: &ChannelParams,
    mac: MacAddr,
) -> Result<(), Error> {
    let gateway = match get_gateway::<F, _>(bus, params)? {
        Some(gateway) => gateway,
        None => {
            log::error!("Tried to set gateway MAC without a gateway on {}", params.ifname);
            return Err(Error::MissingGateway);
        }
    };
    let neighbors = ObjectLookup::new(bus, params, names::INTF_NEIGHBOR)?;
    if let Some(neighbor) = find_static_neighbor::<F>(gateway, &neighbors)? {
        delete_object_if_exists(bus, &params.service, &neighbor.path)?;
    }
    create_neighbor::<F, _>(bus, params, gateway, mac)
}

/// Read the VLAN id of the addressable interface, 0 when no VLAN is
/// layered on the physical interface.
pub fn get_vlan_id<B: Bus>(bus: &B, params: &ChannelParams) -> Result<u16, Error> {
    // VLAN devices always have a separate logical object
    if !params.has_vlan() {
        return Ok(0);
    }
    let value = bus.get_property(&params.service, &params.logical_path, names::INTF_VLAN, "Id")?;
    let id = value
        .as_u64()
        .ok_or_else(|| Error::unexpected_value("Id", format!("{value:?}")))?;
    if id & u64::from(VLAN_VALUE_MASK) != id {
        log::error!(
            "Network service returned an invalid vlan {id} for {}",
            params.ifname
        );
        return Err(Error::unexpected_value("Id", id.to_string()));
    }
    Ok(id as u16)
}
