//! VLAN creation and teardown with full state carry-over.
//!
//! The network service has no primitive for migrating an interface's
//! configuration onto a newly created VLAN sub-interface, so changing the
//! VLAN id is an explicit save / tear-down / recreate / restore sequence.
//! The sequence is best-effort: a failure part-way through surfaces as an
//! error without rolling back what already happened.

use super::dhcp::{get_dhcp_mode, set_dhcp_v6, DhcpMode};
use super::{
    create_if_addr, create_neighbor, delete_object_if_exists, find_gateway_neighbor,
    find_if_addr, ObjectLookup, MAX_IPV6_STATIC_ADDRESSES,
};
use crate::bus::{names, Bus};
use crate::channel::ChannelParams;
use crate::family::{Ipv4, Ipv6, ORIGINS_V4, ORIGINS_V6_STATIC};
use crate::Error;

/// Delete every deletable object belonging to the channel's interface and
/// force DHCP off on what remains.
///
/// If the VLAN object itself is among the deleted objects the logical
/// path reverts to the physical interface.
pub fn deconfigure_channel<B: Bus>(bus: &B, params: &mut ChannelParams) -> Result<(), Error> {
    let objs = bus.get_sub_tree(names::PATH_ROOT, &[names::INTF_DELETE])?;
    for (path, impls) in &objs {
        if !path.contains(&params.ifname) {
            continue;
        }
        for service in impls.keys() {
            delete_object_if_exists(bus, service, path)?;
        }
        if *path == params.logical_path {
            params.logical_path = params.if_path.clone();
        }
    }

    // Leave the lower physical interface with a clean slate
    set_dhcp_v6(bus, params, DhcpMode::None, false)
}

/// Create a VLAN sub-interface and adopt it as the logical path. An id of
/// 0 means "no VLAN" and leaves the physical interface in place.
pub fn create_vlan<B: Bus>(bus: &B, params: &mut ChannelParams, vlan: u16) -> Result<(), Error> {
    if vlan == 0 {
        return Ok(());
    }
    let path = bus.create_vlan(&params.service, &params.ifname, u32::from(vlan))?;
    params.logical_path = path;
    Ok(())
}

/// Move the channel onto VLAN `vlan` (0 = disabled), carrying over the
/// static addresses, the DHCP mode and the pinned gateway neighbors.
pub fn reconfigure_vlan<B: Bus>(
    bus: &B,
    params: &mut ChannelParams,
    vlan: u16,
) -> Result<(), Error> {
    // Save info from the old logical interface. IPv6 static slots are
    // densely packed, so the scan stops at the first empty one.
    let ips = ObjectLookup::new(bus, params, names::INTF_IP)?;
    let ifaddr4 = find_if_addr::<Ipv4>(0, ORIGINS_V4, &ips)?;
    let mut ifaddrs6 = Vec::new();
    for idx in 0..MAX_IPV6_STATIC_ADDRESSES {
        match find_if_addr::<Ipv6>(idx, ORIGINS_V6_STATIC, &ips)? {
            Some(ifaddr) => ifaddrs6.push(ifaddr),
            None => break,
        }
    }
    let dhcp = get_dhcp_mode(bus, params)?;
    let neighbors = ObjectLookup::new(bus, params, names::INTF_NEIGHBOR)?;
    let neighbor4 = find_gateway_neighbor::<Ipv4, _>(bus, params, &neighbors)?;
    let neighbor6 = find_gateway_neighbor::<Ipv6, _>(bus, params, &neighbors)?;

    deconfigure_channel(bus, params)?;
    create_vlan(bus, params, vlan)?;

    // Re-establish the saved settings. The DHCP write is verbatim so both
    // families come back exactly as snapshotted.
    set_dhcp_v6(bus, params, dhcp, false)?;
    if let Some(ifaddr) = &ifaddr4 {
        create_if_addr::<Ipv4, _>(bus, params, ifaddr.address, ifaddr.prefix)?;
    }
    for ifaddr in &ifaddrs6 {
        create_if_addr::<Ipv6, _>(bus, params, ifaddr.address, ifaddr.prefix)?;
    }
    if let Some(neighbor) = &neighbor4 {
        create_neighbor::<Ipv4, _>(bus, params, neighbor.ip, neighbor.mac)?;
    }
    if let Some(neighbor) = &neighbor6 {
        create_neighbor::<Ipv6, _>(bus, params, neighbor.ip, neighbor.mac)?;
    }
    Ok(())
}
