//! The combined v4/v6 DHCP mode and its transition rules.
//!
//! The network service exposes a single mode covering both families, but
//! the IPMI surface toggles one family at a time ("IP Address Source"
//! only ever speaks about IPv4). A one-family request is therefore merged
//! against the current mode so the other family's state survives.

use crate::bus::{names, Bus, Value};
use crate::channel::ChannelParams;
use crate::Error;

/// Which address families are DHCP-managed on an interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DhcpMode {
    None,
    V4,
    V6,
    Both,
}

impl DhcpMode {
    const PREFIX: &'static str = "xyz.openbmc_project.Network.EthernetInterface.DHCPConf.";

    /// Whether IPv4 is DHCP-managed in this mode.
    pub fn v4_enabled(self) -> bool {
        matches!(self, DhcpMode::V4 | DhcpMode::Both)
    }

    /// Whether IPv6 is DHCP-managed in this mode.
    pub fn v6_enabled(self) -> bool {
        matches!(self, DhcpMode::V6 | DhcpMode::Both)
    }

    /// The service's enumeration string for this mode.
    pub fn service_str(self) -> &'static str {
        match self {
            DhcpMode::None => "xyz.openbmc_project.Network.EthernetInterface.DHCPConf.none",
            DhcpMode::V4 => "xyz.openbmc_project.Network.EthernetInterface.DHCPConf.v4",
            DhcpMode::V6 => "xyz.openbmc_project.Network.EthernetInterface.DHCPConf.v6",
            DhcpMode::Both => "xyz.openbmc_project.Network.EthernetInterface.DHCPConf.both",
        }
    }

    /// Parse the service's enumeration string.
    pub fn from_service(value: &str) -> Option<Self> {
        match value.strip_prefix(Self::PREFIX)? {
            "none" => Some(DhcpMode::None),
            "v4" => Some(DhcpMode::V4),
            "v6" => Some(DhcpMode::V6),
            "both" => Some(DhcpMode::Both),
            _ => None,
        }
    }
}

/// Merge a v4-only request into the current mode.
///
/// Only `V4` (enable) and `None` (disable) are meaningful requests; a
/// disable from a state that does not contain v4 leaves the mode
/// untouched, preserving the orthogonal v6 bit.
pub fn next_v4_mode(current: DhcpMode, requested: DhcpMode) -> DhcpMode {
    match requested {
        DhcpMode::V4 => match current {
            DhcpMode::V6 => DhcpMode::Both,
            DhcpMode::None => DhcpMode::V4,
            other => other,
        },
        DhcpMode::None => match current {
            DhcpMode::Both => DhcpMode::V6,
            DhcpMode::V4 => DhcpMode::None,
            other => other,
        },
        _ => current,
    }
}

/// Merge a v6-only request into the current mode. Mirror image of
/// [`next_v4_mode`].
pub fn next_v6_mode(current: DhcpMode, requested: DhcpMode) -> DhcpMode {
    match requested {
        DhcpMode::V6 => match current {
            DhcpMode::V4 => DhcpMode::Both,
            DhcpMode::None => DhcpMode::V6,
            other => other,
        },
        DhcpMode::None => match current {
            DhcpMode::Both => DhcpMode::V4,
            DhcpMode::V6 => DhcpMode::None,
            other => other,
        },
        _ => current,
    }
}

/// Read the DHCP mode of the addressable interface.
pub fn get_dhcp_mode<B: Bus>(bus: &B, params: &ChannelParams) -> Result<DhcpMode, Error> {
    let value = bus.get_property(
        &params.service,
        &params.logical_path,
        names::INTF_ETHERNET,
        "DHCPEnabled",
    )?;
    let text = value
        .as_str()
        .ok_or_else(|| Error::unexpected_value("DHCPEnabled", format!("{value:?}")))?;
    DhcpMode::from_service(text).ok_or_else(|| Error::unexpected_value("DHCPEnabled", text))
}

fn write_dhcp_mode<B: Bus>(bus: &B, params: &ChannelParams, mode: DhcpMode) -> Result<(), Error> {
    bus.set_property(
        &params.service,
        &params.logical_path,
        names::INTF_ETHERNET,
        "DHCPEnabled",
        Value::from(mode.service_str()),
    )?;
    Ok(())
}

/// Apply a v4 DHCP request, merging it with the current mode.
pub fn set_dhcp_v4<B: Bus>(
    bus: &B,
    params: &ChannelParams,
    requested: DhcpMode,
) -> Result<(), Error> {
    let current = get_dhcp_mode(bus, params)?;
    write_dhcp_mode(bus, params, next_v4_mode(current, requested))
}

/// Apply a v6 DHCP request.
///
/// When `exclusive` the request is merged with the current mode like a v4
/// request; otherwise `requested` is written verbatim. The verbatim form
/// lets VLAN reconfiguration restore a snapshotted mode exactly instead
/// of merging against whatever transient state the teardown left behind.
pub fn set_dhcp_v6<B: Bus>(
    bus: &B,
    params: &ChannelParams,
    requested: DhcpMode,
    exclusive: bool,
) -> Result<(), Error> {
    let mode = if exclusive {
        let current = get_dhcp_mode(bus, params)?;
        next_v6_mode(current, requested)
    } else {
        requested
    };
    write_dhcp_mode(bus, params, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use DhcpMode::*;

    #[test]
    fn v4_merge_table() {
        // enable v4
        assert_eq!(next_v4_mode(None, V4), V4);
        assert_eq!(next_v4_mode(V4, V4), V4);
        assert_eq!(next_v4_mode(V6, V4), Both);
        assert_eq!(next_v4_mode(Both, V4), Both);
        // disable v4
        assert_eq!(next_v4_mode(None, DhcpMode::None), DhcpMode::None);
        assert_eq!(next_v4_mode(V4, DhcpMode::None), DhcpMode::None);
        assert_eq!(next_v4_mode(V6, DhcpMode::None), V6);
        assert_eq!(next_v4_mode(Both, DhcpMode::None), V6);
    }

    #[test]
    fn v6_merge_table() {
        // enable v6
        assert_eq!(next_v6_mode(None, V6), V6);
        assert_eq!(next_v6_mode(V6, V6), V6);
        assert_eq!(next_v6_mode(V4, V6), Both);
        assert_eq!(next_v6_mode(Both, V6), Both);
        // disable v6
        assert_eq!(next_v6_mode(None, DhcpMode::None), DhcpMode::None);
        assert_eq!(next_v6_mode(V6, DhcpMode::None), DhcpMode::None);
        assert_eq!(next_v6_mode(V4, DhcpMode::None), V4);
        assert_eq!(next_v6_mode(Both, DhcpMode::None), V4);
    }

    #[test]
    fn non_exclusive_write_is_verbatim() {
        use crate::channel::channel_params;
        use crate::testutil::{channel_table, FakeBus};

        let bus = FakeBus::new();
        bus.set_dhcp("eth0", V4);
        let params = channel_params(&bus, &channel_table(), 1).unwrap();
        // the exclusive form would merge and keep v4 alive
        set_dhcp_v6(&bus, &params, DhcpMode::None, false).unwrap();
        assert_eq!(bus.dhcp("eth0"), DhcpMode::None);
        set_dhcp_v6(&bus, &params, Both, false).unwrap();
        assert_eq!(bus.dhcp("eth0"), Both);

        bus.set_dhcp("eth0", V4);
        set_dhcp_v6(&bus, &params, V6, true).unwrap();
        assert_eq!(bus.dhcp("eth0"), Both);
    }

    #[test]
    fn service_string_round_trip() {
        for mode in [None, V4, V6, Both] {
            assert_eq!(DhcpMode::from_service(mode.service_str()), Some(mode));
        }
        assert_eq!(DhcpMode::from_service("v4"), Option::None);
    }
}
