//! Channel metadata and per-command channel resolution.
//!
//! A LAN channel maps 1:1 to a network interface. The mapping from
//! channel number to interface name, together with validity, session
//! support and medium, is owned by the host IPMI stack and consumed here
//! through the [`Channels`] trait. [`ChannelParams`] is resolved fresh
//! for every command because the backing interface topology (in
//! particular any VLAN sub-interface) may change between commands.

use std::collections::BTreeMap;

use crate::bus::{names, Bus};
use crate::Error;

/// Channel number meaning "the channel this command arrived on".
pub const CURRENT_CHANNEL: u8 = 0x0E;

/// Resolve the 4-bit channel field of a request against the channel the
/// command arrived on.
pub fn convert_current(channel: u8, ctx_channel: u8) -> u8 {
    if channel == CURRENT_CHANNEL {
        ctx_channel
    } else {
        channel
    }
}

/// Session support of a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionSupport {
    /// Channel is session-less.
    None,
    /// Channel supports one session.
    Single,
    /// Channel supports multiple sessions.
    Multi,
    /// Session support varies.
    Any,
}

/// Channel metadata provided by the host IPMI stack.
pub trait Channels {
    /// The interface name backing `channel`, if the channel exists and
    /// is a LAN channel with an interface.
    fn name(&self, channel: u8) -> Option<String>;

    /// Whether `channel` is a configured channel number.
    fn is_valid(&self, channel: u8) -> bool {
        self.name(channel).is_some()
    }

    /// Session support of `channel`.
    fn session_support(&self, channel: u8) -> SessionSupport;

    /// Whether `channel` is a LAN (802.3) channel.
    fn is_lan(&self, channel: u8) -> bool;
}

/// One channel's metadata in a [`ChannelTable`].
#[derive(Clone, Debug)]
pub struct ChannelEntry {
    pub ifname: String,
    pub session_support: SessionSupport,
    pub is_lan: bool,
}

impl ChannelEntry {
    /// A multi-session LAN channel, the common case.
    pub fn lan(ifname: impl Into<String>) -> Self {
        Self {
            ifname: ifname.into(),
            session_support: SessionSupport::Multi,
            is_lan: true,
        }
    }
}

/// A fixed, map-backed [`Channels`] implementation.
#[derive(Clone, Debug, Default)]
pub struct ChannelTable {
    entries: BTreeMap<u8, ChannelEntry>,
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a channel.
    pub fn insert(&mut self, channel: u8, entry: ChannelEntry) -> &mut Self {
        self.entries.insert(channel, entry);
        self
    }
}

impl Channels for ChannelTable {
    fn name(&self, channel: u8) -> Option<String> {
        self.entries.get(&channel).map(|e| e.ifname.clone())
    }

    fn session_support(&self, channel: u8) -> SessionSupport {
        self.entries
            .get(&channel)
            .map(|e| e.session_support)
            .unwrap_or(SessionSupport::None)
    }

    fn is_lan(&self, channel: u8) -> bool {
        self.entries.get(&channel).map(|e| e.is_lan).unwrap_or(false)
    }
}

/// The resolved object topology backing one channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelParams {
    /// The channel number.
    pub id: u8,
    /// Name of the backing network interface.
    pub ifname: String,
    /// Service owning the interface objects.
    pub service: String,
    /// Object path of the physical ethernet interface.
    pub if_path: String,
    /// Object path of the addressable interface: the VLAN sub-interface
    /// when one exists, otherwise equal to `if_path`.
    pub logical_path: String,
}

impl ChannelParams {
    /// Whether a VLAN sub-interface is layered on the physical interface.
    pub fn has_vlan(&self) -> bool {
        self.logical_path != self.if_path
    }
}

/// Resolve `channel` to its interface objects. `Ok(None)` when the
/// channel has no name or no physical interface object exists.
pub fn maybe_channel_params<B: Bus, C: Channels + ?Sized>(
    bus: &B,
    channels: &C,
    channel: u8,
) -> Result<Option<ChannelParams>, Error> {
    let ifname = match channels.name(channel) {
        Some(name) if !name.is_empty() => name,
        _ => return Ok(None),
    };

    // Enumerate all VLAN + ethernet interface objects
    let objs = bus.get_sub_tree(names::PATH_ROOT, &[names::INTF_VLAN, names::INTF_ETHERNET])?;

    let mut service = String::new();
    let mut if_path = String::new();
    let mut logical_path = String::new();
    for (path, impls) in &objs {
        if !path.contains(&ifname) {
            continue;
        }
        for (owner, intfs) in impls {
            let vlan = intfs.iter().any(|i| i == names::INTF_VLAN);
            let ethernet = intfs.iter().any(|i| i == names::INTF_ETHERNET);
            if service.is_empty() && (vlan || ethernet) {
                service = owner.clone();
            }
            if if_path.is_empty() && ethernet && !vlan {
                if_path = path.clone();
            }
            if logical_path.is_empty() && vlan {
                logical_path = path.clone();
            }
        }
    }

    // The physical interface must exist
    if if_path.is_empty() {
        return Ok(None);
    }
    // No VLAN layered on top, so the logical path is the same
    if logical_path.is_empty() {
        logical_path = if_path.clone();
    }

    Ok(Some(ChannelParams {
        id: channel,
        ifname,
        service,
        if_path,
        logical_path,
    }))
}

/// Resolve `channel`, treating an unresolvable channel as an error.
pub fn channel_params<B: Bus, C: Channels + ?Sized>(
    bus: &B,
    channels: &C,
    channel: u8,
) -> Result<ChannelParams, Error> {
    match maybe_channel_params(bus, channels, channel)? {
        Some(params) => Ok(params),
        None => {
            log::error!("No interface objects found for channel {channel}");
            Err(Error::ChannelNotFound(channel))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{channel_table, FakeBus, SERVICE};

    #[test]
    fn resolves_physical_interface() {
        let bus = FakeBus::new();
        let params = channel_params(&bus, &channel_table(), 1).unwrap();
        assert_eq!(params.id, 1);
        assert_eq!(params.ifname, "eth0");
        assert_eq!(params.service, SERVICE);
        assert!(!params.has_vlan());
        assert!(params.if_path.ends_with("/eth0"));
    }

    #[test]
    fn vlan_object_becomes_logical_path() {
        let bus = FakeBus::new();
        let vlan_path = bus.create_vlan(SERVICE, "eth0", 100).unwrap();
        let params = channel_params(&bus, &channel_table(), 1).unwrap();
        assert!(params.has_vlan());
        assert_eq!(params.logical_path, vlan_path);
        assert!(params.if_path.ends_with("/eth0"));
    }

    #[test]
    fn unknown_channel_is_not_found() {
        let bus = FakeBus::new();
        assert!(maybe_channel_params(&bus, &channel_table(), 5)
            .unwrap()
            .is_none());
        assert!(matches!(
            channel_params(&bus, &channel_table(), 5),
            Err(Error::ChannelNotFound(5))
        ));
    }

    #[test]
    fn current_channel_resolution() {
        assert_eq!(convert_current(CURRENT_CHANNEL, 3), 3);
        assert_eq!(convert_current(2, 3), 2);
    }
}
