//! Set/Get LAN Configuration Parameters.
//!
//! Reference: IPMI 2.0 Specification, Section 23, Tables 23-2 through
//! 23-4. Every parameter branch unpacks exactly the fields the encoding
//! defines, rejects nonzero reserved bits, validates, performs the effect
//! against the network service and answers with a completion code.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::bus::Bus;
use crate::channel::{convert_current, Channels, SessionSupport};
use crate::cipher::{self, MAX_CIPHER_RECORDS, PRIVILEGE_OEM};
use crate::codec::Payload;
use crate::completion::CompletionCode;
use crate::family::{
    netmask_to_prefix, prefix_to_netmask, AddrFamily, AddressOrigin, Ipv4, Ipv6, MacAddr,
    ORIGINS_V4, ORIGINS_V6_DYNAMIC, ORIGINS_V6_STATIC,
};
use crate::network::dhcp::{get_dhcp_mode, set_dhcp_v4, DhcpMode};
use crate::network::vlan::reconfigure_vlan;
use crate::network::{
    deconfigure_if_addr6, get_gateway, get_gateway_neighbor, get_if_addr, get_mac, get_vlan_id,
    reconfigure_gateway_mac, reconfigure_if_addr4, reconfigure_if_addr6, set_gateway, set_mac,
    MAX_IPV6_DYNAMIC_ADDRESSES, MAX_IPV6_STATIC_ADDRESSES, VLAN_ENABLE_FLAG, VLAN_VALUE_MASK,
};
use crate::{internal_error, success, unpack, CommandResult, TransportHandler};

/// Set LAN Configuration Parameters command number.
pub const CMD_SET_LAN_CONFIG_PARAMETERS: u8 = 0x01;
/// Get LAN Configuration Parameters command number.
pub const CMD_GET_LAN_CONFIG_PARAMETERS: u8 = 0x02;

/// Revision of the parameter format implemented here.
const LAN_PARAM_REVISION: u8 = 0x11;

const OEM_PARAM_START: u8 = 192;
const OEM_PARAM_END: u8 = 255;

/// The Set-In-Progress state of a channel.
///
/// Volatile, process lifetime only: a restarted daemon comes back with
/// every channel in `Complete`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SetStatus {
    #[default]
    Complete,
    InProgress,
    Commit,
}

impl SetStatus {
    fn value(self) -> u8 {
        match self {
            SetStatus::Complete => 0,
            SetStatus::InProgress => 1,
            SetStatus::Commit => 2,
        }
    }
}

impl TryFrom<u8> for SetStatus {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(SetStatus::Complete),
            1 => Ok(SetStatus::InProgress),
            2 => Ok(SetStatus::Commit),
            _ => Err(()),
        }
    }
}

/// LAN configuration parameter selectors.
///
/// Reference: IPMI 2.0 Specification, Table 23-4.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LanParam {
    SetStatus,
    AuthSupport,
    AuthEnables,
    Ip,
    IpSrc,
    Mac,
    SubnetMask,
    Gateway1,
    Gateway1Mac,
    VlanId,
    CipherSuiteSupport,
    CipherSuiteEntries,
    CipherSuitePrivileges,
    IpFamilySupport,
    IpFamilyEnables,
    Ipv6Status,
    Ipv6StaticAddresses,
    Ipv6DynamicAddresses,
    Ipv6RouterControl,
    Ipv6StaticRouter1Ip,
    Ipv6StaticRouter1Mac,
    Ipv6StaticRouter1PrefixLength,
    Ipv6StaticRouter1PrefixValue,
}

impl TryFrom<u8> for LanParam {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(Self::SetStatus),
            1 => Ok(Self::AuthSupport),
            2 => Ok(Self::AuthEnables),
            3 => Ok(Self::Ip),
            4 => Ok(Self::IpSrc),
            5 => Ok(Self::Mac),
            6 => Ok(Self::SubnetMask),
            12 => Ok(Self::Gateway1),
            13 => Ok(Self::Gateway1Mac),
            20 => Ok(Self::VlanId),
            22 => Ok(Self::CipherSuiteSupport),
            23 => Ok(Self::CipherSuiteEntries),
            24 => Ok(Self::CipherSuitePrivileges),
            50 => Ok(Self::IpFamilySupport),
            51 => Ok(Self::IpFamilyEnables),
            55 => Ok(Self::Ipv6Status),
            56 => Ok(Self::Ipv6StaticAddresses),
            59 => Ok(Self::Ipv6DynamicAddresses),
            64 => Ok(Self::Ipv6RouterControl),
            65 => Ok(Self::Ipv6StaticRouter1Ip),
            66 => Ok(Self::Ipv6StaticRouter1Mac),
            67 => Ok(Self::Ipv6StaticRouter1PrefixLength),
            68 => Ok(Self::Ipv6StaticRouter1PrefixValue),
            _ => Err(()),
        }
    }
}

/// IP address source values of the IPSrc parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IpSrc {
    Unspecified,
    Static,
    Dhcp,
    Bios,
    Bmc,
}

impl TryFrom<u8> for IpSrc {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(Self::Unspecified),
            1 => Ok(Self::Static),
            2 => Ok(Self::Dhcp),
            3 => Ok(Self::Bios),
            4 => Ok(Self::Bmc),
            _ => Err(()),
        }
    }
}

/// Source nibble of an IPv6 address record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Ipv6Source {
    Static = 0,
    Slaac = 1,
    Dhcp = 2,
}

impl Ipv6Source {
    fn from_origin(origin: AddressOrigin) -> Option<Self> {
        match origin {
            AddressOrigin::Static => Some(Self::Static),
            AddressOrigin::Slaac => Some(Self::Slaac),
            AddressOrigin::Dhcp => Some(Self::Dhcp),
            AddressOrigin::LinkLocal => None,
        }
    }
}

/// Status byte of an IPv6 address record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Ipv6AddressStatus {
    Active = 0,
    Disabled = 1,
}

/// IP addressing support values of the family-enables parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IpFamilyEnables {
    Ipv4Only = 0,
    Ipv6Only = 1,
    DualStack = 2,
}

impl TryFrom<u8> for IpFamilyEnables {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(Self::Ipv4Only),
            1 => Ok(Self::Ipv6Only),
            2 => Ok(Self::DualStack),
            _ => Err(()),
        }
    }
}

bitflags::bitflags! {
    /// Flags of the IP family support parameter.
    struct IpFamilySupport: u8 {
        const IPV6_ONLY = 1 << 0;
        const DUAL_STACK = 1 << 1;
        const IPV6_ALERTS = 1 << 2;
    }
}

bitflags::bitflags! {
    /// Capability flags of the IPv6 status parameter.
    struct Ipv6StatusFlags: u8 {
        const DHCP = 1 << 0;
        const SLAAC = 1 << 1;
    }
}

bitflags::bitflags! {
    /// Flags of the IPv6 router address configuration control parameter.
    struct RouterControl: u8 {
        const STATIC = 1 << 0;
        const DYNAMIC = 1 << 1;
    }
}

/// Handler for the OEM parameter range 192..=255.
///
/// Installed at handler construction; the default implementation answers
/// "parameter not supported" for every id. A get implementation is
/// responsible for the complete response payload, including the leading
/// parameter revision byte.
pub trait OemHandler {
    fn set_lan(&mut self, channel: u8, parameter: u8, req: &mut Payload) -> CommandResult;
    fn get_lan(
        &mut self,
        channel: u8,
        parameter: u8,
        set_selector: u8,
        block_selector: u8,
    ) -> CommandResult;
}

/// The default OEM hook.
pub struct OemNotSupported;

impl OemHandler for OemNotSupported {
    fn set_lan(&mut self, _channel: u8, _parameter: u8, req: &mut Payload) -> CommandResult {
        req.trailing_ok = true;
        Err(CompletionCode::ParamNotSupported)
    }

    fn get_lan(&mut self, _channel: u8, _parameter: u8, _set: u8, _block: u8) -> CommandResult {
        Err(CompletionCode::ParamNotSupported)
    }
}

impl<B: Bus, C: Channels> TransportHandler<B, C> {
    fn dhcp_mode(&self, channel: u8) -> Result<DhcpMode, CompletionCode> {
        self.with_params(channel, |bus, params| get_dhcp_mode(bus, params))
    }

    /// Handle a Set LAN Configuration Parameters request.
    ///
    /// `ctx_channel` is the channel the command arrived on, substituted
    /// when the request addresses channel 0x0E.
    pub fn set_lan(&mut self, ctx_channel: u8, req: &mut Payload) -> CommandResult {
        let channel_bits = unpack(req.unpack_bits(4))? as u8;
        let reserved = unpack(req.unpack_bits(4))?;
        let parameter = unpack(req.unpack_u8())?;

        let channel = convert_current(channel_bits, ctx_channel);
        if reserved != 0 || !self.channels.is_valid(channel) {
            log::error!("Set Lan - invalid field in request");
            req.trailing_ok = true;
            return Err(CompletionCode::InvalidFieldInRequest);
        }

        let param = match LanParam::try_from(parameter) {
            Ok(param) => param,
            Err(()) => {
                if (OEM_PARAM_START..=OEM_PARAM_END).contains(&parameter) {
                    return self.oem.set_lan(channel, parameter, req);
                }
                req.trailing_ok = true;
                return Err(CompletionCode::ParamNotSupported);
            }
        };

        match param {
            LanParam::SetStatus => {
                let flag = unpack(req.unpack_bits(2))? as u8;
                let rsvd = unpack(req.unpack_bits(6))?;
                if !req.fully_unpacked() {
                    return Err(CompletionCode::ReqDataLenInvalid);
                }
                if rsvd != 0 {
                    return Err(CompletionCode::InvalidFieldInRequest);
                }
                let status =
                    SetStatus::try_from(flag).map_err(|()| CompletionCode::ParamNotSupported)?;
                match status {
                    SetStatus::Complete => {
                        self.set_status.insert(channel, status);
                        success()
                    }
                    SetStatus::InProgress => {
                        let stored = self.set_status.entry(channel).or_default();
                        if *stored == SetStatus::InProgress {
                            return Err(CompletionCode::ParamSetLocked);
                        }
                        *stored = status;
                        success()
                    }
                    SetStatus::Commit => {
                        if self.set_status.get(&channel).copied().unwrap_or_default()
                            != SetStatus::InProgress
                        {
                            return Err(CompletionCode::InvalidFieldInRequest);
                        }
                        success()
                    }
                }
            }
            LanParam::AuthSupport
            | LanParam::AuthEnables
            | LanParam::CipherSuiteSupport
            | LanParam::CipherSuiteEntries
            | LanParam::IpFamilySupport
            | LanParam::Ipv6Status
            | LanParam::Ipv6DynamicAddresses => {
                req.trailing_ok = true;
                Err(CompletionCode::ParamReadOnly)
            }
            LanParam::Ip => {
                if self.dhcp_mode(channel)?.v4_enabled() {
                    return Err(CompletionCode::CommandNotAvailable);
                }
                let bytes = unpack(req.unpack_array::<4>())?;
                if !req.fully_unpacked() {
                    return Err(CompletionCode::ReqDataLenInvalid);
                }
                let ip = Ipv4Addr::from(bytes);
                self.with_params(channel, |bus, params| {
                    reconfigure_if_addr4(bus, params, Some(ip), None)
                })?;
                success()
            }
            LanParam::IpSrc => {
                let flag = unpack(req.unpack_bits(4))? as u8;
                let rsvd = unpack(req.unpack_bits(4))?;
                if !req.fully_unpacked() {
                    return Err(CompletionCode::ReqDataLenInvalid);
                }
                if rsvd != 0 {
                    return Err(CompletionCode::InvalidFieldInRequest);
                }
                match IpSrc::try_from(flag) {
                    // The IPSrc command only ever manages IPv4; IPv6 has
                    // its own parameters, so the v4 merge keeps v6 alone.
                    Ok(IpSrc::Dhcp) => {
                        self.with_params(channel, |bus, params| {
                            set_dhcp_v4(bus, params, DhcpMode::V4)
                        })?;
                        success()
                    }
                    Ok(IpSrc::Unspecified) | Ok(IpSrc::Static) => {
                        self.with_params(channel, |bus, params| {
                            set_dhcp_v4(bus, params, DhcpMode::None)
                        })?;
                        success()
                    }
                    Ok(IpSrc::Bios) | Ok(IpSrc::Bmc) => {
                        Err(CompletionCode::InvalidFieldInRequest)
                    }
                    Err(()) => Err(CompletionCode::ParamNotSupported),
                }
            }
            LanParam::Mac => {
                let bytes = unpack(req.unpack_array::<6>())?;
                if !req.fully_unpacked() {
                    return Err(CompletionCode::ReqDataLenInvalid);
                }
                let mac = MacAddr(bytes);
                // only non-zero unicast addresses are assignable
                if mac.is_zero() || mac.is_multicast() {
                    return Err(CompletionCode::InvalidFieldInRequest);
                }
                self.with_params(channel, |bus, params| set_mac(bus, params, mac))?;
                success()
            }
            LanParam::SubnetMask => {
                if self.dhcp_mode(channel)?.v4_enabled() {
                    return Err(CompletionCode::CommandNotAvailable);
                }
                let bytes = unpack(req.unpack_array::<4>())?;
                if !req.fully_unpacked() {
                    return Err(CompletionCode::ReqDataLenInvalid);
                }
                let prefix = netmask_to_prefix(Ipv4Addr::from(bytes))
                    .ok_or(CompletionCode::InvalidFieldInRequest)?;
                self.with_params(channel, |bus, params| {
                    reconfigure_if_addr4(bus, params, None, Some(prefix))
                })?;
                success()
            }
            LanParam::Gateway1 => {
                if self.dhcp_mode(channel)?.v4_enabled() {
                    return Err(CompletionCode::CommandNotAvailable);
                }
                let bytes = unpack(req.unpack_array::<4>())?;
                if !req.fully_unpacked() {
                    return Err(CompletionCode::ReqDataLenInvalid);
                }
                let gateway = Ipv4Addr::from(bytes);
                self.with_params(channel, |bus, params| {
                    set_gateway::<Ipv4, _>(bus, params, gateway)
                })?;
                success()
            }
            LanParam::Gateway1Mac => {
                let bytes = unpack(req.unpack_array::<6>())?;
                if !req.fully_unpacked() {
                    return Err(CompletionCode::ReqDataLenInvalid);
                }
                let mac = MacAddr(bytes);
                self.with_params(channel, |bus, params| {
                    reconfigure_gateway_mac::<Ipv4, _>(bus, params, mac)
                })?;
                success()
            }
            LanParam::VlanId => {
                let vlan_data = unpack(req.unpack_bits(12))? as u16;
                let rsvd = unpack(req.unpack_bits(3))?;
                let vlan_enable = unpack(req.unpack_bool())?;
                if !req.fully_unpacked() {
                    return Err(CompletionCode::ReqDataLenInvalid);
                }
                if rsvd != 0 {
                    return Err(CompletionCode::InvalidFieldInRequest);
                }

                let mut vlan = vlan_data;
                if !vlan_enable {
                    // Remember the id so readback keeps satisfying tools
                    // that verify their disable took effect.
                    self.last_disabled_vlan.insert(channel, vlan);
                    vlan = 0;
                } else if vlan == 0 || vlan == VLAN_VALUE_MASK {
                    return Err(CompletionCode::InvalidFieldInRequest);
                }

                self.with_params(channel, |bus, params| reconfigure_vlan(bus, params, vlan))?;
                success()
            }
            LanParam::CipherSuitePrivileges => {
                let reserved = unpack(req.unpack_u8())?;
                let mut levels = [0u8; MAX_CIPHER_RECORDS];
                for slot in levels.iter_mut() {
                    *slot = unpack(req.unpack_bits(4))? as u8;
                }
                if !req.fully_unpacked() {
                    return Err(CompletionCode::ReqDataLenInvalid);
                }
                if reserved != 0 || levels.iter().any(|level| *level > PRIVILEGE_OEM) {
                    return Err(CompletionCode::InvalidFieldInRequest);
                }
                cipher::set_cs_privilege_levels(&self.paths, channel, levels)
                    .map_err(internal_error)?;
                success()
            }
            LanParam::IpFamilyEnables => {
                let enables = unpack(req.unpack_u8())?;
                if !req.fully_unpacked() {
                    return Err(CompletionCode::ReqDataLenInvalid);
                }
                match IpFamilyEnables::try_from(enables) {
                    Ok(IpFamilyEnables::DualStack) => success(),
                    _ => Err(CompletionCode::ParamNotSupported),
                }
            }
            LanParam::Ipv6StaticAddresses => {
                let set = unpack(req.unpack_u8())?;
                let rsvd = unpack(req.unpack_bits(7))?;
                let enabled = unpack(req.unpack_bool())?;
                let bytes = unpack(req.unpack_array::<16>())?;
                let prefix = unpack(req.unpack_u8())?;
                let _status = unpack(req.unpack_u8())?;
                if !req.fully_unpacked() {
                    return Err(CompletionCode::ReqDataLenInvalid);
                }
                if rsvd != 0 {
                    return Err(CompletionCode::InvalidFieldInRequest);
                }
                if set >= MAX_IPV6_STATIC_ADDRESSES {
                    return Err(CompletionCode::ParamOutOfRange);
                }
                let address = Ipv6Addr::from(bytes);
                if enabled {
                    self.with_params(channel, |bus, params| {
                        reconfigure_if_addr6(bus, params, set, address, prefix)
                    })?;
                } else {
                    self.with_params(channel, |bus, params| {
                        deconfigure_if_addr6(bus, params, set)
                    })?;
                }
                success()
            }
            LanParam::Ipv6RouterControl => {
                let control = unpack(req.unpack_u8())?;
                if !req.fully_unpacked() {
                    return Err(CompletionCode::ReqDataLenInvalid);
                }
                let expected = if self.dhcp_mode(channel)?.v6_enabled() {
                    RouterControl::DYNAMIC
                } else {
                    RouterControl::STATIC
                };
                // routing control tracks the DHCP mode; only the value
                // already in force is accepted
                if control != expected.bits() {
                    return Err(CompletionCode::InvalidFieldInRequest);
                }
                success()
            }
            LanParam::Ipv6StaticRouter1Ip => {
                let bytes = unpack(req.unpack_array::<16>())?;
                if !req.fully_unpacked() {
                    return Err(CompletionCode::ReqDataLenInvalid);
                }
                let gateway = Ipv6Addr::from(bytes);
                self.with_params(channel, |bus, params| {
                    set_gateway::<Ipv6, _>(bus, params, gateway)
                })?;
                success()
            }
            LanParam::Ipv6StaticRouter1Mac => {
                let bytes = unpack(req.unpack_array::<6>())?;
                if !req.fully_unpacked() {
                    return Err(CompletionCode::ReqDataLenInvalid);
                }
                let mac = MacAddr(bytes);
                self.with_params(channel, |bus, params| {
                    reconfigure_gateway_mac::<Ipv6, _>(bus, params, mac)
                })?;
                success()
            }
            LanParam::Ipv6StaticRouter1PrefixLength => {
                let prefix = unpack(req.unpack_u8())?;
                if !req.fully_unpacked() {
                    return Err(CompletionCode::ReqDataLenInvalid);
                }
                if prefix != 0 {
                    return Err(CompletionCode::InvalidFieldInRequest);
                }
                success()
            }
            LanParam::Ipv6StaticRouter1PrefixValue => {
                let _bytes = unpack(req.unpack_array::<16>())?;
                if !req.fully_unpacked() {
                    return Err(CompletionCode::ReqDataLenInvalid);
                }
                // any value is acceptable since the prefix length is 0
                success()
            }
        }
    }

    /// Handle a Get LAN Configuration Parameters request.
    ///
    /// Successful responses lead with the parameter revision byte.
    pub fn get_lan(&mut self, ctx_channel: u8, req: &mut Payload) -> CommandResult {
        let channel_bits = unpack(req.unpack_bits(4))? as u8;
        let reserved = unpack(req.unpack_bits(3))?;
        let rev_only = unpack(req.unpack_bool())?;
        let parameter = unpack(req.unpack_u8())?;
        let set = unpack(req.unpack_u8())?;
        let block = unpack(req.unpack_u8())?;
        if !req.fully_unpacked() {
            return Err(CompletionCode::ReqDataLenInvalid);
        }

        let mut ret = Payload::new();
        ret.pack_u8(LAN_PARAM_REVISION);
        if rev_only {
            return Ok(ret);
        }

        let channel = convert_current(channel_bits, ctx_channel);
        if reserved != 0 || !self.channels.is_valid(channel) {
            log::error!("Get Lan - invalid field in request");
            return Err(CompletionCode::InvalidFieldInRequest);
        }

        if self.cipher_list.is_none() {
            self.cipher_list = cipher::load_cipher_list(&self.paths.cipher_list).ok();
        }

        let param = match LanParam::try_from(parameter) {
            Ok(param) => param,
            Err(()) => {
                if (OEM_PARAM_START..=OEM_PARAM_END).contains(&parameter) {
                    return self.oem.get_lan(channel, parameter, set, block);
                }
                return Err(CompletionCode::ParamNotSupported);
            }
        };

        match param {
            LanParam::SetStatus => {
                let status = self.set_status.get(&channel).copied().unwrap_or_default();
                ret.pack_bits(status.value() as u32, 2);
                ret.pack_bits(0, 6);
                Ok(ret)
            }
            LanParam::AuthSupport => {
                ret.pack_bits(0, 6);
                ret.pack_bits(0, 2);
                Ok(ret)
            }
            LanParam::AuthEnables => {
                // Callback, User, Operator, Admin, OEM
                for _ in 0..5 {
                    ret.pack_u8(0);
                }
                Ok(ret)
            }
            LanParam::Ip => {
                let ifaddr =
                    self.with_params(channel, |bus, params| {
                        get_if_addr::<Ipv4, _>(bus, params, 0, ORIGINS_V4)
                    })?;
                let addr = ifaddr.map(|a| a.address).unwrap_or(Ipv4Addr::UNSPECIFIED);
                ret.pack_bytes(&addr.octets());
                Ok(ret)
            }
            LanParam::IpSrc => {
                let src = if self.dhcp_mode(channel)?.v4_enabled() {
                    IpSrc::Dhcp
                } else {
                    IpSrc::Static
                };
                ret.pack_bits(src as u32, 4);
                ret.pack_bits(0, 4);
                Ok(ret)
            }
            LanParam::Mac => {
                let mac = self.with_params(channel, |bus, params| get_mac(bus, params))?;
                ret.pack_bytes(&mac.octets());
                Ok(ret)
            }
            LanParam::SubnetMask => {
                let ifaddr =
                    self.with_params(channel, |bus, params| {
                        get_if_addr::<Ipv4, _>(bus, params, 0, ORIGINS_V4)
                    })?;
                let prefix = ifaddr.map(|a| a.prefix).unwrap_or(Ipv4::DEFAULT_PREFIX);
                let netmask = prefix_to_netmask(prefix).ok_or_else(|| {
                    log::error!("Network service reported invalid prefix {prefix}");
                    CompletionCode::UnspecifiedError
                })?;
                ret.pack_bytes(&netmask.octets());
                Ok(ret)
            }
            LanParam::Gateway1 => {
                let gateway = self
                    .with_params(channel, |bus, params| {
                        get_gateway::<Ipv4, _>(bus, params)
                    })?
                    .unwrap_or(Ipv4Addr::UNSPECIFIED);
                ret.pack_bytes(&gateway.octets());
                Ok(ret)
            }
            LanParam::Gateway1Mac => {
                let neighbor = self.with_params(channel, |bus, params| {
                    get_gateway_neighbor::<Ipv4, _>(bus, params)
                })?;
                let mac = neighbor.map(|n| n.mac).unwrap_or_default();
                ret.pack_bytes(&mac.octets());
                Ok(ret)
            }
            LanParam::VlanId => {
                let mut vlan =
                    self.with_params(channel, |bus, params| get_vlan_id(bus, params))?;
                if vlan != 0 {
                    vlan |= VLAN_ENABLE_FLAG;
                } else {
                    vlan = self.last_disabled_vlan.get(&channel).copied().unwrap_or(0);
                }
                ret.pack_u16(vlan);
                Ok(ret)
            }
            LanParam::CipherSuiteSupport => {
                if self.channels.session_support(channel) == SessionSupport::None {
                    return Err(CompletionCode::InvalidFieldInRequest);
                }
                let list = self
                    .cipher_list
                    .as_ref()
                    .ok_or(CompletionCode::UnspecifiedError)?;
                ret.pack_u8((list.len() - 1) as u8);
                Ok(ret)
            }
            LanParam::CipherSuiteEntries => {
                if self.channels.session_support(channel) == SessionSupport::None {
                    return Err(CompletionCode::InvalidFieldInRequest);
                }
                let list = self
                    .cipher_list
                    .as_ref()
                    .ok_or(CompletionCode::UnspecifiedError)?;
                ret.pack_bytes(list);
                Ok(ret)
            }
            LanParam::CipherSuitePrivileges => {
                let levels = cipher::get_cs_privilege_levels(&self.paths, channel)
                    .map_err(internal_error)?;
                ret.pack_u8(0);
                for level in levels {
                    ret.pack_bits(level as u32, 4);
                }
                Ok(ret)
            }
            LanParam::IpFamilySupport => {
                let support = IpFamilySupport::DUAL_STACK | IpFamilySupport::IPV6_ALERTS;
                ret.pack_u8(support.bits());
                Ok(ret)
            }
            LanParam::IpFamilyEnables => {
                ret.pack_u8(IpFamilyEnables::DualStack as u8);
                Ok(ret)
            }
            LanParam::Ipv6Status => {
                ret.pack_u8(MAX_IPV6_STATIC_ADDRESSES);
                ret.pack_u8(MAX_IPV6_DYNAMIC_ADDRESSES);
                let flags = Ipv6StatusFlags::DHCP | Ipv6StatusFlags::SLAAC;
                ret.pack_u8(flags.bits());
                Ok(ret)
            }
            LanParam::Ipv6StaticAddresses => {
                if set >= MAX_IPV6_STATIC_ADDRESSES {
                    return Err(CompletionCode::ParamOutOfRange);
                }
                self.pack_ipv6_address(&mut ret, channel, set, ORIGINS_V6_STATIC)?;
                Ok(ret)
            }
            LanParam::Ipv6DynamicAddresses => {
                if set >= MAX_IPV6_DYNAMIC_ADDRESSES {
                    return Err(CompletionCode::ParamOutOfRange);
                }
                self.pack_ipv6_address(&mut ret, channel, set, ORIGINS_V6_DYNAMIC)?;
                Ok(ret)
            }
            LanParam::Ipv6RouterControl => {
                let control = if self.dhcp_mode(channel)?.v6_enabled() {
                    RouterControl::DYNAMIC
                } else {
                    RouterControl::STATIC
                };
                ret.pack_u8(control.bits());
                Ok(ret)
            }
            LanParam::Ipv6StaticRouter1Ip => {
                let mode = self.dhcp_mode(channel)?;
                let gateway = if mode.v6_enabled() {
                    // router discovery owns the gateway while v6 is
                    // dynamically managed
                    None
                } else {
                    self.with_params(channel, |bus, params| {
                        get_gateway::<Ipv6, _>(bus, params)
                    })?
                };
                ret.pack_bytes(&gateway.unwrap_or(Ipv6Addr::UNSPECIFIED).octets());
                Ok(ret)
            }
            LanParam::Ipv6StaticRouter1Mac => {
                let neighbor = self.with_params(channel, |bus, params| {
                    get_gateway_neighbor::<Ipv6, _>(bus, params)
                })?;
                let mac = neighbor.map(|n| n.mac).unwrap_or_default();
                ret.pack_bytes(&mac.octets());
                Ok(ret)
            }
            LanParam::Ipv6StaticRouter1PrefixLength => {
                ret.pack_u8(0);
                Ok(ret)
            }
            LanParam::Ipv6StaticRouter1PrefixValue => {
                ret.pack_bytes(&Ipv6Addr::UNSPECIFIED.octets());
                Ok(ret)
            }
        }
    }

    fn pack_ipv6_address(
        &self,
        ret: &mut Payload,
        channel: u8,
        set: u8,
        origins: &'static [AddressOrigin],
    ) -> Result<(), CompletionCode> {
        let ifaddr = self.with_params(channel, |bus, params| {
            get_if_addr::<Ipv6, _>(bus, params, set, origins)
        })?;

        let mut source = Ipv6Source::Static;
        let mut enabled = false;
        let mut addr = Ipv6Addr::UNSPECIFIED;
        let mut prefix = Ipv6::DEFAULT_PREFIX;
        let mut status = Ipv6AddressStatus::Disabled;
        if let Some(ifaddr) = ifaddr {
            source = Ipv6Source::from_origin(ifaddr.origin).ok_or_else(|| {
                log::error!("Invalid address origin conversion: {:?}", ifaddr.origin);
                CompletionCode::UnspecifiedError
            })?;
            enabled = true;
            addr = ifaddr.address;
            prefix = ifaddr.prefix;
            status = Ipv6AddressStatus::Active;
        }

        ret.pack_u8(set);
        ret.pack_bits(source as u32, 4);
        ret.pack_bits(0, 3);
        ret.pack_bool(enabled);
        ret.pack_bytes(&addr.octets());
        ret.pack_u8(prefix);
        ret.pack_u8(status as u8);
        Ok(())
    }
}
