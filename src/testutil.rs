//! In-memory collaborators for dispatch-level tests.
//!
//! [`FakeBus`] models just enough of the network and console services to
//! run full commands against: ethernet interfaces, VLAN sub-interfaces,
//! address and neighbor objects with create/delete, the combined DHCP
//! mode, and a flat property store for the SOL and console objects.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::bus::{names, Bus, BusError, ObjectTree, Props, Value};
use crate::channel::{ChannelEntry, ChannelTable, SessionSupport};
use crate::network::dhcp::DhcpMode;

pub const SERVICE: &str = "xyz.openbmc_project.Network";
pub const SOL_SERVICE: &str = "xyz.openbmc_project.Settings";

const ORIGIN_PREFIX: &str = "xyz.openbmc_project.Network.IP.AddressOrigin.";

#[derive(Clone, Debug)]
struct Iface {
    path: String,
    name: String,
    mac: String,
    dhcp: DhcpMode,
    gateway4: String,
    gateway6: String,
}

#[derive(Clone, Debug)]
struct VlanObj {
    path: String,
    ifname: String,
    id: u32,
}

#[derive(Clone, Debug)]
struct AddrObj {
    path: String,
    ifname: String,
    address: String,
    prefix: u8,
    origin: String,
}

#[derive(Clone, Debug)]
struct NeighObj {
    path: String,
    ifname: String,
    ip: String,
    mac: String,
}

#[derive(Default)]
struct State {
    ifaces: Vec<Iface>,
    vlans: Vec<VlanObj>,
    addrs: Vec<AddrObj>,
    neighbors: Vec<NeighObj>,
    next_id: u32,
    props: BTreeMap<(String, String), Value>,
}

pub struct FakeBus {
    state: RefCell<State>,
}

impl FakeBus {
    /// A bus with `eth0` and `eth1`, DHCP off, nothing configured.
    pub fn new() -> Self {
        let bus = Self {
            state: RefCell::new(State::default()),
        };
        bus.add_iface("eth0", "52:54:00:12:34:56");
        bus.add_iface("eth1", "52:54:00:65:43:21");
        bus
    }

    pub fn add_iface(&self, name: &str, mac: &str) {
        self.state.borrow_mut().ifaces.push(Iface {
            path: format!("{}/{name}", names::PATH_ROOT),
            name: name.to_owned(),
            mac: mac.to_owned(),
            dhcp: DhcpMode::None,
            gateway4: String::new(),
            gateway6: String::new(),
        });
    }

    pub fn set_dhcp(&self, ifname: &str, mode: DhcpMode) {
        let mut st = self.state.borrow_mut();
        if let Some(iface) = st.ifaces.iter_mut().find(|i| i.name == ifname) {
            iface.dhcp = mode;
        }
    }

    pub fn dhcp(&self, ifname: &str) -> DhcpMode {
        let st = self.state.borrow();
        st.ifaces
            .iter()
            .find(|i| i.name == ifname)
            .map(|i| i.dhcp)
            .unwrap_or(DhcpMode::None)
    }

    pub fn set_gateway(&self, ifname: &str, v4: &str, v6: &str) {
        let mut st = self.state.borrow_mut();
        if let Some(iface) = st.ifaces.iter_mut().find(|i| i.name == ifname) {
            iface.gateway4 = v4.to_owned();
            iface.gateway6 = v6.to_owned();
        }
    }

    pub fn add_addr(&self, ifname: &str, address: &str, prefix: u8, origin: &str) {
        let mut st = self.state.borrow_mut();
        let id = st.next_id;
        st.next_id += 1;
        st.addrs.push(AddrObj {
            path: format!("{}/{ifname}/ip{id}", names::PATH_ROOT),
            ifname: ifname.to_owned(),
            address: address.to_owned(),
            prefix,
            origin: format!("{ORIGIN_PREFIX}{origin}"),
        });
    }

    pub fn add_neighbor(&self, ifname: &str, ip: &str, mac: &str) {
        let mut st = self.state.borrow_mut();
        let id = st.next_id;
        st.next_id += 1;
        st.neighbors.push(NeighObj {
            path: format!("{}/{ifname}/neighbor{id}", names::PATH_ROOT),
            ifname: ifname.to_owned(),
            ip: ip.to_owned(),
            mac: mac.to_owned(),
        });
    }

    pub fn vlan_id(&self, ifname: &str) -> Option<u32> {
        let st = self.state.borrow();
        st.vlans.iter().find(|v| v.ifname == ifname).map(|v| v.id)
    }

    pub fn addrs(&self, ifname: &str) -> Vec<(String, u8, String)> {
        let st = self.state.borrow();
        st.addrs
            .iter()
            .filter(|a| a.ifname == ifname)
            .map(|a| (a.address.clone(), a.prefix, a.origin.clone()))
            .collect()
    }

    pub fn neighbors(&self, ifname: &str) -> Vec<(String, String)> {
        let st = self.state.borrow();
        st.neighbors
            .iter()
            .filter(|n| n.ifname == ifname)
            .map(|n| (n.ip.clone(), n.mac.clone()))
            .collect()
    }

    pub fn mac(&self, ifname: &str) -> String {
        let st = self.state.borrow();
        st.ifaces
            .iter()
            .find(|i| i.name == ifname)
            .map(|i| i.mac.clone())
            .unwrap_or_default()
    }

    /// Seed a property for the SOL or console object store.
    pub fn set_prop(&self, path: &str, property: &str, value: Value) {
        self.state
            .borrow_mut()
            .props
            .insert((path.to_owned(), property.to_owned()), value);
    }

    pub fn prop(&self, path: &str, property: &str) -> Option<Value> {
        self.state
            .borrow()
            .props
            .get(&(path.to_owned(), property.to_owned()))
            .cloned()
    }

    fn ifname_of(&self, path: &str) -> Option<String> {
        let st = self.state.borrow();
        if let Some(iface) = st.ifaces.iter().find(|i| i.path == path) {
            return Some(iface.name.clone());
        }
        st.vlans
            .iter()
            .find(|v| v.path == path)
            .map(|v| v.ifname.clone())
    }
}

impl Bus for FakeBus {
    fn get_sub_tree(&self, _root: &str, interfaces: &[&str]) -> Result<ObjectTree, BusError> {
        let st = self.state.borrow();
        let want = |intf: &str| interfaces.contains(&intf);
        let mut tree = ObjectTree::new();
        let mut add = |path: &str, intfs: Vec<&str>| {
            tree.insert(
                path.to_owned(),
                BTreeMap::from([(
                    SERVICE.to_owned(),
                    intfs.into_iter().map(str::to_owned).collect(),
                )]),
            );
        };
        if want(names::INTF_ETHERNET) {
            for iface in &st.ifaces {
                add(&iface.path, vec![names::INTF_ETHERNET]);
            }
        }
        if want(names::INTF_ETHERNET) || want(names::INTF_VLAN) {
            for vlan in &st.vlans {
                add(
                    &vlan.path,
                    vec![names::INTF_ETHERNET, names::INTF_VLAN, names::INTF_DELETE],
                );
            }
        }
        if want(names::INTF_IP) {
            for addr in &st.addrs {
                add(&addr.path, vec![names::INTF_IP, names::INTF_DELETE]);
            }
        }
        if want(names::INTF_NEIGHBOR) {
            for neigh in &st.neighbors {
                add(&neigh.path, vec![names::INTF_NEIGHBOR, names::INTF_DELETE]);
            }
        }
        if want(names::INTF_DELETE) {
            for addr in &st.addrs {
                add(&addr.path, vec![names::INTF_IP, names::INTF_DELETE]);
            }
            for neigh in &st.neighbors {
                add(&neigh.path, vec![names::INTF_NEIGHBOR, names::INTF_DELETE]);
            }
            for vlan in &st.vlans {
                add(
                    &vlan.path,
                    vec![names::INTF_ETHERNET, names::INTF_VLAN, names::INTF_DELETE],
                );
            }
        }
        Ok(tree)
    }

    fn get_object(&self, path: &str, interface: &str) -> Result<String, BusError> {
        if interface == names::INTF_SOL && path.starts_with(names::PATH_SOL) {
            return Ok(SOL_SERVICE.to_owned());
        }
        Err(BusError::UnknownObject(path.to_owned()))
    }

    fn get_property(
        &self,
        _service: &str,
        path: &str,
        interface: &str,
        property: &str,
    ) -> Result<Value, BusError> {
        let st = self.state.borrow();
        if interface == names::INTF_VLAN && property == "Id" {
            return st
                .vlans
                .iter()
                .find(|v| v.path == path)
                .map(|v| Value::U32(v.id))
                .ok_or_else(|| BusError::UnknownObject(path.to_owned()));
        }
        if let Some(value) = st.props.get(&(path.to_owned(), property.to_owned())) {
            return Ok(value.clone());
        }
        drop(st);
        let ifname = self
            .ifname_of(path)
            .ok_or_else(|| BusError::UnknownObject(path.to_owned()))?;
        let st = self.state.borrow();
        let iface = st
            .ifaces
            .iter()
            .find(|i| i.name == ifname)
            .ok_or_else(|| BusError::UnknownObject(path.to_owned()))?;
        match property {
            "DHCPEnabled" => Ok(Value::from(iface.dhcp.service_str())),
            "MACAddress" => Ok(Value::from(iface.mac.clone())),
            "DefaultGateway" => Ok(Value::from(iface.gateway4.clone())),
            "DefaultGateway6" => Ok(Value::from(iface.gateway6.clone())),
            _ => Err(BusError::PropertyType {
                interface: interface.to_owned(),
                property: property.to_owned(),
            }),
        }
    }

    fn set_property(
        &self,
        _service: &str,
        path: &str,
        _interface: &str,
        property: &str,
        value: Value,
    ) -> Result<(), BusError> {
        if let Some(ifname) = self.ifname_of(path) {
            let mut st = self.state.borrow_mut();
            let iface = st
                .ifaces
                .iter_mut()
                .find(|i| i.name == ifname)
                .ok_or_else(|| BusError::UnknownObject(path.to_owned()))?;
            let text = value.as_str().unwrap_or_default().to_owned();
            match property {
                "DHCPEnabled" => {
                    iface.dhcp = DhcpMode::from_service(&text)
                        .ok_or_else(|| BusError::Call(format!("bad DHCPEnabled {text}")))?;
                }
                "MACAddress" => iface.mac = text,
                "DefaultGateway" => iface.gateway4 = text,
                "DefaultGateway6" => iface.gateway6 = text,
                _ => return Err(BusError::Call(format!("bad property {property}"))),
            }
            return Ok(());
        }
        self.state
            .borrow_mut()
            .props
            .insert((path.to_owned(), property.to_owned()), value);
        Ok(())
    }

    fn get_all(&self, _service: &str, path: &str, interface: &str) -> Result<Props, BusError> {
        let st = self.state.borrow();
        if interface == names::INTF_IP {
            let addr = st
                .addrs
                .iter()
                .find(|a| a.path == path)
                .ok_or_else(|| BusError::UnknownObject(path.to_owned()))?;
            return Ok(Props::from([
                ("Address".to_owned(), Value::from(addr.address.clone())),
                ("PrefixLength".to_owned(), Value::U8(addr.prefix)),
                ("Origin".to_owned(), Value::from(addr.origin.clone())),
            ]));
        }
        if interface == names::INTF_NEIGHBOR {
            let neigh = st
                .neighbors
                .iter()
                .find(|n| n.path == path)
                .ok_or_else(|| BusError::UnknownObject(path.to_owned()))?;
            return Ok(Props::from([
                ("IPAddress".to_owned(), Value::from(neigh.ip.clone())),
                ("MACAddress".to_owned(), Value::from(neigh.mac.clone())),
                (
                    "State".to_owned(),
                    Value::from("xyz.openbmc_project.Network.Neighbor.State.Permanent"),
                ),
            ]));
        }
        Err(BusError::UnknownObject(path.to_owned()))
    }

    fn create_ip(
        &self,
        _service: &str,
        path: &str,
        _protocol: &str,
        address: &str,
        prefix: u8,
        _gateway: &str,
    ) -> Result<(), BusError> {
        let ifname = self
            .ifname_of(path)
            .ok_or_else(|| BusError::UnknownObject(path.to_owned()))?;
        self.add_addr(&ifname, address, prefix, "Static");
        Ok(())
    }

    fn create_vlan(&self, _service: &str, ifname: &str, id: u32) -> Result<String, BusError> {
        let path = format!("{}/{ifname}_{id}", names::PATH_ROOT);
        self.state.borrow_mut().vlans.push(VlanObj {
            path: path.clone(),
            ifname: ifname.to_owned(),
            id,
        });
        Ok(path)
    }

    fn create_neighbor(
        &self,
        _service: &str,
        path: &str,
        address: &str,
        mac: &str,
    ) -> Result<(), BusError> {
        let ifname = self
            .ifname_of(path)
            .ok_or_else(|| BusError::UnknownObject(path.to_owned()))?;
        self.add_neighbor(&ifname, address, mac);
        Ok(())
    }

    fn delete(&self, _service: &str, path: &str) -> Result<(), BusError> {
        let mut st = self.state.borrow_mut();
        let before = st.addrs.len() + st.neighbors.len() + st.vlans.len();
        st.addrs.retain(|a| a.path != path);
        st.neighbors.retain(|n| n.path != path);
        st.vlans.retain(|v| v.path != path);
        if st.addrs.len() + st.neighbors.len() + st.vlans.len() == before {
            return Err(BusError::UnknownObject(path.to_owned()));
        }
        Ok(())
    }
}

/// Channels 1 and 2 map to `eth0`/`eth1`; channel 6 shares `eth0` but is
/// session-less for the cipher-parameter gating paths.
pub fn channel_table() -> ChannelTable {
    let mut table = ChannelTable::new();
    table.insert(1, ChannelEntry::lan("eth0"));
    table.insert(2, ChannelEntry::lan("eth1"));
    table.insert(
        6,
        ChannelEntry {
            ifname: "eth0".to_owned(),
            session_support: SessionSupport::None,
            is_lan: true,
        },
    );
    table
}
