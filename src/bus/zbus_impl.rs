//! [`Bus`] implementation over the system D-Bus using blocking `zbus`.

use std::collections::HashMap;

use zbus::blocking::Connection;
use zbus::zvariant::{OwnedObjectPath, OwnedValue};

use super::{names, Bus, BusError, ObjectTree, Props, Value};

const MAPPER_SERVICE: &str = "xyz.openbmc_project.ObjectMapper";
const MAPPER_PATH: &str = "/xyz/openbmc_project/object_mapper";
const MAPPER_INTF: &str = "xyz.openbmc_project.ObjectMapper";

const PROPERTIES_INTF: &str = "org.freedesktop.DBus.Properties";

const ERR_UNKNOWN_OBJECT: &str = "org.freedesktop.DBus.Error.UnknownObject";
const ERR_INTERNAL_FAILURE: &str = "xyz.openbmc_project.Common.Error.InternalFailure";

/// A connection to the system bus.
pub struct ZbusConnection {
    conn: Connection,
}

impl ZbusConnection {
    /// Connect to the system bus.
    pub fn system() -> Result<Self, BusError> {
        let conn = Connection::system().map_err(map_err)?;
        Ok(Self { conn })
    }

    /// Wrap an existing connection.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

fn map_err(err: zbus::Error) -> BusError {
    if let zbus::Error::MethodError(name, description, _) = &err {
        let description = description.clone().unwrap_or_default();
        return match name.as_str() {
            ERR_UNKNOWN_OBJECT => BusError::UnknownObject(description),
            ERR_INTERNAL_FAILURE => BusError::InternalFailure(description),
            _ => BusError::Call(format!("{name}: {description}")),
        };
    }
    BusError::Call(err.to_string())
}

fn from_variant(value: OwnedValue) -> Option<Value> {
    if let Ok(v) = <&str>::try_from(&value) {
        return Some(Value::String(v.to_string()));
    }
    if let Ok(v) = bool::try_from(&value) {
        return Some(Value::Bool(v));
    }
    if let Ok(v) = u8::try_from(&value) {
        return Some(Value::U8(v));
    }
    if let Ok(v) = u16::try_from(&value) {
        return Some(Value::U16(v));
    }
    if let Ok(v) = u32::try_from(&value) {
        return Some(Value::U32(v));
    }
    if let Ok(v) = u64::try_from(value) {
        return Some(Value::U64(v));
    }
    None
}

impl Bus for ZbusConnection {
    fn get_sub_tree(&self, root: &str, interfaces: &[&str]) -> Result<ObjectTree, BusError> {
        let reply = self
            .conn
            .call_method(
                Some(MAPPER_SERVICE),
                MAPPER_PATH,
                Some(MAPPER_INTF),
                "GetSubTree",
                &(root, 0i32, interfaces.to_vec()),
            )
            .map_err(map_err)?;
        let tree: HashMap<String, HashMap<String, Vec<String>>> =
            reply.body().deserialize().map_err(map_err)?;
        Ok(tree
            .into_iter()
            .map(|(path, services)| (path, services.into_iter().collect()))
            .collect())
    }

    fn get_object(&self, path: &str, interface: &str) -> Result<String, BusError> {
        let reply = self
            .conn
            .call_method(
                Some(MAPPER_SERVICE),
                MAPPER_PATH,
                Some(MAPPER_INTF),
                "GetObject",
                &(path, vec![interface]),
            )
            .map_err(map_err)?;
        let services: HashMap<String, Vec<String>> =
            reply.body().deserialize().map_err(map_err)?;
        services
            .into_keys()
            .next()
            .ok_or_else(|| BusError::UnknownObject(path.to_owned()))
    }

    fn get_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
    ) -> Result<Value, BusError> {
        let reply = self
            .conn
            .call_method(
                Some(service),
                path,
                Some(PROPERTIES_INTF),
                "Get",
                &(interface, property),
            )
            .map_err(map_err)?;
        let value: OwnedValue = reply.body().deserialize().map_err(map_err)?;
        from_variant(value).ok_or_else(|| BusError::PropertyType {
            interface: interface.to_owned(),
            property: property.to_owned(),
        })
    }

    fn set_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
        value: Value,
    ) -> Result<(), BusError> {
        let value = match value {
            Value::Bool(v) => zbus::zvariant::Value::from(v),
            Value::U8(v) => zbus::zvariant::Value::from(v),
            Value::U16(v) => zbus::zvariant::Value::from(v),
            Value::U32(v) => zbus::zvariant::Value::from(v),
            Value::U64(v) => zbus::zvariant::Value::from(v),
            Value::String(v) => zbus::zvariant::Value::from(v),
        };
        self.conn
            .call_method(
                Some(service),
                path,
                Some(PROPERTIES_INTF),
                "Set",
                &(interface, property, value),
            )
            .map_err(map_err)?;
        Ok(())
    }

    fn get_all(&self, service: &str, path: &str, interface: &str) -> Result<Props, BusError> {
        let reply = self
            .conn
            .call_method(
                Some(service),
                path,
                Some(PROPERTIES_INTF),
                "GetAll",
                &(interface,),
            )
            .map_err(map_err)?;
        let props: HashMap<String, OwnedValue> = reply.body().deserialize().map_err(map_err)?;
        Ok(props
            .into_iter()
            .filter_map(|(name, value)| Some((name, from_variant(value)?)))
            .collect())
    }

    fn create_ip(
        &self,
        service: &str,
        path: &str,
        protocol: &str,
        address: &str,
        prefix: u8,
        gateway: &str,
    ) -> Result<(), BusError> {
        self.conn
            .call_method(
                Some(service),
                path,
                Some(names::INTF_IP_CREATE),
                "IP",
                &(protocol, address, prefix, gateway),
            )
            .map_err(map_err)?;
        Ok(())
    }

    fn create_vlan(&self, service: &str, ifname: &str, id: u32) -> Result<String, BusError> {
        let reply = self
            .conn
            .call_method(
                Some(service),
                names::PATH_ROOT,
                Some(names::INTF_VLAN_CREATE),
                "VLAN",
                &(ifname, id),
            )
            .map_err(map_err)?;
        let path: OwnedObjectPath = reply.body().deserialize().map_err(map_err)?;
        Ok(path.as_str().to_owned())
    }

    fn create_neighbor(
        &self,
        service: &str,
        path: &str,
        address: &str,
        mac: &str,
    ) -> Result<(), BusError> {
        self.conn
            .call_method(
                Some(service),
                path,
                Some(names::INTF_NEIGHBOR_CREATE),
                "Neighbor",
                &(address, mac),
            )
            .map_err(map_err)?;
        Ok(())
    }

    fn delete(&self, service: &str, path: &str) -> Result<(), BusError> {
        self.conn
            .call_method(Some(service), path, Some(names::INTF_DELETE), "Delete", &())
            .map_err(map_err)?;
        Ok(())
    }
}
