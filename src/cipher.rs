//! Cipher-suite support list and the per-channel cipher-suite privilege
//! table, both persisted as JSON configuration artifacts.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Error;

/// Number of cipher-suite privilege records per channel.
pub const MAX_CIPHER_RECORDS: usize = 16;
/// Highest valid privilege level (OEM) for a cipher-suite record.
pub const PRIVILEGE_OEM: u8 = 5;

/// Locations of the persisted configuration artifacts.
#[derive(Clone, Debug)]
pub struct ConfigPaths {
    /// Cipher suites supported by the RMCP+ stack.
    pub cipher_list: PathBuf,
    /// Per-channel cipher-suite privilege levels, written on update.
    pub cs_privilege: PathBuf,
    /// Read-only fallback consulted when `cs_privilege` does not exist.
    pub cs_privilege_default: PathBuf,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self {
            cipher_list: PathBuf::from("/usr/share/ipmi-providers/cipher_list.json"),
            cs_privilege: PathBuf::from("/var/lib/ipmi/cs_privilege_levels.json"),
            cs_privilege_default: PathBuf::from(
                "/usr/share/ipmi-providers/cs_privilege_levels.json",
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CipherRecord {
    cipher: u8,
}

/// Load the supported cipher-suite list.
///
/// The wire form starts with a reserved zero byte followed by one record
/// id per supported suite, ready for the cipher-suite-entries parameter.
pub fn load_cipher_list(path: &Path) -> Result<Vec<u8>, Error> {
    let text = fs::read_to_string(path).map_err(|err| {
        log::error!("Channel cipher suites file {} not readable: {err}", path.display());
        Error::CipherConfig(err.to_string())
    })?;
    let records: Vec<CipherRecord> = serde_json::from_str(&text).map_err(|err| {
        log::error!("Parsing channel cipher suites JSON failed: {err}");
        Error::CipherConfig(err.to_string())
    })?;

    // Byte 1 is reserved
    let mut list = Vec::with_capacity(records.len() + 1);
    list.push(0x00);
    list.extend(records.iter().map(|record| record.cipher));
    Ok(list)
}

type PrivilegeMap = BTreeMap<String, Vec<u8>>;

fn read_privilege_map(path: &Path) -> Result<PrivilegeMap, Error> {
    let text = fs::read_to_string(path).map_err(|err| Error::CipherConfig(err.to_string()))?;
    serde_json::from_str(&text).map_err(|err| {
        log::error!(
            "Parsing cipher suite privilege file {} failed: {err}",
            path.display()
        );
        Error::CipherConfig(err.to_string())
    })
}

fn load_privilege_map(paths: &ConfigPaths) -> Result<PrivilegeMap, Error> {
    match read_privilege_map(&paths.cs_privilege) {
        Ok(map) => Ok(map),
        Err(_) => read_privilege_map(&paths.cs_privilege_default),
    }
}

/// Read the privilege levels configured for `channel`. A channel absent
/// from both artifacts reports all-unspecified (zero) levels.
pub fn get_cs_privilege_levels(
    paths: &ConfigPaths,
    channel: u8,
) -> Result<[u8; MAX_CIPHER_RECORDS], Error> {
    let map = load_privilege_map(paths)?;
    let mut levels = [0u8; MAX_CIPHER_RECORDS];
    if let Some(configured) = map.get(&channel.to_string()) {
        for (slot, value) in levels.iter_mut().zip(configured) {
            *slot = *value;
        }
    }
    Ok(levels)
}

/// Persist the privilege levels for `channel`, preserving other channels'
/// entries. Falls back to the default artifact as the base when no
/// writable copy exists yet.
pub fn set_cs_privilege_levels(
    paths: &ConfigPaths,
    channel: u8,
    levels: [u8; MAX_CIPHER_RECORDS],
) -> Result<(), Error> {
    let mut map = load_privilege_map(paths).unwrap_or_default();
    map.insert(channel.to_string(), levels.to_vec());
    let text =
        serde_json::to_string_pretty(&map).map_err(|err| Error::CipherConfig(err.to_string()))?;
    fs::write(&paths.cs_privilege, text).map_err(|err| {
        log::error!(
            "Writing cipher suite privilege file {} failed: {err}",
            paths.cs_privilege.display()
        );
        Error::CipherConfig(err.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths_in(dir: &Path) -> ConfigPaths {
        ConfigPaths {
            cipher_list: dir.join("cipher_list.json"),
            cs_privilege: dir.join("cs_privilege_levels.json"),
            cs_privilege_default: dir.join("cs_privilege_levels_default.json"),
        }
    }

    #[test]
    fn cipher_list_has_leading_reserved_byte() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        fs::write(
            &paths.cipher_list,
            r#"[{"cipher": 3, "auth": 1}, {"cipher": 17, "auth": 3}]"#,
        )
        .unwrap();
        assert_eq!(load_cipher_list(&paths.cipher_list).unwrap(), vec![0, 3, 17]);
    }

    #[test]
    fn missing_cipher_list_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        assert!(load_cipher_list(&paths.cipher_list).is_err());
    }

    #[test]
    fn privilege_levels_round_trip_and_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        fs::write(&paths.cs_privilege_default, r#"{"1": [4, 4, 4]}"#).unwrap();

        // no writable copy yet: the default is consulted
        let levels = get_cs_privilege_levels(&paths, 1).unwrap();
        assert_eq!(&levels[..4], &[4, 4, 4, 0]);

        let mut wanted = [2u8; MAX_CIPHER_RECORDS];
        wanted[0] = 4;
        set_cs_privilege_levels(&paths, 1, wanted).unwrap();
        assert_eq!(get_cs_privilege_levels(&paths, 1).unwrap(), wanted);
        // unknown channels report unspecified levels
        assert_eq!(get_cs_privilege_levels(&paths, 2).unwrap(), [0; 16]);
    }
}
