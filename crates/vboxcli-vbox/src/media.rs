//! Registered media from `VBoxManage list hdds|dvds|floppies`.

use std::collections::HashMap;
use vboxcli_core::enums::{DeviceType, MediumState, MediumType};
use vboxcli_core::machine::Medium;

const MIB: u64 = 1024 * 1024;

#[derive(Clone, Debug, Default)]
pub struct MediaRegistry {
    by_uuid: HashMap<String, Medium>,
}

impl MediaRegistry {
    /// Add the records of one `list` call, all of the given device type.
    pub fn extend_from_list(&mut self, output: &str, device_type: &DeviceType) {
        for record in output.split("\n\n") {
            if let Some((uuid, medium)) = parse_record(record, device_type) {
                self.by_uuid.insert(uuid.to_ascii_lowercase(), medium);
            }
        }
    }

    pub fn get(&self, uuid: &str) -> Option<&Medium> {
        self.by_uuid.get(&uuid.trim().to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.by_uuid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uuid.is_empty()
    }
}

fn parse_record(record: &str, device_type: &DeviceType) -> Option<(String, Medium)> {
    let mut uuid = None;
    let mut medium = Medium {
        device_type: device_type.clone(),
        ..Medium::default()
    };

    for line in record.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "UUID" => uuid = Some(value.to_string()),
            "State" => medium.state = MediumState::parse(value),
            "Type" => medium.medium_type = MediumType::parse(value),
            "Location" => {
                medium.location = value.to_string();
                medium.name = file_name(value).to_string();
            }
            "Capacity" => {
                let bytes = parse_capacity(value).unwrap_or_default();
                medium.logical_size = bytes;
                medium.size = bytes;
            }
            "Encryption" => medium.encrypted = value.eq_ignore_ascii_case("enabled"),
            _ => {}
        }
    }

    uuid.map(|uuid| (uuid, medium))
}

/// `20480 MBytes` to bytes.
fn parse_capacity(value: &str) -> Option<u64> {
    let mut parts = value.split_whitespace();
    let amount: u64 = parts.next()?.parse().ok()?;
    let scale = match parts.next().unwrap_or("MBytes") {
        "Bytes" => 1,
        "KBytes" => 1024,
        "GBytes" => 1024 * MIB,
        _ => MIB,
    };
    amount.checked_mul(scale)
}

#[must_use]
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HDDS: &str = "UUID:           6F1C4D2E-0000-4000-8000-000000000001
Parent UUID:    base
State:          created
Type:           normal (base)
Location:       /vms/web/web.vdi
Storage format: VDI
Capacity:       20480 MBytes
Encryption:     disabled

UUID:           6f1c4d2e-0000-4000-8000-000000000002
Parent UUID:    base
State:          inaccessible
Type:           immutable (base)
Location:       /vms/old/old.vmdk
Storage format: VMDK
Capacity:       1024 MBytes
Encryption:     enabled
";

    #[test]
    fn test_parse_hdds() {
        let mut registry = MediaRegistry::default();
        registry.extend_from_list(HDDS, &DeviceType::HardDisk);
        assert_eq!(registry.len(), 2);

        let web = registry.get("6f1c4d2e-0000-4000-8000-000000000001");
        assert!(web.is_some_and(|m| m.name == "web.vdi"
            && m.logical_size == 20480 * MIB
            && m.medium_type == MediumType::Normal
            && m.device_type == DeviceType::HardDisk));

        let old = registry.get("6F1C4D2E-0000-4000-8000-000000000002");
        assert!(old.is_some_and(|m| m.encrypted
            && m.state == MediumState::Inaccessible
            && m.medium_type == MediumType::Immutable));
    }

    #[test]
    fn test_empty_list() {
        let mut registry = MediaRegistry::default();
        registry.extend_from_list("", &DeviceType::Dvd);
        assert!(registry.is_empty());
    }
}
