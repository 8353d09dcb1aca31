use crate::enums::{
    AudioControllerType, AudioDriverType, DeviceType, MachineState, MediumState, MediumType,
    NetworkAdapterType, NetworkAttachmentType, ParavirtProvider, PortMode, StorageBus,
};
use std::fmt;

/// Hypervisor UUID of a machine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MachineId(String);

impl MachineId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// UUIDs compare case-insensitively; extra data may store them in either case.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of one machine's identity, state and configuration.
///
/// An inaccessible machine carries only `id`, `name` and `accessible = false`;
/// everything else holds defaults and must not be displayed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Machine {
    pub id: MachineId,
    pub name: String,
    pub accessible: bool,
    pub state: MachineState,
    pub groups: Vec<String>,
    pub os_type: String,
    pub memory_mb: u64,
    pub cpu_count: u32,
    pub cpu_execution_cap: u32,
    pub boot_order: Vec<DeviceType>,
    pub acceleration: Acceleration,
    pub vram_mb: u64,
    pub monitor_count: u32,
    /// RDP ports when the remote display server is enabled.
    pub vrde_ports: Option<String>,
    /// Capture file when video capture is enabled.
    pub video_capture_file: Option<String>,
    pub storage_controllers: Vec<StorageController>,
    pub audio: Option<AudioAdapter>,
    pub network_adapters: Vec<NetworkAdapter>,
    pub serial_ports: Vec<SerialPort>,
    pub parallel_ports: Vec<ParallelPort>,
    /// `None` when USB is unavailable for this machine.
    pub usb: Option<UsbSettings>,
    pub shared_folders: Vec<SharedFolder>,
    pub description: String,
}

impl Machine {
    #[must_use]
    pub fn inaccessible(id: MachineId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            accessible: false,
            groups: vec![crate::ROOT_GROUP.to_string()],
            ..Self::default()
        }
    }

    pub fn in_group(&self, path: &str) -> bool {
        self.groups.iter().any(|g| g == path)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Acceleration {
    pub hw_virt: bool,
    pub nested_paging: bool,
    pub pae: bool,
    pub paravirt_provider: ParavirtProvider,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageController {
    pub name: String,
    pub bus: StorageBus,
    pub attachments: Vec<MediumAttachment>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediumAttachment {
    pub port: u32,
    pub device: u32,
    pub device_type: DeviceType,
    pub medium: Option<Medium>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Medium {
    pub name: String,
    pub location: String,
    pub device_type: DeviceType,
    pub host_drive: bool,
    pub description: String,
    pub medium_type: MediumType,
    pub state: MediumState,
    pub logical_size: u64,
    pub size: u64,
    pub encrypted: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AudioAdapter {
    pub driver: AudioDriverType,
    pub controller: AudioControllerType,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkAdapter {
    /// Zero-based slot.
    pub slot: u32,
    pub enabled: bool,
    pub adapter_type: NetworkAdapterType,
    pub attachment: NetworkAttachmentType,
    pub bridged_interface: String,
    pub internal_network: String,
    pub host_only_interface: String,
    pub generic_driver: String,
    pub nat_network: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SerialPort {
    pub slot: u32,
    pub enabled: bool,
    pub irq: u32,
    pub io_base: u32,
    pub mode: PortMode,
    pub path: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParallelPort {
    pub slot: u32,
    pub enabled: bool,
    pub irq: u32,
    pub io_base: u32,
    pub path: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UsbSettings {
    pub controllers: Vec<String>,
    pub filters: Vec<UsbFilter>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UsbFilter {
    pub name: String,
    pub active: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SharedFolder {
    pub name: String,
    pub host_path: String,
    pub writable: bool,
    pub auto_mount: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HostInfo {
    /// Host CPU supports hardware virtualisation.
    pub hw_virt: bool,
}
