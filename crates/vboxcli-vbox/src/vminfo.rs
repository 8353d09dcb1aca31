//! Conversion of `showvminfo --machinereadable` dumps and `list vms` output.

use crate::machinereadable::MachineReadable;
use crate::media::{MediaRegistry, file_name};
use regex::Regex;
use std::sync::LazyLock;
use vboxcli_core::ROOT_GROUP;
use vboxcli_core::enums::{
    AudioControllerType, AudioDriverType, DeviceType, MachineState, NetworkAdapterType,
    NetworkAttachmentType, ParavirtProvider, PortMode, StorageBus,
};
use vboxcli_core::machine::{
    Acceleration, AudioAdapter, Machine, MachineId, Medium, MediumAttachment, NetworkAdapter,
    ParallelPort, SerialPort, SharedFolder, StorageController, UsbFilter, UsbSettings,
};

pub const INACCESSIBLE_NAME: &str = "<inaccessible>";

static VM_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^"(.*)" \{([0-9A-Fa-f-]+)\}\s*$"#).unwrap());

const MAX_BOOT_POSITION: u32 = 4;
const MAX_NETWORK_ADAPTERS: u32 = 36;
const SERIAL_PORT_COUNT: u32 = 4;
const PARALLEL_PORT_COUNT: u32 = 2;

/// `(name, id)` pairs from `VBoxManage list vms`.
#[must_use]
pub fn parse_vm_list(output: &str) -> Vec<(String, MachineId)> {
    output
        .lines()
        .filter_map(|line| {
            let caps = VM_LINE_RE.captures(line.trim_end())?;
            Some((caps[1].to_string(), MachineId::new(&caps[2])))
        })
        .collect()
}

/// Build a machine snapshot from one dump.
#[must_use]
pub fn machine_from_info(info: &MachineReadable, media: &MediaRegistry) -> Machine {
    let id = MachineId::new(info.str_or_empty("UUID"));
    let name = info.str_or_empty("name");
    if info.get("name").is_none() || info.get("VMState").is_none() {
        return Machine::inaccessible(id, name);
    }

    Machine {
        id,
        name,
        accessible: true,
        state: MachineState::parse(info.get("VMState").unwrap_or_default()),
        groups: groups(info),
        os_type: info.str_or_empty("ostype"),
        memory_mb: info.number("memory").unwrap_or_default(),
        cpu_count: info.number("cpus").unwrap_or(1),
        cpu_execution_cap: info.number("cpuexecutioncap").unwrap_or(100),
        boot_order: (1..=MAX_BOOT_POSITION)
            .filter_map(|n| info.get(&format!("boot{n}")))
            .map(DeviceType::parse)
            .collect(),
        acceleration: Acceleration {
            hw_virt: info.flag("hwvirtex"),
            nested_paging: info.flag("nestedpaging"),
            pae: info.flag("pae"),
            paravirt_provider: ParavirtProvider::parse(
                info.get("effparavirtprovider")
                    .or_else(|| info.get("paravirtprovider"))
                    .unwrap_or_default(),
            ),
        },
        vram_mb: info.number("vram").unwrap_or_default(),
        monitor_count: info.number("monitorcount").unwrap_or(1),
        vrde_ports: info.flag("vrde").then(|| {
            info.get("vrdeports")
                .or_else(|| info.get("vrdeport"))
                .unwrap_or_default()
                .to_string()
        }),
        video_capture_file: video_capture_file(info),
        storage_controllers: storage_controllers(info, media),
        audio: audio(info),
        network_adapters: network_adapters(info),
        serial_ports: serial_ports(info),
        parallel_ports: parallel_ports(info),
        usb: usb(info),
        shared_folders: shared_folders(info),
        description: info.str_or_empty("description"),
    }
}

fn groups(info: &MachineReadable) -> Vec<String> {
    let groups: Vec<String> = info
        .get("groups")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect();
    if groups.is_empty() {
        vec![ROOT_GROUP.to_string()]
    } else {
        groups
    }
}

fn video_capture_file(info: &MachineReadable) -> Option<String> {
    if info.flag("videocap") {
        return Some(info.str_or_empty("videocapfile"));
    }
    if info.flag("recording_enabled") {
        return Some(
            info.get("recording_screen0_file")
                .or_else(|| info.get("rec_screen0_file"))
                .unwrap_or_default()
                .to_string(),
        );
    }
    None
}

fn storage_controllers(info: &MachineReadable, media: &MediaRegistry) -> Vec<StorageController> {
    let mut controllers = Vec::new();
    for index in 0.. {
        let Some(name) = info.get(&format!("storagecontrollername{index}")) else {
            break;
        };
        let bus = StorageBus::from_controller_type(
            info.get(&format!("storagecontrollertype{index}"))
                .unwrap_or_default(),
        );
        let attachments = attachments(info, media, name, &bus);
        controllers.push(StorageController {
            name: name.to_string(),
            bus,
            attachments,
        });
    }
    controllers
}

fn attachments(
    info: &MachineReadable,
    media: &MediaRegistry,
    controller: &str,
    bus: &StorageBus,
) -> Vec<MediumAttachment> {
    let prefix = format!("{controller}-");
    let mut found: Vec<MediumAttachment> = info
        .keys()
        .filter_map(|key| {
            let rest = key.strip_prefix(&prefix)?;
            let (port, device) = rest.split_once('-')?;
            let port: u32 = port.parse().ok()?;
            let device: u32 = device.parse().ok()?;
            let value = info.get(key)?;
            let image_uuid = info.get(&format!("{controller}-ImageUUID-{port}-{device}"));
            attachment(value, image_uuid, media, bus, port, device)
        })
        .collect();
    found.sort_by_key(|att| (att.port, att.device));
    found
}

fn attachment(
    value: &str,
    image_uuid: Option<&str>,
    media: &MediaRegistry,
    bus: &StorageBus,
    port: u32,
    device: u32,
) -> Option<MediumAttachment> {
    let removable_type = if *bus == StorageBus::Floppy {
        DeviceType::Floppy
    } else {
        DeviceType::Dvd
    };

    let (device_type, medium) = match value {
        "none" | "" => return None,
        "emptydrive" => (removable_type, None),
        host if host.starts_with("host:") => {
            let location = host.trim_start_matches("host:").to_string();
            (
                removable_type.clone(),
                Some(Medium {
                    name: file_name(&location).to_string(),
                    location,
                    device_type: removable_type,
                    host_drive: true,
                    ..Medium::default()
                }),
            )
        }
        path => {
            let medium = image_uuid
                .and_then(|uuid| media.get(uuid))
                .cloned()
                .unwrap_or_else(|| Medium {
                    name: file_name(path).to_string(),
                    location: path.to_string(),
                    device_type: guess_device_type(path, bus),
                    ..Medium::default()
                });
            (medium.device_type.clone(), Some(medium))
        }
    };

    Some(MediumAttachment {
        port,
        device,
        device_type,
        medium,
    })
}

fn guess_device_type(path: &str, bus: &StorageBus) -> DeviceType {
    if *bus == StorageBus::Floppy {
        DeviceType::Floppy
    } else if path.to_ascii_lowercase().ends_with(".iso") {
        DeviceType::Dvd
    } else {
        DeviceType::HardDisk
    }
}

fn audio(info: &MachineReadable) -> Option<AudioAdapter> {
    let driver = info.get("audio")?;
    let enabled = if info.contains("audio_enabled") {
        info.flag("audio_enabled")
    } else {
        !driver.eq_ignore_ascii_case("none")
    };
    enabled.then(|| AudioAdapter {
        driver: AudioDriverType::parse(driver),
        controller: AudioControllerType::parse(info.get("audiocontroller").unwrap_or_default()),
    })
}

fn network_adapters(info: &MachineReadable) -> Vec<NetworkAdapter> {
    (1..=MAX_NETWORK_ADAPTERS)
        .map_while(|n| {
            let kind = info.get(&format!("nic{n}"))?;
            Some(NetworkAdapter {
                slot: n - 1,
                enabled: !kind.eq_ignore_ascii_case("none"),
                adapter_type: NetworkAdapterType::parse(
                    info.get(&format!("nictype{n}")).unwrap_or_default(),
                ),
                attachment: NetworkAttachmentType::parse(kind),
                bridged_interface: info.str_or_empty(&format!("bridgeadapter{n}")),
                internal_network: info.str_or_empty(&format!("intnet{n}")),
                host_only_interface: info.str_or_empty(&format!("hostonlyadapter{n}")),
                generic_driver: info.str_or_empty(&format!("nicgenericdrv{n}")),
                nat_network: info.str_or_empty(&format!("natnet{n}")),
            })
        })
        .collect()
}

/// `0x03f8,4` to `(io_base, irq)`.
fn port_address(value: &str) -> Option<(u32, u32)> {
    let (io, irq) = value.split_once(',')?;
    let io = u32::from_str_radix(io.trim().trim_start_matches("0x"), 16).ok()?;
    let irq = irq.trim().parse().ok()?;
    Some((io, irq))
}

fn serial_mode(raw: &str) -> (PortMode, String) {
    match raw.split_once(',') {
        Some(("server" | "client", path)) => (PortMode::HostPipe, path.to_string()),
        Some(("tcpserver" | "tcpclient", address)) => (PortMode::Tcp, address.to_string()),
        Some(("file", path)) => (PortMode::RawFile, path.to_string()),
        _ if raw.is_empty() || raw.eq_ignore_ascii_case("disconnected") => {
            (PortMode::Disconnected, String::new())
        }
        _ => (PortMode::HostDevice, raw.to_string()),
    }
}

fn serial_ports(info: &MachineReadable) -> Vec<SerialPort> {
    (1..=SERIAL_PORT_COUNT)
        .filter_map(|n| {
            let address = info.get(&format!("uart{n}"))?;
            let (io_base, irq) = port_address(address).unwrap_or_default();
            let (mode, path) = serial_mode(info.get(&format!("uartmode{n}")).unwrap_or_default());
            Some(SerialPort {
                slot: n - 1,
                enabled: !address.eq_ignore_ascii_case("off"),
                irq,
                io_base,
                mode,
                path,
            })
        })
        .collect()
}

fn parallel_ports(info: &MachineReadable) -> Vec<ParallelPort> {
    (1..=PARALLEL_PORT_COUNT)
        .filter_map(|n| {
            let address = info.get(&format!("lpt{n}"))?;
            let (io_base, irq) = port_address(address).unwrap_or_default();
            Some(ParallelPort {
                slot: n - 1,
                enabled: !address.eq_ignore_ascii_case("off"),
                irq,
                io_base,
                path: info.str_or_empty(&format!("lptmode{n}")),
            })
        })
        .collect()
}

fn usb(info: &MachineReadable) -> Option<UsbSettings> {
    let known = [("usb", "OHCI"), ("ehci", "EHCI"), ("xhci", "xHCI")];
    if !known.iter().any(|(key, _)| info.contains(key)) {
        return None;
    }

    let controllers = known
        .iter()
        .filter(|(key, _)| info.flag(key))
        .map(|(_, name)| (*name).to_string())
        .collect();
    let filters = (1..)
        .map_while(|n| {
            let active = info.get(&format!("USBFilterActive{n}"))?;
            Some(UsbFilter {
                name: info.str_or_empty(&format!("USBFilterName{n}")),
                active: active.eq_ignore_ascii_case("on"),
            })
        })
        .collect();

    Some(UsbSettings {
        controllers,
        filters,
    })
}

fn shared_folders(info: &MachineReadable) -> Vec<SharedFolder> {
    let mut folders = Vec::new();
    for kind in ["Machine", "Transient"] {
        for n in 1.. {
            let Some(name) = info.get(&format!("SharedFolderName{kind}Mapping{n}")) else {
                break;
            };
            folders.push(SharedFolder {
                name: name.to_string(),
                host_path: info.str_or_empty(&format!("SharedFolderPath{kind}Mapping{n}")),
                writable: !info.flag(&format!("SharedFolderReadOnly{kind}Mapping{n}")),
                auto_mount: info.flag(&format!("SharedFolderAutoMount{kind}Mapping{n}")),
            });
        }
    }
    folders
}
