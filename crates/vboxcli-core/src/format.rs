//! Field formatters built on the enum labels.

use crate::enums::{DeviceType, MediumState, NetworkAttachmentType, StorageBus};
use crate::machine::{HostInfo, Machine, MediumAttachment, NetworkAdapter, ParallelPort, SerialPort};

const SIZE_UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];

const COM_PORTS: [(&str, u32, u32); 4] = [
    ("COM1", 4, 0x3f8),
    ("COM2", 3, 0x2f8),
    ("COM3", 4, 0x3e8),
    ("COM4", 3, 0x2e8),
];

const LPT_PORTS: [(&str, u32, u32); 3] = [("LPT1", 7, 0x378), ("LPT2", 5, 0x278), ("LPT3", 2, 0x3bc)];

/// Render a byte count in the largest binary unit whose magnitude stays below 1024.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut divisor = 1024u64;
    let mut unit = SIZE_UNITS[0];
    for next in &SIZE_UNITS[1..] {
        if bytes / divisor < 1024 {
            break;
        }
        divisor *= 1024;
        unit = next;
    }

    #[allow(clippy::cast_precision_loss)]
    let value = bytes as f64 / divisor as f64;
    format!("{value:.2} {unit}")
}

#[must_use]
pub fn storage_slot_name(bus: &StorageBus, port: u32, device: u32) -> String {
    let mut text = bus.label().to_string();
    match bus {
        StorageBus::Ide => {
            text.push_str(match port {
                0 => " Primary",
                1 => " Secondary",
                _ => " <invalid>",
            });
            text.push_str(match device {
                0 => " Master",
                1 => " Slave",
                _ => " <invalid>",
            });
        }
        StorageBus::Floppy => text.push_str(&format!(" Device {device}")),
        _ => text.push_str(&format!(" Port {port}")),
    }
    text
}

#[must_use]
pub fn attachment_description(attachment: &MediumAttachment) -> String {
    let mut text = if attachment.device_type == DeviceType::Dvd {
        String::from("[Optical Drive] ")
    } else {
        String::new()
    };

    let Some(medium) = &attachment.medium else {
        text.push_str("Empty");
        return text;
    };

    if medium.host_drive {
        if medium.description.is_empty() {
            text.push_str(&format!("Host Drive '{}'", medium.location));
        } else {
            text.push_str(&format!(
                "Host Drive {} ({})",
                medium.description, medium.name
            ));
        }
        return text;
    }

    let is_disk = medium.device_type == DeviceType::HardDisk;
    let mut details: Vec<String> = Vec::new();
    if is_disk {
        details.push(medium.medium_type.label().to_string());
        if medium.encrypted {
            details.push("Encrypted".to_string());
        }
    }

    details.push(match medium.state {
        MediumState::NotCreated => "Checking...".to_string(),
        MediumState::Inaccessible => "Inaccessible".to_string(),
        _ if is_disk => format_size(medium.logical_size),
        _ => format_size(medium.size),
    });

    format!("{text}{} ({})", medium.name, details.join(", "))
}

/// Chipset plus attachment summary, or an empty string for an unattached adapter.
#[must_use]
pub fn network_adapter_description(adapter: &NetworkAdapter) -> String {
    let detail = match &adapter.attachment {
        NetworkAttachmentType::Null => return String::new(),
        NetworkAttachmentType::Bridged => {
            format!("Bridged Adapter, {}", adapter.bridged_interface)
        }
        NetworkAttachmentType::Internal => {
            format!("Internal Network, '{}'", adapter.internal_network)
        }
        NetworkAttachmentType::HostOnly => {
            format!("Host-only Adapter, '{}'", adapter.host_only_interface)
        }
        NetworkAttachmentType::Generic => {
            format!("Generic Driver, '{}'", adapter.generic_driver)
        }
        NetworkAttachmentType::NatNetwork => format!("NAT Network, '{}'", adapter.nat_network),
        other => other.label().to_string(),
    };

    format!("{} ({detail})", adapter.adapter_type.label())
}

fn standard_port_name(table: &[(&str, u32, u32)], irq: u32, io_base: u32) -> String {
    table
        .iter()
        .find(|(_, i, b)| *i == irq && *b == io_base)
        .map_or_else(
            || format!("User-defined (IRQ {irq}, I/O Port 0x{io_base:03X})"),
            |(name, _, _)| (*name).to_string(),
        )
}

#[must_use]
pub fn serial_port_name(port: &SerialPort) -> String {
    standard_port_name(&COM_PORTS, port.irq, port.io_base)
}

#[must_use]
pub fn parallel_port_name(port: &ParallelPort) -> String {
    standard_port_name(&LPT_PORTS, port.irq, port.io_base)
}

#[must_use]
pub fn boot_order(devices: &[DeviceType]) -> String {
    devices
        .iter()
        .map(DeviceType::label)
        .filter(|label| !label.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[must_use]
pub fn acceleration_summary(machine: &Machine, host: &HostInfo) -> String {
    let accel = &machine.acceleration;
    let mut parts: Vec<String> = Vec::new();

    if host.hw_virt && accel.hw_virt {
        parts.push("VT-x/AMD-V".to_string());
        if accel.nested_paging {
            parts.push("Nested Paging".to_string());
        }
    }
    if accel.pae {
        parts.push("PAE/NX".to_string());
    }

    let provider = accel.paravirt_provider.label();
    if !provider.is_empty() {
        parts.push(format!("{provider} Paravirtualization"));
    }

    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{MediumType, NetworkAdapterType, ParavirtProvider};
    use crate::machine::{Acceleration, Medium};

    #[test]
    fn test_format_size_examples() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1536), "1.50 KiB");
        assert_eq!(format_size(1024u64.pow(3)), "1.00 GiB");
        assert_eq!(format_size(10 * 1024u64.pow(5)), "10.00 PiB");
    }

    #[test]
    fn test_format_size_boundaries() {
        assert!(format_size(1023).ends_with(" B"));
        assert!(format_size(1024).ends_with(" KiB"));
        assert!(format_size(1024 * 1024 - 1).ends_with(" KiB"));
        assert!(format_size(1024 * 1024).ends_with(" MiB"));
        assert!(format_size(u64::MAX).ends_with(" PiB"));
    }

    #[test]
    fn test_storage_slot_names() {
        assert_eq!(storage_slot_name(&StorageBus::Ide, 0, 1), "IDE Primary Slave");
        assert_eq!(storage_slot_name(&StorageBus::Ide, 1, 0), "IDE Secondary Master");
        assert_eq!(
            storage_slot_name(&StorageBus::Ide, 2, 3),
            "IDE <invalid> <invalid>"
        );
        assert_eq!(storage_slot_name(&StorageBus::Floppy, 0, 1), "Floppy Device 1");
        assert_eq!(storage_slot_name(&StorageBus::Sata, 3, 0), "SATA Port 3");
    }

    fn disk(state: MediumState) -> Medium {
        Medium {
            name: "disk.vdi".to_string(),
            device_type: DeviceType::HardDisk,
            medium_type: MediumType::Normal,
            state,
            logical_size: 20 * 1024u64.pow(3),
            size: 3 * 1024u64.pow(3),
            ..Medium::default()
        }
    }

    #[test]
    fn test_attachment_description_disk() {
        let mut attachment = MediumAttachment {
            device_type: DeviceType::HardDisk,
            medium: Some(disk(MediumState::Created)),
            ..MediumAttachment::default()
        };
        assert_eq!(
            attachment_description(&attachment),
            "disk.vdi (Normal, 20.00 GiB)"
        );

        if let Some(medium) = attachment.medium.as_mut() {
            medium.encrypted = true;
            medium.state = MediumState::Inaccessible;
        }
        assert_eq!(
            attachment_description(&attachment),
            "disk.vdi (Normal, Encrypted, Inaccessible)"
        );
    }

    #[test]
    fn test_attachment_description_optical() {
        let empty = MediumAttachment {
            device_type: DeviceType::Dvd,
            ..MediumAttachment::default()
        };
        assert_eq!(attachment_description(&empty), "[Optical Drive] Empty");

        let host = MediumAttachment {
            device_type: DeviceType::Dvd,
            medium: Some(Medium {
                host_drive: true,
                location: "/dev/sr0".to_string(),
                ..Medium::default()
            }),
            ..MediumAttachment::default()
        };
        assert_eq!(
            attachment_description(&host),
            "[Optical Drive] Host Drive '/dev/sr0'"
        );

        let iso = MediumAttachment {
            device_type: DeviceType::Dvd,
            medium: Some(Medium {
                name: "install.iso".to_string(),
                device_type: DeviceType::Dvd,
                size: 1536,
                ..Medium::default()
            }),
            ..MediumAttachment::default()
        };
        assert_eq!(
            attachment_description(&iso),
            "[Optical Drive] install.iso (1.50 KiB)"
        );

        let pending = MediumAttachment {
            device_type: DeviceType::Dvd,
            medium: Some(Medium {
                name: "new.iso".to_string(),
                device_type: DeviceType::Dvd,
                state: MediumState::NotCreated,
                ..Medium::default()
            }),
            ..MediumAttachment::default()
        };
        assert_eq!(
            attachment_description(&pending),
            "[Optical Drive] new.iso (Checking...)"
        );
    }

    #[test]
    fn test_network_adapter_description() {
        let mut adapter = NetworkAdapter {
            enabled: true,
            adapter_type: NetworkAdapterType::I82540Em,
            attachment: NetworkAttachmentType::Nat,
            host_only_interface: "vboxnet0".to_string(),
            ..NetworkAdapter::default()
        };
        assert_eq!(
            network_adapter_description(&adapter),
            "Intel PRO/1000 MT Desktop (NAT)"
        );

        adapter.attachment = NetworkAttachmentType::HostOnly;
        assert_eq!(
            network_adapter_description(&adapter),
            "Intel PRO/1000 MT Desktop (Host-only Adapter, 'vboxnet0')"
        );

        adapter.attachment = NetworkAttachmentType::Null;
        assert_eq!(network_adapter_description(&adapter), "");

        adapter.attachment = NetworkAttachmentType::Other("cloud".to_string());
        assert_eq!(
            network_adapter_description(&adapter),
            "Intel PRO/1000 MT Desktop ((Unknown))"
        );
    }

    #[test]
    fn test_port_names() {
        let com2 = SerialPort {
            irq: 3,
            io_base: 0x2f8,
            ..SerialPort::default()
        };
        assert_eq!(serial_port_name(&com2), "COM2");

        let odd = SerialPort {
            irq: 5,
            io_base: 0x3f8,
            ..SerialPort::default()
        };
        assert_eq!(
            serial_port_name(&odd),
            "User-defined (IRQ 5, I/O Port 0x3F8)"
        );

        let lpt1 = ParallelPort {
            irq: 7,
            io_base: 0x378,
            ..ParallelPort::default()
        };
        assert_eq!(parallel_port_name(&lpt1), "LPT1");
    }

    #[test]
    fn test_boot_order_skips_empty_devices() {
        let devices = [
            DeviceType::Floppy,
            DeviceType::Null,
            DeviceType::Dvd,
            DeviceType::HardDisk,
        ];
        assert_eq!(boot_order(&devices), "Floppy, Optical, Hard Disk");
        assert_eq!(boot_order(&[]), "");
    }

    #[test]
    fn test_acceleration_summary() {
        let machine = Machine {
            acceleration: Acceleration {
                hw_virt: true,
                nested_paging: true,
                pae: true,
                paravirt_provider: ParavirtProvider::Kvm,
            },
            ..Machine::default()
        };

        assert_eq!(
            acceleration_summary(&machine, &HostInfo { hw_virt: true }),
            "VT-x/AMD-V, Nested Paging, PAE/NX, KVM Paravirtualization"
        );
        assert_eq!(
            acceleration_summary(&machine, &HostInfo { hw_virt: false }),
            "PAE/NX, KVM Paravirtualization"
        );
        assert_eq!(
            acceleration_summary(&Machine::default(), &HostInfo::default()),
            ""
        );
    }
}
