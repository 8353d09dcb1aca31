//! Grouped key/value report of a machine's configuration.

use crate::enums::StateTone;
use crate::format::{
    acceleration_summary, attachment_description, boot_order, network_adapter_description,
    parallel_port_name, serial_port_name, storage_slot_name,
};
use crate::machine::{HostInfo, Machine};

pub const NO_MACHINE: &str = "No machine selected";
pub const INACCESSIBLE: &str = "Machine details inaccessible";
pub const STATE_CAPTION: &str = "Current State:  ";

const GROUP_INDENT: usize = 2;
const CONTROLLER_INDENT: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tone {
    Normal,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Section {
    Message {
        text: String,
        tone: Tone,
    },
    State {
        icon: &'static str,
        tone: StateTone,
        text: &'static str,
    },
    Group {
        title: String,
        blocks: Vec<Block>,
    },
    Description(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Block {
    Caption(String),
    Fields(FieldGroup),
}

/// Rows sharing one label column. The width is the longest label of this group only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldGroup {
    pub label_width: usize,
    pub indent: usize,
    pub rows: Vec<(String, String)>,
}

impl FieldGroup {
    /// `None` for an empty group, so empty groups never produce a header.
    #[must_use]
    pub fn new(indent: usize, rows: Vec<(String, String)>) -> Option<Self> {
        if rows.is_empty() {
            return None;
        }
        let label_width = rows
            .iter()
            .map(|(label, _)| label.chars().count())
            .max()
            .unwrap_or_default();
        Some(Self {
            label_width,
            indent,
            rows,
        })
    }

    /// Indented `label:` cell padded to the group's column width.
    pub fn label_cell(&self, label: &str) -> String {
        let head = format!("{label}:");
        let width = self.label_width + 2;
        format!("{:indent$}{head:<width$}", "", indent = self.indent)
    }

    pub fn lines(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|(label, value)| format!("{} {value}", self.label_cell(label)))
            .collect()
    }
}

fn field(label: &str, value: impl Into<String>) -> (String, String) {
    (label.to_string(), value.into())
}

fn group(title: &str, rows: Vec<(String, String)>) -> Option<Section> {
    FieldGroup::new(GROUP_INDENT, rows).map(|fields| Section::Group {
        title: title.to_string(),
        blocks: vec![Block::Fields(fields)],
    })
}

/// Render the report for the selected machine.
#[must_use]
pub fn render(machine: Option<&Machine>, host: &HostInfo) -> Vec<Section> {
    let Some(machine) = machine else {
        return vec![Section::Message {
            text: NO_MACHINE.to_string(),
            tone: Tone::Normal,
        }];
    };

    if !machine.accessible {
        return vec![Section::Message {
            text: INACCESSIBLE.to_string(),
            tone: Tone::Error,
        }];
    }

    let (icon, tone) = machine.state.icon();
    let mut sections = vec![Section::State {
        icon,
        tone,
        text: machine.state.label(),
    }];

    let groups = [
        general(machine),
        system(machine, host),
        display(machine),
        storage(machine),
        audio(machine),
        network(machine),
        serial_ports(machine),
        parallel_ports(machine),
        usb(machine),
        shared_folders(machine),
    ];
    sections.extend(groups.into_iter().flatten());

    if !machine.description.is_empty() {
        sections.push(Section::Description(machine.description.clone()));
    }

    sections
}

fn general(machine: &Machine) -> Option<Section> {
    let os = if machine.os_type.is_empty() {
        "Unknown"
    } else {
        machine.os_type.as_str()
    };
    group(
        "General",
        vec![
            field("Name", machine.name.as_str()),
            field("ID", machine.id.as_str()),
            field("OS", os),
        ],
    )
}

fn system(machine: &Machine, host: &HostInfo) -> Option<Section> {
    let mut rows = vec![field("Base Memory", format!("{} MiB", machine.memory_mb))];
    if machine.cpu_count != 1 {
        rows.push(field("Processors", machine.cpu_count.to_string()));
    }
    if machine.cpu_execution_cap != 100 {
        rows.push(field(
            "Execution Cap",
            format!("{}%", machine.cpu_execution_cap),
        ));
    }
    rows.push(field("Boot Order", boot_order(&machine.boot_order)));
    let accel = acceleration_summary(machine, host);
    if !accel.is_empty() {
        rows.push(field("Acceleration", accel));
    }
    group("System", rows)
}

fn display(machine: &Machine) -> Option<Section> {
    let mut rows = vec![field("Video Memory", format!("{} MiB", machine.vram_mb))];
    if machine.monitor_count != 1 {
        rows.push(field("Screens", machine.monitor_count.to_string()));
    }
    if let Some(ports) = &machine.vrde_ports {
        rows.push(field("RDP Server Port", ports.as_str()));
    }
    if let Some(file) = &machine.video_capture_file {
        rows.push(field("Video Capture File", basename(file)));
    }
    group("Display", rows)
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn storage(machine: &Machine) -> Option<Section> {
    if machine.storage_controllers.is_empty() {
        return None;
    }

    let mut blocks = Vec::new();
    for controller in &machine.storage_controllers {
        blocks.push(Block::Caption(format!("Controller: {}", controller.name)));
        let rows = controller
            .attachments
            .iter()
            .map(|att| {
                (
                    storage_slot_name(&controller.bus, att.port, att.device),
                    attachment_description(att),
                )
            })
            .collect();
        if let Some(fields) = FieldGroup::new(CONTROLLER_INDENT, rows) {
            blocks.push(Block::Fields(fields));
        }
    }

    Some(Section::Group {
        title: "Storage".to_string(),
        blocks,
    })
}

fn audio(machine: &Machine) -> Option<Section> {
    let audio = machine.audio.as_ref()?;
    group(
        "Audio",
        vec![
            field("Host Driver", audio.driver.label()),
            field("Controller", audio.controller.label()),
        ],
    )
}

fn network(machine: &Machine) -> Option<Section> {
    let rows = machine
        .network_adapters
        .iter()
        .filter(|adapter| adapter.enabled)
        .filter_map(|adapter| {
            let desc = network_adapter_description(adapter);
            (!desc.is_empty()).then(|| (format!("Adapter {}", adapter.slot + 1), desc))
        })
        .collect();
    group("Network", rows)
}

fn serial_ports(machine: &Machine) -> Option<Section> {
    let rows = machine
        .serial_ports
        .iter()
        .filter(|port| port.enabled)
        .map(|port| {
            let mut text = format!("{}: {}", serial_port_name(port), port.mode.label());
            if port.mode.has_path() {
                text.push_str(&format!(" ({})", port.path));
            }
            (format!("Port {}", port.slot + 1), text)
        })
        .collect();
    group("Serial Ports", rows)
}

fn parallel_ports(machine: &Machine) -> Option<Section> {
    let rows = machine
        .parallel_ports
        .iter()
        .filter(|port| port.enabled)
        .map(|port| {
            (
                format!("Port {}", port.slot + 1),
                format!("{} ({})", parallel_port_name(port), port.path),
            )
        })
        .collect();
    group("Parallel Ports", rows)
}

fn usb(machine: &Machine) -> Option<Section> {
    let usb = machine.usb.as_ref()?;
    let controllers = if usb.controllers.is_empty() {
        "Disabled".to_string()
    } else {
        usb.controllers.join(", ")
    };
    let active = usb.filters.iter().filter(|f| f.active).count();
    group(
        "USB",
        vec![
            field("USB Controller", controllers),
            field(
                "Device Filters",
                format!("{} ({active} active)", usb.filters.len()),
            ),
        ],
    )
}

fn shared_folders(machine: &Machine) -> Option<Section> {
    let rows = machine
        .shared_folders
        .iter()
        .map(|folder| {
            let mut flags = Vec::new();
            if !folder.writable {
                flags.push("Read-Only");
            }
            if folder.auto_mount {
                flags.push("Auto-Mount");
            }
            let value = if flags.is_empty() {
                folder.host_path.clone()
            } else {
                format!("{} ({})", folder.host_path, flags.join(", "))
            };
            (folder.name.clone(), value)
        })
        .collect();
    group("Shared Folders", rows)
}

/// Plain-text rendering, one string per line.
#[must_use]
pub fn to_lines(sections: &[Section]) -> Vec<String> {
    let mut lines = Vec::new();
    for section in sections {
        match section {
            Section::Message { text, .. } => lines.push(text.clone()),
            Section::State { icon, text, .. } => {
                lines.push(format!("{STATE_CAPTION}{icon} {text}"));
            }
            Section::Group { title, blocks } => {
                lines.push(String::new());
                lines.push(title.clone());
                for block in blocks {
                    match block {
                        Block::Caption(text) => {
                            lines.push(format!("{:GROUP_INDENT$}{text}", ""));
                        }
                        Block::Fields(fields) => lines.extend(fields.lines()),
                    }
                }
            }
            Section::Description(text) => {
                lines.push(String::new());
                lines.push("Description".to_string());
                lines.extend(text.lines().map(|l| format!("{:GROUP_INDENT$}{l}", "")));
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{DeviceType, MachineState, NetworkAttachmentType, StorageBus};
    use crate::machine::{
        AudioAdapter, MachineId, MediumAttachment, NetworkAdapter, SharedFolder,
        StorageController, UsbFilter, UsbSettings,
    };

    fn base_machine() -> Machine {
        Machine {
            id: MachineId::new("0f9d1c3a-1111-2222-3333-444455556666"),
            name: "build-box".to_string(),
            accessible: true,
            state: MachineState::PoweredOff,
            groups: vec!["/".to_string()],
            os_type: "Ubuntu (64-bit)".to_string(),
            memory_mb: 2048,
            cpu_count: 1,
            cpu_execution_cap: 100,
            boot_order: vec![DeviceType::Dvd, DeviceType::HardDisk],
            vram_mb: 16,
            monitor_count: 1,
            ..Machine::default()
        }
    }

    fn titles(sections: &[Section]) -> Vec<&str> {
        sections
            .iter()
            .filter_map(|s| match s {
                Section::Group { title, .. } => Some(title.as_str()),
                _ => None,
            })
            .collect()
    }

    fn find_group<'a>(sections: &'a [Section], wanted: &str) -> Option<&'a [Block]> {
        sections.iter().find_map(|s| match s {
            Section::Group { title, blocks } if title == wanted => Some(blocks.as_slice()),
            _ => None,
        })
    }

    #[test]
    fn test_no_machine() {
        let sections = render(None, &HostInfo::default());
        assert_eq!(
            sections,
            vec![Section::Message {
                text: NO_MACHINE.to_string(),
                tone: Tone::Normal
            }]
        );
    }

    #[test]
    fn test_inaccessible_machine_single_error_line() {
        let mut machine = Machine::inaccessible(MachineId::new("x"), "broken");
        machine.description = "never shown".to_string();
        let sections = render(Some(&machine), &HostInfo::default());
        assert_eq!(
            sections,
            vec![Section::Message {
                text: INACCESSIBLE.to_string(),
                tone: Tone::Error
            }]
        );
    }

    #[test]
    fn test_minimal_machine_sections() {
        let sections = render(Some(&base_machine()), &HostInfo::default());
        assert!(matches!(
            sections[0],
            Section::State {
                text: "Powered Off",
                ..
            }
        ));
        assert_eq!(titles(&sections), vec!["General", "System", "Display"]);

        let Some([Block::Fields(system)]) = find_group(&sections, "System") else {
            panic!("system group missing");
        };
        let labels: Vec<_> = system.rows.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["Base Memory", "Boot Order"]);
        assert_eq!(system.rows[1].1, "Optical, Hard Disk");
    }

    #[test]
    fn test_non_default_cpu_and_cap_shown() {
        let mut machine = base_machine();
        machine.cpu_count = 4;
        machine.cpu_execution_cap = 50;
        let sections = render(Some(&machine), &HostInfo::default());
        let Some([Block::Fields(system)]) = find_group(&sections, "System") else {
            panic!("system group missing");
        };
        assert!(system.rows.contains(&field("Processors", "4")));
        assert!(system.rows.contains(&field("Execution Cap", "50%")));
    }

    #[test]
    fn test_shared_folders_omitted_when_empty() {
        let sections = render(Some(&base_machine()), &HostInfo::default());
        assert!(find_group(&sections, "Shared Folders").is_none());
    }

    #[test]
    fn test_single_shared_folder_aligned_to_its_name() {
        let mut machine = base_machine();
        machine.shared_folders.push(SharedFolder {
            name: "projects".to_string(),
            host_path: "/home/me/projects".to_string(),
            writable: false,
            auto_mount: true,
        });
        let sections = render(Some(&machine), &HostInfo::default());
        let Some([Block::Fields(folders)]) = find_group(&sections, "Shared Folders") else {
            panic!("shared folders missing");
        };
        assert_eq!(folders.rows.len(), 1);
        assert_eq!(folders.label_width, "projects".len());
        assert_eq!(
            folders.lines(),
            vec!["  projects:  /home/me/projects (Read-Only, Auto-Mount)"]
        );
    }

    #[test]
    fn test_label_width_is_per_group() {
        let sections = render(Some(&base_machine()), &HostInfo::default());
        let Some([Block::Fields(general)]) = find_group(&sections, "General") else {
            panic!("general missing");
        };
        let Some([Block::Fields(display)]) = find_group(&sections, "Display") else {
            panic!("display missing");
        };
        assert_eq!(general.label_width, 4);
        assert_eq!(display.label_width, "Video Memory".len());
    }

    #[test]
    fn test_storage_controller_captions() {
        let mut machine = base_machine();
        machine.storage_controllers = vec![
            StorageController {
                name: "IDE".to_string(),
                bus: StorageBus::Ide,
                attachments: vec![MediumAttachment {
                    port: 1,
                    device: 0,
                    device_type: DeviceType::Dvd,
                    medium: None,
                }],
            },
            StorageController {
                name: "Spare".to_string(),
                bus: StorageBus::Sata,
                attachments: Vec::new(),
            },
        ];
        let sections = render(Some(&machine), &HostInfo::default());
        let blocks = find_group(&sections, "Storage").unwrap_or_default();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], Block::Caption("Controller: IDE".to_string()));
        let Block::Fields(fields) = &blocks[1] else {
            panic!("fields expected");
        };
        assert_eq!(fields.indent, 4);
        assert_eq!(
            fields.lines(),
            vec!["    IDE Secondary Master:  [Optical Drive] Empty"]
        );
        assert_eq!(blocks[2], Block::Caption("Controller: Spare".to_string()));
    }

    #[test]
    fn test_optional_groups() {
        let mut machine = base_machine();
        machine.audio = Some(AudioAdapter::default());
        machine.network_adapters = vec![
            NetworkAdapter {
                slot: 0,
                enabled: true,
                attachment: NetworkAttachmentType::Nat,
                ..NetworkAdapter::default()
            },
            NetworkAdapter {
                slot: 1,
                enabled: true,
                attachment: NetworkAttachmentType::Null,
                ..NetworkAdapter::default()
            },
            NetworkAdapter {
                slot: 2,
                enabled: false,
                attachment: NetworkAttachmentType::Nat,
                ..NetworkAdapter::default()
            },
        ];
        machine.usb = Some(UsbSettings {
            controllers: Vec::new(),
            filters: vec![
                UsbFilter {
                    name: "a".to_string(),
                    active: true,
                },
                UsbFilter {
                    name: "b".to_string(),
                    active: false,
                },
            ],
        });
        machine.description = "line one\nline two".to_string();

        let sections = render(Some(&machine), &HostInfo::default());
        assert_eq!(
            titles(&sections),
            vec!["General", "System", "Display", "Audio", "Network", "USB"]
        );

        let Some([Block::Fields(net)]) = find_group(&sections, "Network") else {
            panic!("network missing");
        };
        assert_eq!(net.rows, vec![field("Adapter 1", "Intel PRO/1000 MT Desktop (NAT)")]);

        let Some([Block::Fields(usb)]) = find_group(&sections, "USB") else {
            panic!("usb missing");
        };
        assert_eq!(usb.rows[0].1, "Disabled");
        assert_eq!(usb.rows[1].1, "2 (1 active)");

        assert_eq!(
            sections.last(),
            Some(&Section::Description("line one\nline two".to_string()))
        );
    }

    #[test]
    fn test_to_lines() {
        let machine = base_machine();
        let lines = to_lines(&render(Some(&machine), &HostInfo::default()));
        assert_eq!(lines[0], "Current State:  \u{25a0} Powered Off");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "General");
        assert_eq!(lines[3], "  Name:  build-box");
    }

    #[test]
    fn test_basename_handles_both_separators() {
        assert_eq!(basename("/tmp/cap/out.webm"), "out.webm");
        assert_eq!(basename("C:\\Users\\me\\out.webm"), "out.webm");
        assert_eq!(basename("plain.webm"), "plain.webm");
    }
}
