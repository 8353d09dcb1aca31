//! Hypervisor enum domains.
//!
//! Every domain keeps the raw token of values this release does not know in
//! an `Other` arm, and every `label()` is total: unknown values render as
//! [`UNKNOWN`].

pub const UNKNOWN: &str = "(Unknown)";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AudioControllerType {
    Ac97,
    Sb16,
    #[default]
    Hda,
    Other(String),
}

impl AudioControllerType {
    pub fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "ac97" => Self::Ac97,
            "sb16" => Self::Sb16,
            "hda" => Self::Hda,
            _ => Self::Other(token.to_string()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ac97 => "ICH AC97",
            Self::Sb16 => "SoundBlaster 16",
            Self::Hda => "Intel HD Audio",
            Self::Other(_) => UNKNOWN,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AudioDriverType {
    Null,
    #[default]
    Default,
    WinMm,
    Oss,
    Alsa,
    DirectSound,
    CoreAudio,
    Pulse,
    SolAudio,
    Other(String),
}

impl AudioDriverType {
    pub fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "null" => Self::Null,
            "default" => Self::Default,
            "winmm" => Self::WinMm,
            "oss" => Self::Oss,
            "alsa" => Self::Alsa,
            "dsound" | "directsound" => Self::DirectSound,
            "coreaudio" => Self::CoreAudio,
            "pulse" | "pulseaudio" => Self::Pulse,
            "solaudio" => Self::SolAudio,
            _ => Self::Other(token.to_string()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Null => "Dummy",
            Self::Default => "Default",
            Self::WinMm => "Windows Multimedia",
            Self::Oss => "OSS",
            Self::Alsa => "ALSA",
            Self::DirectSound => "DirectSound",
            Self::CoreAudio => "CoreAudio",
            Self::Pulse => "PulseAudio",
            Self::SolAudio => "Solaris Audio",
            Self::Other(_) => UNKNOWN,
        }
    }
}

/// Boot and attachment device kinds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DeviceType {
    #[default]
    Null,
    Floppy,
    Dvd,
    HardDisk,
    Network,
    Usb,
    SharedFolder,
    Graphics3D,
    Other(String),
}

impl DeviceType {
    pub fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "none" | "null" => Self::Null,
            "floppy" => Self::Floppy,
            "dvd" => Self::Dvd,
            "disk" | "harddisk" => Self::HardDisk,
            "net" | "network" => Self::Network,
            "usb" => Self::Usb,
            "sharedfolder" => Self::SharedFolder,
            "graphics3d" => Self::Graphics3D,
            _ => Self::Other(token.to_string()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Null => "",
            Self::Floppy => "Floppy",
            Self::Dvd => "Optical",
            Self::HardDisk => "Hard Disk",
            Self::Network => "Network",
            Self::Usb => "USB",
            Self::SharedFolder => "Shared Folder",
            Self::Graphics3D => "3D Graphics",
            Self::Other(_) => UNKNOWN,
        }
    }
}

/// Colour class of a machine state icon.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateTone {
    Off,
    Run,
    Pause,
    On,
    Error,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum MachineState {
    #[default]
    Null,
    PoweredOff,
    Saved,
    Teleported,
    Aborted,
    Running,
    Paused,
    Stuck,
    Teleporting,
    LiveSnapshotting,
    Starting,
    Stopping,
    Saving,
    Restoring,
    TeleportingPausedVm,
    TeleportingIn,
    FaultTolerantSyncing,
    DeletingSnapshotOnline,
    DeletingSnapshotPaused,
    OnlineSnapshotting,
    RestoringSnapshot,
    DeletingSnapshot,
    SettingUp,
    Snapshotting,
    Other(String),
}

impl MachineState {
    /// Parse a `VMState` token as printed by `VBoxManage showvminfo --machinereadable`.
    pub fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "null" => Self::Null,
            "poweroff" | "poweredoff" => Self::PoweredOff,
            "saved" => Self::Saved,
            "teleported" => Self::Teleported,
            "aborted" => Self::Aborted,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "gurumeditation" | "stuck" => Self::Stuck,
            "teleporting" => Self::Teleporting,
            "livesnapshotting" => Self::LiveSnapshotting,
            "starting" => Self::Starting,
            "stopping" => Self::Stopping,
            "saving" => Self::Saving,
            "restoring" => Self::Restoring,
            "teleportingpausedvm" => Self::TeleportingPausedVm,
            "teleportingin" => Self::TeleportingIn,
            "faulttolerantsyncing" => Self::FaultTolerantSyncing,
            "deletingsnapshotlive" | "deletingsnapshotonline" => Self::DeletingSnapshotOnline,
            "deletingsnapshotlivepaused" | "deletingsnapshotpaused" => {
                Self::DeletingSnapshotPaused
            }
            "onlinesnapshotting" => Self::OnlineSnapshotting,
            "restoringsnapshot" => Self::RestoringSnapshot,
            "deletingsnapshot" => Self::DeletingSnapshot,
            "settingup" => Self::SettingUp,
            "snapshotting" => Self::Snapshotting,
            _ => Self::Other(token.to_string()),
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Null => "<Invalid>",
            Self::PoweredOff => "Powered Off",
            Self::Saved => "Saved",
            Self::Teleported => "Teleported",
            Self::Aborted => "Aborted",
            Self::Running => "Running",
            Self::Paused => "Paused",
            Self::Stuck => "Guru Meditation",
            Self::Teleporting => "Teleporting",
            Self::LiveSnapshotting | Self::OnlineSnapshotting => "Creating Snapshot (Online)",
            Self::Starting => "Starting",
            Self::Stopping => "Stopping",
            Self::Saving => "Saving",
            Self::Restoring => "Restoring",
            Self::TeleportingPausedVm => "Teleporting (Paused)",
            Self::TeleportingIn => "Teleporting In",
            Self::FaultTolerantSyncing => "Syncing",
            Self::DeletingSnapshotOnline => "Deleting Snapshot (Online)",
            Self::DeletingSnapshotPaused => "Deleting Snapshot (Paused)",
            Self::RestoringSnapshot => "Restoring Snapshot",
            Self::DeletingSnapshot => "Deleting Snapshot",
            Self::SettingUp => "Configuring",
            Self::Snapshotting => "Creating Snapshot",
            Self::Other(_) => UNKNOWN,
        }
    }

    /// One-glyph status icon. Glyphs stay within what limited terminal fonts render.
    #[must_use]
    pub fn icon(&self) -> (&'static str, StateTone) {
        match self {
            Self::PoweredOff | Self::SettingUp => ("\u{25a0}", StateTone::Off),
            Self::Saved => ("\u{25c9}", StateTone::Off),
            Self::Teleported | Self::TeleportingIn => ("T", StateTone::Off),
            Self::Aborted | Self::Stuck => ("!", StateTone::Error),
            Self::Running => ("\u{25b6}", StateTone::Run),
            Self::Paused => ("\u{2225}", StateTone::Pause),
            Self::Teleporting => ("T", StateTone::On),
            Self::LiveSnapshotting => ("S", StateTone::On),
            Self::Starting => ("\u{25a0}", StateTone::On),
            Self::Stopping => ("\u{25a0}", StateTone::Pause),
            Self::Saving | Self::Restoring => ("\u{25d4}", StateTone::Pause),
            Self::TeleportingPausedVm => ("T", StateTone::Pause),
            Self::FaultTolerantSyncing => ("\u{25e9}", StateTone::Run),
            Self::DeletingSnapshotOnline => ("D", StateTone::Run),
            Self::DeletingSnapshotPaused => ("D", StateTone::Pause),
            Self::OnlineSnapshotting => ("S", StateTone::Pause),
            Self::RestoringSnapshot => ("R", StateTone::Off),
            Self::DeletingSnapshot => ("D", StateTone::Off),
            Self::Snapshotting => ("S", StateTone::Off),
            Self::Null | Self::Other(_) => ("?", StateTone::Error),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum MediumType {
    #[default]
    Normal,
    Immutable,
    Writethrough,
    Shareable,
    Readonly,
    MultiAttach,
    Other(String),
}

impl MediumType {
    /// Accepts both bare tokens and `list hdds` values such as `normal (base)`.
    pub fn parse(token: &str) -> Self {
        let word = token.split_whitespace().next().unwrap_or_default();
        match word.to_ascii_lowercase().as_str() {
            "normal" => Self::Normal,
            "immutable" => Self::Immutable,
            "writethrough" => Self::Writethrough,
            "shareable" => Self::Shareable,
            "readonly" => Self::Readonly,
            "multiattach" => Self::MultiAttach,
            _ => Self::Other(token.to_string()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Immutable => "Immutable",
            Self::Writethrough => "Writethrough",
            Self::Shareable => "Shareable",
            Self::Readonly => "Read-Only",
            Self::MultiAttach => "Multi-Attach",
            Self::Other(_) => UNKNOWN,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum MediumState {
    NotCreated,
    #[default]
    Created,
    LockedRead,
    LockedWrite,
    Inaccessible,
    Creating,
    Deleting,
    Other(String),
}

impl MediumState {
    pub fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "not created" | "notcreated" => Self::NotCreated,
            "created" => Self::Created,
            "locked read" | "lockedread" => Self::LockedRead,
            "locked write" | "lockedwrite" => Self::LockedWrite,
            "inaccessible" => Self::Inaccessible,
            "creating" => Self::Creating,
            "deleting" => Self::Deleting,
            _ => Self::Other(token.to_string()),
        }
    }
}

/// Network adapter chipsets.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum NetworkAdapterType {
    Null,
    Am79C970A,
    Am79C973,
    Am79C960,
    #[default]
    I82540Em,
    I82543Gc,
    I82545Em,
    Virtio,
    Other(String),
}

impl NetworkAdapterType {
    pub fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "null" => Self::Null,
            "am79c970a" => Self::Am79C970A,
            "am79c973" => Self::Am79C973,
            "am79c960" => Self::Am79C960,
            "82540em" => Self::I82540Em,
            "82543gc" => Self::I82543Gc,
            "82545em" => Self::I82545Em,
            "virtio" => Self::Virtio,
            _ => Self::Other(token.to_string()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Null => "<Invalid>",
            Self::Am79C970A => "AMD PCNet-PCI II",
            Self::Am79C973 => "AMD PCNet-FAST III",
            Self::Am79C960 => "AMD PCnet-ISA/NE2100",
            Self::I82540Em => "Intel PRO/1000 MT Desktop",
            Self::I82543Gc => "Intel PRO/1000 T Server",
            Self::I82545Em => "Intel PRO/1000 MT Server",
            Self::Virtio => "Paravirtualized",
            Self::Other(_) => UNKNOWN,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum NetworkAttachmentType {
    #[default]
    Null,
    Nat,
    Bridged,
    Internal,
    HostOnly,
    Generic,
    NatNetwork,
    Other(String),
}

impl NetworkAttachmentType {
    pub fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "null" | "none" => Self::Null,
            "nat" => Self::Nat,
            "bridged" => Self::Bridged,
            "intnet" | "internal" => Self::Internal,
            "hostonly" => Self::HostOnly,
            "generic" => Self::Generic,
            "natnetwork" => Self::NatNetwork,
            _ => Self::Other(token.to_string()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Null => "",
            Self::Nat => "NAT",
            Self::Bridged => "Bridged",
            Self::Internal => "Internal",
            Self::HostOnly => "Host-Only",
            Self::Generic => "Generic",
            Self::NatNetwork => "NAT Network",
            Self::Other(_) => UNKNOWN,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ParavirtProvider {
    #[default]
    None,
    Default,
    Legacy,
    Minimal,
    HyperV,
    Kvm,
    Other(String),
}

impl ParavirtProvider {
    pub fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Self::None,
            "default" => Self::Default,
            "legacy" => Self::Legacy,
            "minimal" => Self::Minimal,
            "hyperv" | "hyper-v" => Self::HyperV,
            "kvm" => Self::Kvm,
            _ => Self::Other(token.to_string()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Default => "Default",
            Self::Legacy => "Legacy",
            Self::Minimal => "Minimal",
            Self::HyperV => "Hyper-V",
            Self::Kvm => "KVM",
            Self::Other(_) => UNKNOWN,
        }
    }
}

/// Host side of a serial or parallel port.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PortMode {
    #[default]
    Disconnected,
    HostPipe,
    HostDevice,
    RawFile,
    Tcp,
    Other(String),
}

impl PortMode {
    pub fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "disconnected" => Self::Disconnected,
            "hostpipe" => Self::HostPipe,
            "hostdevice" => Self::HostDevice,
            "rawfile" => Self::RawFile,
            "tcp" => Self::Tcp,
            _ => Self::Other(token.to_string()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::HostPipe => "Host Pipe",
            Self::HostDevice => "Host Device",
            Self::RawFile => "Raw File",
            Self::Tcp => "TCP Socket",
            Self::Other(_) => UNKNOWN,
        }
    }

    /// Whether the mode is backed by a host path worth showing.
    pub fn has_path(&self) -> bool {
        matches!(
            self,
            Self::HostPipe | Self::HostDevice | Self::RawFile | Self::Tcp
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum StorageBus {
    Null,
    #[default]
    Ide,
    Sata,
    Scsi,
    Floppy,
    Sas,
    Usb,
    Pcie,
    VirtioScsi,
    Other(String),
}

impl StorageBus {
    pub fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "null" => Self::Null,
            "ide" => Self::Ide,
            "sata" => Self::Sata,
            "scsi" => Self::Scsi,
            "floppy" => Self::Floppy,
            "sas" => Self::Sas,
            "usb" => Self::Usb,
            "pcie" => Self::Pcie,
            "virtio" | "virtioscsi" | "virtio-scsi" => Self::VirtioScsi,
            _ => Self::Other(token.to_string()),
        }
    }

    /// Derive the bus from a controller chipset (`storagecontrollertype<n>`).
    pub fn from_controller_type(chipset: &str) -> Self {
        match chipset.trim().to_ascii_lowercase().as_str() {
            "piix3" | "piix4" | "ich6" => Self::Ide,
            "intelahci" => Self::Sata,
            "lsilogic" | "buslogic" => Self::Scsi,
            "i82078" => Self::Floppy,
            "lsilogicsas" => Self::Sas,
            "usb" => Self::Usb,
            "nvme" => Self::Pcie,
            "virtioscsi" | "virtio-scsi" | "virtio" => Self::VirtioScsi,
            _ => Self::Other(chipset.to_string()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Null => "<invalid>",
            Self::Ide => "IDE",
            Self::Sata => "SATA",
            Self::Scsi => "SCSI",
            Self::Floppy => "Floppy",
            Self::Sas => "SAS",
            Self::Usb => "USB",
            Self::Pcie => "PCIe",
            Self::VirtioScsi => "VirtIO",
            Self::Other(_) => UNKNOWN,
        }
    }
}
