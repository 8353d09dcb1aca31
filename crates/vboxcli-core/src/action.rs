use crate::enums::MachineState;

/// Session lock requested before a verb runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockType {
    Shared,
    Write,
}

/// Display frontend of a launched machine process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Frontend {
    Gui,
    Sdl,
    Headless,
}

impl Frontend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gui => "gui",
            Self::Sdl => "sdl",
            Self::Headless => "headless",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    StartGui,
    StartSdl,
    StartHeadless,
    SaveState,
    AcpiShutdown,
    PowerOff,
    Pause,
    Resume,
}

pub const START_MENU: [Action; 3] = [Action::StartGui, Action::StartSdl, Action::StartHeadless];
pub const STOP_MENU: [Action; 3] = [Action::SaveState, Action::AcpiShutdown, Action::PowerOff];

impl Action {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::StartGui => "Start GUI",
            Self::StartSdl => "Start (SDL)",
            Self::StartHeadless => "Start Headless",
            Self::SaveState => "Save State",
            Self::AcpiShutdown => "ACPI Shutdown",
            Self::PowerOff => "Power Off",
            Self::Pause => "Pause",
            Self::Resume => "Resume",
        }
    }

    /// Menu accelerator; always a character of the label.
    pub fn shortcut(self) -> char {
        match self {
            Self::StartGui => 'G',
            Self::StartSdl | Self::SaveState => 'S',
            Self::StartHeadless => 'H',
            Self::AcpiShutdown => 'A',
            Self::PowerOff | Self::Pause => 'P',
            Self::Resume => 'R',
        }
    }

    /// Launching spawns a new machine process and needs the write lock.
    pub fn lock_type(self) -> LockType {
        match self.frontend() {
            Some(_) => LockType::Write,
            None => LockType::Shared,
        }
    }

    pub fn frontend(self) -> Option<Frontend> {
        match self {
            Self::StartGui => Some(Frontend::Gui),
            Self::StartSdl => Some(Frontend::Sdl),
            Self::StartHeadless => Some(Frontend::Headless),
            _ => None,
        }
    }

    pub fn needs_confirmation(self) -> bool {
        self == Self::PowerOff
    }

    /// Progress caption while the action runs.
    pub fn progress_caption(self) -> &'static str {
        match self {
            Self::StartGui | Self::StartSdl | Self::StartHeadless => "Starting",
            Self::SaveState => "Saving state",
            Self::AcpiShutdown => "Sending ACPI shutdown",
            Self::PowerOff => "Powering off",
            Self::Pause => "Pausing",
            Self::Resume => "Resuming",
        }
    }
}

/// Start/stop menu offered for a state; empty for transitional states.
#[must_use]
pub fn menu_for(state: &MachineState) -> &'static [Action] {
    match state {
        MachineState::PoweredOff | MachineState::Aborted | MachineState::Saved => &START_MENU,
        MachineState::Running | MachineState::Paused => &STOP_MENU,
        _ => &[],
    }
}

#[must_use]
pub fn menu_title(state: &MachineState) -> &'static str {
    match state {
        MachineState::Running | MachineState::Paused => "Stop Machine",
        _ => "Start Machine",
    }
}

#[must_use]
pub fn pause_toggle(state: &MachineState) -> Option<Action> {
    match state {
        MachineState::Running => Some(Action::Pause),
        MachineState::Paused => Some(Action::Resume),
        _ => None,
    }
}
