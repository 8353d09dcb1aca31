//! In-memory `Hypervisor` for tests of the facade, the controller and the UI.

use crate::error::VboxError;
use crate::hypervisor::{ErrorInfo, Hypervisor, Progress, ProgressStatus, Session, SessionState};
use std::cell::{Cell, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use vboxcli_core::enums::MachineState;
use vboxcli_core::order::order_hint_key;
use vboxcli_core::{Frontend, HostInfo, LockType, Machine, MachineId};

/// How the next long-running verb behaves.
#[derive(Clone, Debug)]
pub struct ProgressScript {
    pub polls_until_done: u32,
    pub result_code: i32,
    pub error: Option<ErrorInfo>,
    pub cancelable: bool,
}

impl Default for ProgressScript {
    fn default() -> Self {
        Self {
            polls_until_done: 1,
            result_code: 0,
            error: None,
            cancelable: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub machines: Vec<Machine>,
    pub extra_data: HashMap<String, String>,
    pub host: HostInfo,
    pub unreachable: bool,
    pub lock_error: Option<String>,
    pub verb_error: Option<String>,
    pub poll_error: Option<String>,
    pub progress: ProgressScript,
    pub canceled: bool,
    pub calls: Vec<String>,
    pub machine_lists: usize,
    pub events: usize,
    sessions: Vec<Rc<Cell<SessionState>>>,
}

#[derive(Clone, Debug, Default)]
pub struct FakeHypervisor {
    state: Rc<RefCell<FakeState>>,
}

impl FakeHypervisor {
    #[must_use]
    pub fn new(machines: Vec<Machine>) -> Self {
        let fake = Self::default();
        fake.state().machines = machines;
        fake
    }

    /// Store the `GUI/GroupDefinitions` hint of `path`.
    #[must_use]
    pub fn with_hint(self, path: &str, hint: &str) -> Self {
        self.state()
            .extra_data
            .insert(order_hint_key(path), hint.to_string());
        self
    }

    pub fn state(&self) -> RefMut<'_, FakeState> {
        self.state.borrow_mut()
    }

    pub fn sessions_created(&self) -> usize {
        self.state.borrow().sessions.len()
    }

    pub fn sessions_locked(&self) -> usize {
        self.state
            .borrow()
            .sessions
            .iter()
            .filter(|s| s.get() == SessionState::Locked)
            .count()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn machine_state(&self, id: &MachineId) -> Option<MachineState> {
        self.state
            .borrow()
            .machines
            .iter()
            .find(|m| &m.id == id)
            .map(|m| m.state.clone())
    }

    fn verb(
        &self,
        session: &FakeSession,
        name: &str,
        next: Option<MachineState>,
    ) -> Result<(), VboxError> {
        let id = session.target()?;
        let mut state = self.state();
        state.calls.push(format!("{name} {id}"));
        if let Some(message) = state.verb_error.clone() {
            return Err(VboxError::Command {
                command: name.to_string(),
                message,
            });
        }
        if let Some(next) = next
            && let Some(machine) = state.machines.iter_mut().find(|m| m.id == id)
        {
            machine.state = next;
        }
        Ok(())
    }

    fn progress(&self) -> FakeProgress {
        let script = self.state.borrow().progress.clone();
        FakeProgress {
            state: Rc::clone(&self.state),
            script,
            polls: 0,
        }
    }
}

#[derive(Debug)]
pub struct FakeSession {
    state: Rc<Cell<SessionState>>,
    machine: Option<MachineId>,
}

impl FakeSession {
    fn target(&self) -> Result<MachineId, VboxError> {
        match (&self.machine, self.state.get()) {
            (Some(id), SessionState::Locked) => Ok(id.clone()),
            _ => Err(VboxError::NotLocked),
        }
    }
}

impl Session for FakeSession {
    fn state(&self) -> SessionState {
        self.state.get()
    }

    async fn unlock(&mut self) -> Result<(), VboxError> {
        if self.state.get() == SessionState::Unlocked {
            return Err(VboxError::NotLocked);
        }
        self.state.set(SessionState::Unlocked);
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeProgress {
    state: Rc<RefCell<FakeState>>,
    script: ProgressScript,
    polls: u32,
}

impl Progress for FakeProgress {
    async fn status(&mut self) -> Result<ProgressStatus, VboxError> {
        let canceled = self.state.borrow().canceled;
        let total = self.script.polls_until_done.max(1);
        let completed = canceled || self.polls >= total;
        let percent = u8::try_from((self.polls.min(total) * 100) / total).unwrap_or(100);

        Ok(ProgressStatus {
            completed,
            percent,
            result_code: if completed { self.script.result_code } else { 0 },
            error: completed.then(|| self.script.error.clone()).flatten(),
        })
    }

    fn cancelable(&self) -> bool {
        self.script.cancelable
    }

    async fn cancel(&mut self) -> Result<(), VboxError> {
        self.state().canceled = true;
        Ok(())
    }

    async fn wait_for_completion(&mut self, _timeout: Duration) -> Result<(), VboxError> {
        if let Some(message) = self.state.borrow().poll_error.clone() {
            return Err(VboxError::Command {
                command: "progress".to_string(),
                message,
            });
        }
        self.polls += 1;
        Ok(())
    }
}

impl FakeProgress {
    fn state(&self) -> RefMut<'_, FakeState> {
        self.state.borrow_mut()
    }
}

impl Hypervisor for FakeHypervisor {
    type Session = FakeSession;
    type Progress = FakeProgress;

    async fn version(&self) -> Result<String, VboxError> {
        if self.state.borrow().unreachable {
            return Err(VboxError::Connect("fake backend unreachable".to_string()));
        }
        Ok("7.0.0_fake".to_string())
    }

    async fn machines(&self) -> Result<Vec<Machine>, VboxError> {
        let mut state = self.state();
        state.machine_lists += 1;
        Ok(state.machines.clone())
    }

    async fn machine(&self, id: &MachineId) -> Result<Machine, VboxError> {
        self.state
            .borrow()
            .machines
            .iter()
            .find(|m| &m.id == id)
            .cloned()
            .ok_or_else(|| VboxError::MachineNotFound(id.to_string()))
    }

    async fn host_info(&self) -> Result<HostInfo, VboxError> {
        Ok(self.state.borrow().host)
    }

    async fn extra_data(&self, key: &str) -> Result<Option<String>, VboxError> {
        Ok(self.state.borrow().extra_data.get(key).cloned())
    }

    fn new_session(&self) -> FakeSession {
        let cell = Rc::new(Cell::new(SessionState::Unlocked));
        self.state().sessions.push(Rc::clone(&cell));
        FakeSession {
            state: cell,
            machine: None,
        }
    }

    async fn lock_machine(
        &self,
        session: &mut FakeSession,
        id: &MachineId,
        lock: LockType,
    ) -> Result<(), VboxError> {
        let mut state = self.state();
        state.calls.push(format!("lock {id} {lock:?}"));
        if let Some(message) = state.lock_error.clone() {
            return Err(VboxError::Lock(message));
        }
        session.machine = Some(id.clone());
        session.state.set(SessionState::Locked);
        Ok(())
    }

    async fn launch(
        &self,
        session: &mut FakeSession,
        frontend: Frontend,
    ) -> Result<FakeProgress, VboxError> {
        self.verb(
            session,
            &format!("launch-{}", frontend.as_str()),
            Some(MachineState::Running),
        )?;
        Ok(self.progress())
    }

    async fn save_state(&self, session: &mut FakeSession) -> Result<FakeProgress, VboxError> {
        self.verb(session, "savestate", Some(MachineState::Saved))?;
        Ok(self.progress())
    }

    async fn pause(&self, session: &mut FakeSession) -> Result<(), VboxError> {
        self.verb(session, "pause", Some(MachineState::Paused))
    }

    async fn resume(&self, session: &mut FakeSession) -> Result<(), VboxError> {
        self.verb(session, "resume", Some(MachineState::Running))
    }

    async fn acpi_power_button(&self, session: &mut FakeSession) -> Result<(), VboxError> {
        self.verb(session, "acpipowerbutton", None)
    }

    async fn power_down(&self, session: &mut FakeSession) -> Result<(), VboxError> {
        self.verb(session, "poweroff", Some(MachineState::PoweredOff))
    }

    async fn process_events(&self) {
        self.state().events += 1;
    }
}

/// A minimal accessible machine in the given groups.
#[must_use]
pub fn machine(id: &str, name: &str, state: MachineState, groups: &[&str]) -> Machine {
    Machine {
        id: MachineId::new(id),
        name: name.to_string(),
        accessible: true,
        state,
        groups: groups.iter().map(|g| (*g).to_string()).collect(),
        memory_mb: 1024,
        cpu_count: 1,
        cpu_execution_cap: 100,
        monitor_count: 1,
        ..Machine::default()
    }
}
