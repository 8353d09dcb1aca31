//! The automation surface the rest of the program consumes.
//!
//! Calls are issued from a single thread, so the returned futures carry no
//! `Send` bound.
#![allow(async_fn_in_trait)]

use crate::error::VboxError;
use std::time::Duration;
use vboxcli_core::{Frontend, HostInfo, LockType, Machine, MachineId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Unlocked,
    Locked,
}

/// Lock object mediating access to one machine's runtime.
pub trait Session {
    fn state(&self) -> SessionState;

    /// Release the lock.
    ///
    /// # Errors
    /// Returns `VboxError::NotLocked` if the session holds no lock.
    async fn unlock(&mut self) -> Result<(), VboxError>;
}

/// Structured error reported by a finished operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    pub component: String,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgressStatus {
    pub completed: bool,
    pub percent: u8,
    pub result_code: i32,
    pub error: Option<ErrorInfo>,
}

/// Handle of a long-running operation.
pub trait Progress {
    /// # Errors
    /// Returns `VboxError` if the handle can no longer be queried.
    async fn status(&mut self) -> Result<ProgressStatus, VboxError>;

    fn cancelable(&self) -> bool;

    /// # Errors
    /// Returns `VboxError` if the cancel request could not be delivered.
    async fn cancel(&mut self) -> Result<(), VboxError>;

    /// Wait at most `timeout` for the operation to complete.
    ///
    /// # Errors
    /// Returns `VboxError` if waiting on the operation failed.
    async fn wait_for_completion(&mut self, timeout: Duration) -> Result<(), VboxError>;
}

pub trait Hypervisor {
    type Session: Session;
    type Progress: Progress;

    /// Probe the backend; used once at startup.
    ///
    /// # Errors
    /// Returns `VboxError::Connect` when VirtualBox cannot be reached.
    async fn version(&self) -> Result<String, VboxError>;

    /// # Errors
    /// Returns `VboxError` when the machine list cannot be read.
    async fn machines(&self) -> Result<Vec<Machine>, VboxError>;

    /// # Errors
    /// Returns `VboxError::MachineNotFound` for unknown ids.
    async fn machine(&self, id: &MachineId) -> Result<Machine, VboxError>;

    /// # Errors
    /// Returns `VboxError` when host facts cannot be read.
    async fn host_info(&self) -> Result<HostInfo, VboxError>;

    /// Global extra-data value, `None` when unset.
    ///
    /// # Errors
    /// Returns `VboxError` when the store cannot be queried.
    async fn extra_data(&self, key: &str) -> Result<Option<String>, VboxError>;

    fn new_session(&self) -> Self::Session;

    /// # Errors
    /// Returns `VboxError::Lock` when the machine cannot be locked.
    async fn lock_machine(
        &self,
        session: &mut Self::Session,
        id: &MachineId,
        lock: LockType,
    ) -> Result<(), VboxError>;

    /// # Errors
    /// Returns `VboxError` when the launch request is rejected.
    async fn launch(
        &self,
        session: &mut Self::Session,
        frontend: Frontend,
    ) -> Result<Self::Progress, VboxError>;

    /// # Errors
    /// Returns `VboxError` when the request is rejected.
    async fn save_state(&self, session: &mut Self::Session) -> Result<Self::Progress, VboxError>;

    /// # Errors
    /// Returns `VboxError` when the request is rejected.
    async fn pause(&self, session: &mut Self::Session) -> Result<(), VboxError>;

    /// # Errors
    /// Returns `VboxError` when the request is rejected.
    async fn resume(&self, session: &mut Self::Session) -> Result<(), VboxError>;

    /// # Errors
    /// Returns `VboxError` when the request is rejected.
    async fn acpi_power_button(&self, session: &mut Self::Session) -> Result<(), VboxError>;

    /// # Errors
    /// Returns `VboxError` when the request is rejected.
    async fn power_down(&self, session: &mut Self::Session) -> Result<(), VboxError>;

    /// Pump pending hypervisor events. Called once per progress poll.
    async fn process_events(&self) {}
}
