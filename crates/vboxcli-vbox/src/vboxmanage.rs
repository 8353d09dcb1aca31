//! `Hypervisor` backed by the `VBoxManage` command line tool.
//!
//! VBoxManage takes and releases its own session lock for every command, so
//! [`CliSession`] only records which machine a verb targets and whether the
//! caller considers it locked. The lock preconditions are checked against the
//! machine state before any verb runs.

use crate::error::VboxError;
use crate::hypervisor::{ErrorInfo, Hypervisor, Progress, ProgressStatus, Session, SessionState};
use crate::machinereadable::MachineReadable;
use crate::media::MediaRegistry;
use crate::vminfo::{INACCESSIBLE_NAME, machine_from_info, parse_vm_list};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use vboxcli_core::enums::{DeviceType, MachineState};
use vboxcli_core::{Frontend, HostInfo, LockType, Machine, MachineId};

pub const PROGRAM_ENV: &str = "VBOXCLI_VBOXMANAGE";
const MSI_INSTALL_ENV: &str = "VBOX_MSI_INSTALL_PATH";
const ERROR_PREFIX: &str = "VBoxManage: error:";
const NOT_FOUND_MARKER: &str = "Could not find a registered machine";

static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{1,3})%").unwrap());
static COMPONENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"component (\w+)").unwrap());

#[derive(Clone, Debug)]
pub struct VBoxManage {
    program: PathBuf,
}

impl VBoxManage {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Pick the executable: explicit path, then `VBOXCLI_VBOXMANAGE`, then the
    /// Windows installer location, then `VBoxManage` on `PATH`.
    #[must_use]
    pub fn locate(explicit: Option<PathBuf>) -> Self {
        if let Some(path) = explicit {
            return Self::new(path);
        }
        if let Some(path) = std::env::var_os(PROGRAM_ENV).filter(|p| !p.is_empty()) {
            return Self::new(path);
        }
        if cfg!(windows)
            && let Some(dir) = std::env::var_os(MSI_INSTALL_ENV).filter(|p| !p.is_empty())
        {
            return Self::new(PathBuf::from(dir).join("VBoxManage.exe"));
        }
        Self::new("VBoxManage")
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, args: &[&str]) -> Result<String, VboxError> {
        debug!("Running {} {}", self.program.display(), args.join(" "));
        let output = self.command(args).output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout).replace("\r\n", "\n");

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).replace("\r\n", "\n");
            let message = parse_error(&stderr)
                .map(|e| e.text)
                .unwrap_or_else(|| stderr.trim().to_string());
            return Err(VboxError::Command {
                command: args.first().copied().unwrap_or_default().to_string(),
                message,
            });
        }

        Ok(stdout)
    }

    async fn media(&self) -> MediaRegistry {
        let mut registry = MediaRegistry::default();
        for (list, device_type) in [
            ("hdds", DeviceType::HardDisk),
            ("dvds", DeviceType::Dvd),
            ("floppies", DeviceType::Floppy),
        ] {
            match self.run(&["list", list]).await {
                Ok(output) => registry.extend_from_list(&output, &device_type),
                Err(e) => warn!("Failed to list {list}: {e}"),
            }
        }
        registry
    }

    async fn machine_info(
        &self,
        id: &MachineId,
        media: &MediaRegistry,
    ) -> Result<Machine, VboxError> {
        let output = self
            .run(&["showvminfo", id.as_str(), "--machinereadable"])
            .await
            .map_err(|e| match e {
                VboxError::Command { message, .. } if message.contains(NOT_FOUND_MARKER) => {
                    VboxError::MachineNotFound(id.to_string())
                }
                other => other,
            })?;
        Ok(machine_from_info(&MachineReadable::parse(&output), media))
    }

    async fn control(&self, session: &CliSession, verb: &str) -> Result<(), VboxError> {
        let id = session.target()?;
        self.run(&["controlvm", id.as_str(), verb]).await?;
        Ok(())
    }

    fn spawn_progress(&self, args: &[&str]) -> Result<CliProgress, VboxError> {
        debug!("Spawning {} {}", self.program.display(), args.join(" "));
        let mut child = self.command(args).stdout(Stdio::null()).spawn()?;
        let stderr = child.stderr.take();
        Ok(CliProgress {
            child,
            stderr,
            output: String::new(),
            percent: 0,
            exit: None,
        })
    }
}

/// True while a machine process owns the machine.
fn has_process(state: &MachineState) -> bool {
    !matches!(
        state,
        MachineState::PoweredOff
            | MachineState::Aborted
            | MachineState::Saved
            | MachineState::Teleported
            | MachineState::Null
    )
}

impl Hypervisor for VBoxManage {
    type Session = CliSession;
    type Progress = CliProgress;

    async fn version(&self) -> Result<String, VboxError> {
        let output = self
            .run(&["--version"])
            .await
            .map_err(|e| VboxError::Connect(format!("{}: {e}", self.program.display())))?;
        let version = output.trim().to_string();
        info!("Connected to VirtualBox {version}");
        Ok(version)
    }

    async fn machines(&self) -> Result<Vec<Machine>, VboxError> {
        let listing = self.run(&["list", "vms"]).await?;
        let media = self.media().await;

        let mut machines = Vec::new();
        for (name, id) in parse_vm_list(&listing) {
            if name == INACCESSIBLE_NAME {
                machines.push(Machine::inaccessible(id, name));
                continue;
            }
            match self.machine_info(&id, &media).await {
                Ok(machine) => machines.push(machine),
                Err(e) => {
                    warn!("Failed to read machine {name}: {e}");
                    machines.push(Machine::inaccessible(id, name));
                }
            }
        }
        Ok(machines)
    }

    async fn machine(&self, id: &MachineId) -> Result<Machine, VboxError> {
        let media = self.media().await;
        self.machine_info(id, &media).await
    }

    async fn host_info(&self) -> Result<HostInfo, VboxError> {
        let output = self.run(&["list", "hostinfo"]).await?;
        Ok(parse_host_info(&output))
    }

    async fn extra_data(&self, key: &str) -> Result<Option<String>, VboxError> {
        let output = self.run(&["getextradata", "global", key]).await?;
        Ok(parse_extra_data(&output))
    }

    fn new_session(&self) -> CliSession {
        CliSession::default()
    }

    async fn lock_machine(
        &self,
        session: &mut CliSession,
        id: &MachineId,
        lock: LockType,
    ) -> Result<(), VboxError> {
        if session.locked {
            return Err(VboxError::Lock("session already holds a lock".to_string()));
        }

        let machine = match self.machine(id).await {
            Ok(machine) => machine,
            Err(e) => return Err(VboxError::Lock(e.to_string())),
        };
        if !machine.accessible {
            return Err(VboxError::Lock(format!("{} is inaccessible", machine.name)));
        }
        if lock == LockType::Write && has_process(&machine.state) {
            return Err(VboxError::Lock(format!(
                "{} is already locked by a running session",
                machine.name
            )));
        }

        session.machine = Some(machine.id);
        session.lock = Some(lock);
        session.locked = true;
        Ok(())
    }

    async fn launch(
        &self,
        session: &mut CliSession,
        frontend: Frontend,
    ) -> Result<CliProgress, VboxError> {
        let id = session.target()?;
        if session.lock != Some(LockType::Write) {
            return Err(VboxError::Lock(
                "launching requires a write lock".to_string(),
            ));
        }
        self.spawn_progress(&["startvm", id.as_str(), "--type", frontend.as_str()])
    }

    async fn save_state(&self, session: &mut CliSession) -> Result<CliProgress, VboxError> {
        let id = session.target()?;
        self.spawn_progress(&["controlvm", id.as_str(), "savestate"])
    }

    async fn pause(&self, session: &mut CliSession) -> Result<(), VboxError> {
        self.control(session, "pause").await
    }

    async fn resume(&self, session: &mut CliSession) -> Result<(), VboxError> {
        self.control(session, "resume").await
    }

    async fn acpi_power_button(&self, session: &mut CliSession) -> Result<(), VboxError> {
        self.control(session, "acpipowerbutton").await
    }

    async fn power_down(&self, session: &mut CliSession) -> Result<(), VboxError> {
        self.control(session, "poweroff").await
    }
}

#[derive(Debug, Default)]
pub struct CliSession {
    machine: Option<MachineId>,
    lock: Option<LockType>,
    locked: bool,
}

impl CliSession {
    fn target(&self) -> Result<&MachineId, VboxError> {
        match (&self.machine, self.locked) {
            (Some(id), true) => Ok(id),
            _ => Err(VboxError::NotLocked),
        }
    }
}

impl Session for CliSession {
    fn state(&self) -> SessionState {
        if self.locked {
            SessionState::Locked
        } else {
            SessionState::Unlocked
        }
    }

    async fn unlock(&mut self) -> Result<(), VboxError> {
        if !self.locked {
            return Err(VboxError::NotLocked);
        }
        self.locked = false;
        self.lock = None;
        self.machine = None;
        Ok(())
    }
}

/// A running `VBoxManage` child whose stderr carries `NN%` progress marks.
#[derive(Debug)]
pub struct CliProgress {
    child: Child,
    stderr: Option<ChildStderr>,
    output: String,
    percent: u8,
    exit: Option<ExitStatus>,
}

impl CliProgress {
    fn absorb(&mut self, bytes: &[u8]) {
        self.output
            .push_str(&String::from_utf8_lossy(bytes).replace("\r\n", "\n"));
        if let Some(percent) = last_percent(&self.output) {
            self.percent = percent;
        }
    }

    async fn pump(&mut self, timeout: Duration) -> Result<(), VboxError> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 512];

        while self.exit.is_none() {
            tokio::select! {
                biased;
                read = read_chunk(&mut self.stderr, &mut chunk) => {
                    match read? {
                        0 => self.stderr = None,
                        n => self.absorb(&chunk[..n]),
                    }
                }
                status = self.child.wait() => {
                    self.exit = Some(status?);
                    if let Some(mut stderr) = self.stderr.take() {
                        let mut rest = Vec::new();
                        stderr.read_to_end(&mut rest).await?;
                        self.absorb(&rest);
                    }
                }
                () = tokio::time::sleep_until(deadline) => break,
            }
        }
        Ok(())
    }
}

async fn read_chunk(stderr: &mut Option<ChildStderr>, buf: &mut [u8]) -> std::io::Result<usize> {
    match stderr {
        Some(stderr) => stderr.read(buf).await,
        None => std::future::pending().await,
    }
}

impl Progress for CliProgress {
    async fn status(&mut self) -> Result<ProgressStatus, VboxError> {
        self.pump(Duration::ZERO).await?;

        let Some(exit) = self.exit else {
            return Ok(ProgressStatus {
                completed: false,
                percent: self.percent,
                ..ProgressStatus::default()
            });
        };

        let result_code = exit.code().unwrap_or(-1);
        Ok(ProgressStatus {
            completed: true,
            percent: if exit.success() { 100 } else { self.percent },
            result_code,
            error: (!exit.success()).then(|| parse_error(&self.output)).flatten(),
        })
    }

    fn cancelable(&self) -> bool {
        self.exit.is_none()
    }

    async fn cancel(&mut self) -> Result<(), VboxError> {
        if self.exit.is_none() {
            self.child.start_kill()?;
        }
        Ok(())
    }

    async fn wait_for_completion(&mut self, timeout: Duration) -> Result<(), VboxError> {
        self.pump(timeout).await
    }
}

fn last_percent(text: &str) -> Option<u8> {
    PERCENT_RE
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse::<u8>().ok())
        .filter(|p| *p <= 100)
        .last()
}

/// Error text and component from `VBoxManage: error:` lines.
pub(crate) fn parse_error(stderr: &str) -> Option<ErrorInfo> {
    let mut text = Vec::new();
    let mut component = String::new();

    for line in stderr.lines() {
        let Some(rest) = line.trim().strip_prefix(ERROR_PREFIX) else {
            continue;
        };
        let rest = rest.trim();
        if let Some(details) = rest.strip_prefix("Details:") {
            if let Some(caps) = COMPONENT_RE.captures(details) {
                component = caps[1].to_string();
            }
        } else if !rest.starts_with("Context:") && !rest.is_empty() {
            text.push(rest);
        }
    }

    if text.is_empty() {
        return None;
    }
    Some(ErrorInfo {
        component,
        text: text.join(" "),
    })
}

fn parse_host_info(output: &str) -> HostInfo {
    let hw_virt = output.lines().any(|line| {
        line.split_once(':').is_some_and(|(key, value)| {
            key.contains("HW virtualization") && value.trim().eq_ignore_ascii_case("yes")
        })
    });
    HostInfo { hw_virt }
}

fn parse_extra_data(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("Value:"))
        .map(|value| value.trim().to_string())
}
