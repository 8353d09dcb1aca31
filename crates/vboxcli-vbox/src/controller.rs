//! Runs one machine action: lock, invoke, follow progress, release.

use crate::error::VboxError;
use crate::hypervisor::{Hypervisor, Progress, ProgressStatus, Session, SessionState};
use std::time::Duration;
use tracing::{info, warn};
use vboxcli_core::{Action, MachineId};

pub const ABORTED_MESSAGE: &str = "Operation aborted";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    Succeeded,
    Failed(String),
    Aborted,
}

impl ActionOutcome {
    /// Text for the user; `None` on success.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Succeeded => None,
            Self::Failed(message) => Some(message),
            Self::Aborted => Some(ABORTED_MESSAGE),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskPoll {
    Running { percent: u8 },
    Finished(ActionOutcome),
}

enum Stage<P> {
    Submitted(P),
    Completed(ActionOutcome),
}

pub struct ActionTask<H: Hypervisor> {
    action: Action,
    machine: MachineId,
    session: H::Session,
    stage: Stage<H::Progress>,
    percent: u8,
}

impl<H: Hypervisor> ActionTask<H> {
    /// Lock the machine and invoke the verb. Verbs without a progress handle
    /// complete here; the session is released as soon as the task completes.
    pub async fn start(
        hypervisor: &H,
        session: H::Session,
        machine: &MachineId,
        action: Action,
    ) -> Self {
        info!("{} {machine}", action.progress_caption());
        let mut task = Self {
            action,
            machine: machine.clone(),
            session,
            stage: Stage::Completed(ActionOutcome::Succeeded),
            percent: 0,
        };

        match Self::submit(hypervisor, &mut task.session, machine, action).await {
            Ok(Some(progress)) => task.stage = Stage::Submitted(progress),
            Ok(None) => task.finish(ActionOutcome::Succeeded).await,
            Err(e) => task.finish(ActionOutcome::Failed(e.to_string())).await,
        }
        task
    }

    async fn submit(
        hypervisor: &H,
        session: &mut H::Session,
        machine: &MachineId,
        action: Action,
    ) -> Result<Option<H::Progress>, VboxError> {
        hypervisor
            .lock_machine(session, machine, action.lock_type())
            .await?;

        if let Some(frontend) = action.frontend() {
            return Ok(Some(hypervisor.launch(session, frontend).await?));
        }
        match action {
            Action::SaveState => return Ok(Some(hypervisor.save_state(session).await?)),
            Action::AcpiShutdown => hypervisor.acpi_power_button(session).await?,
            Action::PowerOff => hypervisor.power_down(session).await?,
            Action::Pause => hypervisor.pause(session).await?,
            Action::Resume => hypervisor.resume(session).await?,
            Action::StartGui | Action::StartSdl | Action::StartHeadless => {}
        }
        Ok(None)
    }

    /// Advance a submitted task by at most `wait`.
    pub async fn poll(&mut self, hypervisor: &H, wait: Duration) -> TaskPoll {
        let progress = match &mut self.stage {
            Stage::Submitted(progress) => progress,
            Stage::Completed(outcome) => return TaskPoll::Finished(outcome.clone()),
        };

        hypervisor.process_events().await;
        let status = match advance(progress, wait).await {
            Ok(status) => status,
            Err(e) => {
                let outcome = ActionOutcome::Failed(e.to_string());
                self.finish(outcome.clone()).await;
                return TaskPoll::Finished(outcome);
            }
        };

        self.percent = status.percent;
        if !status.completed {
            return TaskPoll::Running {
                percent: status.percent,
            };
        }

        let outcome = if status.result_code == 0 {
            ActionOutcome::Succeeded
        } else {
            ActionOutcome::Failed(self.describe_failure(status))
        };
        self.finish(outcome.clone()).await;
        TaskPoll::Finished(outcome)
    }

    /// Cancel a submitted task. A finished task keeps its outcome.
    pub async fn abort(&mut self) -> ActionOutcome {
        if let Stage::Completed(outcome) = &self.stage {
            return outcome.clone();
        }
        if let Stage::Submitted(progress) = &mut self.stage
            && progress.cancelable()
            && let Err(e) = progress.cancel().await
        {
            warn!("Failed to cancel {}: {e}", self.action.label());
        }
        info!("{} {} aborted", self.action.label(), self.machine);
        self.finish(ActionOutcome::Aborted).await;
        ActionOutcome::Aborted
    }

    async fn finish(&mut self, outcome: ActionOutcome) {
        if let ActionOutcome::Failed(message) = &outcome {
            warn!("{} {} failed: {message}", self.action.label(), self.machine);
        }
        self.stage = Stage::Completed(outcome);
        if self.session.state() == SessionState::Locked
            && let Err(e) = self.session.unlock().await
        {
            warn!("Failed to unlock session of {}: {e}", self.machine);
        }
    }

    fn describe_failure(&self, status: ProgressStatus) -> String {
        match status.error {
            Some(error) if !error.component.is_empty() => {
                format!("{}: {}", error.component, error.text)
            }
            Some(error) if !error.text.is_empty() => error.text,
            _ => format!(
                "{} failed with result code {}",
                self.action.label(),
                status.result_code
            ),
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn machine(&self) -> &MachineId {
        &self.machine
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn outcome(&self) -> Option<&ActionOutcome> {
        match &self.stage {
            Stage::Completed(outcome) => Some(outcome),
            Stage::Submitted(_) => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.stage, Stage::Completed(_))
    }
}

async fn advance<P: Progress>(progress: &mut P, wait: Duration) -> Result<ProgressStatus, VboxError> {
    progress.wait_for_completion(wait).await?;
    progress.status().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypervisor::ErrorInfo;
    use crate::testing::{FakeHypervisor, ProgressScript, machine};
    use vboxcli_core::enums::MachineState;

    const TICK: Duration = Duration::from_millis(100);

    fn fake(state: MachineState) -> FakeHypervisor {
        FakeHypervisor::new(vec![machine("vm-1", "web", state, &["/"])])
    }

    fn id() -> MachineId {
        MachineId::new("vm-1")
    }

    async fn run_to_end(fake: &FakeHypervisor, task: &mut ActionTask<FakeHypervisor>) -> ActionOutcome {
        loop {
            if let TaskPoll::Finished(outcome) = task.poll(fake, TICK).await {
                return outcome;
            }
        }
    }

    #[tokio::test]
    async fn test_launch_succeeds_and_unlocks() {
        let fake = fake(MachineState::PoweredOff);
        fake.state().progress = ProgressScript {
            polls_until_done: 3,
            ..ProgressScript::default()
        };

        let mut task = ActionTask::start(&fake, fake.new_session(), &id(), Action::StartHeadless).await;
        assert!(!task.is_finished());
        assert_eq!(fake.sessions_locked(), 1);

        assert_eq!(task.poll(&fake, TICK).await, TaskPoll::Running { percent: 33 });
        assert_eq!(run_to_end(&fake, &mut task).await, ActionOutcome::Succeeded);
        assert_eq!(task.percent(), 100);
        assert_eq!(fake.sessions_locked(), 0);
        assert!(fake.state().events >= 3);
        assert_eq!(fake.calls(), vec!["lock vm-1 Write", "launch-headless vm-1"]);
        assert_eq!(fake.machine_state(&id()), Some(MachineState::Running));
    }

    #[tokio::test]
    async fn test_lock_failure_skips_verb() {
        let fake = fake(MachineState::Running);
        fake.state().lock_error = Some("already locked".to_string());

        let task = ActionTask::start(&fake, fake.new_session(), &id(), Action::PowerOff).await;
        assert_eq!(
            task.outcome(),
            Some(&ActionOutcome::Failed("Failed to lock machine: already locked".to_string()))
        );
        assert_eq!(fake.calls(), vec!["lock vm-1 Shared"]);
        assert_eq!(fake.sessions_locked(), 0);
    }

    #[tokio::test]
    async fn test_verb_error_unlocks() {
        let fake = fake(MachineState::Running);
        fake.state().verb_error = Some("not now".to_string());

        let task = ActionTask::start(&fake, fake.new_session(), &id(), Action::SaveState).await;
        assert!(matches!(task.outcome(), Some(ActionOutcome::Failed(m)) if m.contains("not now")));
        assert_eq!(fake.sessions_locked(), 0);
    }

    #[tokio::test]
    async fn test_progress_error_unlocks() {
        let fake = fake(MachineState::Running);
        let mut task = ActionTask::start(&fake, fake.new_session(), &id(), Action::SaveState).await;
        fake.state().poll_error = Some("handle gone".to_string());

        let outcome = run_to_end(&fake, &mut task).await;
        assert!(matches!(outcome, ActionOutcome::Failed(m) if m.contains("handle gone")));
        assert_eq!(fake.sessions_locked(), 0);
    }

    #[tokio::test]
    async fn test_nonzero_result_reports_error_info() {
        let fake = fake(MachineState::PoweredOff);
        fake.state().progress = ProgressScript {
            result_code: 1,
            error: Some(ErrorInfo {
                component: "Console".to_string(),
                text: "VT-x is not available".to_string(),
            }),
            ..ProgressScript::default()
        };

        let mut task = ActionTask::start(&fake, fake.new_session(), &id(), Action::StartGui).await;
        assert_eq!(
            run_to_end(&fake, &mut task).await,
            ActionOutcome::Failed("Console: VT-x is not available".to_string())
        );
        assert_eq!(fake.sessions_locked(), 0);
    }

    #[tokio::test]
    async fn test_nonzero_result_without_error_info() {
        let fake = fake(MachineState::Running);
        fake.state().progress = ProgressScript {
            result_code: -1,
            ..ProgressScript::default()
        };

        let mut task = ActionTask::start(&fake, fake.new_session(), &id(), Action::SaveState).await;
        assert_eq!(
            run_to_end(&fake, &mut task).await,
            ActionOutcome::Failed("Save State failed with result code -1".to_string())
        );
    }

    #[tokio::test]
    async fn test_abort_cancels_and_unlocks() {
        let fake = fake(MachineState::Running);
        fake.state().progress = ProgressScript {
            polls_until_done: 50,
            ..ProgressScript::default()
        };

        let mut task = ActionTask::start(&fake, fake.new_session(), &id(), Action::SaveState).await;
        task.poll(&fake, TICK).await;
        assert_eq!(task.abort().await, ActionOutcome::Aborted);
        assert!(fake.state().canceled);
        assert_eq!(fake.sessions_locked(), 0);
        assert_eq!(task.outcome().and_then(ActionOutcome::message), Some(ABORTED_MESSAGE));
    }

    #[tokio::test]
    async fn test_abort_without_cancel_support() {
        let fake = fake(MachineState::PoweredOff);
        fake.state().progress = ProgressScript {
            polls_until_done: 50,
            cancelable: false,
            ..ProgressScript::default()
        };

        let mut task = ActionTask::start(&fake, fake.new_session(), &id(), Action::StartSdl).await;
        assert_eq!(task.abort().await, ActionOutcome::Aborted);
        assert!(!fake.state().canceled);
        assert_eq!(fake.sessions_locked(), 0);
    }

    #[tokio::test]
    async fn test_immediate_verbs() {
        let fake = fake(MachineState::Running);
        let task = ActionTask::start(&fake, fake.new_session(), &id(), Action::Pause).await;
        assert_eq!(task.outcome(), Some(&ActionOutcome::Succeeded));
        assert_eq!(fake.machine_state(&id()), Some(MachineState::Paused));

        let task = ActionTask::start(&fake, fake.new_session(), &id(), Action::Resume).await;
        assert!(task.is_finished());
        assert_eq!(fake.machine_state(&id()), Some(MachineState::Running));

        let task = ActionTask::start(&fake, fake.new_session(), &id(), Action::AcpiShutdown).await;
        assert_eq!(task.outcome(), Some(&ActionOutcome::Succeeded));
        assert_eq!(fake.sessions_created(), 3);
        assert_eq!(fake.sessions_locked(), 0);
    }
}
