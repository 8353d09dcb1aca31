pub mod controller;
mod error;
pub mod facade;
pub mod hypervisor;
pub mod machinereadable;
pub mod media;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod vboxmanage;
pub mod vminfo;

pub use controller::{ABORTED_MESSAGE, ActionOutcome, ActionTask, TaskPoll};
pub use error::*;
pub use facade::Facade;
pub use hypervisor::{ErrorInfo, Hypervisor, Progress, ProgressStatus, Session, SessionState};
pub use vboxmanage::VBoxManage;
