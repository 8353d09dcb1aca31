use thiserror::Error;

#[derive(Error, Debug)]
pub enum VboxError {
    #[error("Failed to connect to VirtualBox: {0}")]
    Connect(String),

    #[error("VBoxManage {command} failed: {message}")]
    Command { command: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Machine not found: {0}")]
    MachineNotFound(String),

    #[error("Failed to lock machine: {0}")]
    Lock(String),

    #[error("Session is not locked")]
    NotLocked,

    #[error("Unexpected VBoxManage output: {0}")]
    Parse(String),

    #[error(transparent)]
    Core(#[from] vboxcli_core::CoreError),
}
