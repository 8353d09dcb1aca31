use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid group path: {0}")]
    InvalidGroupPath(String),

    #[error("Machine '{0}' not found")]
    MachineNotFound(String),
}
