pub mod action;
pub mod details;
pub mod enums;
pub mod error;
pub mod format;
pub mod inventory;
pub mod machine;
pub mod order;
pub mod tree;

pub const ROOT_GROUP: &str = "/";

pub use action::{Action, Frontend, LockType, menu_for, menu_title, pause_toggle};
pub use details::{Block, FieldGroup, Section, Tone};
pub use enums::{MachineState, StateTone};
pub use error::CoreError;
pub use inventory::Inventory;
pub use machine::{HostInfo, Machine, MachineId};
pub use tree::{MachineTree, NodeKey, Selection, TreeRow};
