use crate::ROOT_GROUP;
use crate::error::CoreError;
use crate::machine::{HostInfo, Machine, MachineId};
use std::collections::{BTreeSet, HashMap};

/// Immutable snapshot the tree is built from. Rebuilt in full on reload.
#[derive(Clone, Debug, Default)]
pub struct Inventory {
    pub machines: Vec<Machine>,
    pub groups: Vec<String>,
    pub order_hints: HashMap<String, String>,
    pub host: HostInfo,
}

impl Inventory {
    /// Build a snapshot, sorting machines by name and deriving group paths.
    #[must_use]
    pub fn new(mut machines: Vec<Machine>, order_hints: HashMap<String, String>, host: HostInfo) -> Self {
        sort_machines(&mut machines);
        let groups = collect_group_paths(&machines);
        Self {
            machines,
            groups,
            order_hints,
            host,
        }
    }

    pub fn machine(&self, id: &MachineId) -> Option<&Machine> {
        self.machines.iter().find(|m| &m.id == id)
    }

    pub fn order_hint(&self, path: &str) -> Option<&str> {
        self.order_hints.get(path).map(String::as_str)
    }

    /// Replace a machine in place, keeping its position.
    ///
    /// # Errors
    /// Returns `CoreError::MachineNotFound` when no machine has the same id.
    pub fn replace_machine(&mut self, machine: Machine) -> Result<(), CoreError> {
        let slot = self
            .machines
            .iter_mut()
            .find(|m| m.id == machine.id)
            .ok_or_else(|| CoreError::MachineNotFound(machine.id.to_string()))?;
        *slot = machine;
        Ok(())
    }
}

pub fn sort_machines(machines: &mut [Machine]) {
    machines.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}

/// Distinct group paths of all machines, lexically sorted.
///
/// Always contains the root and every ancestor of a used group, so nested
/// groups stay reachable from `/`.
#[must_use]
pub fn collect_group_paths(machines: &[Machine]) -> Vec<String> {
    let mut paths = BTreeSet::new();
    paths.insert(ROOT_GROUP.to_string());

    for group in machines.iter().flat_map(|m| m.groups.iter()) {
        let Ok(path) = normalize_group_path(group) else {
            continue;
        };
        let mut current = path.as_str();
        while let Some(idx) = current.rfind('/')
            && idx > 0
        {
            paths.insert(current.to_string());
            current = &current[..idx];
        }
        paths.insert(current.to_string());
    }

    paths.into_iter().collect()
}

/// Trim a trailing slash and reject paths that are not absolute.
///
/// # Errors
/// Returns `CoreError::InvalidGroupPath` for relative or empty-segment paths.
pub fn normalize_group_path(path: &str) -> Result<String, CoreError> {
    let trimmed = path.trim();
    if !trimmed.starts_with('/') {
        return Err(CoreError::InvalidGroupPath(path.to_string()));
    }
    if trimmed == ROOT_GROUP {
        return Ok(ROOT_GROUP.to_string());
    }

    let body = trimmed.trim_end_matches('/');
    if body.is_empty() || body[1..].split('/').any(str::is_empty) {
        return Err(CoreError::InvalidGroupPath(path.to_string()));
    }
    Ok(body.to_string())
}
