use crate::ROOT_GROUP;
use crate::error::CoreError;
use crate::inventory::{Inventory, normalize_group_path};
use crate::machine::{HostInfo, Machine, MachineId};
use crate::order::{ChildKey, order_children};
use std::collections::HashMap;

pub const ROOT_LABEL: &str = "Virtual Machines";

/// Position of a row in the tree. A machine in several groups has one key per group.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Group(String),
    Machine { id: MachineId, parent: String },
}

/// Stable identity of a node, used to restore the cursor across reloads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    Group(String),
    Machine(MachineId),
}

impl NodeKey {
    pub fn identity(&self) -> Selection {
        match self {
            Self::Group(path) => Selection::Group(path.clone()),
            Self::Machine { id, .. } => Selection::Machine(id.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeRow {
    pub key: NodeKey,
    pub depth: usize,
    /// Expansion state; always `false` for machines.
    pub expanded: bool,
}

impl TreeRow {
    pub fn is_group(&self) -> bool {
        matches!(self.key, NodeKey::Group(_))
    }
}

/// Lazy group/machine tree over an inventory snapshot.
///
/// Children of a group are ordered once, the first time the group is shown,
/// and memoised until the next [`MachineTree::rebuild`].
pub struct MachineTree {
    inventory: Inventory,
    children: HashMap<String, Vec<ChildKey>>,
    expanded: HashMap<String, bool>,
    rows: Vec<TreeRow>,
    cursor: usize,
}

impl MachineTree {
    #[must_use]
    pub fn new(inventory: Inventory) -> Self {
        let mut tree = Self {
            inventory,
            children: HashMap::new(),
            expanded: HashMap::new(),
            rows: Vec::new(),
            cursor: 0,
        };
        tree.expanded.insert(ROOT_GROUP.to_string(), true);
        tree.refresh_rows();
        tree
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn host(&self) -> &HostInfo {
        &self.inventory.host
    }

    pub fn rows(&self) -> &[TreeRow] {
        &self.rows
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn selected(&self) -> Option<&TreeRow> {
        self.rows.get(self.cursor)
    }

    pub fn selected_machine(&self) -> Option<&Machine> {
        match &self.selected()?.key {
            NodeKey::Machine { id, .. } => self.inventory.machine(id),
            NodeKey::Group(_) => None,
        }
    }

    pub fn selection_identity(&self) -> Option<Selection> {
        self.selected().map(|row| row.key.identity())
    }

    /// Display text of a row: the last path segment for groups, the name for machines.
    pub fn label<'a>(&'a self, row: &'a TreeRow) -> &'a str {
        match &row.key {
            NodeKey::Group(path) if path == ROOT_GROUP => ROOT_LABEL,
            NodeKey::Group(path) => path.rsplit('/').next().unwrap_or(path),
            NodeKey::Machine { id, .. } => self
                .inventory
                .machine(id)
                .map_or(id.as_str(), |m| m.name.as_str()),
        }
    }

    pub fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        self.select(self.cursor.saturating_add(1));
    }

    pub fn page_up(&mut self, page: usize) {
        self.cursor = self.cursor.saturating_sub(page.max(1));
    }

    pub fn page_down(&mut self, page: usize) {
        self.select(self.cursor.saturating_add(page.max(1)));
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.select(usize::MAX);
    }

    /// Collapse the selected group. No-op on machines and collapsed groups.
    pub fn collapse(&mut self) {
        self.set_selected_expanded(false);
    }

    /// Expand the selected group. No-op on machines and expanded groups.
    pub fn expand(&mut self) {
        self.set_selected_expanded(true);
    }

    pub fn toggle(&mut self) {
        if let Some(row) = self.selected()
            && row.is_group()
        {
            let expanded = row.expanded;
            self.set_selected_expanded(!expanded);
        }
    }

    /// Expand every group, materialising the whole tree.
    pub fn expand_all(&mut self) {
        let paths = self.inventory.groups.clone();
        for path in paths {
            self.expanded.insert(path, true);
        }
        self.refresh_rows();
    }

    /// Swap in a re-read machine without touching the tree structure.
    ///
    /// # Errors
    /// Returns `CoreError::MachineNotFound` if the machine is not in the snapshot.
    pub fn update_machine(&mut self, machine: Machine) -> Result<(), CoreError> {
        self.inventory.replace_machine(machine)
    }

    /// Replace the snapshot and rebuild from scratch.
    ///
    /// Expansion state carries over for groups that still exist; new groups
    /// start from their hint default. The cursor returns to the first row
    /// with the previous selection's identity, expanding its ancestors if it
    /// became hidden, or to the first row if that node is gone.
    pub fn rebuild(&mut self, inventory: Inventory) {
        let previous = self.selection_identity();
        let mut expanded = std::mem::take(&mut self.expanded);
        expanded.retain(|path, _| inventory.groups.contains(path));

        self.inventory = inventory;
        self.children.clear();
        self.expanded = expanded;
        self.expanded.entry(ROOT_GROUP.to_string()).or_insert(true);
        self.refresh_rows();

        let Some(identity) = previous else {
            self.cursor = 0;
            return;
        };
        if self.position_of(&identity).is_none() && self.reveal(&identity) {
            self.refresh_rows();
        }
        self.cursor = self.position_of(&identity).unwrap_or(0);
    }

    fn position_of(&self, identity: &Selection) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| &row.key.identity() == identity)
    }

    /// Expand the groups leading to a node. Returns `false` if it has no place in the tree.
    fn reveal(&mut self, identity: &Selection) -> bool {
        let ancestors = match identity {
            Selection::Group(path) => {
                if !self.inventory.groups.contains(path) {
                    return false;
                }
                group_ancestors(path)
                    .into_iter()
                    .filter(|ancestor| ancestor != path)
                    .collect()
            }
            Selection::Machine(id) => {
                let Some(group) = self
                    .inventory
                    .machine(id)
                    .and_then(|m| m.groups.first())
                    .and_then(|g| normalize_group_path(g).ok())
                else {
                    return false;
                };
                group_ancestors(&group)
            }
        };

        for path in ancestors {
            self.expanded.insert(path, true);
        }
        true
    }

    fn select(&mut self, index: usize) {
        self.cursor = index.min(self.rows.len().saturating_sub(1));
    }

    fn set_selected_expanded(&mut self, expanded: bool) {
        let Some(row) = self.selected() else {
            return;
        };
        let NodeKey::Group(path) = &row.key else {
            return;
        };
        if row.expanded == expanded {
            return;
        }

        let path = path.clone();
        self.expanded.insert(path, expanded);
        self.refresh_rows();
    }

    fn children_of(&mut self, path: &str) -> Vec<ChildKey> {
        if let Some(children) = self.children.get(path) {
            return children.clone();
        }

        let children = order_children(
            path,
            self.inventory.order_hint(path),
            &self.inventory.groups,
            &self.inventory.machines,
        );
        for child in &children {
            if let ChildKey::Group { path, expanded } = child {
                self.expanded.entry(path.clone()).or_insert(*expanded);
            }
        }
        self.children.insert(path.to_string(), children.clone());
        children
    }

    fn refresh_rows(&mut self) {
        let mut rows = Vec::new();
        let root_expanded = self.is_expanded(ROOT_GROUP);
        rows.push(TreeRow {
            key: NodeKey::Group(ROOT_GROUP.to_string()),
            depth: 0,
            expanded: root_expanded,
        });
        if root_expanded {
            self.push_children(ROOT_GROUP, 1, &mut rows);
        }

        self.rows = rows;
        self.select(self.cursor);
    }

    fn push_children(&mut self, path: &str, depth: usize, rows: &mut Vec<TreeRow>) {
        for child in self.children_of(path) {
            match child {
                ChildKey::Group { path: child_path, .. } => {
                    let expanded = self.is_expanded(&child_path);
                    rows.push(TreeRow {
                        key: NodeKey::Group(child_path.clone()),
                        depth,
                        expanded,
                    });
                    if expanded {
                        self.push_children(&child_path, depth + 1, rows);
                    }
                }
                ChildKey::Machine(id) => rows.push(TreeRow {
                    key: NodeKey::Machine {
                        id,
                        parent: path.to_string(),
                    },
                    depth,
                    expanded: false,
                }),
            }
        }
    }

    fn is_expanded(&self, path: &str) -> bool {
        self.expanded.get(path).copied().unwrap_or(true)
    }
}

/// `/a/b` gives `/`, `/a`, `/a/b`.
fn group_ancestors(path: &str) -> Vec<String> {
    let mut ancestors = vec![ROOT_GROUP.to_string()];
    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        ancestors.push(current.clone());
    }
    ancestors
}
