//! Child ordering from the `GUI/GroupDefinitions` extra-data hint.
//!
//! A hint is a comma-separated list of tokens: `go=<name>` (group, shown
//! expanded), `gc=<name>` (group, shown collapsed) and `m=<uuid>` (machine).

use crate::ROOT_GROUP;
use crate::machine::{Machine, MachineId};

pub const GROUP_DEFINITIONS_PREFIX: &str = "GUI/GroupDefinitions";

/// Extra-data key holding the order hint of a group.
#[must_use]
pub fn order_hint_key(path: &str) -> String {
    format!("{GROUP_DEFINITIONS_PREFIX}{path}")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HintToken<'a> {
    Group { name: &'a str, expanded: bool },
    Machine(&'a str),
}

/// Tokens in hint order; malformed tokens are dropped.
pub fn parse_hint(hint: &str) -> impl Iterator<Item = HintToken<'_>> {
    hint.split(',').filter_map(|raw| {
        let token = raw.trim();
        let (kind, value) = token.split_once('=')?;
        if value.is_empty() {
            return None;
        }
        match kind {
            "go" => Some(HintToken::Group {
                name: value,
                expanded: true,
            }),
            "gc" => Some(HintToken::Group {
                name: value,
                expanded: false,
            }),
            "m" => Some(HintToken::Machine(value)),
            _ => None,
        }
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChildKey {
    Group { path: String, expanded: bool },
    Machine(MachineId),
}

#[must_use]
pub fn child_group_path(parent: &str, name: &str) -> String {
    if parent == ROOT_GROUP {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Groups exactly one level below `parent`, in the order given.
#[must_use]
pub fn immediate_child_groups<'a>(parent: &str, groups: &'a [String]) -> Vec<&'a str> {
    let prefix = if parent == ROOT_GROUP {
        ROOT_GROUP.to_string()
    } else {
        format!("{parent}/")
    };

    groups
        .iter()
        .map(String::as_str)
        .filter(|group| *group != parent)
        .filter(|group| {
            group
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
        })
        .collect()
}

/// Ordered children of `parent`.
///
/// Hinted groups and machines come first, in hint order. Everything the hint
/// does not mention follows: groups in the order of `groups`, then machines
/// in the order of `machines`. Stale and repeated tokens are skipped, so each
/// child appears exactly once.
#[must_use]
pub fn order_children(
    parent: &str,
    hint: Option<&str>,
    groups: &[String],
    machines: &[Machine],
) -> Vec<ChildKey> {
    let mut remaining_groups = immediate_child_groups(parent, groups);
    let mut remaining_machines: Vec<&Machine> =
        machines.iter().filter(|m| m.in_group(parent)).collect();
    let mut children = Vec::with_capacity(remaining_groups.len() + remaining_machines.len());

    for token in hint.into_iter().flat_map(parse_hint) {
        match token {
            HintToken::Group { name, expanded } => {
                let path = child_group_path(parent, name);
                if let Some(pos) = remaining_groups.iter().position(|g| *g == path) {
                    remaining_groups.remove(pos);
                    children.push(ChildKey::Group { path, expanded });
                }
            }
            HintToken::Machine(id) => {
                if let Some(pos) = remaining_machines.iter().position(|m| m.id.matches(id)) {
                    let machine = remaining_machines.remove(pos);
                    children.push(ChildKey::Machine(machine.id.clone()));
                }
            }
        }
    }

    children.extend(remaining_groups.into_iter().map(|path| ChildKey::Group {
        path: path.to_string(),
        expanded: true,
    }));
    children.extend(
        remaining_machines
            .into_iter()
            .map(|m| ChildKey::Machine(m.id.clone())),
    );
    children
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(id: &str, name: &str, groups: &[&str]) -> Machine {
        Machine {
            id: MachineId::new(id),
            name: name.to_string(),
            accessible: true,
            groups: groups.iter().map(|g| (*g).to_string()).collect(),
            ..Machine::default()
        }
    }

    fn groups(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| (*p).to_string()).collect()
    }

    fn group(path: &str, expanded: bool) -> ChildKey {
        ChildKey::Group {
            path: path.to_string(),
            expanded,
        }
    }

    fn vm(id: &str) -> ChildKey {
        ChildKey::Machine(MachineId::new(id))
    }

    #[test]
    fn test_order_hint_key() {
        assert_eq!(order_hint_key("/"), "GUI/GroupDefinitions/");
        assert_eq!(order_hint_key("/lab"), "GUI/GroupDefinitions/lab");
    }

    #[test]
    fn test_parse_hint_skips_malformed() {
        let tokens: Vec<_> = parse_hint("go=a, gc=b,m=,x=1,junk,m=ID").collect();
        assert_eq!(
            tokens,
            vec![
                HintToken::Group {
                    name: "a",
                    expanded: true
                },
                HintToken::Group {
                    name: "b",
                    expanded: false
                },
                HintToken::Machine("ID"),
            ]
        );
    }

    #[test]
    fn test_immediate_child_groups_only() {
        let all = groups(&["/", "/lab", "/lab/web", "/lab/web/front", "/laboratory", "/x"]);
        assert_eq!(immediate_child_groups("/", &all), vec!["/lab", "/laboratory", "/x"]);
        assert_eq!(immediate_child_groups("/lab", &all), vec!["/lab/web"]);
        assert!(immediate_child_groups("/x", &all).is_empty());
    }

    #[test]
    fn test_children_without_hint_use_default_order() {
        let all = groups(&["/", "/b", "/a"]);
        let machines = vec![machine("1", "one", &["/"]), machine("2", "two", &["/a"])];
        assert_eq!(
            order_children("/", None, &all, &machines),
            vec![group("/b", true), group("/a", true), vm("1")]
        );
    }

    #[test]
    fn test_children_follow_hint() {
        let all = groups(&["/", "/a", "/b"]);
        let machines = vec![
            machine("m1", "one", &["/"]),
            machine("m2", "two", &["/"]),
            machine("m3", "three", &["/"]),
        ];
        let hint = "m=m2,gc=b,m=M1";
        assert_eq!(
            order_children("/", Some(hint), &all, &machines),
            vec![
                vm("m2"),
                group("/b", false),
                vm("m1"),
                group("/a", true),
                vm("m3"),
            ]
        );
    }

    #[test]
    fn test_nested_hint_tokens_resolve_under_parent() {
        let all = groups(&["/", "/lab", "/lab/db", "/lab/web"]);
        let machines = vec![machine("m1", "one", &["/lab"])];
        assert_eq!(
            order_children("/lab", Some("gc=web,m=m1,go=db"), &all, &machines),
            vec![group("/lab/web", false), vm("m1"), group("/lab/db", true)]
        );
    }

    #[test]
    fn test_stale_and_duplicate_tokens_ignored() {
        let all = groups(&["/", "/a"]);
        let machines = vec![machine("m1", "one", &["/"]), machine("m2", "two", &["/"])];
        let with_stale = order_children("/", Some("m=gone,m=m2,go=zz,m=m2,go=a,go=a"), &all, &machines);
        let without = order_children("/", Some("m=m2,go=a"), &all, &machines);
        assert_eq!(with_stale, without);
        assert_eq!(with_stale, vec![vm("m2"), group("/a", true), vm("m1")]);
    }

    #[test]
    fn test_every_child_appears_once_and_deterministically() {
        let all = groups(&["/", "/a", "/b", "/c"]);
        let machines = vec![
            machine("m1", "one", &["/", "/a"]),
            machine("m2", "two", &["/"]),
            machine("m3", "three", &["/b"]),
        ];
        let hint = Some("go=c,m=m1,m=m1,gc=a");
        let first = order_children("/", hint, &all, &machines);
        let second = order_children("/", hint, &all, &machines);
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
        for key in [group("/a", false), group("/b", true), group("/c", true), vm("m1"), vm("m2")] {
            assert_eq!(first.iter().filter(|k| **k == key).count(), 1);
        }
    }
}
