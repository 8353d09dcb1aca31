use anyhow::{Context, Result, bail};
use vboxcli_core::{Machine, MachineTree, NodeKey, details};
use vboxcli_ui::App;
use vboxcli_vbox::{Facade, Hypervisor};

pub async fn tui<H: Hypervisor>(facade: Facade<H>) -> Result<()> {
    let mut app = App::new(facade)
        .await
        .context("Failed to load virtual machines")?;
    app.run().await?;
    Ok(())
}

pub async fn list<H: Hypervisor>(facade: &mut Facade<H>) -> Result<()> {
    let inventory = facade
        .inventory()
        .await
        .context("Failed to load virtual machines")?;
    let mut tree = MachineTree::new(inventory);
    tree.expand_all();

    for line in tree_lines(&tree) {
        println!("{line}");
    }
    Ok(())
}

pub async fn show<H: Hypervisor>(facade: &mut Facade<H>, query: &str) -> Result<()> {
    let host = facade.host_info().await.unwrap_or_default();
    let machines = facade
        .machines()
        .await
        .context("Failed to load virtual machines")?;
    let machine = find_machine(machines, query)?;

    for line in details::to_lines(&details::render(Some(machine), &host)) {
        println!("{line}");
    }
    Ok(())
}

/// Indented tree, one row per line, with state icons on machines.
fn tree_lines(tree: &MachineTree) -> Vec<String> {
    tree.rows()
        .iter()
        .map(|row| {
            let marker = match &row.key {
                NodeKey::Group(_) => "+",
                NodeKey::Machine { id, .. } => tree
                    .inventory()
                    .machine(id)
                    .map_or("?", |m| m.state.icon().0),
            };
            format!("{}{marker} {}", "  ".repeat(row.depth), tree.label(row))
        })
        .collect()
}

/// Match by UUID first, then by exact name.
fn find_machine<'a>(machines: &'a [Machine], query: &str) -> Result<&'a Machine> {
    if let Some(machine) = machines.iter().find(|m| m.id.matches(query)) {
        return Ok(machine);
    }

    let named: Vec<&Machine> = machines.iter().filter(|m| m.name == query).collect();
    match named.as_slice() {
        [] => bail!("No machine named or identified by '{query}'"),
        [machine] => Ok(machine),
        several => bail!(
            "'{query}' is ambiguous, use one of: {}",
            several
                .iter()
                .map(|m| m.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vboxcli_core::Inventory;
    use vboxcli_core::enums::MachineState;
    use vboxcli_vbox::testing::machine;

    fn machines() -> Vec<Machine> {
        vec![
            machine("id-1", "web", MachineState::Running, &["/prod"]),
            machine("id-2", "db", MachineState::PoweredOff, &["/prod", "/"]),
            machine("id-3", "db", MachineState::Saved, &["/"]),
        ]
    }

    #[test]
    fn test_find_machine() {
        let machines = machines();
        assert_eq!(find_machine(&machines, "web").unwrap().id.as_str(), "id-1");
        assert_eq!(find_machine(&machines, "ID-3").unwrap().name, "db");

        let err = find_machine(&machines, "db").unwrap_err().to_string();
        assert!(err.contains("id-2, id-3"));
        assert!(find_machine(&machines, "nope").is_err());
    }

    #[test]
    fn test_tree_lines() {
        let mut tree = MachineTree::new(Inventory::new(
            machines(),
            Default::default(),
            Default::default(),
        ));
        tree.expand_all();

        let lines = tree_lines(&tree);
        assert_eq!(lines[0], "+ Virtual Machines");
        assert_eq!(lines[1], "  + prod");
        assert_eq!(lines[2], "    \u{25a0} db");
        assert_eq!(lines[3], "    \u{25b6} web");
        assert_eq!(lines.len(), 6);
    }
}
