//! Cached access to the hypervisor: one instance per process, owned by the app.

use crate::error::VboxError;
use crate::hypervisor::Hypervisor;
use std::collections::HashMap;
use tracing::{debug, warn};
use vboxcli_core::inventory::{collect_group_paths, sort_machines};
use vboxcli_core::order::order_hint_key;
use vboxcli_core::{HostInfo, Inventory, Machine, MachineId};

pub struct Facade<H: Hypervisor> {
    hypervisor: H,
    version: String,
    machines: Option<Vec<Machine>>,
    groups: Option<Vec<String>>,
    host: Option<HostInfo>,
}

impl<H: Hypervisor> Facade<H> {
    /// Probe the backend and wrap it.
    ///
    /// # Errors
    /// Returns `VboxError::Connect` if the backend does not answer.
    pub async fn connect(hypervisor: H) -> Result<Self, VboxError> {
        let version = hypervisor.version().await.map_err(|e| match e {
            VboxError::Connect(_) => e,
            other => VboxError::Connect(other.to_string()),
        })?;

        Ok(Self {
            hypervisor,
            version,
            machines: None,
            groups: None,
            host: None,
        })
    }

    pub fn hypervisor(&self) -> &H {
        &self.hypervisor
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Machines sorted by name.
    ///
    /// # Errors
    /// Returns `VboxError` if the machine list cannot be read.
    pub async fn machines(&mut self) -> Result<&[Machine], VboxError> {
        let machines = match self.machines.take() {
            Some(machines) => machines,
            None => {
                let mut machines = self.hypervisor.machines().await?;
                sort_machines(&mut machines);
                debug!("Loaded {} machines", machines.len());
                machines
            }
        };
        Ok(self.machines.insert(machines))
    }

    /// Every group path in use, with `/` and all ancestors.
    ///
    /// # Errors
    /// Returns `VboxError` if the machine list cannot be read.
    pub async fn group_paths(&mut self) -> Result<&[String], VboxError> {
        let groups = match self.groups.take() {
            Some(groups) => groups,
            None => collect_group_paths(self.machines().await?),
        };
        Ok(self.groups.insert(groups))
    }

    /// # Errors
    /// Returns `VboxError` if host facts cannot be read.
    pub async fn host_info(&mut self) -> Result<HostInfo, VboxError> {
        if let Some(host) = self.host {
            return Ok(host);
        }
        let host = self.hypervisor.host_info().await?;
        self.host = Some(host);
        Ok(host)
    }

    pub fn invalidate(&mut self) {
        self.machines = None;
        self.groups = None;
        self.host = None;
    }

    pub fn start_session(&self) -> H::Session {
        self.hypervisor.new_session()
    }

    /// # Errors
    /// Returns `VboxError` if extra data cannot be queried.
    pub async fn order_hint(&self, path: &str) -> Result<Option<String>, VboxError> {
        self.hypervisor.extra_data(&order_hint_key(path)).await
    }

    /// Snapshot for a tree build. Missing hints and host facts degrade to
    /// defaults; only the machine list is required.
    ///
    /// # Errors
    /// Returns `VboxError` if the machine list cannot be read.
    pub async fn inventory(&mut self) -> Result<Inventory, VboxError> {
        let machines = self.machines().await?.to_vec();
        let groups = self.group_paths().await?.to_vec();

        let mut hints = HashMap::new();
        for path in groups {
            match self.order_hint(&path).await {
                Ok(Some(hint)) => {
                    hints.insert(path, hint);
                }
                Ok(None) => {}
                Err(e) => warn!("Failed to read order hint for {path}: {e}"),
            }
        }

        let host = self.host_info().await.unwrap_or_else(|e| {
            warn!("Failed to read host info: {e}");
            HostInfo::default()
        });

        Ok(Inventory::new(machines, hints, host))
    }

    /// Re-read one machine and update the cached list.
    ///
    /// # Errors
    /// Returns `VboxError` if the machine cannot be read.
    pub async fn refresh_machine(&mut self, id: &MachineId) -> Result<Machine, VboxError> {
        let machine = self.hypervisor.machine(id).await?;
        if let Some(cached) = self
            .machines
            .as_mut()
            .and_then(|machines| machines.iter_mut().find(|m| &m.id == id))
        {
            if cached.groups != machine.groups {
                self.groups = None;
            }
            *cached = machine.clone();
        }
        Ok(machine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeHypervisor, machine};
    use vboxcli_core::enums::MachineState;

    fn fake() -> FakeHypervisor {
        FakeHypervisor::new(vec![
            machine("b", "zeta", MachineState::Running, &["/lab/net"]),
            machine("a", "alpha", MachineState::PoweredOff, &["/"]),
        ])
        .with_hint("/", "gc=lab,m=a")
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let fake = fake();
        fake.state().unreachable = true;
        assert!(matches!(
            Facade::connect(fake).await,
            Err(VboxError::Connect(_))
        ));
    }

    #[tokio::test]
    async fn test_machines_sorted_and_cached() {
        let fake = fake();
        let mut facade = Facade::connect(fake.clone()).await.unwrap();
        assert_eq!(facade.version(), "7.0.0_fake");

        let names: Vec<_> = facade
            .machines()
            .await
            .unwrap()
            .iter()
            .map(|m| m.name.clone())
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        facade.machines().await.unwrap();
        assert_eq!(fake.state().machine_lists, 1);

        facade.invalidate();
        facade.machines().await.unwrap();
        assert_eq!(fake.state().machine_lists, 2);
    }

    #[tokio::test]
    async fn test_group_paths_include_ancestors() {
        let mut facade = Facade::connect(fake()).await.unwrap();
        let groups = facade.group_paths().await.unwrap();
        assert_eq!(groups, ["/", "/lab", "/lab/net"]);
    }

    #[tokio::test]
    async fn test_inventory_collects_hints() {
        let mut facade = Facade::connect(fake()).await.unwrap();
        assert_eq!(
            facade.order_hint("/").await.unwrap().as_deref(),
            Some("gc=lab,m=a")
        );
        assert_eq!(facade.order_hint("/lab").await.unwrap(), None);

        let inventory = facade.inventory().await.unwrap();
        assert_eq!(inventory.order_hint("/"), Some("gc=lab,m=a"));
        assert_eq!(inventory.order_hint("/lab"), None);
        assert_eq!(inventory.machines.len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_machine_updates_cache() {
        let fake = fake();
        let mut facade = Facade::connect(fake.clone()).await.unwrap();
        facade.machines().await.unwrap();

        fake.state().machines[1].state = MachineState::Running;
        let refreshed = facade.refresh_machine(&MachineId::new("a")).await.unwrap();
        assert_eq!(refreshed.state, MachineState::Running);
        assert_eq!(facade.machines().await.unwrap()[0].state, MachineState::Running);
        assert_eq!(fake.state().machine_lists, 1);

        assert!(matches!(
            facade.refresh_machine(&MachineId::new("zz")).await,
            Err(VboxError::MachineNotFound(_))
        ));
    }
}
