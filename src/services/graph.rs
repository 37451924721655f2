// src/services/graph.rs

//! The assembled service graph
//!
//! Nodes are unit names: the VPN tunnel, the four role services and the lab
//! target. An edge `a -> b` means `a` must be started before `b`. The graph
//! is checked once at construction; a `ServiceGraph` that exists is always
//! complete and acyclic.

use super::descriptor::{ServiceDescriptor, ServiceRole};
use super::resources::{SystemAccount, TmpfilesEntry};
use crate::error::{Error, Result};
use crate::isd_as::IsdAs;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

/// Aggregate unit grouping the lab services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateTarget {
    pub name: String,
    pub description: String,
    /// Units that must be active for the target to be reached
    pub requires: BTreeSet<String>,
    pub after: BTreeSet<String>,
    /// Units pulled in without a hard requirement
    pub wants: BTreeSet<String>,
    pub wanted_by: Option<String>,
}

/// VPN tunnel, role services, lab target and their host requirements
#[derive(Debug, Clone)]
pub struct ServiceGraph {
    isd_as: IsdAs,
    hook_runner: PathBuf,
    vpn: ServiceDescriptor,
    roles: Vec<ServiceDescriptor>,
    target: AggregateTarget,
    tmpfiles: Vec<TmpfilesEntry>,
    accounts: Vec<SystemAccount>,
}

impl ServiceGraph {
    /// Assemble and validate a graph; nothing is returned unless it is consistent
    pub(crate) fn assemble(
        isd_as: IsdAs,
        hook_runner: PathBuf,
        vpn: ServiceDescriptor,
        roles: Vec<ServiceDescriptor>,
        target: AggregateTarget,
        tmpfiles: Vec<TmpfilesEntry>,
        accounts: Vec<SystemAccount>,
    ) -> Result<Self> {
        let graph = Self {
            isd_as,
            hook_runner,
            vpn,
            roles,
            target,
            tmpfiles,
            accounts,
        };
        graph.validate()?;
        Ok(graph)
    }

    pub fn isd_as(&self) -> &IsdAs {
        &self.isd_as
    }

    /// Executable the supervisor calls for pre-start hooks
    pub fn hook_runner(&self) -> &Path {
        &self.hook_runner
    }

    /// The VPN tunnel service
    pub fn vpn(&self) -> &ServiceDescriptor {
        &self.vpn
    }

    /// Role services, dispatcher first
    pub fn roles(&self) -> &[ServiceDescriptor] {
        &self.roles
    }

    /// Descriptor for one role
    pub fn role(&self, role: ServiceRole) -> Option<&ServiceDescriptor> {
        self.roles.iter().find(|d| d.role == Some(role))
    }

    /// VPN tunnel followed by the role services
    pub fn services(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        std::iter::once(&self.vpn).chain(self.roles.iter())
    }

    /// Look up a service by unit name
    pub fn service(&self, unit_name: &str) -> Option<&ServiceDescriptor> {
        self.services().find(|d| d.unit_name() == unit_name)
    }

    pub fn target(&self) -> &AggregateTarget {
        &self.target
    }

    pub fn tmpfiles(&self) -> &[TmpfilesEntry] {
        &self.tmpfiles
    }

    pub fn accounts(&self) -> &[SystemAccount] {
        &self.accounts
    }

    /// Role units a service hard-depends on
    pub fn role_dependencies(&self, unit_name: &str) -> BTreeSet<String> {
        let role_units: BTreeSet<String> = self.roles.iter().map(|d| d.unit_name()).collect();
        self.service(unit_name)
            .map(|d| d.depends_on.intersection(&role_units).cloned().collect())
            .unwrap_or_default()
    }

    /// Aggregate nodes that require `unit_name`
    pub fn aggregates_requiring(&self, unit_name: &str) -> Vec<&AggregateTarget> {
        [&self.target]
            .into_iter()
            .filter(|t| t.requires.contains(unit_name))
            .collect()
    }

    /// Check the structural invariants
    ///
    /// - every edge names a node of the graph
    /// - each role appears once and the dispatcher depends on no other role
    /// - every other role requires the dispatcher
    /// - the lab target requires the VPN tunnel, and nothing else does
    /// - every role starts after the VPN tunnel
    /// - there is no ordering cycle
    pub fn validate(&self) -> Result<()> {
        let nodes = self.node_names();

        let mut seen = BTreeSet::new();
        for desc in &self.roles {
            let role = desc.role.ok_or_else(|| {
                Error::validation("graph", format!("{} has no role", desc.unit_name()))
            })?;
            if !seen.insert(role) {
                return Err(Error::validation("graph", format!("duplicate {} service", role)));
            }
        }
        if let Some(missing) = ServiceRole::ALL.iter().find(|r| !seen.contains(r)) {
            return Err(Error::validation("graph", format!("no {} service", missing)));
        }

        for desc in self.services() {
            let unit = desc.unit_name();
            let edges = desc
                .ordering_predecessors()
                .chain(desc.part_of.iter());
            for edge in edges {
                if !nodes.contains(edge) {
                    return Err(Error::validation(
                        "graph",
                        format!("{} references unknown unit {}", unit, edge),
                    ));
                }
            }
        }
        for edge in self
            .target
            .requires
            .iter()
            .chain(&self.target.after)
            .chain(&self.target.wants)
        {
            if !nodes.contains(edge) {
                return Err(Error::validation(
                    "graph",
                    format!("{} references unknown unit {}", self.target.name, edge),
                ));
            }
        }

        let vpn_unit = self.vpn.unit_name();
        if let Some(dispatcher) = self.role(ServiceRole::Dispatcher) {
            let deps = self.role_dependencies(&dispatcher.unit_name());
            if !deps.is_empty() {
                return Err(Error::validation(
                    "graph",
                    format!(
                        "dispatcher must not depend on other roles (found {})",
                        deps.into_iter().collect::<Vec<_>>().join(", ")
                    ),
                ));
            }

            let dispatcher_unit = dispatcher.unit_name();
            for desc in &self.roles {
                if desc.role != Some(ServiceRole::Dispatcher)
                    && !desc.depends_on.contains(&dispatcher_unit)
                {
                    return Err(Error::validation(
                        "graph",
                        format!("{} does not require {}", desc.unit_name(), dispatcher_unit),
                    ));
                }
            }
        }

        if !self.target.requires.contains(&vpn_unit) {
            return Err(Error::validation(
                "graph",
                format!("{} does not require {}", self.target.name, vpn_unit),
            ));
        }
        if let Some(desc) = self.roles.iter().find(|d| !d.after.contains(&vpn_unit)) {
            return Err(Error::validation(
                "graph",
                format!("{} is not ordered after {}", desc.unit_name(), vpn_unit),
            ));
        }
        if let Some(desc) = self.roles.iter().find(|d| d.depends_on.contains(&vpn_unit)) {
            return Err(Error::validation(
                "graph",
                format!(
                    "{} requires {} directly; only {} may",
                    desc.unit_name(),
                    vpn_unit,
                    self.target.name
                ),
            ));
        }

        self.start_order().map(|_| ())
    }

    /// Start order, predecessors first (Kahn's algorithm)
    ///
    /// Ties are broken by unit name so the order is deterministic. The lab
    /// target comes after every unit it wants.
    pub fn start_order(&self) -> Result<Vec<String>> {
        let edges = self.ordering_edges();

        let mut in_degrees: BTreeMap<&str, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (node, preds) in &edges {
            in_degrees.insert(node.as_str(), preds.len());
            for pred in preds {
                dependents.entry(pred.as_str()).or_default().push(node.as_str());
            }
        }

        let mut queue: VecDeque<&str> = in_degrees
            .iter()
            .filter(|&(_, deg)| *deg == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut order = Vec::with_capacity(edges.len());

        while let Some(node) = queue.pop_front() {
            order.push(node.to_string());

            if let Some(next) = dependents.get(node) {
                for dependent in next {
                    if let Some(deg) = in_degrees.get_mut(dependent) {
                        *deg = deg.saturating_sub(1);
                        if *deg == 0 {
                            queue.push_back(*dependent);
                        }
                    }
                }
            }
        }

        if order.len() != edges.len() {
            let remaining: Vec<&str> = edges
                .keys()
                .map(String::as_str)
                .filter(|k| !order.iter().any(|o| o.as_str() == *k))
                .collect();
            return Err(Error::validation(
                "graph",
                format!("ordering cycle among {}", remaining.join(", ")),
            ));
        }

        Ok(order)
    }

    fn node_names(&self) -> BTreeSet<String> {
        let mut nodes: BTreeSet<String> = self.services().map(|d| d.unit_name()).collect();
        nodes.insert(self.target.name.clone());
        nodes
    }

    /// Node -> ordering predecessors, restricted to nodes of the graph
    fn ordering_edges(&self) -> BTreeMap<String, BTreeSet<String>> {
        let nodes = self.node_names();
        let mut edges: BTreeMap<String, BTreeSet<String>> =
            nodes.iter().map(|n| (n.clone(), BTreeSet::new())).collect();

        for desc in self.services() {
            let preds = desc
                .ordering_predecessors()
                .filter(|p| nodes.contains(*p))
                .cloned();
            edges.entry(desc.unit_name()).or_default().extend(preds);
        }

        let target_preds = self
            .target
            .requires
            .iter()
            .chain(&self.target.after)
            .chain(&self.target.wants)
            .filter(|p| nodes.contains(*p))
            .cloned();
        edges
            .entry(self.target.name.clone())
            .or_default()
            .extend(target_preds);

        edges
    }
}
