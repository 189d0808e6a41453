//! Cluster status as reported by `crm_mon --as-xml`, and the pure check of a
//! wait condition against it

use std::collections::BTreeSet;
use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::cib::{ConfigDocument, ConfigElement};

/// State a resource is waited for. The role names match what `crm_mon`
/// prints, hence the capitalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum WaitState {
    #[default]
    #[value(name = "present")]
    #[serde(rename = "present")]
    Present,
    #[value(name = "absent")]
    #[serde(rename = "absent")]
    Absent,
    #[value(name = "Started")]
    Started,
    #[value(name = "Stopped")]
    Stopped,
    #[value(name = "Master")]
    Master,
    #[value(name = "Slave")]
    Slave,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Started => "Started",
            Self::Stopped => "Stopped",
            Self::Master => "Master",
            Self::Slave => "Slave",
        }
    }
}

impl fmt::Display for WaitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `<resource>` entry. Clones show up once per instance, all with the
/// same id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStatus {
    pub id: String,
    pub role: Option<String>,
    /// Nodes the instance is active on; empty when it is not running
    pub nodes: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterStatus {
    pub nodes: BTreeSet<String>,
    pub resources: Vec<ResourceStatus>,
}

fn node_names<'a>(elements: impl Iterator<Item = &'a ConfigElement>) -> BTreeSet<String> {
    elements
        .filter(|e| e.kind.as_str() == "node")
        .filter_map(|e| e.attr("name"))
        .map(str::to_string)
        .collect()
}

impl ClusterStatus {
    pub fn from_document(doc: &ConfigDocument) -> Self {
        let nodes = doc
            .root
            .descendants()
            .filter(|e| e.kind.as_str() == "nodes")
            .flat_map(|nodes| node_names(nodes.children.iter()))
            .collect();

        let resources = doc
            .root
            .descendants()
            .filter(|e| e.kind.as_str() == "resource")
            .filter_map(|e| {
                Some(ResourceStatus {
                    id: e.id()?.to_string(),
                    role: e.attr("role").map(str::to_string),
                    nodes: node_names(e.children.iter()),
                })
            })
            .collect();

        Self { nodes, resources }
    }

    pub fn instances<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a ResourceStatus> + 'a {
        self.resources.iter().filter(move |r| r.id == id)
    }
}

/// Result of checking the condition once
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub satisfied: bool,
    pub active_nodes: BTreeSet<String>,
    /// Only computed when waiting for `Stopped`
    pub inactive_nodes: Option<BTreeSet<String>>,
}

/// Check whether `resource` is in `state` on `required_nodes`.
///
/// `cluster_nodes` is the membership read when waiting started. With no
/// required nodes, `Stopped` must hold on every cluster node while any other
/// role needs a single node. With required nodes, `Stopped` must hold at
/// least there and other roles must be active on exactly those nodes.
pub fn evaluate(
    status: &ClusterStatus,
    resource: &str,
    state: WaitState,
    required_nodes: &BTreeSet<String>,
    cluster_nodes: &BTreeSet<String>,
) -> Evaluation {
    let defined = status.instances(resource).next().is_some();
    let mut eval = Evaluation::default();

    match state {
        WaitState::Absent => eval.satisfied = !defined,
        WaitState::Present => eval.satisfied = defined,
        _ if !defined => {}
        WaitState::Stopped => {
            eval.active_nodes = status
                .instances(resource)
                .flat_map(|r| r.nodes.iter().cloned())
                .collect();
            let inactive: BTreeSet<String> =
                cluster_nodes.difference(&eval.active_nodes).cloned().collect();
            eval.satisfied = if required_nodes.is_empty() {
                &inactive == cluster_nodes
            } else {
                required_nodes.is_subset(&inactive)
            };
            eval.inactive_nodes = Some(inactive);
        }
        role => {
            eval.active_nodes = status
                .instances(resource)
                .filter(|r| r.role.as_deref() == Some(role.as_str()))
                .flat_map(|r| r.nodes.iter().cloned())
                .collect();
            eval.satisfied = !eval.active_nodes.is_empty()
                && (required_nodes.is_empty() || &eval.active_nodes == required_nodes);
        }
    }
    eval
}
