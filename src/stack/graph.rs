//! Resource Graph
//!
//! Arena of [`ResourceNode`]s indexed by logical id. Nodes move through
//! `Defined → Linked → Finalized`, and each phase is a separate graph type so
//! no stage can step backward:
//!
//! - [`ResourceGraph`]: nodes are defined and dependency edges attached
//! - [`LinkedGraph`]: every reference has been checked against the arena
//! - [`FinalizedGraph`]: nodes are in dependency order, ready for export

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::resources::ResourceProperties;
use super::types::{LogicalId, ResourceKind, StackError, StackResult};

/// Lifecycle state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Defined,
    Linked,
    Finalized,
}

/// A provisioned entity in the plan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceNode {
    logical_id: LogicalId,
    kind: ResourceKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<LogicalId>,
    properties: ResourceProperties,
    #[serde(skip)]
    state: NodeState,
}

impl ResourceNode {
    /// Create a node whose initial edges are the references in its properties
    pub fn new(logical_id: LogicalId, properties: ResourceProperties) -> Self {
        let references = properties.references();
        let mut node = Self {
            logical_id,
            kind: properties.kind(),
            depends_on: Vec::new(),
            properties,
            state: NodeState::Defined,
        };
        for reference in references {
            node.push_dependency(reference);
        }
        node
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn depends_on(&self) -> &[LogicalId] {
        &self.depends_on
    }

    pub fn properties(&self) -> &ResourceProperties {
        &self.properties
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Append an edge, keeping first-insertion order and no duplicates
    fn push_dependency(&mut self, dependency: LogicalId) {
        if !self.depends_on.contains(&dependency) {
            self.depends_on.push(dependency);
        }
    }
}

/// Graph under construction
#[derive(Debug, Default)]
pub struct ResourceGraph {
    nodes: Vec<ResourceNode>,
    index: BTreeMap<LogicalId, usize>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the arena
    pub fn define(&mut self, node: ResourceNode) -> StackResult<LogicalId> {
        let id = node.logical_id.clone();
        if self.index.contains_key(&id) {
            return Err(StackError::DuplicateLogicalId(id));
        }

        debug!(node = %id, kind = %node.kind, edges = node.depends_on.len(), "Node defined");

        self.index.insert(id.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(id)
    }

    /// Attach an explicit ordering edge after both ends may have been defined
    ///
    /// The dependency itself is only checked at link time, so edges can be
    /// declared before their target exists.
    pub fn add_dependency(&mut self, node: &LogicalId, dependency: &LogicalId) -> StackResult<()> {
        let position = *self
            .index
            .get(node)
            .ok_or_else(|| StackError::UnknownNode(node.clone()))?;

        debug!(node = %node, dependency = %dependency, "Dependency edge added");
        self.nodes[position].push_dependency(dependency.clone());
        Ok(())
    }

    pub fn get(&self, id: &LogicalId) -> Option<&ResourceNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check every edge against the arena
    ///
    /// The first dangling edge (in definition order) aborts the whole build.
    pub fn link(mut self) -> StackResult<LinkedGraph> {
        for node in &self.nodes {
            if let Some(missing) = node
                .depends_on
                .iter()
                .find(|dependency| !self.index.contains_key(*dependency))
            {
                return Err(StackError::dangling(&node.logical_id, missing));
            }
        }

        for node in &mut self.nodes {
            node.state = NodeState::Linked;
        }

        info!(nodes = self.nodes.len(), "Resource graph linked");

        Ok(LinkedGraph {
            nodes: self.nodes,
            index: self.index,
        })
    }
}

/// Graph whose references all resolve
#[derive(Debug)]
pub struct LinkedGraph {
    nodes: Vec<ResourceNode>,
    index: BTreeMap<LogicalId, usize>,
}

impl LinkedGraph {
    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    /// Order nodes so every dependency precedes its dependents
    ///
    /// Among ready nodes the earliest defined is placed first, so the order
    /// is a pure function of definition order and edges.
    pub fn finalize(self) -> StackResult<FinalizedGraph> {
        let count = self.nodes.len();
        let mut placed = vec![false; count];
        let mut order = Vec::with_capacity(count);

        while order.len() < count {
            let next = (0..count).find(|&i| {
                !placed[i]
                    && self.nodes[i]
                        .depends_on
                        .iter()
                        .all(|dep| self.index.get(dep).is_some_and(|&j| placed[j]))
            });

            match next {
                Some(i) => {
                    placed[i] = true;
                    order.push(i);
                }
                None => {
                    let nodes = (0..count)
                        .filter(|&i| !placed[i])
                        .map(|i| self.nodes[i].logical_id.to_string())
                        .collect();
                    return Err(StackError::DependencyCycle { nodes });
                }
            }
        }

        let mut slots: Vec<Option<ResourceNode>> = self.nodes.into_iter().map(Some).collect();
        let mut nodes = Vec::with_capacity(count);
        let mut index = BTreeMap::new();
        for i in order {
            if let Some(mut node) = slots[i].take() {
                node.state = NodeState::Finalized;
                index.insert(node.logical_id.clone(), nodes.len());
                nodes.push(node);
            }
        }

        info!(nodes = nodes.len(), "Resource graph finalized");
        Ok(FinalizedGraph { nodes, index })
    }
}

/// Dependency-ordered, immutable graph
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedGraph {
    nodes: Vec<ResourceNode>,
    index: BTreeMap<LogicalId, usize>,
}

impl FinalizedGraph {
    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    pub fn get(&self, id: &LogicalId) -> Option<&ResourceNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.iter().filter(move |node| node.kind == kind)
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.of_kind(kind).count()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
