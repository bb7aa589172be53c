//! Dependency graph
//!
//! Nodes are the expanded instances (instance-sets contribute one node per
//! key). An edge `A -> B` exists when an input of `A` references `B`; a
//! reference to a whole instance-set fans out to every member.

use crate::error::{CycleError, Result};
use crate::model::{
    InstanceMap, Input, Reference, ResourceInstance, ResourceKind, ResourceSpec, Stack, member_id,
};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap, VecDeque};

/// Index of a node in the graph arena
pub type NodeIndex = usize;

/// One schedulable instance
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    /// Provider kind; instance-set members are `Instance`
    pub kind: ResourceKind,
    /// Declared inputs with `${each.key}` already expanded
    pub inputs: BTreeMap<String, Input>,
    pub member_of: Option<String>,
    pub key: Option<String>,
    /// Nodes this node must wait for, sorted and de-duplicated
    pub dependencies: Vec<NodeIndex>,
    /// Nodes waiting for this node, sorted and de-duplicated
    pub dependents: Vec<NodeIndex>,
}

impl Node {
    pub fn references(&self) -> Vec<&Reference> {
        self.inputs.values().flat_map(Input::references).collect()
    }

    /// Pending instance for this node.
    pub fn pending_instance(&self) -> ResourceInstance {
        let instance = ResourceInstance::new(&self.id, self.kind);
        match (&self.member_of, &self.key) {
            (Some(set), Some(key)) => instance.with_membership(set, key),
            _ => instance,
        }
    }
}

/// Acyclic dependency graph over expanded instances
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    index: HashMap<String, NodeIndex>,
    sets: HashMap<String, Vec<NodeIndex>>,
}

/// Builds the graph for `specs`, declaring them in order.
pub fn build(specs: &[ResourceSpec]) -> Result<Graph> {
    let stack = Stack::from_specs(specs.iter().cloned())?;
    Graph::from_stack(&stack)
}

impl Graph {
    pub fn from_stack(stack: &Stack) -> Result<Graph> {
        stack.validate()?;

        let mut graph = Graph::default();
        for spec in stack.specs() {
            graph.expand(spec);
        }

        for i in 0..graph.nodes.len() {
            let mut deps: Vec<NodeIndex> = graph.nodes[i]
                .references()
                .into_iter()
                .flat_map(|r| graph.targets(&r.target))
                .collect();
            deps.sort_unstable();
            deps.dedup();
            for &dep in &deps {
                graph.nodes[dep].dependents.push(i);
            }
            graph.nodes[i].dependencies = deps;
        }
        for node in &mut graph.nodes {
            node.dependents.sort_unstable();
            node.dependents.dedup();
        }

        if let Some(cycle) = graph.find_cycle() {
            tracing::debug!(?cycle, "dependency cycle");
            return Err(CycleError { cycle }.into());
        }

        tracing::debug!(nodes = graph.nodes.len(), "built dependency graph");
        Ok(graph)
    }

    fn expand(&mut self, spec: &ResourceSpec) {
        if spec.kind.is_set() {
            let mut members = Vec::new();
            for key in spec.keys() {
                let inputs = spec
                    .inputs
                    .iter()
                    .map(|(name, input)| (name.clone(), input.expand_each_key(key)))
                    .collect();
                members.push(self.push(Node {
                    id: member_id(&spec.id, key),
                    kind: ResourceKind::Instance,
                    inputs,
                    member_of: Some(spec.id.clone()),
                    key: Some(key.clone()),
                    dependencies: Vec::new(),
                    dependents: Vec::new(),
                }));
            }
            self.sets.insert(spec.id.clone(), members);
        } else {
            self.push(Node {
                id: spec.id.clone(),
                kind: spec.kind,
                inputs: spec.inputs.clone(),
                member_of: None,
                key: None,
                dependencies: Vec::new(),
                dependents: Vec::new(),
            });
        }
    }

    fn push(&mut self, node: Node) -> NodeIndex {
        let index = self.nodes.len();
        self.index.insert(node.id.clone(), index);
        self.nodes.push(node);
        index
    }

    /// Nodes a reference target stands for: one node, or every member of
    /// an instance-set.
    fn targets(&self, target: &str) -> Vec<NodeIndex> {
        if let Some(&i) = self.index.get(target) {
            return vec![i];
        }
        self.sets.get(target).cloned().unwrap_or_default()
    }

    /// Depth-first search with three-color marking. Returns the first cycle
    /// found, following dependency edges.
    fn find_cycle(&self) -> Option<Vec<String>> {
        let mut marks = vec![Mark::White; self.nodes.len()];
        let mut path = Vec::new();
        (0..self.nodes.len()).find_map(|start| {
            if marks[start] == Mark::White {
                self.visit(start, &mut marks, &mut path)
            } else {
                None
            }
        })
    }

    fn visit(&self, i: NodeIndex, marks: &mut [Mark], path: &mut Vec<NodeIndex>) -> Option<Vec<String>> {
        marks[i] = Mark::Grey;
        path.push(i);

        for &dep in &self.nodes[i].dependencies {
            match marks[dep] {
                Mark::Grey => {
                    let start = path.iter().position(|&p| p == dep).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|&p| self.nodes[p].id.clone()).collect();
                    cycle.push(self.nodes[dep].id.clone());
                    return Some(cycle);
                }
                Mark::White => {
                    if let Some(cycle) = self.visit(dep, marks, path) {
                        return Some(cycle);
                    }
                }
                Mark::Black => {}
            }
        }

        path.pop();
        marks[i] = Mark::Black;
        None
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index]
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|i| &self.nodes[i])
    }

    /// Member nodes of an instance-set, in key order.
    pub fn set_members(&self, set: &str) -> &[NodeIndex] {
        self.sets.get(set).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of dependencies per node
    pub fn in_degrees(&self) -> Vec<usize> {
        self.nodes.iter().map(|n| n.dependencies.len()).collect()
    }

    /// Nodes without dependencies, in declaration order
    pub fn roots(&self) -> Vec<NodeIndex> {
        (0..self.nodes.len())
            .filter(|&i| self.nodes[i].dependencies.is_empty())
            .collect()
    }

    /// Kahn's algorithm; ties break by declaration order.
    pub fn topological_order(&self) -> Vec<NodeIndex> {
        let mut in_degree = self.in_degrees();
        let mut queue: BinaryHeap<Reverse<NodeIndex>> = self.roots().into_iter().map(Reverse).collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(Reverse(i)) = queue.pop() {
            order.push(i);
            for &next in &self.nodes[i].dependents {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push(Reverse(next));
                }
            }
        }
        order
    }

    /// Every node that transitively depends on `index`, in ascending order.
    pub fn transitive_dependents(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut seen = vec![false; self.nodes.len()];
        let mut queue: VecDeque<NodeIndex> = self.nodes[index].dependents.iter().copied().collect();
        while let Some(i) = queue.pop_front() {
            if !seen[i] {
                seen[i] = true;
                queue.extend(self.nodes[i].dependents.iter().copied());
            }
        }
        (0..self.nodes.len()).filter(|&i| seen[i]).collect()
    }

    /// Every node `index` transitively depends on, in ascending order.
    pub fn transitive_dependencies(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut seen = vec![false; self.nodes.len()];
        let mut queue: VecDeque<NodeIndex> = self.nodes[index].dependencies.iter().copied().collect();
        while let Some(i) = queue.pop_front() {
            if !seen[i] {
                seen[i] = true;
                queue.extend(self.nodes[i].dependencies.iter().copied());
            }
        }
        (0..self.nodes.len()).filter(|&i| seen[i]).collect()
    }

    /// Pending instance for every node, as created at graph build, with
    /// its dependency ids recorded.
    pub fn pending_instances(&self) -> InstanceMap {
        self.nodes
            .iter()
            .map(|n| {
                let mut instance = n.pending_instance();
                instance.depends_on = n.dependencies.iter().map(|&d| self.nodes[d].id.clone()).collect();
                (n.id.clone(), instance)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Grey,
    Black,
}
