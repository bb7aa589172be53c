//! Re-application planning
//!
//! Compares the graph against the instances of a previous run. The same
//! `decide` rule drives both `plan` (a preview) and the scheduler, which
//! makes the decision again at dispatch time with freshly resolved inputs.

use crate::action::{Action, ActionType, Plan};
use serde_json::Value;
use stackflow_core::{Graph, InstanceMap, ResourceInstance, ResourceKind, resolve_inputs};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Previews what `apply` would do against `prior`.
///
/// Inputs are resolved against the prior instances of dependencies that stay
/// unchanged. A node whose dependency is created or replaced is replaced
/// as well.
pub fn plan(graph: &Graph, prior: &InstanceMap) -> Plan {
    let mut changed = vec![false; graph.len()];
    let mut known = InstanceMap::new();
    let mut actions = Vec::with_capacity(graph.len());

    for index in graph.topological_order() {
        let node = graph.node(index);
        let dependency_changed = node.dependencies.iter().any(|&d| changed[d]);
        let previous = prior.get(&node.id);
        let resolved = if dependency_changed {
            None
        } else {
            resolve_inputs(&node.inputs, &known).ok()
        };

        let (action_type, description) = decide(node.kind, previous, resolved.as_ref(), dependency_changed);
        match (action_type, previous) {
            (ActionType::NoOp, Some(previous)) => {
                known.insert(node.id.clone(), previous.clone());
            }
            _ => changed[index] = true,
        }
        actions.push(Action::new(action_type, &node.id, node.kind, description));
    }

    actions.extend(
        orphans(graph, prior)
            .into_iter()
            .map(|instance| Action::new(ActionType::Delete, &instance.id, instance.kind, "no longer declared")),
    );
    let plan = Plan::new(actions);
    tracing::debug!(summary = %plan.summary(), "planned");
    plan
}

/// Prior instances that are no longer declared but still exist at the
/// provider, each one before the undeclared instances it depended on.
pub(crate) fn orphans<'a>(graph: &Graph, prior: &'a InstanceMap) -> Vec<&'a ResourceInstance> {
    let undeclared: Vec<&ResourceInstance> = prior
        .values()
        .filter(|instance| graph.index_of(&instance.id).is_none())
        .filter(|instance| instance.provider_id.is_some())
        .collect();
    let position: HashMap<&str, usize> = undeclared
        .iter()
        .enumerate()
        .map(|(p, instance)| (instance.id.as_str(), p))
        .collect();

    // undeclared dependents not yet placed, per orphan
    let mut waiting = vec![0usize; undeclared.len()];
    for instance in &undeclared {
        for dependency in &instance.depends_on {
            if let Some(&p) = position.get(dependency.as_str()) {
                waiting[p] += 1;
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..undeclared.len()).filter(|&p| waiting[p] == 0).collect();
    let mut placed = vec![false; undeclared.len()];
    let mut order = Vec::with_capacity(undeclared.len());
    while let Some(p) = queue.pop_front() {
        placed[p] = true;
        order.push(undeclared[p]);
        for dependency in &undeclared[p].depends_on {
            if let Some(&d) = position.get(dependency.as_str()) {
                waiting[d] -= 1;
                if waiting[d] == 0 {
                    queue.push_back(d);
                }
            }
        }
    }
    // Recorded dependencies come from an acyclic graph; anything left over
    // means hand-edited state and goes last.
    order.extend((0..undeclared.len()).filter(|&p| !placed[p]).map(|p| undeclared[p]));
    order
}

/// Chooses the action for one node.
///
/// `resolved` is `None` when the inputs cannot be resolved yet, which only
/// happens during planning when a dependency is going to change.
pub(crate) fn decide(
    kind: ResourceKind,
    previous: Option<&ResourceInstance>,
    resolved: Option<&BTreeMap<String, Value>>,
    dependency_changed: bool,
) -> (ActionType, &'static str) {
    let Some(previous) = previous else {
        return (ActionType::Create, "new resource");
    };

    if previous.is_ready() {
        if previous.kind != kind {
            (ActionType::Replace, "kind changed")
        } else if dependency_changed {
            (ActionType::Replace, "dependency replaced")
        } else if resolved == Some(&previous.inputs) {
            (ActionType::NoOp, "unchanged")
        } else {
            (ActionType::Replace, "inputs changed")
        }
    } else if previous.provider_id.is_some() {
        (ActionType::Replace, "previous attempt left a partial resource")
    } else {
        (ActionType::Create, "previous attempt did not complete")
    }
}
