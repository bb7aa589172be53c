//! Provisioning scheduler
//!
//! A single coordinator owns the instance map and all graph bookkeeping
//! (remaining dependency counts, the ready queue, failure cascades).
//! Provider calls run on spawned tasks which report back over a channel;
//! the coordinator applies each completion as one serialized transition.

use crate::action::{Action, ActionType, Plan};
use crate::error::{CloudError, Result};
use crate::observer::{ApplyObserver, NoopObserver};
use crate::planner;
use crate::provider::{CloudProvider, CreateRequest, RetryConfig};
use crate::report::{ApplyOutcome, ApplyReport, FailureCause, NodeFailure};
use crate::retry::call_with_retry;
use stackflow_core::{
    Graph, InstanceMap, InstanceStatus, NodeIndex, ResourceInstance, ResourceKind, Stack, resolve_inputs,
};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

/// Scheduler tuning
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleOptions {
    /// Maximum provider calls in flight
    pub concurrency: usize,

    /// Upper bound for a single provider call
    pub call_timeout: Duration,

    pub retry: RetryConfig,

    /// Describe unchanged instances instead of trusting the prior map
    pub refresh: bool,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            call_timeout: Duration::from_secs(300),
            retry: RetryConfig::default(),
            refresh: false,
        }
    }
}

/// Dependency-ordered, bounded-parallel provisioning against one provider
pub struct Scheduler {
    provider: Arc<dyn CloudProvider>,
    options: ScheduleOptions,
    observer: Arc<dyn ApplyObserver>,
}

impl Scheduler {
    pub fn new(provider: Arc<dyn CloudProvider>) -> Self {
        Self {
            provider,
            options: ScheduleOptions::default(),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_options(mut self, options: ScheduleOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ApplyObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn options(&self) -> &ScheduleOptions {
        &self.options
    }

    /// Previews `apply` without calling the provider.
    pub fn plan(&self, graph: &Graph, prior: &InstanceMap) -> Plan {
        planner::plan(graph, prior)
    }

    /// Builds the graph for `stack` and applies it. Declaration and cycle
    /// errors are returned before any provider call.
    pub async fn apply_stack(&self, stack: &Stack, prior: &InstanceMap) -> stackflow_core::Result<ApplyReport> {
        let graph = Graph::from_stack(stack)?;
        Ok(self.apply(&graph, prior).await)
    }

    pub async fn apply(&self, graph: &Graph, prior: &InstanceMap) -> ApplyReport {
        let (_cancel, cancel_rx) = watch::channel(false);
        self.apply_with_cancel(graph, prior, cancel_rx).await
    }

    /// Applies `graph`, reusing unchanged instances from `prior`.
    ///
    /// The previous resources of replaced nodes are torn down first,
    /// dependents before their dependencies, then the graph is provisioned.
    /// Setting the watch value to `true` stops further dispatches; calls
    /// already in flight are awaited and their results kept.
    pub async fn apply_with_cancel(
        &self,
        graph: &Graph,
        prior: &InstanceMap,
        mut cancel: watch::Receiver<bool>,
    ) -> ApplyReport {
        let started = Instant::now();
        let concurrency = self.options.concurrency.max(1);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut run = Run::new(graph, prior, &*self.observer);

        let mut cancelled = *cancel.borrow_and_update();
        let mut watching = true;

        tracing::info!(
            nodes = graph.len(),
            concurrency,
            provider = self.provider.name(),
            "apply started"
        );

        if !cancelled {
            self.tear_down_replaced(&mut run).await;
        }
        run.ready.extend(graph.roots());

        loop {
            while !cancelled && run.in_flight < concurrency {
                let Some(index) = run.ready.pop_front() else {
                    break;
                };
                self.dispatch(&mut run, index, &tx);
            }
            if run.in_flight == 0 {
                break;
            }

            tokio::select! {
                done = rx.recv() => {
                    if let Some(done) = done {
                        run.complete(done);
                    }
                }
                changed = cancel.changed(), if watching => match changed {
                    Ok(()) => {
                        if *cancel.borrow_and_update() && !cancelled {
                            tracing::warn!(in_flight = run.in_flight, "apply cancelled, waiting for in-flight calls");
                            cancelled = true;
                        }
                    }
                    Err(_) => watching = false,
                },
            }
        }

        for index in 0..graph.len() {
            let id = &graph.node(index).id;
            if run.status_of(id) == Some(InstanceStatus::Pending) {
                let cause = if cancelled {
                    FailureCause::Cancelled
                } else {
                    FailureCause::internal("never became dispatchable")
                };
                run.keep_previous(index);
                run.failures.push(NodeFailure::new(id, cause));
            }
        }

        if run.failures.is_empty() {
            self.destroy_orphans(&mut run).await;
        } else {
            tracing::warn!(
                failures = run.failures.len(),
                "skipping removal of undeclared resources after failures"
            );
            run.keep_orphans();
        }

        let report = run.finish(started);
        tracing::info!(summary = %report.summary(), success = report.is_success(), "apply finished");
        report
    }

    /// Destroys the previous resource of every node the plan replaces before
    /// anything is created. A node whose resource cannot be destroyed fails
    /// with it still tracked, and so does every replaced node it depends on.
    async fn tear_down_replaced(&self, run: &mut Run<'_>) {
        let (graph, prior) = (run.graph, run.prior);
        let plan = planner::plan(graph, prior);
        let items: Vec<Teardown> = graph
            .nodes()
            .iter()
            .map(|node| {
                let replaced = plan
                    .action_for(&node.id)
                    .is_some_and(|a| a.action_type == ActionType::Replace);
                Teardown {
                    id: node.id.clone(),
                    kind: node.kind,
                    provider_id: prior
                        .get(&node.id)
                        .filter(|_| replaced)
                        .and_then(|previous| previous.provider_id.clone()),
                    dependencies: node.dependencies.clone(),
                }
            })
            .collect();

        let count = items.iter().filter(|i| i.provider_id.is_some()).count();
        if count == 0 {
            return;
        }
        tracing::info!(count, "tearing down replaced resources");

        let outcome = self.teardown(&items, "replaced").await;
        for (index, item) in items.iter().enumerate() {
            if item.provider_id.is_some() && outcome.gone[index] {
                run.released[index] = true;
            }
        }
        for failure in outcome.failures {
            if let Some(index) = graph.index_of(&failure.id) {
                run.fail(index, failure.cause);
            }
        }
    }

    fn dispatch(&self, run: &mut Run<'_>, index: NodeIndex, tx: &mpsc::UnboundedSender<Completion<ResourceInstance>>) {
        let graph = run.graph;
        let node = graph.node(index);
        if run.status_of(&node.id) != Some(InstanceStatus::Pending) {
            return;
        }

        let resolved = match resolve_inputs(&node.inputs, &run.instances) {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::error!(id = %node.id, error = %e, "inputs not resolvable at dispatch");
                run.fail(index, FailureCause::internal(e.to_string()));
                return;
            }
        };

        let prior = run.prior;
        let previous = prior.get(&node.id);
        let released = run.released[index];
        let dependency_changed = node.dependencies.iter().any(|&d| run.changed[d]);
        let (mut action_type, mut description) =
            planner::decide(node.kind, previous, Some(&resolved), dependency_changed);
        if released && action_type == ActionType::NoOp {
            (action_type, description) = (ActionType::Replace, "previous resource already torn down");
        }
        run.actions
            .push(Action::new(action_type, &node.id, node.kind, description));
        run.observer.on_dispatch(&node.id, action_type);

        let work = match (action_type, previous) {
            (ActionType::NoOp, Some(previous)) => match (&previous.provider_id, self.options.refresh) {
                (Some(provider_id), true) => Work::Refresh {
                    provider_id: provider_id.clone(),
                },
                _ => {
                    run.adopt(index, previous);
                    return;
                }
            },
            (ActionType::Replace, Some(previous)) if !released => Work::Replace {
                previous: previous.provider_id.clone(),
            },
            _ => Work::Create,
        };

        run.changed[index] = action_type != ActionType::NoOp;
        let request = CreateRequest::new(&node.id, node.kind, resolved.clone());
        if let Some(instance) = run.instances.get_mut(&node.id) {
            instance.inputs = resolved;
            instance.transition(InstanceStatus::Creating);
        }
        run.in_flight += 1;
        tracing::info!(id = %node.id, action = %action_type, "dispatching");

        let provider = self.provider.clone();
        let retry = self.options.retry.clone();
        let timeout = self.options.call_timeout;
        spawn_worker(index, node.id.clone(), tx.clone(), async move {
            work.run(&*provider, &request, &retry, timeout).await
        });
    }

    /// Tears down prior instances that are no longer declared. Those that
    /// survive stay in the instance map so a later run retries them.
    async fn destroy_orphans(&self, run: &mut Run<'_>) {
        let orphans = planner::orphans(run.graph, run.prior);
        if orphans.is_empty() {
            return;
        }

        let position: HashMap<&str, usize> = orphans
            .iter()
            .enumerate()
            .map(|(p, instance)| (instance.id.as_str(), p))
            .collect();
        let items: Vec<Teardown> = orphans
            .iter()
            .map(|instance| Teardown {
                id: instance.id.clone(),
                kind: instance.kind,
                provider_id: instance.provider_id.clone(),
                dependencies: instance
                    .depends_on
                    .iter()
                    .filter_map(|d| position.get(d.as_str()).copied())
                    .collect(),
            })
            .collect();

        let outcome = self.teardown(&items, "no longer declared").await;
        for (instance, gone) in orphans.iter().zip(&outcome.gone) {
            if !gone {
                run.instances.insert(instance.id.clone(), (*instance).clone());
            }
        }
        for failure in outcome.failures {
            self.observer.on_failed(&failure.id, &failure.cause);
            run.failures.push(failure);
        }
        run.actions.extend(outcome.actions);
    }

    /// Destroys every created instance of `graph`, dependents before their
    /// dependencies. A failed destroy keeps everything that node depends on.
    pub async fn destroy(&self, graph: &Graph, instances: &InstanceMap) -> ApplyReport {
        let started = Instant::now();
        tracing::info!(nodes = graph.len(), provider = self.provider.name(), "destroy started");

        let items: Vec<Teardown> = graph
            .nodes()
            .iter()
            .map(|node| Teardown {
                id: node.id.clone(),
                kind: node.kind,
                provider_id: instances.get(&node.id).and_then(|i| i.provider_id.clone()),
                dependencies: node.dependencies.clone(),
            })
            .collect();
        let outcome = self.teardown(&items, "destroy").await;

        let mut left = instances.clone();
        for (item, gone) in items.iter().zip(&outcome.gone) {
            if *gone {
                left.remove(&item.id);
            }
        }
        for failure in &outcome.failures {
            self.observer.on_failed(&failure.id, &failure.cause);
        }

        let mut failures = outcome.failures;
        failures.sort_by(|a, b| a.id.cmp(&b.id));
        let outcome_kind = if failures.is_empty() {
            ApplyOutcome::Success
        } else {
            ApplyOutcome::PartialFailure { failures }
        };
        ApplyReport {
            outcome: outcome_kind,
            instances: left,
            actions: outcome.actions,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Destroys `items` with bounded concurrency, each one only after every
    /// item depending on it is gone. A failed destroy keeps every item it
    /// depends on that still has a resource.
    async fn teardown(&self, items: &[Teardown], description: &'static str) -> TeardownOutcome {
        let concurrency = self.options.concurrency.max(1);
        let (tx, mut rx) = mpsc::unbounded_channel::<Completion<()>>();

        // dependents not yet gone, per item
        let mut remaining = vec![0usize; items.len()];
        for item in items {
            for &dependency in &item.dependencies {
                remaining[dependency] += 1;
            }
        }
        let mut ready: VecDeque<usize> = (0..items.len()).filter(|&i| remaining[i] == 0).collect();
        let mut outcome = TeardownOutcome {
            gone: vec![false; items.len()],
            actions: Vec::new(),
            failures: Vec::new(),
        };
        let mut in_flight = 0;

        loop {
            while in_flight < concurrency {
                let Some(index) = ready.pop_front() else {
                    break;
                };
                let item = &items[index];
                let Some(provider_id) = item.provider_id.clone() else {
                    outcome.gone[index] = true;
                    release_dependencies(items, index, &mut remaining, &mut ready);
                    continue;
                };

                outcome
                    .actions
                    .push(Action::new(ActionType::Delete, &item.id, item.kind, description));
                self.observer.on_dispatch(&item.id, ActionType::Delete);
                in_flight += 1;

                let provider = self.provider.clone();
                let retry = self.options.retry.clone();
                let timeout = self.options.call_timeout;
                spawn_worker(index, item.id.clone(), tx.clone(), async move {
                    (destroy_resource(&*provider, &provider_id, &retry, timeout).await, false)
                });
            }
            if in_flight == 0 {
                break;
            }

            let Some(done) = rx.recv().await else {
                break;
            };
            in_flight -= 1;
            let item = &items[done.index];
            match done.result {
                Ok(()) => {
                    tracing::info!(id = %item.id, "destroyed");
                    outcome.gone[done.index] = true;
                    release_dependencies(items, done.index, &mut remaining, &mut ready);
                }
                Err(e) => {
                    tracing::warn!(id = %item.id, error = %e, "destroy failed");
                    outcome
                        .failures
                        .push(NodeFailure::new(&item.id, FailureCause::provider(e.to_string())));

                    for kept in upstream(items, done.index) {
                        let kept_item = &items[kept];
                        if kept_item.provider_id.is_none() || outcome.failures.iter().any(|f| f.id == kept_item.id) {
                            continue;
                        }
                        let cause = FailureCause::Blocked { by: item.id.clone() };
                        outcome.failures.push(NodeFailure::new(&kept_item.id, cause));
                    }
                }
            }
        }

        outcome
    }
}

/// One resource to destroy, with the positions of the items it depends on
struct Teardown {
    id: String,
    kind: ResourceKind,
    provider_id: Option<String>,
    dependencies: Vec<usize>,
}

struct TeardownOutcome {
    /// Whether the resource is gone, per item
    gone: Vec<bool>,
    actions: Vec<Action>,
    failures: Vec<NodeFailure>,
}

fn release_dependencies(items: &[Teardown], index: usize, remaining: &mut [usize], ready: &mut VecDeque<usize>) {
    for &dependency in &items[index].dependencies {
        remaining[dependency] -= 1;
        if remaining[dependency] == 0 {
            ready.push_back(dependency);
        }
    }
}

/// Every item `index` transitively depends on, in ascending order
fn upstream(items: &[Teardown], index: usize) -> Vec<usize> {
    let mut seen = vec![false; items.len()];
    let mut queue: VecDeque<usize> = items[index].dependencies.iter().copied().collect();
    while let Some(i) = queue.pop_front() {
        if !seen[i] {
            seen[i] = true;
            queue.extend(items[i].dependencies.iter().copied());
        }
    }
    (0..items.len()).filter(|&i| seen[i]).collect()
}

/// Worker report for one node
struct Completion<T> {
    index: NodeIndex,
    result: Result<T>,
    /// The worker destroyed the node's previous resource
    released: bool,
}

/// Runs `work` on its own task. A panic in the provider is reported as an
/// internal error for that node instead of stalling the coordinator.
fn spawn_worker<T, F>(index: NodeIndex, id: String, tx: mpsc::UnboundedSender<Completion<T>>, work: F)
where
    T: Send + 'static,
    F: Future<Output = (Result<T>, bool)> + Send + 'static,
{
    let task = tokio::spawn(work);
    tokio::spawn(async move {
        // After a panic the previous resource may or may not exist; keeping
        // it tracked is safe since destroy treats a missing resource as gone.
        let (result, released) = task
            .await
            .unwrap_or_else(|e| (Err(CloudError::Internal(format!("worker for {} stopped: {}", id, e))), false));
        // The receiver only goes away once the coordinator has returned.
        let _ = tx.send(Completion { index, result, released });
    });
}

/// Provider calls for one dispatched node
enum Work {
    Create,
    Replace { previous: Option<String> },
    Refresh { provider_id: String },
}

impl Work {
    /// Runs the calls and reports whether the previous resource was
    /// destroyed along the way.
    async fn run(
        self,
        provider: &dyn CloudProvider,
        request: &CreateRequest,
        retry: &RetryConfig,
        timeout: Duration,
    ) -> (Result<ResourceInstance>, bool) {
        match self {
            Work::Create => (create_resource(provider, request, retry, timeout).await, false),
            Work::Replace { previous } => {
                let Some(provider_id) = previous else {
                    return (create_resource(provider, request, retry, timeout).await, false);
                };
                if let Err(e) = destroy_resource(provider, &provider_id, retry, timeout).await {
                    return (Err(e), false);
                }
                (create_resource(provider, request, retry, timeout).await, true)
            }
            Work::Refresh { provider_id } => {
                let what = format!("describe {}", request.id);
                let provider_id = provider_id.as_str();
                let described =
                    call_with_retry(retry, timeout, &what, move || provider.describe(provider_id)).await;
                match described {
                    Err(CloudError::ResourceNotFound(_)) => {
                        tracing::warn!(id = %request.id, "resource no longer exists, recreating");
                        (create_resource(provider, request, retry, timeout).await, true)
                    }
                    other => (other, false),
                }
            }
        }
    }
}

async fn create_resource(
    provider: &dyn CloudProvider,
    request: &CreateRequest,
    retry: &RetryConfig,
    timeout: Duration,
) -> Result<ResourceInstance> {
    let what = format!("create {}", request.id);
    call_with_retry(retry, timeout, &what, move || provider.create(request)).await
}

/// Destroys one resource; a resource that is already gone counts as
/// destroyed.
async fn destroy_resource(
    provider: &dyn CloudProvider,
    provider_id: &str,
    retry: &RetryConfig,
    timeout: Duration,
) -> Result<()> {
    let what = format!("destroy {}", provider_id);
    match call_with_retry(retry, timeout, &what, move || provider.destroy(provider_id)).await {
        Err(CloudError::ResourceNotFound(_)) => Ok(()),
        other => other,
    }
}

/// Coordinator state for one apply
struct Run<'a> {
    graph: &'a Graph,
    prior: &'a InstanceMap,
    observer: &'a dyn ApplyObserver,
    instances: InstanceMap,
    /// Dependencies not yet `Ready`, per node
    remaining: Vec<usize>,
    /// Whether the node was created or replaced in this run
    changed: Vec<bool>,
    /// Whether the node's previous resource was destroyed in this run
    released: Vec<bool>,
    ready: VecDeque<NodeIndex>,
    in_flight: usize,
    actions: Vec<Action>,
    failures: Vec<NodeFailure>,
}

impl<'a> Run<'a> {
    fn new(graph: &'a Graph, prior: &'a InstanceMap, observer: &'a dyn ApplyObserver) -> Self {
        Self {
            graph,
            prior,
            observer,
            instances: graph.pending_instances(),
            remaining: graph.in_degrees(),
            changed: vec![false; graph.len()],
            released: vec![false; graph.len()],
            ready: VecDeque::new(),
            in_flight: 0,
            actions: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn status_of(&self, id: &str) -> Option<InstanceStatus> {
        self.instances.get(id).map(|i| i.status)
    }

    /// Takes over an unchanged instance from the previous run.
    fn adopt(&mut self, index: NodeIndex, previous: &ResourceInstance) {
        let id = &self.graph.node(index).id;
        if let Some(instance) = self.instances.get_mut(id) {
            instance.attributes = previous.attributes.clone();
            instance.inputs = previous.inputs.clone();
            instance.provider_id = previous.provider_id.clone();
            instance.created_at = previous.created_at;
            instance.transition(InstanceStatus::Ready);
            tracing::debug!(id = %id, "unchanged, adopted");
            self.observer.on_ready(instance);
        }
        self.release(index);
    }

    /// Carries the previous resource of a node that did not become ready
    /// into this run's map, unless it was destroyed in this run.
    fn keep_previous(&mut self, index: NodeIndex) {
        if self.released[index] {
            return;
        }
        let id = &self.graph.node(index).id;
        let Some(previous) = self.prior.get(id) else {
            return;
        };
        if let Some(instance) = self.instances.get_mut(id)
            && instance.provider_id.is_none()
            && previous.provider_id.is_some()
        {
            instance.provider_id = previous.provider_id.clone();
            instance.attributes = previous.attributes.clone();
            instance.inputs = previous.inputs.clone();
            instance.created_at = previous.created_at;
            tracing::debug!(id = %id, "previous resource still exists, keeping it tracked");
        }
    }

    /// Undeclared prior instances that were not torn down stay tracked.
    fn keep_orphans(&mut self) {
        for orphan in planner::orphans(self.graph, self.prior) {
            self.instances.insert(orphan.id.clone(), orphan.clone());
        }
    }

    fn complete(&mut self, done: Completion<ResourceInstance>) {
        self.in_flight -= 1;
        if done.released {
            self.released[done.index] = true;
        }
        let id = &self.graph.node(done.index).id;
        match done.result {
            Ok(created) => {
                if let Some(instance) = self.instances.get_mut(id) {
                    instance.attributes.extend(created.attributes);
                    if created.provider_id.is_some() {
                        instance.provider_id = created.provider_id;
                    }
                    instance.error = None;
                    instance.transition(InstanceStatus::Ready);
                    tracing::info!(id = %id, "ready");
                    self.observer.on_ready(instance);
                }
                self.release(done.index);
            }
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "provisioning failed");
                self.fail(done.index, FailureCause::provider(e.to_string()));
            }
        }
    }

    /// Counts `index` as ready for each dependent and queues the dependents
    /// whose dependencies are now all ready.
    fn release(&mut self, index: NodeIndex) {
        let graph = self.graph;
        for &dependent in &graph.node(index).dependents {
            self.remaining[dependent] -= 1;
            if self.remaining[dependent] == 0 && self.status_of(&graph.node(dependent).id) == Some(InstanceStatus::Pending) {
                self.ready.push_back(dependent);
            }
        }
    }

    /// Marks `index` failed and cascades to every pending transitive
    /// dependent. Siblings are untouched.
    fn fail(&mut self, index: NodeIndex, cause: FailureCause) {
        let graph = self.graph;
        let root = &graph.node(index).id;
        if self.status_of(root) == Some(InstanceStatus::Failed) {
            return;
        }
        self.mark_failed(index, cause);

        let cascaded = graph.transitive_dependents(index);
        if !cascaded.is_empty() {
            tracing::warn!(root = %root, dependents = cascaded.len(), "cascading failure");
        }
        for dependent in cascaded {
            if self.status_of(&graph.node(dependent).id) == Some(InstanceStatus::Pending) {
                self.mark_failed(dependent, FailureCause::DependencyFailed { root: root.clone() });
            }
        }
    }

    fn mark_failed(&mut self, index: NodeIndex, cause: FailureCause) {
        self.keep_previous(index);
        let id = &self.graph.node(index).id;
        if let Some(instance) = self.instances.get_mut(id) {
            instance.error = Some(cause.to_string());
            instance.transition(InstanceStatus::Failed);
        }
        self.observer.on_failed(id, &cause);
        self.failures.push(NodeFailure::new(id, cause));
    }

    fn finish(self, started: Instant) -> ApplyReport {
        let mut failures = self.failures;
        failures.sort_by(|a, b| a.id.cmp(&b.id));
        let outcome = if failures.is_empty() {
            ApplyOutcome::Success
        } else {
            ApplyOutcome::PartialFailure { failures }
        };
        ApplyReport {
            outcome,
            instances: self.instances,
            actions: self.actions,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ScheduleOptions::default();
        assert_eq!(options.concurrency, 4);
        assert_eq!(options.call_timeout, Duration::from_secs(300));
        assert_eq!(options.retry.max_attempts, 3);
        assert!(!options.refresh);
    }
}
