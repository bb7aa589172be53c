//! Instrumented provider stub shared by the scheduler tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use stackflow_cloud::{CloudError, CloudProvider, CreateRequest, Result};
use stackflow_core::{Graph, ResourceInstance};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(String),
    Finished(String),
    Destroyed(String),
}

/// Provider that records every call and can be scripted per instance id
#[derive(Default)]
pub struct StubProvider {
    attributes: HashMap<String, BTreeMap<String, Value>>,
    failing: Mutex<HashSet<String>>,
    undeletable: Mutex<HashSet<String>>,
    transient: Mutex<HashMap<String, usize>>,
    delays: HashMap<String, Duration>,
    events: Mutex<Vec<Event>>,
    live: Mutex<HashMap<String, ResourceInstance>>,
    creates: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes returned when `id` is created.
    pub fn with_attribute(mut self, id: &str, name: &str, value: Value) -> Self {
        self.attributes
            .entry(id.to_string())
            .or_default()
            .insert(name.to_string(), value);
        self
    }

    pub fn with_private_ip(self, id: &str, ip: &str) -> Self {
        self.with_attribute(id, "private_ip", json!(ip))
    }

    /// Creating `id` always fails.
    pub fn failing(self, id: &str) -> Self {
        self.set_failing(id, true);
        self
    }

    /// Switches create failures for `id` between runs.
    pub fn set_failing(&self, id: &str, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(id.to_string());
        } else {
            set.remove(id);
        }
    }

    /// Switches destroy failures for the resource created for `id`.
    pub fn set_undeletable(&self, id: &str, undeletable: bool) {
        let mut set = self.undeletable.lock().unwrap();
        if undeletable {
            set.insert(id.to_string());
        } else {
            set.remove(id);
        }
    }

    /// Creating `id` fails `times` times with a transient error first.
    pub fn flaky(self, id: &str, times: usize) -> Self {
        self.transient
            .lock()
            .unwrap()
            .insert(id.to_string(), times);
        self
    }

    pub fn with_delay(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(id.to_string(), delay);
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Ids in the order their create call started
    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Started(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Destroyed(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    /// Provider ids of every resource that currently exists, sorted
    pub fn live_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.live.lock().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Asserts that no node started before all of its dependencies finished.
    pub fn assert_dispatch_order(&self, graph: &Graph) {
        let events = self.events();
        for (position, event) in events.iter().enumerate() {
            let Event::Started(id) = event else { continue };
            let node = graph.get(id).unwrap();
            for &dep in &node.dependencies {
                let dep_id = &graph.node(dep).id;
                let finished = events[..position]
                    .iter()
                    .any(|e| *e == Event::Finished(dep_id.clone()));
                assert!(finished, "{} started before dependency {} was ready", id, dep_id);
            }
        }
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    fn take_transient(&self, id: &str) -> bool {
        let mut transient = self.transient.lock().unwrap();
        match transient.get_mut(id) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl CloudProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn create(&self, request: &CreateRequest) -> Result<ResourceInstance> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.record(Event::Started(request.id.clone()));

        if let Some(delay) = self.delays.get(&request.id) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(&request.id) {
            return Err(CloudError::ApiError(format!("cannot create {}", request.id)));
        }
        if self.take_transient(&request.id) {
            return Err(CloudError::Unavailable("try again".into()));
        }

        let provider_id = format!("stub-{}", request.id);
        let mut instance = ResourceInstance::new(&request.id, request.kind).with_provider_id(&provider_id);
        if let Some(attributes) = self.attributes.get(&request.id) {
            instance.attributes = attributes.clone();
        }
        self.live
            .lock()
            .unwrap()
            .insert(provider_id, instance.clone());
        self.record(Event::Finished(request.id.clone()));
        Ok(instance)
    }

    async fn describe(&self, provider_id: &str) -> Result<ResourceInstance> {
        self.live
            .lock()
            .unwrap()
            .get(provider_id)
            .cloned()
            .ok_or_else(|| CloudError::ResourceNotFound(provider_id.to_string()))
    }

    async fn destroy(&self, provider_id: &str) -> Result<()> {
        let mut live = self.live.lock().unwrap();
        if let Some(instance) = live.get(provider_id)
            && self.undeletable.lock().unwrap().contains(&instance.id)
        {
            return Err(CloudError::ApiError(format!("cannot destroy {}", instance.id)));
        }
        let removed = live.remove(provider_id);
        drop(live);
        match removed {
            Some(instance) => {
                self.record(Event::Destroyed(instance.id));
                Ok(())
            }
            None => Err(CloudError::ResourceNotFound(provider_id.to_string())),
        }
    }
}
