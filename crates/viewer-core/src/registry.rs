//! Object registry: the single source of truth for what is on screen.
//!
//! Names map to kernel solid handles plus the bookkeeping viewers need
//! (revision, content hash, sequence of the latest event). Every mutation
//! runs under one write lock and publishes its events before releasing it,
//! so all subscribers observe the same total order.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};
use viewer_kernel::{KernelBundle, KernelSolidHandle, RenderMesh};
use viewer_types::{ContentHash, ShowEvent};

use crate::bus::{EventBus, Subscription};
use crate::config::ViewerConfig;
use crate::error::{ViewerError, ViewerResult};
use crate::hash::content_hash;

/// A visible object.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedObject {
    pub name: String,
    /// Handle into the kernel's solid store. Not a copy of the geometry.
    pub handle: KernelSolidHandle,
    /// 1 on first show, +1 on every replacement.
    pub revision: u64,
    pub content_hash: ContentHash,
    /// Tessellation taken at show time; `content_hash` is computed from it.
    pub mesh: Arc<RenderMesh>,
    /// Sequence number of the event that produced this state.
    pub sequence: u64,
    /// Timestamp of that event, seconds since the Unix epoch.
    pub shown_at: f64,
}

impl NamedObject {
    /// The show event describing this object's current state.
    pub fn current_event(&self) -> ShowEvent {
        ShowEvent {
            sequence: self.sequence,
            name: self.name.clone(),
            revision: self.revision,
            content_hash: self.content_hash,
            removed: false,
            timestamp: self.shown_at,
        }
    }
}

/// Where the names of a show batch come from.
#[derive(Debug, Clone)]
pub(crate) enum NameSource {
    Explicit(Vec<String>),
    /// `<namespace>/<prefix>_<n>` or `<prefix>_<n>` from the registry counter.
    Default { namespace: Option<String> },
}

#[derive(Debug, Default)]
struct RegistryState {
    objects: IndexMap<String, NamedObject>,
    next_sequence: u64,
    next_default_name: u64,
    /// Last revision ever issued per name, kept across removals.
    revisions: HashMap<String, u64>,
}

impl RegistryState {
    fn next_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }

    fn removal_event(&mut self, object: &NamedObject, timestamp: f64) -> ShowEvent {
        ShowEvent {
            sequence: self.next_sequence(),
            name: object.name.clone(),
            revision: object.revision,
            content_hash: object.content_hash,
            removed: true,
            timestamp,
        }
    }
}

fn now_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Named, mutable table of visible solids.
pub struct Registry {
    kernel: Arc<dyn KernelBundle>,
    config: ViewerConfig,
    bus: EventBus,
    state: RwLock<RegistryState>,
}

impl Registry {
    pub fn new(kernel: Arc<dyn KernelBundle>, config: ViewerConfig) -> Self {
        let bus = EventBus::new(config.keepalive, config.subscriber_queue_capacity);
        Self {
            kernel,
            config,
            bus,
            state: RwLock::new(RegistryState::default()),
        }
    }

    pub fn kernel(&self) -> &Arc<dyn KernelBundle> {
        &self.kernel
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Show `objects` under `names`, replacing any object with the same name.
    ///
    /// The batch is atomic: either every pair is applied and published as one
    /// step, or none is. An empty batch is a no-op.
    pub fn show<N: AsRef<str>>(
        &self,
        objects: &[KernelSolidHandle],
        names: &[N],
    ) -> ViewerResult<Vec<ShowEvent>> {
        let names = names.iter().map(|n| n.as_ref().to_string()).collect();
        self.show_batch(objects, NameSource::Explicit(names))
    }

    /// Show `objects` under auto-assigned names.
    pub fn show_auto(&self, objects: &[KernelSolidHandle]) -> ViewerResult<Vec<ShowEvent>> {
        self.show_batch(objects, NameSource::Default { namespace: None })
    }

    #[instrument(skip(self, objects, names), fields(count = objects.len()))]
    pub(crate) fn show_batch(
        &self,
        objects: &[KernelSolidHandle],
        names: NameSource,
    ) -> ViewerResult<Vec<ShowEvent>> {
        if let NameSource::Explicit(names) = &names {
            validate_names(objects.len(), names)?;
        }
        if objects.is_empty() {
            return Ok(Vec::new());
        }

        // Tessellate before taking the lock; mutation must not wait on the kernel.
        let mut meshes = Vec::with_capacity(objects.len());
        for (i, handle) in objects.iter().enumerate() {
            let mesh = self
                .kernel
                .tessellate(handle, self.config.tessellation_tolerance)
                .map_err(|e| {
                    let name = match &names {
                        NameSource::Explicit(names) => names[i].clone(),
                        NameSource::Default { .. } => format!("<unnamed #{i}>"),
                    };
                    warn!(%name, error = %e, "rejecting show batch");
                    ViewerError::ExportFailure {
                        name,
                        reason: e.to_string(),
                    }
                })?;
            meshes.push((content_hash(&mesh), Arc::new(mesh)));
        }

        let mut state = self.state.write();
        let names = match names {
            NameSource::Explicit(names) => names,
            NameSource::Default { namespace } => (0..objects.len())
                .map(|_| {
                    state.next_default_name += 1;
                    let base = format!(
                        "{}_{}",
                        self.config.default_name_prefix, state.next_default_name
                    );
                    match &namespace {
                        Some(ns) => format!("{ns}/{base}"),
                        None => base,
                    }
                })
                .collect(),
        };

        let timestamp = now_seconds();
        let mut events = Vec::with_capacity(objects.len());
        for ((handle, name), (hash, mesh)) in objects.iter().zip(names).zip(meshes) {
            let sequence = state.next_sequence();
            let revision = state.revisions.get(&name).copied().unwrap_or(0) + 1;
            state.revisions.insert(name.clone(), revision);

            let object = NamedObject {
                name: name.clone(),
                handle: handle.clone(),
                revision,
                content_hash: hash,
                mesh,
                sequence,
                shown_at: timestamp,
            };
            events.push(object.current_event());
            // IndexMap::insert keeps the slot of an existing key.
            state.objects.insert(name, object);
        }

        self.bus.publish(&events);
        info!(shown = events.len(), "registry updated");
        Ok(events)
    }

    /// Remove the named objects. Unknown names are ignored.
    #[instrument(skip(self, names))]
    pub fn remove<N: AsRef<str>>(&self, names: &[N]) -> Vec<ShowEvent> {
        let mut state = self.state.write();
        let timestamp = now_seconds();
        let mut events = Vec::new();
        for name in names {
            if let Some(object) = state.objects.shift_remove(name.as_ref()) {
                let event = state.removal_event(&object, timestamp);
                events.push(event);
            }
        }
        if !events.is_empty() {
            self.bus.publish(&events);
            info!(removed = events.len(), "registry updated");
        }
        events
    }

    /// Remove every object whose name starts with `prefix`, as one batch.
    #[instrument(skip(self))]
    pub fn remove_prefix(&self, prefix: &str) -> Vec<ShowEvent> {
        let mut state = self.state.write();
        let timestamp = now_seconds();
        let matching: Vec<String> = state
            .objects
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect();
        let mut events = Vec::with_capacity(matching.len());
        for name in matching {
            if let Some(object) = state.objects.shift_remove(&name) {
                let event = state.removal_event(&object, timestamp);
                events.push(event);
            }
        }
        if !events.is_empty() {
            self.bus.publish(&events);
            info!(removed = events.len(), "registry cleared by prefix");
        }
        events
    }

    /// Remove every visible object.
    #[instrument(skip(self))]
    pub fn clear(&self) -> Vec<ShowEvent> {
        let mut state = self.state.write();
        let timestamp = now_seconds();
        let objects = std::mem::take(&mut state.objects);
        let events: Vec<ShowEvent> = objects
            .values()
            .map(|object| state.removal_event(object, timestamp))
            .collect();
        if !events.is_empty() {
            self.bus.publish(&events);
            info!(removed = events.len(), "registry cleared");
        }
        events
    }

    /// Visible names in first-show order.
    pub fn list_names(&self) -> Vec<String> {
        self.state.read().objects.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<NamedObject> {
        self.state.read().objects.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.read().objects.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.state.read().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribe to registry events, starting with the current state.
    pub fn subscribe(&self) -> ViewerResult<Subscription> {
        let state = self.state.read();
        let mut replay: Vec<ShowEvent> =
            state.objects.values().map(NamedObject::current_event).collect();
        replay.sort_by_key(|e| e.sequence);
        let subscription = self.bus.attach(replay)?;
        debug!(
            subscriber = %subscription.id(),
            replayed = state.objects.len(),
            "subscribed"
        );
        Ok(subscription)
    }

    /// Run `f` with the name's current hash while holding the read lock,
    /// so no mutation can interleave with whatever `f` decides.
    pub(crate) fn with_current_hash<R>(
        &self,
        name: &str,
        f: impl FnOnce(Option<ContentHash>) -> R,
    ) -> R {
        let state = self.state.read();
        f(state.objects.get(name).map(|o| o.content_hash))
    }

    pub fn shutdown(&self) {
        self.bus.shutdown();
    }
}

fn validate_names(count: usize, names: &[String]) -> ViewerResult<()> {
    if names.len() != count {
        return Err(ViewerError::InvalidShow {
            reason: format!("{} object(s) but {} name(s)", count, names.len()),
        });
    }
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(ViewerError::InvalidShow {
                reason: "object names must not be empty".to_string(),
            });
        }
        if !seen.insert(name.as_str()) {
            return Err(ViewerError::InvalidShow {
                reason: format!("name {name:?} appears twice in one batch"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use viewer_kernel::MockKernel;

    fn registry() -> (Arc<MockKernel>, Registry) {
        let kernel = Arc::new(MockKernel::new());
        let registry = Registry::new(kernel.clone(), ViewerConfig::responsive());
        (kernel, registry)
    }

    #[test]
    fn replacing_keeps_position_and_bumps_revision() {
        let (kernel, registry) = registry();
        let a = kernel.make_box(1.0, 1.0, 1.0);
        let b = kernel.make_box(2.0, 2.0, 2.0);

        registry.show(&[a.clone(), b], &["a", "b"]).unwrap();
        let events = registry
            .show(&[kernel.make_box(3.0, 3.0, 3.0)], &["a"])
            .unwrap();

        assert_eq!(registry.list_names(), vec!["a", "b"]);
        assert_eq!(events[0].revision, 2);
        assert_ne!(registry.get("a").unwrap().handle, a);
    }

    #[test]
    fn revision_continues_after_remove() {
        let (kernel, registry) = registry();
        let h = kernel.make_box(1.0, 1.0, 1.0);
        registry.show(&[h.clone()], &["part"]).unwrap();
        registry.remove(&["part"]);
        let events = registry.show(&[h], &["part"]).unwrap();
        assert_eq!(events[0].revision, 2);
    }

    #[test]
    fn sequences_strictly_increase() {
        let (kernel, registry) = registry();
        let h = kernel.make_box(1.0, 1.0, 1.0);
        let mut seqs = Vec::new();
        seqs.extend(registry.show(&[h.clone(), h.clone()], &["a", "b"]).unwrap());
        seqs.extend(registry.remove(&["a"]));
        seqs.extend(registry.clear());
        let seqs: Vec<u64> = seqs.iter().map(|e| e.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4]);
    }

    #[test]
    fn mismatched_names_are_rejected() {
        let (kernel, registry) = registry();
        let h = kernel.make_box(1.0, 1.0, 1.0);
        let err = registry.show(&[h], &["a", "b"]).unwrap_err();
        assert!(matches!(err, ViewerError::InvalidShow { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn failing_tessellation_leaves_registry_untouched() {
        let (kernel, registry) = registry();
        let good = kernel.make_box(1.0, 1.0, 1.0);
        let bad = kernel.make_degenerate();
        let err = registry.show(&[good, bad], &["good", "bad"]).unwrap_err();
        assert!(matches!(err, ViewerError::ExportFailure { ref name, .. } if name == "bad"));
        assert!(registry.is_empty());
    }

    #[test]
    fn default_names_use_registry_counter() {
        let (kernel, registry) = registry();
        let h = kernel.make_box(1.0, 1.0, 1.0);
        registry.show_auto(&[h.clone(), h.clone()]).unwrap();
        registry.show_auto(&[h]).unwrap();
        assert_eq!(
            registry.list_names(),
            vec!["object_1", "object_2", "object_3"]
        );
    }

    #[test]
    fn remove_unknown_name_emits_nothing() {
        let (_kernel, registry) = registry();
        assert!(registry.remove(&["ghost"]).is_empty());
        assert!(registry.clear().is_empty());
    }

    #[test]
    fn remove_prefix_only_touches_matching_names() {
        let (kernel, registry) = registry();
        let h = kernel.make_box(1.0, 1.0, 1.0);
        registry
            .show(&[h.clone(), h.clone(), h], &["ns/a", "other", "ns/b"])
            .unwrap();

        let events = registry.remove_prefix("ns/");
        let names: Vec<&str> = events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["ns/a", "ns/b"]);
        assert!(events.iter().all(|e| e.removed));
        assert_eq!(registry.list_names(), vec!["other"]);
        assert!(registry.remove_prefix("ns/").is_empty());
    }

    #[test]
    fn show_keeps_tessellated_mesh() {
        let (kernel, registry) = registry();
        registry.show(&[kernel.make_box(1.0, 1.0, 1.0)], &["part"]).unwrap();
        let object = registry.get("part").unwrap();
        assert_eq!(object.mesh.triangle_count(), 12);
        assert_eq!(content_hash(&object.mesh), object.content_hash);
        assert_eq!(kernel.tessellation_count(), 1);
    }
}
