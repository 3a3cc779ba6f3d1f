use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;
use viewer_kernel::{KernelBundle, KernelSolidHandle, TopoKind};
use viewer_types::ShowEvent;

use crate::bus::Subscription;
use crate::config::ViewerConfig;
use crate::error::ViewerResult;
use crate::export::{CacheStats, ExportCache, ExportedMesh};
use crate::registry::{NamedObject, Registry};
use crate::script::ScriptSession;
use crate::select::{SelectionResolver, SelectionResult};

/// The live viewer: registry, event bus, export cache and selection wired
/// together over one kernel.
///
/// Construct one per process (or per tenant) and share it behind an `Arc`.
/// Nothing here is global.
pub struct Viewer {
    registry: Arc<Registry>,
    exports: Arc<ExportCache>,
    selection: SelectionResolver,
}

impl Viewer {
    pub fn new(kernel: Arc<dyn KernelBundle>, config: ViewerConfig) -> Self {
        let registry = Arc::new(Registry::new(kernel, config));
        let exports = ExportCache::new(Arc::clone(&registry));
        let selection = SelectionResolver::new(Arc::clone(&registry), Arc::clone(&exports));
        info!("viewer started");
        Self {
            registry,
            exports,
            selection,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn exports(&self) -> &Arc<ExportCache> {
        &self.exports
    }

    pub fn selection(&self) -> &SelectionResolver {
        &self.selection
    }

    pub fn config(&self) -> &ViewerConfig {
        self.registry.config()
    }

    pub fn show<N: AsRef<str>>(
        &self,
        objects: &[KernelSolidHandle],
        names: &[N],
    ) -> ViewerResult<Vec<ShowEvent>> {
        self.registry.show(objects, names)
    }

    pub fn show_auto(&self, objects: &[KernelSolidHandle]) -> ViewerResult<Vec<ShowEvent>> {
        self.registry.show_auto(objects)
    }

    pub fn remove<N: AsRef<str>>(&self, names: &[N]) -> Vec<ShowEvent> {
        self.registry.remove(names)
    }

    pub fn clear(&self) -> Vec<ShowEvent> {
        self.registry.clear()
    }

    pub fn list_names(&self) -> Vec<String> {
        self.registry.list_names()
    }

    pub fn get(&self, name: &str) -> Option<NamedObject> {
        self.registry.get(name)
    }

    pub fn subscribe(&self) -> ViewerResult<Subscription> {
        self.registry.subscribe()
    }

    pub fn export(&self, name: &str) -> ViewerResult<ExportedMesh> {
        self.exports.export(name)
    }

    pub fn export_all(&self, folder: impl AsRef<Path>) -> ViewerResult<Vec<PathBuf>> {
        self.exports.export_all(folder)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.exports.stats()
    }

    pub fn select(&self, name: &str, kind: TopoKind, index: i64) -> ViewerResult<SelectionResult> {
        self.selection.resolve(name, kind, index)
    }

    pub fn deselect(&self, name: &str) {
        self.selection.deselect(name)
    }

    pub fn pick_triangle(&self, name: &str, triangle: usize) -> ViewerResult<SelectionResult> {
        self.selection.pick_triangle(name, triangle)
    }

    /// A show/remove/clear capability for a user script. With a namespace
    /// the script's names are kept apart from everyone else's.
    pub fn script_session(&self, namespace: Option<&str>) -> ViewerResult<ScriptSession> {
        ScriptSession::new(Arc::clone(&self.registry), namespace.map(str::to_string))
    }

    /// Close every subscription; receivers observe `Delivery::Closed`.
    pub fn shutdown(&self) {
        self.registry.shutdown();
        info!("viewer shut down");
    }
}
