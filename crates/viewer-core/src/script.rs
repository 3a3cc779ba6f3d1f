//! Capability handed to user scripts: show, remove and clear, nothing else.

use std::sync::Arc;

use viewer_kernel::KernelSolidHandle;

use crate::error::{ViewerError, ViewerResult};
use crate::registry::{NameSource, Registry};

/// A script's view of the registry.
///
/// With a namespace, every name is stored as `<namespace>/<name>` and
/// `clear` only touches the session's own objects, so scripts sharing one
/// viewer cannot clobber each other.
#[derive(Clone)]
pub struct ScriptSession {
    registry: Arc<Registry>,
    namespace: Option<String>,
}

impl ScriptSession {
    pub(crate) fn new(registry: Arc<Registry>, namespace: Option<String>) -> ViewerResult<Self> {
        if let Some(ns) = &namespace {
            if ns.is_empty() || ns.contains('/') {
                return Err(ViewerError::InvalidShow {
                    reason: format!("invalid session namespace {ns:?}"),
                });
            }
        }
        Ok(Self {
            registry,
            namespace,
        })
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Registry name for a script-local name.
    pub fn qualify(&self, name: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}/{name}"),
            None => name.to_string(),
        }
    }

    /// Show objects under the given names. Returns the registry names used.
    pub fn show<N: AsRef<str>>(
        &self,
        objects: &[KernelSolidHandle],
        names: &[N],
    ) -> ViewerResult<Vec<String>> {
        let names = names.iter().map(|n| self.qualify(n.as_ref())).collect();
        let events = self
            .registry
            .show_batch(objects, NameSource::Explicit(names))?;
        Ok(events.into_iter().map(|e| e.name).collect())
    }

    /// Show objects under auto-assigned names.
    pub fn show_auto(&self, objects: &[KernelSolidHandle]) -> ViewerResult<Vec<String>> {
        let events = self.registry.show_batch(
            objects,
            NameSource::Default {
                namespace: self.namespace.clone(),
            },
        )?;
        Ok(events.into_iter().map(|e| e.name).collect())
    }

    /// Remove objects by script-local name. Returns how many were present.
    pub fn remove<N: AsRef<str>>(&self, names: &[N]) -> usize {
        let names: Vec<String> = names.iter().map(|n| self.qualify(n.as_ref())).collect();
        self.registry.remove(&names).len()
    }

    /// Remove every object this session can see.
    pub fn clear(&self) -> usize {
        match &self.namespace {
            None => self.registry.clear().len(),
            Some(ns) => self.registry.remove_prefix(&format!("{ns}/")).len(),
        }
    }
}
