//! Selection resolver: maps a flat pick back onto a BRep entity.
//!
//! Enumeration order is the kernel's, which is also the face order of the
//! exported mesh, so "face #K" means the same thing to the renderer and
//! to this module. Every query re-reads the registry; the latest revision
//! always wins.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use viewer_kernel::{face_index_of_triangle, EntityProperties, TopoKind};

use crate::error::{ViewerError, ViewerResult};
use crate::export::ExportCache;
use crate::registry::Registry;

/// A resolved pick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub object_name: String,
    pub kind: TopoKind,
    pub index: usize,
    /// Revision of the object the pick was resolved against.
    pub revision: u64,
    pub properties: EntityProperties,
}

pub struct SelectionResolver {
    registry: Arc<Registry>,
    exports: Arc<ExportCache>,
}

impl SelectionResolver {
    pub fn new(registry: Arc<Registry>, exports: Arc<ExportCache>) -> Self {
        Self { registry, exports }
    }

    /// Number of entities of `kind` on the named object.
    pub fn count(&self, name: &str, kind: TopoKind) -> ViewerResult<usize> {
        let object = self.registry.get(name).ok_or_else(|| ViewerError::NotFound {
            name: name.to_string(),
        })?;
        Ok(self
            .registry
            .kernel()
            .list_entities(&object.handle, kind)?
            .len())
    }

    /// Resolve `kind` number `index` of the named object.
    ///
    /// Negative indices and indices past the end are rejected, never clamped.
    #[instrument(skip(self))]
    pub fn resolve(&self, name: &str, kind: TopoKind, index: i64) -> ViewerResult<SelectionResult> {
        let object = self.registry.get(name).ok_or_else(|| ViewerError::NotFound {
            name: name.to_string(),
        })?;
        let kernel = self.registry.kernel();
        let entities = kernel.list_entities(&object.handle, kind)?;

        let position = usize::try_from(index)
            .ok()
            .filter(|&i| i < entities.len())
            .ok_or(ViewerError::IndexOutOfRange {
                kind,
                index,
                count: entities.len(),
            })?;

        let properties = kernel.entity_properties(&object.handle, entities[position], kind)?;
        debug!(revision = object.revision, "selection resolved");

        Ok(SelectionResult {
            object_name: object.name,
            kind,
            index: position,
            revision: object.revision,
            properties,
        })
    }

    /// Clearing a highlight needs no server state.
    pub fn deselect(&self, name: &str) {
        debug!(%name, "deselect");
    }

    /// Resolve the face that owns triangle `triangle` of the exported mesh.
    #[instrument(skip(self))]
    pub fn pick_triangle(&self, name: &str, triangle: usize) -> ViewerResult<SelectionResult> {
        let mesh = self.exports.export(name)?;
        let face = face_index_of_triangle(&mesh.face_ranges, triangle).ok_or(
            ViewerError::TriangleOutOfRange {
                index: triangle,
                count: mesh.triangle_count(),
            },
        )?;
        self.resolve(name, TopoKind::Face, face as i64)
    }
}
