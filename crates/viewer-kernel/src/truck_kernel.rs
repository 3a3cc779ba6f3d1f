//! Real geometry kernel wrapping truck's API.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use truck_modeling::topology::Solid;

use crate::primitives;
use crate::tessellation;
use crate::traits::Kernel;
use crate::types::*;

/// Tolerance used when introspection needs a mesh to integrate over.
pub const DEFAULT_INTROSPECTION_TOLERANCE: f64 = 0.01;

/// Real geometry kernel backed by the truck BREP library.
///
/// Solids are stored behind `Arc` so tessellation can run on a clone of the
/// pointer without holding the store lock.
pub struct TruckKernel {
    next_handle: AtomicU64,
    solids: RwLock<HashMap<u64, Arc<Solid>>>,
    introspection_tolerance: f64,
}

impl TruckKernel {
    pub fn new() -> Self {
        Self::with_tolerance(DEFAULT_INTROSPECTION_TOLERANCE)
    }

    /// Use a custom meshing tolerance for face area and centroid queries.
    pub fn with_tolerance(introspection_tolerance: f64) -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            solids: RwLock::new(HashMap::new()),
            introspection_tolerance,
        }
    }

    pub(crate) fn introspection_tolerance(&self) -> f64 {
        self.introspection_tolerance
    }

    /// Take ownership of a solid and hand back the handle that names it.
    pub fn store_solid(&self, solid: Solid) -> KernelSolidHandle {
        let handle = KernelSolidHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.solids.write().insert(handle.id(), Arc::new(solid));
        debug!(handle = handle.id(), "stored solid");
        handle
    }

    pub fn get_solid(&self, handle: &KernelSolidHandle) -> Option<Arc<Solid>> {
        self.solids.read().get(&handle.id()).cloned()
    }

    pub(crate) fn require_solid(
        &self,
        handle: &KernelSolidHandle,
    ) -> Result<Arc<Solid>, KernelError> {
        self.get_solid(handle)
            .ok_or_else(|| KernelError::SolidNotFound {
                handle: handle.clone(),
            })
    }

    /// Drop a solid. Handles to it fail with `SolidNotFound` afterwards.
    pub fn release(&self, handle: &KernelSolidHandle) -> bool {
        self.solids.write().remove(&handle.id()).is_some()
    }

    pub fn make_box(&self, w: f64, h: f64, d: f64) -> KernelSolidHandle {
        self.store_solid(primitives::make_box(w, h, d))
    }

    pub fn make_cylinder(&self, radius: f64, height: f64) -> Result<KernelSolidHandle, KernelError> {
        Ok(self.store_solid(primitives::make_cylinder(radius, height)?))
    }

    pub fn make_sphere(&self, radius: f64) -> Result<KernelSolidHandle, KernelError> {
        Ok(self.store_solid(primitives::make_sphere(radius)?))
    }
}

impl Default for TruckKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel for TruckKernel {
    fn tessellate(
        &self,
        solid: &KernelSolidHandle,
        tolerance: f64,
    ) -> Result<RenderMesh, KernelError> {
        let truck_solid = self.require_solid(solid)?;
        tessellation::tessellate_solid(&truck_solid, tolerance)
    }
}
