use crate::types::*;

/// Core geometry kernel trait: the one expensive operation the viewer needs.
/// Implemented by TruckKernel (wraps real truck) and MockKernel (deterministic test double).
///
/// Implementations are shared across request workers, so every method takes
/// `&self` and the solid behind a handle must never change once stored.
pub trait Kernel: Send + Sync {
    /// Tessellate a solid to a triangle mesh.
    ///
    /// Must be deterministic: the same solid and tolerance always yield the
    /// same vertices, the same triangle order and one `FaceRange` per face in
    /// the same order as `KernelIntrospect::list_faces`.
    fn tessellate(
        &self,
        solid: &KernelSolidHandle,
        tolerance: f64,
    ) -> Result<RenderMesh, KernelError>;
}

/// Topology introspection trait. Provides read-only queries on kernel geometry.
pub trait KernelIntrospect: Send + Sync {
    /// List all faces of a solid, in tessellation order.
    fn list_faces(&self, solid: &KernelSolidHandle) -> Result<Vec<KernelId>, KernelError>;

    /// List all unique edges of a solid.
    fn list_edges(&self, solid: &KernelSolidHandle) -> Result<Vec<KernelId>, KernelError>;

    /// List all unique vertices of a solid.
    fn list_vertices(&self, solid: &KernelSolidHandle) -> Result<Vec<KernelId>, KernelError>;

    /// Compute the engineering properties of one entity of the solid.
    fn entity_properties(
        &self,
        solid: &KernelSolidHandle,
        entity: KernelId,
        kind: TopoKind,
    ) -> Result<EntityProperties, KernelError>;

    /// List the entities of a given kind.
    fn list_entities(
        &self,
        solid: &KernelSolidHandle,
        kind: TopoKind,
    ) -> Result<Vec<KernelId>, KernelError> {
        match kind {
            TopoKind::Face => self.list_faces(solid),
            TopoKind::Edge => self.list_edges(solid),
            TopoKind::Vertex => self.list_vertices(solid),
        }
    }
}

/// Combined trait for collaborators that need both tessellation and
/// introspection from the same kernel object.
pub trait KernelBundle: Kernel + KernelIntrospect {
    fn as_introspect(&self) -> &dyn KernelIntrospect;
}

// Blanket implementation for any type that implements both traits
impl<T: Kernel + KernelIntrospect> KernelBundle for T {
    fn as_introspect(&self) -> &dyn KernelIntrospect {
        self
    }
}
