use serde::{Deserialize, Serialize};

// Re-export shared types from viewer-types
pub use viewer_types::{EntityProperties, TopoKind};

/// Opaque handle to a solid in the geometry kernel.
///
/// The solid behind a handle is immutable; "changing" a model means
/// storing a new solid and showing the new handle under the same name.
/// NEVER persisted. Valid only for the current kernel session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KernelSolidHandle(pub(crate) u64);

impl KernelSolidHandle {
    pub(crate) fn id(&self) -> u64 {
        self.0
    }
}

/// Transient kernel-internal entity identifier.
/// Stable for the lifetime of the solid it was listed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelId(pub u64);

/// Errors from kernel operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KernelError {
    #[error("tessellation failed: {reason}")]
    TessellationFailed { reason: String },

    #[error("solid not found: {handle:?}")]
    SolidNotFound { handle: KernelSolidHandle },

    #[error("entity not found: {id:?}")]
    EntityNotFound { id: KernelId },

    #[error("kernel error: {message}")]
    Other { message: String },
}

/// Tessellated triangle mesh for rendering in three.js.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderMesh {
    /// Flat array of vertex positions [x0, y0, z0, x1, y1, z1, ...].
    pub vertices: Vec<f32>,
    /// Flat array of vertex normals [nx0, ny0, nz0, nx1, ny1, nz1, ...].
    pub normals: Vec<f32>,
    /// Triangle indices into the vertex array.
    pub indices: Vec<u32>,
    /// One entry per BRep face, in the kernel's face enumeration order.
    pub face_ranges: Vec<FaceRange>,
}

impl RenderMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Map a flat triangle index back to the index of the face that owns it.
    pub fn face_index_of_triangle(&self, triangle: usize) -> Option<usize> {
        face_index_of_triangle(&self.face_ranges, triangle)
    }
}

/// Find the face whose index range contains the given triangle.
pub fn face_index_of_triangle(face_ranges: &[FaceRange], triangle: usize) -> Option<usize> {
    let index = u32::try_from(triangle.checked_mul(3)?).ok()?;
    face_ranges
        .iter()
        .position(|r| r.start_index <= index && index < r.end_index)
}

/// Maps a contiguous range of triangles to a logical face.
///
/// Faces that produced no triangles keep an empty range so that the
/// position of a range always equals the face's enumeration index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRange {
    /// The KernelId of the face this range belongs to.
    pub face_id: KernelId,
    /// Start index in the indices array (inclusive).
    pub start_index: u32,
    /// End index in the indices array (exclusive).
    pub end_index: u32,
}

impl FaceRange {
    pub fn triangle_count(&self) -> u32 {
        (self.end_index - self.start_index) / 3
    }
}

// Custom Serialize/Deserialize for KernelId (needed for FaceRange serialization)
impl Serialize for KernelId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for KernelId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u64::deserialize(deserializer).map(KernelId)
    }
}
