//! Deterministic in-memory kernel used by tests and demos.
//!
//! Produces synthetic box topology with predictable entity counts and
//! properties. Used by viewer-core and viewer-bridge for unit testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::traits::{Kernel, KernelIntrospect};
use crate::types::*;

/// Face definition tuple: (corner vertex indices, outward normal).
type FaceDef = ([usize; 4], [f64; 3]);

/// A mock vertex with known position.
#[derive(Debug, Clone)]
struct MockVertex {
    id: KernelId,
    position: [f64; 3],
}

/// A mock edge with known endpoints.
#[derive(Debug, Clone)]
struct MockEdge {
    id: KernelId,
    start: [f64; 3],
    end: [f64; 3],
}

/// A mock planar quad face.
#[derive(Debug, Clone)]
struct MockFace {
    id: KernelId,
    /// Corners in counter-clockwise order seen from outside.
    corners: [[f64; 3]; 4],
    normal: [f64; 3],
}

impl MockFace {
    fn area(&self) -> f64 {
        let [a, b, c, _] = self.corners;
        length(cross(sub(b, a), sub(c, a)))
    }

    fn centroid(&self) -> [f64; 3] {
        let mut c = [0.0; 3];
        for corner in &self.corners {
            for i in 0..3 {
                c[i] += corner[i] / 4.0;
            }
        }
        c
    }
}

/// A synthetic solid with deterministic topology.
#[derive(Debug, Clone)]
struct MockSolid {
    vertices: Vec<MockVertex>,
    edges: Vec<MockEdge>,
    faces: Vec<MockFace>,
}

/// Deterministic test double for the geometry kernel.
/// Implements both Kernel and KernelIntrospect.
pub struct MockKernel {
    next_id: AtomicU64,
    next_handle: AtomicU64,
    solids: RwLock<HashMap<u64, Arc<MockSolid>>>,
    tessellations: AtomicUsize,
}

impl MockKernel {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            next_handle: AtomicU64::new(1),
            solids: RwLock::new(HashMap::new()),
            tessellations: AtomicUsize::new(0),
        }
    }

    fn alloc_id(&self) -> KernelId {
        KernelId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn store(&self, solid: MockSolid) -> KernelSolidHandle {
        let handle = KernelSolidHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.solids.write().insert(handle.id(), Arc::new(solid));
        handle
    }

    fn get(&self, handle: &KernelSolidHandle) -> Result<Arc<MockSolid>, KernelError> {
        self.solids
            .read()
            .get(&handle.id())
            .cloned()
            .ok_or_else(|| KernelError::SolidNotFound {
                handle: handle.clone(),
            })
    }

    /// Create a box solid with 8 vertices, 12 edges, 6 faces.
    /// Origin at (0,0,0), extending to (w,h,d).
    pub fn make_box(&self, w: f64, h: f64, d: f64) -> KernelSolidHandle {
        self.make_box_at([0.0, 0.0, 0.0], w, h, d)
    }

    /// Create a box solid with its minimum corner at `origin`.
    pub fn make_box_at(&self, origin: [f64; 3], w: f64, h: f64, d: f64) -> KernelSolidHandle {
        let solid = self.build_box(origin, w, h, d);
        self.store(solid)
    }

    /// Create a solid without any faces. Tessellating it fails, which
    /// stands in for malformed geometry coming from a user script.
    pub fn make_degenerate(&self) -> KernelSolidHandle {
        self.store(MockSolid {
            vertices: Vec::new(),
            edges: Vec::new(),
            faces: Vec::new(),
        })
    }

    /// Drop a solid. Handles to it fail with `SolidNotFound` afterwards.
    pub fn release(&self, handle: &KernelSolidHandle) {
        self.solids.write().remove(&handle.id());
    }

    /// Number of `tessellate` calls served so far.
    pub fn tessellation_count(&self) -> usize {
        self.tessellations.load(Ordering::SeqCst)
    }

    fn build_box(&self, o: [f64; 3], w: f64, h: f64, d: f64) -> MockSolid {
        // 8 vertices of a box
        let positions = [
            [o[0], o[1], o[2]],
            [o[0] + w, o[1], o[2]],
            [o[0] + w, o[1] + h, o[2]],
            [o[0], o[1] + h, o[2]],
            [o[0], o[1], o[2] + d],
            [o[0] + w, o[1], o[2] + d],
            [o[0] + w, o[1] + h, o[2] + d],
            [o[0], o[1] + h, o[2] + d],
        ];

        let vertices: Vec<MockVertex> = positions
            .iter()
            .map(|&position| MockVertex {
                id: self.alloc_id(),
                position,
            })
            .collect();

        // 12 edges of a box: 4 bottom, 4 top, 4 vertical
        let edge_pairs = [
            (0, 1),
            (1, 2),
            (2, 3),
            (3, 0),
            (4, 5),
            (5, 6),
            (6, 7),
            (7, 4),
            (0, 4),
            (1, 5),
            (2, 6),
            (3, 7),
        ];

        let edges: Vec<MockEdge> = edge_pairs
            .iter()
            .map(|&(si, ei)| MockEdge {
                id: self.alloc_id(),
                start: positions[si],
                end: positions[ei],
            })
            .collect();

        // bottom (z=0), top (z=d), front (y=0), back (y=h), left (x=0), right (x=w)
        let face_defs: [FaceDef; 6] = [
            ([0, 3, 2, 1], [0.0, 0.0, -1.0]),
            ([4, 5, 6, 7], [0.0, 0.0, 1.0]),
            ([0, 1, 5, 4], [0.0, -1.0, 0.0]),
            ([3, 7, 6, 2], [0.0, 1.0, 0.0]),
            ([0, 4, 7, 3], [-1.0, 0.0, 0.0]),
            ([1, 2, 6, 5], [1.0, 0.0, 0.0]),
        ];

        let faces = face_defs
            .iter()
            .map(|&(corners, normal)| MockFace {
                id: self.alloc_id(),
                corners: corners.map(|i| positions[i]),
                normal,
            })
            .collect();

        MockSolid {
            vertices,
            edges,
            faces,
        }
    }

    /// Generate a deterministic box mesh: 2 triangles per face.
    fn tessellate_faces(solid: &MockSolid) -> RenderMesh {
        let mut vertices = Vec::new();
        let mut normals = Vec::new();
        let mut indices = Vec::new();
        let mut face_ranges = Vec::new();

        for face in &solid.faces {
            let start_index = indices.len() as u32;
            let base_vertex = (vertices.len() / 3) as u32;
            let n = face.normal;

            for corner in &face.corners {
                vertices.extend_from_slice(&[corner[0] as f32, corner[1] as f32, corner[2] as f32]);
                normals.extend_from_slice(&[n[0] as f32, n[1] as f32, n[2] as f32]);
            }

            // Two triangles: 0-1-2 and 0-2-3
            indices.extend_from_slice(&[
                base_vertex,
                base_vertex + 1,
                base_vertex + 2,
                base_vertex,
                base_vertex + 2,
                base_vertex + 3,
            ]);

            face_ranges.push(FaceRange {
                face_id: face.id,
                start_index,
                end_index: indices.len() as u32,
            });
        }

        RenderMesh {
            vertices,
            normals,
            indices,
            face_ranges,
        }
    }
}

impl Default for MockKernel {
    fn default() -> Self {
        Self::new()
    }
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn length(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

impl Kernel for MockKernel {
    fn tessellate(
        &self,
        solid: &KernelSolidHandle,
        _tolerance: f64,
    ) -> Result<RenderMesh, KernelError> {
        self.tessellations.fetch_add(1, Ordering::SeqCst);
        let s = self.get(solid)?;
        if s.faces.is_empty() {
            return Err(KernelError::TessellationFailed {
                reason: "solid has no faces".to_string(),
            });
        }
        Ok(Self::tessellate_faces(&s))
    }
}

impl KernelIntrospect for MockKernel {
    fn list_faces(&self, solid: &KernelSolidHandle) -> Result<Vec<KernelId>, KernelError> {
        Ok(self.get(solid)?.faces.iter().map(|f| f.id).collect())
    }

    fn list_edges(&self, solid: &KernelSolidHandle) -> Result<Vec<KernelId>, KernelError> {
        Ok(self.get(solid)?.edges.iter().map(|e| e.id).collect())
    }

    fn list_vertices(&self, solid: &KernelSolidHandle) -> Result<Vec<KernelId>, KernelError> {
        Ok(self.get(solid)?.vertices.iter().map(|v| v.id).collect())
    }

    fn entity_properties(
        &self,
        solid: &KernelSolidHandle,
        entity: KernelId,
        kind: TopoKind,
    ) -> Result<EntityProperties, KernelError> {
        let s = self.get(solid)?;
        let not_found = KernelError::EntityNotFound { id: entity };
        match kind {
            TopoKind::Face => {
                let f = s.faces.iter().find(|f| f.id == entity).ok_or(not_found)?;
                Ok(EntityProperties::Face {
                    area: f.area(),
                    centroid: f.centroid(),
                    normal: f.normal,
                })
            }
            TopoKind::Edge => {
                let e = s.edges.iter().find(|e| e.id == entity).ok_or(not_found)?;
                Ok(EntityProperties::Edge {
                    length: length(sub(e.end, e.start)),
                    start: e.start,
                    end: e.end,
                })
            }
            TopoKind::Vertex => {
                let v = s
                    .vertices
                    .iter()
                    .find(|v| v.id == entity)
                    .ok_or(not_found)?;
                Ok(EntityProperties::Vertex {
                    position: v.position,
                })
            }
        }
    }
}
