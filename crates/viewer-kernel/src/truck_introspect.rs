//! KernelIntrospect implementation wrapping truck topology queries.
//!
//! Entity ids are positions within their kind: faces in `face_iter` order
//! (matching the tessellation's face ranges), edges and vertices in first-seen
//! order after deduplicating the shared boundaries of adjacent faces.

use std::collections::HashSet;

use truck_meshalgo::prelude::*;
use truck_modeling::geometry::Surface;
use truck_modeling::topology::{Edge, Face, Solid, Vertex};
use truck_modeling::{BoundedCurve, ParameterDivision1D};

use crate::tessellation;
use crate::traits::KernelIntrospect;
use crate::truck_kernel::TruckKernel;
use crate::types::*;

impl KernelIntrospect for TruckKernel {
    fn list_faces(&self, solid: &KernelSolidHandle) -> Result<Vec<KernelId>, KernelError> {
        let truck_solid = self.require_solid(solid)?;
        Ok(indexed(collect_faces(&truck_solid).len()))
    }

    fn list_edges(&self, solid: &KernelSolidHandle) -> Result<Vec<KernelId>, KernelError> {
        let truck_solid = self.require_solid(solid)?;
        Ok(indexed(collect_edges(&truck_solid).len()))
    }

    fn list_vertices(&self, solid: &KernelSolidHandle) -> Result<Vec<KernelId>, KernelError> {
        let truck_solid = self.require_solid(solid)?;
        Ok(indexed(collect_vertices(&truck_solid).len()))
    }

    fn entity_properties(
        &self,
        solid: &KernelSolidHandle,
        entity: KernelId,
        kind: TopoKind,
    ) -> Result<EntityProperties, KernelError> {
        let truck_solid = self.require_solid(solid)?;
        let index = entity.0 as usize;
        let not_found = KernelError::EntityNotFound { id: entity };

        match kind {
            TopoKind::Face => {
                let faces = collect_faces(&truck_solid);
                let face = faces.get(index).ok_or(not_found)?;
                face_properties(&truck_solid, face, index, self.introspection_tolerance())
            }
            TopoKind::Edge => {
                let edges = collect_edges(&truck_solid);
                let edge = edges.get(index).ok_or(not_found)?;
                Ok(edge_properties(edge, self.introspection_tolerance()))
            }
            TopoKind::Vertex => {
                let vertices = collect_vertices(&truck_solid);
                let vertex = vertices.get(index).ok_or(not_found)?;
                Ok(vertex_properties(vertex))
            }
        }
    }
}

fn indexed(count: usize) -> Vec<KernelId> {
    (0..count as u64).map(KernelId).collect()
}

fn collect_faces(solid: &Solid) -> Vec<Face> {
    solid
        .boundaries()
        .iter()
        .flat_map(|shell| shell.face_iter().cloned())
        .collect()
}

fn collect_edges(solid: &Solid) -> Vec<Edge> {
    let mut seen = HashSet::new();
    let mut edges = Vec::new();
    for shell in solid.boundaries().iter() {
        for edge in shell.edge_iter() {
            if seen.insert(edge.id()) {
                edges.push(edge.clone());
            }
        }
    }
    edges
}

fn collect_vertices(solid: &Solid) -> Vec<Vertex> {
    let mut seen = HashSet::new();
    let mut vertices = Vec::new();
    for shell in solid.boundaries().iter() {
        for v in shell.vertex_iter() {
            if seen.insert(v.id()) {
                vertices.push(v.clone());
            }
        }
    }
    vertices
}

/// Area, area-weighted centroid and outward normal of one face, integrated
/// over its triangulation.
fn face_properties(
    solid: &Solid,
    face: &Face,
    index: usize,
    tolerance: f64,
) -> Result<EntityProperties, KernelError> {
    let meshes = tessellation::meshed_faces(solid, tolerance);
    let mesh = meshes
        .get(index)
        .and_then(|m| m.as_ref())
        .ok_or_else(|| KernelError::TessellationFailed {
            reason: format!("face {index} could not be meshed"),
        })?;

    let positions = mesh.positions();
    let mut area = 0.0;
    let mut weighted = [0.0; 3];
    let mut normal_sum = [0.0; 3];
    let mut largest = (0.0, [0.0; 3]);

    for tri in mesh.tri_faces() {
        let a = to_array(positions[tri[0].pos]);
        let b = to_array(positions[tri[1].pos]);
        let c = to_array(positions[tri[2].pos]);
        let n = cross(sub(b, a), sub(c, a));
        let tri_area = 0.5 * norm(n);

        area += tri_area;
        if tri_area > largest.0 {
            largest = (tri_area, n);
        }
        for i in 0..3 {
            weighted[i] += tri_area * (a[i] + b[i] + c[i]) / 3.0;
            normal_sum[i] += n[i];
        }
    }

    if area <= 0.0 {
        return Err(KernelError::TessellationFailed {
            reason: format!("face {index} has zero area"),
        });
    }

    let centroid = weighted.map(|w| w / area);
    let normal = match face.oriented_surface() {
        Surface::Plane(plane) => {
            let n = plane.normal();
            [n[0], n[1], n[2]]
        }
        // Normals of a closed or nearly closed patch cancel out; fall back to
        // the largest triangle's.
        _ if norm(normal_sum) < 1e-9 * area => normalize(largest.1),
        _ => normalize(normal_sum),
    };

    Ok(EntityProperties::Face {
        area,
        centroid,
        normal,
    })
}

fn edge_properties(edge: &Edge, tolerance: f64) -> EntityProperties {
    let curve = edge.oriented_curve();
    let range = curve.range_tuple();
    let (_params, points) = curve.parameter_division(range, tolerance);

    let length = points
        .windows(2)
        .map(|w| norm(sub(to_array(w[1]), to_array(w[0]))))
        .sum();

    EntityProperties::Edge {
        length,
        start: to_array(edge.front().point()),
        end: to_array(edge.back().point()),
    }
}

fn vertex_properties(vertex: &Vertex) -> EntityProperties {
    EntityProperties::Vertex {
        position: to_array(vertex.point()),
    }
}

fn to_array(p: Point3) -> [f64; 3] {
    [p[0], p[1], p[2]]
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

fn norm(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

fn normalize(v: [f64; 3]) -> [f64; 3] {
    let n = norm(v);
    if n < 1e-12 {
        return [0.0, 0.0, 0.0];
    }
    v.map(|c| c / n)
}
