//! Tessellation wrapper with face-range metadata.
//!
//! Wraps truck-meshalgo to produce RenderMesh with FaceRange entries
//! that map triangle index ranges to logical faces for picking.

use crate::types::*;
use truck_meshalgo::prelude::*;
use truck_meshalgo::tessellation::MeshableShape;

type TruckSolid = truck_modeling::Solid;

/// Triangulated faces of a solid, in `face_iter` order, already flipped to
/// match each face's orientation. `None` marks a face truck could not mesh.
pub(crate) fn meshed_faces(solid: &TruckSolid, tolerance: f64) -> Vec<Option<PolygonMesh>> {
    let meshed_solid = solid.triangulation(tolerance);

    let mut faces = Vec::new();
    for shell in meshed_solid.boundaries().iter() {
        for face in shell.face_iter() {
            let maybe_mesh: Option<PolygonMesh> = face.surface();
            // If face is inverted, the mesh needs inversion too
            let oriented = maybe_mesh.map(|mut m| {
                if !face.orientation() {
                    m.invert();
                }
                m
            });
            faces.push(oriented);
        }
    }
    faces
}

/// Tessellate a truck Solid into a RenderMesh with per-face tracking.
///
/// Every face gets a range, even one that produced no triangles, so the
/// position of a range always equals the face index reported by
/// introspection. A solid that yields no triangles at all is an error.
pub fn tessellate_solid(
    solid: &TruckSolid,
    tolerance: f64,
) -> std::result::Result<RenderMesh, KernelError> {
    if tolerance.is_nan() || tolerance <= 0.0 {
        return Err(KernelError::TessellationFailed {
            reason: format!("tolerance must be positive, got {tolerance}"),
        });
    }

    let mut all_vertices: Vec<f32> = Vec::new();
    let mut all_normals: Vec<f32> = Vec::new();
    let mut all_indices: Vec<u32> = Vec::new();
    let mut face_ranges: Vec<FaceRange> = Vec::new();

    for (i, maybe_mesh) in meshed_faces(solid, tolerance).into_iter().enumerate() {
        let face_id = KernelId(i as u64);
        let start_index = all_indices.len() as u32;

        if let Some(face_mesh) = maybe_mesh {
            let base_vertex = (all_vertices.len() / 3) as u32;

            let positions = face_mesh.positions();
            let normals = face_mesh.normals();

            for pos in positions {
                all_vertices.push(pos[0] as f32);
                all_vertices.push(pos[1] as f32);
                all_vertices.push(pos[2] as f32);
            }

            // Normals are indexed separately from positions in truck meshes;
            // only trust them when they line up one-to-one.
            if normals.len() == positions.len() {
                for norm in normals {
                    all_normals.push(norm[0] as f32);
                    all_normals.push(norm[1] as f32);
                    all_normals.push(norm[2] as f32);
                }
            } else {
                for _ in 0..positions.len() {
                    all_normals.extend_from_slice(&[0.0, 0.0, 1.0]);
                }
            }

            for tri in face_mesh.tri_faces() {
                for v in tri.iter() {
                    all_indices.push(v.pos as u32 + base_vertex);
                }
            }
        }

        face_ranges.push(FaceRange {
            face_id,
            start_index,
            end_index: all_indices.len() as u32,
        });
    }

    if all_indices.is_empty() {
        return Err(KernelError::TessellationFailed {
            reason: format!(
                "solid with {} face(s) produced no triangles",
                face_ranges.len()
            ),
        });
    }

    Ok(RenderMesh {
        vertices: all_vertices,
        normals: all_normals,
        indices: all_indices,
        face_ranges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives;

    #[test]
    fn test_box_has_one_range_per_face() {
        let solid = primitives::make_box(1.0, 2.0, 3.0);
        let mesh = tessellate_solid(&solid, 0.1).unwrap();

        assert_eq!(mesh.face_ranges.len(), 6);
        for (i, range) in mesh.face_ranges.iter().enumerate() {
            assert_eq!(range.face_id, KernelId(i as u64));
            assert!(range.triangle_count() >= 2, "box faces are at least a quad");
        }
    }

    #[test]
    fn test_ranges_are_contiguous_and_cover_indices() {
        let solid = primitives::make_box(1.0, 1.0, 1.0);
        let mesh = tessellate_solid(&solid, 0.1).unwrap();

        let mut expected_start = 0;
        for range in &mesh.face_ranges {
            assert_eq!(range.start_index, expected_start);
            expected_start = range.end_index;
        }
        assert_eq!(expected_start as usize, mesh.indices.len());
        assert_eq!(mesh.vertices.len(), mesh.normals.len());
    }

    #[test]
    fn test_rejects_non_positive_tolerance() {
        let solid = primitives::make_box(1.0, 1.0, 1.0);
        let err = tessellate_solid(&solid, 0.0).unwrap_err();
        assert!(matches!(err, KernelError::TessellationFailed { .. }));
    }

    #[test]
    fn test_tessellation_is_deterministic() {
        let solid = primitives::make_box(2.0, 1.0, 0.5);
        let a = tessellate_solid(&solid, 0.05).unwrap();
        let b = tessellate_solid(&solid, 0.05).unwrap();
        assert_eq!(a, b);
    }
}
