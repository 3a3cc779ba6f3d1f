//! Binary STL encoding of render meshes.
//!
//! Layout:
//! - 80 bytes: header
//! - 4 bytes: u32 LE triangle count
//! - Per triangle (50 bytes each):
//!   - 12 bytes: normal vector (3 × f32 LE)
//!   - 36 bytes: 3 vertices (3 × 3 × f32 LE)
//!   - 2 bytes: attribute word, carrying the index of the owning face
//!
//! Viewers use the attribute word to map a picked triangle straight to a
//! face index. Faces past `u16::MAX - 1` are written as `u16::MAX`.

use bytes::{BufMut, Bytes, BytesMut};
use viewer_kernel::RenderMesh;

pub const HEADER_LEN: usize = 80;
pub const TRIANGLE_LEN: usize = 50;
pub const NO_FACE: u16 = u16::MAX;

const HEADER: &[u8] = b"cad viewer binary STL";

/// Reasons a mesh cannot be written as STL.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StlError {
    #[error("index buffer length {len} is not a multiple of 3")]
    RaggedIndices { len: usize },

    #[error("triangle {triangle} references vertex {vertex} but mesh has {count}")]
    VertexOutOfRange {
        triangle: usize,
        vertex: usize,
        count: usize,
    },

    #[error("mesh has {count} triangles, more than binary STL can count")]
    TooManyTriangles { count: usize },
}

/// Encode a mesh as binary STL.
pub fn encode(mesh: &RenderMesh) -> Result<Bytes, StlError> {
    if mesh.indices.len() % 3 != 0 {
        return Err(StlError::RaggedIndices {
            len: mesh.indices.len(),
        });
    }
    let tri_count = mesh.triangle_count();
    let count = u32::try_from(tri_count).map_err(|_| StlError::TooManyTriangles { count: tri_count })?;
    let vertex_count = mesh.vertices.len() / 3;

    let mut buf = BytesMut::with_capacity(HEADER_LEN + 4 + tri_count * TRIANGLE_LEN);
    buf.put_slice(HEADER);
    buf.put_bytes(0, HEADER_LEN - HEADER.len());
    buf.put_u32_le(count);

    let attributes = face_attributes(mesh);

    for (t, tri) in mesh.indices.chunks_exact(3).enumerate() {
        let mut corners = [[0f32; 3]; 3];
        for (corner, &index) in corners.iter_mut().zip(tri) {
            let i = index as usize;
            if i >= vertex_count {
                return Err(StlError::VertexOutOfRange {
                    triangle: t,
                    vertex: i,
                    count: vertex_count,
                });
            }
            corner.copy_from_slice(&mesh.vertices[i * 3..i * 3 + 3]);
        }

        for c in facet_normal(&corners) {
            buf.put_f32_le(c);
        }
        for corner in &corners {
            for &c in corner {
                buf.put_f32_le(c);
            }
        }
        buf.put_u16_le(attributes[t]);
    }

    Ok(buf.freeze())
}

/// Per-triangle face index, clamped to the attribute word.
fn face_attributes(mesh: &RenderMesh) -> Vec<u16> {
    let mut attributes = vec![NO_FACE; mesh.triangle_count()];
    for (face, range) in mesh.face_ranges.iter().enumerate() {
        let word = u16::try_from(face).unwrap_or(NO_FACE);
        let start = range.start_index as usize / 3;
        let end = (range.end_index as usize / 3).min(attributes.len());
        for slot in attributes.iter_mut().take(end).skip(start) {
            *slot = word;
        }
    }
    attributes
}

/// Unit normal from the winding, or zero for a degenerate triangle.
fn facet_normal(v: &[[f32; 3]; 3]) -> [f32; 3] {
    let e1 = [v[1][0] - v[0][0], v[1][1] - v[0][1], v[1][2] - v[0][2]];
    let e2 = [v[2][0] - v[0][0], v[2][1] - v[0][1], v[2][2] - v[0][2]];
    let n = [
        e1[1] * e2[2] - e1[2] * e2[1],
        e1[2] * e2[0] - e1[0] * e2[2],
        e1[0] * e2[1] - e1[1] * e2[0],
    ];
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if len > 1e-12 {
        [n[0] / len, n[1] / len, n[2] / len]
    } else {
        [0.0, 0.0, 0.0]
    }
}

/// Triangle count from an encoded payload's header.
pub fn triangle_count(payload: &[u8]) -> Option<u32> {
    let bytes = payload.get(HEADER_LEN..HEADER_LEN + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Attribute word of triangle `t` in an encoded payload.
pub fn triangle_attribute(payload: &[u8], t: usize) -> Option<u16> {
    let end = HEADER_LEN + 4 + (t + 1) * TRIANGLE_LEN;
    let bytes = payload.get(end - 2..end)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}
