//! Content fingerprints of tessellated geometry.

use viewer_kernel::RenderMesh;
use viewer_types::ContentHash;
use xxhash_rust::xxh3::Xxh3;

/// Hash the renderable content of a mesh with xxh3.
///
/// Covers positions, triangle indices and the face partition, so two
/// meshes hash equal exactly when they export to the same bytes. Kernel
/// face ids are left out: they name entities, not geometry.
pub fn content_hash(mesh: &RenderMesh) -> ContentHash {
    let mut hasher = Xxh3::new();

    hasher.update(&(mesh.vertices.len() as u64).to_le_bytes());
    for v in &mesh.vertices {
        hasher.update(&v.to_le_bytes());
    }

    hasher.update(&(mesh.indices.len() as u64).to_le_bytes());
    for i in &mesh.indices {
        hasher.update(&i.to_le_bytes());
    }

    hasher.update(&(mesh.face_ranges.len() as u64).to_le_bytes());
    for range in &mesh.face_ranges {
        hasher.update(&range.start_index.to_le_bytes());
        hasher.update(&range.end_index.to_le_bytes());
    }

    ContentHash(hasher.digest())
}
