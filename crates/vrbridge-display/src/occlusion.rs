//! Hidden-area mesh indexing.
//!
//! The runtime hands out each eye's hidden area as a flat triangle list in
//! which shared corners are simply repeated. The host wants an indexed mesh,
//! so near-identical vertices are folded together here.

use vrbridge_math::Vector2;
use vrbridge_vr::HiddenAreaMesh;

/// Vertices closer than this (squared distance) are the same vertex.
pub const WELD_DISTANCE_SQ: f32 = 1e-9;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OcclusionMesh {
    pub vertices: Vec<Vector2>,
    pub indices: Vec<u32>,
}

impl OcclusionMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Index a triangle soup.
///
/// Each input vertex reuses the index already given to the first earlier
/// input vertex within [`WELD_DISTANCE_SQ`], otherwise it becomes a new
/// vertex. Unique vertices keep their input order. Returns `None` for an
/// empty soup: the eye simply has no hidden area.
///
/// Quadratic in the vertex count; hidden-area meshes are a few hundred
/// vertices at most.
pub fn build_occlusion_mesh(soup: &[Vector2]) -> Option<OcclusionMesh> {
    if soup.is_empty() {
        return None;
    }

    let mut mesh = OcclusionMesh {
        vertices: Vec::new(),
        indices: Vec::with_capacity(soup.len()),
    };
    for (i, &v) in soup.iter().enumerate() {
        let earlier = soup[..i]
            .iter()
            .position(|&u| (u - v).sqr_magnitude() < WELD_DISTANCE_SQ);
        let index = match earlier {
            Some(j) => mesh.indices[j],
            None => {
                mesh.vertices.push(v);
                (mesh.vertices.len() - 1) as u32
            }
        };
        mesh.indices.push(index);
    }
    Some(mesh)
}

/// Index the runtime's mesh, trimming any trailing partial triangle.
pub fn from_hidden_area(mesh: &HiddenAreaMesh) -> Option<OcclusionMesh> {
    let len = (mesh.triangle_count as usize * 3).min(mesh.vertices.len());
    build_occlusion_mesh(&mesh.vertices[..len - len % 3])
}
