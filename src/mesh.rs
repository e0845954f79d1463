//! The triangle mesh produced by a generator

use serde::{Deserialize, Serialize};

/// An indexed triangle mesh. Faces index into `vertices` and are wound
/// counter-clockwise when seen from outside the surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<[f32; 3]>,
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn new(vertices: Vec<[f32; 3]>, faces: Vec<[u32; 3]>) -> Self {
        Mesh { vertices, faces }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }

    /// The corners of face `i`, or `None` if it points past the vertex list
    pub fn corners(&self, i: usize) -> Option<[[f32; 3]; 3]> {
        let [a, b, c] = *self.faces.get(i)?;
        Some([
            *self.vertices.get(a as usize)?,
            *self.vertices.get(b as usize)?,
            *self.vertices.get(c as usize)?,
        ])
    }
}
