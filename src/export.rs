//! Binary STL export

use crate::error::{Error, Result};
use crate::mesh::Mesh;
use stl_io::{Normal, Triangle, Vertex};

/// Size of the fixed header plus the triangle count
const STL_PREAMBLE: usize = 84;

/// Bytes per triangle record
const STL_TRIANGLE: usize = 50;

/// Serialize `mesh` as a binary STL. Each face gets the unit normal of its
/// winding; degenerate faces get a zero normal.
pub fn to_stl(mesh: &Mesh) -> Result<Vec<u8>> {
    let triangles = (0..mesh.triangle_count())
        .map(|i| {
            let corners = mesh.corners(i).ok_or_else(|| {
                Error::Export(format!(
                    "face {i} references a vertex outside 0..{}",
                    mesh.vertex_count()
                ))
            })?;
            Ok(Triangle {
                normal: Normal::new(face_normal(&corners)),
                vertices: corners.map(Vertex::new),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut buf = Vec::with_capacity(STL_PREAMBLE + STL_TRIANGLE * triangles.len());
    stl_io::write_stl(&mut buf, triangles.iter()).map_err(|e| Error::Export(e.to_string()))?;
    Ok(buf)
}

fn face_normal([a, b, c]: &[[f32; 3]; 3]) -> [f32; 3] {
    let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let n = [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ];
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if len > f32::EPSILON && len.is_finite() {
        [n[0] / len, n[1] / len, n[2] / len]
    } else {
        [0.0; 3]
    }
}
