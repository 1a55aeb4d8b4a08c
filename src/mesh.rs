//! A triangulated surface embedded in 3-D space.
//!
//! The mesh is the pair of raw vertex coordinates and the faces indexing them.
//! The position of a vertex in the coordinate list is its global index, which
//! is also the row/column of the vertex in every assembled Galerkin matrix.
//! Manifoldness and consistent orientation are not checked, only the
//! properties without which assembly itself would be ill-defined.

use crate::error::MeshError;

pub type VertexIdx = usize;
pub type FaceIdx = usize;

/// The vertices of a triangle, in the order defining its orientation.
pub type Triangle = [VertexIdx; 3];

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMesh {
  points: Vec<na::Vector3<f64>>,
  faces: Vec<Triangle>,
}

// constructors
impl SurfaceMesh {
  /// Validates that every face indexes an existing vertex and that all
  /// coordinates are finite.
  pub fn new(points: Vec<na::Vector3<f64>>, faces: Vec<Triangle>) -> Result<Self, MeshError> {
    if faces.is_empty() {
      return Err(MeshError::NoFaces);
    }

    if let Some(vertex) = points.iter().position(|p| !p.iter().all(|x| x.is_finite())) {
      return Err(MeshError::NonFiniteCoordinate { vertex });
    }

    let nvertices = points.len();
    for (face, triangle) in faces.iter().enumerate() {
      if let Some(&vertex) = triangle.iter().find(|&&v| v >= nvertices) {
        return Err(MeshError::VertexOutOfRange {
          face,
          vertex,
          nvertices,
        });
      }
    }

    Ok(Self { points, faces })
  }

  pub fn from_slices(points: &[[f64; 3]], faces: &[Triangle]) -> Result<Self, MeshError> {
    let points = points.iter().map(|&p| na::Vector3::from(p)).collect();
    Self::new(points, faces.to_vec())
  }
}

// getters
impl SurfaceMesh {
  pub fn nvertices(&self) -> usize {
    self.points.len()
  }
  pub fn nfaces(&self) -> usize {
    self.faces.len()
  }
  pub fn faces(&self) -> &[Triangle] {
    &self.faces
  }

  /// The coordinates of the three vertices of a face.
  pub fn triangle(&self, iface: FaceIdx) -> [&na::Vector3<f64>; 3] {
    self.faces[iface].map(|ivertex| &self.points[ivertex])
  }

  /// Sum of the areas of all faces.
  pub fn total_area(&self) -> f64 {
    (0..self.nfaces())
      .map(|iface| {
        let [p0, p1, p2] = self.triangle(iface);
        0.5 * (p1 - p0).cross(&(p2 - p0)).norm()
      })
      .sum()
  }

  /// Vertices not referenced by any face.
  ///
  /// Such vertices get an all-zero row in the mass matrix, which makes the
  /// generalized eigenvalue problem singular.
  pub fn uncovered_vertices(&self) -> Vec<VertexIdx> {
    let mut covered = vec![false; self.nvertices()];
    self
      .faces
      .iter()
      .flatten()
      .for_each(|&ivertex| covered[ivertex] = true);
    covered
      .iter()
      .enumerate()
      .filter_map(|(ivertex, &flag)| (!flag).then_some(ivertex))
      .collect()
  }
}
