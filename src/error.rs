//! Error types for mesh validation, matrix assembly and spectrum computation.

use crate::mesh::{FaceIdx, VertexIdx};

use thiserror::Error;

/// Input-shape violations, detected before any matrix work.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
  #[error("mesh has no faces")]
  NoFaces,

  #[error("face {face} references vertex {vertex}, but the mesh has only {nvertices} vertices")]
  VertexOutOfRange {
    face: FaceIdx,
    vertex: VertexIdx,
    nvertices: usize,
  },

  #[error("vertex {vertex} has a non-finite coordinate")]
  NonFiniteCoordinate { vertex: VertexIdx },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssemblyError {
  #[error(transparent)]
  Mesh(#[from] MeshError),

  /// Raised under [`DegeneratePolicy::Reject`](crate::geometry::DegeneratePolicy::Reject).
  #[error("face {face} has zero area")]
  DegenerateTriangle { face: FaceIdx },

  /// Every triangle has zero area, so there is no volume to substitute.
  #[error("all triangles of the mesh have zero area")]
  DegenerateMesh,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpectrumError {
  #[error(transparent)]
  Assembly(#[from] AssemblyError),

  /// The mass matrix has a vanishing diagonal entry, typically because the
  /// vertex is not covered by any non-degenerate face.
  #[error("mass matrix is not positive definite: vertex {vertex} carries no mass")]
  MassNotPositiveDefinite { vertex: VertexIdx },

  /// Cholesky factorization failed although every diagonal entry was
  /// positive; the argument names the factorized matrix.
  #[error("cholesky factorization of the {0} failed")]
  Factorization(&'static str),

  #[error(
    "eigensolver did not converge after {iterations} iterations \
     ({nconverged} of {nrequested} eigenvalues converged)"
  )]
  NonConvergence {
    iterations: usize,
    nconverged: usize,
    nrequested: usize,
  },

  #[error("invalid solver configuration: {0}")]
  InvalidConfig(String),
}

impl From<MeshError> for SpectrumError {
  fn from(err: MeshError) -> Self {
    Self::Assembly(AssemblyError::Mesh(err))
  }
}
