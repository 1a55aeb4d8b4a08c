//! Assembly of the global Galerkin matrices from triangle-local element matrices.

use crate::{
  error::AssemblyError,
  fe::{self, ElmatProvider},
  geometry::{self, DegeneratePolicy, TriangleGeometry},
  mesh::{SurfaceMesh, Triangle},
  sparse::SparseMatrix,
};

use itertools::iproduct;
use rayon::prelude::*;

pub type GalMat = nas::CsrMatrix<f64>;

/// Assembly algorithm for the Galerkin Matrix.
///
/// Entry `(r, c)` of the element matrix of face `[i, j, k]` is added to the
/// global entry `(face[r], face[c])`. Faces without geometry contribute
/// nothing. The element matrices are evaluated in parallel, but the triplets
/// are concatenated in face order, so the result is deterministic.
pub fn assemble_galmat(
  mesh: &SurfaceMesh,
  geometries: &[Option<TriangleGeometry>],
  elmat: impl ElmatProvider,
) -> SparseMatrix {
  assert_eq!(geometries.len(), mesh.nfaces());
  let nvertices = mesh.nvertices();

  let local_triplets: Vec<Vec<(usize, usize, f64)>> = mesh
    .faces()
    .par_iter()
    .zip(geometries.par_iter())
    .map(|(face, geo)| {
      let Some(geo) = geo else {
        return Vec::new();
      };
      let elmat = elmat.eval(geo);

      iproduct!(0..3, 0..3)
        .filter_map(|(ilocal, jlocal)| {
          let val = elmat[(ilocal, jlocal)];
          (val != 0.0).then_some((face[ilocal], face[jlocal], val))
        })
        .collect()
    })
    .collect();

  let triplets = local_triplets.into_iter().flatten().collect();
  SparseMatrix::new(nvertices, nvertices, triplets)
}

/// Computes the stiffness matrix `A` and the mass matrix `B` of the linear
/// FEM discretization of the Laplace-Beltrami operator.
///
/// Both matrices are `N x N` with `N = points.len()`. Zero-area triangles are
/// treated with [`DegeneratePolicy::MeanVolume`].
pub fn compute_ab(
  points: &[[f64; 3]],
  faces: &[Triangle],
) -> Result<(GalMat, GalMat), AssemblyError> {
  let mesh = SurfaceMesh::from_slices(points, faces)?;
  compute_ab_with(&mesh, DegeneratePolicy::default())
}

pub fn compute_ab_with(
  mesh: &SurfaceMesh,
  policy: DegeneratePolicy,
) -> Result<(GalMat, GalMat), AssemblyError> {
  let geometries = geometry::mesh_geometries(mesh, policy)?;

  let uncovered = mesh.uncovered_vertices();
  if !uncovered.is_empty() {
    tracing::warn!(
      "{} vertices are not part of any face, first is vertex {}; the mass matrix will be singular",
      uncovered.len(),
      uncovered[0]
    );
  }

  let stiffness = assemble_galmat(mesh, &geometries, fe::LaplaceBeltramiElmat);
  let mass = assemble_galmat(mesh, &geometries, fe::MassElmat);
  tracing::debug!(
    "assembled {} faces into {}x{} galmats ({} stiffness, {} mass triplets)",
    mesh.nfaces(),
    stiffness.nrows(),
    stiffness.ncols(),
    stiffness.ntriplets(),
    mass.ntriplets(),
  );

  Ok((stiffness.to_nalgebra_csr(), mass.to_nalgebra_csr()))
}
