//! Per-triangle geometric quantities entering the element matrices.

use crate::{
  error::AssemblyError,
  mesh::{FaceIdx, SurfaceMesh},
};

use rayon::prelude::*;

/// The geometry of a single triangle $(p_1, p_2, p_3)$, expressed through the
/// edge vectors $e_1 = p_2 - p_1$ and $e_2 = p_3 - p_1$.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleGeometry {
  /// $|e_2|^2$
  pub a0: f64,
  /// $|e_1|^2$
  pub a1: f64,
  /// $e_1 dot e_2$
  pub a0110: f64,
  /// $|e_1 times e_2|$, twice the area of the triangle.
  pub vol: f64,
}

impl TriangleGeometry {
  pub fn from_vertices(
    p1: &na::Vector3<f64>,
    p2: &na::Vector3<f64>,
    p3: &na::Vector3<f64>,
  ) -> Self {
    let e1 = p2 - p1;
    let e2 = p3 - p1;
    Self {
      a0: e2.norm_squared(),
      a1: e1.norm_squared(),
      a0110: e1.dot(&e2),
      vol: e1.cross(&e2).norm(),
    }
  }

  pub fn area(&self) -> f64 {
    0.5 * self.vol
  }

  pub fn is_degenerate(&self) -> bool {
    self.vol == 0.0
  }
}

/// How triangles of zero area are treated during assembly.
///
/// A zero `vol` would divide by zero in the stiffness block, so it must be
/// replaced or the triangle must be left out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DegeneratePolicy {
  /// Use the mean `vol` over all triangles of the mesh, degenerate ones
  /// included, for both the stiffness and the mass block.
  #[default]
  MeanVolume,
  /// Fail with [`AssemblyError::DegenerateTriangle`].
  Reject,
  /// Leave the triangle out of both matrices.
  Skip,
}

/// Computes the geometry of every face and resolves degenerate triangles.
///
/// Entry `i` belongs to face `i`. It is `None` only for faces dropped by
/// [`DegeneratePolicy::Skip`].
pub fn mesh_geometries(
  mesh: &SurfaceMesh,
  policy: DegeneratePolicy,
) -> Result<Vec<Option<TriangleGeometry>>, AssemblyError> {
  let geometries: Vec<TriangleGeometry> = (0..mesh.nfaces())
    .into_par_iter()
    .map(|iface| {
      let [p1, p2, p3] = mesh.triangle(iface);
      TriangleGeometry::from_vertices(p1, p2, p3)
    })
    .collect();

  let degenerate: Vec<FaceIdx> = geometries
    .iter()
    .enumerate()
    .filter_map(|(iface, geo)| geo.is_degenerate().then_some(iface))
    .collect();

  if degenerate.is_empty() {
    return Ok(geometries.into_iter().map(Some).collect());
  }

  match policy {
    DegeneratePolicy::Reject => Err(AssemblyError::DegenerateTriangle {
      face: degenerate[0],
    }),
    DegeneratePolicy::Skip => {
      tracing::warn!(
        "skipping {} degenerate triangle(s), first is face {}",
        degenerate.len(),
        degenerate[0]
      );
      Ok(
        geometries
          .into_iter()
          .map(|geo| (!geo.is_degenerate()).then_some(geo))
          .collect(),
      )
    }
    DegeneratePolicy::MeanVolume => {
      let vol_mean = geometries.iter().map(|geo| geo.vol).sum::<f64>() / geometries.len() as f64;
      if vol_mean == 0.0 {
        return Err(AssemblyError::DegenerateMesh);
      }
      tracing::warn!(
        "substituting mean volume {vol_mean:e} for {} degenerate triangle(s), first is face {}",
        degenerate.len(),
        degenerate[0]
      );
      Ok(
        geometries
          .into_iter()
          .map(|mut geo| {
            if geo.is_degenerate() {
              geo.vol = vol_mean;
            }
            Some(geo)
          })
          .collect(),
      )
    }
  }
}
