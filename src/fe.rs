//! Element matrices of linear Lagrangian finite elements on triangles.
//!
//! Every element matrix is a linear combination of constant matrices defined
//! on the reference triangle, weighted by the [`TriangleGeometry`] of the
//! actual triangle.

use crate::geometry::TriangleGeometry;

pub type ElMat = na::Matrix3<f64>;

pub trait ElmatProvider: Sync {
  fn eval(&self, geometry: &TriangleGeometry) -> ElMat;
}

impl<F> ElmatProvider for F
where
  F: Fn(&TriangleGeometry) -> ElMat + Sync,
{
  fn eval(&self, geometry: &TriangleGeometry) -> ElMat {
    self(geometry)
  }
}

/// Reference mass matrix $(bb(1) + I) / 24$.
pub fn ref_mass() -> ElMat {
  (ElMat::repeat(1.0) + ElMat::identity()) / 24.0
}

/// Reference stiffness contribution weighted by $|e_2|^2$.
#[rustfmt::skip]
pub fn ref_stiffness_a00() -> ElMat {
  ElMat::new(
     0.5, -0.5, 0.0,
    -0.5,  0.5, 0.0,
     0.0,  0.0, 0.0,
  )
}

/// Reference stiffness contribution weighted by $|e_1|^2$.
#[rustfmt::skip]
pub fn ref_stiffness_a11() -> ElMat {
  ElMat::new(
     0.5, 0.0, -0.5,
     0.0, 0.0,  0.0,
    -0.5, 0.0,  0.5,
  )
}

/// Reference stiffness contribution weighted by $e_1 dot e_2$.
#[rustfmt::skip]
pub fn ref_stiffness_a0110() -> ElMat {
  ElMat::new(
     1.0, -0.5, -0.5,
    -0.5,  0.0,  0.5,
    -0.5,  0.5,  0.0,
  )
}

/// Exact Element Matrix Provider for the Laplace-Beltrami operator.
///
/// $A_K = 1/"vol" (a_0 A_00 + a_1 A_11 - a_0110 A_0110)$
pub struct LaplaceBeltramiElmat;
impl ElmatProvider for LaplaceBeltramiElmat {
  fn eval(&self, geo: &TriangleGeometry) -> ElMat {
    geo.vol.recip()
      * (geo.a0 * ref_stiffness_a00() + geo.a1 * ref_stiffness_a11()
        - geo.a0110 * ref_stiffness_a0110())
  }
}

/// Exact Element Matrix Provider for the mass bilinear form.
///
/// The entries sum up to the area of the triangle.
pub struct MassElmat;
impl ElmatProvider for MassElmat {
  fn eval(&self, geo: &TriangleGeometry) -> ElMat {
    geo.vol * ref_mass()
  }
}
