//! Generalized Eigenvalue Problem of the Laplace-Beltrami operator.
//!
//! The spectrum consists of the eigenvalues $lambda$ of $A v = lambda B v$,
//! with $A$ the stiffness and $B$ the mass matrix.

use crate::{
  assemble::{self, GalMat},
  error::SpectrumError,
  geometry::DegeneratePolicy,
  mesh::{SurfaceMesh, Triangle},
  sparse::{FaerCholesky, SparseMatrix},
};

use itertools::Itertools;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Returned instead of a spectrum for meshes with too few vertices.
pub const INSUFFICIENT_GEOMETRY: [f64; 5] = [-1.0; 5];

#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumConfig {
  /// Number of eigenvalues of smallest magnitude to compute.
  pub neigen: usize,
  /// Meshes with fewer vertices yield [`INSUFFICIENT_GEOMETRY`].
  pub min_vertices: usize,
  pub degenerate_policy: DegeneratePolicy,
}
impl Default for SpectrumConfig {
  fn default() -> Self {
    Self {
      neigen: 3,
      min_vertices: 5,
      degenerate_policy: DegeneratePolicy::default(),
    }
  }
}

/// Solver for the symmetric generalized eigenvalue problem $A v = lambda B v$
/// with $B$ positive definite.
pub trait GeneralizedEigensolver {
  /// The `neigen` eigenvalues of smallest magnitude, in ascending order.
  fn smallest_eigenvalues(
    &self,
    stiffness: &GalMat,
    mass: &GalMat,
    neigen: usize,
  ) -> Result<Vec<f64>, SpectrumError>;
}

/// The first three eigenvalues of the linear FEM Laplace-Beltrami spectrum,
/// or [`INSUFFICIENT_GEOMETRY`] if there are fewer than 5 points.
pub fn fem_laplacian(points: &[[f64; 3]], faces: &[Triangle]) -> Result<Vec<f64>, SpectrumError> {
  fem_laplacian_with(
    points,
    faces,
    &SpectrumConfig::default(),
    &ShiftInvertLanczos::default(),
  )
}

pub fn fem_laplacian_with(
  points: &[[f64; 3]],
  faces: &[Triangle],
  config: &SpectrumConfig,
  solver: &impl GeneralizedEigensolver,
) -> Result<Vec<f64>, SpectrumError> {
  if points.len() < config.min_vertices {
    tracing::warn!(
      "mesh has {} vertices, too small to compute a spectrum; skipped",
      points.len()
    );
    return Ok(INSUFFICIENT_GEOMETRY.to_vec());
  }

  let mesh = SurfaceMesh::from_slices(points, faces)?;
  let (stiffness, mass) = assemble::compute_ab_with(&mesh, config.degenerate_policy)?;
  let eigenvals = solver.smallest_eigenvalues(&stiffness, &mass, config.neigen)?;
  tracing::debug!(?eigenvals, "linear FEM Laplace-Beltrami spectrum");
  Ok(eigenvals)
}

/// Checks the shapes and that every vertex carries mass.
fn check_problem(stiffness: &GalMat, mass: &GalMat, neigen: usize) -> Result<(), SpectrumError> {
  let n = stiffness.nrows();
  if stiffness.ncols() != n || mass.nrows() != n || mass.ncols() != n {
    return Err(SpectrumError::InvalidConfig(format!(
      "expected two square matrices of equal size, got {}x{} and {}x{}",
      stiffness.nrows(),
      stiffness.ncols(),
      mass.nrows(),
      mass.ncols()
    )));
  }
  if neigen == 0 || neigen > n {
    return Err(SpectrumError::InvalidConfig(format!(
      "cannot compute {neigen} eigenvalues of a problem of size {n}"
    )));
  }

  let mut mass_diagonal = vec![0.0; n];
  for (r, c, &v) in mass.triplet_iter() {
    if r == c {
      mass_diagonal[r] += v;
    }
  }
  match mass_diagonal.iter().position(|&m| m <= 0.0 || m.is_nan()) {
    Some(vertex) => Err(SpectrumError::MassNotPositiveDefinite { vertex }),
    None => Ok(()),
  }
}

fn select_smallest_magnitude(eigenvals: impl IntoIterator<Item = f64>, neigen: usize) -> Vec<f64> {
  eigenvals
    .into_iter()
    .sorted_by(|a, b| a.abs().total_cmp(&b.abs()))
    .take(neigen)
    .sorted_by(f64::total_cmp)
    .collect()
}

/// Dense solver through the Cholesky reduction $L^(-1) A L^(-T)$, with
/// $B = L L^T$, to a standard symmetric eigenvalue problem.
///
/// Computes the full spectrum, so it is meant for small meshes and for
/// validating the iterative solver.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenseEigensolver;
impl GeneralizedEigensolver for DenseEigensolver {
  fn smallest_eigenvalues(
    &self,
    stiffness: &GalMat,
    mass: &GalMat,
    neigen: usize,
  ) -> Result<Vec<f64>, SpectrumError> {
    check_problem(stiffness, mass, neigen)?;

    let chol = na::Cholesky::new(na::DMatrix::from(mass))
      .ok_or(SpectrumError::Factorization("mass matrix"))?;
    let l = chol.l();

    let l_inv_a = l
      .solve_lower_triangular(&na::DMatrix::from(stiffness))
      .ok_or(SpectrumError::Factorization("mass matrix"))?;
    let reduced = l
      .solve_lower_triangular(&l_inv_a.transpose())
      .ok_or(SpectrumError::Factorization("mass matrix"))?;
    let reduced = 0.5 * (&reduced + reduced.transpose());

    let eigenvals = na::SymmetricEigen::new(reduced).eigenvalues;
    Ok(select_smallest_magnitude(eigenvals.iter().copied(), neigen))
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LanczosConfig {
  /// Upper bound on the dimension of the Krylov space.
  pub max_iterations: usize,
  /// Relative residual below which a Ritz pair counts as converged.
  pub tolerance: f64,
  /// Negative spectral shift $sigma$. Derived from the matrices if `None`.
  pub shift: Option<f64>,
  /// Seed of the random start block. Equal seeds give bit-identical results.
  pub seed: u64,
}
impl Default for LanczosConfig {
  fn default() -> Self {
    Self {
      max_iterations: 300,
      tolerance: 1e-8,
      shift: None,
      seed: 0,
    }
  }
}

/// Shift-invert block Lanczos with full reorthogonalization.
///
/// Builds a $B$-orthonormal basis of the block Krylov space of the operator
/// $(A - sigma B)^(-1) B$, whose eigenvalues are $theta = 1 / (lambda - sigma)$,
/// and extracts Ritz values by Rayleigh-Ritz projection.
/// Since $A$ is positive semi-definite and $sigma < 0$, the shifted matrix is
/// positive definite and the largest $theta$ belong to the eigenvalues
/// $lambda$ of smallest magnitude.
///
/// The start block has `neigen` vectors, so eigenvalues of multiplicity up to
/// `neigen` are resolved. Symmetric meshes commonly have those.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShiftInvertLanczos {
  pub config: LanczosConfig,
}
impl ShiftInvertLanczos {
  pub fn new(config: LanczosConfig) -> Self {
    Self { config }
  }
}

impl GeneralizedEigensolver for ShiftInvertLanczos {
  fn smallest_eigenvalues(
    &self,
    stiffness: &GalMat,
    mass: &GalMat,
    neigen: usize,
  ) -> Result<Vec<f64>, SpectrumError> {
    check_problem(stiffness, mass, neigen)?;

    let LanczosConfig {
      max_iterations,
      tolerance,
      shift,
      seed,
    } = self.config;
    if max_iterations == 0 || tolerance.is_nan() || tolerance <= 0.0 {
      return Err(SpectrumError::InvalidConfig(format!(
        "need max_iterations > 0 and tolerance > 0, got {max_iterations} and {tolerance}"
      )));
    }
    let shift = match shift {
      None => default_shift(stiffness, mass),
      Some(shift) if shift < 0.0 => shift,
      Some(shift) => {
        return Err(SpectrumError::InvalidConfig(format!(
          "shift must be negative, got {shift}"
        )))
      }
    };

    let n = stiffness.nrows();
    let mut shifted = SparseMatrix::zeros(n, n);
    shifted.push_scaled_csr(stiffness, 1.0);
    shifted.push_scaled_csr(mass, -shift);
    let shifted = FaerCholesky::new(shifted.to_nalgebra_csc())
      .ok_or(SpectrumError::Factorization("shifted stiffness matrix"))?;

    let max_dim = max_iterations.min(n);
    let mut krylov = KrylovBasis::default();
    let mut rng = StdRng::seed_from_u64(seed);
    while krylov.dim() < neigen.min(max_dim) {
      match krylov.fresh_direction(mass, &mut rng) {
        Some(v) => krylov.push(v, mass),
        None => break,
      }
    }

    let mut projected = na::DMatrix::zeros(0, 0);
    let mut nconverged = 0;
    while krylov.nprocessed() < max_dim {
      let j = krylov.nprocessed();
      if j == krylov.dim() {
        // Invariant subspace, extend by a new direction.
        match krylov.fresh_direction(mass, &mut rng) {
          Some(v) => krylov.push(v, mass),
          None => break,
        }
      }

      let image = shifted.solve(&krylov.mass_vectors[j]);
      projected.resize_mut(j + 1, j + 1, 0.0);
      for i in 0..=j {
        let h = krylov.mass_vectors[i].dot(&image);
        projected[(i, j)] = h;
        projected[(j, i)] = h;
      }

      let mut next = image.clone();
      krylov.orthogonalize(&mut next);
      krylov.orthogonalize(&mut next);
      let norm = mass_norm(mass, &next);
      if krylov.dim() < n && norm > 1e-10 * mass_norm(mass, &image) {
        krylov.push(next / norm, mass);
      }
      krylov.images.push(image);

      let k = krylov.nprocessed();
      if k >= neigen && (k % neigen == 0 || k == max_dim) {
        let (thetas, converged) = krylov.ritz_values(&projected, mass, neigen, tolerance);
        nconverged = converged;
        tracing::trace!("krylov dimension {k}: {nconverged} of {neigen} ritz values converged");
        if nconverged == neigen {
          tracing::debug!("shift-invert lanczos converged at krylov dimension {k} (shift {shift:e})");
          let eigenvals = thetas.into_iter().map(|theta| shift + theta.recip());
          return Ok(select_smallest_magnitude(eigenvals, neigen));
        }
      }
    }

    Err(SpectrumError::NonConvergence {
      iterations: krylov.nprocessed(),
      nconverged,
      nrequested: neigen,
    })
  }
}

/// $-1/100 "tr"(A) / "tr"(B)$, small compared to the bulk of the spectrum.
fn default_shift(stiffness: &GalMat, mass: &GalMat) -> f64 {
  let trace = |m: &GalMat| {
    m.triplet_iter()
      .filter(|&(r, c, _)| r == c)
      .map(|(_, _, &v)| v)
      .sum::<f64>()
  };
  let scale = trace(stiffness) / trace(mass);
  if scale.is_finite() && scale > 0.0 {
    -1e-2 * scale
  } else {
    -1e-2
  }
}

fn mass_norm(mass: &GalMat, v: &na::DVector<f64>) -> f64 {
  v.dot(&(mass * v)).max(0.0).sqrt()
}

/// $B$-orthonormal Krylov vectors together with their images under $B$ and,
/// for the processed ones, under the shift-inverted operator.
#[derive(Default)]
struct KrylovBasis {
  vectors: Vec<na::DVector<f64>>,
  mass_vectors: Vec<na::DVector<f64>>,
  images: Vec<na::DVector<f64>>,
}
impl KrylovBasis {
  fn dim(&self) -> usize {
    self.vectors.len()
  }
  fn nprocessed(&self) -> usize {
    self.images.len()
  }

  fn push(&mut self, v: na::DVector<f64>, mass: &GalMat) {
    self.mass_vectors.push(mass * &v);
    self.vectors.push(v);
  }

  /// Removes the components along the basis (Gram-Schmidt in the $B$ inner product).
  fn orthogonalize(&self, w: &mut na::DVector<f64>) {
    for (v, mass_v) in self.vectors.iter().zip(&self.mass_vectors) {
      let coeff = w.dot(mass_v);
      w.axpy(-coeff, v, 1.0);
    }
  }

  /// A normalized vector $B$-orthogonal to the current basis, or `None`
  /// if the basis already spans the whole space.
  fn fresh_direction(&self, mass: &GalMat, rng: &mut impl Rng) -> Option<na::DVector<f64>> {
    const MAX_ATTEMPTS: usize = 8;

    let n = mass.nrows();
    if self.dim() >= n {
      return None;
    }
    for _ in 0..MAX_ATTEMPTS {
      let mut v = na::DVector::from_fn(n, |_, _| rng.random_range(-0.5..0.5));

      let norm_before = mass_norm(mass, &v);
      self.orthogonalize(&mut v);
      self.orthogonalize(&mut v);
      let norm = mass_norm(mass, &v);
      if norm > 1e-8 * norm_before {
        return Some(v / norm);
      }
    }
    None
  }

  /// Rayleigh-Ritz on the processed vectors.
  ///
  /// Returns the `neigen` largest Ritz values and how many of them have a
  /// residual $||"OP" x - theta x||_B <= "tol" |theta|$.
  fn ritz_values(
    &self,
    projected: &na::DMatrix<f64>,
    mass: &GalMat,
    neigen: usize,
    tolerance: f64,
  ) -> (Vec<f64>, usize) {
    let k = self.nprocessed();
    let eigen = na::SymmetricEigen::new(projected.clone());

    let largest: Vec<usize> = (0..k)
      .sorted_by(|&i, &j| eigen.eigenvalues[j].total_cmp(&eigen.eigenvalues[i]))
      .take(neigen)
      .collect();

    let nconverged = largest
      .iter()
      .filter(|&&i| {
        let theta = eigen.eigenvalues[i];
        let mut residual = na::DVector::zeros(mass.nrows());
        for (l, &y) in eigen.eigenvectors.column(i).iter().enumerate() {
          residual.axpy(y, &self.images[l], 1.0);
          residual.axpy(-theta * y, &self.vectors[l], 1.0);
        }
        mass_norm(mass, &residual) <= tolerance * theta.abs()
      })
      .count();
    let thetas = largest.iter().map(|&i| eigen.eigenvalues[i]).collect();
    (thetas, nconverged)
  }
}

#[cfg(test)]
mod test {
  use super::{
    check_problem, select_smallest_magnitude, DenseEigensolver, GeneralizedEigensolver,
    LanczosConfig, ShiftInvertLanczos,
  };
  use crate::{error::SpectrumError, sparse::SparseMatrix};

  use approx::assert_relative_eq;

  /// Diagonal pencil with known eigenvalues `a_i / b_i`.
  fn diagonal_pencil(a: &[f64], b: &[f64]) -> (nas::CsrMatrix<f64>, nas::CsrMatrix<f64>) {
    let n = a.len();
    let diag = |d: &[f64]| {
      SparseMatrix::new(n, n, d.iter().enumerate().map(|(i, &v)| (i, i, v)).collect())
        .to_nalgebra_csr()
    };
    (diag(a), diag(b))
  }

  #[test]
  fn smallest_magnitude_selection() {
    let selected = select_smallest_magnitude([4.0, -0.5, 3.0, 0.1, -2.0], 3);
    assert_eq!(selected, vec![-2.0, -0.5, 0.1]);
  }

  #[test]
  fn seeded_solves_are_reproducible() {
    let a: Vec<f64> = (0..60).map(|i| (i % 17) as f64 + 0.1 * i as f64).collect();
    let b: Vec<f64> = (0..60).map(|i| 1.0 + 0.01 * i as f64).collect();
    let (stiffness, mass) = diagonal_pencil(&a, &b);

    let solve = |seed| {
      ShiftInvertLanczos::new(LanczosConfig {
        seed,
        ..Default::default()
      })
      .smallest_eigenvalues(&stiffness, &mass, 3)
      .unwrap()
    };
    let first = solve(7);
    assert_eq!(first, solve(7));

    let other = solve(8);
    for (x, y) in first.iter().zip(&other) {
      assert_relative_eq!(*x, *y, epsilon = 1e-9);
    }
  }

  /// Contains a double eigenvalue, which a single-vector Krylov space misses.
  #[test]
  fn diagonal_pencil_both_solvers() {
    let a = [8.0, 0.0, 3.0, 12.0, 1.0, 30.0, 7.0];
    let b = [2.0, 1.0, 1.5, 3.0, 0.5, 1.0, 1.0];
    let (stiffness, mass) = diagonal_pencil(&a, &b);

    let expected = [0.0, 2.0, 2.0, 4.0];
    for eigenvals in [
      DenseEigensolver.smallest_eigenvalues(&stiffness, &mass, 4).unwrap(),
      ShiftInvertLanczos::default()
        .smallest_eigenvalues(&stiffness, &mass, 4)
        .unwrap(),
    ] {
      assert_eq!(eigenvals.len(), 4);
      for (computed, expected) in eigenvals.iter().zip(expected) {
        assert_relative_eq!(*computed, expected, epsilon = 1e-9);
      }
    }
  }

  #[test]
  fn larger_diagonal_pencil() {
    let a: Vec<f64> = (0..200).map(|i| (i / 2) as f64).collect();
    let b = vec![1.0; 200];
    let (stiffness, mass) = diagonal_pencil(&a, &b);

    let eigenvals = ShiftInvertLanczos::default()
      .smallest_eigenvalues(&stiffness, &mass, 3)
      .unwrap();
    assert_relative_eq!(eigenvals[0], 0.0, epsilon = 1e-9);
    assert_relative_eq!(eigenvals[1], 0.0, epsilon = 1e-9);
    assert_relative_eq!(eigenvals[2], 1.0, epsilon = 1e-9);
  }

  #[test]
  fn zero_mass_vertex() {
    let (stiffness, mass) = diagonal_pencil(&[1.0, 1.0, 1.0], &[1.0, 0.0, 1.0]);
    assert_eq!(
      check_problem(&stiffness, &mass, 2),
      Err(SpectrumError::MassNotPositiveDefinite { vertex: 1 })
    );
  }

  #[test]
  fn invalid_configuration() {
    let (stiffness, mass) = diagonal_pencil(&[1.0, 2.0, 3.0], &[1.0, 1.0, 1.0]);
    assert!(matches!(
      DenseEigensolver.smallest_eigenvalues(&stiffness, &mass, 4),
      Err(SpectrumError::InvalidConfig(_))
    ));

    let positive_shift = ShiftInvertLanczos::new(LanczosConfig {
      shift: Some(0.5),
      ..Default::default()
    });
    assert!(matches!(
      positive_shift.smallest_eigenvalues(&stiffness, &mass, 2),
      Err(SpectrumError::InvalidConfig(_))
    ));
  }

  #[test]
  fn iteration_budget_exhausted() {
    let a: Vec<f64> = (0..40).map(|i| (i * i) as f64).collect();
    let b = vec![1.0; 40];
    let (stiffness, mass) = diagonal_pencil(&a, &b);

    let solver = ShiftInvertLanczos::new(LanczosConfig {
      max_iterations: 3,
      tolerance: 1e-14,
      ..Default::default()
    });
    assert!(matches!(
      solver.smallest_eigenvalues(&stiffness, &mass, 3),
      Err(SpectrumError::NonConvergence {
        iterations: 3,
        nrequested: 3,
        ..
      })
    ));
  }
}
