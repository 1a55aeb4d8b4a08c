use faer::solvers::SpSolver;

/// Sparse matrix under construction, stored as a list of `(row, col, value)`
/// triplets. Duplicate positions are allowed and get summed when converted
/// into a compressed format.
#[derive(Default, Debug, Clone)]
pub struct SparseMatrix {
  nrows: usize,
  ncols: usize,
  triplets: Vec<(usize, usize, f64)>,
}

impl SparseMatrix {
  pub fn zeros(nrows: usize, ncols: usize) -> Self {
    Self::new(nrows, ncols, Vec::new())
  }
  pub fn new(nrows: usize, ncols: usize, triplets: Vec<(usize, usize, f64)>) -> Self {
    debug_assert!(triplets.iter().all(|&(r, c, _)| r < nrows && c < ncols));
    Self {
      nrows,
      ncols,
      triplets,
    }
  }

  pub fn nrows(&self) -> usize {
    self.nrows
  }
  pub fn ncols(&self) -> usize {
    self.ncols
  }
  pub fn ntriplets(&self) -> usize {
    self.triplets.len()
  }

  /// Explicit zeros are not stored.
  pub fn push(&mut self, r: usize, c: usize, v: f64) {
    debug_assert!(r < self.nrows() && c < self.ncols());
    if v != 0.0 {
      self.triplets.push((r, c, v));
    }
  }

  /// Appends `scale * m` entrywise.
  pub fn push_scaled_csr(&mut self, m: &nas::CsrMatrix<f64>, scale: f64) {
    debug_assert!(m.nrows() == self.nrows() && m.ncols() == self.ncols());
    for (r, c, &v) in m.triplet_iter() {
      self.push(r, c, scale * v);
    }
  }

  pub fn to_nalgebra_coo(&self) -> nas::CooMatrix<f64> {
    let mut coo = nas::CooMatrix::new(self.nrows, self.ncols);
    for &(r, c, v) in &self.triplets {
      coo.push(r, c, v);
    }
    coo
  }

  pub fn to_nalgebra_csr(&self) -> nas::CsrMatrix<f64> {
    (&self.to_nalgebra_coo()).into()
  }

  pub fn to_nalgebra_csc(&self) -> nas::CscMatrix<f64> {
    (&self.to_nalgebra_coo()).into()
  }

  pub fn to_nalgebra_dense(&self) -> na::DMatrix<f64> {
    (&self.to_nalgebra_coo()).into()
  }
}

type SparseMatrixFaer = faer::sparse::SparseColMat<usize, f64>;

pub fn nalgebra2faer(m: nas::CscMatrix<f64>) -> SparseMatrixFaer {
  let nrows = m.nrows();
  let ncols = m.ncols();
  let (col_ptrs, row_indices, values) = m.disassemble();

  let symbolic =
    faer::sparse::SymbolicSparseColMat::new_checked(nrows, ncols, col_ptrs, None, row_indices);
  faer::sparse::SparseColMat::new(symbolic, values)
}

/// Sparse Cholesky factorization of a symmetric positive definite matrix.
pub struct FaerCholesky {
  raw: faer::sparse::linalg::solvers::Cholesky<usize, f64>,
}
impl FaerCholesky {
  /// Returns `None` if the matrix is not numerically positive definite.
  pub fn new(a: nas::CscMatrix<f64>) -> Option<Self> {
    let raw = nalgebra2faer(a).sp_cholesky(faer::Side::Upper).ok()?;
    Some(Self { raw })
  }

  pub fn solve(&self, b: &na::DVector<f64>) -> na::DVector<f64> {
    let b = faer::col::from_slice(b.as_slice());
    na::DVector::from_vec(self.raw.solve(b).as_slice().to_vec())
  }
}

#[cfg(test)]
mod test {
  use super::{FaerCholesky, SparseMatrix};

  use approx::assert_abs_diff_eq;

  #[test]
  fn duplicates_are_summed() {
    let mut mat = SparseMatrix::zeros(3, 3);
    mat.push(0, 1, 1.5);
    mat.push(2, 2, 1.0);
    mat.push(0, 1, -0.5);
    mat.push(1, 0, 0.0);
    assert_eq!(mat.ntriplets(), 3);

    let csr = mat.to_nalgebra_csr();
    assert_eq!(csr.nnz(), 2);

    let expected = na::dmatrix![
      0.0, 1.0, 0.0;
      0.0, 0.0, 0.0;
      0.0, 0.0, 1.0;
    ];
    assert_abs_diff_eq!(mat.to_nalgebra_dense(), expected, epsilon = 1e-12);
    assert_abs_diff_eq!(na::DMatrix::from(&csr), expected, epsilon = 1e-12);
  }

  #[test]
  fn scaled_csr_combination() {
    let a = SparseMatrix::new(2, 2, vec![(0, 0, 2.0), (1, 1, 3.0)]).to_nalgebra_csr();
    let b = SparseMatrix::new(2, 2, vec![(0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0)]).to_nalgebra_csr();

    let mut sum = SparseMatrix::zeros(2, 2);
    sum.push_scaled_csr(&a, 1.0);
    sum.push_scaled_csr(&b, -2.0);

    let expected = na::dmatrix![
      0.0, -2.0;
      -2.0, 3.0;
    ];
    assert_abs_diff_eq!(sum.to_nalgebra_dense(), expected, epsilon = 1e-12);
  }

  #[test]
  fn cholesky_solve() {
    #[rustfmt::skip]
    let triplets = vec![
      (0, 0, 4.0), (0, 1, 1.0),
      (1, 0, 1.0), (1, 1, 3.0), (1, 2, 1.0),
      (2, 1, 1.0), (2, 2, 2.0),
    ];
    let mat = SparseMatrix::new(3, 3, triplets);
    let dense = mat.to_nalgebra_dense();

    let chol = FaerCholesky::new(mat.to_nalgebra_csc()).unwrap();
    let b = na::dvector![1.0, -2.0, 0.5];
    let x = chol.solve(&b);
    assert!((dense * x - b).norm() < 1e-12);
  }

  #[test]
  fn cholesky_rejects_indefinite() {
    let mat = SparseMatrix::new(2, 2, vec![(0, 0, 1.0), (0, 1, 2.0), (1, 0, 2.0), (1, 1, 1.0)]);
    assert!(FaerCholesky::new(mat.to_nalgebra_csc()).is_none());
  }
}
