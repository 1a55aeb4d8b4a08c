pub trait DMatrixExt {
  fn is_symmetric(&self, eps: f64) -> bool;
  /// Symmetric up to rounding and positive definite.
  fn is_spd(&self) -> bool;
}
impl DMatrixExt for na::DMatrix<f64> {
  fn is_symmetric(&self, eps: f64) -> bool {
    self.is_square() && (self - self.transpose()).amax() <= eps
  }
  fn is_spd(&self) -> bool {
    self.is_symmetric(1e-12 * self.amax().max(1.0)) && na::Cholesky::new(self.clone()).is_some()
  }
}

#[cfg(test)]
mod test {
  use super::DMatrixExt;

  #[test]
  fn spd_detection() {
    let spd = na::dmatrix![
      2.0, -1.0;
      -1.0, 2.0;
    ];
    let unsymmetric = na::dmatrix![
      2.0, -1.0;
      0.0, 2.0;
    ];
    assert!(spd.is_spd());
    assert!(!unsymmetric.is_spd());
    assert!(!unsymmetric.is_symmetric(1e-12));
    assert!(spd.is_symmetric(0.0));
  }
}
