extern crate nalgebra as na;
extern crate nalgebra_sparse as nas;

pub mod assemble;
pub mod error;
pub mod evp;
pub mod fe;
pub mod geometry;
pub mod linalg;
pub mod mesh;
pub mod sparse;

pub use assemble::{compute_ab, compute_ab_with, GalMat};
pub use error::{AssemblyError, MeshError, SpectrumError};
pub use evp::{
  fem_laplacian, fem_laplacian_with, DenseEigensolver, GeneralizedEigensolver, LanczosConfig,
  ShiftInvertLanczos, SpectrumConfig, INSUFFICIENT_GEOMETRY,
};
pub use geometry::DegeneratePolicy;
pub use mesh::{SurfaceMesh, Triangle};
