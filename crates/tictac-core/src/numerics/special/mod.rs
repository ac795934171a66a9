pub mod harmonics;
pub mod legendre;
pub mod linalg;
pub mod quadrature;
pub mod wigner;

pub use harmonics::{polar_angles, y_lm, y_lm_direction};
pub use legendre::legendre_q;
pub use linalg::{
    EigenError, LuDecomposition, LuError, SymmetricEigen, lu_factorize, lu_solve, symmetric_eigen,
};
pub use quadrature::{GaussLegendre, QuadratureError};
pub use wigner::{
    Wigner3jInput, Wigner6jInput, clebsch_gordan, is_triad, wigner_3j, wigner_6j, wigner_9j,
};

use faer::Mat;
use num_complex::Complex64;

pub type DenseComplexMatrix = Mat<Complex64>;
pub type DenseRealMatrix = Mat<f64>;
