use super::{DenseComplexMatrix, DenseRealMatrix};
use crate::numerics::deterministic_argsort;
use num_complex::Complex64;

const SINGULAR_PIVOT_EPSILON: f64 = 1.0e-15;
const JACOBI_RELATIVE_TOLERANCE: f64 = 1.0e-14;
const JACOBI_MAX_SWEEPS: usize = 100;
const SYMMETRY_RELATIVE_TOLERANCE: f64 = 1.0e-10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LuError {
    #[error("LU factorization requires a square matrix, got {rows}x{cols}")]
    NonSquareMatrix { rows: usize, cols: usize },
    #[error("LU factorization requires a non-empty matrix")]
    EmptyMatrix,
    #[error("matrix is singular at pivot index {pivot_index}")]
    SingularMatrix { pivot_index: usize },
    #[error("matrix contains a non-finite entry at ({row}, {col})")]
    NonFiniteEntry { row: usize, col: usize },
    #[error("right-hand side length mismatch: expected {expected}, got {actual}")]
    RhsLengthMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LuDecomposition {
    lu: DenseComplexMatrix,
    pivots: Vec<usize>,
}

impl LuDecomposition {
    pub fn dimension(&self) -> usize {
        self.lu.nrows()
    }

    pub fn solve(&self, rhs: &[Complex64]) -> Result<Vec<Complex64>, LuError> {
        let dimension = self.dimension();
        if rhs.len() != dimension {
            return Err(LuError::RhsLengthMismatch {
                expected: dimension,
                actual: rhs.len(),
            });
        }

        let mut forward = vec![Complex64::new(0.0, 0.0); dimension];
        for row in 0..dimension {
            let mut value = rhs[self.pivots[row]];
            for col in 0..row {
                value -= self.lu[(row, col)] * forward[col];
            }
            forward[row] = value;
        }

        let mut solution = vec![Complex64::new(0.0, 0.0); dimension];
        for row in (0..dimension).rev() {
            let mut value = forward[row];
            for col in (row + 1)..dimension {
                value -= self.lu[(row, col)] * solution[col];
            }
            solution[row] = value / self.lu[(row, row)];
        }

        Ok(solution)
    }
}

/// Partial-pivoting LU factorization of a dense complex matrix.
pub fn lu_factorize(matrix: &DenseComplexMatrix) -> Result<LuDecomposition, LuError> {
    let rows = matrix.nrows();
    let cols = matrix.ncols();
    if rows == 0 || cols == 0 {
        return Err(LuError::EmptyMatrix);
    }
    if rows != cols {
        return Err(LuError::NonSquareMatrix { rows, cols });
    }
    for row in 0..rows {
        for col in 0..cols {
            let value = matrix[(row, col)];
            if !(value.re.is_finite() && value.im.is_finite()) {
                return Err(LuError::NonFiniteEntry { row, col });
            }
        }
    }

    let dimension = rows;
    let mut lu = matrix.clone();
    let mut pivots: Vec<usize> = (0..dimension).collect();

    for pivot_col in 0..dimension {
        let mut pivot_row = pivot_col;
        let mut best = lu[(pivot_col, pivot_col)].norm_sqr();
        for row in (pivot_col + 1)..dimension {
            let candidate = lu[(row, pivot_col)].norm_sqr();
            if candidate > best {
                best = candidate;
                pivot_row = row;
            }
        }
        if best <= SINGULAR_PIVOT_EPSILON * SINGULAR_PIVOT_EPSILON {
            return Err(LuError::SingularMatrix {
                pivot_index: pivot_col,
            });
        }

        if pivot_row != pivot_col {
            for col in 0..dimension {
                let value = lu[(pivot_col, col)];
                lu[(pivot_col, col)] = lu[(pivot_row, col)];
                lu[(pivot_row, col)] = value;
            }
            pivots.swap(pivot_col, pivot_row);
        }

        let pivot = lu[(pivot_col, pivot_col)];
        for row in (pivot_col + 1)..dimension {
            lu[(row, pivot_col)] /= pivot;
            let multiplier = lu[(row, pivot_col)];
            if multiplier.norm_sqr() == 0.0 {
                continue;
            }
            for col in (pivot_col + 1)..dimension {
                let updated = lu[(row, col)] - multiplier * lu[(pivot_col, col)];
                lu[(row, col)] = updated;
            }
        }
    }

    Ok(LuDecomposition { lu, pivots })
}

pub fn lu_solve(matrix: &DenseComplexMatrix, rhs: &[Complex64]) -> Result<Vec<Complex64>, LuError> {
    lu_factorize(matrix)?.solve(rhs)
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EigenError {
    #[error("eigen decomposition requires a non-empty square matrix, got {rows}x{cols}")]
    InvalidShape { rows: usize, cols: usize },
    #[error("matrix is not symmetric at ({row}, {col})")]
    NotSymmetric { row: usize, col: usize },
    #[error("matrix contains a non-finite entry at ({row}, {col})")]
    NonFiniteEntry { row: usize, col: usize },
    #[error("Jacobi iteration did not converge after {sweeps} sweeps (off-diagonal norm {off_diagonal:.3e})")]
    NotConverged { sweeps: usize, off_diagonal: f64 },
}

/// Eigenpairs of a real symmetric matrix, eigenvalues ascending.
///
/// Column `k` of `vectors` is the eigenvector of `values[k]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetricEigen {
    pub values: Vec<f64>,
    pub vectors: DenseRealMatrix,
}

/// Cyclic Jacobi rotations until the off-diagonal mass vanishes.
pub fn symmetric_eigen(matrix: &DenseRealMatrix) -> Result<SymmetricEigen, EigenError> {
    let n = matrix.nrows();
    if n == 0 || matrix.ncols() != n {
        return Err(EigenError::InvalidShape {
            rows: n,
            cols: matrix.ncols(),
        });
    }

    let mut frobenius = 0.0;
    for row in 0..n {
        for col in 0..n {
            let value = matrix[(row, col)];
            if !value.is_finite() {
                return Err(EigenError::NonFiniteEntry { row, col });
            }
            frobenius += value * value;
        }
    }
    let frobenius = frobenius.sqrt();
    for row in 0..n {
        for col in (row + 1)..n {
            let difference = (matrix[(row, col)] - matrix[(col, row)]).abs();
            if difference > SYMMETRY_RELATIVE_TOLERANCE * frobenius.max(f64::MIN_POSITIVE) {
                return Err(EigenError::NotSymmetric { row, col });
            }
        }
    }

    let mut a = matrix.clone();
    let mut v = DenseRealMatrix::zeros(n, n);
    for index in 0..n {
        v[(index, index)] = 1.0;
    }

    let target = JACOBI_RELATIVE_TOLERANCE * frobenius;
    let mut off_diagonal = off_diagonal_norm(&a);
    let mut sweeps = 0;
    while off_diagonal > target {
        if sweeps == JACOBI_MAX_SWEEPS {
            return Err(EigenError::NotConverged {
                sweeps,
                off_diagonal,
            });
        }
        for p in 0..n {
            for q in (p + 1)..n {
                rotate(&mut a, &mut v, p, q);
            }
        }
        sweeps += 1;
        off_diagonal = off_diagonal_norm(&a);
    }

    let diagonal: Vec<f64> = (0..n).map(|index| a[(index, index)]).collect();
    let order = deterministic_argsort(&diagonal);
    let mut vectors = DenseRealMatrix::zeros(n, n);
    let mut values = Vec::with_capacity(n);
    for (target_col, &source_col) in order.iter().enumerate() {
        values.push(diagonal[source_col]);
        for row in 0..n {
            vectors[(row, target_col)] = v[(row, source_col)];
        }
    }

    Ok(SymmetricEigen { values, vectors })
}

fn off_diagonal_norm(a: &DenseRealMatrix) -> f64 {
    let n = a.nrows();
    let mut sum = 0.0;
    for row in 0..n {
        for col in (row + 1)..n {
            sum += 2.0 * a[(row, col)] * a[(row, col)];
        }
    }
    sum.sqrt()
}

fn rotate(a: &mut DenseRealMatrix, v: &mut DenseRealMatrix, p: usize, q: usize) {
    let apq = a[(p, q)];
    if apq == 0.0 {
        return;
    }
    let theta = (a[(q, q)] - a[(p, p)]) / (2.0 * apq);
    let t = if theta.abs() > 1.0e150 {
        0.5 / theta
    } else {
        theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt())
    };
    let c = 1.0 / (t * t + 1.0).sqrt();
    let s = t * c;

    let n = a.nrows();
    for k in 0..n {
        let akp = a[(k, p)];
        let akq = a[(k, q)];
        a[(k, p)] = c * akp - s * akq;
        a[(k, q)] = s * akp + c * akq;
    }
    for k in 0..n {
        let apk = a[(p, k)];
        let aqk = a[(q, k)];
        a[(p, k)] = c * apk - s * aqk;
        a[(q, k)] = s * apk + c * aqk;
    }
    a[(p, q)] = 0.0;
    a[(q, p)] = 0.0;

    for k in 0..n {
        let vkp = v[(k, p)];
        let vkq = v[(k, q)];
        v[(k, p)] = c * vkp - s * vkq;
        v[(k, q)] = s * vkp + c * vkq;
    }
}
