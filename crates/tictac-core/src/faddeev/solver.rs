//! Solvers for `(I - K) x = b`.
//!
//! Non-convergence is an outcome, not an error: the caller reports it for the
//! energy at hand and moves on.

use crate::domain::{TicTacError, TicTacResult};
use crate::numerics::special::{DenseComplexMatrix, LuError, lu_factorize};
use crate::numerics::{all_finite, complex_norm, relative_change};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A linear kernel applied without forming its matrix.
pub trait KernelOperator: Sync {
    fn dimension(&self) -> usize;

    fn apply(&self, input: &[Complex64]) -> Vec<Complex64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SolverMethod {
    Direct,
    Neumann,
    Gmres,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolverSettings {
    pub method: SolverMethod,
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Krylov dimension between GMRES restarts.
    pub restart: usize,
    /// Largest system solved densely; bigger ones fall back to GMRES.
    pub max_dense_dimension: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            method: SolverMethod::Gmres,
            tolerance: 1.0e-8,
            max_iterations: 300,
            restart: 40,
            max_dense_dimension: 3000,
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> TicTacResult<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(TicTacError::input_validation(
                "INPUT.SOLVER",
                format!("tolerance must be positive, got {}", self.tolerance),
            ));
        }
        if self.max_iterations == 0 || self.restart == 0 {
            return Err(TicTacError::input_validation(
                "INPUT.SOLVER",
                "maxIterations and restart must be positive",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub amplitude: Vec<Complex64>,
    pub iterations: usize,
    /// `||b - (I - K) x|| / ||b||`, or the last relative change for Neumann.
    pub residual: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NonConvergenceReason {
    BudgetExhausted,
    NonFinite,
    SingularSystem,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonConvergence {
    pub iterations: usize,
    pub last_change: f64,
    pub reason: NonConvergenceReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Converged(Solution),
    NonConvergent(NonConvergence),
}

impl SolveOutcome {
    pub fn solution(&self) -> Option<&Solution> {
        match self {
            Self::Converged(solution) => Some(solution),
            Self::NonConvergent(_) => None,
        }
    }

    fn non_finite(iterations: usize, last_change: f64) -> Self {
        Self::NonConvergent(NonConvergence {
            iterations,
            last_change,
            reason: NonConvergenceReason::NonFinite,
        })
    }
}

/// Solves the system once per right-hand side; the direct method factorizes once.
pub fn solve_all(
    kernel: &dyn KernelOperator,
    drivings: &[Vec<Complex64>],
    settings: &SolverSettings,
) -> TicTacResult<Vec<SolveOutcome>> {
    settings.validate()?;
    for driving in drivings {
        if driving.len() != kernel.dimension() {
            return Err(TicTacError::internal(
                "SYS.SOLVER_DIMENSION",
                format!(
                    "driving term has {} entries, kernel dimension is {}",
                    driving.len(),
                    kernel.dimension()
                ),
            ));
        }
    }

    let method = match settings.method {
        SolverMethod::Direct if kernel.dimension() > settings.max_dense_dimension => {
            warn!(
                dimension = kernel.dimension(),
                limit = settings.max_dense_dimension,
                "system too large for the direct solver, using GMRES"
            );
            SolverMethod::Gmres
        }
        method => method,
    };

    Ok(match method {
        SolverMethod::Direct => direct(kernel, drivings),
        SolverMethod::Neumann => drivings
            .iter()
            .map(|driving| neumann(kernel, driving, settings))
            .collect(),
        SolverMethod::Gmres => drivings
            .iter()
            .map(|driving| gmres(kernel, driving, settings))
            .collect(),
    })
}

pub fn solve(
    kernel: &dyn KernelOperator,
    driving: &[Complex64],
    settings: &SolverSettings,
) -> TicTacResult<SolveOutcome> {
    let mut outcomes = solve_all(kernel, &[driving.to_vec()], settings)?;
    outcomes.pop().ok_or_else(|| {
        TicTacError::internal("SYS.SOLVER_OUTCOME", "solver returned no outcome")
    })
}

fn direct(kernel: &dyn KernelOperator, drivings: &[Vec<Complex64>]) -> Vec<SolveOutcome> {
    let dimension = kernel.dimension();
    let mut outcomes: Vec<Option<SolveOutcome>> = drivings
        .iter()
        .map(|driving| (!all_finite(driving)).then(|| SolveOutcome::non_finite(0, f64::NAN)))
        .collect();
    if outcomes.iter().all(Option::is_some) {
        return outcomes.into_iter().flatten().collect();
    }

    let mut system = DenseComplexMatrix::zeros(dimension, dimension);
    let mut unit = vec![Complex64::new(0.0, 0.0); dimension];
    for col in 0..dimension {
        unit[col] = Complex64::new(1.0, 0.0);
        let image = kernel.apply(&unit);
        unit[col] = Complex64::new(0.0, 0.0);
        for row in 0..dimension {
            let identity = if row == col { 1.0 } else { 0.0 };
            system[(row, col)] = Complex64::new(identity, 0.0) - image[row];
        }
    }

    let (factorized, failure) = match lu_factorize(&system) {
        Ok(factorized) => (Some(factorized), NonConvergenceReason::SingularSystem),
        Err(error) => {
            debug!(%error, "dense factorization failed");
            let reason = match error {
                LuError::NonFiniteEntry { .. } => NonConvergenceReason::NonFinite,
                _ => NonConvergenceReason::SingularSystem,
            };
            (None, reason)
        }
    };
    let failed = |reason| {
        SolveOutcome::NonConvergent(NonConvergence {
            iterations: 0,
            last_change: f64::INFINITY,
            reason,
        })
    };
    drivings
        .iter()
        .zip(outcomes.iter_mut())
        .map(|(driving, outcome)| {
            if let Some(outcome) = outcome.take() {
                return outcome;
            }
            let Some(factorized) = factorized.as_ref() else {
                return failed(failure);
            };
            match factorized.solve(driving) {
                Ok(amplitude) if all_finite(&amplitude) => {
                    let residual = residual_norm(kernel, &amplitude, driving);
                    SolveOutcome::Converged(Solution {
                        amplitude,
                        iterations: 1,
                        residual,
                    })
                }
                Ok(_) => SolveOutcome::non_finite(1, f64::NAN),
                Err(_) => failed(NonConvergenceReason::SingularSystem),
            }
        })
        .collect()
}

fn neumann(
    kernel: &dyn KernelOperator,
    driving: &[Complex64],
    settings: &SolverSettings,
) -> SolveOutcome {
    if !all_finite(driving) {
        return SolveOutcome::non_finite(0, f64::NAN);
    }
    let mut amplitude = driving.to_vec();
    let mut change = f64::INFINITY;
    for iteration in 1..=settings.max_iterations {
        let image = kernel.apply(&amplitude);
        let next: Vec<Complex64> = driving.iter().zip(&image).map(|(b, k)| b + k).collect();
        if !all_finite(&next) {
            return SolveOutcome::non_finite(iteration, change);
        }
        change = relative_change(&next, &amplitude, f64::MIN_POSITIVE);
        amplitude = next;
        debug!(iteration, change, "neumann step");
        if change < settings.tolerance {
            return SolveOutcome::Converged(Solution {
                amplitude,
                iterations: iteration,
                residual: change,
            });
        }
    }
    SolveOutcome::NonConvergent(NonConvergence {
        iterations: settings.max_iterations,
        last_change: change,
        reason: NonConvergenceReason::BudgetExhausted,
    })
}

// ||b - (x - K x)|| / ||b||.
fn residual_norm(kernel: &dyn KernelOperator, amplitude: &[Complex64], driving: &[Complex64]) -> f64 {
    let image = kernel.apply(amplitude);
    let residual: Vec<Complex64> = driving
        .iter()
        .zip(amplitude.iter().zip(&image))
        .map(|(b, (x, k))| b - (x - k))
        .collect();
    complex_norm(&residual) / complex_norm(driving).max(f64::MIN_POSITIVE)
}

fn apply_system(kernel: &dyn KernelOperator, input: &[Complex64]) -> Vec<Complex64> {
    let image = kernel.apply(input);
    input.iter().zip(&image).map(|(x, k)| x - k).collect()
}

fn dot(lhs: &[Complex64], rhs: &[Complex64]) -> Complex64 {
    lhs.iter().zip(rhs).map(|(a, b)| a.conj() * b).sum()
}

// Complex Givens rotation zeroing `b` in `(a, b)`.
fn givens(a: Complex64, b: Complex64) -> (f64, Complex64) {
    let a_norm = a.norm();
    let b_norm = b.norm();
    if b_norm == 0.0 {
        return (1.0, Complex64::new(0.0, 0.0));
    }
    if a_norm == 0.0 {
        return (0.0, b.conj() / b_norm);
    }
    let radius = a_norm.hypot(b_norm);
    let cosine = a_norm / radius;
    let sine = (a / a_norm) * b.conj() / radius;
    (cosine, sine)
}

/// Restarted GMRES with complex Givens rotations.
fn gmres(kernel: &dyn KernelOperator, driving: &[Complex64], settings: &SolverSettings) -> SolveOutcome {
    if !all_finite(driving) {
        return SolveOutcome::non_finite(0, f64::NAN);
    }
    let dimension = kernel.dimension();
    let driving_norm = complex_norm(driving);
    if driving_norm == 0.0 {
        return SolveOutcome::Converged(Solution {
            amplitude: vec![Complex64::new(0.0, 0.0); dimension],
            iterations: 0,
            residual: 0.0,
        });
    }

    let restart = settings.restart.min(dimension).max(1);
    let mut amplitude = vec![Complex64::new(0.0, 0.0); dimension];
    let mut iterations = 0;
    let mut relative = 1.0;

    while iterations < settings.max_iterations {
        let image = apply_system(kernel, &amplitude);
        let residual: Vec<Complex64> = driving.iter().zip(&image).map(|(b, a)| b - a).collect();
        let beta = complex_norm(&residual);
        if !beta.is_finite() {
            return SolveOutcome::non_finite(iterations, relative);
        }
        relative = beta / driving_norm;
        if relative < settings.tolerance {
            return SolveOutcome::Converged(Solution {
                amplitude,
                iterations,
                residual: relative,
            });
        }

        let mut basis: Vec<Vec<Complex64>> = vec![residual.iter().map(|r| r / beta).collect()];
        let mut hessenberg: Vec<Vec<Complex64>> = Vec::with_capacity(restart);
        let mut rotations: Vec<(f64, Complex64)> = Vec::with_capacity(restart);
        let mut rhs = vec![Complex64::new(0.0, 0.0); restart + 1];
        rhs[0] = Complex64::new(beta, 0.0);
        let mut used = 0;

        for step in 0..restart {
            if iterations >= settings.max_iterations {
                break;
            }
            iterations += 1;
            let mut candidate = apply_system(kernel, &basis[step]);
            let mut column = vec![Complex64::new(0.0, 0.0); step + 2];
            for (row, vector) in basis.iter().enumerate() {
                let projection = dot(vector, &candidate);
                column[row] = projection;
                for (entry, base) in candidate.iter_mut().zip(vector) {
                    *entry -= projection * base;
                }
            }
            let norm = complex_norm(&candidate);
            if !norm.is_finite() || !all_finite(&column) {
                return SolveOutcome::non_finite(iterations, relative);
            }
            column[step + 1] = Complex64::new(norm, 0.0);

            for (row, (cosine, sine)) in rotations.iter().enumerate() {
                let upper = column[row];
                let lower = column[row + 1];
                column[row] = *cosine * upper + sine * lower;
                column[row + 1] = -sine.conj() * upper + *cosine * lower;
            }
            let (cosine, sine) = givens(column[step], column[step + 1]);
            let upper = column[step];
            let lower = column[step + 1];
            column[step] = cosine * upper + sine * lower;
            column[step + 1] = Complex64::new(0.0, 0.0);
            rotations.push((cosine, sine));
            rhs[step + 1] = -sine.conj() * rhs[step];
            rhs[step] *= cosine;

            hessenberg.push(column);
            used = step + 1;
            relative = rhs[step + 1].norm() / driving_norm;
            debug!(iteration = iterations, residual = relative, "gmres step");
            if relative < settings.tolerance || norm == 0.0 {
                break;
            }
            basis.push(candidate.iter().map(|c| c / norm).collect());
        }

        // Back substitution on the rotated upper-triangular system.
        let mut coefficients = vec![Complex64::new(0.0, 0.0); used];
        for row in (0..used).rev() {
            let mut value = rhs[row];
            for col in (row + 1)..used {
                value -= hessenberg[col][row] * coefficients[col];
            }
            let pivot = hessenberg[row][row];
            if pivot.norm() == 0.0 {
                return SolveOutcome::NonConvergent(NonConvergence {
                    iterations,
                    last_change: relative,
                    reason: NonConvergenceReason::SingularSystem,
                });
            }
            coefficients[row] = value / pivot;
        }
        for (coefficient, vector) in coefficients.iter().zip(&basis) {
            for (entry, base) in amplitude.iter_mut().zip(vector) {
                *entry += coefficient * base;
            }
        }
        if !all_finite(&amplitude) {
            return SolveOutcome::non_finite(iterations, relative);
        }
    }

    let final_residual = residual_norm(kernel, &amplitude, driving);
    if final_residual < settings.tolerance {
        return SolveOutcome::Converged(Solution {
            amplitude,
            iterations,
            residual: final_residual,
        });
    }
    SolveOutcome::NonConvergent(NonConvergence {
        iterations,
        last_change: final_residual,
        reason: NonConvergenceReason::BudgetExhausted,
    })
}
