//! Two-body on-shell read-out from the wave-packet Lippmann-Schwinger equation.
//!
//! The reaction matrix `K = V + V g K` is solved with the principal part of the
//! cell-averaged free resolvent `g`; the on-shell element follows from the
//! packet in which the on-shell momentum lies, and `S` is built unitary from it.

use super::PotentialMatrix;
use crate::basis::WavePacketGrid;
use crate::common::constants::PI;
use crate::domain::{TicTacError, TicTacResult};
use crate::numerics::special::{DenseComplexMatrix, lu_factorize};
use crate::resolvent::free_cell_average;
use num_complex::Complex64;

#[derive(Debug, Clone, PartialEq)]
pub struct OnShellScattering {
    pub energy: f64,
    pub momentum: f64,
    pub cell: usize,
    pub components: usize,
    /// On-shell reaction matrix, row-major over orbital components (MeV fm^3).
    pub reaction: Vec<f64>,
    pub s_matrix: Vec<Complex64>,
}

impl OnShellScattering {
    pub fn s_element(&self, out: usize, inc: usize) -> Complex64 {
        self.s_matrix[out * self.components + inc]
    }

    /// `arg(S_aa) / 2` in radians, the phase shift of an uncoupled wave.
    pub fn phase_shift(&self, component: usize) -> f64 {
        0.5 * self.s_element(component, component).arg()
    }
}

pub fn two_body_on_shell(
    potential: &PotentialMatrix,
    grid: &WavePacketGrid,
    kappa: f64,
    energy: f64,
) -> TicTacResult<OnShellScattering> {
    if !(energy.is_finite() && energy > 0.0) {
        return Err(TicTacError::input_validation(
            "INPUT.ENERGY",
            format!("two-body energy must be positive, got {energy}"),
        ));
    }
    let momentum = (energy / kappa).sqrt();
    let cell = grid.locate(momentum).ok_or_else(|| {
        TicTacError::input_validation(
            "INPUT.ENERGY",
            format!(
                "on-shell momentum {momentum:.4} fm^-1 lies outside the grid [{}, {}]",
                grid.lower(),
                grid.cutoff()
            ),
        )
    })?;

    let cells = potential.cells();
    let dimension = potential.dimension();
    let components = dimension / cells;
    let propagator: Vec<f64> = (0..dimension)
        .map(|slot| free_cell_average(grid, slot % cells, energy, kappa).principal)
        .collect();

    let mut system = DenseComplexMatrix::zeros(dimension, dimension);
    for row in 0..dimension {
        for col in 0..dimension {
            let identity = if row == col { 1.0 } else { 0.0 };
            system[(row, col)] =
                Complex64::new(identity - potential.get(row, col) * propagator[col], 0.0);
        }
    }
    let factorized = lu_factorize(&system).map_err(singular)?;

    // Packet element -> on-shell value: C / (∫ p f dp)^2.
    let conversion = grid.norm(cell) / grid.projection(cell).powi(2);
    let mut reaction = vec![0.0; components * components];
    for inc in 0..components {
        let column = inc * cells + cell;
        let rhs: Vec<Complex64> = (0..dimension)
            .map(|row| Complex64::new(potential.get(row, column), 0.0))
            .collect();
        let solution = factorized.solve(&rhs).map_err(singular)?;
        for out in 0..components {
            reaction[out * components + inc] = solution[out * cells + cell].re * conversion;
        }
    }

    let s_matrix = unitary_s_matrix(&reaction, components, PI * momentum / (2.0 * kappa))?;
    Ok(OnShellScattering {
        energy,
        momentum,
        cell,
        components,
        reaction,
        s_matrix,
    })
}

fn singular(error: crate::numerics::special::LuError) -> TicTacError {
    TicTacError::computation("RUN.SINGULAR", format!("two-body scattering system: {error}"))
}

// S = (1 + i rho K)^-1 (1 - i rho K).
fn unitary_s_matrix(reaction: &[f64], n: usize, rho: f64) -> TicTacResult<Vec<Complex64>> {
    let mut denominator = DenseComplexMatrix::zeros(n, n);
    for row in 0..n {
        for col in 0..n {
            let identity = if row == col { 1.0 } else { 0.0 };
            denominator[(row, col)] = Complex64::new(identity, rho * reaction[row * n + col]);
        }
    }
    let factorized = lu_factorize(&denominator).map_err(singular)?;
    let mut s_matrix = vec![Complex64::new(0.0, 0.0); n * n];
    for col in 0..n {
        let rhs: Vec<Complex64> = (0..n)
            .map(|row| {
                let identity = if row == col { 1.0 } else { 0.0 };
                Complex64::new(identity, -rho * reaction[row * n + col])
            })
            .collect();
        let solution = factorized.solve(&rhs).map_err(singular)?;
        for row in 0..n {
            s_matrix[row * n + col] = solution[row];
        }
    }
    Ok(s_matrix)
}
