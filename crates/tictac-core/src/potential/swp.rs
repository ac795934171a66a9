//! Scattering wave packets: eigenstates of the pair Hamiltonian in the
//! wave-packet basis.

use super::{PotentialMatrix, PotentialModel};
use crate::basis::{TwoBodyChannel, WavePacketGrid};
use crate::domain::{TicTacError, TicTacResult};
use crate::numerics::deterministic_argsort;
use crate::numerics::special::{DenseRealMatrix, symmetric_eigen};
use crate::resolvent::EnergyBin;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct SwpBasis {
    energies: Vec<f64>,
    vectors: DenseRealMatrix,
    bins: Vec<EnergyBin>,
    bound_levels: usize,
}

impl SwpBasis {
    /// Diagonalizes `H = H0 + V` for one two-body channel.
    pub fn diagonalize(
        potential: &PotentialMatrix,
        grid: &WavePacketGrid,
        kappa: f64,
    ) -> TicTacResult<Self> {
        let cells = potential.cells();
        let dimension = potential.dimension();
        let mut hamiltonian = potential.values().clone();
        for row in 0..dimension {
            hamiltonian[(row, row)] += kappa * grid.mean_square_momentum(row % cells);
        }

        let eigen = symmetric_eigen(&hamiltonian).map_err(|error| {
            TicTacError::computation(
                "RUN.EIGEN",
                format!("{}: {error}", potential.channel().label()),
            )
        })?;

        let bound_levels = eigen.values.iter().filter(|energy| **energy < 0.0).count();
        let bins = assign_bins(&eigen.values, bound_levels, grid, kappa, dimension / cells);

        Ok(Self {
            energies: eigen.values,
            vectors: eigen.vectors,
            bins,
            bound_levels,
        })
    }

    pub fn len(&self) -> usize {
        self.energies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energies.is_empty()
    }

    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    pub fn energy(&self, level: usize) -> f64 {
        self.energies[level]
    }

    /// Column `k` holds level `k` in the `(component, cell)` packet basis.
    pub fn vectors(&self) -> &DenseRealMatrix {
        &self.vectors
    }

    pub fn bins(&self) -> &[EnergyBin] {
        &self.bins
    }

    pub fn bin(&self, level: usize) -> EnergyBin {
        self.bins[level]
    }

    pub fn bound_levels(&self) -> usize {
        self.bound_levels
    }

    pub fn bound_energies(&self) -> &[f64] {
        &self.energies[..self.bound_levels]
    }
}

// Continuum level k borrows the shape of free cell (k + n_bound), ordering the
// free cells of every orbital component by energy.
fn assign_bins(
    energies: &[f64],
    bound_levels: usize,
    grid: &WavePacketGrid,
    kappa: f64,
    components: usize,
) -> Vec<EnergyBin> {
    let cells = grid.cells();
    let free: Vec<(f64, f64, f64)> = (0..components * cells)
        .map(|slot| {
            let (lower, upper) = grid.cell(slot % cells);
            (
                kappa * grid.mean_square_momentum(slot % cells),
                kappa * lower * lower,
                kappa * upper * upper,
            )
        })
        .collect();
    let centres: Vec<f64> = free.iter().map(|(centre, _, _)| *centre).collect();
    let order = deterministic_argsort(&centres);

    energies
        .iter()
        .enumerate()
        .map(|(level, energy)| {
            if level < bound_levels {
                return EnergyBin::Bound { energy: *energy };
            }
            let slot = order[level.min(order.len() - 1)];
            let (centre, lower, upper) = free[slot];
            EnergyBin::Continuum {
                lower: (energy - (centre - lower)).max(0.0),
                upper: energy + (upper - centre),
            }
        })
        .collect()
}

/// Everything downstream needs from one two-body channel.
#[derive(Debug, Clone)]
pub struct TwoBodySpectrum {
    pub channel: TwoBodyChannel,
    pub potential: PotentialMatrix,
    pub swp: SwpBasis,
    /// `O^T V O`, the potential between levels.
    pub level_potential: DenseRealMatrix,
}

impl TwoBodySpectrum {
    pub fn build(
        model: &dyn PotentialModel,
        channel: &TwoBodyChannel,
        grid: &WavePacketGrid,
        kappa: f64,
    ) -> TicTacResult<Self> {
        let potential = PotentialMatrix::evaluate(model, channel, grid)?;
        let swp = SwpBasis::diagonalize(&potential, grid, kappa)?;
        let level_potential = rotate(potential.values(), swp.vectors());
        debug!(
            channel = %channel.label(),
            levels = swp.len(),
            bound = swp.bound_levels(),
            "diagonalized pair Hamiltonian"
        );
        Ok(Self {
            channel: channel.clone(),
            potential,
            swp,
            level_potential,
        })
    }
}

fn rotate(matrix: &DenseRealMatrix, vectors: &DenseRealMatrix) -> DenseRealMatrix {
    let n = matrix.nrows();
    let mut half = DenseRealMatrix::zeros(n, n);
    for row in 0..n {
        for col in 0..n {
            let mut sum = 0.0;
            for inner in 0..n {
                sum += matrix[(row, inner)] * vectors[(inner, col)];
            }
            half[(row, col)] = sum;
        }
    }
    let mut rotated = DenseRealMatrix::zeros(n, n);
    for row in 0..n {
        for col in 0..n {
            let mut sum = 0.0;
            for inner in 0..n {
                sum += vectors[(inner, row)] * half[(inner, col)];
            }
            rotated[(row, col)] = sum;
        }
    }
    rotated
}

/// Builds the spectrum of every two-body channel in parallel.
pub fn build_spectra(
    model: &dyn PotentialModel,
    channels: &[TwoBodyChannel],
    grid: &WavePacketGrid,
    kappa: f64,
) -> TicTacResult<Vec<Arc<TwoBodySpectrum>>> {
    let spectra = channels
        .par_iter()
        .map(|channel| TwoBodySpectrum::build(model, channel, grid, kappa).map(Arc::new))
        .collect::<TicTacResult<Vec<_>>>()?;
    info!(
        model = model.name(),
        channels = spectra.len(),
        "two-body spectra ready"
    );
    Ok(spectra)
}

#[cfg(test)]
mod tests {
    use super::{SwpBasis, TwoBodySpectrum};
    use crate::basis::{
        GridConfig, GridShape, PacketWeight, TwoBodyChannel, TwoBodyKey, WavePacketGrid,
    };
    use crate::potential::{MalflietTjon, MalflietTjonVariant, PotentialMatrix, Yamaguchi};
    use crate::resolvent::EnergyBin;

    const KAPPA: f64 = 41.47;

    fn grid(cells: usize) -> WavePacketGrid {
        WavePacketGrid::build(GridConfig {
            cells,
            cutoff: 12.0,
            minimum: 0.0,
            shape: GridShape::Chebyshev {
                scale: 1.0,
                power: 1.0,
            },
            weight: PacketWeight::Unit,
            points_per_cell: 6,
        })
        .expect("grid")
    }

    fn triplet_s_wave() -> TwoBodyChannel {
        TwoBodyChannel {
            key: TwoBodyKey {
                s: 1,
                j: 1,
                t: 0,
                two_t: 1,
            },
            orbitals: vec![0],
        }
    }

    #[test]
    fn eigenvectors_are_orthonormal() {
        let grid = grid(24);
        let model = MalflietTjon::new(MalflietTjonVariant::SpinDependent);
        let potential = PotentialMatrix::evaluate(&model, &triplet_s_wave(), &grid).expect("V");
        let swp = SwpBasis::diagonalize(&potential, &grid, KAPPA).expect("swp");
        let vectors = swp.vectors();
        let n = swp.len();
        for a in 0..n {
            for b in 0..n {
                let dot: f64 = (0..n).map(|row| vectors[(row, a)] * vectors[(row, b)]).sum();
                let expected = if a == b { 1.0 } else { 0.0 };
                assert!((dot - expected).abs() <= 1.0e-10, "({a},{b}) dot={dot}");
            }
        }
    }

    #[test]
    fn malfliet_tjon_triplet_binds_a_deuteron() {
        let grid = grid(30);
        let model = MalflietTjon::new(MalflietTjonVariant::SpinDependent);
        let spectrum =
            TwoBodySpectrum::build(&model, &triplet_s_wave(), &grid, KAPPA).expect("spectrum");
        assert_eq!(spectrum.swp.bound_levels(), 1);
        let binding = -spectrum.swp.bound_energies()[0];
        assert!(binding > 1.5 && binding < 3.0, "binding={binding}");
        assert!(spectrum.swp.bin(0).is_bound());
    }

    #[test]
    fn yamaguchi_bound_state_is_reproduced() {
        let grid = grid(40);
        let model = Yamaguchi::with_binding(1.4488, 2.2246, KAPPA);
        let spectrum =
            TwoBodySpectrum::build(&model, &triplet_s_wave(), &grid, KAPPA).expect("spectrum");
        let energy = spectrum.swp.bound_energies()[0];
        assert!((energy + 2.2246).abs() <= 0.05 * 2.2246, "energy={energy}");
    }

    #[test]
    fn continuum_bins_bracket_their_levels() {
        let grid = grid(20);
        let model = Yamaguchi::with_binding(1.4488, 2.2246, KAPPA);
        let spectrum =
            TwoBodySpectrum::build(&model, &triplet_s_wave(), &grid, KAPPA).expect("spectrum");
        for (level, bin) in spectrum.swp.bins().iter().enumerate() {
            match *bin {
                EnergyBin::Bound { energy } => assert!(energy < 0.0),
                EnergyBin::Continuum { lower, upper } => {
                    let energy = spectrum.swp.energy(level);
                    assert!(lower >= 0.0 && lower <= energy && energy < upper);
                }
            }
        }
    }

    #[test]
    fn level_potential_is_symmetric() {
        let grid = grid(12);
        let model = Yamaguchi::with_binding(1.4488, 2.2246, KAPPA);
        let spectrum =
            TwoBodySpectrum::build(&model, &triplet_s_wave(), &grid, KAPPA).expect("spectrum");
        let n = spectrum.swp.len();
        for row in 0..n {
            for col in 0..n {
                assert!(
                    (spectrum.level_potential[(row, col)] - spectrum.level_potential[(col, row)])
                        .abs()
                        <= 1.0e-9
                );
            }
        }
    }
}
