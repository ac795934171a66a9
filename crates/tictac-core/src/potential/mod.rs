//! Two-body interaction in the wave-packet basis.

pub mod models;
pub mod scattering;
pub mod swp;

pub use models::{MalflietTjon, MalflietTjonVariant, PotentialSelection, Yamaguchi};
pub use scattering::{OnShellScattering, two_body_on_shell};
pub use swp::{SwpBasis, TwoBodySpectrum, build_spectra};

use crate::basis::{TwoBodyChannel, WavePacketGrid};
use crate::domain::{TicTacError, TicTacResult};
use crate::numerics::special::DenseRealMatrix;
use num_complex::Complex64;

/// A partial-wave projected two-nucleon interaction.
///
/// Values are in MeV fm^3 for the measure `∫ p^2 dp`; `l_out` and `l_in` are
/// orbital components of `channel`.
pub trait PotentialModel: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(
        &self,
        channel: &TwoBodyChannel,
        l_out: u32,
        l_in: u32,
        p_out: f64,
        p_in: f64,
    ) -> Complex64;
}

/// `<p_i, l_a|V|p_j, l_b>`, rows and columns ordered `(component, cell)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PotentialMatrix {
    channel: TwoBodyChannel,
    cells: usize,
    values: DenseRealMatrix,
}

impl PotentialMatrix {
    pub fn evaluate(
        model: &dyn PotentialModel,
        channel: &TwoBodyChannel,
        grid: &WavePacketGrid,
    ) -> TicTacResult<Self> {
        let cells = grid.cells();
        let components = channel.orbitals.len();
        let dimension = components * cells;
        let nodes: Vec<Vec<(f64, f64)>> = (0..cells)
            .map(|cell| grid.nodes(cell, false))
            .collect::<TicTacResult<_>>()?;
        // Packet-weighted nodes: (p, w p f(p) / sqrt(C)).
        let weighted: Vec<Vec<(f64, f64)>> = nodes
            .iter()
            .enumerate()
            .map(|(cell, points)| {
                let scale = grid.norm(cell).sqrt();
                points
                    .iter()
                    .map(|(p, w)| (*p, w * p * grid.weight(*p) / scale))
                    .collect()
            })
            .collect();

        let mut values = DenseRealMatrix::zeros(dimension, dimension);
        for row in 0..dimension {
            let (a, i) = (row / cells, row % cells);
            for col in row..dimension {
                let (b, j) = (col / cells, col % cells);
                let mut element = 0.0;
                for (p_out, w_out) in &weighted[i] {
                    for (p_in, w_in) in &weighted[j] {
                        let value = model.evaluate(
                            channel,
                            channel.orbitals[a],
                            channel.orbitals[b],
                            *p_out,
                            *p_in,
                        );
                        element += w_out * w_in * value.re;
                    }
                }
                if !element.is_finite() {
                    return Err(TicTacError::computation(
                        "RUN.POTENTIAL",
                        format!(
                            "{} produced a non-finite element at ({row}, {col}) in {}",
                            model.name(),
                            channel.label()
                        ),
                    ));
                }
                values[(row, col)] = element;
                values[(col, row)] = element;
            }
        }

        Ok(Self {
            channel: channel.clone(),
            cells,
            values,
        })
    }

    pub fn channel(&self) -> &TwoBodyChannel {
        &self.channel
    }

    pub fn cells(&self) -> usize {
        self.cells
    }

    pub fn dimension(&self) -> usize {
        self.values.nrows()
    }

    pub fn values(&self) -> &DenseRealMatrix {
        &self.values
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[(row, col)]
    }
}

#[cfg(test)]
mod tests {
    use super::{PotentialMatrix, Yamaguchi};
    use crate::basis::{GridConfig, GridShape, PacketWeight, TwoBodyChannel, TwoBodyKey, WavePacketGrid};

    #[test]
    fn separable_matrix_is_rank_one_and_symmetric() {
        let grid = WavePacketGrid::build(GridConfig {
            cells: 6,
            cutoff: 8.0,
            minimum: 0.0,
            shape: GridShape::Linear,
            weight: PacketWeight::Unit,
            points_per_cell: 4,
        })
        .expect("grid");
        let channel = TwoBodyChannel {
            key: TwoBodyKey {
                s: 1,
                j: 1,
                t: 0,
                two_t: 1,
            },
            orbitals: vec![0],
        };
        let model = Yamaguchi::new(50.0, 1.4);
        let matrix = PotentialMatrix::evaluate(&model, &channel, &grid).expect("matrix");
        assert_eq!(matrix.dimension(), 6);
        for row in 0..6 {
            for col in 0..6 {
                assert_eq!(matrix.get(row, col), matrix.get(col, row));
                let rank_one = matrix.get(row, row) * matrix.get(col, col);
                let product = matrix.get(row, col).powi(2);
                assert!((rank_one - product).abs() <= 1.0e-12 * rank_one.abs());
            }
        }
        assert!(matrix.get(0, 0) < 0.0);
    }
}
