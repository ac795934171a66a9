//! Parallel assembly of the exchange operator between wave-packet states.
//!
//! Row block `(alpha, q_j)` collects every element `<alpha p_i q_j|P123|alpha' p_i' q_j'>`.
//! For each pair of spectator nodes the angle range is split wherever the
//! relabeled momenta cross a p-cell boundary, so each angular piece maps onto
//! one `(p_i, p_i')` pair and is integrated with fixed-order Gauss-Legendre.

use super::geometry::{ChannelCoupling, ExchangeGeometry, HarmonicTable, exchange_magnitudes};
use super::sparse::{SparseMatrix, Triplet};
use crate::basis::{ChannelSet, GridSet, WavePacketBasis, WavePacketGrid};
use crate::domain::{TicTacError, TicTacResult};
use crate::numerics::special::GaussLegendre;
use num_complex::Complex64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MismatchPolicy {
    /// Recompute and overwrite a corrupt or mismatched artifact.
    #[default]
    Recompute,
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PermutationSettings {
    pub angle_points: usize,
    /// Entries of `P123 + P132` with a smaller magnitude are not stored.
    pub drop_threshold: f64,
    /// Replace the spectator quadrature by cell midpoints.
    pub midpoint: bool,
    /// Worker threads; 0 uses the rayon default.
    pub threads: usize,
    pub store_directory: Option<PathBuf>,
    pub mismatch_policy: MismatchPolicy,
}

impl Default for PermutationSettings {
    fn default() -> Self {
        Self {
            angle_points: 16,
            drop_threshold: 1.0e-10,
            midpoint: false,
            threads: 0,
            store_directory: None,
            mismatch_policy: MismatchPolicy::Recompute,
        }
    }
}

impl PermutationSettings {
    pub fn validate(&self) -> TicTacResult<()> {
        if self.angle_points == 0 {
            return Err(TicTacError::input_validation(
                "INPUT.PERMUTATION",
                "anglePoints must be positive",
            ));
        }
        if !(self.drop_threshold.is_finite() && self.drop_threshold >= 0.0) {
            return Err(TicTacError::input_validation(
                "INPUT.PERMUTATION",
                format!(
                    "dropThreshold must be a non-negative number, got {}",
                    self.drop_threshold
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyReport {
    pub blocks: usize,
    /// Cell integrals of the cyclic exchange `P123`.
    pub integrals: usize,
    /// Angular pieces whose relabeled momenta leave the p-grid.
    pub outside_grid: usize,
    /// Angular pieces without a usable quadrature rule.
    pub skipped_quadrature: usize,
    /// Integrals whose cell triple has no basis index.
    pub skipped_index: usize,
    pub dropped_non_finite: usize,
    /// Distinct entries of `P123 + P132` before the threshold.
    pub candidates: usize,
    pub dropped_small: usize,
}

impl AssemblyReport {
    fn absorb(&mut self, other: &BlockOutcome) {
        self.blocks += 1;
        self.integrals += other.integrals;
        self.outside_grid += other.outside_grid;
        self.skipped_quadrature += other.skipped_quadrature;
        self.skipped_index += other.skipped_index;
        self.dropped_non_finite += other.dropped_non_finite;
    }
}

#[derive(Debug, Default)]
struct BlockOutcome {
    triplets: Vec<Triplet>,
    integrals: usize,
    outside_grid: usize,
    skipped_quadrature: usize,
    skipped_index: usize,
    dropped_non_finite: usize,
}

struct AssemblyContext<'a> {
    channels: &'a ChannelSet,
    basis: &'a WavePacketBasis,
    p: &'a WavePacketGrid,
    // couplings[alpha] = [(alpha', G)] for every channel reached by the exchange.
    couplings: Vec<Vec<(usize, ChannelCoupling)>>,
    // Spectator nodes per q-cell, weights already carrying q f(q) / sqrt(C).
    spectator_nodes: Vec<Vec<(f64, f64)>>,
    angle_rule: GaussLegendre,
    max_degree: u32,
}

/// Builds `P = P123 + P132` over the whole basis of one `(J, pi)` block.
pub fn assemble(
    channels: &ChannelSet,
    grids: &GridSet,
    basis: &WavePacketBasis,
    settings: &PermutationSettings,
) -> TicTacResult<(SparseMatrix, AssemblyReport)> {
    let (cyclic, mut report) = assemble_cyclic(channels, grids, basis, settings)?;
    let (triplets, dropped_small) = symmetrise(&cyclic, settings.drop_threshold);
    report.candidates = triplets.len() + dropped_small;
    report.dropped_small = dropped_small;

    let matrix = SparseMatrix::from_triplets(basis.len(), triplets, 0.0);
    info!(
        block = %channels.block(),
        dimension = matrix.dimension(),
        nnz = matrix.nnz(),
        candidates = report.candidates,
        dropped_small = report.dropped_small,
        "assembled permutation operator"
    );
    Ok((matrix, report))
}

/// Unthresholded entries of the cyclic exchange `P123`.
fn assemble_cyclic(
    channels: &ChannelSet,
    grids: &GridSet,
    basis: &WavePacketBasis,
    settings: &PermutationSettings,
) -> TicTacResult<(Vec<Triplet>, AssemblyReport)> {
    settings.validate()?;
    let context = AssemblyContext::new(channels, grids, basis, settings)?;

    let jobs: Vec<(usize, usize)> = (0..channels.len())
        .flat_map(|alpha| (0..grids.q.cells()).map(move |q_cell| (alpha, q_cell)))
        .collect();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.threads)
        .build()
        .map_err(|error| TicTacError::internal("SYS.THREAD_POOL", error.to_string()))?;

    let outcomes: Vec<BlockOutcome> = pool.install(|| {
        jobs.par_iter()
            .map(|(alpha, q_cell)| context.row_block(*alpha, *q_cell))
            .collect()
    });

    let mut report = AssemblyReport::default();
    let mut triplets = Vec::new();
    for outcome in outcomes {
        report.absorb(&outcome);
        triplets.extend(outcome.triplets);
    }
    if report.dropped_non_finite > 0 {
        warn!(
            block = %channels.block(),
            dropped = report.dropped_non_finite,
            "non-finite exchange elements treated as zero"
        );
    }
    if report.skipped_quadrature + report.skipped_index > 0 {
        warn!(
            block = %channels.block(),
            quadrature = report.skipped_quadrature,
            index = report.skipped_index,
            "exchange contributions skipped"
        );
    }
    debug!(
        block = %channels.block(),
        outside_grid = report.outside_grid,
        "angular pieces outside the p-grid"
    );
    Ok((triplets, report))
}

/// Adds the transpose of `P123` and drops summed entries below `threshold`.
fn symmetrise(cyclic: &[Triplet], threshold: f64) -> (Vec<Triplet>, usize) {
    let mut summed: BTreeMap<(usize, usize), Complex64> = BTreeMap::new();
    for triplet in cyclic {
        *summed.entry((triplet.row, triplet.col)).or_default() += triplet.value;
        *summed.entry((triplet.col, triplet.row)).or_default() += triplet.value.conj();
    }
    let total = summed.len();
    let kept: Vec<Triplet> = summed
        .into_iter()
        .filter(|(_, value)| value.norm() >= threshold)
        .map(|((row, col), value)| Triplet { row, col, value })
        .collect();
    let dropped = total - kept.len();
    (kept, dropped)
}

impl<'a> AssemblyContext<'a> {
    fn new(
        channels: &'a ChannelSet,
        grids: &'a GridSet,
        basis: &'a WavePacketBasis,
        settings: &PermutationSettings,
    ) -> TicTacResult<Self> {
        let couplings: Vec<Vec<(usize, ChannelCoupling)>> = (0..channels.len())
            .map(|alpha| {
                (0..channels.len())
                    .filter_map(|beta| {
                        ChannelCoupling::between(channels.channel(alpha), channels.channel(beta))
                            .map(|coupling| (beta, coupling))
                    })
                    .collect()
            })
            .collect();
        let max_degree = couplings
            .iter()
            .flatten()
            .map(|(_, coupling)| coupling.max_degree())
            .max()
            .unwrap_or(0)
            .max(channels.max_orbital());

        let q = grids.q.as_ref();
        let spectator_nodes = (0..q.cells())
            .map(|cell| {
                let scale = q.norm(cell).sqrt();
                q.nodes(cell, settings.midpoint).map(|nodes| {
                    nodes
                        .into_iter()
                        .map(|(momentum, weight)| {
                            (momentum, weight * momentum * q.weight(momentum) / scale)
                        })
                        .collect()
                })
            })
            .collect::<TicTacResult<Vec<Vec<(f64, f64)>>>>()?;
        let angle_rule = GaussLegendre::new(settings.angle_points)
            .map_err(|error| TicTacError::input_validation("INPUT.PERMUTATION", error.to_string()))?;

        Ok(Self {
            channels,
            basis,
            p: grids.p.as_ref(),
            couplings,
            spectator_nodes,
            angle_rule,
            max_degree,
        })
    }

    fn row_block(&self, alpha: usize, q_cell: usize) -> BlockOutcome {
        let targets = &self.couplings[alpha];
        if targets.is_empty() {
            return BlockOutcome::default();
        }

        let mut outcome = BlockOutcome::default();
        // (p_i, target index, p_i', q_j') -> unnormalized integral.
        let mut accumulator: BTreeMap<(usize, usize, usize, usize), f64> = BTreeMap::new();
        for &(q, q_weight) in &self.spectator_nodes[q_cell] {
            for (q_prime_cell, nodes) in self.spectator_nodes.iter().enumerate() {
                for &(q_prime, q_prime_weight) in nodes {
                    let spectator_weight = q_weight * q_prime_weight;
                    for (lower, upper) in self.angle_pieces(q, q_prime) {
                        let (bra_mid, ket_mid) =
                            exchange_magnitudes(q, q_prime, 0.5 * (lower + upper));
                        let (Some(p_cell), Some(p_prime_cell)) =
                            (self.p.locate(bra_mid), self.p.locate(ket_mid))
                        else {
                            outcome.outside_grid += 1;
                            continue;
                        };
                        let Ok(points) = self.angle_rule.mapped(lower, upper) else {
                            outcome.skipped_quadrature += 1;
                            continue;
                        };
                        for (x, x_weight) in points {
                            let (bra, ket) = exchange_magnitudes(q, q_prime, x);
                            let radial = self.p.weight(bra) / bra * self.p.weight(ket) / ket;
                            let table = HarmonicTable::new(
                                &ExchangeGeometry::new(q, q_prime, x),
                                self.max_degree,
                            );
                            let weight = spectator_weight * x_weight * radial;
                            for (target, (_, coupling)) in targets.iter().enumerate() {
                                *accumulator
                                    .entry((p_cell, target, p_prime_cell, q_prime_cell))
                                    .or_insert(0.0) += weight * coupling.evaluate(&table);
                            }
                        }
                    }
                }
            }
        }

        for ((p_cell, target, p_prime_cell, q_prime_cell), integral) in accumulator {
            outcome.integrals += 1;
            let beta = targets[target].0;
            let value = integral / (self.p.norm(p_cell) * self.p.norm(p_prime_cell)).sqrt();
            if !value.is_finite() {
                outcome.dropped_non_finite += 1;
                continue;
            }
            let (Some(row), Some(col)) = (
                self.basis.index_of(alpha, p_cell, q_cell),
                self.basis.index_of(beta, p_prime_cell, q_prime_cell),
            ) else {
                outcome.skipped_index += 1;
                continue;
            };
            outcome.triplets.push(Triplet {
                row,
                col,
                value: Complex64::new(value, 0.0),
            });
        }
        debug!(
            channel = %self.channels.channel(alpha),
            q_cell,
            entries = outcome.triplets.len(),
            "row block done"
        );
        outcome
    }

    /// Subintervals of `[-1, 1]` on which both relabeled momenta stay inside
    /// one p-cell each.
    fn angle_pieces(&self, q: f64, q_prime: f64) -> Vec<(f64, f64)> {
        let product = q * q_prime;
        let mut breaks = vec![-1.0, 1.0];
        if product > 0.0 {
            for boundary in self.p.boundaries() {
                let squared = boundary * boundary;
                for x in [
                    (squared - q_prime * q_prime - 0.25 * q * q) / product,
                    (squared - q * q - 0.25 * q_prime * q_prime) / product,
                ] {
                    if x > -1.0 && x < 1.0 {
                        breaks.push(x);
                    }
                }
            }
        }
        breaks.sort_by(f64::total_cmp);
        breaks.dedup();
        breaks
            .windows(2)
            .filter(|pair| pair[1] - pair[0] > 1.0e-14)
            .map(|pair| (pair[0], pair[1]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{PermutationSettings, assemble, assemble_cyclic, symmetrise};
    use crate::basis::{
        ChannelRules, ChannelSet, GridConfig, GridSet, GridShape, PacketWeight, WavePacketBasis,
    };
    use crate::domain::{JpBlock, Parity};
    use crate::permutation::sparse::Triplet;
    use num_complex::Complex64;

    fn grids(p_cells: usize, q_cells: usize) -> GridSet {
        let config = |cells| GridConfig {
            cells,
            cutoff: 6.0,
            minimum: 0.0,
            shape: GridShape::Chebyshev {
                scale: 1.0,
                power: 1.0,
            },
            weight: PacketWeight::Unit,
            points_per_cell: 3,
        };
        GridSet::build(config(p_cells), config(q_cells)).expect("grids")
    }

    fn s_wave_set(p_cells: usize, q_cells: usize) -> ChannelSet {
        let rules = ChannelRules {
            two_j3_max: 1,
            j2_max: 0,
            tensor_force: false,
            isospin_breaking: false,
        };
        ChannelSet::enumerate(&rules, JpBlock::new(1, Parity::Even), p_cells, q_cells)
            .expect("channels")
    }

    #[test]
    fn assembled_operator_is_symmetric_and_sparse_storage_is_bounded() {
        let grids = grids(6, 5);
        let channels = s_wave_set(6, 5);
        let basis = WavePacketBasis::new(&channels, 6, 5);
        let settings = PermutationSettings {
            angle_points: 6,
            threads: 2,
            ..PermutationSettings::default()
        };
        let (matrix, report) = assemble(&channels, &grids, &basis, &settings).expect("assembly");
        assert_eq!(matrix.dimension(), basis.len());
        assert!(matrix.nnz() > 0);
        assert!(matrix.nnz() <= basis.len() * basis.len());
        assert!(matrix.max_asymmetry() <= 1.0e-12);
        assert_eq!(report.blocks, channels.len() * 5);
        assert_eq!(report.dropped_non_finite, 0);
        assert_eq!(report.skipped_quadrature, 0);
        assert_eq!(report.skipped_index, 0);
        assert_eq!(matrix.nnz(), report.candidates - report.dropped_small);
    }

    #[test]
    fn cyclic_exchange_alone_is_symmetric() {
        let grids = grids(5, 4);
        let channels = s_wave_set(5, 4);
        let basis = WavePacketBasis::new(&channels, 5, 4);
        let settings = PermutationSettings {
            angle_points: 5,
            threads: 1,
            ..PermutationSettings::default()
        };
        let (cyclic, report) =
            assemble_cyclic(&channels, &grids, &basis, &settings).expect("assembly");
        assert_eq!(cyclic.len(), report.integrals - report.dropped_non_finite);
        let dense = {
            let mut dense = vec![Complex64::new(0.0, 0.0); basis.len() * basis.len()];
            for triplet in &cyclic {
                dense[triplet.row * basis.len() + triplet.col] += triplet.value;
            }
            dense
        };
        let largest = dense.iter().map(|value| value.norm()).fold(0.0, f64::max);
        assert!(largest > 0.0);
        for row in 0..basis.len() {
            for col in 0..row {
                let lhs = dense[row * basis.len() + col];
                let rhs = dense[col * basis.len() + row];
                assert!(
                    (lhs - rhs).norm() <= 1.0e-10 * largest,
                    "({row}, {col}): {lhs} vs {rhs}"
                );
            }
        }
    }

    #[test]
    fn relabeled_momenta_beyond_the_cutoff_are_counted() {
        let grids = grids(4, 3);
        let channels = s_wave_set(4, 3);
        let basis = WavePacketBasis::new(&channels, 4, 3);
        let settings = PermutationSettings {
            angle_points: 3,
            threads: 1,
            ..PermutationSettings::default()
        };
        let (_, report) = assemble(&channels, &grids, &basis, &settings).expect("assembly");
        // |q'| + |q|/2 reaches 1.5 times the shared cutoff.
        assert!(report.outside_grid > 0);
        assert_eq!(report.skipped_quadrature + report.skipped_index, 0);
    }

    #[test]
    fn threshold_applies_to_the_symmetrised_sum() {
        let entry = |row, col, value| Triplet {
            row,
            col,
            value: Complex64::new(value, 0.0),
        };
        // Both halves sit below the threshold, their sum does not.
        let (kept, dropped) = symmetrise(&[entry(0, 1, 0.6), entry(1, 0, 0.6)], 1.0);
        assert_eq!(dropped, 0);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|triplet| (triplet.value.re - 1.2).abs() <= 1.0e-15));

        // Halves above the threshold that cancel are dropped.
        let (kept, dropped) = symmetrise(&[entry(0, 1, 2.0), entry(1, 0, -2.0)], 1.0);
        assert!(kept.is_empty());
        assert_eq!(dropped, 2);

        let (kept, dropped) = symmetrise(&[entry(2, 2, 0.7)], 1.0);
        assert_eq!((kept.len(), dropped), (1, 0));
        assert!((kept[0].value.re - 1.4).abs() <= 1.0e-15);
    }

    #[test]
    fn thread_count_does_not_change_the_result() {
        let grids = grids(5, 4);
        let channels = s_wave_set(5, 4);
        let basis = WavePacketBasis::new(&channels, 5, 4);
        let single = PermutationSettings {
            angle_points: 4,
            threads: 1,
            ..PermutationSettings::default()
        };
        let many = PermutationSettings {
            threads: 3,
            ..single.clone()
        };
        let (lhs, _) = assemble(&channels, &grids, &basis, &single).expect("single");
        let (rhs, _) = assemble(&channels, &grids, &basis, &many).expect("many");
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn raising_the_threshold_drops_entries() {
        let grids = grids(5, 4);
        let channels = s_wave_set(5, 4);
        let basis = WavePacketBasis::new(&channels, 5, 4);
        let fine = PermutationSettings {
            angle_points: 4,
            threads: 1,
            ..PermutationSettings::default()
        };
        let coarse = PermutationSettings {
            drop_threshold: 1.0e6,
            ..fine.clone()
        };
        let (dense, _) = assemble(&channels, &grids, &basis, &fine).expect("fine");
        let (empty, report) = assemble(&channels, &grids, &basis, &coarse).expect("coarse");
        assert!(dense.nnz() > 0);
        assert_eq!(empty.nnz(), 0);
        assert_eq!(report.dropped_small, report.candidates);
    }

    #[test]
    fn zero_angle_points_are_rejected() {
        let settings = PermutationSettings {
            angle_points: 0,
            ..PermutationSettings::default()
        };
        let error = settings.validate().expect_err("invalid");
        assert_eq!(error.placeholder(), "INPUT.PERMUTATION");
    }
}
