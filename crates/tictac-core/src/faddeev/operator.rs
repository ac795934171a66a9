//! The Faddeev kernel `K = P V G1` in the scattering-wave-packet basis.
//!
//! Vectors live on `|sigma, k, q_j>`. The exchange operator is stored over
//! wave packets, so each application rotates to packets, applies `P` and
//! rotates back with the pair eigenvectors of every sector.

use super::solver::KernelOperator;
use crate::basis::{ChannelSet, GridSet, SwpBasisIndex, WavePacketBasis};
use crate::common::constants::SPECTATOR_KINETIC_FACTOR;
use crate::domain::{TicTacError, TicTacResult};
use crate::permutation::SparseMatrix;
use crate::potential::TwoBodySpectrum;
use crate::resolvent::{
    EnergyBin, ResolventSettings, ResolventTreatment, free_cell_average, rectangle_average,
    unsubtracted,
};
use num_complex::Complex64;
use std::sync::Arc;

/// Incoming or outgoing bound pair plus spectator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElasticChannel {
    pub sector: usize,
    pub level: usize,
    /// Three-body channel of the first orbital component.
    pub channel: usize,
    pub bound_energy: f64,
}

#[derive(Debug, Clone)]
struct SectorLayout {
    // First SWP index of the sector; level k, cell j sits at base + k * Nq + j.
    swp_base: usize,
    // First packet index of each component channel; cell (i, j) at base + i * Nq + j.
    packet_bases: Vec<usize>,
}

/// Everything fixed for one `(J, pi)` block across energies.
#[derive(Debug, Clone)]
pub struct BlockSystem {
    channels: ChannelSet,
    grids: GridSet,
    spectra: Vec<Arc<TwoBodySpectrum>>,
    index: SwpBasisIndex,
    packets: WavePacketBasis,
    permutation: Arc<SparseMatrix>,
    layouts: Vec<SectorLayout>,
    kappa: f64,
}

impl BlockSystem {
    /// `spectra[n]` must belong to `channels.two_body_channels()[n]`.
    pub fn new(
        channels: ChannelSet,
        grids: GridSet,
        spectra: Vec<Arc<TwoBodySpectrum>>,
        permutation: Arc<SparseMatrix>,
        kappa: f64,
    ) -> TicTacResult<Self> {
        let two_body = channels.two_body_channels();
        if spectra.len() != two_body.len()
            || spectra
                .iter()
                .zip(two_body)
                .any(|(spectrum, channel)| spectrum.channel != *channel)
        {
            return Err(TicTacError::internal(
                "SYS.SPECTRA",
                format!(
                    "{} spectra supplied for {} two-body channels of {}",
                    spectra.len(),
                    two_body.len(),
                    channels.block()
                ),
            ));
        }

        let p_cells = grids.p.cells();
        let q_cells = grids.q.cells();
        let levels = channels
            .sectors()
            .iter()
            .map(|sector| spectra[sector.two_body].swp.len())
            .collect();
        let index = SwpBasisIndex::new(levels, q_cells);
        let packets = WavePacketBasis::new(&channels, p_cells, q_cells);
        if index.len() != packets.len() || permutation.dimension() != packets.len() {
            return Err(TicTacError::internal(
                "SYS.BASIS_DIMENSION",
                format!(
                    "level basis {} / packet basis {} / exchange operator {} disagree",
                    index.len(),
                    packets.len(),
                    permutation.dimension()
                ),
            ));
        }

        let missing = || TicTacError::internal("SYS.BASIS_INDEX", "sector outside the basis");
        let layouts = channels
            .sectors()
            .iter()
            .enumerate()
            .map(|(sigma, sector)| {
                let swp_base = index.index_of(sigma, 0, 0).ok_or_else(missing)?;
                let packet_bases = sector
                    .channels
                    .iter()
                    .map(|alpha| packets.index_of(*alpha, 0, 0).ok_or_else(missing))
                    .collect::<TicTacResult<Vec<_>>>()?;
                Ok(SectorLayout {
                    swp_base,
                    packet_bases,
                })
            })
            .collect::<TicTacResult<Vec<_>>>()?;

        Ok(Self {
            channels,
            grids,
            spectra,
            index,
            packets,
            permutation,
            layouts,
            kappa,
        })
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    pub fn grids(&self) -> &GridSet {
        &self.grids
    }

    pub fn index(&self) -> &SwpBasisIndex {
        &self.index
    }

    pub fn packets(&self) -> &WavePacketBasis {
        &self.packets
    }

    pub fn permutation(&self) -> &SparseMatrix {
        &self.permutation
    }

    pub fn kappa(&self) -> f64 {
        self.kappa
    }

    pub fn dimension(&self) -> usize {
        self.index.len()
    }

    pub fn spectrum(&self, sector: usize) -> &TwoBodySpectrum {
        &self.spectra[self.channels.sectors()[sector].two_body]
    }

    /// Every bound level of every sector, in sector order.
    pub fn elastic_channels(&self) -> Vec<ElasticChannel> {
        self.channels
            .sectors()
            .iter()
            .enumerate()
            .filter_map(|(sigma, sector)| Some((sigma, *sector.channels.first()?)))
            .flat_map(|(sigma, channel)| {
                self.spectrum(sigma)
                    .swp
                    .bound_energies()
                    .iter()
                    .enumerate()
                    .map(move |(level, energy)| ElasticChannel {
                        sector: sigma,
                        level,
                        channel,
                        bound_energy: *energy,
                    })
            })
            .collect()
    }

    pub fn swp_position(&self, sector: usize, level: usize, q_cell: usize) -> Option<usize> {
        self.index.index_of(sector, level, q_cell)
    }

    /// `O y`: levels to packets.
    pub fn to_packets(&self, levels: &[Complex64]) -> Vec<Complex64> {
        let p_cells = self.grids.p.cells();
        let q_cells = self.grids.q.cells();
        let mut packets = vec![Complex64::new(0.0, 0.0); self.packets.len()];
        for (sigma, layout) in self.layouts.iter().enumerate() {
            let vectors = self.spectrum(sigma).swp.vectors();
            let count = vectors.ncols();
            for (component, packet_base) in layout.packet_bases.iter().enumerate() {
                for p_cell in 0..p_cells {
                    let row = component * p_cells + p_cell;
                    for q_cell in 0..q_cells {
                        let mut sum = Complex64::new(0.0, 0.0);
                        for level in 0..count {
                            sum += vectors[(row, level)]
                                * levels[layout.swp_base + level * q_cells + q_cell];
                        }
                        packets[packet_base + p_cell * q_cells + q_cell] = sum;
                    }
                }
            }
        }
        packets
    }

    /// `O^T u`: packets to levels.
    pub fn to_levels(&self, packets: &[Complex64]) -> Vec<Complex64> {
        let p_cells = self.grids.p.cells();
        let q_cells = self.grids.q.cells();
        let mut levels = vec![Complex64::new(0.0, 0.0); self.index.len()];
        for (sigma, layout) in self.layouts.iter().enumerate() {
            let vectors = self.spectrum(sigma).swp.vectors();
            for level in 0..vectors.ncols() {
                for q_cell in 0..q_cells {
                    let mut sum = Complex64::new(0.0, 0.0);
                    for (component, packet_base) in layout.packet_bases.iter().enumerate() {
                        for p_cell in 0..p_cells {
                            sum += vectors[(component * p_cells + p_cell, level)]
                                * packets[packet_base + p_cell * q_cells + q_cell];
                        }
                    }
                    levels[layout.swp_base + level * q_cells + q_cell] = sum;
                }
            }
        }
        levels
    }

    /// Pair potential between levels, diagonal in the spectator cell.
    pub fn apply_potential(&self, levels: &[Complex64]) -> Vec<Complex64> {
        let q_cells = self.grids.q.cells();
        let mut out = vec![Complex64::new(0.0, 0.0); levels.len()];
        for (sigma, layout) in self.layouts.iter().enumerate() {
            let potential = &self.spectrum(sigma).level_potential;
            let count = potential.nrows();
            for row in 0..count {
                for q_cell in 0..q_cells {
                    let mut sum = Complex64::new(0.0, 0.0);
                    for col in 0..count {
                        sum += potential[(row, col)]
                            * levels[layout.swp_base + col * q_cells + q_cell];
                    }
                    out[layout.swp_base + row * q_cells + q_cell] = sum;
                }
            }
        }
        out
    }

    /// `O^T P O y`.
    pub fn exchange(&self, levels: &[Complex64]) -> Vec<Complex64> {
        self.to_levels(&self.permutation.matvec(&self.to_packets(levels)))
    }

    /// Level energy plus the spectator kinetic average of each basis state.
    pub fn representative_energies(&self) -> Vec<f64> {
        let q = self.grids.q.as_ref();
        self.index
            .states()
            .iter()
            .map(|state| {
                self.spectrum(state.sector).swp.energy(state.level)
                    + SPECTATOR_KINETIC_FACTOR * self.kappa * q.mean_square_momentum(state.q_cell)
            })
            .collect()
    }

    /// Diagonal of the channel resolvent `G1(E)` over the level basis.
    pub fn resolvent(&self, energy: f64, settings: &ResolventSettings) -> Vec<Complex64> {
        let q = self.grids.q.as_ref();
        let spectator = SPECTATOR_KINETIC_FACTOR * self.kappa;
        match settings.treatment {
            ResolventTreatment::Unsubtracted => self
                .representative_energies()
                .into_iter()
                .map(|representative| unsubtracted(energy, representative, settings.epsilon))
                .collect(),
            ResolventTreatment::Subtracted => self
                .index
                .states()
                .iter()
                .map(|state| {
                    let average = match self.spectrum(state.sector).swp.bin(state.level) {
                        EnergyBin::Bound { energy: level } => {
                            free_cell_average(q, state.q_cell, energy - level, spectator)
                        }
                        EnergyBin::Continuum { lower, upper } => {
                            let (q_lower, q_upper) = q.cell(state.q_cell);
                            rectangle_average(
                                energy,
                                (lower, upper),
                                (spectator * q_lower * q_lower, spectator * q_upper * q_upper),
                            )
                        }
                    };
                    average.value()
                })
                .collect(),
        }
    }

    pub fn kernel(&self, energy: f64, settings: &ResolventSettings) -> FaddeevKernel<'_> {
        FaddeevKernel {
            system: self,
            resolvent: self.resolvent(energy, settings),
        }
    }
}

/// `K y = O^T P O V (G1 y)` at one energy.
#[derive(Debug, Clone)]
pub struct FaddeevKernel<'a> {
    system: &'a BlockSystem,
    resolvent: Vec<Complex64>,
}

impl FaddeevKernel<'_> {
    pub fn resolvent(&self) -> &[Complex64] {
        &self.resolvent
    }

    /// Born term `P V |phi, q_j>` for a bound pair in spectator cell `q_cell`.
    pub fn driving(&self, elastic: &ElasticChannel, q_cell: usize) -> TicTacResult<Vec<Complex64>> {
        let position = self
            .system
            .swp_position(elastic.sector, elastic.level, q_cell)
            .ok_or_else(|| {
                TicTacError::internal(
                    "SYS.BASIS_INDEX",
                    format!("no level state for sector {} cell {q_cell}", elastic.sector),
                )
            })?;
        let mut unit = vec![Complex64::new(0.0, 0.0); self.system.dimension()];
        unit[position] = Complex64::new(1.0, 0.0);
        Ok(self.system.exchange(&self.system.apply_potential(&unit)))
    }
}

impl KernelOperator for FaddeevKernel<'_> {
    fn dimension(&self) -> usize {
        self.system.dimension()
    }

    fn apply(&self, input: &[Complex64]) -> Vec<Complex64> {
        let propagated: Vec<Complex64> = input
            .iter()
            .zip(&self.resolvent)
            .map(|(value, green)| value * green)
            .collect();
        self.system
            .exchange(&self.system.apply_potential(&propagated))
    }
}
