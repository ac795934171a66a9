//! Runs the solver over every `(J, pi)` block and every requested energy.
//!
//! Per block the channel set, spectra and exchange operator are built once and
//! shared by all energies. A failure at one energy is recorded and the batch
//! moves on; configuration and assembly failures abort the run.

use crate::basis::{ChannelSet, GridSet, TwoBodyChannel, TwoBodyKey, WavePacketBasis};
use crate::common::{EnergyPoint, RunConfig};
use crate::domain::{JpBlock, TicTacError, TicTacResult};
use crate::faddeev::{BlockSystem, ElasticChannel, EnergyOutcome, elastic_amplitudes};
use crate::permutation::{self, AssemblyReport, PermutationSource};
use crate::potential::{
    OnShellScattering, PotentialMatrix, PotentialModel, TwoBodySpectrum, build_spectra,
    two_body_on_shell,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct EnergyRecord {
    pub point: EnergyPoint,
    pub outcome: TicTacResult<EnergyOutcome>,
}

impl EnergyRecord {
    pub fn is_solved(&self) -> bool {
        matches!(self.outcome, Ok(EnergyOutcome::Solved { .. }))
    }
}

#[derive(Debug, Clone)]
pub struct BlockRun {
    pub block: JpBlock,
    pub channels: usize,
    pub dimension: usize,
    pub elastic: Vec<ElasticChannel>,
    pub permutation_source: PermutationSource,
    pub assembly: Option<AssemblyReport>,
    pub artifact: Option<PathBuf>,
    pub energies: Vec<EnergyRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundState {
    pub channel: String,
    /// Negative binding energy in MeV.
    pub energy: f64,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub points: Vec<EnergyPoint>,
    pub bound_states: Vec<BoundState>,
    pub blocks: Vec<BlockRun>,
    pub skipped: Vec<JpBlock>,
}

impl RunSummary {
    pub fn solved(&self) -> usize {
        self.blocks
            .iter()
            .flat_map(|block| &block.energies)
            .filter(|record| record.is_solved())
            .count()
    }

    pub fn attempted(&self) -> usize {
        self.blocks.iter().map(|block| block.energies.len()).sum()
    }
}

/// Requested energies converted to the centre-of-mass frame.
pub fn energy_points(config: &RunConfig) -> TicTacResult<Vec<EnergyPoint>> {
    config
        .energy_values()?
        .into_iter()
        .map(|energy| config.energies.frame.resolve(energy))
        .collect()
}

pub fn run(config: &RunConfig) -> TicTacResult<RunSummary> {
    config.validate()?;
    let points = energy_points(config)?;
    if points.is_empty() {
        return Err(TicTacError::input_validation(
            "INPUT.ENERGY",
            "no scattering energies were requested",
        ));
    }

    let grids = GridSet::build(config.p_grid, config.q_grid)?;
    let model = config.potential.build();
    info!(
        model = model.name(),
        energies = points.len(),
        p_cells = grids.p.cells(),
        q_cells = grids.q.cells(),
        "starting three-body run"
    );

    let bound_states = bound_states_with(config, model.as_ref(), &grids)?;
    let mut blocks = Vec::new();
    let mut skipped = Vec::new();
    for block in config.channels.blocks() {
        match run_block(config, model.as_ref(), &grids, block, &points)? {
            Some(run) => blocks.push(run),
            None => skipped.push(block),
        }
    }

    let summary = RunSummary {
        points,
        bound_states,
        blocks,
        skipped,
    };
    info!(
        blocks = summary.blocks.len(),
        skipped = summary.skipped.len(),
        solved = summary.solved(),
        attempted = summary.attempted(),
        "three-body run finished"
    );
    Ok(summary)
}

/// Builds everything energy-independent for one block, or `None` when the
/// block has no channels or no bound pair to scatter on.
pub fn prepare_block(
    config: &RunConfig,
    model: &dyn PotentialModel,
    grids: &GridSet,
    block: JpBlock,
) -> TicTacResult<Option<(BlockSystem, permutation::PermutationOperator)>> {
    let channels = match ChannelSet::enumerate(
        &config.channels,
        block,
        grids.p.cells(),
        grids.q.cells(),
    ) {
        Ok(channels) => channels,
        Err(error) if error.placeholder() == "INPUT.CHANNELS" => {
            info!(block = %block, reason = error.message(), "skipping block");
            return Ok(None);
        }
        Err(error) => return Err(error),
    };

    let spectra = build_spectra(
        model,
        channels.two_body_channels(),
        &grids.p,
        config.kappa(),
    )?;
    if !has_bound_pair(&channels, &spectra) {
        info!(block = %block, "skipping block without a bound pair");
        return Ok(None);
    }

    let basis = WavePacketBasis::new(&channels, grids.p.cells(), grids.q.cells());
    let operator = permutation::obtain(&channels, grids, &basis, &config.permutation)?;
    let system = BlockSystem::new(
        channels,
        grids.clone(),
        spectra,
        Arc::clone(&operator.matrix),
        config.kappa(),
    )?;
    debug!(
        block = %block,
        channels = system.channels().len(),
        dimension = system.dimension(),
        nnz = system.permutation().nnz(),
        "block prepared"
    );
    Ok(Some((system, operator)))
}

fn has_bound_pair(channels: &ChannelSet, spectra: &[Arc<TwoBodySpectrum>]) -> bool {
    channels
        .sectors()
        .iter()
        .any(|sector| spectra[sector.two_body].swp.bound_levels() > 0)
}

fn run_block(
    config: &RunConfig,
    model: &dyn PotentialModel,
    grids: &GridSet,
    block: JpBlock,
    points: &[EnergyPoint],
) -> TicTacResult<Option<BlockRun>> {
    let Some((system, operator)) = prepare_block(config, model, grids, block)? else {
        return Ok(None);
    };

    let energies = points
        .iter()
        .map(|point| {
            let outcome =
                elastic_amplitudes(&system, *point, &config.resolvent, &config.solver);
            match &outcome {
                Ok(EnergyOutcome::Solved { iterations, .. }) => {
                    debug!(block = %block, energy = point.centre_of_mass, iterations, "energy solved");
                }
                Ok(EnergyOutcome::NonConvergent { incoming, report }) => warn!(
                    block = %block,
                    energy = point.centre_of_mass,
                    incoming,
                    reason = ?report.reason,
                    iterations = report.iterations,
                    last_change = report.last_change,
                    "solver did not converge"
                ),
                Err(error) => warn!(
                    block = %block,
                    energy = point.centre_of_mass,
                    error = %error.diagnostic_line(),
                    "energy failed"
                ),
            }
            EnergyRecord {
                point: *point,
                outcome,
            }
        })
        .collect();

    Ok(Some(BlockRun {
        block,
        channels: system.channels().len(),
        dimension: system.dimension(),
        elastic: system.elastic_channels(),
        permutation_source: operator.source,
        assembly: operator.report,
        artifact: operator.artifact,
        energies,
    }))
}

/// Every distinct two-body channel reachable from the configured blocks.
pub fn two_body_channels(config: &RunConfig, grids: &GridSet) -> Vec<TwoBodyChannel> {
    let mut unique: BTreeMap<TwoBodyKey, TwoBodyChannel> = BTreeMap::new();
    for block in config.channels.blocks() {
        let Ok(channels) =
            ChannelSet::enumerate(&config.channels, block, grids.p.cells(), grids.q.cells())
        else {
            continue;
        };
        for channel in channels.two_body_channels() {
            unique.entry(channel.key).or_insert_with(|| channel.clone());
        }
    }
    unique.into_values().collect()
}

/// Bound levels of every two-body channel, deepest first.
pub fn bound_states(config: &RunConfig) -> TicTacResult<Vec<BoundState>> {
    config.validate()?;
    let grids = GridSet::build(config.p_grid, config.q_grid)?;
    let model = config.potential.build();
    bound_states_with(config, model.as_ref(), &grids)
}

fn bound_states_with(
    config: &RunConfig,
    model: &dyn PotentialModel,
    grids: &GridSet,
) -> TicTacResult<Vec<BoundState>> {
    let channels = two_body_channels(config, grids);
    let spectra = build_spectra(model, &channels, &grids.p, config.kappa())?;
    let states: Vec<BoundState> = spectra
        .iter()
        .flat_map(|spectrum| {
            let label = spectrum.channel.label();
            spectrum
                .swp
                .bound_energies()
                .iter()
                .map(move |energy| BoundState {
                    channel: label.clone(),
                    energy: *energy,
                })
        })
        .collect();
    for state in &states {
        info!(channel = %state.channel, energy = state.energy, "two-body bound state");
    }
    Ok(states)
}

#[derive(Debug, Clone)]
pub struct ExchangeSummary {
    pub block: JpBlock,
    pub channels: usize,
    pub dimension: usize,
    pub nnz: usize,
    pub max_asymmetry: f64,
    pub source: PermutationSource,
    pub report: Option<AssemblyReport>,
    pub artifact: Option<PathBuf>,
}

/// Assembles, or loads from the store, the exchange operator of every block
/// that has channels, whether or not it has a bound pair.
pub fn exchange_operators(config: &RunConfig) -> TicTacResult<Vec<ExchangeSummary>> {
    config.validate()?;
    let grids = GridSet::build(config.p_grid, config.q_grid)?;
    let mut summaries = Vec::new();
    for block in config.channels.blocks() {
        let Ok(channels) =
            ChannelSet::enumerate(&config.channels, block, grids.p.cells(), grids.q.cells())
        else {
            info!(block = %block, "skipping block without channels");
            continue;
        };
        let basis = WavePacketBasis::new(&channels, grids.p.cells(), grids.q.cells());
        let operator = permutation::obtain(&channels, &grids, &basis, &config.permutation)?;
        summaries.push(ExchangeSummary {
            block,
            channels: channels.len(),
            dimension: basis.len(),
            nnz: operator.matrix.nnz(),
            max_asymmetry: operator.matrix.max_asymmetry(),
            source: operator.source,
            report: operator.report,
            artifact: operator.artifact,
        });
    }
    Ok(summaries)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseShiftRow {
    pub channel: String,
    pub scattering: OnShellScattering,
}

/// Two-body phase shifts of every channel at pair energies `energies` (MeV).
pub fn phase_shifts(config: &RunConfig, energies: &[f64]) -> TicTacResult<Vec<PhaseShiftRow>> {
    config.validate()?;
    let grids = GridSet::build(config.p_grid, config.q_grid)?;
    let model = config.potential.build();
    let mut rows = Vec::new();
    for channel in two_body_channels(config, &grids) {
        let potential = PotentialMatrix::evaluate(model.as_ref(), &channel, &grids.p)?;
        for energy in energies {
            let scattering = two_body_on_shell(&potential, &grids.p, config.kappa(), *energy)?;
            rows.push(PhaseShiftRow {
                channel: channel.label(),
                scattering,
            });
        }
    }
    Ok(rows)
}
