//! Faddeev/AGS equation `X = P V phi + P V G1 X` for elastic scattering off the bound pair.

pub mod observables;
pub mod operator;
pub mod solver;

pub use observables::ElasticAmplitudes;
pub use operator::{BlockSystem, ElasticChannel, FaddeevKernel};
pub use solver::{
    KernelOperator, NonConvergence, NonConvergenceReason, SolveOutcome, SolverMethod,
    SolverSettings, solve, solve_all,
};

use crate::basis::WavePacketGrid;
use crate::common::kinematics::{EnergyPoint, on_shell_momentum};
use crate::domain::{TicTacError, TicTacResult};
use crate::resolvent::ResolventSettings;
use num_complex::Complex64;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum EnergyOutcome {
    Solved {
        amplitudes: ElasticAmplitudes,
        iterations: usize,
        residual: f64,
    },
    NonConvergent {
        /// Index into the open elastic channels of the incoming state that failed.
        incoming: usize,
        report: NonConvergence,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct OpenChannel {
    elastic: ElasticChannel,
    momentum: f64,
    q_cell: usize,
    conversion: f64,
}

/// Total energy and the channels open at `point`, with `E_cm` measured from
/// the deepest pair level. Closed channels are left out.
fn open_channels(
    elastic: Vec<ElasticChannel>,
    point: EnergyPoint,
    q: &WavePacketGrid,
    kappa: f64,
) -> TicTacResult<(f64, Vec<OpenChannel>)> {
    let Some(threshold) = elastic
        .iter()
        .map(|channel| channel.bound_energy)
        .min_by(f64::total_cmp)
    else {
        return Err(TicTacError::input_validation(
            "INPUT.CHANNELS",
            "no bound pair to scatter on",
        ));
    };
    let total_energy = point.centre_of_mass + threshold;

    let mut open = Vec::with_capacity(elastic.len());
    for channel in elastic {
        let kinetic = total_energy - channel.bound_energy;
        if kinetic <= 0.0 {
            debug!(
                energy = point.centre_of_mass,
                bound_energy = channel.bound_energy,
                "elastic channel closed"
            );
            continue;
        }
        let momentum = on_shell_momentum(kinetic, kappa);
        let q_cell = q.locate(momentum).ok_or_else(|| {
            TicTacError::input_validation(
                "INPUT.ENERGY",
                format!(
                    "on-shell spectator momentum {momentum:.4} fm^-1 at E_cm={} MeV is beyond the q grid cutoff {}",
                    point.centre_of_mass,
                    q.cutoff()
                ),
            )
        })?;
        open.push(OpenChannel {
            elastic: channel,
            momentum,
            q_cell,
            conversion: q.on_shell_conversion(q_cell, momentum),
        });
    }
    if open.is_empty() {
        return Err(TicTacError::input_validation(
            "INPUT.ENERGY",
            format!("no elastic channel is open at E_cm={} MeV", point.centre_of_mass),
        ));
    }
    Ok((total_energy, open))
}

/// Solves the block at one energy for every open incoming elastic channel.
pub fn elastic_amplitudes(
    system: &BlockSystem,
    point: EnergyPoint,
    resolvent: &ResolventSettings,
    solver: &SolverSettings,
) -> TicTacResult<EnergyOutcome> {
    let block = system.channels().block();
    let elastic = system.elastic_channels();
    if elastic.is_empty() {
        return Err(TicTacError::input_validation(
            "INPUT.CHANNELS",
            format!("{block} has no bound pair to scatter on"),
        ));
    }
    let (total_energy, open) =
        open_channels(elastic, point, system.grids().q.as_ref(), system.kappa())?;
    let positions = open
        .iter()
        .map(|channel| {
            system
                .swp_position(channel.elastic.sector, channel.elastic.level, channel.q_cell)
                .ok_or_else(|| {
                    TicTacError::internal("SYS.BASIS_INDEX", "elastic state outside the basis")
                })
        })
        .collect::<TicTacResult<Vec<_>>>()?;

    let kernel = system.kernel(total_energy, resolvent);
    let drivings = open
        .iter()
        .map(|channel| kernel.driving(&channel.elastic, channel.q_cell))
        .collect::<TicTacResult<Vec<_>>>()?;
    let outcomes = solve_all(&kernel, &drivings, solver)?;

    let n = open.len();
    let mut u = vec![Complex64::new(0.0, 0.0); n * n];
    let mut iterations = 0;
    let mut residual: f64 = 0.0;
    for (incoming, outcome) in outcomes.iter().enumerate() {
        let solution = match outcome {
            SolveOutcome::Converged(solution) => solution,
            SolveOutcome::NonConvergent(report) => {
                return Ok(EnergyOutcome::NonConvergent {
                    incoming,
                    report: *report,
                });
            }
        };
        iterations = iterations.max(solution.iterations);
        residual = residual.max(solution.residual);
        for (out, channel) in open.iter().enumerate() {
            let scale = (channel.conversion * open[incoming].conversion).sqrt();
            u[out * n + incoming] = solution.amplitude[positions[out]] * scale;
        }
    }
    debug!(
        block = %block,
        energy = point.centre_of_mass,
        open = n,
        iterations,
        residual,
        "elastic amplitudes solved"
    );

    Ok(EnergyOutcome::Solved {
        amplitudes: ElasticAmplitudes {
            centre_of_mass: point.centre_of_mass,
            lab: point.lab,
            momenta: open.iter().map(|channel| channel.momentum).collect(),
            q_cells: open.iter().map(|channel| channel.q_cell).collect(),
            channels: open.iter().map(|channel| channel.elastic.channel).collect(),
            u,
        },
        iterations,
        residual,
    })
}
