use super::CliError;
use anyhow::Context;
use std::path::PathBuf;
use tictac_core::common::{RunConfig, read_energy_list};
use tictac_core::domain::TicTacError;
use tictac_core::faddeev::EnergyOutcome;
use tictac_core::output::{
    format_fixed_f64, format_scientific, render_phase_shift_table, write_run_outputs,
    write_text_artifact,
};
use tictac_core::permutation::PermutationSource;
use tictac_core::pipeline::{self, RunSummary};
use tracing::info;

#[derive(clap::Args)]
pub(super) struct ConfigFlags {
    /// Run configuration (camelCase JSON); defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding persisted exchange operators
    #[arg(long)]
    store: Option<PathBuf>,

    /// Worker threads for the exchange-operator assembly (0 = all cores)
    #[arg(long)]
    threads: Option<usize>,
}

impl ConfigFlags {
    fn load(&self) -> Result<RunConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_path(path).map_err(TicTacError::from)?,
            None => RunConfig::default(),
        };
        if let Some(store) = &self.store {
            config.permutation.store_directory = Some(store.clone());
        }
        if let Some(threads) = self.threads {
            config.permutation.threads = threads;
        }
        info!(
            config = %self
                .config
                .as_ref()
                .map_or_else(|| "<defaults>".to_string(), |path| path.display().to_string()),
            "configuration loaded"
        );
        Ok(config)
    }
}

#[derive(clap::Args)]
pub(super) struct RunArgs {
    #[command(flatten)]
    config: ConfigFlags,

    /// Output directory for tables and the run record
    #[arg(long)]
    output: Option<PathBuf>,

    /// Scattering energy in the configured frame; repeat for several
    #[arg(long = "energy", value_name = "MEV")]
    energies: Vec<f64>,

    /// File with one energy per line
    #[arg(long, conflicts_with = "energies")]
    energy_file: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct PermutationArgs {
    #[command(flatten)]
    config: ConfigFlags,
}

#[derive(clap::Args)]
pub(super) struct PhaseShiftArgs {
    #[command(flatten)]
    config: ConfigFlags,

    /// Two-body centre-of-mass energy; repeat for several
    #[arg(long = "energy", value_name = "MEV", required_unless_present = "energy_file")]
    energies: Vec<f64>,

    /// File with one energy per line
    #[arg(long, conflicts_with = "energies")]
    energy_file: Option<PathBuf>,

    /// Also write the table to this file
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(super) fn run_solver_command(args: RunArgs) -> Result<i32, CliError> {
    let mut config = args.config.load()?;
    if let Some(output) = args.output {
        config.output_directory = output;
    }
    if !args.energies.is_empty() {
        config.energies.values = args.energies;
    } else if let Some(path) = args.energy_file {
        config.energies.values.clear();
        config.energies.file = Some(path);
    }

    let summary = pipeline::run(&config)?;
    let written = write_run_outputs(&config.output_directory, &config, &summary)?;
    print_run_summary(&summary);
    println!(
        "Wrote {} artifacts to {}",
        written.len(),
        config.output_directory.display()
    );

    if summary.solved() == summary.attempted() {
        Ok(0)
    } else {
        Ok(1)
    }
}

fn print_run_summary(summary: &RunSummary) {
    for state in &summary.bound_states {
        println!(
            "Bound pair {:<8} {} MeV",
            state.channel,
            format_fixed_f64(state.energy, 12, 6)
        );
    }
    for run in &summary.blocks {
        println!(
            "Block {} ({} channels, dimension {}, exchange operator {})",
            run.block,
            run.channels,
            run.dimension,
            source_label(run.permutation_source)
        );
        for record in &run.energies {
            let status = match &record.outcome {
                Ok(EnergyOutcome::Solved {
                    iterations,
                    residual,
                    ..
                }) => format!(
                    "solved in {iterations} iterations, residual {}",
                    format_scientific(*residual, 10, 2).trim()
                ),
                Ok(EnergyOutcome::NonConvergent { report, .. }) => format!(
                    "NOT CONVERGED ({:?} after {} iterations)",
                    report.reason, report.iterations
                ),
                Err(error) => format!("FAILED {}", error.diagnostic_line()),
            };
            println!(
                "  E_cm={} MeV T_lab={} MeV: {status}",
                format_fixed_f64(record.point.centre_of_mass, 10, 4),
                format_fixed_f64(record.point.lab, 10, 4)
            );
        }
    }
    for block in &summary.skipped {
        println!("Block {block} skipped");
    }
    println!(
        "Run status: {}/{} energies solved",
        summary.solved(),
        summary.attempted()
    );
}

fn source_label(source: PermutationSource) -> &'static str {
    match source {
        PermutationSource::Computed => "computed",
        PermutationSource::Loaded => "loaded",
    }
}

pub(super) fn run_permutation_command(args: PermutationArgs) -> Result<i32, CliError> {
    let config = args.config.load()?;
    let summaries = pipeline::exchange_operators(&config)?;
    for summary in &summaries {
        println!(
            "Block {}: dimension {}, nnz {}, asymmetry {}, {}{}",
            summary.block,
            summary.dimension,
            summary.nnz,
            format_scientific(summary.max_asymmetry, 10, 2).trim(),
            source_label(summary.source),
            summary
                .artifact
                .as_ref()
                .map(|path| format!(" ({})", path.display()))
                .unwrap_or_default()
        );
        if let Some(report) = summary.report {
            println!(
                "  {} candidates, {} below threshold, {} non-finite, {} skipped",
                report.candidates,
                report.dropped_small,
                report.dropped_non_finite,
                report.skipped_quadrature + report.skipped_index
            );
        }
    }
    Ok(0)
}

pub(super) fn run_phase_shift_command(args: PhaseShiftArgs) -> Result<i32, CliError> {
    let config = args.config.load()?;
    let energies = match args.energy_file {
        Some(path) => read_energy_list(&path)?,
        None => args.energies,
    };

    for state in pipeline::bound_states(&config)? {
        println!(
            "# bound {} {} MeV",
            state.channel,
            format_fixed_f64(state.energy, 12, 6)
        );
    }
    let rows = pipeline::phase_shifts(&config, &energies)?;
    let table = render_phase_shift_table(&rows);
    println!("{table}");
    if let Some(path) = args.output {
        write_text_artifact(&path, &table)?;
    }
    Ok(0)
}

pub(super) fn run_config_command() -> Result<i32, CliError> {
    let text = serde_json::to_string_pretty(&RunConfig::default())
        .context("failed to encode the default configuration")?;
    println!("{text}");
    Ok(0)
}
