//! Result artifacts: fixed-width text tables and JSON records.

use crate::common::RunConfig;
use crate::common::constants::PI;
use crate::domain::{TicTacError, TicTacResult};
use crate::faddeev::{EnergyOutcome, NonConvergence};
use crate::permutation::{AssemblyReport, PermutationSource};
use crate::pipeline::{BlockRun, BoundState, PhaseShiftRow, RunSummary};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const RUN_PARAMETERS_FILE: &str = "run_parameters.json";
pub const RUN_SUMMARY_FILE: &str = "run_summary.json";

pub fn format_fixed_f64(value: f64, width: usize, precision: usize) -> String {
    format!(
        "{value:>width$.precision$}",
        width = width,
        precision = precision
    )
}

pub fn format_scientific(value: f64, width: usize, precision: usize) -> String {
    format!(
        "{value:>width$.precision$e}",
        width = width,
        precision = precision
    )
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> TicTacResult<()> {
    fs::write(path, normalize_text_artifact(content)).map_err(|error| write_failed(path, error))
}

pub fn write_json_artifact<T: Serialize>(path: &Path, value: &T) -> TicTacResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|error| {
        TicTacError::internal(
            "SYS.OUTPUT_JSON",
            format!("failed to encode '{}': {error}", path.display()),
        )
    })?;
    write_text_artifact(path, &text)
}

fn write_failed(path: &Path, error: std::io::Error) -> TicTacError {
    TicTacError::io_system(
        "IO.OUTPUT",
        format!("failed to write '{}': {error}", path.display()),
    )
}

pub fn u_table_name(run: &BlockRun) -> String {
    format!("u_matrix_{}.dat", run.block.file_tag())
}

/// Rows `T_lab E_cm q_index out in Re U Im U Re S Im S`, one per channel pair
/// and solved energy; `q_index` is the on-shell cell of the outgoing channel.
pub fn render_u_table(run: &BlockRun, kappa: f64) -> String {
    let mut lines = vec![
        format!("# elastic U-matrix {}", run.block),
        format!(
            "# {} channels, dimension {}, elastic channels {:?}",
            run.channels,
            run.dimension,
            run.elastic
                .iter()
                .map(|channel| channel.channel)
                .collect::<Vec<_>>()
        ),
        "#       T_lab        E_cm  q_index out  in          Re U          Im U          Re S          Im S"
            .to_string(),
    ];
    for record in &run.energies {
        let Ok(EnergyOutcome::Solved { amplitudes, .. }) = &record.outcome else {
            continue;
        };
        let s = amplitudes.s_matrix(kappa);
        let n = amplitudes.len();
        for out in 0..n {
            for inc in 0..n {
                let u = amplitudes.u(out, inc);
                let element = s[out * n + inc];
                lines.push(format!(
                    "{} {} {:>8} {:>3} {:>3} {} {} {} {}",
                    format_fixed_f64(record.point.lab, 13, 6),
                    format_fixed_f64(record.point.centre_of_mass, 11, 6),
                    amplitudes.q_cells[out],
                    out,
                    inc,
                    format_scientific(u.re, 13, 6),
                    format_scientific(u.im, 13, 6),
                    format_scientific(element.re, 13, 6),
                    format_scientific(element.im, 13, 6),
                ));
            }
        }
    }
    lines.join("\n")
}

/// Phase shifts in degrees per orbital component.
pub fn render_phase_shift_table(rows: &[PhaseShiftRow]) -> String {
    let mut lines = vec![
        "# channel        E[MeV]     k[fm^-1]  delta[deg] per component"
            .to_string(),
    ];
    for row in rows {
        let scattering = &row.scattering;
        let phases = (0..scattering.components)
            .map(|component| {
                format_fixed_f64(scattering.phase_shift(component) * 180.0 / PI, 11, 5)
            })
            .collect::<Vec<_>>()
            .join(" ");
        lines.push(format!(
            "{:<10} {} {} {}",
            row.channel,
            format_fixed_f64(scattering.energy, 12, 5),
            format_fixed_f64(scattering.momentum, 12, 6),
            phases,
        ));
    }
    lines.join("\n")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDocument<'a> {
    bound_states: &'a [BoundState],
    blocks: Vec<BlockDocument>,
    skipped: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BlockDocument {
    block: String,
    channels: usize,
    dimension: usize,
    permutation: &'static str,
    assembly: Option<AssemblyReport>,
    artifact: Option<PathBuf>,
    energies: Vec<EnergyDocument>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
enum EnergyStatus {
    Solved {
        iterations: usize,
        residual: f64,
        analyzing_power: Option<f64>,
    },
    NonConvergent {
        incoming: usize,
        report: NonConvergence,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnergyDocument {
    lab: f64,
    centre_of_mass: f64,
    #[serde(flatten)]
    status: EnergyStatus,
}

fn block_document(run: &BlockRun) -> BlockDocument {
    let energies = run
        .energies
        .iter()
        .map(|record| {
            let status = match &record.outcome {
                Ok(EnergyOutcome::Solved {
                    amplitudes,
                    iterations,
                    residual,
                }) => EnergyStatus::Solved {
                    iterations: *iterations,
                    residual: *residual,
                    analyzing_power: amplitudes.analyzing_power_estimate(),
                },
                Ok(EnergyOutcome::NonConvergent { incoming, report }) => {
                    EnergyStatus::NonConvergent {
                        incoming: *incoming,
                        report: *report,
                    }
                }
                Err(error) => EnergyStatus::Failed {
                    error: error.diagnostic_line(),
                },
            };
            EnergyDocument {
                lab: record.point.lab,
                centre_of_mass: record.point.centre_of_mass,
                status,
            }
        })
        .collect();

    BlockDocument {
        block: run.block.to_string(),
        channels: run.channels,
        dimension: run.dimension,
        permutation: match run.permutation_source {
            PermutationSource::Computed => "computed",
            PermutationSource::Loaded => "loaded",
        },
        assembly: run.assembly,
        artifact: run.artifact.clone(),
        energies,
    }
}

/// Writes the run parameters, one U table per block and the run summary.
pub fn write_run_outputs(
    directory: &Path,
    config: &RunConfig,
    summary: &RunSummary,
) -> TicTacResult<Vec<PathBuf>> {
    fs::create_dir_all(directory).map_err(|error| write_failed(directory, error))?;
    let mut written = Vec::new();

    let parameters = directory.join(RUN_PARAMETERS_FILE);
    write_json_artifact(&parameters, config)?;
    written.push(parameters);

    for run in &summary.blocks {
        let path = directory.join(u_table_name(run));
        write_text_artifact(&path, &render_u_table(run, config.kappa()))?;
        written.push(path);
    }

    let document = SummaryDocument {
        bound_states: &summary.bound_states,
        blocks: summary.blocks.iter().map(block_document).collect(),
        skipped: summary.skipped.iter().map(ToString::to_string).collect(),
    };
    let path = directory.join(RUN_SUMMARY_FILE);
    write_json_artifact(&path, &document)?;
    written.push(path);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::{
        format_fixed_f64, format_scientific, normalize_text_artifact, render_phase_shift_table,
        render_u_table, write_run_outputs, write_text_artifact,
    };
    use crate::common::{EnergyPoint, RunConfig};
    use crate::domain::{JpBlock, Parity, TicTacError};
    use crate::faddeev::{ElasticAmplitudes, EnergyOutcome};
    use crate::permutation::PermutationSource;
    use crate::pipeline::{BlockRun, EnergyRecord, PhaseShiftRow, RunSummary};
    use crate::potential::OnShellScattering;
    use num_complex::Complex64;
    use std::fs;
    use tempfile::TempDir;

    fn block_run() -> BlockRun {
        let point = EnergyPoint {
            lab: 3.0,
            centre_of_mass: 2.0,
        };
        let amplitudes = ElasticAmplitudes {
            centre_of_mass: 2.0,
            lab: 3.0,
            momenta: vec![0.25],
            q_cells: vec![3],
            channels: vec![0],
            u: vec![Complex64::new(-1.5, 0.25)],
        };
        BlockRun {
            block: JpBlock::new(1, Parity::Even),
            channels: 5,
            dimension: 120,
            elastic: Vec::new(),
            permutation_source: PermutationSource::Computed,
            assembly: None,
            artifact: None,
            energies: vec![
                EnergyRecord {
                    point,
                    outcome: Ok(EnergyOutcome::Solved {
                        amplitudes,
                        iterations: 7,
                        residual: 1.0e-10,
                    }),
                },
                EnergyRecord {
                    point: EnergyPoint {
                        lab: 90.0,
                        centre_of_mass: 60.0,
                    },
                    outcome: Err(TicTacError::input_validation("INPUT.ENERGY", "beyond grid")),
                },
            ],
        }
    }

    #[test]
    fn fixed_width_float_formatting_is_deterministic() {
        assert_eq!(format_fixed_f64(1.23, 13, 5), "      1.23000");
        assert_eq!(format_scientific(-1500.0, 12, 3), "    -1.500e3");
    }

    #[test]
    fn normalize_text_artifact_uses_canonical_line_endings() {
        assert_eq!(normalize_text_artifact("alpha\r\nbeta\rgamma"), "alpha\nbeta\ngamma\n");
    }

    #[test]
    fn repeated_text_writes_produce_identical_bytes() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("artifact.dat");
        write_text_artifact(&path, "line 1\r\nline 2").expect("first write");
        let first = fs::read(&path).expect("readable");
        write_text_artifact(&path, "line 1\r\nline 2").expect("second write");
        assert_eq!(first, fs::read(&path).expect("readable"));
        assert_eq!(first, b"line 1\nline 2\n");
    }

    #[test]
    fn u_table_lists_only_solved_energies() {
        let table = render_u_table(&block_run(), 41.47);
        let rows: Vec<&str> = table.lines().filter(|line| !line.starts_with('#')).collect();
        assert_eq!(rows.len(), 1);
        let fields: Vec<&str> = rows[0].split_whitespace().collect();
        assert_eq!(fields.len(), 9);
        assert_eq!(fields[0], "3.000000");
        assert_eq!(fields[2], "3");
        assert_eq!(fields[5].parse::<f64>().expect("Re U"), -1.5);
    }

    #[test]
    fn phase_shift_rows_hold_one_column_per_component() {
        let row = PhaseShiftRow {
            channel: "3S1-3D1".to_string(),
            scattering: OnShellScattering {
                energy: 10.0,
                momentum: 0.49,
                cell: 4,
                components: 2,
                reaction: vec![-1.0, 0.0, 0.0, 0.5],
                s_matrix: vec![
                    Complex64::new(0.0, 1.0),
                    Complex64::new(0.0, 0.0),
                    Complex64::new(0.0, 0.0),
                    Complex64::new(1.0, 0.0),
                ],
            },
        };
        let table = render_phase_shift_table(&[row]);
        let rows: Vec<&str> = table.lines().filter(|line| !line.starts_with('#')).collect();
        let fields: Vec<&str> = rows[0].split_whitespace().collect();
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[3].parse::<f64>().expect("delta"), 45.0);
        assert_eq!(fields[4].parse::<f64>().expect("delta"), 0.0);
    }

    #[test]
    fn run_outputs_include_parameters_tables_and_summary() {
        let temp = TempDir::new().expect("tempdir should be created");
        let directory = temp.path().join("out");
        let config = RunConfig::default();
        let summary = RunSummary {
            points: Vec::new(),
            bound_states: Vec::new(),
            blocks: vec![block_run()],
            skipped: vec![JpBlock::new(1, Parity::Odd)],
        };
        let written = write_run_outputs(&directory, &config, &summary).expect("outputs");
        assert_eq!(written.len(), 3);
        assert!(directory.join("u_matrix_JP_1_1.dat").is_file());

        let parameters = fs::read_to_string(directory.join("run_parameters.json")).expect("read");
        let restored: RunConfig = serde_json::from_str(&parameters).expect("round trip");
        assert_eq!(restored.channels, config.channels);
        assert_eq!(restored.potential, config.potential);
        assert!((restored.kappa() - config.kappa()).abs() <= 1.0e-12);

        let summary: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(directory.join("run_summary.json")).expect("read"),
        )
        .expect("json");
        let energies = &summary["blocks"][0]["energies"];
        assert_eq!(energies[0]["status"], "solved");
        assert_eq!(energies[0]["iterations"], 7);
        assert_eq!(energies[1]["status"], "failed");
        assert_eq!(summary["skipped"][0], "J=1/2-");
    }
}
