//! Run configuration: a camelCase JSON document with defaults for every key.

use super::constants::HBAR_SQUARED_OVER_NUCLEON_MASS;
use super::kinematics::EnergyFrame;
use crate::basis::{ChannelRules, GridConfig};
use crate::domain::{TicTacError, TicTacResult};
use crate::faddeev::SolverSettings;
use crate::permutation::PermutationSettings;
use crate::potential::PotentialSelection;
use crate::resolvent::ResolventSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnergySettings {
    pub frame: EnergyFrame,
    pub values: Vec<f64>,
    /// Energy list file, read when `values` is empty.
    pub file: Option<PathBuf>,
}

impl Default for EnergySettings {
    fn default() -> Self {
        Self {
            frame: EnergyFrame::default(),
            values: Vec::new(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunConfig {
    #[serde(flatten)]
    pub channels: ChannelRules,
    pub hbar_squared_over_mass: f64,
    pub potential: PotentialSelection,
    pub p_grid: GridConfig,
    pub q_grid: GridConfig,
    pub permutation: PermutationSettings,
    pub resolvent: ResolventSettings,
    pub solver: SolverSettings,
    pub energies: EnergySettings,
    pub output_directory: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            channels: ChannelRules::default(),
            hbar_squared_over_mass: HBAR_SQUARED_OVER_NUCLEON_MASS,
            potential: PotentialSelection::default(),
            p_grid: GridConfig::default(),
            q_grid: GridConfig::default(),
            permutation: PermutationSettings::default(),
            resolvent: ResolventSettings::default(),
            solver: SolverSettings::default(),
            energies: EnergySettings::default(),
            output_directory: PathBuf::from("tictac-out"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl From<ConfigError> for TicTacError {
    fn from(error: ConfigError) -> Self {
        let message = error.to_string();
        match error {
            ConfigError::Read { .. } => TicTacError::io_system("IO.CONFIG", message),
            ConfigError::Parse { .. } => TicTacError::input_validation("INPUT.CONFIG", message),
        }
    }
}

impl RunConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn kappa(&self) -> f64 {
        self.hbar_squared_over_mass
    }

    /// Checks every section; nothing is computed before this passes.
    pub fn validate(&self) -> TicTacResult<()> {
        self.channels.validate()?;
        if !(self.hbar_squared_over_mass.is_finite() && self.hbar_squared_over_mass > 0.0) {
            return Err(TicTacError::input_validation(
                "INPUT.CONFIG",
                format!(
                    "hbarSquaredOverMass must be positive, got {}",
                    self.hbar_squared_over_mass
                ),
            ));
        }
        self.potential.validate()?;
        self.p_grid.validate()?;
        self.q_grid.validate()?;
        self.permutation.validate()?;
        self.solver.validate()?;
        if !(self.resolvent.epsilon.is_finite() && self.resolvent.epsilon >= 0.0) {
            return Err(TicTacError::input_validation(
                "INPUT.RESOLVENT",
                format!("epsilon must be non-negative, got {}", self.resolvent.epsilon),
            ));
        }
        Ok(())
    }

    /// Inline energies, or the energy list file when none are given inline.
    pub fn energy_values(&self) -> TicTacResult<Vec<f64>> {
        if !self.energies.values.is_empty() {
            return Ok(self.energies.values.clone());
        }
        match &self.energies.file {
            Some(path) => read_energy_list(path),
            None => Ok(Vec::new()),
        }
    }
}

/// One energy per line; blank lines and `#` comments are skipped.
pub fn parse_energy_list(text: &str) -> TicTacResult<Vec<f64>> {
    let mut energies = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let content = line.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        let value: f64 = content.parse().map_err(|_| {
            TicTacError::input_validation(
                "INPUT.ENERGY_LIST",
                format!("line {}: '{content}' is not a number", number + 1),
            )
        })?;
        energies.push(value);
    }
    Ok(energies)
}

pub fn read_energy_list(path: &Path) -> TicTacResult<Vec<f64>> {
    let text = fs::read_to_string(path).map_err(|error| {
        TicTacError::io_system(
            "IO.ENERGY_LIST",
            format!("failed to read energy list '{}': {error}", path.display()),
        )
    })?;
    parse_energy_list(&text)
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, RunConfig, parse_energy_list};
    use crate::basis::GridShape;
    use crate::common::kinematics::EnergyFrame;
    use crate::faddeev::SolverMethod;
    use crate::potential::PotentialSelection;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn empty_document_yields_valid_defaults() {
        let config: RunConfig = serde_json::from_str("{}").expect("defaults");
        assert_eq!(config, RunConfig::default());
        config.validate().expect("defaults validate");
    }

    #[test]
    fn camel_case_keys_override_defaults() {
        let config: RunConfig = serde_json::from_str(
            r#"{
                "twoJ3Max": 3,
                "j2Max": 2,
                "tensorForce": true,
                "potential": {"model": "yamaguchi", "strength": 0.4, "range": 1.45},
                "pGrid": {"cells": 12, "cutoff": 8.0, "shape": {"kind": "linear"}},
                "permutation": {"anglePoints": 8, "dropThreshold": 1e-8},
                "solver": {"method": "direct"},
                "energies": {"frame": "centreOfMass", "values": [1.0, 2.5]}
            }"#,
        )
        .expect("parse");
        assert_eq!(config.channels.two_j3_max, 3);
        assert!(config.channels.tensor_force);
        assert_eq!(config.p_grid.cells, 12);
        assert_eq!(config.p_grid.shape, GridShape::Linear);
        assert_eq!(config.permutation.angle_points, 8);
        assert_eq!(config.solver.method, SolverMethod::Direct);
        assert_eq!(config.energies.frame, EnergyFrame::CentreOfMass);
        assert!(matches!(config.potential, PotentialSelection::Yamaguchi { .. }));
        config.validate().expect("valid");
    }

    #[test]
    fn invalid_sections_are_rejected_before_computation() {
        let even: RunConfig = serde_json::from_str(r#"{"twoJ3Max": 2}"#).expect("parse");
        assert_eq!(even.validate().expect_err("even").placeholder(), "INPUT.CHANNELS");

        let grid: RunConfig = serde_json::from_str(r#"{"qGrid": {"cells": 0}}"#).expect("parse");
        assert_eq!(grid.validate().expect_err("grid").placeholder(), "INPUT.GRID");

        let kappa: RunConfig =
            serde_json::from_str(r#"{"hbarSquaredOverMass": -1.0}"#).expect("parse");
        assert_eq!(kappa.validate().expect_err("kappa").placeholder(), "INPUT.CONFIG");
    }

    #[test]
    fn energy_list_skips_comments_and_blank_lines() {
        let energies = parse_energy_list("# lab energies\n1.0\n\n  3.5 # MeV\n10\n").expect("list");
        assert_eq!(energies, vec![1.0, 3.5, 10.0]);
        let error = parse_energy_list("1.0\nten\n").expect_err("bad line");
        assert_eq!(error.placeholder(), "INPUT.ENERGY_LIST");
        assert!(error.message().contains("line 2"));
    }

    #[test]
    fn energy_file_is_used_when_no_values_are_inline() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("energies.dat");
        fs::write(&path, "2.0\n4.0\n").expect("write");
        let mut config = RunConfig::default();
        config.energies.file = Some(path);
        assert_eq!(config.energy_values().expect("energies"), vec![2.0, 4.0]);
    }

    #[test]
    fn unreadable_and_malformed_files_map_to_distinct_errors() {
        let temp = TempDir::new().expect("tempdir should be created");
        let missing = RunConfig::from_path(&temp.path().join("missing.json")).expect_err("missing");
        assert!(matches!(missing, ConfigError::Read { .. }));
        assert_eq!(crate::domain::TicTacError::from(missing).placeholder(), "IO.CONFIG");

        let path = temp.path().join("broken.json");
        fs::write(&path, "{ not json").expect("write");
        let broken = RunConfig::from_path(&path).expect_err("broken");
        assert_eq!(crate::domain::TicTacError::from(broken).placeholder(), "INPUT.CONFIG");
    }
}
