//! Wave-packet grids over one momentum variable.
//!
//! Cell `i` spans `[b_i, b_{i+1})` and carries the packet
//! `|p_i> = C_i^{-1/2} ∫_{D_i} p dp f(p) |p>` with `C_i = ∫_{D_i} f(p)^2 dp`,
//! so that `<k|p_i> = f(k) / (k sqrt(C_i))` inside the cell.

use crate::domain::{TicTacError, TicTacResult};
use crate::numerics::special::{GaussLegendre, QuadratureError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GridShape {
    Linear,
    /// `b_i = min + scale * tan^power(i * u_max / N)`.
    Chebyshev { scale: f64, power: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PacketWeight {
    /// Boxcar packets, `f(p) = 1`.
    Unit,
    /// `f(p) = sqrt(p)`, uniform in the kinetic energy of the cell.
    EnergyUniform,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridConfig {
    pub cells: usize,
    pub cutoff: f64,
    pub minimum: f64,
    pub shape: GridShape,
    pub weight: PacketWeight,
    pub points_per_cell: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cells: 30,
            cutoff: 20.0,
            minimum: 0.0,
            shape: GridShape::Chebyshev {
                scale: 1.0,
                power: 1.0,
            },
            weight: PacketWeight::Unit,
            points_per_cell: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("grid needs at least one cell")]
    ZeroCells,
    #[error("cutoff must be positive and finite, got {cutoff}")]
    InvalidCutoff { cutoff: f64 },
    #[error("minimum {minimum} must be non-negative and below the cutoff {cutoff}")]
    InvalidMinimum { minimum: f64, cutoff: f64 },
    #[error("Chebyshev scale and power must be positive, got scale={scale} power={power}")]
    InvalidChebyshev { scale: f64, power: f64 },
    #[error("boundaries are not strictly increasing at index {index}")]
    NotIncreasing { index: usize },
    #[error(transparent)]
    Quadrature(#[from] QuadratureError),
}

impl From<GridError> for TicTacError {
    fn from(error: GridError) -> Self {
        TicTacError::input_validation("INPUT.GRID", error.to_string())
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<(), GridError> {
        if self.cells == 0 {
            return Err(GridError::ZeroCells);
        }
        if !(self.cutoff.is_finite() && self.cutoff > 0.0) {
            return Err(GridError::InvalidCutoff {
                cutoff: self.cutoff,
            });
        }
        if !(self.minimum.is_finite() && self.minimum >= 0.0 && self.minimum < self.cutoff) {
            return Err(GridError::InvalidMinimum {
                minimum: self.minimum,
                cutoff: self.cutoff,
            });
        }
        if let GridShape::Chebyshev { scale, power } = self.shape
            && !(scale.is_finite() && scale > 0.0 && power.is_finite() && power > 0.0)
        {
            return Err(GridError::InvalidChebyshev { scale, power });
        }
        if self.points_per_cell == 0 {
            return Err(GridError::Quadrature(QuadratureError::NoPoints));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WavePacketGrid {
    config: GridConfig,
    boundaries: Vec<f64>,
    norms: Vec<f64>,
    rule: GaussLegendre,
}

impl WavePacketGrid {
    pub fn build(config: GridConfig) -> Result<Self, GridError> {
        config.validate()?;
        let boundaries = boundaries_for(&config);
        if let Some(index) = boundaries
            .windows(2)
            .position(|pair| !(pair[1] > pair[0]))
        {
            return Err(GridError::NotIncreasing { index: index + 1 });
        }
        let norms = boundaries
            .windows(2)
            .map(|pair| weight_moment(config.weight, pair[0], pair[1], 0))
            .collect();
        let rule = GaussLegendre::new(config.points_per_cell)?;

        Ok(Self {
            config,
            boundaries,
            norms,
            rule,
        })
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    pub fn cells(&self) -> usize {
        self.boundaries.len() - 1
    }

    pub fn cell(&self, index: usize) -> (f64, f64) {
        (self.boundaries[index], self.boundaries[index + 1])
    }

    pub fn lower(&self) -> f64 {
        self.boundaries[0]
    }

    pub fn cutoff(&self) -> f64 {
        self.boundaries[self.boundaries.len() - 1]
    }

    pub fn width(&self, index: usize) -> f64 {
        self.boundaries[index + 1] - self.boundaries[index]
    }

    pub fn midpoint(&self, index: usize) -> f64 {
        0.5 * (self.boundaries[index] + self.boundaries[index + 1])
    }

    pub fn weight_kind(&self) -> PacketWeight {
        self.config.weight
    }

    /// Packet weight `f(p)`.
    pub fn weight(&self, momentum: f64) -> f64 {
        match self.config.weight {
            PacketWeight::Unit => 1.0,
            PacketWeight::EnergyUniform => momentum.max(0.0).sqrt(),
        }
    }

    /// `C_i = ∫ f^2 dp` over the cell.
    pub fn norm(&self, index: usize) -> f64 {
        self.norms[index]
    }

    /// `∫ p f(p) dp` over the cell; links packet and continuum normalizations.
    pub fn projection(&self, index: usize) -> f64 {
        let (lower, upper) = self.cell(index);
        match self.config.weight {
            PacketWeight::Unit => 0.5 * (upper * upper - lower * lower),
            PacketWeight::EnergyUniform => 0.4 * (upper.powf(2.5) - lower.powf(2.5)),
        }
    }

    /// Packet element to on-shell value at `momentum` inside cell `index`:
    /// `f(k)^2 / (C_i k^2)`.
    pub fn on_shell_conversion(&self, index: usize, momentum: f64) -> f64 {
        let weight = self.weight(momentum);
        weight * weight / (self.norms[index] * momentum * momentum)
    }

    /// `(1/C_i) ∫ f^2 p^2 dp`, the cell average of `p^2`.
    pub fn mean_square_momentum(&self, index: usize) -> f64 {
        let (lower, upper) = self.cell(index);
        weight_moment(self.config.weight, lower, upper, 2) / self.norms[index]
    }

    /// Cell containing `momentum`; the cutoff belongs to the last cell.
    pub fn locate(&self, momentum: f64) -> Option<usize> {
        let lower = self.lower();
        let upper = self.cutoff();
        if !momentum.is_finite() || momentum < lower || momentum > upper {
            return None;
        }
        if momentum == upper {
            return Some(self.cells() - 1);
        }
        let position = self
            .boundaries
            .partition_point(|boundary| *boundary <= momentum);
        Some(position - 1)
    }

    /// Quadrature nodes and weights inside the cell, or its midpoint when
    /// `midpoint` is set.
    pub fn nodes(&self, index: usize, midpoint: bool) -> TicTacResult<Vec<(f64, f64)>> {
        let (lower, upper) = self.cell(index);
        if midpoint {
            return Ok(vec![(self.midpoint(index), upper - lower)]);
        }
        self.rule
            .mapped(lower, upper)
            .map_err(|error| TicTacError::input_validation("INPUT.GRID", error.to_string()))
    }

    /// `<p_i|p_j>` by quadrature over the intersection of the two cells.
    pub fn overlap(&self, first: usize, second: usize) -> TicTacResult<f64> {
        let (a_lower, a_upper) = self.cell(first);
        let (b_lower, b_upper) = self.cell(second);
        let lower = a_lower.max(b_lower);
        let upper = a_upper.min(b_upper);
        if upper <= lower {
            return Ok(0.0);
        }
        let integral = self
            .rule
            .integrate(lower, upper, |momentum| self.weight(momentum).powi(2))
            .map_err(|error| TicTacError::input_validation("INPUT.GRID", error.to_string()))?;
        Ok(integral / (self.norms[first] * self.norms[second]).sqrt())
    }
}

fn boundaries_for(config: &GridConfig) -> Vec<f64> {
    let cells = config.cells;
    let span = config.cutoff - config.minimum;
    let mut boundaries: Vec<f64> = match config.shape {
        GridShape::Linear => (0..=cells)
            .map(|index| config.minimum + span * index as f64 / cells as f64)
            .collect(),
        GridShape::Chebyshev { scale, power } => {
            let u_max = (span / scale).powf(1.0 / power).atan();
            (0..=cells)
                .map(|index| {
                    let u = index as f64 * u_max / cells as f64;
                    config.minimum + scale * u.tan().powf(power)
                })
                .collect()
        }
    };
    boundaries[0] = config.minimum;
    boundaries[cells] = config.cutoff;
    boundaries
}

/// `∫_lower^upper f(p)^2 p^order dp`.
fn weight_moment(weight: PacketWeight, lower: f64, upper: f64, order: i32) -> f64 {
    let exponent = match weight {
        PacketWeight::Unit => order + 1,
        PacketWeight::EnergyUniform => order + 2,
    };
    (upper.powi(exponent) - lower.powi(exponent)) / exponent as f64
}

/// Grids for the pair momentum `p` and the spectator momentum `q`.
#[derive(Debug, Clone)]
pub struct GridSet {
    pub p: std::sync::Arc<WavePacketGrid>,
    pub q: std::sync::Arc<WavePacketGrid>,
}

impl GridSet {
    pub fn build(p: GridConfig, q: GridConfig) -> TicTacResult<Self> {
        Ok(Self {
            p: std::sync::Arc::new(WavePacketGrid::build(p)?),
            q: std::sync::Arc::new(WavePacketGrid::build(q)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{GridConfig, GridError, GridShape, PacketWeight, WavePacketGrid};

    fn config(shape: GridShape, weight: PacketWeight) -> GridConfig {
        GridConfig {
            cells: 12,
            cutoff: 15.0,
            minimum: 0.0,
            shape,
            weight,
            points_per_cell: 6,
        }
    }

    #[test]
    fn boundaries_cover_the_domain_and_increase() {
        for shape in [
            GridShape::Linear,
            GridShape::Chebyshev {
                scale: 1.0,
                power: 2.0,
            },
        ] {
            let grid = WavePacketGrid::build(config(shape, PacketWeight::Unit)).expect("grid");
            let boundaries = grid.boundaries();
            assert_eq!(boundaries.len(), 13);
            assert_eq!(boundaries[0], 0.0);
            assert_eq!(boundaries[12], 15.0);
            assert!(boundaries.windows(2).all(|pair| pair[1] > pair[0]));
        }
    }

    #[test]
    fn on_shell_conversion_follows_the_packet_weight() {
        let linear = |weight| GridConfig {
            cells: 4,
            cutoff: 4.0,
            minimum: 0.0,
            shape: GridShape::Linear,
            weight,
            points_per_cell: 2,
        };
        let unit = WavePacketGrid::build(linear(PacketWeight::Unit)).expect("grid");
        // Cell [1, 2]: C = 1.
        assert!((unit.on_shell_conversion(1, 1.5) - 4.0 / 9.0).abs() <= 1.0e-14);

        let uniform = WavePacketGrid::build(linear(PacketWeight::EnergyUniform)).expect("grid");
        // C = (4 - 1) / 2, f(k)^2 = k.
        let expected = 2.0 / (1.5 * 3.0);
        assert!((uniform.on_shell_conversion(1, 1.5) - expected).abs() <= 1.0e-14);
    }

    #[test]
    fn chebyshev_grid_is_denser_at_low_momentum() {
        let grid = WavePacketGrid::build(config(
            GridShape::Chebyshev {
                scale: 1.0,
                power: 1.0,
            },
            PacketWeight::Unit,
        ))
        .expect("grid");
        assert!(grid.width(0) < grid.width(11));
    }

    #[test]
    fn packets_are_orthonormal_to_quadrature_precision() {
        for weight in [PacketWeight::Unit, PacketWeight::EnergyUniform] {
            let grid = WavePacketGrid::build(config(GridShape::Linear, weight)).expect("grid");
            for first in 0..grid.cells() {
                for second in 0..grid.cells() {
                    let overlap = grid.overlap(first, second).expect("overlap");
                    let expected = if first == second { 1.0 } else { 0.0 };
                    assert!((overlap - expected).abs() <= 1.0e-12, "{first},{second}: {overlap}");
                }
            }
        }
    }

    #[test]
    fn locate_uses_half_open_cells() {
        let grid = WavePacketGrid::build(config(GridShape::Linear, PacketWeight::Unit)).expect("grid");
        let width = grid.width(0);
        assert_eq!(grid.locate(0.0), Some(0));
        assert_eq!(grid.locate(width), Some(1));
        assert_eq!(grid.locate(0.5 * width), Some(0));
        assert_eq!(grid.locate(15.0), Some(11));
        assert_eq!(grid.locate(15.0 + 1.0e-9), None);
        assert_eq!(grid.locate(f64::NAN), None);
    }

    #[test]
    fn cell_moments_match_closed_forms() {
        let grid = WavePacketGrid::build(config(GridShape::Linear, PacketWeight::EnergyUniform))
            .expect("grid");
        let (lower, upper) = grid.cell(3);
        let norm = 0.5 * (upper * upper - lower * lower);
        assert!((grid.norm(3) - norm).abs() <= 1.0e-12);
        let mean = 0.25 * (upper.powi(4) - lower.powi(4)) / norm;
        assert!((grid.mean_square_momentum(3) - mean).abs() <= 1.0e-12);
        assert!(grid.mean_square_momentum(3) > lower * lower);
        assert!(grid.mean_square_momentum(3) < upper * upper);
    }

    #[test]
    fn invalid_configurations_are_rejected() {
        let mut zero = config(GridShape::Linear, PacketWeight::Unit);
        zero.cells = 0;
        assert_eq!(WavePacketGrid::build(zero), Err(GridError::ZeroCells));

        let mut cutoff = config(GridShape::Linear, PacketWeight::Unit);
        cutoff.cutoff = -1.0;
        assert!(matches!(
            WavePacketGrid::build(cutoff),
            Err(GridError::InvalidCutoff { .. })
        ));

        let mut minimum = config(GridShape::Linear, PacketWeight::Unit);
        minimum.minimum = 20.0;
        assert!(matches!(
            WavePacketGrid::build(minimum),
            Err(GridError::InvalidMinimum { .. })
        ));

        let chebyshev = config(
            GridShape::Chebyshev {
                scale: 0.0,
                power: 1.0,
            },
            PacketWeight::Unit,
        );
        assert!(matches!(
            WavePacketGrid::build(chebyshev),
            Err(GridError::InvalidChebyshev { .. })
        ));
    }

    #[test]
    fn minimum_shifts_the_first_boundary() {
        let mut shifted = config(GridShape::Linear, PacketWeight::Unit);
        shifted.minimum = 0.01;
        let grid = WavePacketGrid::build(shifted).expect("grid");
        assert_eq!(grid.lower(), 0.01);
        assert_eq!(grid.locate(0.0), None);
    }
}
