//! Bin-averaged resolvents.
//!
//! Every average is returned as a [`SplitResolvent`]: a real principal part plus
//! the weight of the on-shell delta function, `value = principal - i pi weight`.
//! The logarithmic end-point singularities are integrated analytically, so no
//! denominator `E - epsilon` is ever formed.

use crate::basis::{PacketWeight, WavePacketGrid};
use crate::common::constants::PI;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SplitResolvent {
    pub principal: f64,
    pub on_shell_weight: f64,
}

impl SplitResolvent {
    pub fn value(&self) -> Complex64 {
        Complex64::new(self.principal, -PI * self.on_shell_weight)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolventTreatment {
    /// Analytic bin averages.
    Subtracted,
    /// Bare `1/(E - epsilon + i eta)` at representative bin energies.
    Unsubtracted,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolventSettings {
    pub treatment: ResolventTreatment,
    /// `eta` of the unsubtracted form.
    pub epsilon: f64,
}

impl Default for ResolventSettings {
    fn default() -> Self {
        Self {
            treatment: ResolventTreatment::Subtracted,
            epsilon: 0.0,
        }
    }
}

/// Energy interval of a two-body level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EnergyBin {
    Bound { energy: f64 },
    Continuum { lower: f64, upper: f64 },
}

impl EnergyBin {
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound { .. })
    }
}

// ln|u| with the end-point singularity regularised to the smallest normal number.
fn ln_abs(u: f64) -> f64 {
    u.abs().max(f64::MIN_POSITIVE).ln()
}

fn below_zero(u: f64) -> f64 {
    if u < 0.0 { 1.0 } else { 0.0 }
}

/// `(1/D) ∫_lower^upper d eps / (E - eps + i0)`.
pub fn bin_average(energy: f64, lower: f64, upper: f64) -> SplitResolvent {
    let width = upper - lower;
    let near = energy - lower;
    let far = energy - upper;
    SplitResolvent {
        principal: (ln_abs(near) - ln_abs(far)) / width,
        on_shell_weight: (below_zero(far) - below_zero(near)) / width,
    }
}

// u ln(u + i0) split into (u ln|u|, u [u < 0]); zero at u = 0.
fn corner(u: f64) -> (f64, f64) {
    if u == 0.0 {
        (0.0, 0.0)
    } else {
        (u * u.abs().ln(), u * below_zero(u))
    }
}

/// `(1/(D1 D2)) ∫∫ dx dy / (E - x - y + i0)` over `[x_lower, x_upper] × [y_lower, y_upper]`.
pub fn rectangle_average(
    energy: f64,
    (x_lower, x_upper): (f64, f64),
    (y_lower, y_upper): (f64, f64),
) -> SplitResolvent {
    let area = (x_upper - x_lower) * (y_upper - y_lower);
    let on_shell = energy - x_lower - y_lower > 0.0 && energy - x_upper - y_upper < 0.0;
    let signed = [
        (x_upper, y_upper, 1.0),
        (x_upper, y_lower, -1.0),
        (x_lower, y_upper, -1.0),
        (x_lower, y_lower, 1.0),
    ];
    let mut principal = 0.0;
    let mut negative = 0.0;
    for (x, y, sign) in signed {
        let (real, imaginary) = corner(energy - x - y);
        principal += sign * real;
        negative += sign * imaginary;
    }
    SplitResolvent {
        principal: principal / area,
        // The signed corner sum of a linear function cancels only up to rounding.
        on_shell_weight: if on_shell { -negative / area } else { 0.0 },
    }
}

/// Cell average of the free two-body resolvent,
/// `(1/C) ∫ f(p)^2 dp / (E - kappa p^2 + i0)` over cell `cell`.
pub fn free_cell_average(
    grid: &WavePacketGrid,
    cell: usize,
    energy: f64,
    kappa: f64,
) -> SplitResolvent {
    let (lower, upper) = grid.cell(cell);
    match grid.weight_kind() {
        PacketWeight::EnergyUniform => {
            bin_average(energy, kappa * lower * lower, kappa * upper * upper)
        }
        PacketWeight::Unit => unit_cell_average(energy, lower, upper, kappa),
    }
}

fn unit_cell_average(energy: f64, lower: f64, upper: f64, kappa: f64) -> SplitResolvent {
    let width = upper - lower;
    if energy > 0.0 {
        let k = (energy / kappa).sqrt();
        let primitive = |p: f64| ln_abs(k + p) - ln_abs(k - p);
        let inside = if lower <= k && k < upper { 1.0 } else { 0.0 };
        SplitResolvent {
            principal: (primitive(upper) - primitive(lower)) / (2.0 * k * kappa * width),
            on_shell_weight: inside / (2.0 * kappa * k * width),
        }
    } else if energy < 0.0 {
        let gamma = (-energy / kappa).sqrt();
        SplitResolvent {
            principal: -((upper / gamma).atan() - (lower / gamma).atan()) / (kappa * gamma * width),
            on_shell_weight: 0.0,
        }
    } else {
        let lower = lower.max(f64::MIN_POSITIVE.sqrt());
        SplitResolvent {
            principal: -(1.0 / lower - 1.0 / upper) / (kappa * width),
            on_shell_weight: 0.0,
        }
    }
}

/// Representative-energy form used by [`ResolventTreatment::Unsubtracted`].
pub fn unsubtracted(energy: f64, representative: f64, epsilon: f64) -> Complex64 {
    Complex64::new(1.0, 0.0) / Complex64::new(energy - representative, epsilon)
}
