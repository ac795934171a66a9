//! On-shell elastic amplitudes and what is derived from them.

use crate::common::constants::PI;
use num_complex::Complex64;

const ASYMMETRY_FLOOR: f64 = 1.0e-12;

/// Elastic `U(out, in)` for the bound-pair channels of one block at one energy.
#[derive(Debug, Clone, PartialEq)]
pub struct ElasticAmplitudes {
    pub centre_of_mass: f64,
    pub lab: f64,
    /// On-shell spectator momentum of every open channel, fm^-1.
    pub momenta: Vec<f64>,
    /// Spectator cell holding each on-shell momentum.
    pub q_cells: Vec<usize>,
    /// Three-body channel index of every open elastic channel.
    pub channels: Vec<usize>,
    /// Row-major `U(out, in)`, MeV fm^3.
    pub u: Vec<Complex64>,
}

impl ElasticAmplitudes {
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn u(&self, out: usize, inc: usize) -> Complex64 {
        self.u[out * self.len() + inc]
    }

    /// `S_ab = delta_ab - 2 pi i sqrt(rho_a rho_b) U_ab` with `rho_a = 2 q_a / (3 kappa)`.
    pub fn s_matrix(&self, kappa: f64) -> Vec<Complex64> {
        let rho: Vec<f64> = self
            .momenta
            .iter()
            .map(|momentum| 2.0 * momentum / (3.0 * kappa))
            .collect();
        let n = self.len();
        let mut s = Vec::with_capacity(n * n);
        for out in 0..n {
            for inc in 0..n {
                let identity = if out == inc { 1.0 } else { 0.0 };
                let coupling = Complex64::new(0.0, 2.0 * PI * (rho[out] * rho[inc]).sqrt());
                s.push(Complex64::new(identity, 0.0) - coupling * self.u(out, inc));
            }
        }
        s
    }

    /// `Im(U00* U01) / (|U00|^2 + |U01|^2)` from the first two elastic channels.
    pub fn analyzing_power_estimate(&self) -> Option<f64> {
        if self.len() < 2 {
            return None;
        }
        let diagonal = self.u(0, 0);
        let off_diagonal = self.u(0, 1);
        let denominator = diagonal.norm_sqr() + off_diagonal.norm_sqr();
        if denominator < ASYMMETRY_FLOOR {
            return Some(0.0);
        }
        Some((diagonal.conj() * off_diagonal).im / denominator)
    }
}
