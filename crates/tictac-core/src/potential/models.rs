use super::PotentialModel;
use crate::basis::TwoBodyChannel;
use crate::common::constants::PI;
use crate::domain::{TicTacError, TicTacResult};
use crate::numerics::special::legendre_q;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MalflietTjonVariant {
    /// Singlet and triplet attraction differ (MT I for `s = 0`, MT III for `s = 1`).
    #[serde(rename = "I-III")]
    SpinDependent,
    /// Spin-averaged MT V.
    #[serde(rename = "V")]
    SpinAveraged,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "camelCase")]
pub enum PotentialSelection {
    MalflietTjon {
        variant: MalflietTjonVariant,
    },
    /// Rank-one separable s-wave attraction `-strength g(p) g(p')`,
    /// `g(p) = 1/(p^2 + range^2)`.
    Yamaguchi {
        strength: f64,
        range: f64,
    },
}

impl Default for PotentialSelection {
    fn default() -> Self {
        Self::MalflietTjon {
            variant: MalflietTjonVariant::SpinDependent,
        }
    }
}

impl PotentialSelection {
    pub fn validate(&self) -> TicTacResult<()> {
        if let Self::Yamaguchi { strength, range } = *self
            && !(strength.is_finite() && range.is_finite() && range > 0.0)
        {
            return Err(TicTacError::input_validation(
                "INPUT.POTENTIAL",
                format!("Yamaguchi needs a finite strength and positive range, got {strength}, {range}"),
            ));
        }
        Ok(())
    }

    pub fn build(&self) -> Arc<dyn PotentialModel> {
        match *self {
            Self::MalflietTjon { variant } => Arc::new(MalflietTjon::new(variant)),
            Self::Yamaguchi { strength, range } => Arc::new(Yamaguchi::new(strength, range)),
        }
    }
}

/// Yukawa pair with strengths in MeV fm and ranges in fm^-1.
#[derive(Debug, Clone, Copy, PartialEq)]
struct YukawaPair {
    repulsive: f64,
    repulsive_range: f64,
    attractive: f64,
    attractive_range: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MalflietTjon {
    variant: MalflietTjonVariant,
    singlet: YukawaPair,
    triplet: YukawaPair,
}

impl MalflietTjon {
    pub fn new(variant: MalflietTjonVariant) -> Self {
        let (singlet, triplet) = match variant {
            MalflietTjonVariant::SpinDependent => (
                YukawaPair {
                    repulsive: 1438.7228,
                    repulsive_range: 3.11,
                    attractive: 513.968,
                    attractive_range: 1.55,
                },
                YukawaPair {
                    repulsive: 1438.7228,
                    repulsive_range: 3.11,
                    attractive: 626.8932,
                    attractive_range: 1.55,
                },
            ),
            MalflietTjonVariant::SpinAveraged => {
                let averaged = YukawaPair {
                    repulsive: 1458.047,
                    repulsive_range: 3.11,
                    attractive: 578.089,
                    attractive_range: 1.55,
                };
                (averaged, averaged)
            }
        };
        Self {
            variant,
            singlet,
            triplet,
        }
    }

    pub fn variant(&self) -> MalflietTjonVariant {
        self.variant
    }
}

// Partial-wave projection of strength * exp(-mu r) / r: strength Q_l(z) / (pi p p').
fn yukawa_partial_wave(strength: f64, range: f64, l: u32, p_out: f64, p_in: f64) -> f64 {
    let product = p_out * p_in;
    let z = (p_out * p_out + p_in * p_in + range * range) / (2.0 * product);
    legendre_q(l, z).map_or(0.0, |q| strength * q / (PI * product))
}

impl PotentialModel for MalflietTjon {
    fn name(&self) -> &str {
        match self.variant {
            MalflietTjonVariant::SpinDependent => "Malfliet-Tjon I-III",
            MalflietTjonVariant::SpinAveraged => "Malfliet-Tjon V",
        }
    }

    fn evaluate(
        &self,
        channel: &TwoBodyChannel,
        l_out: u32,
        l_in: u32,
        p_out: f64,
        p_in: f64,
    ) -> Complex64 {
        if l_out != l_in || p_out <= 0.0 || p_in <= 0.0 {
            return Complex64::new(0.0, 0.0);
        }
        let pair = if channel.key.s == 0 {
            &self.singlet
        } else {
            &self.triplet
        };
        let value = yukawa_partial_wave(pair.repulsive, pair.repulsive_range, l_out, p_out, p_in)
            - yukawa_partial_wave(pair.attractive, pair.attractive_range, l_out, p_out, p_in);
        Complex64::new(value, 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Yamaguchi {
    strength: f64,
    range: f64,
}

impl Yamaguchi {
    pub fn new(strength: f64, range: f64) -> Self {
        Self { strength, range }
    }

    /// Strength producing a bound state at `-binding` MeV.
    pub fn with_binding(range: f64, binding: f64, kappa: f64) -> Self {
        let gamma = (binding / kappa).sqrt();
        let strength = 4.0 * kappa * range * (range + gamma).powi(2) / PI;
        Self::new(strength, range)
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    pub fn range(&self) -> f64 {
        self.range
    }

    pub fn form_factor(&self, momentum: f64) -> f64 {
        1.0 / (momentum * momentum + self.range * self.range)
    }

    /// Exact s-wave phase shift (radians, modulo pi) at on-shell momentum `k`.
    pub fn phase_shift(&self, k: f64, kappa: f64) -> f64 {
        let beta = self.range;
        let k_cot = 2.0 * kappa * (k * k + beta * beta).powi(2) / (PI * self.strength)
            - (beta * beta - k * k) / (2.0 * beta);
        (k / k_cot).atan()
    }
}

impl PotentialModel for Yamaguchi {
    fn name(&self) -> &str {
        "Yamaguchi"
    }

    fn evaluate(
        &self,
        _channel: &TwoBodyChannel,
        l_out: u32,
        l_in: u32,
        p_out: f64,
        p_in: f64,
    ) -> Complex64 {
        if l_out != 0 || l_in != 0 {
            return Complex64::new(0.0, 0.0);
        }
        Complex64::new(
            -self.strength * self.form_factor(p_out) * self.form_factor(p_in),
            0.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{MalflietTjon, MalflietTjonVariant, PotentialSelection, Yamaguchi};
    use crate::basis::{TwoBodyChannel, TwoBodyKey};
    use crate::potential::PotentialModel;

    fn channel(s: u32, l: u32) -> TwoBodyChannel {
        TwoBodyChannel {
            key: TwoBodyKey {
                s,
                j: l + s,
                t: 1 - (l + s) % 2,
                two_t: 1,
            },
            orbitals: vec![l],
        }
    }

    #[test]
    fn malfliet_tjon_is_symmetric_and_central() {
        let model = MalflietTjon::new(MalflietTjonVariant::SpinDependent);
        let triplet = channel(1, 0);
        let forward = model.evaluate(&triplet, 0, 0, 0.7, 1.9);
        let backward = model.evaluate(&triplet, 0, 0, 1.9, 0.7);
        assert!((forward - backward).norm() <= 1.0e-12 * forward.norm());
        assert_eq!(model.evaluate(&triplet, 0, 2, 0.7, 1.9).norm(), 0.0);
    }

    #[test]
    fn triplet_is_more_attractive_at_low_momentum() {
        let model = MalflietTjon::new(MalflietTjonVariant::SpinDependent);
        let singlet = model.evaluate(&channel(0, 0), 0, 0, 0.2, 0.2).re;
        let triplet = model.evaluate(&channel(1, 0), 0, 0, 0.2, 0.2).re;
        assert!(singlet < 0.0);
        assert!(triplet < singlet);
    }

    #[test]
    fn yamaguchi_binding_strength_matches_pole_condition() {
        let kappa = 41.47;
        let model = Yamaguchi::with_binding(1.4488, 2.2246, kappa);
        // k cot(delta) -> -1/a; a bound state gives a positive scattering length.
        let delta = model.phase_shift(1.0e-4, kappa);
        let scattering_length = -delta.tan() / 1.0e-4;
        assert!(
            (scattering_length - 5.378).abs() <= 0.01,
            "a={scattering_length}"
        );
    }

    #[test]
    fn selection_round_trips_through_json() {
        let selection: PotentialSelection =
            serde_json::from_str(r#"{"model":"malflietTjon","variant":"V"}"#)
                .expect("selection should parse");
        assert_eq!(
            selection,
            PotentialSelection::MalflietTjon {
                variant: MalflietTjonVariant::SpinAveraged
            }
        );
        assert!(
            PotentialSelection::Yamaguchi {
                strength: 1.0,
                range: 0.0
            }
            .validate()
            .is_err()
        );
    }
}
