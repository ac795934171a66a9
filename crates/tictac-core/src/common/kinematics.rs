//! Energy frames of the nucleon-deuteron reaction.

use super::constants::{DEUTERON_MASS, PROTON_MASS, SPECTATOR_KINETIC_FACTOR};
use crate::domain::{TicTacError, TicTacResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnergyFrame {
    /// Energies are already centre-of-mass kinetic energies.
    CentreOfMass,
    /// Nucleon beam on a deuteron at rest, `E_cm = 2/3 T_lab`.
    #[default]
    Lab,
    /// Deuteron beam on a proton at rest, from the invariant mass.
    LabRelativistic,
}

/// One requested energy in both frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyPoint {
    pub lab: f64,
    pub centre_of_mass: f64,
}

impl EnergyFrame {
    pub fn resolve(self, energy: f64) -> TicTacResult<EnergyPoint> {
        if !(energy.is_finite() && energy > 0.0) {
            return Err(TicTacError::input_validation(
                "INPUT.ENERGY",
                format!("scattering energies must be positive, got {energy}"),
            ));
        }
        let point = match self {
            Self::CentreOfMass => EnergyPoint {
                lab: 1.5 * energy,
                centre_of_mass: energy,
            },
            Self::Lab => EnergyPoint {
                lab: energy,
                centre_of_mass: 2.0 * energy / 3.0,
            },
            Self::LabRelativistic => {
                let threshold = DEUTERON_MASS + PROTON_MASS;
                let invariant = threshold * threshold + 2.0 * PROTON_MASS * energy;
                EnergyPoint {
                    lab: energy,
                    centre_of_mass: invariant.sqrt() - threshold,
                }
            }
        };
        Ok(point)
    }
}

/// Spectator momentum carrying `E_cm` relative to the bound pair.
pub fn on_shell_momentum(centre_of_mass: f64, kappa: f64) -> f64 {
    (centre_of_mass / (SPECTATOR_KINETIC_FACTOR * kappa)).max(0.0).sqrt()
}

#[cfg(test)]
mod tests {
    use super::{EnergyFrame, on_shell_momentum};
    use crate::common::config::EnergySettings;
    use crate::common::constants::HBAR_SQUARED_OVER_NUCLEON_MASS;

    #[test]
    fn lab_energies_convert_to_two_thirds() {
        let point = EnergyFrame::Lab.resolve(3.0).expect("energy");
        assert!((point.centre_of_mass - 2.0).abs() <= 1.0e-14);
        let point = EnergyFrame::CentreOfMass.resolve(2.0).expect("energy");
        assert!((point.lab - 3.0).abs() <= 1.0e-14);
    }

    #[test]
    fn relativistic_frame_is_close_to_the_proton_share_at_low_energy() {
        // Deuteron beam: the proton carries m_p / (m_p + m_d) of the lab energy.
        let point = EnergyFrame::LabRelativistic.resolve(6.0).expect("energy");
        let non_relativistic = 6.0 * 938.272 / (938.272 + 1875.613);
        assert!((point.centre_of_mass - non_relativistic).abs() <= 1.0e-3);
    }

    #[test]
    fn default_frame_matches_the_energy_settings_default() {
        assert_eq!(EnergyFrame::default(), EnergyFrame::Lab);
        assert_eq!(EnergySettings::default().frame, EnergyFrame::default());
        let settings: EnergySettings = serde_json::from_str(r#"{"values": [3.0]}"#).expect("parse");
        assert_eq!(settings.frame, EnergyFrame::Lab);
    }

    #[test]
    fn non_positive_energies_are_rejected() {
        for energy in [0.0, -1.0, f64::NAN] {
            let error = EnergyFrame::Lab.resolve(energy).expect_err("invalid");
            assert_eq!(error.placeholder(), "INPUT.ENERGY");
        }
    }

    #[test]
    fn on_shell_momentum_inverts_the_spectator_energy() {
        let q = on_shell_momentum(3.0, HBAR_SQUARED_OVER_NUCLEON_MASS);
        assert!((0.75 * HBAR_SQUARED_OVER_NUCLEON_MASS * q * q - 3.0).abs() <= 1.0e-12);
    }
}
