//! Physical constants shared by the kinematics, potentials and resolvent.
//!
//! Momenta are in fm^-1, energies in MeV.

pub const PI: f64 = std::f64::consts::PI;

/// hbar^2 / m_N in MeV fm^2, the default kinetic scale `kappa`.
pub const HBAR_SQUARED_OVER_NUCLEON_MASS: f64 = 41.47;

pub const HBARC: f64 = 197.326_98;
pub const PROTON_MASS: f64 = 938.272;
pub const NEUTRON_MASS: f64 = 939.565;
pub const DEUTERON_MASS: f64 = 1875.613;

/// Spectator kinetic energy is `SPECTATOR_KINETIC_FACTOR * kappa * q^2`.
pub const SPECTATOR_KINETIC_FACTOR: f64 = 0.75;
