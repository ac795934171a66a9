//! Wave-packet solver for three-nucleon elastic scattering.
//!
//! The pipeline discretizes the pair and spectator momenta into wave packets,
//! diagonalizes every pair Hamiltonian into scattering wave packets, assembles
//! the exchange operator once per `(J, pi)` block and solves the Faddeev
//! equation at each requested energy.

pub mod basis;
pub mod common;
pub mod domain;
pub mod faddeev;
pub mod numerics;
pub mod output;
pub mod permutation;
pub mod pipeline;
pub mod potential;
pub mod resolvent;
