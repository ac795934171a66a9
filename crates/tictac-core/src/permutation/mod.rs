//! The particle-exchange operator `P = P123 + P132` in the wave-packet basis.

pub mod assembly;
pub mod geometry;
pub mod sparse;
pub mod store;

pub use assembly::{AssemblyReport, MismatchPolicy, PermutationSettings, assemble};
pub use geometry::{ChannelCoupling, spin_recoupling};
pub use sparse::{SparseMatrix, Triplet};
pub use store::{FORMAT_VERSION, PermutationFingerprint, PermutationStore, StoreError};

use crate::basis::{ChannelSet, GridSet, WavePacketBasis};
use crate::domain::{TicTacError, TicTacResult};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermutationSource {
    Computed,
    Loaded,
}

#[derive(Debug, Clone)]
pub struct PermutationOperator {
    pub matrix: Arc<SparseMatrix>,
    pub source: PermutationSource,
    /// Present when the operator was assembled in this run.
    pub report: Option<AssemblyReport>,
    pub artifact: Option<PathBuf>,
}

pub fn fingerprint_for(
    channels: &ChannelSet,
    grids: &GridSet,
    settings: &PermutationSettings,
) -> PermutationFingerprint {
    PermutationFingerprint {
        format_version: FORMAT_VERSION,
        block: channels.block(),
        channels: channels.channels(),
        p_grid: *grids.p.config(),
        q_grid: *grids.q.config(),
        angle_points: settings.angle_points,
        drop_threshold: settings.drop_threshold,
        midpoint: settings.midpoint,
    }
}

/// Loads the operator for this configuration when a matching artifact exists,
/// otherwise assembles it and persists it when a store directory is set.
pub fn obtain(
    channels: &ChannelSet,
    grids: &GridSet,
    basis: &WavePacketBasis,
    settings: &PermutationSettings,
) -> TicTacResult<PermutationOperator> {
    let Some(directory) = settings.store_directory.as_ref() else {
        let (matrix, report) = assemble(channels, grids, basis, settings)?;
        return Ok(PermutationOperator {
            matrix: Arc::new(matrix),
            source: PermutationSource::Computed,
            report: Some(report),
            artifact: None,
        });
    };

    let store = PermutationStore::new(directory);
    let fingerprint = fingerprint_for(channels, grids, settings);
    match store.load(&fingerprint) {
        Ok(Some(matrix)) if matrix.dimension() == basis.len() => {
            let artifact = store.path_for(&fingerprint)?;
            info!(
                block = %channels.block(),
                path = %artifact.display(),
                nnz = matrix.nnz(),
                "loaded permutation operator"
            );
            return Ok(PermutationOperator {
                matrix: Arc::new(matrix),
                source: PermutationSource::Loaded,
                report: None,
                artifact: Some(artifact),
            });
        }
        Ok(Some(matrix)) => {
            recover(
                settings.mismatch_policy,
                TicTacError::persistence(
                    "STORE.CORRUPT",
                    format!(
                        "stored operator has dimension {} but the basis has {}",
                        matrix.dimension(),
                        basis.len()
                    ),
                ),
            )?;
        }
        Ok(None) => {}
        Err(error @ (StoreError::Io { .. } | StoreError::Fingerprint { .. })) => {
            return Err(error.into());
        }
        Err(error) => recover(settings.mismatch_policy, error.into())?,
    }

    let (matrix, report) = assemble(channels, grids, basis, settings)?;
    let artifact = store.save(&fingerprint, &matrix)?;
    info!(block = %channels.block(), path = %artifact.display(), "stored permutation operator");
    Ok(PermutationOperator {
        matrix: Arc::new(matrix),
        source: PermutationSource::Computed,
        report: Some(report),
        artifact: Some(artifact),
    })
}

fn recover(policy: MismatchPolicy, error: TicTacError) -> TicTacResult<()> {
    match policy {
        MismatchPolicy::Abort => Err(error),
        MismatchPolicy::Recompute => {
            warn!(error = %error, "discarding stored permutation operator");
            Ok(())
        }
    }
}
