//! Global index arenas for the wave-packet and scattering-wave-packet bases.

use super::channels::ChannelSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BasisState {
    pub channel: usize,
    pub p_cell: usize,
    pub q_cell: usize,
}

/// `|alpha, p_i, q_j>` states with an explicit index table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavePacketBasis {
    states: Vec<BasisState>,
    index: Vec<usize>,
    channels: usize,
    p_cells: usize,
    q_cells: usize,
}

impl WavePacketBasis {
    pub fn new(channels: &ChannelSet, p_cells: usize, q_cells: usize) -> Self {
        let channel_count = channels.len();
        let mut states = Vec::with_capacity(channel_count * p_cells * q_cells);
        let mut index = vec![usize::MAX; channel_count * p_cells * q_cells];
        for record in channels.records() {
            for p_cell in 0..p_cells {
                for q_cell in 0..q_cells {
                    index[(record.index * p_cells + p_cell) * q_cells + q_cell] = states.len();
                    states.push(BasisState {
                        channel: record.index,
                        p_cell,
                        q_cell,
                    });
                }
            }
        }
        Self {
            states,
            index,
            channels: channel_count,
            p_cells,
            q_cells,
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &[BasisState] {
        &self.states
    }

    pub fn state(&self, index: usize) -> BasisState {
        self.states[index]
    }

    pub fn index_of(&self, channel: usize, p_cell: usize, q_cell: usize) -> Option<usize> {
        if channel >= self.channels || p_cell >= self.p_cells || q_cell >= self.q_cells {
            return None;
        }
        let slot = self.index[(channel * self.p_cells + p_cell) * self.q_cells + q_cell];
        (slot != usize::MAX).then_some(slot)
    }

    pub fn p_cells(&self) -> usize {
        self.p_cells
    }

    pub fn q_cells(&self) -> usize {
        self.q_cells
    }
}

/// `|sigma, k, q_j>`: level `k` of the pair Hamiltonian of sector `sigma`
/// times spectator packet `j`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SwpState {
    pub sector: usize,
    pub level: usize,
    pub q_cell: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwpBasisIndex {
    states: Vec<SwpState>,
    sector_offsets: Vec<usize>,
    levels: Vec<usize>,
    q_cells: usize,
}

impl SwpBasisIndex {
    /// `levels[sigma]` is the number of pair levels in sector `sigma`.
    pub fn new(levels: Vec<usize>, q_cells: usize) -> Self {
        let mut states = Vec::new();
        let mut sector_offsets = Vec::with_capacity(levels.len());
        for (sector, count) in levels.iter().enumerate() {
            sector_offsets.push(states.len());
            for level in 0..*count {
                for q_cell in 0..q_cells {
                    states.push(SwpState {
                        sector,
                        level,
                        q_cell,
                    });
                }
            }
        }
        Self {
            states,
            sector_offsets,
            levels,
            q_cells,
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &[SwpState] {
        &self.states
    }

    pub fn index_of(&self, sector: usize, level: usize, q_cell: usize) -> Option<usize> {
        let count = *self.levels.get(sector)?;
        if level >= count || q_cell >= self.q_cells {
            return None;
        }
        Some(self.sector_offsets[sector] + level * self.q_cells + q_cell)
    }

    pub fn levels(&self, sector: usize) -> usize {
        self.levels[sector]
    }

    pub fn q_cells(&self) -> usize {
        self.q_cells
    }
}

#[cfg(test)]
mod tests {
    use super::{SwpBasisIndex, WavePacketBasis};
    use crate::basis::channels::{ChannelRules, ChannelSet};
    use crate::domain::{JpBlock, Parity};

    #[test]
    fn every_state_has_a_unique_index() {
        let channels = ChannelSet::enumerate(
            &ChannelRules::default(),
            JpBlock::new(1, Parity::Even),
            3,
            2,
        )
        .expect("channels");
        let basis = WavePacketBasis::new(&channels, 3, 2);
        assert_eq!(basis.len(), channels.total_dimension());
        for (index, state) in basis.states().iter().enumerate() {
            assert_eq!(
                basis.index_of(state.channel, state.p_cell, state.q_cell),
                Some(index)
            );
        }
        assert_eq!(basis.index_of(channels.len(), 0, 0), None);
        assert_eq!(basis.index_of(0, 3, 0), None);
    }

    #[test]
    fn swp_index_round_trips_through_the_arena() {
        let index = SwpBasisIndex::new(vec![2, 4, 1], 3);
        assert_eq!(index.len(), 21);
        for (slot, state) in index.states().iter().enumerate() {
            assert_eq!(index.index_of(state.sector, state.level, state.q_cell), Some(slot));
        }
        assert_eq!(index.index_of(0, 2, 0), None);
        assert_eq!(index.index_of(3, 0, 0), None);
    }
}
