//! Three-nucleon partial waves in jI coupling.
//!
//! A channel couples the pair `(l s) j` with isospin `t`, the spectator orbital
//! `lambda` with its spin to `I`, and `j` with `I` to the total `J`. Half-integer
//! quantities are stored doubled.

use crate::domain::{JpBlock, Parity, TicTacError, TicTacResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

const ORBITAL_LETTERS: [char; 8] = ['S', 'P', 'D', 'F', 'G', 'H', 'I', 'K'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelRules {
    /// Largest doubled total angular momentum; blocks run over `1, 3, ..., two_j3_max`.
    pub two_j3_max: u32,
    pub j2_max: u32,
    pub tensor_force: bool,
    pub isospin_breaking: bool,
}

impl Default for ChannelRules {
    fn default() -> Self {
        Self {
            two_j3_max: 1,
            j2_max: 1,
            tensor_force: false,
            isospin_breaking: false,
        }
    }
}

impl ChannelRules {
    pub fn validate(&self) -> TicTacResult<()> {
        if self.two_j3_max == 0 || self.two_j3_max % 2 == 0 {
            return Err(TicTacError::input_validation(
                "INPUT.CHANNELS",
                format!(
                    "twoJ3Max must be a positive odd number, got {}",
                    self.two_j3_max
                ),
            ));
        }
        Ok(())
    }

    pub fn blocks(&self) -> Vec<JpBlock> {
        JpBlock::enumerate(self.two_j3_max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Channel {
    pub l: u32,
    pub s: u32,
    pub j: u32,
    pub t: u32,
    pub lambda: u32,
    pub two_i: u32,
    pub two_j: u32,
    pub two_t: u32,
}

impl Channel {
    pub fn parity(&self) -> Parity {
        Parity::of_orbital_sum(self.l + self.lambda)
    }

    /// Spectroscopic label of the pair, e.g. `3S1`.
    pub fn pair_label(&self) -> String {
        let letter = ORBITAL_LETTERS
            .get(self.l as usize)
            .copied()
            .unwrap_or('?');
        format!("{}{}{}", 2 * self.s + 1, letter, self.j)
    }

    pub fn two_body_key(&self) -> TwoBodyKey {
        TwoBodyKey {
            s: self.s,
            j: self.j,
            t: self.t,
            two_t: self.two_t,
        }
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} lambda={} I={}/2 T={}/2",
            self.pair_label(),
            self.lambda,
            self.two_i,
            self.two_t
        )
    }
}

/// Pair quantum numbers shared by every orbital component of a two-body sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TwoBodyKey {
    pub s: u32,
    pub j: u32,
    pub t: u32,
    pub two_t: u32,
}

/// A two-body partial wave, possibly tensor-coupled over several `l`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TwoBodyChannel {
    pub key: TwoBodyKey,
    /// Orbital components in increasing order.
    pub orbitals: Vec<u32>,
}

impl TwoBodyChannel {
    pub fn is_coupled(&self) -> bool {
        self.orbitals.len() > 1
    }

    pub fn component_of(&self, l: u32) -> Option<usize> {
        self.orbitals.iter().position(|orbital| *orbital == l)
    }

    pub fn label(&self) -> String {
        self.orbitals
            .iter()
            .map(|l| {
                let letter = ORBITAL_LETTERS.get(*l as usize).copied().unwrap_or('?');
                format!("{}{}{}", 2 * self.key.s + 1, letter, self.key.j)
            })
            .collect::<Vec<_>>()
            .join("-")
    }
}

/// Channels sharing one two-body sector and one spectator state.
///
/// `channels[a]` is the three-body channel carrying `two_body.orbitals[a]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sector {
    pub two_body: usize,
    pub lambda: u32,
    pub two_i: u32,
    pub channels: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub index: usize,
    pub channel: Channel,
    /// Number of basis states this channel contributes (`Np * Nq`).
    pub dimension: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSet {
    block: JpBlock,
    records: Vec<ChannelRecord>,
    two_body: Vec<TwoBodyChannel>,
    sectors: Vec<Sector>,
}

impl ChannelSet {
    pub fn enumerate(
        rules: &ChannelRules,
        block: JpBlock,
        p_cells: usize,
        q_cells: usize,
    ) -> TicTacResult<Self> {
        let channels = allowed_channels(rules, block);
        if channels.is_empty() {
            return Err(TicTacError::input_validation(
                "INPUT.CHANNELS",
                format!(
                    "no channels satisfy the coupling rules for {block} with j2Max={}",
                    rules.j2_max
                ),
            ));
        }

        let records: Vec<ChannelRecord> = channels
            .into_iter()
            .enumerate()
            .map(|(index, channel)| ChannelRecord {
                index,
                channel,
                dimension: p_cells * q_cells,
            })
            .collect();

        let (two_body, sectors) = group_sectors(&records, rules.tensor_force);
        Ok(Self {
            block,
            records,
            two_body,
            sectors,
        })
    }

    pub fn block(&self) -> JpBlock {
        self.block
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ChannelRecord] {
        &self.records
    }

    pub fn channel(&self, index: usize) -> &Channel {
        &self.records[index].channel
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.records.iter().map(|record| record.channel).collect()
    }

    pub fn two_body_channels(&self) -> &[TwoBodyChannel] {
        &self.two_body
    }

    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    pub fn total_dimension(&self) -> usize {
        self.records.iter().map(|record| record.dimension).sum()
    }

    pub fn max_orbital(&self) -> u32 {
        self.records
            .iter()
            .map(|record| record.channel.l.max(record.channel.lambda))
            .max()
            .unwrap_or(0)
    }
}

fn allowed_channels(rules: &ChannelRules, block: JpBlock) -> Vec<Channel> {
    let isospins: &[u32] = if rules.isospin_breaking { &[1, 3] } else { &[1] };
    let two_j3 = block.two_j;
    let mut channels = Vec::new();

    for &two_t in isospins {
        for j in 0..=rules.j2_max {
            for s in 0..=1_u32 {
                let l_min = j.abs_diff(s);
                for l in l_min..=(j + s) {
                    let t = 1 - (l + s) % 2;
                    if two_t == 3 && t != 1 {
                        continue;
                    }
                    let lambda_max = (two_j3 + 2 * j + 1) / 2;
                    for lambda in 0..=lambda_max {
                        if Parity::of_orbital_sum(l + lambda) != block.parity {
                            continue;
                        }
                        for two_i in spectator_spins(lambda) {
                            if (2 * j).abs_diff(two_i) <= two_j3 && two_j3 <= 2 * j + two_i {
                                channels.push(Channel {
                                    l,
                                    s,
                                    j,
                                    t,
                                    lambda,
                                    two_i,
                                    two_j: two_j3,
                                    two_t,
                                });
                            }
                        }
                    }
                }
            }
        }
    }

    channels
}

fn spectator_spins(lambda: u32) -> Vec<u32> {
    if lambda == 0 {
        vec![1]
    } else {
        vec![2 * lambda - 1, 2 * lambda + 1]
    }
}

fn group_sectors(records: &[ChannelRecord], tensor_force: bool) -> (Vec<TwoBodyChannel>, Vec<Sector>) {
    // (pair key, lambda, 2I, orbital group) -> member channels in enumeration order.
    let mut groups: BTreeMap<(TwoBodyKey, u32, u32, u32), Vec<usize>> = BTreeMap::new();
    let mut first_seen: Vec<(TwoBodyKey, u32, u32, u32)> = Vec::new();

    for record in records {
        let channel = &record.channel;
        let coupled = tensor_force && channel.s == 1 && channel.l != channel.j;
        // l = j - 1 and l = j + 1 share the group tag j + 1000 when coupled.
        let orbital_group = if coupled { channel.j + 1000 } else { channel.l };
        let key = (channel.two_body_key(), channel.lambda, channel.two_i, orbital_group);
        let members = groups.entry(key).or_default();
        if members.is_empty() {
            first_seen.push(key);
        }
        members.push(record.index);
    }

    let mut two_body: Vec<TwoBodyChannel> = Vec::new();
    let mut sectors = Vec::with_capacity(first_seen.len());
    for key in first_seen {
        let mut members = groups.remove(&key).unwrap_or_default();
        members.sort_by_key(|index| records[*index].channel.l);
        let orbitals: Vec<u32> = members
            .iter()
            .map(|index| records[*index].channel.l)
            .collect();
        let candidate = TwoBodyChannel {
            key: key.0,
            orbitals,
        };
        let two_body_index = match two_body.iter().position(|known| *known == candidate) {
            Some(index) => index,
            None => {
                two_body.push(candidate);
                two_body.len() - 1
            }
        };
        sectors.push(Sector {
            two_body: two_body_index,
            lambda: key.1,
            two_i: key.2,
            channels: members,
        });
    }

    (two_body, sectors)
}
