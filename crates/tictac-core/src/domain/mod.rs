pub mod errors;

pub use errors::{ErrorCategory, ExitDescriptor, TicTacError, TicTacResult};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    pub const fn sign(self) -> i32 {
        match self {
            Self::Even => 1,
            Self::Odd => -1,
        }
    }

    pub const fn of_orbital_sum(sum: u32) -> Self {
        if sum % 2 == 0 { Self::Even } else { Self::Odd }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Even => "+",
            Self::Odd => "-",
        }
    }
}

/// Total angular momentum and parity of a three-body partial-wave block.
///
/// Blocks do not couple to each other, so every stage of the pipeline runs
/// once per block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JpBlock {
    pub two_j: u32,
    pub parity: Parity,
}

impl JpBlock {
    pub const fn new(two_j: u32, parity: Parity) -> Self {
        Self { two_j, parity }
    }

    /// Tag used in artifact file names, e.g. `JP_3_-1`.
    pub fn file_tag(&self) -> String {
        format!("JP_{}_{}", self.two_j, self.parity.sign())
    }

    /// All blocks with `2J = 1, 3, ..., two_j_max`, even parity first.
    pub fn enumerate(two_j_max: u32) -> Vec<Self> {
        let mut blocks = Vec::new();
        for two_j in (1..=two_j_max).step_by(2) {
            blocks.push(Self::new(two_j, Parity::Even));
            blocks.push(Self::new(two_j, Parity::Odd));
        }
        blocks
    }
}

impl Display for JpBlock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "J={}/2{}", self.two_j, self.parity.as_str())
    }
}
