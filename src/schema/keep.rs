use serde::{Deserialize, Serialize};

/// Which end of a sorted roll a keep selector takes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeepDirection {
    Highest,
    Lowest,
}

/// "Keep the `count` highest/lowest of K rolls", written `kh3` / `kl1`.
///
/// Set on a die by the keep notation and consumed when that die is
/// repeated; K is the repeat count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeepSpec {
    pub count: u32,
    pub direction: KeepDirection,
}

impl KeepSpec {
    pub fn highest(count: u32) -> Self {
        Self {
            count,
            direction: KeepDirection::Highest,
        }
    }

    pub fn lowest(count: u32) -> Self {
        Self {
            count,
            direction: KeepDirection::Lowest,
        }
    }

    /// True when `candidate` should rank ahead of `incumbent` in the kept set.
    pub fn prefers(&self, candidate: i64, incumbent: i64) -> bool {
        match self.direction {
            KeepDirection::Highest => candidate > incumbent,
            KeepDirection::Lowest => candidate < incumbent,
        }
    }
}
