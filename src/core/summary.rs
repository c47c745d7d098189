//! The read-out handed to display layers: total, average and the ordered chances.

use serde::{Deserialize, Serialize};

use crate::core::distribution::Distribution;
use crate::schema::face::Face;

/// One row of the chance table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub face: Face,
    /// Share of the total weight, in `[0, 1]`.
    pub probability: f64,
}

/// Everything a renderer needs from a finished evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total: f64,
    pub average: f64,
    /// Numeric faces ascending, then labels.
    pub outcomes: Vec<Outcome>,
}

impl From<&Distribution> for Summary {
    fn from(dist: &Distribution) -> Self {
        Self {
            total: dist.total(),
            average: dist.average(),
            outcomes: dist
                .outcomes()
                .into_iter()
                .map(|(face, probability)| Outcome { face, probability })
                .collect(),
        }
    }
}

impl Summary {
    /// Probability of `face`, 0 when it never comes up.
    pub fn chance(&self, face: &Face) -> f64 {
        self.outcomes
            .iter()
            .find(|o| &o.face == face)
            .map_or(0.0, |o| o.probability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_of_d4() {
        let summary = Summary::from(&Distribution::uniform(4));
        assert_eq!(summary.total, 4.0);
        assert_eq!(summary.average, 2.5);
        assert_eq!(summary.outcomes.len(), 4);
        assert_eq!(summary.outcomes[0].face, Face::Value(1));
        assert_eq!(summary.chance(&Face::Value(3)), 0.25);
        assert_eq!(summary.chance(&Face::Value(9)), 0.0);
    }

    #[test]
    fn empty_summary() {
        let summary = Summary::from(&Distribution::empty());
        assert_eq!(summary.total, 0.0);
        assert_eq!(summary.average, 0.0);
        assert!(summary.outcomes.is_empty());
    }

    #[test]
    fn ron_round_trip() {
        let summary = Summary::from(&Distribution::from_faces([
            (Face::Value(2), 1.0),
            (Face::label("miss"), 1.0),
        ]));
        let serialized = ron::to_string(&summary).unwrap();
        let deserialized: Summary = ron::from_str(&serialized).unwrap();
        assert_eq!(deserialized, summary);
    }
}
