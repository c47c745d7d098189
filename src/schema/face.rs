use serde::{Deserialize, Serialize};
use std::fmt;

/// One possible outcome of a die or computed sub-expression.
///
/// Numeric faces carry dice totals and face values. Labels are reserved
/// sentinel outcomes; they keep their weight through arithmetic but are
/// ignored by `average`, `max_face` and `min_face`.
///
/// The derived ordering puts every numeric face (ascending) before any label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Face {
    Value(i64),
    Label(String),
}

impl Face {
    pub fn label(name: &str) -> Self {
        Self::Label(name.to_string())
    }

    /// Returns the numeric value, or `None` for a label.
    pub fn value(&self) -> Option<i64> {
        match self {
            Self::Value(v) => Some(*v),
            Self::Label(_) => None,
        }
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{}", v),
            Self::Label(name) => write!(f, "{}", name),
        }
    }
}
