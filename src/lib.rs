//! Dice Odds: exact outcome distributions for tabletop dice notation.
//!
//! Evaluates expressions such as `(d20 > d20 +6 AC 15) * (2d6+4) crit (4d6+4)`
//! into the full discrete distribution of the result, rather than a single
//! sampled roll.

pub mod core;
pub mod schema;

pub use crate::core::distribution::{Distribution, DistributionError};
pub use crate::core::parser::{evaluate, EvalError, Evaluator};
pub use crate::core::summary::Summary;
pub use crate::schema::face::Face;
