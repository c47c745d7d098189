//! The infix operator table of the dice notation.

use std::fmt;

use crate::core::distribution::{Distribution, DistributionError};

/// An infix (or, for `!`, postfix unary) operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `+`: adds, except a zero (a miss) stays zero.
    AddNonZero,
    /// `~+`: plain addition.
    Add,
    /// `-`
    Subtract,
    /// `*`: zero stays zero, anything else takes the right-hand value.
    Multiply,
    /// `/`: division rounding up.
    DivideCeil,
    /// `//`: division rounding down.
    DivideFloor,
    /// `=`
    Equals,
    /// `>`: the higher of the two.
    Max,
    /// `<`: the lower of the two.
    Min,
    /// `&`: union of both outcome sets.
    Combine,
    /// `!`: roll twice, keep the higher.
    Advantage,
    /// `reroll`
    Reroll,
    /// `ac`
    ArmorClass,
    /// `dc`
    DifficultyClass,
}

impl Operator {
    /// Unary operators take the accumulated result as their own argument.
    pub fn is_unary(self) -> bool {
        matches!(self, Self::Advantage)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::AddNonZero => "+",
            Self::Add => "~+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::DivideCeil => "/",
            Self::DivideFloor => "//",
            Self::Equals => "=",
            Self::Max => ">",
            Self::Min => "<",
            Self::Combine => "&",
            Self::Advantage => "!",
            Self::Reroll => "reroll",
            Self::ArmorClass => "ac",
            Self::DifficultyClass => "dc",
        }
    }

    pub fn apply(
        self,
        lhs: &Distribution,
        rhs: &Distribution,
    ) -> Result<Distribution, DistributionError> {
        Ok(match self {
            Self::AddNonZero => lhs.add_non_zero(rhs),
            Self::Add => lhs.add(rhs),
            Self::Subtract => lhs.subtract(rhs),
            Self::Multiply => lhs.multiply(rhs),
            Self::DivideCeil => lhs.divide_ceil(rhs)?,
            Self::DivideFloor => lhs.divide_floor(rhs)?,
            Self::Equals => lhs.equals(rhs),
            Self::Max => lhs.max(rhs),
            Self::Min => lhs.min(rhs),
            Self::Combine => lhs.combine(rhs),
            Self::Advantage => lhs.advantage(),
            Self::Reroll => lhs.reroll(rhs),
            Self::ArmorClass => lhs.ac(rhs),
            Self::DifficultyClass => lhs.dc(rhs),
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
