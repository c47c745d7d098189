//! Recursive-descent evaluator for dice notation.
//!
//! The notation is read left to right straight into [`Distribution`]s; there
//! is no intermediate syntax tree. Infix operators have no precedence beyond
//! parentheses, and adjacency ("N copies of") binds tighter than any of them.

use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::core::config::{ConfigError, EvalConfig};
use crate::core::distribution::{Distribution, DistributionError};
use crate::core::enumerate::repeat;
use crate::core::operator::Operator;
use crate::schema::face::Face;
use crate::schema::keep::{KeepDirection, KeepSpec};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unexpected character '{found}' at position {position}, expected {expected}")]
    UnexpectedChar {
        found: char,
        position: usize,
        expected: String,
    },
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEnd { expected: String },
    #[error("malformed number '{text}' at position {position}")]
    MalformedNumber { text: String, position: usize },
    #[error("keep modifier at position {position} must be followed by dice")]
    KeepTarget { position: usize },
    #[error("invalid {what} {value}")]
    InvalidCount { what: &'static str, value: i64 },
    #[error("parentheses nested deeper than {limit}")]
    NestingTooDeep { limit: usize },
    #[error("distribution error: {0}")]
    Distribution(#[from] DistributionError),
}

impl EvalError {
    /// True for malformed input, as opposed to well-formed input that cannot
    /// be evaluated.
    pub fn is_syntax(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedChar { .. } | Self::UnexpectedEnd { .. } | Self::MalformedNumber { .. }
        )
    }
}

/// Evaluate `expression` with the default limits, substituting `n` for the token `n`.
pub fn evaluate(expression: &str, n: i64) -> Result<Distribution, EvalError> {
    Evaluator::default().evaluate(expression, n)
}

/// Evaluates dice notation under a fixed set of limits. Built via `Evaluator::builder()`.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    config: EvalConfig,
}

/// Builder for constructing an `Evaluator`.
#[derive(Debug, Default)]
pub struct EvaluatorBuilder {
    config_path: Option<String>,
    /// Directly provided config (for use without files).
    config: Option<EvalConfig>,
    max_depth: Option<usize>,
    max_repeat: Option<u32>,
    max_sides: Option<u32>,
    max_keep_combinations: Option<u64>,
}

impl Evaluator {
    pub fn builder() -> EvaluatorBuilder {
        EvaluatorBuilder::default()
    }

    pub fn new(config: EvalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Evaluate `expression`, substituting `n` for the token `n`.
    ///
    /// Fails on the first syntax or domain error; nothing is partially applied.
    pub fn evaluate(&self, expression: &str, n: i64) -> Result<Distribution, EvalError> {
        let mut cursor = Cursor::new(expression, n, &self.config);
        let result = cursor.expression()?;
        if cursor.peek().is_some() {
            return Err(cursor.unexpected("an operator or end of input"));
        }
        Ok(result)
    }
}

impl EvaluatorBuilder {
    /// Load limits from a RON file. Individual overrides still apply on top.
    pub fn config_file(mut self, path: &str) -> Self {
        self.config_path = Some(path.to_string());
        self
    }

    /// Provide limits directly (for use without files).
    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn max_repeat(mut self, count: u32) -> Self {
        self.max_repeat = Some(count);
        self
    }

    pub fn max_sides(mut self, sides: u32) -> Self {
        self.max_sides = Some(sides);
        self
    }

    pub fn max_keep_combinations(mut self, combinations: u64) -> Self {
        self.max_keep_combinations = Some(combinations);
        self
    }

    pub fn build(self) -> Result<Evaluator, ConfigError> {
        let mut config = match (&self.config_path, self.config) {
            (Some(path), _) => EvalConfig::load_from_ron(Path::new(path))?,
            (None, Some(config)) => config,
            (None, None) => EvalConfig::default(),
        };

        if let Some(depth) = self.max_depth {
            config.max_depth = depth;
        }
        if let Some(count) = self.max_repeat {
            config.max_repeat = count;
        }
        if let Some(sides) = self.max_sides {
            config.max_sides = sides;
        }
        if let Some(combinations) = self.max_keep_combinations {
            config.max_keep_combinations = combinations;
        }

        Ok(Evaluator { config })
    }
}

/// Position-tracking reader over the cleaned character stream.
struct Cursor<'a> {
    /// `(index in the original text, lowercased char)`, whitespace removed.
    chars: Vec<(usize, char)>,
    pos: usize,
    n: i64,
    depth: usize,
    config: &'a EvalConfig,
}

impl<'a> Cursor<'a> {
    fn new(expression: &str, n: i64, config: &'a EvalConfig) -> Self {
        let chars = expression
            .chars()
            .enumerate()
            .filter(|(_, c)| !c.is_whitespace())
            .flat_map(|(i, c)| c.to_lowercase().map(move |lower| (i, lower)))
            .collect();
        Self {
            chars,
            pos: 0,
            n,
            depth: 0,
            config,
        }
    }

    // ------------------------------------------------------------------
    // Character-level helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> Option<char> {
        self.peek_nth(0)
    }

    fn peek_nth(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).map(|&(_, c)| c)
    }

    fn position(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|&(i, _)| i)
            .unwrap_or_else(|| self.chars.last().map_or(0, |&(i, _)| i + 1))
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = self.chars.get(self.pos).copied();
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn looking_at(&self, token: &str) -> bool {
        token
            .chars()
            .enumerate()
            .all(|(offset, expected)| self.peek_nth(offset) == Some(expected))
    }

    fn number_at(&self, offset: usize) -> bool {
        self.peek_nth(offset)
            .is_some_and(|c| c.is_ascii_digit() || c == 'n')
    }

    /// Consumes `token` if it comes next.
    fn eat(&mut self, token: &str) -> bool {
        if self.looking_at(token) {
            self.pos += token.chars().count();
            true
        } else {
            false
        }
    }

    /// Matches `token` character by character, failing on the first mismatch.
    fn expect(&mut self, token: &str) -> Result<(), EvalError> {
        for expected in token.chars() {
            match self.bump() {
                Some((_, found)) if found == expected => {}
                Some((position, found)) => {
                    return Err(EvalError::UnexpectedChar {
                        found,
                        position,
                        expected: format!("'{}'", expected),
                    })
                }
                None => {
                    return Err(EvalError::UnexpectedEnd {
                        expected: format!("'{}'", expected),
                    })
                }
            }
        }
        Ok(())
    }

    fn unexpected(&self, expected: &str) -> EvalError {
        match self.chars.get(self.pos) {
            Some(&(position, found)) => EvalError::UnexpectedChar {
                found,
                position,
                expected: expected.to_string(),
            },
            None => EvalError::UnexpectedEnd {
                expected: expected.to_string(),
            },
        }
    }

    // ------------------------------------------------------------------
    // Grammar
    // ------------------------------------------------------------------

    /// `expression := term (operator argument ['half'] [crit] [save])*`
    fn expression(&mut self) -> Result<Distribution, EvalError> {
        let mut result = match self.term()? {
            Some(term) => term,
            None => return Err(self.unexpected("a number, die or '('")),
        };

        while let Some(op) = self.operator()? {
            result = self.apply(op, result)?;
        }

        Ok(result)
    }

    /// One operator application, including crit and save branch carving.
    fn apply(&mut self, op: Operator, current: Distribution) -> Result<Distribution, EvalError> {
        let mut arg = if op.is_unary() {
            current.clone()
        } else {
            match self.term()? {
                Some(arg) => arg,
                None => return Err(self.unexpected(&format!("an argument for '{}'", op))),
            }
        };
        if self.eat("half") {
            arg = halve(&arg)?;
        }

        let mut normal = current;
        let mut branches = Vec::new();

        if let Some(count) = self.crit_count()? {
            // Runs out with NoNumericFaces once every face has been carved.
            let mut carved = Vec::new();
            for _ in 0..count {
                let top = normal.max_face()?;
                carved.push((top, normal.weight(top)));
                normal = normal.delete_face(&Face::Value(top));
            }
            let branch_arg = self.branch_argument(&arg)?;
            branches.push((Distribution::from_weights(carved), branch_arg));
        }

        if self.peek() == Some('s') {
            self.expect("save")?;
            let low = normal.min_face()?;
            let carved = Distribution::from_weights([(low.max(1), normal.weight(low))]);
            normal = normal.delete_face(&Face::Value(low));
            let branch_arg = self.branch_argument(&arg)?;
            branches.push((carved, branch_arg));
        }

        debug!(op = %op, faces = normal.len(), branches = branches.len(), "applying operator");

        let pre = normal.total();
        let applied = op.apply(&normal, &arg)?;
        let post = applied.total();
        let mut result = applied.normalize(if pre > 0.0 { post / pre } else { 1.0 });

        // Each carved branch keeps its pre-carve share relative to the normal branch.
        let result_total = result.total();
        let share = if pre > 0.0 && result_total > 0.0 {
            result_total / pre
        } else {
            1.0
        };
        for (branch, branch_arg) in branches {
            let branch_pre = branch.total();
            let applied = op.apply(&branch, &branch_arg)?;
            let branch_post = applied.total();
            let scale = if branch_post > 0.0 {
                branch_pre * share / branch_post
            } else {
                1.0
            };
            result = result.combine(&applied.normalize(scale));
        }

        Ok(result)
    }

    fn operator(&mut self) -> Result<Option<Operator>, EvalError> {
        let op = match self.peek() {
            Some('a') => {
                self.expect("ac")?;
                Operator::ArmorClass
            }
            Some('d') => {
                self.expect("dc")?;
                Operator::DifficultyClass
            }
            Some('r') => {
                self.expect("reroll")?;
                Operator::Reroll
            }
            Some('~') => {
                self.expect("~+")?;
                Operator::Add
            }
            Some('/') => {
                self.bump();
                if self.eat("/") {
                    Operator::DivideFloor
                } else {
                    Operator::DivideCeil
                }
            }
            Some(c) => {
                let op = match c {
                    '+' => Operator::AddNonZero,
                    '-' => Operator::Subtract,
                    '*' => Operator::Multiply,
                    '=' => Operator::Equals,
                    '>' => Operator::Max,
                    '<' => Operator::Min,
                    '&' => Operator::Combine,
                    '!' => Operator::Advantage,
                    _ => return Ok(None),
                };
                self.bump();
                op
            }
            None => return Ok(None),
        };
        Ok(Some(op))
    }

    /// `crit` carves one face, `xcritN` carves N.
    fn crit_count(&mut self) -> Result<Option<u32>, EvalError> {
        match self.peek() {
            Some('c') => {
                self.expect("crit")?;
                Ok(Some(1))
            }
            Some('x') => {
                self.expect("xcrit")?;
                let count = self.number()?;
                u32::try_from(count)
                    .map(Some)
                    .map_err(|_| EvalError::InvalidCount {
                        what: "xcrit count",
                        value: count,
                    })
            }
            _ => Ok(None),
        }
    }

    /// The argument a carved branch is combined with: `half` of the main
    /// argument, an explicit term, or the main argument when omitted.
    fn branch_argument(&mut self, main: &Distribution) -> Result<Distribution, EvalError> {
        if self.eat("half") {
            return halve(main);
        }
        Ok(self.term()?.unwrap_or_else(|| main.clone()))
    }

    /// `term := primary (primary)*`, each further primary repeated "N times".
    fn term(&mut self) -> Result<Option<Distribution>, EvalError> {
        let mut result = match self.primary()? {
            Some(primary) => primary,
            None => return Ok(None),
        };
        while let Some(next) = self.primary()? {
            result = repeat(&result, &next, self.config)?;
        }
        Ok(Some(result))
    }

    fn primary(&mut self) -> Result<Option<Distribution>, EvalError> {
        match self.peek() {
            Some('(') => {
                self.bump();
                self.depth += 1;
                if self.depth > self.config.max_depth {
                    return Err(EvalError::NestingTooDeep {
                        limit: self.config.max_depth,
                    });
                }
                let inner = self.expression()?;
                self.expect(")")?;
                self.depth -= 1;
                Ok(Some(inner))
            }
            Some('d') | Some('h') => self.dice(),
            Some('k') => self.keep().map(Some),
            Some(c) if c.is_ascii_digit() || c == 'n' => {
                Ok(Some(Distribution::from(self.number()?)))
            }
            _ => Ok(None),
        }
    }

    /// `d<N>`, or `hd<N>` which rerolls ones. Anything else (`dc`, `half`) is
    /// left for the caller.
    fn dice(&mut self) -> Result<Option<Distribution>, EvalError> {
        let half_die = if self.looking_at("hd") && self.number_at(2) {
            self.expect("hd")?;
            true
        } else if self.looking_at("d") && self.number_at(1) {
            self.expect("d")?;
            false
        } else {
            return Ok(None);
        };

        let sides = self.number()?;
        let sides = u32::try_from(sides)
            .ok()
            .filter(|s| *s <= self.config.max_sides)
            .ok_or(EvalError::InvalidCount {
                what: "die size",
                value: sides,
            })?;

        let die = Distribution::uniform(sides);
        if half_die {
            Ok(Some(die.delete_face(&Face::Value(1)).combine(&die)))
        } else {
            Ok(Some(die))
        }
    }

    /// `k ('h'|'l') N primary`: tags the primary with a keep selector.
    fn keep(&mut self) -> Result<Distribution, EvalError> {
        let position = self.position();
        self.expect("k")?;
        let direction = match self.peek() {
            Some('h') => KeepDirection::Highest,
            Some('l') => KeepDirection::Lowest,
            _ => return Err(self.unexpected("'h' or 'l'")),
        };
        self.bump();

        let count = self.number()?;
        let count = u32::try_from(count).map_err(|_| EvalError::InvalidCount {
            what: "keep count",
            value: count,
        })?;

        // Keep prefixes chain into each other, so they count toward nesting.
        self.depth += 1;
        if self.depth > self.config.max_depth {
            return Err(EvalError::NestingTooDeep {
                limit: self.config.max_depth,
            });
        }
        let target = self.primary()?;
        self.depth -= 1;
        match target {
            Some(target) => Ok(target.with_keep(KeepSpec { count, direction })),
            None => Err(EvalError::KeepTarget { position }),
        }
    }

    /// `number := (digit | 'n')+`. Each `n` splices in the decimal text of
    /// the substituted value, so `2n` with n = 5 reads as 25.
    fn number(&mut self) -> Result<i64, EvalError> {
        let position = self.position();
        let mut text = String::new();
        while let Some(c) = self.peek().filter(|c| c.is_ascii_digit() || *c == 'n') {
            if c == 'n' {
                text.push_str(&self.n.to_string());
            } else {
                text.push(c);
            }
            self.bump();
        }
        if text.is_empty() {
            return Err(self.unexpected("a number"));
        }
        text.parse::<i64>()
            .map_err(|_| EvalError::MalformedNumber { text, position })
    }
}

fn halve(dist: &Distribution) -> Result<Distribution, EvalError> {
    Ok(dist.divide_floor(&Distribution::scalar(2))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(dist: &Distribution, face: i64) -> f64 {
        dist.percent().weight(face)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn single_die() {
        assert_eq!(evaluate("d20", 0).unwrap(), Distribution::uniform(20));
    }

    #[test]
    fn number_literal() {
        assert_eq!(evaluate("42", 0).unwrap(), Distribution::scalar(42));
    }

    #[test]
    fn n_is_substituted() {
        assert_eq!(evaluate("nd6", 3).unwrap(), evaluate("3d6", 0).unwrap());
        assert_eq!(evaluate("d20 + n", 5).unwrap(), evaluate("d20 + 5", 0).unwrap());
    }

    #[test]
    fn case_and_whitespace_are_ignored() {
        assert_eq!(
            evaluate("  D20 +6 dC 15", 0).unwrap(),
            evaluate("d20+6dc15", 0).unwrap()
        );
    }

    #[test]
    fn implicit_multiplication_sums_copies() {
        let three = evaluate("3d6", 0).unwrap();
        assert_eq!(three.total(), 216.0);
        assert_eq!(three.weight(10), 27.0);
    }

    #[test]
    fn dc_check() {
        let result = evaluate("d20 + 6 DC 15", 0).unwrap();
        assert_eq!(result.len(), 2);
        assert!(close(pct(&result, 0), 0.6));
        assert!(close(pct(&result, 1), 0.4));
    }

    #[test]
    fn ac_check() {
        let result = evaluate("d20 + 6 AC 15", 0).unwrap();
        assert!(close(pct(&result, 0), 8.0 / 20.0));
        assert!(close(pct(&result, 26), 1.0 / 20.0));
        assert_eq!(result.weight(1), 0.0);
    }

    #[test]
    fn advantage_forms_agree() {
        let adv = Distribution::uniform(20).advantage();
        assert_eq!(evaluate("d20 > d20", 0).unwrap().percent(), adv.percent());
        assert_eq!(evaluate("d20!", 0).unwrap().percent(), adv.percent());
        // no operator applied, so the weights themselves match
        assert_eq!(evaluate("2kh1d20", 0).unwrap(), adv);
    }

    #[test]
    fn disadvantage() {
        let d20 = Distribution::uniform(20);
        let dis = d20.min(&d20);
        assert_eq!(evaluate("d20 < d20", 0).unwrap().percent(), dis.percent());
        assert_eq!(evaluate("2kl1d20", 0).unwrap(), dis);
    }

    #[test]
    fn keep_highest_biases_upward() {
        let kept = evaluate("4kh3d6", 0).unwrap();
        let plain = evaluate("3d6", 0).unwrap();
        assert!(kept.average() > plain.average());
    }

    #[test]
    fn keep_on_parenthesized_expression() {
        let kept = evaluate("2kh1(1d8)", 0).unwrap();
        assert_eq!(kept, Distribution::uniform(8).advantage());
    }

    #[test]
    fn half_die_rerolls_ones_statically() {
        let hd6 = evaluate("hd6", 0).unwrap();
        assert_eq!(hd6.total(), 11.0);
        assert_eq!(hd6.weight(1), 1.0);
        assert_eq!(hd6.weight(6), 2.0);
    }

    #[test]
    fn reroll_operator() {
        let result = evaluate("d20 reroll 1", 0).unwrap();
        assert!(close(pct(&result, 1), 1.0 / 400.0));
        assert!(close(pct(&result, 2), 21.0 / 400.0));
        assert!(result.average() > 10.5);
    }

    #[test]
    fn arithmetic_operators() {
        let plain_sum = evaluate("d6 ~+ d6", 0).unwrap();
        assert_eq!(plain_sum.percent(), evaluate("2d6", 0).unwrap().percent());

        let minus = evaluate("d6 - 1", 0).unwrap();
        assert_eq!(minus.min_face().unwrap(), 0);
        assert_eq!(minus.max_face().unwrap(), 5);

        let ceil = evaluate("d8 / 3", 0).unwrap();
        assert_eq!(ceil.max_face().unwrap(), 3);
        assert_eq!(ceil.weight(1), 3.0);

        let floor = evaluate("d8 // 3", 0).unwrap();
        assert_eq!(floor.min_face().unwrap(), 0);
        assert_eq!(floor.weight(0), 2.0);

        let equals = evaluate("d6 = 6", 0).unwrap();
        assert!(close(pct(&equals, 1), 1.0 / 6.0));

        let union = evaluate("d6 & 10", 0).unwrap();
        assert_eq!(union.len(), 7);
        assert!(close(pct(&union, 10), 1.0 / 7.0));
    }

    #[test]
    fn plus_does_not_lift_misses() {
        let result = evaluate("(d20 AC 11) + 5", 0).unwrap();
        assert!(close(pct(&result, 0), 0.5));
        assert_eq!(result.weight(5), 0.0);
        assert!(close(pct(&result, 25), 0.05));
    }

    #[test]
    fn half_suffix_halves_argument() {
        let result = evaluate("d20 * 8 half", 0).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.weight(4), 20.0);
    }

    #[test]
    fn crit_branch_keeps_its_share() {
        let result = evaluate("d20 * 10 crit 20", 0).unwrap();
        assert!(close(pct(&result, 10), 0.95));
        assert!(close(pct(&result, 20), 0.05));
    }

    #[test]
    fn crit_after_armor_class() {
        let result = evaluate("d20 AC 11 * 5 crit 10", 0).unwrap();
        assert!(close(pct(&result, 0), 0.5));
        assert!(close(pct(&result, 5), 0.45));
        assert!(close(pct(&result, 10), 0.05));
    }

    #[test]
    fn crit_branch_argument_defaults() {
        let reused = evaluate("d20 * 10 crit", 0).unwrap();
        assert_eq!(reused.len(), 1);
        assert!(close(pct(&reused, 10), 1.0));

        let halved = evaluate("d20 * 10 crit half", 0).unwrap();
        assert!(close(pct(&halved, 5), 0.05));
    }

    #[test]
    fn xcrit_carves_several_faces() {
        // whitespace is dropped, so the branch argument needs its own parentheses
        let result = evaluate("d20 * 1 xcrit2 (2)", 0).unwrap();
        assert!(close(pct(&result, 2), 0.1));
        let with_n = evaluate("d20 * 1 xcritn (2)", 3).unwrap();
        assert!(close(pct(&with_n, 2), 0.15));
    }

    #[test]
    fn save_for_half_damage() {
        let result = evaluate("d20 + 6 DC 15 * 8d6 save half", 0).unwrap();
        assert!(close(result.average(), 0.4 * 28.0 + 0.6 * 13.75));
        let total: f64 = result.percent().iter().map(|(_, p)| p).sum();
        assert!(close(total, 1.0));
    }

    #[test]
    fn attack_with_crit() {
        let result = evaluate("(d20 > d20 + 6 AC 15) * (2d6 + 4) crit (4d6 + 4)", 0).unwrap();
        assert!(close(pct(&result, 0), 0.16));
        assert!(close(result.average(), 0.7425 * 11.0 + 0.0975 * 18.0));
    }

    #[test]
    fn attack_with_extended_crit_range() {
        let result = evaluate("(d20 > d20 + 6 AC 15) * (2d6 + 4) xcrit2 (4d6 + 4)", 0).unwrap();
        let crit = (39.0 + 37.0) / 400.0;
        let hit = 1.0 - 0.16 - crit;
        assert!(close(result.average(), hit * 11.0 + crit * 18.0));
    }

    #[test]
    fn empty_input_is_unexpected_end() {
        let err = evaluate("", 0).unwrap_err();
        assert!(matches!(err, EvalError::UnexpectedEnd { .. }));
        assert!(err.is_syntax());
    }

    #[test]
    fn dangling_operator() {
        assert!(matches!(
            evaluate("d20 + ", 0).unwrap_err(),
            EvalError::UnexpectedEnd { .. }
        ));
    }

    #[test]
    fn unknown_character_reports_position() {
        let err = evaluate("d20 ?", 0).unwrap_err();
        assert_eq!(
            err,
            EvalError::UnexpectedChar {
                found: '?',
                position: 4,
                expected: "an operator or end of input".to_string(),
            }
        );
    }

    #[test]
    fn keyword_mismatch_names_the_character() {
        let err = evaluate("d20 AX 5", 0).unwrap_err();
        assert!(matches!(
            err,
            EvalError::UnexpectedChar { found: 'x', position: 5, .. }
        ));
    }

    #[test]
    fn missing_closing_paren() {
        let err = evaluate("(d20 + 1", 0).unwrap_err();
        assert_eq!(
            err,
            EvalError::UnexpectedEnd {
                expected: "')'".to_string()
            }
        );
    }

    #[test]
    fn trailing_input() {
        let err = evaluate("d20)", 0).unwrap_err();
        assert!(matches!(err, EvalError::UnexpectedChar { found: ')', .. }));
    }

    #[test]
    fn malformed_number() {
        let err = evaluate("99999999999999999999", 0).unwrap_err();
        assert!(matches!(err, EvalError::MalformedNumber { position: 0, .. }));
    }

    #[test]
    fn keep_needs_dice() {
        let err = evaluate("kh3 n", 0).unwrap_err();
        assert_eq!(err, EvalError::KeepTarget { position: 0 });
        assert!(!err.is_syntax());
    }

    #[test]
    fn division_by_zero_is_a_domain_error() {
        let err = evaluate("d20 / 0", 0).unwrap_err();
        assert_eq!(err, EvalError::Distribution(DistributionError::DivisionByZero));
        assert!(!err.is_syntax());
    }

    #[test]
    fn crit_on_faceless_result_fails() {
        let err = evaluate("d1 * 1 xcrit2 (1)", 0).unwrap_err();
        assert_eq!(err, EvalError::Distribution(DistributionError::NoNumericFaces));
    }

    #[test]
    fn oversized_xcrit_runs_out_of_faces() {
        let err = evaluate("d20 * 1 xcrit4000000000", 0).unwrap_err();
        assert_eq!(err, EvalError::Distribution(DistributionError::NoNumericFaces));
    }

    #[test]
    fn crit_and_save_on_one_operator() {
        // hit on 11..=19, crit on 20, miss (0) takes the save branch
        let result = evaluate("d20 AC 11 * 2d6 crit 4d6 save d4", 0).unwrap();
        assert!(close(result.average(), 0.45 * 7.0 + 0.05 * 14.0 + 0.5 * 2.5));
        assert!(close(pct(&result, 1), 0.5 * 0.25));
        assert!(close(pct(&result, 24), 0.05 / 1296.0));
        let total: f64 = result.percent().iter().map(|(_, p)| p).sum();
        assert!(close(total, 1.0));
    }

    #[test]
    fn crit_and_save_carve_every_face() {
        // DC leaves faces 0 and 1: crit takes the failure, save the success
        let result = evaluate("d20 + 6 DC 15 * 8d6 crit 16d6 save half", 0).unwrap();
        assert!(close(result.average(), 0.4 * 56.0 + 0.6 * 13.75));
    }

    #[test]
    fn n_splices_into_digits() {
        assert_eq!(evaluate("2n", 5).unwrap(), Distribution::scalar(25));
        assert_eq!(evaluate("dn0", 1).unwrap(), Distribution::uniform(10));
        assert_eq!(evaluate("d20 + n", -3).unwrap().min_face(), Ok(-2));
        assert!(matches!(
            evaluate("2n", -3).unwrap_err(),
            EvalError::MalformedNumber { position: 0, .. }
        ));
    }

    #[test]
    fn keep_count_takes_n() {
        let kept = evaluate("2kln(d20)", 1).unwrap();
        assert_eq!(kept, Distribution::uniform(20).min(&Distribution::uniform(20)));
    }

    #[test]
    fn keep_chain_counts_toward_nesting() {
        let err = evaluate(&format!("{}d6", "kh1".repeat(5_000)), 0).unwrap_err();
        assert_eq!(err, EvalError::NestingTooDeep { limit: 64 });

        let evaluator = Evaluator::builder().max_depth(2).build().unwrap();
        assert!(evaluator.evaluate("2kh1kh1d6", 0).is_ok());
        assert_eq!(
            evaluator.evaluate("2kh1kh1kh1d6", 0).unwrap_err(),
            EvalError::NestingTooDeep { limit: 2 }
        );
    }

    #[test]
    fn nesting_limit() {
        let evaluator = Evaluator::builder().max_depth(2).build().unwrap();
        assert!(evaluator.evaluate("((1))", 0).is_ok());
        assert_eq!(
            evaluator.evaluate("(((1)))", 0).unwrap_err(),
            EvalError::NestingTooDeep { limit: 2 }
        );
    }

    #[test]
    fn repeat_limit() {
        let evaluator = Evaluator::builder().max_repeat(10).build().unwrap();
        assert!(evaluator.evaluate("10d6", 0).is_ok());
        assert!(matches!(
            evaluator.evaluate("11d6", 0).unwrap_err(),
            EvalError::Distribution(DistributionError::LimitExceeded { .. })
        ));
    }

    #[test]
    fn die_size_limit() {
        let evaluator = Evaluator::builder().max_sides(100).build().unwrap();
        assert!(evaluator.evaluate("d100", 0).is_ok());
        assert_eq!(
            evaluator.evaluate("d101", 0).unwrap_err(),
            EvalError::InvalidCount {
                what: "die size",
                value: 101
            }
        );
    }

    #[test]
    fn builder_reads_config_file() {
        let evaluator = Evaluator::builder()
            .config_file("tests/fixtures/limits.ron")
            .max_depth(4)
            .build()
            .unwrap();
        assert_eq!(evaluator.config().max_depth, 4);
        assert_eq!(evaluator.config().max_repeat, 40);
    }
}
