//! Weighted outcome distributions and the exact arithmetic over them.

use rand::distributions::{Distribution as _, WeightedIndex};
use rand::Rng;
use rustc_hash::{FxHashMap, FxHashSet};
use std::convert::Infallible;
use thiserror::Error;

use crate::schema::face::Face;
use crate::schema::keep::KeepSpec;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DistributionError {
    #[error("no numeric faces")]
    NoNumericFaces,
    #[error("division by zero")]
    DivisionByZero,
    #[error("cannot roll a negative number of dice ({0})")]
    NegativeRepeat(i64),
    #[error("{what} limit of {limit} exceeded")]
    LimitExceeded { what: &'static str, limit: u64 },
}

/// Side-channel metadata carried alongside the weights.
///
/// Not part of the probability semantics: two distributions with the same
/// weights compare equal regardless of annotation.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Annotation {
    #[default]
    None,
    /// Keep selector set by `kh`/`kl`, consumed by repetition.
    Keep(KeepSpec),
    /// Faces of the left operand of the last union that the right operand lacked.
    Except(FxHashSet<Face>),
}

/// A discrete distribution: outcome key to non-negative, unnormalized weight.
#[derive(Debug, Clone, Default)]
pub struct Distribution {
    faces: FxHashMap<Face, f64>,
    annotation: Annotation,
}

impl PartialEq for Distribution {
    fn eq(&self, other: &Self) -> bool {
        self.faces == other.faces
    }
}

impl From<i64> for Distribution {
    fn from(value: i64) -> Self {
        Self::scalar(value)
    }
}

/// In-place weight accumulation, kept private so `Distribution` stays a value.
#[derive(Debug, Default)]
pub(crate) struct Accumulator {
    faces: FxHashMap<Face, f64>,
}

impl Accumulator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Starts with the given numeric faces present at zero weight.
    pub(crate) fn seeded(faces: &[i64]) -> Self {
        let mut acc = Self::new();
        for &face in faces {
            acc.add(Face::Value(face), 0.0);
        }
        acc
    }

    pub(crate) fn add(&mut self, face: Face, weight: f64) {
        *self.faces.entry(face).or_insert(0.0) += weight;
    }

    /// Adds every entry of `dist`, each weight multiplied by `scale`.
    pub(crate) fn absorb(&mut self, dist: &Distribution, scale: f64) {
        for (face, weight) in &dist.faces {
            self.add(face.clone(), weight * scale);
        }
    }

    pub(crate) fn finish(self) -> Distribution {
        Distribution {
            faces: self.faces,
            annotation: Annotation::None,
        }
    }
}

impl Distribution {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A fair die with faces `1..=sides`. `uniform(0)` is the empty "no die" sentinel.
    pub fn uniform(sides: u32) -> Self {
        let mut acc = Accumulator::new();
        for face in 1..=i64::from(sides) {
            acc.add(Face::Value(face), 1.0);
        }
        acc.finish()
    }

    pub fn scalar(value: i64) -> Self {
        Self::from_weights([(value, 1.0)])
    }

    /// Builds a distribution from `(value, weight)` pairs; repeated values accumulate.
    pub fn from_weights<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (i64, f64)>,
    {
        Self::from_faces(entries.into_iter().map(|(v, w)| (Face::Value(v), w)))
    }

    /// Like `from_weights`, for entries that may include labels.
    pub fn from_faces<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Face, f64)>,
    {
        let mut acc = Accumulator::new();
        for (face, weight) in entries {
            acc.add(face, weight);
        }
        acc.finish()
    }

    /// Weight of the numeric face `value`, zero when absent.
    pub fn weight(&self, value: i64) -> f64 {
        self.face_weight(&Face::Value(value))
    }

    pub fn face_weight(&self, face: &Face) -> f64 {
        self.faces.get(face).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, face: &Face) -> bool {
        self.faces.contains_key(face)
    }

    /// Iterates entries in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&Face, f64)> + '_ {
        self.faces.iter().map(|(face, weight)| (face, *weight))
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.faces.values().sum()
    }

    pub fn annotation(&self) -> &Annotation {
        &self.annotation
    }

    pub fn keep(&self) -> Option<KeepSpec> {
        match self.annotation {
            Annotation::Keep(spec) => Some(spec),
            _ => None,
        }
    }

    /// Returns a copy tagged with a keep selector.
    pub fn with_keep(&self, spec: KeepSpec) -> Self {
        Self {
            faces: self.faces.clone(),
            annotation: Annotation::Keep(spec),
        }
    }

    /// Returns a copy with the annotation cleared.
    pub fn without_annotation(&self) -> Self {
        Self {
            faces: self.faces.clone(),
            annotation: Annotation::None,
        }
    }

    pub fn except(&self) -> Option<&FxHashSet<Face>> {
        match &self.annotation {
            Annotation::Except(faces) => Some(faces),
            _ => None,
        }
    }

    fn numeric_faces(&self) -> impl Iterator<Item = i64> + '_ {
        self.faces.keys().filter_map(Face::value)
    }

    pub fn max_face(&self) -> Result<i64, DistributionError> {
        self.numeric_faces()
            .max()
            .ok_or(DistributionError::NoNumericFaces)
    }

    pub fn min_face(&self) -> Result<i64, DistributionError> {
        self.numeric_faces()
            .min()
            .ok_or(DistributionError::NoNumericFaces)
    }

    // ------------------------------------------------------------------
    // Elementwise combination
    // ------------------------------------------------------------------

    /// Pairs every outcome of `self` with every outcome of `other`, adding
    /// weight `w1 * w2` at `f(a, b)`. A label on either side passes through
    /// as the result key, the left one first.
    fn convolve<F, E>(&self, other: &Distribution, mut acc: Accumulator, f: F) -> Result<Self, E>
    where
        F: Fn(i64, i64) -> Result<i64, E>,
    {
        for (a, w1) in &self.faces {
            for (b, w2) in &other.faces {
                let key = match (a, b) {
                    (Face::Value(x), Face::Value(y)) => Face::Value(f(*x, *y)?),
                    (Face::Label(_), _) => a.clone(),
                    (_, Face::Label(_)) => b.clone(),
                };
                acc.add(key, w1 * w2);
            }
        }
        Ok(acc.finish())
    }

    /// The convolution primitive every infallible binary operator is built on.
    pub fn elementwise<F>(&self, other: &Distribution, f: F) -> Self
    where
        F: Fn(i64, i64) -> i64,
    {
        self.convolve(other, Accumulator::new(), |a, b| Ok::<_, Infallible>(f(a, b)))
            .unwrap_or_else(|never| match never {})
    }

    fn seeded_threshold<F>(&self, other: &Distribution, f: F) -> Self
    where
        F: Fn(i64, i64) -> i64,
    {
        self.convolve(other, Accumulator::seeded(&[0, 1]), |a, b| {
            Ok::<_, Infallible>(f(a, b))
        })
        .unwrap_or_else(|never| match never {})
    }

    pub fn add(&self, other: &Distribution) -> Self {
        self.elementwise(other, i64::saturating_add)
    }

    pub fn subtract(&self, other: &Distribution) -> Self {
        self.elementwise(other, i64::saturating_sub)
    }

    /// `a + b`, except a zero on the left stays zero so misses gather no bonuses.
    pub fn add_non_zero(&self, other: &Distribution) -> Self {
        self.elementwise(other, |a, b| if a == 0 { a } else { a.saturating_add(b) })
    }

    /// Hit-gates-damage product: zero stays zero, anything else becomes `b`.
    pub fn multiply(&self, other: &Distribution) -> Self {
        self.elementwise(other, |a, b| if a == 0 { 0 } else { b })
    }

    /// 1 where the outcomes match, else 0.
    pub fn equals(&self, other: &Distribution) -> Self {
        self.elementwise(other, |a, b| i64::from(a == b))
    }

    pub fn max(&self, other: &Distribution) -> Self {
        self.elementwise(other, i64::max)
    }

    pub fn min(&self, other: &Distribution) -> Self {
        self.elementwise(other, i64::min)
    }

    /// Two independent rolls of this distribution, keeping the higher.
    pub fn advantage(&self) -> Self {
        self.max(self)
    }

    pub fn and(&self, other: &Distribution) -> Self {
        self.elementwise(other, |a, b| i64::from(a != 0 && b != 0))
    }

    pub fn divide_ceil(&self, other: &Distribution) -> Result<Self, DistributionError> {
        self.convolve(other, Accumulator::new(), |a, b| {
            div_floor(a, b).map(|q| if a.wrapping_rem(b) != 0 { q + 1 } else { q })
        })
    }

    pub fn divide_floor(&self, other: &Distribution) -> Result<Self, DistributionError> {
        self.convolve(other, Accumulator::new(), div_floor)
    }

    /// Difficulty-class check: 0 when `a >= b` (the save succeeds), else 1.
    /// Both faces are always present, possibly at zero weight.
    pub fn dc(&self, other: &Distribution) -> Self {
        self.seeded_threshold(other, |a, b| i64::from(a < b))
    }

    /// Armor-class check: `a` when `a >= b` (a hit), else 0.
    pub fn ac(&self, other: &Distribution) -> Self {
        self.seeded_threshold(other, |a, b| if a >= b { a } else { 0 })
    }

    // ------------------------------------------------------------------
    // Structural edits
    // ------------------------------------------------------------------

    pub fn delete_face(&self, face: &Face) -> Self {
        let mut faces = self.faces.clone();
        faces.remove(face);
        Self {
            faces,
            annotation: self.annotation.clone(),
        }
    }

    /// Relabels `old` as `new`; the weight merges into `new` if it already exists.
    pub fn change_face(&self, old: &Face, new: Face) -> Self {
        let mut faces = self.faces.clone();
        if let Some(weight) = faces.remove(old) {
            *faces.entry(new).or_insert(0.0) += weight;
        }
        Self {
            faces,
            annotation: self.annotation.clone(),
        }
    }

    /// Additive union of both weight maps. Records in the result's annotation
    /// which faces of `self` were missing from `other`.
    pub fn combine(&self, other: &Distribution) -> Self {
        let mut faces = other.faces.clone();
        let mut except = FxHashSet::default();
        for (face, weight) in &self.faces {
            if !other.faces.contains_key(face) {
                except.insert(face.clone());
            }
            *faces.entry(face.clone()).or_insert(0.0) += weight;
        }
        Self {
            faces,
            annotation: Annotation::Except(except),
        }
    }

    /// Rerolls once on any face in `targets`.
    ///
    /// Every face of `self` contributes one copy of the non-target faces, and
    /// each target face also contributes a fresh copy of the whole
    /// distribution. Face weights do not enter into the count.
    pub fn reroll(&self, targets: &Distribution) -> Self {
        let kept = Self {
            faces: self
                .faces
                .iter()
                .filter(|(face, _)| !targets.contains(face))
                .map(|(face, weight)| (face.clone(), *weight))
                .collect(),
            annotation: Annotation::None,
        };
        let mut acc = Accumulator::new();
        for face in self.faces.keys() {
            acc.absorb(&kept, 1.0);
            if targets.contains(face) {
                acc.absorb(self, 1.0);
            }
        }
        let mut result = acc.finish();
        result.annotation = self.annotation.clone();
        result
    }

    /// Multiplies every weight by `scalar`.
    pub fn normalize(&self, scalar: f64) -> Self {
        Self {
            faces: self
                .faces
                .iter()
                .map(|(face, weight)| (face.clone(), weight * scalar))
                .collect(),
            annotation: self.annotation.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Read-outs
    // ------------------------------------------------------------------

    /// Weights divided by the total; every value is 0 when the total is 0.
    pub fn percent(&self) -> Self {
        let total = self.total();
        Self {
            faces: self
                .faces
                .iter()
                .map(|(face, weight)| {
                    let share = if total == 0.0 { 0.0 } else { weight / total };
                    (face.clone(), share)
                })
                .collect(),
            annotation: self.annotation.clone(),
        }
    }

    /// Weighted mean over numeric faces, 0 for a zero-weight distribution.
    pub fn average(&self) -> f64 {
        let total = self.total();
        if total == 0.0 {
            return 0.0;
        }
        let sum: f64 = self
            .faces
            .iter()
            .filter_map(|(face, weight)| face.value().map(|v| v as f64 * weight))
            .sum();
        sum / total
    }

    /// `(face, probability)` pairs, numeric faces ascending then labels.
    pub fn outcomes(&self) -> Vec<(Face, f64)> {
        let mut entries: Vec<(Face, f64)> = self
            .percent()
            .faces
            .into_iter()
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Draws one face in proportion to its weight. `None` when nothing has weight.
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Face> {
        let mut entries: Vec<(&Face, f64)> = self.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let index = WeightedIndex::new(entries.iter().map(|(_, weight)| *weight)).ok()?;
        Some(entries[index.sample(rng)].0.clone())
    }
}

fn div_floor(a: i64, b: i64) -> Result<i64, DistributionError> {
    if b == 0 {
        return Err(DistributionError::DivisionByZero);
    }
    let q = a.wrapping_div(b);
    if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}
