//! WASM bindings for dice-odds, used by the in-browser calculator.

use rand::rngs::StdRng;
use rand::SeedableRng;
use wasm_bindgen::prelude::*;

use dice_odds::core::config::EvalConfig;
use dice_odds::core::distribution::Distribution;
use dice_odds::core::parser::Evaluator;
use dice_odds::core::summary::Summary;
use dice_odds::schema::face::Face;

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct RollOutput {
    expression: String,
    faces: Vec<Face>,
}

fn summary_json(dist: &Distribution) -> Result<String, JsError> {
    serde_json::to_string(&Summary::from(dist))
        .map_err(|e| JsError::new(&format!("Serialization error: {e}")))
}

fn roll_json(
    expression: &str,
    dist: &Distribution,
    count: usize,
    rng: &mut StdRng,
) -> Result<String, JsError> {
    let output = RollOutput {
        expression: expression.to_string(),
        faces: (0..count).filter_map(|_| dist.roll(&mut *rng)).collect(),
    };
    serde_json::to_string(&output)
        .map_err(|e| JsError::new(&format!("Serialization error: {e}")))
}

/// Evaluate `expr` with default limits. Returns a JSON `Summary`:
///
/// ```json
/// { "total": 6.0, "average": 3.5, "outcomes": [{ "face": 1, "probability": 0.1666 }] }
/// ```
#[wasm_bindgen]
pub fn evaluate(expr: &str, n: i32) -> Result<String, JsError> {
    let dist = dice_odds::evaluate(expr, i64::from(n))
        .map_err(|e| JsError::new(&format!("Evaluation error: {e}")))?;
    summary_json(&dist)
}

/// Evaluate `expr` and draw one outcome from it with a seeded generator.
///
/// Returns a JSON object `{ "expression": ..., "faces": [...] }`; `faces` is
/// empty when nothing can come up.
#[wasm_bindgen]
pub fn roll(expr: &str, n: i32, seed: u64) -> Result<String, JsError> {
    let dist = dice_odds::evaluate(expr, i64::from(n))
        .map_err(|e| JsError::new(&format!("Evaluation error: {e}")))?;
    let mut rng = StdRng::seed_from_u64(seed);
    roll_json(expr, &dist, 1, &mut rng)
}

/// A calculator with its own limits and generator, for pages that roll
/// repeatedly without reseeding.
#[wasm_bindgen]
pub struct DiceCalculator {
    evaluator: Evaluator,
    rng: StdRng,
}

#[wasm_bindgen]
impl DiceCalculator {
    /// Create a calculator. `limits_ron` may be empty for the default limits.
    #[wasm_bindgen(constructor)]
    pub fn new(limits_ron: &str, seed: u64) -> Result<DiceCalculator, JsError> {
        let config = if limits_ron.trim().is_empty() {
            EvalConfig::default()
        } else {
            EvalConfig::parse_ron(limits_ron)
                .map_err(|e| JsError::new(&format!("Limits parse error: {e}")))?
        };
        Ok(DiceCalculator {
            evaluator: Evaluator::new(config),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn evaluate(&self, expr: &str, n: i32) -> Result<String, JsError> {
        let dist = self
            .evaluator
            .evaluate(expr, i64::from(n))
            .map_err(|e| JsError::new(&format!("Evaluation error: {e}")))?;
        summary_json(&dist)
    }

    /// Draw `count` outcomes, continuing this calculator's random stream.
    pub fn roll(&mut self, expr: &str, n: i32, count: usize) -> Result<String, JsError> {
        let dist = self
            .evaluator
            .evaluate(expr, i64::from(n))
            .map_err(|e| JsError::new(&format!("Evaluation error: {e}")))?;
        roll_json(expr, &dist, count, &mut self.rng)
    }

    /// Return JSON array of the operator keywords the notation accepts.
    pub fn operators() -> String {
        serde_json::to_string(&[
            "+", "~+", "-", "*", "/", "//", "=", ">", "<", "&", "!", "reroll", "ac", "dc",
            "crit", "xcrit", "save", "half", "kh", "kl",
        ])
        .unwrap_or_else(|_| "[]".to_string())
    }
}
