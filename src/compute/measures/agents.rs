//! Speaker and listener agents of the signaling game.
//!
//! Agents are conditional distributions stored as dense row-major tables.
//! A speaker maps referents to expressions and a listener maps expressions
//! back to referents.

use serde::{Deserialize, Serialize};

use crate::language::Language;

/// Dense row-major table of conditional probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityTable {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl ProbabilityTable {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    #[inline]
    fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn total(&self) -> f64 {
        self.data.iter().sum()
    }
}

/// Literal speaker `S(w|m)`: uniform over the expressions whose meaning
/// covers `m`. Rows of uncovered referents are all zero.
pub fn literal_speaker(language: &Language) -> ProbabilityTable {
    let n = language.universe().len();
    let expressions = language.expressions();
    let mut speaker = ProbabilityTable::zeros(n, expressions.len());

    for m in 0..n {
        let count = expressions.iter().filter(|e| e.meaning.covers(m)).count();
        if count == 0 {
            continue;
        }
        let p = 1.0 / count as f64;
        for (w, expression) in expressions.iter().enumerate() {
            if expression.meaning.covers(m) {
                speaker.set(m, w, p);
            }
        }
    }
    speaker
}

/// Literal listener `L(m'|w)`: the meaning distribution of `w`.
pub fn literal_listener(language: &Language) -> ProbabilityTable {
    let n = language.universe().len();
    let expressions = language.expressions();
    let mut listener = ProbabilityTable::zeros(expressions.len(), n);

    for (w, expression) in expressions.iter().enumerate() {
        for &(m, p) in expression.meaning.entries() {
            listener.set(w, m, p);
        }
    }
    listener
}

/// Bayesian listener `L(m'|w) ∝ p(m') S(w|m')`.
///
/// An expression whose covered referents all have zero prior falls back to
/// its literal meaning.
pub fn pragmatic_listener(language: &Language, speaker: &ProbabilityTable) -> ProbabilityTable {
    let prior = language.universe().prior();
    let n = prior.len();
    let expressions = language.expressions();
    let mut listener = ProbabilityTable::zeros(expressions.len(), n);

    for (w, expression) in expressions.iter().enumerate() {
        let normalizer: f64 = (0..n).map(|m| prior[m] * speaker.get(m, w)).sum();
        if normalizer > 0.0 {
            for m in 0..n {
                listener.set(w, m, prior[m] * speaker.get(m, w) / normalizer);
            }
        } else {
            for &(m, p) in expression.meaning.entries() {
                listener.set(w, m, p);
            }
        }
    }
    listener
}

/// Which listener decodes expressions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerModel {
    /// Interpret each expression by its literal meaning.
    #[default]
    Literal,
    /// Reason about the literal speaker by Bayes' rule.
    Pragmatic,
}

impl ListenerModel {
    pub fn listener(&self, language: &Language, speaker: &ProbabilityTable) -> ProbabilityTable {
        match self {
            ListenerModel::Literal => literal_listener(language),
            ListenerModel::Pragmatic => pragmatic_listener(language, speaker),
        }
    }
}

/// Joint distribution `p(m, m') = p(m) Σ_w S(w|m) L(m'|w)` of intended and
/// recovered referents.
pub fn referent_joint(language: &Language, listener_model: ListenerModel) -> ProbabilityTable {
    let prior = language.universe().prior();
    let n = prior.len();
    let speaker = literal_speaker(language);
    let listener = listener_model.listener(language, &speaker);
    let mut joint = ProbabilityTable::zeros(n, n);

    for m in 0..n {
        for (w, &s) in speaker.row(m).iter().enumerate() {
            if s == 0.0 {
                continue;
            }
            let weight = prior[m] * s;
            for (m_hat, &l) in listener.row(w).iter().enumerate() {
                if l != 0.0 {
                    joint.set(m, m_hat, joint.get(m, m_hat) + weight * l);
                }
            }
        }
    }
    joint
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{Expression, Meaning, Universe};
    use std::sync::Arc;

    fn overlapping() -> Language {
        let u = Arc::new(Universe::from_names(["a", "b", "c"]).unwrap());
        Language::new(
            Arc::clone(&u),
            vec![
                Expression::new("ab", Meaning::uniform(&u, ["a", "b"]).unwrap()),
                Expression::new("b", Meaning::point(&u, "b").unwrap()),
                Expression::new("c", Meaning::point(&u, "c").unwrap()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_literal_speaker_rows() {
        let speaker = literal_speaker(&overlapping());
        assert_eq!(speaker.row(0), &[1.0, 0.0, 0.0]);
        assert_eq!(speaker.row(1), &[0.5, 0.5, 0.0]);
        assert_eq!(speaker.row(2), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_uncovered_referent_row_is_zero() {
        let u = Arc::new(Universe::from_names(["a", "b"]).unwrap());
        let language =
            Language::new(Arc::clone(&u), vec![Expression::new("a", Meaning::point(&u, "a").unwrap())]).unwrap();
        let speaker = literal_speaker(&language);
        assert_eq!(speaker.row(1), &[0.0]);
    }

    #[test]
    fn test_pragmatic_listener_sharpens() {
        let language = overlapping();
        let speaker = literal_speaker(&language);
        let literal = literal_listener(&language);
        let pragmatic = pragmatic_listener(&language, &speaker);

        assert!((literal.get(0, 0) - 0.5).abs() < 1e-12);
        // "ab" is the only way to say a, so the listener leans towards a.
        assert!((pragmatic.get(0, 0) - 2.0 / 3.0).abs() < 1e-12);
        assert!((pragmatic.get(0, 1) - 1.0 / 3.0).abs() < 1e-12);
        for w in 0..pragmatic.rows() {
            let sum: f64 = pragmatic.row(w).iter().sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_joint_sums_to_one_when_complete() {
        let joint = referent_joint(&overlapping(), ListenerModel::Pragmatic);
        assert!((joint.total() - 1.0).abs() < 1e-12);
    }
}
