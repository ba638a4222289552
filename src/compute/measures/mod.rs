//! Measures - Complexity and informativity of languages.
//!
//! Both objectives are pluggable through the [`ComplexityMeasure`] and
//! [`InformativityMeasure`] traits. A [`Measures`] suite pairs one of each
//! with the policy for languages that leave referents uncovered.
//!
//! Reference implementations:
//!
//! - `DescriptionLength`: total description length of the expressions
//! - `InformationRate`: encoder rate `I(M;W)` of the literal speaker
//! - `CommunicativeSuccess`: expected utility of the signaling game
//! - `MutualInformation`: `I(M; M̂)` between intended and recovered referents
//!
//! Every measure is a fixed-order sequential computation, so repeated
//! evaluation of the same language returns bit-identical values.

mod agents;
mod complexity;
mod informativity;

pub use agents::*;
pub use complexity::*;
pub use informativity::*;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::language::{Language, Universe};
use crate::schema::{ComplexityKind, ConfigError, InformativityKind, MeasureConfig};

/// A point in objective space. Complexity is minimized, informativity maximized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub complexity: f64,
    pub informativity: f64,
}

impl Scores {
    pub fn new(complexity: f64, informativity: f64) -> Self {
        Self {
            complexity,
            informativity,
        }
    }

    /// Pareto dominance: no worse on both objectives and strictly better on one.
    pub fn dominates(&self, other: &Scores) -> bool {
        self.complexity <= other.complexity
            && self.informativity >= other.informativity
            && (self.complexity < other.complexity || self.informativity > other.informativity)
    }

    pub fn is_finite(&self) -> bool {
        self.complexity.is_finite() && self.informativity.is_finite()
    }
}

/// Encoding cost of a language.
pub trait ComplexityMeasure: Send + Sync {
    fn name(&self) -> &str;

    fn complexity(&self, language: &Language) -> f64;
}

/// Expected communicative benefit of a language.
pub trait InformativityMeasure: Send + Sync {
    fn name(&self) -> &str;

    fn informativity(&self, language: &Language) -> f64;

    /// Validate measure parameters against the universe before a run.
    fn check_domain(&self, _universe: &Universe) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// A language leaves referents without any expression denoting them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Language cannot express referents: {}", .uncovered.join(", "))]
pub struct IncompleteLanguageError {
    pub uncovered: Vec<String>,
}

/// Source of suite ids for the per-language score cache.
static NEXT_SUITE: AtomicU64 = AtomicU64::new(0);

fn next_suite() -> u64 {
    NEXT_SUITE.fetch_add(1, Ordering::Relaxed)
}

/// One complexity and one informativity measure plus the incomplete-language policy.
///
/// Every constructed suite gets its own id, shared by its clones. Scores
/// cached on a [`Language`] are only served back to the suite that computed them.
#[derive(Clone)]
pub struct Measures {
    complexity: Arc<dyn ComplexityMeasure>,
    informativity: Arc<dyn InformativityMeasure>,
    allow_incomplete: bool,
    suite: u64,
}

impl Measures {
    /// Pair two measures. Incomplete languages are rejected by default.
    pub fn new<C, I>(complexity: C, informativity: I) -> Self
    where
        C: ComplexityMeasure + 'static,
        I: InformativityMeasure + 'static,
    {
        Self {
            complexity: Arc::new(complexity),
            informativity: Arc::new(informativity),
            allow_incomplete: false,
            suite: next_suite(),
        }
    }

    /// Build the reference measures named by a config.
    pub fn from_config(config: &MeasureConfig) -> Self {
        let complexity: Arc<dyn ComplexityMeasure> = match config.complexity {
            ComplexityKind::DescriptionLength => Arc::new(DescriptionLength),
            ComplexityKind::InformationRate => Arc::new(InformationRate),
        };
        let informativity: Arc<dyn InformativityMeasure> = match &config.informativity {
            InformativityKind::CommunicativeSuccess { listener, utility } => {
                Arc::new(CommunicativeSuccess::new(*listener, utility.clone()))
            }
            InformativityKind::MutualInformation { listener } => Arc::new(MutualInformation {
                listener: *listener,
            }),
        };
        Self {
            complexity,
            informativity,
            allow_incomplete: false,
            suite: next_suite(),
        }
    }

    pub fn with_allow_incomplete(mut self, allow_incomplete: bool) -> Self {
        self.allow_incomplete = allow_incomplete;
        self
    }

    pub fn allows_incomplete(&self) -> bool {
        self.allow_incomplete
    }

    pub fn complexity_name(&self) -> &str {
        self.complexity.name()
    }

    pub fn informativity_name(&self) -> &str {
        self.informativity.name()
    }

    /// Fail if `language` is incomplete and the policy forbids evaluating it.
    pub fn check_complete(&self, language: &Language) -> Result<(), IncompleteLanguageError> {
        if self.allow_incomplete || language.is_expressible() {
            return Ok(());
        }
        Err(IncompleteLanguageError {
            uncovered: language
                .uncovered_referents()
                .map(|r| r.name.clone())
                .collect(),
        })
    }

    pub fn complexity(&self, language: &Language) -> Result<f64, IncompleteLanguageError> {
        self.check_complete(language)?;
        Ok(self.complexity.complexity(language))
    }

    pub fn informativity(&self, language: &Language) -> Result<f64, IncompleteLanguageError> {
        self.check_complete(language)?;
        Ok(self.informativity.informativity(language))
    }

    /// Compute both objectives, ignoring any cached scores.
    pub fn evaluate(&self, language: &Language) -> Result<Scores, IncompleteLanguageError> {
        self.check_complete(language)?;
        Ok(Scores::new(
            self.complexity.complexity(language),
            self.informativity.informativity(language),
        ))
    }

    /// Return scores this suite cached earlier, otherwise evaluate and attach them.
    /// The flag is true on a cache hit.
    ///
    /// The completeness policy is checked on every call. A slot already filled
    /// by another suite is left alone and the scores are computed fresh.
    pub fn evaluate_cached(&self, language: &Language) -> Result<(Scores, bool), IncompleteLanguageError> {
        self.check_complete(language)?;
        if let Some(scores) = language.cached_scores(self.suite) {
            return Ok((scores, true));
        }
        let scores = Scores::new(
            self.complexity.complexity(language),
            self.informativity.informativity(language),
        );
        // A concurrent writer computed the same value; keep whichever landed first.
        language.cache_scores(self.suite, scores);
        Ok((language.cached_scores(self.suite).unwrap_or(scores), false))
    }

    /// Validate measure parameters against a universe.
    pub fn check_domain(&self, universe: &Universe) -> Result<(), ConfigError> {
        self.informativity.check_domain(universe)
    }
}

impl Default for Measures {
    fn default() -> Self {
        Self::new(DescriptionLength, CommunicativeSuccess::default())
    }
}

impl fmt::Debug for Measures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Measures")
            .field("complexity", &self.complexity.name())
            .field("informativity", &self.informativity.name())
            .field("allow_incomplete", &self.allow_incomplete)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{Expression, Meaning};

    fn abc() -> Arc<Universe> {
        Arc::new(Universe::from_names(["a", "b", "c"]).unwrap())
    }

    fn partial(u: &Arc<Universe>) -> Language {
        Language::new(
            Arc::clone(u),
            vec![
                Expression::new("a", Meaning::point(u, "a").unwrap()),
                Expression::new("b", Meaning::point(u, "b").unwrap()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_dominance() {
        let a = Scores::new(1.0, 0.8);
        assert!(a.dominates(&Scores::new(2.0, 0.8)));
        assert!(a.dominates(&Scores::new(1.0, 0.5)));
        assert!(!a.dominates(&a));
        assert!(!a.dominates(&Scores::new(0.5, 0.1)));
    }

    #[test]
    fn test_incomplete_language_policy() {
        let u = abc();
        let language = partial(&u);

        let strict = Measures::default();
        let err = strict.evaluate(&language).unwrap_err();
        assert_eq!(err.uncovered, vec!["c".to_string()]);
        assert!(strict.complexity(&language).is_err());

        let lenient = Measures::default().with_allow_incomplete(true);
        let scores = lenient.evaluate(&language).unwrap();
        assert_eq!(scores.complexity, 2.0);
        assert!((scores.informativity - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_is_bit_deterministic() {
        let u = abc();
        let language = Language::new(
            Arc::clone(&u),
            vec![
                Expression::new("ab", Meaning::uniform(&u, ["a", "b"]).unwrap()),
                Expression::new("bc", Meaning::uniform(&u, ["b", "c"]).unwrap()),
            ],
        )
        .unwrap();
        let measures = Measures::new(
            InformationRate,
            MutualInformation {
                listener: ListenerModel::Pragmatic,
            },
        );
        let first = measures.evaluate(&language).unwrap();
        let second = measures.evaluate(&language).unwrap();
        assert_eq!(first.complexity.to_bits(), second.complexity.to_bits());
        assert_eq!(first.informativity.to_bits(), second.informativity.to_bits());
    }

    #[test]
    fn test_evaluate_cached_reports_hits() {
        let u = abc();
        let language = Language::new(
            Arc::clone(&u),
            vec![Expression::new("all", Meaning::uniform(&u, ["a", "b", "c"]).unwrap())],
        )
        .unwrap();
        let measures = Measures::default();

        let (first, hit) = measures.evaluate_cached(&language).unwrap();
        assert!(!hit);
        let (second, hit) = measures.evaluate_cached(&language).unwrap();
        assert!(hit);
        assert_eq!(first, second);
        assert_eq!(language.cached_scores(measures.suite), Some(first));
        assert_eq!(measures.clone().evaluate_cached(&language).unwrap(), (first, true));
    }

    #[test]
    fn test_cached_scores_still_respect_completeness_policy() {
        let u = abc();
        let language = partial(&u);

        let lenient = Measures::default().with_allow_incomplete(true);
        assert!(lenient.evaluate_cached(&language).is_ok());

        let strict = Measures::default();
        let err = strict.evaluate_cached(&language).unwrap_err();
        assert_eq!(err.uncovered, vec!["c".to_string()]);

        // Same suite, policy tightened after the scores were cached.
        let tightened = lenient.with_allow_incomplete(false);
        assert!(tightened.evaluate_cached(&language).is_err());
    }

    #[test]
    fn test_cached_scores_are_not_shared_across_suites() {
        let u = abc();
        let one_to_one = Language::new(
            Arc::clone(&u),
            ["a", "b", "c"]
                .into_iter()
                .map(|r| Expression::new(r, Meaning::point(&u, r).unwrap()))
                .collect(),
        )
        .unwrap();

        let (counted, hit) = Measures::default().evaluate_cached(&one_to_one).unwrap();
        assert!(!hit);
        assert_eq!(counted, Scores::new(3.0, 1.0));

        let rate = Measures::new(
            InformationRate,
            MutualInformation {
                listener: ListenerModel::Literal,
            },
        );
        let (bits, hit) = rate.evaluate_cached(&one_to_one).unwrap();
        assert!(!hit);
        assert!((bits.complexity - 3f64.log2()).abs() < 1e-12);
        assert!((bits.informativity - 3f64.log2()).abs() < 1e-12);

        // The slot still belongs to the first suite.
        let (_, hit) = rate.evaluate_cached(&one_to_one).unwrap();
        assert!(!hit);
    }

    #[test]
    fn test_from_config() {
        let config = MeasureConfig {
            complexity: ComplexityKind::InformationRate,
            informativity: InformativityKind::MutualInformation {
                listener: ListenerModel::Literal,
            },
        };
        let measures = Measures::from_config(&config);
        assert_eq!(measures.complexity_name(), "information_rate");
        assert_eq!(measures.informativity_name(), "mutual_information");
        assert!(!measures.allows_incomplete());
    }
}
