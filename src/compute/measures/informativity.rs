//! Informativity measures.

use serde::{Deserialize, Serialize};

use super::{InformativityMeasure, ListenerModel, referent_joint};
use crate::language::{Language, Universe};
use crate::schema::ConfigError;

/// Utility `u(m, m')` of recovering `m'` when `m` was intended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Utility {
    /// 1 when the referent is recovered exactly, 0 otherwise.
    #[default]
    Indicator,
    /// Similarity matrix indexed by (intended, recovered).
    Matrix { values: Vec<Vec<f64>> },
    /// Distortion matrix; utility is its negation.
    Distortion { values: Vec<Vec<f64>> },
}

impl Utility {
    #[inline]
    pub fn value(&self, intended: usize, recovered: usize) -> f64 {
        match self {
            Utility::Indicator => {
                if intended == recovered {
                    1.0
                } else {
                    0.0
                }
            }
            Utility::Matrix { values } => values[intended][recovered],
            Utility::Distortion { values } => -values[intended][recovered],
        }
    }

    /// Check that a matrix utility is square over `size` referents with finite entries.
    pub fn check_shape(&self, size: usize) -> Result<(), ConfigError> {
        let values = match self {
            Utility::Indicator => return Ok(()),
            Utility::Matrix { values } | Utility::Distortion { values } => values,
        };
        if values.len() != size {
            return Err(ConfigError::UtilityShape {
                expected: size,
                got: values.len(),
            });
        }
        for (i, row) in values.iter().enumerate() {
            if row.len() != size {
                return Err(ConfigError::UtilityRowShape {
                    row: i,
                    expected: size,
                    got: row.len(),
                });
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(ConfigError::NonFiniteUtility { row: i });
            }
        }
        Ok(())
    }
}

/// Expected utility of the communication game,
/// `Σ_m p(m) Σ_w S(w|m) Σ_m' L(m'|w) u(m, m')`.
#[derive(Debug, Clone, Default)]
pub struct CommunicativeSuccess {
    pub listener: ListenerModel,
    pub utility: Utility,
}

impl CommunicativeSuccess {
    pub fn new(listener: ListenerModel, utility: Utility) -> Self {
        Self { listener, utility }
    }
}

impl InformativityMeasure for CommunicativeSuccess {
    fn name(&self) -> &str {
        "communicative_success"
    }

    fn informativity(&self, language: &Language) -> f64 {
        let joint = referent_joint(language, self.listener);
        let mut total = 0.0;
        for m in 0..joint.rows() {
            for (m_hat, &p) in joint.row(m).iter().enumerate() {
                if p != 0.0 {
                    total += p * self.utility.value(m, m_hat);
                }
            }
        }
        total
    }

    fn check_domain(&self, universe: &Universe) -> Result<(), ConfigError> {
        self.utility.check_shape(universe.len())
    }
}

/// Mutual information `I(M; M̂)` in bits between intended and recovered referents.
#[derive(Debug, Clone, Copy, Default)]
pub struct MutualInformation {
    pub listener: ListenerModel,
}

impl InformativityMeasure for MutualInformation {
    fn name(&self) -> &str {
        "mutual_information"
    }

    fn informativity(&self, language: &Language) -> f64 {
        let joint = referent_joint(language, self.listener);
        let n = joint.rows();

        let intended: Vec<f64> = (0..n).map(|m| joint.row(m).iter().sum()).collect();
        let mut recovered = vec![0.0; joint.cols()];
        for m in 0..n {
            for (m_hat, &p) in joint.row(m).iter().enumerate() {
                recovered[m_hat] += p;
            }
        }

        let mut info = 0.0;
        for m in 0..n {
            for (m_hat, &p) in joint.row(m).iter().enumerate() {
                if p > 0.0 {
                    info += p * (p / (intended[m] * recovered[m_hat])).log2();
                }
            }
        }
        info.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{Expression, Meaning};
    use std::sync::Arc;

    fn abc() -> Arc<Universe> {
        Arc::new(Universe::from_names(["a", "b", "c"]).unwrap())
    }

    fn one_to_one(u: &Arc<Universe>) -> Language {
        let expressions = ["a", "b", "c"]
            .iter()
            .map(|&r| Expression::new(r, Meaning::point(u, r).unwrap()))
            .collect();
        Language::new(Arc::clone(u), expressions).unwrap()
    }

    fn vague(u: &Arc<Universe>) -> Language {
        Language::new(
            Arc::clone(u),
            vec![
                Expression::new("ab", Meaning::uniform(u, ["a", "b"]).unwrap()),
                Expression::new("c", Meaning::point(u, "c").unwrap()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_one_to_one_language_is_perfect() {
        let u = abc();
        let language = one_to_one(&u);
        assert!((CommunicativeSuccess::default().informativity(&language) - 1.0).abs() < 1e-12);

        let mi = MutualInformation::default().informativity(&language);
        assert!((mi - 3f64.log2()).abs() < 1e-12);
    }

    #[test]
    fn test_vague_language_loses_information() {
        let u = abc();
        let language = vague(&u);
        // a and b are each recovered with probability 1/2, c always.
        let success = CommunicativeSuccess::default().informativity(&language);
        assert!((success - 2.0 / 3.0).abs() < 1e-12);

        let mi = MutualInformation::default().informativity(&language);
        assert!(mi < 3f64.log2());
        assert!(mi > 0.0);
    }

    #[test]
    fn test_distortion_utility_is_negative() {
        let u = abc();
        let distortion = Utility::Distortion {
            values: vec![vec![0.0, 1.0, 2.0], vec![1.0, 0.0, 1.0], vec![2.0, 1.0, 0.0]],
        };
        let measure = CommunicativeSuccess::new(ListenerModel::Literal, distortion);
        assert_eq!(measure.informativity(&one_to_one(&u)), 0.0);
        // a and b confused half the time at distance 1.
        assert!((measure.informativity(&vague(&u)) + 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_utility_shape_checked() {
        let u = abc();
        let bad = CommunicativeSuccess::new(
            ListenerModel::Literal,
            Utility::Matrix {
                values: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            },
        );
        assert!(matches!(
            bad.check_domain(&u),
            Err(ConfigError::UtilityShape { expected: 3, got: 2 })
        ));
        assert!(CommunicativeSuccess::default().check_domain(&u).is_ok());
    }

    #[test]
    fn test_pragmatic_listener_never_hurts_indicator_success() {
        let u = abc();
        let language = Language::new(
            Arc::clone(&u),
            vec![
                Expression::new("ab", Meaning::uniform(&u, ["a", "b"]).unwrap()),
                Expression::new("b", Meaning::point(&u, "b").unwrap()),
                Expression::new("c", Meaning::point(&u, "c").unwrap()),
            ],
        )
        .unwrap();
        let literal = CommunicativeSuccess::new(ListenerModel::Literal, Utility::Indicator);
        let pragmatic = CommunicativeSuccess::new(ListenerModel::Pragmatic, Utility::Indicator);
        assert!(pragmatic.informativity(&language) >= literal.informativity(&language));
    }
}
