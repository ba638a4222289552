//! Referents, universes and meanings.
//!
//! A [`Universe`] enumerates the referents a speaker may need to talk about,
//! together with a prior over them. A [`Meaning`] is a distribution over a
//! subset of those referents; a deterministic meaning puts all of its mass on
//! a single referent.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::MalformedDomainError;

/// Tolerance used when checking that probabilities sum to one.
pub const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// An atomic object of reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Referent {
    /// Unique name within a universe.
    pub name: String,
    /// Free-form features, inspected by grammar predicates.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl Referent {
    /// Create a referent without properties.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Attach a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Look up a property.
    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }
}

/// Immutable set of referents with a prior distribution.
///
/// Languages share a universe through `Arc<Universe>`; it is never copied
/// or modified after construction.
#[derive(Debug, Clone)]
pub struct Universe {
    referents: Vec<Referent>,
    prior: Vec<f64>,
    by_name: HashMap<String, usize>,
}

impl Universe {
    /// Create a universe. A missing prior defaults to uniform.
    pub fn new(referents: Vec<Referent>, prior: Option<Vec<f64>>) -> Result<Self, MalformedDomainError> {
        if referents.is_empty() {
            return Err(MalformedDomainError::EmptyUniverse);
        }

        let mut by_name = HashMap::with_capacity(referents.len());
        for (i, referent) in referents.iter().enumerate() {
            if by_name.insert(referent.name.clone(), i).is_some() {
                return Err(MalformedDomainError::DuplicateReferent(referent.name.clone()));
            }
        }

        let n = referents.len();
        let prior = prior.unwrap_or_else(|| vec![1.0 / n as f64; n]);
        if prior.len() != n {
            return Err(MalformedDomainError::PriorLength {
                expected: n,
                got: prior.len(),
            });
        }
        for (referent, &p) in referents.iter().zip(&prior) {
            if !p.is_finite() || p < 0.0 {
                return Err(MalformedDomainError::InvalidProbability {
                    referent: referent.name.clone(),
                    value: p,
                });
            }
        }
        let sum: f64 = prior.iter().sum();
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(MalformedDomainError::PriorNotNormalized { sum });
        }

        Ok(Self {
            referents,
            prior,
            by_name,
        })
    }

    /// Create a universe with a uniform prior.
    pub fn uniform(referents: Vec<Referent>) -> Result<Self, MalformedDomainError> {
        Self::new(referents, None)
    }

    /// Create a universe from referent names with a uniform prior.
    pub fn from_names<I, S>(names: I) -> Result<Self, MalformedDomainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::uniform(names.into_iter().map(Referent::new).collect())
    }

    /// Create a universe from a prior keyed by referent name.
    pub fn with_named_prior(
        referents: Vec<Referent>,
        prior: &BTreeMap<String, f64>,
    ) -> Result<Self, MalformedDomainError> {
        if let Some(unknown) = prior
            .keys()
            .find(|name| !referents.iter().any(|r| &r.name == *name))
        {
            return Err(MalformedDomainError::UnknownReferent(unknown.clone()));
        }
        let values = referents
            .iter()
            .map(|r| prior.get(&r.name).copied().unwrap_or(0.0))
            .collect();
        Self::new(referents, Some(values))
    }

    pub fn referents(&self) -> &[Referent] {
        &self.referents
    }

    pub fn prior(&self) -> &[f64] {
        &self.prior
    }

    pub fn referent(&self, index: usize) -> Option<&Referent> {
        self.referents.get(index)
    }

    /// Index of the referent with the given name.
    pub fn index_of(&self, name: &str) -> Result<usize, MalformedDomainError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| MalformedDomainError::UnknownReferent(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.referents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.referents.is_empty()
    }
}

/// A distribution over referents of a universe.
///
/// The support is stored sorted by referent index and only holds strictly
/// positive probabilities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Meaning {
    support: Vec<(usize, f64)>,
}

impl Meaning {
    /// Deterministic meaning denoting a single named referent.
    pub fn point(universe: &Universe, name: &str) -> Result<Self, MalformedDomainError> {
        universe.index_of(name).map(|index| Self {
            support: vec![(index, 1.0)],
        })
    }

    /// Deterministic meaning denoting the referent at `index`.
    pub fn point_at(universe: &Universe, index: usize) -> Result<Self, MalformedDomainError> {
        check_index(universe, index)?;
        Ok(Self {
            support: vec![(index, 1.0)],
        })
    }

    /// Uniform distribution over the named referents.
    pub fn uniform<'a, I>(universe: &Universe, names: I) -> Result<Self, MalformedDomainError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let indices = names
            .into_iter()
            .map(|name| universe.index_of(name))
            .collect::<Result<Vec<_>, _>>()?;
        Self::uniform_over(universe, indices)
    }

    /// Uniform distribution over referent indices. Duplicates are ignored.
    pub fn uniform_over<I>(universe: &Universe, indices: I) -> Result<Self, MalformedDomainError>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut indices: Vec<usize> = indices.into_iter().collect();
        indices.sort_unstable();
        indices.dedup();
        if indices.is_empty() {
            return Err(MalformedDomainError::EmptyMeaning);
        }
        for &index in &indices {
            check_index(universe, index)?;
        }
        let p = 1.0 / indices.len() as f64;
        Ok(Self {
            support: indices.into_iter().map(|i| (i, p)).collect(),
        })
    }

    /// Explicit distribution over named referents. Must already sum to one.
    pub fn distribution<'a, I>(universe: &Universe, entries: I) -> Result<Self, MalformedDomainError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let support = collect_support(universe, entries)?;
        let sum: f64 = support.iter().map(|(_, p)| p).sum();
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(MalformedDomainError::MeaningNotNormalized { sum });
        }
        Ok(Self { support })
    }

    /// Distribution proportional to non-negative weights over named referents.
    pub fn from_weights<'a, I>(universe: &Universe, entries: I) -> Result<Self, MalformedDomainError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut support = collect_support(universe, entries)?;
        let total: f64 = support.iter().map(|(_, w)| w).sum();
        for (_, w) in &mut support {
            *w /= total;
        }
        Ok(Self { support })
    }

    /// Referent indices with non-zero probability, ascending.
    pub fn support(&self) -> impl Iterator<Item = usize> + '_ {
        self.support.iter().map(|&(i, _)| i)
    }

    /// `(referent index, probability)` pairs, ascending by index.
    pub fn entries(&self) -> &[(usize, f64)] {
        &self.support
    }

    /// Probability assigned to the referent at `index`.
    pub fn probability(&self, index: usize) -> f64 {
        self.support
            .binary_search_by_key(&index, |&(i, _)| i)
            .map(|pos| self.support[pos].1)
            .unwrap_or(0.0)
    }

    pub fn covers(&self, index: usize) -> bool {
        self.support
            .binary_search_by_key(&index, |&(i, _)| i)
            .is_ok()
    }

    pub fn is_deterministic(&self) -> bool {
        self.support.len() == 1
    }

    /// Number of referents in the support.
    pub fn len(&self) -> usize {
        self.support.len()
    }

    pub fn is_empty(&self) -> bool {
        self.support.is_empty()
    }

    /// Largest referent index in the support.
    pub(crate) fn max_index(&self) -> Option<usize> {
        self.support.last().map(|&(i, _)| i)
    }
}

fn check_index(universe: &Universe, index: usize) -> Result<(), MalformedDomainError> {
    if index >= universe.len() {
        return Err(MalformedDomainError::ReferentOutOfRange {
            index,
            size: universe.len(),
        });
    }
    Ok(())
}

fn collect_support<'a, I>(universe: &Universe, entries: I) -> Result<Vec<(usize, f64)>, MalformedDomainError>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let mut support = Vec::new();
    for (name, p) in entries {
        let index = universe.index_of(name)?;
        if !p.is_finite() || p < 0.0 {
            return Err(MalformedDomainError::InvalidProbability {
                referent: name.to_string(),
                value: p,
            });
        }
        if support.iter().any(|&(i, _)| i == index) {
            return Err(MalformedDomainError::DuplicateReferent(name.to_string()));
        }
        if p > 0.0 {
            support.push((index, p));
        }
    }
    if support.is_empty() {
        return Err(MalformedDomainError::EmptyMeaning);
    }
    support.sort_by_key(|&(i, _)| i);
    Ok(support)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn abc() -> Universe {
        Universe::from_names(["a", "b", "c"]).unwrap()
    }

    #[test]
    fn test_uniform_prior() {
        let universe = abc();
        let sum: f64 = universe.prior().iter().sum();
        assert!((sum - 1.0).abs() <= PROBABILITY_TOLERANCE);
        assert_eq!(universe.len(), 3);
        assert_eq!(universe.index_of("b").unwrap(), 1);
    }

    #[test]
    fn test_unnormalized_prior_rejected() {
        let referents = vec![Referent::new("a"), Referent::new("b")];
        let err = Universe::new(referents, Some(vec![0.5, 0.6])).unwrap_err();
        assert!(matches!(err, MalformedDomainError::PriorNotNormalized { .. }));
    }

    #[test]
    fn test_duplicate_referent_rejected() {
        let err = Universe::from_names(["a", "a"]).unwrap_err();
        assert_eq!(err, MalformedDomainError::DuplicateReferent("a".into()));
    }

    #[test]
    fn test_named_prior() {
        let referents = vec![Referent::new("a"), Referent::new("b")];
        let prior = BTreeMap::from([("a".to_string(), 0.25), ("b".to_string(), 0.75)]);
        let universe = Universe::with_named_prior(referents.clone(), &prior).unwrap();
        assert_eq!(universe.prior(), &[0.25, 0.75]);

        let bad = BTreeMap::from([("z".to_string(), 1.0)]);
        assert!(matches!(
            Universe::with_named_prior(referents, &bad),
            Err(MalformedDomainError::UnknownReferent(_))
        ));
    }

    #[test]
    fn test_meaning_support() {
        let universe = abc();
        let m = Meaning::uniform(&universe, ["c", "a"]).unwrap();
        assert_eq!(m.support().collect::<Vec<_>>(), vec![0, 2]);
        assert!((m.probability(0) - 0.5).abs() < 1e-12);
        assert_eq!(m.probability(1), 0.0);
        assert!(!m.is_deterministic());
        assert!(Meaning::point(&universe, "b").unwrap().is_deterministic());
    }

    #[test]
    fn test_meaning_outside_universe() {
        let universe = abc();
        assert!(matches!(
            Meaning::point(&universe, "z"),
            Err(MalformedDomainError::UnknownReferent(_))
        ));
        assert!(matches!(
            Meaning::point_at(&universe, 7),
            Err(MalformedDomainError::ReferentOutOfRange { index: 7, size: 3 })
        ));
    }

    #[test]
    fn test_distribution_must_normalize() {
        let universe = abc();
        assert!(Meaning::distribution(&universe, [("a", 0.3), ("b", 0.7)]).is_ok());
        assert!(matches!(
            Meaning::distribution(&universe, [("a", 0.3), ("b", 0.3)]),
            Err(MalformedDomainError::MeaningNotNormalized { .. })
        ));
        let weighted = Meaning::from_weights(&universe, [("a", 1.0), ("b", 3.0)]).unwrap();
        assert!((weighted.probability(1) - 0.75).abs() < 1e-12);
        assert!(matches!(
            Meaning::from_weights(&universe, [("a", 0.0)]),
            Err(MalformedDomainError::EmptyMeaning)
        ));
    }

    proptest! {
        #[test]
        fn prop_normalized_priors_accepted(weights in prop::collection::vec(0.01f64..10.0, 1..20)) {
            let total: f64 = weights.iter().sum();
            let prior: Vec<f64> = weights.iter().map(|w| w / total).collect();
            let referents = (0..prior.len()).map(|i| Referent::new(format!("r{i}"))).collect();
            let universe = Universe::new(referents, Some(prior)).unwrap();
            let sum: f64 = universe.prior().iter().sum();
            prop_assert!((sum - 1.0).abs() <= PROBABILITY_TOLERANCE);
        }

        #[test]
        fn prop_scaled_priors_rejected(
            weights in prop::collection::vec(0.01f64..10.0, 1..20),
            scale in 1.01f64..5.0,
        ) {
            let total: f64 = weights.iter().sum();
            let prior: Vec<f64> = weights.iter().map(|w| scale * w / total).collect();
            let referents = (0..prior.len()).map(|i| Referent::new(format!("r{i}"))).collect();
            let result = Universe::new(referents, Some(prior));
            let is_not_normalized = matches!(result, Err(MalformedDomainError::PriorNotNormalized { .. }));
            prop_assert!(is_not_normalized);
        }
    }
}
