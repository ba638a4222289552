//! Languages: ordered collections of expressions over one universe.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use crate::compute::measures::Scores;

use super::{Expression, MalformedDomainError, Meaning, Referent, Universe};

/// An ordered sequence of expressions sharing one universe.
///
/// A language is immutable once built. Variation operators always produce a
/// new language, so scores computed for one can be cached on it. The cache
/// holds one entry and only answers the suite that filled it.
#[derive(Debug, Clone)]
pub struct Language {
    universe: Arc<Universe>,
    expressions: Vec<Expression>,
    allow_homonymy: bool,
    /// Referent indices no expression covers.
    uncovered: Vec<usize>,
    /// Scores tagged with the id of the measure suite that computed them.
    scores: OnceLock<(u64, Scores)>,
}

impl Language {
    /// Build a language whose forms must be distinct.
    pub fn new(universe: Arc<Universe>, expressions: Vec<Expression>) -> Result<Self, MalformedDomainError> {
        Self::build(universe, expressions, false)
    }

    /// Build a language in which several expressions may share a form.
    pub fn with_homonymy(
        universe: Arc<Universe>,
        expressions: Vec<Expression>,
    ) -> Result<Self, MalformedDomainError> {
        Self::build(universe, expressions, true)
    }

    fn build(
        universe: Arc<Universe>,
        expressions: Vec<Expression>,
        allow_homonymy: bool,
    ) -> Result<Self, MalformedDomainError> {
        let mut forms = HashSet::new();
        for expression in &expressions {
            expression.validate(&universe)?;
            if !allow_homonymy && !forms.insert(expression.form.as_str()) {
                return Err(MalformedDomainError::DuplicateForm(expression.form.clone()));
            }
        }
        Ok(Self::from_validated(universe, expressions, allow_homonymy))
    }

    /// Skip validation for expressions already checked against `universe`.
    pub(crate) fn from_validated(
        universe: Arc<Universe>,
        expressions: Vec<Expression>,
        allow_homonymy: bool,
    ) -> Self {
        let mut covered = vec![false; universe.len()];
        for expression in &expressions {
            for referent in expression.meaning.support() {
                covered[referent] = true;
            }
        }
        let uncovered = covered
            .iter()
            .enumerate()
            .filter(|&(_, &c)| !c)
            .map(|(i, _)| i)
            .collect();

        Self {
            universe,
            expressions,
            allow_homonymy,
            uncovered,
            scores: OnceLock::new(),
        }
    }

    pub fn universe(&self) -> &Arc<Universe> {
        &self.universe
    }

    pub fn expressions(&self) -> &[Expression] {
        &self.expressions
    }

    pub fn forms(&self) -> impl Iterator<Item = &str> {
        self.expressions.iter().map(|e| e.form.as_str())
    }

    pub fn allows_homonymy(&self) -> bool {
        self.allow_homonymy
    }

    /// Meaning of the first expression with this form.
    pub fn meaning_of(&self, form: &str) -> Option<&Meaning> {
        self.expressions
            .iter()
            .find(|e| e.form == form)
            .map(|e| &e.meaning)
    }

    /// Meanings of every expression with this form, in language order.
    pub fn meanings_of<'a>(&'a self, form: &'a str) -> impl Iterator<Item = &'a Meaning> + 'a {
        self.expressions
            .iter()
            .filter(move |e| e.form == form)
            .map(|e| &e.meaning)
    }

    /// True iff every referent is covered with non-zero probability.
    pub fn is_expressible(&self) -> bool {
        self.uncovered.is_empty()
    }

    /// Referents no expression can denote.
    pub fn uncovered_referents(&self) -> impl Iterator<Item = &Referent> {
        self.uncovered
            .iter()
            .filter_map(|&i| self.universe.referent(i))
    }

    /// True when both languages contain the same expressions, ignoring order.
    pub fn same_expressions(&self, other: &Language) -> bool {
        self.expressions.len() == other.expressions.len()
            && self
                .expressions
                .iter()
                .all(|e| other.expressions.contains(e))
    }

    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// Scores attached by a previous evaluation under measure suite `suite`.
    pub(crate) fn cached_scores(&self, suite: u64) -> Option<Scores> {
        match self.scores.get() {
            Some(&(owner, scores)) if owner == suite => Some(scores),
            _ => None,
        }
    }

    /// Attach scores unless any are already present. Returns whether this call set them.
    pub(crate) fn cache_scores(&self, suite: u64, scores: Scores) -> bool {
        self.scores.set((suite, scores)).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn universe() -> Arc<Universe> {
        Arc::new(Universe::from_names(["a", "b", "c"]).unwrap())
    }

    #[test]
    fn test_expressibility() {
        let u = universe();
        let partial = Language::new(
            Arc::clone(&u),
            vec![
                Expression::new("x", Meaning::point(&u, "a").unwrap()),
                Expression::new("y", Meaning::uniform(&u, ["a", "b"]).unwrap()),
            ],
        )
        .unwrap();
        assert!(!partial.is_expressible());
        let missing: Vec<_> = partial.uncovered_referents().map(|r| r.name.as_str()).collect();
        assert_eq!(missing, vec!["c"]);

        let complete = Language::new(
            Arc::clone(&u),
            vec![
                Expression::new("x", Meaning::point(&u, "c").unwrap()),
                Expression::new("y", Meaning::uniform(&u, ["a", "b"]).unwrap()),
            ],
        )
        .unwrap();
        assert!(complete.is_expressible());
    }

    #[test]
    fn test_meaning_of() {
        let u = universe();
        let language = Language::with_homonymy(
            Arc::clone(&u),
            vec![
                Expression::new("bank", Meaning::point(&u, "a").unwrap()),
                Expression::new("bank", Meaning::point(&u, "b").unwrap()),
                Expression::new("c", Meaning::point(&u, "c").unwrap()),
            ],
        )
        .unwrap();

        assert_eq!(language.meaning_of("bank"), Some(&Meaning::point(&u, "a").unwrap()));
        assert_eq!(language.meanings_of("bank").count(), 2);
        assert!(language.meaning_of("river").is_none());
    }

    #[test]
    fn test_duplicate_form_rejected_without_homonymy() {
        let u = universe();
        let err = Language::new(
            Arc::clone(&u),
            vec![
                Expression::new("x", Meaning::point(&u, "a").unwrap()),
                Expression::new("x", Meaning::point(&u, "b").unwrap()),
            ],
        )
        .unwrap_err();
        assert_eq!(err, MalformedDomainError::DuplicateForm("x".into()));
    }

    #[test]
    fn test_score_slot_is_set_once() {
        let u = universe();
        let language =
            Language::new(Arc::clone(&u), vec![Expression::new("x", Meaning::point(&u, "a").unwrap())]).unwrap();
        assert!(language.cached_scores(7).is_none());

        let first = Scores::new(1.0, 0.5);
        assert!(language.cache_scores(7, first));
        assert!(!language.cache_scores(7, Scores::new(2.0, 0.1)));
        assert!(!language.cache_scores(8, Scores::new(3.0, 0.2)));
        assert_eq!(language.cached_scores(7), Some(first));
        assert_eq!(language.cached_scores(8), None);
        assert_eq!(language.clone().cached_scores(7), Some(first));
    }

    #[test]
    fn test_same_expressions_ignores_order() {
        let u = universe();
        let x = Expression::new("x", Meaning::point(&u, "a").unwrap());
        let y = Expression::new("y", Meaning::point(&u, "b").unwrap());
        let l1 = Language::new(Arc::clone(&u), vec![x.clone(), y.clone()]).unwrap();
        let l2 = Language::new(Arc::clone(&u), vec![y, x]).unwrap();
        assert!(l1.same_expressions(&l2));
    }
}
