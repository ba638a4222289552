//! Expressions and the pool candidate languages draw them from.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use super::{Language, MalformedDomainError, Meaning, Universe};

/// A form paired with the meaning it denotes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expression {
    /// Opaque identifier of the expression.
    pub form: String,
    /// What the expression denotes.
    pub meaning: Meaning,
    /// Description length of the expression (1 unless derived from a grammar).
    pub length: usize,
}

impl Expression {
    pub fn new(form: impl Into<String>, meaning: Meaning) -> Self {
        Self {
            form: form.into(),
            meaning,
            length: 1,
        }
    }

    /// Set the description length.
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    /// Check that the meaning is defined and lies inside `universe`.
    pub(crate) fn validate(&self, universe: &Universe) -> Result<(), MalformedDomainError> {
        match self.meaning.max_index() {
            None => Err(MalformedDomainError::UndefinedMeaning {
                form: self.form.clone(),
            }),
            Some(index) if index >= universe.len() => Err(MalformedDomainError::ReferentOutOfRange {
                index,
                size: universe.len(),
            }),
            Some(_) => Ok(()),
        }
    }
}

/// The set of expressions available to the sampler.
///
/// Languages produced by search are subsets of the pool, addressed by pool
/// index. The pool is validated once so that any subset is a well-formed
/// language.
#[derive(Debug, Clone)]
pub struct ExpressionPool {
    universe: Arc<Universe>,
    expressions: Vec<Expression>,
    allow_homonymy: bool,
    /// For each referent, pool indices covering it, cheapest first.
    coverage: Vec<Vec<usize>>,
}

impl ExpressionPool {
    pub fn new(
        universe: Arc<Universe>,
        expressions: Vec<Expression>,
        allow_homonymy: bool,
    ) -> Result<Self, MalformedDomainError> {
        if expressions.is_empty() {
            return Err(MalformedDomainError::EmptyPool);
        }

        let mut seen = HashSet::new();
        for expression in &expressions {
            expression.validate(&universe)?;
            if !allow_homonymy && !seen.insert(expression.form.as_str()) {
                return Err(MalformedDomainError::DuplicateForm(expression.form.clone()));
            }
        }

        let mut coverage = vec![Vec::new(); universe.len()];
        for (i, expression) in expressions.iter().enumerate() {
            for referent in expression.meaning.support() {
                coverage[referent].push(i);
            }
        }
        for covering in &mut coverage {
            covering.sort_by_key(|&i| (expressions[i].length, i));
        }

        Ok(Self {
            universe,
            expressions,
            allow_homonymy,
            coverage,
        })
    }

    pub fn universe(&self) -> &Arc<Universe> {
        &self.universe
    }

    pub fn expressions(&self) -> &[Expression] {
        &self.expressions
    }

    pub fn get(&self, index: usize) -> Option<&Expression> {
        self.expressions.get(index)
    }

    pub fn allows_homonymy(&self) -> bool {
        self.allow_homonymy
    }

    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// Pool indices whose meaning covers `referent`, cheapest first.
    pub fn covering(&self, referent: usize) -> &[usize] {
        self.coverage.get(referent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the full pool covers every referent.
    pub fn covers_universe(&self) -> bool {
        self.coverage.iter().all(|c| !c.is_empty())
    }

    /// Build the language made of the given pool indices, in order.
    ///
    /// Returns `None` if an index is out of range or repeated.
    pub fn try_language(&self, indices: &[usize]) -> Option<Language> {
        let mut seen = vec![false; self.expressions.len()];
        for &i in indices {
            if std::mem::replace(seen.get_mut(i)?, true) {
                return None;
            }
        }
        Some(self.language(indices))
    }

    /// Callers guarantee distinct, in-range indices.
    pub(crate) fn language(&self, indices: &[usize]) -> Language {
        let expressions = indices
            .iter()
            .map(|&i| self.expressions[i].clone())
            .collect();
        Language::from_validated(Arc::clone(&self.universe), expressions, self.allow_homonymy)
    }

    /// The language containing every pool expression.
    pub fn full_language(&self) -> Language {
        let all: Vec<usize> = (0..self.expressions.len()).collect();
        self.language(&all)
    }
}
