//! Random construction and variation of languages.
//!
//! Languages are handled as genes: ordered lists of distinct indices into
//! an [`ExpressionPool`]. Every operator returns new genes and leaves its
//! inputs untouched, so all offspring stay inside the pool's universe.

use std::sync::Arc;

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::language::ExpressionPool;
use crate::schema::SizeBounds;

/// A single perturbation of a gene list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    /// Insert a pool expression at `position`.
    Add { position: usize, expression: usize },
    /// Drop the expression at `position`.
    Remove { position: usize },
    /// Replace the expression at `position` with another pool expression.
    Replace { position: usize, expression: usize },
    /// Exchange the expressions at two positions.
    Swap { first: usize, second: usize },
}

impl Mutation {
    /// Apply to `genes`. Positions outside the list leave it unchanged.
    pub fn apply(&self, genes: &[usize]) -> Vec<usize> {
        let mut out = genes.to_vec();
        match *self {
            Mutation::Add {
                position,
                expression,
            } => out.insert(position.min(out.len()), expression),
            Mutation::Remove { position } => {
                if position < out.len() {
                    out.remove(position);
                }
            }
            Mutation::Replace {
                position,
                expression,
            } => {
                if let Some(slot) = out.get_mut(position) {
                    *slot = expression;
                }
            }
            Mutation::Swap { first, second } => {
                if first < out.len() && second < out.len() {
                    out.swap(first, second);
                }
            }
        }
        out
    }

    /// The mutation that undoes `self` when applied to `self.apply(before)`.
    pub fn inverse(&self, before: &[usize]) -> Option<Mutation> {
        match *self {
            Mutation::Add { position, .. } => Some(Mutation::Remove {
                position: position.min(before.len()),
            }),
            Mutation::Remove { position } => before.get(position).map(|&expression| Mutation::Add {
                position,
                expression,
            }),
            Mutation::Replace { position, .. } => {
                before.get(position).map(|&expression| Mutation::Replace {
                    position,
                    expression,
                })
            }
            Mutation::Swap { .. } => Some(*self),
        }
    }
}

/// Seedable source of random languages and variation.
pub struct LanguageSampler {
    rng: StdRng,
    pool: Arc<ExpressionPool>,
    bounds: SizeBounds,
}

impl LanguageSampler {
    /// Create from seed.
    pub fn new(pool: Arc<ExpressionPool>, bounds: SizeBounds, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            pool,
            bounds,
        }
    }

    pub fn pool(&self) -> &Arc<ExpressionPool> {
        &self.pool
    }

    fn min_size(&self) -> usize {
        self.bounds.min.clamp(1, self.pool.len())
    }

    fn max_size(&self) -> usize {
        self.bounds
            .max
            .unwrap_or(self.pool.len())
            .min(self.pool.len())
            .max(self.min_size())
    }

    /// Random subset of the pool within the size bounds, in random order.
    pub fn random_genes(&mut self) -> Vec<usize> {
        let size = self.rng.gen_range(self.min_size()..=self.max_size());
        rand::seq::index::sample(&mut self.rng, self.pool.len(), size).into_vec()
    }

    /// Draw one applicable mutation, or `None` if no operator fits the bounds.
    pub fn random_mutation(&mut self, genes: &[usize]) -> Option<Mutation> {
        let absent: Vec<usize> = (0..self.pool.len()).filter(|i| !genes.contains(i)).collect();
        let len = genes.len();

        let mut ops: Vec<u8> = Vec::with_capacity(4);
        if !absent.is_empty() && len < self.max_size() {
            ops.push(0);
        }
        if len > self.min_size() {
            ops.push(1);
        }
        if !absent.is_empty() && len > 0 {
            ops.push(2);
        }
        if len >= 2 {
            ops.push(3);
        }

        let mutation = match *ops.choose(&mut self.rng)? {
            0 => Mutation::Add {
                position: self.rng.gen_range(0..=len),
                expression: absent[self.rng.gen_range(0..absent.len())],
            },
            1 => Mutation::Remove {
                position: self.rng.gen_range(0..len),
            },
            2 => Mutation::Replace {
                position: self.rng.gen_range(0..len),
                expression: absent[self.rng.gen_range(0..absent.len())],
            },
            _ => {
                let first = self.rng.gen_range(0..len);
                let mut second = self.rng.gen_range(0..len - 1);
                if second >= first {
                    second += 1;
                }
                Mutation::Swap { first, second }
            }
        };
        log::trace!("Mutation {mutation:?} on {genes:?}");
        Some(mutation)
    }

    /// Referent-partition crossover.
    ///
    /// Referents are split at random into two halves. The child keeps the
    /// first parent's expressions touching the first half, then the second
    /// parent's expressions touching the second half.
    pub fn crossover(&mut self, first: &[usize], second: &[usize]) -> Vec<usize> {
        let n = self.pool.universe().len();
        let from_first: Vec<bool> = (0..n).map(|_| self.rng.gen_bool(0.5)).collect();

        let touches = |gene: usize, side: bool| {
            self.pool
                .get(gene)
                .is_some_and(|e| e.meaning.support().any(|m| from_first[m] == side))
        };

        let mut child: Vec<usize> = first.iter().copied().filter(|&g| touches(g, true)).collect();
        for &gene in second {
            if touches(gene, false) && !child.contains(&gene) {
                child.push(gene);
            }
        }

        if child.is_empty() {
            child = first.to_vec();
        }
        child.truncate(self.max_size());
        log::trace!("Crossover {first:?} x {second:?} -> {child:?}");
        child
    }

    /// Whether the genes cover every referent.
    pub fn is_complete(&self, genes: &[usize]) -> bool {
        self.uncovered(genes).is_empty()
    }

    fn uncovered(&self, genes: &[usize]) -> Vec<usize> {
        let mut covered = vec![false; self.pool.universe().len()];
        for e in genes.iter().filter_map(|&g| self.pool.get(g)) {
            for m in e.meaning.support() {
                covered[m] = true;
            }
        }
        covered
            .iter()
            .enumerate()
            .filter(|&(_, &c)| !c)
            .map(|(m, _)| m)
            .collect()
    }

    /// Append the cheapest covering expression for each uncovered referent.
    ///
    /// Deterministic. Referents the pool cannot cover stay uncovered, and
    /// the result may exceed the maximum size. Returns the number of
    /// expressions added.
    pub fn repair(&self, genes: &mut Vec<usize>) -> usize {
        let before = genes.len();
        for m in self.uncovered(genes) {
            let already = genes
                .iter()
                .filter_map(|&g| self.pool.get(g))
                .any(|e| e.meaning.covers(m));
            if already {
                continue;
            }
            if let Some(&cheapest) = self.pool.covering(m).first() {
                genes.push(cheapest);
            }
        }
        let added = genes.len() - before;
        if added > 0 {
            log::trace!("Repair added {added} expressions");
        }
        added
    }

    /// Bernoulli trial with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Uniform index below `n`.
    pub fn index(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n)
    }
}
