//! Pareto frontier tracking.

use std::sync::Arc;

use crate::compute::measures::Scores;
use crate::language::Language;
use crate::schema::FrontierPoint;

/// A language together with its measured scores.
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub language: Arc<Language>,
    pub scores: Scores,
}

impl EvaluationResult {
    pub fn new(language: Arc<Language>, scores: Scores) -> Self {
        Self { language, scores }
    }

    pub fn to_point(&self) -> FrontierPoint {
        FrontierPoint {
            complexity: self.scores.complexity,
            informativity: self.scores.informativity,
            forms: self.language.forms().map(str::to_string).collect(),
        }
    }
}

/// Outcome of [`ParetoFrontier::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// Added, removing `displaced` members it dominates.
    Added { displaced: usize },
    /// An existing member dominates the candidate.
    Dominated,
    /// A member with identical scores was inserted earlier and is kept.
    Duplicate,
}

impl Insertion {
    pub fn is_added(&self) -> bool {
        matches!(self, Insertion::Added { .. })
    }
}

/// Non-dominated set of evaluation results, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ParetoFrontier {
    members: Vec<EvaluationResult>,
}

impl ParetoFrontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a result and prune the members it dominates.
    pub fn insert(&mut self, result: EvaluationResult) -> Insertion {
        if self.members.iter().any(|m| m.scores == result.scores) {
            return Insertion::Duplicate;
        }
        if self.dominates(&result.scores) {
            return Insertion::Dominated;
        }

        let before = self.members.len();
        self.members.retain(|m| !result.scores.dominates(&m.scores));
        let displaced = before - self.members.len();
        self.members.push(result);
        Insertion::Added { displaced }
    }

    pub fn members(&self) -> &[EvaluationResult] {
        &self.members
    }

    pub fn scores(&self) -> impl Iterator<Item = Scores> + '_ {
        self.members.iter().map(|m| m.scores)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether some member dominates `scores`.
    pub fn dominates(&self, scores: &Scores) -> bool {
        self.members.iter().any(|m| m.scores.dominates(scores))
    }

    /// Euclidean distance from `scores` to the nearest member.
    pub fn min_distance(&self, scores: &Scores) -> Option<f64> {
        self.members
            .iter()
            .map(|m| {
                let dc = m.scores.complexity - scores.complexity;
                let di = m.scores.informativity - scores.informativity;
                dc.hypot(di)
            })
            .min_by(f64::total_cmp)
    }

    /// Snapshot sorted by ascending complexity, then descending informativity.
    pub fn points(&self) -> Vec<FrontierPoint> {
        let mut points: Vec<FrontierPoint> = self.members.iter().map(EvaluationResult::to_point).collect();
        points.sort_by(|a, b| {
            a.complexity
                .total_cmp(&b.complexity)
                .then_with(|| b.informativity.total_cmp(&a.informativity))
        });
        points
    }
}
