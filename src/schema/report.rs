//! Progress and result types produced by the optimizer.

use serde::{Deserialize, Serialize};

/// One point of an exported frontier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierPoint {
    pub complexity: f64,
    pub informativity: f64,
    /// Forms of the language that produced the point, in language order.
    pub forms: Vec<String>,
}

/// Bookkeeping for one evaluated generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Generation number, 0 for the initial population.
    pub generation: usize,
    /// Candidates with valid scores.
    pub evaluated: usize,
    /// Scores served from a language's cache.
    pub cache_hits: usize,
    /// Candidates excluded because they leave referents uncovered.
    pub excluded_incomplete: usize,
    /// Candidates whose evaluation failed for another reason.
    pub failed: usize,
    /// Frontier size after this generation.
    pub frontier_size: usize,
    /// Successful frontier insertions in this generation.
    pub frontier_insertions: usize,
}

impl GenerationStats {
    /// Candidates dropped from the generation for any reason.
    pub fn excluded(&self) -> usize {
        self.excluded_incomplete + self.failed
    }
}

/// Progress report passed to the callback after each generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationProgress {
    /// Generation just evaluated.
    pub generation: usize,
    /// Generation budget.
    pub total_generations: usize,
    /// Statistics of the generation just evaluated.
    pub stats: GenerationStats,
    /// Generations since the frontier last changed.
    pub unchanged_generations: usize,
    /// Frontier snapshot.
    pub frontier: Vec<FrontierPoint>,
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every budgeted generation was evaluated.
    GenerationBudget,
    /// The frontier stopped changing for the configured patience.
    Converged,
    /// The wall-clock budget ran out.
    TimeBudget,
    /// The cancel handle was set.
    Cancelled,
}

/// Totals for a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationStats {
    /// Generations evaluated.
    pub generations: usize,
    /// Scores computed, excluding cache hits.
    pub total_evaluations: u64,
    pub cache_hits: u64,
    /// Candidates excluded over the whole run.
    pub excluded_total: u64,
    /// Seed that reproduces the run.
    pub seed: u64,
    pub elapsed_seconds: f64,
    pub evaluations_per_second: f64,
    pub stop_reason: StopReason,
}

/// Output of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Final frontier, by ascending complexity.
    pub frontier: Vec<FrontierPoint>,
    /// Per-generation statistics.
    pub history: Vec<GenerationStats>,
    pub stats: OptimizationStats,
}
