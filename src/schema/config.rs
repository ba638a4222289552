//! Optimization and measure configuration types.

use serde::{Deserialize, Serialize};

use super::DomainSpec;
use crate::compute::measures::{ListenerModel, Utility};

/// Settings for one optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Languages per generation.
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Evaluated generations, including the initial population.
    #[serde(default = "default_generations")]
    pub generations: usize,
    /// Probability of mutating an offspring.
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// Probability of recombining two parents.
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    /// Evaluate languages that leave referents uncovered.
    #[serde(default)]
    pub allow_incomplete: bool,
    /// Stop after this many generations without a frontier change (0 disables).
    #[serde(default)]
    pub convergence_patience: usize,
    /// Random seed for reproducibility. Drawn from entropy when absent.
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Threads in the evaluation pool.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Parents kept by selection. Defaults to half the population, rounded up.
    #[serde(default)]
    pub survivors: Option<usize>,
    /// Bounds on language size during sampling and mutation.
    #[serde(default)]
    pub language_size: SizeBounds,
    /// What to do with offspring that leave referents uncovered.
    #[serde(default)]
    pub repair: RepairPolicy,
    /// Wall-clock budget, checked between generations.
    #[serde(default)]
    pub time_budget_secs: Option<f64>,
}

fn default_population_size() -> usize {
    50
}
fn default_generations() -> usize {
    100
}
fn default_mutation_rate() -> f64 {
    0.3
}
fn default_crossover_rate() -> f64 {
    0.7
}
fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            generations: default_generations(),
            mutation_rate: default_mutation_rate(),
            crossover_rate: default_crossover_rate(),
            allow_incomplete: false,
            convergence_patience: 0,
            random_seed: None,
            worker_count: default_worker_count(),
            survivors: None,
            language_size: SizeBounds::default(),
            repair: RepairPolicy::default(),
            time_budget_secs: None,
        }
    }
}

impl OptimizerConfig {
    /// Number of parents kept by selection.
    pub fn survivor_count(&self) -> usize {
        self.survivors
            .unwrap_or(self.population_size.div_ceil(2))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        if self.generations == 0 {
            return Err(ConfigError::NoGenerations);
        }
        for (name, rate) in [
            ("mutation_rate", self.mutation_rate),
            ("crossover_rate", self.crossover_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::InvalidRate { name, value: rate });
            }
        }
        if self.worker_count == 0 {
            return Err(ConfigError::NoWorkers);
        }
        let survivors = self.survivor_count();
        if survivors == 0 || survivors > self.population_size {
            return Err(ConfigError::InvalidSurvivors {
                survivors,
                population: self.population_size,
            });
        }
        if let Some(max) = self.language_size.max
            && max < self.language_size.min
        {
            return Err(ConfigError::InvalidSizeBounds {
                min: self.language_size.min,
                max,
            });
        }
        if let Some(budget) = self.time_budget_secs
            && (!budget.is_finite() || budget <= 0.0)
        {
            return Err(ConfigError::InvalidTimeBudget(budget));
        }
        Ok(())
    }
}

/// Inclusive bounds on the number of expressions in a language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeBounds {
    #[serde(default = "default_min_size")]
    pub min: usize,
    /// Defaults to the pool size.
    #[serde(default)]
    pub max: Option<usize>,
}

fn default_min_size() -> usize {
    1
}

impl Default for SizeBounds {
    fn default() -> Self {
        Self {
            min: default_min_size(),
            max: None,
        }
    }
}

/// Handling of offspring that leave referents uncovered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairPolicy {
    /// Add the cheapest covering expression for each uncovered referent.
    #[default]
    Repair,
    /// Discard and resample, a bounded number of times.
    Reject,
}

/// Reference complexity measures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityKind {
    #[default]
    DescriptionLength,
    InformationRate,
}

/// Reference informativity measures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InformativityKind {
    CommunicativeSuccess {
        #[serde(default)]
        listener: ListenerModel,
        #[serde(default)]
        utility: Utility,
    },
    MutualInformation {
        #[serde(default)]
        listener: ListenerModel,
    },
}

impl Default for InformativityKind {
    fn default() -> Self {
        Self::CommunicativeSuccess {
            listener: ListenerModel::Literal,
            utility: Utility::Indicator,
        }
    }
}

/// Which reference measures to use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasureConfig {
    #[serde(default)]
    pub complexity: ComplexityKind,
    #[serde(default)]
    pub informativity: InformativityKind,
}

/// A complete run described as data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub domain: DomainSpec,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub measures: MeasureConfig,
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be non-zero")]
    EmptyPopulation,
    #[error("Generation count must be non-zero")]
    NoGenerations,
    #[error("{name} must lie in [0, 1], got {value}")]
    InvalidRate { name: &'static str, value: f64 },
    #[error("Worker count must be non-zero")]
    NoWorkers,
    #[error("Survivor count {survivors} must be between 1 and the population size {population}")]
    InvalidSurvivors { survivors: usize, population: usize },
    #[error("Language size bounds are inverted: min {min} > max {max}")]
    InvalidSizeBounds { min: usize, max: usize },
    #[error("Time budget must be positive, got {0}")]
    InvalidTimeBudget(f64),
    #[error("Utility matrix must have {expected} rows, got {got}")]
    UtilityShape { expected: usize, got: usize },
    #[error("Utility matrix row {row} must have {expected} entries, got {got}")]
    UtilityRowShape { row: usize, expected: usize, got: usize },
    #[error("Utility matrix row {row} contains a non-finite value")]
    NonFiniteUtility { row: usize },
}
