//! Multi-objective evolutionary search for the efficient frontier.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::ThreadPoolBuildError;

use crate::compute::measures::{Measures, Scores};
use crate::language::{ExpressionPool, Language, MalformedDomainError};
use crate::schema::{
    ConfigError, GenerationStats, OptimizationProgress, OptimizationResult, OptimizationStats,
    OptimizerConfig, RepairPolicy, RunConfig, StopReason,
};

use super::evaluator::{EvaluationError, ParallelEvaluator};
use super::frontier::{EvaluationResult, ParetoFrontier};
use super::ranking::rank;
use super::sampler::{LanguageSampler, Mutation};

/// Attempts per offspring slot under [`RepairPolicy::Reject`].
const MAX_RESAMPLE: usize = 8;

/// A member of the population.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Unique identifier.
    pub id: u64,
    /// Pool indices, in language order.
    pub genes: Vec<usize>,
    /// Interned language built from the genes.
    pub language: Arc<Language>,
    /// Scores once evaluated.
    pub scores: Option<Scores>,
    /// Generation created.
    pub generation: usize,
    /// Parent IDs.
    pub parents: Vec<u64>,
    /// Mutation applied after recombination, if any.
    pub mutation: Option<Mutation>,
}

/// Every candidate of a generation was excluded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Population collapsed in generation {generation}: all {excluded} candidates were excluded")]
pub struct PopulationCollapseError {
    pub generation: usize,
    pub excluded: usize,
}

/// Errors that stop an optimization run.
#[derive(Debug, thiserror::Error)]
pub enum OptimizeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Domain(#[from] MalformedDomainError),
    #[error(transparent)]
    Collapse(#[from] PopulationCollapseError),
    #[error("Failed to build evaluation pool: {0}")]
    ThreadPool(#[from] ThreadPoolBuildError),
}

/// Evolutionary optimizer approximating the complexity/informativity frontier.
pub struct Optimizer {
    config: OptimizerConfig,
    seed: u64,
    sampler: LanguageSampler,
    evaluator: ParallelEvaluator,
    /// Languages keyed by sorted pool indices, shared by every candidate
    /// with the same expression set.
    arena: HashMap<Vec<usize>, Arc<Language>>,
    population: Vec<Candidate>,
    frontier: ParetoFrontier,
    history: Vec<GenerationStats>,
    generation: usize,
    unchanged: usize,
    computed: u64,
    next_id: u64,
    cancelled: Arc<AtomicBool>,
}

impl Optimizer {
    /// Create an optimizer over `pool`. The config's `allow_incomplete`
    /// policy overrides the one carried by `measures`.
    pub fn new(config: OptimizerConfig, pool: Arc<ExpressionPool>, measures: Measures) -> Result<Self, OptimizeError> {
        config.validate()?;
        let measures = measures.with_allow_incomplete(config.allow_incomplete);
        measures.check_domain(pool.universe())?;

        if !config.allow_incomplete && !pool.covers_universe() {
            let missing: Vec<&str> = (0..pool.universe().len())
                .filter(|&m| pool.covering(m).is_empty())
                .filter_map(|m| pool.universe().referent(m))
                .map(|r| r.name.as_str())
                .collect();
            log::warn!(
                "Expression pool cannot express {}; every language will be incomplete",
                missing.join(", ")
            );
        }

        let seed = config.random_seed.unwrap_or_else(rand::random);
        let sampler = LanguageSampler::new(pool, config.language_size, seed);
        let evaluator = ParallelEvaluator::new(Arc::new(measures), config.worker_count)?;

        Ok(Self {
            config,
            seed,
            sampler,
            evaluator,
            arena: HashMap::new(),
            population: Vec::new(),
            frontier: ParetoFrontier::new(),
            history: Vec::new(),
            generation: 0,
            unchanged: 0,
            computed: 0,
            next_id: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Build the domain and measures described by a run config.
    pub fn from_run_config(run: &RunConfig) -> Result<Self, OptimizeError> {
        let pool = Arc::new(run.domain.build()?);
        Self::new(run.optimizer.clone(), pool, Measures::from_config(&run.measures))
    }

    /// Get cancellation handle. Checked between generations and cleared
    /// when the run it stopped returns.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Seed in use, including one drawn from entropy.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn frontier(&self) -> &ParetoFrontier {
        &self.frontier
    }

    pub fn population(&self) -> &[Candidate] {
        &self.population
    }

    pub fn history(&self) -> &[GenerationStats] {
        &self.history
    }

    fn intern(&mut self, genes: &[usize]) -> Arc<Language> {
        let mut key = genes.to_vec();
        key.sort_unstable();
        let pool = self.sampler.pool();
        let language = self
            .arena
            .entry(key)
            .or_insert_with(|| Arc::new(pool.language(genes)));
        Arc::clone(language)
    }

    fn new_candidate(&mut self, genes: Vec<usize>, parents: Vec<u64>, mutation: Option<Mutation>) -> Candidate {
        let language = self.intern(&genes);
        let id = self.next_id;
        self.next_id += 1;
        Candidate {
            id,
            genes,
            language,
            scores: None,
            generation: self.generation,
            parents,
            mutation,
        }
    }

    /// Whether offspring must cover every referent to be evaluated.
    fn requires_complete(&self) -> bool {
        !self.config.allow_incomplete
    }

    /// Build the generation-0 population.
    pub fn initialize(&mut self) {
        self.population.clear();
        self.frontier = ParetoFrontier::new();
        self.history.clear();
        self.arena.clear();
        self.generation = 0;
        self.unchanged = 0;
        self.computed = 0;

        for _ in 0..self.config.population_size {
            let mut genes = self.sampler.random_genes();
            if self.requires_complete() {
                match self.config.repair {
                    RepairPolicy::Repair => {
                        self.sampler.repair(&mut genes);
                    }
                    RepairPolicy::Reject => {
                        let mut attempts = 1;
                        while attempts < MAX_RESAMPLE && !self.sampler.is_complete(&genes) {
                            genes = self.sampler.random_genes();
                            attempts += 1;
                        }
                    }
                }
            }
            let candidate = self.new_candidate(genes, Vec::new(), None);
            self.population.push(candidate);
        }
    }

    /// Evaluate unscored candidates, drop excluded ones and update the frontier.
    fn evaluate_population(&mut self) -> Result<GenerationStats, PopulationCollapseError> {
        let pending: Vec<usize> = (0..self.population.len())
            .filter(|&i| self.population[i].scores.is_none())
            .collect();
        let batch: Vec<Arc<Language>> = pending
            .iter()
            .map(|&i| Arc::clone(&self.population[i].language))
            .collect();
        let outcomes = self.evaluator.evaluate_batch(&batch);

        let mut stats = GenerationStats {
            generation: self.generation,
            ..Default::default()
        };
        let mut keep = vec![true; self.population.len()];

        for (&i, outcome) in pending.iter().zip(outcomes) {
            if outcome.cached {
                stats.cache_hits += 1;
            } else {
                self.computed += 1;
            }
            let candidate = &mut self.population[i];
            match outcome.result {
                Ok(result) => {
                    candidate.scores = Some(result.scores);
                    if self.frontier.insert(result).is_added() {
                        stats.frontier_insertions += 1;
                    }
                }
                Err(EvaluationError::Incomplete(err)) => {
                    log::trace!("Excluding candidate {}: {err}", candidate.id);
                    stats.excluded_incomplete += 1;
                    keep[i] = false;
                }
                Err(err) => {
                    log::warn!("Evaluation of candidate {} failed: {err}", candidate.id);
                    stats.failed += 1;
                    keep[i] = false;
                }
            }
        }

        let mut keep = keep.into_iter();
        self.population.retain(|_| keep.next().unwrap_or(false));
        stats.evaluated = self.population.len();
        stats.frontier_size = self.frontier.len();

        if stats.excluded() > 0 {
            log::warn!(
                "Generation {}: excluded {} incomplete and {} failed candidates",
                self.generation,
                stats.excluded_incomplete,
                stats.failed
            );
        }

        if self.population.is_empty() {
            log::warn!("Population collapsed in generation {}", self.generation);
            return Err(PopulationCollapseError {
                generation: self.generation,
                excluded: stats.excluded(),
            });
        }

        if self.generation > 0 {
            if stats.frontier_insertions == 0 {
                self.unchanged += 1;
            } else {
                self.unchanged = 0;
            }
        }

        log::debug!(
            "Generation {}: {} valid, {} cached, frontier {} (+{})",
            self.generation,
            stats.evaluated,
            stats.cache_hits,
            stats.frontier_size,
            stats.frontier_insertions
        );
        self.history.push(stats.clone());
        Ok(stats)
    }

    /// Keep the best `k` candidates by non-dominated rank and crowding.
    /// Survivors are returned best first.
    fn select(&self) -> Vec<Candidate> {
        let scored: Vec<(&Candidate, Scores)> = self
            .population
            .iter()
            .filter_map(|c| c.scores.map(|s| (c, s)))
            .collect();
        let scores: Vec<Scores> = scored.iter().map(|&(_, s)| s).collect();
        let k = self.config.survivor_count().min(scored.len());

        rank(&scores)
            .into_iter()
            .take(k)
            .map(|r| scored[r.index].0.clone())
            .collect()
    }

    /// Binary tournament over survivors sorted best first.
    fn tournament(&mut self, size: usize) -> usize {
        let a = self.sampler.index(size);
        let b = self.sampler.index(size);
        a.min(b)
    }

    fn offspring(&mut self, survivors: &[Candidate]) -> Candidate {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let first = &survivors[self.tournament(survivors.len())];
            let mut genes = first.genes.clone();
            let mut parents = vec![first.id];

            if self.sampler.chance(self.config.crossover_rate) {
                let second = &survivors[self.tournament(survivors.len())];
                genes = self.sampler.crossover(&genes, &second.genes);
                parents.push(second.id);
            }

            let mut mutation = None;
            if self.sampler.chance(self.config.mutation_rate)
                && let Some(m) = self.sampler.random_mutation(&genes)
            {
                genes = m.apply(&genes);
                mutation = Some(m);
            }

            if self.requires_complete() && !self.sampler.is_complete(&genes) {
                match self.config.repair {
                    RepairPolicy::Repair => {
                        self.sampler.repair(&mut genes);
                    }
                    RepairPolicy::Reject if attempts < MAX_RESAMPLE => continue,
                    RepairPolicy::Reject => {}
                }
            }

            return self.new_candidate(genes, parents, mutation);
        }
    }

    /// Select survivors and fill the next generation with offspring.
    fn step_generation(&mut self) {
        let survivors = self.select();
        self.generation += 1;

        let mut next_gen = survivors.clone();
        while next_gen.len() < self.config.population_size {
            let child = self.offspring(&survivors);
            next_gen.push(child);
        }
        self.population = next_gen;

        // Drop languages held by neither the population nor the frontier.
        self.arena.retain(|_, language| Arc::strong_count(language) > 1);
    }

    /// Get current progress.
    pub fn progress(&self) -> OptimizationProgress {
        OptimizationProgress {
            generation: self.generation,
            total_generations: self.config.generations,
            stats: self.history.last().cloned().unwrap_or_default(),
            unchanged_generations: self.unchanged,
            frontier: self.frontier.points(),
        }
    }

    /// Check if the run should stop after the current generation.
    fn should_stop(&self, start: Instant) -> Option<StopReason> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Some(StopReason::Cancelled);
        }

        if self.history.len() >= self.config.generations {
            return Some(StopReason::GenerationBudget);
        }

        if self.config.convergence_patience > 0 && self.unchanged >= self.config.convergence_patience {
            return Some(StopReason::Converged);
        }

        if let Some(budget) = self.config.time_budget_secs
            && start.elapsed().as_secs_f64() >= budget
        {
            return Some(StopReason::TimeBudget);
        }

        None
    }

    fn generation_loop<F>(&mut self, start: Instant, callback: &F) -> Result<StopReason, OptimizeError>
    where
        F: Fn(&OptimizationProgress),
    {
        loop {
            self.evaluate_population()?;
            callback(&self.progress());

            if let Some(reason) = self.should_stop(start) {
                return Ok(reason);
            }
            self.step_generation();
        }
    }

    /// Run the optimization with progress callback.
    pub fn run_with_callback<F>(&mut self, callback: F) -> Result<OptimizationResult, OptimizeError>
    where
        F: Fn(&OptimizationProgress),
    {
        let start = Instant::now();
        let measures = self.evaluator.measures();
        log::info!(
            "Starting optimization: population {}, {} generations, seed {}, {} workers, measures {}/{}",
            self.config.population_size,
            self.config.generations,
            self.seed,
            self.evaluator.worker_count(),
            measures.complexity_name(),
            measures.informativity_name()
        );

        self.initialize();

        let outcome = self.generation_loop(start, &callback);
        // A cancellation applies to one run only.
        self.cancelled.store(false, Ordering::Relaxed);
        let stop_reason = outcome?;

        let elapsed = start.elapsed().as_secs_f64();
        let cache_hits: u64 = self.history.iter().map(|s| s.cache_hits as u64).sum();
        let excluded_total: u64 = self.history.iter().map(|s| s.excluded() as u64).sum();

        log::info!(
            "Optimization stopped after {} generations ({:?}): {} frontier points",
            self.history.len(),
            stop_reason,
            self.frontier.len()
        );

        Ok(OptimizationResult {
            frontier: self.frontier.points(),
            history: self.history.clone(),
            stats: OptimizationStats {
                generations: self.history.len(),
                total_evaluations: self.computed,
                cache_hits,
                excluded_total,
                seed: self.seed,
                elapsed_seconds: elapsed,
                evaluations_per_second: if elapsed > 0.0 {
                    self.computed as f64 / elapsed
                } else {
                    0.0
                },
                stop_reason,
            },
        })
    }

    /// Run the optimization (blocking).
    pub fn run(&mut self) -> Result<OptimizationResult, OptimizeError> {
        self.run_with_callback(|_| {})
    }

    /// Evaluate an arbitrary language with this run's measures, e.g. a
    /// natural language to compare against the frontier.
    pub fn evaluate(&self, language: &Language) -> Result<EvaluationResult, EvaluationError> {
        let scores = self.evaluator.measures().evaluate(language)?;
        Ok(EvaluationResult::new(Arc::new(language.clone()), scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{Expression, Meaning, Universe};
    use crate::schema::{DomainSpec, FrontierPoint};
    use std::sync::Mutex;

    fn abc_pool(referents: &[&str]) -> Arc<ExpressionPool> {
        let u = Arc::new(Universe::from_names(["a", "b", "c"]).unwrap());
        let expressions = referents
            .iter()
            .map(|&r| Expression::new(r, Meaning::point(&u, r).unwrap()))
            .collect();
        Arc::new(ExpressionPool::new(u, expressions, false).unwrap())
    }

    fn colour_pool() -> Arc<ExpressionPool> {
        Arc::new(DomainSpec::example().build().unwrap())
    }

    fn config(population_size: usize, generations: usize) -> OptimizerConfig {
        OptimizerConfig {
            population_size,
            generations,
            random_seed: Some(42),
            worker_count: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_one_to_one_domain_has_single_optimum() {
        let mut optimizer = Optimizer::new(config(10, 5), abc_pool(&["a", "b", "c"]), Measures::default()).unwrap();
        let result = optimizer.run().unwrap();

        assert_eq!(result.frontier.len(), 1);
        let point = &result.frontier[0];
        assert_eq!(point.complexity, 3.0);
        assert!((point.informativity - 1.0).abs() < 1e-12);
        assert_eq!(result.stats.generations, 5);
        assert_eq!(result.stats.stop_reason, StopReason::GenerationBudget);
    }

    #[test]
    fn test_inexpressible_pool_collapses() {
        let mut optimizer = Optimizer::new(config(10, 5), abc_pool(&["a", "b"]), Measures::default()).unwrap();
        match optimizer.run() {
            Err(OptimizeError::Collapse(err)) => {
                assert_eq!(err.generation, 0);
                assert_eq!(err.excluded, 10);
            }
            other => panic!("expected collapse, got {other:?}"),
        }
    }

    #[test]
    fn test_no_variation_keeps_initial_frontier() {
        let config = OptimizerConfig {
            mutation_rate: 0.0,
            crossover_rate: 0.0,
            ..config(10, 5)
        };
        let mut optimizer = Optimizer::new(config, colour_pool(), Measures::default()).unwrap();

        let initial: Mutex<Option<Vec<FrontierPoint>>> = Mutex::new(None);
        let result = optimizer
            .run_with_callback(|progress| {
                let mut slot = initial.lock().unwrap();
                if progress.generation == 0 {
                    *slot = Some(progress.frontier.clone());
                }
            })
            .unwrap();

        assert_eq!(Some(result.frontier), initial.into_inner().unwrap());
        assert!(result.history[1..].iter().all(|s| s.frontier_insertions == 0));
    }

    #[test]
    fn test_same_seed_same_frontier() {
        let run = || {
            let mut optimizer = Optimizer::new(config(20, 10), colour_pool(), Measures::default()).unwrap();
            optimizer.run().unwrap()
        };
        let first = run();
        let second = run();
        assert_eq!(first.frontier, second.frontier);
        assert_eq!(first.history, second.history);
        assert_eq!(first.stats.seed, 42);
    }

    #[test]
    fn test_frontier_is_sorted_and_non_dominated() {
        let mut optimizer = Optimizer::new(config(30, 15), colour_pool(), Measures::default()).unwrap();
        let result = optimizer.run().unwrap();

        assert!(!result.frontier.is_empty());
        for pair in result.frontier.windows(2) {
            assert!(pair[0].complexity < pair[1].complexity);
            assert!(pair[0].informativity < pair[1].informativity);
        }
        assert!(optimizer.frontier().members().iter().all(|m| m.language.is_expressible()));
    }

    #[test]
    fn test_mutation_round_trip_preserves_scores() {
        let pool = colour_pool();
        let measures = Measures::default().with_allow_incomplete(true);
        let mut sampler = LanguageSampler::new(Arc::clone(&pool), Default::default(), 7);

        for _ in 0..50 {
            let genes = sampler.random_genes();
            let Some(mutation) = sampler.random_mutation(&genes) else {
                continue;
            };
            let mutated = mutation.apply(&genes);
            let restored = mutation.inverse(&genes).unwrap().apply(&mutated);

            let before = measures.evaluate(&pool.language(&genes)).unwrap();
            let after = measures.evaluate(&pool.language(&restored)).unwrap();
            assert_eq!(before.complexity.to_bits(), after.complexity.to_bits());
            assert_eq!(before.informativity.to_bits(), after.informativity.to_bits());
        }
    }

    #[test]
    fn test_convergence_patience() {
        let config = OptimizerConfig {
            mutation_rate: 0.0,
            crossover_rate: 0.0,
            convergence_patience: 2,
            ..config(10, 1000)
        };
        let mut optimizer = Optimizer::new(config, colour_pool(), Measures::default()).unwrap();
        let result = optimizer.run().unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::Converged);
        assert_eq!(result.stats.generations, 3);
    }

    #[test]
    fn test_cancellation() {
        let mut optimizer = Optimizer::new(config(10, 100), colour_pool(), Measures::default()).unwrap();
        let cancel = optimizer.cancel_handle();
        cancel.store(true, Ordering::Relaxed);

        let result = optimizer.run().unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::Cancelled);
        assert_eq!(result.stats.generations, 1);
    }

    #[test]
    fn test_cancellation_does_not_outlive_its_run() {
        let mut optimizer = Optimizer::new(config(10, 3), colour_pool(), Measures::default()).unwrap();
        let cancel = optimizer.cancel_handle();
        cancel.store(true, Ordering::Relaxed);
        assert_eq!(optimizer.run().unwrap().stats.stop_reason, StopReason::Cancelled);
        assert!(!cancel.load(Ordering::Relaxed));

        let result = optimizer.run().unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::GenerationBudget);
        assert_eq!(result.stats.generations, 3);
    }

    #[test]
    fn test_time_budget_stops_run() {
        let config = OptimizerConfig {
            time_budget_secs: Some(1e-9),
            ..config(10, 100)
        };
        let mut optimizer = Optimizer::new(config, colour_pool(), Measures::default()).unwrap();
        let result = optimizer.run().unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::TimeBudget);
        assert_eq!(result.stats.generations, 1);
    }

    #[test]
    fn test_incomplete_languages_allowed() {
        let config = OptimizerConfig {
            allow_incomplete: true,
            ..config(10, 5)
        };
        // Strict measures; the config policy wins.
        let mut optimizer = Optimizer::new(config, abc_pool(&["a", "b"]), Measures::default()).unwrap();
        let result = optimizer.run().unwrap();

        assert_eq!(result.stats.stop_reason, StopReason::GenerationBudget);
        assert_eq!(result.stats.excluded_total, 0);
        assert!(!result.frontier.is_empty());
        assert!(optimizer.frontier().members().iter().all(|m| !m.language.is_expressible()));
        for point in &result.frontier {
            assert!(point.complexity >= 1.0 && point.complexity <= 2.0);
            assert!(point.informativity > 0.0 && point.informativity < 1.0);
        }
    }

    #[test]
    fn test_config_policy_overrides_lenient_measures() {
        let lenient = Measures::default().with_allow_incomplete(true);
        let mut optimizer = Optimizer::new(config(10, 5), abc_pool(&["a", "b"]), lenient).unwrap();
        assert!(matches!(optimizer.run(), Err(OptimizeError::Collapse(_))));
    }

    #[test]
    fn test_reject_policy_runs() {
        let config = OptimizerConfig {
            repair: RepairPolicy::Reject,
            ..config(20, 5)
        };
        let mut optimizer = Optimizer::new(config, colour_pool(), Measures::default()).unwrap();
        let result = optimizer.run().unwrap();
        assert!(!result.frontier.is_empty());
        assert!(optimizer.population().iter().all(|c| c.language.is_expressible()));
    }

    #[test]
    fn test_cache_hits_and_arena_sweep() {
        let config = OptimizerConfig {
            mutation_rate: 0.0,
            crossover_rate: 0.0,
            ..config(10, 3)
        };
        let mut optimizer = Optimizer::new(config, colour_pool(), Measures::default()).unwrap();
        let result = optimizer.run().unwrap();

        // Offspring are clones of survivors, so every later evaluation is cached.
        assert!(result.history[1..].iter().all(|s| s.cache_hits == 5));
        assert!(optimizer.arena.len() <= optimizer.population.len() + optimizer.frontier.len());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = OptimizerConfig {
            population_size: 0,
            ..config(10, 3)
        };
        assert!(matches!(
            Optimizer::new(config, colour_pool(), Measures::default()),
            Err(OptimizeError::Config(ConfigError::EmptyPopulation))
        ));
    }

    #[test]
    fn test_evaluate_natural_language_against_frontier() {
        let pool = colour_pool();
        let mut optimizer = Optimizer::new(config(30, 10), Arc::clone(&pool), Measures::default()).unwrap();
        optimizer.run().unwrap();

        // warm, cool, grue
        let natural = pool.language(&[6, 7, 8]);
        let result = optimizer.evaluate(&natural).unwrap();
        assert_eq!(result.scores.complexity, 3.0);
        assert!((result.scores.informativity - 13.0 / 36.0).abs() < 1e-12);

        let distance = optimizer.frontier().min_distance(&result.scores).unwrap();
        let on_frontier = optimizer.frontier().scores().any(|s| s == result.scores);
        assert!(on_frontier || distance > 0.0);
    }
}
