//! Evolutionary search for the efficient-communication frontier.
//!
//! # Overview
//!
//! The search system consists of:
//!
//! - **Sampler** (`sampler`): random languages, mutation, crossover and repair
//! - **Ranking** (`ranking`): non-dominated sorting with crowding distance
//! - **Frontier** (`frontier`): the non-dominated set found so far
//! - **Evaluator** (`evaluator`): batch evaluation on a worker pool
//! - **Search** (`search`): the generation loop tying them together
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use effcomm::compute::Measures;
//! use effcomm::compute::evolution::Optimizer;
//! use effcomm::schema::{DomainSpec, OptimizerConfig};
//!
//! let pool = Arc::new(DomainSpec::example().build().unwrap());
//! let mut optimizer = Optimizer::new(OptimizerConfig::default(), pool, Measures::default()).unwrap();
//! let result = optimizer
//!     .run_with_callback(|progress| {
//!         println!("Generation {}: {} frontier points", progress.generation, progress.frontier.len());
//!     })
//!     .unwrap();
//!
//! for point in &result.frontier {
//!     println!("{:.2} {:.3} {:?}", point.complexity, point.informativity, point.forms);
//! }
//! ```

mod evaluator;
mod frontier;
mod ranking;
mod sampler;
mod search;

pub use evaluator::{EvaluationError, EvaluationOutcome, ParallelEvaluator};
pub use frontier::{EvaluationResult, Insertion, ParetoFrontier};
pub use ranking::{RankedIndex, crowded_cmp, crowding_distances, non_dominated_sort, rank};
pub use sampler::{LanguageSampler, Mutation};
pub use search::{Candidate, OptimizeError, Optimizer, PopulationCollapseError};
