//! Batch evaluation on a fixed-size worker pool.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

use super::EvaluationResult;
use crate::compute::measures::{IncompleteLanguageError, Measures};
use crate::language::Language;

/// Per-language evaluation failure. Never aborts the rest of a batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Incomplete(#[from] IncompleteLanguageError),
    #[error("Measures returned non-finite scores ({complexity}, {informativity})")]
    NonFinite { complexity: f64, informativity: f64 },
    #[error("Measure panicked: {0}")]
    Panicked(String),
}

/// Result for one language of a batch.
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub result: Result<EvaluationResult, EvaluationError>,
    /// Scores came from the language's cache.
    pub cached: bool,
}

/// Evaluates batches of languages in parallel.
///
/// Results are returned in input order whatever the scheduling.
pub struct ParallelEvaluator {
    pool: ThreadPool,
    measures: Arc<Measures>,
}

impl ParallelEvaluator {
    pub fn new(measures: Arc<Measures>, worker_count: usize) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .thread_name(|i| format!("effcomm-eval-{i}"))
            .build()?;
        Ok(Self { pool, measures })
    }

    pub fn measures(&self) -> &Arc<Measures> {
        &self.measures
    }

    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Evaluate every language and block until all are done.
    pub fn evaluate_batch(&self, batch: &[Arc<Language>]) -> Vec<EvaluationOutcome> {
        let measures = &self.measures;
        self.pool.install(|| {
            batch
                .par_iter()
                .map(|language| evaluate_language(measures, language))
                .collect()
        })
    }
}

fn evaluate_language(measures: &Measures, language: &Arc<Language>) -> EvaluationOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| measures.evaluate_cached(language))) {
        Ok(Ok((scores, cached))) if scores.is_finite() => EvaluationOutcome {
            result: Ok(EvaluationResult::new(Arc::clone(language), scores)),
            cached,
        },
        Ok(Ok((scores, cached))) => EvaluationOutcome {
            result: Err(EvaluationError::NonFinite {
                complexity: scores.complexity,
                informativity: scores.informativity,
            }),
            cached,
        },
        Ok(Err(err)) => EvaluationOutcome {
            result: Err(err.into()),
            cached: false,
        },
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            EvaluationOutcome {
                result: Err(EvaluationError::Panicked(message)),
                cached: false,
            }
        }
    }
}
