//! Efficient communication - Pareto frontiers of simplicity and informativeness.
//!
//! This crate models candidate languages over a universe of referents,
//! scores each language by complexity (cost) and informativity (benefit),
//! and searches the space of languages for the Pareto-optimal trade-off
//! between the two. Natural languages can then be placed against the
//! optimal frontier.
//!
//! # Architecture
//!
//! The crate is split into three modules:
//!
//! - `language`: Referents, meanings, expressions, languages and grammars
//! - `compute`: Measures and the evolutionary frontier search
//! - `schema`: Configuration, domain ingestion and report types
//!
//! # Example
//!
//! ```rust,no_run
//! use effcomm::{Optimizer, schema::RunConfig};
//!
//! let json = std::fs::read_to_string("run.json").unwrap();
//! let run: RunConfig = serde_json::from_str(&json).unwrap();
//!
//! let mut optimizer = Optimizer::from_run_config(&run).unwrap();
//! let result = optimizer.run().unwrap();
//!
//! for point in &result.frontier {
//!     println!("{:.2}\t{:.3}", point.complexity, point.informativity);
//! }
//! ```

pub mod compute;
pub mod language;
pub mod schema;

// Re-export commonly used types
pub use compute::Measures;
pub use compute::evolution::{OptimizeError, Optimizer, ParetoFrontier};
pub use language::{Expression, ExpressionPool, Language, Meaning, Referent, Universe};
pub use schema::{OptimizationResult, OptimizerConfig, RunConfig};
