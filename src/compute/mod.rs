//! Compute module - Measures and search.

pub mod evolution;
pub mod measures;

pub use measures::{
    ComplexityMeasure, IncompleteLanguageError, InformativityMeasure, Measures, Scores,
};
