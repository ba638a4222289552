//! Schema module - Configuration, domain and report types.

mod config;
mod domain;
mod report;

pub use config::*;
pub use domain::*;
pub use report::*;
