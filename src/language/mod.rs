//! Language module - Referents, meanings, expressions and languages.

mod error;
mod expression;
mod grammar;
mod lang;
mod semantics;

pub use error::*;
pub use expression::*;
pub use grammar::*;
pub use lang::*;
pub use semantics::*;
