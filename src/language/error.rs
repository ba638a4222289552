//! Domain validation errors.

/// Raised when a universe, meaning, expression or language violates its
/// construction invariants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MalformedDomainError {
    #[error("Universe must contain at least one referent")]
    EmptyUniverse,
    #[error("Duplicate referent name: {0}")]
    DuplicateReferent(String),
    #[error("Prior has {got} entries but the universe has {expected} referents")]
    PriorLength { expected: usize, got: usize },
    #[error("Invalid probability {value} for referent {referent}")]
    InvalidProbability { referent: String, value: f64 },
    #[error("Prior probabilities sum to {sum}, expected 1")]
    PriorNotNormalized { sum: f64 },
    #[error("Unknown referent: {0}")]
    UnknownReferent(String),
    #[error("Referent index {index} out of range for universe of size {size}")]
    ReferentOutOfRange { index: usize, size: usize },
    #[error("Meaning probabilities sum to {sum}, expected 1")]
    MeaningNotNormalized { sum: f64 },
    #[error("Meaning must assign non-zero probability to at least one referent")]
    EmptyMeaning,
    #[error("Expression {form:?} has an undefined meaning")]
    UndefinedMeaning { form: String },
    #[error("Duplicate form {0:?} in a language without homonymy")]
    DuplicateForm(String),
    #[error("Expression pool is empty")]
    EmptyPool,
}
