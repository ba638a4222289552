//! Complexity measures.

use super::{ComplexityMeasure, literal_speaker};
use crate::language::Language;

/// Total description length of the language's expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptionLength;

impl ComplexityMeasure for DescriptionLength {
    fn name(&self) -> &str {
        "description_length"
    }

    fn complexity(&self, language: &Language) -> f64 {
        language.expressions().iter().map(|e| e.length as f64).sum()
    }
}

/// Encoder rate `I(M;W)` in bits under the literal speaker and the prior.
#[derive(Debug, Clone, Copy, Default)]
pub struct InformationRate;

impl ComplexityMeasure for InformationRate {
    fn name(&self) -> &str {
        "information_rate"
    }

    fn complexity(&self, language: &Language) -> f64 {
        let prior = language.universe().prior();
        let speaker = literal_speaker(language);

        let mut marginal = vec![0.0; speaker.cols()];
        for (m, &p) in prior.iter().enumerate() {
            for (w, &s) in speaker.row(m).iter().enumerate() {
                marginal[w] += p * s;
            }
        }

        let mut rate = 0.0;
        for (m, &p) in prior.iter().enumerate() {
            for (w, &s) in speaker.row(m).iter().enumerate() {
                if p > 0.0 && s > 0.0 {
                    rate += p * s * (s / marginal[w]).log2();
                }
            }
        }
        rate.max(0.0)
    }
}
