//! Serializable description of a domain: referents, prior and expression pool.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::language::{Expression, ExpressionPool, MalformedDomainError, Meaning, Referent, Universe};

/// A universe and the expressions available to describe it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainSpec {
    pub referents: Vec<Referent>,
    /// Prior keyed by referent name. Uniform when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior: Option<BTreeMap<String, f64>>,
    pub expressions: Vec<ExpressionSpec>,
    #[serde(default)]
    pub allow_homonymy: bool,
}

/// One pool expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionSpec {
    pub form: String,
    pub meaning: MeaningSpec,
    #[serde(default = "default_length")]
    pub length: usize,
}

fn default_length() -> usize {
    1
}

/// Meaning of an expression, by referent name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeaningSpec {
    /// A single referent.
    Point { referent: String },
    /// Uniform over several referents.
    Uniform { referents: Vec<String> },
    /// Explicit probabilities; must sum to one.
    Distribution { probabilities: BTreeMap<String, f64> },
}

impl MeaningSpec {
    pub fn build(&self, universe: &Universe) -> Result<Meaning, MalformedDomainError> {
        match self {
            MeaningSpec::Point { referent } => Meaning::point(universe, referent),
            MeaningSpec::Uniform { referents } => Meaning::uniform(universe, referents.iter().map(String::as_str)),
            MeaningSpec::Distribution { probabilities } => {
                Meaning::distribution(universe, probabilities.iter().map(|(name, &p)| (name.as_str(), p)))
            }
        }
    }
}

impl DomainSpec {
    pub fn universe(&self) -> Result<Universe, MalformedDomainError> {
        match &self.prior {
            Some(prior) => Universe::with_named_prior(self.referents.clone(), prior),
            None => Universe::uniform(self.referents.clone()),
        }
    }

    /// Validate everything and build the expression pool.
    pub fn build(&self) -> Result<ExpressionPool, MalformedDomainError> {
        let universe = Arc::new(self.universe()?);
        let expressions = self
            .expressions
            .iter()
            .map(|spec| {
                spec.meaning
                    .build(&universe)
                    .map(|meaning| Expression::new(spec.form.clone(), meaning).with_length(spec.length))
            })
            .collect::<Result<Vec<_>, _>>()?;
        ExpressionPool::new(universe, expressions, self.allow_homonymy)
    }

    /// Small colour-term domain used by `--example` and the tests.
    pub fn example() -> Self {
        let names = ["red", "orange", "yellow", "green", "blue", "purple"];
        let point = |r: &str| ExpressionSpec {
            form: r.to_string(),
            meaning: MeaningSpec::Point {
                referent: r.to_string(),
            },
            length: 1,
        };
        let span = |form: &str, referents: &[&str]| ExpressionSpec {
            form: form.to_string(),
            meaning: MeaningSpec::Uniform {
                referents: referents.iter().map(|r| r.to_string()).collect(),
            },
            length: 1,
        };

        let mut expressions: Vec<ExpressionSpec> = names.iter().map(|r| point(r)).collect();
        expressions.push(span("warm", &["red", "orange", "yellow"]));
        expressions.push(span("cool", &["green", "blue", "purple"]));
        expressions.push(span("grue", &["green", "blue"]));
        expressions.push(span("colour", &names));

        Self {
            referents: names.iter().map(|&n| Referent::new(n)).collect(),
            prior: None,
            expressions,
            allow_homonymy: false,
        }
    }
}
