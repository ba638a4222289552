//! Grammars whose derivation trees denote sets of referents.
//!
//! A grammar is a set of typed rules. Terminal rules are predicates over a
//! referent, combinator rules combine the truth values of their children.
//! Enumerating derivations up to a depth and keeping the shortest tree for
//! each extension yields an expression pool whose lengths are minimal
//! description lengths.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

use super::{Expression, ExpressionPool, MalformedDomainError, Meaning, Referent, Universe};

/// Predicate evaluated by a terminal rule.
pub type Predicate = Arc<dyn Fn(&Referent) -> bool + Send + Sync>;

/// Truth function applied by a combinator rule to its children.
pub type Connective = Arc<dyn Fn(&[bool]) -> bool + Send + Sync>;

/// Errors raised while building or using a grammar.
#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("Grammar already has a rule named {0}")]
    DuplicateRule(String),
    #[error("Unknown rule: {0}")]
    UnknownRule(String),
    #[error("No usable rules for type {0}")]
    NoRules(String),
    #[error("Invalid rule weights for type {lhs}: {reason}")]
    InvalidWeights { lhs: String, reason: String },
    #[error("Rule {rule} takes {expected} arguments, got {got}")]
    Arity {
        rule: String,
        expected: usize,
        got: usize,
    },
    #[error("Could not parse {input:?} at offset {offset}: {reason}")]
    Parse {
        input: String,
        offset: usize,
        reason: String,
    },
    #[error(transparent)]
    Domain(#[from] MalformedDomainError),
}

#[derive(Clone)]
enum RuleFn {
    Terminal(Predicate),
    Combinator(Connective),
}

/// A typed grammar rule.
#[derive(Clone)]
pub struct Rule {
    /// Unique rule name, also the rendered symbol.
    pub name: String,
    /// Output type.
    pub lhs: String,
    /// Argument types; empty for terminal rules.
    pub rhs: Vec<String>,
    /// Relative weight among rules sharing `lhs` when generating.
    pub weight: f64,
    func: RuleFn,
}

impl Rule {
    /// A rule with no arguments that tests a referent directly.
    pub fn terminal<F>(name: impl Into<String>, lhs: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Referent) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            lhs: lhs.into(),
            rhs: Vec::new(),
            weight: 1.0,
            func: RuleFn::Terminal(Arc::new(predicate)),
        }
    }

    /// A rule combining the values of its children.
    pub fn combinator<F, S>(name: impl Into<String>, lhs: impl Into<String>, rhs: Vec<S>, connective: F) -> Self
    where
        F: Fn(&[bool]) -> bool + Send + Sync + 'static,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            lhs: lhs.into(),
            rhs: rhs.into_iter().map(Into::into).collect(),
            weight: 1.0,
            func: RuleFn::Combinator(Arc::new(connective)),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.rhs.is_empty()
    }

    pub fn arity(&self) -> usize {
        self.rhs.len()
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("lhs", &self.lhs)
            .field("rhs", &self.rhs)
            .field("weight", &self.weight)
            .finish()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.lhs, self.name)?;
        if !self.is_terminal() {
            write!(f, "({})", self.rhs.join(", "))?;
        }
        Ok(())
    }
}

/// A derivation tree built from grammar rules.
#[derive(Clone)]
pub struct GrammaticalExpression {
    rule: Arc<Rule>,
    children: Vec<GrammaticalExpression>,
}

impl GrammaticalExpression {
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn children(&self) -> &[GrammaticalExpression] {
        &self.children
    }

    /// Evaluate the tree on a referent.
    pub fn holds(&self, referent: &Referent) -> bool {
        match &self.rule.func {
            RuleFn::Terminal(predicate) => predicate(referent),
            RuleFn::Combinator(connective) => {
                let values: Vec<bool> = self.children.iter().map(|c| c.holds(referent)).collect();
                connective(&values)
            }
        }
    }

    /// Number of nodes in the tree.
    pub fn length(&self) -> usize {
        1 + self.children.iter().map(Self::length).sum::<usize>()
    }

    /// Indices of the referents the tree is true of.
    pub fn extension(&self, universe: &Universe) -> Vec<usize> {
        universe
            .referents()
            .iter()
            .enumerate()
            .filter(|(_, r)| self.holds(r))
            .map(|(i, _)| i)
            .collect()
    }

    /// Uniform meaning over the extension, or `None` if it is empty.
    pub fn meaning(&self, universe: &Universe) -> Option<Meaning> {
        Meaning::uniform_over(universe, self.extension(universe)).ok()
    }

    /// Expression rendered from the tree, with its size as description length.
    pub fn to_expression(&self, universe: &Universe) -> Option<Expression> {
        self.meaning(universe)
            .map(|m| Expression::new(self.to_string(), m).with_length(self.length()))
    }
}

impl PartialEq for GrammaticalExpression {
    fn eq(&self, other: &Self) -> bool {
        self.rule.name == other.rule.name && self.children == other.children
    }
}

impl fmt::Display for GrammaticalExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rule.name)?;
        if !self.children.is_empty() {
            f.write_str("(")?;
            for (i, child) in self.children.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{child}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl fmt::Debug for GrammaticalExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GrammaticalExpression({self})")
    }
}

/// A set of typed rules with a start type.
#[derive(Debug, Clone)]
pub struct Grammar {
    start: String,
    rules: BTreeMap<String, Vec<Arc<Rule>>>,
    by_name: HashMap<String, Arc<Rule>>,
}

type DepthMemo = HashMap<(usize, String), Vec<GrammaticalExpression>>;

impl Grammar {
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            rules: BTreeMap::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    /// Add a rule. Names must be unique.
    pub fn add_rule(&mut self, rule: Rule) -> Result<(), GrammarError> {
        if self.by_name.contains_key(&rule.name) {
            return Err(GrammarError::DuplicateRule(rule.name));
        }
        let rule = Arc::new(rule);
        self.by_name.insert(rule.name.clone(), Arc::clone(&rule));
        self.rules.entry(rule.lhs.clone()).or_default().push(rule);
        Ok(())
    }

    pub fn rule(&self, name: &str) -> Option<&Arc<Rule>> {
        self.by_name.get(name)
    }

    /// Rules producing `lhs`, in insertion order.
    pub fn rules_for(&self, lhs: &str) -> &[Arc<Rule>] {
        self.rules.get(lhs).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rules(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.rules.values().flatten()
    }

    /// Parse `name(child, ...)` notation.
    pub fn parse(&self, input: &str) -> Result<GrammaticalExpression, GrammarError> {
        let mut parser = Parser {
            grammar: self,
            input,
            pos: 0,
        };
        let expression = parser.expression()?;
        parser.skip_whitespace();
        if parser.pos < input.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(expression)
    }

    /// Random derivation from the start type.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R, max_depth: usize) -> Result<GrammaticalExpression, GrammarError> {
        self.generate_from(&self.start, rng, max_depth)
    }

    /// Random derivation from `lhs`. Once `max_depth` is exhausted only
    /// terminal rules are drawn.
    pub fn generate_from<R: Rng + ?Sized>(
        &self,
        lhs: &str,
        rng: &mut R,
        max_depth: usize,
    ) -> Result<GrammaticalExpression, GrammarError> {
        let usable: Vec<&Arc<Rule>> = self
            .rules_for(lhs)
            .iter()
            .filter(|r| max_depth > 0 || r.is_terminal())
            .collect();
        if usable.is_empty() {
            return Err(GrammarError::NoRules(lhs.to_string()));
        }

        let weights = WeightedIndex::new(usable.iter().map(|r| r.weight)).map_err(|e| {
            GrammarError::InvalidWeights {
                lhs: lhs.to_string(),
                reason: e.to_string(),
            }
        })?;
        let rule = Arc::clone(usable[weights.sample(rng)]);

        let mut children = Vec::with_capacity(rule.arity());
        for child_lhs in &rule.rhs {
            children.push(self.generate_from(child_lhs, rng, max_depth.saturating_sub(1))?);
        }
        Ok(GrammaticalExpression { rule, children })
    }

    /// All derivations from the start type with depth below `depth`,
    /// shallowest first.
    pub fn enumerate(&self, depth: usize) -> Vec<GrammaticalExpression> {
        let mut memo = DepthMemo::new();
        let start = self.start.clone();
        (0..depth)
            .flat_map(|d| self.enumerate_memo(d, &start, &mut memo))
            .collect()
    }

    /// All derivations from `lhs` of exactly `depth`.
    pub fn enumerate_at_depth(&self, depth: usize, lhs: &str) -> Vec<GrammaticalExpression> {
        self.enumerate_memo(depth, lhs, &mut DepthMemo::new())
    }

    fn enumerate_memo(&self, depth: usize, lhs: &str, memo: &mut DepthMemo) -> Vec<GrammaticalExpression> {
        let key = (depth, lhs.to_string());
        if let Some(cached) = memo.get(&key) {
            return cached.clone();
        }

        let mut out = Vec::new();
        for rule in self.rules_for(lhs) {
            if depth == 0 {
                if rule.is_terminal() {
                    out.push(GrammaticalExpression {
                        rule: Arc::clone(rule),
                        children: Vec::new(),
                    });
                }
                continue;
            }
            if rule.is_terminal() {
                continue;
            }

            for child_depths in depth_tuples(rule.arity(), depth) {
                let options: Vec<Vec<GrammaticalExpression>> = child_depths
                    .iter()
                    .zip(&rule.rhs)
                    .map(|(&d, child_lhs)| self.enumerate_memo(d, child_lhs, memo))
                    .collect();
                for children in cartesian(&options) {
                    out.push(GrammaticalExpression {
                        rule: Arc::clone(rule),
                        children,
                    });
                }
            }
        }

        memo.insert(key, out.clone());
        out
    }

    /// The shortest derivation for each distinct extension, keyed by the
    /// extension's referent indices. Earlier derivations win ties.
    pub fn unique_expressions(
        &self,
        depth: usize,
        universe: &Universe,
        max_size: Option<usize>,
    ) -> BTreeMap<Vec<usize>, GrammaticalExpression> {
        let mut unique = BTreeMap::new();
        for expression in self.enumerate(depth) {
            match unique.entry(expression.extension(universe)) {
                Entry::Vacant(slot) => {
                    slot.insert(expression);
                }
                Entry::Occupied(mut slot) => {
                    if expression.length() < slot.get().length() {
                        slot.insert(expression);
                    }
                }
            }
            if max_size.is_some_and(|max| unique.len() >= max) {
                break;
            }
        }
        unique
    }

    /// Expression pool of minimal derivations. Trees true of nothing are skipped.
    pub fn expression_pool(
        &self,
        universe: Arc<Universe>,
        depth: usize,
        max_size: Option<usize>,
    ) -> Result<ExpressionPool, GrammarError> {
        let expressions = self
            .unique_expressions(depth, &universe, max_size)
            .into_iter()
            .filter(|(extension, _)| !extension.is_empty())
            .map(|(extension, tree)| {
                Meaning::uniform_over(&universe, extension)
                    .map(|m| Expression::new(tree.to_string(), m).with_length(tree.length()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ExpressionPool::new(universe, expressions, false)?)
    }
}

/// Tuples over `0..depth` of length `arity` whose maximum is `depth - 1`,
/// in lexicographic order.
fn depth_tuples(arity: usize, depth: usize) -> Vec<Vec<usize>> {
    let mut tuples = vec![Vec::new()];
    for _ in 0..arity {
        tuples = tuples
            .into_iter()
            .flat_map(|prefix| {
                (0..depth).map(move |d| {
                    let mut next = prefix.clone();
                    next.push(d);
                    next
                })
            })
            .collect();
    }
    tuples.retain(|t| t.iter().max() == Some(&(depth - 1)));
    tuples
}

fn cartesian(options: &[Vec<GrammaticalExpression>]) -> Vec<Vec<GrammaticalExpression>> {
    let mut combos = vec![Vec::new()];
    for choices in options {
        let mut next = Vec::with_capacity(combos.len() * choices.len());
        for prefix in &combos {
            for choice in choices {
                let mut combo = prefix.clone();
                combo.push(choice.clone());
                next.push(combo);
            }
        }
        combos = next;
    }
    combos
}

struct Parser<'a> {
    grammar: &'a Grammar,
    input: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            self.pos += c.len_utf8();
        }
    }

    fn error(&self, reason: &str) -> GrammarError {
        GrammarError::Parse {
            input: self.input.to_string(),
            offset: self.pos,
            reason: reason.to_string(),
        }
    }

    fn expression(&mut self) -> Result<GrammaticalExpression, GrammarError> {
        self.skip_whitespace();
        let input = self.input;
        let start = self.pos;
        while let Some(c) = self.peek().filter(|c| !matches!(c, '(' | ')' | ',')) {
            self.pos += c.len_utf8();
        }
        let name = input[start..self.pos].trim();
        if name.is_empty() {
            return Err(self.error("expected a rule name"));
        }
        let rule = self
            .grammar
            .rule(name)
            .cloned()
            .ok_or_else(|| GrammarError::UnknownRule(name.to_string()))?;

        let mut children = Vec::new();
        if self.peek() == Some('(') {
            self.pos += 1;
            loop {
                children.push(self.expression()?);
                self.skip_whitespace();
                match self.peek() {
                    Some(',') => self.pos += 1,
                    Some(')') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(self.error("expected ',' or ')'")),
                }
            }
        }

        if children.len() != rule.arity() {
            return Err(GrammarError::Arity {
                rule: rule.name.clone(),
                expected: rule.arity(),
                got: children.len(),
            });
        }
        Ok(GrammaticalExpression { rule, children })
    }
}
