/// Context-free naming grammars: types, parsing, validation, and expansion.
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use thiserror::Error;

use crate::core::context::ContextResolver;
use crate::core::lexicon::LexemeRegistry;
use crate::core::markov::{MarkovError, MarkovSource};
use crate::core::phonotactics::synthesize;
use crate::core::sampling::{pick_index, pick_uniform};
use crate::schema::domain::{Domain, DomainError};
use crate::schema::entity::EntityId;
use crate::schema::relationship::RelationshipKind;
use crate::schema::scope::Scope;

/// Default bound on nested nonterminal expansion.
pub const DEFAULT_MAX_DEPTH: usize = 24;
/// Literal substituted for a relationship that cannot be resolved.
pub const DEFAULT_CONTEXT_FALLBACK: &str = "Unknown";

/// Literal pieces starting with one of these attach to the previous piece.
const ATTACHING_PUNCTUATION: &[char] = &[',', '.', '!', '?', ';', ':'];

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("grammar '{grammar}', rule '{rule}': {message}")]
    TokenParse {
        grammar: String,
        rule: String,
        message: String,
    },
    #[error("grammar '{grammar}': start symbol '{start}' has no rule")]
    MissingStart { grammar: String, start: String },
    #[error("grammar '{grammar}': rule '{rule}' references undefined rule '{target}'")]
    DanglingRule {
        grammar: String,
        rule: String,
        target: String,
    },
    #[error("grammar '{grammar}': rule '{rule}' has no alternatives")]
    EmptyRule { grammar: String, rule: String },
    #[error("grammar '{grammar}': rule '{rule}' can never produce text")]
    NonTerminating { grammar: String, rule: String },
    #[error("grammar '{grammar}': rule '{rule}' has a negative or non-finite weight")]
    InvalidWeight { grammar: String, rule: String },
    #[error("expansion exceeded maximum depth {0}")]
    RecursionLimit(usize),
    #[error("unknown symbol '{0}'")]
    UnknownSymbol(String),
    #[error("lexeme slot '{0}' resolved to no entries")]
    EmptySlot(String),
    #[error("unknown domain '{0}'")]
    UnknownDomain(String),
    #[error("no markov source available for model '{0}'")]
    NoMarkovSource(String),
    #[error("context '{0}' could not be resolved and no fallback is configured")]
    UnresolvedContext(String),
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("markov error: {0}")]
    Markov(#[from] MarkovError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

impl GrammarError {
    /// Load-time problems that retrying can never fix.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::TokenParse { .. }
                | Self::MissingStart { .. }
                | Self::DanglingRule { .. }
                | Self::EmptyRule { .. }
                | Self::NonTerminating { .. }
                | Self::InvalidWeight { .. }
                | Self::UnknownDomain(_)
                | Self::Domain(_)
        )
    }
}

/// One token of a production, validated at load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Token {
    /// Emitted verbatim.
    Literal(String),
    /// Nonterminal reference.
    Rule(String),
    /// `slot:<id>`: random entry from a lexeme list.
    Slot(String),
    /// `domain:<id>[^suffix]`: phonotactic name, suffix attached directly.
    Domain { id: String, suffix: Option<String> },
    /// `markov:<modelId>`: external language model.
    Markov(String),
    /// `context:<key>[^suffix]`: related entity's display name.
    Context {
        key: RelationshipKind,
        suffix: Option<String>,
    },
}

impl Token {
    /// Parse one whitespace-free token. Bare words naming a rule become
    /// `Rule`; anything else without a known prefix is a literal.
    pub fn parse(text: &str, rule_names: &BTreeSet<&str>) -> Result<Token, String> {
        if let Some(id) = text.strip_prefix("slot:") {
            return non_empty(id, "slot").map(|id| Token::Slot(id.to_string()));
        }
        if let Some(rest) = text.strip_prefix("domain:") {
            let (id, suffix) = split_suffix(rest);
            let id = non_empty(id, "domain")?;
            return Ok(Token::Domain {
                id: id.to_string(),
                suffix,
            });
        }
        if let Some(id) = text.strip_prefix("markov:") {
            return non_empty(id, "markov").map(|id| Token::Markov(id.to_string()));
        }
        if let Some(rest) = text.strip_prefix("context:") {
            let (key, suffix) = split_suffix(rest);
            let key = non_empty(key, "context")?;
            return Ok(Token::Context {
                key: RelationshipKind::parse(key),
                suffix,
            });
        }
        if rule_names.contains(text) {
            return Ok(Token::Rule(text.to_string()));
        }
        Ok(Token::Literal(text.to_string()))
    }
}

fn non_empty<'a>(value: &'a str, kind: &str) -> Result<&'a str, String> {
    if value.is_empty() {
        Err(format!("empty {} reference", kind))
    } else {
        Ok(value)
    }
}

fn split_suffix(text: &str) -> (&str, Option<String>) {
    match text.split_once('^') {
        Some((head, suffix)) if !suffix.is_empty() => (head, Some(suffix.to_string())),
        Some((head, _)) => (head, None),
        None => (text, None),
    }
}

/// An ordered token list with a selection weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Production {
    pub tokens: Vec<Token>,
    pub weight: f64,
}

/// A validated context-free grammar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grammar {
    pub id: String,
    pub start: String,
    pub rules: BTreeMap<String, Vec<Production>>,
    #[serde(default)]
    pub applies_to: Scope,
}

// Authoring form: alternatives are written as token strings and compiled
// into `Production`s once at load.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAlternative {
    #[serde(default = "default_weight")]
    pub weight: f64,
    pub text: String,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrammarSource {
    pub id: String,
    pub start: String,
    pub rules: BTreeMap<String, Vec<SourceAlternative>>,
    #[serde(default)]
    pub applies_to: Scope,
}

impl GrammarSource {
    /// Parse an authoring-form grammar from a RON string.
    pub fn parse_ron(input: &str) -> Result<GrammarSource, GrammarError> {
        Ok(ron::from_str(input)?)
    }

    /// Load an authoring-form grammar from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<GrammarSource, GrammarError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }
}

/// Domains visible to `domain:<id>` tokens.
pub trait DomainLookup {
    fn domain(&self, id: &str) -> Option<&Domain>;
}

impl DomainLookup for HashMap<String, Domain> {
    fn domain(&self, id: &str) -> Option<&Domain> {
        self.get(id)
    }
}

impl DomainLookup for [Domain] {
    fn domain(&self, id: &str) -> Option<&Domain> {
        self.iter().find(|d| d.id == id)
    }
}

/// Collaborators and limits for one expansion.
pub struct ExpandContext<'a> {
    pub lexemes: &'a dyn LexemeRegistry,
    pub domains: &'a dyn DomainLookup,
    pub markov: Option<&'a dyn MarkovSource>,
    pub resolver: Option<&'a dyn ContextResolver>,
    pub entity: Option<EntityId>,
    pub culture: Option<&'a str>,
    pub entity_kind: Option<&'a str>,
    pub max_depth: usize,
    /// Literal used when a context key cannot be resolved by any sibling
    /// alternative. `None` turns that case into an error.
    pub context_fallback: Option<&'a str>,
}

impl<'a> ExpandContext<'a> {
    pub fn new(lexemes: &'a dyn LexemeRegistry, domains: &'a dyn DomainLookup) -> Self {
        Self {
            lexemes,
            domains,
            markov: None,
            resolver: None,
            entity: None,
            culture: None,
            entity_kind: None,
            max_depth: DEFAULT_MAX_DEPTH,
            context_fallback: Some(DEFAULT_CONTEXT_FALLBACK),
        }
    }

    pub fn with_markov(mut self, markov: &'a dyn MarkovSource) -> Self {
        self.markov = Some(markov);
        self
    }

    pub fn with_resolver(mut self, resolver: &'a dyn ContextResolver, entity: EntityId) -> Self {
        self.resolver = Some(resolver);
        self.entity = Some(entity);
        self
    }

    pub fn for_scope(mut self, culture: Option<&'a str>, entity_kind: Option<&'a str>) -> Self {
        self.culture = culture;
        self.entity_kind = entity_kind;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_context_fallback(mut self, fallback: Option<&'a str>) -> Self {
        self.context_fallback = fallback;
        self
    }
}

/// Why one alternative could not be expanded.
enum Failure {
    /// A context key had no value; a sibling alternative may still work.
    Unresolved(RelationshipKind),
    Fatal(GrammarError),
}

impl From<GrammarError> for Failure {
    fn from(e: GrammarError) -> Self {
        Failure::Fatal(e)
    }
}

impl Grammar {
    /// Compile and validate an authoring-form grammar.
    pub fn compile(source: GrammarSource) -> Result<Grammar, GrammarError> {
        let names: BTreeSet<&str> = source.rules.keys().map(String::as_str).collect();
        let mut rules = BTreeMap::new();
        for (name, alternatives) in &source.rules {
            let mut productions = Vec::with_capacity(alternatives.len());
            for alt in alternatives {
                let tokens = alt
                    .text
                    .split_whitespace()
                    .map(|t| Token::parse(t, &names))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|message| GrammarError::TokenParse {
                        grammar: source.id.clone(),
                        rule: name.clone(),
                        message,
                    })?;
                productions.push(Production {
                    tokens,
                    weight: alt.weight,
                });
            }
            rules.insert(name.clone(), productions);
        }

        let grammar = Grammar {
            id: source.id,
            start: source.start,
            rules,
            applies_to: source.applies_to,
        };
        grammar.validate()?;
        Ok(grammar)
    }

    /// Build from `(rule, [alternative text])` pairs with uniform weights.
    pub fn from_rules(id: &str, start: &str, rules: &[(&str, &[&str])]) -> Result<Grammar, GrammarError> {
        let source = GrammarSource {
            id: id.to_string(),
            start: start.to_string(),
            rules: rules
                .iter()
                .map(|(name, alts)| {
                    let alts = alts
                        .iter()
                        .map(|text| SourceAlternative {
                            weight: 1.0,
                            text: text.to_string(),
                        })
                        .collect();
                    (name.to_string(), alts)
                })
                .collect(),
            applies_to: Scope::any(),
        };
        Self::compile(source)
    }

    /// Structural checks: start symbol, references, weights, and that every
    /// rule can terminate.
    pub fn validate(&self) -> Result<(), GrammarError> {
        if !self.rules.contains_key(&self.start) {
            return Err(GrammarError::MissingStart {
                grammar: self.id.clone(),
                start: self.start.clone(),
            });
        }
        for (name, productions) in &self.rules {
            if productions.is_empty() {
                return Err(GrammarError::EmptyRule {
                    grammar: self.id.clone(),
                    rule: name.clone(),
                });
            }
            for production in productions {
                if !production.weight.is_finite() || production.weight < 0.0 {
                    return Err(GrammarError::InvalidWeight {
                        grammar: self.id.clone(),
                        rule: name.clone(),
                    });
                }
                for token in &production.tokens {
                    if let Token::Rule(target) = token {
                        if !self.rules.contains_key(target) {
                            return Err(GrammarError::DanglingRule {
                                grammar: self.id.clone(),
                                rule: name.clone(),
                                target: target.clone(),
                            });
                        }
                    }
                }
            }
        }

        // Fixpoint: a rule is productive when some alternative only refers
        // to productive rules.
        let mut productive: BTreeSet<&str> = BTreeSet::new();
        loop {
            let before = productive.len();
            for (name, productions) in &self.rules {
                if productive.contains(name.as_str()) {
                    continue;
                }
                let terminates = productions.iter().any(|p| {
                    p.tokens.iter().all(|t| match t {
                        Token::Rule(target) => productive.contains(target.as_str()),
                        _ => true,
                    })
                });
                if terminates {
                    productive.insert(name);
                }
            }
            if productive.len() == before {
                break;
            }
        }
        if let Some(name) = self.rules.keys().find(|n| !productive.contains(n.as_str())) {
            return Err(GrammarError::NonTerminating {
                grammar: self.id.clone(),
                rule: name.clone(),
            });
        }
        Ok(())
    }

    /// Expand from the start symbol.
    pub fn expand_start(&self, ctx: &ExpandContext<'_>, rng: &mut StdRng) -> Result<String, GrammarError> {
        self.expand(&self.start, ctx, rng)
    }

    /// Expand `symbol` by recursive descent.
    pub fn expand(&self, symbol: &str, ctx: &ExpandContext<'_>, rng: &mut StdRng) -> Result<String, GrammarError> {
        match self.expand_symbol(symbol, ctx, rng, 0) {
            Ok(text) => Ok(text),
            Err(Failure::Fatal(e)) => Err(e),
            Err(Failure::Unresolved(key)) => Err(GrammarError::UnresolvedContext(key.to_string())),
        }
    }

    fn expand_symbol(
        &self,
        symbol: &str,
        ctx: &ExpandContext<'_>,
        rng: &mut StdRng,
        depth: usize,
    ) -> Result<String, Failure> {
        if depth > ctx.max_depth {
            return Err(GrammarError::RecursionLimit(ctx.max_depth).into());
        }
        let productions = self
            .rules
            .get(symbol)
            .ok_or_else(|| GrammarError::UnknownSymbol(symbol.to_string()))?;

        let weights: Vec<f64> = productions.iter().map(|p| p.weight).collect();
        let first = pick_index(Some(&weights), productions.len(), rng)
            .ok_or_else(|| GrammarError::UnknownSymbol(symbol.to_string()))?;

        let siblings = (0..productions.len()).filter(|&i| i != first && productions[i].weight > 0.0);
        let mut unresolved = None;
        for i in std::iter::once(first).chain(siblings) {
            match self.expand_production(&productions[i], ctx, rng, depth, false) {
                Ok(text) => return Ok(text),
                Err(Failure::Unresolved(key)) => {
                    unresolved.get_or_insert(key);
                }
                Err(fatal) => return Err(fatal),
            }
        }

        match (ctx.context_fallback, unresolved) {
            (Some(_), _) => self.expand_production(&productions[first], ctx, rng, depth, true),
            (None, Some(key)) => Err(Failure::Unresolved(key)),
            (None, None) => Err(GrammarError::UnknownSymbol(symbol.to_string()).into()),
        }
    }

    fn expand_production(
        &self,
        production: &Production,
        ctx: &ExpandContext<'_>,
        rng: &mut StdRng,
        depth: usize,
        use_fallback: bool,
    ) -> Result<String, Failure> {
        let mut pieces = Vec::with_capacity(production.tokens.len());
        for token in &production.tokens {
            let piece = match token {
                Token::Literal(text) => text.clone(),
                Token::Rule(name) => self.expand_symbol(name, ctx, rng, depth + 1)?,
                Token::Slot(id) => {
                    let entries = ctx.lexemes.resolve(id, ctx.culture, ctx.entity_kind);
                    pick_uniform(&entries, rng)
                        .map(|s| s.to_string())
                        .ok_or_else(|| GrammarError::EmptySlot(id.clone()))?
                }
                Token::Domain { id, suffix } => {
                    let domain = ctx
                        .domains
                        .domain(id)
                        .ok_or_else(|| GrammarError::UnknownDomain(id.clone()))?;
                    let mut name = synthesize(domain, rng).map_err(GrammarError::from)?;
                    if let Some(suffix) = suffix {
                        name.push_str(suffix);
                    }
                    name
                }
                Token::Markov(model) => {
                    let source = ctx
                        .markov
                        .ok_or_else(|| GrammarError::NoMarkovSource(model.clone()))?;
                    source.generate(model, rng).map_err(GrammarError::from)?
                }
                Token::Context { key, suffix } => {
                    let resolved = match (ctx.resolver, ctx.entity) {
                        (Some(resolver), Some(entity)) => resolver.resolve(key, entity),
                        _ => None,
                    };
                    let mut text = match (resolved, use_fallback) {
                        (Some(name), _) => name,
                        (None, true) => ctx.context_fallback.unwrap_or(DEFAULT_CONTEXT_FALLBACK).to_string(),
                        (None, false) => return Err(Failure::Unresolved(key.clone())),
                    };
                    if let Some(suffix) = suffix {
                        text.push_str(suffix);
                    }
                    text
                }
            };
            pieces.push(piece);
        }
        Ok(assemble(&pieces))
    }

    /// Non-fatal authoring problems: unreachable rules and references to
    /// lexemes, domains, or models that do not exist.
    pub fn lint(
        &self,
        lexemes: &dyn LexemeRegistry,
        domains: &dyn DomainLookup,
        markov: Option<&dyn MarkovSource>,
    ) -> Vec<String> {
        let mut warnings = Vec::new();

        let mut reachable: BTreeSet<&str> = BTreeSet::new();
        let mut stack = vec![self.start.as_str()];
        while let Some(name) = stack.pop() {
            if !reachable.insert(name) {
                continue;
            }
            for production in self.rules.get(name).into_iter().flatten() {
                for token in &production.tokens {
                    if let Token::Rule(target) = token {
                        stack.push(target);
                    }
                }
            }
        }
        for name in self.rules.keys().filter(|n| !reachable.contains(n.as_str())) {
            warnings.push(format!(
                "grammar '{}': rule '{}' is unreachable from '{}'",
                self.id, name, self.start
            ));
        }

        for (name, productions) in &self.rules {
            for token in productions.iter().flat_map(|p| &p.tokens) {
                let problem = match token {
                    Token::Slot(id) if !lexemes.contains(id) => Some(format!("unknown lexeme list '{}'", id)),
                    Token::Domain { id, .. } if domains.domain(id).is_none() => {
                        Some(format!("unknown domain '{}'", id))
                    }
                    Token::Markov(id) => match markov {
                        None => Some(format!("markov model '{}' but no models loaded", id)),
                        Some(source) if !source.has_model(id) => Some(format!("unknown markov model '{}'", id)),
                        Some(_) => None,
                    },
                    _ => None,
                };
                if let Some(problem) = problem {
                    warnings.push(format!("grammar '{}', rule '{}': {}", self.id, name, problem));
                }
            }
        }
        warnings
    }
}

/// Join expanded pieces with single spaces, attaching leading punctuation.
fn assemble(pieces: &[String]) -> String {
    let mut out = String::new();
    for piece in pieces {
        let normalized = piece.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.is_empty() {
            continue;
        }
        let attaches = normalized.starts_with(ATTACHING_PUNCTUATION);
        if !out.is_empty() && !attaches {
            out.push(' ');
        }
        out.push_str(&normalized);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lexicon::LexemeSet;
    use crate::core::markov::{MarkovLibrary, MarkovTrainer};
    use crate::schema::domain::Phonology;
    use crate::schema::lexeme::LexemeList;
    use rand::SeedableRng;

    fn names<'a>(rules: &[&'a str]) -> BTreeSet<&'a str> {
        rules.iter().copied().collect()
    }

    fn lexemes() -> LexemeSet {
        LexemeSet::from_lists(vec![
            LexemeList::new("adjectives", &["Swift"]),
            LexemeList::new("nouns", &["Scale"]),
        ])
    }

    fn domains() -> HashMap<String, Domain> {
        let mut phonology = Phonology::new(&["k", "r"], &["a"]);
        phonology.syllable_templates = vec!["CV".to_string()];
        phonology.length_range = (2, 2);
        HashMap::from([("orcish".to_string(), Domain::new("orcish", "orcs", phonology))])
    }

    #[test]
    fn parse_prefixed_tokens() {
        let rules = names(&["noun"]);
        assert_eq!(Token::parse("slot:nouns", &rules), Ok(Token::Slot("nouns".to_string())));
        assert_eq!(
            Token::parse("domain:elven^ia", &rules),
            Ok(Token::Domain {
                id: "elven".to_string(),
                suffix: Some("ia".to_string())
            })
        );
        assert_eq!(Token::parse("markov:elvish", &rules), Ok(Token::Markov("elvish".to_string())));
        assert_eq!(
            Token::parse("context:founder^'s", &rules),
            Ok(Token::Context {
                key: RelationshipKind::Founder,
                suffix: Some("'s".to_string())
            })
        );
    }

    #[test]
    fn parse_rule_and_literal() {
        let rules = names(&["noun"]);
        assert_eq!(Token::parse("noun", &rules), Ok(Token::Rule("noun".to_string())));
        assert_eq!(Token::parse("of", &rules), Ok(Token::Literal("of".to_string())));
    }

    #[test]
    fn parse_empty_reference_error() {
        let rules = names(&[]);
        assert!(Token::parse("slot:", &rules).is_err());
        assert!(Token::parse("domain:^x", &rules).is_err());
    }

    #[test]
    fn missing_start_rejected() {
        let err = Grammar::from_rules("g", "name", &[("other", &["x"])]).unwrap_err();
        assert!(matches!(err, GrammarError::MissingStart { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn self_only_rule_rejected() {
        let err = Grammar::from_rules("g", "name", &[("name", &["name"])]).unwrap_err();
        assert!(matches!(err, GrammarError::NonTerminating { .. }));
    }

    #[test]
    fn dangling_rule_rejected() {
        let mut grammar = Grammar::from_rules("g", "name", &[("name", &["x"])]).unwrap();
        grammar.rules.get_mut("name").unwrap()[0].tokens.push(Token::Rule("ghost".to_string()));
        assert!(matches!(grammar.validate(), Err(GrammarError::DanglingRule { .. })));
    }

    #[test]
    fn swift_scale() {
        let grammar = Grammar::from_rules(
            "g",
            "name",
            &[("name", &["adj noun"]), ("adj", &["slot:adjectives"]), ("noun", &["slot:nouns"])],
        )
        .unwrap();
        let lex = lexemes();
        let doms = domains();
        let ctx = ExpandContext::new(&lex, &doms);
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            assert_eq!(grammar.expand_start(&ctx, &mut rng).unwrap(), "Swift Scale");
        }
    }

    #[test]
    fn domain_suffix_attaches_without_space() {
        let grammar = Grammar::from_rules("g", "name", &[("name", &["domain:orcish^ash of slot:nouns"])]).unwrap();
        let lex = lexemes();
        let doms = domains();
        let ctx = ExpandContext::new(&lex, &doms);
        let mut rng = StdRng::seed_from_u64(1);
        let out = grammar.expand_start(&ctx, &mut rng).unwrap();
        let (head, tail) = out.split_once(' ').unwrap();
        assert_eq!(head.len(), 5, "{}", out);
        assert!(head.ends_with("ash"));
        assert_eq!(tail, "of Scale");
    }

    #[test]
    fn punctuation_attaches() {
        assert_eq!(
            assemble(&["Kel".to_string(), ",".to_string(), "  the  Bold ".to_string()]),
            "Kel, the Bold"
        );
    }

    #[test]
    fn forced_choices_expand_to_pinned_text() {
        let mut grammar = Grammar::from_rules(
            "g",
            "name",
            &[
                ("name", &["domain:mono^grim the title", "title"]),
                ("title", &["slot:nouns", "the Red"]),
            ],
        )
        .unwrap();
        grammar.rules.get_mut("name").unwrap()[1].weight = 0.0;
        grammar.rules.get_mut("title").unwrap()[1].weight = 0.0;
        let mut phonology = Phonology::new(&["g"], &["o"]);
        phonology.syllable_templates = vec!["CV".to_string()];
        phonology.length_range = (2, 2);
        let doms = HashMap::from([("mono".to_string(), Domain::new("mono", "test", phonology))]);
        let lex = lexemes();
        let ctx = ExpandContext::new(&lex, &doms);
        for seed in [0, 77, 4096] {
            let mut rng = StdRng::seed_from_u64(seed);
            assert_eq!(grammar.expand_start(&ctx, &mut rng).unwrap(), "Gogrim the Scale");
        }
    }

    #[test]
    fn unresolved_context_tries_sibling() {
        let grammar = Grammar::from_rules("g", "name", &[("name", &["Hall of context:founder", "Old Hall"])]).unwrap();
        let lex = lexemes();
        let doms = domains();
        let ctx = ExpandContext::new(&lex, &doms);
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            assert_eq!(grammar.expand_start(&ctx, &mut rng).unwrap(), "Old Hall");
        }
    }

    #[test]
    fn unresolved_context_uses_fallback_literal() {
        let grammar = Grammar::from_rules("g", "name", &[("name", &["Hall of context:founder"])]).unwrap();
        let lex = lexemes();
        let doms = domains();
        let ctx = ExpandContext::new(&lex, &doms);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(grammar.expand_start(&ctx, &mut rng).unwrap(), "Hall of Unknown");

        let strict = ExpandContext::new(&lex, &doms).with_context_fallback(None);
        assert!(matches!(
            grammar.expand_start(&strict, &mut rng),
            Err(GrammarError::UnresolvedContext(key)) if key == "founder"
        ));
    }

    #[test]
    fn resolved_context_with_suffix() {
        let grammar = Grammar::from_rules("g", "name", &[("name", &["context:founder^'s Rest"])]).unwrap();
        let lex = lexemes();
        let doms = domains();
        let resolver = HashMap::from([(RelationshipKind::Founder, "Aldric".to_string())]);
        let ctx = ExpandContext::new(&lex, &doms).with_resolver(&resolver, EntityId(1));
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(grammar.expand_start(&ctx, &mut rng).unwrap(), "Aldric's Rest");
    }

    #[test]
    fn runaway_recursion_hits_depth_limit() {
        let mut grammar = Grammar::from_rules("g", "chain", &[("chain", &["link chain", "end"])]).unwrap();
        grammar.rules.get_mut("chain").unwrap()[1].weight = 0.0;
        let lex = lexemes();
        let doms = domains();
        let ctx = ExpandContext::new(&lex, &doms).with_max_depth(8);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            grammar.expand_start(&ctx, &mut rng),
            Err(GrammarError::RecursionLimit(8))
        ));
    }

    #[test]
    fn empty_slot_is_error() {
        let grammar = Grammar::from_rules("g", "name", &[("name", &["slot:titles"])]).unwrap();
        let lex = lexemes();
        let doms = domains();
        let ctx = ExpandContext::new(&lex, &doms);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(grammar.expand_start(&ctx, &mut rng), Err(GrammarError::EmptySlot(_))));
    }

    #[test]
    fn markov_token_uses_source() {
        let grammar = Grammar::from_rules("g", "name", &[("name", &["markov:elvish"])]).unwrap();
        let lex = lexemes();
        let doms = domains();
        let mut library = MarkovLibrary::new();
        library.insert("elvish", MarkovTrainer::train("Aelindra Caladrel Elenwe Galadon", 2));

        let mut rng = StdRng::seed_from_u64(0);
        let bare = ExpandContext::new(&lex, &doms);
        assert!(matches!(grammar.expand_start(&bare, &mut rng), Err(GrammarError::NoMarkovSource(_))));

        let ctx = ExpandContext::new(&lex, &doms).with_markov(&library);
        let out = grammar.expand_start(&ctx, &mut rng).unwrap();
        assert!(!out.is_empty());
    }

    #[test]
    fn lint_reports_unknown_references_and_unreachable_rules() {
        let grammar = Grammar::from_rules(
            "g",
            "name",
            &[("name", &["slot:ghosts domain:nowhere markov:none"]), ("orphan", &["x"])],
        )
        .unwrap();
        let warnings = grammar.lint(&lexemes(), &domains(), None);
        assert_eq!(warnings.len(), 4, "{:?}", warnings);
        assert!(warnings.iter().any(|w| w.contains("'orphan' is unreachable")));
        assert!(warnings.iter().any(|w| w.contains("unknown lexeme list 'ghosts'")));
        assert!(warnings.iter().any(|w| w.contains("unknown domain 'nowhere'")));
    }

    #[test]
    fn compile_from_ron_source() {
        let input = r#"(
            id: "epithets",
            start: "name",
            rules: {
                "name": [(text: "domain:orcish the adj"), (weight: 3.0, text: "domain:orcish")],
                "adj": [(text: "slot:adjectives")],
            },
        )"#;
        let grammar = Grammar::compile(GrammarSource::parse_ron(input).unwrap()).unwrap();
        assert_eq!(grammar.rules["name"][1].weight, 3.0);
        assert_eq!(grammar.rules["name"][0].tokens[2], Token::Rule("adj".to_string()));
        assert!(grammar.applies_to.is_universal());
    }
}
