/// Culture registry: immutable snapshots of domains, grammars, lexemes,
/// and profiles, replaced wholesale by a separate mutation API.
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::core::grammar::{DomainLookup, Grammar, GrammarError, GrammarSource, Token};
use crate::core::lexicon::{resolve_from, LexemeRegistry};
use crate::core::markov::MarkovSource;
use crate::core::strategy::{validate_profile, StrategyError};
use crate::schema::domain::{Domain, DomainError};
use crate::schema::lexeme::LexemeList;
use crate::schema::profile::{Strategy, StrategyProfile};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("grammar error: {0}")]
    Grammar(#[from] GrammarError),
    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),
    #[error("lexeme list '{0}' has no entries")]
    EmptyLexemeList(String),
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// One file's worth of culture content. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CultureBundle {
    pub domains: Vec<Domain>,
    pub grammars: Vec<GrammarSource>,
    pub lexemes: Vec<LexemeList>,
    pub profiles: Vec<StrategyProfile>,
}

impl CultureBundle {
    pub fn parse_ron(input: &str) -> Result<CultureBundle, RegistryError> {
        Ok(ron::from_str(input)?)
    }

    pub fn load_from_ron(path: &Path) -> Result<CultureBundle, RegistryError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Compile grammars and turn the bundle into upsert edits.
    pub fn into_edits(self) -> Result<Vec<RegistryEdit>, RegistryError> {
        let mut edits = Vec::new();
        edits.extend(self.domains.into_iter().map(RegistryEdit::UpsertDomain));
        for source in self.grammars {
            edits.push(RegistryEdit::UpsertGrammar(Grammar::compile(source)?));
        }
        edits.extend(self.lexemes.into_iter().map(RegistryEdit::UpsertLexemes));
        edits.extend(self.profiles.into_iter().map(RegistryEdit::UpsertProfile));
        Ok(edits)
    }
}

/// A single mutation. Batches are applied all-or-nothing.
#[derive(Debug, Clone)]
pub enum RegistryEdit {
    UpsertDomain(Domain),
    RemoveDomain(String),
    UpsertGrammar(Grammar),
    RemoveGrammar(String),
    /// Replaces the list with the same id and scope, else adds it.
    UpsertLexemes(LexemeList),
    /// Removes every list with this id.
    RemoveLexemes(String),
    UpsertProfile(StrategyProfile),
    RemoveProfile(String),
}

/// Read-only view of the registry at one point in time.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    domains: HashMap<String, Domain>,
    grammars: HashMap<String, Grammar>,
    lexemes: Vec<LexemeList>,
    /// Declaration order matters for scope-based profile lookup.
    profiles: Vec<StrategyProfile>,
}

impl RegistrySnapshot {
    pub fn domain(&self, id: &str) -> Option<&Domain> {
        self.domains.get(id)
    }

    pub fn grammar(&self, id: &str) -> Option<&Grammar> {
        self.grammars.get(id)
    }

    pub fn profile(&self, id: &str) -> Option<&StrategyProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// Domains sorted by id.
    pub fn list_domains(&self) -> Vec<&Domain> {
        let mut domains: Vec<&Domain> = self.domains.values().collect();
        domains.sort_by(|a, b| a.id.cmp(&b.id));
        domains
    }

    /// Grammars sorted by id.
    pub fn list_grammars(&self) -> Vec<&Grammar> {
        let mut grammars: Vec<&Grammar> = self.grammars.values().collect();
        grammars.sort_by(|a, b| a.id.cmp(&b.id));
        grammars
    }

    pub fn list_lexemes(&self) -> &[LexemeList] {
        &self.lexemes
    }

    pub fn list_profiles(&self) -> &[StrategyProfile] {
        &self.profiles
    }

    /// Every domain other than `domain_id`, sorted by id.
    pub fn siblings_of(&self, domain_id: &str) -> Vec<&Domain> {
        self.list_domains().into_iter().filter(|d| d.id != domain_id).collect()
    }

    /// Domains belonging to a culture, sorted by id.
    pub fn domains_for_culture(&self, culture: &str) -> Vec<&Domain> {
        self.list_domains()
            .into_iter()
            .filter(|d| d.culture_id == culture)
            .collect()
    }

    /// First declared profile whose scope accepts the culture and kind.
    /// Scoped profiles win over universal ones.
    pub fn profile_for(&self, culture: Option<&str>, entity_kind: Option<&str>) -> Option<&StrategyProfile> {
        let mut matching = self.profiles.iter().filter(|p| p.applies_to.matches(culture, entity_kind));
        let first = matching.next()?;
        if !first.applies_to.is_universal() {
            return Some(first);
        }
        Some(matching.find(|p| !p.applies_to.is_universal()).unwrap_or(first))
    }

    /// Cross-reference warnings: grammar lint plus profile strategies that
    /// name missing domains or grammars.
    pub fn lint(&self, markov: Option<&dyn MarkovSource>) -> Vec<String> {
        let mut warnings = Vec::new();
        for grammar in self.list_grammars() {
            warnings.extend(grammar.lint(self, self, markov));
        }
        for profile in &self.profiles {
            for group in &profile.strategy_groups {
                for weighted in &group.strategies {
                    let missing = match &weighted.strategy {
                        Strategy::Phonotactic { domain_id } if !self.domains.contains_key(domain_id) => {
                            Some(format!("domain '{}'", domain_id))
                        }
                        Strategy::Grammar { grammar_id } if !self.grammars.contains_key(grammar_id) => {
                            Some(format!("grammar '{}'", grammar_id))
                        }
                        _ => None,
                    };
                    if let Some(missing) = missing {
                        warnings.push(format!(
                            "profile '{}', group '{}': unknown {}",
                            profile.id, group.name, missing
                        ));
                    }
                }
            }
        }
        warnings
    }

    fn apply_edit(&mut self, edit: RegistryEdit) -> Result<(), RegistryError> {
        match edit {
            RegistryEdit::UpsertDomain(domain) => {
                domain.validate()?;
                debug!("registry: upsert domain '{}'", domain.id);
                self.domains.insert(domain.id.clone(), domain);
            }
            RegistryEdit::RemoveDomain(id) => {
                self.domains.remove(&id).ok_or(RegistryError::NotFound { kind: "domain", id })?;
            }
            RegistryEdit::UpsertGrammar(grammar) => {
                grammar.validate()?;
                debug!("registry: upsert grammar '{}'", grammar.id);
                self.grammars.insert(grammar.id.clone(), grammar);
            }
            RegistryEdit::RemoveGrammar(id) => {
                self.grammars.remove(&id).ok_or(RegistryError::NotFound { kind: "grammar", id })?;
            }
            RegistryEdit::UpsertLexemes(list) => {
                if list.entries.is_empty() {
                    return Err(RegistryError::EmptyLexemeList(list.id));
                }
                debug!("registry: upsert lexeme list '{}'", list.id);
                match self
                    .lexemes
                    .iter_mut()
                    .find(|l| l.id == list.id && l.applies_to == list.applies_to)
                {
                    Some(existing) => *existing = list,
                    None => self.lexemes.push(list),
                }
            }
            RegistryEdit::RemoveLexemes(id) => {
                let before = self.lexemes.len();
                self.lexemes.retain(|l| l.id != id);
                if self.lexemes.len() == before {
                    return Err(RegistryError::NotFound { kind: "lexeme list", id });
                }
            }
            RegistryEdit::UpsertProfile(profile) => {
                validate_profile(&profile)?;
                debug!("registry: upsert profile '{}'", profile.id);
                match self.profiles.iter_mut().find(|p| p.id == profile.id) {
                    Some(existing) => *existing = profile,
                    None => self.profiles.push(profile),
                }
            }
            RegistryEdit::RemoveProfile(id) => {
                let index = self
                    .profiles
                    .iter()
                    .position(|p| p.id == id)
                    .ok_or(RegistryError::NotFound { kind: "profile", id })?;
                self.profiles.remove(index);
            }
        }
        Ok(())
    }
}

impl LexemeRegistry for RegistrySnapshot {
    fn resolve(&self, id: &str, culture: Option<&str>, entity_kind: Option<&str>) -> Vec<&str> {
        resolve_from(self.lexemes.iter(), id, culture, entity_kind)
    }

    fn contains(&self, id: &str) -> bool {
        self.lexemes.iter().any(|l| l.id == id)
    }
}

impl DomainLookup for RegistrySnapshot {
    fn domain(&self, id: &str) -> Option<&Domain> {
        self.domains.get(id)
    }
}

/// Owner of the current snapshot. Readers take an `Arc` and keep a
/// consistent view no matter what is edited afterwards.
#[derive(Debug, Clone, Default)]
pub struct CultureRegistry {
    current: Arc<RegistrySnapshot>,
}

impl CultureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.current)
    }

    /// Apply a batch of edits. On any failure nothing changes.
    pub fn apply(&mut self, edits: Vec<RegistryEdit>) -> Result<(), RegistryError> {
        let mut next = RegistrySnapshot::clone(&self.current);
        let count = edits.len();
        for edit in edits {
            next.apply_edit(edit)?;
        }
        self.current = Arc::new(next);
        debug!("registry: applied {} edit(s)", count);
        Ok(())
    }

    pub fn upsert_domain(&mut self, domain: Domain) -> Result<(), RegistryError> {
        self.apply(vec![RegistryEdit::UpsertDomain(domain)])
    }

    pub fn remove_domain(&mut self, id: &str) -> Result<(), RegistryError> {
        self.apply(vec![RegistryEdit::RemoveDomain(id.to_string())])
    }

    pub fn upsert_grammar(&mut self, grammar: Grammar) -> Result<(), RegistryError> {
        self.apply(vec![RegistryEdit::UpsertGrammar(grammar)])
    }

    pub fn remove_grammar(&mut self, id: &str) -> Result<(), RegistryError> {
        self.apply(vec![RegistryEdit::RemoveGrammar(id.to_string())])
    }

    pub fn upsert_lexemes(&mut self, list: LexemeList) -> Result<(), RegistryError> {
        self.apply(vec![RegistryEdit::UpsertLexemes(list)])
    }

    pub fn remove_lexemes(&mut self, id: &str) -> Result<(), RegistryError> {
        self.apply(vec![RegistryEdit::RemoveLexemes(id.to_string())])
    }

    pub fn upsert_profile(&mut self, profile: StrategyProfile) -> Result<(), RegistryError> {
        self.apply(vec![RegistryEdit::UpsertProfile(profile)])
    }

    pub fn remove_profile(&mut self, id: &str) -> Result<(), RegistryError> {
        self.apply(vec![RegistryEdit::RemoveProfile(id.to_string())])
    }

    pub fn load_bundle(&mut self, bundle: CultureBundle) -> Result<(), RegistryError> {
        self.apply(bundle.into_edits()?)
    }

    /// Load every `.ron` bundle in a directory as one batch.
    pub fn load_from_ron_dir(&mut self, dir: &Path) -> Result<usize, RegistryError> {
        let mut edits = Vec::new();
        let mut files = 0;
        load_ron_files_from_dir(dir, |path| {
            edits.extend(CultureBundle::load_from_ron(path)?.into_edits()?);
            files += 1;
            Ok(())
        })?;
        self.apply(edits)?;
        info!("registry: loaded {} bundle file(s) from {}", files, dir.display());
        Ok(files)
    }
}

/// Load all .ron files from a directory in name order, calling `loader` for each.
fn load_ron_files_from_dir<F>(dir: &Path, mut loader: F) -> Result<(), RegistryError>
where
    F: FnMut(&Path) -> Result<(), RegistryError>,
{
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("ron") {
            paths.push(path);
        }
    }
    paths.sort();
    for path in &paths {
        loader(path)?;
    }
    Ok(())
}

/// Tokens in a grammar that reference a domain, used by tools.
pub fn referenced_domains(grammar: &Grammar) -> Vec<&str> {
    let mut ids: Vec<&str> = grammar
        .rules
        .values()
        .flatten()
        .flat_map(|p| &p.tokens)
        .filter_map(|t| match t {
            Token::Domain { id, .. } => Some(id.as_str()),
            _ => None,
        })
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::domain::Phonology;
    use crate::schema::profile::{StrategyGroup, WeightedStrategy};
    use crate::schema::scope::Scope;

    fn domain(id: &str, culture: &str) -> Domain {
        Domain::new(id, culture, Phonology::new(&["k", "t"], &["a", "o"]))
    }

    fn profile(id: &str, scope: Scope, domain_id: &str) -> StrategyProfile {
        StrategyProfile {
            id: id.to_string(),
            applies_to: scope,
            strategy_groups: vec![StrategyGroup::fallback(
                "default",
                vec![WeightedStrategy {
                    weight: 1.0,
                    strategy: Strategy::phonotactic(domain_id),
                }],
            )],
        }
    }

    #[test]
    fn old_snapshot_is_unaffected_by_edits() {
        let mut registry = CultureRegistry::new();
        registry.upsert_domain(domain("orcish", "orcs")).unwrap();
        let before = registry.snapshot();

        registry.upsert_domain(domain("elven", "elves")).unwrap();
        registry.remove_domain("orcish").unwrap();

        assert!(before.domain("orcish").is_some());
        assert!(before.domain("elven").is_none());
        let after = registry.snapshot();
        assert!(after.domain("orcish").is_none());
        assert!(after.domain("elven").is_some());
    }

    #[test]
    fn failed_batch_changes_nothing() {
        let mut registry = CultureRegistry::new();
        let bad = Domain::new("bad", "x", Phonology::new(&[], &["a"]));
        let result = registry.apply(vec![
            RegistryEdit::UpsertDomain(domain("orcish", "orcs")),
            RegistryEdit::UpsertDomain(bad),
        ]);
        assert!(matches!(result, Err(RegistryError::Domain(DomainError::NoConsonants(_)))));
        assert!(registry.snapshot().list_domains().is_empty());
    }

    #[test]
    fn remove_missing_is_not_found() {
        let mut registry = CultureRegistry::new();
        assert!(matches!(
            registry.remove_grammar("nope"),
            Err(RegistryError::NotFound { kind: "grammar", .. })
        ));
    }

    #[test]
    fn lexeme_upsert_replaces_same_scope_only() {
        let mut registry = CultureRegistry::new();
        registry.upsert_lexemes(LexemeList::new("titles", &["Warden"])).unwrap();
        registry
            .upsert_lexemes(LexemeList::new("titles", &["Thane"]).scoped(Scope::culture("dwarven")))
            .unwrap();
        registry.upsert_lexemes(LexemeList::new("titles", &["Keeper"])).unwrap();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.list_lexemes().len(), 2);
        assert_eq!(snapshot.resolve("titles", Some("dwarven"), None), vec!["Keeper", "Thane"]);
        assert!(matches!(
            registry.upsert_lexemes(LexemeList::new("empty", &[])),
            Err(RegistryError::EmptyLexemeList(_))
        ));
    }

    #[test]
    fn profile_lookup_by_scope_in_declaration_order() {
        let mut registry = CultureRegistry::new();
        registry.upsert_domain(domain("orcish", "orcs")).unwrap();
        registry
            .upsert_profile(profile("orc_people", Scope::culture("orcs"), "orcish"))
            .unwrap();
        registry.upsert_profile(profile("anyone", Scope::any(), "orcish")).unwrap();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.profile_for(Some("orcs"), Some("npc")).unwrap().id, "orc_people");
        assert_eq!(snapshot.profile_for(Some("elves"), None).unwrap().id, "anyone");
    }

    #[test]
    fn scoped_profile_beats_earlier_universal_one() {
        let mut registry = CultureRegistry::new();
        registry.upsert_domain(domain("orcish", "orcs")).unwrap();
        registry.upsert_profile(profile("anyone", Scope::any(), "orcish")).unwrap();
        registry
            .upsert_profile(profile("orc_people", Scope::culture("orcs"), "orcish"))
            .unwrap();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.profile_for(Some("orcs"), None).unwrap().id, "orc_people");
        assert_eq!(snapshot.profile_for(Some("goblins"), None).unwrap().id, "anyone");
    }

    #[test]
    fn siblings_exclude_self() {
        let mut registry = CultureRegistry::new();
        registry
            .apply(vec![
                RegistryEdit::UpsertDomain(domain("a", "x")),
                RegistryEdit::UpsertDomain(domain("b", "x")),
                RegistryEdit::UpsertDomain(domain("c", "y")),
            ])
            .unwrap();
        let snapshot = registry.snapshot();
        let ids: Vec<&str> = snapshot.siblings_of("b").iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(snapshot.domains_for_culture("x").len(), 2);
    }

    #[test]
    fn bundle_from_ron_and_lint() {
        let input = r#"(
            domains: [
                (
                    id: "orcish",
                    culture_id: "orcs",
                    phonology: (consonants: ["g", "r", "k"], vowels: ["a", "u"]),
                ),
            ],
            grammars: [
                (
                    id: "warband",
                    start: "name",
                    rules: { "name": [(text: "domain:orcish slot:clans")] },
                ),
            ],
            profiles: [
                (
                    id: "orc_people",
                    applies_to: (cultures: ["orcs"]),
                    strategy_groups: [
                        (name: "default", strategies: [(weight: 1.0, strategy: grammar(grammar_id: "raiders"))]),
                    ],
                ),
            ],
        )"#;
        let mut registry = CultureRegistry::new();
        registry.load_bundle(CultureBundle::parse_ron(input).unwrap()).unwrap();
        let snapshot = registry.snapshot();
        assert!(snapshot.grammar("warband").is_some());
        assert_eq!(referenced_domains(snapshot.grammar("warband").unwrap()), vec!["orcish"]);

        let warnings = snapshot.lint(None);
        assert_eq!(warnings.len(), 2, "{:?}", warnings);
        assert!(warnings.iter().any(|w| w.contains("unknown lexeme list 'clans'")));
        assert!(warnings.iter().any(|w| w.contains("unknown grammar 'raiders'")));
    }
}
