//! Named-definition registries
//!
//! Indexes the facts, rules, protocols and shared models of the scoped
//! libraries by id, name and OID. The first definition registered under a
//! key wins; later duplicates are reported and ignored.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::domain::entities::{ComputableAsset, Fact, Library, Protocol, Rule, SharedModel};

/// Position of a definition inside the scoped library list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AssetLocation {
    library: usize,
    block: usize,
    index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelLocation {
    Library { library: usize, index: usize },
    Block(AssetLocation),
}

/// A rule-like definition found by name
#[derive(Debug, Clone, Copy)]
pub enum RuleTarget<'a> {
    Rule(&'a Rule),
    Protocol(&'a Protocol),
}

/// Fact, rule and model lookup for one execution
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    facts: HashMap<String, AssetLocation>,
    rules: HashMap<String, AssetLocation>,
    models: HashMap<String, ModelLocation>,
}

impl DefinitionRegistry {
    pub fn build(libraries: &[Arc<Library>]) -> Self {
        let mut registry = Self::default();
        for (li, library) in libraries.iter().enumerate() {
            for (index, model) in library.models.iter().enumerate() {
                let location = ModelLocation::Library { library: li, index };
                Self::insert_keys(&mut registry.models, &model.meta, location, "model");
            }
            for (bi, block) in library.blocks.iter().enumerate() {
                for (index, asset) in block.definitions.iter().enumerate() {
                    let location = AssetLocation {
                        library: li,
                        block: bi,
                        index,
                    };
                    match asset {
                        ComputableAsset::Fact(f) => {
                            Self::insert_keys(&mut registry.facts, &f.meta, location, "fact")
                        }
                        ComputableAsset::Rule(r) => {
                            Self::insert_keys(&mut registry.rules, &r.meta, location, "rule")
                        }
                        ComputableAsset::Protocol(p) => {
                            Self::insert_keys(&mut registry.rules, p.meta(), location, "protocol")
                        }
                        ComputableAsset::Model(m) => Self::insert_keys(
                            &mut registry.models,
                            &m.meta,
                            ModelLocation::Block(location),
                            "model",
                        ),
                    }
                }
            }
        }
        registry
    }

    fn insert_keys<L: Copy>(
        map: &mut HashMap<String, L>,
        meta: &crate::domain::value_objects::DefinitionMetadata,
        location: L,
        kind: &str,
    ) {
        let keys = std::iter::once(meta.id.as_str())
            .chain(meta.name.as_deref())
            .chain(meta.oid.as_deref())
            .filter(|k| !k.is_empty());
        let mut seen: Vec<&str> = Vec::new();
        for key in keys {
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            if map.contains_key(key) {
                warn!(kind, key, "duplicate definition key; keeping the first");
                continue;
            }
            map.insert(key.to_string(), location);
        }
    }

    fn asset<'a>(libraries: &'a [Arc<Library>], at: AssetLocation) -> Option<&'a ComputableAsset> {
        libraries
            .get(at.library)?
            .blocks
            .get(at.block)?
            .definitions
            .get(at.index)
    }

    pub fn fact<'a>(&self, libraries: &'a [Arc<Library>], name: &str) -> Option<&'a Fact> {
        match Self::asset(libraries, *self.facts.get(name)?)? {
            ComputableAsset::Fact(f) => Some(f),
            _ => None,
        }
    }

    pub fn rule<'a>(&self, libraries: &'a [Arc<Library>], name: &str) -> Option<RuleTarget<'a>> {
        match Self::asset(libraries, *self.rules.get(name)?)? {
            ComputableAsset::Rule(r) => Some(RuleTarget::Rule(r)),
            ComputableAsset::Protocol(p) => Some(RuleTarget::Protocol(p)),
            _ => None,
        }
    }

    pub fn model<'a>(&self, libraries: &'a [Arc<Library>], name: &str) -> Option<&'a SharedModel> {
        match *self.models.get(name)? {
            ModelLocation::Library { library, index } => {
                libraries.get(library)?.models.get(index)
            }
            ModelLocation::Block(at) => match Self::asset(libraries, at)? {
                ComputableAsset::Model(m) => Some(m),
                _ => None,
            },
        }
    }

    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }
}
