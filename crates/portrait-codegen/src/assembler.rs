//! Provider assembly
//!
//! Packages compiled types into a [`CompiledProvider`]. Names are grouped by
//! leading character into shards, and within a shard by [`name_hash`] into
//! buckets; names sharing a hash are chained in insertion order.

use crate::dispatch::GeneratedType;
use crate::error::{GeneratorError, GeneratorResult};
use indexmap::IndexMap;
use portrait_runtime::{name_hash, CompiledProvider, HashBucket, NamedFactory, Shard, TypeFactory};
use std::collections::BTreeMap;
use tracing::debug;

/// Names grouped by leading character, then by hash
pub type ShardLayout<'a> = BTreeMap<char, BTreeMap<u32, Vec<&'a str>>>;

/// Group `names` into the shard layout shared by providers and emitted tables
///
/// Empty names have no shard and are skipped.
pub fn shard_names<'a>(names: impl IntoIterator<Item = &'a str>) -> ShardLayout<'a> {
    let mut layout = ShardLayout::new();
    for name in names {
        let Some(first) = name.chars().next() else {
            continue;
        };
        layout
            .entry(first)
            .or_default()
            .entry(name_hash(name))
            .or_default()
            .push(name);
    }
    layout
}

/// Collects compiled types and packages them into a provider
#[derive(Default)]
pub struct ProviderAssembler {
    entries: IndexMap<String, TypeFactory>,
    priority: Option<i32>,
}

impl ProviderAssembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit provider priority instead of the generated default
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Add a factory under `name`
    pub fn add(&mut self, name: &str, factory: TypeFactory) -> GeneratorResult<()> {
        if name.trim().is_empty() {
            return Err(GeneratorError::UnknownType(name.to_string()));
        }
        if self.entries.contains_key(name) {
            return Err(GeneratorError::DuplicateType(name.to_string()));
        }
        self.entries.insert(name.to_string(), factory);
        Ok(())
    }

    /// Add a generated type under its own name
    pub fn add_generated(&mut self, generated: &GeneratedType) -> GeneratorResult<()> {
        self.add(generated.table().type_name(), generated.factory())
    }

    /// Number of collected types
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing was collected
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Package the collected types
    pub fn assemble(&self) -> CompiledProvider {
        let layout = shard_names(self.entries.keys().map(String::as_str));
        let shards: Vec<Shard> = layout
            .into_iter()
            .map(|(first, buckets)| {
                let buckets = buckets
                    .into_iter()
                    .map(|(hash, names)| {
                        let chain = names
                            .into_iter()
                            .filter_map(|name| {
                                self.entries
                                    .get(name)
                                    .map(|factory| NamedFactory::new(name, factory.clone()))
                            })
                            .collect();
                        HashBucket::new(hash, chain)
                    })
                    .collect();
                Shard::new(first, buckets)
            })
            .collect();
        debug!(types = self.entries.len(), shards = shards.len(), "assembled provider");
        match self.priority {
            Some(priority) => CompiledProvider::with_priority(shards, priority),
            None => CompiledProvider::from_shards(shards),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portrait_runtime::{priority, CompiledType, Provider};
    use std::sync::Arc;

    struct Named(&'static str);

    impl CompiledType for Named {
        fn type_name(&self) -> &str {
            self.0
        }

        fn metadata(&self) -> &str {
            ""
        }
    }

    fn factory(name: &'static str) -> TypeFactory {
        Arc::new(move || Arc::new(Named(name)) as Arc<dyn CompiledType>)
    }

    fn assembler(names: &[&'static str]) -> ProviderAssembler {
        let mut assembler = ProviderAssembler::new();
        for name in names {
            assembler.add(name, factory(name)).unwrap();
        }
        assembler
    }

    #[test]
    fn test_lookup_after_assembly() {
        let provider = assembler(&["Alpha", "Apple", "Banana"]).assemble();
        assert_eq!(provider.len(), 3);
        assert_eq!(provider.shards().len(), 2);
        for name in ["Alpha", "Apple", "Banana"] {
            assert_eq!(provider.compiled(name).unwrap().type_name(), name);
        }
        assert!(provider.compiled("Almond").is_none());
        assert!(provider.compiled("Cherry").is_none());
        assert!(provider.compiled("").is_none());
        assert_eq!(provider.priority(), priority::GENERATED);
    }

    #[test]
    fn test_duplicate_and_blank_names_rejected() {
        let mut assembler = assembler(&["a.A"]);
        assert!(matches!(
            assembler.add("a.A", factory("a.A")),
            Err(GeneratorError::DuplicateType(_))
        ));
        assert!(matches!(
            assembler.add("  ", factory("x")),
            Err(GeneratorError::UnknownType(_))
        ));
        assert_eq!(assembler.len(), 1);
    }

    #[test]
    fn test_shard_layout() {
        let layout = shard_names(["b.Y", "a.X", "", "a.Z"]);
        assert_eq!(layout.keys().copied().collect::<Vec<_>>(), vec!['a', 'b']);
        let a: Vec<&str> = layout[&'a'].values().flatten().copied().collect();
        assert_eq!(a.len(), 2);
        assert!(a.contains(&"a.X") && a.contains(&"a.Z"));
    }

    #[test]
    fn test_explicit_priority() {
        let provider = assembler(&["a.A"]).with_priority(priority::NATIVE).assemble();
        assert_eq!(provider.priority(), priority::NATIVE);
    }

    #[test]
    fn test_empty_assembler() {
        let provider = ProviderAssembler::new().assemble();
        assert!(provider.is_empty());
        assert!(provider.compiled("a.A").is_none());
    }
}
