//! Compiled types and the sharded provider that packages them
//!
//! A [`CompiledType`] is the build-time output for one type: its embedded
//! metadata plus index-addressed dispatch. A [`CompiledProvider`] maps
//! qualified names to zero-argument factories producing compiled types.
//!
//! Lookup cost is bounded per shard: names are bucketed by first character,
//! each shard holds hash-sorted buckets, and each bucket chains the names
//! sharing a hash.

use crate::descriptor::{Descriptor, StaticDescriptor};
use crate::error::{InvokeError, MemberKind, PortraitResult};
use crate::portrait::Portrait;
use crate::provider::{priority, Provider};
use crate::value::Value;
use portrait_meta::MethodEntry;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Compiled Type Capability
// ============================================================================

/// Index-addressed capability of a compiled type
///
/// Every index refers to declaration order in the type's metadata. The
/// default implementations describe a type with empty tables: any index is
/// out of range.
pub trait CompiledType: Send + Sync {
    /// Qualified type name
    fn type_name(&self) -> &str;

    /// Base64-encoded metadata blob
    fn metadata(&self) -> &str;

    /// Invoke constructor `index`
    fn invoke_constructor(&self, index: usize, args: &[Value]) -> Result<Value, InvokeError> {
        let _ = args;
        Err(out_of_bounds(MemberKind::Constructor, index, self.type_name()))
    }

    /// Invoke method `index`; `instance` is ignored for static methods
    fn invoke_method(
        &self,
        index: usize,
        instance: Option<&Value>,
        args: &[Value],
    ) -> Result<Value, InvokeError> {
        let _ = (instance, args);
        Err(out_of_bounds(MemberKind::Method, index, self.type_name()))
    }

    /// Read field `index`
    fn get_field(&self, index: usize, instance: Option<&Value>) -> Result<Value, InvokeError> {
        let _ = instance;
        Err(out_of_bounds(MemberKind::Field, index, self.type_name()))
    }

    /// Write field `index`
    fn set_field(
        &self,
        index: usize,
        instance: Option<&Value>,
        value: Value,
    ) -> Result<(), InvokeError> {
        let _ = (instance, value);
        Err(out_of_bounds(MemberKind::Field, index, self.type_name()))
    }

    /// Describe proxy method `index`
    fn describe_proxy_method(&self, index: usize) -> Result<MethodEntry, InvokeError> {
        Err(out_of_bounds(MemberKind::ProxyMethod, index, self.type_name()))
    }

    /// Singleton instance of an object type
    fn object_instance(&self) -> Option<Value> {
        None
    }

    /// Constants of an enum type, in declaration order
    fn enum_constants(&self) -> Option<Vec<Value>> {
        None
    }
}

/// Build the out-of-range error shared by all dispatch tables
pub fn out_of_bounds(member: MemberKind, index: usize, type_name: &str) -> InvokeError {
    InvokeError::IndexOutOfBounds {
        member,
        index,
        type_name: type_name.to_string(),
    }
}

// ============================================================================
// Sharded Provider
// ============================================================================

/// Zero-argument factory producing a compiled type
pub type TypeFactory = Arc<dyn Fn() -> Arc<dyn CompiledType> + Send + Sync>;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Hash used to bucket names within a shard
///
/// 32-bit FNV-1a over the UTF-8 bytes. The result does not depend on pointer
/// width or byte order, so hashes baked into emitted source on the build host
/// match the ones computed on the target.
pub fn name_hash(name: &str) -> u32 {
    name.bytes()
        .fold(FNV_OFFSET, |hash, byte| (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME))
}

/// Name and factory of one packaged type
#[derive(Clone)]
pub struct NamedFactory {
    name: Box<str>,
    factory: TypeFactory,
}

impl NamedFactory {
    /// Pair a qualified name with its factory
    pub fn new(name: impl Into<Box<str>>, factory: TypeFactory) -> Self {
        Self {
            name: name.into(),
            factory,
        }
    }

    /// Qualified name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Names sharing one hash value, checked by equality
#[derive(Clone)]
pub struct HashBucket {
    hash: u32,
    chain: Vec<NamedFactory>,
}

impl HashBucket {
    /// Create a bucket; every entry must hash to `hash`
    pub fn new(hash: u32, chain: Vec<NamedFactory>) -> Self {
        debug_assert!(chain.iter().all(|e| name_hash(e.name()) == hash));
        Self { hash, chain }
    }

    /// Hash value shared by the chain
    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// Entries in the collision chain
    pub fn chain(&self) -> &[NamedFactory] {
        &self.chain
    }
}

/// All names starting with one character
#[derive(Clone)]
pub struct Shard {
    first: char,
    buckets: Vec<HashBucket>,
}

impl Shard {
    /// Create a shard; buckets are ordered by hash
    pub fn new(first: char, mut buckets: Vec<HashBucket>) -> Self {
        buckets.sort_by_key(HashBucket::hash);
        Self { first, buckets }
    }

    /// Leading character of every name in the shard
    pub fn first(&self) -> char {
        self.first
    }

    /// Buckets ordered by hash
    pub fn buckets(&self) -> &[HashBucket] {
        &self.buckets
    }

    fn lookup(&self, name: &str) -> Option<&NamedFactory> {
        let hash = name_hash(name);
        let index = self
            .buckets
            .binary_search_by_key(&hash, HashBucket::hash)
            .ok()?;
        self.buckets[index]
            .chain
            .iter()
            .find(|entry| &*entry.name == name)
    }
}

/// Immutable, name-indexed unit of compiled types
pub struct CompiledProvider {
    shards: Vec<Shard>,
    priority: i32,
    len: usize,
}

impl CompiledProvider {
    /// Create a provider from prepared shards at the generated-code priority
    pub fn from_shards(shards: Vec<Shard>) -> Self {
        Self::with_priority(shards, priority::GENERATED)
    }

    /// Create a provider with an explicit priority
    pub fn with_priority(mut shards: Vec<Shard>, priority: i32) -> Self {
        shards.sort_by_key(Shard::first);
        let len = shards
            .iter()
            .flat_map(|s| s.buckets.iter())
            .map(|b| b.chain.len())
            .sum();
        Self {
            shards,
            priority,
            len,
        }
    }

    /// Find the factory for `name`
    ///
    /// Empty names, unmapped leading characters, unmapped hashes and
    /// unmatched names all yield `None`.
    pub fn factory(&self, name: &str) -> Option<&TypeFactory> {
        let first = name.chars().next()?;
        let index = self
            .shards
            .binary_search_by_key(&first, Shard::first)
            .ok()?;
        self.shards[index].lookup(name).map(|entry| &entry.factory)
    }

    /// Produce a fresh compiled type for `name`
    pub fn compiled(&self, name: &str) -> Option<Arc<dyn CompiledType>> {
        self.factory(name).map(|factory| factory())
    }

    /// Shards ordered by leading character
    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    /// Number of packaged types
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the provider packages no types
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Qualified names of all packaged types
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.shards
            .iter()
            .flat_map(|s| s.buckets.iter())
            .flat_map(|b| b.chain.iter())
            .map(NamedFactory::name)
    }
}

impl Provider for CompiledProvider {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn for_name(
        &self,
        name: &str,
        _portrait: &Portrait,
    ) -> PortraitResult<Option<Arc<dyn Descriptor>>> {
        Ok(self
            .compiled(name)
            .map(|compiled| Arc::new(StaticDescriptor::new(compiled)) as Arc<dyn Descriptor>))
    }
}

impl fmt::Debug for CompiledProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledProvider")
            .field("priority", &self.priority)
            .field("shards", &self.shards.len())
            .field("types", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl CompiledType for Named {
        fn type_name(&self) -> &str {
            self.0
        }

        fn metadata(&self) -> &str {
            ""
        }
    }

    fn entry(name: &'static str) -> NamedFactory {
        NamedFactory::new(name, Arc::new(move || Arc::new(Named(name)) as Arc<dyn CompiledType>))
    }

    fn provider(names: &[&'static str]) -> CompiledProvider {
        let mut shards: Vec<Shard> = Vec::new();
        for &name in names {
            let first = name.chars().next().unwrap();
            let bucket = HashBucket::new(name_hash(name), vec![entry(name)]);
            match shards.iter_mut().find(|s| s.first == first) {
                Some(shard) => shard.buckets.push(bucket),
                None => shards.push(Shard::new(first, vec![bucket])),
            }
        }
        for shard in &mut shards {
            shard.buckets.sort_by_key(HashBucket::hash);
        }
        CompiledProvider::from_shards(shards)
    }

    #[test]
    fn test_name_hash_is_stable() {
        assert_eq!(name_hash("Alpha"), 0x0348_724b);
        assert_eq!(name_hash("a.Alpha"), 0xffaa_671e);
        assert_eq!(name_hash(""), 0x811c_9dc5);
        assert_ne!(name_hash("Alpha"), name_hash("Apple"));
    }

    #[test]
    fn test_lookup() {
        let provider = provider(&["Alpha", "Apple", "Banana"]);
        assert_eq!(provider.len(), 3);
        assert_eq!(provider.shards().len(), 2);
        assert_eq!(provider.compiled("Apple").unwrap().type_name(), "Apple");
        assert!(provider.compiled("Almond").is_none());
        assert!(provider.compiled("").is_none());
        assert!(provider.compiled("Cherry").is_none());
    }

    #[test]
    fn test_default_tables_are_empty() {
        let named = Named("com.example.Empty");
        assert!(matches!(
            named.invoke_constructor(0, &[]),
            Err(InvokeError::IndexOutOfBounds {
                member: MemberKind::Constructor,
                index: 0,
                ..
            })
        ));
        assert!(named.get_field(3, None).is_err());
        assert!(named.object_instance().is_none());
    }
}
