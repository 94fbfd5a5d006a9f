//! Type-graph resolver
//!
//! Expands annotated seeds into the set of types that must become
//! introspectable, following each seed's inclusion directives. Two collectors
//! run over the same graph:
//!
//! - the **reflective** collector admits every named type and walks both the
//!   supertype and interface edges;
//! - the **proxy** collector admits only interfaces. Its direct step follows
//!   interface edges; its closure also passes through superclasses so that
//!   interfaces inherited from them are reached.
//!
//! Every walk is an explicit worklist with a visited set, so cyclic
//! hierarchies terminate. Resolution only ever adds names.

use crate::directive::{DirectiveSet, InclusionDirective};
use crate::index::{describe_any, ClassIndex, ExternalTypes, NodeId, TypeInfo};
use indexmap::IndexSet;
use portrait_meta::{is_primitive_name, GenericSignature};
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

// ============================================================================
// Seeds and Results
// ============================================================================

/// How a seed enters the resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeedRole {
    /// Type must be introspectable
    Reflective,
    /// Interface must be proxyable (and is therefore introspectable)
    Proxy,
}

/// Starting point of a resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    /// Qualified type name
    pub name: String,
    /// Role of the seed
    pub role: SeedRole,
    /// Directives expanding the seed
    pub directives: DirectiveSet,
}

impl Seed {
    /// Reflective seed
    pub fn reflective(name: impl Into<String>, directives: DirectiveSet) -> Self {
        Self {
            name: name.into(),
            role: SeedRole::Reflective,
            directives,
        }
    }

    /// Proxy seed
    pub fn proxy(name: impl Into<String>, directives: DirectiveSet) -> Self {
        Self {
            name: name.into(),
            role: SeedRole::Proxy,
            directives,
        }
    }
}

/// Outcome of a resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Types to compile descriptors for
    pub introspectable: IndexSet<String>,
    /// Interfaces to compile proxy tables for; a subset of `introspectable`
    pub proxyable: IndexSet<String>,
    /// Introspectable names absent from the class index
    pub unresolved: IndexSet<String>,
}

impl Resolution {
    /// Check whether nothing was collected
    pub fn is_empty(&self) -> bool {
        self.introspectable.is_empty()
    }
}

/// Normalize a type name for collection
///
/// Array names reduce to their element type. Blank names and primitives
/// yield `None`.
pub fn normalize_type_name(name: &str) -> Option<String> {
    let mut name = name.trim();
    while let Some(element) = name.strip_suffix("[]") {
        name = element.trim_end();
    }
    if let Some(descriptor) = name.strip_prefix('[') {
        let element = descriptor.trim_start_matches('[');
        let class = element.strip_prefix('L')?.strip_suffix(';')?;
        return normalize_type_name(class);
    }
    if name.is_empty() || is_primitive_name(name) {
        return None;
    }
    Some(name.to_string())
}

/// Check whether a name denotes a type a descriptor can be compiled for
pub fn is_generatable(name: &str) -> bool {
    !name.trim().is_empty()
        && !is_primitive_name(name)
        && !name.ends_with("[]")
        && !name.starts_with('[')
}

// ============================================================================
// Collectors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectorKind {
    Reflective,
    Proxy,
}

struct Collector<'a> {
    kind: CollectorKind,
    index: &'a ClassIndex,
    external: &'a dyn ExternalTypes,
    names: IndexSet<String>,
}

impl<'a> Collector<'a> {
    fn new(kind: CollectorKind, index: &'a ClassIndex, external: &'a dyn ExternalTypes) -> Self {
        Self {
            kind,
            index,
            external,
            names: IndexSet::new(),
        }
    }

    fn describe(&self, name: &str) -> Option<&'a TypeInfo> {
        describe_any(self.index, self.external, name)
    }

    fn add_name(&mut self, name: &str) {
        let Some(name) = normalize_type_name(name) else {
            return;
        };
        if self.kind == CollectorKind::Proxy {
            let is_interface = self.describe(&name).is_some_and(TypeInfo::is_interface);
            if !is_interface {
                trace!(name = %name, "not an interface, skipping proxy target");
                return;
            }
        }
        self.names.insert(name);
    }

    fn admits_subtype(&self, info: &TypeInfo) -> bool {
        match self.kind {
            CollectorKind::Reflective => true,
            CollectorKind::Proxy => info.is_interface(),
        }
    }

    fn parents(&self, info: &'a TypeInfo) -> Vec<&'a str> {
        match self.kind {
            CollectorKind::Reflective => info.supertypes().collect(),
            CollectorKind::Proxy => info.interfaces.iter().map(String::as_str).collect(),
        }
    }

    fn apply(&mut self, name: &str, directives: DirectiveSet) {
        if directives.is_empty() {
            return;
        }
        if let Some(id) = self.index.get(name) {
            if directives.contains(InclusionDirective::DirectSubtypes) {
                self.add_direct_subtypes(id);
            }
            if directives.contains(InclusionDirective::AllSubtypes) {
                self.add_all_subtypes(id);
            }
        }
        if directives.contains(InclusionDirective::DirectSupertypes) {
            self.add_direct_supertypes(name);
        }
        if directives.contains(InclusionDirective::AllSupertypes) {
            self.add_all_supertypes(name);
        }
        if directives.includes_public_api() {
            let api = self.public_api_types(name);
            for found in &api {
                self.add_name(found);
            }
            if directives.contains(InclusionDirective::PublicApiSupertypes) {
                for found in &api {
                    self.add_all_supertypes(found);
                }
            }
            if directives.contains(InclusionDirective::PublicApiSubtypes) {
                for found in &api {
                    if let Some(id) = self.index.get(found) {
                        self.add_all_subtypes(id);
                    }
                }
            }
        }
    }

    fn add_direct_subtypes(&mut self, id: NodeId) {
        let index = self.index;
        for &sub in index.subtypes(id) {
            let info = index.node(sub);
            if self.admits_subtype(info) {
                self.add_name(&info.name);
            }
        }
    }

    fn add_all_subtypes(&mut self, root: NodeId) {
        let index = self.index;
        let mut visited = FxHashSet::default();
        visited.insert(root);
        let mut worklist = vec![root];
        while let Some(id) = worklist.pop() {
            for &sub in index.subtypes(id) {
                let info = index.node(sub);
                if self.admits_subtype(info) && visited.insert(sub) {
                    self.add_name(&info.name);
                    worklist.push(sub);
                }
            }
        }
    }

    fn add_direct_supertypes(&mut self, name: &str) {
        let Some(info) = self.describe(name) else {
            return;
        };
        for parent in self.parents(info) {
            self.add_name(parent);
        }
    }

    /// Walk supertypes through the build index and external types alike
    ///
    /// Superclasses are always traversed; `add_name` decides what is admitted.
    fn add_all_supertypes(&mut self, name: &str) {
        let Some(start) = normalize_type_name(name) else {
            return;
        };
        let mut visited: FxHashSet<String> = FxHashSet::default();
        let mut worklist = vec![start];
        while let Some(current) = worklist.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let Some(info) = self.describe(&current) else {
                continue;
            };
            for parent in info.supertypes() {
                let Some(parent) = normalize_type_name(parent) else {
                    continue;
                };
                if parent == current {
                    continue;
                }
                self.add_name(&parent);
                worklist.push(parent);
            }
        }
    }

    /// Concrete types mentioned by the public members of `name`
    fn public_api_types(&self, name: &str) -> IndexSet<String> {
        let mut found = IndexSet::new();
        let Some(info) = self.describe(name) else {
            return found;
        };
        for field in info.fields.iter().filter(|f| f.visibility.is_public()) {
            collect_signature(&field.signature, &mut found);
        }
        for method in info.methods.iter().filter(|m| m.visibility.is_public()) {
            collect_signature(&method.return_type, &mut found);
            for param in &method.parameters {
                collect_signature(&param.signature, &mut found);
            }
            for thrown in &method.throws {
                collect_signature(thrown, &mut found);
            }
        }
        for ctor in info.constructors.iter().filter(|c| c.visibility.is_public()) {
            for param in &ctor.parameters {
                collect_signature(&param.signature, &mut found);
            }
            for thrown in &ctor.throws {
                collect_signature(thrown, &mut found);
            }
        }
        trace!(name, count = found.len(), "collected public API types");
        found
    }
}

/// Add every concrete type named inside `signature`
///
/// `found` doubles as the visited set; children are still visited when a
/// name repeats so that `List<A>` and `List<B>` both contribute.
fn collect_signature(signature: &GenericSignature, found: &mut IndexSet<String>) {
    match signature {
        GenericSignature::ClassRef(name) => {
            if let Some(name) = normalize_type_name(name) {
                found.insert(name);
            }
        }
        GenericSignature::Parameterized { raw, owner, args } => {
            if let Some(name) = normalize_type_name(raw) {
                found.insert(name);
            }
            if let Some(owner) = owner {
                collect_signature(owner, found);
            }
            for arg in args {
                collect_signature(arg, found);
            }
        }
        GenericSignature::TypeVariable { bounds, .. } => {
            for bound in bounds {
                collect_signature(bound, found);
            }
        }
        GenericSignature::Wildcard { upper, lower } => {
            for bound in upper.iter().chain(lower) {
                collect_signature(bound, found);
            }
        }
        GenericSignature::GenericArray(component) => collect_signature(component, found),
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolves seeds against a class index
pub struct TypeGraphResolver<'a> {
    index: &'a ClassIndex,
    external: &'a dyn ExternalTypes,
}

impl<'a> TypeGraphResolver<'a> {
    /// Create a resolver over build types and external types
    pub fn new(index: &'a ClassIndex, external: &'a dyn ExternalTypes) -> Self {
        Self { index, external }
    }

    /// Expand `seeds` into the introspectable and proxyable type sets
    pub fn resolve(&self, seeds: &[Seed]) -> Resolution {
        let mut reflective = Collector::new(CollectorKind::Reflective, self.index, self.external);
        let mut proxies = Collector::new(CollectorKind::Proxy, self.index, self.external);

        for seed in seeds {
            trace!(name = %seed.name, role = ?seed.role, directives = ?seed.directives, "applying seed");
            match seed.role {
                SeedRole::Reflective => {
                    reflective.add_name(&seed.name);
                    reflective.apply(&seed.name, seed.directives);
                }
                SeedRole::Proxy => {
                    reflective.add_name(&seed.name);
                    proxies.add_name(&seed.name);
                    proxies.apply(&seed.name, seed.directives);
                }
            }
        }

        let proxyable = proxies.names;
        let mut introspectable = reflective.names;
        introspectable.extend(proxyable.iter().cloned());
        let unresolved: IndexSet<String> = introspectable
            .iter()
            .filter(|name| !self.index.contains(name))
            .cloned()
            .collect();

        debug!(
            seeds = seeds.len(),
            introspectable = introspectable.len(),
            proxyable = proxyable.len(),
            unresolved = unresolved.len(),
            "resolved type graph"
        );
        Resolution {
            introspectable,
            proxyable,
            unresolved,
        }
    }
}
