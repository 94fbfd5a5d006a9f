//! Class index
//!
//! The compiler's view of discoverable types. Build types live in a
//! [`ClassIndex`]: an arena of [`TypeInfo`] nodes addressed by [`NodeId`], with
//! direct-subtype adjacency computed as types are inserted. Platform types
//! outside the build are reached through [`ExternalTypes`].

use crate::error::{GeneratorError, GeneratorResult};
use portrait_meta::{AnnotationEntry, GenericSignature, MemberModifiers, TypeKind, TypeModifiers};
use rustc_hash::{FxHashMap, FxHashSet};

// ============================================================================
// Type Information
// ============================================================================

/// Member or type visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    /// Visible everywhere
    #[default]
    Public,
    /// Visible to subtypes
    Protected,
    /// Visible within the package
    Package,
    /// Visible within the declaring type
    Private,
}

impl Visibility {
    /// Check for public visibility
    pub fn is_public(self) -> bool {
        self == Visibility::Public
    }
}

/// Constructor or method parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInfo {
    /// Declared type
    pub signature: GenericSignature,
    /// Parameter annotations
    pub annotations: Vec<AnnotationEntry>,
}

impl ParameterInfo {
    /// Unannotated parameter of `signature`
    pub fn new(signature: GenericSignature) -> Self {
        Self {
            signature,
            annotations: Vec::new(),
        }
    }
}

impl From<&str> for ParameterInfo {
    fn from(name: &str) -> Self {
        Self::new(GenericSignature::class(name))
    }
}

impl From<GenericSignature> for ParameterInfo {
    fn from(signature: GenericSignature) -> Self {
        Self::new(signature)
    }
}

/// Declared constructor
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorInfo {
    /// Visibility
    pub visibility: Visibility,
    /// Parameters
    pub parameters: Vec<ParameterInfo>,
    /// Declared exception types
    pub throws: Vec<GenericSignature>,
    /// Constructor annotations
    pub annotations: Vec<AnnotationEntry>,
}

impl ConstructorInfo {
    /// Public constructor taking `parameters`
    pub fn public(parameters: Vec<ParameterInfo>) -> Self {
        Self {
            visibility: Visibility::Public,
            parameters,
            throws: Vec::new(),
            annotations: Vec::new(),
        }
    }
}

/// Declared method
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    /// Method name
    pub name: String,
    /// Visibility
    pub visibility: Visibility,
    /// Modifiers
    pub modifiers: MemberModifiers,
    /// Parameters
    pub parameters: Vec<ParameterInfo>,
    /// Declared return type
    pub return_type: GenericSignature,
    /// Declared exception types
    pub throws: Vec<GenericSignature>,
    /// Method annotations
    pub annotations: Vec<AnnotationEntry>,
}

impl MethodInfo {
    /// Public instance method
    pub fn public(
        name: impl Into<String>,
        parameters: Vec<ParameterInfo>,
        return_type: GenericSignature,
    ) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            modifiers: MemberModifiers::INSTANCE,
            parameters,
            return_type,
            throws: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// Mark the method static
    pub fn into_static(mut self) -> Self {
        self.modifiers.is_static = true;
        self
    }

    /// Mark the method abstract
    pub fn into_abstract(mut self) -> Self {
        self.modifiers.is_abstract = true;
        self
    }

    /// Change visibility
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Erased signature such as `put(java.lang.String,int)`
    pub fn erased_signature(&self) -> String {
        signature_of(&self.name, &self.parameters)
    }
}

/// Declared field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Visibility
    pub visibility: Visibility,
    /// Modifiers
    pub modifiers: MemberModifiers,
    /// Declared type
    pub signature: GenericSignature,
    /// Field annotations
    pub annotations: Vec<AnnotationEntry>,
}

impl FieldInfo {
    /// Public mutable instance field
    pub fn public(name: impl Into<String>, signature: GenericSignature) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            modifiers: MemberModifiers::INSTANCE,
            signature,
            annotations: Vec::new(),
        }
    }

    /// Change visibility
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

/// Erased member signature built from a name and parameter list
pub fn signature_of(name: &str, parameters: &[ParameterInfo]) -> String {
    let params: Vec<String> = parameters.iter().map(|p| p.signature.erasure()).collect();
    format!("{}({})", name, params.join(","))
}

/// Everything the compiler knows about one type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    /// Qualified name
    pub name: String,
    /// Type kind
    pub kind: TypeKind,
    /// Type modifiers
    pub modifiers: TypeModifiers,
    /// Direct supertype
    pub superclass: Option<String>,
    /// Directly implemented (or, for interfaces, extended) interfaces
    pub interfaces: Vec<String>,
    /// Type annotations
    pub annotations: Vec<AnnotationEntry>,
    /// Declared constructors
    pub constructors: Vec<ConstructorInfo>,
    /// Declared methods
    pub methods: Vec<MethodInfo>,
    /// Declared fields
    pub fields: Vec<FieldInfo>,
}

impl TypeInfo {
    /// Empty type of the given kind
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            modifiers: TypeModifiers {
                is_abstract: kind == TypeKind::Interface,
                ..TypeModifiers::default()
            },
            superclass: None,
            interfaces: Vec::new(),
            annotations: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Empty class
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    /// Empty interface
    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    /// Set the direct supertype
    pub fn extends(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    /// Add a direct interface
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Add a type annotation
    pub fn annotated(mut self, annotation: AnnotationEntry) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Add a constructor
    pub fn with_constructor(mut self, constructor: ConstructorInfo) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Add a method
    pub fn with_method(mut self, method: MethodInfo) -> Self {
        self.methods.push(method);
        self
    }

    /// Add a field
    pub fn with_field(mut self, field: FieldInfo) -> Self {
        self.fields.push(field);
        self
    }

    /// Check whether the type is an interface
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// Direct supertypes: the superclass followed by the interfaces
    pub fn supertypes(&self) -> impl Iterator<Item = &str> {
        self.superclass
            .iter()
            .chain(&self.interfaces)
            .map(String::as_str)
    }

    /// All annotations of the given type
    pub fn annotations_of<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a AnnotationEntry> {
        self.annotations
            .iter()
            .filter(move |a| a.type_name == type_name)
    }
}

// ============================================================================
// Index
// ============================================================================

/// Arena index of a type in a [`ClassIndex`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Position in the arena
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Types of the build being compiled
#[derive(Debug, Default, Clone)]
pub struct ClassIndex {
    nodes: Vec<TypeInfo>,
    subtypes: Vec<Vec<NodeId>>,
    by_name: FxHashMap<String, NodeId>,
    /// Subtypes naming a supertype not inserted yet
    pending: FxHashMap<String, Vec<NodeId>>,
}

impl ClassIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from `types`
    pub fn from_types(types: impl IntoIterator<Item = TypeInfo>) -> GeneratorResult<Self> {
        let mut index = Self::new();
        for info in types {
            index.insert(info)?;
        }
        Ok(index)
    }

    /// Add a type
    pub fn insert(&mut self, info: TypeInfo) -> GeneratorResult<NodeId> {
        if self.by_name.contains_key(&info.name) {
            return Err(GeneratorError::DuplicateType(info.name));
        }
        let id = NodeId(self.nodes.len() as u32);

        let mut seen: Vec<&str> = Vec::new();
        for parent in info.supertypes() {
            if parent == info.name || seen.contains(&parent) {
                continue;
            }
            seen.push(parent);
            match self.by_name.get(parent) {
                Some(parent_id) => self.subtypes[parent_id.index()].push(id),
                None => self.pending.entry(parent.to_string()).or_default().push(id),
            }
        }

        let waiting = self.pending.remove(&info.name).unwrap_or_default();
        self.by_name.insert(info.name.clone(), id);
        self.nodes.push(info);
        self.subtypes.push(waiting);
        Ok(id)
    }

    /// Look up a type by name
    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// Type information of a node
    pub fn node(&self, id: NodeId) -> &TypeInfo {
        &self.nodes[id.index()]
    }

    /// Type information by name
    pub fn info(&self, name: &str) -> Option<&TypeInfo> {
        self.get(name).map(|id| self.node(id))
    }

    /// Check whether the index contains `name`
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Direct subtypes of a node, in insertion order
    pub fn subtypes(&self, id: NodeId) -> &[NodeId] {
        &self.subtypes[id.index()]
    }

    /// All nodes in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &TypeInfo)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, info)| (NodeId(i as u32), info))
    }

    /// Nodes carrying an annotation of the given type
    pub fn annotated_with<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = (NodeId, &'a TypeInfo)> {
        self.iter()
            .filter(move |(_, info)| info.annotations.iter().any(|a| a.type_name == type_name))
    }

    /// Number of types
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// ============================================================================
// External Types
// ============================================================================

/// Lookup of types outside the build (platform library)
pub trait ExternalTypes {
    /// Describe `name`, if known
    fn lookup(&self, name: &str) -> Option<&TypeInfo>;
}

/// No external types
#[derive(Debug, Default, Clone, Copy)]
pub struct NoExternalTypes;

impl ExternalTypes for NoExternalTypes {
    fn lookup(&self, _name: &str) -> Option<&TypeInfo> {
        None
    }
}

impl ExternalTypes for ClassIndex {
    fn lookup(&self, name: &str) -> Option<&TypeInfo> {
        self.info(name)
    }
}

/// Find `name` in the build first, then among external types
pub fn describe_any<'a>(
    index: &'a ClassIndex,
    external: &'a dyn ExternalTypes,
    name: &str,
) -> Option<&'a TypeInfo> {
    index.info(name).or_else(|| external.lookup(name))
}

// ============================================================================
// Hierarchy
// ============================================================================

const OBJECT: &str = "java.lang.Object";

/// Supertype closure of every build type
///
/// Lets dispatch reject an object of a known build type that is not
/// assignable to a reference slot. Names outside the build are not judged.
#[derive(Debug, Default, Clone)]
pub struct TypeHierarchy {
    supertypes: FxHashMap<String, FxHashSet<String>>,
}

impl TypeHierarchy {
    /// Compute the closure of each type in `index`, walking through
    /// external types where the build refers to them
    pub fn build(index: &ClassIndex, external: &dyn ExternalTypes) -> Self {
        let mut supertypes = FxHashMap::default();
        for (_, info) in index.iter() {
            let mut closure = FxHashSet::default();
            let mut worklist: Vec<&str> = info.supertypes().collect();
            while let Some(name) = worklist.pop() {
                if name == info.name || !closure.insert(name.to_string()) {
                    continue;
                }
                if let Some(parent) = describe_any(index, external, name) {
                    worklist.extend(parent.supertypes());
                }
            }
            supertypes.insert(info.name.clone(), closure);
        }
        Self { supertypes }
    }

    /// Check whether `name` is a build type
    pub fn knows(&self, name: &str) -> bool {
        self.supertypes.contains_key(name)
    }

    /// Whether a value of build type `name` fits a slot of type `target`
    ///
    /// `None` when `name` is not a build type.
    pub fn is_assignable(&self, name: &str, target: &str) -> Option<bool> {
        let closure = self.supertypes.get(name)?;
        Some(name == target || target == OBJECT || closure.contains(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchy_closure() {
        let index = ClassIndex::from_types([
            TypeInfo::interface("a.Api"),
            TypeInfo::class("a.Base").implements("a.Api"),
            TypeInfo::class("a.Leaf").extends("a.Base").implements("lib.Marker"),
            TypeInfo::class("a.Stranger"),
        ])
        .unwrap();
        let platform = ClassIndex::from_types([
            TypeInfo::interface("lib.Marker").implements("lib.Root"),
        ])
        .unwrap();
        let hierarchy = TypeHierarchy::build(&index, &platform);

        assert_eq!(hierarchy.is_assignable("a.Leaf", "a.Api"), Some(true));
        assert_eq!(hierarchy.is_assignable("a.Leaf", "lib.Root"), Some(true));
        assert_eq!(hierarchy.is_assignable("a.Stranger", "a.Base"), Some(false));
        assert_eq!(hierarchy.is_assignable("a.Stranger", "java.lang.Object"), Some(true));
        assert_eq!(hierarchy.is_assignable("lib.Marker", "lib.Root"), None);
        assert!(hierarchy.knows("a.Base"));
        assert!(!hierarchy.knows("lib.Marker"));
    }

    #[test]
    fn test_subtype_adjacency() {
        let index = ClassIndex::from_types([
            TypeInfo::class("a.Base"),
            TypeInfo::class("a.Mid").extends("a.Base"),
            TypeInfo::class("a.Leaf").extends("a.Mid"),
        ])
        .unwrap();
        let base = index.get("a.Base").unwrap();
        let mid = index.get("a.Mid").unwrap();
        assert_eq!(index.subtypes(base), &[mid]);
        assert_eq!(index.node(index.subtypes(mid)[0]).name, "a.Leaf");
    }

    #[test]
    fn test_forward_references() {
        let index = ClassIndex::from_types([
            TypeInfo::class("a.Impl").implements("a.Api"),
            TypeInfo::interface("a.Sub").implements("a.Api"),
            TypeInfo::interface("a.Api"),
        ])
        .unwrap();
        let api = index.get("a.Api").unwrap();
        let names: Vec<_> = index
            .subtypes(api)
            .iter()
            .map(|id| index.node(*id).name.as_str())
            .collect();
        assert_eq!(names, vec!["a.Impl", "a.Sub"]);
    }

    #[test]
    fn test_self_reference_ignored() {
        let index = ClassIndex::from_types([TypeInfo::class("a.Odd").extends("a.Odd")]).unwrap();
        let odd = index.get("a.Odd").unwrap();
        assert!(index.subtypes(odd).is_empty());
    }

    #[test]
    fn test_duplicate_rejected() {
        let result = ClassIndex::from_types([TypeInfo::class("a.A"), TypeInfo::class("a.A")]);
        assert!(matches!(result, Err(GeneratorError::DuplicateType(name)) if name == "a.A"));
    }

    #[test]
    fn test_describe_any_prefers_index() {
        let index = ClassIndex::from_types([TypeInfo::class("a.A")]).unwrap();
        let platform = ClassIndex::from_types([
            TypeInfo::interface("a.A"),
            TypeInfo::class("java.lang.Object"),
        ])
        .unwrap();
        assert!(!describe_any(&index, &platform, "a.A").unwrap().is_interface());
        assert!(describe_any(&index, &platform, "java.lang.Object").is_some());
        assert!(describe_any(&index, &NoExternalTypes, "java.lang.Object").is_none());
    }

    #[test]
    fn test_erased_signature() {
        let method = MethodInfo::public(
            "put",
            vec![
                GenericSignature::parameterized("java.util.List", vec![GenericSignature::class("a.B")]).into(),
                "int".into(),
            ],
            GenericSignature::class("void"),
        );
        assert_eq!(method.erased_signature(), "put(java.util.List,int)");
    }
}
