//! Type descriptor model
//!
//! A [`TypeDescriptor`] is the build-time description of a type's public
//! shape. Member type references are kept as names; resolving them to
//! descriptors is deferred to the runtime.

use crate::error::{MetadataError, Result};
use crate::generic::GenericSignature;
use indexmap::IndexMap;

// ============================================================================
// Type Level
// ============================================================================

/// Kind of a described type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Ordinary class
    Class,
    /// Interface
    Interface,
    /// Enumeration
    Enum,
    /// Singleton object
    Object,
}

impl TypeKind {
    /// Two-bit wire tag
    pub fn to_bits(self) -> u8 {
        match self {
            TypeKind::Class => 0,
            TypeKind::Interface => 1,
            TypeKind::Enum => 2,
            TypeKind::Object => 3,
        }
    }

    /// Inverse of [`TypeKind::to_bits`]; only the low two bits are considered
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => TypeKind::Class,
            1 => TypeKind::Interface,
            2 => TypeKind::Enum,
            _ => TypeKind::Object,
        }
    }
}

/// Type-level modifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TypeModifiers {
    /// Cannot be instantiated directly
    pub is_abstract: bool,
    /// Closed set of direct subtypes
    pub is_sealed: bool,
    /// Value-like type with generated equality
    pub is_data: bool,
    /// Companion singleton of another type
    pub is_companion: bool,
}

/// Member-level modifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MemberModifiers {
    /// Belongs to the type rather than an instance
    pub is_static: bool,
    /// Cannot be overridden or reassigned
    pub is_final: bool,
    /// Has no body
    pub is_abstract: bool,
}

impl MemberModifiers {
    /// Modifiers of a plain instance member
    pub const INSTANCE: MemberModifiers = MemberModifiers {
        is_static: false,
        is_final: false,
        is_abstract: false,
    };

    /// Modifiers of a static member
    pub const STATIC: MemberModifiers = MemberModifiers {
        is_static: true,
        is_final: false,
        is_abstract: false,
    };
}

/// Build-time description of a type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    /// Unqualified name
    pub simple_name: String,
    /// Fully qualified name
    pub qualified_name: String,
    /// Type kind
    pub kind: TypeKind,
    /// Type modifiers
    pub modifiers: TypeModifiers,
    /// Direct supertype, if any
    pub superclass_name: Option<String>,
    /// Directly implemented interfaces, in declaration order
    pub interface_names: Vec<String>,
    /// Type annotations
    pub annotations: Vec<AnnotationEntry>,
    /// Public constructors in declaration order
    pub constructors: Vec<ConstructorEntry>,
    /// Public methods in declaration order
    pub methods: Vec<MethodEntry>,
    /// Public fields in declaration order
    pub fields: Vec<FieldEntry>,
    /// Interceptable methods when the type is proxyable
    pub proxy_methods: Option<Vec<MethodEntry>>,
}

impl TypeDescriptor {
    /// Create an empty descriptor of the given kind
    ///
    /// The simple name is derived from the last `.` or `$` segment.
    /// Interfaces start out abstract.
    pub fn new(qualified_name: impl Into<String>, kind: TypeKind) -> Self {
        let qualified_name = qualified_name.into();
        Self {
            simple_name: simple_name_of(&qualified_name).to_string(),
            qualified_name,
            kind,
            modifiers: TypeModifiers {
                is_abstract: kind == TypeKind::Interface,
                ..TypeModifiers::default()
            },
            superclass_name: None,
            interface_names: Vec::new(),
            annotations: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            proxy_methods: None,
        }
    }

    /// Check model invariants
    ///
    /// `sealed` and `interface` both imply `abstract`.
    pub fn validate(&self) -> Result<()> {
        if self.qualified_name.is_empty() {
            return Err(MetadataError::InvalidDescriptor(
                "qualified name is empty".to_string(),
            ));
        }
        if self.modifiers.is_sealed && !self.modifiers.is_abstract {
            return Err(MetadataError::InvalidDescriptor(format!(
                "{}: sealed type must be abstract",
                self.qualified_name
            )));
        }
        if self.kind == TypeKind::Interface && !self.modifiers.is_abstract {
            return Err(MetadataError::InvalidDescriptor(format!(
                "{}: interface must be abstract",
                self.qualified_name
            )));
        }
        Ok(())
    }

    /// Total number of invocable members
    pub fn member_count(&self) -> usize {
        self.constructors.len() + self.methods.len() + self.fields.len()
    }

    /// Find an annotation by type name
    pub fn annotation(&self, type_name: &str) -> Option<&AnnotationEntry> {
        self.annotations
            .iter()
            .find(|a| a.type_name == type_name)
    }
}

/// Unqualified part of a type name
pub fn simple_name_of(qualified_name: &str) -> &str {
    qualified_name
        .rsplit(|c| c == '.' || c == '$')
        .next()
        .unwrap_or(qualified_name)
}

// ============================================================================
// Members
// ============================================================================

/// Public constructor
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorEntry {
    /// Declaring type name
    pub declaring_type_name: String,
    /// Parameter type names
    pub parameter_type_names: Vec<String>,
    /// Modifiers
    pub modifiers: MemberModifiers,
    /// Constructor annotations
    pub annotations: Vec<AnnotationEntry>,
    /// Per-parameter annotations
    pub parameter_annotations: Vec<Vec<AnnotationEntry>>,
}

impl ConstructorEntry {
    /// Create a constructor entry without annotations
    pub fn new(declaring_type_name: impl Into<String>, parameter_type_names: Vec<String>) -> Self {
        Self {
            declaring_type_name: declaring_type_name.into(),
            parameter_type_names,
            modifiers: MemberModifiers::default(),
            annotations: Vec::new(),
            parameter_annotations: Vec::new(),
        }
    }
}

/// Public method
#[derive(Debug, Clone, PartialEq)]
pub struct MethodEntry {
    /// Method name
    pub name: String,
    /// Declaring type name
    pub declaring_type_name: String,
    /// Parameter type names
    pub parameter_type_names: Vec<String>,
    /// Erased return type name (`void` for none)
    pub return_type_name: String,
    /// Modifiers
    pub modifiers: MemberModifiers,
    /// Method annotations
    pub annotations: Vec<AnnotationEntry>,
    /// Per-parameter annotations
    pub parameter_annotations: Vec<Vec<AnnotationEntry>>,
    /// Generic return type
    pub generic_return_type: GenericSignature,
}

impl MethodEntry {
    /// Create a method entry whose generic return type is the plain return type
    pub fn new(
        name: impl Into<String>,
        declaring_type_name: impl Into<String>,
        parameter_type_names: Vec<String>,
        return_type_name: impl Into<String>,
    ) -> Self {
        let return_type_name = return_type_name.into();
        Self {
            name: name.into(),
            declaring_type_name: declaring_type_name.into(),
            parameter_type_names,
            generic_return_type: GenericSignature::ClassRef(return_type_name.clone()),
            return_type_name,
            modifiers: MemberModifiers::default(),
            annotations: Vec::new(),
            parameter_annotations: Vec::new(),
        }
    }

    /// Check whether this method has the given name and parameter types
    pub fn matches(&self, name: &str, parameter_type_names: &[&str]) -> bool {
        self.name == name
            && self.parameter_type_names.len() == parameter_type_names.len()
            && self
                .parameter_type_names
                .iter()
                .zip(parameter_type_names)
                .all(|(a, b)| a == b)
    }

    /// Erased signature string such as `put(java.lang.String,int)`
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.parameter_type_names.join(","))
    }
}

/// Public field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    /// Field name
    pub name: String,
    /// Declaring type name
    pub declaring_type_name: String,
    /// Field type name
    pub type_name: String,
    /// Modifiers
    pub modifiers: MemberModifiers,
    /// Field annotations
    pub annotations: Vec<AnnotationEntry>,
}

impl FieldEntry {
    /// Create a field entry without annotations
    pub fn new(
        name: impl Into<String>,
        declaring_type_name: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            declaring_type_name: declaring_type_name.into(),
            type_name: type_name.into(),
            modifiers: MemberModifiers::default(),
            annotations: Vec::new(),
        }
    }
}

// ============================================================================
// Annotations
// ============================================================================

/// Annotation instance attached to a type, member or parameter
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationEntry {
    /// Annotation type name
    pub type_name: String,
    /// Unqualified annotation name
    pub simple_name: String,
    /// Qualified annotation name when known
    pub qualified_name: Option<String>,
    /// Properties in declaration order
    pub properties: IndexMap<String, AnnotationValue>,
}

impl AnnotationEntry {
    /// Create an annotation with no properties
    pub fn new(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            simple_name: simple_name_of(&type_name).to_string(),
            qualified_name: Some(type_name.clone()),
            type_name,
            properties: IndexMap::new(),
        }
    }

    /// Add a property, builder style
    pub fn with(mut self, name: impl Into<String>, value: AnnotationValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Get a property value
    pub fn get(&self, name: &str) -> Option<&AnnotationValue> {
        self.properties.get(name)
    }
}

/// Annotation property value
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    /// Absent value
    Null,
    /// String value
    String(String),
    /// Boolean value
    Bool(bool),
    /// 32-bit integer value (also bytes, shorts and chars)
    Int(i32),
    /// 64-bit integer value
    Long(i64),
    /// 32-bit float value
    Float(f32),
    /// 64-bit float value
    Double(f64),
    /// Array value
    List(Vec<AnnotationValue>),
    /// Value of a shape the codec does not model, kept as its string form
    Other(String),
}

impl AnnotationValue {
    /// Borrow the string content of `String` and `Other` values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnnotationValue::String(s) | AnnotationValue::Other(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow list content
    pub fn as_list(&self) -> Option<&[AnnotationValue]> {
        match self {
            AnnotationValue::List(items) => Some(items),
            _ => None,
        }
    }
}
