//! Provider for primitive and array types
//!
//! Primitives have no compiled metadata of their own and arrays are never
//! packaged, so both are answered here at the highest priority.

use crate::descriptor::Descriptor;
use crate::error::PortraitResult;
use crate::portrait::Portrait;
use crate::provider::{priority, Provider};
use crate::value::PrimitiveKind;
use portrait_meta::{TypeDescriptor, TypeKind};
use std::sync::Arc;
use tracing::trace;

/// Descriptor of a primitive type
#[derive(Debug)]
pub struct PrimitiveDescriptor {
    kind: PrimitiveKind,
    shape: TypeDescriptor,
}

impl PrimitiveDescriptor {
    /// Create the descriptor of `kind`
    pub fn new(kind: PrimitiveKind) -> Self {
        let mut shape = TypeDescriptor::new(kind.name(), TypeKind::Class);
        shape.modifiers.is_abstract = true;
        Self { kind, shape }
    }

    /// Primitive kind
    pub fn primitive_kind(&self) -> PrimitiveKind {
        self.kind
    }
}

impl Descriptor for PrimitiveDescriptor {
    fn qualified_name(&self) -> &str {
        self.kind.name()
    }

    fn shape(&self) -> PortraitResult<&TypeDescriptor> {
        Ok(&self.shape)
    }

    fn is_primitive(&self) -> bool {
        true
    }
}

/// Descriptor of an array type
#[derive(Debug)]
pub struct ArrayDescriptor {
    shape: TypeDescriptor,
    component: Arc<dyn Descriptor>,
}

impl ArrayDescriptor {
    /// Create an array descriptor named `name` over `component`
    pub fn new(name: &str, component: Arc<dyn Descriptor>) -> Self {
        let mut shape = TypeDescriptor::new(name, TypeKind::Class);
        shape.simple_name = format!("{}[]", simple_component_name(&*component));
        shape.modifiers.is_abstract = true;
        shape.superclass_name = Some("java.lang.Object".to_string());
        shape.interface_names = vec![
            "java.lang.Cloneable".to_string(),
            "java.io.Serializable".to_string(),
        ];
        Self { shape, component }
    }
}

fn simple_component_name(component: &dyn Descriptor) -> String {
    component
        .shape()
        .map(|s| s.simple_name.clone())
        .unwrap_or_else(|_| component.qualified_name().to_string())
}

impl Descriptor for ArrayDescriptor {
    fn qualified_name(&self) -> &str {
        &self.shape.qualified_name
    }

    fn shape(&self) -> PortraitResult<&TypeDescriptor> {
        Ok(&self.shape)
    }

    fn component_type(&self) -> Option<Arc<dyn Descriptor>> {
        Some(Arc::clone(&self.component))
    }
}

/// Component name of an array type name, if `name` denotes an array
///
/// Accepts source form (`int[]`, `a.B[][]`) and descriptor form (`[I`,
/// `[[I`, `[La.B;`).
pub fn array_component_name(name: &str) -> Option<String> {
    if let Some(component) = name.strip_suffix("[]") {
        return (!component.is_empty()).then(|| component.to_string());
    }
    let rest = name.strip_prefix('[')?;
    if rest.starts_with('[') {
        return Some(rest.to_string());
    }
    if let Some(class) = rest.strip_prefix('L') {
        let class = class.strip_suffix(';')?;
        return (!class.is_empty()).then(|| class.to_string());
    }
    let mut chars = rest.chars();
    let code = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    PrimitiveKind::from_descriptor_code(code)
        .filter(|kind| *kind != PrimitiveKind::Void)
        .map(|kind| kind.name().to_string())
}

/// Provider of primitive and array descriptors
#[derive(Debug, Default)]
pub struct WellKnownProvider;

impl WellKnownProvider {
    /// Create the provider
    pub fn new() -> Self {
        Self
    }
}

impl Provider for WellKnownProvider {
    fn priority(&self) -> i32 {
        priority::WELL_KNOWN
    }

    fn for_name(&self, name: &str, portrait: &Portrait) -> PortraitResult<Option<Arc<dyn Descriptor>>> {
        if let Some(kind) = PrimitiveKind::from_name(name) {
            return Ok(Some(Arc::new(PrimitiveDescriptor::new(kind))));
        }
        let Some(component_name) = array_component_name(name) else {
            return Ok(None);
        };
        trace!(name, component = %component_name, "resolving array component");
        let component = portrait.for_name_or_unresolved(&component_name)?;
        Ok(Some(Arc::new(ArrayDescriptor::new(name, component))))
    }

    fn label(&self) -> &'static str {
        "well-known"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_component_names() {
        assert_eq!(array_component_name("int[]").as_deref(), Some("int"));
        assert_eq!(array_component_name("a.B[][]").as_deref(), Some("a.B[]"));
        assert_eq!(array_component_name("[I").as_deref(), Some("int"));
        assert_eq!(array_component_name("[[J").as_deref(), Some("[J"));
        assert_eq!(
            array_component_name("[Ljava.lang.String;").as_deref(),
            Some("java.lang.String")
        );
        assert_eq!(array_component_name("[V"), None);
        assert_eq!(array_component_name("[Q"), None);
        assert_eq!(array_component_name("[Lfoo"), None);
        assert_eq!(array_component_name("[]"), None);
        assert_eq!(array_component_name("java.lang.String"), None);
    }

    #[test]
    fn test_primitive_descriptor() {
        let desc = PrimitiveDescriptor::new(PrimitiveKind::Long);
        assert!(desc.is_primitive());
        assert_eq!(desc.qualified_name(), "long");
        assert_eq!(desc.primitive_kind(), PrimitiveKind::Long);
    }
}
