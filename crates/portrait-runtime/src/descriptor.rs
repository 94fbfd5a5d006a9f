//! Queryable type descriptors
//!
//! [`Descriptor`] is what the resolution engine hands out. Shape queries go
//! through [`Descriptor::shape`]; lookups that need other types take the
//! [`Portrait`] that resolved the descriptor.

use crate::compiled::{out_of_bounds, CompiledType};
use crate::error::{InvokeError, MemberKind, PortraitError, PortraitResult};
use crate::portrait::Portrait;
use crate::proxy::{ProxyHandler, ProxyInstance};
use crate::value::{ObjectRef, Value};
use once_cell::sync::OnceCell;
use portrait_meta::{
    decode_base64, AnnotationEntry, ConstructorEntry, FieldEntry, MethodEntry, TypeDescriptor,
    TypeKind,
};
use rustc_hash::FxHashSet;
use std::fmt;
use std::sync::Arc;

/// Compiled, queryable representation of a type
pub trait Descriptor: Send + Sync + fmt::Debug {
    /// Qualified name this descriptor was resolved under
    fn qualified_name(&self) -> &str;

    /// Decoded shape of the type
    fn shape(&self) -> PortraitResult<&TypeDescriptor>;

    /// Whether the type is a primitive
    fn is_primitive(&self) -> bool {
        false
    }

    /// Whether this is a placeholder for a name no provider knows
    fn is_unresolved(&self) -> bool {
        false
    }

    /// Component type of an array type
    fn component_type(&self) -> Option<Arc<dyn Descriptor>> {
        None
    }

    /// Invoke constructor `index`
    fn new_instance(&self, index: usize, args: &[Value]) -> PortraitResult<Value> {
        let _ = (index, args);
        Err(unsupported(self.qualified_name(), "construction"))
    }

    /// Invoke method `index`
    fn invoke(&self, index: usize, instance: Option<&Value>, args: &[Value]) -> PortraitResult<Value> {
        let _ = (index, instance, args);
        Err(unsupported(self.qualified_name(), "method invocation"))
    }

    /// Read field `index`
    fn get(&self, index: usize, instance: Option<&Value>) -> PortraitResult<Value> {
        let _ = (index, instance);
        Err(unsupported(self.qualified_name(), "field access"))
    }

    /// Write field `index`
    fn set(&self, index: usize, instance: Option<&Value>, value: Value) -> PortraitResult<()> {
        let _ = (index, instance, value);
        Err(unsupported(self.qualified_name(), "field access"))
    }

    /// Singleton instance of an object type
    fn object_instance(&self) -> Option<Value> {
        None
    }

    /// Constants of an enum type
    fn enum_constants(&self) -> Option<Vec<Value>> {
        None
    }

    /// Create a proxy implementing this interface
    fn create_proxy(&self, handler: Arc<dyn ProxyHandler>) -> PortraitResult<Value> {
        let _ = handler;
        Err(unsupported(self.qualified_name(), "proxy creation"))
    }
}

fn unsupported(name: &str, what: &str) -> PortraitError {
    PortraitError::Invoke(InvokeError::Unsupported(format!("{what} on {name}")))
}

// ============================================================================
// Shape Queries
// ============================================================================

/// Lookup helpers available on every descriptor
pub trait DescriptorExt: Descriptor {
    /// Unqualified name
    fn simple_name(&self) -> PortraitResult<&str> {
        Ok(&self.shape()?.simple_name)
    }

    /// Type kind
    fn kind(&self) -> PortraitResult<TypeKind> {
        Ok(self.shape()?.kind)
    }

    /// Whether the type is an interface
    fn is_interface(&self) -> PortraitResult<bool> {
        Ok(self.shape()?.kind == TypeKind::Interface)
    }

    /// Resolve the direct supertype
    fn superclass(&self, portrait: &Portrait) -> PortraitResult<Option<Arc<dyn Descriptor>>> {
        match &self.shape()?.superclass_name {
            Some(name) => portrait.for_name_or_unresolved(name).map(Some),
            None => Ok(None),
        }
    }

    /// Resolve the directly implemented interfaces
    fn interfaces(&self, portrait: &Portrait) -> PortraitResult<Vec<Arc<dyn Descriptor>>> {
        self.shape()?
            .interface_names
            .iter()
            .map(|name| portrait.for_name_or_unresolved(name))
            .collect()
    }

    /// Check whether `ancestor` is a proper supertype of this type
    ///
    /// Walks supertypes and interfaces with a visited set; unresolved
    /// names end their branch of the walk.
    fn is_subclass_of(&self, ancestor: &str, portrait: &Portrait) -> PortraitResult<bool> {
        let shape = self.shape()?;
        let mut visited = FxHashSet::default();
        visited.insert(shape.qualified_name.clone());
        let mut worklist: Vec<String> = shape
            .superclass_name
            .iter()
            .chain(&shape.interface_names)
            .cloned()
            .collect();

        while let Some(name) = worklist.pop() {
            if name == ancestor {
                return Ok(true);
            }
            if !visited.insert(name.clone()) {
                continue;
            }
            let parent = portrait.for_name_or_unresolved(&name)?;
            if parent.is_unresolved() {
                continue;
            }
            let parent_shape = parent.shape()?;
            worklist.extend(parent_shape.superclass_name.iter().cloned());
            worklist.extend(parent_shape.interface_names.iter().cloned());
        }
        Ok(false)
    }

    /// Check whether values of `other` can be stored where this type is expected
    fn is_assignable_from(&self, other: &dyn Descriptor, portrait: &Portrait) -> PortraitResult<bool> {
        if self.qualified_name() == other.qualified_name() {
            return Ok(true);
        }
        if self.is_primitive() || other.is_primitive() {
            return Ok(false);
        }
        if self.qualified_name() == "java.lang.Object" {
            return Ok(true);
        }
        other.is_subclass_of(self.qualified_name(), portrait)
    }

    /// Find a constructor by parameter types
    fn constructor(&self, parameter_type_names: &[&str]) -> PortraitResult<Option<(usize, &ConstructorEntry)>> {
        Ok(self
            .shape()?
            .constructors
            .iter()
            .enumerate()
            .find(|(_, c)| {
                c.parameter_type_names.len() == parameter_type_names.len()
                    && c.parameter_type_names
                        .iter()
                        .zip(parameter_type_names)
                        .all(|(a, b)| a == b)
            }))
    }

    /// Find a method by name and parameter types
    fn method(&self, name: &str, parameter_type_names: &[&str]) -> PortraitResult<Option<(usize, &MethodEntry)>> {
        Ok(self
            .shape()?
            .methods
            .iter()
            .enumerate()
            .find(|(_, m)| m.matches(name, parameter_type_names)))
    }

    /// Find a field by name
    fn field(&self, name: &str) -> PortraitResult<Option<(usize, &FieldEntry)>> {
        Ok(self
            .shape()?
            .fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name))
    }

    /// Find a type annotation by annotation type name
    fn annotation(&self, type_name: &str) -> PortraitResult<Option<&AnnotationEntry>> {
        Ok(self.shape()?.annotation(type_name))
    }
}

impl<T: Descriptor + ?Sized> DescriptorExt for T {}

// ============================================================================
// Static Descriptor
// ============================================================================

/// Descriptor backed by a compiled type
///
/// Metadata is decoded on first use and kept for the descriptor's lifetime.
pub struct StaticDescriptor {
    compiled: Arc<dyn CompiledType>,
    shape: OnceCell<TypeDescriptor>,
}

impl StaticDescriptor {
    /// Wrap a compiled type
    pub fn new(compiled: Arc<dyn CompiledType>) -> Self {
        Self {
            compiled,
            shape: OnceCell::new(),
        }
    }

    /// Underlying compiled type
    pub fn compiled(&self) -> &Arc<dyn CompiledType> {
        &self.compiled
    }

    /// Route an interface method call on a proxy to its handler
    fn invoke_on_proxy(
        &self,
        proxy: &ObjectRef,
        index: usize,
        args: &[Value],
    ) -> PortraitResult<Value> {
        let shape = self.shape()?;
        let method = shape
            .methods
            .get(index)
            .ok_or_else(|| out_of_bounds(MemberKind::Method, index, self.compiled.type_name()))?;
        let params: Vec<&str> = method.parameter_type_names.iter().map(String::as_str).collect();
        let proxy_index = shape
            .proxy_methods
            .iter()
            .flatten()
            .position(|m| m.matches(&method.name, &params))
            .ok_or_else(|| {
                InvokeError::Unsupported(format!("{} is not proxied", method.signature()))
            })?;
        Ok(ProxyInstance::invoke(proxy, proxy_index, args)?)
    }
}

impl Descriptor for StaticDescriptor {
    fn qualified_name(&self) -> &str {
        self.compiled.type_name()
    }

    fn shape(&self) -> PortraitResult<&TypeDescriptor> {
        self.shape
            .get_or_try_init(|| decode_base64(self.compiled.metadata()))
            .map_err(PortraitError::from)
    }

    fn new_instance(&self, index: usize, args: &[Value]) -> PortraitResult<Value> {
        Ok(self.compiled.invoke_constructor(index, args)?)
    }

    fn invoke(&self, index: usize, instance: Option<&Value>, args: &[Value]) -> PortraitResult<Value> {
        if let Some(Value::Object(obj)) = instance {
            if obj.is::<ProxyInstance>() {
                return self.invoke_on_proxy(obj, index, args);
            }
        }
        Ok(self.compiled.invoke_method(index, instance, args)?)
    }

    fn get(&self, index: usize, instance: Option<&Value>) -> PortraitResult<Value> {
        Ok(self.compiled.get_field(index, instance)?)
    }

    fn set(&self, index: usize, instance: Option<&Value>, value: Value) -> PortraitResult<()> {
        Ok(self.compiled.set_field(index, instance, value)?)
    }

    fn object_instance(&self) -> Option<Value> {
        self.compiled.object_instance()
    }

    fn enum_constants(&self) -> Option<Vec<Value>> {
        self.compiled.enum_constants()
    }

    fn create_proxy(&self, handler: Arc<dyn ProxyHandler>) -> PortraitResult<Value> {
        let shape = self.shape()?;
        if shape.kind != TypeKind::Interface || shape.proxy_methods.is_none() {
            return Err(unsupported(self.qualified_name(), "proxy creation"));
        }
        Ok(ProxyInstance::create(Arc::clone(&self.compiled), handler))
    }
}

impl fmt::Debug for StaticDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticDescriptor")
            .field("type_name", &self.compiled.type_name())
            .field("decoded", &self.shape.get().is_some())
            .finish()
    }
}
