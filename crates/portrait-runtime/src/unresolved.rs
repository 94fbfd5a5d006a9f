//! Placeholder for names no provider knows

use crate::descriptor::Descriptor;
use crate::error::{PortraitError, PortraitResult};
use crate::value::Value;
use portrait_meta::{TypeDescriptor, TypeKind};

/// Descriptor returned by the non-throwing lookup when a name is unknown
///
/// Its shape has the requested name and nothing else; every invocation fails
/// with [`PortraitError::Unresolved`].
#[derive(Debug, Clone)]
pub struct UnresolvedDescriptor {
    shape: TypeDescriptor,
}

impl UnresolvedDescriptor {
    /// Create a placeholder for `name`
    pub fn new(name: &str) -> Self {
        Self {
            shape: TypeDescriptor::new(name, TypeKind::Class),
        }
    }

    fn unresolved<T>(&self) -> PortraitResult<T> {
        Err(PortraitError::Unresolved(self.shape.qualified_name.clone()))
    }
}

impl Descriptor for UnresolvedDescriptor {
    fn qualified_name(&self) -> &str {
        &self.shape.qualified_name
    }

    fn shape(&self) -> PortraitResult<&TypeDescriptor> {
        Ok(&self.shape)
    }

    fn is_unresolved(&self) -> bool {
        true
    }

    fn new_instance(&self, _index: usize, _args: &[Value]) -> PortraitResult<Value> {
        self.unresolved()
    }

    fn invoke(&self, _index: usize, _instance: Option<&Value>, _args: &[Value]) -> PortraitResult<Value> {
        self.unresolved()
    }

    fn get(&self, _index: usize, _instance: Option<&Value>) -> PortraitResult<Value> {
        self.unresolved()
    }

    fn set(&self, _index: usize, _instance: Option<&Value>, _value: Value) -> PortraitResult<()> {
        self.unresolved()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorExt;

    #[test]
    fn test_placeholder_shape() {
        let placeholder = UnresolvedDescriptor::new("com.example.Missing");
        assert!(placeholder.is_unresolved());
        assert_eq!(placeholder.simple_name().unwrap(), "Missing");
        assert!(placeholder.shape().unwrap().methods.is_empty());
    }

    #[test]
    fn test_placeholder_rejects_invocation() {
        let placeholder = UnresolvedDescriptor::new("com.example.Missing");
        assert!(matches!(
            placeholder.new_instance(0, &[]),
            Err(PortraitError::Unresolved(name)) if name == "com.example.Missing"
        ));
        assert!(placeholder.get(0, None).is_err());
    }
}
