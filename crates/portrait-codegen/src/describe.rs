//! Type description
//!
//! Turns [`TypeInfo`] into the [`TypeDescriptor`] that is encoded into
//! metadata. Only public members are described, in declaration order.

use crate::error::GeneratorResult;
use crate::index::{describe_any, ClassIndex, ExternalTypes, MethodInfo, ParameterInfo, TypeInfo};
use portrait_meta::{
    AnnotationEntry, ConstructorEntry, FieldEntry, MemberModifiers, MethodEntry, TypeDescriptor,
};
use rustc_hash::FxHashSet;

const OBJECT: &str = "java.lang.Object";

/// Methods every proxy answers, ahead of the interface's own methods
pub fn object_methods() -> Vec<MethodEntry> {
    vec![
        MethodEntry::new("equals", OBJECT, vec![OBJECT.to_string()], "boolean"),
        MethodEntry::new("hashCode", OBJECT, Vec::new(), "int"),
        MethodEntry::new("toString", OBJECT, Vec::new(), "java.lang.String"),
    ]
}

/// Builds descriptors from type information
pub struct TypeDescriber<'a> {
    index: &'a ClassIndex,
    external: &'a dyn ExternalTypes,
}

impl<'a> TypeDescriber<'a> {
    /// Create a describer; supertypes are looked up in `index`, then `external`
    pub fn new(index: &'a ClassIndex, external: &'a dyn ExternalTypes) -> Self {
        Self { index, external }
    }

    /// Describe `info`, with a proxy-method table when `proxyable`
    pub fn describe(&self, info: &TypeInfo, proxyable: bool) -> GeneratorResult<TypeDescriptor> {
        let mut descriptor = TypeDescriptor::new(info.name.as_str(), info.kind);
        descriptor.modifiers = info.modifiers;
        if info.is_interface() {
            descriptor.modifiers.is_abstract = true;
        }
        descriptor.superclass_name = info.superclass.clone();
        descriptor.interface_names = info.interfaces.clone();
        descriptor.annotations = info.annotations.clone();

        descriptor.constructors = info
            .constructors
            .iter()
            .filter(|c| c.visibility.is_public())
            .map(|c| ConstructorEntry {
                declaring_type_name: info.name.clone(),
                parameter_type_names: erased(&c.parameters),
                modifiers: MemberModifiers::INSTANCE,
                annotations: c.annotations.clone(),
                parameter_annotations: parameter_annotations(&c.parameters),
            })
            .collect();

        descriptor.methods = info
            .methods
            .iter()
            .filter(|m| m.visibility.is_public())
            .map(|m| method_entry(&info.name, m))
            .collect();

        descriptor.fields = info
            .fields
            .iter()
            .filter(|f| f.visibility.is_public())
            .map(|f| FieldEntry {
                name: f.name.clone(),
                declaring_type_name: info.name.clone(),
                type_name: f.signature.erasure(),
                modifiers: f.modifiers,
                annotations: f.annotations.clone(),
            })
            .collect();

        if proxyable && info.is_interface() {
            descriptor.proxy_methods = Some(self.proxy_methods(info));
        }

        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Object methods, then abstract interface methods including inherited
    /// ones, without repeated signatures
    fn proxy_methods(&self, info: &TypeInfo) -> Vec<MethodEntry> {
        let mut methods = object_methods();
        let mut signatures: FxHashSet<String> = methods.iter().map(MethodEntry::signature).collect();
        let mut visited: FxHashSet<&str> = FxHashSet::default();

        let mut worklist: Vec<&TypeInfo> = vec![info];
        while let Some(current) = worklist.pop() {
            if !visited.insert(current.name.as_str()) {
                continue;
            }
            for method in &current.methods {
                if !method.visibility.is_public()
                    || method.modifiers.is_static
                    || !method.modifiers.is_abstract
                {
                    continue;
                }
                let entry = method_entry(&current.name, method);
                if signatures.insert(entry.signature()) {
                    methods.push(entry);
                }
            }
            for parent in current.interfaces.iter().rev() {
                if let Some(parent) = describe_any(self.index, self.external, parent) {
                    worklist.push(parent);
                }
            }
        }
        methods
    }
}

fn method_entry(declaring: &str, method: &MethodInfo) -> MethodEntry {
    MethodEntry {
        name: method.name.clone(),
        declaring_type_name: declaring.to_string(),
        parameter_type_names: erased(&method.parameters),
        return_type_name: method.return_type.erasure(),
        modifiers: method.modifiers,
        annotations: method.annotations.clone(),
        parameter_annotations: parameter_annotations(&method.parameters),
        generic_return_type: method.return_type.clone(),
    }
}

fn erased(parameters: &[ParameterInfo]) -> Vec<String> {
    parameters.iter().map(|p| p.signature.erasure()).collect()
}

/// Per-parameter annotation lists, empty when no parameter is annotated
fn parameter_annotations(parameters: &[ParameterInfo]) -> Vec<Vec<AnnotationEntry>> {
    if parameters.iter().all(|p| p.annotations.is_empty()) {
        return Vec::new();
    }
    parameters.iter().map(|p| p.annotations.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ConstructorInfo, FieldInfo, NoExternalTypes, Visibility};
    use portrait_meta::{GenericSignature, TypeKind};

    fn string() -> GenericSignature {
        GenericSignature::class("java.lang.String")
    }

    #[test]
    fn test_public_members_only() {
        let info = TypeInfo::class("a.Point")
            .with_constructor(ConstructorInfo::public(vec!["int".into(), "int".into()]))
            .with_field(FieldInfo::public("x", GenericSignature::class("int")))
            .with_field(FieldInfo::public("secret", string()).with_visibility(Visibility::Private))
            .with_method(MethodInfo::public(
                "names",
                Vec::new(),
                GenericSignature::parameterized("java.util.List", vec![string()]),
            ))
            .with_method(
                MethodInfo::public("internal", Vec::new(), GenericSignature::class("void"))
                    .with_visibility(Visibility::Package),
            );
        let index = ClassIndex::new();
        let desc = TypeDescriber::new(&index, &NoExternalTypes)
            .describe(&info, false)
            .unwrap();
        assert_eq!(desc.constructors.len(), 1);
        assert_eq!(desc.constructors[0].parameter_type_names, vec!["int", "int"]);
        assert_eq!(desc.fields.len(), 1);
        assert_eq!(desc.fields[0].name, "x");
        assert_eq!(desc.methods.len(), 1);
        assert_eq!(desc.methods[0].return_type_name, "java.util.List");
        assert_eq!(desc.methods[0].generic_return_type.depth(), 2);
        assert!(desc.proxy_methods.is_none());
    }

    #[test]
    fn test_proxy_methods_include_inherited() {
        let index = ClassIndex::from_types([
            TypeInfo::interface("a.Named").with_method(
                MethodInfo::public("name", Vec::new(), string()).into_abstract(),
            ),
            TypeInfo::interface("a.Greeter")
                .implements("a.Named")
                .with_method(MethodInfo::public("greet", vec!["java.lang.String".into()], string()).into_abstract())
                .with_method(MethodInfo::public("name", Vec::new(), string()).into_abstract())
                .with_method(MethodInfo::public("loud", Vec::new(), string()))
                .with_method(MethodInfo::public("create", Vec::new(), string()).into_static())
                .with_method(MethodInfo::public("toString", Vec::new(), string()).into_abstract()),
        ])
        .unwrap();
        let greeter = index.info("a.Greeter").unwrap();
        let desc = TypeDescriber::new(&index, &NoExternalTypes)
            .describe(greeter, true)
            .unwrap();
        let proxied: Vec<String> = desc
            .proxy_methods
            .unwrap()
            .iter()
            .map(MethodEntry::signature)
            .collect();
        assert_eq!(
            proxied,
            vec![
                "equals(java.lang.Object)",
                "hashCode()",
                "toString()",
                "greet(java.lang.String)",
                "name()",
            ]
        );
        assert!(desc.modifiers.is_abstract);
        assert_eq!(desc.kind, TypeKind::Interface);
    }

    #[test]
    fn test_class_never_gets_proxy_methods() {
        let info = TypeInfo::class("a.Impl");
        let index = ClassIndex::new();
        let desc = TypeDescriber::new(&index, &NoExternalTypes)
            .describe(&info, true)
            .unwrap();
        assert!(desc.proxy_methods.is_none());
    }

    #[test]
    fn test_invalid_modifiers_rejected() {
        let mut info = TypeInfo::class("a.Sealed");
        info.modifiers.is_sealed = true;
        let index = ClassIndex::new();
        assert!(TypeDescriber::new(&index, &NoExternalTypes)
            .describe(&info, false)
            .is_err());
    }
}
