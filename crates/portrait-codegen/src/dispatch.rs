//! Dispatch generation
//!
//! Compiles a [`TypeDescriptor`] and the host bindings of its type into a
//! [`DispatchTable`]: index-addressed constructors, methods and fields whose
//! positions follow declaration order in the metadata. Arguments are checked
//! against the declared parameter types before a body runs, and results are
//! checked against the declared return type before they are boxed. With a
//! [`TypeHierarchy`], objects of build types are also checked against
//! reference slots; objects of other types are left to the host body.

use crate::bindings::{
    member_key, ConstructorBody, FieldGetter, FieldSetter, HostBindings, MethodBody, CONSTRUCTOR,
};
use crate::error::{GeneratorError, GeneratorResult};
use crate::index::TypeHierarchy;
use portrait_meta::{encode_base64, MethodEntry, TypeDescriptor, TypeKind};
use portrait_runtime::{
    out_of_bounds, CompiledType, InvokeError, MemberKind, Native, ObjectRef, PrimitiveKind,
    TypeFactory, Value,
};
use rustc_hash::FxHashSet;
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// Slots
// ============================================================================

/// Declared type of a parameter, field or return value
#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Primitive(PrimitiveKind),
    Reference(String),
}

impl Slot {
    fn of(type_name: &str) -> Self {
        match PrimitiveKind::from_name(type_name) {
            Some(kind) => Slot::Primitive(kind),
            None => Slot::Reference(type_name.to_string()),
        }
    }

    /// Convert an incoming boxed value
    fn accept(&self, value: &Value, hierarchy: Option<&TypeHierarchy>) -> Result<Native, InvokeError> {
        match self {
            Slot::Primitive(kind) => kind.unbox(value),
            Slot::Reference(name) if assignable(value, name, hierarchy) => Ok(Native::Ref(value.clone())),
            Slot::Reference(name) => Err(InvokeError::TypeMismatch {
                expected: name.clone(),
                found: value.type_name().to_string(),
            }),
        }
    }

    /// Check and box a value produced by a body
    fn produce(&self, native: Native, hierarchy: Option<&TypeHierarchy>) -> Result<Value, InvokeError> {
        match self {
            Slot::Primitive(PrimitiveKind::Void) => Ok(Value::Null),
            Slot::Primitive(kind) if native.kind() == Some(*kind) => Ok(native.boxed()),
            Slot::Primitive(kind) => Err(InvokeError::TypeMismatch {
                expected: kind.name().to_string(),
                found: native.boxed().type_name().to_string(),
            }),
            Slot::Reference(name) => {
                let value = native.boxed();
                if assignable(&value, name, hierarchy) {
                    Ok(value)
                } else {
                    Err(InvokeError::TypeMismatch {
                        expected: name.clone(),
                        found: value.type_name().to_string(),
                    })
                }
            }
        }
    }
}

fn assignable(value: &Value, name: &str, hierarchy: Option<&TypeHierarchy>) -> bool {
    match (value, hierarchy) {
        (Value::Object(obj), Some(hierarchy)) => hierarchy
            .is_assignable(obj.type_name(), name)
            .unwrap_or(true),
        _ => value.is_assignable_to(name),
    }
}

fn convert_args(
    member: &str,
    params: &[Slot],
    args: &[Value],
    hierarchy: Option<&TypeHierarchy>,
) -> Result<Vec<Native>, InvokeError> {
    if params.len() != args.len() {
        return Err(InvokeError::ArityMismatch {
            member: member.to_string(),
            expected: params.len(),
            found: args.len(),
        });
    }
    params
        .iter()
        .zip(args)
        .map(|(slot, arg)| slot.accept(arg, hierarchy))
        .collect()
}

// ============================================================================
// Compiled Members
// ============================================================================

struct CompiledConstructor {
    signature: String,
    params: Vec<Slot>,
    body: Option<ConstructorBody>,
}

struct CompiledMethod {
    signature: String,
    is_static: bool,
    params: Vec<Slot>,
    ret: Slot,
    body: Option<MethodBody>,
}

struct CompiledField {
    name: String,
    is_static: bool,
    is_final: bool,
    slot: Slot,
    get: Option<FieldGetter>,
    set: Option<FieldSetter>,
}

/// Index-addressed dispatch for one type
pub struct DispatchTable {
    type_name: String,
    host_type: Option<TypeId>,
    constructors: Vec<CompiledConstructor>,
    methods: Vec<CompiledMethod>,
    fields: Vec<CompiledField>,
    proxy_methods: Vec<MethodEntry>,
    object_instance: Option<Value>,
    enum_constants: Option<Vec<Value>>,
    hierarchy: Option<Arc<TypeHierarchy>>,
}

impl DispatchTable {
    /// Qualified type name
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Number of constructors
    pub fn constructor_count(&self) -> usize {
        self.constructors.len()
    }

    /// Number of methods
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Number of fields
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Number of members that compiled without a host body
    pub fn unbound_count(&self) -> usize {
        self.constructors.iter().filter(|c| c.body.is_none()).count()
            + self.methods.iter().filter(|m| m.body.is_none()).count()
            + self.fields.iter().filter(|f| f.get.is_none()).count()
    }

    fn unbound(&self, member: &str) -> InvokeError {
        InvokeError::Unbound(format!("{}.{}", self.type_name, member))
    }

    /// Resolve the receiver of an instance member
    fn receiver<'v>(&self, member: &str, instance: Option<&'v Value>) -> Result<&'v ObjectRef, InvokeError> {
        let obj = match instance {
            Some(Value::Object(obj)) => obj,
            None | Some(Value::Null) => return Err(InvokeError::MissingReceiver(member.to_string())),
            Some(other) => {
                return Err(InvokeError::ReceiverMismatch {
                    expected: self.type_name.clone(),
                    found: other.type_name().to_string(),
                })
            }
        };
        match self.host_type {
            Some(host) if obj.payload_type_id() != host => Err(InvokeError::ReceiverMismatch {
                expected: self.type_name.clone(),
                found: obj.type_name().to_string(),
            }),
            _ => Ok(obj),
        }
    }

    /// Invoke constructor `index`
    pub fn invoke_constructor(&self, index: usize, args: &[Value]) -> Result<Value, InvokeError> {
        let ctor = self
            .constructors
            .get(index)
            .ok_or_else(|| out_of_bounds(MemberKind::Constructor, index, &self.type_name))?;
        let natives = convert_args(&ctor.signature, &ctor.params, args, self.hierarchy.as_deref())?;
        let body = ctor.body.as_ref().ok_or_else(|| self.unbound(&ctor.signature))?;
        body(&natives)
    }

    /// Invoke method `index`
    pub fn invoke_method(
        &self,
        index: usize,
        instance: Option<&Value>,
        args: &[Value],
    ) -> Result<Value, InvokeError> {
        let method = self
            .methods
            .get(index)
            .ok_or_else(|| out_of_bounds(MemberKind::Method, index, &self.type_name))?;
        if method.params.len() != args.len() {
            return Err(InvokeError::ArityMismatch {
                member: method.signature.clone(),
                expected: method.params.len(),
                found: args.len(),
            });
        }
        let receiver = if method.is_static {
            None
        } else {
            Some(self.receiver(&method.signature, instance)?)
        };
        let hierarchy = self.hierarchy.as_deref();
        let natives = convert_args(&method.signature, &method.params, args, hierarchy)?;
        let body = method.body.as_ref().ok_or_else(|| self.unbound(&method.signature))?;
        method.ret.produce(body(receiver, &natives)?, hierarchy)
    }

    /// Read field `index`
    pub fn get_field(&self, index: usize, instance: Option<&Value>) -> Result<Value, InvokeError> {
        let field = self.field(index)?;
        let receiver = self.field_receiver(field, instance)?;
        let get = field.get.as_ref().ok_or_else(|| self.unbound(&field.name))?;
        field.slot.produce(get(receiver)?, self.hierarchy.as_deref())
    }

    /// Write field `index`
    pub fn set_field(
        &self,
        index: usize,
        instance: Option<&Value>,
        value: Value,
    ) -> Result<(), InvokeError> {
        let field = self.field(index)?;
        if field.is_final {
            return Err(InvokeError::Unsupported(format!(
                "{}.{} is final",
                self.type_name, field.name
            )));
        }
        let receiver = self.field_receiver(field, instance)?;
        let native = field.slot.accept(&value, self.hierarchy.as_deref())?;
        let set = field.set.as_ref().ok_or_else(|| self.unbound(&field.name))?;
        set(receiver, native)
    }

    fn field(&self, index: usize) -> Result<&CompiledField, InvokeError> {
        self.fields
            .get(index)
            .ok_or_else(|| out_of_bounds(MemberKind::Field, index, &self.type_name))
    }

    fn field_receiver<'v>(
        &self,
        field: &CompiledField,
        instance: Option<&'v Value>,
    ) -> Result<Option<&'v ObjectRef>, InvokeError> {
        if field.is_static {
            Ok(None)
        } else {
            self.receiver(&field.name, instance).map(Some)
        }
    }

    /// Describe proxy method `index`
    pub fn describe_proxy_method(&self, index: usize) -> Result<MethodEntry, InvokeError> {
        self.proxy_methods
            .get(index)
            .cloned()
            .ok_or_else(|| out_of_bounds(MemberKind::ProxyMethod, index, &self.type_name))
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("type_name", &self.type_name)
            .field("constructors", &self.constructors.len())
            .field("methods", &self.methods.len())
            .field("fields", &self.fields.len())
            .field("proxy_methods", &self.proxy_methods.len())
            .finish()
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Compiles descriptors and bindings into dispatch tables
///
/// In lenient mode a member without a body compiles to a slot that fails
/// with [`InvokeError::Unbound`] when invoked. In strict mode every
/// invocable member must be bound; abstract methods and constructors of
/// abstract types are exempt.
#[derive(Debug, Clone, Default)]
pub struct DispatchGenerator {
    strict: bool,
    hierarchy: Option<Arc<TypeHierarchy>>,
}

impl DispatchGenerator {
    /// Lenient generator
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a body for every invocable member
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Check objects of build types against reference slots
    pub fn with_hierarchy(mut self, hierarchy: Arc<TypeHierarchy>) -> Self {
        self.hierarchy = Some(hierarchy);
        self
    }

    /// Compile `descriptor` against `bindings`
    pub fn compile(
        &self,
        descriptor: &TypeDescriptor,
        bindings: &HostBindings,
    ) -> GeneratorResult<DispatchTable> {
        let type_name = descriptor.qualified_name.as_str();
        if bindings.type_name() != type_name {
            return Err(GeneratorError::BindingMismatch {
                type_name: type_name.to_string(),
                member: bindings.type_name().to_string(),
                reason: "bindings registered for another type".to_string(),
            });
        }
        let instantiable = descriptor.kind == TypeKind::Class && !descriptor.modifiers.is_abstract;

        let mut used_constructors = FxHashSet::default();
        let mut constructors = Vec::with_capacity(descriptor.constructors.len());
        for ctor in &descriptor.constructors {
            let params: Vec<&str> = ctor.parameter_type_names.iter().map(String::as_str).collect();
            let signature = member_key(CONSTRUCTOR, &params);
            let body = bindings.constructor(&signature).cloned();
            if body.is_none() && instantiable {
                self.missing(type_name, &signature)?;
            }
            used_constructors.insert(signature.clone());
            constructors.push(CompiledConstructor {
                params: params.iter().map(|p| Slot::of(p)).collect(),
                signature,
                body,
            });
        }

        let mut used_methods = FxHashSet::default();
        let mut methods = Vec::with_capacity(descriptor.methods.len());
        for method in &descriptor.methods {
            let signature = method.signature();
            let binding = bindings.method(&signature);
            match binding {
                Some(b) if b.is_static != method.modifiers.is_static => {
                    return Err(static_mismatch(type_name, &signature, method.modifiers.is_static));
                }
                None if !method.modifiers.is_abstract => self.missing(type_name, &signature)?,
                _ => {}
            }
            used_methods.insert(signature.clone());
            methods.push(CompiledMethod {
                is_static: method.modifiers.is_static,
                params: method.parameter_type_names.iter().map(|p| Slot::of(p)).collect(),
                ret: Slot::of(&method.return_type_name),
                body: binding.map(|b| b.body.clone()),
                signature,
            });
        }

        let mut used_fields = FxHashSet::default();
        let mut fields = Vec::with_capacity(descriptor.fields.len());
        for field in &descriptor.fields {
            let binding = bindings.field(&field.name);
            match binding {
                Some(b) if b.is_static != field.modifiers.is_static => {
                    return Err(static_mismatch(type_name, &field.name, field.modifiers.is_static));
                }
                None => self.missing(type_name, &field.name)?,
                _ => {}
            }
            used_fields.insert(field.name.clone());
            fields.push(CompiledField {
                name: field.name.clone(),
                is_static: field.modifiers.is_static,
                is_final: field.modifiers.is_final,
                slot: Slot::of(&field.type_name),
                get: binding.map(|b| b.get.clone()),
                set: binding.and_then(|b| b.set.clone()),
            });
        }

        if self.strict {
            let stray = bindings
                .constructor_keys()
                .find(|k| !used_constructors.contains(*k))
                .or_else(|| bindings.method_keys().find(|k| !used_methods.contains(*k)))
                .or_else(|| bindings.field_names().find(|k| !used_fields.contains(*k)));
            if let Some(member) = stray {
                return Err(GeneratorError::BindingMismatch {
                    type_name: type_name.to_string(),
                    member: member.to_string(),
                    reason: "no public member with this signature".to_string(),
                });
            }
        }

        let object_instance = match descriptor.kind {
            TypeKind::Object => {
                if bindings.object_instance().is_none() {
                    self.missing(type_name, "INSTANCE")?;
                }
                bindings.object_instance().cloned()
            }
            _ => None,
        };
        let enum_constants = match descriptor.kind {
            TypeKind::Enum => {
                if bindings.enum_constants().is_none() {
                    self.missing(type_name, "values()")?;
                }
                bindings.enum_constants().map(<[Value]>::to_vec)
            }
            _ => None,
        };

        let table = DispatchTable {
            type_name: type_name.to_string(),
            host_type: bindings.host_type(),
            constructors,
            methods,
            fields,
            proxy_methods: descriptor.proxy_methods.clone().unwrap_or_default(),
            object_instance,
            enum_constants,
            hierarchy: self.hierarchy.clone(),
        };
        debug!(
            type_name,
            constructors = table.constructor_count(),
            methods = table.method_count(),
            fields = table.field_count(),
            unbound = table.unbound_count(),
            "compiled dispatch table"
        );
        Ok(table)
    }

    fn missing(&self, type_name: &str, member: &str) -> GeneratorResult<()> {
        if self.strict {
            return Err(GeneratorError::MissingBinding {
                type_name: type_name.to_string(),
                member: member.to_string(),
            });
        }
        Ok(())
    }
}

fn static_mismatch(type_name: &str, member: &str, declared_static: bool) -> GeneratorError {
    let reason = if declared_static {
        "member is static but the binding is not"
    } else {
        "binding is static but the member is not"
    };
    GeneratorError::BindingMismatch {
        type_name: type_name.to_string(),
        member: member.to_string(),
        reason: reason.to_string(),
    }
}

// ============================================================================
// Generated Type
// ============================================================================

/// Compiled type produced by the generator: a dispatch table plus its
/// encoded metadata
#[derive(Clone)]
pub struct GeneratedType {
    table: Arc<DispatchTable>,
    metadata: Arc<str>,
}

impl GeneratedType {
    /// Pair a table with its metadata
    pub fn new(table: DispatchTable, metadata: impl Into<Arc<str>>) -> Self {
        Self {
            table: Arc::new(table),
            metadata: metadata.into(),
        }
    }

    /// Encode `descriptor` and compile its dispatch table
    pub fn compile(
        generator: &DispatchGenerator,
        descriptor: &TypeDescriptor,
        bindings: &HostBindings,
    ) -> GeneratorResult<Self> {
        let metadata = encode_base64(descriptor)?;
        let table = generator.compile(descriptor, bindings)?;
        Ok(Self::new(table, metadata))
    }

    /// Dispatch table
    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    /// Factory handing out this compiled type
    pub fn factory(&self) -> TypeFactory {
        let compiled = self.clone();
        Arc::new(move || Arc::new(compiled.clone()) as Arc<dyn CompiledType>)
    }
}

impl fmt::Debug for GeneratedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedType")
            .field("table", &self.table)
            .field("metadata_len", &self.metadata.len())
            .finish()
    }
}

impl CompiledType for GeneratedType {
    fn type_name(&self) -> &str {
        self.table.type_name()
    }

    fn metadata(&self) -> &str {
        &self.metadata
    }

    fn invoke_constructor(&self, index: usize, args: &[Value]) -> Result<Value, InvokeError> {
        self.table.invoke_constructor(index, args)
    }

    fn invoke_method(
        &self,
        index: usize,
        instance: Option<&Value>,
        args: &[Value],
    ) -> Result<Value, InvokeError> {
        self.table.invoke_method(index, instance, args)
    }

    fn get_field(&self, index: usize, instance: Option<&Value>) -> Result<Value, InvokeError> {
        self.table.get_field(index, instance)
    }

    fn set_field(
        &self,
        index: usize,
        instance: Option<&Value>,
        value: Value,
    ) -> Result<(), InvokeError> {
        self.table.set_field(index, instance, value)
    }

    fn describe_proxy_method(&self, index: usize) -> Result<MethodEntry, InvokeError> {
        self.table.describe_proxy_method(index)
    }

    fn object_instance(&self) -> Option<Value> {
        self.table.object_instance.clone()
    }

    fn enum_constants(&self) -> Option<Vec<Value>> {
        self.table.enum_constants.clone()
    }
}
