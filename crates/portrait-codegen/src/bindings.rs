//! Host bindings
//!
//! A compiled dispatch table needs a body for every invocable member. Bodies
//! are registered per host type with [`TypeBindings`], keyed by the member's
//! erased signature, and receive arguments already converted to [`Native`]
//! values. Registration erases the host type into [`HostBindings`] so a
//! [`BindingRegistry`] can hold bindings for many types.

use crate::error::{GeneratorError, GeneratorResult};
use portrait_runtime::{InvokeError, Native, ObjectRef, Value};
use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Body of a constructor
pub type ConstructorBody = Arc<dyn Fn(&[Native]) -> Result<Value, InvokeError> + Send + Sync>;

/// Body of a method; the receiver is `None` for static methods
pub type MethodBody =
    Arc<dyn Fn(Option<&ObjectRef>, &[Native]) -> Result<Native, InvokeError> + Send + Sync>;

/// Field read
pub type FieldGetter = Arc<dyn Fn(Option<&ObjectRef>) -> Result<Native, InvokeError> + Send + Sync>;

/// Field write
pub type FieldSetter =
    Arc<dyn Fn(Option<&ObjectRef>, Native) -> Result<(), InvokeError> + Send + Sync>;

/// Key of a member binding: `name(param,param)`
///
/// Constructors use the name `<init>`.
pub fn member_key(name: &str, parameter_type_names: &[&str]) -> String {
    format!("{}({})", name, parameter_type_names.join(","))
}

/// Name under which constructors are keyed
pub const CONSTRUCTOR: &str = "<init>";

/// Bound method
#[derive(Clone)]
pub struct MethodBinding {
    /// Bound as a static method
    pub is_static: bool,
    /// Host body
    pub body: MethodBody,
}

/// Bound field
#[derive(Clone)]
pub struct FieldBinding {
    /// Bound as a static field
    pub is_static: bool,
    /// Read accessor
    pub get: FieldGetter,
    /// Write accessor, absent for read-only bindings
    pub set: Option<FieldSetter>,
}

// ============================================================================
// Type-erased Bindings
// ============================================================================

/// Bindings of one type with the host type erased
#[derive(Clone)]
pub struct HostBindings {
    type_name: String,
    host_type: Option<TypeId>,
    constructors: FxHashMap<String, ConstructorBody>,
    methods: FxHashMap<String, MethodBinding>,
    fields: FxHashMap<String, FieldBinding>,
    object_instance: Option<Value>,
    enum_constants: Option<Vec<Value>>,
}

impl HostBindings {
    /// Empty bindings for `type_name`; every member compiles unbound
    pub fn empty(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            host_type: None,
            constructors: FxHashMap::default(),
            methods: FxHashMap::default(),
            fields: FxHashMap::default(),
            object_instance: None,
            enum_constants: None,
        }
    }

    /// Qualified name of the bound type
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Rust type of receivers, if any member is bound
    pub fn host_type(&self) -> Option<TypeId> {
        self.host_type
    }

    /// Constructor body by key
    pub fn constructor(&self, key: &str) -> Option<&ConstructorBody> {
        self.constructors.get(key)
    }

    /// Method binding by key
    pub fn method(&self, key: &str) -> Option<&MethodBinding> {
        self.methods.get(key)
    }

    /// Field binding by name
    pub fn field(&self, name: &str) -> Option<&FieldBinding> {
        self.fields.get(name)
    }

    /// Singleton instance
    pub fn object_instance(&self) -> Option<&Value> {
        self.object_instance.as_ref()
    }

    /// Enum constants in declaration order
    pub fn enum_constants(&self) -> Option<&[Value]> {
        self.enum_constants.as_deref()
    }

    /// Keys of all constructor bindings
    pub fn constructor_keys(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Keys of all method bindings
    pub fn method_keys(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Names of all field bindings
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl fmt::Debug for HostBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBindings")
            .field("type_name", &self.type_name)
            .field("constructors", &self.constructors.len())
            .field("methods", &self.methods.len())
            .field("fields", &self.fields.len())
            .field("object_instance", &self.object_instance.is_some())
            .field("enum_constants", &self.enum_constants.as_ref().map(Vec::len))
            .finish()
    }
}

// ============================================================================
// Typed Registration
// ============================================================================

/// Bindings of the host type `T`, registered builder style
///
/// ```ignore
/// let bindings = TypeBindings::<Point>::new("geo.Point")
///     .constructor(&["int", "int"], |args| Ok(Point::new(args[0].as_int()?, args[1].as_int()?)))
///     .method("norm", &[], |p, _| Ok(Native::Double(p.norm())))
///     .field("x", |p| Native::Int(p.x), |p, v| { p.x = v.as_int()?; Ok(()) });
/// ```
pub struct TypeBindings<T> {
    inner: HostBindings,
    type_name: Arc<str>,
    _host: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> TypeBindings<T> {
    /// Start bindings for `type_name` backed by host type `T`
    pub fn new(type_name: &str) -> Self {
        let mut inner = HostBindings::empty(type_name);
        inner.host_type = Some(TypeId::of::<T>());
        Self {
            inner,
            type_name: Arc::from(type_name),
            _host: PhantomData,
        }
    }

    /// Bind a constructor
    pub fn constructor<F>(mut self, params: &[&str], body: F) -> Self
    where
        F: Fn(&[Native]) -> Result<T, InvokeError> + Send + Sync + 'static,
    {
        let type_name = Arc::clone(&self.type_name);
        let body: ConstructorBody = Arc::new(move |args: &[Native]| {
            let host = body(args)?;
            Ok(Value::Object(ObjectRef::new(Arc::clone(&type_name), host)))
        });
        self.inner
            .constructors
            .insert(member_key(CONSTRUCTOR, params), body);
        self
    }

    /// Bind an instance method reading the receiver
    pub fn method<F>(self, name: &str, params: &[&str], body: F) -> Self
    where
        F: Fn(&T, &[Native]) -> Result<Native, InvokeError> + Send + Sync + 'static,
    {
        let key = member_key(name, params);
        let expected = Arc::clone(&self.type_name);
        let member = key.clone();
        self.bind_method(
            key,
            false,
            Arc::new(move |receiver: Option<&ObjectRef>, args: &[Native]| {
                let obj = receiver.ok_or_else(|| InvokeError::MissingReceiver(member.clone()))?;
                obj.with(|host: &T| body(host, args))
                    .unwrap_or_else(|| Err(mismatch(&expected, obj)))
            }),
        )
    }

    /// Bind an instance method mutating the receiver
    pub fn method_mut<F>(self, name: &str, params: &[&str], body: F) -> Self
    where
        F: Fn(&mut T, &[Native]) -> Result<Native, InvokeError> + Send + Sync + 'static,
    {
        let key = member_key(name, params);
        let expected = Arc::clone(&self.type_name);
        let member = key.clone();
        self.bind_method(
            key,
            false,
            Arc::new(move |receiver: Option<&ObjectRef>, args: &[Native]| {
                let obj = receiver.ok_or_else(|| InvokeError::MissingReceiver(member.clone()))?;
                obj.with_mut(|host: &mut T| body(host, args))
                    .unwrap_or_else(|| Err(mismatch(&expected, obj)))
            }),
        )
    }

    /// Bind a static method
    pub fn static_method<F>(self, name: &str, params: &[&str], body: F) -> Self
    where
        F: Fn(&[Native]) -> Result<Native, InvokeError> + Send + Sync + 'static,
    {
        self.bind_method(
            member_key(name, params),
            true,
            Arc::new(move |_: Option<&ObjectRef>, args: &[Native]| body(args)),
        )
    }

    fn bind_method(mut self, key: String, is_static: bool, body: MethodBody) -> Self {
        self.inner
            .methods
            .insert(key, MethodBinding { is_static, body });
        self
    }

    /// Bind a mutable instance field
    pub fn field<G, S>(mut self, name: &str, get: G, set: S) -> Self
    where
        G: Fn(&T) -> Native + Send + Sync + 'static,
        S: Fn(&mut T, Native) -> Result<(), InvokeError> + Send + Sync + 'static,
    {
        let getter = self.instance_getter(name, get);
        let expected = Arc::clone(&self.type_name);
        let member = name.to_string();
        let setter: FieldSetter = Arc::new(move |receiver: Option<&ObjectRef>, value: Native| {
            let obj = receiver.ok_or_else(|| InvokeError::MissingReceiver(member.clone()))?;
            obj.with_mut(|host: &mut T| set(host, value))
                .unwrap_or_else(|| Err(mismatch(&expected, obj)))
        });
        self.inner.fields.insert(
            name.to_string(),
            FieldBinding {
                is_static: false,
                get: getter,
                set: Some(setter),
            },
        );
        self
    }

    /// Bind a read-only instance field
    pub fn readonly_field<G>(mut self, name: &str, get: G) -> Self
    where
        G: Fn(&T) -> Native + Send + Sync + 'static,
    {
        let getter = self.instance_getter(name, get);
        self.inner.fields.insert(
            name.to_string(),
            FieldBinding {
                is_static: false,
                get: getter,
                set: None,
            },
        );
        self
    }

    /// Bind a read-only static field
    pub fn static_field<G>(mut self, name: &str, get: G) -> Self
    where
        G: Fn() -> Native + Send + Sync + 'static,
    {
        self.inner.fields.insert(
            name.to_string(),
            FieldBinding {
                is_static: true,
                get: Arc::new(move |_: Option<&ObjectRef>| Ok(get())),
                set: None,
            },
        );
        self
    }

    fn instance_getter<G>(&self, name: &str, get: G) -> FieldGetter
    where
        G: Fn(&T) -> Native + Send + Sync + 'static,
    {
        let expected = Arc::clone(&self.type_name);
        let member = name.to_string();
        Arc::new(move |receiver: Option<&ObjectRef>| {
            let obj = receiver.ok_or_else(|| InvokeError::MissingReceiver(member.clone()))?;
            obj.with(|host: &T| get(host))
                .ok_or_else(|| mismatch(&expected, obj))
        })
    }

    /// Bind the singleton instance of an object type
    pub fn singleton(mut self, host: T) -> Self {
        self.inner.object_instance = Some(Value::Object(ObjectRef::new(
            Arc::clone(&self.type_name),
            host,
        )));
        self
    }

    /// Bind the constants of an enum type, in declaration order
    pub fn enum_constants(mut self, constants: impl IntoIterator<Item = T>) -> Self {
        let values = constants
            .into_iter()
            .map(|host| Value::Object(ObjectRef::new(Arc::clone(&self.type_name), host)))
            .collect();
        self.inner.enum_constants = Some(values);
        self
    }

    /// Erase the host type
    pub fn into_host(self) -> HostBindings {
        self.inner
    }
}

fn mismatch(expected: &str, obj: &ObjectRef) -> InvokeError {
    InvokeError::ReceiverMismatch {
        expected: expected.to_string(),
        found: obj.type_name().to_string(),
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Bindings for every type of a build, by qualified name
#[derive(Debug, Default, Clone)]
pub struct BindingRegistry {
    types: FxHashMap<String, HostBindings>,
}

impl BindingRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register typed bindings
    pub fn register<T: Any + Send + Sync>(&mut self, bindings: TypeBindings<T>) -> GeneratorResult<()> {
        self.register_host(bindings.into_host())
    }

    /// Register type-erased bindings
    pub fn register_host(&mut self, bindings: HostBindings) -> GeneratorResult<()> {
        if self.types.contains_key(bindings.type_name()) {
            return Err(GeneratorError::DuplicateType(bindings.type_name().to_string()));
        }
        self.types.insert(bindings.type_name().to_string(), bindings);
        Ok(())
    }

    /// Bindings of `type_name`
    pub fn get(&self, type_name: &str) -> Option<&HostBindings> {
        self.types.get(type_name)
    }

    /// Number of bound types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if no type is bound
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Point {
        x: i32,
    }

    #[test]
    fn test_member_key() {
        assert_eq!(member_key("put", &["java.lang.String", "int"]), "put(java.lang.String,int)");
        assert_eq!(member_key(CONSTRUCTOR, &[]), "<init>()");
    }

    #[test]
    fn test_typed_bindings_erase() {
        let host = TypeBindings::<Point>::new("geo.Point")
            .constructor(&["int"], |args| Ok(Point { x: args[0].as_int()? }))
            .method("getX", &[], |p, _| Ok(Native::Int(p.x)))
            .field("x", |p| Native::Int(p.x), |p, v| {
                p.x = v.as_int()?;
                Ok(())
            })
            .into_host();
        assert_eq!(host.type_name(), "geo.Point");
        assert_eq!(host.host_type(), Some(TypeId::of::<Point>()));

        let point = (host.constructor("<init>(int)").unwrap())(&[Native::Int(3)]).unwrap();
        let obj = point.as_object().unwrap();
        assert_eq!(obj.type_name(), "geo.Point");

        let get_x = &host.method("getX()").unwrap().body;
        assert_eq!(get_x(Some(obj), &[]).unwrap(), Native::Int(3));
        let field = host.field("x").unwrap();
        (field.set.as_ref().unwrap())(Some(obj), Native::Int(9)).unwrap();
        assert_eq!((field.get)(Some(obj)).unwrap(), Native::Int(9));
    }

    #[test]
    fn test_wrong_receiver() {
        let host = TypeBindings::<Point>::new("geo.Point")
            .method("getX", &[], |p, _| Ok(Native::Int(p.x)))
            .into_host();
        let other = ObjectRef::new("geo.Other", 5_u8);
        let body = &host.method("getX()").unwrap().body;
        assert!(matches!(
            body(Some(&other), &[]),
            Err(InvokeError::ReceiverMismatch { .. })
        ));
        assert!(matches!(body(None, &[]), Err(InvokeError::MissingReceiver(_))));
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = BindingRegistry::new();
        registry
            .register(TypeBindings::<Point>::new("geo.Point"))
            .unwrap();
        assert!(matches!(
            registry.register_host(HostBindings::empty("geo.Point")),
            Err(GeneratorError::DuplicateType(_))
        ));
        assert_eq!(registry.len(), 1);
    }
}
