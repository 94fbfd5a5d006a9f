//! Integration tests for descriptor resolution over compiled providers
//!
//! The compiled types here are written by hand in the shape generated code
//! takes: embedded base64 metadata plus index-addressed dispatch.

use parking_lot::Mutex;
use portrait_meta::{
    encode_base64, ConstructorEntry, FieldEntry, MemberModifiers, MethodEntry, TypeDescriptor,
    TypeKind,
};
use portrait_runtime::{
    name_hash, out_of_bounds, priority, CompiledProvider, CompiledType, DescriptorExt, HashBucket,
    InvokeError, MemberKind, NamedFactory, Portrait, PortraitError, PrimitiveKind, ProxyHandler,
    Shard, Value,
};
use std::sync::Arc;

// ============================================================================
// Fixtures
// ============================================================================

const COUNTER: &str = "com.example.Counter";
const GREETER: &str = "com.example.Greeter";

struct CounterState {
    count: i32,
}

struct CounterType {
    metadata: String,
}

impl CounterType {
    fn new() -> Self {
        let mut shape = TypeDescriptor::new(COUNTER, TypeKind::Class);
        shape.superclass_name = Some("java.lang.Object".to_string());
        shape.interface_names = vec![GREETER.to_string()];
        shape
            .constructors
            .push(ConstructorEntry::new(COUNTER, vec!["int".to_string()]));
        shape
            .methods
            .push(MethodEntry::new("increment", COUNTER, vec!["int".to_string()], "int"));
        let mut zero = MethodEntry::new("zero", COUNTER, Vec::new(), COUNTER);
        zero.modifiers = MemberModifiers::STATIC;
        shape.methods.push(zero);
        shape.fields.push(FieldEntry::new("count", COUNTER, "int"));
        Self {
            metadata: encode_base64(&shape).unwrap(),
        }
    }

    fn receiver<'a>(&self, instance: Option<&'a Value>) -> Result<&'a portrait_runtime::ObjectRef, InvokeError> {
        let obj = instance
            .and_then(Value::as_object)
            .ok_or_else(|| InvokeError::MissingReceiver(COUNTER.to_string()))?;
        if !obj.is::<CounterState>() {
            return Err(InvokeError::ReceiverMismatch {
                expected: COUNTER.to_string(),
                found: obj.type_name().to_string(),
            });
        }
        Ok(obj)
    }
}

impl CompiledType for CounterType {
    fn type_name(&self) -> &str {
        COUNTER
    }

    fn metadata(&self) -> &str {
        &self.metadata
    }

    fn invoke_constructor(&self, index: usize, args: &[Value]) -> Result<Value, InvokeError> {
        match index {
            0 => {
                let count = PrimitiveKind::Int.unbox(&args[0])?.as_int()?;
                Ok(Value::object(COUNTER, CounterState { count }))
            }
            _ => Err(out_of_bounds(MemberKind::Constructor, index, COUNTER)),
        }
    }

    fn invoke_method(&self, index: usize, instance: Option<&Value>, args: &[Value]) -> Result<Value, InvokeError> {
        match index {
            0 => {
                let by = PrimitiveKind::Int.unbox(&args[0])?.as_int()?;
                let obj = self.receiver(instance)?;
                let count = obj
                    .with_mut(|s: &mut CounterState| {
                        s.count += by;
                        s.count
                    })
                    .unwrap_or_default();
                Ok(Value::Int(count))
            }
            1 => Ok(Value::object(COUNTER, CounterState { count: 0 })),
            _ => Err(out_of_bounds(MemberKind::Method, index, COUNTER)),
        }
    }

    fn get_field(&self, index: usize, instance: Option<&Value>) -> Result<Value, InvokeError> {
        match index {
            0 => {
                let obj = self.receiver(instance)?;
                Ok(Value::Int(obj.with(|s: &CounterState| s.count).unwrap_or_default()))
            }
            _ => Err(out_of_bounds(MemberKind::Field, index, COUNTER)),
        }
    }
}

struct GreeterType {
    metadata: String,
    proxy_methods: Vec<MethodEntry>,
}

impl GreeterType {
    fn new() -> Self {
        let mut shape = TypeDescriptor::new(GREETER, TypeKind::Interface);
        let mut greet = MethodEntry::new(
            "greet",
            GREETER,
            vec!["java.lang.String".to_string()],
            "java.lang.String",
        );
        greet.modifiers.is_abstract = true;
        shape.methods.push(greet.clone());
        let proxy_methods = vec![
            MethodEntry::new("equals", "java.lang.Object", vec!["java.lang.Object".to_string()], "boolean"),
            MethodEntry::new("hashCode", "java.lang.Object", Vec::new(), "int"),
            MethodEntry::new("toString", "java.lang.Object", Vec::new(), "java.lang.String"),
            greet,
        ];
        shape.proxy_methods = Some(proxy_methods.clone());
        Self {
            metadata: encode_base64(&shape).unwrap(),
            proxy_methods,
        }
    }
}

impl CompiledType for GreeterType {
    fn type_name(&self) -> &str {
        GREETER
    }

    fn metadata(&self) -> &str {
        &self.metadata
    }

    fn describe_proxy_method(&self, index: usize) -> Result<MethodEntry, InvokeError> {
        self.proxy_methods
            .get(index)
            .cloned()
            .ok_or_else(|| out_of_bounds(MemberKind::ProxyMethod, index, GREETER))
    }
}

fn factory(name: &'static str) -> NamedFactory {
    NamedFactory::new(
        name,
        Arc::new(move || -> Arc<dyn CompiledType> {
            match name {
                COUNTER => Arc::new(CounterType::new()),
                _ => Arc::new(GreeterType::new()),
            }
        }),
    )
}

fn compiled_provider() -> CompiledProvider {
    // Both names start with 'c' and land in one shard
    CompiledProvider::from_shards(vec![Shard::new(
        'c',
        vec![
            HashBucket::new(name_hash(COUNTER), vec![factory(COUNTER)]),
            HashBucket::new(name_hash(GREETER), vec![factory(GREETER)]),
        ],
    )])
}

fn portrait() -> Portrait {
    Portrait::builder()
        .well_known()
        .provider(compiled_provider())
        .build()
}

// ============================================================================
// Resolution
// ============================================================================

mod resolution {
    use super::*;

    #[test]
    fn test_compiled_type_resolves() {
        let portrait = portrait();
        let counter = portrait.for_name(COUNTER).unwrap();
        assert_eq!(counter.qualified_name(), COUNTER);
        assert_eq!(counter.simple_name().unwrap(), "Counter");
        assert_eq!(counter.kind().unwrap(), TypeKind::Class);
        assert_eq!(counter.shape().unwrap().member_count(), 4);
        assert!(portrait.is_cached(COUNTER));
    }

    #[test]
    fn test_provider_order() {
        let portrait = portrait();
        let priorities: Vec<i32> = portrait.providers().iter().map(|p| p.priority()).collect();
        assert_eq!(priorities, vec![priority::WELL_KNOWN, priority::GENERATED]);
    }

    #[test]
    fn test_unknown_name() {
        let portrait = portrait();
        assert!(matches!(
            portrait.for_name("com.example.Nope"),
            Err(PortraitError::LookupFailed(_))
        ));
        assert!(portrait.for_name_or_unresolved("com.example.Nope").unwrap().is_unresolved());
    }

    #[test]
    fn test_supertypes_resolve_lazily() {
        let portrait = portrait();
        let counter = portrait.for_name(COUNTER).unwrap();
        let interfaces = counter.interfaces(&portrait).unwrap();
        assert_eq!(interfaces.len(), 1);
        assert_eq!(interfaces[0].qualified_name(), GREETER);

        // java.lang.Object is not packaged here
        let superclass = counter.superclass(&portrait).unwrap().unwrap();
        assert!(superclass.is_unresolved());

        let greeter = portrait.for_name(GREETER).unwrap();
        assert!(greeter.is_assignable_from(&*counter, &portrait).unwrap());
        assert!(counter.is_subclass_of(GREETER, &portrait).unwrap());
    }

    #[test]
    fn test_array_of_compiled_type() {
        let portrait = portrait();
        let array = portrait.for_name("[Lcom.example.Counter;").unwrap();
        let component = array.component_type().unwrap();
        assert_eq!(component.qualified_name(), COUNTER);
        assert!(!component.is_unresolved());
        assert_eq!(array.simple_name().unwrap(), "Counter[]");
    }

    #[test]
    fn test_shared_across_threads() {
        let portrait = Arc::new(portrait());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let portrait = Arc::clone(&portrait);
                std::thread::spawn(move || portrait.for_name(COUNTER).unwrap())
            })
            .collect();
        let descriptors: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for d in &descriptors[1..] {
            assert!(Arc::ptr_eq(&descriptors[0], d));
        }
    }
}

// ============================================================================
// Dispatch
// ============================================================================

mod dispatch {
    use super::*;

    #[test]
    fn test_construct_invoke_and_read() {
        let portrait = portrait();
        let counter = portrait.for_name(COUNTER).unwrap();
        let (ctor, _) = counter.constructor(&["int"]).unwrap().unwrap();
        let instance = counter.new_instance(ctor, &[Value::Int(5)]).unwrap();

        let (increment, _) = counter.method("increment", &["int"]).unwrap().unwrap();
        let result = counter.invoke(increment, Some(&instance), &[Value::Int(2)]).unwrap();
        assert_eq!(result, Value::Int(7));

        let (field, entry) = counter.field("count").unwrap().unwrap();
        assert_eq!(entry.type_name, "int");
        assert_eq!(counter.get(field, Some(&instance)).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_static_method_ignores_receiver() {
        let portrait = portrait();
        let counter = portrait.for_name(COUNTER).unwrap();
        let (zero, entry) = counter.method("zero", &[]).unwrap().unwrap();
        assert!(entry.modifiers.is_static);
        let made = counter.invoke(zero, None, &[]).unwrap();
        assert_eq!(made.type_name(), COUNTER);
    }

    #[test]
    fn test_out_of_range_index() {
        let portrait = portrait();
        let counter = portrait.for_name(COUNTER).unwrap();
        let err = counter.invoke(9, None, &[]).unwrap_err();
        assert!(matches!(
            err,
            PortraitError::Invoke(InvokeError::IndexOutOfBounds { index: 9, member: MemberKind::Method, .. })
        ));
        assert!(counter.set(0, None, Value::Int(1)).is_err());
    }

    #[test]
    fn test_argument_type_checked() {
        let portrait = portrait();
        let counter = portrait.for_name(COUNTER).unwrap();
        let err = counter.new_instance(0, &[Value::Long(5)]).unwrap_err();
        assert!(matches!(err, PortraitError::Invoke(InvokeError::TypeMismatch { .. })));
        let err = counter.new_instance(0, &[Value::Null]).unwrap_err();
        assert!(matches!(err, PortraitError::Invoke(InvokeError::NullPrimitive("int"))));
    }

    #[test]
    fn test_missing_receiver() {
        let portrait = portrait();
        let counter = portrait.for_name(COUNTER).unwrap();
        let err = counter.invoke(0, None, &[Value::Int(1)]).unwrap_err();
        assert!(matches!(err, PortraitError::Invoke(InvokeError::MissingReceiver(_))));
    }
}

// ============================================================================
// Proxies
// ============================================================================

mod proxies {
    use super::*;

    #[test]
    fn test_proxy_routes_to_handler() {
        let portrait = portrait();
        let greeter = portrait.for_name(GREETER).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let handler: Arc<dyn ProxyHandler> = Arc::new(
            move |_proxy: &Value, method: &MethodEntry, args: &[Value]| -> Result<Value, InvokeError> {
                log.lock().push(method.signature());
                let who = args.first().and_then(Value::as_str).unwrap_or("nobody");
                Ok(Value::string(&format!("hello {who}")))
            },
        );
        let proxy = greeter.create_proxy(handler).unwrap();
        assert_eq!(proxy.type_name(), "com.example.Greeter$Proxy");

        let (greet, _) = greeter.method("greet", &["java.lang.String"]).unwrap().unwrap();
        let result = greeter.invoke(greet, Some(&proxy), &[Value::string("ada")]).unwrap();
        assert_eq!(result.as_str(), Some("hello ada"));
        assert_eq!(*seen.lock(), vec!["greet(java.lang.String)".to_string()]);
    }

    #[test]
    fn test_proxy_arity_checked() {
        let portrait = portrait();
        let greeter = portrait.for_name(GREETER).unwrap();
        let handler: Arc<dyn ProxyHandler> =
            Arc::new(|_: &Value, _: &MethodEntry, _: &[Value]| -> Result<Value, InvokeError> { Ok(Value::Null) });
        let proxy = greeter.create_proxy(handler).unwrap();
        let err = greeter.invoke(0, Some(&proxy), &[]).unwrap_err();
        assert!(matches!(
            err,
            PortraitError::Invoke(InvokeError::ArityMismatch { expected: 1, found: 0, .. })
        ));
    }

    #[test]
    fn test_class_cannot_be_proxied() {
        let portrait = portrait();
        let counter = portrait.for_name(COUNTER).unwrap();
        let handler: Arc<dyn ProxyHandler> =
            Arc::new(|_: &Value, _: &MethodEntry, _: &[Value]| -> Result<Value, InvokeError> { Ok(Value::Null) });
        assert!(counter.create_proxy(handler).is_err());
    }
}
