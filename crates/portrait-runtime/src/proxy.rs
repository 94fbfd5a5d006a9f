//! Interface proxies
//!
//! A proxy is a host object standing in for an interface implementation.
//! Calls are addressed by proxy-method index; the compiled type describes the
//! method and the handler supplies the behaviour.

use crate::compiled::CompiledType;
use crate::error::InvokeError;
use crate::value::{ObjectRef, Value};
use portrait_meta::MethodEntry;
use std::sync::Arc;

/// Behaviour behind a proxy
pub trait ProxyHandler: Send + Sync {
    /// Handle a call of `method` on `proxy`
    fn invoke(&self, proxy: &Value, method: &MethodEntry, args: &[Value]) -> Result<Value, InvokeError>;
}

impl<F> ProxyHandler for F
where
    F: Fn(&Value, &MethodEntry, &[Value]) -> Result<Value, InvokeError> + Send + Sync,
{
    fn invoke(&self, proxy: &Value, method: &MethodEntry, args: &[Value]) -> Result<Value, InvokeError> {
        self(proxy, method, args)
    }
}

/// Payload of a proxy object
pub struct ProxyInstance {
    compiled: Arc<dyn CompiledType>,
    handler: Arc<dyn ProxyHandler>,
}

impl ProxyInstance {
    /// Create a proxy object for the interface described by `compiled`
    pub fn create(compiled: Arc<dyn CompiledType>, handler: Arc<dyn ProxyHandler>) -> Value {
        let type_name = format!("{}$Proxy", compiled.type_name());
        Value::Object(ObjectRef::new(type_name, ProxyInstance { compiled, handler }))
    }

    /// Name of the proxied interface
    pub fn interface_name(&self) -> &str {
        self.compiled.type_name()
    }

    /// Invoke proxy method `index` on `proxy`
    pub fn invoke(proxy: &ObjectRef, index: usize, args: &[Value]) -> Result<Value, InvokeError> {
        let (compiled, handler) = proxy
            .with(|p: &ProxyInstance| (Arc::clone(&p.compiled), Arc::clone(&p.handler)))
            .ok_or_else(|| InvokeError::ReceiverMismatch {
                expected: "proxy".to_string(),
                found: proxy.type_name().to_string(),
            })?;
        let method = compiled.describe_proxy_method(index)?;
        if method.parameter_type_names.len() != args.len() {
            return Err(InvokeError::ArityMismatch {
                member: method.signature(),
                expected: method.parameter_type_names.len(),
                found: args.len(),
            });
        }
        handler.invoke(&Value::Object(proxy.clone()), &method, args)
    }
}
