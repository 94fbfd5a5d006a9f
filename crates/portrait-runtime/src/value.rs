//! Runtime values
//!
//! [`Value`] is the generic, boxed representation passed through dispatch
//! tables; primitives travel as their boxed variants. [`Native`] is the
//! exact-typed form a member body receives after argument conversion.

use crate::error::InvokeError;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Primitive Kinds
// ============================================================================

/// Primitive type kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// `boolean`
    Boolean,
    /// `byte`
    Byte,
    /// `char`
    Char,
    /// `short`
    Short,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `void`
    Void,
}

impl PrimitiveKind {
    /// All primitive kinds
    pub const ALL: [PrimitiveKind; 9] = [
        PrimitiveKind::Boolean,
        PrimitiveKind::Byte,
        PrimitiveKind::Char,
        PrimitiveKind::Short,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
        PrimitiveKind::Void,
    ];

    /// Parse a primitive type name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Primitive type name
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Void => "void",
        }
    }

    /// Name of the boxed wrapper type
    pub fn wrapper_name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "java.lang.Boolean",
            PrimitiveKind::Byte => "java.lang.Byte",
            PrimitiveKind::Char => "java.lang.Character",
            PrimitiveKind::Short => "java.lang.Short",
            PrimitiveKind::Int => "java.lang.Integer",
            PrimitiveKind::Long => "java.lang.Long",
            PrimitiveKind::Float => "java.lang.Float",
            PrimitiveKind::Double => "java.lang.Double",
            PrimitiveKind::Void => "java.lang.Void",
        }
    }

    /// Single-letter array descriptor code (`[I` for `int[]`)
    pub fn descriptor_code(self) -> char {
        match self {
            PrimitiveKind::Boolean => 'Z',
            PrimitiveKind::Byte => 'B',
            PrimitiveKind::Char => 'C',
            PrimitiveKind::Short => 'S',
            PrimitiveKind::Int => 'I',
            PrimitiveKind::Long => 'J',
            PrimitiveKind::Float => 'F',
            PrimitiveKind::Double => 'D',
            PrimitiveKind::Void => 'V',
        }
    }

    /// Inverse of [`PrimitiveKind::descriptor_code`]
    pub fn from_descriptor_code(code: char) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.descriptor_code() == code)
    }

    /// Whether this kind is numeric (boxes to a `java.lang.Number`)
    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            PrimitiveKind::Boolean | PrimitiveKind::Char | PrimitiveKind::Void
        )
    }

    /// Convert a boxed value to this exact primitive
    ///
    /// No widening is performed: an `int` slot only accepts [`Value::Int`].
    pub fn unbox(self, value: &Value) -> Result<Native, InvokeError> {
        let native = match (self, value) {
            (_, Value::Null) if self != PrimitiveKind::Void => {
                return Err(InvokeError::NullPrimitive(self.name()))
            }
            (PrimitiveKind::Boolean, Value::Boolean(v)) => Native::Boolean(*v),
            (PrimitiveKind::Byte, Value::Byte(v)) => Native::Byte(*v),
            (PrimitiveKind::Char, Value::Char(v)) => Native::Char(*v),
            (PrimitiveKind::Short, Value::Short(v)) => Native::Short(*v),
            (PrimitiveKind::Int, Value::Int(v)) => Native::Int(*v),
            (PrimitiveKind::Long, Value::Long(v)) => Native::Long(*v),
            (PrimitiveKind::Float, Value::Float(v)) => Native::Float(*v),
            (PrimitiveKind::Double, Value::Double(v)) => Native::Double(*v),
            (PrimitiveKind::Void, Value::Null) => Native::Void,
            _ => {
                return Err(InvokeError::TypeMismatch {
                    expected: self.name().to_string(),
                    found: value.type_name().to_string(),
                })
            }
        };
        Ok(native)
    }
}

// ============================================================================
// Objects
// ============================================================================

struct ObjectCell {
    type_name: Arc<str>,
    type_id: TypeId,
    data: RwLock<Box<dyn Any + Send + Sync>>,
}

/// Shared reference to a host object
///
/// Carries the qualified type name it was created under and the Rust type of
/// its payload, which dispatch uses to check receivers.
#[derive(Clone)]
pub struct ObjectRef {
    cell: Arc<ObjectCell>,
}

impl ObjectRef {
    /// Wrap a host value
    pub fn new<T: Any + Send + Sync>(type_name: impl Into<Arc<str>>, value: T) -> Self {
        Self {
            cell: Arc::new(ObjectCell {
                type_name: type_name.into(),
                type_id: TypeId::of::<T>(),
                data: RwLock::new(Box::new(value)),
            }),
        }
    }

    /// Qualified type name of the object
    pub fn type_name(&self) -> &str {
        &self.cell.type_name
    }

    /// Rust type of the payload
    pub fn payload_type_id(&self) -> TypeId {
        self.cell.type_id
    }

    /// Check the payload type
    pub fn is<T: Any>(&self) -> bool {
        self.cell.type_id == TypeId::of::<T>()
    }

    /// Read the payload as `T`
    pub fn with<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let guard = self.cell.data.read();
        guard.downcast_ref::<T>().map(f)
    }

    /// Mutate the payload as `T`
    pub fn with_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.cell.data.write();
        guard.downcast_mut::<T>().map(f)
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({}@{:p})", self.cell.type_name, Arc::as_ptr(&self.cell))
    }
}

// ============================================================================
// Values
// ============================================================================

/// Generic (boxed) value
#[derive(Clone, Debug)]
pub enum Value {
    /// Null reference
    Null,
    /// Boxed boolean
    Boolean(bool),
    /// Boxed byte
    Byte(i8),
    /// Boxed char
    Char(char),
    /// Boxed short
    Short(i16),
    /// Boxed int
    Int(i32),
    /// Boxed long
    Long(i64),
    /// Boxed float
    Float(f32),
    /// Boxed double
    Double(f64),
    /// String
    String(Arc<str>),
    /// Host object
    Object(ObjectRef),
}

impl Value {
    /// Wrap a host value as an object
    pub fn object<T: Any + Send + Sync>(type_name: &str, value: T) -> Self {
        Value::Object(ObjectRef::new(type_name, value))
    }

    /// Create a string value
    pub fn string(value: &str) -> Self {
        Value::String(Arc::from(value))
    }

    /// Check for null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Runtime type name of the value
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => PrimitiveKind::Boolean.wrapper_name(),
            Value::Byte(_) => PrimitiveKind::Byte.wrapper_name(),
            Value::Char(_) => PrimitiveKind::Char.wrapper_name(),
            Value::Short(_) => PrimitiveKind::Short.wrapper_name(),
            Value::Int(_) => PrimitiveKind::Int.wrapper_name(),
            Value::Long(_) => PrimitiveKind::Long.wrapper_name(),
            Value::Float(_) => PrimitiveKind::Float.wrapper_name(),
            Value::Double(_) => PrimitiveKind::Double.wrapper_name(),
            Value::String(_) => STRING,
            Value::Object(obj) => obj.type_name(),
        }
    }

    /// Primitive kind of a boxed primitive
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self {
            Value::Boolean(_) => Some(PrimitiveKind::Boolean),
            Value::Byte(_) => Some(PrimitiveKind::Byte),
            Value::Char(_) => Some(PrimitiveKind::Char),
            Value::Short(_) => Some(PrimitiveKind::Short),
            Value::Int(_) => Some(PrimitiveKind::Int),
            Value::Long(_) => Some(PrimitiveKind::Long),
            Value::Float(_) => Some(PrimitiveKind::Float),
            Value::Double(_) => Some(PrimitiveKind::Double),
            _ => None,
        }
    }

    /// Borrow an object reference
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Borrow string content
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check whether this value may be stored in a slot of reference type `type_name`
    ///
    /// Null and host objects pass, since an object's hierarchy is not known
    /// here; generated dispatch checks objects of build types separately.
    /// Boxed primitives and strings pass only for their own type and its
    /// well-known supertypes.
    pub fn is_assignable_to(&self, type_name: &str) -> bool {
        match self {
            Value::Null | Value::Object(_) => true,
            Value::String(_) => matches!(
                type_name,
                STRING | OBJECT | SERIALIZABLE | COMPARABLE | "java.lang.CharSequence"
            ),
            _ => {
                let Some(kind) = self.primitive_kind() else {
                    return false;
                };
                type_name == kind.wrapper_name()
                    || matches!(type_name, OBJECT | SERIALIZABLE | COMPARABLE)
                    || (type_name == "java.lang.Number" && kind.is_numeric())
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

const STRING: &str = "java.lang.String";
const OBJECT: &str = "java.lang.Object";
const SERIALIZABLE: &str = "java.io.Serializable";
const COMPARABLE: &str = "java.lang.Comparable";

// ============================================================================
// Native (unboxed) Values
// ============================================================================

/// Exact-typed value handed to and returned from member bodies
#[derive(Clone, Debug, PartialEq)]
pub enum Native {
    /// `boolean`
    Boolean(bool),
    /// `byte`
    Byte(i8),
    /// `char`
    Char(char),
    /// `short`
    Short(i16),
    /// `int`
    Int(i32),
    /// `long`
    Long(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// No value (`void` results)
    Void,
    /// Reference-typed value, already checked against the declared type
    Ref(Value),
}

impl Native {
    /// Primitive kind of this value, `None` for references
    pub fn kind(&self) -> Option<PrimitiveKind> {
        match self {
            Native::Boolean(_) => Some(PrimitiveKind::Boolean),
            Native::Byte(_) => Some(PrimitiveKind::Byte),
            Native::Char(_) => Some(PrimitiveKind::Char),
            Native::Short(_) => Some(PrimitiveKind::Short),
            Native::Int(_) => Some(PrimitiveKind::Int),
            Native::Long(_) => Some(PrimitiveKind::Long),
            Native::Float(_) => Some(PrimitiveKind::Float),
            Native::Double(_) => Some(PrimitiveKind::Double),
            Native::Void => Some(PrimitiveKind::Void),
            Native::Ref(_) => None,
        }
    }

    /// Box into the generic representation
    pub fn boxed(self) -> Value {
        match self {
            Native::Boolean(v) => Value::Boolean(v),
            Native::Byte(v) => Value::Byte(v),
            Native::Char(v) => Value::Char(v),
            Native::Short(v) => Value::Short(v),
            Native::Int(v) => Value::Int(v),
            Native::Long(v) => Value::Long(v),
            Native::Float(v) => Value::Float(v),
            Native::Double(v) => Value::Double(v),
            Native::Void => Value::Null,
            Native::Ref(v) => v,
        }
    }

    fn mismatch(&self, expected: &str) -> InvokeError {
        let found = match self {
            Native::Ref(v) => v.type_name().to_string(),
            other => other.kind().map(PrimitiveKind::name).unwrap_or("?").to_string(),
        };
        InvokeError::TypeMismatch {
            expected: expected.to_string(),
            found,
        }
    }

    /// Extract a `boolean`
    pub fn as_bool(&self) -> Result<bool, InvokeError> {
        match self {
            Native::Boolean(v) => Ok(*v),
            other => Err(other.mismatch("boolean")),
        }
    }

    /// Extract an `int`
    pub fn as_int(&self) -> Result<i32, InvokeError> {
        match self {
            Native::Int(v) => Ok(*v),
            other => Err(other.mismatch("int")),
        }
    }

    /// Extract a `long`
    pub fn as_long(&self) -> Result<i64, InvokeError> {
        match self {
            Native::Long(v) => Ok(*v),
            other => Err(other.mismatch("long")),
        }
    }

    /// Extract a `double`
    pub fn as_double(&self) -> Result<f64, InvokeError> {
        match self {
            Native::Double(v) => Ok(*v),
            other => Err(other.mismatch("double")),
        }
    }

    /// Borrow the reference payload
    pub fn as_ref_value(&self) -> Result<&Value, InvokeError> {
        match self {
            Native::Ref(v) => Ok(v),
            other => Err(other.mismatch("reference")),
        }
    }

    /// Extract a non-null string
    pub fn as_string(&self) -> Result<String, InvokeError> {
        match self {
            Native::Ref(Value::String(s)) => Ok(s.to_string()),
            other => Err(other.mismatch(STRING)),
        }
    }
}
