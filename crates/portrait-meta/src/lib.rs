//! Portrait Type Metadata
//!
//! This crate provides the type descriptor model shared by the code generator
//! and the runtime, together with the compact binary codec used to embed a
//! descriptor in generated output.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod codec;
pub mod descriptor;
pub mod encoder;
pub mod error;
pub mod generic;
pub mod pool;
pub mod width;

pub use codec::{decode, decode_base64, encode, encode_base64, MAGIC, MAX_NESTING_DEPTH, VERSION};
pub use descriptor::{
    AnnotationEntry, AnnotationValue, ConstructorEntry, FieldEntry, MemberModifiers, MethodEntry,
    TypeDescriptor, TypeKind, TypeModifiers,
};
pub use encoder::{DecodeError, MetadataReader, MetadataWriter};
pub use error::MetadataError;
pub use generic::GenericSignature;
pub use pool::{PoolTable, StringPool};
pub use width::IntWidth;

/// Names of the primitive types recognised by the metadata model
pub const PRIMITIVE_NAMES: [&str; 9] = [
    "boolean", "byte", "char", "short", "int", "long", "float", "double", "void",
];

/// Check whether a type name denotes a primitive (including `void`)
pub fn is_primitive_name(name: &str) -> bool {
    PRIMITIVE_NAMES.contains(&name)
}
