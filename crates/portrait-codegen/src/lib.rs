//! Portrait Codegen
//!
//! Ahead-of-time reflection compiler. Starting from annotated types in a
//! [`ClassIndex`], it resolves the closure of types that need runtime
//! metadata, encodes a descriptor for each, compiles index-addressed
//! dispatch against host [`TypeBindings`], and packages the result into a
//! [`CompiledProvider`](portrait_runtime::CompiledProvider).
//!
//! ```text
//! ClassIndex ─► SeedScanner ─► TypeGraphResolver ─► TypeDescriber ─► encode
//!                                                        │
//!                                  BindingRegistry ─► DispatchGenerator
//!                                                        │
//!                                    ProviderAssembler ◄─┘ ─► SourceEmitter
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod assembler;
pub mod bindings;
pub mod config;
pub mod describe;
pub mod directive;
pub mod dispatch;
pub mod emit;
pub mod error;
pub mod generator;
pub mod index;
pub mod resolver;
pub mod scanner;

pub use assembler::{shard_names, ProviderAssembler, ShardLayout};
pub use bindings::{member_key, BindingRegistry, HostBindings, TypeBindings, CONSTRUCTOR};
pub use config::{AnnotationNames, ConfigError, GeneratorConfig};
pub use describe::{object_methods, TypeDescriber};
pub use directive::{DirectiveSet, InclusionDirective};
pub use dispatch::{DispatchGenerator, DispatchTable, GeneratedType};
pub use emit::SourceEmitter;
pub use error::{GeneratorError, GeneratorResult};
pub use generator::{GeneratedOutput, PortraitGenerator};
pub use index::{
    ClassIndex, ConstructorInfo, ExternalTypes, FieldInfo, MethodInfo, NoExternalTypes, NodeId,
    ParameterInfo, TypeHierarchy, TypeInfo, Visibility,
};
pub use resolver::{is_generatable, normalize_type_name, Resolution, Seed, SeedRole, TypeGraphResolver};
pub use scanner::SeedScanner;
