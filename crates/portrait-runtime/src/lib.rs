//! Portrait Runtime
//!
//! Resolves qualified type names to [`Descriptor`]s through a priority-ordered
//! chain of [`Provider`]s. Generated code registers a [`CompiledProvider`];
//! the [`WellKnownProvider`] answers primitives and arrays.
//!
//! ```text
//! Portrait::for_name(name)
//!   → memo table hit?            → descriptor
//!   → WellKnownProvider   (200)
//!   → CompiledProvider    (150)  → StaticDescriptor → CompiledType
//!   → native providers    (100)
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod compiled;
pub mod descriptor;
pub mod error;
pub mod portrait;
pub mod provider;
pub mod proxy;
pub mod unresolved;
pub mod value;
pub mod well_known;

pub use compiled::{
    name_hash, out_of_bounds, CompiledProvider, CompiledType, HashBucket, NamedFactory, Shard,
    TypeFactory,
};
pub use descriptor::{Descriptor, DescriptorExt, StaticDescriptor};
pub use error::{InvokeError, MemberKind, PortraitError, PortraitResult};
pub use portrait::{Portrait, PortraitBuilder};
pub use provider::{priority, Provider};
pub use proxy::{ProxyHandler, ProxyInstance};
pub use unresolved::UnresolvedDescriptor;
pub use value::{Native, ObjectRef, PrimitiveKind, Value};
pub use well_known::{array_component_name, ArrayDescriptor, PrimitiveDescriptor, WellKnownProvider};

pub use portrait_meta;
