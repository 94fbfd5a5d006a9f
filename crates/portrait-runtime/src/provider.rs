//! Descriptor providers
//!
//! A provider answers "name → descriptor". The resolution engine consults its
//! providers in descending priority order.

use crate::descriptor::Descriptor;
use crate::error::PortraitResult;
use crate::portrait::Portrait;
use std::sync::Arc;

/// Priority bands
///
/// Only the relative order is part of the contract:
/// `WELL_KNOWN > GENERATED > NATIVE`.
pub mod priority {
    /// Primitive and array types
    pub const WELL_KNOWN: i32 = 200;
    /// Build-time compiled providers
    pub const GENERATED: i32 = 150;
    /// Native reflection fallback
    pub const NATIVE: i32 = 100;
}

/// Source of descriptors
pub trait Provider: Send + Sync {
    /// Position in the chain; higher is consulted first
    fn priority(&self) -> i32;

    /// Look up `name`
    ///
    /// `Ok(None)` means the provider does not know the name. Providers may
    /// resolve dependent names through `portrait`; re-entering the name being
    /// resolved is reported as a cycle.
    fn for_name(&self, name: &str, portrait: &Portrait)
        -> PortraitResult<Option<Arc<dyn Descriptor>>>;

    /// Short label used in logs
    fn label(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
