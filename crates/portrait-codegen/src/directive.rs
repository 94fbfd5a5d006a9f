//! Inclusion directives
//!
//! A directive widens a seed to related types: its subtypes, its supertypes,
//! or the types its public API mentions.

use crate::error::{GeneratorError, GeneratorResult};
use std::fmt;
use std::str::FromStr;

/// Instruction expanding the set of types compiled for a seed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InclusionDirective {
    /// Immediate subtypes
    DirectSubtypes = 0,
    /// Transitive subtypes
    AllSubtypes = 1,
    /// Immediate supertype and interfaces
    DirectSupertypes = 2,
    /// Transitive supertypes
    AllSupertypes = 3,
    /// Types mentioned by public members
    PublicApi = 4,
    /// Public API types plus their transitive supertypes
    PublicApiSupertypes = 5,
    /// Public API types plus their transitive subtypes
    PublicApiSubtypes = 6,
}

impl InclusionDirective {
    /// All directives
    pub const ALL: [InclusionDirective; 7] = [
        InclusionDirective::DirectSubtypes,
        InclusionDirective::AllSubtypes,
        InclusionDirective::DirectSupertypes,
        InclusionDirective::AllSupertypes,
        InclusionDirective::PublicApi,
        InclusionDirective::PublicApiSupertypes,
        InclusionDirective::PublicApiSubtypes,
    ];

    /// Constant name as written in annotations
    pub fn name(self) -> &'static str {
        match self {
            InclusionDirective::DirectSubtypes => "DIRECT_SUBTYPES",
            InclusionDirective::AllSubtypes => "ALL_SUBTYPES",
            InclusionDirective::DirectSupertypes => "DIRECT_SUPERTYPES",
            InclusionDirective::AllSupertypes => "ALL_SUPERTYPES",
            InclusionDirective::PublicApi => "PUBLIC_API",
            InclusionDirective::PublicApiSupertypes => "PUBLIC_API_SUPERTYPES",
            InclusionDirective::PublicApiSubtypes => "PUBLIC_API_SUBTYPES",
        }
    }

    /// Parse a constant name; a qualifier such as `Includes.` is ignored
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.rsplit('.').next().unwrap_or(name);
        Self::ALL.into_iter().find(|d| d.name() == name)
    }

    fn bit(self) -> u8 {
        1 << self as u8
    }
}

impl fmt::Display for InclusionDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InclusionDirective {
    type Err = GeneratorError;

    fn from_str(s: &str) -> GeneratorResult<Self> {
        Self::from_name(s).ok_or_else(|| GeneratorError::UnknownDirective(s.to_string()))
    }
}

/// Set of directives attached to one seed
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DirectiveSet(u8);

impl DirectiveSet {
    /// Empty set
    pub const EMPTY: DirectiveSet = DirectiveSet(0);

    /// Create an empty set
    pub fn new() -> Self {
        Self::EMPTY
    }

    /// Add a directive
    pub fn insert(&mut self, directive: InclusionDirective) {
        self.0 |= directive.bit();
    }

    /// Add a directive, builder style
    pub fn with(mut self, directive: InclusionDirective) -> Self {
        self.insert(directive);
        self
    }

    /// Check membership
    pub fn contains(self, directive: InclusionDirective) -> bool {
        self.0 & directive.bit() != 0
    }

    /// Check for the empty set
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether any public-API directive is present
    pub fn includes_public_api(self) -> bool {
        self.contains(InclusionDirective::PublicApi)
            || self.contains(InclusionDirective::PublicApiSupertypes)
            || self.contains(InclusionDirective::PublicApiSubtypes)
    }

    /// Directives in declaration order
    pub fn iter(self) -> impl Iterator<Item = InclusionDirective> {
        InclusionDirective::ALL
            .into_iter()
            .filter(move |d| self.contains(*d))
    }
}

impl FromIterator<InclusionDirective> for DirectiveSet {
    fn from_iter<I: IntoIterator<Item = InclusionDirective>>(iter: I) -> Self {
        let mut set = DirectiveSet::new();
        for directive in iter {
            set.insert(directive);
        }
        set
    }
}

impl fmt::Debug for DirectiveSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
