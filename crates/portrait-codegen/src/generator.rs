//! Build pipeline
//!
//! ```text
//! ClassIndex ──scan──> seeds ──resolve──> Resolution
//!                                             │
//!                        describe + encode ───┤ per generatable name
//!                        compile dispatch ────┤
//!                                             ▼
//!                              ProviderAssembler ──> CompiledProvider
//! ```

use crate::assembler::ProviderAssembler;
use crate::bindings::{BindingRegistry, HostBindings};
use crate::config::GeneratorConfig;
use crate::describe::TypeDescriber;
use crate::dispatch::{DispatchGenerator, GeneratedType};
use crate::emit::SourceEmitter;
use crate::error::GeneratorResult;
use crate::index::{describe_any, ClassIndex, ExternalTypes, TypeHierarchy};
use crate::resolver::{is_generatable, Resolution, TypeGraphResolver};
use crate::scanner::SeedScanner;
use indexmap::IndexMap;
use portrait_meta::TypeDescriptor;
use portrait_runtime::{CompiledProvider, CompiledType};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs the whole ahead-of-time build
#[derive(Debug, Clone, Default)]
pub struct PortraitGenerator {
    config: GeneratorConfig,
}

impl PortraitGenerator {
    /// Generator with the given configuration
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Configuration in use
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Whether `name` is compiled when resolved
    fn should_generate(&self, name: &str) -> bool {
        is_generatable(name) && (!self.config.require_package || name.contains('.'))
    }

    /// Scan, resolve, describe and compile every reachable type
    ///
    /// Names that resolve to no type information are skipped and reported in
    /// [`GeneratedOutput::skipped`]. Binding and metadata errors abort the
    /// build.
    pub fn generate(
        &self,
        index: &ClassIndex,
        external: &dyn ExternalTypes,
        bindings: &BindingRegistry,
    ) -> GeneratorResult<GeneratedOutput> {
        let seeds = SeedScanner::new(self.config.annotations.clone()).scan(index)?;
        let resolution = TypeGraphResolver::new(index, external).resolve(&seeds);
        info!(
            seeds = seeds.len(),
            introspectable = resolution.introspectable.len(),
            proxyable = resolution.proxyable.len(),
            unresolved = resolution.unresolved.len(),
            "resolved type graph"
        );

        let describer = TypeDescriber::new(index, external);
        let dispatch = DispatchGenerator::new()
            .strict(self.config.strict_bindings)
            .with_hierarchy(Arc::new(TypeHierarchy::build(index, external)));
        let mut assembler = ProviderAssembler::new();
        let mut descriptors = IndexMap::new();
        let mut metadata = IndexMap::new();
        let mut skipped = Vec::new();

        for name in &resolution.introspectable {
            if !self.should_generate(name) {
                debug!(name = %name, "not generatable");
                skipped.push((name.clone(), "not generatable".to_string()));
                continue;
            }
            let Some(info) = describe_any(index, external, name) else {
                warn!(name = %name, "no type information");
                skipped.push((name.clone(), "no type information".to_string()));
                continue;
            };
            let proxyable = resolution.proxyable.contains(name);
            let descriptor = describer.describe(info, proxyable)?;

            let empty;
            let host = match bindings.get(name) {
                Some(host) => host,
                None => {
                    empty = HostBindings::empty(name.as_str());
                    &empty
                }
            };
            let generated = GeneratedType::compile(&dispatch, &descriptor, host)?;
            assembler.add_generated(&generated)?;
            metadata.insert(name.clone(), generated.metadata().to_string());
            descriptors.insert(name.clone(), descriptor);
        }

        let provider = assembler.assemble();
        info!(
            generated = provider.len(),
            skipped = skipped.len(),
            "generated compiled provider"
        );
        Ok(GeneratedOutput {
            resolution,
            descriptors,
            metadata,
            provider,
            skipped,
            module_name: self.config.module_name.clone(),
            output_dir: self.config.output_dir.clone(),
        })
    }
}

/// Result of a build
pub struct GeneratedOutput {
    /// Resolved name sets
    pub resolution: Resolution,
    /// Descriptor of every compiled type, in resolution order
    pub descriptors: IndexMap<String, TypeDescriptor>,
    /// Base64 metadata of every compiled type
    pub metadata: IndexMap<String, String>,
    /// Provider packaging the compiled types
    pub provider: CompiledProvider,
    /// Names left out, with the reason
    pub skipped: Vec<(String, String)>,
    module_name: String,
    output_dir: PathBuf,
}

impl GeneratedOutput {
    /// Emitter loaded with the metadata of this build
    pub fn emitter(&self) -> GeneratorResult<SourceEmitter> {
        let mut emitter = SourceEmitter::new(self.module_name.as_str());
        for (name, metadata) in &self.metadata {
            emitter.add(name, metadata)?;
        }
        Ok(emitter)
    }

    /// Write the generated module into the configured output directory
    pub fn write(&self) -> GeneratorResult<PathBuf> {
        self.write_to(&self.output_dir)
    }

    /// Write the generated module into `dir`
    pub fn write_to(&self, dir: &Path) -> GeneratorResult<PathBuf> {
        self.emitter()?.write_to(dir)
    }
}

impl fmt::Debug for GeneratedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedOutput")
            .field("resolution", &self.resolution)
            .field("generated", &self.descriptors.len())
            .field("skipped", &self.skipped)
            .field("module_name", &self.module_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnnotationNames;
    use crate::index::{NoExternalTypes, TypeInfo};
    use portrait_meta::AnnotationEntry;

    fn reflective() -> AnnotationEntry {
        AnnotationEntry::new(AnnotationNames::default().reflective)
    }

    #[test]
    fn test_generates_annotated_types() {
        let index = ClassIndex::from_types([
            TypeInfo::class("a.Model").annotated(reflective()),
            TypeInfo::class("a.Other"),
        ])
        .unwrap();
        let output = PortraitGenerator::default()
            .generate(&index, &NoExternalTypes, &BindingRegistry::new())
            .unwrap();
        assert_eq!(output.descriptors.keys().collect::<Vec<_>>(), vec!["a.Model"]);
        assert!(output.provider.compiled("a.Model").is_some());
        assert!(output.provider.compiled("a.Other").is_none());
        assert!(output.skipped.is_empty());
    }

    #[test]
    fn test_unpackaged_and_unknown_names_skipped() {
        let index = ClassIndex::from_types([
            TypeInfo::class("Bare").annotated(reflective()),
            TypeInfo::class("a.Child").extends("a.Missing").annotated(
                reflective().with(
                    "including",
                    portrait_meta::AnnotationValue::Other("DIRECT_SUPERTYPES".to_string()),
                ),
            ),
        ])
        .unwrap();
        let output = PortraitGenerator::default()
            .generate(&index, &NoExternalTypes, &BindingRegistry::new())
            .unwrap();
        let skipped: Vec<&str> = output.skipped.iter().map(|(n, _)| n.as_str()).collect();
        assert!(skipped.contains(&"Bare"));
        assert!(skipped.contains(&"a.Missing"));
        assert!(output.resolution.unresolved.contains("a.Missing"));
        assert_eq!(output.provider.len(), 1);
    }

    #[test]
    fn test_unpackaged_names_allowed_when_configured() {
        let config = GeneratorConfig {
            require_package: false,
            ..GeneratorConfig::default()
        };
        let index = ClassIndex::from_types([TypeInfo::class("Bare").annotated(reflective())]).unwrap();
        let output = PortraitGenerator::new(config)
            .generate(&index, &NoExternalTypes, &BindingRegistry::new())
            .unwrap();
        assert!(output.provider.compiled("Bare").is_some());
    }
}
