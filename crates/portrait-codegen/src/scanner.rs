//! Seed discovery from annotations
//!
//! Recognised annotations (names configurable through [`AnnotationNames`]):
//!
//! | Annotation | Placement | Seeds |
//! |------------|-----------|-------|
//! | `Reflective(including)` | any type | the annotated type |
//! | `ProxyTarget(including)` | interface | the annotated interface |
//! | `Reflective.Include(classes, including)` | any holder, repeatable | each listed class |
//! | `ProxyTarget.Include(classes, including)` | any holder, repeatable | each listed class |

use crate::config::AnnotationNames;
use crate::directive::{DirectiveSet, InclusionDirective};
use crate::error::GeneratorResult;
use crate::index::ClassIndex;
use crate::resolver::{Seed, SeedRole};
use portrait_meta::{AnnotationEntry, AnnotationValue};
use tracing::debug;

/// Property listing inclusion directives
const INCLUDING: &str = "including";
/// Property listing extra classes on a holder annotation
const CLASSES: &str = "classes";

/// Derives resolution seeds from a class index
#[derive(Debug, Clone, Default)]
pub struct SeedScanner {
    names: AnnotationNames,
}

impl SeedScanner {
    /// Scanner recognising the given annotation names
    pub fn new(names: AnnotationNames) -> Self {
        Self { names }
    }

    /// Collect seeds in discovery order
    ///
    /// Direct annotations come first (reflective, then proxy), followed by
    /// holder annotations in the same order.
    pub fn scan(&self, index: &ClassIndex) -> GeneratorResult<Vec<Seed>> {
        let mut seeds = Vec::new();

        for (role, annotation) in [
            (SeedRole::Reflective, &self.names.reflective),
            (SeedRole::Proxy, &self.names.proxy_target),
        ] {
            for (_, info) in index.annotated_with(annotation) {
                for entry in info.annotations_of(annotation) {
                    seeds.push(Seed {
                        name: info.name.clone(),
                        role,
                        directives: directives_of(entry)?,
                    });
                }
            }
        }

        for (role, annotation) in [
            (SeedRole::Reflective, &self.names.reflective_include),
            (SeedRole::Proxy, &self.names.proxy_target_include),
        ] {
            for (_, holder) in index.annotated_with(annotation) {
                for entry in holder.annotations_of(annotation) {
                    let directives = directives_of(entry)?;
                    for class in classes_of(entry) {
                        seeds.push(Seed {
                            name: class,
                            role,
                            directives,
                        });
                    }
                }
            }
        }

        debug!(count = seeds.len(), "scanned seeds");
        Ok(seeds)
    }
}

fn directives_of(entry: &AnnotationEntry) -> GeneratorResult<DirectiveSet> {
    let mut set = DirectiveSet::new();
    for value in list_of(entry.get(INCLUDING)) {
        if let Some(name) = text_of(value) {
            set.insert(name.parse::<InclusionDirective>()?);
        }
    }
    Ok(set)
}

fn classes_of(entry: &AnnotationEntry) -> Vec<String> {
    list_of(entry.get(CLASSES))
        .iter()
        .filter_map(text_of)
        .map(|name| name.strip_suffix(".class").unwrap_or(name).to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// A single value is accepted where a list is expected
fn list_of(value: Option<&AnnotationValue>) -> &[AnnotationValue] {
    match value {
        Some(AnnotationValue::List(items)) => items,
        Some(single) => std::slice::from_ref(single),
        None => &[],
    }
}

fn text_of(value: &AnnotationValue) -> Option<&str> {
    match value {
        AnnotationValue::String(s) | AnnotationValue::Other(s) => Some(s),
        _ => None,
    }
}
