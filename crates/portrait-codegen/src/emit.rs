//! Source emission
//!
//! Renders the metadata of a build as a Rust module that a downstream crate
//! can `include!`. The module exposes each blob as a constant and a
//! `metadata_for` lookup that follows the same shard layout as
//! [`CompiledProvider`](portrait_runtime::CompiledProvider): leading
//! character, then [`name_hash`](portrait_runtime::name_hash), then the name.

use crate::assembler::shard_names;
use crate::error::{GeneratorError, GeneratorResult};
use indexmap::IndexMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Renders encoded metadata as Rust source
#[derive(Debug, Clone)]
pub struct SourceEmitter {
    module_name: String,
    entries: IndexMap<String, String>,
}

impl SourceEmitter {
    /// Emitter writing `<module_name>.rs`
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            entries: IndexMap::new(),
        }
    }

    /// Add the base64 metadata of `name`
    pub fn add(&mut self, name: &str, metadata: &str) -> GeneratorResult<()> {
        if self.entries.contains_key(name) {
            return Err(GeneratorError::DuplicateType(name.to_string()));
        }
        self.entries.insert(name.to_string(), metadata.to_string());
        Ok(())
    }

    /// Number of types to emit
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there is nothing to emit
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the module source
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail
        let _ = self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "// @generated by portrait-codegen. Do not edit.")?;
        writeln!(out, "// Module: {}", self.module_name)?;
        writeln!(out, "// Types: {}", self.entries.len())?;
        writeln!(out)?;

        for (index, (name, metadata)) in self.entries.iter().enumerate() {
            writeln!(out, "/// Metadata of `{}`", name)?;
            writeln!(out, "pub const TYPE_{}: &str = {:?};", index, metadata)?;
        }
        if !self.entries.is_empty() {
            writeln!(out)?;
        }

        writeln!(out, "/// Base64 metadata of `name`, if it was compiled")?;
        writeln!(out, "pub fn metadata_for(name: &str) -> Option<&'static str> {{")?;
        if self.entries.is_empty() {
            writeln!(out, "    let _ = name;")?;
            writeln!(out, "    None")?;
            writeln!(out, "}}")?;
            return Ok(());
        }
        writeln!(out, "    let first = name.chars().next()?;")?;
        writeln!(out, "    let hash = portrait_runtime::name_hash(name);")?;
        writeln!(out, "    match first {{")?;
        for (first, buckets) in shard_names(self.entries.keys().map(String::as_str)) {
            writeln!(out, "        {:?} => match hash {{", first)?;
            for (hash, names) in buckets {
                writeln!(out, "            {:#010x} => match name {{", hash)?;
                for name in names {
                    if let Some(index) = self.entries.get_index_of(name) {
                        writeln!(out, "                {:?} => Some(TYPE_{}),", name, index)?;
                    }
                }
                writeln!(out, "                _ => None,")?;
                writeln!(out, "            }},")?;
            }
            writeln!(out, "            _ => None,")?;
            writeln!(out, "        }},")?;
        }
        writeln!(out, "        _ => None,")?;
        writeln!(out, "    }}")?;
        writeln!(out, "}}")?;
        Ok(())
    }

    /// Write the rendered module into `dir`, creating it when missing
    pub fn write_to(&self, dir: &Path) -> GeneratorResult<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.rs", self.module_name));
        fs::write(&path, self.render())?;
        info!(path = %path.display(), types = self.entries.len(), "wrote generated module");
        Ok(path)
    }
}
