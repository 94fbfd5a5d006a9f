//! Binary metadata format
//!
//! Layout (all fixed-width values little-endian):
//!
//! ```text
//! magic        "PMAD"
//! version      u8
//! string pool  see crate::pool
//! names        simple name ref, qualified name ref
//! flags        u8   bits 0-1 kind, 2 abstract, 3 sealed, 4 data, 5 companion,
//!                   6 has-supertype, 7 reserved
//! layout       u8   2-bit count widths: interfaces, constructors, methods, fields
//! supertype    ref (only when has-supertype is set)
//! interfaces   count + refs
//! annotations  sized list
//! constructors count + entries
//! methods      count + entries
//! fields       count + entries
//! proxy        presence byte: 0 absent, w + 1 present with a count of width w
//! ```
//!
//! A "sized list" is a width selector byte followed by the count in that
//! width. References are string pool indices at the pool's index width.

use crate::descriptor::{
    AnnotationEntry, AnnotationValue, ConstructorEntry, FieldEntry, MemberModifiers, MethodEntry,
    TypeDescriptor, TypeKind, TypeModifiers,
};
use crate::encoder::{MetadataReader, MetadataWriter};
use crate::error::{MetadataError, Result};
use crate::generic::GenericSignature;
use crate::pool::{PoolTable, StringPool};
use crate::width::IntWidth;
use data_encoding::BASE64;
use indexmap::IndexMap;

/// Magic number for metadata blobs: "PMAD"
pub const MAGIC: [u8; 4] = *b"PMAD";

/// Current metadata format version
pub const VERSION: u8 = 4;

/// Deepest generic signature or annotation value nesting accepted
pub const MAX_NESTING_DEPTH: usize = 64;

/// Type flag bits
pub mod flags {
    /// Mask of the two kind bits
    pub const KIND_MASK: u8 = 0b0000_0011;
    /// Type is abstract
    pub const ABSTRACT: u8 = 1 << 2;
    /// Type is sealed
    pub const SEALED: u8 = 1 << 3;
    /// Type is data-like
    pub const DATA: u8 = 1 << 4;
    /// Type is a companion object
    pub const COMPANION: u8 = 1 << 5;
    /// A supertype reference follows the layout byte
    pub const HAS_SUPERTYPE: u8 = 1 << 6;
    /// Bits that must be zero
    pub const RESERVED: u8 = 1 << 7;
}

/// Member modifier bits
pub mod member_flags {
    /// Static member
    pub const STATIC: u8 = 1 << 0;
    /// Final member
    pub const FINAL: u8 = 1 << 1;
    /// Abstract member
    pub const ABSTRACT: u8 = 1 << 2;
    /// Bits that must be zero
    pub const RESERVED: u8 = !0b111;
}

/// Generic signature tags
pub mod generic_tag {
    /// Plain class reference
    pub const CLASS_REF: u8 = 0;
    /// Parameterized type
    pub const PARAMETERIZED: u8 = 1;
    /// Type variable
    pub const TYPE_VARIABLE: u8 = 2;
    /// Wildcard
    pub const WILDCARD: u8 = 3;
    /// Generic array
    pub const GENERIC_ARRAY: u8 = 4;
}

/// Annotation value tags
pub mod value_tag {
    /// Null
    pub const NULL: u8 = 0;
    /// String
    pub const STRING: u8 = 1;
    /// Boolean
    pub const BOOL: u8 = 2;
    /// 32-bit integer
    pub const INT: u8 = 3;
    /// 64-bit integer
    pub const LONG: u8 = 4;
    /// 32-bit float
    pub const FLOAT: u8 = 5;
    /// 64-bit float
    pub const DOUBLE: u8 = 6;
    /// List with a one-byte count
    pub const LIST_U8: u8 = 7;
    /// List with a two-byte count
    pub const LIST_U16: u8 = 8;
    /// List with a three-byte count
    pub const LIST_U24: u8 = 9;
    /// List with a four-byte count
    pub const LIST_U32: u8 = 10;
    /// Opaque value kept as a string
    pub const OTHER: u8 = 11;
}

// ============================================================================
// Public API
// ============================================================================

/// Encode a descriptor into a metadata blob
pub fn encode(descriptor: &TypeDescriptor) -> Result<Vec<u8>> {
    descriptor.validate()?;

    let mut pool = StringPool::new();
    collect_strings(descriptor, &mut pool);

    let mut writer = MetadataWriter::with_capacity(64 + pool.len() * 16);
    writer.emit_bytes(&MAGIC);
    writer.emit_u8(VERSION);
    pool.encode(&mut writer)?;

    let mut body = BodyWriter {
        writer,
        pool: &pool,
        width: pool.index_width(),
    };
    body.write_descriptor(descriptor)?;
    Ok(body.writer.into_bytes())
}

/// Decode a metadata blob
///
/// Rejects wrong magic, any other version, malformed content and trailing
/// bytes.
pub fn decode(data: &[u8]) -> Result<TypeDescriptor> {
    let mut reader = MetadataReader::new(data);

    let mut magic = [0u8; 4];
    magic.copy_from_slice(reader.read_slice(4)?);
    if magic != MAGIC {
        return Err(MetadataError::InvalidMagic(magic));
    }

    let version = reader.read_u8()?;
    if version != VERSION {
        return Err(MetadataError::VersionMismatch {
            expected: VERSION,
            found: version,
        });
    }

    let pool = PoolTable::decode(&mut reader)?;
    let mut body = BodyReader {
        reader,
        pool: &pool,
    };
    let descriptor = body.read_descriptor()?;

    if body.reader.has_more() {
        return Err(MetadataError::Malformed(format!(
            "{} trailing bytes after descriptor",
            body.reader.remaining()
        )));
    }
    Ok(descriptor)
}

/// Encode a descriptor as a Base64 string constant
pub fn encode_base64(descriptor: &TypeDescriptor) -> Result<String> {
    Ok(BASE64.encode(&encode(descriptor)?))
}

/// Decode a Base64 string produced by [`encode_base64`]
pub fn decode_base64(text: &str) -> Result<TypeDescriptor> {
    let bytes = BASE64.decode(text.as_bytes())?;
    decode(&bytes)
}

// ============================================================================
// String Collection
// ============================================================================

fn collect_strings(descriptor: &TypeDescriptor, pool: &mut StringPool) {
    pool.intern(&descriptor.simple_name);
    pool.intern(&descriptor.qualified_name);
    if let Some(superclass) = &descriptor.superclass_name {
        pool.intern(superclass);
    }
    for name in &descriptor.interface_names {
        pool.intern(name);
    }
    collect_annotations(&descriptor.annotations, pool);
    for ctor in &descriptor.constructors {
        pool.intern(&ctor.declaring_type_name);
        for name in &ctor.parameter_type_names {
            pool.intern(name);
        }
        collect_annotations(&ctor.annotations, pool);
        for annotations in &ctor.parameter_annotations {
            collect_annotations(annotations, pool);
        }
    }
    let proxy_methods = descriptor.proxy_methods.iter().flatten();
    for method in descriptor.methods.iter().chain(proxy_methods) {
        collect_method(method, pool);
    }
    for field in &descriptor.fields {
        pool.intern(&field.name);
        pool.intern(&field.declaring_type_name);
        pool.intern(&field.type_name);
        collect_annotations(&field.annotations, pool);
    }
}

fn collect_method(method: &MethodEntry, pool: &mut StringPool) {
    pool.intern(&method.name);
    pool.intern(&method.declaring_type_name);
    pool.intern(&method.return_type_name);
    for name in &method.parameter_type_names {
        pool.intern(name);
    }
    collect_annotations(&method.annotations, pool);
    for annotations in &method.parameter_annotations {
        collect_annotations(annotations, pool);
    }
    collect_generic(&method.generic_return_type, pool);
}

fn collect_annotations(annotations: &[AnnotationEntry], pool: &mut StringPool) {
    for annotation in annotations {
        pool.intern(&annotation.type_name);
        pool.intern(&annotation.simple_name);
        if let Some(qualified) = &annotation.qualified_name {
            pool.intern(qualified);
        }
        for (name, value) in &annotation.properties {
            pool.intern(name);
            collect_value(value, pool);
        }
    }
}

fn collect_value(value: &AnnotationValue, pool: &mut StringPool) {
    match value {
        AnnotationValue::String(s) | AnnotationValue::Other(s) => {
            pool.intern(s);
        }
        AnnotationValue::List(items) => items.iter().for_each(|v| collect_value(v, pool)),
        _ => {}
    }
}

fn collect_generic(signature: &GenericSignature, pool: &mut StringPool) {
    match signature {
        GenericSignature::ClassRef(name) => {
            pool.intern(name);
        }
        GenericSignature::Parameterized { raw, owner, args } => {
            pool.intern(raw);
            if let Some(owner) = owner {
                collect_generic(owner, pool);
            }
            args.iter().for_each(|a| collect_generic(a, pool));
        }
        GenericSignature::TypeVariable { name, bounds } => {
            pool.intern(name);
            bounds.iter().for_each(|b| collect_generic(b, pool));
        }
        GenericSignature::Wildcard { upper, lower } => {
            upper
                .iter()
                .chain(lower)
                .for_each(|b| collect_generic(b, pool));
        }
        GenericSignature::GenericArray(component) => collect_generic(component, pool),
    }
}

// ============================================================================
// Encoding
// ============================================================================

struct BodyWriter<'p> {
    writer: MetadataWriter,
    pool: &'p StringPool,
    width: IntWidth,
}

fn count_of(len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| MetadataError::InvalidDescriptor(format!("collection of {len} items")))
}

fn width_for(len: usize) -> Result<IntWidth> {
    Ok(IntWidth::for_upper_bound(count_of(len)?))
}

impl BodyWriter<'_> {
    fn write_ref(&mut self, value: &str) -> Result<()> {
        let index = self.pool.get(value).ok_or_else(|| {
            MetadataError::InvalidDescriptor(format!("string '{value}' missing from pool"))
        })?;
        self.width.write(&mut self.writer, index);
        Ok(())
    }

    fn write_sized(&mut self, len: usize) -> Result<()> {
        let count = count_of(len)?;
        let width = IntWidth::for_upper_bound(count);
        self.writer.emit_u8(width.id());
        width.write(&mut self.writer, count);
        Ok(())
    }

    fn write_refs(&mut self, names: &[String]) -> Result<()> {
        self.write_sized(names.len())?;
        for name in names {
            self.write_ref(name)?;
        }
        Ok(())
    }

    fn write_descriptor(&mut self, d: &TypeDescriptor) -> Result<()> {
        self.write_ref(&d.simple_name)?;
        self.write_ref(&d.qualified_name)?;

        let mut type_flags = d.kind.to_bits();
        if d.modifiers.is_abstract {
            type_flags |= flags::ABSTRACT;
        }
        if d.modifiers.is_sealed {
            type_flags |= flags::SEALED;
        }
        if d.modifiers.is_data {
            type_flags |= flags::DATA;
        }
        if d.modifiers.is_companion {
            type_flags |= flags::COMPANION;
        }
        if d.superclass_name.is_some() {
            type_flags |= flags::HAS_SUPERTYPE;
        }
        self.writer.emit_u8(type_flags);

        let widths = [
            width_for(d.interface_names.len())?,
            width_for(d.constructors.len())?,
            width_for(d.methods.len())?,
            width_for(d.fields.len())?,
        ];
        let layout = widths
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, w)| acc | w.id() << (i * 2));
        self.writer.emit_u8(layout);

        if let Some(superclass) = &d.superclass_name {
            self.write_ref(superclass)?;
        }

        widths[0].write(&mut self.writer, count_of(d.interface_names.len())?);
        for name in &d.interface_names {
            self.write_ref(name)?;
        }

        self.write_annotations(&d.annotations)?;

        widths[1].write(&mut self.writer, count_of(d.constructors.len())?);
        for ctor in &d.constructors {
            self.write_constructor(ctor)?;
        }

        widths[2].write(&mut self.writer, count_of(d.methods.len())?);
        for method in &d.methods {
            self.write_method(method)?;
        }

        widths[3].write(&mut self.writer, count_of(d.fields.len())?);
        for field in &d.fields {
            self.write_field(field)?;
        }

        match &d.proxy_methods {
            None => self.writer.emit_u8(0),
            Some(methods) => {
                let width = width_for(methods.len())?;
                self.writer.emit_u8(width.id() + 1);
                width.write(&mut self.writer, count_of(methods.len())?);
                for method in methods {
                    self.write_method(method)?;
                }
            }
        }
        Ok(())
    }

    fn write_modifiers(&mut self, m: MemberModifiers) {
        let mut bits = 0;
        if m.is_static {
            bits |= member_flags::STATIC;
        }
        if m.is_final {
            bits |= member_flags::FINAL;
        }
        if m.is_abstract {
            bits |= member_flags::ABSTRACT;
        }
        self.writer.emit_u8(bits);
    }

    fn write_parameter_annotations(&mut self, lists: &[Vec<AnnotationEntry>]) -> Result<()> {
        self.write_sized(lists.len())?;
        for list in lists {
            self.write_annotations(list)?;
        }
        Ok(())
    }

    fn write_constructor(&mut self, ctor: &ConstructorEntry) -> Result<()> {
        self.write_ref(&ctor.declaring_type_name)?;
        self.write_modifiers(ctor.modifiers);
        self.write_refs(&ctor.parameter_type_names)?;
        self.write_annotations(&ctor.annotations)?;
        self.write_parameter_annotations(&ctor.parameter_annotations)
    }

    fn write_method(&mut self, method: &MethodEntry) -> Result<()> {
        self.write_ref(&method.name)?;
        self.write_ref(&method.declaring_type_name)?;
        self.write_ref(&method.return_type_name)?;
        self.write_modifiers(method.modifiers);
        self.write_refs(&method.parameter_type_names)?;
        self.write_annotations(&method.annotations)?;
        self.write_parameter_annotations(&method.parameter_annotations)?;
        self.write_generic(&method.generic_return_type, 1)
    }

    fn write_field(&mut self, field: &FieldEntry) -> Result<()> {
        self.write_ref(&field.name)?;
        self.write_ref(&field.declaring_type_name)?;
        self.write_ref(&field.type_name)?;
        self.write_modifiers(field.modifiers);
        self.write_annotations(&field.annotations)
    }

    fn write_annotations(&mut self, annotations: &[AnnotationEntry]) -> Result<()> {
        self.write_sized(annotations.len())?;
        for annotation in annotations {
            self.write_ref(&annotation.type_name)?;
            self.write_ref(&annotation.simple_name)?;
            match &annotation.qualified_name {
                Some(qualified) => {
                    self.writer.emit_u8(1);
                    self.write_ref(qualified)?;
                }
                None => self.writer.emit_u8(0),
            }
            self.write_sized(annotation.properties.len())?;
            for (name, value) in &annotation.properties {
                self.write_ref(name)?;
                self.write_value(value, 1)?;
            }
        }
        Ok(())
    }

    fn write_value(&mut self, value: &AnnotationValue, depth: usize) -> Result<()> {
        if depth > MAX_NESTING_DEPTH {
            return Err(MetadataError::NestingTooDeep(MAX_NESTING_DEPTH));
        }
        match value {
            AnnotationValue::Null => self.writer.emit_u8(value_tag::NULL),
            AnnotationValue::String(s) => {
                self.writer.emit_u8(value_tag::STRING);
                self.write_ref(s)?;
            }
            AnnotationValue::Bool(b) => {
                self.writer.emit_u8(value_tag::BOOL);
                self.writer.emit_bool(*b);
            }
            AnnotationValue::Int(v) => {
                self.writer.emit_u8(value_tag::INT);
                self.writer.emit_i32(*v);
            }
            AnnotationValue::Long(v) => {
                self.writer.emit_u8(value_tag::LONG);
                self.writer.emit_i64(*v);
            }
            AnnotationValue::Float(v) => {
                self.writer.emit_u8(value_tag::FLOAT);
                self.writer.emit_f32(*v);
            }
            AnnotationValue::Double(v) => {
                self.writer.emit_u8(value_tag::DOUBLE);
                self.writer.emit_f64(*v);
            }
            AnnotationValue::List(items) => {
                let width = width_for(items.len())?;
                self.writer.emit_u8(value_tag::LIST_U8 + width.id());
                width.write(&mut self.writer, count_of(items.len())?);
                for item in items {
                    self.write_value(item, depth + 1)?;
                }
            }
            AnnotationValue::Other(s) => {
                self.writer.emit_u8(value_tag::OTHER);
                self.write_ref(s)?;
            }
        }
        Ok(())
    }

    fn write_generic_list(&mut self, list: &[GenericSignature], depth: usize) -> Result<()> {
        self.write_sized(list.len())?;
        for item in list {
            self.write_generic(item, depth + 1)?;
        }
        Ok(())
    }

    fn write_generic(&mut self, signature: &GenericSignature, depth: usize) -> Result<()> {
        if depth > MAX_NESTING_DEPTH {
            return Err(MetadataError::NestingTooDeep(MAX_NESTING_DEPTH));
        }
        match signature {
            GenericSignature::ClassRef(name) => {
                self.writer.emit_u8(generic_tag::CLASS_REF);
                self.write_ref(name)
            }
            GenericSignature::Parameterized { raw, owner, args } => {
                self.writer.emit_u8(generic_tag::PARAMETERIZED);
                self.write_ref(raw)?;
                match owner {
                    Some(owner) => {
                        self.writer.emit_u8(1);
                        self.write_generic(owner, depth + 1)?;
                    }
                    None => self.writer.emit_u8(0),
                }
                self.write_generic_list(args, depth)
            }
            GenericSignature::TypeVariable { name, bounds } => {
                self.writer.emit_u8(generic_tag::TYPE_VARIABLE);
                self.write_ref(name)?;
                self.write_generic_list(bounds, depth)
            }
            GenericSignature::Wildcard { upper, lower } => {
                self.writer.emit_u8(generic_tag::WILDCARD);
                self.write_generic_list(upper, depth)?;
                self.write_generic_list(lower, depth)
            }
            GenericSignature::GenericArray(component) => {
                self.writer.emit_u8(generic_tag::GENERIC_ARRAY);
                self.write_generic(component, depth + 1)
            }
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

struct BodyReader<'a, 'p> {
    reader: MetadataReader<'a>,
    pool: &'p PoolTable,
}

impl BodyReader<'_, '_> {
    fn read_ref(&mut self) -> Result<String> {
        self.pool.read_ref(&mut self.reader)
    }

    /// Read a count and check that the stream can hold that many items
    fn checked_count(&mut self, width: IntWidth, what: &str) -> Result<usize> {
        let count = width.read(&mut self.reader)? as usize;
        // Every item occupies at least one byte
        if count > self.reader.remaining() {
            return Err(MetadataError::Malformed(format!(
                "{what} count {count} exceeds remaining {} bytes",
                self.reader.remaining()
            )));
        }
        Ok(count)
    }

    fn read_sized(&mut self, what: &str) -> Result<usize> {
        let selector = self.reader.read_u8()?;
        if selector > 3 {
            return Err(MetadataError::Malformed(format!(
                "invalid width selector {selector} for {what}"
            )));
        }
        self.checked_count(IntWidth::from_id(selector), what)
    }

    fn read_refs(&mut self, what: &str) -> Result<Vec<String>> {
        let count = self.read_sized(what)?;
        (0..count).map(|_| self.read_ref()).collect()
    }

    fn read_descriptor(&mut self) -> Result<TypeDescriptor> {
        let simple_name = self.read_ref()?;
        let qualified_name = self.read_ref()?;

        let type_flags = self.reader.read_u8()?;
        if type_flags & flags::RESERVED != 0 {
            return Err(MetadataError::Malformed(format!(
                "reserved type flag bits set: {type_flags:#04x}"
            )));
        }
        let kind = TypeKind::from_bits(type_flags & flags::KIND_MASK);
        let modifiers = TypeModifiers {
            is_abstract: type_flags & flags::ABSTRACT != 0,
            is_sealed: type_flags & flags::SEALED != 0,
            is_data: type_flags & flags::DATA != 0,
            is_companion: type_flags & flags::COMPANION != 0,
        };

        let layout = self.reader.read_u8()?;
        let width_at = |slot: usize| IntWidth::from_id(layout >> (slot * 2));

        let superclass_name = if type_flags & flags::HAS_SUPERTYPE != 0 {
            Some(self.read_ref()?)
        } else {
            None
        };

        let interface_count = self.checked_count(width_at(0), "interface")?;
        let interface_names = (0..interface_count)
            .map(|_| self.read_ref())
            .collect::<Result<Vec<_>>>()?;

        let annotations = self.read_annotations()?;

        let ctor_count = self.checked_count(width_at(1), "constructor")?;
        let mut constructors = Vec::with_capacity(ctor_count);
        for _ in 0..ctor_count {
            constructors.push(self.read_constructor()?);
        }

        let method_count = self.checked_count(width_at(2), "method")?;
        let mut methods = Vec::with_capacity(method_count);
        for _ in 0..method_count {
            methods.push(self.read_method()?);
        }

        let field_count = self.checked_count(width_at(3), "field")?;
        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            fields.push(self.read_field()?);
        }

        let proxy_methods = match self.reader.read_u8()? {
            0 => None,
            presence @ 1..=4 => {
                let count = self.checked_count(IntWidth::from_id(presence - 1), "proxy method")?;
                let mut list = Vec::with_capacity(count);
                for _ in 0..count {
                    list.push(self.read_method()?);
                }
                Some(list)
            }
            other => {
                return Err(MetadataError::Malformed(format!(
                    "invalid proxy presence byte {other}"
                )))
            }
        };

        let descriptor = TypeDescriptor {
            simple_name,
            qualified_name,
            kind,
            modifiers,
            superclass_name,
            interface_names,
            annotations,
            constructors,
            methods,
            fields,
            proxy_methods,
        };
        descriptor
            .validate()
            .map_err(|e| MetadataError::Malformed(e.to_string()))?;
        Ok(descriptor)
    }

    fn read_modifiers(&mut self) -> Result<MemberModifiers> {
        let bits = self.reader.read_u8()?;
        if bits & member_flags::RESERVED != 0 {
            return Err(MetadataError::Malformed(format!(
                "reserved member flag bits set: {bits:#04x}"
            )));
        }
        Ok(MemberModifiers {
            is_static: bits & member_flags::STATIC != 0,
            is_final: bits & member_flags::FINAL != 0,
            is_abstract: bits & member_flags::ABSTRACT != 0,
        })
    }

    fn read_parameter_annotations(&mut self) -> Result<Vec<Vec<AnnotationEntry>>> {
        let count = self.read_sized("parameter annotation")?;
        (0..count).map(|_| self.read_annotations()).collect()
    }

    fn read_constructor(&mut self) -> Result<ConstructorEntry> {
        let declaring_type_name = self.read_ref()?;
        let modifiers = self.read_modifiers()?;
        let parameter_type_names = self.read_refs("parameter")?;
        let annotations = self.read_annotations()?;
        let parameter_annotations = self.read_parameter_annotations()?;
        Ok(ConstructorEntry {
            declaring_type_name,
            parameter_type_names,
            modifiers,
            annotations,
            parameter_annotations,
        })
    }

    fn read_method(&mut self) -> Result<MethodEntry> {
        let name = self.read_ref()?;
        let declaring_type_name = self.read_ref()?;
        let return_type_name = self.read_ref()?;
        let modifiers = self.read_modifiers()?;
        let parameter_type_names = self.read_refs("parameter")?;
        let annotations = self.read_annotations()?;
        let parameter_annotations = self.read_parameter_annotations()?;
        let generic_return_type = self.read_generic(1)?;
        Ok(MethodEntry {
            name,
            declaring_type_name,
            parameter_type_names,
            return_type_name,
            modifiers,
            annotations,
            parameter_annotations,
            generic_return_type,
        })
    }

    fn read_field(&mut self) -> Result<FieldEntry> {
        let name = self.read_ref()?;
        let declaring_type_name = self.read_ref()?;
        let type_name = self.read_ref()?;
        let modifiers = self.read_modifiers()?;
        let annotations = self.read_annotations()?;
        Ok(FieldEntry {
            name,
            declaring_type_name,
            type_name,
            modifiers,
            annotations,
        })
    }

    fn read_annotations(&mut self) -> Result<Vec<AnnotationEntry>> {
        let count = self.read_sized("annotation")?;
        let mut annotations = Vec::with_capacity(count);
        for _ in 0..count {
            let type_name = self.read_ref()?;
            let simple_name = self.read_ref()?;
            let qualified_name = match self.reader.read_u8()? {
                0 => None,
                1 => Some(self.read_ref()?),
                other => {
                    return Err(MetadataError::Malformed(format!(
                        "invalid qualified-name presence byte {other}"
                    )))
                }
            };
            let property_count = self.read_sized("annotation property")?;
            let mut properties = IndexMap::with_capacity(property_count);
            for _ in 0..property_count {
                let name = self.read_ref()?;
                let value = self.read_value(1)?;
                properties.insert(name, value);
            }
            annotations.push(AnnotationEntry {
                type_name,
                simple_name,
                qualified_name,
                properties,
            });
        }
        Ok(annotations)
    }

    fn read_value(&mut self, depth: usize) -> Result<AnnotationValue> {
        if depth > MAX_NESTING_DEPTH {
            return Err(MetadataError::NestingTooDeep(MAX_NESTING_DEPTH));
        }
        let tag = self.reader.read_u8()?;
        let value = match tag {
            value_tag::NULL => AnnotationValue::Null,
            value_tag::STRING => AnnotationValue::String(self.read_ref()?),
            value_tag::BOOL => match self.reader.read_u8()? {
                0 => AnnotationValue::Bool(false),
                1 => AnnotationValue::Bool(true),
                other => {
                    return Err(MetadataError::Malformed(format!(
                        "invalid boolean byte {other}"
                    )))
                }
            },
            value_tag::INT => AnnotationValue::Int(self.reader.read_i32()?),
            value_tag::LONG => AnnotationValue::Long(self.reader.read_i64()?),
            value_tag::FLOAT => AnnotationValue::Float(self.reader.read_f32()?),
            value_tag::DOUBLE => AnnotationValue::Double(self.reader.read_f64()?),
            value_tag::LIST_U8..=value_tag::LIST_U32 => {
                let width = IntWidth::from_id(tag - value_tag::LIST_U8);
                let count = self.checked_count(width, "annotation list")?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read_value(depth + 1)?);
                }
                AnnotationValue::List(items)
            }
            value_tag::OTHER => AnnotationValue::Other(self.read_ref()?),
            other => {
                return Err(MetadataError::Malformed(format!(
                    "unknown annotation value tag {other}"
                )))
            }
        };
        Ok(value)
    }

    fn read_generic_list(&mut self, depth: usize) -> Result<Vec<GenericSignature>> {
        let count = self.read_sized("generic argument")?;
        let mut list = Vec::with_capacity(count);
        for _ in 0..count {
            list.push(self.read_generic(depth + 1)?);
        }
        Ok(list)
    }

    fn read_generic(&mut self, depth: usize) -> Result<GenericSignature> {
        if depth > MAX_NESTING_DEPTH {
            return Err(MetadataError::NestingTooDeep(MAX_NESTING_DEPTH));
        }
        let tag = self.reader.read_u8()?;
        let signature = match tag {
            generic_tag::CLASS_REF => GenericSignature::ClassRef(self.read_ref()?),
            generic_tag::PARAMETERIZED => {
                let raw = self.read_ref()?;
                let owner = match self.reader.read_u8()? {
                    0 => None,
                    1 => Some(Box::new(self.read_generic(depth + 1)?)),
                    other => {
                        return Err(MetadataError::Malformed(format!(
                            "invalid owner presence byte {other}"
                        )))
                    }
                };
                let args = self.read_generic_list(depth)?;
                GenericSignature::Parameterized { raw, owner, args }
            }
            generic_tag::TYPE_VARIABLE => {
                let name = self.read_ref()?;
                let bounds = self.read_generic_list(depth)?;
                GenericSignature::TypeVariable { name, bounds }
            }
            generic_tag::WILDCARD => {
                let upper = self.read_generic_list(depth)?;
                let lower = self.read_generic_list(depth)?;
                GenericSignature::Wildcard { upper, lower }
            }
            generic_tag::GENERIC_ARRAY => {
                GenericSignature::GenericArray(Box::new(self.read_generic(depth + 1)?))
            }
            other => {
                return Err(MetadataError::Malformed(format!(
                    "unknown generic signature tag {other}"
                )))
            }
        };
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> TypeDescriptor {
        let mut desc = TypeDescriptor::new("com.example.Point", TypeKind::Class);
        desc.modifiers.is_data = true;
        desc.superclass_name = Some("java.lang.Object".to_string());
        desc.constructors.push(ConstructorEntry::new(
            "com.example.Point",
            vec!["int".to_string(), "int".to_string()],
        ));
        desc.fields.push(FieldEntry::new("x", "com.example.Point", "int"));
        desc.fields.push(FieldEntry::new("y", "com.example.Point", "int"));
        desc
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode(&point()).unwrap();
        assert_eq!(&bytes[..4], b"PMAD");
        assert_eq!(bytes[4], VERSION);
    }

    #[test]
    fn test_round_trip_point() {
        let desc = point();
        assert_eq!(decode(&encode(&desc).unwrap()).unwrap(), desc);
    }

    #[test]
    fn test_strings_are_pooled_once() {
        let mut desc = point();
        for i in 0..20 {
            desc.fields
                .push(FieldEntry::new(format!("f{i}"), "com.example.Point", "int"));
        }
        let bytes = encode(&desc).unwrap();
        let needle = b"com.example.Point";
        let occurrences = bytes.windows(needle.len()).filter(|w| w == needle).count();
        assert_eq!(occurrences, 1);
    }

    #[test]
    fn test_version_mismatch() {
        let mut bytes = encode(&point()).unwrap();
        bytes[4] = VERSION + 1;
        assert!(matches!(
            decode(&bytes),
            Err(MetadataError::VersionMismatch { expected: VERSION, found }) if found == VERSION + 1
        ));
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = encode(&point()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(MetadataError::InvalidMagic(_))));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = encode(&point()).unwrap();
        bytes.push(0);
        assert!(matches!(decode(&bytes), Err(MetadataError::Malformed(_))));
    }

    #[test]
    fn test_truncation_rejected_at_every_offset() {
        let bytes = encode(&point()).unwrap();
        for len in 0..bytes.len() {
            assert!(decode(&bytes[..len]).is_err(), "prefix of {len} bytes decoded");
        }
    }

    #[test]
    fn test_encode_rejects_invalid_descriptor() {
        let mut desc = point();
        desc.modifiers.is_sealed = true;
        assert!(matches!(
            encode(&desc),
            Err(MetadataError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn test_encode_rejects_overly_deep_generic() {
        let mut signature = GenericSignature::class("java.lang.String");
        for _ in 0..MAX_NESTING_DEPTH {
            signature = GenericSignature::GenericArray(Box::new(signature));
        }
        let mut desc = point();
        let mut method = MethodEntry::new("deep", "com.example.Point", vec![], "java.lang.Object");
        method.generic_return_type = signature;
        desc.methods.push(method);
        assert!(matches!(encode(&desc), Err(MetadataError::NestingTooDeep(_))));
    }

    #[test]
    fn test_base64_round_trip() {
        let desc = point();
        let text = encode_base64(&desc).unwrap();
        assert!(text
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'='));
        assert_eq!(decode_base64(&text).unwrap(), desc);
        assert!(matches!(
            decode_base64("not base64!"),
            Err(MetadataError::Base64(_))
        ));
    }
}
