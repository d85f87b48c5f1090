//! Record schemas and tag binding.
//!
//! A destination type describes its fields once through [`Record::describe`]:
//!
//! ```ignore
//! impl Record for Access {
//!     fn describe(schema: &mut SchemaBuilder<Self>) {
//!         schema
//!             .field("addr", "remote_addr", |a: &mut Access| &mut a.addr)
//!             .field("status", "status", |a: &mut Access| &mut a.status)
//!             .field("status_text", "status_raw", |a: &mut Access| &mut a.status_text);
//!     }
//! }
//! ```
//!
//! [`bind`] turns that description into a name-indexed table of
//! [`FieldDescriptor`]s. A tag ending in `_raw` marks a `String` field that
//! receives the verbatim token of its base field.

use std::collections::HashMap;
use std::fmt;

use crate::error::{ConversionError, SchemaError};
use crate::time::TimeOptions;
use crate::value::{ConvertContext, FieldValue, SemanticType};

pub(crate) const RAW_SUFFIX: &str = "_raw";

/// A destination record that can be filled by a decoder.
pub trait Record: Sized + 'static {
    fn describe(schema: &mut SchemaBuilder<Self>);
}

type Setter<T> =
    Box<dyn Fn(&mut T, &str, &ConvertContext<'_>) -> Result<(), ConversionError> + Send + Sync>;

/// Write access to one declared field.
pub struct Slot<T> {
    /// Declared (Rust) field name
    pub field: &'static str,
    setter: Setter<T>,
}

impl<T> Slot<T> {
    pub fn set(&self, dest: &mut T, token: &str, ctx: &ConvertContext<'_>) -> Result<(), ConversionError> {
        (self.setter)(dest, token, ctx)
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot").field("field", &self.field).finish()
    }
}

enum Declared<T> {
    Settable { semantic: SemanticType, setter: Setter<T> },
    Skipped,
}

struct Declaration<T> {
    field: &'static str,
    tag: String,
    kind: Declared<T>,
}

/// Collects field declarations for a [`Record`].
pub struct SchemaBuilder<T> {
    declared: Vec<Declaration<T>>,
}

impl<T: 'static> SchemaBuilder<T> {
    fn new() -> Self {
        Self { declared: Vec::new() }
    }

    /// Declare a settable field bound to `tag`.
    pub fn field<V, F>(&mut self, field: &'static str, tag: &str, access: F) -> &mut Self
    where
        V: FieldValue,
        F: Fn(&mut T) -> &mut V + Send + Sync + 'static,
    {
        let setter: Setter<T> = Box::new(move |dest: &mut T, token: &str, ctx: &ConvertContext<'_>| {
            *access(dest) = V::from_token(token, ctx)?;
            Ok(())
        });
        self.declared.push(Declaration {
            field,
            tag: tag.to_string(),
            kind: Declared::Settable {
                semantic: V::SEMANTIC,
                setter,
            },
        });
        self
    }

    /// Declare a field that is never written, such as an embedded struct or
    /// one without write access. Its tag is not inspected.
    pub fn skip(&mut self, field: &'static str, tag: &str) -> &mut Self {
        self.declared.push(Declaration {
            field,
            tag: tag.to_string(),
            kind: Declared::Skipped,
        });
        self
    }
}

/// Binding of one tag name to a record field.
#[derive(Debug)]
pub struct FieldDescriptor<T> {
    /// Tag name the field is bound to
    pub name: String,
    /// `None` for a base name that is only known through its `_raw` companion.
    pub slot: Option<Slot<T>>,
    pub semantic: SemanticType,
    pub has_raw: bool,
    pub time: Option<TimeOptions>,
    /// Ordinal of the placeholder this field was last bound to.
    pub position: usize,
    pub gap: usize,
    /// Index of the `_raw` companion in the owning table.
    pub(crate) raw: Option<usize>,
    /// Byte width of time tokens, when the layout renders at a fixed width.
    pub(crate) time_width: Option<usize>,
}

impl<T> FieldDescriptor<T> {
    fn new(name: String) -> Self {
        Self {
            name,
            slot: None,
            semantic: SemanticType::Unsupported,
            has_raw: false,
            time: None,
            position: 0,
            gap: 0,
            raw: None,
            time_width: None,
        }
    }

    pub(crate) fn ignored() -> Self {
        let mut descriptor = Self::new(crate::format::IGNORE_MARKER.to_string());
        descriptor.semantic = SemanticType::Ignored;
        descriptor
    }

    pub fn is_ignored(&self) -> bool {
        self.semantic == SemanticType::Ignored
    }

    pub fn is_time(&self) -> bool {
        self.semantic == SemanticType::Time
    }
}

/// Name-indexed table of bound fields.
#[derive(Debug)]
pub struct FieldIndex<T> {
    pub(crate) descriptors: Vec<FieldDescriptor<T>>,
    pub(crate) by_name: HashMap<String, usize>,
}

impl<T> FieldIndex<T> {
    pub fn get(&self, name: &str) -> Option<&FieldDescriptor<T>> {
        self.by_name.get(name).map(|&i| &self.descriptors[i])
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    fn entry(&mut self, name: &str) -> usize {
        if let Some(&i) = self.by_name.get(name) {
            return i;
        }
        let i = self.descriptors.len();
        self.descriptors.push(FieldDescriptor::new(name.to_string()));
        self.by_name.insert(name.to_string(), i);
        i
    }
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Bind the declared fields of `T` into a [`FieldIndex`].
pub fn bind<T: Record>() -> Result<FieldIndex<T>, SchemaError> {
    let mut schema = SchemaBuilder::new();
    T::describe(&mut schema);

    if schema.declared.is_empty() {
        return Err(SchemaError::OnlyStructuredRecordsSupported(
            std::any::type_name::<T>(),
        ));
    }

    let mut index = FieldIndex {
        descriptors: Vec::with_capacity(schema.declared.len()),
        by_name: HashMap::with_capacity(schema.declared.len()),
    };

    for Declaration { field, tag, kind } in schema.declared {
        let Declared::Settable { semantic, setter } = kind else {
            continue;
        };

        if tag.is_empty() || tag == crate::format::IGNORE_MARKER {
            continue;
        }
        if tag.contains(',') || tag.contains('.') {
            return Err(SchemaError::TagOptionsNotSupported { field, tag });
        }
        if !tag.chars().all(is_tag_char) {
            return Err(SchemaError::InvalidTag { field, tag });
        }

        if let Some(base) = tag.strip_suffix(RAW_SUFFIX) {
            if semantic != SemanticType::String {
                return Err(SchemaError::RawCompanionNotString { field });
            }
            if base.is_empty() {
                return Err(SchemaError::InvalidTag { field, tag });
            }
            let base = index.entry(base);
            index.descriptors[base].has_raw = true;
        }

        let i = index.entry(&tag);
        let descriptor = &mut index.descriptors[i];
        descriptor.slot = Some(Slot { field, setter });
        descriptor.semantic = semantic;
        descriptor.time = (semantic == SemanticType::Time).then(TimeOptions::default);
    }

    Ok(index)
}
