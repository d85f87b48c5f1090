use std::fmt;

use tracing::debug;

use crate::config::DecoderConfig;
use crate::error::{BuildError, DecodeError};
use crate::format::{self, PlaceholderSpec};
use crate::schema::{self, FieldDescriptor, FieldIndex, Record, RAW_SUFFIX};
use crate::value::ConvertContext;

/// One placeholder of the format together with the field it writes to.
pub struct BoundToken<'a, T> {
    pub spec: &'a PlaceholderSpec,
    pub field: &'a FieldDescriptor<T>,
}

impl<T> Clone for BoundToken<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for BoundToken<'_, T> {}

impl<T> fmt::Debug for BoundToken<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundToken")
            .field("name", &self.spec.name)
            .field("position", &self.spec.position)
            .field("semantic", &self.field.semantic)
            .finish()
    }
}

/// Compiled format joined with the bound schema of `T`.
///
/// Built once per decoder and never mutated afterwards, so one mapper is
/// shared by every worker of a pool.
pub struct Mapper<T> {
    prefix_len: usize,
    tokens: Vec<PlaceholderSpec>,
    /// Descriptor index for each token, parallel to `tokens`.
    bindings: Vec<usize>,
    fields: FieldIndex<T>,
}

impl<T: Record> Mapper<T> {
    pub fn build(format: &str, config: &DecoderConfig) -> Result<Self, BuildError> {
        let compiled = format::compile(format)?;
        let mut fields = schema::bind::<T>()?;

        // shared by every `:-` token, never reachable by name
        let ignored = fields.descriptors.len();
        fields.descriptors.push(FieldDescriptor::ignored());

        let mut bindings = Vec::with_capacity(compiled.len());
        for (i, spec) in compiled.placeholders.iter().enumerate() {
            assert_eq!(
                spec.position, i,
                "placeholder {:?} compiled out of order",
                spec.name
            );

            if spec.is_ignored() {
                bindings.push(ignored);
                continue;
            }

            let index = match fields.by_name.get(&spec.name) {
                Some(&index) if fields.descriptors[index].slot.is_some() => index,
                _ => return Err(BuildError::UnknownFieldForTag(spec.name.clone())),
            };
            let descriptor = &mut fields.descriptors[index];
            descriptor.position = spec.position;
            descriptor.gap = spec.gap;
            bindings.push(index);
        }

        for i in 0..fields.descriptors.len() {
            if fields.descriptors[i].has_raw {
                let raw_name = format!("{}{}", fields.descriptors[i].name, RAW_SUFFIX);
                fields.descriptors[i].raw = fields.by_name.get(&raw_name).copied();
            }
        }

        apply_time_options(&mut fields, config)?;

        debug!(
            tokens = compiled.len(),
            fields = fields.len(),
            record = std::any::type_name::<T>(),
            "mapper built"
        );

        Ok(Self {
            prefix_len: compiled.prefix_len,
            tokens: compiled.placeholders,
            bindings,
            fields,
        })
    }
}

fn apply_time_options<T>(fields: &mut FieldIndex<T>, config: &DecoderConfig) -> Result<(), BuildError> {
    let defaults = config.default_time_options()?;
    for descriptor in fields.descriptors.iter_mut().filter(|d| d.is_time()) {
        descriptor.time = Some(defaults.clone());
    }

    for (name, field) in &config.time_layouts {
        let Some(&index) = fields.by_name.get(name) else {
            return Err(BuildError::TimeLayoutForUnknownField(name.clone()));
        };
        let descriptor = &mut fields.descriptors[index];
        if !descriptor.is_time() {
            return Err(BuildError::TimeLayoutOnNonTimeField(name.clone()));
        }
        descriptor.time = Some(field.to_options(config.default_time_location.as_deref())?);
    }

    for descriptor in fields.descriptors.iter_mut() {
        descriptor.time_width = descriptor.time.as_ref().and_then(|t| t.layout.fixed_width());
    }
    Ok(())
}

impl<T> Mapper<T> {
    /// Number of placeholders, ignored ones included.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Literal bytes preceding the first placeholder.
    pub fn prefix_len(&self) -> usize {
        self.prefix_len
    }

    pub fn token(&self, position: usize) -> Option<BoundToken<'_, T>> {
        let spec = self.tokens.get(position)?;
        let field = &self.fields.descriptors[self.bindings[position]];
        Some(BoundToken { spec, field })
    }

    pub fn tokens(&self) -> impl Iterator<Item = BoundToken<'_, T>> + '_ {
        (0..self.tokens.len()).filter_map(move |i| self.token(i))
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor<T>> {
        self.fields.get(name)
    }

    /// Convert `token` into `field` of `dest`.
    ///
    /// The raw companion, if any, is written before the typed conversion and
    /// keeps the verbatim token even when the conversion fails.
    pub fn write(
        &self,
        field: &FieldDescriptor<T>,
        token: &str,
        dest: &mut T,
        strict_ip: bool,
    ) -> crate::Result<()> {
        if field.is_ignored() {
            return Ok(());
        }

        if field.has_raw {
            let raw = field
                .raw
                .and_then(|i| self.fields.descriptors[i].slot.as_ref())
                .unwrap_or_else(|| panic!("raw companion of {:?} has no slot", field.name));
            if let Err(err) = raw.set(dest, token, &ConvertContext::default()) {
                panic!("raw companion of {:?} rejected a string: {}", field.name, err);
            }
        }

        let Some(slot) = field.slot.as_ref() else {
            panic!("field {:?} bound without a slot", field.name);
        };
        let ctx = ConvertContext {
            time: field.time.as_ref(),
            strict_ip,
        };
        slot.set(dest, token, &ctx)
            .map_err(|source| DecodeError::Conversion {
                field: field.name.clone(),
                source,
            })
    }
}

impl<T> fmt::Debug for Mapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("prefix_len", &self.prefix_len)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}
