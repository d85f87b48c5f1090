//! Format string compiler.
//!
//! A format is a sequence of `:name` placeholders separated by literal text,
//! e.g. `":remote_addr - :user [ :time ]"`. A name starts right after `:` and
//! runs until whitespace or the end of the string. `:-` consumes a token
//! without binding it to any field.

use tracing::debug;

use crate::error::FormatError;

/// Placeholder name that consumes a token without binding it.
pub const IGNORE_MARKER: &str = "-";

/// One named slot in a format string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderSpec {
    pub name: String,
    /// Zero-based index in declaration order.
    pub position: usize,
    /// Literal bytes between the end of this placeholder and the start of the next one.
    pub gap: usize,
}

impl PlaceholderSpec {
    pub fn is_ignored(&self) -> bool {
        self.name == IGNORE_MARKER
    }
}

/// Output of [`compile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFormat {
    /// Literal bytes before the first placeholder.
    pub prefix_len: usize,
    pub placeholders: Vec<PlaceholderSpec>,
}

impl CompiledFormat {
    pub fn len(&self) -> usize {
        self.placeholders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placeholders.is_empty()
    }
}

#[inline]
fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Parse `format` into its ordered placeholders.
pub fn compile(format: &str) -> Result<CompiledFormat, FormatError> {
    let bytes = format.as_bytes();
    let mut placeholders: Vec<PlaceholderSpec> = Vec::new();
    let mut prefix_len = 0;
    let mut pending_gap = 0;
    let mut name_start: Option<usize> = None;

    for (i, &b) in bytes.iter().enumerate() {
        let Some(start) = name_start else {
            if b == b':' {
                match placeholders.last_mut() {
                    Some(last) => last.gap = pending_gap,
                    None => prefix_len = pending_gap,
                }
                pending_gap = 0;
                name_start = Some(i + 1);
            } else {
                pending_gap += 1;
            }
            continue;
        };

        if b == b':' {
            return Err(FormatError::UnexpectedColon { offset: i });
        }

        if b.is_ascii_whitespace() {
            close_name(format, start, i, &mut placeholders)?;
            name_start = None;
            pending_gap = 1;
            continue;
        }

        let name = &bytes[start..i];
        if name == IGNORE_MARKER.as_bytes() {
            // `-` is only valid as a whole name
            return Err(FormatError::UnsupportedSymbol { symbol: '-', offset: i - 1 });
        }
        if b == b'-' && name.is_empty() {
            continue;
        }
        if !is_name_byte(b) {
            let symbol = format[i..].chars().next().unwrap_or(char::REPLACEMENT_CHARACTER);
            return Err(FormatError::UnsupportedSymbol { symbol, offset: i });
        }
    }

    if let Some(start) = name_start {
        close_name(format, start, bytes.len(), &mut placeholders)?;
    }

    debug!(
        placeholders = placeholders.len(),
        prefix_len, "format string has been successfully parsed"
    );

    Ok(CompiledFormat { prefix_len, placeholders })
}

fn close_name(
    format: &str,
    start: usize,
    end: usize,
    placeholders: &mut Vec<PlaceholderSpec>,
) -> Result<(), FormatError> {
    if start == end {
        return Err(FormatError::EmptyName(start - 1));
    }
    let spec = PlaceholderSpec {
        name: format[start..end].to_string(),
        position: placeholders.len(),
        gap: 0,
    };
    debug!(name = %spec.name, position = spec.position, "placeholder");
    placeholders.push(spec);
    Ok(())
}
