//! Line tokenizer.
//!
//! Two modes, picked from the decoder config:
//!
//! - **separator** (default): each token ends at the next separator byte or
//!   line terminator. Time fields whose layout renders at a fixed width take
//!   exactly that many bytes, so layouts containing the separator stay whole.
//!   The literal gap recorded for a placeholder is skipped before the next one,
//!   so the whitespace after a name in the format stands for one separator.
//! - **escape**: the line is split on the escape character and the fragments
//!   that are not blank are assigned to placeholders in order.

use tracing::debug;

use crate::config::DecoderConfig;
use crate::error::DecodeError;
use crate::pool::Worker;
use crate::schema::FieldDescriptor;

/// How a line is handled before any tokenizing happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Comment,
    /// `""`, `"\n"` or `"\r\n"`
    Empty,
    Content,
}

/// Substring of the line destined for one placeholder.
pub struct RawToken<'a, T> {
    pub text: &'a str,
    pub field: &'a FieldDescriptor<T>,
    /// Placeholder ordinal
    pub position: usize,
}

#[derive(Debug, Clone)]
pub struct Tokenizer {
    separator: u8,
    escape: Option<char>,
    comment_prefix: Option<String>,
}

impl Tokenizer {
    pub fn new(config: &DecoderConfig) -> Self {
        Self {
            separator: config.separator_byte(),
            escape: config.escape,
            comment_prefix: config
                .skip_comments
                .then(|| config.comment_prefix.clone())
                .filter(|prefix| !prefix.is_empty()),
        }
    }

    pub fn classify(&self, line: &str) -> LineKind {
        if let Some(prefix) = &self.comment_prefix {
            if line.starts_with(prefix.as_str()) {
                return LineKind::Comment;
            }
        }
        if strip_terminator(line).is_empty() {
            return LineKind::Empty;
        }
        LineKind::Content
    }

    /// Split `line` into one token per placeholder, walking `worker`'s cursor.
    pub fn tokenize<'a, T>(
        &self,
        line: &'a str,
        worker: &'a Worker<T>,
    ) -> crate::Result<Vec<RawToken<'a, T>>> {
        let content = strip_terminator(line);
        match self.escape {
            Some(escape) => self.split_escaped(content, escape, worker),
            None => self.split_separated(content, worker),
        }
    }

    fn split_separated<'a, T>(
        &self,
        content: &'a str,
        worker: &'a Worker<T>,
    ) -> crate::Result<Vec<RawToken<'a, T>>> {
        let bytes = content.as_bytes();
        let expected = worker.mapper().len();
        let mut tokens = Vec::with_capacity(expected);
        let mut offset = ceil_char_boundary(content, worker.mapper().prefix_len());

        let mut cursor = worker.first();
        while let Some(bound) = cursor {
            if offset >= bytes.len() {
                return Err(DecodeError::InsufficientTokens {
                    expected,
                    found: tokens.len(),
                });
            }

            let mut end = match bound.field.time_width {
                Some(width) => offset + width,
                None => self.find_boundary(bytes, offset).unwrap_or(bytes.len()),
            };
            if end <= offset || end > bytes.len() || !content.is_char_boundary(end) {
                end = bytes.len();
            }

            let text = &content[offset..end];
            debug!(
                token = text,
                start = offset,
                end,
                gap = bound.spec.gap,
                "token"
            );
            tokens.push(RawToken {
                text,
                field: bound.field,
                position: bound.spec.position,
            });

            offset = ceil_char_boundary(content, end + bound.spec.gap);
            cursor = worker.next();
        }

        Ok(tokens)
    }

    fn split_escaped<'a, T>(
        &self,
        content: &'a str,
        escape: char,
        worker: &'a Worker<T>,
    ) -> crate::Result<Vec<RawToken<'a, T>>> {
        let expected = worker.mapper().len();
        let mut tokens = Vec::with_capacity(expected);
        let mut fragments = content
            .split(escape)
            .filter(|fragment| !fragment.trim().is_empty());

        let mut cursor = worker.first();
        while let Some(bound) = cursor {
            let Some(text) = fragments.next() else {
                return Err(DecodeError::InsufficientTokens {
                    expected,
                    found: tokens.len(),
                });
            };
            debug!(token = text, position = bound.spec.position, "escaped token");
            tokens.push(RawToken {
                text,
                field: bound.field,
                position: bound.spec.position,
            });
            cursor = worker.next();
        }

        Ok(tokens)
    }

    /// Index of the first separator or terminator after `start`.
    fn find_boundary(&self, bytes: &[u8], start: usize) -> Option<usize> {
        if start >= bytes.len() {
            return None;
        }
        bytes[start + 1..]
            .iter()
            .position(|&b| b == self.separator || b == b'\n' || b == b'\r')
            .map(|i| start + 1 + i)
    }
}

fn strip_terminator(line: &str) -> &str {
    line.strip_suffix("\r\n")
        .or_else(|| line.strip_suffix('\n'))
        .unwrap_or(line)
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}
