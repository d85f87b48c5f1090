use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::{DecoderConfig, TimeFieldConfig};
use crate::error::{BuildError, DecodeError, Error};
use crate::mapper::Mapper;
use crate::metrics::{DecodeStats, FailureClass};
use crate::pool::WorkerPool;
use crate::schema::Record;
use crate::tokenizer::{LineKind, Tokenizer};

/// Result of a successful [`Decoder::decode`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every placeholder was converted. `fields` excludes ignored ones.
    Decoded { fields: usize },
    /// Comment line, destination untouched.
    Skipped,
}

/// Decodes lines of one format into records of type `T`.
///
/// Shareable across threads. Concurrent calls beyond the configured pool
/// size wait for a free worker.
pub struct Decoder<T> {
    format: String,
    mapper: Arc<Mapper<T>>,
    pool: WorkerPool<T>,
    tokenizer: Tokenizer,
    config: DecoderConfig,
    stats: DecodeStats,
}

impl<T: Record> Decoder<T> {
    pub fn new(format: &str) -> Result<Self, BuildError> {
        Self::with_config(format, DecoderConfig::default())
    }

    pub fn with_config(format: &str, config: DecoderConfig) -> Result<Self, BuildError> {
        config.validate()?;
        let mapper = Arc::new(Mapper::build(format, &config)?);
        let pool = WorkerPool::new(Arc::clone(&mapper), config.pool_size);

        info!(
            format,
            placeholders = mapper.len(),
            pool_size = config.pool_size,
            escape = ?config.escape,
            "Decoder ready"
        );

        Ok(Self {
            format: format.to_string(),
            tokenizer: Tokenizer::new(&config),
            mapper,
            pool,
            config,
            stats: DecodeStats::new(),
        })
    }

    pub fn builder(format: &str) -> DecoderBuilder<T> {
        DecoderBuilder::new(format)
    }
}

impl<T> Decoder<T> {
    /// Decode one line into `dest`.
    ///
    /// Fields are written in placeholder order. On a conversion failure the
    /// fields written before it are kept.
    pub fn decode(&self, line: &str, dest: &mut T) -> crate::Result<Outcome> {
        let started = Instant::now();
        let result = self.decode_line(line, dest);
        let elapsed = started.elapsed().as_nanos() as u64;

        match &result {
            Ok(Outcome::Decoded { fields }) => self.stats.record_decoded(*fields, elapsed),
            Ok(Outcome::Skipped) => self.stats.record_skipped(),
            Err(err) => self.stats.record_failure(FailureClass::from(err), elapsed),
        }
        result
    }

    /// Like [`Decoder::decode`] for raw bytes; fails with `NonUtf8` on invalid UTF-8.
    pub fn decode_bytes(&self, line: &[u8], dest: &mut T) -> crate::Result<Outcome> {
        match std::str::from_utf8(line) {
            Ok(line) => self.decode(line, dest),
            Err(_) => {
                self.stats.record_failure(FailureClass::NonUtf8, 0);
                Err(DecodeError::NonUtf8)
            }
        }
    }

    fn decode_line(&self, line: &str, dest: &mut T) -> crate::Result<Outcome> {
        if line.len() > self.config.max_line_size {
            return Err(DecodeError::LineTooLarge(line.len(), self.config.max_line_size));
        }

        match self.tokenizer.classify(line) {
            LineKind::Comment => {
                debug!("comment line skipped");
                return Ok(Outcome::Skipped);
            }
            LineKind::Empty => return Err(DecodeError::EmptyLine),
            LineKind::Content => {}
        }

        let worker = self.pool.acquire();
        let tokens = self.tokenizer.tokenize(line, &worker)?;

        let mut fields = 0;
        for token in tokens.iter().filter(|t| !t.field.is_ignored()) {
            self.mapper
                .write(token.field, token.text, dest, self.config.strict_ip)?;
            fields += 1;
        }
        Ok(Outcome::Decoded { fields })
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn mapper(&self) -> &Mapper<T> {
        &self.mapper
    }

    pub fn pool(&self) -> &WorkerPool<T> {
        &self.pool
    }

    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }
}

/// Fluent construction of a [`Decoder`].
pub struct DecoderBuilder<T> {
    format: String,
    config: DecoderConfig,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> DecoderBuilder<T> {
    pub fn new(format: &str) -> Self {
        Self {
            format: format.to_string(),
            config: DecoderConfig::default(),
            _record: PhantomData,
        }
    }

    /// Replace the whole configuration, e.g. one returned by [`DecoderConfig::load`].
    pub fn config(mut self, config: DecoderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn separator(mut self, separator: char) -> Self {
        self.config.separator = separator;
        self
    }

    /// Switch to escape mode: tokens are the text between occurrences of `escape`.
    pub fn escape(mut self, escape: char) -> Self {
        self.config.escape = Some(escape);
        self
    }

    pub fn comment_prefix(mut self, prefix: &str) -> Self {
        self.config.comment_prefix = prefix.to_string();
        self.config.skip_comments = true;
        self
    }

    pub fn disable_comments(mut self) -> Self {
        self.config.skip_comments = false;
        self
    }

    /// Layout for one time field: `"rfc3339"`, `"rfc2822"` or a strftime string.
    pub fn time_layout(mut self, field: &str, layout: &str) -> Self {
        self.config
            .time_layouts
            .entry(field.to_string())
            .and_modify(|f| f.layout = layout.to_string())
            .or_insert_with(|| TimeFieldConfig::new(layout));
        self
    }

    pub fn time_layouts<I, K, V>(mut self, layouts: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (field, layout) in layouts {
            self = self.time_layout(field.as_ref(), layout.as_ref());
        }
        self
    }

    /// Offset used for one time field when its token carries none.
    pub fn time_location(mut self, field: &str, location: &str) -> Self {
        let default_layout = self.config.default_time_layout.clone();
        self.config
            .time_layouts
            .entry(field.to_string())
            .or_insert_with(|| TimeFieldConfig::new(default_layout))
            .location = Some(location.to_string());
        self
    }

    pub fn default_time_location(mut self, location: &str) -> Self {
        self.config.default_time_location = Some(location.to_string());
        self
    }

    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.config.pool_size = pool_size;
        self
    }

    pub fn strict_ip(mut self, strict: bool) -> Self {
        self.config.strict_ip = strict;
        self
    }

    pub fn max_line_size(mut self, max_line_size: usize) -> Self {
        self.config.max_line_size = max_line_size;
        self
    }

    pub fn build(self) -> Result<Decoder<T>, BuildError> {
        Decoder::with_config(&self.format, self.config)
    }
}

/// Swappable decoder for reconfiguration at runtime.
///
/// Readers clone the current `Arc` and decode without holding the lock.
pub struct DecoderHandle<T> {
    current: RwLock<Arc<Decoder<T>>>,
}

impl<T> DecoderHandle<T> {
    pub fn new(decoder: Decoder<T>) -> Self {
        Self {
            current: RwLock::new(Arc::new(decoder)),
        }
    }

    pub fn current(&self) -> Arc<Decoder<T>> {
        Arc::clone(&self.current.read())
    }

    /// Install `decoder`, returning the one it replaces.
    pub fn replace(&self, decoder: Decoder<T>) -> Arc<Decoder<T>> {
        std::mem::replace(&mut *self.current.write(), Arc::new(decoder))
    }

    pub fn decode(&self, line: &str, dest: &mut T) -> crate::Result<Outcome> {
        self.current().decode(line, dest)
    }
}

impl<T: Record> DecoderHandle<T> {
    /// Build a decoder for `format` and install it. The current decoder stays
    /// in place when the build fails.
    pub fn rebuild(&self, format: &str, config: DecoderConfig) -> Result<Arc<Decoder<T>>, BuildError> {
        let decoder = Decoder::with_config(format, config)?;
        info!(format, "Decoder replaced");
        Ok(self.replace(decoder))
    }
}

/// Compile `format` and decode a single `line` into `dest`.
///
/// Builds a fresh decoder on every call; use a [`Decoder`] or
/// [`crate::DecoderCache`] for repeated lines.
pub fn decode_once<T: Record>(format: &str, line: &str, dest: &mut T) -> Result<Outcome, Error> {
    let decoder = Decoder::<T>::builder(format).pool_size(1).build()?;
    Ok(decoder.decode(line, dest)?)
}
