use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::config::DecoderConfig;
use crate::decoder::{Decoder, Outcome};
use crate::error::{BuildError, Error};
use crate::schema::Record;

/// Per-format decoder cache
///
/// Compiles each distinct format string once and hands out the shared
/// decoder afterwards, for callers that only have the format at hand.
pub struct DecoderCache<T> {
    /// format string → decoder
    decoders: DashMap<String, Arc<Decoder<T>>>,
    config: DecoderConfig,
}

impl<T: Record> DecoderCache<T> {
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    /// Every decoder built by this cache uses `config`.
    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            decoders: DashMap::new(),
            config,
        }
    }

    /// Get the decoder for `format`, building it on first use
    pub fn get_or_build(&self, format: &str) -> Result<Arc<Decoder<T>>, BuildError> {
        if let Some(decoder) = self.decoders.get(format) {
            return Ok(Arc::clone(decoder.value()));
        }

        // built outside the shard lock; a concurrent builder may win the insert
        let decoder = Arc::new(Decoder::with_config(format, self.config.clone())?);
        let decoder = Arc::clone(
            self.decoders
                .entry(format.to_string())
                .or_insert(decoder)
                .value(),
        );
        debug!(format, cached = self.decoders.len(), "decoder cached");
        Ok(decoder)
    }

    pub fn decode(&self, format: &str, line: &str, dest: &mut T) -> Result<Outcome, Error> {
        let decoder = self.get_or_build(format)?;
        Ok(decoder.decode(line, dest)?)
    }
}

impl<T> DecoderCache<T> {
    pub fn get(&self, format: &str) -> Option<Arc<Decoder<T>>> {
        self.decoders.get(format).map(|d| Arc::clone(d.value()))
    }

    pub fn remove(&self, format: &str) {
        self.decoders.remove(format);
    }

    pub fn clear(&self) {
        self.decoders.clear();
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Aggregate counters over all cached decoders
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();

        for entry in self.decoders.iter() {
            let snapshot = entry.value().stats().snapshot();
            stats.formats += 1;
            stats.decoded += snapshot.decoded;
            stats.skipped += snapshot.skipped;
            stats.failed += snapshot.failed;
        }

        stats
    }
}

impl<T: Record> Default for DecoderCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub formats: usize,
    pub decoded: u64,
    pub skipped: u64,
    pub failed: u64,
}
