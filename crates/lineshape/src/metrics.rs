use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::DecodeError;

/// Failure categories for stats recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Empty,
    TooLarge,
    NonUtf8,
    InsufficientTokens,
    Conversion,
}

impl From<&DecodeError> for FailureClass {
    fn from(err: &DecodeError) -> Self {
        match err {
            DecodeError::EmptyLine => FailureClass::Empty,
            DecodeError::LineTooLarge(..) => FailureClass::TooLarge,
            DecodeError::NonUtf8 => FailureClass::NonUtf8,
            DecodeError::InsufficientTokens { .. } => FailureClass::InsufficientTokens,
            DecodeError::Conversion { .. } => FailureClass::Conversion,
        }
    }
}

/// Forces the wrapped counters onto their own cache line.
#[repr(align(64))]
#[derive(Debug, Default)]
pub struct CacheAligned<T>(pub T);

/// Per-line outcomes (updated once per decode call)
#[derive(Debug, Default)]
pub struct OutcomeCounters {
    pub decoded: AtomicU64,
    pub skipped: AtomicU64,
    pub fields_written: AtomicU64,
}

#[derive(Debug, Default)]
pub struct TotalCounters {
    pub time_nanos: AtomicU64,
    pub count: AtomicU64,
}

/// Failure counters by class
#[derive(Debug, Default)]
pub struct FailureCounters {
    pub empty: AtomicU64,
    pub too_large: AtomicU64,
    pub non_utf8: AtomicU64,
    pub insufficient_tokens: AtomicU64,
    pub conversion: AtomicU64,
}

/// Counters for one decoder.
///
/// Each group sits on its own cache line so concurrent decodes updating
/// outcomes and timings do not contend. All operations are `Relaxed`, and
/// [`DecodeStats::snapshot`] is not transactional across groups.
#[derive(Debug, Default)]
pub struct DecodeStats {
    pub outcomes: CacheAligned<OutcomeCounters>,
    pub totals: CacheAligned<TotalCounters>,
    pub failures: CacheAligned<FailureCounters>,
}

impl DecodeStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a line that was fully decoded
    #[inline]
    pub fn record_decoded(&self, fields: usize, time_nanos: u64) {
        self.outcomes.0.decoded.fetch_add(1, Ordering::Relaxed);
        self.outcomes
            .0
            .fields_written
            .fetch_add(fields as u64, Ordering::Relaxed);
        self.record_time(time_nanos);
    }

    /// Record a comment line
    #[inline]
    pub fn record_skipped(&self) {
        self.outcomes.0.skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failure(&self, class: FailureClass, time_nanos: u64) {
        let counter = match class {
            FailureClass::Empty => &self.failures.0.empty,
            FailureClass::TooLarge => &self.failures.0.too_large,
            FailureClass::NonUtf8 => &self.failures.0.non_utf8,
            FailureClass::InsufficientTokens => &self.failures.0.insufficient_tokens,
            FailureClass::Conversion => &self.failures.0.conversion,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.record_time(time_nanos);
    }

    #[inline]
    fn record_time(&self, time_nanos: u64) {
        self.totals.0.count.fetch_add(1, Ordering::Relaxed);
        self.totals.0.time_nanos.fetch_add(time_nanos, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let decoded = self.outcomes.0.decoded.load(Ordering::Relaxed);
        let count = self.totals.0.count.load(Ordering::Relaxed);
        let time_nanos = self.totals.0.time_nanos.load(Ordering::Relaxed);

        let empty_lines = self.failures.0.empty.load(Ordering::Relaxed);
        let lines_too_large = self.failures.0.too_large.load(Ordering::Relaxed);
        let non_utf8_lines = self.failures.0.non_utf8.load(Ordering::Relaxed);
        let insufficient_tokens = self.failures.0.insufficient_tokens.load(Ordering::Relaxed);
        let conversion_errors = self.failures.0.conversion.load(Ordering::Relaxed);
        let failed =
            empty_lines + lines_too_large + non_utf8_lines + insufficient_tokens + conversion_errors;

        StatsSnapshot {
            decoded,
            skipped: self.outcomes.0.skipped.load(Ordering::Relaxed),
            failed,
            fields_written: self.outcomes.0.fields_written.load(Ordering::Relaxed),
            avg_decode_time_us: if count > 0 {
                (time_nanos as f64 / count as f64) / 1000.0
            } else {
                0.0
            },
            empty_lines,
            lines_too_large,
            non_utf8_lines,
            insufficient_tokens,
            conversion_errors,
            success_rate: if decoded + failed > 0 {
                decoded as f64 / (decoded + failed) as f64
            } else {
                1.0
            },
        }
    }
}

/// Read-only view of [`DecodeStats`], serializable for logging or export.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub decoded: u64,
    pub skipped: u64,
    pub failed: u64,
    pub fields_written: u64,
    pub avg_decode_time_us: f64,

    // Failures
    pub empty_lines: u64,
    pub lines_too_large: u64,
    pub non_utf8_lines: u64,
    pub insufficient_tokens: u64,
    pub conversion_errors: u64,
    pub success_rate: f64,
}
