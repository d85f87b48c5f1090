//! Format-driven decoding of log lines into typed records.
//!
//! A format such as `":remote_addr - :user [ :time ] :status"` names the
//! positional tokens of a line. Each name is bound to a field of a record
//! type through [`Record::describe`], and every token is converted according
//! to the field's type.
//!
//! # Architecture
//!
//! - `format.rs`: format string compiler
//! - `schema.rs`: record description and tag binding
//! - `mapper.rs`: compiled format joined with the bound schema
//! - `pool.rs`: bounded pool of reusable token cursors
//! - `tokenizer.rs`: separator and escape splitting, comment detection
//! - `value.rs`, `time.rs`: per-type token conversion
//! - `decoder.rs`: public facade, builder and swappable handle
//! - `cache.rs`: per-format decoder cache
//! - `metrics.rs`: decode counters
//!
//! # Example
//!
//! ```ignore
//! use lineshape::{Decoder, Record, SchemaBuilder};
//!
//! #[derive(Default)]
//! struct Person {
//!     id: u64,
//!     name: String,
//! }
//!
//! impl Record for Person {
//!     fn describe(schema: &mut SchemaBuilder<Self>) {
//!         schema
//!             .field("id", "id", |p: &mut Person| &mut p.id)
//!             .field("name", "name", |p: &mut Person| &mut p.name);
//!     }
//! }
//!
//! let decoder = Decoder::<Person>::new(":id :name")?;
//! let mut person = Person::default();
//! decoder.decode("998 Gordon", &mut person)?;
//! ```

pub mod cache;
pub mod config;
pub mod decoder;
pub mod error;
pub mod format;
pub mod mapper;
pub mod metrics;
pub mod pool;
pub mod schema;
pub mod time;
pub mod tokenizer;
pub mod value;

// Re-export commonly used types
pub use cache::DecoderCache;
pub use config::{DecoderConfig, TimeFieldConfig};
pub use decoder::{decode_once, Decoder, DecoderBuilder, DecoderHandle, Outcome};
pub use error::{BuildError, ConfigError, ConversionError, DecodeError, Error, FormatError, SchemaError};
pub use format::{compile, CompiledFormat, PlaceholderSpec};
pub use mapper::Mapper;
pub use metrics::{DecodeStats, StatsSnapshot};
pub use schema::{FieldDescriptor, Record, SchemaBuilder};
pub use time::{TimeLayout, TimeOptions};
pub use value::{ConvertContext, FieldValue, SemanticType};

pub type Result<T> = std::result::Result<T, DecodeError>;

// Constants
pub const DEFAULT_POOL_SIZE: usize = 10;
pub const MAX_LINE_SIZE: usize = 1_048_576; // 1MB
