use thiserror::Error;

/// Errors raised while compiling a format string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("Unexpected ':' while parsing format string at pos {offset}")]
    UnexpectedColon { offset: usize },

    #[error("Unsupported symbol {symbol:?} in format string at pos {offset}")]
    UnsupportedSymbol { symbol: char, offset: usize },

    #[error("Empty placeholder name at pos {0}")]
    EmptyName(usize),
}

/// Errors raised while binding a record schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Only structured records are supported: {0} declares no fields")]
    OnlyStructuredRecordsSupported(&'static str),

    #[error("Tag options are not supported: field {field} has tag {tag:?}")]
    TagOptionsNotSupported { field: &'static str, tag: String },

    #[error("Invalid tag {tag:?} on field {field}")]
    InvalidTag { field: &'static str, tag: String },

    #[error("Raw companion field {field} must hold a string")]
    RawCompanionNotString { field: &'static str },
}

/// Errors raised while validating a [`crate::DecoderConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Separator must be a single ASCII byte that is not a line terminator, got {0:?}")]
    InvalidSeparator(char),

    #[error("Escape character must not be a line terminator, got {0:?}")]
    InvalidEscape(char),

    #[error("pool_size must be > 0")]
    ZeroPoolSize,

    #[error("max_line_size must be > 0")]
    ZeroMaxLineSize,

    #[error("comment_prefix must not be empty while comment skipping is enabled")]
    EmptyCommentPrefix,

    #[error("Invalid time layout: {0:?}")]
    InvalidTimeLayout(String),

    #[error("Invalid time location: {0:?}")]
    InvalidLocation(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Errors that abort building a [`crate::Mapper`] or [`crate::Decoder`].
///
/// No partially built mapper is ever returned alongside one of these.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Record has no field with tag {0:?}")]
    UnknownFieldForTag(String),

    #[error("Time layout configured for unknown field {0:?}")]
    TimeLayoutForUnknownField(String),

    #[error("Time layout configured for non-time field {0:?}")]
    TimeLayoutOnNonTimeField(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Type-directed conversion failures for a single token.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Invalid bool {0:?}")]
    InvalidBool(String),

    #[error("Token {token:?} is not Int{width}-like")]
    NotIntLike { width: u32, token: String },

    #[error("Token {token:?} is not Uint{width}-like")]
    NotUintLike { width: u32, token: String },

    #[error("Token {token:?} is not Float{width}-like")]
    NotFloatLike { width: u32, token: String },

    #[error("Nil time options, time cannot be parsed")]
    NilTimeOptions,

    #[error("Time does not match layout {layout:?}: {source}")]
    Time {
        layout: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Invalid duration {token:?}: {source}")]
    Duration {
        token: String,
        #[source]
        source: humantime::DurationError,
    },

    #[error("Invalid URI {token:?}: {source}")]
    Url {
        token: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid IP address {0:?}")]
    InvalidIp(String),

    #[error("Type {0} is not supported")]
    UnsupportedFieldType(&'static str),
}

/// Errors that abort decoding of a single line.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Empty line")]
    EmptyLine,

    #[error("Line too large: {0} bytes (max: {1} bytes)")]
    LineTooLarge(usize, usize),

    #[error("Non-UTF8 content")]
    NonUtf8,

    #[error("Insufficient tokens: format expects {expected}, line has {found}")]
    InsufficientTokens { expected: usize, found: usize },

    #[error("Field {field:?}: {source}")]
    Conversion {
        field: String,
        #[source]
        source: ConversionError,
    },
}

/// Either half of the one-shot [`crate::decode_once`] path.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
