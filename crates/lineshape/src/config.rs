use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::time::{parse_location, TimeLayout, TimeOptions};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Byte that ends a token in separator mode.
    pub separator: char,
    /// When set, tokens are the fragments between occurrences of this char.
    pub escape: Option<char>,
    pub comment_prefix: String,
    pub skip_comments: bool,
    pub pool_size: usize,
    pub strict_ip: bool,
    pub max_line_size: usize,
    /// Layout for time fields with no entry in `time_layouts`.
    pub default_time_layout: String,
    pub default_time_location: Option<String>,
    /// Per-field time options, keyed by tag name.
    pub time_layouts: HashMap<String, TimeFieldConfig>,
}

/// Per-field time override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFieldConfig {
    pub layout: String,
    #[serde(default)]
    pub location: Option<String>,
}

impl TimeFieldConfig {
    pub fn new(layout: impl Into<String>) -> Self {
        Self {
            layout: layout.into(),
            location: None,
        }
    }

    /// Resolve into options, falling back to `default_location` when no
    /// location is set on the field itself.
    pub fn to_options(&self, default_location: Option<&str>) -> Result<TimeOptions, ConfigError> {
        let mut options = TimeOptions::new(TimeLayout::parse(&self.layout)?);
        if let Some(location) = self.location.as_deref().or(default_location) {
            options = options.with_location(parse_location(location)?);
        }
        Ok(options)
    }
}

impl DecoderConfig {
    /// Load configuration from file or environment variables
    /// Priority: Environment Variables > Config File > Defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("LINESHAPE_CONFIG_FILE")
            .unwrap_or_else(|_| "lineshape.toml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            tracing::info!("Loading decoder configuration from: {}", config_path);
            Self::from_file(&config_path)?
        } else {
            tracing::info!(
                "Config file not found at {}, using environment variables",
                config_path
            );
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: DecoderConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Overwrite every setting for which `var` yields a value. Values that
    /// fail to parse are logged and ignored.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(separator) = var("LINESHAPE_SEPARATOR").and_then(|s| s.chars().next()) {
            self.separator = separator;
        }
        if let Some(escape) = var("LINESHAPE_ESCAPE").and_then(|s| s.chars().next()) {
            self.escape = Some(escape);
        }
        if let Some(prefix) = var("LINESHAPE_COMMENT_PREFIX") {
            self.comment_prefix = prefix;
        }
        if let Some(skip_comments) = parse_var(&var, "LINESHAPE_SKIP_COMMENTS") {
            self.skip_comments = skip_comments;
        }
        if let Some(layout) = var("LINESHAPE_TIME_LAYOUT") {
            self.default_time_layout = layout;
        }
        if let Some(location) = var("LINESHAPE_TIME_LOCATION") {
            self.default_time_location = Some(location);
        }
        if let Some(pool_size) = parse_var(&var, "LINESHAPE_POOL_SIZE") {
            self.pool_size = pool_size;
        }
        if let Some(strict_ip) = parse_var(&var, "LINESHAPE_STRICT_IP") {
            self.strict_ip = strict_ip;
        }
        if let Some(max_line_size) = parse_var(&var, "LINESHAPE_MAX_LINE_SIZE") {
            self.max_line_size = max_line_size;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.separator.is_ascii() || is_terminator(self.separator) {
            return Err(ConfigError::InvalidSeparator(self.separator));
        }
        if let Some(escape) = self.escape {
            if is_terminator(escape) {
                return Err(ConfigError::InvalidEscape(escape));
            }
        }
        if self.pool_size == 0 {
            return Err(ConfigError::ZeroPoolSize);
        }
        if self.max_line_size == 0 {
            return Err(ConfigError::ZeroMaxLineSize);
        }
        if self.skip_comments && self.comment_prefix.is_empty() {
            return Err(ConfigError::EmptyCommentPrefix);
        }

        self.default_time_options()?;
        for field in self.time_layouts.values() {
            field.to_options(self.default_time_location.as_deref())?;
        }
        Ok(())
    }

    /// Options attached to every time field before per-field overrides.
    pub fn default_time_options(&self) -> Result<TimeOptions, ConfigError> {
        TimeFieldConfig {
            layout: self.default_time_layout.clone(),
            location: None,
        }
        .to_options(self.default_time_location.as_deref())
    }

    /// Separator as the byte the tokenizer scans for.
    pub fn separator_byte(&self) -> u8 {
        // validate() guarantees ASCII
        self.separator as u8
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            separator: ' ',
            escape: None,
            comment_prefix: "#".to_string(),
            skip_comments: true,
            pool_size: crate::DEFAULT_POOL_SIZE,
            strict_ip: false,
            max_line_size: crate::MAX_LINE_SIZE,
            default_time_layout: "rfc3339".to_string(),
            default_time_location: None,
            time_layouts: HashMap::new(),
        }
    }
}

fn is_terminator(c: char) -> bool {
    c == '\n' || c == '\r'
}

fn parse_var<V: std::str::FromStr>(var: impl Fn(&str) -> Option<String>, key: &str) -> Option<V> {
    let raw = var(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}
