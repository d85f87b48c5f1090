use std::fmt::{self, Write};

use chrono::format::{self, Fixed, Item, Numeric, Pad, ParseErrorKind, Parsed, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, TimeZone, Utc};

use crate::error::ConfigError;

/// Layout used to parse time fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TimeLayout {
    /// `2006-01-02T15:04:05+07:00`, `Z` accepted for UTC.
    #[default]
    Rfc3339,
    /// `Mon, 02 Jan 2006 15:04:05 -0700`
    Rfc2822,
    /// Any chrono strftime layout, e.g. `%d/%b/%Y:%H:%M:%S %z`.
    Strftime(String),
}

impl TimeLayout {
    /// `"rfc3339"` and `"rfc2822"` (any case) select the named layouts,
    /// anything else is taken as a strftime layout.
    pub fn parse(layout: &str) -> Result<Self, ConfigError> {
        match layout.to_ascii_lowercase().as_str() {
            "rfc3339" => Ok(TimeLayout::Rfc3339),
            "rfc2822" => Ok(TimeLayout::Rfc2822),
            _ => {
                if layout.is_empty() || StrftimeItems::new(layout).any(|i| matches!(i, Item::Error)) {
                    return Err(ConfigError::InvalidTimeLayout(layout.to_string()));
                }
                Ok(TimeLayout::Strftime(layout.to_string()))
            }
        }
    }

    /// Width in bytes of a value rendered with this layout, or `None` when the
    /// width varies and the token has to be found by scanning for a separator.
    ///
    /// Measured by rendering the reference instant `2006-01-02 15:04:05 -07:00`.
    /// Unpadded numbers, full month and weekday names, `%.f` and `%Z` make a
    /// layout variable.
    pub fn fixed_width(&self) -> Option<usize> {
        let reference = reference_instant()?;
        match self {
            // fractional seconds and `Z` make it variable
            TimeLayout::Rfc3339 => None,
            // chrono renders the day unpadded, tokens carry two digits
            TimeLayout::Rfc2822 => rendered_width(&reference, RFC2822_PADDED),
            TimeLayout::Strftime(layout) => {
                if StrftimeItems::new(layout).any(|item| is_variable(&item)) {
                    return None;
                }
                rendered_width(&reference, layout)
            }
        }
    }
}

const RFC2822_PADDED: &str = "%a, %d %b %Y %H:%M:%S %z";

fn rendered_width(reference: &DateTime<FixedOffset>, layout: &str) -> Option<usize> {
    let mut rendered = String::new();
    write!(rendered, "{}", reference.format(layout)).ok()?;
    Some(rendered.len())
}

impl fmt::Display for TimeLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeLayout::Rfc3339 => f.write_str("rfc3339"),
            TimeLayout::Rfc2822 => f.write_str("rfc2822"),
            TimeLayout::Strftime(layout) => f.write_str(layout),
        }
    }
}

fn is_variable(item: &Item<'_>) -> bool {
    match item {
        Item::Numeric(Numeric::Timestamp, _) | Item::Numeric(_, Pad::None) => true,
        Item::Fixed(fixed) => matches!(
            fixed,
            Fixed::LongMonthName
                | Fixed::LongWeekdayName
                | Fixed::Nanosecond
                | Fixed::TimezoneName
                | Fixed::RFC2822
                | Fixed::RFC3339
        ),
        _ => false,
    }
}

fn reference_instant() -> Option<DateTime<FixedOffset>> {
    FixedOffset::west_opt(7 * 3600)?
        .with_ymd_and_hms(2006, 1, 2, 15, 4, 5)
        .single()
}

/// Parse a fixed UTC offset: `UTC`, `Z`, `+10:00`, `-0700`.
pub fn parse_location(location: &str) -> Result<FixedOffset, ConfigError> {
    let trimmed = location.trim();
    if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" {
        return Ok(Utc.fix());
    }
    trimmed
        .parse::<FixedOffset>()
        .map_err(|_| ConfigError::InvalidLocation(location.to_string()))
}

/// Per-field options for time parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeOptions {
    pub layout: TimeLayout,
    /// Offset applied when the token carries none. UTC when unset.
    pub location: Option<FixedOffset>,
}

impl TimeOptions {
    pub fn new(layout: TimeLayout) -> Self {
        Self { layout, location: None }
    }

    pub fn with_location(mut self, location: FixedOffset) -> Self {
        self.location = Some(location);
        self
    }

    pub fn parse(&self, token: &str) -> Result<DateTime<FixedOffset>, format::ParseError> {
        match &self.layout {
            TimeLayout::Rfc3339 => DateTime::parse_from_rfc3339(token),
            TimeLayout::Rfc2822 => DateTime::parse_from_rfc2822(token),
            TimeLayout::Strftime(layout) => self.parse_strftime(token, layout),
        }
    }

    /// Missing date components resolve to 0000-01-01 and missing time
    /// components to midnight, so clock-only layouts such as `%-I:%M%p` work.
    fn parse_strftime(
        &self,
        token: &str,
        layout: &str,
    ) -> Result<DateTime<FixedOffset>, format::ParseError> {
        let mut parsed = Parsed::new();
        format::parse(&mut parsed, token, StrftimeItems::new(layout))?;

        let date = match parsed.to_naive_date() {
            Ok(date) => date,
            Err(err) if err.kind() == ParseErrorKind::NotEnough => fill_missing_date(&parsed)?,
            Err(err) => return Err(err),
        };

        let time = match parsed.to_naive_time() {
            Ok(time) => time,
            Err(err) if err.kind() == ParseErrorKind::NotEnough => {
                let _ = parsed.set_hour(0);
                let _ = parsed.set_minute(0);
                parsed.to_naive_time()?
            }
            Err(err) => return Err(err),
        };

        let naive = date.and_time(time);
        let offset = parsed
            .to_fixed_offset()
            .ok()
            .or(self.location)
            .unwrap_or_else(|| Utc.fix());

        Ok(offset.from_utc_datetime(&(naive - offset)))
    }
}

/// Date from whatever parts were parsed, with year 0, January and the first
/// of the month standing in for missing ones. A weekday is only checked
/// when the token carried a year to check it against.
fn fill_missing_date(parsed: &Parsed) -> Result<NaiveDate, format::ParseError> {
    let mut date = Parsed::new();
    let mut has_year = false;

    if let Some(year) = parsed.year() {
        date.set_year(year.into())?;
        has_year = true;
    }
    if let Some(century) = parsed.year_div_100() {
        date.set_year_div_100(century.into())?;
        has_year = true;
    }
    if let Some(year) = parsed.year_mod_100() {
        date.set_year_mod_100(year.into())?;
        has_year = true;
    }
    if !has_year {
        date.set_year(0)?;
    }

    match parsed.ordinal() {
        Some(ordinal) => date.set_ordinal(ordinal.into())?,
        None => {
            date.set_month(parsed.month().map_or(1, i64::from))?;
            date.set_day(parsed.day().map_or(1, i64::from))?;
        }
    }

    if has_year {
        if let Some(weekday) = parsed.weekday() {
            date.set_weekday(weekday)?;
        }
    }
    date.to_naive_date()
}
