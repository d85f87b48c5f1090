//! Type-directed conversion of raw tokens into record field values.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tracing::warn;
use url::Url;

use crate::error::ConversionError;
use crate::time::TimeOptions;

/// Conversion class of a bound field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Bool,
    Int,
    Uint,
    Float,
    String,
    Time,
    Duration,
    Url,
    Ip,
    /// Placeholder consumed without a destination (`:-`)
    Ignored,
    /// Field type with no defined conversion
    Unsupported,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Bool => "bool",
            SemanticType::Int => "int",
            SemanticType::Uint => "uint",
            SemanticType::Float => "float",
            SemanticType::String => "string",
            SemanticType::Time => "time",
            SemanticType::Duration => "duration",
            SemanticType::Url => "url",
            SemanticType::Ip => "ip",
            SemanticType::Ignored => "ignored",
            SemanticType::Unsupported => "unsupported",
        }
    }
}

/// Per-field settings a conversion may consult.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertContext<'a> {
    pub time: Option<&'a TimeOptions>,
    /// Fail on unparseable IP addresses instead of storing the unspecified address.
    pub strict_ip: bool,
}

/// A type that can be stored in a record field bound to a placeholder.
///
/// Implementations for the supported primitive and structured types are
/// provided. A type that keeps the default `from_token` is registered as
/// [`SemanticType::Unsupported`] and fails every conversion with
/// [`ConversionError::UnsupportedFieldType`].
pub trait FieldValue: Sized + Send + 'static {
    const SEMANTIC: SemanticType = SemanticType::Unsupported;

    fn from_token(token: &str, ctx: &ConvertContext<'_>) -> Result<Self, ConversionError> {
        let _ = (token, ctx);
        Err(ConversionError::UnsupportedFieldType(std::any::type_name::<Self>()))
    }
}

impl FieldValue for bool {
    const SEMANTIC: SemanticType = SemanticType::Bool;

    fn from_token(token: &str, _ctx: &ConvertContext<'_>) -> Result<Self, ConversionError> {
        match token {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
            _ => Err(ConversionError::InvalidBool(token.to_string())),
        }
    }
}

macro_rules! int_field {
    ($semantic:ident, $err:ident: $($ty:ty),+) => {
        $(
            impl FieldValue for $ty {
                const SEMANTIC: SemanticType = SemanticType::$semantic;

                fn from_token(token: &str, _ctx: &ConvertContext<'_>) -> Result<Self, ConversionError> {
                    token.parse::<$ty>().map_err(|_| ConversionError::$err {
                        width: <$ty>::BITS,
                        token: token.to_string(),
                    })
                }
            }
        )+
    };
}

int_field!(Int, NotIntLike: i8, i16, i32, i64, isize);
int_field!(Uint, NotUintLike: u8, u16, u32, u64, usize);

macro_rules! float_field {
    ($($ty:ty => $width:expr),+) => {
        $(
            impl FieldValue for $ty {
                const SEMANTIC: SemanticType = SemanticType::Float;

                fn from_token(token: &str, _ctx: &ConvertContext<'_>) -> Result<Self, ConversionError> {
                    token.parse::<$ty>().map_err(|_| ConversionError::NotFloatLike {
                        width: $width,
                        token: token.to_string(),
                    })
                }
            }
        )+
    };
}

float_field!(f32 => 32, f64 => 64);

impl FieldValue for String {
    const SEMANTIC: SemanticType = SemanticType::String;

    fn from_token(token: &str, _ctx: &ConvertContext<'_>) -> Result<Self, ConversionError> {
        Ok(token.to_string())
    }
}

impl FieldValue for DateTime<FixedOffset> {
    const SEMANTIC: SemanticType = SemanticType::Time;

    fn from_token(token: &str, ctx: &ConvertContext<'_>) -> Result<Self, ConversionError> {
        let options = ctx.time.ok_or(ConversionError::NilTimeOptions)?;
        options.parse(token).map_err(|source| ConversionError::Time {
            layout: options.layout.to_string(),
            source,
        })
    }
}

impl FieldValue for DateTime<Utc> {
    const SEMANTIC: SemanticType = SemanticType::Time;

    fn from_token(token: &str, ctx: &ConvertContext<'_>) -> Result<Self, ConversionError> {
        DateTime::<FixedOffset>::from_token(token, ctx).map(|t| t.with_timezone(&Utc))
    }
}

impl FieldValue for Duration {
    const SEMANTIC: SemanticType = SemanticType::Duration;

    fn from_token(token: &str, _ctx: &ConvertContext<'_>) -> Result<Self, ConversionError> {
        humantime::parse_duration(token).map_err(|source| ConversionError::Duration {
            token: token.to_string(),
            source,
        })
    }
}

impl FieldValue for Url {
    const SEMANTIC: SemanticType = SemanticType::Url;

    fn from_token(token: &str, _ctx: &ConvertContext<'_>) -> Result<Self, ConversionError> {
        Url::parse(token).map_err(|source| ConversionError::Url {
            token: token.to_string(),
            source,
        })
    }
}

fn parse_ip<A: FromStr>(token: &str, ctx: &ConvertContext<'_>, unspecified: A) -> Result<A, ConversionError> {
    match token.parse::<A>() {
        Ok(addr) => Ok(addr),
        Err(_) if ctx.strict_ip => Err(ConversionError::InvalidIp(token.to_string())),
        Err(_) => {
            warn!(token, "unparseable IP address, storing unspecified address");
            Ok(unspecified)
        }
    }
}

impl FieldValue for IpAddr {
    const SEMANTIC: SemanticType = SemanticType::Ip;

    fn from_token(token: &str, ctx: &ConvertContext<'_>) -> Result<Self, ConversionError> {
        parse_ip(token, ctx, IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }
}

impl FieldValue for Ipv4Addr {
    const SEMANTIC: SemanticType = SemanticType::Ip;

    fn from_token(token: &str, ctx: &ConvertContext<'_>) -> Result<Self, ConversionError> {
        parse_ip(token, ctx, Ipv4Addr::UNSPECIFIED)
    }
}

impl FieldValue for Ipv6Addr {
    const SEMANTIC: SemanticType = SemanticType::Ip;

    fn from_token(token: &str, ctx: &ConvertContext<'_>) -> Result<Self, ConversionError> {
        parse_ip(token, ctx, Ipv6Addr::UNSPECIFIED)
    }
}

impl<V: FieldValue> FieldValue for Option<V> {
    const SEMANTIC: SemanticType = V::SEMANTIC;

    fn from_token(token: &str, ctx: &ConvertContext<'_>) -> Result<Self, ConversionError> {
        V::from_token(token, ctx).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::TimeLayout;
    use chrono::Timelike;

    fn ctx() -> ConvertContext<'static> {
        ConvertContext::default()
    }

    #[test]
    fn test_parse_uint_widths() {
        assert_eq!(u8::from_token("0", &ctx()).unwrap(), 0);
        assert_eq!(u16::from_token("256", &ctx()).unwrap(), 256);
        assert_eq!(u32::from_token("65536", &ctx()).unwrap(), 65536);
        assert_eq!(usize::from_token("4294967297", &ctx()).unwrap(), 4294967297);
        assert_eq!(u64::from_token("4294967297", &ctx()).unwrap(), 4294967297);

        assert!(matches!(
            u8::from_token("256", &ctx()),
            Err(ConversionError::NotUintLike { width: 8, .. })
        ));
        assert!(matches!(
            u64::from_token("-1", &ctx()),
            Err(ConversionError::NotUintLike { width: 64, .. })
        ));
        assert!(u32::from_token("y321", &ctx()).is_err());
    }

    #[test]
    fn test_parse_int_widths() {
        assert_eq!(i8::from_token("-127", &ctx()).unwrap(), -127);
        assert_eq!(i16::from_token("32767", &ctx()).unwrap(), 32767);
        assert_eq!(i32::from_token("-2147483647", &ctx()).unwrap(), -2147483647);
        assert_eq!(
            i64::from_token("-9223372036854775800", &ctx()).unwrap(),
            -9223372036854775800
        );

        assert!(matches!(
            i16::from_token("32768", &ctx()),
            Err(ConversionError::NotIntLike { width: 16, .. })
        ));
        assert!(matches!(
            i64::from_token("924.1", &ctx()),
            Err(ConversionError::NotIntLike { width: 64, .. })
        ));
    }

    #[test]
    fn test_parse_float() {
        let f = f32::from_token("1234212.2916", &ctx()).unwrap();
        assert!((f - 1234212.2916).abs() < 0.5);
        assert_eq!(f64::from_token("2147483647.0", &ctx()).unwrap(), 2147483647.0);
        assert_eq!(f32::from_token("25.6", &ctx()).unwrap(), 25.6f32);

        assert!(matches!(
            f32::from_token("32.123.1", &ctx()),
            Err(ConversionError::NotFloatLike { width: 32, .. })
        ));
        assert!(matches!(
            f64::from_token("32y1", &ctx()),
            Err(ConversionError::NotFloatLike { width: 64, .. })
        ));
    }

    #[test]
    fn test_parse_bool_literals() {
        for token in ["1", "t", "T", "TRUE", "true", "True"] {
            assert!(bool::from_token(token, &ctx()).unwrap(), "{}", token);
        }
        for token in ["0", "f", "F", "FALSE", "false", "False"] {
            assert!(!bool::from_token(token, &ctx()).unwrap(), "{}", token);
        }
        assert!(matches!(
            bool::from_token("ftrue", &ctx()),
            Err(ConversionError::InvalidBool(_))
        ));
        assert!(bool::from_token("yes", &ctx()).is_err());
    }

    #[test]
    fn test_string_is_verbatim() {
        let msg = " some wow message here ";
        assert_eq!(String::from_token(msg, &ctx()).unwrap(), msg);
    }

    #[test]
    fn test_time_requires_options() {
        assert!(matches!(
            DateTime::<FixedOffset>::from_token("2018-07-28T21:10:45Z", &ctx()),
            Err(ConversionError::NilTimeOptions)
        ));

        let options = TimeOptions::new(TimeLayout::parse("%-I:%M%p").unwrap());
        let ctx = ConvertContext {
            time: Some(&options),
            ..Default::default()
        };
        let t = DateTime::<FixedOffset>::from_token("5:43PM", &ctx).unwrap();
        assert_eq!((t.hour(), t.minute()), (17, 43));

        let err = DateTime::<Utc>::from_token("ggwp2018", &ctx).unwrap_err();
        assert!(matches!(err, ConversionError::Time { .. }));
        assert!(err.to_string().contains("%-I:%M%p"));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(Duration::from_token("17s", &ctx()).unwrap(), Duration::from_secs(17));
        assert_eq!(
            Duration::from_token("1h 30m", &ctx()).unwrap(),
            Duration::from_secs(5400)
        );
        assert_eq!(
            Duration::from_token("250ms", &ctx()).unwrap(),
            Duration::from_millis(250)
        );
        assert!(matches!(
            Duration::from_token("20x", &ctx()),
            Err(ConversionError::Duration { .. })
        ));
        assert!(Duration::from_token("", &ctx()).is_err());
    }

    #[test]
    fn test_parse_url() {
        let u = Url::from_token("http://localhost:81/pattern?p1=a&p2=b&p3=c#wow", &ctx()).unwrap();
        assert_eq!(u.host_str(), Some("localhost"));
        assert_eq!(u.port(), Some(81));
        assert_eq!(u.fragment(), Some("wow"));
        assert!(u.query_pairs().any(|(k, v)| k == "p2" && v == "b"));

        assert!(matches!(Url::from_token("", &ctx()), Err(ConversionError::Url { .. })));
        assert!(Url::from_token("http://[::1", &ctx()).is_err());
    }

    #[test]
    fn test_parse_ip_lenient_and_strict() {
        assert_eq!(
            IpAddr::from_token("241.74.91.45", &ctx()).unwrap(),
            IpAddr::V4(Ipv4Addr::new(241, 74, 91, 45))
        );
        assert_eq!(
            Ipv6Addr::from_token("::1", &ctx()).unwrap(),
            Ipv6Addr::LOCALHOST
        );

        assert_eq!(
            IpAddr::from_token("not-an-ip", &ctx()).unwrap(),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        );

        let strict = ConvertContext {
            strict_ip: true,
            ..Default::default()
        };
        assert!(matches!(
            Ipv4Addr::from_token("300.1.1.1", &strict),
            Err(ConversionError::InvalidIp(_))
        ));
    }

    #[test]
    fn test_option_delegates() {
        assert_eq!(<Option<u16> as FieldValue>::SEMANTIC, SemanticType::Uint);
        assert_eq!(Option::<u16>::from_token("42", &ctx()).unwrap(), Some(42));
        assert!(Option::<u16>::from_token("x", &ctx()).is_err());
    }

    #[test]
    fn test_unsupported_type() {
        struct Opaque;
        impl FieldValue for Opaque {}

        assert_eq!(Opaque::SEMANTIC, SemanticType::Unsupported);
        assert!(matches!(
            Opaque::from_token("172.17.254.1", &ctx()),
            Err(ConversionError::UnsupportedFieldType(_))
        ));
    }
}
