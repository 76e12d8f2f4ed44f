//! Date parsing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::config::Params;
use crate::error::Error;

use super::{FromNode, FromValue, Source};

/// Free-form layouts tried in order when no explicit format is configured.
const DATETIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M %p",
];

const DATE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateStyle {
    None,
    AssumeLocal,
    AssumeUniversal,
    AdjustToUniversal,
}

/// `parse-date`: parse text into an ISO-8601 date-time string.
///
/// `_format` takes a strftime layout; without it, a fixed list of common
/// layouts plus RFC 3339/2822 is tried. `_formatProvider` is accepted for
/// ruleset compatibility, but only English/invariant month and day names
/// parse. Unparseable text degrades to null.
pub struct ParseDate {
    format: Option<String>,
    style: DateStyle,
}

impl ParseDate {
    pub fn from_params(params: &Params) -> Result<ParseDate, Error> {
        let style = match params.get_str("_dateStyle")? {
            None | Some("None") => DateStyle::None,
            Some("AssumeLocal") => DateStyle::AssumeLocal,
            Some("AssumeUniversal") => DateStyle::AssumeUniversal,
            Some("AdjustToUniversal") => DateStyle::AdjustToUniversal,
            Some(other) => {
                return Err(Error::bad_parameter(
                    "_dateStyle",
                    format!("unknown date style {other}"),
                ))
            }
        };
        // Validated for type only; see the doc comment.
        let _ = params.get_str("_formatProvider")?;
        Ok(ParseDate {
            format: params.get_str("_format")?.map(str::to_string),
            style,
        })
    }

    fn parse(&self, raw: &str) -> Value {
        let raw = raw.trim();
        if raw.is_empty() {
            return Value::Null;
        }

        if let Some(format) = &self.format {
            if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
                return iso(datetime);
            }
            if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
                return iso(date.and_time(NaiveTime::MIN));
            }
            return Value::Null;
        }

        if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
            return iso(self.from_offset(datetime));
        }
        if let Ok(datetime) = DateTime::parse_from_rfc2822(raw) {
            return iso(self.from_offset(datetime));
        }
        for layout in DATETIME_LAYOUTS {
            if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, layout) {
                return iso(datetime);
            }
        }
        for layout in DATE_LAYOUTS {
            if let Ok(date) = NaiveDate::parse_from_str(raw, layout) {
                return iso(date.and_time(NaiveTime::MIN));
            }
        }

        Value::Null
    }

    /// Offset-carrying input either keeps its wall-clock reading or is
    /// adjusted to UTC, depending on the configured style.
    fn from_offset(&self, datetime: DateTime<chrono::FixedOffset>) -> NaiveDateTime {
        match self.style {
            DateStyle::AssumeUniversal | DateStyle::AdjustToUniversal => datetime.naive_utc(),
            DateStyle::None | DateStyle::AssumeLocal => datetime.naive_local(),
        }
    }
}

fn iso(datetime: NaiveDateTime) -> Value {
    Value::String(datetime.format("%Y-%m-%dT%H:%M:%S").to_string())
}

impl FromNode for ParseDate {
    fn transform_node(&self, source: &Source<'_>) -> Result<Value, Error> {
        Ok(self.parse(&source.text()))
    }
}

impl FromValue for ParseDate {
    fn transform_value(&self, input: Value) -> Result<Value, Error> {
        Ok(match input {
            Value::String(text) => self.parse(&text),
            _ => Value::Null,
        })
    }
}
