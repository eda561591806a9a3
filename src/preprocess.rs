//! Preprocessing transforms applied to bound argument values.

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

use crate::error::PreprocessError;
use crate::input::StdinReader;
use crate::spec::Preprocess;

/// Filename meaning "read standard input".
pub const STDIN_MARKER: &str = "-";

/// ISO-8601 date-time layouts, extended and basic. Each may carry a `Z` or
/// numeric offset.
const ISO_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M",
];

const ISO_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d"];

/// Common non-ISO layouts rewritten to the extended ISO form.
const LOOSE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
];

/// Apply one transform to a bound value.
pub fn apply(
    preprocess: Preprocess,
    value: Value,
    stdin: &dyn StdinReader,
) -> Result<Value, PreprocessError> {
    match preprocess {
        Preprocess::YamlDocument => yaml_document(value, stdin),
        Preprocess::LineList => line_list(value, stdin),
        Preprocess::Datetime => datetime(value),
    }
}

/// Replace a filename with the YAML document it holds.
///
/// Structured values are returned as they are.
pub fn yaml_document(value: Value, stdin: &dyn StdinReader) -> Result<Value, PreprocessError> {
    let name = match value {
        Value::Object(_) | Value::Array(_) => return Ok(value),
        Value::String(name) => name,
        _ => return Err(PreprocessError::NotAFilename),
    };
    let text = read_source(&name, stdin)?;
    parse_yaml(&text, &origin(&name))
}

/// Replace a filename with its lines, newlines stripped.
///
/// Sequences are returned as they are.
pub fn line_list(value: Value, stdin: &dyn StdinReader) -> Result<Value, PreprocessError> {
    let name = match value {
        Value::Array(_) => return Ok(value),
        Value::String(name) => name,
        _ => return Err(PreprocessError::NotAFilename),
    };
    let text = read_source(&name, stdin)?;
    Ok(Value::Array(
        text.lines().map(|l| Value::String(l.to_owned())).collect(),
    ))
}

/// Normalize a date/time value to ISO-8601.
pub fn datetime(value: Value) -> Result<Value, PreprocessError> {
    match value {
        Value::String(s) => normalize_datetime(&s).map(Value::String),
        other => Err(PreprocessError::InvalidDateTime {
            input: other.to_string(),
        }),
    }
}

/// Normalize a date/time string to ISO-8601.
///
/// Input that is already ISO-8601 (extended or basic, with or without a
/// zone, date-only included) comes back unchanged. Space- or slash-separated
/// forms become `YYYY-MM-DDTHH:MM:SS[.fff]`, RFC 2822 keeps its offset and
/// `@<epoch>` is rendered in UTC.
pub fn normalize_datetime(input: &str) -> Result<String, PreprocessError> {
    let s = input.trim();
    if is_iso8601(s) {
        return Ok(s.to_owned());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Ok(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true));
    }
    for fmt in LOOSE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y/%m/%d") {
        return Ok(date.format("%Y-%m-%d").to_string());
    }
    if let Some(epoch) = s.strip_prefix('@').and_then(|n| n.parse::<i64>().ok()) {
        if let Some(dt) = Utc.timestamp_opt(epoch, 0).single() {
            return Ok(dt.to_rfc3339_opts(SecondsFormat::Secs, true));
        }
    }
    Err(PreprocessError::InvalidDateTime {
        input: input.to_owned(),
    })
}

fn is_iso8601(s: &str) -> bool {
    if DateTime::parse_from_rfc3339(s).is_ok() {
        return true;
    }
    let (local, utc) = match s.strip_suffix('Z') {
        Some(rest) => (rest, true),
        None => (s, false),
    };
    let datetime = ISO_DATETIME_FORMATS.iter().any(|fmt| {
        NaiveDateTime::parse_from_str(local, fmt).is_ok()
            || (!utc && DateTime::parse_from_str(s, &format!("{fmt}%z")).is_ok())
    });
    datetime || (!utc && ISO_DATE_FORMATS.iter().any(|fmt| NaiveDate::parse_from_str(s, fmt).is_ok()))
}

/// Parse YAML text into a structured value.
pub fn parse_yaml(text: &str, origin: &str) -> Result<Value, PreprocessError> {
    serde_yaml::from_str(text).map_err(|source| PreprocessError::InvalidYaml {
        origin: origin.to_owned(),
        source,
    })
}

fn read_source(name: &str, stdin: &dyn StdinReader) -> Result<String, PreprocessError> {
    if name.contains('\n') {
        return Err(PreprocessError::EmbeddedNewline);
    }
    if name == STDIN_MARKER {
        return stdin.read_to_string().map_err(PreprocessError::StdinRead);
    }
    std::fs::read_to_string(name).map_err(|source| PreprocessError::FileRead {
        path: Path::new(name).to_path_buf(),
        source,
    })
}

fn origin(name: &str) -> String {
    if name == STDIN_MARKER {
        "standard input".to_owned()
    } else {
        name.to_owned()
    }
}
