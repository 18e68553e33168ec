// src/datetime.rs
//
// Due dates are entered as local wall-clock values (`YYYY-MM-DDTHH:MM`),
// travel to the backend as UTC instants and are shown back in the user's zone.

use std::fmt::Display;

use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::ValidationError;

const INPUT_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];
const WIRE_NAIVE_FORMATS: [&str; 3] =
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
const DISPLAY_DATETIME: &str = "%d %b %Y, %H.%M";
const DISPLAY_DATE: &str = "%d %b %Y";

/// Converts a local input value in `tz` to a UTC instant.
///
/// Empty input means "no due date". For a wall-clock time that occurs twice
/// (DST fall-back) the earlier instant is used.
pub fn to_utc_instant<Tz: TimeZone>(
    local: &str,
    tz: &Tz,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let trimmed = local.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let naive = INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| {
            ValidationError::new("due_date", format!("Invalid date and time: {trimmed}"))
        })?;

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(Some(dt.with_timezone(&Utc))),
        LocalResult::Ambiguous(earliest, _) => Ok(Some(earliest.with_timezone(&Utc))),
        LocalResult::None => Err(ValidationError::new(
            "due_date",
            format!("{trimmed} does not exist in the local time zone"),
        )),
    }
}

/// Formats an instant as a local input value (`YYYY-MM-DDTHH:MM`).
pub fn to_input_datetime<Tz>(instant: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    instant.with_timezone(tz).format("%Y-%m-%dT%H:%M").to_string()
}

/// `05 Mar 2026, 10.00`
pub fn format_display_datetime<Tz>(instant: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    instant.with_timezone(tz).format("%d %b %Y, %H.%M").to_string()
}

/// `05 Mar 2026`
pub fn format_display_date<Tz>(instant: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    instant.with_timezone(tz).format("%d %b %Y").to_string()
}

/// Parses an instant as the backend sends it. ISO values without an offset
/// are taken as UTC; display values (`05 Mar 2026, 10.00`, `05 Mar 2026`)
/// are wall-clock time in the local zone.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    parse_instant_in(raw, &Local)
}

/// Like [`parse_instant`], reading display values as wall-clock time in `tz`.
pub fn parse_instant_in<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(naive) = WIRE_NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    {
        return Some(Utc.from_utc_datetime(&naive));
    }

    let display = NaiveDateTime::parse_from_str(raw, DISPLAY_DATETIME)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, DISPLAY_DATE)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    tz.from_local_datetime(&display)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Serde adapters for optional instants on the task wire shapes.
pub(crate) mod wire {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    // Same shape as a browser's `toISOString()`: millisecond precision, `Z`.
    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => super::parse_instant(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("unrecognized date/time: {raw}"))),
        }
    }
}
