//! Reads values out of a row's raw `properties` map.
//!
//! Notion stores every property as rich text: a list of segments, each
//! `[text]` or `[text, [[annotation, arg?], ...]]`. Dates live in a `"d"`
//! annotation and hyperlinks in an `"a"` annotation. Nothing outside this
//! module looks at that shape.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;

const CHECKED: &str = "Yes";

pub struct RowProperties<'a> {
    raw: &'a HashMap<String, Value>,
}

impl<'a> RowProperties<'a> {
    pub fn new(raw: &'a HashMap<String, Value>) -> Self {
        Self { raw }
    }

    fn segments(&self, id: &str) -> impl Iterator<Item = &'a Value> {
        self.raw
            .get(id)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
    }

    /// Text of the first segment.
    pub fn first_text(&self, id: &str) -> Option<&'a str> {
        self.segments(id).next()?.get(0)?.as_str()
    }

    /// All segments' text concatenated; `None` when that is blank.
    pub fn text(&self, id: &str) -> Option<String> {
        let joined: String = self
            .segments(id)
            .filter_map(|seg| seg.get(0)?.as_str())
            .collect();
        let trimmed = joined.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Checkbox properties hold the literal `"Yes"` when ticked.
    pub fn is_checked(&self, id: &str) -> bool {
        self.first_text(id) == Some(CHECKED)
    }

    /// Start of the first date annotation.
    ///
    /// `start_time` is read as UTC; the annotation's `time_zone` is not
    /// applied, so a timed entry can be off by the zone's offset.
    pub fn date(&self, id: &str) -> Option<DateTime<Utc>> {
        self.annotations(id, "d").find_map(parse_date_annotation)
    }

    /// An `"a"` annotation target if there is one, else the plain text (URL
    /// properties store the address as text).
    pub fn link(&self, id: &str) -> Option<String> {
        self.annotations(id, "a")
            .find_map(|arg| arg.as_str())
            .map(str::to_string)
            .or_else(|| self.text(id))
    }

    fn annotations(&self, id: &str, tag: &'a str) -> impl Iterator<Item = &'a Value> {
        self.segments(id)
            .filter_map(|seg| seg.get(1)?.as_array())
            .flatten()
            .filter(move |ann| ann.get(0).and_then(Value::as_str) == Some(tag))
            .filter_map(|ann| ann.get(1))
    }
}

/// Wall-clock `start_date` + `start_time`, taken as UTC.
fn parse_date_annotation(arg: &Value) -> Option<DateTime<Utc>> {
    let date = arg.get("start_date")?.as_str()?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let time = arg
        .get("start_time")
        .and_then(Value::as_str)
        .and_then(|t| NaiveTime::parse_from_str(t, "%H:%M").ok())
        .unwrap_or(NaiveTime::MIN);
    Some(date.and_time(time).and_utc())
}
