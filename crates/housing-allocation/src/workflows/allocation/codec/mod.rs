//! Flat string-keyed record representation for every persisted entity.
//!
//! Each entity type implements [`RecordCodec`] by hand, field by field, so field order, null
//! handling, and type coercion are all visible at compile time. Values stored in a [`Record`]
//! are already codec-escaped: the null sentinel can only be produced by an absent value and an
//! empty string always means "empty list" for list-valued fields.

mod entities;
pub mod line;

use std::fmt::Display;
use std::str::FromStr;

use chrono::NaiveDate;

pub use line::{parse_line, render_line, LineFormat};

/// Token written for a field holding no value. Text values escape `\`, so data cannot produce it.
pub const NULL_SENTINEL: &str = "\\N";
/// Separator between list elements inside one field.
pub const LIST_SEPARATOR: char = ';';
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors raised while decoding records or record lines.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("missing field `{field}`")]
    MissingField { field: String },
    #[error("field `{field}` must not be null")]
    UnexpectedNull { field: String },
    #[error("field `{field}` has invalid value '{value}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
    #[error("malformed record line: {reason}")]
    MalformedLine { reason: String },
}

impl CodecError {
    fn invalid(field: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Name of the offending field, when the failure is tied to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field }
            | Self::UnexpectedNull { field }
            | Self::InvalidValue { field, .. } => Some(field),
            Self::MalformedLine { .. } => None,
        }
    }

    /// Raw persisted value that failed to decode.
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::UnexpectedNull { .. } => Some(NULL_SENTINEL),
            Self::InvalidValue { value, .. } => Some(value),
            Self::MissingField { .. } | Self::MalformedLine { .. } => None,
        }
    }
}

/// Enumerations persisted by symbolic name.
pub trait Symbol: Sized + Copy + 'static {
    const VARIANTS: &'static [Self];

    fn symbol(self) -> &'static str;

    /// Exact-match lookup; no case folding.
    fn from_symbol(raw: &str) -> Option<Self> {
        Self::VARIANTS
            .iter()
            .copied()
            .find(|variant| variant.symbol() == raw)
    }
}

/// Bidirectional mapping between an entity and its flat record.
pub trait RecordCodec: Sized {
    fn encode(&self) -> Record;
    fn decode(record: &Record) -> Result<Self, CodecError>;
}

/// Ordered field-name to value mapping. Unknown keys are carried but ignored by decoders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw value, replacing an existing key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn put_text(&mut self, key: &str, value: &str) {
        self.insert(key, escape_text(value));
    }

    pub fn put_optional_text(&mut self, key: &str, value: Option<&str>) {
        match value {
            Some(value) => self.put_text(key, value),
            None => self.insert(key, NULL_SENTINEL),
        }
    }

    pub fn put_list<I, S>(&mut self, key: &str, items: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let encoded: Vec<String> = items
            .into_iter()
            .map(|item| escape_list_element(item.as_ref()))
            .collect();
        let separator = LIST_SEPARATOR.to_string();
        self.insert(key, encoded.join(separator.as_str()));
    }

    pub fn put_symbol<S: Symbol>(&mut self, key: &str, value: S) {
        self.insert(key, value.symbol());
    }

    pub fn put_optional_symbol<S: Symbol>(&mut self, key: &str, value: Option<S>) {
        match value {
            Some(value) => self.put_symbol(key, value),
            None => self.insert(key, NULL_SENTINEL),
        }
    }

    pub fn put_date(&mut self, key: &str, value: NaiveDate) {
        self.insert(key, value.format(DATE_FORMAT).to_string());
    }

    pub fn put_number<N: Display>(&mut self, key: &str, value: N) {
        self.insert(key, value.to_string());
    }

    pub fn put_bool(&mut self, key: &str, value: bool) {
        self.insert(key, if value { "true" } else { "false" });
    }

    fn raw(&self, key: &str) -> Result<&str, CodecError> {
        self.get(key).ok_or_else(|| CodecError::MissingField {
            field: key.to_string(),
        })
    }

    fn non_null(&self, key: &str) -> Result<&str, CodecError> {
        let raw = self.raw(key)?;
        if raw == NULL_SENTINEL {
            return Err(CodecError::UnexpectedNull {
                field: key.to_string(),
            });
        }
        Ok(raw)
    }

    pub fn text(&self, key: &str) -> Result<String, CodecError> {
        self.non_null(key).map(unescape_text)
    }

    /// Null sentinel or missing key both decode to `None`.
    pub fn optional_text(&self, key: &str) -> Result<Option<String>, CodecError> {
        match self.get(key) {
            None => Ok(None),
            Some(NULL_SENTINEL) => Ok(None),
            Some(raw) => Ok(Some(unescape_text(raw))),
        }
    }

    /// Empty string is an empty list, never a null one.
    pub fn list(&self, key: &str) -> Result<Vec<String>, CodecError> {
        let raw = self.non_null(key)?;
        Ok(split_list(raw))
    }

    pub fn symbol<S: Symbol>(&self, key: &str) -> Result<S, CodecError> {
        let raw = self.non_null(key)?;
        S::from_symbol(raw).ok_or_else(|| CodecError::invalid(key, raw, "unrecognized name"))
    }

    pub fn optional_symbol<S: Symbol>(&self, key: &str) -> Result<Option<S>, CodecError> {
        match self.get(key) {
            None | Some(NULL_SENTINEL) => Ok(None),
            Some(raw) => S::from_symbol(raw)
                .map(Some)
                .ok_or_else(|| CodecError::invalid(key, raw, "unrecognized name")),
        }
    }

    pub fn date(&self, key: &str) -> Result<NaiveDate, CodecError> {
        let raw = self.non_null(key)?;
        NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map_err(|err| CodecError::invalid(key, raw, format!("expected YYYY-MM-DD ({err})")))
    }

    pub fn number<N>(&self, key: &str) -> Result<N, CodecError>
    where
        N: FromStr,
        N::Err: Display,
    {
        let raw = self.non_null(key)?;
        raw.trim()
            .parse::<N>()
            .map_err(|err| CodecError::invalid(key, raw, err.to_string()))
    }

    pub fn optional_number<N>(&self, key: &str) -> Result<Option<N>, CodecError>
    where
        N: FromStr,
        N::Err: Display,
    {
        match self.get(key) {
            None | Some(NULL_SENTINEL) => Ok(None),
            Some(_) => self.number(key).map(Some),
        }
    }

    pub fn boolean(&self, key: &str) -> Result<bool, CodecError> {
        let raw = self.non_null(key)?;
        if raw.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if raw.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(CodecError::invalid(key, raw, "expected true or false"))
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut record = Record::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

fn escape_text(value: &str) -> String {
    value.replace('\\', "\\\\")
}

/// Only `\\` is an escape; any other backslash is literal text.
fn unescape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' && chars.clone().next() == Some('\\') {
            chars.next();
            out.push('\\');
        } else {
            out.push(ch);
        }
    }
    out
}

fn escape_list_element(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == '\\' || ch == LIST_SEPARATOR {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn split_list(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }

    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(next) => current.push(next),
                None => current.push('\\'),
            },
            LIST_SEPARATOR => items.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    items.push(current);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_and_empty_text_stay_distinct() {
        let mut record = Record::new();
        record.put_optional_text("nothing", None);
        record.put_optional_text("blank", Some(""));

        assert_eq!(record.get("nothing"), Some(NULL_SENTINEL));
        assert_eq!(record.get("blank"), Some(""));
        assert_eq!(record.optional_text("nothing").expect("decodes"), None);
        assert_eq!(
            record.optional_text("blank").expect("decodes"),
            Some(String::new())
        );
    }

    #[test]
    fn literal_sentinel_text_survives_as_data() {
        let mut record = Record::new();
        record.put_optional_text("tricky", Some("\\N"));

        assert_ne!(record.get("tricky"), Some(NULL_SENTINEL));
        assert_eq!(
            record.optional_text("tricky").expect("decodes"),
            Some("\\N".to_string())
        );
    }

    #[test]
    fn empty_list_is_empty_string_not_null() {
        let mut record = Record::new();
        record.put_list("ids", Vec::<String>::new());
        assert_eq!(record.get("ids"), Some(""));
        assert!(record.list("ids").expect("decodes").is_empty());

        record.insert("ids", NULL_SENTINEL);
        assert!(matches!(
            record.list("ids"),
            Err(CodecError::UnexpectedNull { .. })
        ));
    }

    #[test]
    fn list_elements_escape_the_separator() {
        let mut record = Record::new();
        record.put_list("notes", ["a;b", "c\\d", "e"]);
        assert_eq!(
            record.list("notes").expect("decodes"),
            vec!["a;b".to_string(), "c\\d".to_string(), "e".to_string()]
        );
    }

    #[test]
    fn unescaped_backslashes_in_hand_written_text_survive() {
        let record: Record = [("name", "C:\\new\\town"), ("path", "a\\\\b")]
            .into_iter()
            .collect();
        assert_eq!(record.text("name").expect("text"), "C:\\new\\town");
        assert_eq!(record.text("path").expect("text"), "a\\b");
    }

    #[test]
    fn numeric_parse_failures_are_errors_not_zero() {
        let record: Record = [("age", "forty")].into_iter().collect();
        let err = record.number::<u8>("age").expect_err("not a number");
        assert_eq!(err.field(), Some("age"));
        assert_eq!(err.value(), Some("forty"));
    }

    #[test]
    fn malformed_dates_are_errors() {
        let record: Record = [("open_date", "2025/01/01")].into_iter().collect();
        assert!(matches!(
            record.date("open_date"),
            Err(CodecError::InvalidValue { .. })
        ));
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut record = Record::new();
        record.insert("a", "1");
        record.insert("b", "2");
        record.insert("a", "3");
        let keys: Vec<_> = record.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(record.get("a"), Some("3"));
    }
}
