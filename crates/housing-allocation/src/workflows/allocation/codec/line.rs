use serde::{Deserialize, Serialize};

use super::{CodecError, Record};

const LEGACY_PAIR: &str = "=";
const LEGACY_ENTRY: &str = "|";
const MODERN_PAIR: &str = "|||";
const MODERN_ENTRY: &str = ":::";

/// On-disk line style for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineFormat {
    /// `key=value` pairs joined by `|`.
    Legacy,
    /// `key|||value` pairs joined by `:::`.
    #[default]
    Modern,
}

impl LineFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "legacy" => Some(Self::Legacy),
            "modern" => Some(Self::Modern),
            _ => None,
        }
    }

    /// Probe which separator style a line was written with.
    pub fn detect(line: &str) -> Option<Self> {
        if line.contains(MODERN_PAIR) {
            Some(Self::Modern)
        } else if line.contains(LEGACY_PAIR) {
            Some(Self::Legacy)
        } else {
            None
        }
    }

    const fn separators(self) -> (&'static str, &'static str) {
        match self {
            Self::Legacy => (LEGACY_PAIR, LEGACY_ENTRY),
            Self::Modern => (MODERN_PAIR, MODERN_ENTRY),
        }
    }
}

pub fn render_line(record: &Record, format: LineFormat) -> String {
    let (pair, entry) = format.separators();
    record
        .iter()
        .map(|(key, value)| format!("{}{}{}", escape(key), pair, escape(value)))
        .collect::<Vec<_>>()
        .join(entry)
}

pub fn parse_line(line: &str) -> Result<Record, CodecError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let format = LineFormat::detect(line).ok_or_else(|| CodecError::MalformedLine {
        reason: "no key/value separator found".to_string(),
    })?;
    let (pair, entry) = format.separators();

    let mut record = Record::new();
    for chunk in line.split(entry) {
        if chunk.is_empty() {
            continue;
        }
        let (key, value) = chunk
            .split_once(pair)
            .ok_or_else(|| CodecError::MalformedLine {
                reason: format!("entry '{chunk}' has no separator"),
            })?;
        let key = unescape(key);
        if key.is_empty() {
            return Err(CodecError::MalformedLine {
                reason: "empty field name".to_string(),
            });
        }
        record.insert(key, unescape(value));
    }

    Ok(record)
}

fn escape(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for ch in component.chars() {
        match ch {
            '%' => out.push_str("%25"),
            '|' => out.push_str("%7C"),
            '=' => out.push_str("%3D"),
            ':' => out.push_str("%3A"),
            '\n' => out.push_str("%0A"),
            '\r' => out.push_str("%0D"),
            other => out.push(other),
        }
    }
    out
}

/// Decodes `%XX` escapes; a `%` not followed by two hex digits is kept as written.
fn unescape(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    let mut chars = component.chars();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }

        let digits: String = chars.clone().take(2).collect();
        let well_formed = digits.len() == 2 && digits.chars().all(|c| c.is_ascii_hexdigit());
        match u8::from_str_radix(&digits, 16)
            .ok()
            .filter(|byte| well_formed && byte.is_ascii())
        {
            Some(byte) => {
                out.push(char::from(byte));
                chars.nth(1);
            }
            None => out.push('%'),
        }
    }
    out
}
