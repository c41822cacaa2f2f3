//! Message catalog
//!
//! Loaded once from a CSV sheet with a `Category` column (Positive /
//! Neutral / Negative) and a `Message` column. Row order is delivery order.
//! Quoted fields follow RFC 4180 escaping and may span lines.
//!
//! Storage format:
//!   Category,Message
//!   Positive,"Great to see you, have a good one!"
//!   Negative,Take it easy today.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::emotion::EmotionLabel;
use crate::error::CatalogError;

const LABEL_COLUMNS: [&str; 2] = ["category", "label"];
const MESSAGE_COLUMNS: [&str; 2] = ["message", "text"];

/// Read-only after load; shared by every location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageCatalog {
    messages: BTreeMap<EmotionLabel, Vec<String>>,
}

impl MessageCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from `(label, message)` pairs in delivery order.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (EmotionLabel, S)>,
        S: Into<String>,
    {
        let mut catalog = Self::empty();
        for (label, message) in entries {
            catalog.messages.entry(label).or_default().push(message.into());
        }
        catalog
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Err(CatalogError::Missing(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::parse_csv(&text)?;

        info!(
            "[CATALOG] Loaded {}: Positive={} Neutral={} Negative={}",
            path.display(),
            catalog.len_for(EmotionLabel::Positive),
            catalog.len_for(EmotionLabel::Neutral),
            catalog.len_for(EmotionLabel::Negative)
        );
        Ok(catalog)
    }

    /// Like [`load`](Self::load), but any failure leaves every label empty.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("[CATALOG] {}; no messages are deliverable", e);
                Self::empty()
            }
        }
    }

    /// Parse CSV text. Rows with an unknown label or empty message are
    /// skipped with a warning.
    pub fn parse_csv(text: &str) -> Result<Self, CatalogError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut records = read_records(text)
            .into_iter()
            .filter(|(_, fields)| fields.iter().any(|f| !f.trim().is_empty()));

        let (_, header) = records.next().ok_or(CatalogError::NoHeader)?;
        let label_col = find_column(&header, &LABEL_COLUMNS).ok_or(CatalogError::MissingColumn("Category"))?;
        let message_col =
            find_column(&header, &MESSAGE_COLUMNS).ok_or(CatalogError::MissingColumn("Message"))?;

        let mut catalog = Self::empty();
        for (line, fields) in records {
            let raw_label = fields.get(label_col).map(|s| s.trim()).unwrap_or("");
            let message = fields.get(message_col).map(|s| s.trim()).unwrap_or("");

            let label = match raw_label.parse::<EmotionLabel>() {
                Ok(label) => label,
                Err(_) => {
                    warn!("[CATALOG] Line {}: skipping unknown category {:?}", line, raw_label);
                    continue;
                }
            };
            if message.is_empty() {
                warn!("[CATALOG] Line {}: skipping empty {} message", line, label);
                continue;
            }

            catalog.messages.entry(label).or_default().push(message.to_string());
        }

        Ok(catalog)
    }

    /// Messages for `label` in delivery order; empty when none are defined.
    pub fn messages_for(&self, label: EmotionLabel) -> &[String] {
        self.messages.get(&label).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len_for(&self, label: EmotionLabel) -> usize {
        self.messages_for(label).len()
    }

    pub fn total(&self) -> usize {
        self.messages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

fn find_column(header: &[String], names: &[&str]) -> Option<usize> {
    header
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
}

/// Split CSV text into records, each tagged with the line it starts on.
///
/// Double-quoted fields may contain commas, `""` escapes and line breaks.
/// An unterminated quote runs to the end of the text.
fn read_records(text: &str) -> Vec<(usize, Vec<String>)> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_start = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
            }
            '\n' if in_quotes => {
                field.push('\n');
                line += 1;
            }
            '\r' if in_quotes => {
                if chars.peek() != Some(&'\n') {
                    field.push('\r');
                }
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                fields.push(std::mem::take(&mut field));
                records.push((record_start, std::mem::take(&mut fields)));
                line += 1;
                record_start = line;
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push((record_start, fields));
    }
    records
}
