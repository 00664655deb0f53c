//! Conversion history records and their persisted shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::utils::OutputFormat;

/// A completed conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    #[serde(rename = "Id", alias = "id")]
    pub id: i64,
    pub original_name: String,
    pub original_size: u64,
    pub output_format: OutputFormat,
    pub quality: u8,
    pub converted_size: u64,
    /// Creation time, never changed after `create`
    pub timestamp: DateTime<Utc>,
}

/// Fields supplied by the caller of `create`; id and timestamp are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHistoryRecord {
    pub original_name: String,
    pub original_size: u64,
    pub output_format: OutputFormat,
    pub quality: u8,
    pub converted_size: u64,
}

/// Partial update. `timestamp` is accepted but never applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPatch {
    pub original_name: Option<String>,
    pub original_size: Option<u64>,
    pub output_format: Option<OutputFormat>,
    pub quality: Option<u8>,
    pub converted_size: Option<u64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl HistoryRecord {
    pub(crate) fn apply(&mut self, patch: HistoryPatch) {
        if let Some(name) = patch.original_name {
            self.original_name = name;
        }
        if let Some(size) = patch.original_size {
            self.original_size = size;
        }
        if let Some(format) = patch.output_format {
            self.output_format = format;
        }
        if let Some(quality) = patch.quality {
            self.quality = quality;
        }
        if let Some(size) = patch.converted_size {
            self.converted_size = size;
        }
    }
}

/// Inclusive timestamp window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

#[derive(Debug, Clone, Default)]
pub struct HistoryFilters {
    pub format: Option<OutputFormat>,
    pub date_range: Option<DateRange>,
    /// Case-insensitive substring of the original name or format tag
    pub search: Option<String>,
}

impl HistoryFilters {
    pub fn matches(&self, record: &HistoryRecord) -> bool {
        if let Some(format) = self.format {
            if record.output_format != format {
                return false;
            }
        }

        if let Some(range) = &self.date_range {
            if !range.contains(record.timestamp) {
                return false;
            }
        }

        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let in_name = record.original_name.to_lowercase().contains(&needle);
            let in_format = record.output_format.tag().contains(&needle);
            if !in_name && !in_format {
                return false;
            }
        }

        true
    }
}

/// Lenient on-disk shape: every field optional, unknown fields ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    #[serde(default, rename = "Id", alias = "id")]
    id: Option<i64>,
    #[serde(default)]
    original_name: Option<String>,
    #[serde(default)]
    original_size: Option<u64>,
    #[serde(default)]
    output_format: Option<String>,
    #[serde(default)]
    quality: Option<u8>,
    #[serde(default)]
    converted_size: Option<u64>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

/// Parses a persisted collection, defaulting missing ids to `position + 1`.
///
/// Entries that are not objects or carry an unknown output format are dropped.
pub(crate) fn decode_records(value: serde_json::Value) -> Vec<HistoryRecord> {
    let serde_json::Value::Array(entries) = value else {
        warn!("Conversion history blob is not a list, starting empty");
        return Vec::new();
    };

    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let stored: StoredRecord = match serde_json::from_value(entry) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!("Skipping unreadable history entry {}: {}", index, e);
                    return None;
                }
            };

            let output_format = match stored.output_format.as_deref().map(str::parse::<OutputFormat>) {
                Some(Ok(format)) => format,
                _ => {
                    warn!("Skipping history entry {} with unknown output format", index);
                    return None;
                }
            };

            Some(HistoryRecord {
                id: stored.id.filter(|id| *id > 0).unwrap_or(index as i64 + 1),
                original_name: stored.original_name.unwrap_or_default(),
                original_size: stored.original_size.unwrap_or_default(),
                output_format,
                quality: stored.quality.unwrap_or_default(),
                converted_size: stored.converted_size.unwrap_or_default(),
                timestamp: stored.timestamp.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(name: &str, format: OutputFormat, at: &str) -> HistoryRecord {
        HistoryRecord {
            id: 1,
            original_name: name.to_string(),
            original_size: 100,
            output_format: format,
            quality: 85,
            converted_size: 50,
            timestamp: at.parse().unwrap(),
        }
    }

    #[test]
    fn serializes_with_legacy_field_names() {
        let value = serde_json::to_value(record("a.png", OutputFormat::Webp, "2026-01-02T03:04:05Z")).unwrap();
        assert_eq!(value["Id"], 1);
        assert_eq!(value["originalName"], "a.png");
        assert_eq!(value["outputFormat"], "webp");
        assert_eq!(value["convertedSize"], 50);
    }

    #[test]
    fn decode_tolerates_extra_fields_and_missing_ids() {
        let blob = json!([
            {"originalName": "a.png", "outputFormat": "png", "quality": 85, "timestamp": "2026-01-01T00:00:00Z", "extra": true},
            {"Id": 9, "originalName": "b.jpg", "outputFormat": "jpg", "quality": 60, "timestamp": "2026-01-02T00:00:00Z"},
            {"id": 4, "outputFormat": "bmp"},
            {"Id": 0, "outputFormat": "webp"},
            {"Id": 5, "outputFormat": "gif"},
            "not a record"
        ]);

        let records = decode_records(blob);
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 9, 4, 4]);
        assert_eq!(records[1].output_format, OutputFormat::Jpeg);
        assert_eq!(records[2].original_name, "");
    }

    #[test]
    fn non_list_blob_decodes_empty() {
        assert!(decode_records(json!({"Id": 1})).is_empty());
    }

    #[test]
    fn filters_compose() {
        let r = record("Holiday.PNG", OutputFormat::Jpeg, "2026-03-01T12:00:00Z");

        assert!(HistoryFilters::default().matches(&r));
        assert!(HistoryFilters { search: Some("holiday".into()), ..Default::default() }.matches(&r));
        assert!(HistoryFilters { search: Some("JPE".into()), ..Default::default() }.matches(&r));
        assert!(!HistoryFilters { search: Some("beach".into()), ..Default::default() }.matches(&r));
        assert!(!HistoryFilters { format: Some(OutputFormat::Png), ..Default::default() }.matches(&r));

        let exact = DateRange { start: r.timestamp, end: r.timestamp };
        assert!(HistoryFilters { date_range: Some(exact), ..Default::default() }.matches(&r));

        let before = DateRange {
            start: "2026-01-01T00:00:00Z".parse().unwrap(),
            end: "2026-02-01T00:00:00Z".parse().unwrap(),
        };
        assert!(!HistoryFilters { date_range: Some(before), ..Default::default() }.matches(&r));
    }
}
