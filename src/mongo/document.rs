use crate::reading::Reading;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored shape of a reading. Same field names as the interchange file, but the
/// timestamp is a native BSON date so range filters compare instants, not strings.
/// BSON dates hold milliseconds; finer precision is truncated on store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(in crate::mongo) struct ReadingDocument {
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "assetID")]
    asset_id: i64,
    #[serde(rename = "assetType")]
    asset_type: String,
    #[serde(rename = "metricType")]
    metric_type: String,
    locations: Vec<f64>,
    values: Vec<f64>,
}

impl From<&Reading> for ReadingDocument {
    fn from(reading: &Reading) -> Self {
        Self {
            timestamp: reading.timestamp,
            asset_id: reading.asset_id,
            asset_type: reading.asset_type.clone(),
            metric_type: reading.metric_type.clone(),
            locations: reading.locations.clone(),
            values: reading.values.clone(),
        }
    }
}

impl From<ReadingDocument> for Reading {
    fn from(doc: ReadingDocument) -> Self {
        Self {
            timestamp: doc.timestamp,
            asset_id: doc.asset_id,
            asset_type: doc.asset_type,
            metric_type: doc.metric_type,
            locations: doc.locations,
            values: doc.values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Bson;
    use chrono::TimeZone;

    #[test]
    fn timestamp_is_stored_as_bson_date() {
        let reading = Reading {
            timestamp: Utc.with_ymd_and_hms(2026, 1, 11, 8, 30, 0).unwrap(),
            asset_id: 3,
            asset_type: "Circuit".to_string(),
            metric_type: "yellow-distributed-temperature".to_string(),
            locations: vec![0.5],
            values: vec![0.75],
        };
        let doc = bson::to_document(&ReadingDocument::from(&reading)).expect("bson");
        assert!(matches!(doc.get("timestamp"), Some(Bson::DateTime(_))));
        assert_eq!(doc.get_i64("assetID").expect("assetID"), 3);
        assert_eq!(
            doc.get_str("metricType").expect("metricType"),
            "yellow-distributed-temperature"
        );

        let back: ReadingDocument = bson::from_document(doc).expect("decode");
        assert_eq!(Reading::from(back), reading);
    }
}
