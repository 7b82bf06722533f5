use crate::error::BenchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ASSET_TYPE: &str = "Circuit";
pub const DEFAULT_VECTOR_LEN: usize = 30_000;

/// Distributed-temperature severity bands, most severe first.
pub const METRIC_TYPES: [&str; 3] = [
    "red-distributed-temperature",
    "yellow-distributed-temperature",
    "green-distributed-temperature",
];

/// One asset-metric sample carrying two positionally paired vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(alias = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "assetID", alias = "AssetID", alias = "assetid")]
    pub asset_id: i64,
    #[serde(rename = "assetType", alias = "AssetType", alias = "assettype")]
    pub asset_type: String,
    #[serde(rename = "metricType", alias = "MetricType", alias = "metrictype")]
    pub metric_type: String,
    #[serde(alias = "Locations")]
    pub locations: Vec<f64>,
    #[serde(alias = "Values")]
    pub values: Vec<f64>,
}

impl Reading {
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.asset_id <= 0 {
            return Err(BenchError::Serialization(format!(
                "asset_id must be positive, got {}",
                self.asset_id
            )));
        }
        if self.locations.len() != self.values.len() {
            return Err(BenchError::Serialization(format!(
                "asset {} at {}: {} locations vs {} values",
                self.asset_id,
                self.timestamp.to_rfc3339(),
                self.locations.len(),
                self.values.len()
            )));
        }
        Ok(())
    }

    pub fn summary(&self) -> String {
        format!(
            "Timestamp: {}, AssetID: {}, AssetType: {}, MetricType: {}, Locations: [{} values], Values: [{} values]",
            self.timestamp.to_rfc3339(),
            self.asset_id,
            self.asset_type,
            self.metric_type,
            self.locations.len(),
            self.values.len()
        )
    }
}

/// Checks every reading in a batch, reporting the first offender by index.
pub fn validate_batch(readings: &[Reading]) -> Result<(), BenchError> {
    for (index, reading) in readings.iter().enumerate() {
        reading.validate().map_err(|err| match err {
            BenchError::Serialization(message) => {
                BenchError::Serialization(format!("reading #{index}: {message}"))
            }
            other => other,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reading(locations: usize, values: usize) -> Reading {
        Reading {
            timestamp: Utc.with_ymd_and_hms(2026, 1, 11, 0, 0, 0).unwrap(),
            asset_id: 1,
            asset_type: DEFAULT_ASSET_TYPE.to_string(),
            metric_type: METRIC_TYPES[0].to_string(),
            locations: vec![0.5; locations],
            values: vec![0.25; values],
        }
    }

    #[test]
    fn mismatched_vectors_are_rejected_with_index() {
        let batch = vec![reading(5, 5), reading(4, 5)];
        let err = validate_batch(&batch).unwrap_err();
        match err {
            BenchError::Serialization(message) => {
                assert!(message.starts_with("reading #1"), "{message}");
                assert!(message.contains("4 locations vs 5 values"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_positive_asset_id_is_rejected() {
        let mut bad = reading(2, 2);
        bad.asset_id = 0;
        assert!(matches!(bad.validate(), Err(BenchError::Serialization(_))));
    }

    #[test]
    fn legacy_field_spellings_are_accepted() {
        let payload = r#"{
            "Timestamp": "2026-01-11T00:00:00Z",
            "AssetID": 7,
            "AssetType": "Circuit",
            "MetricType": "green-distributed-temperature",
            "Locations": [0.1],
            "Values": [0.2]
        }"#;
        let parsed: Reading = serde_json::from_str(payload).expect("parsed");
        assert_eq!(parsed.asset_id, 7);
        assert_eq!(parsed.metric_type, "green-distributed-temperature");
    }

    #[test]
    fn serializes_with_document_field_names() {
        let value = serde_json::to_value(reading(1, 1)).expect("json");
        let object = value.as_object().expect("object");
        for key in [
            "timestamp",
            "assetID",
            "assetType",
            "metricType",
            "locations",
            "values",
        ] {
            assert!(object.contains_key(key), "missing {key}");
        }
    }
}
