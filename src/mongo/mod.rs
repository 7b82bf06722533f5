mod document;


use crate::adapter::{QueryOutcome, RecencyQuery, StorageAdapter};
use crate::config::MongoConfig;
use crate::error::{classify_mongo, BenchError};
use crate::reading::{validate_batch, Reading};
use bson::{doc, Bson, Document};
use chrono::Utc;
use document::ReadingDocument;
use futures::TryStreamExt;
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, FindOptions, InsertManyOptions};
use mongodb::results::CollectionType;
use mongodb::{Client, Collection, Database};
use std::time::{Duration, Instant};

const NAMESPACE_EXISTS: i32 = 48;

pub struct MongoAdapter {
    client: Client,
    database: Database,
    collection: String,
    result_limit: Option<i64>,
}

impl MongoAdapter {
    /// Connects and pings the server so an unreachable deployment fails here
    /// rather than inside a timed stage.
    pub async fn connect(config: &MongoConfig) -> Result<Self, BenchError> {
        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(BenchError::connection)?;
        options.app_name = Some("storage-bench".to_string());
        options.connect_timeout = Some(config.connect_timeout);
        options.server_selection_timeout = Some(config.connect_timeout);
        let client = Client::with_options(options).map_err(BenchError::connection)?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(BenchError::connection)?;
        tracing::debug!(
            database = %config.database,
            collection = %config.collection,
            "connected to mongo"
        );
        Ok(Self::from_client(client, config))
    }

    pub fn from_client(client: Client, config: &MongoConfig) -> Self {
        let database = client.database(&config.database);
        Self {
            client,
            database,
            collection: config.collection.clone(),
            result_limit: positive_limit(config.result_limit),
        }
    }

    /// Applies a result cap to the recency query. `None` returns every match.
    pub fn with_result_limit(mut self, limit: Option<i64>) -> Self {
        self.result_limit = positive_limit(limit);
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn collection(&self) -> Collection<ReadingDocument> {
        self.database.collection(&self.collection)
    }

    pub async fn drop_collection(&self) -> Result<(), BenchError> {
        self.collection()
            .drop(None)
            .await
            .map_err(|err| {
                classify_mongo(err, |e| BenchError::schema(&self.collection, e.to_string()))
            })
    }
}

impl StorageAdapter for MongoAdapter {
    fn name(&self) -> &'static str {
        "mongo"
    }

    async fn prepare_schema(&self) -> Result<(), BenchError> {
        let schema_err =
            |e: mongodb::error::Error| BenchError::schema(&self.collection, e.to_string());

        let existing: Vec<_> = self
            .database
            .list_collections(doc! { "name": self.collection.as_str() }, None)
            .await
            .map_err(|err| classify_mongo(err, schema_err))?
            .try_collect()
            .await
            .map_err(|err| classify_mongo(err, schema_err))?;

        if let Some(spec) = existing.first() {
            return match spec.collection_type {
                CollectionType::Collection => Ok(()),
                _ => Err(BenchError::schema(
                    &self.collection,
                    "exists but is a view or time-series collection",
                )),
            };
        }

        match self.database.create_collection(&self.collection, None).await {
            Ok(()) => {
                tracing::debug!(collection = %self.collection, "created collection");
                Ok(())
            }
            Err(err) if command_code(&err) == Some(NAMESPACE_EXISTS) => Ok(()),
            Err(err) => Err(classify_mongo(err, schema_err)),
        }
    }

    async fn bulk_insert(&self, readings: &[Reading]) -> Result<Duration, BenchError> {
        validate_batch(readings)?;
        let total = readings.len();
        if total == 0 {
            return Ok(Duration::ZERO);
        }
        let docs: Vec<ReadingDocument> = readings.iter().map(ReadingDocument::from).collect();

        let mut options = InsertManyOptions::default();
        options.ordered = Some(true);

        let started = Instant::now();
        let result = self.collection().insert_many(&docs, options).await;
        let elapsed = started.elapsed();

        match result {
            Ok(inserted) => {
                tracing::debug!(
                    collection = %self.collection,
                    rows = inserted.inserted_ids.len(),
                    "inserted documents"
                );
                Ok(elapsed)
            }
            Err(err) => {
                let uncommitted = uncommitted_indices(&err, total);
                tracing::error!(
                    collection = %self.collection,
                    error = %err,
                    committed = total - uncommitted.len(),
                    uncommitted = uncommitted.len(),
                    "ordered insert stopped"
                );
                Err(classify_mongo(err, |e| BenchError::Transfer {
                    message: e.to_string(),
                    total,
                    uncommitted,
                }))
            }
        }
    }

    async fn query_recent(&self, query: &RecencyQuery) -> Result<QueryOutcome, BenchError> {
        let started = Instant::now();
        let cutoff = query.cutoff(Utc::now());
        let filter = doc! {
            "assetID": query.asset_id,
            "assetType": query.asset_type.as_str(),
            "metricType": query.metric_type.as_str(),
            "timestamp": { "$gte": bson::DateTime::from_chrono(cutoff) },
        };
        let mut options = FindOptions::default();
        options.sort = Some(doc! { "timestamp": -1 });
        options.limit = self.result_limit;

        let query_err = |e: mongodb::error::Error| BenchError::Query(e.to_string());
        let docs: Vec<ReadingDocument> = self
            .collection()
            .find(filter, options)
            .await
            .map_err(|err| classify_mongo(err, query_err))?
            .try_collect()
            .await
            .map_err(|err| classify_mongo(err, query_err))?;

        Ok(QueryOutcome {
            elapsed: started.elapsed(),
            readings: docs.into_iter().map(Reading::from).collect(),
        })
    }

    async fn footprint_bytes(&self) -> Result<u64, BenchError> {
        let stats = self
            .database
            .run_command(doc! { "collStats": self.collection.as_str() }, None)
            .await
            .map_err(|err| {
                classify_mongo(err, |e| BenchError::FootprintUnavailable(e.to_string()))
            })?;
        collection_size(&stats).ok_or_else(|| {
            BenchError::FootprintUnavailable(format!(
                "collStats for '{}' reported no size",
                self.collection
            ))
        })
    }
}

/// With an ordered insert the server stops at the first failing document, so
/// everything from that index on was never written. A bulk failure without
/// write errors is a write-concern failure: every document landed.
fn uncommitted_indices(err: &mongodb::error::Error, total: usize) -> Vec<usize> {
    match err.kind.as_ref() {
        ErrorKind::BulkWrite(failure) => {
            let failed: Vec<usize> = failure
                .write_errors
                .iter()
                .flatten()
                .map(|e| e.index)
                .collect();
            unwritten_suffix(&failed, total)
        }
        _ => (0..total).collect(),
    }
}

fn unwritten_suffix(failed: &[usize], total: usize) -> Vec<usize> {
    match failed.iter().min() {
        Some(first) => ((*first).min(total)..total).collect(),
        None => Vec::new(),
    }
}

// Zero or negative means no cap.
fn positive_limit(limit: Option<i64>) -> Option<i64> {
    limit.filter(|v| *v > 0)
}

fn command_code(err: &mongodb::error::Error) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Command(command) => Some(command.code),
        _ => None,
    }
}

fn collection_size(stats: &Document) -> Option<u64> {
    if let Some(total) = stats.get("totalSize").and_then(bson_number) {
        return Some(total);
    }
    let storage = stats.get("storageSize").and_then(bson_number)?;
    let indexes = stats.get("totalIndexSize").and_then(bson_number).unwrap_or(0);
    Some(storage + indexes)
}

fn bson_number(value: &Bson) -> Option<u64> {
    match value {
        Bson::Int32(v) if *v >= 0 => Some(*v as u64),
        Bson::Int64(v) if *v >= 0 => Some(*v as u64),
        Bson::Double(v) if v.is_finite() && *v >= 0.0 => Some(*v as u64),
        _ => None,
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn size_prefers_total_size() {
        let stats = doc! {
            "totalSize": 4096_i64,
            "storageSize": 1024_i32,
            "totalIndexSize": 512_i32,
        };
        assert_eq!(collection_size(&stats), Some(4096));
    }

    #[test]
    fn size_falls_back_to_storage_plus_indexes() {
        let stats = doc! { "storageSize": 1024_i32, "totalIndexSize": 512.0 };
        assert_eq!(collection_size(&stats), Some(1536));
    }

    #[test]
    fn size_missing_is_none() {
        assert_eq!(collection_size(&doc! { "ok": 1 }), None);
        assert_eq!(collection_size(&doc! { "storageSize": -1_i32 }), None);
    }

    #[test]
    fn non_bulk_errors_leave_whole_batch_uncommitted() {
        let err = mongodb::error::Error::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "socket reset",
        ));
        assert_eq!(uncommitted_indices(&err, 3), vec![0, 1, 2]);
    }

    #[test]
    fn unwritten_suffix_starts_at_first_failed_write() {
        assert_eq!(unwritten_suffix(&[3, 2], 5), vec![2, 3, 4]);
        assert_eq!(unwritten_suffix(&[7], 5), Vec::<usize>::new());
    }

    #[test]
    fn write_concern_only_failure_leaves_nothing_uncommitted() {
        assert!(unwritten_suffix(&[], 4).is_empty());
    }

    #[tokio::test]
    async fn result_limit_ignores_non_positive_values() {
        let client = Client::with_uri_str("mongodb://127.0.0.1:1")
            .await
            .expect("lazy client");
        let config = MongoConfig {
            uri: "mongodb://127.0.0.1:1".to_string(),
            database: "db".to_string(),
            collection: "readings".to_string(),
            result_limit: Some(0),
            connect_timeout: Duration::from_secs(1),
        };
        let adapter = MongoAdapter::from_client(client, &config);
        assert_eq!(adapter.result_limit, None);
        let adapter = adapter.with_result_limit(Some(-3));
        assert_eq!(adapter.result_limit, None);
        let adapter = adapter.with_result_limit(Some(2));
        assert_eq!(adapter.result_limit, Some(2));
    }
}
